//! Provider-agnostic policy layer around an adapter.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tracing::warn;

use crate::provider::{LlmClient, LlmRequest};
use crate::types::LlmStream;

use super::retry::RetryPolicy;
use super::timeout::idle_timeout;

/// Applies the idle timeout to every attempt and retries retryable failures.
///
/// A failure after output has already been delivered is never retried, since
/// the retry would repeat that output.
pub struct ResilientClient {
    inner: Arc<dyn LlmClient>,
    timeout: Duration,
    retry: RetryPolicy,
}

impl ResilientClient {
    pub fn new(inner: Arc<dyn LlmClient>, timeout: Duration, retry: RetryPolicy) -> Self {
        Self {
            inner,
            timeout,
            retry,
        }
    }
}

impl LlmClient for ResilientClient {
    fn provider_name(&self) -> &str {
        self.inner.provider_name()
    }

    fn send_request(&self, request: LlmRequest) -> LlmStream {
        let inner = Arc::clone(&self.inner);
        let timeout = self.timeout;
        let retry = self.retry.clone();

        Box::pin(async_stream::stream! {
            let mut attempt: u32 = 1;
            loop {
                let mut stream = idle_timeout(inner.send_request(request.clone()), timeout);
                let mut delivered = false;
                let mut failure = None;

                while let Some(item) = stream.next().await {
                    match item {
                        Ok(chunk) => {
                            delivered = true;
                            yield Ok(chunk);
                        }
                        Err(e) => {
                            failure = Some(e);
                            break;
                        }
                    }
                }

                let Some(error) = failure else { break };
                if delivered || !retry.should_retry(&error, attempt) {
                    yield Err(error);
                    break;
                }

                warn!(
                    session_id = %request.session_id,
                    attempt,
                    max_attempts = retry.max_attempts,
                    error = %error,
                    "Retrying after error"
                );
                tokio::time::sleep(retry.backoff).await;
                attempt += 1;
            }
        })
    }
}
