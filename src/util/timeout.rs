//! Inactivity timeout for streams.

use std::time::Duration;

use futures::StreamExt;

use crate::error::{AgentError, ErrorCode};
use crate::types::LlmStream;

/// Fail `stream` with `REQUEST_TIMEOUT` when no item arrives within
/// `duration` of the previous one. The timer restarts on every item.
pub fn idle_timeout(mut stream: LlmStream, duration: Duration) -> LlmStream {
    Box::pin(async_stream::stream! {
        loop {
            match tokio::time::timeout(duration, stream.next()).await {
                Ok(Some(item)) => {
                    let failed = item.is_err();
                    yield item;
                    if failed {
                        break;
                    }
                }
                Ok(None) => break,
                Err(_) => {
                    yield Err(AgentError::llm_service(
                        ErrorCode::RequestTimeout,
                        format!("no response activity for {}ms", duration.as_millis()),
                    ));
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LlmChunk;

    fn delayed(delays_ms: &[u64]) -> LlmStream {
        let delays = delays_ms.to_vec();
        Box::pin(async_stream::stream! {
            for (i, delay) in delays.into_iter().enumerate() {
                tokio::time::sleep(Duration::from_millis(delay)).await;
                yield Ok(LlmChunk::text(i.to_string()));
            }
        })
    }

    #[tokio::test(start_paused = true)]
    async fn timer_resets_on_each_chunk() {
        let items: Vec<_> = idle_timeout(delayed(&[20, 20, 20]), Duration::from_millis(30))
            .collect()
            .await;
        assert_eq!(items.len(), 3);
        assert!(items.iter().all(Result::is_ok));
    }

    #[tokio::test(start_paused = true)]
    async fn stall_yields_timeout_error() {
        let items: Vec<_> = idle_timeout(delayed(&[10, 50]), Duration::from_millis(30))
            .collect()
            .await;
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        let err = items[1].as_ref().unwrap_err();
        assert_eq!(err.code, ErrorCode::RequestTimeout);
    }
}
