//! Incremental server-sent-event decoding.

use futures::stream::BoxStream;
use futures::{Stream, StreamExt};

use crate::error::{AgentError, ErrorCode};

const DONE_SENTINEL: &str = "[DONE]";

/// Line buffer over raw response bytes.
///
/// Bytes are buffered until a newline arrives, so multi-byte characters and
/// lines split across network chunks decode correctly.
#[derive(Debug, Default)]
pub struct SseLineBuffer {
    buffer: Vec<u8>,
}

impl SseLineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes and drain every complete line (without the terminator).
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }

    /// The trailing line left when the body ended without a newline.
    pub fn finish(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.buffer);
        Some(String::from_utf8_lossy(&rest).trim_end_matches('\r').to_string())
    }
}

/// Meaning of one SSE line.
#[derive(Debug, PartialEq, Eq)]
pub enum SseLine<'a> {
    /// Payload of a `data:` line.
    Data(&'a str),
    /// `data: [DONE]`.
    Done,
    /// Blank lines, comments, `event:`/`id:` fields, empty payloads.
    Skip,
}

/// Classify one line. The space after `data:` is optional.
pub fn parse_line(line: &str) -> SseLine<'_> {
    let Some(data) = line.strip_prefix("data:") else {
        return SseLine::Skip;
    };
    let data = data.strip_prefix(' ').unwrap_or(data).trim_end();
    match data {
        "" => SseLine::Skip,
        DONE_SENTINEL => SseLine::Done,
        payload => SseLine::Data(payload),
    }
}

/// Turn a response byte stream into the stream of `data:` payloads.
///
/// Ends at `[DONE]` or end of body. Transport failures end the stream with
/// `NETWORK_ERROR`.
pub fn data_stream<S, B>(bytes: S) -> BoxStream<'static, Result<String, AgentError>>
where
    S: Stream<Item = Result<B, reqwest::Error>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    Box::pin(async_stream::try_stream! {
        let mut lines = SseLineBuffer::new();
        let mut done = false;
        futures::pin_mut!(bytes);

        'body: while let Some(chunk) = bytes.next().await {
            let chunk = chunk?;
            for line in lines.push(chunk.as_ref()) {
                match parse_line(&line) {
                    SseLine::Data(payload) => yield payload.to_string(),
                    SseLine::Done => {
                        done = true;
                        break 'body;
                    }
                    SseLine::Skip => {}
                }
            }
        }

        if let Some(line) = lines.finish().filter(|_| !done) {
            if let SseLine::Data(payload) = parse_line(&line) {
                yield payload.to_string();
            }
        }
    })
}

/// Parse a payload as JSON; malformed payloads are fatal for the stream.
pub fn parse_json<T: serde::de::DeserializeOwned>(payload: &str) -> Result<T, AgentError> {
    serde_json::from_str(payload).map_err(|e| {
        AgentError::llm_service(
            ErrorCode::SseParsingError,
            format!("malformed stream event: {e}"),
        )
        .with_source(e)
    })
}
