// Server-sent event decoding for streamed completions

use std::collections::VecDeque;

use bytes::Bytes;
use futures::stream::{self, BoxStream, Stream, StreamExt};

use crate::types::{AppError, AppResult};

/// Incremental decoder that turns raw SSE bytes into `data:` payloads.
///
/// Bytes are buffered until a full line is available, so a payload split
/// across network chunks (even inside a multi-byte character) is reassembled.
/// Multiple `data:` lines in one event are joined with `\n`.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every event completed by it
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(['\n', '\r']);
            if let Some(event) = self.handle_line(line) {
                events.push(event);
            }
        }
        events
    }

    /// Flush a trailing event that was not terminated by a blank line
    pub fn finish(&mut self) -> Option<String> {
        if !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            let line = String::from_utf8_lossy(&rest).trim_end_matches('\r').to_string();
            self.handle_line(&line);
        }
        self.dispatch()
    }

    fn handle_line(&mut self, line: &str) -> Option<String> {
        if line.is_empty() {
            return self.dispatch();
        }
        // Comments and other fields (event:, id:, retry:) carry nothing we use
        if let Some(value) = line.strip_prefix("data:") {
            self.data.push(value.strip_prefix(' ').unwrap_or(value).to_string());
        }
        None
    }

    fn dispatch(&mut self) -> Option<String> {
        if self.data.is_empty() {
            return None;
        }
        Some(std::mem::take(&mut self.data).join("\n"))
    }
}

struct EventState {
    inner: BoxStream<'static, AppResult<Bytes>>,
    decoder: SseDecoder,
    ready: VecDeque<String>,
    done: bool,
}

/// Wrap a byte stream (usually `reqwest::Response::bytes_stream`) as a stream of SSE payloads
pub fn data_events<S, E>(inner: S) -> BoxStream<'static, AppResult<String>>
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let state = EventState {
        inner: inner
            .map(|chunk| chunk.map_err(|e| AppError::LLMApi(format!("stream interrupted: {}", e))))
            .boxed(),
        decoder: SseDecoder::new(),
        ready: VecDeque::new(),
        done: false,
    };

    stream::unfold(state, |mut st| async move {
        loop {
            if let Some(event) = st.ready.pop_front() {
                return Some((Ok(event), st));
            }
            if st.done {
                return None;
            }
            match st.inner.next().await {
                Some(Ok(bytes)) => st.ready.extend(st.decoder.push(&bytes)),
                Some(Err(e)) => {
                    st.done = true;
                    return Some((Err(e), st));
                }
                None => {
                    st.done = true;
                    st.ready.extend(st.decoder.finish());
                }
            }
        }
    })
    .boxed()
}
