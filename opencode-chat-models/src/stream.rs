//! Event stream decoder.
//!
//! Turns the raw bytes of `GET /event` into the text increments of one
//! session's reply. Frames are `data: <json>` lines; the sequence ends on
//! `data: [DONE]`, on a completion event for the session, or at end of data.
//! Malformed frames are logged and skipped.

use bytes::Bytes;
use futures::Stream;
use opencode_chat_core::{PromptPart, Role, StreamEvent};
use pin_project_lite::pin_project;
use std::collections::{HashMap, HashSet, VecDeque};
use std::pin::Pin;
use std::task::{Context, Poll};
use thiserror::Error;

use crate::error::{ModelError, Step};
use crate::model::TokenCallback;

/// Sentinel payload that ends the stream.
pub const DONE_SENTINEL: &str = "[DONE]";

/// A single frame that could not be decoded. Never propagated.
#[derive(Debug, Error)]
#[error("malformed stream frame: {source}; data: {data}")]
pub struct StreamFrameError {
    /// The frame payload.
    pub data: String,
    /// Why it failed to parse.
    #[source]
    pub source: serde_json::Error,
}

/// Splits a byte stream into lines.
///
/// Bytes are buffered until a `\n` arrives, so a multi-byte character split
/// across reads decodes intact. A trailing `\r` is stripped.
#[derive(Debug, Default)]
pub struct SseLineDecoder {
    buffer: Vec<u8>,
    // Bytes of `buffer` already known to hold no `\n`.
    scanned: usize,
}

impl SseLineDecoder {
    /// Create a new decoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every line it completed.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut lines = Vec::new();
        let mut start = 0;
        let mut cursor = self.scanned;
        while let Some(offset) = self.buffer[cursor..].iter().position(|b| *b == b'\n') {
            let end = cursor + offset;
            let line = &self.buffer[start..end];
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            lines.push(String::from_utf8_lossy(line).into_owned());
            start = end + 1;
            cursor = start;
        }

        self.buffer.drain(..start);
        self.scanned = self.buffer.len();
        lines
    }

    /// Take whatever partial line is left at end of data.
    pub fn finish(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.buffer);
        self.scanned = 0;
        let line = String::from_utf8_lossy(&rest)
            .trim_end_matches('\r')
            .to_string();
        Some(line)
    }

    /// Whether a partial line is buffered.
    #[must_use]
    pub fn has_incomplete(&self) -> bool {
        !self.buffer.is_empty()
    }
}

/// What one line means.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Not a data line (comment, `event:`, `id:`, blank).
    Ignored,
    /// `data: [DONE]`.
    Done,
    /// A decoded event.
    Event(StreamEvent),
}

/// Classify one line.
pub fn parse_line(line: &str) -> Result<Frame, StreamFrameError> {
    let Some(payload) = line.strip_prefix("data:") else {
        return Ok(Frame::Ignored);
    };
    let payload = payload.strip_prefix(' ').unwrap_or(payload);

    if payload.trim() == DONE_SENTINEL {
        return Ok(Frame::Done);
    }

    StreamEvent::from_json(payload)
        .map(Frame::Event)
        .map_err(|source| StreamFrameError {
            data: payload.to_string(),
            source,
        })
}

/// Per-stream filter state: which events belong to the active session.
#[derive(Debug)]
struct SessionFilter {
    session_id: String,
    user_messages: HashSet<String>,
    // Bytes of each part's text already yielded, by part id.
    emitted: HashMap<String, usize>,
}

/// Outcome of handling one event.
#[derive(Debug, PartialEq)]
enum Handled {
    Skip,
    Text(String),
    Finish,
}

impl SessionFilter {
    fn new(session_id: String) -> Self {
        Self {
            session_id,
            user_messages: HashSet::new(),
            emitted: HashMap::new(),
        }
    }

    /// Events without a session id are taken to belong to this call.
    fn is_foreign(&self, event: &StreamEvent) -> bool {
        event
            .session_id()
            .is_some_and(|id| id != self.session_id)
    }

    fn handle(&mut self, event: StreamEvent) -> Handled {
        if self.is_foreign(&event) {
            return Handled::Skip;
        }
        if event.is_completion() {
            return Handled::Finish;
        }

        match event {
            StreamEvent::MessageUpdated {
                id,
                role: Some(Role::User),
                ..
            } => {
                self.user_messages.insert(id);
                Handled::Skip
            }
            StreamEvent::PartUpdated {
                part: PromptPart::Text(part),
                delta,
            } => {
                // Echoes of the submitted prompt.
                let echoed = part
                    .ids
                    .message_id
                    .as_ref()
                    .is_some_and(|id| self.user_messages.contains(id));
                if echoed || part.synthetic == Some(true) {
                    return Handled::Skip;
                }
                let delta = delta.filter(|d| !d.is_empty());
                let Some(part_id) = part.ids.id else {
                    let text = delta.unwrap_or(part.text);
                    return if text.is_empty() {
                        Handled::Skip
                    } else {
                        Handled::Text(text)
                    };
                };

                let emitted = self.emitted.entry(part_id).or_insert(0);
                if let Some(delta) = delta {
                    *emitted += delta.len();
                    return Handled::Text(delta);
                }

                // A full-text update repeats what the deltas already carried.
                let fresh = part.text.get(*emitted..).unwrap_or_default().to_string();
                *emitted = (*emitted).max(part.text.len());
                if fresh.is_empty() {
                    Handled::Skip
                } else {
                    Handled::Text(fresh)
                }
            }
            _ => Handled::Skip,
        }
    }
}

pin_project! {
    /// Decoded text increments for one session.
    ///
    /// Finite and not restartable. Dropping it drops the underlying byte
    /// stream, which closes the connection.
    pub struct EventStream<S> {
        #[pin]
        inner: S,
        decoder: SseLineDecoder,
        pending: VecDeque<String>,
        filter: SessionFilter,
        on_token: Option<TokenCallback>,
        // Inner stream returned None; only `pending` is left.
        eof: bool,
        done: bool,
    }
}

impl<S> EventStream<S> {
    /// Decode `inner` for `session_id`, reporting each increment to `on_token`.
    pub fn new(inner: S, session_id: impl Into<String>, on_token: Option<TokenCallback>) -> Self {
        Self {
            inner,
            decoder: SseLineDecoder::new(),
            pending: VecDeque::new(),
            filter: SessionFilter::new(session_id.into()),
            on_token,
            eof: false,
            done: false,
        }
    }
}

impl<S, E> Stream for EventStream<S>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: std::fmt::Display,
{
    type Item = Result<String, ModelError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        loop {
            if *this.done {
                return Poll::Ready(None);
            }

            while let Some(line) = this.pending.pop_front() {
                let frame = match parse_line(&line) {
                    Ok(frame) => frame,
                    Err(err) => {
                        tracing::warn!(error = %err, "Skipping malformed stream frame");
                        continue;
                    }
                };

                match frame {
                    Frame::Ignored => {}
                    Frame::Done => {
                        tracing::debug!(session_id = %this.filter.session_id, "Stream sent [DONE]");
                        *this.done = true;
                        return Poll::Ready(None);
                    }
                    Frame::Event(event) => match this.filter.handle(event) {
                        Handled::Skip => {}
                        Handled::Finish => {
                            tracing::debug!(
                                session_id = %this.filter.session_id,
                                "Session reported completion"
                            );
                            *this.done = true;
                            return Poll::Ready(None);
                        }
                        Handled::Text(text) => {
                            if let Some(callback) = this.on_token.as_ref() {
                                callback(&text);
                            }
                            return Poll::Ready(Some(Ok(text)));
                        }
                    },
                }
            }

            if *this.eof {
                *this.done = true;
                return Poll::Ready(None);
            }

            match this.inner.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    this.pending.extend(this.decoder.feed(&bytes));
                }
                Poll::Ready(Some(Err(e))) => {
                    *this.done = true;
                    return Poll::Ready(Some(Err(ModelError::Network {
                        step: Step::ReadEventStream,
                        message: e.to_string(),
                    })));
                }
                Poll::Ready(None) => {
                    *this.eof = true;
                    this.pending.extend(this.decoder.finish());
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
