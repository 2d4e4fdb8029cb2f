//! Turning raw response bytes into text chunks.
//!
//! Network chunk boundaries do not respect UTF-8: a multi-byte character
//! (every `á`, `é`, `ñ`, `¿` the tutor writes) can be split across two reads.
//! The decoder holds back the incomplete tail until the rest arrives.

use futures::{Stream, StreamExt};
use shared::ChatError;
use std::fmt::Display;

use crate::TextStream;

/// Incremental UTF-8 decoder that carries partial characters across chunks.
#[derive(Debug, Default)]
pub struct Utf8ChunkDecoder {
    pending: Vec<u8>,
}

impl Utf8ChunkDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode as much of `pending + chunk` as forms complete characters.
    /// Invalid sequences are replaced with U+FFFD.
    pub fn push(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);
        let mut out = String::new();

        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    out.push_str(text);
                    self.pending.clear();
                    return out;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.pending[..valid]));
                    match e.error_len() {
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + bad);
                        }
                        None => {
                            // Incomplete sequence at the end; wait for more bytes
                            self.pending.drain(..valid);
                            return out;
                        }
                    }
                }
            }
        }
    }

    /// Flush whatever is left when the body ends.
    pub fn finish(&mut self) -> String {
        let rest = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        rest
    }
}

/// Adapt a byte stream into a stream of non-empty text chunks.
///
/// A transport error ends the stream after yielding `ChatError::Stream`.
pub fn text_stream<S, B, E>(body: S) -> TextStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    let state = (Box::pin(body), Utf8ChunkDecoder::new(), false);
    let stream = futures::stream::unfold(state, |(mut body, mut decoder, done)| async move {
        if done {
            return None;
        }
        loop {
            match body.next().await {
                Some(Ok(bytes)) => {
                    let text = decoder.push(bytes.as_ref());
                    if !text.is_empty() {
                        return Some((Ok(text), (body, decoder, false)));
                    }
                }
                Some(Err(e)) => {
                    let err = ChatError::stream(e.to_string());
                    return Some((Err(err), (body, decoder, true)));
                }
                None => {
                    let rest = decoder.finish();
                    if rest.is_empty() {
                        return None;
                    }
                    return Some((Ok(rest), (body, decoder, true)));
                }
            }
        }
    });
    Box::pin(stream)
}
