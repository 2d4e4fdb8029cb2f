//! Backend clients for the tutor.
//!
//! Every backend speaks the same contract: a [`ChatRequest`] goes in, a
//! stream of text chunks comes out. The stream resolves once response
//! headers arrive; chunks are yielded in transport order.

pub mod decode;
pub mod gemini;
pub mod http;
pub mod image;
pub mod router;
pub mod sse;

use async_trait::async_trait;
use futures::Stream;
use shared::chat_api::{ChatRequest, ImageRequest};
use shared::ChatError;
use std::pin::Pin;

/// Incremental answer text. An `Err` item ends the stream.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, ChatError>> + Send>>;

#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Issue exactly one request and return its answer as a chunk stream.
    ///
    /// Non-success statuses fail here with `ChatError::Upstream`, before any
    /// chunk is produced.
    async fn open_stream(&self, request: &ChatRequest) -> Result<TextStream, ChatError>;
}

#[async_trait]
pub trait ImageBackend: Send + Sync {
    /// Returns the generated picture as a data URI or hosted URL.
    async fn generate_image(&self, request: &ImageRequest) -> Result<String, ChatError>;
}

pub use gemini::GeminiBackend;
pub use http::HttpBackend;
pub use image::ImageClient;
