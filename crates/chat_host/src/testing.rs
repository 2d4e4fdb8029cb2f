//! Deterministic in-memory backends for session tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use providers::{ChatBackend, ImageBackend, TextStream};
use shared::chat_api::{ChatRequest, ImageRequest};
use shared::ChatError;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::time::{sleep, Duration};

/// One scripted stream event.
#[derive(Debug, Clone)]
pub enum StepKind {
    Chunk(String),
    /// Transport failure; ends the stream
    Error(String),
    /// Never yields again
    Stall,
}

#[derive(Debug, Clone)]
pub struct Step {
    pub delay_ms: u64,
    pub kind: StepKind,
}

impl Step {
    pub fn chunk(text: impl Into<String>) -> Self {
        Self {
            delay_ms: 0,
            kind: StepKind::Chunk(text.into()),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            delay_ms: 0,
            kind: StepKind::Error(message.into()),
        }
    }

    pub fn stall() -> Self {
        Self {
            delay_ms: 0,
            kind: StepKind::Stall,
        }
    }

    pub fn with_delay(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }
}

/// Answer to one `open_stream` call.
#[derive(Debug, Clone)]
pub enum Reply {
    Stream(Vec<Step>),
    Status { status: u16, message: String },
}

/// Chat backend that plays back one scripted reply per call.
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedBackend {
    pub fn new(steps: Vec<Step>) -> Arc<Self> {
        Self::with_replies(vec![Reply::Stream(steps)])
    }

    pub fn with_replies(replies: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn open_stream(&self, request: &ChatRequest) -> Result<TextStream, ChatError> {
        self.requests.lock().push(request.clone());
        let reply = self
            .replies
            .lock()
            .pop_front()
            .unwrap_or(Reply::Stream(Vec::new()));

        let steps = match reply {
            Reply::Status { status, message } => {
                return Err(ChatError::Upstream { status, message })
            }
            Reply::Stream(steps) => VecDeque::from(steps),
        };

        let stream = futures::stream::unfold(steps, |mut steps| async move {
            let step = steps.pop_front()?;
            if step.delay_ms > 0 {
                sleep(Duration::from_millis(step.delay_ms)).await;
            }
            match step.kind {
                StepKind::Chunk(text) => Some((Ok(text), steps)),
                StepKind::Error(message) => {
                    steps.clear();
                    Some((Err(ChatError::stream(message)), steps))
                }
                StepKind::Stall => futures::future::pending().await,
            }
        });
        Ok(Box::pin(stream))
    }
}

/// Image backend returning a fixed URL (or a fixed error) after a delay.
#[derive(Debug)]
pub struct ScriptedImages {
    delay_ms: u64,
    status: Option<u16>,
    calls: Mutex<Vec<ImageRequest>>,
}

impl ScriptedImages {
    pub fn ok() -> Arc<Self> {
        Arc::new(Self {
            delay_ms: 0,
            status: None,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(status: u16) -> Arc<Self> {
        Arc::new(Self {
            delay_ms: 0,
            status: Some(status),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn slow(delay_ms: u64) -> Arc<Self> {
        Arc::new(Self {
            delay_ms,
            status: None,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.lock().len()
    }
}

pub const SCRIPTED_IMAGE_URL: &str = "data:image/jpeg;base64,SU1H";

#[async_trait]
impl ImageBackend for ScriptedImages {
    async fn generate_image(&self, request: &ImageRequest) -> Result<String, ChatError> {
        self.calls.lock().push(request.clone());
        if self.delay_ms > 0 {
            sleep(Duration::from_millis(self.delay_ms)).await;
        }
        match self.status {
            Some(401) => Err(ChatError::Authentication {
                message: providers::image::AUTH_FAILED_MESSAGE.to_string(),
            }),
            Some(status) => Err(ChatError::Upstream {
                status,
                message: "Error de la API".into(),
            }),
            None => Ok(SCRIPTED_IMAGE_URL.to_string()),
        }
    }
}
