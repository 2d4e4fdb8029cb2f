//! Error taxonomy shared by the backends and the chat session.

/// Everything that can go wrong while handling one chat turn.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// Rejected before any network call.
    #[error("Invalid input: {message}")]
    Validation { message: String },

    #[error("Backend returned {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// The user cancelled the request.
    #[error("Request aborted")]
    Aborted,

    #[error("Stream interrupted: {message}")]
    Stream { message: String },

    #[error(transparent)]
    Unknown(#[from] anyhow::Error),
}

impl ChatError {
    pub fn validation(message: impl Into<String>) -> Self {
        ChatError::Validation {
            message: message.into(),
        }
    }

    pub fn stream(message: impl Into<String>) -> Self {
        ChatError::Stream {
            message: message.into(),
        }
    }

    pub fn is_abort(&self) -> bool {
        matches!(self, ChatError::Aborted)
    }

    /// Whether this error belongs in the user-visible error slot.
    pub fn is_surfaced(&self) -> bool {
        !matches!(self, ChatError::Aborted | ChatError::Validation { .. })
    }

    /// Friendly text for the error panel.
    pub fn user_message(&self) -> String {
        match self {
            ChatError::Validation { message } => message.clone(),
            ChatError::Authentication { message } => message.clone(),
            ChatError::Upstream { status: 429, .. } => {
                "El servicio está muy ocupado. Espera un momento y vuelve a intentarlo.".to_string()
            }
            ChatError::Upstream { status, message } if message.trim().is_empty() => {
                format!("El servicio respondió con un error ({}). Inténtalo de nuevo.", status)
            }
            ChatError::Upstream { message, .. } => message.clone(),
            ChatError::Aborted => "Generación cancelada".to_string(),
            ChatError::Stream { .. } => {
                "Se perdió la conexión mientras llegaba la respuesta. Inténtalo de nuevo.".to_string()
            }
            ChatError::Unknown(_) => "Error desconocido. Inténtalo de nuevo.".to_string(),
        }
    }
}
