//! Prints session events to the terminal as they arrive.

use shared::chat_api::{Role, TurnId};
use shared::events::{SessionEvent, StreamState};
use std::collections::HashMap;
use std::io::Write;
use tokio::sync::mpsc::UnboundedReceiver;

/// Tracks how much of each assistant turn has been printed.
#[derive(Debug, Default)]
pub struct Printer {
    printed: HashMap<TurnId, usize>,
}

impl Printer {
    /// Text to write for one event, if any.
    pub fn render(&mut self, event: &SessionEvent) -> Option<String> {
        match event {
            SessionEvent::TurnAppended {
                id,
                role: Role::Assistant,
            } => {
                self.printed.insert(*id, 0);
                Some("\nConnie: ".to_string())
            }
            SessionEvent::TurnAppended { .. } => None,
            SessionEvent::TurnUpdated { id, content } => {
                let done = self.printed.entry(*id).or_insert(0);
                let delta = content.get(*done..).unwrap_or_default().to_string();
                *done = content.len();
                (!delta.is_empty()).then_some(delta)
            }
            SessionEvent::StateChanged(StreamState::Aborted) => {
                Some("\n[respuesta detenida]\n".to_string())
            }
            SessionEvent::StateChanged(state) if state.is_terminal() => Some("\n".to_string()),
            SessionEvent::StateChanged(_) => None,
            SessionEvent::ErrorRaised { message } => {
                Some(format!("\n⚠ {}\n  (escribe /reintentar para intentarlo de nuevo)\n", message))
            }
            SessionEvent::Cleared => {
                self.printed.clear();
                Some("Conversación borrada.\n".to_string())
            }
        }
    }
}

/// Drain events until the session is dropped.
pub async fn run(mut events: UnboundedReceiver<SessionEvent>) {
    let mut printer = Printer::default();
    while let Some(event) = events.recv().await {
        if let Some(text) = printer.render(&event) {
            let mut out = std::io::stdout().lock();
            let _ = out.write_all(text.as_bytes());
            let _ = out.flush();
        }
    }
}
