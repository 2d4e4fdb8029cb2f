//! The read-eval loop. Lines arrive over a channel so that `/parar` can be
//! read while an answer is still streaming.

use anyhow::{Context, Result};
use base64::Engine as _;
use chat_host::{ChatSession, FailedInput, TurnOutcome, UserInput};
use shared::personas::Persona;
use shared::ChatError;
use std::fs;
use std::path::Path;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::commands::{self, Command};

const BUSY_HINT: &str = "(espera a que Connie termine o escribe /parar)";

/// Read a document as text. Binary PDFs come through lossily; only
/// text-based files give useful answers.
fn read_document(path: &Path) -> Result<String> {
    let bytes = fs::read(path).with_context(|| format!("no se pudo leer {}", path.display()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn read_image_base64(path: &Path) -> Result<String> {
    let bytes = fs::read(path).with_context(|| format!("no se pudo leer {}", path.display()))?;
    Ok(base64::engine::general_purpose::STANDARD.encode(bytes))
}

fn print_persona_menu() {
    println!("Elige con quién quieres platicar:");
    for (i, persona) in Persona::menu().iter().enumerate() {
        println!("  {}. {}", i + 1, persona.label());
    }
}

fn report(result: Result<TurnOutcome, ChatError>) {
    if let Err(e) = result {
        println!("{}", e.user_message());
    }
}

async fn retry(session: &mut ChatSession) {
    let Some(input) = session.retry_input() else {
        println!("No hay nada que reintentar.");
        return;
    };
    let result = match input {
        FailedInput::Message(input) => session.send_message(input).await,
        FailedInput::MediaSummary { url, instruction } => {
            session.summarize_media(&url, instruction.as_deref()).await
        }
        FailedInput::Image { prompt } => draw(session, &prompt).await,
    };
    report(result);
}

async fn draw(session: &mut ChatSession, prompt: &str) -> Result<TurnOutcome, ChatError> {
    let outcome = session.generate_image(prompt).await?;
    if let Some(turn) = outcome.turn().and_then(|id| session.conversation().get(id)) {
        if let Some(url) = &turn.media_reference {
            let shown: String = url.chars().take(120).collect();
            println!("[imagen] {}{}", shown, if url.len() > shown.len() { "…" } else { "" });
        }
    }
    Ok(outcome)
}

/// Handle one command. Returns `false` when the user asked to quit.
async fn handle(session: &mut ChatSession, command: Command) -> bool {
    match command {
        Command::Ask(text) if text.is_empty() => {}
        Command::Ask(text) => report(session.send_message(UserInput::text(text)).await),
        Command::Persona(None) => print_persona_menu(),
        Command::Persona(Some(n)) => match Persona::menu().get(n - 1) {
            Some(persona) => report(session.start_persona(persona).await),
            None => print_persona_menu(),
        },
        Command::Pdf(path) => match read_document(&path) {
            Ok(text) => match session.attach_document(text) {
                Ok(()) => println!("Documento adjunto: {}", path.display()),
                Err(e) => println!("{}", e.user_message()),
            },
            Err(e) => println!("{:#}", e),
        },
        Command::DetachPdf => {
            session.detach_document();
            println!("Documento quitado.");
        }
        Command::Image { path, question } => match read_image_base64(&path) {
            Ok(image) => {
                let input = UserInput::text(question).with_image(image);
                report(session.send_message(input).await);
            }
            Err(e) => println!("{:#}", e),
        },
        Command::Video { url, instruction } => {
            report(session.summarize_media(&url, instruction.as_deref()).await)
        }
        Command::Draw(prompt) => report(draw(session, &prompt).await),
        Command::Stop => {
            if !session.abort() {
                println!("No hay ninguna respuesta en curso.");
            }
        }
        Command::Clear => session.clear(),
        Command::Retry => retry(session).await,
        Command::Help => println!("{}", commands::HELP),
        Command::Quit => return false,
    }
    true
}

/// Run commands until the channel closes or the user quits.
///
/// While a command is in flight only `/parar` and `/salir` are honoured;
/// anything else typed meanwhile is dropped, not queued.
pub async fn run(session: &mut ChatSession, mut lines: UnboundedReceiver<String>) {
    let cancel = session.cancel_handle();
    while let Some(line) = lines.recv().await {
        let command = match commands::parse(&line) {
            Ok(command) => command,
            Err(hint) => {
                println!("{}", hint);
                continue;
            }
        };

        let mut quit = false;
        let execution = handle(session, command);
        tokio::pin!(execution);
        let keep_going = loop {
            tokio::select! {
                keep_going = &mut execution => break keep_going,
                Some(line) = lines.recv() => match commands::parse(&line) {
                    Ok(Command::Stop) => {
                        cancel.abort();
                    }
                    Ok(Command::Quit) => {
                        quit = true;
                        cancel.abort();
                    }
                    _ => println!("{}", BUSY_HINT),
                },
            }
        };
        if quit || !keep_going {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use futures::{stream, StreamExt};
    use providers::{ChatBackend, TextStream};
    use shared::chat_api::{ChatRequest, TurnStatus};
    use shared::events::StreamState;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::sync::mpsc;
    use tokio::time::{sleep, Duration};

    /// Sends one chunk, then never finishes.
    #[derive(Default)]
    struct EndlessBackend {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ChatBackend for EndlessBackend {
        fn name(&self) -> &str {
            "endless"
        }

        async fn open_stream(&self, _request: &ChatRequest) -> Result<TextStream, ChatError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let first = stream::once(async { Ok::<_, ChatError>("La fotosíntesis ".to_string()) });
            Ok(Box::pin(first.chain(stream::pending())))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_typed_mid_stream_aborts() {
        let backend = Arc::new(EndlessBackend::default());
        let mut session = ChatSession::new(backend.clone());
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send("¿Qué es la fotosíntesis?".to_string()).unwrap();

        let typist = async move {
            sleep(Duration::from_millis(50)).await;
            tx.send("/parar".to_string()).unwrap();
        };
        tokio::join!(run(&mut session, rx), typist);

        assert_eq!(session.state(), StreamState::Aborted);
        let last = session.conversation().last().unwrap();
        assert_eq!(last.content, "La fotosíntesis ");
        assert_eq!(last.status, TurnStatus::Aborted);
        assert!(session.error().is_none());
        assert!(!session.cancel_handle().is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_question_typed_mid_stream_is_not_sent() {
        let backend = Arc::new(EndlessBackend::default());
        let mut session = ChatSession::new(backend.clone());
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send("¿Qué es la fotosíntesis?".to_string()).unwrap();

        let typist = async move {
            sleep(Duration::from_millis(20)).await;
            tx.send("¿Y la respiración?".to_string()).unwrap();
            sleep(Duration::from_millis(20)).await;
            tx.send("/parar".to_string()).unwrap();
        };
        tokio::join!(run(&mut session, rx), typist);

        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
        assert_eq!(session.conversation().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_quit_mid_stream_stops_and_exits() {
        let backend = Arc::new(EndlessBackend::default());
        let mut session = ChatSession::new(backend.clone());
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send("Cuéntame un cuento".to_string()).unwrap();

        let typist = async move {
            sleep(Duration::from_millis(30)).await;
            tx.send("/salir".to_string()).unwrap();
            tx.send("Otra pregunta".to_string()).unwrap();
            tx
        };
        let ((), _tx) = tokio::join!(run(&mut session, rx), typist);

        assert_eq!(session.state(), StreamState::Aborted);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }
}
