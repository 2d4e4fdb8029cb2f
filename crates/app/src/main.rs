mod commands;
mod render;
mod repl;

use anyhow::Result;
use chat_host::ChatSession;
use shared::settings::ChatSettings;
use std::io::BufRead;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

fn config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("com.local", "Connie", "Connie")
        .map(|proj| proj.config_dir().join("settings.json"))
}

fn load_settings_or_default() -> ChatSettings {
    let Some(path) = config_path() else {
        return ChatSettings::default();
    };
    if path.exists() {
        match ChatSettings::load_from(&path) {
            Ok(settings) => return settings,
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "unreadable settings, using defaults"),
        }
        return ChatSettings::default();
    }
    let settings = ChatSettings::default();
    if let Err(e) = settings.save_to(&path) {
        tracing::debug!(error = %e, "could not write default settings");
    }
    settings
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_env("CONNIE_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let settings = load_settings_or_default();
    let backend = providers::router::chat_backend(
        &settings.backend,
        settings.prompt.clone(),
        settings.generation.clone(),
    )
    .map_err(|e| anyhow::anyhow!(e.user_message()))?;
    let images = providers::router::image_backend(&settings.backend)
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;

    let mut session = ChatSession::new(backend).with_image_backend(images);
    tokio::spawn(render::run(session.subscribe()));

    // Ctrl-C stops the answer in progress instead of quitting
    let cancel = session.cancel_handle();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if !cancel.abort() {
                eprintln!("\n(escribe /salir para terminar)");
            }
        }
    });

    println!(
        "¡Hola! Soy {}, tu asistente educativo. Escribe tu pregunta o /ayuda.",
        settings.prompt.role
    );

    // Blocking stdin reads stay off the runtime
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "stdin closed");
                    break;
                }
            }
        }
    });
    repl::run(&mut session, rx).await;

    tracing::info!("bye");
    Ok(())
}
