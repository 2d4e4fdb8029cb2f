//! Parsing of the REPL's input lines.

use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Plain question for the tutor
    Ask(String),
    /// Show the persona menu, or pick entry `n` (1-based)
    Persona(Option<usize>),
    /// Attach a document; every question is answered from it until detached
    Pdf(PathBuf),
    DetachPdf,
    /// Ask about a photo
    Image { path: PathBuf, question: String },
    /// Summarize a video by URL
    Video {
        url: String,
        instruction: Option<String>,
    },
    /// Generate a picture
    Draw(String),
    Stop,
    Clear,
    Retry,
    Help,
    Quit,
}

pub const HELP: &str = "\
Comandos:
  /persona [n]            elegir un personaje (sin número muestra el menú)
  /pdf <ruta>             adjuntar un documento de texto
  /sinpdf                 quitar el documento
  /imagen <ruta> <texto>  preguntar sobre una foto
  /video <url> [texto]    resumir un video de YouTube
  /dibujo <descripción>   generar una imagen
  /parar                  detener la respuesta (o Ctrl-C)
  /limpiar                borrar la conversación
  /reintentar             repetir lo último que falló
  /salir                  terminar";

/// Parse one line. `Err` carries a usage hint for the student.
pub fn parse(line: &str) -> Result<Command, String> {
    let line = line.trim();
    let Some(rest) = line.strip_prefix('/') else {
        return Ok(Command::Ask(line.to_string()));
    };

    let (name, args) = match rest.split_once(char::is_whitespace) {
        Some((name, args)) => (name, args.trim()),
        None => (rest, ""),
    };

    match name {
        "persona" => {
            if args.is_empty() {
                return Ok(Command::Persona(None));
            }
            args.parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .map(|n| Command::Persona(Some(n)))
                .ok_or_else(|| "Uso: /persona [número]".to_string())
        }
        "pdf" if !args.is_empty() => Ok(Command::Pdf(PathBuf::from(args))),
        "pdf" => Err("Uso: /pdf <ruta>".into()),
        "sinpdf" => Ok(Command::DetachPdf),
        "imagen" => {
            let (path, question) = args
                .split_once(char::is_whitespace)
                .ok_or_else(|| "Uso: /imagen <ruta> <pregunta>".to_string())?;
            Ok(Command::Image {
                path: PathBuf::from(path),
                question: question.trim().to_string(),
            })
        }
        "video" if !args.is_empty() => {
            let (url, instruction) = match args.split_once(char::is_whitespace) {
                Some((url, text)) => (url, Some(text.trim().to_string())),
                None => (args, None),
            };
            Ok(Command::Video {
                url: url.to_string(),
                instruction,
            })
        }
        "video" => Err("Uso: /video <url> [instrucción]".into()),
        "dibujo" if !args.is_empty() => Ok(Command::Draw(args.to_string())),
        "dibujo" => Err("Uso: /dibujo <descripción>".into()),
        "parar" => Ok(Command::Stop),
        "limpiar" => Ok(Command::Clear),
        "reintentar" => Ok(Command::Retry),
        "ayuda" | "help" => Ok(Command::Help),
        "salir" | "quit" => Ok(Command::Quit),
        other => Err(format!("Comando desconocido: /{}. Escribe /ayuda.", other)),
    }
}
