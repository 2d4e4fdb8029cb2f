//! Prompt templates for the tutor.
//!
//! Every builder here is plain string interpolation: the same inputs always
//! produce the same bytes, so the templates can be asserted on directly.

use serde::{Deserialize, Serialize};

use crate::chat_api::{HistoryEntry, Role};

/// Instruction used when a media summary request comes without one.
pub const DEFAULT_MEDIA_INSTRUCTION: &str = "Resume el siguiente video de YouTube:";

/// Who the assistant is and how it speaks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptConfig {
    pub role: String,
    pub tone: String,
    #[serde(default)]
    pub context: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            role: "Connie".into(),
            tone: "amigable y educativo".into(),
            context: String::new(),
        }
    }
}

/// Inputs for the main tutoring template.
#[derive(Debug, Clone, Copy)]
pub struct PromptInput<'a> {
    pub config: &'a PromptConfig,
    /// Serialized prior conversation, see [`serialize_history`].
    pub history: Option<&'a str>,
    pub question: &'a str,
    /// The question is about an attached image.
    pub has_media: bool,
}

/// Build the tutoring prompt sent to the model for one student question.
pub fn build_prompt(input: &PromptInput<'_>) -> String {
    let mut prompt = format!(
        r#"Responde como "{role}", un asistente educativo diseñado para ayudar a estudiantes de preescolar, primaria y secundaria.
Explica los temas de forma clara, con ejemplos sencillos y con buena gramática.
Mantén un tono {tone} y evita temas fuera del ámbito escolar.
"#,
        role = input.config.role,
        tone = input.config.tone,
    );

    let context = input.config.context.trim();
    if !context.is_empty() {
        prompt.push('\n');
        prompt.push_str(context);
        prompt.push('\n');
    }

    if let Some(history) = input.history.filter(|h| !h.trim().is_empty()) {
        prompt.push_str("\nContexto de la conversación anterior:\n");
        prompt.push_str(history);
        prompt.push('\n');
    }

    if input.has_media {
        prompt.push_str(&format!(
            "\nAnaliza la imagen proporcionada y responde a la siguiente pregunta: \"{}\"",
            input.question
        ));
    } else {
        prompt.push_str(&format!("\nPregunta del estudiante: \"{}\"", input.question));
    }

    prompt
}

/// One line per turn: `Estudiante: ...` or `Asistente: ...`.
pub fn serialize_history(history: &[HistoryEntry]) -> String {
    history
        .iter()
        .map(|entry| {
            let speaker = match entry.role {
                Role::User => "Estudiante",
                Role::Assistant => "Asistente",
            };
            format!("{}: {}", speaker, entry.content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Prompt for questions that must be answered from an attached document.
pub fn build_document_prompt(question: &str, document_text: &str, history: &[HistoryEntry]) -> String {
    let history_section = if history.is_empty() {
        String::new()
    } else {
        format!(
            "\nHistorial de la conversación:\n{}\n",
            serialize_history(history)
        )
    };

    format!(
        r#"Eres un asistente especializado en analizar documentos PDF.
Contexto del documento:
{document_text}
{history_section}
Pregunta del usuario: {question}

Por favor, responde basándote en el contenido del PDF.
Si la pregunta está fuera del contexto del documento, indícalo amablemente."#,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(role: Role, content: &str) -> HistoryEntry {
        HistoryEntry {
            role,
            content: content.to_string(),
            media_url: None,
        }
    }

    #[test]
    fn test_minimal_prompt_is_exact() {
        let config = PromptConfig::default();
        let prompt = build_prompt(&PromptInput {
            config: &config,
            history: None,
            question: "¿Qué es la fotosíntesis?",
            has_media: false,
        });

        let expected = "Responde como \"Connie\", un asistente educativo diseñado para ayudar a estudiantes de preescolar, primaria y secundaria.\n\
Explica los temas de forma clara, con ejemplos sencillos y con buena gramática.\n\
Mantén un tono amigable y educativo y evita temas fuera del ámbito escolar.\n\
\n\
Pregunta del estudiante: \"¿Qué es la fotosíntesis?\"";
        assert_eq!(prompt, expected);
    }

    #[test]
    fn test_optional_sections_appear_in_order() {
        let config = PromptConfig {
            role: "Einstein".into(),
            tone: "curioso".into(),
            context: "Habla de física.".into(),
        };
        let history = serialize_history(&[
            entry(Role::User, "Hola"),
            entry(Role::Assistant, "¡Hola!"),
        ]);
        let prompt = build_prompt(&PromptInput {
            config: &config,
            history: Some(&history),
            question: "¿Qué ves?",
            has_media: true,
        });

        let context_at = prompt.find("Habla de física.").unwrap();
        let history_at = prompt
            .find("Contexto de la conversación anterior:\nEstudiante: Hola\nAsistente: ¡Hola!")
            .unwrap();
        let question_at = prompt
            .find("Analiza la imagen proporcionada y responde a la siguiente pregunta: \"¿Qué ves?\"")
            .unwrap();
        assert!(context_at < history_at && history_at < question_at);
        assert!(!prompt.contains("Pregunta del estudiante"));
    }

    #[test]
    fn test_blank_history_is_omitted() {
        let config = PromptConfig::default();
        let input = PromptInput {
            config: &config,
            history: Some("   "),
            question: "hola",
            has_media: false,
        };
        assert!(!build_prompt(&input).contains("Contexto de la conversación"));
        assert_eq!(build_prompt(&input), build_prompt(&input));
    }

    #[test]
    fn test_document_prompt() {
        let prompt = build_document_prompt("¿De qué trata?", "Capítulo 1: ...", &[]);
        assert!(prompt.contains("Contexto del documento:\nCapítulo 1: ...\n"));
        assert!(prompt.contains("Pregunta del usuario: ¿De qué trata?"));
        assert!(!prompt.contains("Historial"));

        let prompt =
            build_document_prompt("¿Y luego?", "texto", &[entry(Role::User, "¿De qué trata?")]);
        assert!(prompt.contains("Historial de la conversación:\nEstudiante: ¿De qué trata?"));
    }
}
