//! Start-menu personas. Picking one seeds the chat with an opening prompt.

use serde::{Deserialize, Serialize};

/// Personality tone for a custom assistant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PersonalityTone {
    #[default]
    Amigable,
    Divertido,
    Serio,
    Curioso,
}

impl PersonalityTone {
    pub fn as_str(&self) -> &'static str {
        match self {
            PersonalityTone::Amigable => "amigable",
            PersonalityTone::Divertido => "divertido",
            PersonalityTone::Serio => "serio",
            PersonalityTone::Curioso => "curioso",
        }
    }
}

/// Configuration entered for a "create your own assistant" persona
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssistantProfile {
    pub name: String,
    pub interests: String,
    #[serde(default)]
    pub tone: PersonalityTone,
}

/// School level for English practice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SchoolLevel {
    #[default]
    Preescolar,
    Primaria,
    Secundaria,
}

impl SchoolLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchoolLevel::Preescolar => "preescolar",
            SchoolLevel::Primaria => "primaria",
            SchoolLevel::Secundaria => "secundaria",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnglishPractice {
    pub level: SchoolLevel,
    /// Empty means "any topic".
    #[serde(default)]
    pub topic: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Persona {
    Frida,
    Einstein,
    Juarez,
    /// `None` until the setup form has been filled in
    CustomAssistant { profile: Option<AssistantProfile> },
    English { practice: Option<EnglishPractice> },
    EmotionsGame,
    General,
}

impl Persona {
    /// Entries of the start menu, in display order.
    pub fn menu() -> Vec<Persona> {
        vec![
            Persona::Frida,
            Persona::Einstein,
            Persona::Juarez,
            Persona::CustomAssistant { profile: None },
            Persona::English { practice: None },
            Persona::EmotionsGame,
        ]
    }

    pub fn label(&self) -> &'static str {
        match self {
            Persona::Frida => "Frida Kahlo",
            Persona::Einstein => "Einstein",
            Persona::Juarez => "Benito Juárez",
            Persona::CustomAssistant { .. } => "Crea tu propio asistente",
            Persona::English { .. } => "Practica Inglés",
            Persona::EmotionsGame => "Juego de Emociones",
            Persona::General => "Asistente educativo",
        }
    }

    /// Personas that show a setup form before the chat starts.
    pub fn requires_setup(&self) -> bool {
        matches!(
            self,
            Persona::CustomAssistant { .. } | Persona::English { .. } | Persona::EmotionsGame
        )
    }

    /// The first message sent on the student's behalf when the persona is picked.
    pub fn opening_prompt(&self) -> String {
        match self {
            Persona::Frida => "Eres Frida Kahlo, la famosa pintora mexicana. Responde como si fueras ella, usando un lenguaje inspirador, creativo y hablando de arte, emociones y cultura mexicana. Ayuda a los niños a aprender sobre tu vida y obra.".to_string(),
            Persona::Einstein => "Eres Albert Einstein, el científico más famoso del siglo XX. Responde como si fueras él, usando un lenguaje sencillo, curioso y motivando a los niños a hacer preguntas sobre ciencia, física y el universo.".to_string(),
            Persona::Juarez => "Eres Benito Juárez, presidente y líder histórico de México. Responde como si fueras él, hablando de historia, valores, justicia y superación. Motiva a los niños a aprender sobre la historia de México.".to_string(),
            Persona::CustomAssistant { profile: Some(profile) } => format!(
                "Eres un asistente virtual llamado {}. Tus intereses principales son: {}. Tu tono de personalidad es {}. Tu misión es ayudar a niños y jóvenes a aprender de forma divertida, clara y segura. Responde siempre con empatía, creatividad y usando ejemplos sencillos.",
                profile.name,
                profile.interests,
                profile.tone.as_str()
            ),
            Persona::CustomAssistant { profile: None } => {
                "Eres un asistente virtual para niños. Responde de forma divertida y clara.".to_string()
            }
            Persona::English { practice: Some(practice) } => {
                let topic = if practice.topic.trim().is_empty() {
                    "cualquier tema de interés para niños"
                } else {
                    practice.topic.as_str()
                };
                format!(
                    "Eres un maestro de inglés para el nivel {}. El tema principal es: {}. Habla en inglés sencillo, motiva a los estudiantes, corrige errores suavemente y haz preguntas para practicar. Usa frases cortas y vocabulario apropiado para el nivel.",
                    practice.level.as_str(),
                    topic
                )
            }
            Persona::English { practice: None } => {
                "Eres un maestro de inglés para niños. Habla en inglés sencillo y motiva a los estudiantes.".to_string()
            }
            Persona::EmotionsGame => "Vamos a jugar a identificar emociones. Presenta situaciones cotidianas para niños y pide que el usuario diga cómo se siente y qué haría para ayudar. Da retroalimentación positiva y explica la importancia de la empatía.".to_string(),
            Persona::General => "Eres un asistente educativo. Ayuda a los niños a aprender y responde de forma clara y amigable.".to_string(),
        }
    }
}
