//! Screening of picture descriptions before they reach the image backend.

use regex::Regex;
use shared::ChatError;
use std::sync::LazyLock;

pub const BLOCKED_PROMPT_MESSAGE: &str = "El contenido de tu solicitud no es apropiado para un entorno educativo. Por favor, utiliza solo descripciones seguras y aptas para estudiantes.";

/// Matched as substrings of the normalized prompt.
const BLACKLIST: &[&str] = &[
    "sangre",
    "sangriento",
    "gore",
    "cadaver",
    "decapit",
    "tortura",
    "suicid",
    "pistola",
    "rifle",
    "metralleta",
    "explosivo",
    "terroris",
    "droga",
    "cocaina",
    "marihuana",
    "cerveza",
    "cigarro",
    "desnud",
    "porno",
    "sexy",
    "sexual",
    "erotic",
    "lenceria",
    "naked",
    "weapon",
    "cocaine",
];

/// Harmless phrases that contain a blocked word. Removed before matching.
const SAFE_PHRASES: &[&str] = &["bomba de agua", "killer whale"];

/// Whole-word and phrase patterns that plain substrings would over- or under-match.
static BLACKLIST_REGEX: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\b(matar|matando|asesin\w*)\b",
        r"\b(arma|armas)\s+(de\s+fuego|blanca)",
        r"\b(gun|guns|kill\w*|murder\w*|nudes?)\b",
        r"\bsin\s+ropa\b",
        r"\bsex[oa]?\b",
        r"\b(bombas?|bombazo|blood|bloody)\b",
        r"\bbebidas?\s+alcoholicas?\b",
        r"\bborrach\w*",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("blacklist pattern is valid"))
    .collect()
});

/// Lowercase, strip accents, drop symbols, collapse whitespace.
pub fn normalize_prompt(text: &str) -> String {
    let folded: String = text
        .to_lowercase()
        .chars()
        .map(fold_accent)
        .map(|c| {
            if c.is_ascii_alphanumeric() || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn fold_accent(c: char) -> char {
    match c {
        'á' | 'à' | 'ä' | 'â' | 'ã' => 'a',
        'é' | 'è' | 'ë' | 'ê' => 'e',
        'í' | 'ì' | 'ï' | 'î' => 'i',
        'ó' | 'ò' | 'ö' | 'ô' | 'õ' => 'o',
        'ú' | 'ù' | 'ü' | 'û' => 'u',
        'ñ' => 'n',
        'ç' => 'c',
        other => other,
    }
}

pub fn is_blocked(prompt: &str) -> bool {
    let mut normalized = normalize_prompt(prompt);
    for phrase in SAFE_PHRASES {
        normalized = normalized.replace(phrase, " ");
    }
    BLACKLIST.iter().any(|word| normalized.contains(word))
        || BLACKLIST_REGEX.iter().any(|re| re.is_match(&normalized))
}

/// Reject prompts that are not suitable for students.
pub fn check_image_prompt(prompt: &str) -> Result<(), ChatError> {
    if is_blocked(prompt) {
        tracing::info!("image prompt rejected by content filter");
        return Err(ChatError::validation(BLOCKED_PROMPT_MESSAGE));
    }
    Ok(())
}
