use regex::Regex;
use std::sync::LazyLock;

static CODE_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```(\w+)?\n((?s).*?)```").expect("valid code block regex"));
static LIST_BULLET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[-*+]\s+").expect("valid bullet regex"));

/// Normalize a finished answer: trimmed code-block bodies and `- ` bullets.
pub fn tidy_markdown(text: &str) -> String {
    let text = CODE_BLOCK.replace_all(text, |caps: &regex::Captures| {
        let lang = caps.get(1).map_or("", |m| m.as_str());
        format!("```{}\n{}\n```", lang, caps[2].trim())
    });
    LIST_BULLET.replace_all(&text, "- ").into_owned()
}
