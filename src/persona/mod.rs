pub mod accessories;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tracing::warn;

/// Generated character for one submission: the packaging title, the packaging quote,
/// and the model-authored visual description used for prompt construction.
#[derive(Debug, Clone)]
pub struct Persona {
    pub title: String,
    pub quote: String,
    pub visual_prompt: String,
}

#[derive(Debug, Deserialize)]
struct PersonaResponse {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    quote: Option<String>,
    #[serde(default)]
    visual_prompt: Option<String>,
}

static CODE_FENCE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^```[a-zA-Z]*\s*(.*?)\s*```$").expect("valid code fence regex")
});

/// Models occasionally wrap their JSON in a Markdown code fence even when asked for a
/// raw object; unwrap it before parsing.
fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    match CODE_FENCE_RE.captures(trimmed) {
        Some(caps) => caps.get(1).map(|m| m.as_str()).unwrap_or(trimmed),
        None => trimmed,
    }
}

/// Parses the persona JSON out of a chat-completion response. Returns `None` when the
/// payload is unparseable or missing a usable title or quote, so the caller can fall
/// back to the templated persona.
pub fn parse_persona_response(raw: &str) -> Option<Persona> {
    let cleaned = strip_code_fences(raw);
    let parsed: PersonaResponse = match serde_json::from_str(cleaned) {
        Ok(value) => value,
        Err(err) => {
            warn!("Failed to parse persona JSON: {err}");
            return None;
        }
    };

    let title = parsed.title.as_deref().unwrap_or("").trim().to_string();
    let quote = parsed.quote.as_deref().unwrap_or("").trim().to_string();
    if title.is_empty() || quote.is_empty() {
        warn!("Persona response missing title or quote");
        return None;
    }

    Some(Persona {
        title,
        quote,
        visual_prompt: parsed
            .visual_prompt
            .as_deref()
            .unwrap_or("")
            .trim()
            .to_string(),
    })
}

/// Deterministic persona built from the raw form inputs, used when the model response
/// cannot be parsed.
pub fn fallback_persona(role: &str, pain_point: &str, personality: &str) -> Persona {
    Persona {
        title: format!("Captain {personality}"),
        quote: format!("I'll solve your {pain_point} problems with my {personality} powers!"),
        visual_prompt: format!(
            "A colorful action figure of a {role} superhero with {personality} themed costume and accessories."
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_json_persona() {
        let persona = parse_persona_response(
            r#"{"title": "The Duplicator", "quote": "Twice the contacts!", "visual_prompt": "toy"}"#,
        )
        .expect("persona should parse");
        assert_eq!(persona.title, "The Duplicator");
        assert_eq!(persona.quote, "Twice the contacts!");
        assert_eq!(persona.visual_prompt, "toy");
    }

    #[test]
    fn unwraps_markdown_code_fences() {
        let raw = "```json\n{\"title\": \"The Data Dynamo\", \"quote\": \"Refresh!\"}\n```";
        let persona = parse_persona_response(raw).expect("fenced persona should parse");
        assert_eq!(persona.title, "The Data Dynamo");
        assert_eq!(persona.visual_prompt, "");
    }

    #[test]
    fn rejects_garbage_and_incomplete_payloads() {
        assert!(parse_persona_response("not json at all").is_none());
        assert!(parse_persona_response(r#"{"title": "No Quote"}"#).is_none());
        assert!(parse_persona_response(r#"{"title": "  ", "quote": "x"}"#).is_none());
    }

    #[test]
    fn fallback_persona_is_deterministic() {
        let first = fallback_persona("Grant Writer", "data entry", "Micromanager");
        let second = fallback_persona("Grant Writer", "data entry", "Micromanager");
        assert_eq!(first.title, second.title);
        assert_eq!(first.title, "Captain Micromanager");
        assert_eq!(
            first.quote,
            "I'll solve your data entry problems with my Micromanager powers!"
        );
        assert_eq!(first.quote, second.quote);
    }
}
