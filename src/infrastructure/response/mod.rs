use once_cell::sync::Lazy;
use regex::Regex;

static THINK_TAG_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<think>[\s\S]*?</think>|<think\s*/>").unwrap());

static FENCED_JSON_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```(?:json|JSON)?\s*\n([\s\S]*?)\n?```").unwrap());

/// Strip reasoning blocks some vision models emit before the answer.
pub fn clean_model_output(response: &str) -> String {
    THINK_TAG_PATTERN.replace_all(response, "").trim().to_string()
}

/// The JSON payload of a model answer: a fenced block when present, else the outermost object.
pub fn extract_json_payload(response: &str) -> String {
    let cleaned = clean_model_output(response);

    if let Some(caps) = FENCED_JSON_PATTERN.captures(&cleaned) {
        return caps[1].trim().to_string();
    }

    match (cleaned.find('{'), cleaned.rfind('}')) {
        (Some(start), Some(end)) if end > start => cleaned[start..=end].to_string(),
        _ => cleaned,
    }
}
