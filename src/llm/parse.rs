use serde::de::DeserializeOwned;
use thiserror::Error;

/// The model was asked for raw JSON but returned something else.
#[derive(Debug, Error)]
#[error("failed to parse AI response: {0}")]
pub struct MalformedAiResponse(pub String);

/// Remove leading/trailing Markdown code-fence markers. Models routinely wrap
/// JSON answers in ```` ```json ```` blocks despite instructions not to, so
/// every handler that parses model output goes through this first.
pub fn strip_code_fence(raw: &str) -> &str {
    let mut text = raw.trim();
    for prefix in ["```json", "```JSON", "```"] {
        if let Some(rest) = text.strip_prefix(prefix) {
            text = rest;
            break;
        }
    }
    text = text.trim_start();
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

/// Parse possibly-fenced model output into `T`, or the typed malformed-AI
/// error. Fenced and unfenced payloads parse identically.
pub fn parse_fenced_json<T: DeserializeOwned>(raw: &str) -> Result<T, MalformedAiResponse> {
    let cleaned = strip_code_fence(raw);
    serde_json::from_str(cleaned).map_err(|err| MalformedAiResponse(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fenced_and_unfenced_parse_identically() {
        let unfenced: Vec<i64> = parse_fenced_json("[1,2,3]").expect("unfenced");
        let fenced: Vec<i64> = parse_fenced_json("```json\n[1,2,3]\n```").expect("fenced");
        let bare_fence: Vec<i64> = parse_fenced_json("```\n[1,2,3]\n```").expect("bare fence");
        assert_eq!(unfenced, fenced);
        assert_eq!(unfenced, bare_fence);
    }

    #[test]
    fn strips_uppercase_fence_label() {
        assert_eq!(strip_code_fence("```JSON\n{}\n```"), "{}");
    }

    #[test]
    fn leaves_plain_text_untouched() {
        assert_eq!(strip_code_fence("  {\"a\": 1} "), "{\"a\": 1}");
    }

    #[test]
    fn non_json_is_a_typed_error() {
        let err = parse_fenced_json::<Vec<String>>("Sure! Here are some ideas:")
            .expect_err("prose should not parse");
        assert!(err.to_string().starts_with("failed to parse AI response"));
    }

    #[test]
    fn object_payloads_survive_fencing() {
        #[derive(serde::Deserialize)]
        struct Probe {
            keyword: String,
        }
        let probe: Probe =
            parse_fenced_json("```json\n{\"keyword\": \"matcha\"}\n```").expect("probe");
        assert_eq!(probe.keyword, "matcha");
    }
}
