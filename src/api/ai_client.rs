// src/api/ai_client.rs
//
// Narrow wrapper around the external LLM gateway (OpenAI-compatible
// chat-completions surface). All medical "intelligence" lives behind this
// boundary; the backend only builds prompts and relays answers.

use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("gateway error status={status} body={body}")]
    Api { status: u16, body: String },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: String,
}

/// Sends a system + user prompt pair and returns the assistant text.
pub async fn complete(
    gateway_url: &str,
    api_key: &str,
    model: &str,
    system_prompt: &str,
    user_content: Value,
) -> Result<String, AiError> {
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{gateway_url}/v1/chat/completions"))
        .bearer_auth(api_key)
        .json(&json!({
            "model": model,
            "messages": [
                { "role": "system", "content": system_prompt },
                { "role": "user", "content": user_content },
            ],
        }))
        .send()
        .await?;

    let status = resp.status();
    let body = resp.text().await?;

    if !status.is_success() {
        return Err(AiError::Api {
            status: status.as_u16(),
            body,
        });
    }

    let parsed = serde_json::from_str::<ChatResponse>(&body)
        .map_err(|e| AiError::InvalidResponse(format!("{e}; body={body}")))?;

    parsed
        .choices
        .into_iter()
        .next()
        .map(|c| c.message.content)
        .ok_or_else(|| AiError::InvalidResponse("empty choices".into()))
}

/// Models are asked for strict JSON but occasionally wrap it in markdown
/// fences or prose; fall back to the raw text when parsing fails.
pub fn parse_result(content: &str) -> Value {
    let trimmed = content
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    serde_json::from_str::<Value>(trimmed).unwrap_or_else(|_| json!({ "text": content }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_json() {
        let v = parse_result(r#"{"analysis": "ok", "recommendations": []}"#);
        assert_eq!(v["analysis"], "ok");
    }

    #[test]
    fn strips_markdown_fences() {
        let v = parse_result("```json\n{\"analysis\": \"fenced\"}\n```");
        assert_eq!(v["analysis"], "fenced");
    }

    #[test]
    fn falls_back_to_raw_text() {
        let v = parse_result("The patient should rest.");
        assert_eq!(v["text"], "The patient should rest.");
    }
}
