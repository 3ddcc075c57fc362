use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::{bearer_token, GatewayError, UpstreamError};

const ENABLE_LOGS: bool = true;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RoutineBlock {
    pub title: String,
    pub start_time: String,
    pub end_time: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRequest {
    #[serde(default)]
    pub routine_blocks: Vec<RoutineBlock>,
    #[serde(default)]
    pub theme: Theme,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImageResponse {
    pub image_url: String,
    pub blocks_count: usize,
    pub theme: Theme,
}

/// Hosted image model. Returns its raw JSON response.
#[async_trait]
pub trait ImageUpstream: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<Value, UpstreamError>;
}

pub async fn handle_routine_image(
    authorization: Option<&str>,
    body: &str,
    upstream: &dyn ImageUpstream,
) -> Result<ImageResponse, GatewayError> {
    bearer_token(authorization)?;

    let request: ImageRequest = serde_json::from_str(body)
        .map_err(|err| GatewayError::InvalidInput(format!("Invalid request body: {err}")))?;
    if request.routine_blocks.is_empty() {
        return Err(GatewayError::InvalidInput(
            "routineBlocks must contain at least one block".into(),
        ));
    }

    let prompt = build_prompt(&request.routine_blocks, request.theme);
    let response = upstream.generate(&prompt).await.map_err(|err| {
        crate::log_error!("Image upstream failed: {err}");
        GatewayError::from(err)
    })?;

    let Some(image_url) = extract_image_url(&response) else {
        crate::log_error!("Image upstream response carried no image");
        return Err(GatewayError::Internal("No image was generated".into()));
    };

    Ok(ImageResponse {
        image_url,
        blocks_count: request.routine_blocks.len(),
        theme: request.theme,
    })
}

pub fn build_prompt(blocks: &[RoutineBlock], theme: Theme) -> String {
    let mut prompt = format!(
        "A clean, friendly daily routine timeline illustration in a {} theme. Blocks in order:",
        theme.as_str()
    );
    for block in blocks {
        prompt.push_str(&format!(
            "\n- {} to {}: {} ({})",
            block.start_time, block.end_time, block.title, block.kind
        ));
        if let Some(icon) = &block.icon {
            prompt.push_str(&format!(" {icon}"));
        }
    }
    prompt
}

/// Looks for `imageUrl`, then `data[0].url`, then `data[0].b64_json` as a
/// PNG data URL.
pub fn extract_image_url(response: &Value) -> Option<String> {
    if let Some(url) = response.get("imageUrl").and_then(Value::as_str) {
        return Some(url.to_string());
    }
    let first = response.get("data")?.get(0)?;
    if let Some(url) = first.get("url").and_then(Value::as_str) {
        return Some(url.to_string());
    }
    first
        .get("b64_json")
        .and_then(Value::as_str)
        .map(|encoded| format!("data:image/png;base64,{encoded}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    struct CannedImage {
        reply: Value,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ImageUpstream for CannedImage {
        async fn generate(&self, prompt: &str) -> Result<Value, UpstreamError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(self.reply.clone())
        }
    }

    struct BrokeImage;

    #[async_trait]
    impl ImageUpstream for BrokeImage {
        async fn generate(&self, _prompt: &str) -> Result<Value, UpstreamError> {
            Err(UpstreamError::Status {
                status: 402,
                message: "insufficient credits".into(),
            })
        }
    }

    fn canned(reply: Value) -> CannedImage {
        CannedImage {
            reply,
            prompts: Mutex::new(Vec::new()),
        }
    }

    const AUTH: Option<&str> = Some("Bearer t");

    const BODY: &str = r#"{
        "routineBlocks": [
            {"title": "Stretch", "startTime": "07:00", "endTime": "07:15", "type": "health", "icon": "🧘"},
            {"title": "Deep work", "startTime": "09:00", "endTime": "11:00", "type": "work"}
        ],
        "theme": "dark"
    }"#;

    #[tokio::test]
    async fn generates_image_for_blocks() {
        let upstream = canned(json!({ "data": [{ "url": "https://img.example/1.png" }] }));
        let response = handle_routine_image(AUTH, BODY, &upstream).await.unwrap();

        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({ "imageUrl": "https://img.example/1.png", "blocksCount": 2, "theme": "dark" })
        );
        let prompts = upstream.prompts.lock().unwrap();
        assert!(prompts[0].contains("dark theme"));
        assert!(prompts[0].contains("07:00 to 07:15: Stretch (health) 🧘"));
        assert!(prompts[0].contains("Deep work (work)"));
    }

    #[tokio::test]
    async fn empty_blocks_are_rejected() {
        let upstream = canned(json!({ "imageUrl": "x" }));
        let err = handle_routine_image(AUTH, r#"{"routineBlocks": [], "theme": "light"}"#, &upstream)
            .await
            .unwrap_err();
        assert_eq!(err.status(), 400);
        assert!(upstream.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn bad_theme_and_missing_auth() {
        let upstream = canned(json!({ "imageUrl": "x" }));
        let body = BODY.replace("\"dark\"", "\"sepia\"");
        assert_eq!(
            handle_routine_image(AUTH, &body, &upstream).await.unwrap_err().status(),
            400
        );
        assert_eq!(
            handle_routine_image(None, BODY, &upstream).await.unwrap_err(),
            GatewayError::Unauthorized
        );
    }

    #[tokio::test]
    async fn missing_image_is_an_internal_error() {
        let upstream = canned(json!({ "data": [] }));
        let err = handle_routine_image(AUTH, BODY, &upstream).await.unwrap_err();
        assert_eq!(err.status(), 500);
    }

    #[tokio::test]
    async fn quota_exhaustion_passes_through() {
        let err = handle_routine_image(AUTH, BODY, &BrokeImage).await.unwrap_err();
        assert_eq!(err, GatewayError::QuotaExhausted);
    }

    #[test]
    fn base64_payloads_become_data_urls() {
        let url = extract_image_url(&json!({ "data": [{ "b64_json": "AAAA" }] }));
        assert_eq!(url.as_deref(), Some("data:image/png;base64,AAAA"));
    }
}
