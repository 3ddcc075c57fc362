use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::{bearer_token, GatewayError, UpstreamError};

const ENABLE_LOGS: bool = true;

pub const MAX_QUERY_CHARS: usize = 500;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SearchType {
    #[default]
    Google,
    Youtube,
    News,
    Realtime,
}

impl SearchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchType::Google => "google",
            SearchType::Youtube => "youtube",
            SearchType::News => "news",
            SearchType::Realtime => "realtime",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub query: String,
    #[serde(default, rename = "type")]
    pub kind: SearchType,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SearchResponse {
    pub results: Vec<Value>,
    #[serde(rename = "type")]
    pub kind: SearchType,
}

/// Hosted model that answers a search prompt with free-form text, which is
/// expected (but not guaranteed) to hold a JSON list of results.
#[async_trait]
pub trait SearchUpstream: Send + Sync {
    async fn search(&self, query: &str, kind: SearchType) -> Result<String, UpstreamError>;
}

/// Auth first, then body validation, then the upstream call.
pub async fn handle_search(
    authorization: Option<&str>,
    body: &str,
    upstream: &dyn SearchUpstream,
) -> Result<SearchResponse, GatewayError> {
    bearer_token(authorization)?;

    let request: SearchRequest = serde_json::from_str(body)
        .map_err(|err| GatewayError::InvalidInput(format!("Invalid request body: {err}")))?;
    let query = validate_query(&request.query)?;

    let content = upstream.search(query, request.kind).await.map_err(|err| {
        crate::log_error!("Search upstream failed for {}: {err}", request.kind.as_str());
        GatewayError::from(err)
    })?;

    Ok(SearchResponse {
        results: parse_results(&content),
        kind: request.kind,
    })
}

fn validate_query(query: &str) -> Result<&str, GatewayError> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return Err(GatewayError::InvalidInput("Query is required".into()));
    }
    if trimmed.chars().count() > MAX_QUERY_CHARS {
        return Err(GatewayError::InvalidInput(format!(
            "Query must be at most {MAX_QUERY_CHARS} characters"
        )));
    }
    Ok(trimmed)
}

/// Accepts a bare array, an object with a `results` array, or either wrapped
/// in a fenced code block. Anything else yields no results.
pub fn parse_results(content: &str) -> Vec<Value> {
    let body = strip_code_fence(content.trim());
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Array(items)) => items,
        Ok(Value::Object(mut map)) => match map.remove("results") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        Ok(_) => Vec::new(),
        Err(err) => {
            crate::log_warn!("Search content was not JSON, returning no results: {err}");
            Vec::new()
        }
    }
}

fn strip_code_fence(content: &str) -> &str {
    let Some(rest) = content.strip_prefix("```") else {
        return content;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
