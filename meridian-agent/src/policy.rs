use crate::llm::CollaboratorError;
use async_trait::async_trait;
use meridian_shared::app_config::CollaboratorConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One scored excerpt from the policy knowledge base.
#[derive(Debug, Clone, Serialize)]
pub struct PolicyChunk {
    pub content: String,
    pub category: String,
    pub similarity: f64,
}

/// Seam for the vector-search collaborator. Lookup failures degrade to an
/// empty result at the call site — policy context is garnish, never load-
/// bearing.
#[async_trait]
pub trait PolicyIndex: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<PolicyChunk>, CollaboratorError>;
}

#[derive(Debug, Serialize)]
struct PolicyQuery<'a> {
    query: &'a str,
}

#[derive(Debug, Deserialize)]
struct RawPolicyResponse {
    #[serde(rename = "policyChunks", default)]
    policy_chunks: Vec<RawChunk>,
}

#[derive(Debug, Deserialize)]
struct RawChunk {
    content: String,
    metadata: RawChunkMetadata,
    similarity: f64,
}

#[derive(Debug, Deserialize)]
struct RawChunkMetadata {
    #[serde(default)]
    category: String,
}

pub struct HttpPolicyIndex {
    client: reqwest::Client,
    url: String,
}

impl HttpPolicyIndex {
    pub fn new(config: &CollaboratorConfig) -> Result<Self, CollaboratorError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CollaboratorError::Config(e.to_string()))?;
        Ok(Self {
            client,
            url: config.policy_search_url.clone(),
        })
    }
}

#[async_trait]
impl PolicyIndex for HttpPolicyIndex {
    async fn search(&self, query: &str) -> Result<Vec<PolicyChunk>, CollaboratorError> {
        let response = self
            .client
            .post(&self.url)
            .json(&PolicyQuery { query })
            .send()
            .await
            .map_err(|e| CollaboratorError::Http(e.to_string()))?;

        if !response.status().is_success() {
            return Err(CollaboratorError::Http(format!(
                "policy search returned {}",
                response.status()
            )));
        }

        let raw: RawPolicyResponse = response
            .json()
            .await
            .map_err(|e| CollaboratorError::Protocol(e.to_string()))?;

        Ok(raw
            .policy_chunks
            .into_iter()
            .map(|chunk| PolicyChunk {
                content: chunk.content,
                category: chunk.metadata.category,
                similarity: chunk.similarity,
            })
            .collect())
    }
}

/// No-op index for tests and offline runs.
pub struct NullPolicyIndex;

#[async_trait]
impl PolicyIndex for NullPolicyIndex {
    async fn search(&self, _query: &str) -> Result<Vec<PolicyChunk>, CollaboratorError> {
        Ok(Vec::new())
    }
}

/// Render retrieved chunks into the context block the chat model sees.
/// Empty input renders to an empty string, not a placeholder.
pub fn context_injection(chunks: &[PolicyChunk]) -> String {
    if chunks.is_empty() {
        return String::new();
    }
    let mut lines = vec!["Relevant policy excerpts:".to_string()];
    for chunk in chunks.iter().take(3) {
        lines.push(format!("- [{}] {}", chunk.category, chunk.content));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_shape_parses() {
        let raw: RawPolicyResponse = serde_json::from_str(
            r#"{
                "policyChunks": [
                    {
                        "content": "Bags over 50lb incur a fee.",
                        "metadata": {"category": "baggage"},
                        "similarity": 0.91
                    }
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(raw.policy_chunks.len(), 1);
        assert_eq!(raw.policy_chunks[0].metadata.category, "baggage");
    }

    #[test]
    fn test_empty_response_parses() {
        let raw: RawPolicyResponse = serde_json::from_str("{}").unwrap();
        assert!(raw.policy_chunks.is_empty());
    }

    #[test]
    fn test_context_injection_formats() {
        let chunks = vec![PolicyChunk {
            content: "Refunds post within 7 business days.".to_string(),
            category: "refunds".to_string(),
            similarity: 0.8,
        }];
        let injected = context_injection(&chunks);
        assert!(injected.contains("[refunds]"));
        assert_eq!(context_injection(&[]), "");
    }
}
