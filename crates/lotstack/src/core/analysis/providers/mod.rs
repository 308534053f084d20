//! Vision Analysis Providers
//!
//! Concrete implementations of the AnalysisAdapter trait.

mod openai;

pub use openai::OpenAIVisionAnalysis;

use serde::{Deserialize, Serialize};

// =============================================================================
// Provider Configuration
// =============================================================================

/// Connection settings for a hosted vision endpoint.
///
/// `openai(..)` targets the public OpenAI API; point `base_url` at any
/// OpenAI-compatible server (Ollama, llama.cpp, vLLM) to analyze with a
/// local model instead.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisionProviderConfig {
    /// Bearer token, when the endpoint requires one
    pub api_key: Option<String>,
    /// Endpoint base; `None` selects the provider's default
    pub base_url: Option<String>,
    /// Model identifier sent with every request
    pub model: String,
    /// HTTP request timeout in seconds
    pub timeout_secs: u64,
}

impl VisionProviderConfig {
    /// Config for the hosted OpenAI API with the default vision model
    pub fn openai(api_key: &str) -> Self {
        Self {
            api_key: Some(api_key.to_string()),
            base_url: None,
            model: "gpt-5.2".to_string(),
            timeout_secs: 120,
        }
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = Some(url.to_string());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openai_defaults_target_the_hosted_api() {
        let config = VisionProviderConfig::openai("test-key");

        assert_eq!(config.api_key.as_deref(), Some("test-key"));
        assert_eq!(config.model, "gpt-5.2");
        assert_eq!(config.timeout_secs, 120);
        assert!(config.base_url.is_none());
    }

    #[test]
    fn builders_override_model_and_endpoint() {
        let config = VisionProviderConfig::openai("key")
            .with_model("llava")
            .with_base_url("http://localhost:11434/v1");

        assert_eq!(config.model, "llava");
        assert_eq!(
            config.base_url.as_deref(),
            Some("http://localhost:11434/v1")
        );
    }
}
