use llm::builder::{LLMBackend, LLMBuilder};
use llm::chat::ChatMessage;

use nazuke_core::AiSettings;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
    #[error("build LLM: {0}")]
    Build(String),
    #[error("chat: {0}")]
    Chat(String),
    #[error("LLM returned empty text")]
    EmptyResponse,
    #[error("LLM did not answer within {0}s")]
    Timeout(u64),
}

fn map_backend(provider: &str) -> Result<LLMBackend, EngineError> {
    match provider {
        "openai" => Ok(LLMBackend::OpenAI),
        "anthropic" => Ok(LLMBackend::Anthropic),
        "google" => Ok(LLMBackend::Google),
        "ollama" => Ok(LLMBackend::Ollama),
        "groq" => Ok(LLMBackend::Groq),
        "mistral" => Ok(LLMBackend::Mistral),
        "deepseek" => Ok(LLMBackend::DeepSeek),
        other => Err(EngineError::UnknownProvider(other.to_string())),
    }
}

/// Send one user message and return the model's text reply.
pub async fn generate(
    settings: &AiSettings,
    system: &str,
    user_msg: &str,
) -> Result<String, EngineError> {
    let backend = map_backend(&settings.provider)?;

    let mut builder = LLMBuilder::new()
        .backend(backend)
        .model(&settings.model)
        .system(system);

    if !settings.api_key.is_empty() {
        builder = builder.api_key(&settings.api_key);
    }

    let llm = builder.build().map_err(|e| EngineError::Build(e.to_string()))?;

    let messages = vec![ChatMessage::user().content(user_msg).build()];

    let response = llm
        .chat(&messages)
        .await
        .map_err(|e| EngineError::Chat(e.to_string()))?;

    match response.text() {
        Some(text) if !text.trim().is_empty() => Ok(text),
        _ => Err(EngineError::EmptyResponse),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_providers_map() {
        for provider in ["openai", "anthropic", "google", "ollama", "groq", "mistral", "deepseek"] {
            assert!(map_backend(provider).is_ok(), "{provider}");
        }
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let err = map_backend("cohere").unwrap_err();
        assert_eq!(err.to_string(), "unknown provider: cohere");
    }
}
