pub mod engine;
pub mod parse;
pub mod prompt;

use std::time::Duration;

use nazuke_core::{AiSettings, NamingRequest, RequestError, ResponseFormat};

pub use engine::EngineError;
pub use parse::{extract, ExtractWarning, Extraction};

#[derive(Debug, thiserror::Error)]
pub enum SuggestError {
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Ask the configured model for names and parse its reply.
///
/// Model-call failures are errors; a reply that yields no candidates is not.
pub async fn get_candidates(
    request: &NamingRequest,
    settings: &AiSettings,
    format: ResponseFormat,
) -> Result<Extraction, SuggestError> {
    request.validate()?;

    let system = prompt::system_prompt(format);
    let user_msg = prompt::user_message(request);

    tracing::info!(
        provider = %settings.provider,
        model = %settings.model,
        %format,
        "requesting name candidates"
    );
    tracing::debug!(%user_msg, "prompt");

    let timeout = Duration::from_secs(settings.timeout_secs);
    let raw = match tokio::time::timeout(timeout, engine::generate(settings, &system, &user_msg)).await {
        Ok(result) => result?,
        Err(_) => return Err(EngineError::Timeout(settings.timeout_secs).into()),
    };
    tracing::debug!(%raw, "raw LLM output");

    let extraction = extract(&raw, format);
    report(&extraction);
    Ok(extraction)
}

/// Log what an extraction produced and skipped.
pub fn report(extraction: &Extraction) {
    for warning in &extraction.warnings {
        tracing::warn!(%warning, "skipped part of the reply");
    }
    tracing::info!(
        candidates = extraction.candidates.len(),
        warnings = extraction.warnings.len(),
        "parsed reply"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn invalid_request_fails_before_any_call() {
        let settings = AiSettings::default();
        let err = get_candidates(&NamingRequest::new(""), &settings, ResponseFormat::DelimitedText)
            .await
            .unwrap_err();
        assert!(matches!(err, SuggestError::Request(RequestError::MissingWish)));
    }

    #[tokio::test]
    async fn unknown_provider_is_an_engine_error() {
        let settings = AiSettings {
            provider: "nowhere".into(),
            ..AiSettings::default()
        };
        let err = get_candidates(&NamingRequest::new("wish"), &settings, ResponseFormat::StructuredJson)
            .await
            .unwrap_err();
        assert!(matches!(err, SuggestError::Engine(EngineError::UnknownProvider(_))));
    }
}
