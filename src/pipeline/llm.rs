//! The seam between the pipeline and a vision-language model.
//!
//! [`VisionModel`] is the only contract the rest of the crate relies on: one
//! instruction, one image, an output budget in, text plus optional token usage
//! out. [`ProviderModel`] implements it over any `edgequake-llm` provider;
//! tests implement it with scripted replies.

use crate::config::ExtractionConfig;
use crate::error::InvoiceError;
use crate::pipeline::encode::EncodedPayload;
use crate::usage::TokenUsage;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// One request to the model.
#[derive(Debug, Clone, Copy)]
pub struct VisionRequest<'a> {
    /// Stable name used for usage accounting and logs.
    pub call: &'static str,
    pub instruction: &'a str,
    pub payload: &'a EncodedPayload,
    pub max_tokens: usize,
}

/// The model's reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisionReply {
    pub content: String,
    /// `None` when the provider reported no usage for this call.
    pub usage: Option<TokenUsage>,
}

/// Something that can answer an instruction about an image.
///
/// Errors are returned as [`InvoiceError::Transport`]; callers decide whether
/// they are fatal.
pub trait VisionModel {
    fn complete(
        &self,
        request: VisionRequest<'_>,
    ) -> impl Future<Output = Result<VisionReply, InvoiceError>> + Send;
}

/// [`VisionModel`] backed by an `edgequake-llm` provider.
#[derive(Clone)]
pub struct ProviderModel {
    provider: Arc<dyn LLMProvider>,
    temperature: Option<f32>,
}

impl std::fmt::Debug for ProviderModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderModel")
            .field("provider", &"<dyn LLMProvider>")
            .field("temperature", &self.temperature)
            .finish()
    }
}

impl ProviderModel {
    /// Wrap an already-constructed provider.
    pub fn new(provider: Arc<dyn LLMProvider>, temperature: Option<f32>) -> Self {
        Self {
            provider,
            temperature,
        }
    }

    /// Build the provider named in `config`, failing fast on missing credentials.
    pub fn connect(config: &ExtractionConfig) -> Result<Self, InvoiceError> {
        check_credentials(&config.provider_name, |var| std::env::var(var).ok())?;

        let provider = ProviderFactory::create_llm_provider(&config.provider_name, &config.model)
            .map_err(|e| InvoiceError::ProviderNotConfigured {
                provider: config.provider_name.clone(),
                hint: format!("{e}"),
            })?;

        info!(
            "Using provider '{}' with model '{}'",
            config.provider_name, config.model
        );
        Ok(Self::new(provider, config.temperature))
    }
}

impl VisionModel for ProviderModel {
    async fn complete(&self, request: VisionRequest<'_>) -> Result<VisionReply, InvoiceError> {
        let start = Instant::now();
        let messages = vec![ChatMessage::user_with_images(
            request.instruction,
            vec![request.payload.to_image_data()],
        )];
        let options = CompletionOptions {
            temperature: self.temperature,
            max_tokens: Some(request.max_tokens),
            ..Default::default()
        };

        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| InvoiceError::Transport {
                call: request.call.to_string(),
                detail: format!("{}", e),
            })?;

        debug!(
            "{}: {} input tokens, {} output tokens, {:?}",
            request.call,
            response.prompt_tokens,
            response.completion_tokens,
            start.elapsed()
        );

        Ok(VisionReply {
            content: response.content,
            usage: reported_usage(response.prompt_tokens as u64, response.completion_tokens as u64),
        })
    }
}

/// Providers that omit usage report zeros; treat that as "no usage".
fn reported_usage(prompt_tokens: u64, completion_tokens: u64) -> Option<TokenUsage> {
    if prompt_tokens == 0 && completion_tokens == 0 {
        None
    } else {
        Some(TokenUsage {
            prompt_tokens,
            completion_tokens,
        })
    }
}

/// Environment variable holding the API key for a provider, if it needs one.
pub fn credential_var(provider: &str) -> Option<&'static str> {
    match provider.to_ascii_lowercase().as_str() {
        "openai" => Some("OPENAI_API_KEY"),
        "anthropic" => Some("ANTHROPIC_API_KEY"),
        "gemini" | "google" => Some("GEMINI_API_KEY"),
        "mistral" => Some("MISTRAL_API_KEY"),
        "openrouter" => Some("OPENROUTER_API_KEY"),
        "azure" => Some("AZURE_OPENAI_API_KEY"),
        _ => None,
    }
}

/// Verify the provider's key is present and non-empty.
fn check_credentials(
    provider: &str,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<(), InvoiceError> {
    let Some(var) = credential_var(provider) else {
        return Ok(());
    };
    match lookup(var) {
        Some(key) if !key.trim().is_empty() => Ok(()),
        _ => Err(InvoiceError::MissingCredentials {
            provider: provider.to_string(),
            var: var.to_string(),
        }),
    }
}
