//! Configuration types for invoice extraction.
//!
//! Every knob lives in [`ExtractionConfig`], built via its
//! [`ExtractionConfigBuilder`]. Callers set only what they care about and rely
//! on the documented defaults for the rest.

use crate::error::InvoiceError;
use serde::{Deserialize, Serialize};

/// Default provider name passed to `edgequake_llm::ProviderFactory`.
pub const DEFAULT_PROVIDER: &str = "openai";

/// Default vision model.
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// File name of the CSV report written into the output directory.
pub const DEFAULT_REPORT_FILE: &str = "invoice_results.csv";

/// Configuration for an extraction run.
///
/// # Example
/// ```rust
/// use invoice_ocr::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .model("gpt-4o")
///     .extract_max_tokens(1500)
///     .build()
///     .unwrap();
/// assert_eq!(config.classify_max_tokens, 50);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// LLM provider name (e.g. "openai", "anthropic", "gemini", "ollama"). Default: "openai".
    pub provider_name: String,

    /// Vision model identifier. Default: "gpt-4o".
    pub model: String,

    /// Output budget for the classification call. Default: 50.
    ///
    /// The reply is a category number and name; 50 tokens leaves room for the
    /// bilingual label without letting the model ramble.
    pub classify_max_tokens: usize,

    /// Output budget for the field-extraction call. Default: 1000.
    ///
    /// Long receipts with many line items can approach this. Too low a value
    /// truncates the JSON mid-object, which then fails to parse.
    pub extract_max_tokens: usize,

    /// Sampling temperature. `None` keeps the provider's default.
    pub temperature: Option<f32>,

    /// Longest edge, in pixels, of a rendered PDF page. Default: 2000.
    pub max_rendered_pixels: u32,

    /// Report file name inside the output directory. Default: "invoice_results.csv".
    pub report_file_name: String,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            provider_name: DEFAULT_PROVIDER.to_string(),
            model: DEFAULT_MODEL.to_string(),
            classify_max_tokens: 50,
            extract_max_tokens: 1000,
            temperature: None,
            max_rendered_pixels: 2000,
            report_file_name: DEFAULT_REPORT_FILE.to_string(),
        }
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = name.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn classify_max_tokens(mut self, n: usize) -> Self {
        self.config.classify_max_tokens = n;
        self
    }

    pub fn extract_max_tokens(mut self, n: usize) -> Self {
        self.config.extract_max_tokens = n;
        self
    }

    pub fn temperature(mut self, t: Option<f32>) -> Self {
        self.config.temperature = t.map(|t| t.clamp(0.0, 2.0));
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn report_file_name(mut self, name: impl Into<String>) -> Self {
        self.config.report_file_name = name.into();
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, InvoiceError> {
        let c = &self.config;
        if c.classify_max_tokens == 0 || c.extract_max_tokens == 0 {
            return Err(InvoiceError::InvalidConfig(
                "Token budgets must be ≥ 1".into(),
            ));
        }
        if c.provider_name.trim().is_empty() {
            return Err(InvoiceError::InvalidConfig(
                "Provider name must not be empty".into(),
            ));
        }
        if c.model.trim().is_empty() {
            return Err(InvoiceError::InvalidConfig(
                "Model must not be empty".into(),
            ));
        }
        if c.report_file_name.trim().is_empty() {
            return Err(InvoiceError::InvalidConfig(
                "Report file name must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}
