//! Token usage, latency and cost accounting for one processed file.
//!
//! A [`UsageTracker`] lives exactly as long as one file's processing: the
//! batch runner creates a fresh tracker per file so costs are never mixed
//! between rows.

use crate::error::InvoiceError;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Per-million-token prices in USD.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pricing {
    pub input_per_million: f64,
    pub output_per_million: f64,
}

/// Fixed pricing applied to every call: $10 / 1M input, $30 / 1M output.
pub const DEFAULT_PRICING: Pricing = Pricing {
    input_per_million: 10.0,
    output_per_million: 30.0,
};

impl Pricing {
    pub fn input_cost(&self, tokens: u64) -> f64 {
        tokens as f64 * (self.input_per_million / 1_000_000.0)
    }

    pub fn output_cost(&self, tokens: u64) -> f64 {
        tokens as f64 * (self.output_per_million / 1_000_000.0)
    }
}

/// Token counts reported by the model for one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

/// One recorded model call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub name: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Snapshot of a tracker's state at the time [`UsageTracker::metrics`] ran.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageMetrics {
    pub elapsed: Duration,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub input_cost: f64,
    pub output_cost: f64,
    pub total_cost: f64,
    pub calls: Vec<UsageRecord>,
}

impl UsageMetrics {
    /// Elapsed time as shown in reports, e.g. `"3.14 seconds"`.
    pub fn execution_time(&self) -> String {
        format!("{:.2} seconds", self.elapsed.as_secs_f64())
    }

    pub fn input_cost_label(&self) -> String {
        format_cost(self.input_cost)
    }

    pub fn output_cost_label(&self) -> String {
        format_cost(self.output_cost)
    }

    pub fn total_cost_label(&self) -> String {
        format_cost(self.total_cost)
    }
}

/// Format a USD amount the way reports show it: `$` plus four decimals.
pub fn format_cost(cost: f64) -> String {
    format!("${cost:.4}")
}

/// Parse a cost label back to a number, tolerating a leading `$`.
///
/// ```rust
/// assert_eq!(invoice_ocr::usage::parse_cost("$0.0051"), Some(0.0051));
/// assert_eq!(invoice_ocr::usage::parse_cost("0.5"), Some(0.5));
/// assert_eq!(invoice_ocr::usage::parse_cost("n/a"), None);
/// ```
pub fn parse_cost(label: &str) -> Option<f64> {
    let trimmed = label.trim();
    let number = trimmed.strip_prefix('$').unwrap_or(trimmed);
    number.trim().parse().ok()
}

/// Accumulates token usage and wall-clock time for one file.
#[derive(Debug, Clone)]
pub struct UsageTracker {
    started: Option<Instant>,
    pricing: Pricing,
    total_input_tokens: u64,
    total_output_tokens: u64,
    calls: Vec<UsageRecord>,
}

impl Default for UsageTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl UsageTracker {
    pub fn new() -> Self {
        Self::with_pricing(DEFAULT_PRICING)
    }

    pub fn with_pricing(pricing: Pricing) -> Self {
        Self {
            started: None,
            pricing,
            total_input_tokens: 0,
            total_output_tokens: 0,
            calls: Vec::new(),
        }
    }

    /// Record the reference timestamp. Later calls keep the first one.
    pub fn start(&mut self) {
        if self.started.is_none() {
            self.started = Some(Instant::now());
        }
    }

    /// Append a call and add its tokens to the running totals.
    pub fn record(&mut self, name: &str, input_tokens: u64, output_tokens: u64) {
        self.total_input_tokens += input_tokens;
        self.total_output_tokens += output_tokens;
        self.calls.push(UsageRecord {
            name: name.to_string(),
            input_tokens,
            output_tokens,
        });
    }

    /// Record a reply's usage, if it reported any.
    pub fn record_reply(&mut self, name: &str, usage: Option<TokenUsage>) {
        if let Some(u) = usage {
            self.record(name, u.prompt_tokens, u.completion_tokens);
        }
    }

    pub fn calls(&self) -> &[UsageRecord] {
        &self.calls
    }

    /// Compute a metrics snapshot. Fails if [`start`](Self::start) was never called.
    pub fn metrics(&self) -> Result<UsageMetrics, InvoiceError> {
        let started = self
            .started
            .ok_or(InvoiceError::InvalidState("usage metrics requested before start()"))?;

        let input_cost = self.pricing.input_cost(self.total_input_tokens);
        let output_cost = self.pricing.output_cost(self.total_output_tokens);

        Ok(UsageMetrics {
            elapsed: started.elapsed(),
            total_input_tokens: self.total_input_tokens,
            total_output_tokens: self.total_output_tokens,
            input_cost,
            output_cost,
            total_cost: input_cost + output_cost,
            calls: self.calls.clone(),
        })
    }
}
