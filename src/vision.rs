//! Classification and field extraction against the vision model.
//!
//! A [`VisionClient`] owns the [`UsageTracker`] for one file and borrows the
//! model. Both calls degrade instead of failing when the model is
//! unreachable: classification falls back to an empty label, extraction to
//! "no result". Only a reply that arrives but cannot be read as JSON is an
//! error.

use crate::config::ExtractionConfig;
use crate::error::InvoiceError;
use crate::pipeline::encode::EncodedPayload;
use crate::pipeline::llm::{VisionModel, VisionRequest};
use crate::prompts::{CLASSIFY_PROMPT, EXTRACT_PROMPT};
use crate::template::ExtractionResult;
use crate::usage::UsageTracker;
use serde_json::Value;
use tracing::{debug, error, warn};

/// Usage name of the classification call.
pub const CLASSIFY_CALL: &str = "identify_type";

/// Usage name of the extraction call.
pub const EXTRACT_CALL: &str = "process_invoice";

/// Per-file client: one model reference, one fresh usage tracker.
pub struct VisionClient<'m, M> {
    model: &'m M,
    classify_max_tokens: usize,
    extract_max_tokens: usize,
    tracker: UsageTracker,
}

impl<'m, M: VisionModel> VisionClient<'m, M> {
    pub fn new(model: &'m M, config: &ExtractionConfig) -> Self {
        Self {
            model,
            classify_max_tokens: config.classify_max_tokens,
            extract_max_tokens: config.extract_max_tokens,
            tracker: UsageTracker::new(),
        }
    }

    pub fn tracker(&self) -> &UsageTracker {
        &self.tracker
    }

    pub fn tracker_mut(&mut self) -> &mut UsageTracker {
        &mut self.tracker
    }

    /// Ask the model which invoice category the image shows.
    ///
    /// Returns the trimmed reply, or an empty string if the call failed.
    pub async fn classify(&mut self, payload: &EncodedPayload) -> String {
        let request = VisionRequest {
            call: CLASSIFY_CALL,
            instruction: CLASSIFY_PROMPT,
            payload,
            max_tokens: self.classify_max_tokens,
        };

        match self.model.complete(request).await {
            Ok(reply) => {
                self.tracker.record_reply(CLASSIFY_CALL, reply.usage);
                let label = reply.content.trim().to_string();
                debug!("Classified as {:?}", label);
                label
            }
            Err(e) => {
                error!("Error identifying invoice type: {}", e);
                String::new()
            }
        }
    }

    /// Classify, then extract the invoice fields as a JSON object.
    ///
    /// `Ok(None)` means the file has no result: the extraction call failed or
    /// the model returned an empty object. `Err(InvoiceError::Parse)` means a reply arrived but held no
    /// JSON object.
    pub async fn extract(
        &mut self,
        payload: &EncodedPayload,
    ) -> Result<Option<(ExtractionResult, String)>, InvoiceError> {
        let category = self.classify(payload).await;

        let request = VisionRequest {
            call: EXTRACT_CALL,
            instruction: EXTRACT_PROMPT,
            payload,
            max_tokens: self.extract_max_tokens,
        };

        let reply = match self.model.complete(request).await {
            Ok(reply) => reply,
            Err(e) => {
                error!("Error processing invoice: {}", e);
                return Ok(None);
            }
        };
        self.tracker.record_reply(EXTRACT_CALL, reply.usage);

        let fields = parse_extraction(&reply.content)?;
        if fields.is_empty() {
            warn!("Extraction reply was an empty object");
            return Ok(None);
        }
        debug!("Extracted {} fields", fields.len());
        Ok(Some((fields, category)))
    }
}

/// Read a JSON object out of a model reply.
///
/// The whole reply is tried first; failing that, the span from the first `{`
/// to the last `}` (models like to wrap JSON in prose or code fences).
pub fn parse_extraction(text: &str) -> Result<ExtractionResult, InvoiceError> {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(text) {
        return Ok(map);
    }

    let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) else {
        return Err(InvoiceError::Parse {
            detail: format!("no JSON object in {} chars of reply", text.len()),
        });
    };
    if end < start {
        return Err(InvoiceError::Parse {
            detail: "braces in reply are out of order".into(),
        });
    }

    match serde_json::from_str::<Value>(&text[start..=end]) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(InvoiceError::Parse {
            detail: format!("expected a JSON object, got {other}"),
        }),
        Err(e) => Err(InvoiceError::Parse {
            detail: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::llm::VisionReply;
    use crate::usage::TokenUsage;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replies with a fixed script and remembers what it was asked.
    struct ScriptedModel {
        replies: Mutex<VecDeque<Result<VisionReply, InvoiceError>>>,
        seen: Mutex<Vec<(String, usize)>>,
    }

    impl ScriptedModel {
        fn new(replies: Vec<Result<VisionReply, InvoiceError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl VisionModel for ScriptedModel {
        async fn complete(&self, request: VisionRequest<'_>) -> Result<VisionReply, InvoiceError> {
            self.seen
                .lock()
                .unwrap()
                .push((request.call.to_string(), request.max_tokens));
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .expect("script exhausted")
        }
    }

    fn ok(content: &str, prompt: u64, completion: u64) -> Result<VisionReply, InvoiceError> {
        Ok(VisionReply {
            content: content.to_string(),
            usage: Some(TokenUsage {
                prompt_tokens: prompt,
                completion_tokens: completion,
            }),
        })
    }

    fn transport() -> Result<VisionReply, InvoiceError> {
        Err(InvoiceError::Transport {
            call: "test".into(),
            detail: "connection refused".into(),
        })
    }

    fn payload() -> EncodedPayload {
        EncodedPayload {
            data: "aGVsbG8=".into(),
            mime_type: "image/png",
        }
    }

    #[test]
    fn parse_whole_reply() {
        let map = parse_extraction(r#"{"invoice_amount": 100}"#).unwrap();
        assert_eq!(map["invoice_amount"], json!(100));
    }

    #[test]
    fn parse_falls_back_to_brace_span() {
        let map = parse_extraction(r#"Here is the data: {"invoice_amount": 100} done."#).unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map["invoice_amount"], json!(100));
    }

    #[test]
    fn parse_handles_code_fences() {
        let reply = "```json\n{\"invoice_vendor_name\": \"ACME\", \"remittance_invoice_no\": [{\"amount\": 5}]}\n```";
        let map = parse_extraction(reply).unwrap();
        assert_eq!(map["invoice_vendor_name"], json!("ACME"));
    }

    #[test]
    fn parse_without_braces_fails() {
        let err = parse_extraction("Sorry, I cannot read this image.").unwrap_err();
        assert!(matches!(err, InvoiceError::Parse { .. }));
    }

    #[test]
    fn parse_with_broken_json_fails() {
        let err = parse_extraction("result: {\"a\": } end").unwrap_err();
        assert!(matches!(err, InvoiceError::Parse { .. }));
        let err = parse_extraction("} backwards {").unwrap_err();
        assert!(matches!(err, InvoiceError::Parse { .. }));
    }

    #[test]
    fn parse_rejects_non_object_json() {
        let err = parse_extraction("[1, 2, 3]").unwrap_err();
        assert!(matches!(err, InvoiceError::Parse { .. }));
    }

    #[tokio::test]
    async fn extract_runs_classify_then_extract_and_records_usage() {
        let model = ScriptedModel::new(vec![
            ok("  4. 收據 (Receipt)\n", 100, 50),
            ok(r#"{"invoice_amount": 100}"#, 200, 20),
        ]);
        let config = ExtractionConfig::default();
        let mut client = VisionClient::new(&model, &config);
        client.tracker_mut().start();

        let (fields, category) = client.extract(&payload()).await.unwrap().unwrap();
        assert_eq!(category, "4. 收據 (Receipt)");
        assert_eq!(fields["invoice_amount"], json!(100));

        let seen = model.seen.lock().unwrap().clone();
        assert_eq!(
            seen,
            vec![
                (CLASSIFY_CALL.to_string(), 50),
                (EXTRACT_CALL.to_string(), 1000)
            ]
        );

        let m = client.tracker().metrics().unwrap();
        assert_eq!(m.total_input_tokens, 300);
        assert_eq!(m.total_output_tokens, 70);
        assert!((m.total_cost - 0.0051).abs() < 1e-12);
        let names: Vec<&str> = m.calls.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec![CLASSIFY_CALL, EXTRACT_CALL]);
    }

    #[tokio::test]
    async fn classify_failure_degrades_to_empty_label() {
        let model = ScriptedModel::new(vec![transport(), ok(r#"{"invoice_amount": 1}"#, 10, 1)]);
        let config = ExtractionConfig::default();
        let mut client = VisionClient::new(&model, &config);
        client.tracker_mut().start();

        let (_, category) = client.extract(&payload()).await.unwrap().unwrap();
        assert_eq!(category, "");
        let m = client.tracker().metrics().unwrap();
        assert_eq!(m.calls.len(), 1);
        assert_eq!(m.calls[0].name, EXTRACT_CALL);
    }

    #[tokio::test]
    async fn extract_transport_failure_is_no_result() {
        let model = ScriptedModel::new(vec![ok("1", 5, 1), transport()]);
        let config = ExtractionConfig::default();
        let mut client = VisionClient::new(&model, &config);
        client.tracker_mut().start();

        assert!(client.extract(&payload()).await.unwrap().is_none());
        assert_eq!(client.tracker().calls().len(), 1);
    }

    #[tokio::test]
    async fn empty_object_is_no_result() {
        let model = ScriptedModel::new(vec![ok("4", 5, 1), ok("```json\n{}\n```", 20, 2)]);
        let config = ExtractionConfig::default();
        let mut client = VisionClient::new(&model, &config);
        client.tracker_mut().start();

        assert!(client.extract(&payload()).await.unwrap().is_none());
        assert_eq!(client.tracker().calls().len(), 2);
    }

    #[tokio::test]
    async fn unparseable_reply_is_a_parse_error_after_usage_is_recorded() {
        let model = ScriptedModel::new(vec![ok("2", 5, 1), ok("no json here", 50, 5)]);
        let config = ExtractionConfig::default();
        let mut client = VisionClient::new(&model, &config);
        client.tracker_mut().start();

        let err = client.extract(&payload()).await.unwrap_err();
        assert!(matches!(err, InvoiceError::Parse { .. }));
        assert_eq!(client.tracker().calls().len(), 2);
    }

    #[test]
    fn reply_without_usage_leaves_totals_untouched() {
        let model = ScriptedModel::new(vec![Ok(VisionReply {
            content: "3. 電子發票 (E-Invoice)".into(),
            usage: None,
        })]);
        let config = ExtractionConfig::default();
        let mut client = VisionClient::new(&model, &config);
        client.tracker_mut().start();

        let label = tokio_test::block_on(client.classify(&payload()));
        assert_eq!(label, "3. 電子發票 (E-Invoice)");
        let m = client.tracker().metrics().unwrap();
        assert_eq!(m.total_input_tokens, 0);
        assert!(m.calls.is_empty());
    }
}
