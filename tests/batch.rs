//! Batch runs over real directory trees with a scripted vision model.
//!
//! No network and no pdfium: inputs are tiny PNG/JPEG files written into a
//! temp directory, and the model replies come from a fixed script.

use invoice_ocr::{
    BatchProgressCallback, BatchRunner, ExtractionConfig, InvoiceError, TokenUsage, VisionModel,
    VisionReply, VisionRequest,
};
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Replies from a fixed script. Clones share the script and the call log.
#[derive(Clone)]
struct ScriptedModel {
    replies: Arc<Mutex<VecDeque<Result<VisionReply, InvoiceError>>>>,
    calls: Arc<Mutex<Vec<&'static str>>>,
}

impl ScriptedModel {
    fn new(replies: Vec<Result<VisionReply, InvoiceError>>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(replies.into())),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl VisionModel for ScriptedModel {
    async fn complete(&self, request: VisionRequest<'_>) -> Result<VisionReply, InvoiceError> {
        self.calls.lock().unwrap().push(request.call);
        let next = self.replies.lock().unwrap().pop_front();
        next.unwrap_or_else(|| {
            Err(InvoiceError::Transport {
                call: request.call.to_string(),
                detail: "script exhausted".into(),
            })
        })
    }
}

fn reply(content: &str, prompt: u64, completion: u64) -> Result<VisionReply, InvoiceError> {
    Ok(VisionReply {
        content: content.to_string(),
        usage: Some(TokenUsage {
            prompt_tokens: prompt,
            completion_tokens: completion,
        }),
    })
}

fn unreachable_model() -> Result<VisionReply, InvoiceError> {
    Err(InvoiceError::Transport {
        call: "process_invoice".into(),
        detail: "connection refused".into(),
    })
}

fn write_image(path: &Path) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    image::RgbImage::from_pixel(8, 8, image::Rgb([240, 240, 240]))
        .save(path)
        .unwrap();
}

fn runner(model: ScriptedModel) -> BatchRunner<ScriptedModel> {
    BatchRunner::new(model, ExtractionConfig::default())
}

fn read_report(path: &Path) -> (Vec<String>, Vec<csv::StringRecord>) {
    let bytes = fs::read(path).unwrap();
    assert!(bytes.starts_with(UTF8_BOM), "report must start with a BOM");
    let mut reader = csv::Reader::from_reader(&bytes[UTF8_BOM.len()..]);
    let headers = reader.headers().unwrap().iter().map(String::from).collect();
    let records = reader.records().map(|r| r.unwrap()).collect();
    (headers, records)
}

// Column positions in the report.
const COL_INVOICE_TYPE: usize = 14;
const COL_VENDOR: usize = 15;
const COL_LINE_ITEMS: usize = 19;
const COL_FILE_PATH: usize = 20;
const COL_TOTAL_COST: usize = 22;

// ── Batch runs ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn failed_file_is_skipped_and_the_rest_still_run() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_image(&input.path().join("a.png"));
    write_image(&input.path().join("b.png"));
    write_image(&input.path().join("c.png"));

    let model = ScriptedModel::new(vec![
        reply("1. 三聯式發票 (Triplicate Invoice)", 100, 50),
        reply(
            r#"{"invoice_vendor_name": "ACME", "remittance_invoice_no": [{"amount": 120, "product_name": "紙箱"}]}"#,
            200,
            20,
        ),
        reply("2. 二聯式發票 (Duplicate Invoice)", 10, 1),
        unreachable_model(),
        reply("4. 收據 (Receipt)", 10, 0),
        reply(r#"{"invoice_vendor_name": "全家便利商店"}"#, 10, 0),
    ]);

    let summary = runner(model.clone())
        .run(input.path(), output.path())
        .await
        .unwrap();

    assert_eq!(model.call_count(), 6);
    assert_eq!(summary.processed(), 2);
    assert_eq!(summary.skipped.len(), 1);
    assert!(summary.skipped[0].path.ends_with("b.png"));

    let report = summary.report_path.clone().unwrap();
    assert_eq!(report, output.path().join("invoice_results.csv"));

    let (headers, records) = read_report(&report);
    assert_eq!(headers.len(), 23);
    assert_eq!(headers[0], "company_code");
    assert_eq!(&headers[20..], &["file_path", "execution_time", "total_cost"]);

    assert_eq!(records.len(), 2);
    assert_eq!(&records[0][COL_VENDOR], "ACME");
    assert_eq!(&records[0][COL_INVOICE_TYPE], "1. 三聯式發票 (Triplicate Invoice)");
    assert!(records[0][COL_FILE_PATH].ends_with("a.png"));
    assert!(records[0][COL_LINE_ITEMS].contains("\"unit_price\":\"120\""));
    assert_eq!(&records[1][COL_VENDOR], "全家便利商店");
    assert!(records[1][COL_FILE_PATH].ends_with("c.png"));
}

#[tokio::test]
async fn each_row_is_charged_only_for_its_own_calls() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_image(&input.path().join("first.png"));
    write_image(&input.path().join("second.png"));

    let model = ScriptedModel::new(vec![
        reply("3. 電子發票 (E-Invoice)", 100, 50),
        reply(r#"{"invoice_amount": "500"}"#, 200, 20),
        reply("3. 電子發票 (E-Invoice)", 10, 0),
        reply(r#"{"invoice_amount": "20"}"#, 10, 0),
    ]);

    let summary = runner(model).run(input.path(), output.path()).await.unwrap();

    assert_eq!(summary.rows[0].total_cost, "$0.0051");
    assert_eq!(summary.rows[1].total_cost, "$0.0002");
    assert!((summary.total_cost - 0.0053).abs() < 1e-9);
    assert!(summary.rows[0].execution_time.ends_with(" seconds"));

    let (_, records) = read_report(summary.report_path.as_ref().unwrap());
    assert_eq!(&records[0][COL_TOTAL_COST], "$0.0051");
    assert_eq!(&records[1][COL_TOTAL_COST], "$0.0002");
}

#[tokio::test]
async fn walks_nested_directories_in_name_order() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_image(&input.path().join("z.png"));
    write_image(&input.path().join("nested/b.jpg"));
    write_image(&input.path().join("a.png"));
    fs::write(input.path().join("notes.txt"), "ignore me").unwrap();

    let mut script = Vec::new();
    for name in ["a", "b", "z"] {
        script.push(reply("4. 收據 (Receipt)", 1, 1));
        script.push(reply(&format!(r#"{{"invoice_vendor_name": "{name}"}}"#), 1, 1));
    }
    let model = ScriptedModel::new(script);

    let summary = runner(model.clone())
        .run(input.path(), output.path())
        .await
        .unwrap();

    let vendors: Vec<&str> = summary
        .rows
        .iter()
        .map(|r| r.record.invoice_vendor_name.as_str())
        .collect();
    assert_eq!(vendors, vec!["a", "b", "z"]);
    assert!(summary.rows[1].file_path.contains("nested"));
    assert_eq!(model.call_count(), 6);
}

#[tokio::test]
async fn corrupt_and_unparseable_files_are_skipped() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    fs::write(input.path().join("a_corrupt.png"), b"not an image at all").unwrap();
    write_image(&input.path().join("b_prose.png"));
    write_image(&input.path().join("c_good.png"));

    let model = ScriptedModel::new(vec![
        reply("4. 收據 (Receipt)", 1, 1),
        reply("I could not read this receipt.", 1, 1),
        reply("4. 收據 (Receipt)", 1, 1),
        reply(r#"Sure! {"invoice_vendor_name": "OK"} Hope this helps."#, 1, 1),
    ]);

    let summary = runner(model.clone())
        .run(input.path(), output.path())
        .await
        .unwrap();

    // The corrupt file never reaches the model.
    assert_eq!(model.call_count(), 4);
    assert_eq!(summary.processed(), 1);
    assert_eq!(summary.rows[0].record.invoice_vendor_name, "OK");

    let skipped: Vec<&Path> = summary.skipped.iter().map(|s| s.path.as_path()).collect();
    assert_eq!(skipped.len(), 2);
    assert!(skipped[0].ends_with("a_corrupt.png"));
    assert!(skipped[1].ends_with("b_prose.png"));
    assert!(summary.skipped[1].reason.contains("structured data"));
}

#[tokio::test]
async fn no_successful_files_means_no_report() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    let out_dir = output.path().join("reports");
    write_image(&input.path().join("only.png"));

    let model = ScriptedModel::new(vec![
        reply("1", 1, 1),
        unreachable_model(),
    ]);

    let summary = runner(model).run(input.path(), &out_dir).await.unwrap();

    assert_eq!(summary.processed(), 0);
    assert_eq!(summary.report_path, None);
    assert_eq!(summary.total_cost, 0.0);
    assert!(!out_dir.join("invoice_results.csv").exists());
}

#[tokio::test]
async fn empty_directory_writes_nothing() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    let model = ScriptedModel::new(vec![]);

    let summary = runner(model.clone())
        .run(input.path(), output.path())
        .await
        .unwrap();

    assert_eq!(model.call_count(), 0);
    assert!(summary.rows.is_empty());
    assert!(summary.report_path.is_none());
}

#[tokio::test]
async fn missing_input_root_reports_no_results() {
    let output = tempfile::tempdir().unwrap();
    let out_dir = output.path().join("reports");
    let model = ScriptedModel::new(vec![]);

    let summary = runner(model.clone())
        .run(Path::new("/definitely/not/here"), &out_dir)
        .await
        .unwrap();

    assert_eq!(model.call_count(), 0);
    assert!(summary.rows.is_empty());
    assert!(summary.skipped.is_empty());
    assert!(summary.report_path.is_none());
    assert!(!out_dir.exists());
}

#[tokio::test]
async fn empty_extraction_contributes_no_row() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_image(&input.path().join("a.png"));
    write_image(&input.path().join("b.png"));

    let model = ScriptedModel::new(vec![
        reply("4", 1, 1),
        reply("{}", 1, 1),
        reply("4. 收據 (Receipt)", 1, 1),
        reply(r#"{"invoice_vendor_name": "ACME"}"#, 1, 1),
    ]);

    let summary = runner(model).run(input.path(), output.path()).await.unwrap();

    assert_eq!(summary.processed(), 1);
    assert_eq!(summary.rows[0].record.invoice_vendor_name, "ACME");
    assert_eq!(summary.skipped.len(), 1);
    assert!(summary.skipped[0].path.ends_with("a.png"));

    let (_, records) = read_report(summary.report_path.as_ref().unwrap());
    assert_eq!(records.len(), 1);
    assert!(records[0][COL_FILE_PATH].ends_with("b.png"));
}

#[tokio::test]
async fn empty_extraction_alone_writes_no_report() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_image(&input.path().join("a.png"));

    let model = ScriptedModel::new(vec![reply("4", 1, 1), reply("{}", 1, 1)]);

    let summary = runner(model).run(input.path(), output.path()).await.unwrap();

    assert_eq!(summary.processed(), 0);
    assert!(summary.report_path.is_none());
    assert!(!output.path().join("invoice_results.csv").exists());
}

#[tokio::test]
async fn custom_report_name_is_used() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_image(&input.path().join("r.png"));

    let model = ScriptedModel::new(vec![
        reply("4", 1, 1),
        reply(r#"{"invoice_amount": 1}"#, 1, 1),
    ]);
    let config = ExtractionConfig::builder()
        .report_file_name("march.csv")
        .build()
        .unwrap();

    let summary = BatchRunner::new(model, config)
        .run(input.path(), output.path())
        .await
        .unwrap();
    assert_eq!(summary.report_path, Some(output.path().join("march.csv")));
}

// ── Progress events ──────────────────────────────────────────────────────────

#[derive(Default)]
struct RecordingProgress {
    events: Mutex<Vec<String>>,
}

impl BatchProgressCallback for RecordingProgress {
    fn on_batch_start(&self, total_files: usize) {
        self.events.lock().unwrap().push(format!("start {total_files}"));
    }

    fn on_file_complete(&self, index: usize, total: usize, _path: &Path, _cost: f64) {
        self.events.lock().unwrap().push(format!("ok {index}/{total}"));
    }

    fn on_file_skipped(&self, index: usize, total: usize, _path: &Path, _reason: &str) {
        self.events.lock().unwrap().push(format!("skip {index}/{total}"));
    }

    fn on_batch_complete(&self, total_files: usize, success_count: usize) {
        self.events
            .lock()
            .unwrap()
            .push(format!("done {success_count}/{total_files}"));
    }
}

#[tokio::test]
async fn progress_callback_sees_every_file() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_image(&input.path().join("1.png"));
    write_image(&input.path().join("2.png"));

    let model = ScriptedModel::new(vec![
        reply("4", 1, 1),
        reply(r#"{"invoice_amount": 1}"#, 1, 1),
        reply("4", 1, 1),
        unreachable_model(),
    ]);
    let progress = Arc::new(RecordingProgress::default());

    runner(model)
        .with_progress(progress.clone())
        .run(input.path(), output.path())
        .await
        .unwrap();

    let events = progress.events.lock().unwrap().clone();
    assert_eq!(events, vec!["start 2", "ok 1/2", "skip 2/2", "done 1/2"]);
}

// ── Single files ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn process_path_returns_record_and_metrics() {
    let input = tempfile::tempdir().unwrap();
    let path: PathBuf = input.path().join("taxi.jpg");
    write_image(&path);

    let model = ScriptedModel::new(vec![
        reply("4. 收據 (Receipt)", 100, 50),
        reply(r#"{"doc_total_amount": 250, "invoice_buyer_tax_id": null}"#, 200, 20),
    ]);

    let processed = runner(model).process_path(&path).await.unwrap().unwrap();
    assert_eq!(processed.path, path);
    assert_eq!(processed.record.invoice_buyer_tax_id, "");
    assert_eq!(processed.metrics.total_input_tokens, 300);
    assert_eq!(processed.metrics.total_cost_label(), "$0.0051");

    let json = serde_json::to_value(processed.record.envelope()).unwrap();
    assert_eq!(json["data"]["doc_total_amount"], "250");
    assert_eq!(json["data"]["invoice_currency"], "TWD");
}

#[tokio::test]
async fn process_path_rejects_ineligible_extension() {
    let input = tempfile::tempdir().unwrap();
    let path = input.path().join("notes.txt");
    fs::write(&path, "hello").unwrap();
    let model = ScriptedModel::new(vec![]);

    let err = runner(model.clone()).process_path(&path).await.unwrap_err();
    assert!(matches!(err, InvoiceError::UnsupportedFormat { .. }));
    assert_eq!(model.call_count(), 0);
}
