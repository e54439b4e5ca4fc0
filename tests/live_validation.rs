mod common;

use pdfqa::answer::OUT_OF_CONTEXT_MARKER;
use pdfqa::config::Config;
use pdfqa::processing::{ProcessingService, StatusKind, UploadedFile};
use std::env;
use std::time::Duration;

fn live_config(root: &std::path::Path) -> Config {
    let mut config = common::config(
        root,
        "https://generativelanguage.googleapis.com/v1beta",
    );
    config.google_api_key = Some(env::var("GOOGLE_API_KEY").expect("GOOGLE_API_KEY must be set"));
    config.embedding_batch_delay_ms = 1_000;
    config
}

async fn processed_service(root: &std::path::Path) -> ProcessingService {
    let service = ProcessingService::new(&live_config(root)).expect("service");
    let pdf = common::pdf_with_pages(&[
        Some("The capital of France is Paris."),
        Some("Paris hosts the Louvre museum."),
    ]);
    service
        .start_processing(vec![UploadedFile {
            file_name: "france.pdf".into(),
            bytes: pdf,
        }])
        .await
        .expect("upload");

    for _ in 0..120 {
        let status = pdfqa::processing::ProcessingApi::processing_status(&service);
        match status.status {
            StatusKind::Completed => return service,
            StatusKind::Failed => panic!("processing failed: {}", status.message),
            _ => tokio::time::sleep(Duration::from_millis(500)).await,
        }
    }
    panic!("processing timed out");
}

#[tokio::test]
#[ignore = "Requires a live Gemini API key"]
async fn live_grounded_question_mentions_paris() {
    let dir = tempfile::tempdir().unwrap();
    let service = processed_service(dir.path()).await;
    let answer = service
        .answer_question("What is the capital of France?")
        .await
        .expect("answer");
    assert!(answer.contains("Paris"), "unexpected answer: {answer}");
    assert!(!answer.starts_with(OUT_OF_CONTEXT_MARKER));
}

#[tokio::test]
#[ignore = "Requires a live Gemini API key"]
async fn live_unrelated_question_starts_with_marker() {
    let dir = tempfile::tempdir().unwrap();
    let service = processed_service(dir.path()).await;
    let answer = service
        .answer_question("What is 2+2?")
        .await
        .expect("answer");
    assert!(
        answer.trim_start().starts_with(OUT_OF_CONTEXT_MARKER),
        "unexpected answer: {answer}"
    );
}
