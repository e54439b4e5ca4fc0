//! HTTP surface for the PDF question-answering service.
//!
//! - `POST /upload-pdfs/` – Store a batch of PDFs (multipart field `files`) and start processing.
//! - `GET /processing-status/` – Report the current processing status.
//! - `POST /ask-question/` – Answer a form-encoded `question` against the processed documents.
//! - `GET /metrics` – Run and question counters.
//! - `GET /` and `/static/*` – Landing page assets.

use crate::answer::AnswerError;
use crate::config::Config;
use crate::metrics::MetricsSnapshot;
use crate::processing::{
    ProcessingApi, ProcessingError, ProcessingStatus, StatusKind, UploadedFile,
};
use axum::{
    Form, Json, Router,
    extract::{DefaultBodyLimit, Multipart, Request, State, multipart::MultipartError},
    http::{StatusCode, header::CONTENT_LENGTH},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};

const MEGABYTE: u64 = 1024 * 1024;

/// Limits and asset locations applied by the router.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Maximum combined size of the files in one upload.
    pub max_upload_bytes: u64,
    /// Maximum request body size; larger requests are refused before parsing.
    pub max_request_bytes: u64,
    /// Directory holding `index.html` and other static assets.
    pub static_dir: PathBuf,
}

impl RouterConfig {
    /// Derive router settings from the runtime configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_upload_bytes: config.max_upload_bytes(),
            max_request_bytes: config.max_request_bytes(),
            static_dir: config.static_dir.clone(),
        }
    }
}

struct AppState<S> {
    service: Arc<S>,
    max_upload_bytes: u64,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            max_upload_bytes: self.max_upload_bytes,
        }
    }
}

/// Build the HTTP router.
pub fn create_router<S>(service: Arc<S>, options: RouterConfig) -> Router
where
    S: ProcessingApi + 'static,
{
    let state = AppState {
        service,
        max_upload_bytes: options.max_upload_bytes,
    };
    let body_limit = usize::try_from(options.max_request_bytes).unwrap_or(usize::MAX);

    Router::new()
        .route("/upload-pdfs/", post(upload_pdfs::<S>))
        .route("/processing-status/", get(processing_status::<S>))
        .route("/ask-question/", post(ask_question::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .route_service("/", ServeFile::new(options.static_dir.join("index.html")))
        .nest_service("/static", ServeDir::new(&options.static_dir))
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn_with_state(
            options.max_request_bytes,
            reject_oversized,
        ))
        .layer(CorsLayer::permissive())
}

/// Refuse requests whose declared length exceeds the limit before any body is read.
async fn reject_oversized(State(limit): State<u64>, request: Request, next: Next) -> Response {
    let declared = request
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok());
    if let Some(length) = declared.filter(|length| *length > limit) {
        tracing::warn!(length, limit, "Rejected oversized request");
        return ApiError::PayloadTooLarge.into_response();
    }
    next.run(request).await
}

/// Response body for `POST /upload-pdfs/`.
#[derive(Serialize)]
struct UploadResponse {
    message: &'static str,
    files: Vec<String>,
    status: StatusKind,
}

/// Validate and store an upload batch, then start background processing.
///
/// Validation runs before any side effect: an empty batch, an oversized batch, or a file whose
/// name does not end in `.pdf` is rejected and the current documents stay untouched.
async fn upload_pdfs<S>(
    State(state): State<AppState<S>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError>
where
    S: ProcessingApi,
{
    let mut files = Vec::new();
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("files") {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await?;
        // Browsers send an empty part when no file was chosen.
        if file_name.is_empty() && bytes.is_empty() {
            continue;
        }
        files.push(UploadedFile {
            file_name,
            bytes: bytes.to_vec(),
        });
    }

    if files.is_empty() {
        return Err(ApiError::BadRequest("No files provided".into()));
    }
    let total: u64 = files.iter().map(|file| file.bytes.len() as u64).sum();
    if total > state.max_upload_bytes {
        tracing::warn!(total, limit = state.max_upload_bytes, "Rejected oversized upload");
        return Err(ApiError::BadRequest(format!(
            "Total file size exceeds {}MB limit",
            state.max_upload_bytes / MEGABYTE
        )));
    }
    if let Some(file) = files.iter().find(|file| !file.file_name.ends_with(".pdf")) {
        return Err(ApiError::BadRequest(format!(
            "File {} is not a PDF",
            file.file_name
        )));
    }

    let receipt = state.service.start_processing(files).await?;
    tracing::info!(files = receipt.files.len(), bytes = total, "Upload request completed");
    Ok(Json(UploadResponse {
        message: "Files uploaded successfully. Processing started.",
        files: receipt.files,
        status: receipt.status,
    }))
}

/// Return the current processing status.
async fn processing_status<S>(State(state): State<AppState<S>>) -> Json<ProcessingStatus>
where
    S: ProcessingApi,
{
    Json(state.service.processing_status())
}

/// Form body for `POST /ask-question/`.
#[derive(Deserialize)]
struct AskQuestionForm {
    question: String,
}

/// Response body for `POST /ask-question/`.
#[derive(Serialize)]
struct AnswerResponse {
    question: String,
    answer: String,
}

/// Answer a question against the processed documents.
async fn ask_question<S>(
    State(state): State<AppState<S>>,
    Form(form): Form<AskQuestionForm>,
) -> Result<Json<AnswerResponse>, ApiError>
where
    S: ProcessingApi,
{
    let answer = state.service.answer_question(&form.question).await?;
    Ok(Json(AnswerResponse {
        question: form.question,
        answer,
    }))
}

async fn get_metrics<S>(State(state): State<AppState<S>>) -> Json<MetricsSnapshot>
where
    S: ProcessingApi,
{
    Json(state.service.metrics_snapshot())
}

#[derive(Debug)]
enum ApiError {
    BadRequest(String),
    PayloadTooLarge,
    NotReady(ProcessingStatus),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::BadRequest(detail) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "detail": detail }))).into_response()
            }
            Self::PayloadTooLarge => {
                (StatusCode::PAYLOAD_TOO_LARGE, "Request too large").into_response()
            }
            Self::NotReady(status) => (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "message": format!(
                        "PDF processing not completed. Current status: {}",
                        status.status
                    ),
                    "status": status.status,
                })),
            )
                .into_response(),
            Self::Internal(detail) => {
                tracing::error!(detail = %detail, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "detail": detail })),
                )
                    .into_response()
            }
        }
    }
}

impl From<ProcessingError> for ApiError {
    fn from(inner: ProcessingError) -> Self {
        match inner {
            ProcessingError::NoFiles | ProcessingError::InvalidFileName(_) => {
                Self::BadRequest(inner.to_string())
            }
            other => Self::Internal(format!("Error uploading files: {other}")),
        }
    }
}

impl From<AnswerError> for ApiError {
    fn from(inner: AnswerError) -> Self {
        match inner {
            AnswerError::NotReady(status) => Self::NotReady(status),
            AnswerError::NoDocuments => Self::BadRequest(inner.to_string()),
            AnswerError::Failed(detail) => {
                Self::Internal(format!("Error processing question: {detail}"))
            }
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(inner: MultipartError) -> Self {
        if inner.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::PayloadTooLarge
        } else {
            Self::BadRequest(inner.body_text())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{RouterConfig, create_router};
    use crate::answer::AnswerError;
    use crate::metrics::MetricsSnapshot;
    use crate::processing::{
        ProcessingApi, ProcessingError, ProcessingStatus, StatusKind, UploadReceipt, UploadedFile,
    };
    use async_trait::async_trait;
    use axum::{
        body::{Body, to_bytes},
        http::{Method, Request, StatusCode},
        response::Response,
    };
    use std::path::PathBuf;
    use std::sync::Arc;
    use tokio::sync::Mutex;
    use tower::ServiceExt;

    const BOUNDARY: &str = "pdfqa-test-boundary";

    #[derive(Clone)]
    enum StubAnswer {
        Answer(&'static str),
        NotReady(StatusKind),
        NoDocuments,
        Failed(&'static str),
    }

    struct StubProcessingService {
        uploads: Mutex<Vec<Vec<UploadedFile>>>,
        questions: Mutex<Vec<String>>,
        answer: StubAnswer,
    }

    impl StubProcessingService {
        fn new(answer: StubAnswer) -> Arc<Self> {
            Arc::new(Self {
                uploads: Mutex::new(Vec::new()),
                questions: Mutex::new(Vec::new()),
                answer,
            })
        }
    }

    #[async_trait]
    impl ProcessingApi for StubProcessingService {
        async fn start_processing(
            &self,
            files: Vec<UploadedFile>,
        ) -> Result<UploadReceipt, ProcessingError> {
            let names = files.iter().map(|file| file.file_name.clone()).collect();
            self.uploads.lock().await.push(files);
            Ok(UploadReceipt {
                files: names,
                status: StatusKind::Processing,
            })
        }

        fn processing_status(&self) -> ProcessingStatus {
            ProcessingStatus {
                status: StatusKind::Processing,
                message: "Creating text chunks...".into(),
            }
        }

        async fn answer_question(&self, question: &str) -> Result<String, AnswerError> {
            self.questions.lock().await.push(question.to_string());
            match self.answer.clone() {
                StubAnswer::Answer(text) => Ok(text.to_string()),
                StubAnswer::NotReady(status) => Err(AnswerError::NotReady(ProcessingStatus {
                    status,
                    message: String::new(),
                })),
                StubAnswer::NoDocuments => Err(AnswerError::NoDocuments),
                StubAnswer::Failed(detail) => Err(AnswerError::Failed(detail.to_string())),
            }
        }

        fn metrics_snapshot(&self) -> MetricsSnapshot {
            MetricsSnapshot {
                runs_completed: 1,
                runs_failed: 0,
                chunks_indexed: 3,
                last_chunk_count: Some(3),
                questions_answered: 2,
            }
        }
    }

    fn router_config() -> RouterConfig {
        RouterConfig {
            max_upload_bytes: 20 * 1024 * 1024,
            max_request_bytes: 25 * 1024 * 1024,
            static_dir: PathBuf::from("static"),
        }
    }

    fn multipart_body(parts: &[(&str, Option<&str>, &[u8])]) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, file_name, bytes) in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            match file_name {
                Some(file_name) => body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: application/pdf\r\n\r\n"
                    )
                    .as_bytes(),
                ),
                None => body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                ),
            }
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn upload_request(body: Vec<u8>) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri("/upload-pdfs/")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .header("content-length", body.len())
            .body(Body::from(body))
            .expect("request")
    }

    fn ask_request(question: &str) -> Request<Body> {
        let body = format!("question={}", question.replace(' ', "+"));
        Request::builder()
            .method(Method::POST)
            .uri("/ask-question/")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .expect("request")
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        serde_json::from_slice(&body).expect("json body")
    }

    #[tokio::test]
    async fn upload_accepts_pdfs_and_reports_processing() {
        let service = StubProcessingService::new(StubAnswer::Answer("unused"));
        let app = create_router(service.clone(), router_config());

        let body = multipart_body(&[
            ("files", Some("a.pdf"), b"%PDF-1.5 first"),
            ("files", Some("b.pdf"), b"%PDF-1.5 second"),
        ]);
        let response = app.oneshot(upload_request(body)).await.expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(
            json["message"],
            "Files uploaded successfully. Processing started."
        );
        assert_eq!(json["files"], serde_json::json!(["a.pdf", "b.pdf"]));
        assert_eq!(json["status"], "processing");

        let uploads = service.uploads.lock().await;
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0][1].bytes, b"%PDF-1.5 second");
    }

    #[tokio::test]
    async fn upload_without_files_is_rejected() {
        let service = StubProcessingService::new(StubAnswer::Answer("unused"));
        let app = create_router(service.clone(), router_config());

        let body = multipart_body(&[("note", None, b"hello")]);
        let response = app.oneshot(upload_request(body)).await.expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["detail"], "No files provided");
        assert!(service.uploads.lock().await.is_empty());
    }

    #[tokio::test]
    async fn upload_with_non_pdf_is_rejected_before_storing() {
        let service = StubProcessingService::new(StubAnswer::Answer("unused"));
        let app = create_router(service.clone(), router_config());

        let body = multipart_body(&[
            ("files", Some("a.pdf"), b"%PDF"),
            ("files", Some("notes.txt"), b"text"),
        ]);
        let response = app.oneshot(upload_request(body)).await.expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(response).await["detail"],
            "File notes.txt is not a PDF"
        );
        assert!(service.uploads.lock().await.is_empty());
    }

    #[tokio::test]
    async fn upload_extension_check_is_case_sensitive() {
        let service = StubProcessingService::new(StubAnswer::Answer("unused"));
        let app = create_router(service.clone(), router_config());

        let body = multipart_body(&[("files", Some("SCAN.PDF"), b"%PDF")]);
        let response = app.oneshot(upload_request(body)).await.expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(response).await["detail"],
            "File SCAN.PDF is not a PDF"
        );
        assert!(service.uploads.lock().await.is_empty());
    }

    #[tokio::test]
    async fn upload_over_aggregate_limit_is_rejected() {
        let service = StubProcessingService::new(StubAnswer::Answer("unused"));
        let config = RouterConfig {
            max_upload_bytes: 1024 * 1024,
            ..router_config()
        };
        let app = create_router(service.clone(), config);

        let half = vec![b'x'; 600 * 1024];
        let body = multipart_body(&[
            ("files", Some("a.pdf"), &half),
            ("files", Some("b.pdf"), &half),
        ]);
        let response = app.oneshot(upload_request(body)).await.expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(response).await["detail"],
            "Total file size exceeds 1MB limit"
        );
        assert!(service.uploads.lock().await.is_empty());
    }

    #[tokio::test]
    async fn declared_length_over_request_limit_is_413() {
        let service = StubProcessingService::new(StubAnswer::Answer("unused"));
        let config = RouterConfig {
            max_request_bytes: 1024,
            ..router_config()
        };
        let app = create_router(service.clone(), config);

        let request = Request::builder()
            .method(Method::POST)
            .uri("/upload-pdfs/")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .header("content-length", "4096")
            .body(Body::empty())
            .expect("request");
        let response = app.oneshot(request).await.expect("response");

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"Request too large");
        assert!(service.uploads.lock().await.is_empty());
    }

    #[tokio::test]
    async fn status_route_returns_tracker_snapshot() {
        let app = create_router(
            StubProcessingService::new(StubAnswer::Answer("unused")),
            router_config(),
        );
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/processing-status/")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await,
            serde_json::json!({ "status": "processing", "message": "Creating text chunks..." })
        );
    }

    #[tokio::test]
    async fn ask_returns_question_and_answer() {
        let service = StubProcessingService::new(StubAnswer::Answer("Paris."));
        let app = create_router(service.clone(), router_config());

        let response = app
            .oneshot(ask_request("What is the capital of France?"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["question"], "What is the capital of France?");
        assert_eq!(json["answer"], "Paris.");
        assert_eq!(
            service.questions.lock().await.as_slice(),
            ["What is the capital of France?".to_string()]
        );
    }

    #[tokio::test]
    async fn ask_before_completion_reports_status() {
        let app = create_router(
            StubProcessingService::new(StubAnswer::NotReady(StatusKind::Processing)),
            router_config(),
        );
        let response = app.oneshot(ask_request("hello")).await.expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(response).await,
            serde_json::json!({
                "message": "PDF processing not completed. Current status: processing",
                "status": "processing",
            })
        );
    }

    #[tokio::test]
    async fn ask_without_documents_is_400() {
        let app = create_router(
            StubProcessingService::new(StubAnswer::NoDocuments),
            router_config(),
        );
        let response = app.oneshot(ask_request("hello")).await.expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(response).await["detail"],
            "No processed documents found. Please upload PDFs first."
        );
    }

    #[tokio::test]
    async fn ask_failure_is_500_with_detail() {
        let app = create_router(
            StubProcessingService::new(StubAnswer::Failed("model offline")),
            router_config(),
        );
        let response = app.oneshot(ask_request("hello")).await.expect("response");

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            json_body(response).await["detail"],
            "Error processing question: model offline"
        );
    }

    #[tokio::test]
    async fn metrics_route_serializes_snapshot() {
        let app = create_router(
            StubProcessingService::new(StubAnswer::Answer("unused")),
            router_config(),
        );
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/metrics")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["chunks_indexed"], 3);
        assert_eq!(json["questions_answered"], 2);
    }

    #[tokio::test]
    async fn landing_page_is_served_from_static_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<h1>PDF Q&A</h1>").unwrap();
        let config = RouterConfig {
            static_dir: dir.path().to_path_buf(),
            ..router_config()
        };
        let app = create_router(
            StubProcessingService::new(StubAnswer::Answer("unused")),
            config,
        );

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"<h1>PDF Q&A</h1>");
    }
}
