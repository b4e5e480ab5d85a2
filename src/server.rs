//! HTTP API for the knowledge assistant.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`    | `/` | Liveness banner |
//! | `POST`   | `/upload` | Multipart upload (`file` field) of a PDF or Word document |
//! | `POST`   | `/chat` | Answer a question from the stored documents |
//! | `GET`    | `/documents` | Per-document chunk counts |
//! | `DELETE` | `/documents/{filename}` | Remove a document and its uploaded file |
//! | `DELETE` | `/clear` | Remove every document and uploaded file |
//! | `POST`   | `/scan-uploads` | Ingest files in the upload folder not yet stored |
//! | `GET`    | `/suggestions` | Starter questions |
//! | `GET`    | `/info` | Collection summary |
//! | `GET`    | `/health` | Startup status and counts |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "message must not be empty" } }
//! ```
//!
//! Store, embedding and model calls are blocking and run on tokio's
//! blocking pool.

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::chat::{ChatAnswer, ChatHandler};
use crate::config::{Config, ServerConfig};
use crate::embedding::create_provider;
use crate::error::Error;
use crate::extract::{DocumentFormat, SUPPORTED_EXTENSIONS};
use crate::ingest::DocumentProcessor;
use crate::llm::{LanguageModel, ServingEndpoint};
use crate::models::{CollectionInfo, DocumentSummary};
use crate::store::KnowledgeStore;

const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;
/// Subfolder of the upload folder holding uploads until they are ingested.
const STAGING_DIR: &str = ".incoming";

/// Shared state handed to every route handler.
#[derive(Clone)]
pub struct AppState {
    store: Arc<KnowledgeStore>,
    processor: DocumentProcessor,
    chat: Arc<ChatHandler>,
    upload_dir: PathBuf,
    use_llm: bool,
    startup_complete: Arc<AtomicBool>,
}

impl AppState {
    pub fn new(
        store: Arc<KnowledgeStore>,
        processor: DocumentProcessor,
        chat: Arc<ChatHandler>,
        upload_dir: PathBuf,
        use_llm: bool,
    ) -> Self {
        Self {
            store,
            processor,
            chat,
            upload_dir,
            use_llm,
            startup_complete: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Wire up the store, processor and chat handler from config.
    ///
    /// Must be called outside the async runtime: the embedding and model
    /// clients are blocking.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let embedder = create_provider(&config.embedding)?;
        let store = Arc::new(KnowledgeStore::open_dir(
            &config.storage.data_dir(),
            Arc::from(embedder),
        )?);
        let processor = DocumentProcessor::from_config(&config.chunking)?;

        let model = ServingEndpoint::from_config(&config.llm)?
            .map(|endpoint| Arc::new(endpoint) as Arc<dyn LanguageModel>);
        let chat = Arc::new(ChatHandler::new(store.clone(), model, config.chat.clone()));

        let upload_dir = config.storage.upload_dir();
        std::fs::create_dir_all(&upload_dir)?;

        Ok(Self::new(store, processor, chat, upload_dir, config.chat.use_llm))
    }

    pub fn is_ready(&self) -> bool {
        self.startup_complete.load(Ordering::SeqCst)
    }
}

/// Build the router with CORS restricted to `allowed_origins`
/// (`"*"` allows any origin).
pub fn router(state: AppState, allowed_origins: &[String]) -> Router {
    Router::new()
        .route("/", get(handle_root))
        .route("/upload", post(handle_upload))
        .route("/chat", post(handle_chat))
        .route("/documents", get(handle_list_documents))
        .route("/documents/{filename}", delete(handle_delete_document))
        .route("/clear", delete(handle_clear))
        .route("/scan-uploads", post(handle_scan_uploads))
        .route("/suggestions", get(handle_suggestions))
        .route("/info", get(handle_info))
        .route("/health", get(handle_health))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors_layer(allowed_origins))
        .with_state(state)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origin = if allowed_origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let origins: Vec<HeaderValue> = allowed_origins
            .iter()
            .filter_map(|o| match HeaderValue::from_str(o) {
                Ok(v) => Some(v),
                Err(_) => {
                    tracing::warn!(origin = %o, "ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };
    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Ingest the upload folder in the background, then mark the server ready.
pub fn spawn_startup_scan(state: &AppState) -> tokio::task::JoinHandle<()> {
    let state = state.clone();
    tokio::task::spawn_blocking(move || {
        tracing::info!(folder = %state.upload_dir.display(), "scanning upload folder");
        match state.processor.process_folder(&state.upload_dir, &state.store) {
            Ok(report) => tracing::info!(
                processed = report.processed_files.len(),
                skipped = report.skipped_files.len(),
                errors = report.errors.len(),
                chunks = report.total_chunks,
                "startup scan finished"
            ),
            Err(e) => tracing::error!(error = %e, "startup scan failed"),
        }
        state.startup_complete.store(true, Ordering::SeqCst);
    })
}

/// Serve until the process is terminated.
pub async fn run_server(state: AppState, server: &ServerConfig) -> anyhow::Result<()> {
    spawn_startup_scan(&state);
    let app = router(state, &server.allowed_origins);

    let listener = tokio::net::TcpListener::bind(&server.bind).await?;
    tracing::info!(bind = %server.bind, "knowledge assistant listening");
    axum::serve(listener, app).await?;
    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl AppError {
    fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        let message = err.to_string();
        match err {
            Error::UnsupportedFormat(_) => {
                AppError::new(StatusCode::BAD_REQUEST, "unsupported_format", message)
            }
            Error::Extraction(_) => {
                AppError::new(StatusCode::UNPROCESSABLE_ENTITY, "extraction_failed", message)
            }
            Error::EmbeddingProvider(_) => {
                AppError::new(StatusCode::BAD_GATEWAY, "embedding_error", message)
            }
            Error::Llm(_) => AppError::new(StatusCode::BAD_GATEWAY, "llm_error", message),
            Error::Storage(_) => {
                AppError::new(StatusCode::INTERNAL_SERVER_ERROR, "storage_error", message)
            }
            Error::Config(_) | Error::InvalidChunking { .. } => {
                AppError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
            }
        }
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::BAD_REQUEST, "bad_request", message)
}

fn internal(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
}

/// Run a blocking library call on the blocking pool.
async fn blocking<T, F>(f: F) -> Result<T, AppError>
where
    F: FnOnce() -> crate::error::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| internal(format!("task failed: {}", e)))?
        .map_err(AppError::from)
}

/// Reduce a client-supplied name to a safe file name in the upload folder.
///
/// Directory components are dropped and characters outside
/// `[A-Za-z0-9._ -]` become `_`. Returns `None` for names that end up
/// empty or hidden.
pub fn sanitize_filename(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default().trim();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | ' ') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() || cleaned.starts_with('.') {
        None
    } else {
        Some(cleaned)
    }
}

// ============ GET / ============

async fn handle_root() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": "Knowledge assistant API is running" }))
}

// ============ POST /upload ============

#[derive(Serialize)]
struct UploadResponse {
    message: String,
    filename: String,
    chunks_created: usize,
}

async fn handle_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("invalid multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let raw_name = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| bad_request("file field has no filename"))?;
        let bytes = field
            .bytes()
            .await
            .map_err(|e| bad_request(format!("failed to read upload: {}", e)))?;
        upload = Some((raw_name, bytes));
        break;
    }

    let (raw_name, bytes) = upload.ok_or_else(|| bad_request("missing multipart field: file"))?;
    let filename =
        sanitize_filename(&raw_name).ok_or_else(|| bad_request("invalid filename"))?;
    let path = state.upload_dir.join(&filename);
    DocumentFormat::from_path(&path).map_err(|e| {
        AppError::new(
            StatusCode::BAD_REQUEST,
            "unsupported_format",
            format!("{}; allowed: .{}", e, SUPPORTED_EXTENSIONS.join(", .")),
        )
    })?;

    // Staged under the same file name so the document id matches; the scan
    // only looks at files directly inside the upload folder.
    let staging_dir = state.upload_dir.join(STAGING_DIR);
    let staged = staging_dir.join(&filename);
    tokio::fs::create_dir_all(&staging_dir)
        .await
        .map_err(|e| internal(format!("failed to prepare upload: {}", e)))?;
    tokio::fs::write(&staged, &bytes)
        .await
        .map_err(|e| internal(format!("failed to save upload: {}", e)))?;

    let chunks = {
        let state = state.clone();
        let staged = staged.clone();
        blocking(move || state.processor.ingest_file(&staged, &state.store)).await
    };
    let chunks_created = match chunks {
        Ok(n) => n,
        Err(e) => {
            if let Err(rm) = tokio::fs::remove_file(&staged).await {
                tracing::warn!(file = %staged.display(), error = %rm, "failed to remove rejected upload");
            }
            return Err(e);
        }
    };
    tokio::fs::rename(&staged, &path)
        .await
        .map_err(|e| internal(format!("failed to store upload: {}", e)))?;

    tracing::info!(file = %filename, chunks = chunks_created, "upload ingested");
    Ok(Json(UploadResponse {
        message: format!("Document '{}' uploaded and processed successfully", filename),
        filename,
        chunks_created,
    }))
}

// ============ POST /chat ============

#[derive(Deserialize)]
struct ChatRequest {
    message: String,
    #[serde(default, alias = "use_openai")]
    use_llm: Option<bool>,
}

async fn handle_chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatAnswer>, AppError> {
    if req.message.trim().is_empty() {
        return Err(bad_request("message must not be empty"));
    }
    let use_llm = req.use_llm.unwrap_or(state.use_llm);
    let chat = state.chat.clone();
    let answer = blocking(move || chat.generate_response(&req.message, use_llm)).await?;
    Ok(Json(answer))
}

// ============ GET /documents ============

#[derive(Serialize)]
struct DocumentsResponse {
    documents: Vec<DocumentSummary>,
}

async fn handle_list_documents(
    State(state): State<AppState>,
) -> Result<Json<DocumentsResponse>, AppError> {
    let store = state.store.clone();
    let documents = blocking(move || store.list_documents()).await?;
    Ok(Json(DocumentsResponse { documents }))
}

// ============ DELETE /documents/{filename} ============

async fn handle_delete_document(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let store = state.store.clone();
    let id = filename.clone();
    let removed = blocking(move || store.remove_document(&id)).await?;

    if let Some(safe) = sanitize_filename(&filename) {
        let path = state.upload_dir.join(safe);
        if path.is_file() {
            tokio::fs::remove_file(&path)
                .await
                .map_err(|e| internal(format!("failed to delete {}: {}", path.display(), e)))?;
        }
    }

    Ok(Json(serde_json::json!({
        "message": format!("Document '{}' deleted successfully", filename),
        "chunks_removed": removed,
    })))
}

// ============ DELETE /clear ============

async fn handle_clear(State(state): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let store = state.store.clone();
    blocking(move || store.clear_all()).await?;

    let mut files_removed = 0usize;
    if let Ok(mut entries) = tokio::fs::read_dir(&state.upload_dir).await {
        while let Ok(Some(entry)) = entries.next_entry().await {
            let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
            if !is_file {
                continue;
            }
            match tokio::fs::remove_file(entry.path()).await {
                Ok(()) => files_removed += 1,
                Err(e) => tracing::warn!(file = %entry.path().display(), error = %e, "failed to remove upload"),
            }
        }
    }

    Ok(Json(serde_json::json!({
        "message": "All documents cleared successfully",
        "files_removed": files_removed,
    })))
}

// ============ POST /scan-uploads ============

#[derive(Serialize)]
struct ScanResponse {
    message: String,
    processed_files: Vec<String>,
    skipped_files: Vec<String>,
    errors: Vec<String>,
    total_chunks_added: usize,
    total_documents: usize,
}

async fn handle_scan_uploads(State(state): State<AppState>) -> Result<Json<ScanResponse>, AppError> {
    let (report, total_documents) = blocking(move || {
        let report = state.processor.process_folder(&state.upload_dir, &state.store)?;
        let total = state.store.list_documents()?.len();
        Ok((report, total))
    })
    .await?;

    Ok(Json(ScanResponse {
        message: "Upload folder scan completed".to_string(),
        processed_files: report.processed_files,
        skipped_files: report.skipped_files,
        errors: report.errors,
        total_chunks_added: report.total_chunks,
        total_documents,
    }))
}

// ============ GET /suggestions ============

async fn handle_suggestions(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let chat = state.chat.clone();
    let suggestions = blocking(move || chat.suggestions()).await?;
    Ok(Json(serde_json::json!({ "suggestions": suggestions })))
}

// ============ GET /info ============

async fn handle_info(State(state): State<AppState>) -> Result<Json<CollectionInfo>, AppError> {
    let store = state.store.clone();
    Ok(Json(blocking(move || store.collection_info()).await?))
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    documents_count: usize,
    knowledge_base_status: String,
    storage: String,
    upload_folder: String,
    supported_formats: Vec<String>,
    llm_configured: bool,
}

async fn handle_health(State(state): State<AppState>) -> Result<Json<HealthResponse>, AppError> {
    let ready = state.is_ready();
    let store = state.store.clone();
    let documents_count = blocking(move || store.list_documents()).await?.len();

    Ok(Json(HealthResponse {
        status: (if ready { "healthy" } else { "starting" }).to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        documents_count,
        knowledge_base_status: (if ready { "ready" } else { "initializing" }).to_string(),
        storage: state.store.location(),
        upload_folder: state.upload_dir.display().to_string(),
        supported_formats: SUPPORTED_EXTENSIONS.iter().map(|e| format!(".{}", e)).collect(),
        llm_configured: state.chat.has_model(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChatConfig;
    use crate::embedding::HashingProvider;
    use crate::persist::MemoryMedium;
    use tempfile::TempDir;

    fn test_state(upload_dir: &std::path::Path) -> AppState {
        let store = Arc::new(KnowledgeStore::open(
            Arc::new(MemoryMedium::new()),
            Arc::new(HashingProvider::new(128).unwrap()),
        ));
        let chat = Arc::new(ChatHandler::new(store.clone(), None, ChatConfig::default()));
        AppState::new(
            store,
            DocumentProcessor::default(),
            chat,
            upload_dir.to_path_buf(),
            false,
        )
    }

    async fn spawn_app(state: AppState) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = router(state, &["*".to_string()]);
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[test]
    fn sanitize_strips_directories_and_symbols() {
        assert_eq!(sanitize_filename("../../etc/passwd.pdf").unwrap(), "passwd.pdf");
        assert_eq!(sanitize_filename("C:\\docs\\Q1 report.docx").unwrap(), "Q1 report.docx");
        assert_eq!(sanitize_filename("a;b$.pdf").unwrap(), "a_b_.pdf");
        assert!(sanitize_filename("..").is_none());
        assert!(sanitize_filename(".hidden.pdf").is_none());
        assert!(sanitize_filename("dir/").is_none());
    }

    #[test]
    fn library_errors_map_to_statuses() {
        let e: AppError = Error::UnsupportedFormat(".txt".into()).into();
        assert_eq!(e.status, StatusCode::BAD_REQUEST);
        let e: AppError = Error::Extraction("bad".into()).into();
        assert_eq!(e.status, StatusCode::UNPROCESSABLE_ENTITY);
        let e: AppError = Error::Storage("disk".into()).into();
        assert_eq!(e.code, "storage_error");
    }

    #[tokio::test]
    async fn health_reports_starting_then_ready() {
        let tmp = TempDir::new().unwrap();
        let state = test_state(tmp.path());
        let base = spawn_app(state.clone()).await;

        let body: serde_json::Value = reqwest::get(format!("{}/health", base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["status"], "starting");

        spawn_startup_scan(&state).await.unwrap();
        let body: serde_json::Value = reqwest::get(format!("{}/health", base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["documents_count"], 0);
    }

    #[tokio::test]
    async fn chat_on_empty_store_returns_canned_reply() {
        let tmp = TempDir::new().unwrap();
        let base = spawn_app(test_state(tmp.path())).await;

        let resp = reqwest::Client::new()
            .post(format!("{}/chat", base))
            .json(&serde_json::json!({ "message": "what is the policy?" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["response"], crate::chat::NO_DOCUMENTS_RESPONSE);
        assert_eq!(body["sources"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn empty_chat_message_is_bad_request() {
        let tmp = TempDir::new().unwrap();
        let base = spawn_app(test_state(tmp.path())).await;

        let resp = reqwest::Client::new()
            .post(format!("{}/chat", base))
            .json(&serde_json::json!({ "message": "  " }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["error"]["code"], "bad_request");
    }

    #[tokio::test]
    async fn upload_rejects_unsupported_extension() {
        let tmp = TempDir::new().unwrap();
        let base = spawn_app(test_state(tmp.path())).await;

        let form = reqwest::multipart::Form::new().part(
            "file",
            reqwest::multipart::Part::bytes(b"hello".to_vec()).file_name("notes.txt"),
        );
        let resp = reqwest::Client::new()
            .post(format!("{}/upload", base))
            .multipart(form)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["error"]["code"], "unsupported_format");
        assert!(!tmp.path().join("notes.txt").exists());
    }

    #[tokio::test]
    async fn unreadable_upload_is_removed() {
        let tmp = TempDir::new().unwrap();
        let base = spawn_app(test_state(tmp.path())).await;

        let form = reqwest::multipart::Form::new().part(
            "file",
            reqwest::multipart::Part::bytes(b"not a pdf".to_vec()).file_name("broken.pdf"),
        );
        let resp = reqwest::Client::new()
            .post(format!("{}/upload", base))
            .multipart(form)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 422);
        assert!(!tmp.path().join("broken.pdf").exists());
        assert!(!tmp.path().join(STAGING_DIR).join("broken.pdf").exists());
    }

    fn write_docx(path: &std::path::Path, text: &str) {
        use std::io::Write;
        let file = std::fs::File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        zip.start_file("word/document.xml", zip::write::SimpleFileOptions::default())
            .unwrap();
        write!(
            zip,
            "<?xml version=\"1.0\"?><w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body><w:p><w:r><w:t>{}</w:t></w:r></w:p></w:body></w:document>",
            text
        )
        .unwrap();
        zip.finish().unwrap();
    }

    #[tokio::test]
    async fn rejected_reupload_keeps_previous_version() {
        let tmp = TempDir::new().unwrap();
        let state = test_state(tmp.path());
        let original = tmp.path().join("policy.docx");
        write_docx(&original, "Vacation policy allows twenty days.");
        state.processor.ingest_file(&original, &state.store).unwrap();
        let before = std::fs::read(&original).unwrap();
        let base = spawn_app(state.clone()).await;

        let form = reqwest::multipart::Form::new().part(
            "file",
            reqwest::multipart::Part::bytes(b"garbage".to_vec()).file_name("policy.docx"),
        );
        let resp = reqwest::Client::new()
            .post(format!("{}/upload", base))
            .multipart(form)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 422);
        assert_eq!(std::fs::read(&original).unwrap(), before);
        assert!(state.store.has_document("policy.docx").unwrap());
    }

    #[tokio::test]
    async fn accepted_upload_lands_in_upload_folder() {
        let tmp = TempDir::new().unwrap();
        let state = test_state(tmp.path());
        let base = spawn_app(state.clone()).await;
        let source = TempDir::new().unwrap();
        let doc = source.path().join("guide.docx");
        write_docx(&doc, "Expense reports are due monthly.");

        let form = reqwest::multipart::Form::new().part(
            "file",
            reqwest::multipart::Part::bytes(std::fs::read(&doc).unwrap()).file_name("guide.docx"),
        );
        let resp = reqwest::Client::new()
            .post(format!("{}/upload", base))
            .multipart(form)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        assert!(tmp.path().join("guide.docx").exists());
        assert!(!tmp.path().join(STAGING_DIR).join("guide.docx").exists());
        assert!(state.store.has_document("guide.docx").unwrap());
    }
}
