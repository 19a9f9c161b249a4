use crate::block_data::ImageFile;
use crate::config::UploadConfig;
use crate::constants::{FALLBACK_MIME_TYPE, UPLOAD_FAILED_MESSAGE};
use image::ImageFormat;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::oneshot;

/// Why a single upload attempt failed. Every variant ends the attempt; nothing is retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadError {
    /// The request never produced a response: connection, timeout, or local file I/O.
    #[error("upload transport failed: {0}")]
    Transport(String),
    /// The server answered with a non-2xx status or `success` other than 1.
    #[error("upload rejected by server: {0}")]
    Rejected(String),
    /// The body was not JSON or carried no `file.url`.
    #[error("malformed upload response: {0}")]
    MalformedResponse(String),
}

impl UploadError {
    /// All failures read the same to the user.
    pub fn user_message(&self) -> &'static str {
        UPLOAD_FAILED_MESSAGE
    }
}

impl From<reqwest::Error> for UploadError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            UploadError::Transport("request timed out".to_string())
        } else if let Some(status) = error.status() {
            UploadError::Rejected(format!("HTTP {status}"))
        } else {
            UploadError::Transport(error.to_string())
        }
    }
}

/// A well-formed success body: `{ "success": 1, "file": { "url": ..., ... } }`.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadResponse {
    pub file: ImageFile,
    pub body: Value,
}

pub type UploadOutcome = Result<UploadResponse, UploadError>;

/// Interprets the endpoint's answer according to the upload wire contract.
pub fn parse_response(status: StatusCode, body: &str) -> UploadOutcome {
    if !status.is_success() {
        return Err(UploadError::Rejected(format!("HTTP {status}")));
    }

    let body: Value = serde_json::from_str(body)
        .map_err(|err| UploadError::MalformedResponse(format!("body is not JSON: {err}")))?;

    match body.get("success").and_then(Value::as_i64) {
        Some(1) => {}
        Some(flag) => return Err(UploadError::Rejected(format!("success flag was {flag}"))),
        None => return Err(UploadError::Rejected("success flag missing".to_string())),
    }

    let file = body
        .get("file")
        .cloned()
        .and_then(ImageFile::from_value)
        .ok_or_else(|| UploadError::MalformedResponse("response has no file.url".to_string()))?;

    Ok(UploadResponse { file, body })
}

// =============================================================================
// MIME FILTER
// =============================================================================

/// File extensions allowed by an accept list such as `image/*`, `image/png, .webp`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MimeFilter {
    extensions: Vec<String>,
}

impl MimeFilter {
    pub fn parse(types: &str) -> Self {
        let mut extensions: Vec<String> = Vec::new();
        for token in types.split(',').map(|t| t.trim().to_ascii_lowercase()) {
            if token.is_empty() {
                continue;
            }
            let found: Vec<String> = if let Some(ext) = token.strip_prefix('.') {
                vec![ext.to_string()]
            } else if token == "image/*" || token == "*/*" {
                ImageFormat::all()
                    .flat_map(|format| format.extensions_str().iter())
                    .map(|ext| ext.to_string())
                    .collect()
            } else if let Some(format) = ImageFormat::from_mime_type(&token) {
                format.extensions_str().iter().map(|ext| ext.to_string()).collect()
            } else {
                log::debug!("Accept entry {token} has no known file extensions");
                Vec::new()
            };
            for ext in found {
                if !extensions.contains(&ext) {
                    extensions.push(ext);
                }
            }
        }
        Self { extensions }
    }

    /// Extensions for the file dialog. Empty means no restriction.
    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    pub fn accepts(&self, path: &Path) -> bool {
        if self.extensions.is_empty() {
            return true;
        }
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                self.extensions
                    .iter()
                    .any(|allowed| allowed.eq_ignore_ascii_case(ext))
            })
            .unwrap_or(false)
    }
}

/// MIME type for the multipart file part, guessed from the extension.
pub fn mime_for_path(path: &Path) -> &'static str {
    ImageFormat::from_path(path)
        .map(|format| format.to_mime_type())
        .unwrap_or(FALLBACK_MIME_TYPE)
}

// =============================================================================
// FILE SELECTION
// =============================================================================

/// Source of the file to upload.
pub trait FilePicker {
    fn pick_file(&self, filter: &MimeFilter) -> Option<PathBuf>;
}

/// Native file dialog.
pub struct DialogPicker;

impl FilePicker for DialogPicker {
    fn pick_file(&self, filter: &MimeFilter) -> Option<PathBuf> {
        let mut dialog = rfd::FileDialog::new();
        if !filter.extensions().is_empty() {
            dialog = dialog.add_filter("Images", filter.extensions());
        }
        dialog.pick_file()
    }
}

// =============================================================================
// COMPLETION CHANNEL
// =============================================================================

/// Sending half of one upload attempt. Consumed on completion, so an attempt
/// resolves at most once.
pub struct UploadCompleter {
    tx: oneshot::Sender<UploadOutcome>,
}

impl UploadCompleter {
    pub fn complete(self, outcome: UploadOutcome) {
        if self.tx.send(outcome).is_err() {
            log::debug!("Upload finished after its block went away");
        }
    }

    pub fn succeed(self, response: UploadResponse) {
        self.complete(Ok(response));
    }

    pub fn fail(self, error: UploadError) {
        self.complete(Err(error));
    }
}

/// Receiving half of one upload attempt, owned by the block that started it.
pub struct PendingUpload {
    rx: oneshot::Receiver<UploadOutcome>,
}

pub fn pending_upload() -> (UploadCompleter, PendingUpload) {
    let (tx, rx) = oneshot::channel();
    (UploadCompleter { tx }, PendingUpload { rx })
}

impl PendingUpload {
    /// Returns the outcome if the attempt has resolved, or hands the pending
    /// upload back to be polled again.
    pub fn try_finish(mut self) -> Result<UploadOutcome, PendingUpload> {
        match self.rx.try_recv() {
            Ok(outcome) => Ok(outcome),
            Err(oneshot::error::TryRecvError::Empty) => Err(self),
            Err(oneshot::error::TryRecvError::Closed) => Ok(Err(abandoned())),
        }
    }

    pub async fn wait(self) -> UploadOutcome {
        self.rx.await.unwrap_or_else(|_| Err(abandoned()))
    }
}

fn abandoned() -> UploadError {
    UploadError::Transport("upload task ended without a result".to_string())
}

// =============================================================================
// COORDINATOR
// =============================================================================

/// What a block needs from the upload side: start an attempt and get a handle to its result.
///
/// `on_preview_start` runs before the request is sent, and therefore before the
/// attempt can resolve.
pub trait Uploader {
    /// Asks the user for a file and uploads it. `None` when the dialog was cancelled.
    fn prompt_and_upload(&self, on_preview_start: &mut dyn FnMut()) -> Option<PendingUpload>;

    /// Asks the endpoint to fetch a remote image by URL.
    fn upload_by_url(&self, url: &str, on_preview_start: &mut dyn FnMut()) -> PendingUpload;
}

/// Picks files and sends them to the configured endpoint on a tokio runtime.
pub struct UploadCoordinator {
    config: Arc<UploadConfig>,
    client: Client,
    runtime: Handle,
    picker: Box<dyn FilePicker>,
}

impl UploadCoordinator {
    pub fn new(config: Arc<UploadConfig>, runtime: Handle) -> Self {
        Self::with_picker(config, runtime, Box::new(DialogPicker))
    }

    pub fn with_picker(
        config: Arc<UploadConfig>,
        runtime: Handle,
        picker: Box<dyn FilePicker>,
    ) -> Self {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .unwrap_or_else(|err| {
                log::warn!("Falling back to default HTTP client: {err}");
                Client::new()
            });
        Self {
            config,
            client,
            runtime,
            picker,
        }
    }

    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    /// Uploads `path` on the runtime and returns the attempt's result handle.
    pub fn upload_path(&self, path: PathBuf) -> PendingUpload {
        let (completer, pending) = pending_upload();
        let client = self.client.clone();
        let config = Arc::clone(&self.config);
        self.runtime.spawn(async move {
            let outcome = send_file(&client, &config, &path).await;
            log_outcome(&outcome);
            completer.complete(outcome);
        });
        pending
    }
}

impl Uploader for UploadCoordinator {
    fn prompt_and_upload(&self, on_preview_start: &mut dyn FnMut()) -> Option<PendingUpload> {
        let filter = MimeFilter::parse(&self.config.types);
        let path = self.picker.pick_file(&filter)?;
        if !filter.accepts(&path) {
            log::warn!("Picked file {} does not match {}", path.display(), self.config.types);
        }
        on_preview_start();
        Some(self.upload_path(path))
    }

    fn upload_by_url(&self, url: &str, on_preview_start: &mut dyn FnMut()) -> PendingUpload {
        on_preview_start();
        let (completer, pending) = pending_upload();
        let client = self.client.clone();
        let config = Arc::clone(&self.config);
        let url = url.to_string();
        self.runtime.spawn(async move {
            let outcome = send_url(&client, &config, &url).await;
            log_outcome(&outcome);
            completer.complete(outcome);
        });
        pending
    }
}

fn log_outcome(outcome: &UploadOutcome) {
    match outcome {
        Ok(response) => log::info!("Upload finished: {}", response.file.url),
        Err(err) => log::warn!("Upload failed: {err}"),
    }
}

fn with_headers(mut request: RequestBuilder, config: &UploadConfig) -> RequestBuilder {
    for (name, value) in &config.additional_request_headers {
        request = request.header(name.as_str(), value.as_str());
    }
    request
}

async fn send(request: RequestBuilder) -> UploadOutcome {
    let response = request.send().await?;
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|err| UploadError::MalformedResponse(format!("unreadable body: {err}")))?;
    parse_response(status, &body)
}

/// Sends one file as multipart form data under `config.field`.
pub async fn send_file(client: &Client, config: &UploadConfig, path: &Path) -> UploadOutcome {
    if config.endpoint.is_empty() {
        return Err(UploadError::Transport("no upload endpoint configured".to_string()));
    }

    let bytes = tokio::fs::read(path)
        .await
        .map_err(|err| UploadError::Transport(format!("Failed to read {}: {err}", path.display())))?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());
    log::info!(
        "Uploading {file_name} ({} bytes) to {} as '{}'",
        bytes.len(),
        config.endpoint,
        config.field
    );

    let part = Part::bytes(bytes)
        .file_name(file_name)
        .mime_str(mime_for_path(path))?;
    let mut form = Form::new().part(config.field.clone(), part);
    for (key, value) in &config.additional_request_data {
        form = form.text(key.clone(), form_text(value));
    }

    send(with_headers(client.post(&config.endpoint), config).multipart(form)).await
}

/// Asks the endpoint to fetch `url` itself.
///
/// With `endpointByUrl` configured the URL goes out as a JSON body; otherwise
/// it is sent to the file endpoint as a multipart `url` field.
pub async fn send_url(client: &Client, config: &UploadConfig, url: &str) -> UploadOutcome {
    let endpoint = config.url_endpoint();
    if endpoint.is_empty() {
        return Err(UploadError::Transport("no upload endpoint configured".to_string()));
    }
    log::info!("Uploading remote image {url} via {endpoint}");

    let request = with_headers(client.post(endpoint), config);
    let request = if config.endpoint_by_url.is_some() {
        let mut body = serde_json::Map::new();
        for (key, value) in &config.additional_request_data {
            body.insert(key.clone(), value.clone());
        }
        body.insert("url".to_string(), Value::String(url.to_string()));
        request.json(&body)
    } else {
        let mut form = Form::new().text("url", url.to_string());
        for (key, value) in &config.additional_request_data {
            form = form.text(key.clone(), form_text(value));
        }
        request.multipart(form)
    };

    send(request).await
}

/// Form fields carry strings as-is and any other JSON value in its text form.
fn form_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
