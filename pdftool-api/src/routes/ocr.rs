use crate::decode::declares_pdf;
use crate::error::{ApiError, ApiResponse};
use crate::state::AppState;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::Json;
use pdftool::{object_key, OcrDocument};
use tracing::info;

/// `POST /v1/ocr`
///
/// Uploads the document to the object store under a fresh key, hands the
/// provider a time-limited URL for it and relays the recognized pages. The
/// upload is left for the retention janitor.
pub async fn recognize(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ApiResponse<OcrDocument>>, ApiError> {
    let (Some(store), Some(ocr)) = (state.store.clone(), state.ocr.clone()) else {
        return Err(ApiError::Internal("OCR is not configured".to_string()));
    };

    let mut multipart = multipart?;
    let mut upload = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        if !declares_pdf(field.content_type()) {
            return Err(ApiError::bad_request(
                "Invalid file type. Only PDF files are allowed",
            ));
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await?;
        upload = Some((filename, bytes));
        break;
    }

    let Some((filename, bytes)) = upload else {
        return Err(ApiError::bad_request("No file uploaded"));
    };
    if bytes.is_empty() {
        return Err(ApiError::bad_request("File cannot be empty"));
    }

    let key = object_key(&filename);
    let size = bytes.len();
    store.put(&key, bytes).await?;
    info!(%key, bucket = store.bucket(), bytes = size, "stored OCR upload");

    let url = store.document_url(&key).await?;
    let document = ocr.recognize(&url).await?;

    info!(%key, pages = document.pages.len(), "OCR completed");
    Ok(Json(ApiResponse::data(document)))
}
