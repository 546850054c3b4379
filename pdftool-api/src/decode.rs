//! Dual-mode request decoding
//!
//! Transform routes accept the same job in two shapes:
//!
//! - `multipart/form-data` with a `file` part (declared `application/pdf`),
//!   an optional `pdf_password` and optional `key_length`/`permissions`
//! - a JSON envelope `{filename, password, base64_pdf}` with the same
//!   optional option fields
//!
//! Either way the document ends up at the job's input path inside a fresh
//! [`ResourceHandle`], and every rejection after that point drops the handle,
//! which removes whatever was written.

use crate::error::ApiError;
use crate::state::AppState;
use axum::body::Bytes;
use axum::extract::multipart::Field;
use axum::extract::{FromRequest, Multipart, Request};
use axum::http::header;
use base64::engine::general_purpose::STANDARD;
use base64::read::DecoderReader;
use pdftool::{JobDescriptor, JobOptions, Operation, ResourceHandle, WorkArea, PDF_MEDIA_TYPE};
use serde::Deserialize;
use std::io::{self, Cursor};
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// A job whose document has been materialized on disk
#[derive(Debug)]
pub struct DecodedJob {
    pub job: JobDescriptor,
    pub resources: ResourceHandle,
}

/// Decode `request` into a job for `operation`
pub async fn decode_job(
    state: &AppState,
    operation: Operation,
    request: Request,
) -> Result<DecodedJob, ApiError> {
    if is_multipart(&request) {
        let multipart = Multipart::from_request(request, &()).await?;
        decode_multipart(&state.work_area, operation, multipart).await
    } else {
        let body = Bytes::from_request(request, &()).await?;
        decode_json(&state.work_area, operation, body).await
    }
}

pub(crate) fn is_multipart(request: &Request) -> bool {
    request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| {
            value
                .trim_start()
                .to_ascii_lowercase()
                .starts_with("multipart/form-data")
        })
}

/// Whether a part's declared media type is PDF, ignoring parameters
pub(crate) fn declares_pdf(content_type: Option<&str>) -> bool {
    content_type
        .and_then(|value| value.split(';').next())
        .is_some_and(|essence| essence.trim().eq_ignore_ascii_case(PDF_MEDIA_TYPE))
}

async fn decode_multipart(
    work_area: &WorkArea,
    operation: Operation,
    mut multipart: Multipart,
) -> Result<DecodedJob, ApiError> {
    let mut upload: Option<(String, ResourceHandle, u64)> = None;
    let mut password = None;
    let mut key_length = None;
    let mut permissions = None;

    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        match name.as_str() {
            "file" if upload.is_none() => {
                if !declares_pdf(field.content_type()) {
                    return Err(ApiError::bad_request(
                        "Invalid file type. Only PDF files are allowed",
                    ));
                }
                let filename = field.file_name().unwrap_or_default().to_string();
                let resources = work_area.allocate()?;
                let written = persist_field(field, resources.input_path().to_path_buf()).await?;
                if written == 0 {
                    return Err(ApiError::bad_request("File cannot be empty"));
                }
                upload = Some((filename, resources, written));
            }
            "pdf_password" => password = Some(field.text().await?),
            "key_length" => key_length = Some(field.text().await?),
            "permissions" => permissions = Some(field.text().await?),
            _ => {}
        }
    }

    let Some((filename, resources, written)) = upload else {
        return Err(ApiError::bad_request("No file uploaded"));
    };

    let options = JobOptions::from_fields(key_length.as_deref(), permissions.as_deref())?;
    let job = JobDescriptor::builder(operation, filename)
        .password(password)
        .options(options)
        .content_length(written)
        .build()?;

    debug!(job_id = %resources.id(), %operation, bytes = written, "decoded multipart job");
    Ok(DecodedJob { job, resources })
}

/// Stream one multipart field to `path` chunk by chunk
async fn persist_field(mut field: Field<'_>, path: PathBuf) -> Result<u64, ApiError> {
    let mut file = tokio::fs::File::create(&path).await?;
    let mut written = 0u64;
    while let Some(chunk) = field.chunk().await? {
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    Ok(written)
}

#[derive(Debug, Deserialize)]
struct JsonEnvelope {
    #[serde(default)]
    filename: String,
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    base64_pdf: String,
    #[serde(default)]
    key_length: Option<String>,
    #[serde(default)]
    permissions: Option<String>,
}

async fn decode_json(
    work_area: &WorkArea,
    operation: Operation,
    body: Bytes,
) -> Result<DecodedJob, ApiError> {
    let envelope: JsonEnvelope =
        serde_json::from_slice(&body).map_err(|_| ApiError::bad_request("Invalid JSON body"))?;
    drop(body);

    if envelope.base64_pdf.is_empty() {
        return Err(ApiError::bad_request("PDF data cannot be empty"));
    }

    let options = JobOptions::from_fields(
        envelope.key_length.as_deref(),
        envelope.permissions.as_deref(),
    )?;
    let builder = JobDescriptor::builder(operation, envelope.filename)
        .password(envelope.password)
        .options(options);
    // nothing is on disk yet, so reject before allocating
    builder.check_password()?;

    let resources = work_area.allocate()?;
    let written = decode_base64_to(envelope.base64_pdf, resources.input_path().to_path_buf()).await?;
    if written == 0 {
        return Err(ApiError::bad_request("Decoded PDF data cannot be empty"));
    }

    let job = builder.content_length(written).build()?;

    debug!(job_id = %resources.id(), %operation, bytes = written, "decoded JSON job");
    Ok(DecodedJob { job, resources })
}

/// Reader that drops `\r` and `\n`, so MIME-wrapped base64 decodes
struct SkipLineBreaks<R> {
    inner: R,
}

impl<R: io::Read> io::Read for SkipLineBreaks<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            let read = self.inner.read(buf)?;
            if read == 0 {
                return Ok(0);
            }
            let mut kept = 0;
            for i in 0..read {
                let byte = buf[i];
                if byte != b'\r' && byte != b'\n' {
                    buf[kept] = byte;
                    kept += 1;
                }
            }
            // a chunk of only line breaks is not end of input
            if kept > 0 {
                return Ok(kept);
            }
        }
    }
}

/// Decode standard base64 straight into `path` on a blocking thread
async fn decode_base64_to(encoded: String, path: PathBuf) -> Result<u64, ApiError> {
    let decoded = tokio::task::spawn_blocking(move || -> io::Result<u64> {
        let source = SkipLineBreaks {
            inner: Cursor::new(encoded.trim().as_bytes()),
        };
        let mut reader = DecoderReader::new(source, &STANDARD);
        let mut file = io::BufWriter::new(std::fs::File::create(&path)?);
        let written = io::copy(&mut reader, &mut file)?;
        io::Write::flush(&mut file)?;
        Ok(written)
    })
    .await
    .map_err(|err| ApiError::Internal(format!("Decoder task failed: {err}")))?;

    match decoded {
        Ok(written) => Ok(written),
        Err(err) if err.kind() == io::ErrorKind::InvalidData => {
            Err(ApiError::bad_request("Invalid base64 PDF data"))
        }
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use tempfile::TempDir;

    fn work_area() -> (TempDir, WorkArea) {
        let root = TempDir::new().unwrap();
        let area = WorkArea::new(root.path()).unwrap();
        (root, area)
    }

    fn entries(area: &WorkArea) -> usize {
        std::fs::read_dir(area.root()).unwrap().count()
    }

    fn envelope(value: serde_json::Value) -> Bytes {
        Bytes::from(serde_json::to_vec(&value).unwrap())
    }

    #[test]
    fn test_declares_pdf() {
        assert!(declares_pdf(Some("application/pdf")));
        assert!(declares_pdf(Some("Application/PDF; charset=binary")));
        assert!(!declares_pdf(Some("text/plain")));
        assert!(!declares_pdf(None));
    }

    #[tokio::test]
    async fn test_json_job_is_materialized() {
        let (_root, area) = work_area();
        let body = envelope(serde_json::json!({
            "filename": "Annual Report.pdf",
            "password": "pw",
            "base64_pdf": STANDARD.encode(b"%PDF-1.7 hello"),
        }));

        let decoded = decode_json(&area, Operation::Encrypt, body).await.unwrap();
        assert_eq!(decoded.job.content_length(), 14);
        assert_eq!(decoded.job.output_filename(), "encrypted_annual-report.pdf");
        assert_eq!(
            std::fs::read(decoded.resources.input_path()).unwrap(),
            b"%PDF-1.7 hello"
        );
    }

    #[tokio::test]
    async fn test_json_line_wrapped_payload() {
        let (_root, area) = work_area();
        let document: Vec<u8> = (0..200u8).collect();
        let encoded = STANDARD.encode(&document);
        let wrapped = encoded
            .as_bytes()
            .chunks(76)
            .map(|line| std::str::from_utf8(line).unwrap())
            .collect::<Vec<_>>()
            .join("\r\n");
        assert!(wrapped.contains('\n'));

        let body = envelope(serde_json::json!({
            "filename": "a.pdf",
            "base64_pdf": wrapped,
        }));

        let decoded = decode_json(&area, Operation::Repair, body).await.unwrap();
        assert_eq!(decoded.job.content_length(), 200);
        assert_eq!(
            std::fs::read(decoded.resources.input_path()).unwrap(),
            document
        );
    }

    #[test]
    fn test_skip_line_breaks_reader() {
        let mut reader = SkipLineBreaks {
            inner: Cursor::new(b"ab\r\n\n\ncd\n".to_vec()),
        };
        let mut out = String::new();
        io::Read::read_to_string(&mut reader, &mut out).unwrap();
        assert_eq!(out, "abcd");
    }

    #[tokio::test]
    async fn test_json_missing_password_writes_nothing() {
        let (_root, area) = work_area();
        let body = envelope(serde_json::json!({
            "filename": "a.pdf",
            "password": "",
            "base64_pdf": STANDARD.encode(b"%PDF"),
        }));

        let err = decode_json(&area, Operation::Decrypt, body).await.unwrap_err();
        assert_eq!(err.to_string(), "Password is required");
        assert_eq!(entries(&area), 0);
    }

    #[tokio::test]
    async fn test_json_rejections() {
        let (_root, area) = work_area();

        let err = decode_json(&area, Operation::Repair, Bytes::from_static(b"{not json"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid JSON body");

        let err = decode_json(&area, Operation::Repair, envelope(serde_json::json!({"filename": "a.pdf"})))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "PDF data cannot be empty");

        let err = decode_json(
            &area,
            Operation::Repair,
            envelope(serde_json::json!({"filename": "a.pdf", "base64_pdf": "***not base64***"})),
        )
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "Invalid base64 PDF data");

        let err = decode_json(
            &area,
            Operation::Repair,
            envelope(serde_json::json!({"filename": "a.pdf", "base64_pdf": "===="})),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));

        assert_eq!(entries(&area), 0);
    }

    #[tokio::test]
    async fn test_json_invalid_option() {
        let (_root, area) = work_area();
        let body = envelope(serde_json::json!({
            "filename": "a.pdf",
            "password": "pw",
            "base64_pdf": STANDARD.encode(b"%PDF"),
            "key_length": "40",
        }));

        let err = decode_json(&area, Operation::Encrypt, body).await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid option key_length: 40");
        assert_eq!(entries(&area), 0);
    }
}
