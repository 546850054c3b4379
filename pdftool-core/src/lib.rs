//! # pdftool
//!
//! Job-handling substrate for the pdftool HTTP service.
//!
//! The crate owns everything between "a request body arrived" and "a file was
//! produced", independent of the web framework:
//!
//! - **Jobs**: [`JobDescriptor`] and the naming rules for downloads
//! - **Workspaces**: [`WorkArea`] hands out per-job [`ResourceHandle`]s whose
//!   release is idempotent and runs on drop
//! - **Deadlines**: [`run_with_deadline`] races a spawned unit of work against
//!   a timer and aborts the loser
//! - **Engines**: the [`DocumentEngine`] trait, the `qpdf`-backed
//!   [`QpdfEngine`] and the in-process [`MockEngine`]
//! - **Invocation**: [`TransformInvoker`] applies the validation rules around
//!   each engine call
//! - **Retention**: [`BlobStore`] implementations and the [`Janitor`] that
//!   reaps old objects
//! - **OCR**: the [`OcrService`] trait and its HTTP client
//!
//! # Example
//!
//! ```rust,no_run
//! use pdftool::{JobDescriptor, MockEngine, Operation, TransformInvoker, WorkArea};
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let area = WorkArea::new(std::env::temp_dir())?;
//! let handle = area.allocate()?;
//! std::fs::write(handle.input_path(), b"%PDF-1.7 ...")?;
//!
//! let job = JobDescriptor::builder(Operation::Optimize, "report.pdf")
//!     .content_length(12)
//!     .build()?;
//!
//! let invoker = TransformInvoker::new(Arc::new(MockEngine::new()));
//! invoker.invoke(&job, &handle).await?;
//! # Ok(())
//! # }
//! ```

pub mod deadline;
pub mod engine;
pub mod error;
pub mod invoke;
pub mod janitor;
pub mod job;
pub mod naming;
pub mod ocr;
pub mod storage;
pub mod workspace;

pub use deadline::{run_with_deadline, DeadlineError};
pub use engine::{
    presentable_message, DocumentEngine, EncryptOptions, EngineError, KeyLength, MockEngine,
    OptimizeFlags, PermissionPolicy, QpdfEngine,
};
pub use error::{JobError, Result};
pub use invoke::{InvokeError, TransformInvoker};
pub use janitor::{Janitor, JanitorHandle, RetentionPolicy, SweepReport};
pub use job::{JobDescriptor, JobDescriptorBuilder, JobOptions, Operation, PasswordPolicy};
pub use naming::{object_key, output_filename, slugify_stem, split_extension};
pub use ocr::{MistralOcr, MockOcrService, OcrDocument, OcrError, OcrService};
pub use storage::{BlobStore, MemoryBlobStore, ObjectEntry, S3BlobStore, S3Settings, StoreError};
pub use workspace::{ResourceHandle, WorkArea};

/// Application name used in logs and outbound `User-Agent` headers
pub const APP_NAME: &str = "pdftool";

/// Media type every uploaded document must declare
pub const PDF_MEDIA_TYPE: &str = "application/pdf";
