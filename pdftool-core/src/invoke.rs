//! Transform invocation
//!
//! [`TransformInvoker`] is the thin layer between a validated job and the
//! engine. It decides whether to validate the input first and maps engine
//! outcomes onto client-facing errors:
//!
//! | Operation | Pre-check                     | Pre-check outcome that rejects |
//! |-----------|-------------------------------|--------------------------------|
//! | encrypt   | validate                      | invalid document               |
//! | optimize  | validate                      | invalid document               |
//! | repair    | validate                      | valid document (nothing to do) |
//! | decrypt   | is encrypted                  | plain document                 |

use crate::engine::{presentable_message, DocumentEngine, EngineError};
use crate::job::{JobDescriptor, Operation};
use crate::workspace::ResourceHandle;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{error, info};

/// Outcome of a failed invocation
#[derive(Error, Debug)]
pub enum InvokeError {
    /// The input failed validation before a mutating operation
    #[error("File is invalid or corrupted. Please upload a valid PDF.")]
    InvalidDocument,

    /// Repair was requested for a document that is already valid
    #[error("File does not need to be repaired")]
    NothingToRepair,

    /// Decrypt was requested for a document without encryption
    #[error("File is not encrypted")]
    NotEncrypted,

    /// The engine failed; `message` is already presentable
    #[error("{message}")]
    Failed {
        operation: Operation,
        message: String,
    },
}

impl InvokeError {
    /// Whether the client caused the failure
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            InvokeError::InvalidDocument | InvokeError::NothingToRepair | InvokeError::NotEncrypted
        )
    }
}

/// Calls a [`DocumentEngine`] for a job's materialized files
#[derive(Clone)]
pub struct TransformInvoker {
    engine: Arc<dyn DocumentEngine>,
}

impl TransformInvoker {
    pub fn new(engine: Arc<dyn DocumentEngine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &Arc<dyn DocumentEngine> {
        &self.engine
    }

    /// Run the job's operation from `handle.input_path()` to
    /// `handle.output_path()`.
    ///
    /// On failure the output may be partially written; it stays covered by the
    /// handle's release.
    pub async fn invoke(&self, job: &JobDescriptor, handle: &ResourceHandle) -> Result<(), InvokeError> {
        let operation = job.operation();
        let input = handle.input_path();
        let output = handle.output_path();
        let started = Instant::now();

        if operation.requires_valid_input() {
            match self.engine.validate(input).await {
                Ok(()) => {}
                Err(EngineError::Invalid(reason)) => {
                    info!(job_id = %handle.id(), %operation, %reason, "rejecting invalid document");
                    return Err(InvokeError::InvalidDocument);
                }
                Err(err) => return Err(self.failed(operation, err)),
            }
        }

        if operation == Operation::Repair {
            match self.engine.validate(input).await {
                Ok(()) => return Err(InvokeError::NothingToRepair),
                Err(EngineError::Invalid(reason)) => {
                    info!(job_id = %handle.id(), %reason, "document needs repair");
                }
                Err(err) => return Err(self.failed(operation, err)),
            }
        }

        if operation == Operation::Decrypt {
            match self.engine.is_encrypted(input).await {
                Ok(true) => {}
                Ok(false) => return Err(InvokeError::NotEncrypted),
                Err(err) => return Err(self.failed(operation, err)),
            }
        }

        let password = job.password().unwrap_or_default();
        let options = job.options();
        let result = match operation {
            Operation::Encrypt => {
                self.engine
                    .encrypt(input, output, password, &options.encrypt)
                    .await
            }
            Operation::Decrypt => self.engine.decrypt(input, output, password).await,
            Operation::Optimize => {
                self.engine
                    .optimize(input, output, &options.optimize)
                    .await
            }
            Operation::Repair => self.engine.repair(input, output).await,
        };

        match result {
            Ok(()) => {
                info!(
                    job_id = %handle.id(),
                    %operation,
                    engine = self.engine.name(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "transform completed"
                );
                Ok(())
            }
            Err(err) => Err(self.failed(operation, err)),
        }
    }

    fn failed(&self, operation: Operation, err: EngineError) -> InvokeError {
        error!(%operation, engine = self.engine.name(), error = %err, "transform failed");

        let prefix = format!("{}: ", self.engine.name());
        let detail = match &err {
            EngineError::Failed(raw) => presentable_message(raw, &prefix),
            EngineError::Invalid(raw) => presentable_message(raw, &prefix),
            EngineError::Unavailable(_) | EngineError::Io(_) => {
                "Document engine is unavailable".to_string()
            }
        };

        let message = match operation {
            Operation::Encrypt => format!("Failed to encrypt PDF: {detail}"),
            Operation::Decrypt => {
                format!("Failed to decrypt PDF, please check that the password is correct: {detail}")
            }
            Operation::Optimize => format!("Failed to optimize PDF: {detail}"),
            Operation::Repair => format!("Failed to repair PDF: {detail}"),
        };

        InvokeError::Failed { operation, message }
    }
}
