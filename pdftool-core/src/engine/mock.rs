//! In-process engine for tests and local development

use super::{DocumentEngine, EncryptOptions, EngineError, OptimizeFlags};
use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Mock document engine
///
/// Transforms copy the input to the output after an optional delay. The delay
/// is an async sleep, so aborting the caller cancels the transform and it is
/// never counted as completed.
///
/// ```rust
/// use pdftool::{DocumentEngine, MockEngine};
/// use std::time::Duration;
///
/// let engine = MockEngine::new()
///     .with_delay(Duration::from_millis(10))
///     .with_document_valid(false);
/// assert_eq!(engine.name(), "mock");
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockEngine {
    delay: Duration,
    failure: Option<String>,
    panic: bool,
    document_valid: bool,
    encrypted: bool,
    password: Option<String>,
    completed: Arc<AtomicUsize>,
}

impl MockEngine {
    /// A fast engine that treats every document as valid and encrypted
    pub fn new() -> Self {
        Self {
            document_valid: true,
            encrypted: true,
            ..Default::default()
        }
    }

    /// Sleep this long inside each transform
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fail every transform with this raw message
    pub fn with_failure(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    /// Panic inside every transform
    pub fn with_panic(mut self) -> Self {
        self.panic = true;
        self
    }

    /// Verdict returned by `validate`
    pub fn with_document_valid(mut self, valid: bool) -> Self {
        self.document_valid = valid;
        self
    }

    /// Verdict returned by `is_encrypted`
    pub fn with_encrypted(mut self, encrypted: bool) -> Self {
        self.encrypted = encrypted;
        self
    }

    /// Make `decrypt` fail unless this password is given
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Number of transforms that ran to completion
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    async fn transform(&self, input: &Path, output: &Path) -> Result<(), EngineError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.panic {
            panic!("mock engine panicked");
        }
        if let Some(message) = &self.failure {
            return Err(EngineError::Failed(message.clone()));
        }

        tokio::fs::copy(input, output).await?;
        self.completed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl DocumentEngine for MockEngine {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn validate(&self, input: &Path) -> Result<(), EngineError> {
        tokio::fs::metadata(input).await?;
        if self.document_valid {
            Ok(())
        } else {
            Err(EngineError::Invalid("mock: document is corrupt".to_string()))
        }
    }

    async fn is_encrypted(&self, input: &Path) -> Result<bool, EngineError> {
        tokio::fs::metadata(input).await?;
        Ok(self.encrypted)
    }

    async fn encrypt(
        &self,
        input: &Path,
        output: &Path,
        _password: &str,
        _options: &EncryptOptions,
    ) -> Result<(), EngineError> {
        self.transform(input, output).await
    }

    async fn decrypt(&self, input: &Path, output: &Path, password: &str) -> Result<(), EngineError> {
        if let Some(expected) = &self.password {
            if expected != password {
                return Err(EngineError::Failed("mock: invalid password".to_string()));
            }
        }
        self.transform(input, output).await
    }

    async fn optimize(
        &self,
        input: &Path,
        output: &Path,
        _flags: &OptimizeFlags,
    ) -> Result<(), EngineError> {
        self.transform(input, output).await
    }

    async fn repair(&self, input: &Path, output: &Path) -> Result<(), EngineError> {
        self.transform(input, output).await
    }
}
