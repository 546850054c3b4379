//! Document transform capability
//!
//! The service never manipulates document structure itself. Every transform is
//! a file-in/file-out call on a [`DocumentEngine`]:
//!
//! - **[`QpdfEngine`]**: runs the `qpdf` executable, validating with a strict
//!   `oxidize-pdf` parse
//! - **[`MockEngine`]**: in-process stand-in with configurable latency,
//!   failures and panics, used by tests
//!
//! Engines report failures as [`EngineError`]. Raw engine text is never sent
//! to clients as-is; [`presentable_message`] turns it into a user-facing
//! sentence.

use async_trait::async_trait;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

mod mock;
mod qpdf;

pub use mock::MockEngine;
pub use qpdf::QpdfEngine;

/// Errors reported by a document engine
#[derive(Error, Debug)]
pub enum EngineError {
    /// The input is not a structurally valid document
    #[error("Invalid document: {0}")]
    Invalid(String),

    /// The engine ran and reported a failure
    #[error("{0}")]
    Failed(String),

    /// The engine could not be started
    #[error("Engine unavailable: {0}")]
    Unavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Cipher strength for encryption
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum KeyLength {
    /// AES with a 128-bit key
    Aes128,
    /// AES with a 256-bit key
    #[default]
    Aes256,
}

impl KeyLength {
    pub fn bits(&self) -> u16 {
        match self {
            KeyLength::Aes128 => 128,
            KeyLength::Aes256 => 256,
        }
    }
}

impl FromStr for KeyLength {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "128" | "aes128" | "aes-128" => Ok(KeyLength::Aes128),
            "256" | "aes256" | "aes-256" => Ok(KeyLength::Aes256),
            other => Err(format!("unsupported key length: {other}")),
        }
    }
}

/// What an encrypted document still allows without the owner password
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PermissionPolicy {
    /// Nothing: no printing, modification or extraction
    #[default]
    None,
    /// Printing only
    Print,
    /// Every operation
    All,
}

impl FromStr for PermissionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(PermissionPolicy::None),
            "print" => Ok(PermissionPolicy::Print),
            "all" => Ok(PermissionPolicy::All),
            other => Err(format!("unsupported permission policy: {other}")),
        }
    }
}

impl fmt::Display for PermissionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PermissionPolicy::None => write!(f, "none"),
            PermissionPolicy::Print => write!(f, "print"),
            PermissionPolicy::All => write!(f, "all"),
        }
    }
}

/// Encryption parameters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncryptOptions {
    pub key_length: KeyLength,
    pub permissions: PermissionPolicy,
}

/// Optimization switches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptimizeFlags {
    /// Pack objects into compressed object streams
    pub object_streams: bool,
    /// Decompress and recompress flate streams at maximum level
    pub recompress_streams: bool,
    /// Drop resources no page refers to
    pub remove_unreferenced: bool,
}

impl Default for OptimizeFlags {
    fn default() -> Self {
        Self {
            object_streams: true,
            recompress_streams: true,
            remove_unreferenced: true,
        }
    }
}

/// Opaque document transforms with a file-in/file-out contract
#[async_trait]
pub trait DocumentEngine: Send + Sync {
    /// Short engine name; `"<name>: "` is stripped from its error messages
    fn name(&self) -> &'static str;

    /// Succeed only for a structurally valid document
    async fn validate(&self, input: &Path) -> Result<(), EngineError>;

    /// Whether the document carries an encryption dictionary
    async fn is_encrypted(&self, input: &Path) -> Result<bool, EngineError>;

    async fn encrypt(
        &self,
        input: &Path,
        output: &Path,
        password: &str,
        options: &EncryptOptions,
    ) -> Result<(), EngineError>;

    async fn decrypt(&self, input: &Path, output: &Path, password: &str) -> Result<(), EngineError>;

    async fn optimize(
        &self,
        input: &Path,
        output: &Path,
        flags: &OptimizeFlags,
    ) -> Result<(), EngineError>;

    /// Rewrite a damaged document, recovering what the engine can
    async fn repair(&self, input: &Path, output: &Path) -> Result<(), EngineError>;
}

/// Turn raw engine output into a client-facing message.
///
/// Takes the last non-empty line (engines print warnings before the fatal
/// error), strips `prefix`, and capitalizes the first word.
pub fn presentable_message(raw: &str, prefix: &str) -> String {
    let line = raw
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("");
    let message = line.strip_prefix(prefix).unwrap_or(line).trim_start();

    let mut chars = message.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => "Unknown error".to_string(),
    }
}
