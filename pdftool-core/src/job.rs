//! Job descriptors
//!
//! A [`JobDescriptor`] is the normalized form of one transform request. It is
//! only obtainable through [`JobDescriptorBuilder::build`], which enforces the
//! content and password rules, so a descriptor in hand is always valid.

use crate::engine::{EncryptOptions, KeyLength, OptimizeFlags, PermissionPolicy};
use crate::error::{JobError, Result};
use crate::naming;
use std::fmt;

/// Transform operations exposed over HTTP
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Password-protect a document
    Encrypt,
    /// Remove password protection
    Decrypt,
    /// Rewrite a document with compacted streams
    Optimize,
    /// Rebuild a structurally broken document
    Repair,
}

/// Whether an operation needs a password
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordPolicy {
    /// The request is rejected without a password
    Required,
    /// A supplied password is accepted but unused
    Ignored,
}

impl Operation {
    pub const ALL: [Operation; 4] = [
        Operation::Encrypt,
        Operation::Decrypt,
        Operation::Optimize,
        Operation::Repair,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Encrypt => "encrypt",
            Operation::Decrypt => "decrypt",
            Operation::Optimize => "optimize",
            Operation::Repair => "repair",
        }
    }

    pub fn password_policy(&self) -> PasswordPolicy {
        match self {
            Operation::Encrypt | Operation::Decrypt => PasswordPolicy::Required,
            Operation::Optimize | Operation::Repair => PasswordPolicy::Ignored,
        }
    }

    /// Tag prepended to the download name
    pub fn output_prefix(&self) -> &'static str {
        match self {
            Operation::Encrypt => "encrypted",
            Operation::Decrypt => "decrypted",
            Operation::Optimize => "optimized",
            Operation::Repair => "repaired",
        }
    }

    /// Operations that assume a well-formed input and validate it first.
    ///
    /// Decrypt is excluded because encrypted input cannot be parsed without
    /// the password; repair inverts the check instead.
    pub fn requires_valid_input(&self) -> bool {
        matches!(self, Operation::Encrypt | Operation::Optimize)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operation-specific parameters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobOptions {
    pub encrypt: EncryptOptions,
    pub optimize: OptimizeFlags,
}

impl JobOptions {
    /// Parse the optional encryption fields sent by clients.
    ///
    /// Empty strings are treated as absent so HTML forms can submit blank
    /// inputs.
    pub fn from_fields(key_length: Option<&str>, permissions: Option<&str>) -> Result<Self> {
        let mut options = JobOptions::default();

        if let Some(value) = key_length.map(str::trim).filter(|v| !v.is_empty()) {
            options.encrypt.key_length =
                value
                    .parse::<KeyLength>()
                    .map_err(|_| JobError::InvalidOption {
                        name: "key_length",
                        value: value.to_string(),
                    })?;
        }

        if let Some(value) = permissions.map(str::trim).filter(|v| !v.is_empty()) {
            options.encrypt.permissions =
                value
                    .parse::<PermissionPolicy>()
                    .map_err(|_| JobError::InvalidOption {
                        name: "permissions",
                        value: value.to_string(),
                    })?;
        }

        Ok(options)
    }
}

/// A validated transform request
#[derive(Clone)]
pub struct JobDescriptor {
    operation: Operation,
    declared_filename: String,
    password: Option<String>,
    options: JobOptions,
    content_length: u64,
}

impl JobDescriptor {
    pub fn builder(operation: Operation, declared_filename: impl Into<String>) -> JobDescriptorBuilder {
        JobDescriptorBuilder {
            operation,
            declared_filename: declared_filename.into(),
            password: None,
            options: JobOptions::default(),
            content_length: 0,
        }
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    /// Client-supplied name, untrusted
    pub fn declared_filename(&self) -> &str {
        &self.declared_filename
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    pub fn options(&self) -> &JobOptions {
        &self.options
    }

    /// Size of the materialized input in bytes
    pub fn content_length(&self) -> u64 {
        self.content_length
    }

    /// Name offered for the transformed download
    pub fn output_filename(&self) -> String {
        naming::output_filename(self.operation.output_prefix(), &self.declared_filename)
    }
}

impl fmt::Debug for JobDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobDescriptor")
            .field("operation", &self.operation)
            .field("declared_filename", &self.declared_filename)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("options", &self.options)
            .field("content_length", &self.content_length)
            .finish()
    }
}

/// Builder enforcing the descriptor invariants
#[derive(Debug)]
pub struct JobDescriptorBuilder {
    operation: Operation,
    declared_filename: String,
    password: Option<String>,
    options: JobOptions,
    content_length: u64,
}

impl JobDescriptorBuilder {
    /// Set the password; an empty string counts as no password
    pub fn password(mut self, password: Option<String>) -> Self {
        self.password = password.filter(|p| !p.is_empty());
        self
    }

    pub fn options(mut self, options: JobOptions) -> Self {
        self.options = options;
        self
    }

    pub fn content_length(mut self, content_length: u64) -> Self {
        self.content_length = content_length;
        self
    }

    /// Check the password rule without requiring content.
    ///
    /// Decoders call this before writing anything to disk when the password
    /// is already known.
    pub fn check_password(&self) -> Result<()> {
        match (self.operation.password_policy(), &self.password) {
            (PasswordPolicy::Required, None) => Err(JobError::PasswordRequired),
            _ => Ok(()),
        }
    }

    pub fn build(self) -> Result<JobDescriptor> {
        if self.content_length == 0 {
            return Err(JobError::EmptyContent);
        }
        self.check_password()?;

        Ok(JobDescriptor {
            operation: self.operation,
            declared_filename: self.declared_filename,
            password: self.password,
            options: self.options,
            content_length: self.content_length,
        })
    }
}
