//! `qpdf`-backed document engine

use super::{DocumentEngine, EncryptOptions, EngineError, KeyLength, OptimizeFlags, PermissionPolicy};
use async_trait::async_trait;
use oxidize_pdf::parser::PdfReader;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

/// qpdf exits with 3 when it succeeded with warnings (typical for repairs)
const EXIT_WARNINGS: i32 = 3;

/// `--is-encrypted` exit code for a document without encryption
const EXIT_NOT_ENCRYPTED: i32 = 2;

/// Runs the `qpdf` executable for each transform.
///
/// Child processes are spawned with `kill_on_drop`, so dropping a pending
/// transform future (for example when a deadline aborts the request) kills
/// the process.
#[derive(Debug, Clone)]
pub struct QpdfEngine {
    program: PathBuf,
}

impl Default for QpdfEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl QpdfEngine {
    /// Use `qpdf` from `PATH`
    pub fn new() -> Self {
        Self::with_program("qpdf")
    }

    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Whether the executable can be started
    pub async fn is_available(&self) -> bool {
        Command::new(&self.program)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await
            .map(|status| status.success())
            .unwrap_or(false)
    }

    fn spawn_error(&self, err: std::io::Error) -> EngineError {
        if err.kind() == std::io::ErrorKind::NotFound {
            EngineError::Unavailable(format!("{} is not installed", self.program.display()))
        } else {
            EngineError::Io(err)
        }
    }

    async fn run(&self, args: Vec<OsString>, input: &Path, output: &Path) -> Result<(), EngineError> {
        debug!(program = %self.program.display(), "running qpdf");

        let result = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|err| self.spawn_error(err))?;

        let stderr = String::from_utf8_lossy(&result.stderr);
        match result.status.code() {
            Some(0) => {}
            Some(EXIT_WARNINGS) => {
                warn!(warnings = %stderr.trim(), "qpdf finished with warnings");
            }
            code => {
                debug!(?code, stderr = %stderr.trim(), "qpdf failed");
                return Err(EngineError::Failed(strip_locators(&stderr, &[input, output])));
            }
        }

        if !output.exists() {
            return Err(EngineError::Failed("qpdf: no output was produced".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentEngine for QpdfEngine {
    fn name(&self) -> &'static str {
        "qpdf"
    }

    async fn validate(&self, input: &Path) -> Result<(), EngineError> {
        let path = input.to_path_buf();
        tokio::task::spawn_blocking(move || validate_structure(&path))
            .await
            .map_err(|err| EngineError::Failed(format!("validation task failed: {err}")))?
    }

    async fn is_encrypted(&self, input: &Path) -> Result<bool, EngineError> {
        let status = Command::new(&self.program)
            .arg("--is-encrypted")
            .arg(input)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await
            .map_err(|err| self.spawn_error(err))?;

        match status.code() {
            Some(0) => Ok(true),
            Some(EXIT_NOT_ENCRYPTED) => Ok(false),
            code => Err(EngineError::Failed(format!(
                "qpdf: could not inspect encryption (exit {code:?})"
            ))),
        }
    }

    async fn encrypt(
        &self,
        input: &Path,
        output: &Path,
        password: &str,
        options: &EncryptOptions,
    ) -> Result<(), EngineError> {
        self.run(encrypt_args(input, output, password, options), input, output)
            .await
    }

    async fn decrypt(&self, input: &Path, output: &Path, password: &str) -> Result<(), EngineError> {
        self.run(decrypt_args(input, output, password), input, output)
            .await
    }

    async fn optimize(
        &self,
        input: &Path,
        output: &Path,
        flags: &OptimizeFlags,
    ) -> Result<(), EngineError> {
        self.run(optimize_args(input, output, flags), input, output)
            .await
    }

    async fn repair(&self, input: &Path, output: &Path) -> Result<(), EngineError> {
        // qpdf reconstructs damaged cross-reference data while reading, so a
        // plain rewrite is the repair.
        self.run(vec![input.into(), output.into()], input, output)
            .await
    }
}

/// Strict structural parse: header, cross-reference table, trailer, page tree
fn validate_structure(path: &Path) -> Result<(), EngineError> {
    let mut reader =
        PdfReader::open_strict(path).map_err(|err| EngineError::Invalid(err.to_string()))?;
    let pages = reader
        .page_count()
        .map_err(|err| EngineError::Invalid(err.to_string()))?;
    if pages == 0 {
        return Err(EngineError::Invalid("document has no pages".to_string()));
    }
    Ok(())
}

fn encrypt_args(
    input: &Path,
    output: &Path,
    password: &str,
    options: &EncryptOptions,
) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "--encrypt".into(),
        password.into(),
        password.into(),
        options.key_length.bits().to_string().into(),
    ];
    if options.key_length == KeyLength::Aes128 {
        args.push("--use-aes=y".into());
    }
    match options.permissions {
        PermissionPolicy::None => {
            args.extend(["--print=none", "--modify=none", "--extract=n"].map(OsString::from));
        }
        PermissionPolicy::Print => {
            args.extend(["--modify=none", "--extract=n"].map(OsString::from));
        }
        PermissionPolicy::All => {}
    }
    args.push("--".into());
    args.push(input.into());
    args.push(output.into());
    args
}

fn decrypt_args(input: &Path, output: &Path, password: &str) -> Vec<OsString> {
    vec![
        format!("--password={password}").into(),
        "--decrypt".into(),
        input.into(),
        output.into(),
    ]
}

fn optimize_args(input: &Path, output: &Path, flags: &OptimizeFlags) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["--compress-streams=y".into()];
    if flags.object_streams {
        args.push("--object-streams=generate".into());
    }
    if flags.recompress_streams {
        args.push("--recompress-flate".into());
        args.push("--compression-level=9".into());
    }
    if flags.remove_unreferenced {
        args.push("--remove-unreferenced-resources=yes".into());
    }
    args.push(input.into());
    args.push(output.into());
    args
}

/// Remove `"<path>: "` locators so internal paths never reach clients
fn strip_locators(stderr: &str, paths: &[&Path]) -> String {
    let mut message = stderr.trim().to_string();
    for path in paths {
        let locator = format!("{}: ", path.display());
        message = message.replace(&locator, "");
    }
    message
}
