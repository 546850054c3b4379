//! Process configuration
//!
//! Parsed once at startup from command-line flags and environment variables,
//! then shared read-only behind an `Arc`.

use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser};
use pdftool::{RetentionPolicy, S3Settings};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Configuration that cannot be served
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("S3 is enabled but {0} is not set")]
    MissingS3Setting(&'static str),

    #[error("AUTH_USER and AUTH_PASS must be set together")]
    IncompleteAccount,

    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),
}

/// Service configuration
#[derive(Debug, Clone, Parser)]
#[command(name = "pdftool-api", version, about = "PDF processing HTTP service")]
pub struct Config {
    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:2804")]
    pub listen: SocketAddr,

    /// Default log filter; RUST_LOG takes precedence
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Bearer key accepted on /v1 routes
    #[arg(long, env = "API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Username for browser sessions
    #[arg(long, env = "AUTH_USER")]
    pub auth_user: Option<String>,

    #[arg(long, env = "AUTH_PASS", hide_env_values = true)]
    pub auth_pass: Option<String>,

    #[arg(long, env = "SESSION_TTL", default_value = "24h", value_parser = parse_duration)]
    pub session_ttl: Duration,

    /// Mark the session cookie `Secure`; disable only when serving plain HTTP
    #[arg(
        long,
        env = "SESSION_SECURE",
        default_value_t = true,
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new()
    )]
    pub session_secure: bool,

    /// Directory for per-job files [default: system temp dir]
    #[arg(long, env = "WORK_DIR")]
    pub work_dir: Option<PathBuf>,

    /// Largest accepted request body
    #[arg(long, env = "MAX_BODY_BYTES", default_value_t = 256 * 1024 * 1024)]
    pub max_body_bytes: usize,

    /// Deadline for encrypt, decrypt, optimize and repair
    #[arg(long, env = "TRANSFORM_TIMEOUT", default_value = "2m", value_parser = parse_duration)]
    pub transform_timeout: Duration,

    /// Deadline for OCR, including the upstream round trip
    #[arg(long, env = "OCR_TIMEOUT", default_value = "20m", value_parser = parse_duration)]
    pub ocr_timeout: Duration,

    /// Path or name of the qpdf executable
    #[arg(long, env = "QPDF_BIN", default_value = "qpdf")]
    pub qpdf_bin: PathBuf,

    #[arg(
        long,
        env = "S3_ENABLE",
        default_value_t = false,
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new()
    )]
    pub s3_enable: bool,

    #[arg(long, env = "S3_ENDPOINT")]
    pub s3_endpoint: Option<String>,

    #[arg(long, env = "S3_BUCKET")]
    pub s3_bucket: Option<String>,

    #[arg(long, env = "S3_REGION", default_value = "us-east-1")]
    pub s3_region: String,

    #[arg(long, env = "S3_ACCESS", hide_env_values = true)]
    pub s3_access: Option<String>,

    #[arg(long, env = "S3_SECRET", hide_env_values = true)]
    pub s3_secret: Option<String>,

    /// Talk plain HTTP to an endpoint given without a scheme
    #[arg(
        long,
        env = "S3_INSECURE",
        default_value_t = false,
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new()
    )]
    pub s3_insecure: bool,

    /// Lifetime of the presigned URL handed to the OCR service
    #[arg(long, env = "S3_URL_TTL", default_value = "1h", value_parser = parse_duration)]
    pub s3_url_ttl: Duration,

    /// Mistral API key; OCR is disabled without it
    #[arg(long = "mistral-key", env = "MISTRAL", hide_env_values = true)]
    pub mistral_key: Option<String>,

    #[arg(long, env = "OCR_URL", default_value = pdftool::MistralOcr::DEFAULT_ENDPOINT)]
    pub ocr_url: String,

    #[arg(long, env = "OCR_MODEL", default_value = pdftool::MistralOcr::DEFAULT_MODEL)]
    pub ocr_model: String,

    /// Objects at least this old are removed from the bucket
    #[arg(long, env = "RETENTION", default_value = "1h", value_parser = parse_duration)]
    pub retention: Duration,

    #[arg(long, env = "SWEEP_INTERVAL", default_value = "15m", value_parser = parse_duration)]
    pub sweep_interval: Duration,

    #[arg(long, env = "SWEEP_TIMEOUT", default_value = "20s", value_parser = parse_duration)]
    pub sweep_timeout: Duration,
}

impl Config {
    /// Reject combinations clap cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth_user.is_some() != self.auth_pass.is_some() {
            return Err(ConfigError::IncompleteAccount);
        }

        for (name, value) in [
            ("TRANSFORM_TIMEOUT", self.transform_timeout),
            ("OCR_TIMEOUT", self.ocr_timeout),
            ("SESSION_TTL", self.session_ttl),
            ("SWEEP_INTERVAL", self.sweep_interval),
            ("SWEEP_TIMEOUT", self.sweep_timeout),
        ] {
            if value.is_zero() {
                return Err(ConfigError::ZeroDuration(name));
            }
        }

        if self.s3_enable {
            let required = [
                ("S3_ENDPOINT", &self.s3_endpoint),
                ("S3_BUCKET", &self.s3_bucket),
                ("S3_ACCESS", &self.s3_access),
                ("S3_SECRET", &self.s3_secret),
            ];
            for (name, value) in required {
                if !matches!(value.as_deref(), Some(v) if !v.is_empty()) {
                    return Err(ConfigError::MissingS3Setting(name));
                }
            }
        }

        Ok(())
    }

    pub fn work_dir(&self) -> PathBuf {
        self.work_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join(pdftool::APP_NAME))
    }

    /// Username and password when session login is configured
    pub fn account(&self) -> Option<(&str, &str)> {
        match (&self.auth_user, &self.auth_pass) {
            (Some(user), Some(pass)) => Some((user, pass)),
            _ => None,
        }
    }

    pub fn s3_settings(&self) -> Option<S3Settings> {
        if !self.s3_enable {
            return None;
        }
        Some(S3Settings {
            endpoint: self.s3_endpoint.clone()?,
            bucket: self.s3_bucket.clone()?,
            region: self.s3_region.clone(),
            access_key: self.s3_access.clone()?,
            secret_key: self.s3_secret.clone()?,
            insecure: self.s3_insecure,
            url_ttl: self.s3_url_ttl,
        })
    }

    pub fn retention_policy(&self) -> RetentionPolicy {
        RetentionPolicy {
            max_age: self.retention,
            interval: self.sweep_interval,
            sweep_timeout: self.sweep_timeout,
        }
    }
}

/// Parse `250ms`, `30s`, `15m`, `2h` or a bare number of seconds
pub fn parse_duration(raw: &str) -> Result<Duration, String> {
    let value = raw.trim();
    let split = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    let (digits, unit) = value.split_at(split);

    let amount: u64 = digits
        .parse()
        .map_err(|_| format!("invalid duration `{raw}`"))?;

    let duration = match unit.trim() {
        "" | "s" => Duration::from_secs(amount),
        "ms" => Duration::from_millis(amount),
        "m" => Duration::from_secs(amount.saturating_mul(60)),
        "h" => Duration::from_secs(amount.saturating_mul(60 * 60)),
        other => return Err(format!("unknown duration unit `{other}` in `{raw}`")),
    };
    Ok(duration)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        let mut argv = vec!["pdftool-api"];
        argv.extend_from_slice(args);
        Config::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
        assert_eq!(parse_duration("30s"), Ok(Duration::from_secs(30)));
        assert_eq!(parse_duration("15m"), Ok(Duration::from_secs(900)));
        assert_eq!(parse_duration("2h"), Ok(Duration::from_secs(7200)));
        assert_eq!(parse_duration("45"), Ok(Duration::from_secs(45)));
        assert_eq!(parse_duration(" 5 m "), Ok(Duration::from_secs(300)));
    }

    #[test]
    fn test_parse_duration_rejects_garbage() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("ten minutes").is_err());
        assert!(parse_duration("10d").is_err());
        assert!(parse_duration("-5s").is_err());
    }

    #[test]
    fn test_defaults() {
        let config = parse(&[]);
        assert_eq!(config.transform_timeout, Duration::from_secs(120));
        assert_eq!(config.ocr_timeout, Duration::from_secs(20 * 60));
        assert_eq!(config.retention, Duration::from_secs(3600));
        assert_eq!(config.max_body_bytes, 256 * 1024 * 1024);
        assert_eq!(config.ocr_url, "https://api.mistral.ai/v1/ocr");
        assert!(!config.s3_enable);
        assert!(config.session_secure);
        assert!(config.s3_settings().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_session_secure_can_be_disabled() {
        assert!(!parse(&["--session-secure", "false"]).session_secure);
        assert!(parse(&["--session-secure", "yes"]).session_secure);
    }

    #[test]
    fn test_s3_requires_endpoint_bucket_and_credentials() {
        let config = parse(&["--s3-enable", "true", "--s3-endpoint", "minio:9000"]);
        assert_eq!(
            config.validate(),
            Err(ConfigError::MissingS3Setting("S3_BUCKET"))
        );

        let config = parse(&[
            "--s3-enable", "yes",
            "--s3-endpoint", "minio:9000",
            "--s3-bucket", "uploads",
            "--s3-access", "key",
            "--s3-secret", "secret",
            "--s3-insecure", "1",
        ]);
        assert!(config.validate().is_ok());
        let settings = config.s3_settings().unwrap();
        assert_eq!(settings.bucket, "uploads");
        assert!(settings.insecure);
    }

    #[test]
    fn test_account_requires_both_halves() {
        let config = parse(&["--auth-user", "admin"]);
        assert_eq!(config.validate(), Err(ConfigError::IncompleteAccount));
        assert!(config.account().is_none());

        let config = parse(&["--auth-user", "admin", "--auth-pass", "pw"]);
        assert_eq!(config.account(), Some(("admin", "pw")));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = parse(&["--transform-timeout", "0s"]);
        assert_eq!(
            config.validate(),
            Err(ConfigError::ZeroDuration("TRANSFORM_TIMEOUT"))
        );
    }
}
