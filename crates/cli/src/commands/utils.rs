use serde_json::Value;
use std::{fmt, io::Read};

#[derive(Debug)]
pub enum CliError {
    Config(String),
    Io(String),
    Json(String),
    /// The gateway would reject the request or response under inspection.
    Rejected(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "Configuration error: {msg}"),
            Self::Io(msg) => write!(f, "IO error: {msg}"),
            Self::Json(msg) => write!(f, "JSON error: {msg}"),
            Self::Rejected(msg) => write!(f, "Rejected: {msg}"),
        }
    }
}

impl std::error::Error for CliError {}

impl From<std::io::Error> for CliError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(error: serde_json::Error) -> Self {
        Self::Json(error.to_string())
    }
}

impl From<gateway_core::errors::GatewayError> for CliError {
    fn from(error: gateway_core::errors::GatewayError) -> Self {
        Self::Rejected(format!("{error} (code {})", error.code()))
    }
}

pub type CliResult<T> = Result<T, CliError>;

/// Reads a JSON document from a file, or from stdin when `path` is `-`.
pub fn read_json(path: &str) -> CliResult<Value> {
    let mut content = String::new();
    if path == "-" {
        std::io::stdin().read_to_string(&mut content)?;
    } else {
        content = std::fs::read_to_string(path)
            .map_err(|e| CliError::Io(format!("{path}: {e}")))?;
    }
    Ok(serde_json::from_str(&content)?)
}

pub fn print_success(message: &str) {
    println!("[SUCCESS] {message}");
}

pub fn print_error(message: &str) {
    eprintln!("[ERROR] {message}");
}

pub fn print_info(message: &str) {
    println!("[INFO] {message}");
}
