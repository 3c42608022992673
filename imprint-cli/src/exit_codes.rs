//! Exit codes following sysexits.h conventions.
//!
//! These codes provide semantic meaning for different failure modes,
//! enabling scripts and CI systems to handle errors appropriately.

use imprint_core::{ClassifierError, DecodeError, PipelineError, SearchError, StoreError};

/// Successful execution.
#[allow(dead_code)]
pub const SUCCESS: i32 = 0;

/// General error (catch-all).
pub const GENERAL_ERROR: i32 = 1;

/// Command line usage error (invalid arguments).
/// Maps to EX_USAGE from sysexits.h.
pub const USAGE_ERROR: i32 = 64;

/// Data format error (undecodable image, malformed manifest).
/// Maps to EX_DATAERR from sysexits.h.
pub const DATA_ERROR: i32 = 65;

/// Cannot open input file or dataset.
/// Maps to EX_NOINPUT from sysexits.h.
pub const INPUT_ERROR: i32 = 66;

/// Service unavailable (classifier, download).
/// Maps to EX_UNAVAILABLE from sysexits.h.
pub const NETWORK_ERROR: i32 = 69;

/// I/O error (fingerprint store, output files).
/// Maps to EX_IOERR from sysexits.h.
pub const IO_ERROR: i32 = 74;

/// A failure that carries its own exit code.
#[derive(Debug)]
pub struct CodedError {
    pub code: i32,
    pub message: String,
}

impl CodedError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for CodedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for CodedError {}

/// Represents an exit code with optional error context.
pub struct ExitCode {
    pub code: i32,
    pub message: Option<String>,
}

impl ExitCode {
    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        let message = format!("{err:#}");

        // Classify error by inspecting the chain
        let code = err
            .chain()
            .find_map(classify)
            .unwrap_or(GENERAL_ERROR);

        Self {
            code,
            message: Some(message),
        }
    }
}

fn decode_code(err: &DecodeError) -> i32 {
    match err {
        DecodeError::Io { .. } => INPUT_ERROR,
        _ => DATA_ERROR,
    }
}

fn classify(err: &(dyn std::error::Error + 'static)) -> Option<i32> {
    if let Some(coded) = err.downcast_ref::<CodedError>() {
        return Some(coded.code);
    }
    // Transparent, so the chain never yields the wrapped error itself.
    if let Some(e) = err.downcast_ref::<PipelineError>() {
        return Some(match e {
            PipelineError::Decode(e) => decode_code(e),
            PipelineError::Classifier(_) => NETWORK_ERROR,
        });
    }
    if let Some(e) = err.downcast_ref::<DecodeError>() {
        return Some(decode_code(e));
    }
    if let Some(e) = err.downcast_ref::<SearchError>() {
        return Some(match e {
            SearchError::DatasetMissing(_) | SearchError::Unreadable { .. } => INPUT_ERROR,
            SearchError::Task(_) => GENERAL_ERROR,
        });
    }
    if err.downcast_ref::<ClassifierError>().is_some() {
        return Some(NETWORK_ERROR);
    }
    if err.downcast_ref::<StoreError>().is_some() {
        return Some(IO_ERROR);
    }
    if let Some(e) = err.downcast_ref::<std::io::Error>() {
        return Some(match e.kind() {
            std::io::ErrorKind::NotFound => INPUT_ERROR,
            _ => IO_ERROR,
        });
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_missing_file_is_input_error() {
        let err = std::fs::read("/definitely/not/here.png")
            .context("Failed to read file")
            .unwrap_err();
        assert_eq!(ExitCode::from_anyhow(&err).code, INPUT_ERROR);
    }

    #[test]
    fn test_decode_error_is_data_error() {
        let err = imprint_core::FingerprintEngine::new()
            .fingerprint(b"not an image")
            .context("Failed to fingerprint")
            .unwrap_err();
        assert_eq!(ExitCode::from_anyhow(&err).code, DATA_ERROR);
    }

    #[test]
    fn test_pipeline_decode_error_is_data_error() {
        let decode = imprint_core::FingerprintEngine::new()
            .fingerprint(b"not an image")
            .unwrap_err();
        let err = anyhow::Error::new(PipelineError::from(decode)).context("Analysis failed");
        assert_eq!(ExitCode::from_anyhow(&err).code, DATA_ERROR);
    }

    #[test]
    fn test_classifier_error_is_network_error() {
        let err = anyhow::Error::new(ClassifierError::Status(503)).context("Analysis failed");
        assert_eq!(ExitCode::from_anyhow(&err).code, NETWORK_ERROR);
    }

    #[test]
    fn test_coded_error_wins() {
        let err = anyhow::Error::new(CodedError::new(USAGE_ERROR, "bad flags"));
        let exit = ExitCode::from_anyhow(&err);
        assert_eq!(exit.code, USAGE_ERROR);
        assert_eq!(exit.message.as_deref(), Some("bad flags"));
    }

    #[test]
    fn test_unknown_error_is_general() {
        let err = anyhow::anyhow!("something odd");
        assert_eq!(ExitCode::from_anyhow(&err).code, GENERAL_ERROR);
    }
}
