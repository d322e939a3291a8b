//! Error types for the sitestore library
//!
//! This module defines all error types that can occur while loading, saving
//! or decoding site configuration documents. Errors are designed to be
//! informative and actionable: every failure carries enough context for a
//! caller to present it to the user verbatim.

use std::path::PathBuf;
use thiserror::Error;

/// Type alias for Results in the sitestore library
pub type Result<T> = std::result::Result<T, StoreError>;

/// Main error type for all sitestore operations
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O errors during file operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed XML in the configuration file
    #[error("Malformed XML at offset {offset}: {message}")]
    Malformed {
        /// Byte offset reported by the parser
        offset: u64,
        /// Parser diagnostic
        message: String,
    },

    /// The file parses as XML but does not carry the expected root element
    #[error("Unknown root element, expected <{expected}>; the file was not generated by this application")]
    ForeignRoot {
        /// Root element name this store was configured with
        expected: String,
    },

    /// The primary file and its backup are both unusable
    #[error("The file {path:?} could not be loaded: {reason}")]
    LoadFailed {
        /// Path of the primary file
        path: PathBuf,
        /// What went wrong, including any parser diagnostic
        reason: String,
    },

    /// Creating the rolling backup before a save failed
    #[error("Failed to create backup copy of {path:?}")]
    BackupFailed {
        /// Path of the file that was about to be overwritten
        path: PathBuf,
    },

    /// A valid backup existed but could not be copied back over the primary
    #[error("The valid backup file {path:?} could not be restored")]
    BackupRestoreFailed {
        /// Path of the backup file
        path: PathBuf,
    },

    /// Writing the new file contents failed (open, short write or fsync)
    #[error("Failed to write {path:?}: {reason}")]
    WriteFailed {
        /// Path of the target file
        path: PathBuf,
        /// What went wrong
        reason: String,
    },

    /// A site node failed validation during decode
    #[error("Invalid site entry: {0}")]
    Validation(String),

    /// Encrypted credential material references an unusable public key
    #[error("Invalid public key: {0}")]
    InvalidKey(String),

    /// Base64-encoded content could not be decoded
    #[error("Base64 error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// UTF-8 conversion error
    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// No file name has been set on the store
    #[error("No file name set")]
    MissingFileName,

    /// Saving was attempted without a loaded or created document
    #[error("No document loaded")]
    NotLoaded,
}

impl StoreError {
    /// Create a validation error with a custom message
    pub fn validation(msg: impl Into<String>) -> Self {
        StoreError::Validation(msg.into())
    }

    /// Create an invalid-key error with a custom message
    pub fn invalid_key(msg: impl Into<String>) -> Self {
        StoreError::InvalidKey(msg.into())
    }

    /// Check if this error indicates a corrupt or foreign file, as opposed
    /// to an environment problem like permissions
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            StoreError::Malformed { .. }
                | StoreError::ForeignRoot { .. }
                | StoreError::LoadFailed { .. }
        )
    }

    /// Check if the pre-save state of the file is known to be intact.
    ///
    /// Every failure in the save path either aborts before touching the
    /// original or rolls back to it; only an I/O error during rollback
    /// itself can leave the target missing.
    pub fn original_preserved(&self) -> bool {
        !matches!(self, StoreError::BackupRestoreFailed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StoreError::ForeignRoot {
            expected: "SiteStore".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Unknown root element, expected <SiteStore>; the file was not generated by this application"
        );
    }

    #[test]
    fn test_malformed_includes_offset() {
        let err = StoreError::Malformed {
            offset: 42,
            message: "unexpected end of stream".to_string(),
        };
        assert!(err.to_string().contains("offset 42"));
    }

    #[test]
    fn test_error_corruption() {
        assert!(StoreError::Malformed {
            offset: 0,
            message: "test".to_string(),
        }
        .is_corruption());
        assert!(!StoreError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "test"
        ))
        .is_corruption());
    }
}
