//! Startup error types
//!
//! Only identity problems are fatal to the runner. Every per-job and
//! per-poll failure is absorbed by the supervisor or the poller.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while establishing the runner identity
#[derive(Debug, Error)]
pub enum IdentityError {
    /// The identity file exists but cannot be used
    #[error(
        "Identity file {} is corrupt ({reason}). Delete it manually and restart the runner to register again.",
        .path.display()
    )]
    Corrupt { path: PathBuf, reason: String },

    /// The identity file could not be read or written
    #[error("Failed to access identity file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The queue service definitively does not know the stored runner id
    #[error(
        "Runner ID '{runner_id}' is not registered in the system. This can happen if the runner \
         was deleted on the server. Delete {} (or run `reset-identity`) and restart the runner \
         to register with a new ID.",
        .path.display()
    )]
    NotRecognized { runner_id: String, path: PathBuf },

    /// The stored runner id could not be verified; retrying later may succeed
    #[error(
        "Failed to verify runner registration: {message}. Check your network connection and worker URL."
    )]
    VerificationUnavailable { message: String },

    /// Registration kept failing
    #[error("Failed to register runner after {attempts} attempt(s): {message}")]
    RegistrationFailed { attempts: u32, message: String },
}

impl IdentityError {
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Whether restarting later, without operator action, could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::VerificationUnavailable { .. } | Self::RegistrationFailed { .. }
        )
    }
}
