//! Error handling for WHOIS checks and record persistence.
//!
//! This module defines a single error type covering the two failure families
//! of the library: per-domain lookup failures (always recovered into an
//! `ERROR` result by the batch checker) and persistence failures (always fatal
//! for the merge-and-write call that raised them).

use std::fmt;
use std::time::Duration;

/// Main error type for talia operations.
///
/// Lookup variants carry the server they were talking to; persistence
/// variants carry the path of the file involved, so the message alone is
/// enough to tell a corrupt store apart from a transient write failure.
#[derive(Debug, Clone)]
pub enum TaliaError {
    /// Could not open a connection to the WHOIS server (includes dial timeout)
    Connect {
        server: String,
        message: String,
    },

    /// Sending the query line failed
    Write {
        server: String,
        message: String,
    },

    /// Reading the response failed for a reason other than an early close
    Read {
        server: String,
        message: String,
    },

    /// The server closed the connection without sending anything.
    ///
    /// Connection resets, broken pipes and premature EOFs are reported as
    /// this variant too.
    EmptyResponse {
        server: String,
    },

    /// The destination exists but could not be read
    ReadExisting {
        path: String,
        message: String,
    },

    /// The destination content is neither the grouped nor the flat shape
    ParseExisting {
        path: String,
        message: String,
    },

    /// Serializing the merged store failed
    Marshal {
        message: String,
    },

    /// Creating, writing or syncing the temporary file failed
    WriteTemp {
        path: String,
        message: String,
    },

    /// Renaming the temporary file over the destination failed
    Rename {
        path: String,
        message: String,
    },

    /// Configuration errors (invalid settings, unparsable files, etc.)
    ConfigError {
        message: String,
    },

    /// File I/O errors outside the grouped store (input files, exports)
    FileError {
        path: String,
        message: String,
    },

    /// Input that cannot be processed (bad JSON document, bad flag value)
    InvalidInput {
        message: String,
    },
}

impl TaliaError {
    /// Create a new connect error.
    pub fn connect<S: Into<String>, M: Into<String>>(server: S, message: M) -> Self {
        Self::Connect {
            server: server.into(),
            message: message.into(),
        }
    }

    /// Create a connect error for a dial that ran out of time.
    pub fn connect_timeout<S: Into<String>>(server: S, after: Duration) -> Self {
        Self::Connect {
            server: server.into(),
            message: format!("timed out after {:?}", after),
        }
    }

    /// Create a new write error.
    pub fn write<S: Into<String>, M: Into<String>>(server: S, message: M) -> Self {
        Self::Write {
            server: server.into(),
            message: message.into(),
        }
    }

    /// Create a new read error.
    pub fn read<S: Into<String>, M: Into<String>>(server: S, message: M) -> Self {
        Self::Read {
            server: server.into(),
            message: message.into(),
        }
    }

    /// Create a new empty response error.
    pub fn empty_response<S: Into<String>>(server: S) -> Self {
        Self::EmptyResponse {
            server: server.into(),
        }
    }

    /// Create a new read-existing error.
    pub fn read_existing<P: Into<String>, M: Into<String>>(path: P, message: M) -> Self {
        Self::ReadExisting {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new parse-existing error.
    pub fn parse_existing<P: Into<String>, M: Into<String>>(path: P, message: M) -> Self {
        Self::ParseExisting {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new temp-file write error.
    pub fn write_temp<P: Into<String>, M: Into<String>>(path: P, message: M) -> Self {
        Self::WriteTemp {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new rename error.
    pub fn rename<P: Into<String>, M: Into<String>>(path: P, message: M) -> Self {
        Self::Rename {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new configuration error.
    pub fn config<M: Into<String>>(message: M) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Create a new file error.
    pub fn file_error<P: Into<String>, M: Into<String>>(path: P, message: M) -> Self {
        Self::FileError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new invalid input error.
    pub fn invalid_input<M: Into<String>>(message: M) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Whether this error came out of a single WHOIS exchange.
    ///
    /// These are recorded against the domain and never stop a batch.
    pub fn is_lookup_failure(&self) -> bool {
        matches!(
            self,
            Self::Connect { .. } | Self::Write { .. } | Self::Read { .. } | Self::EmptyResponse { .. }
        )
    }

    /// Whether this error came out of the merge-and-write step.
    ///
    /// Any of these means nothing was durably changed at the destination.
    pub fn is_persistence_failure(&self) -> bool {
        matches!(
            self,
            Self::ReadExisting { .. }
                | Self::ParseExisting { .. }
                | Self::Marshal { .. }
                | Self::WriteTemp { .. }
                | Self::Rename { .. }
        )
    }
}

impl fmt::Display for TaliaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect { server, message } => {
                write!(f, "failed to connect to {}: {}", server, message)
            }
            Self::Write { server, message } => {
                write!(f, "failed to send query to {}: {}", server, message)
            }
            Self::Read { server, message } => {
                write!(f, "read error from {}: {}", server, message)
            }
            Self::EmptyResponse { server } => {
                write!(f, "empty WHOIS response from {}", server)
            }
            Self::ReadExisting { path, message } => {
                write!(f, "read grouped file '{}': {}", path, message)
            }
            Self::ParseExisting { path, message } => {
                write!(f, "parse grouped file '{}': {}", path, message)
            }
            Self::Marshal { message } => {
                write!(f, "marshal grouped data: {}", message)
            }
            Self::WriteTemp { path, message } => {
                write!(f, "write temp file for '{}': {}", path, message)
            }
            Self::Rename { path, message } => {
                write!(f, "replace '{}' with temp file: {}", path, message)
            }
            Self::ConfigError { message } => {
                write!(f, "Configuration error: {}", message)
            }
            Self::FileError { path, message } => {
                write!(f, "File error at '{}': {}", path, message)
            }
            Self::InvalidInput { message } => {
                write!(f, "Invalid input: {}", message)
            }
        }
    }
}

impl std::error::Error for TaliaError {}

impl From<serde_json::Error> for TaliaError {
    fn from(err: serde_json::Error) -> Self {
        Self::Marshal {
            message: err.to_string(),
        }
    }
}
