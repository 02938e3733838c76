//! Error types for the Jupyter operator
//!
//! Every error maps onto one [`FailureClass`], which decides what the
//! reconciler does next: skip an object that already exists, hand the error
//! back to the runtime for a later retry, or record a terminal failure on the
//! notebook's status.

use thiserror::Error;

/// Main error type for Jupyter operator operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// The notebook's material is structurally invalid
    #[error("validation error for {notebook}: {message}")]
    Validation {
        /// Name of the notebook with invalid material
        notebook: String,
        /// Description of what's invalid
        message: String,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Operator configuration error (startup only)
    #[error("configuration error: {0}")]
    Config(String),

    /// The notebook has no namespace
    #[error("missing namespace on JupyterNotebook {0}")]
    MissingNamespace(String),

    /// The notebook has no UID, so owned objects cannot reference it
    #[error("JupyterNotebook {0} has no uid; cannot build owner reference")]
    MissingOwnerUid(String),

    /// An object created by an earlier attempt does not have the expected content
    #[error("existing {kind} {name} is unusable: {message}")]
    CorruptArtifact {
        /// Kind of the object
        kind: String,
        /// Name of the object
        name: String,
        /// What's wrong with it
        message: String,
    },
}

/// How the reconciler should treat a failure
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureClass {
    /// The object was created by an earlier attempt; carry on
    AlreadyExists,
    /// Transient; the runtime should re-invoke the whole reconciliation later
    Retryable,
    /// Will fail identically on retry; record it and stop
    Permanent,
}

impl Error {
    /// Create a validation error for a notebook
    pub fn validation(notebook: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Validation {
            notebook: notebook.into(),
            message: msg.into(),
        }
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Create a configuration error with the given message
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an error for an unusable pre-existing object
    pub fn corrupt_artifact(
        kind: impl Into<String>,
        name: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::CorruptArtifact {
            kind: kind.into(),
            name: name.into(),
            message: msg.into(),
        }
    }

    /// Classify this error for the reconciler
    ///
    /// Throttling and server-side unavailability are transient, as are
    /// transport failures that never reached the API server. Every other
    /// API rejection (bad request, quota, forbidden, invalid) is permanent.
    pub fn classify(&self) -> FailureClass {
        match self {
            Error::Kube(kube::Error::Api(ae)) => match ae.code {
                409 => FailureClass::AlreadyExists,
                429 | 500 | 502 | 503 | 504 => FailureClass::Retryable,
                _ => FailureClass::Permanent,
            },
            Error::Kube(_) => FailureClass::Retryable,
            Error::Validation { .. }
            | Error::Serialization(_)
            | Error::Config(_)
            | Error::MissingNamespace(_)
            | Error::MissingOwnerUid(_)
            | Error::CorruptArtifact { .. } => FailureClass::Permanent,
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        self.classify() == FailureClass::Retryable
    }

    /// Check if this error reports an object that already exists
    pub fn is_already_exists(&self) -> bool {
        self.classify() == FailureClass::AlreadyExists
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

#[cfg(test)]
pub(crate) fn api_error(code: u16, reason: &str) -> Error {
    Error::Kube(kube::Error::Api(kube::core::ErrorResponse {
        status: "Failure".to_string(),
        message: format!("{} ({})", reason, code),
        reason: reason.to_string(),
        code,
    }))
}
