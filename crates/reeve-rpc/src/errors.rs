//! RPC error kinds and wire codes.

use crate::types::RpcErrorBody;

// ── Error code constants ────────────────────────────────────────────

/// Method is not registered for the requested root/version.
pub const NOT_IMPLEMENTED: &str = "NOT_IMPLEMENTED";
/// Object identifier supplied to a method that does not take one.
pub const BAD_OBJECT_ID: &str = "BAD_OBJECT_ID";
/// Params missing, malformed, or of the wrong shape.
pub const INVALID_PARAMS: &str = "INVALID_PARAMS";
/// Unexpected internal error.
pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
/// Call was cancelled before the handler finished.
pub const CANCELLED: &str = "CANCELLED";
/// Controller does not exist in the fleet.
pub const CONTROLLER_NOT_FOUND: &str = "CONTROLLER_NOT_FOUND";
/// Model does not exist on any controller.
pub const MODEL_NOT_FOUND: &str = "MODEL_NOT_FOUND";
/// Entity already exists.
pub const ALREADY_EXISTS: &str = "ALREADY_EXISTS";

/// Error type returned by method lookup, dispatch, and handlers.
///
/// Lookup misses and object-id misuse are routine operational errors; they
/// are encoded onto the wire and never tear down the dispatcher.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    /// No method registered under `root(version).method`.
    #[error("no such request - method {root}({version}).{method} is not implemented")]
    NotImplemented {
        /// Requested root name.
        root: String,
        /// Requested facade version.
        version: u32,
        /// Requested method name.
        method: String,
    },

    /// A non-empty object identifier was passed to a method that does not
    /// address objects.
    #[error("bad object identifier {id:?}")]
    BadId {
        /// The offending identifier.
        id: String,
    },

    /// Required parameter missing or of the wrong type.
    #[error("{message}")]
    InvalidParams {
        /// What is wrong with the params.
        message: String,
    },

    /// Requested entity not found.
    #[error("{message}")]
    NotFound {
        /// Specific error code (e.g. `CONTROLLER_NOT_FOUND`).
        code: &'static str,
        /// Human-readable message.
        message: String,
    },

    /// Entity already exists.
    #[error("{message}")]
    AlreadyExists {
        /// Human-readable message.
        message: String,
    },

    /// Unexpected internal failure.
    #[error("{message}")]
    Internal {
        /// Description.
        message: String,
    },

    /// The call's context was cancelled before the handler finished.
    #[error("request cancelled")]
    Cancelled,
}

impl From<reeve_runtime::RuntimeError> for RpcError {
    fn from(err: reeve_runtime::RuntimeError) -> Self {
        use reeve_runtime::RuntimeError;
        match err {
            RuntimeError::ControllerNotFound(_) => Self::NotFound {
                code: CONTROLLER_NOT_FOUND,
                message: err.to_string(),
            },
            RuntimeError::ModelNotFound(_) => Self::NotFound {
                code: MODEL_NOT_FOUND,
                message: err.to_string(),
            },
            RuntimeError::ControllerExists(_) => Self::AlreadyExists {
                message: err.to_string(),
            },
        }
    }
}

impl RpcError {
    /// Shorthand for [`RpcError::NotImplemented`].
    pub fn not_implemented(root: impl Into<String>, version: u32, method: impl Into<String>) -> Self {
        Self::NotImplemented {
            root: root.into(),
            version,
            method: method.into(),
        }
    }

    /// Shorthand for [`RpcError::InvalidParams`].
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::InvalidParams {
            message: message.into(),
        }
    }

    /// Shorthand for [`RpcError::Internal`].
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Machine-readable wire code for this variant.
    pub fn code(&self) -> &str {
        match self {
            Self::NotImplemented { .. } => NOT_IMPLEMENTED,
            Self::BadId { .. } => BAD_OBJECT_ID,
            Self::InvalidParams { .. } => INVALID_PARAMS,
            Self::NotFound { code, .. } => code,
            Self::AlreadyExists { .. } => ALREADY_EXISTS,
            Self::Internal { .. } => INTERNAL_ERROR,
            Self::Cancelled => CANCELLED,
        }
    }

    /// Convert to the wire-format error body.
    pub fn to_error_body(&self) -> RpcErrorBody {
        RpcErrorBody {
            code: self.code().to_owned(),
            message: self.to_string(),
        }
    }
}
