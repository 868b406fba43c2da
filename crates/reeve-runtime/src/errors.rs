//! Runtime error type.

/// Errors from fleet operations.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// No controller with the given ID.
    #[error("controller {0:?} not found")]
    ControllerNotFound(String),

    /// A controller with the given name is already registered.
    #[error("controller {0:?} already registered")]
    ControllerExists(String),

    /// No model with the given ID.
    #[error("model {0:?} not found")]
    ModelNotFound(String),
}
