//! Error types for the viewer core

use serde::{Deserialize, Serialize};

/// Error type covering every fallible core operation.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ViewerError {
    /// Section id does not exist in the active model
    #[error("Section not found: {id}")]
    SectionNotFound { id: String },

    /// Model id does not exist in the repository
    #[error("Model not found: {id}")]
    ModelNotFound { id: String },

    /// No model is currently active
    #[error("No active model")]
    NoActiveModel,

    /// Animation requested while another run is in progress
    #[error("Animation already in progress: {status}")]
    AlreadyAnimating { status: String },

    /// Undo requested with an empty history
    #[error("Nothing to undo")]
    NoHistory,

    /// Redo requested with an empty redo stack
    #[error("Nothing to redo")]
    NoRedo,

    /// Section forest failed validation on load
    #[error("Invalid hierarchy: {reason}")]
    InvalidHierarchy { reason: String },

    /// Model document failed validation
    #[error("Invalid model: {reason}")]
    InvalidModel { reason: String },

    /// An event subscriber reported a failure
    #[error("Event handler failed: {message}")]
    HandlerFailed { message: String },

    /// Serialization error
    #[error("Serialization error: {reason}")]
    Serialization { reason: String },

    /// Generic viewer error
    #[error("Viewer error: {message}")]
    Generic { message: String },
}

impl ViewerError {
    /// Create a new generic error
    pub fn new(message: impl Into<String>) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }

    /// Every failure in this core is local and recoverable: a rejected
    /// operation leaves state untouched and the caller may retry.
    #[inline]
    pub fn is_recoverable(&self) -> bool {
        true
    }

    /// Get error category for logging/metrics
    #[inline]
    pub fn category(&self) -> &'static str {
        match self {
            Self::SectionNotFound { .. } | Self::ModelNotFound { .. } | Self::NoActiveModel => {
                "lookup"
            }
            Self::AlreadyAnimating { .. } => "animation",
            Self::NoHistory | Self::NoRedo => "history",
            Self::InvalidHierarchy { .. } | Self::InvalidModel { .. } => "validation",
            Self::HandlerFailed { .. } => "handler",
            Self::Serialization { .. } => "serialization",
            Self::Generic { .. } => "generic",
        }
    }
}

impl From<serde_json::Error> for ViewerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            reason: err.to_string(),
        }
    }
}
