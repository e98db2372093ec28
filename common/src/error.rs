use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ControlError {
    #[error("invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },
    #[error("preset '{0}' not found")]
    NotFound(String),
    #[error("temperature sensor '{0}' has no valid reading")]
    SensorFault(String),
}

impl ControlError {
    pub(crate) fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }
}

pub type ControlResult<T> = Result<T, ControlError>;
