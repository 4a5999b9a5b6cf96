//! Observable lifecycle state shared by the pipeline and the ranking feed

use crate::core::error::RateError;

#[derive(Debug, Clone, PartialEq)]
pub enum Phase<T> {
    Idle,
    Loading,
    Ready(T),
    Failed(RateError),
}

impl<T> Phase<T> {
    /// True once a request has finished, successfully or not.
    pub fn is_settled(&self) -> bool {
        matches!(self, Phase::Ready(_) | Phase::Failed(_))
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Phase::Loading)
    }

    pub fn ready(&self) -> Option<&T> {
        match self {
            Phase::Ready(value) => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&RateError> {
        match self {
            Phase::Failed(err) => Some(err),
            _ => None,
        }
    }
}
