use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("Requested {requested} elements but only {available} are stored")]
    OutOfRange { requested: usize, available: usize },
}
