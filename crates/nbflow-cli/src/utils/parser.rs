use nbflow::core::models::locality::LocalityClass;
use nbflow::engine::queue::Stage;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("Invalid fault format for '{0}'. Expected 'class:stage' (e.g., 'non-local:kernel').")]
    InvalidFaultFormat(String),

    #[error("Unknown locality class '{0}'. Expected 'local' or 'non-local'.")]
    UnknownLocality(String),

    #[error("Unknown stage '{0}'. Expected 'transfer', 'kernel' or 'result-copy'.")]
    UnknownStage(String),
}

pub fn parse_locality(name: &str) -> Result<LocalityClass, ParseError> {
    LocalityClass::ALL
        .into_iter()
        .find(|l| l.as_str() == name)
        .ok_or_else(|| ParseError::UnknownLocality(name.to_string()))
}

pub fn parse_stage(name: &str) -> Result<Stage, ParseError> {
    match name {
        "transfer" => Ok(Stage::Transfer),
        "kernel" => Ok(Stage::Kernel),
        "result-copy" => Ok(Stage::ResultCopy),
        _ => Err(ParseError::UnknownStage(name.to_string())),
    }
}

/// Parses a `class:stage` fault specification.
pub fn parse_fault(spec: &str) -> Result<(LocalityClass, Stage), ParseError> {
    let (class, stage) = spec
        .split_once(':')
        .ok_or_else(|| ParseError::InvalidFaultFormat(spec.to_string()))?;
    if class.is_empty() || stage.is_empty() {
        return Err(ParseError::InvalidFaultFormat(spec.to_string()));
    }
    Ok((parse_locality(class.trim())?, parse_stage(stage.trim())?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_fault_specs() {
        assert_eq!(
            parse_fault("non-local:kernel"),
            Ok((LocalityClass::NonLocal, Stage::Kernel))
        );
        assert_eq!(
            parse_fault("local:result-copy"),
            Ok((LocalityClass::Local, Stage::ResultCopy))
        );
    }

    #[test]
    fn rejects_missing_separator() {
        assert_eq!(
            parse_fault("local-kernel"),
            Err(ParseError::InvalidFaultFormat("local-kernel".to_string()))
        );
        assert_eq!(
            parse_fault(":kernel"),
            Err(ParseError::InvalidFaultFormat(":kernel".to_string()))
        );
    }

    #[test]
    fn rejects_unknown_components() {
        assert_eq!(
            parse_fault("remote:kernel"),
            Err(ParseError::UnknownLocality("remote".to_string()))
        );
        assert_eq!(
            parse_fault("local:compute"),
            Err(ParseError::UnknownStage("compute".to_string()))
        );
    }
}
