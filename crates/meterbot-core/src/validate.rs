/// Why a reply could not be accepted as a meter reading.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("value should be a number, got {0:?}")]
    NotANumber(String),

    #[error("value should be positive number, got {0}")]
    Negative(i64),
}

/// Parse a free-text reply into a meter reading.
///
/// Surrounding whitespace is ignored. The same rule is used when reading
/// stored spreadsheet cells back.
pub fn validate(raw: &str) -> Result<u64, ValidationError> {
    let text = raw.trim();
    let value = text
        .parse::<i64>()
        .map_err(|_| ValidationError::NotANumber(text.to_string()))?;

    if value < 0 {
        return Err(ValidationError::Negative(value));
    }
    Ok(value as u64)
}
