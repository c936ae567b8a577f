use crate::error::PhoneValidationError;

pub const MIN_PHONE_DIGITS: usize = 8;

/// Whether a keystroke result may replace the phone field. Empty input is accepted.
pub fn is_phone_input_accepted(value: &str) -> bool {
    value.chars().all(|c| c.is_ascii_digit())
}

pub fn validate_phone(value: &str) -> Result<(), PhoneValidationError> {
    if value.is_empty() {
        return Err(PhoneValidationError::Empty);
    }
    if !is_phone_input_accepted(value) {
        return Err(PhoneValidationError::NonDigit);
    }
    // All ASCII, so byte length is the digit count.
    if value.len() < MIN_PHONE_DIGITS {
        return Err(PhoneValidationError::TooShort {
            min: MIN_PHONE_DIGITS,
            actual: value.len(),
        });
    }
    Ok(())
}
