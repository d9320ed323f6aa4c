//! Validation helpers for quiz content DTOs.

use validator::ValidationError;

/// Minimum number of answer options a question must offer.
pub const MIN_ANSWERS: usize = 2;

/// Validates that a title holds something other than whitespace.
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("Value must not be blank".into());
        return Err(err);
    }
    Ok(())
}

/// Validates the correctness flags of a question's answers.
///
/// # Examples
///
/// ```ignore
/// validate_answer_flags(&[true, false])        // Ok
/// validate_answer_flags(&[true])               // Err - too few answers
/// validate_answer_flags(&[true, true, false])  // Err - two correct answers
/// ```
pub fn validate_answer_flags(flags: &[bool]) -> Result<(), ValidationError> {
    if flags.len() < MIN_ANSWERS {
        let mut err = ValidationError::new("answers_count");
        err.message = Some(
            format!(
                "There must be at least {MIN_ANSWERS} possible answers (got {})",
                flags.len()
            )
            .into(),
        );
        return Err(err);
    }

    let correct = flags.iter().filter(|flag| **flag).count();
    if correct != 1 {
        let mut err = ValidationError::new("answers_correct");
        err.message = Some(format!("There must be exactly one right answer (got {correct})").into());
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_not_blank() {
        assert!(validate_not_blank("Capitals").is_ok());
        assert!(validate_not_blank("").is_err());
        assert!(validate_not_blank("   ").is_err());
    }

    #[test]
    fn test_validate_answer_flags_valid() {
        assert!(validate_answer_flags(&[true, false]).is_ok());
        assert!(validate_answer_flags(&[false, false, true, false]).is_ok());
    }

    #[test]
    fn test_validate_answer_flags_invalid() {
        assert!(validate_answer_flags(&[]).is_err());
        assert!(validate_answer_flags(&[true]).is_err()); // too few
        assert!(validate_answer_flags(&[false, false]).is_err()); // no right answer
        assert!(validate_answer_flags(&[true, true]).is_err()); // two right answers
    }
}
