//! Validation helpers for DTOs.

use validator::ValidationError;

/// Validates that a session code is exactly 4 uppercase ASCII letters.
///
/// # Examples
///
/// ```ignore
/// validate_session_code("WXYZ") // Ok
/// validate_session_code("wxyz") // Err - lowercase
/// validate_session_code("WXY")  // Err - too short
/// ```
pub fn validate_session_code(code: &str) -> Result<(), ValidationError> {
    if code.len() != 4 {
        let mut err = ValidationError::new("session_code_length");
        err.message =
            Some(format!("Session code must be exactly 4 characters (got {})", code.len()).into());
        return Err(err);
    }

    if !code.chars().all(|c| c.is_ascii_uppercase()) {
        let mut err = ValidationError::new("session_code_format");
        err.message = Some("Session code must contain only uppercase letters A-Z".into());
        return Err(err);
    }

    Ok(())
}

/// Validates a question payload: four distinct options with the correct
/// answer among them.
pub fn validate_question_options(
    options: &[String],
    correct_answer: &str,
) -> Result<(), ValidationError> {
    if options.len() != 4 {
        let mut err = ValidationError::new("question_options_count");
        err.message =
            Some(format!("A question needs exactly 4 options (got {})", options.len()).into());
        return Err(err);
    }

    let mut seen = options.to_vec();
    seen.sort();
    seen.dedup();
    if seen.len() != options.len() {
        let mut err = ValidationError::new("question_options_distinct");
        err.message = Some("Question options must be distinct".into());
        return Err(err);
    }

    if !options.iter().any(|option| option == correct_answer) {
        let mut err = ValidationError::new("question_correct_answer");
        err.message = Some("The correct answer must be one of the options".into());
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_session_code_valid() {
        assert!(validate_session_code("ABCD").is_ok());
        assert!(validate_session_code("ZZZZ").is_ok());
        assert!(validate_session_code("QXJT").is_ok());
    }

    #[test]
    fn test_validate_session_code_invalid_length() {
        assert!(validate_session_code("ABC").is_err()); // too short
        assert!(validate_session_code("ABCDE").is_err()); // too long
        assert!(validate_session_code("").is_err()); // empty
    }

    #[test]
    fn test_validate_session_code_invalid_format() {
        assert!(validate_session_code("abcd").is_err()); // lowercase
        assert!(validate_session_code("AB1D").is_err()); // digit
        assert!(validate_session_code("AB D").is_err()); // space
        assert!(validate_session_code("ABÉD").is_err()); // non-ascii
    }

    fn options(list: [&str; 4]) -> Vec<String> {
        list.into_iter().map(String::from).collect()
    }

    #[test]
    fn test_validate_question_options_valid() {
        let opts = options(["Pinot Noir", "Merlot", "Syrah", "Gamay"]);
        assert!(validate_question_options(&opts, "Merlot").is_ok());
    }

    #[test]
    fn test_validate_question_options_invalid() {
        let opts = options(["Pinot Noir", "Merlot", "Syrah", "Gamay"]);
        assert!(validate_question_options(&opts, "Malbec").is_err()); // answer missing
        assert!(validate_question_options(&opts[..3].to_vec(), "Merlot").is_err()); // too few

        let dupes = options(["Merlot", "Merlot", "Syrah", "Gamay"]);
        assert!(validate_question_options(&dupes, "Syrah").is_err()); // duplicates
    }
}
