use crate::domain::error::{AppError, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};

/// Decode uploaded file content given as plain base64 or a `data:<mime>;base64,` URL.
pub fn decode_base64_content(content: &str) -> Result<Vec<u8>> {
    let payload = match content.split_once(";base64,") {
        Some((prefix, data)) if prefix.trim_start().starts_with("data:") => data,
        _ => content,
    };
    STANDARD
        .decode(payload.trim())
        .map_err(|e| AppError::ValidationError(format!("File content is not valid base64: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_and_data_url_payloads_decode() {
        assert_eq!(decode_base64_content("YWJj").unwrap(), b"abc");
        assert_eq!(
            decode_base64_content("data:text/csv;base64,YWJj").unwrap(),
            b"abc"
        );
        assert_eq!(decode_base64_content("  YWJj\n").unwrap(), b"abc");
    }

    #[test]
    fn invalid_payloads_are_validation_errors() {
        assert!(matches!(
            decode_base64_content("%%%"),
            Err(AppError::ValidationError(_))
        ));
        assert!(matches!(
            decode_base64_content("data:text/csv;base64,%%%"),
            Err(AppError::ValidationError(_))
        ));
    }
}
