//! Common validation utilities.

use validator::ValidationError;

/// Validates that a URL uses the http or https scheme.
pub fn validate_http_url(url: &str) -> Result<(), ValidationError> {
    let lower = url.to_ascii_lowercase();
    let rest = lower
        .strip_prefix("https://")
        .or_else(|| lower.strip_prefix("http://"));

    match rest {
        Some(host) if !host.is_empty() && !host.starts_with('/') => Ok(()),
        _ => {
            let mut err = ValidationError::new("http_url");
            err.message = Some("URL must use the http or https scheme".into());
            Err(err)
        }
    }
}

/// Validates that a string contains something other than whitespace.
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("Value cannot be blank".into());
        Err(err)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_http_url() {
        assert!(validate_http_url("https://hooks.example.com/telecom").is_ok());
        assert!(validate_http_url("http://localhost:8080/hook").is_ok());
        assert!(validate_http_url("HTTPS://EXAMPLE.COM").is_ok());
        assert!(validate_http_url("ftp://example.com").is_err());
        assert!(validate_http_url("https://").is_err());
        assert!(validate_http_url("example.com/hook").is_err());
    }

    #[test]
    fn test_validate_http_url_error_message() {
        let err = validate_http_url("mailto:ops@example.com").unwrap_err();
        assert_eq!(
            err.message.unwrap().to_string(),
            "URL must use the http or https scheme"
        );
    }

    #[test]
    fn test_validate_not_blank() {
        assert!(validate_not_blank("Acme").is_ok());
        assert!(validate_not_blank("   ").is_err());
        assert!(validate_not_blank("").is_err());
    }
}
