// Input validation utilities.

use anyhow::Result;
use regex::Regex;

/// Hard upload cap. Files over this size are rejected before any network
/// call is made.
pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// Exact user-facing message for oversized files.
pub const UPLOAD_TOO_LARGE_MESSAGE: &str = "File is too large. Maximum size is 10MB.";

/// Prefix marking a pre-save session id. Temporary applications never touch
/// the remote record store.
pub const TEMP_ID_PREFIX: &str = "temp_";

/// The one hard persistence invariant: never call the remote API with an
/// empty application id.
pub fn validate_application_id(id: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(anyhow::anyhow!("Application id is required"));
    }
    Ok(())
}

pub fn is_temporary_id(id: &str) -> bool {
    id.trim().starts_with(TEMP_ID_PREFIX)
}

/// Reduce an uploaded file name to a storage-safe form: keep letters,
/// digits, dot, underscore and dash; everything else collapses to a single
/// underscore. An empty result falls back to "file".
pub fn sanitize_file_name(name: &str) -> String {
    let re = match Regex::new(r"[^A-Za-z0-9._-]+") {
        Ok(re) => re,
        Err(_) => return "file".to_string(),
    };
    let cleaned = re.replace_all(name.trim(), "_");
    // Leading dots/underscores are stripped so relative-path fragments can
    // never survive into a storage key.
    let cleaned = cleaned.trim_matches(|c: char| c == '_' || c == '.');
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Basic shape check for merchant email addresses. Full validation happens
/// server-side; this only stops obviously broken input.
pub fn validate_email(email: &str) -> Result<()> {
    let re = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$")
        .map_err(|e| anyhow::anyhow!("Internal error: failed to compile email regex: {}", e))?;
    if !re.is_match(email.trim()) {
        return Err(anyhow::anyhow!("Merchant email is not a valid address"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_application_ids_are_rejected() {
        assert!(validate_application_id("").is_err());
        assert!(validate_application_id("   ").is_err());
        assert!(validate_application_id("app-1").is_ok());
    }

    #[test]
    fn temp_ids_are_detected_by_prefix() {
        assert!(is_temporary_id("temp_1712000000"));
        assert!(!is_temporary_id("app-1"));
        assert!(!is_temporary_id("tempo"));
    }

    #[test]
    fn file_names_are_sanitized() {
        assert_eq!(sanitize_file_name("bank statement (jan).pdf"), "bank_statement_jan_.pdf");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "etc_passwd");
        assert_eq!(sanitize_file_name("statement.pdf"), "statement.pdf");
        assert_eq!(sanitize_file_name("???"), "file");
        assert_eq!(sanitize_file_name(""), "file");
    }

    #[test]
    fn email_shape_check() {
        assert!(validate_email("merchant@example.com").is_ok());
        assert!(validate_email("no-at-sign").is_err());
        assert!(validate_email("two@@example.com").is_err());
        assert!(validate_email("name@host").is_err());
    }
}
