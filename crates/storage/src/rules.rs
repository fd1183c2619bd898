//! Assembled-file validation rules.

use sluice_core::config::UploadRules;
use sluice_core::session::FileInfo;

/// Check the assembled file against the ruleset.
///
/// `ext` is the sanitized extension the file was stored with. Returns the
/// first violated rule as an error message; the caller turns it into a
/// `StorageError::Validation` and deletes the temp file.
pub fn check(
    file_info: &FileInfo,
    ext: &str,
    actual_len: u64,
    rules: &UploadRules,
) -> Result<(), String> {
    if actual_len > rules.max_size_bytes {
        return Err(format!(
            "file size {} exceeds maximum {}",
            actual_len, rules.max_size_bytes
        ));
    }

    if !rules.allowed_mime_types.is_empty()
        && !rules
            .allowed_mime_types
            .iter()
            .any(|m| m == &file_info.content_type)
    {
        return Err(format!(
            "mime type {:?} is not allowed",
            file_info.content_type
        ));
    }

    if !rules.allowed_extensions.is_empty()
        && !rules.allowed_extensions.iter().any(|e| e == ext)
    {
        return Err(format!("extension {ext:?} is not allowed"));
    }

    Ok(())
}
