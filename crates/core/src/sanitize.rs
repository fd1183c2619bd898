//! Filename sanitization for values that reach the filesystem.
//!
//! Upload ids and extensions both end up as path components under the
//! uploads directory. Everything outside a conservative charset is stripped
//! before use; an id that sanitizes to nothing is rejected.

/// Maximum length of a file extension after sanitization.
pub const MAX_EXTENSION_LEN: usize = 10;

/// Sanitize an upload id for filesystem use.
///
/// Keeps only `[A-Za-z0-9_-]`, which removes path separators, null bytes
/// and `..` sequences as a side effect. Returns an error if nothing
/// survives.
pub fn sanitize_upload_id(id: &str) -> crate::Result<String> {
    let cleaned: String = id
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect();

    if cleaned.is_empty() {
        return Err(crate::Error::InvalidUploadId(format!(
            "upload id {id:?} is empty after sanitization"
        )));
    }
    Ok(cleaned)
}

/// Sanitize a file extension for filesystem use.
///
/// Keeps only `[A-Za-z0-9]` and truncates to [`MAX_EXTENSION_LEN`]. An
/// empty result means the stored file carries no extension suffix.
pub fn sanitize_extension(ext: &str) -> String {
    ext.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(MAX_EXTENSION_LEN)
        .collect()
}

/// Extract and sanitize the extension from a declared filename.
pub fn extension_of(file_name: &str) -> String {
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => sanitize_extension(ext),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_id_passes_clean_input() {
        let id = "a".repeat(64);
        assert_eq!(sanitize_upload_id(&id).unwrap(), id);
    }

    #[test]
    fn upload_id_strips_traversal() {
        assert_eq!(sanitize_upload_id("../../etc/passwd").unwrap(), "etcpasswd");
        assert_eq!(sanitize_upload_id("a/b\\c\0d").unwrap(), "abcd");
    }

    #[test]
    fn upload_id_rejects_empty_result() {
        assert!(sanitize_upload_id("../..").is_err());
        assert!(sanitize_upload_id("").is_err());
    }

    #[test]
    fn extension_filters_and_truncates() {
        assert_eq!(sanitize_extension("tar.gz"), "targz");
        assert_eq!(sanitize_extension("exe\0"), "exe");
        assert_eq!(sanitize_extension("abcdefghijkl"), "abcdefghij");
        assert_eq!(sanitize_extension("../"), "");
    }

    #[test]
    fn extension_of_handles_edge_names() {
        assert_eq!(extension_of("photo.jpeg"), "jpeg");
        assert_eq!(extension_of("archive.tar.gz"), "gz");
        assert_eq!(extension_of("noext"), "");
        assert_eq!(extension_of(".hidden"), "");
    }
}
