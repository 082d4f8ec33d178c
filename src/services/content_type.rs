//! Extension-based MIME lookup. Object bytes are never inspected.

/// MIME type for `key` based on its final extension, case-insensitively.
pub fn content_type_for(key: &str) -> Option<&'static str> {
    mime_guess::from_path(key).first_raw()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_extensions() {
        assert_eq!(content_type_for("file.txt"), Some("text/plain"));
        assert_eq!(content_type_for("photos/2025/IMG.JPG"), Some("image/jpeg"));
        assert_eq!(content_type_for("icons/logo.png"), Some("image/png"));
        assert_eq!(content_type_for("books/x.epub"), Some("application/epub+zip"));
    }

    #[test]
    fn only_final_extension_counts() {
        assert_eq!(content_type_for("backup.txt.png"), Some("image/png"));
        assert_eq!(content_type_for("dir.txt/image.png"), Some("image/png"));
    }

    #[test]
    fn unknown_or_missing_extension() {
        assert_eq!(content_type_for("archive.unknownext"), None);
        assert_eq!(content_type_for("README"), None);
        assert_eq!(content_type_for(".hidden"), None);
        assert_eq!(content_type_for("dir.d/noext"), None);
    }
}
