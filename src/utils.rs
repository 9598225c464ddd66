//! Utility functions for file naming and text handling

use std::path::Path;

/// Maximum length of a sanitized filename, in characters
pub const MAX_FILENAME_CHARS: usize = 200;

/// Characters that are not allowed in filenames sent to clients
const FORBIDDEN_FILENAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Make a filename safe for a `Content-Disposition` header and common filesystems
///
/// Removes `< > : " / \ | ? *` and control characters, trims surrounding whitespace
/// and caps the result at [`MAX_FILENAME_CHARS`] characters.
///
/// # Examples
///
/// ```
/// use media_dl::utils::sanitize_filename;
///
/// assert_eq!(sanitize_filename("What? A \"clip\": part 1/2.mp4"), "What A clip part 12.mp4");
/// ```
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| !FORBIDDEN_FILENAME_CHARS.contains(c) && !c.is_control())
        .collect();
    truncate_chars(cleaned.trim(), MAX_FILENAME_CHARS)
}

/// Truncate a string to at most `max` characters (not bytes)
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((byte_index, _)) => text[..byte_index].to_string(),
        None => text.to_string(),
    }
}

/// Lowercased extension of a path, if any
pub fn extension_lowercase(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

/// MIME type for a media file, chosen by extension
///
/// Unknown extensions are served as `video/mp4`, the canonical container.
pub fn content_type_for(path: &Path) -> &'static str {
    match extension_lowercase(path).as_deref() {
        Some("webm") => "video/webm",
        Some("mkv") => "video/x-matroska",
        Some("m4v") => "video/x-m4v",
        Some("mov") => "video/quicktime",
        Some("m4a") => "audio/mp4",
        Some("mp3") => "audio/mpeg",
        Some("opus") | Some("ogg") => "audio/ogg",
        _ => "video/mp4",
    }
}

/// `Content-Disposition` value offering the file as an attachment
///
/// Carries both the sanitized plain `filename` and the RFC 5987 `filename*` form so
/// non-ASCII titles survive.
pub fn content_disposition(filename: &str) -> String {
    let safe = sanitize_filename(filename);
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        safe,
        urlencoding::encode(&safe)
    )
}

/// Bytes expressed in MiB
pub fn bytes_to_mib(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_forbidden_and_control_characters() {
        assert_eq!(
            sanitize_filename("a<b>c:d\"e/f\\g|h?i*j\u{0007}k\n.mp4"),
            "abcdefghijk.mp4"
        );
    }

    #[test]
    fn sanitize_keeps_unicode() {
        assert_eq!(sanitize_filename("Café 東京.mp4"), "Café 東京.mp4");
    }

    #[test]
    fn sanitize_caps_length_at_200_chars() {
        let long = "é".repeat(500);
        let result = sanitize_filename(&long);
        assert_eq!(result.chars().count(), MAX_FILENAME_CHARS);
    }

    #[test]
    fn truncate_counts_chars_not_bytes() {
        assert_eq!(truncate_chars("日本語テキスト", 3), "日本語");
        assert_eq!(truncate_chars("short", 80), "short");
        assert_eq!(truncate_chars("", 5), "");
    }

    #[test]
    fn content_type_defaults_to_mp4() {
        assert_eq!(content_type_for(Path::new("a.mp4")), "video/mp4");
        assert_eq!(content_type_for(Path::new("a.WEBM")), "video/webm");
        assert_eq!(content_type_for(Path::new("a.mkv")), "video/x-matroska");
        assert_eq!(content_type_for(Path::new("noext")), "video/mp4");
        assert_eq!(content_type_for(Path::new("a.bin")), "video/mp4");
    }

    #[test]
    fn content_disposition_has_plain_and_encoded_names() {
        let header = content_disposition("Café: live.mp4");
        assert_eq!(
            header,
            "attachment; filename=\"Café live.mp4\"; filename*=UTF-8''Caf%C3%A9%20live.mp4"
        );
    }

    #[test]
    fn extension_is_lowercased() {
        assert_eq!(extension_lowercase(Path::new("x.MP4")).as_deref(), Some("mp4"));
        assert_eq!(extension_lowercase(Path::new("x")), None);
    }
}
