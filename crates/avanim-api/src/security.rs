//! Input validation and sanitization for uploads and free text.

/// Extensions accepted for avatar images.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif"];

/// Extensions accepted for custom driving videos.
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov"];

/// Maximum length kept from a client-supplied file name.
const MAX_FILENAME_LENGTH: usize = 100;

/// Maximum length of names and other short free text.
pub const MAX_NAME_LENGTH: usize = 200;

/// Lowercased extension of `filename` if it is in `allowed`.
pub fn allowed_extension(filename: &str, allowed: &[&str]) -> Option<String> {
    let (_, ext) = filename.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    allowed.contains(&ext.as_str()).then_some(ext)
}

/// Reduce a client file name to a safe single path component.
///
/// Directory parts are dropped, whitespace becomes `_`, anything outside
/// `[A-Za-z0-9._-]` is removed and leading dots are stripped. A stem that
/// cleans away entirely becomes `upload` so the extension survives.
/// Returns `None` when nothing usable is left.
pub fn sanitize_filename(filename: &str) -> Option<String> {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    let (stem, ext) = match base.rsplit_once('.') {
        Some((stem, ext))
            if !ext.is_empty() && ext.len() < 10 && ext.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            (stem, Some(ext))
        }
        _ => (base, None),
    };

    let cleaned: String = stem
        .chars()
        .filter_map(|c| match c {
            c if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') => Some(c),
            c if c.is_whitespace() => Some('_'),
            _ => None,
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');

    match ext {
        Some(ext) => {
            let stem = if cleaned.is_empty() { "upload" } else { cleaned };
            let keep = MAX_FILENAME_LENGTH - ext.len() - 1;
            Some(format!("{}.{}", &stem[..keep.min(stem.len())], ext))
        }
        None => {
            let truncated = &cleaned[..MAX_FILENAME_LENGTH.min(cleaned.len())];
            (!truncated.is_empty()).then(|| truncated.to_string())
        }
    }
}

/// Stored name for an upload: `<uuid>_<sanitized name>`.
pub fn unique_upload_name(filename: &str) -> Option<String> {
    sanitize_filename(filename).map(|name| format!("{}_{}", uuid::Uuid::new_v4(), name))
}

/// Whether a stored relative path stays inside its upload area.
pub fn is_safe_relative_path(path: &str) -> bool {
    !path.is_empty()
        && !path.starts_with('/')
        && !path.contains('\\')
        && path.split('/').all(|seg| !seg.is_empty() && seg != "." && seg != "..")
}

/// Strip control characters and cap the length of a name.
pub fn sanitize_name(input: &str) -> String {
    input
        .trim()
        .chars()
        .filter(|c| !c.is_control())
        .take(MAX_NAME_LENGTH)
        .collect()
}
