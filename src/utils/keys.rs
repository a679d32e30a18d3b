use percent_encoding::percent_decode_str;

/// Object keys in S3 event notifications are form-encoded: spaces arrive as
/// `+` and other reserved bytes as `%XX`.
pub fn decode_event_key(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
}

/// Storage keys always use `/` as separator.
pub fn normalize_key(key: &str) -> String {
    key.replace('\\', "/")
}

/// Split a normalized key into its directory (no trailing slash) and file name.
pub fn split_key(key: &str) -> (&str, &str) {
    match key.rsplit_once('/') {
        Some((dir, file)) => (dir, file),
        None => ("", key),
    }
}

/// File name without its last extension. Dot-files keep their full name.
pub fn file_stem(key: &str) -> &str {
    let (_, file) = split_key(key);
    match file.rfind('.') {
        Some(idx) if idx > 0 => &file[..idx],
        _ => file,
    }
}

/// Base name used for archive entries, derived from the source object.
pub fn archive_base_name(source_key: &str) -> String {
    file_stem(&normalize_key(source_key)).to_string()
}

/// `{dir}/{stem}.zip` next to the source object, or `{stem}.zip` at the
/// bucket root when the source has no directory.
pub fn destination_key(source_key: &str) -> String {
    let normalized = normalize_key(source_key);
    let (dir, _) = split_key(&normalized);
    let stem = file_stem(&normalized);
    if dir.is_empty() {
        format!("{}.zip", stem)
    } else {
        format!("{}/{}.zip", dir, stem)
    }
}
