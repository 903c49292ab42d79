const UTF8_BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];

/// Decode an uploaded file as UTF-8, skipping a leading byte order mark.
pub fn decode_upload(bytes: &[u8]) -> Option<String> {
    let bytes = bytes.strip_prefix(&UTF8_BOM).unwrap_or(bytes);
    String::from_utf8(bytes.to_vec()).ok()
}

pub fn has_srt_extension(file_name: &str) -> bool {
    file_name.to_ascii_lowercase().ends_with(".srt")
}
