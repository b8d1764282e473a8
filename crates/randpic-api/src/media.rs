//! Content-type detection for served images.
//!
//! The leading bytes decide; the extension is only a fallback for files
//! whose signature is not recognised.

/// Number of leading bytes [`content_type`] needs to see.
pub const SNIFF_LEN: usize = 16;

/// MIME type for unrecognised content.
pub const OCTET_STREAM: &str = "application/octet-stream";

const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF];
const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
const GIF87_MAGIC: &[u8] = b"GIF87a";
const GIF89_MAGIC: &[u8] = b"GIF89a";

/// Detect the MIME type of an image from its content, falling back to its
/// extension.
pub fn content_type(bytes: &[u8], extension: Option<&str>) -> &'static str {
    sniff(bytes)
        .or_else(|| extension.and_then(from_extension))
        .unwrap_or(OCTET_STREAM)
}

fn sniff(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(JPEG_MAGIC) {
        Some("image/jpeg")
    } else if bytes.starts_with(PNG_MAGIC) {
        Some("image/png")
    } else if bytes.starts_with(GIF87_MAGIC) || bytes.starts_with(GIF89_MAGIC) {
        Some("image/gif")
    } else {
        None
    }
}

fn from_extension(extension: &str) -> Option<&'static str> {
    match extension {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}
