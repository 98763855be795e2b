//! Content sniffing
//!
//! MIME type and extension are derived from the leading bytes of a body.
//! Raster images are recognised by the `image` crate; fonts, audio and
//! video containers by a small signature table. When the bytes carry no
//! recognizable signature (plain text formats such as CSS and JavaScript)
//! the locator's suffix decides.

use image::{ImageFormat, ImageReader};
use std::io::Cursor;

/// Fallback for bodies that neither the signatures nor the suffix identify
pub const OCTET_STREAM: &str = "application/octet-stream";

struct Signature {
    offset: usize,
    magic: &'static [u8],
    mime_type: &'static str,
    extension: &'static str,
}

/// Non-raster formats, plus cursors which `image` does not distinguish
const SIGNATURES: &[Signature] = &[
    Signature { offset: 8, magic: b"WAVE", mime_type: "audio/wav", extension: "wav" },
    Signature { offset: 8, magic: b"AVI ", mime_type: "video/x-msvideo", extension: "avi" },
    Signature { offset: 0, magic: b"\x00\x00\x02\x00", mime_type: "image/x-icon", extension: "cur" },
    Signature { offset: 0, magic: b"wOFF", mime_type: "font/woff", extension: "woff" },
    Signature { offset: 0, magic: b"wOF2", mime_type: "font/woff2", extension: "woff2" },
    Signature { offset: 0, magic: b"\x00\x01\x00\x00\x00", mime_type: "font/ttf", extension: "ttf" },
    Signature { offset: 0, magic: b"OTTO", mime_type: "font/otf", extension: "otf" },
    Signature { offset: 0, magic: b"OggS", mime_type: "audio/ogg", extension: "ogg" },
    Signature { offset: 0, magic: b"fLaC", mime_type: "audio/flac", extension: "flac" },
    Signature { offset: 0, magic: b"ID3", mime_type: "audio/mpeg", extension: "mp3" },
    Signature { offset: 0, magic: b"\x1a\x45\xdf\xa3", mime_type: "video/webm", extension: "webm" },
    Signature { offset: 0, magic: b"%PDF-", mime_type: "application/pdf", extension: "pdf" },
];

/// Raster formats a page can reference directly
///
/// Formats such as PNM are left out: their two-byte magic (`P1`..`P7`) is
/// too easily matched by text bodies.
fn web_raster_format(bytes: &[u8]) -> Option<ImageFormat> {
    let format = image::guess_format(bytes).ok()?;
    matches!(
        format,
        ImageFormat::Png
            | ImageFormat::Jpeg
            | ImageFormat::Gif
            | ImageFormat::WebP
            | ImageFormat::Bmp
            | ImageFormat::Ico
            | ImageFormat::Avif
            | ImageFormat::Tiff
    )
    .then_some(format)
}

fn raster_type(format: ImageFormat) -> (&'static str, &'static str) {
    let extension = format.extensions_str().first().copied().unwrap_or("bin");
    (format.to_mime_type(), extension)
}

/// (suffix, mime type, canonical extension)
const SUFFIXES: &[(&str, &str, &str)] = &[
    ("html", "text/html", "html"),
    ("htm", "text/html", "html"),
    ("xhtml", "application/xhtml+xml", "xhtml"),
    ("css", "text/css", "css"),
    ("js", "text/javascript", "js"),
    ("mjs", "text/javascript", "js"),
    ("json", "application/json", "json"),
    ("svg", "image/svg+xml", "svg"),
    ("png", "image/png", "png"),
    ("jpg", "image/jpeg", "jpg"),
    ("jpeg", "image/jpeg", "jpg"),
    ("gif", "image/gif", "gif"),
    ("webp", "image/webp", "webp"),
    ("avif", "image/avif", "avif"),
    ("ico", "image/x-icon", "ico"),
    ("cur", "image/x-icon", "cur"),
    ("bmp", "image/bmp", "bmp"),
    ("woff", "font/woff", "woff"),
    ("woff2", "font/woff2", "woff2"),
    ("ttf", "font/ttf", "ttf"),
    ("otf", "font/otf", "otf"),
    ("eot", "application/vnd.ms-fontobject", "eot"),
    ("mp3", "audio/mpeg", "mp3"),
    ("wav", "audio/wav", "wav"),
    ("ogg", "audio/ogg", "ogg"),
    ("oga", "audio/ogg", "ogg"),
    ("ogv", "video/ogg", "ogv"),
    ("mp4", "video/mp4", "mp4"),
    ("m4a", "audio/mp4", "m4a"),
    ("webm", "video/webm", "webm"),
    ("vtt", "text/vtt", "vtt"),
    ("txt", "text/plain", "txt"),
    ("xml", "application/xml", "xml"),
];

fn matches_signature(bytes: &[u8], signature: &Signature) -> bool {
    bytes
        .get(signature.offset..signature.offset + signature.magic.len())
        .is_some_and(|window| window == signature.magic)
}

/// ISO base media files (`....ftyp<brand>`): MP4, M4A, AVIF, HEIC
fn sniff_iso_media(bytes: &[u8]) -> Option<(&'static str, &'static str)> {
    if bytes.get(4..8)? != b"ftyp" {
        return None;
    }
    let brand = bytes.get(8..12)?;
    Some(match brand {
        b"avif" | b"avis" => ("image/avif", "avif"),
        b"heic" | b"heix" | b"mif1" => ("image/heic", "heic"),
        b"M4A " => ("audio/mp4", "m4a"),
        _ => ("video/mp4", "mp4"),
    })
}

/// Markup sniffing for text bodies: SVG and HTML documents
fn sniff_markup(bytes: &[u8]) -> Option<(&'static str, &'static str)> {
    let head = &bytes[..bytes.len().min(512)];
    let text = String::from_utf8_lossy(head);
    let text = text.trim_start_matches('\u{feff}').trim_start();
    let lower = text.to_ascii_lowercase();

    if lower.starts_with("<svg") || (lower.starts_with("<?xml") && lower.contains("<svg")) {
        return Some(("image/svg+xml", "svg"));
    }
    if lower.starts_with("<!doctype html") || lower.starts_with("<html") {
        return Some(("text/html", "html"));
    }
    None
}

/// MPEG audio frame sync without an ID3 tag
fn sniff_mpeg_frame(bytes: &[u8]) -> Option<(&'static str, &'static str)> {
    match bytes.get(..2)? {
        [0xff, second] if second & 0xe0 == 0xe0 && second & 0x06 != 0 => Some(("audio/mpeg", "mp3")),
        _ => None,
    }
}

/// Derive `(mime_type, extension)` for a body
///
/// `suffix` is the lower-cased extension of the locator the body came from.
#[must_use]
pub fn sniff(bytes: &[u8], suffix: Option<&str>) -> (String, String) {
    if let Some(format) = web_raster_format(bytes) {
        let (mime_type, extension) = raster_type(format);
        return (mime_type.to_string(), extension.to_string());
    }

    if let Some(signature) = SIGNATURES.iter().find(|s| matches_signature(bytes, s)) {
        // OGG containers hold video as often as audio; the suffix settles it
        if signature.extension == "ogg" && suffix == Some("ogv") {
            return ("video/ogg".to_string(), "ogv".to_string());
        }
        return (signature.mime_type.to_string(), signature.extension.to_string());
    }

    if let Some((mime_type, extension)) = sniff_iso_media(bytes)
        .or_else(|| sniff_mpeg_frame(bytes))
        .or_else(|| sniff_markup(bytes))
    {
        return (mime_type.to_string(), extension.to_string());
    }

    if let Some(suffix) = suffix
        && let Some((_, mime_type, extension)) = SUFFIXES.iter().find(|(s, _, _)| *s == suffix)
    {
        return (mime_type.to_string(), extension.to_string());
    }

    let extension = suffix
        .filter(|s| !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or("bin");
    (OCTET_STREAM.to_string(), extension.to_string())
}

/// Pixel dimensions of a raster image body
///
/// Only the header is decoded. `None` for anything that is not a complete
/// web raster header.
#[must_use]
pub fn image_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    let format = web_raster_format(bytes)?;
    let mut reader = ImageReader::new(Cursor::new(bytes));
    reader.set_format(format);
    reader.into_dimensions().ok()
}

/// Smallest valid GIF: one transparent pixel
#[cfg(test)]
pub(crate) const PIXEL_GIF: &[u8] = b"GIF89a\x01\x00\x01\x00\x80\x00\x00\xff\xff\xff\x00\x00\x00!\xf9\x04\x01\x00\x00\x00\x00,\x00\x00\x00\x00\x01\x00\x01\x00\x00\x02\x02D\x01\x00;";

/// A 1x1 black image encoded as `format`
#[cfg(test)]
pub(crate) fn encoded_pixel(format: ImageFormat) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    image::RgbImage::new(1, 1)
        .write_to(&mut out, format)
        .expect("encoder for test pixel");
    out.into_inner()
}
