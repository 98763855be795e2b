//! `data:` URI decoding

use anyhow::{Context, Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};

use super::TransportResponse;
use crate::utils::constants::STATUS_NOT_FOUND;

/// Synthetic status for a decoded data URI
const STATUS_OK: u16 = 200;

/// Split a `data:` URI into its media type and decoded payload
///
/// The media type defaults to `text/plain;charset=US-ASCII` when absent.
pub fn parse_data_url(locator: &str) -> Result<(String, Vec<u8>)> {
    let rest = locator
        .get(..5)
        .filter(|prefix| prefix.eq_ignore_ascii_case("data:"))
        .map(|_| &locator[5..])
        .ok_or_else(|| anyhow!("not a data URI"))?;

    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| anyhow!("data URI has no payload separator"))?;

    let mut params = meta.split(';').map(str::trim);
    let media_type = params
        .next()
        .filter(|m| !m.is_empty())
        .unwrap_or("text/plain;charset=US-ASCII")
        .to_string();
    let is_base64 = params.any(|p| p.eq_ignore_ascii_case("base64"));

    let bytes = if is_base64 {
        let decoded = urlencoding::decode(payload).context("invalid percent-encoding")?;
        let cleaned: String = decoded.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        STANDARD
            .decode(&cleaned)
            .or_else(|_| STANDARD_NO_PAD.decode(cleaned.trim_end_matches('=')))
            .context("invalid base64 payload")?
    } else {
        urlencoding::decode_binary(payload.as_bytes()).into_owned()
    };

    Ok((media_type, bytes))
}

/// Decode a data URI in memory
pub(crate) fn fetch(locator: &str) -> TransportResponse {
    match parse_data_url(locator) {
        Ok((_, bytes)) => TransportResponse::success(bytes, STATUS_OK),
        Err(e) => {
            log::debug!("Malformed data URI: {e:#}");
            TransportResponse::failure(STATUS_NOT_FOUND)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base64_payload() {
        let (media_type, bytes) = parse_data_url("data:image/gif;base64,R0lGODlh").unwrap();
        assert_eq!(media_type, "image/gif");
        assert_eq!(bytes, b"GIF89a");
    }

    #[test]
    fn test_percent_encoded_payload() {
        let (media_type, bytes) = parse_data_url("data:,a%20b").unwrap();
        assert_eq!(media_type, "text/plain;charset=US-ASCII");
        assert_eq!(bytes, b"a b");
    }

    #[test]
    fn test_missing_separator_fails() {
        assert!(parse_data_url("data:image/png;base64").is_err());
        assert_eq!(fetch("data:image/png;base64").status_code, 404);
    }
}
