//! Local filesystem transport

use std::borrow::Cow;
use std::io::ErrorKind;

use super::TransportResponse;
use crate::utils::constants::{STATUS_NOT_FOUND, STATUS_TOO_LARGE};

/// Synthetic status for a successful local read
const STATUS_OK: u16 = 200;

enum ReadOutcome {
    Read(Vec<u8>),
    TooLarge,
    Missing,
}

async fn read_limited(path: &str, max_bytes: usize) -> ReadOutcome {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => {
            if meta.len() > max_bytes as u64 {
                return ReadOutcome::TooLarge;
            }
        }
        Ok(_) => return ReadOutcome::Missing,
        Err(e) => {
            if e.kind() != ErrorKind::NotFound {
                log::debug!("Cannot stat {path}: {e}");
            }
            return ReadOutcome::Missing;
        }
    }

    match tokio::fs::read(path).await {
        Ok(bytes) => ReadOutcome::Read(bytes),
        Err(e) => {
            log::debug!("Cannot read {path}: {e}");
            ReadOutcome::Missing
        }
    }
}

/// Read a local file
///
/// A path that does not exist as written is retried once percent-decoded,
/// so `my%20page.css` finds `my page.css`.
pub(crate) async fn fetch(path: &str, max_bytes: usize) -> TransportResponse {
    match read_limited(path, max_bytes).await {
        ReadOutcome::Read(bytes) => return TransportResponse::success(bytes, STATUS_OK),
        ReadOutcome::TooLarge => return TransportResponse::failure(STATUS_TOO_LARGE),
        ReadOutcome::Missing => {}
    }

    let decoded = urlencoding::decode(path).unwrap_or(Cow::Borrowed(path));
    if decoded != path {
        match read_limited(&decoded, max_bytes).await {
            ReadOutcome::Read(bytes) => return TransportResponse::success(bytes, STATUS_OK),
            ReadOutcome::TooLarge => return TransportResponse::failure(STATUS_TOO_LARGE),
            ReadOutcome::Missing => {}
        }
    }

    TransportResponse::failure(STATUS_NOT_FOUND)
}
