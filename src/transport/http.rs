//! Direct and SOCKS-proxied HTTP transport

use anyhow::{Context, Result};
use futures::StreamExt;
use reqwest::Client;
use std::collections::BTreeMap;
use std::time::Duration;

use super::TransportResponse;
use crate::utils::constants::{
    CHROME_USER_AGENT, DEFAULT_ACCEPT, DEFAULT_ACCEPT_LANGUAGE, STATUS_NO_RESPONSE,
    STATUS_TIMEOUT, STATUS_TOO_LARGE,
};

/// Build an HTTP client, optionally routed through a SOCKS proxy
///
/// Compressed bodies (gzip, deflate, brotli) are decoded by the client.
pub(crate) fn build_client(proxy: Option<&str>, timeout_secs: u64) -> Result<Client> {
    let mut builder = Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(CHROME_USER_AGENT)
        .gzip(true)
        .brotli(true)
        .deflate(true);

    if let Some(proxy) = proxy {
        let proxy = reqwest::Proxy::all(proxy)
            .with_context(|| format!("Invalid SOCKS proxy '{proxy}'"))?;
        builder = builder.proxy(proxy);
    }

    builder.build().context("Failed to build HTTP client")
}

/// Headers for requests routed through Tor
///
/// Caller-supplied headers win. Without any, a fixed browser-like set is
/// sent so requests do not carry a distinctive client fingerprint.
pub(crate) fn anonymized_headers(headers: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    if !headers.is_empty() {
        return headers.clone();
    }
    BTreeMap::from([
        ("User-Agent".to_string(), CHROME_USER_AGENT.to_string()),
        ("Accept".to_string(), DEFAULT_ACCEPT.to_string()),
        ("Accept-Language".to_string(), DEFAULT_ACCEPT_LANGUAGE.to_string()),
    ])
}

fn error_status(err: &reqwest::Error) -> u16 {
    if err.is_timeout() {
        STATUS_TIMEOUT
    } else {
        STATUS_NO_RESPONSE
    }
}

/// GET `url` and collect the body, capped at `max_bytes`
///
/// Non-2xx responses fail with their own status. Bodies over the cap
/// fail with 413, timeouts with 408 and connection errors with 0.
pub(crate) async fn fetch(
    client: &Client,
    url: &str,
    headers: &BTreeMap<String, String>,
    max_bytes: usize,
) -> TransportResponse {
    let mut request = client.get(url);
    for (name, value) in headers {
        request = request.header(name.as_str(), value.as_str());
    }

    let response = match request.send().await {
        Ok(response) => response,
        Err(e) => {
            log::debug!("Request to {url} failed: {e}");
            return TransportResponse::failure(error_status(&e));
        }
    };

    let status = response.status();
    if !status.is_success() {
        log::debug!("Request to {url} returned {status}");
        return TransportResponse::failure(status.as_u16());
    }

    // Enforce limit BEFORE downloading when the length is known
    let expected_size = response.content_length().unwrap_or(0);
    if expected_size > max_bytes as u64 {
        log::debug!("Body of {url} is {expected_size} bytes, limit is {max_bytes}");
        return TransportResponse::failure(STATUS_TOO_LARGE);
    }

    let mut buffer = Vec::with_capacity(usize::try_from(expected_size).unwrap_or(0));
    let mut stream = response.bytes_stream();

    while let Some(chunk_result) = stream.next().await {
        let chunk = match chunk_result {
            Ok(chunk) => chunk,
            Err(e) => {
                log::debug!("Reading body of {url} failed: {e}");
                return TransportResponse::failure(error_status(&e));
            }
        };

        // Check BEFORE accumulating
        if buffer.len() + chunk.len() > max_bytes {
            log::debug!("Body of {url} exceeded {max_bytes} bytes while streaming");
            return TransportResponse::failure(STATUS_TOO_LARGE);
        }
        buffer.extend_from_slice(&chunk);
    }

    TransportResponse::success(buffer, status.as_u16())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_success_body_is_collected() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/style.css")
            .with_status(200)
            .with_header("content-type", "text/css")
            .with_body("body { margin: 0 }")
            .expect(1)
            .create_async()
            .await;

        let client = build_client(None, 5).unwrap();
        let url = format!("{}/style.css", server.url());
        let response = fetch(&client, &url, &BTreeMap::new(), 1024).await;

        mock.assert_async().await;
        assert!(response.success);
        assert_eq!(response.status_code, 200);
        assert_eq!(response.bytes.as_deref(), Some(&b"body { margin: 0 }"[..]));
    }

    #[tokio::test]
    async fn test_error_status_is_reported() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/gone.png")
            .with_status(410)
            .create_async()
            .await;

        let client = build_client(None, 5).unwrap();
        let url = format!("{}/gone.png", server.url());
        let response = fetch(&client, &url, &BTreeMap::new(), 1024).await;

        assert_eq!(response, TransportResponse::failure(410));
    }

    #[tokio::test]
    async fn test_oversized_body_fails_with_413() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/big.bin")
            .with_status(200)
            .with_body(vec![0u8; 4096])
            .create_async()
            .await;

        let client = build_client(None, 5).unwrap();
        let url = format!("{}/big.bin", server.url());
        let response = fetch(&client, &url, &BTreeMap::new(), 1024).await;

        assert_eq!(response, TransportResponse::failure(STATUS_TOO_LARGE));
    }

    #[tokio::test]
    async fn test_custom_headers_are_sent() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/page.html")
            .match_header("x-bundle", "yes")
            .with_status(200)
            .with_body("<html></html>")
            .create_async()
            .await;

        let client = build_client(None, 5).unwrap();
        let headers = BTreeMap::from([("X-Bundle".to_string(), "yes".to_string())]);
        let url = format!("{}/page.html", server.url());
        let response = fetch(&client, &url, &headers, 1024).await;

        mock.assert_async().await;
        assert!(response.success);
    }

    #[test]
    fn test_anonymized_headers_default_set() {
        let headers = anonymized_headers(&BTreeMap::new());
        assert_eq!(headers.get("User-Agent").map(String::as_str), Some(CHROME_USER_AGENT));

        let custom = BTreeMap::from([("Accept".to_string(), "*/*".to_string())]);
        assert_eq!(anonymized_headers(&custom), custom);
    }

    #[test]
    fn test_invalid_proxy_is_rejected() {
        assert!(build_client(Some("not a proxy url"), 5).is_err());
    }
}
