//! Default limits, synthetic status codes and request headers

/// Default per-request timeout for direct and SOCKS HTTP transports
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default timeout for a headless-browser page load
///
/// Script-heavy pages routinely take longer than a plain HTTP request.
pub const DEFAULT_BROWSER_TIMEOUT_SECS: u64 = 60;

/// Maximum size of a single fetched resource (bytes)
///
/// Anything larger is treated as a failed fetch rather than inlined.
pub const DEFAULT_MAX_RESOURCE_BYTES: usize = 50 * 1024 * 1024;

/// Default SOCKS endpoint of a locally running Tor daemon
///
/// `socks5h` makes the proxy resolve host names so DNS lookups do not leak.
pub const DEFAULT_TOR_SOCKS_PROXY: &str = "socks5h://127.0.0.1:9050";

/// Status code reported for local misses and unsupported protocols
pub const STATUS_NOT_FOUND: u16 = 404;

/// Status code reported when a transport gives up waiting
pub const STATUS_TIMEOUT: u16 = 408;

/// Status code reported when a body exceeds `max_resource_bytes`
pub const STATUS_TOO_LARGE: u16 = 413;

/// Status code reported when no response was received at all
pub const STATUS_NO_RESPONSE: u16 = 0;

/// User agent sent by the HTTP transports and the headless browser
pub const CHROME_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.6834.160 Safari/537.36";

/// Accept header sent with anonymized requests when the caller supplies none
pub const DEFAULT_ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";

/// Accept-Language header sent with anonymized requests when the caller supplies none
pub const DEFAULT_ACCEPT_LANGUAGE: &str = "en-US,en;q=0.5";
