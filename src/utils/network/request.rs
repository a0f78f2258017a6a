use std::collections::{HashMap, HashSet};
use std::io::Read;
use std::sync::atomic::Ordering;
use std::time::Duration;

use bytes::Bytes;
use flate2::read::{GzDecoder, ZlibDecoder};
use log::{log_enabled, trace, Level};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE, ORIGIN, REFERER, USER_AGENT};
use url::Url;

use crate::model::config::StreamConfig;
use crate::tv_proxy_error::{TvProxyError, TvProxyErrorKind};
use crate::utils::constants::CONSTANTS;
use crate::utils::constants::{STREAM_ACCEPT, STREAM_USER_AGENT};

fn is_gzip(bytes: &[u8]) -> bool {
    // Gzip files start with the bytes 0x1F 0x8B
    bytes.len() >= 2 && bytes[0] == 0x1F && bytes[1] == 0x8B
}

fn is_deflate(bytes: &[u8]) -> bool {
    // Zlib streams start with 0x78 followed by a flag byte
    bytes.len() >= 2 && bytes[0] == 0x78 && matches!(bytes[1], 0x01 | 0x5E | 0x9C | 0xDA)
}

/// Masks short-lived session identifiers in urls before they hit the log.
pub fn sanitize_sensitive_info(value: &str) -> String {
    if !CONSTANTS.sanitize.load(Ordering::Relaxed) {
        return value.to_string();
    }
    let result = CONSTANTS.re_device_id.replace_all(value, "$1***");
    let result = CONSTANTS.re_sid.replace_all(&result, "$1***");
    let result = CONSTANTS.re_token.replace_all(&result, "$1***");
    result.to_string()
}

pub struct UpstreamResponse {
    pub status: reqwest::StatusCode,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl UpstreamResponse {
    /// Decodes the body to text, sniffing for gzip/deflate payloads that some
    /// upstreams deliver without a matching `Content-Encoding` header.
    pub fn text(&self) -> Option<String> {
        let bytes = &self.body[..];
        if is_gzip(bytes) {
            let mut decoder = GzDecoder::new(bytes);
            let mut buffer = String::new();
            return decoder.read_to_string(&mut buffer).ok().map(|_| buffer);
        }
        if is_deflate(bytes) {
            let mut decoder = ZlibDecoder::new(bytes);
            let mut buffer = String::new();
            return decoder.read_to_string(&mut buffer).ok().map(|_| buffer);
        }
        String::from_utf8(bytes.to_vec()).ok()
    }
}

pub fn create_http_client(cfg: &StreamConfig) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(cfg.upstream_timeout_secs))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// Browser-equivalent request headers, plus `Origin`/`Referer` for hosts whose
/// access control expects them.
pub fn stream_request_headers(cfg: &StreamConfig, url: &Url) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_str(&cfg.user_agent)
        .unwrap_or_else(|_| HeaderValue::from_static(STREAM_USER_AGENT)));
    headers.insert(ACCEPT, HeaderValue::from_static(STREAM_ACCEPT));
    if let Some(host) = url.host_str() {
        for rule in &cfg.request_headers {
            if !host.ends_with(rule.host_suffix.as_str()) {
                continue;
            }
            if let Some(origin) = rule.origin.as_ref().and_then(|v| HeaderValue::from_str(v).ok()) {
                headers.insert(ORIGIN, origin);
            }
            if let Some(referer) = rule.referer.as_ref().and_then(|v| HeaderValue::from_str(v).ok()) {
                headers.insert(REFERER, referer);
            }
        }
    }
    if log_enabled!(Level::Trace) {
        let he: HashMap<String, String> = headers.iter().map(|(k, v)| (k.to_string(), String::from_utf8_lossy(v.as_bytes()).to_string())).collect();
        trace!("Request headers {he:?}");
    }
    headers
}

/// Merges endpoint-specific headers into an already prepared header map.
/// `host` and keys that are already set are ignored.
pub fn merge_request_headers(headers: &mut HeaderMap, extra: &HashMap<String, String>) {
    let header_keys: HashSet<String> = headers.keys().map(|k| k.as_str().to_lowercase()).collect();
    for (key, value) in extra {
        let key_lc = key.to_lowercase();
        if "host" == key_lc || header_keys.contains(key_lc.as_str()) {
            continue;
        }
        if let (Ok(name), Ok(value)) = (HeaderName::from_bytes(key.as_bytes()), HeaderValue::from_bytes(value.as_bytes())) {
            headers.insert(name, value);
        }
    }
}

/// One GET against the target. Non-2xx is surfaced with the upstream status,
/// transport failures map to a network error. No retries at this layer.
pub async fn download_upstream(client: &reqwest::Client, headers: HeaderMap, url: &Url) -> Result<UpstreamResponse, TvProxyError> {
    let request = client.get(url.clone()).headers(headers);
    match request.send().await {
        Ok(response) => {
            let status = response.status();
            if !status.is_success() {
                return Err(TvProxyError::upstream_http(status.as_u16(),
                    format!("upstream request failed with status {} for {}", status.as_u16(), sanitize_sensitive_info(url.as_str()))));
            }
            let content_type = response.headers().get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(ToString::to_string);
            match response.bytes().await {
                Ok(body) => Ok(UpstreamResponse { status, content_type, body }),
                Err(err) => Err(TvProxyError::new(TvProxyErrorKind::UpstreamNetwork,
                    format!("failed to read upstream body {} {err}", sanitize_sensitive_info(url.as_str())))),
            }
        }
        Err(err) => Err(TvProxyError::new(TvProxyErrorKind::UpstreamNetwork,
            format!("upstream request failed {} {err}", sanitize_sensitive_info(url.as_str())))),
    }
}

/// Like [`download_upstream`] but hands back the response for chunked relaying
/// instead of buffering the body.
pub async fn open_upstream_stream(client: &reqwest::Client, headers: HeaderMap, url: &Url) -> Result<reqwest::Response, TvProxyError> {
    let request = client.get(url.clone()).headers(headers);
    match request.send().await {
        Ok(response) => {
            let status = response.status();
            if !status.is_success() {
                return Err(TvProxyError::upstream_http(status.as_u16(),
                    format!("upstream request failed with status {} for {}", status.as_u16(), sanitize_sensitive_info(url.as_str()))));
            }
            Ok(response)
        }
        Err(err) => Err(TvProxyError::new(TvProxyErrorKind::UpstreamNetwork,
            format!("upstream request failed {} {err}", sanitize_sensitive_info(url.as_str())))),
    }
}

pub async fn download_text_content(client: &reqwest::Client, headers: HeaderMap, url: &Url) -> Result<String, TvProxyError> {
    let response = download_upstream(client, headers, url).await?;
    response.text().ok_or_else(|| TvProxyError::new(TvProxyErrorKind::Internal,
        format!("upstream body is not text {}", sanitize_sensitive_info(url.as_str()))))
}

pub async fn download_json_content(client: &reqwest::Client, headers: HeaderMap, url: &Url) -> Result<serde_json::Value, TvProxyError> {
    let content = download_text_content(client, headers, url).await?;
    serde_json::from_str(&content).map_err(|err| TvProxyError::new(TvProxyErrorKind::Internal,
        format!("failed to parse json from {} {err}", sanitize_sensitive_info(url.as_str()))))
}
