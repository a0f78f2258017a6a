use log::debug;
use serde::Serialize;
use url::Url;

use crate::model::config::StreamConfig;
use crate::utils::constants::CONSTANTS;
use crate::utils::network::request;
use crate::utils::network::request::sanitize_sensitive_info;

#[derive(Debug, Clone, Serialize)]
pub struct ManifestExtraction {
    #[serde(rename = "manifestUrl")]
    pub manifest_url: Option<String>,
    #[serde(rename = "isLive")]
    pub is_live: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ManifestExtraction {
    fn failed(message: String) -> Self {
        Self { manifest_url: None, is_live: false, error: Some(message) }
    }
}

/// Scans a watch page for an hls manifest reference. Page markup changes
/// without notice, so a miss is an expected outcome, not an error path.
pub fn parse_manifest_from_page(page: &str) -> ManifestExtraction {
    let manifest_url = CONSTANTS.re_hls_manifest.captures(page)
        .map(|caps| caps[1].replace("\\/", "/"));
    let is_live = page.contains(r#""isLive":true"#)
        || page.contains(r#""isLiveContent":true"#)
        || page.contains(r#""isLiveNow":true"#);
    match manifest_url {
        Some(url) => ManifestExtraction { manifest_url: Some(url), is_live, error: None },
        None => ManifestExtraction { manifest_url: None, is_live, error: Some(String::from("no manifest reference found")) },
    }
}

pub async fn extract_manifest(client: &reqwest::Client, stream_cfg: &StreamConfig, page_url: &str) -> ManifestExtraction {
    let Ok(url) = Url::parse(page_url) else {
        return ManifestExtraction::failed(format!("invalid page url {}", sanitize_sensitive_info(page_url)));
    };
    let headers = request::stream_request_headers(stream_cfg, &url);
    match request::download_text_content(client, headers, &url).await {
        Ok(page) => parse_manifest_from_page(&page),
        Err(err) => {
            debug!("manifest extraction failed for {}: {err}", sanitize_sensitive_info(page_url));
            ManifestExtraction::failed(err.to_string())
        }
    }
}
