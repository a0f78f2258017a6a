use log::debug;
use serde_json::Value;
use url::Url;

use crate::model::config::{MetadataConfig, StreamConfig};
use crate::utils::network::request;

#[derive(Debug, Clone, serde::Serialize)]
pub struct MetadataRecord {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub synopsis: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cast: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub crew: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<String>,
}

fn field(payload: &Value, key: &str) -> Option<String> {
    payload.get(key)
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty() && *value != "N/A")
        .map(ToString::to_string)
}

fn split_name_list(payload: &Value, key: &str) -> Vec<String> {
    payload.get(key)
        .and_then(Value::as_str)
        .map(|raw| raw.split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty() && *name != "N/A")
            .map(ToString::to_string)
            .collect())
        .unwrap_or_default()
}

pub fn parse_metadata(payload: &Value, fallback_title: &str) -> Option<MetadataRecord> {
    if payload.get("Response").and_then(Value::as_str) == Some("False") {
        return None;
    }
    let mut crew = split_name_list(payload, "Director");
    crew.extend(split_name_list(payload, "Writer"));
    let record = MetadataRecord {
        title: field(payload, "Title").unwrap_or_else(|| fallback_title.to_string()),
        synopsis: field(payload, "Plot"),
        cast: split_name_list(payload, "Actors"),
        crew,
        rating: field(payload, "Rated"),
    };
    if record.synopsis.is_none() && record.cast.is_empty() && record.crew.is_empty() && record.rating.is_none() {
        return None;
    }
    Some(record)
}

/// Title enrichment is strictly best effort: every failure collapses to
/// `None` and never reaches the caller.
pub async fn lookup_title(client: &reqwest::Client, stream_cfg: &StreamConfig, cfg: &MetadataConfig, title: &str) -> Option<MetadataRecord> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return None;
    }
    let mut url = Url::parse(&cfg.url).ok()?;
    url.query_pairs_mut().append_pair("t", trimmed);
    let headers = request::stream_request_headers(stream_cfg, &url);
    match request::download_json_content(client, headers, &url).await {
        Ok(payload) => parse_metadata(&payload, trimmed),
        Err(err) => {
            debug!("metadata lookup failed for {trimmed}: {err}");
            None
        }
    }
}
