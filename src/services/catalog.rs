use std::collections::HashMap;

use futures::join;
use log::warn;
use serde_json::{json, Value};
use url::Url;

use crate::model::config::{CatalogConfig, StreamConfig};
use crate::tv_proxy_error::{TvProxyError, TvProxyErrorKind};
use crate::utils::network::request;

async fn fetch_feed(client: &reqwest::Client, stream_cfg: &StreamConfig, url_str: &str) -> Result<Value, TvProxyError> {
    let url = Url::parse(url_str).map_err(|err| TvProxyError::new(TvProxyErrorKind::Internal,
        format!("invalid catalog feed url {url_str}: {err}")))?;
    let headers = request::stream_request_headers(stream_cfg, &url);
    request::download_json_content(client, headers, &url).await
}

fn mandatory_feed(result: Result<Value, TvProxyError>, feed: &str) -> Result<Vec<Value>, TvProxyError> {
    match result {
        Ok(Value::Array(list)) => Ok(list),
        Ok(_) => Err(TvProxyError::new(TvProxyErrorKind::Internal, format!("catalog feed {feed} returned an unexpected shape"))),
        Err(err) => Err(err),
    }
}

fn optional_feed(result: Result<Value, TvProxyError>, feed: &str) -> Vec<Value> {
    match result {
        Ok(Value::Array(list)) => list,
        Ok(_) => {
            warn!("catalog feed {feed} returned an unexpected shape, continuing without it");
            Vec::new()
        }
        Err(err) => {
            warn!("catalog feed {feed} failed: {err}, continuing without it");
            Vec::new()
        }
    }
}

/// Joins the channel and stream feeds into playable entries, decorated with
/// category names and country records when those feeds are available.
/// Channels without a stream are not playable and are left out.
pub fn merge_catalog(channels: Vec<Value>, streams: &[Value], categories: &[Value], countries: &[Value]) -> Vec<Value> {
    let streams_by_channel: HashMap<&str, &Value> = streams.iter()
        .filter_map(|stream| stream.get("channel").and_then(Value::as_str).map(|id| (id, stream)))
        .collect();
    let category_names: HashMap<&str, &str> = categories.iter()
        .filter_map(|category| Some((category.get("id")?.as_str()?, category.get("name")?.as_str()?)))
        .collect();
    let countries_by_code: HashMap<&str, &Value> = countries.iter()
        .filter_map(|country| country.get("code").and_then(Value::as_str).map(|code| (code, country)))
        .collect();

    channels.into_iter().filter_map(|channel| {
        let id = channel.get("id").and_then(Value::as_str)?;
        let stream = streams_by_channel.get(id)?;
        let url = stream.get("url").and_then(Value::as_str)?;
        let name = channel.get("name").and_then(Value::as_str).unwrap_or(id);
        let category_list: Vec<String> = channel.get("categories").and_then(Value::as_array)
            .map(|list| list.iter()
                .filter_map(Value::as_str)
                .map(|category_id| category_names.get(category_id).copied().unwrap_or(category_id).to_string())
                .collect())
            .unwrap_or_default();
        let country = channel.get("country").and_then(Value::as_str)
            .map(|code| countries_by_code.get(code).map_or_else(|| json!({"code": code}), |v| (*v).clone()));
        Some(json!({
            "id": id,
            "name": name,
            "url": url,
            "logo": channel.get("logo").cloned().unwrap_or(Value::Null),
            "categories": category_list,
            "country": country.unwrap_or(Value::Null),
        }))
    }).collect()
}

/// Gathers the metadata feeds concurrently. Channel and stream lists are
/// mandatory, category and country lists degrade to empty on failure.
pub async fn load_catalog(client: &reqwest::Client, stream_cfg: &StreamConfig, cfg: &CatalogConfig) -> Result<Vec<Value>, TvProxyError> {
    let (channels_res, streams_res, categories_res, countries_res) = join!(
        fetch_feed(client, stream_cfg, &cfg.channels_url),
        fetch_feed(client, stream_cfg, &cfg.streams_url),
        fetch_feed(client, stream_cfg, &cfg.categories_url),
        fetch_feed(client, stream_cfg, &cfg.countries_url),
    );
    let channels = mandatory_feed(channels_res, "channels")?;
    let streams = mandatory_feed(streams_res, "streams")?;
    let categories = optional_feed(categories_res, "categories");
    let countries = optional_feed(countries_res, "countries");
    Ok(merge_catalog(channels, &streams, &categories, &countries))
}
