use chrono::{DateTime, SecondsFormat, Utc};
use log::{debug, warn};
use serde_json::Value;
use url::Url;

use crate::model::config::{EndpointKind, LineupConfig, LineupEndpoint, StreamConfig};
use crate::provider::session::StreamSession;
use crate::tv_proxy_error::create_tv_proxy_error_result;
use crate::tv_proxy_error::{TvProxyError, TvProxyErrorKind};
use crate::utils::constants::STITCHED_HLS_TYPE;
use crate::utils::network::request;

/// Query keys the proxy owns on a freshened stream url. Explicit values win
/// over whatever stale value the provider left behind.
const SESSION_QUERY_KEYS: &[&str] = &["deviceId", "sid", "deviceType", "deviceMake", "deviceModel",
    "appName", "appVersion", "serverSideAds", "start", "clientTime"];

#[derive(Debug)]
pub struct ChannelLineup {
    pub endpoint_name: String,
    pub channels: Vec<Value>,
}

fn format_instant(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_instant(value: &Value) -> Option<DateTime<Utc>> {
    value.as_str()
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|parsed| parsed.with_timezone(&Utc))
}

fn build_endpoint_url(endpoint: &LineupEndpoint, cfg: &LineupConfig, session: &StreamSession) -> Result<Url, TvProxyError> {
    let mut url = Url::parse(&endpoint.url).map_err(|err| TvProxyError::new(TvProxyErrorKind::Internal,
        format!("invalid url for endpoint {}: {err}", endpoint.name)))?;
    match endpoint.kind {
        EndpointKind::Structured => {
            url.query_pairs_mut()
                .append_pair("start", &format_instant(session.window.start))
                .append_pair("stop", &format_instant(session.window.stop));
        }
        EndpointKind::Simple => {}
        EndpointKind::Bootstrap => {
            url.query_pairs_mut()
                .append_pair("appName", &cfg.app_name)
                .append_pair("appVersion", &cfg.app_version)
                .append_pair("deviceType", &cfg.device_type)
                .append_pair("deviceMake", &cfg.device_make)
                .append_pair("deviceModel", &cfg.device_model)
                .append_pair("deviceId", &session.device_id)
                .append_pair("sid", &session.sid)
                .append_pair("clientTime", &format_instant(session.generated_at));
        }
    }
    Ok(url)
}

fn channels_from_payload(payload: Value) -> Vec<Value> {
    match payload {
        Value::Array(list) => list,
        // the bootstrap surface nests the lineup in an envelope
        Value::Object(mut map) => match map.remove("channels") {
            Some(Value::Array(list)) => list,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

async fn fetch_endpoint(client: &reqwest::Client, stream_cfg: &StreamConfig, cfg: &LineupConfig,
                        endpoint: &LineupEndpoint, session: &StreamSession) -> Result<Vec<Value>, TvProxyError> {
    let url = build_endpoint_url(endpoint, cfg, session)?;
    let mut headers = request::stream_request_headers(stream_cfg, &url);
    request::merge_request_headers(&mut headers, &endpoint.headers);
    let payload = request::download_json_content(client, headers, &url).await?;
    Ok(channels_from_payload(payload))
}

/// Walks the configured endpoints in priority order, sequentially. Every
/// candidate gets exactly one attempt per incoming request; the first usable
/// payload short-circuits the chain.
pub async fn fetch_channel_lineup(client: &reqwest::Client, stream_cfg: &StreamConfig, cfg: &LineupConfig,
                                  session: &StreamSession) -> Result<ChannelLineup, TvProxyError> {
    for endpoint in &cfg.endpoints {
        match fetch_endpoint(client, stream_cfg, cfg, endpoint, session).await {
            Ok(channels) if !channels.is_empty() => {
                debug!("channel lineup served by endpoint {}", endpoint.name);
                return Ok(ChannelLineup { endpoint_name: endpoint.name.clone(), channels });
            }
            Ok(_) => warn!("channel endpoint {} returned no channels, trying next", endpoint.name),
            Err(err) => warn!("channel endpoint {} failed: {err}, trying next", endpoint.name),
        }
    }
    create_tv_proxy_error_result!(TvProxyErrorKind::ProviderExhausted, "all {} channel endpoints failed", cfg.endpoints.len())
}

/// Picks the stitched stream reference carrying the expected manifest type.
pub fn select_stream_url(channel: &Value) -> Option<String> {
    let stitched = channel.get("stitched")?;
    if let Some(urls) = stitched.get("urls").and_then(Value::as_array) {
        return urls.iter()
            .find(|entry| entry.get("type").and_then(Value::as_str) == Some(STITCHED_HLS_TYPE))
            .and_then(|entry| entry.get("url").and_then(Value::as_str))
            .filter(|candidate| !candidate.is_empty())
            .map(ToString::to_string);
    }
    // some lineup payloads flatten the reference to a single field
    stitched.get("url").and_then(Value::as_str).filter(|candidate| !candidate.is_empty()).map(ToString::to_string)
}

/// Rebuilds the query string of a stitched url around the current session.
/// Foreign query keys pass through untouched.
pub fn freshen_stream_url(raw: &str, cfg: &LineupConfig, session: &StreamSession) -> Option<String> {
    let url = Url::parse(raw).ok()?;
    let kept: Vec<(String, String)> = url.query_pairs()
        .filter(|(key, _)| !SESSION_QUERY_KEYS.contains(&key.as_ref()))
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    let mut fresh = url;
    fresh.set_query(None);
    {
        let mut pairs = fresh.query_pairs_mut();
        for (key, value) in &kept {
            pairs.append_pair(key, value);
        }
        pairs.append_pair("deviceId", &session.device_id);
        pairs.append_pair("sid", &session.sid);
        pairs.append_pair("deviceType", &cfg.device_type);
        pairs.append_pair("deviceMake", &cfg.device_make);
        pairs.append_pair("deviceModel", &cfg.device_model);
        pairs.append_pair("appName", &cfg.app_name);
        pairs.append_pair("appVersion", &cfg.app_version);
        pairs.append_pair("serverSideAds", if cfg.server_side_ads { "true" } else { "false" });
        pairs.append_pair("start", &format_instant(session.window.start));
        pairs.append_pair("clientTime", &format_instant(session.generated_at));
    }
    Some(fresh.to_string())
}

/// Scans the record's schedule for the entry whose window contains `now`.
pub fn current_program(channel: &Value, now: DateTime<Utc>) -> Option<Value> {
    let timelines = channel.get("timelines").and_then(Value::as_array)?;
    timelines.iter().find(|entry| {
        let start = entry.get("start").map(parse_instant).unwrap_or(None);
        let stop = entry.get("stop").map(parse_instant).unwrap_or(None);
        matches!((start, stop), (Some(start), Some(stop)) if start <= now && now < stop)
    }).cloned()
}

/// Freshens every channel record in place. Records without a usable stream
/// reference are dropped instead of being emitted with a null field.
pub fn rewrite_channel_records(channels: Vec<Value>, cfg: &LineupConfig, session: &StreamSession,
                               now: DateTime<Utc>) -> Vec<Value> {
    channels.into_iter().filter_map(|mut channel| {
        let stream_url = select_stream_url(&channel)?;
        let fresh = freshen_stream_url(&stream_url, cfg, session)?;
        let program = current_program(&channel, now).unwrap_or(Value::Null);
        let record = channel.as_object_mut()?;
        record.insert(String::from("streamUrl"), Value::String(fresh));
        record.insert(String::from("currentProgram"), program);
        Some(channel)
    }).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::config::Config;
    use crate::provider::session::ScheduleWindow;
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn test_session() -> StreamSession {
        let start = Utc.with_ymd_and_hms(2026, 8, 6, 10, 0, 0).unwrap();
        StreamSession {
            device_id: String::from("0198d2f4a10000aa00bb00cc"),
            sid: String::from("11112222333344445555666677778888"),
            generated_at: start + Duration::minutes(17),
            window: ScheduleWindow { start, stop: start + Duration::hours(6) },
        }
    }

    fn lineup_config() -> LineupConfig {
        Config::default().lineup
    }

    #[test]
    fn freshen_overrides_stale_session_keys_and_keeps_foreign_ones() {
        let cfg = lineup_config();
        let session = test_session();
        let raw = "https://stitcher.example.com/live/ch1/master.m3u8?deviceId=stale&sid=stale&serverSideAds=true&terminate=false";
        let fresh = freshen_stream_url(raw, &cfg, &session).unwrap();
        let url = Url::parse(&fresh).unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().map(|(k, v)| (k.into_owned(), v.into_owned())).collect();
        let value_of = |key: &str| pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone());
        assert_eq!(value_of("deviceId").as_deref(), Some("0198d2f4a10000aa00bb00cc"));
        assert_eq!(value_of("sid").as_deref(), Some("11112222333344445555666677778888"));
        assert_eq!(value_of("serverSideAds").as_deref(), Some("false"));
        assert_eq!(value_of("terminate").as_deref(), Some("false"));
        assert_eq!(pairs.iter().filter(|(k, _)| k == "deviceId").count(), 1);
    }

    #[test]
    fn ad_serving_flag_follows_policy() {
        let mut cfg = lineup_config();
        cfg.server_side_ads = true;
        let fresh = freshen_stream_url("https://stitcher.example.com/live/ch1.m3u8", &cfg, &test_session()).unwrap();
        assert!(fresh.contains("serverSideAds=true"));
    }

    #[test]
    fn stream_selection_requires_expected_manifest_type() {
        let with_hls = json!({"stitched": {"urls": [{"type": "dash", "url": "https://x/d.mpd"}, {"type": "hls", "url": "https://x/h.m3u8"}]}});
        assert_eq!(select_stream_url(&with_hls).as_deref(), Some("https://x/h.m3u8"));
        let dash_only = json!({"stitched": {"urls": [{"type": "dash", "url": "https://x/d.mpd"}]}});
        assert!(select_stream_url(&dash_only).is_none());
        assert!(select_stream_url(&json!({"name": "no streams"})).is_none());
    }

    #[test]
    fn current_program_matches_containing_window() {
        let channel = json!({"timelines": [
            {"title": "Earlier", "start": "2026-08-06T08:00:00Z", "stop": "2026-08-06T10:00:00Z"},
            {"title": "Now", "start": "2026-08-06T10:00:00Z", "stop": "2026-08-06T11:00:00Z"},
        ]});
        let now = Utc.with_ymd_and_hms(2026, 8, 6, 10, 30, 0).unwrap();
        let program = current_program(&channel, now).unwrap();
        assert_eq!(program.get("title").and_then(Value::as_str), Some("Now"));
        let later = Utc.with_ymd_and_hms(2026, 8, 6, 12, 0, 0).unwrap();
        assert!(current_program(&channel, later).is_none());
    }

    #[test]
    fn records_without_stream_reference_are_dropped() {
        let cfg = lineup_config();
        let session = test_session();
        let channels = vec![
            json!({"name": "usable", "stitched": {"urls": [{"type": "hls", "url": "https://x/h.m3u8?sid=stale"}]}}),
            json!({"name": "no stream"}),
        ];
        let rewritten = rewrite_channel_records(channels, &cfg, &session, session.generated_at);
        assert_eq!(rewritten.len(), 1);
        let record = &rewritten[0];
        assert_eq!(record.get("name").and_then(Value::as_str), Some("usable"));
        assert!(record.get("streamUrl").and_then(Value::as_str).unwrap().contains(&session.sid));
        assert!(record.get("currentProgram").unwrap().is_null());
    }

    async fn spawn_test_server(router: axum::Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn chain_endpoint(name: &str, base: &str, path: &str) -> LineupEndpoint {
        LineupEndpoint {
            name: String::from(name),
            kind: EndpointKind::Simple,
            url: format!("{base}{path}"),
            headers: std::collections::HashMap::new(),
        }
    }

    #[tokio::test]
    async fn fallback_chain_serves_first_usable_endpoint() {
        let router = axum::Router::new()
            .route("/e1", axum::routing::get(|| async {
                axum::http::StatusCode::INTERNAL_SERVER_ERROR
            }))
            .route("/e2", axum::routing::get(|| async {
                axum::http::StatusCode::NOT_FOUND
            }))
            .route("/e3", axum::routing::get(|| async {
                axum::Json(json!([{"name": "ch1", "stitched": {"urls": [{"type": "hls", "url": "https://x/h.m3u8"}]}}]))
            }));
        let base = spawn_test_server(router).await;
        let mut cfg = lineup_config();
        cfg.endpoints = vec![
            chain_endpoint("e1", &base, "/e1"),
            chain_endpoint("e2", &base, "/e2"),
            chain_endpoint("e3", &base, "/e3"),
        ];
        let lineup = fetch_channel_lineup(&reqwest::Client::new(), &StreamConfig::default(), &cfg, &test_session())
            .await
            .unwrap();
        assert_eq!(lineup.endpoint_name, "e3");
        assert_eq!(lineup.channels.len(), 1);
    }

    #[tokio::test]
    async fn exhausted_chain_yields_provider_error() {
        let router = axum::Router::new()
            .route("/bad", axum::routing::get(|| async {
                axum::http::StatusCode::BAD_GATEWAY
            }));
        let base = spawn_test_server(router).await;
        let mut cfg = lineup_config();
        cfg.endpoints = vec![chain_endpoint("only", &base, "/bad")];
        let err = fetch_channel_lineup(&reqwest::Client::new(), &StreamConfig::default(), &cfg, &test_session())
            .await
            .unwrap_err();
        assert_eq!(err.kind, TvProxyErrorKind::ProviderExhausted);
    }
}
