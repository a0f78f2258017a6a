use std::collections::{HashMap, HashSet};
use std::fmt::Display;
use std::str::FromStr;

use url::Url;

use crate::tv_proxy_error::create_tv_proxy_error_result;
use crate::tv_proxy_error::{TvProxyError, TvProxyErrorKind};
use crate::utils::constants::STREAM_USER_AGENT;
use crate::utils::default_utils::{default_api_host, default_api_port, default_as_true,
                                  default_playlist_cache_ttl_secs, default_schedule_window_hours,
                                  default_segment_cache_secs, default_upstream_timeout_secs};

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
    #[serde(default = "default_as_true")]
    pub sanitize_sensitive_info: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { sanitize_sensitive_info: true, log_level: None }
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApiConfig {
    #[serde(default = "default_api_host")]
    pub host: String,
    #[serde(default = "default_api_port")]
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self { host: default_api_host(), port: default_api_port() }
    }
}

/// Extra headers some providers require before they hand out segments.
/// Matched by host suffix against the proxied target.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HostHeaderRule {
    pub host_suffix: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referer: Option<String>,
}

fn default_stream_user_agent() -> String {
    String::from(STREAM_USER_AGENT)
}

fn default_request_header_rules() -> Vec<HostHeaderRule> {
    // the stitcher checks origin/referer before handing out segments
    vec![HostHeaderRule {
        host_suffix: String::from("pluto.tv"),
        origin: Some(String::from("https://pluto.tv")),
        referer: Some(String::from("https://pluto.tv/")),
    }]
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StreamConfig {
    #[serde(default = "default_playlist_cache_ttl_secs")]
    pub playlist_cache_ttl_secs: u64,
    #[serde(default = "default_upstream_timeout_secs")]
    pub upstream_timeout_secs: u64,
    #[serde(default = "default_segment_cache_secs")]
    pub segment_cache_secs: u64,
    #[serde(default = "default_stream_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_request_header_rules")]
    pub request_headers: Vec<HostHeaderRule>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            playlist_cache_ttl_secs: default_playlist_cache_ttl_secs(),
            upstream_timeout_secs: default_upstream_timeout_secs(),
            segment_cache_secs: default_segment_cache_secs(),
            user_agent: default_stream_user_agent(),
            request_headers: default_request_header_rules(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum EndpointKind {
    #[serde(rename = "structured")]
    Structured,
    #[serde(rename = "simple")]
    Simple,
    #[serde(rename = "bootstrap")]
    Bootstrap,
}

impl Display for EndpointKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Structured => write!(f, "structured"),
            Self::Simple => write!(f, "simple"),
            Self::Bootstrap => write!(f, "bootstrap"),
        }
    }
}

impl FromStr for EndpointKind {
    type Err = TvProxyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "structured" => Ok(Self::Structured),
            "simple" => Ok(Self::Simple),
            "bootstrap" => Ok(Self::Bootstrap),
            _ => create_tv_proxy_error_result!(TvProxyErrorKind::Internal, "Unknown EndpointKind: {}", s),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LineupEndpoint {
    pub name: String,
    pub kind: EndpointKind,
    pub url: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
}

fn default_lineup_endpoints() -> Vec<LineupEndpoint> {
    vec![
        LineupEndpoint {
            name: String::from("channels-api"),
            kind: EndpointKind::Structured,
            url: String::from("https://api.pluto.tv/v2/channels"),
            headers: HashMap::new(),
        },
        LineupEndpoint {
            name: String::from("channels-json"),
            kind: EndpointKind::Simple,
            url: String::from("https://api.pluto.tv/v2/channels.json"),
            headers: HashMap::new(),
        },
        LineupEndpoint {
            name: String::from("boot"),
            kind: EndpointKind::Bootstrap,
            url: String::from("https://boot.pluto.tv/v4/start"),
            headers: HashMap::new(),
        },
    ]
}

fn default_app_name() -> String { String::from("web") }
fn default_app_version() -> String { String::from("5.17.0") }
fn default_device_type() -> String { String::from("web") }
fn default_device_make() -> String { String::from("Chrome") }
fn default_device_model() -> String { String::from("Chrome") }

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LineupConfig {
    /// Priority order, first entry is preferred.
    #[serde(default = "default_lineup_endpoints")]
    pub endpoints: Vec<LineupEndpoint>,
    /// Upstream call paths disagree on this flag, so it is a policy knob.
    #[serde(default)]
    pub server_side_ads: bool,
    #[serde(default = "default_app_name")]
    pub app_name: String,
    #[serde(default = "default_app_version")]
    pub app_version: String,
    #[serde(default = "default_device_type")]
    pub device_type: String,
    #[serde(default = "default_device_make")]
    pub device_make: String,
    #[serde(default = "default_device_model")]
    pub device_model: String,
    #[serde(default = "default_schedule_window_hours")]
    pub schedule_window_hours: i64,
}

impl Default for LineupConfig {
    fn default() -> Self {
        Self {
            endpoints: default_lineup_endpoints(),
            server_side_ads: false,
            app_name: default_app_name(),
            app_version: default_app_version(),
            device_type: default_device_type(),
            device_make: default_device_make(),
            device_model: default_device_model(),
            schedule_window_hours: default_schedule_window_hours(),
        }
    }
}

fn default_channels_url() -> String { String::from("https://iptv-org.github.io/api/channels.json") }
fn default_streams_url() -> String { String::from("https://iptv-org.github.io/api/streams.json") }
fn default_categories_url() -> String { String::from("https://iptv-org.github.io/api/categories.json") }
fn default_countries_url() -> String { String::from("https://iptv-org.github.io/api/countries.json") }

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CatalogConfig {
    #[serde(default = "default_channels_url")]
    pub channels_url: String,
    #[serde(default = "default_streams_url")]
    pub streams_url: String,
    #[serde(default = "default_categories_url")]
    pub categories_url: String,
    #[serde(default = "default_countries_url")]
    pub countries_url: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            channels_url: default_channels_url(),
            streams_url: default_streams_url(),
            categories_url: default_categories_url(),
            countries_url: default_countries_url(),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetadataConfig {
    /// Title lookup endpoint, queried with a `t` parameter.
    pub url: String,
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub lineup: LineupConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MetadataConfig>,
}

fn check_http_url(context: &str, value: &str) -> Result<(), TvProxyError> {
    match Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
        Ok(url) => create_tv_proxy_error_result!(TvProxyErrorKind::Internal, "{context}: unsupported scheme {}", url.scheme()),
        Err(err) => create_tv_proxy_error_result!(TvProxyErrorKind::Internal, "{context}: invalid url {err}"),
    }
}

impl Config {
    pub fn prepare(&mut self) -> Result<(), TvProxyError> {
        if self.stream.playlist_cache_ttl_secs == 0 {
            return create_tv_proxy_error_result!(TvProxyErrorKind::Internal, "playlist_cache_ttl_secs must be greater than zero");
        }
        if self.stream.upstream_timeout_secs == 0 {
            return create_tv_proxy_error_result!(TvProxyErrorKind::Internal, "upstream_timeout_secs must be greater than zero");
        }
        if self.lineup.schedule_window_hours <= 0 {
            return create_tv_proxy_error_result!(TvProxyErrorKind::Internal, "schedule_window_hours must be greater than zero");
        }
        if self.lineup.endpoints.is_empty() {
            return create_tv_proxy_error_result!(TvProxyErrorKind::Internal, "at least one lineup endpoint is required");
        }
        let mut endpoint_names = HashSet::new();
        for endpoint in &self.lineup.endpoints {
            if endpoint.name.trim().is_empty() {
                return create_tv_proxy_error_result!(TvProxyErrorKind::Internal, "lineup endpoint name required");
            }
            if !endpoint_names.insert(endpoint.name.as_str()) {
                return create_tv_proxy_error_result!(TvProxyErrorKind::Internal, "lineup endpoint names should be unique: {}", endpoint.name);
            }
            check_http_url(&format!("lineup endpoint {}", endpoint.name), &endpoint.url)?;
        }
        check_http_url("catalog channels_url", &self.catalog.channels_url)?;
        check_http_url("catalog streams_url", &self.catalog.streams_url)?;
        check_http_url("catalog categories_url", &self.catalog.categories_url)?;
        check_http_url("catalog countries_url", &self.catalog.countries_url)?;
        if let Some(metadata) = &self.metadata {
            check_http_url("metadata url", &metadata.url)?;
        }
        Ok(())
    }
}
