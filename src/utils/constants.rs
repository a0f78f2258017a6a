use regex::Regex;
use std::sync::atomic::AtomicBool;
use std::sync::LazyLock;

pub const CONFIG_FILE: &str = "config.yml";

pub const PROXY_STREAM_PATH: &str = "/proxy/stream";

// Both markers must be present for a body to count as a playlist.
pub const PLAYLIST_HEADER_MARKER: &str = "#EXTM3U";
pub const PLAYLIST_ENTRY_MARKER: &str = "#EXTINF";

pub const MANIFEST_DIRECTIVES: &[&str] = &["#EXT-X-VERSION", "#EXT-X-TARGETDURATION", "#EXT-X-STREAM-INF"];

pub const SEGMENT_EXTENSIONS: &[&str] = &[".ts", ".m4s", ".mp4", ".m4a", ".aac", ".vtt"];

pub const PLAYLIST_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";
pub const SEGMENT_CONTENT_TYPE: &str = "video/mp2t";

pub const PLAYLIST_CACHE_CONTROL: &str = "no-cache, no-store, must-revalidate";

pub const STREAM_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";
pub const STREAM_ACCEPT: &str = "*/*";

pub const STITCHED_HLS_TYPE: &str = "hls";

pub struct Constants {
    pub re_hls_uri: Regex,
    pub re_device_id: Regex,
    pub re_sid: Regex,
    pub re_token: Regex,
    pub re_hls_manifest: Regex,
    pub sanitize: AtomicBool,
}

pub static CONSTANTS: LazyLock<Constants> = LazyLock::new(|| Constants {
    re_hls_uri: Regex::new(r#"URI="([^"]+)""#).unwrap(),
    re_device_id: Regex::new(r"(deviceId=)[^&]*").unwrap(),
    re_sid: Regex::new(r"(sid=)[^&]*").unwrap(),
    re_token: Regex::new(r"(token=)[^&]*").unwrap(),
    re_hls_manifest: Regex::new(r#""hlsManifestUrl"\s*:\s*"([^"]+)""#).unwrap(),
    sanitize: AtomicBool::new(true),
});
