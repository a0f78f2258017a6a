use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    #[serde(rename = "deviceId")]
    pub device_id: String,
    pub sid: String,
    #[serde(rename = "generatedAt")]
    pub generated_at: String,
}

#[derive(Debug, Serialize)]
pub struct ChannelLineupResponse {
    pub channels: Vec<Value>,
    #[serde(rename = "sessionInfo")]
    pub session_info: SessionInfo,
}

/// Structured failure body for an exhausted provider chain. The channel list
/// stays present (empty) so clients keep a uniform shape.
#[derive(Debug, Serialize)]
pub struct ChannelLineupFailure {
    pub error: String,
    pub message: String,
    pub channels: Vec<Value>,
}
