pub const fn default_as_true() -> bool { true }

pub fn default_api_host() -> String { String::from("127.0.0.1") }

pub const fn default_api_port() -> u16 { 8901 }

pub const fn default_playlist_cache_ttl_secs() -> u64 { 5 }

pub const fn default_upstream_timeout_secs() -> u64 { 10 }

pub const fn default_segment_cache_secs() -> u64 { 3600 }

pub const fn default_schedule_window_hours() -> i64 { 6 }
