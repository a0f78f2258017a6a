pub mod catalog_api;
pub mod channel_api;
pub mod media_api;
pub mod stream_api;
