use std::sync::Arc;

use crate::api::model::playlist_cache::PlaylistCache;
use crate::model::config::Config;
use crate::provider::session::SessionFactory;

/// Constructed once at startup and handed to every request handler. The cache
/// lives for the process lifetime and is only ever cleared by its own sweep.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub http_client: Arc<reqwest::Client>,
    pub playlist_cache: Arc<PlaylistCache>,
    pub session_factory: Arc<dyn SessionFactory>,
}
