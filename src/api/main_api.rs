use std::sync::Arc;
use std::time::Duration;

use axum::http::Method;
use log::info;
use tower_http::cors::{Any, CorsLayer};

use crate::api::endpoints::catalog_api::catalog_api_register;
use crate::api::endpoints::channel_api::channel_api_register;
use crate::api::endpoints::media_api::media_api_register;
use crate::api::endpoints::stream_api::stream_api_register;
use crate::api::model::app_state::AppState;
use crate::api::model::playlist_cache::PlaylistCache;
use crate::model::config::Config;
use crate::provider::session::EphemeralSessionFactory;
use crate::utils::network::request::create_http_client;

#[tokio::main]
pub(crate) async fn start_server(cfg: Arc<Config>) -> std::io::Result<()> {
    let host = cfg.api.host.clone();
    let port = cfg.api.port;

    let app_state = Arc::new(AppState {
        http_client: Arc::new(create_http_client(&cfg.stream)),
        playlist_cache: Arc::new(PlaylistCache::new(Duration::from_secs(cfg.stream.playlist_cache_ttl_secs))),
        session_factory: Arc::new(EphemeralSessionFactory::new(cfg.lineup.schedule_window_hours)),
        config: Arc::clone(&cfg),
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS, Method::HEAD])
        .allow_headers(Any)
        .max_age(Duration::from_secs(3600));

    let router = axum::Router::new()
        .merge(stream_api_register())
        .merge(channel_api_register())
        .merge(catalog_api_register())
        .merge(media_api_register())
        .layer(cors)
        .with_state(app_state);

    info!("server running: http://{host}:{port}");
    let listener = tokio::net::TcpListener::bind(format!("{host}:{port}")).await?;
    axum::serve(listener, router).await
}
