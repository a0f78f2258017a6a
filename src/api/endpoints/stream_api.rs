use std::sync::Arc;

use axum::response::IntoResponse;
use log::error;
use url::Url;

use crate::api::api_utils::{error_response, playlist_response};
use crate::api::model::app_state::AppState;
use crate::api::model::request::StreamProxyRequest;
use crate::processing::parser::hls::{classify_hls_content, rewrite_hls, wrap_direct_stream,
                                     HlsContentKind, RewriteHlsProps};
use crate::tv_proxy_error::create_tv_proxy_error;
use crate::tv_proxy_error::TvProxyErrorKind;
use crate::utils::constants::{SEGMENT_CONTENT_TYPE, SEGMENT_EXTENSIONS};
use crate::utils::debug_if_enabled;
use crate::utils::network::request;
use crate::utils::network::request::sanitize_sensitive_info;

fn segment_cache_control(app_state: &AppState) -> String {
    format!("public, max-age={}", app_state.config.stream.segment_cache_secs)
}

fn has_segment_extension(path: &str) -> bool {
    let lower = path.to_lowercase();
    SEGMENT_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// Relays an obvious media segment without buffering it.
async fn relay_segment_stream(app_state: &Arc<AppState>, target_url: &Url) -> axum::response::Response {
    let headers = request::stream_request_headers(&app_state.config.stream, target_url);
    match request::open_upstream_stream(&app_state.http_client, headers, target_url).await {
        Ok(upstream) => {
            let status = upstream.status();
            let content_type = upstream.headers().get(reqwest::header::CONTENT_TYPE)
                .and_then(|value| value.to_str().ok())
                .unwrap_or(SEGMENT_CONTENT_TYPE)
                .to_string();
            axum::response::Response::builder()
                .status(status)
                .header(axum::http::header::CONTENT_TYPE, content_type)
                .header(axum::http::header::CACHE_CONTROL, segment_cache_control(app_state))
                .body(axum::body::Body::from_stream(upstream.bytes_stream()))
                .unwrap()
                .into_response()
        }
        Err(err) => {
            error!("segment relay failed: {err}");
            error_response(&err)
        }
    }
}

/// Relays a body that had to be read for classification.
fn buffered_segment_response(app_state: &AppState, upstream: request::UpstreamResponse) -> axum::response::Response {
    let content_type = upstream.content_type.unwrap_or_else(|| String::from(SEGMENT_CONTENT_TYPE));
    axum::response::Response::builder()
        .status(upstream.status)
        .header(axum::http::header::CONTENT_TYPE, content_type)
        .header(axum::http::header::CACHE_CONTROL, segment_cache_control(app_state))
        .body(axum::body::Body::from(upstream.body))
        .unwrap()
        .into_response()
}

async fn proxy_stream(
    axum::extract::Query(api_req): axum::extract::Query<StreamProxyRequest>,
    axum::extract::State(app_state): axum::extract::State<Arc<AppState>>,
) -> impl axum::response::IntoResponse + Send {
    let target = api_req.url.trim().to_string();
    if target.is_empty() {
        return error_response(&create_tv_proxy_error!(TvProxyErrorKind::Validation, "missing url parameter"));
    }
    if !(target.starts_with("http://") || target.starts_with("https://")) {
        return error_response(&create_tv_proxy_error!(TvProxyErrorKind::Validation, "url must be an absolute http(s) url"));
    }
    let Ok(target_url) = Url::parse(&target) else {
        return error_response(&create_tv_proxy_error!(TvProxyErrorKind::Validation, "url must be an absolute http(s) url"));
    };

    // the decoded string is the cache key, no normalization
    if let Some(body) = app_state.playlist_cache.get(&target).await {
        debug_if_enabled!("playlist cache hit for {}", sanitize_sensitive_info(&target));
        return playlist_response(body);
    }

    if has_segment_extension(target_url.path()) {
        return relay_segment_stream(&app_state, &target_url).await;
    }

    let headers = request::stream_request_headers(&app_state.config.stream, &target_url);
    let upstream = match request::download_upstream(&app_state.http_client, headers, &target_url).await {
        Ok(response) => response,
        Err(err) => {
            error!("proxy fetch failed: {err}");
            return error_response(&err);
        }
    };

    let Some(content) = upstream.text() else {
        return buffered_segment_response(&app_state, upstream);
    };

    match classify_hls_content(&content) {
        HlsContentKind::Playlist => {
            let rewritten = rewrite_hls(&RewriteHlsProps { content: &content, hls_url: &target_url });
            app_state.playlist_cache.store(&target, rewritten.clone()).await;
            playlist_response(rewritten)
        }
        HlsContentKind::BareManifest => playlist_response(wrap_direct_stream(&target_url)),
        HlsContentKind::Segment => buffered_segment_response(&app_state, upstream),
    }
}

async fn proxy_stream_options() -> impl axum::response::IntoResponse + Send {
    axum::http::StatusCode::NO_CONTENT.into_response()
}

pub fn stream_api_register() -> axum::Router<Arc<AppState>> {
    axum::Router::new()
        .route("/proxy/stream", axum::routing::get(proxy_stream).options(proxy_stream_options))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::model::playlist_cache::PlaylistCache;
    use crate::model::config::Config;
    use crate::provider::session::EphemeralSessionFactory;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn test_state() -> Arc<AppState> {
        let config = Arc::new(Config::default());
        Arc::new(AppState {
            http_client: Arc::new(reqwest::Client::new()),
            playlist_cache: Arc::new(PlaylistCache::new(Duration::from_secs(config.stream.playlist_cache_ttl_secs))),
            session_factory: Arc::new(EphemeralSessionFactory::new(config.lineup.schedule_window_hours)),
            config,
        })
    }

    async fn call(state: Arc<AppState>, url: &str) -> axum::response::Response {
        proxy_stream(
            axum::extract::Query(StreamProxyRequest { url: String::from(url) }),
            axum::extract::State(state),
        ).await.into_response()
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn missing_url_parameter_yields_structured_400() {
        let response = call(test_state(), "").await;
        assert_eq!(response.status(), axum::http::StatusCode::BAD_REQUEST);
        let value: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert!(value.get("error").is_some());
    }

    #[tokio::test]
    async fn non_http_scheme_is_rejected_before_any_fetch() {
        let response = call(test_state(), "file:///etc/passwd").await;
        assert_eq!(response.status(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn playlist_is_rewritten_and_second_request_hits_the_cache() {
        let upstream_hits = Arc::new(AtomicUsize::new(0));
        let hits = Arc::clone(&upstream_hits);
        let router = axum::Router::new().route("/live/master.m3u8", axum::routing::get(move || {
            let hits = Arc::clone(&hits);
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
                "#EXTM3U\n#EXTINF:-1,Chan\nseg1.ts"
            }
        }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        let state = test_state();
        let target = format!("http://{addr}/live/master.m3u8");

        let first = call(Arc::clone(&state), &target).await;
        assert_eq!(first.status(), axum::http::StatusCode::OK);
        assert_eq!(first.headers().get(axum::http::header::CONTENT_TYPE).unwrap(), "application/vnd.apple.mpegurl");
        let first_body = body_text(first).await;
        let expected_segment = format!("/proxy/stream?url={}", urlencoding::encode(&format!("http://{addr}/live/seg1.ts")));
        assert_eq!(first_body.lines().last().unwrap(), expected_segment);

        let second = call(Arc::clone(&state), &target).await;
        let second_body = body_text(second).await;
        assert_eq!(first_body, second_body);
        assert_eq!(upstream_hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn bare_manifest_is_wrapped_into_a_direct_stream_playlist() {
        let router = axum::Router::new().route("/abcdef0123456789abcdef01/manifest", axum::routing::get(|| async {
            "#EXT-X-TARGETDURATION:10"
        }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        let target = format!("http://{addr}/abcdef0123456789abcdef01/manifest");
        let response = call(test_state(), &target).await;
        assert_eq!(response.status(), axum::http::StatusCode::OK);
        let body = body_text(response).await;
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].contains("Abcdef0123456789abcdef01"));
        assert_eq!(lines[2], target);
    }

    #[tokio::test]
    async fn upstream_status_is_propagated_for_single_fetches() {
        let router = axum::Router::new().route("/gone.m3u8", axum::routing::get(|| async {
            axum::http::StatusCode::GONE
        }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        let response = call(test_state(), &format!("http://{addr}/gone.m3u8")).await;
        assert_eq!(response.status(), axum::http::StatusCode::GONE);
    }
}
