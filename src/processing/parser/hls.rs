use url::Url;

use crate::utils::constants::{CONSTANTS, MANIFEST_DIRECTIVES, PLAYLIST_ENTRY_MARKER,
                              PLAYLIST_HEADER_MARKER, PROXY_STREAM_PATH};

/// What an upstream body turned out to be, decided from content alone since
/// some upstreams mislabel their manifests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HlsContentKind {
    /// Full playlist: header marker plus at least one entry marker.
    Playlist,
    /// Manifest-level directives without the playlist header/entry pair.
    BareManifest,
    /// Anything else is relayed as an opaque segment.
    Segment,
}

pub fn classify_hls_content(content: &str) -> HlsContentKind {
    let has_header = content.contains(PLAYLIST_HEADER_MARKER);
    let has_entry = content.contains(PLAYLIST_ENTRY_MARKER);
    if has_header && has_entry {
        return HlsContentKind::Playlist;
    }
    if MANIFEST_DIRECTIVES.iter().any(|directive| content.contains(directive)) {
        return HlsContentKind::BareManifest;
    }
    HlsContentKind::Segment
}

/// Resolves a raw playlist reference against the playlist's own url.
///
/// Priority: absolute stays untouched, protocol-relative gets the base scheme,
/// root-relative gets scheme and authority, anything else resolves against the
/// base directory.
pub fn resolve_hls_reference(base_url: &Url, reference: &str) -> String {
    if reference.starts_with("http://") || reference.starts_with("https://") {
        return reference.to_string();
    }
    if reference.starts_with("//") {
        return format!("{}:{reference}", base_url.scheme());
    }
    let origin = base_url.origin().ascii_serialization();
    if reference.starts_with('/') {
        return format!("{origin}{reference}");
    }
    let path = base_url.path();
    let directory = match path.rfind('/') {
        Some(idx) => &path[..=idx],
        None => "/",
    };
    format!("{origin}{directory}{reference}")
}

/// Re-expresses an absolute upstream url as a proxy path that re-enters the
/// stream endpoint on the next fetch.
pub fn proxy_stream_url(resolved: &str) -> String {
    format!("{PROXY_STREAM_PATH}?url={}", urlencoding::encode(resolved))
}

pub struct RewriteHlsProps<'a> {
    pub content: &'a str,
    pub hls_url: &'a Url,
}

fn rewrite_uri_attribute(line: &str, hls_url: &Url) -> String {
    if let Some(caps) = CONSTANTS.re_hls_uri.captures(line) {
        let resolved = resolve_hls_reference(hls_url, &caps[1]);
        let wrapped = proxy_stream_url(&resolved);
        return CONSTANTS.re_hls_uri.replace(line, format!(r#"URI="{wrapped}""#)).to_string();
    }
    line.to_string()
}

/// Line-by-line rewrite of a playlist body. Line order and count are kept;
/// only references change.
pub fn rewrite_hls(props: &RewriteHlsProps) -> String {
    let mut result = Vec::new();
    for raw_line in props.content.lines() {
        let line = raw_line.strip_suffix('\r').unwrap_or(raw_line);
        if line.trim().is_empty() {
            result.push(line.to_string());
            continue;
        }
        if line.starts_with('#') {
            // key and init-segment directives carry quoted uris
            result.push(rewrite_uri_attribute(line, props.hls_url));
            continue;
        }
        let resolved = resolve_hls_reference(props.hls_url, line.trim());
        result.push(proxy_stream_url(&resolved));
    }
    let mut rewritten = result.join("\n");
    if props.content.ends_with('\n') {
        rewritten.push('\n');
    }
    rewritten
}

fn title_case(raw: &str) -> String {
    raw.split(|c: char| c == '-' || c == '_' || c == '.' || c.is_whitespace())
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Picks a display name from the target path: a 24 character segment (opaque
/// content id) wins, then the second-to-last segment, then "stream".
fn derive_stream_name(target_url: &Url) -> String {
    let segments: Vec<&str> = target_url.path().split('/').filter(|s| !s.is_empty()).collect();
    let raw = segments.iter().find(|s| s.len() == 24).copied()
        .or_else(|| if segments.len() >= 2 { Some(segments[segments.len() - 2]) } else { None })
        .unwrap_or("stream");
    let name = title_case(raw);
    if name.is_empty() { String::from("Stream") } else { name }
}

/// Synthesizes a minimal playlist around a bare media manifest. The target is
/// the terminal reference and stays unrewritten.
pub fn wrap_direct_stream(target_url: &Url) -> String {
    let name = derive_stream_name(target_url);
    format!("#EXTM3U\n#EXTINF:-1 tvg-id=\"{name}\" tvg-name=\"{name}\",{name}\n{}\n", target_url.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://cdn.example.com/live/chan1/index.m3u8").unwrap()
    }

    #[test]
    fn absolute_reference_is_unchanged() {
        assert_eq!(resolve_hls_reference(&base(), "https://other.example.com/x.ts"),
                   "https://other.example.com/x.ts");
    }

    #[test]
    fn protocol_relative_reference_gets_base_scheme() {
        assert_eq!(resolve_hls_reference(&base(), "//other.example.com/x"),
                   "https://other.example.com/x");
    }

    #[test]
    fn root_relative_reference_gets_scheme_and_host() {
        assert_eq!(resolve_hls_reference(&base(), "/root/x"),
                   "https://cdn.example.com/root/x");
    }

    #[test]
    fn relative_reference_resolves_against_base_directory() {
        assert_eq!(resolve_hls_reference(&base(), "seg1.ts"),
                   "https://cdn.example.com/live/chan1/seg1.ts");
    }

    #[test]
    fn wrapped_reference_decodes_back_to_the_resolved_url() {
        for reference in ["https://other.example.com/x", "//other.example.com/x", "/root/x", "seg1.ts"] {
            let resolved = resolve_hls_reference(&base(), reference);
            let wrapped = proxy_stream_url(&resolved);
            let encoded = wrapped.strip_prefix("/proxy/stream?url=").unwrap();
            assert_eq!(urlencoding::decode(encoded).unwrap(), resolved);
            assert!(resolved.starts_with("https://"));
        }
    }

    #[test]
    fn classify_needs_header_and_entry_for_playlist() {
        assert_eq!(classify_hls_content("#EXTM3U\n#EXTINF:-1,Chan\nseg1.ts"), HlsContentKind::Playlist);
        assert_eq!(classify_hls_content("#EXTM3U\n#EXT-X-VERSION:3"), HlsContentKind::BareManifest);
        assert_eq!(classify_hls_content("#EXT-X-TARGETDURATION:10"), HlsContentKind::BareManifest);
        assert_eq!(classify_hls_content("not a manifest at all"), HlsContentKind::Segment);
    }

    #[test]
    fn rewrite_wraps_media_reference() {
        let hls_url = Url::parse("http://x/master.m3u8").unwrap();
        let props = RewriteHlsProps { content: "#EXTM3U\n#EXTINF:-1,Chan\nseg1.ts", hls_url: &hls_url };
        let rewritten = rewrite_hls(&props);
        let lines: Vec<&str> = rewritten.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "#EXTM3U");
        assert_eq!(lines[1], "#EXTINF:-1,Chan");
        assert_eq!(lines[2], "/proxy/stream?url=http%3A%2F%2Fx%2Fseg1.ts");
    }

    #[test]
    fn rewrite_wraps_quoted_uri_attributes() {
        let hls_url = Url::parse("https://cdn.example.com/live/chan1/index.m3u8").unwrap();
        let content = "#EXTM3U\n#EXT-X-KEY:METHOD=AES-128,URI=\"key.bin\",IV=0x1234\n#EXTINF:-1,Chan\nseg1.ts";
        let rewritten = rewrite_hls(&RewriteHlsProps { content, hls_url: &hls_url });
        let lines: Vec<&str> = rewritten.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[1].starts_with("#EXT-X-KEY:METHOD=AES-128,URI=\"/proxy/stream?url="));
        assert!(lines[1].contains(&urlencoding::encode("https://cdn.example.com/live/chan1/key.bin").to_string()));
        assert!(lines[1].ends_with(",IV=0x1234"));
    }

    #[test]
    fn rewrite_keeps_line_order_and_count() {
        let hls_url = Url::parse("http://x/live/master.m3u8").unwrap();
        let content = "#EXTM3U\n\n#EXT-X-VERSION:3\n#EXTINF:-1,A\nlow/a.m3u8\n#EXTINF:-1,B\n/hi/b.m3u8\n";
        let rewritten = rewrite_hls(&RewriteHlsProps { content, hls_url: &hls_url });
        assert_eq!(rewritten.lines().count(), content.lines().count());
        assert!(rewritten.ends_with('\n'));
        let lines: Vec<&str> = rewritten.lines().collect();
        assert_eq!(lines[4], format!("/proxy/stream?url={}", urlencoding::encode("http://x/live/low/a.m3u8")));
        assert_eq!(lines[6], format!("/proxy/stream?url={}", urlencoding::encode("http://x/hi/b.m3u8")));
    }

    #[test]
    fn wrap_direct_stream_prefers_24_char_segment() {
        let target = Url::parse("http://x/abcdef0123456789abcdef01/manifest").unwrap();
        let wrapped = wrap_direct_stream(&target);
        let lines: Vec<&str> = wrapped.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "#EXTM3U");
        assert!(lines[1].contains("Abcdef0123456789abcdef01"));
        assert_eq!(lines[2], "http://x/abcdef0123456789abcdef01/manifest");
    }

    #[test]
    fn wrap_direct_stream_falls_back_to_second_to_last_segment() {
        let target = Url::parse("https://cdn.example.com/live/sports-one/chunklist").unwrap();
        let wrapped = wrap_direct_stream(&target);
        assert!(wrapped.lines().nth(1).unwrap().contains("Sports One"));
    }

    #[test]
    fn wrap_direct_stream_uses_literal_fallback() {
        let target = Url::parse("https://cdn.example.com/manifest").unwrap();
        let wrapped = wrap_direct_stream(&target);
        assert!(wrapped.lines().nth(1).unwrap().contains("Stream"));
    }
}
