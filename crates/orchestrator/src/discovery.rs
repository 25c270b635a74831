//! Resolution of the tool-discovery address.

use url::{Host, Url};
use tracing::warn;

pub const SSE_SUFFIX: &str = "/sse";

/// Work out where the relay should open its discovery stream.
///
/// Rules, in order:
/// 1. use `override_url` when it parses as an http(s) URL, otherwise fall
///    back to `origin` joined with `base_path`;
/// 2. `None` when neither yields a usable URL;
/// 3. loopback hosts (`localhost`, `*.localhost`, `127.0.0.0/8`, `::1`) are
///    moved from `https` to `http`;
/// 4. the path ends in exactly one `/sse`.
///
/// ```
/// use roster_orchestrator::normalize_discovery_url;
///
/// let url = normalize_discovery_url(None, Some("https://localhost:3000"), "/api/mcp").unwrap();
/// assert_eq!(url.as_str(), "http://localhost:3000/api/mcp/sse");
/// ```
pub fn normalize_discovery_url(
    override_url: Option<&str>,
    origin: Option<&str>,
    base_path: &str,
) -> Option<Url> {
    let derived = || origin.and_then(|origin| parse_http_url(&join_origin(origin, base_path)));

    let chosen = match override_url.map(str::trim).filter(|raw| !raw.is_empty()) {
        Some(raw) => parse_http_url(raw).or_else(|| {
            warn!(url = raw, "ignoring unparseable discovery url override");
            derived()
        }),
        None => derived(),
    }?;

    Some(finalize(chosen))
}

fn parse_http_url(raw: &str) -> Option<Url> {
    let url = Url::parse(raw).ok()?;
    let usable = matches!(url.scheme(), "http" | "https") && url.host().is_some();
    usable.then_some(url)
}

fn join_origin(origin: &str, base_path: &str) -> String {
    format!(
        "{}/{}",
        origin.trim_end_matches('/'),
        base_path.trim_start_matches('/')
    )
}

fn finalize(mut url: Url) -> Url {
    if url.scheme() == "https" && is_loopback(&url) {
        // https -> http is always permitted by the url crate
        let _ = url.set_scheme("http");
    }

    let mut path = url.path().trim_end_matches('/').to_string();
    while let Some(stripped) = path.strip_suffix(SSE_SUFFIX) {
        path = stripped.trim_end_matches('/').to_string();
    }
    path.push_str(SSE_SUFFIX);
    url.set_path(&path);
    url
}

fn is_loopback(url: &Url) -> bool {
    match url.host() {
        Some(Host::Domain(domain)) => {
            let domain = domain.to_ascii_lowercase();
            domain == "localhost" || domain.ends_with(".localhost")
        }
        Some(Host::Ipv4(ip)) => ip.is_loopback(),
        Some(Host::Ipv6(ip)) => ip.is_loopback(),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalize(override_url: Option<&str>, origin: Option<&str>) -> Option<String> {
        normalize_discovery_url(override_url, origin, "/api/mcp").map(|url| url.to_string())
    }

    #[test]
    fn derives_from_origin_when_no_override() {
        assert_eq!(
            normalize(None, Some("https://roster.example.com")).as_deref(),
            Some("https://roster.example.com/api/mcp/sse")
        );
    }

    #[test]
    fn override_wins_over_origin() {
        assert_eq!(
            normalize(Some("https://tools.example.com/mcp"), Some("http://localhost:3000")).as_deref(),
            Some("https://tools.example.com/mcp/sse")
        );
    }

    #[test]
    fn suffix_is_not_duplicated() {
        assert_eq!(
            normalize(Some("http://tools.example.com/api/mcp/sse/"), None).as_deref(),
            Some("http://tools.example.com/api/mcp/sse")
        );
        assert_eq!(
            normalize(Some("http://tools.example.com/api/mcp/sse/sse"), None).as_deref(),
            Some("http://tools.example.com/api/mcp/sse")
        );
    }

    #[test]
    fn loopback_hosts_downgrade_to_http() {
        for origin in [
            "https://localhost:3000",
            "https://127.0.0.1:3000",
            "https://127.8.9.10",
            "https://[::1]:3000",
            "https://app.localhost",
        ] {
            let url = normalize(None, Some(origin)).unwrap();
            assert!(url.starts_with("http://"), "{origin} -> {url}");
        }
        assert!(normalize(None, Some("https://10.0.0.1"))
            .unwrap()
            .starts_with("https://"));
    }

    #[test]
    fn unparseable_override_falls_back_to_origin() {
        assert_eq!(
            normalize(Some("not a url"), Some("http://localhost:3000")).as_deref(),
            Some("http://localhost:3000/api/mcp/sse")
        );
        assert_eq!(
            normalize(Some("ftp://files.example.com"), Some("http://localhost:3000")).as_deref(),
            Some("http://localhost:3000/api/mcp/sse")
        );
    }

    #[test]
    fn nothing_usable_means_no_discovery() {
        assert_eq!(normalize(Some("::"), None), None);
        assert_eq!(normalize(None, None), None);
        assert_eq!(normalize(None, Some("not-an-origin")), None);
    }

    #[test]
    fn query_is_preserved() {
        assert_eq!(
            normalize(Some("http://tools.example.com/api/mcp?token=1"), None).as_deref(),
            Some("http://tools.example.com/api/mcp/sse?token=1")
        );
    }
}
