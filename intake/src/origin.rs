use axum::http::HeaderMap;
use axum::http::header::HOST;
use url::Url;

const FORWARDED_PROTO: &str = "x-forwarded-proto";

/// Scheme and authority used to build file links, without a trailing slash.
///
/// A configured `public_base_url` wins. Otherwise the scheme is taken from
/// `X-Forwarded-Proto` (default `http`) and the authority from `Host`.
pub fn request_origin(headers: &HeaderMap, public_base_url: Option<&Url>) -> String {
    if let Some(base) = public_base_url {
        return base.as_str().trim_end_matches('/').to_string();
    }

    let scheme = headers
        .get(FORWARDED_PROTO)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| matches!(*v, "http" | "https"))
        .unwrap_or("http");

    let host = headers
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .unwrap_or("localhost");

    format!("{scheme}://{host}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_host_header() {
        assert_eq!(
            request_origin(&headers(&[("host", "forms.example.com:3000")]), None),
            "http://forms.example.com:3000"
        );
        assert_eq!(request_origin(&HeaderMap::new(), None), "http://localhost");
    }

    #[test]
    fn test_forwarded_proto() {
        let map = headers(&[
            ("host", "forms.example.com"),
            ("x-forwarded-proto", "https, http"),
        ]);
        assert_eq!(request_origin(&map, None), "https://forms.example.com");

        let map = headers(&[("host", "h"), ("x-forwarded-proto", "gopher")]);
        assert_eq!(request_origin(&map, None), "http://h");
    }

    #[test]
    fn test_forwarded_host_is_ignored() {
        let map = headers(&[("host", "h"), ("x-forwarded-host", "evil.example.com")]);
        assert_eq!(request_origin(&map, None), "http://h");
    }

    #[test]
    fn test_public_base_url_wins() {
        let base = Url::parse("https://cdn.example.com/").unwrap();
        let map = headers(&[("host", "h")]);
        assert_eq!(
            request_origin(&map, Some(&base)),
            "https://cdn.example.com"
        );
    }
}
