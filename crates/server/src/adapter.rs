use axum::http::{header, HeaderMap, Method, Uri};
use beacon_core::{HeaderList, ParameterSet, RequestMeta};
use std::net::SocketAddr;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Resolves the originating client address.
///
/// Order: `X-Real-Ip`, then the first `X-Forwarded-For` entry, then the peer address
/// without its port.
pub fn client_address(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    if let Some(real_ip) = header_str(headers, "x-real-ip") {
        return real_ip.to_string();
    }
    if let Some(forwarded) = header_str(headers, "x-forwarded-for") {
        if let Some(first) = forwarded.split(',').map(str::trim).next() {
            return first.to_string();
        }
    }
    peer.map(|addr| strip_port(&addr.to_string()).to_string())
        .unwrap_or_default()
}

/// `"[::1]:58292"` -> `"[::1]"`, `"10.0.0.1:80"` -> `"10.0.0.1"`.
pub fn strip_port(addr: &str) -> &str {
    match addr.rfind(':') {
        Some(idx) => &addr[..idx],
        None => addr,
    }
}

/// Header capture for the report. `Host` is reported separately and left out.
pub fn header_list(headers: &HeaderMap) -> HeaderList {
    let mut list = HeaderList::new();
    for (name, value) in headers {
        if *name == header::HOST {
            continue;
        }
        list.push(
            name.as_str(),
            String::from_utf8_lossy(value.as_bytes()).into_owned(),
        );
    }
    list
}

pub fn request_meta(
    method: &Method,
    uri: &Uri,
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
) -> RequestMeta {
    let host = header_str(headers, header::HOST.as_str())
        .map(str::to_string)
        .or_else(|| uri.authority().map(|a| a.to_string()))
        .unwrap_or_default();
    RequestMeta {
        source: client_address(headers, peer),
        host,
        method: method.to_string(),
        path: uri.path().to_string(),
    }
}

/// Form body (for `POST`/`PUT`/`PATCH` url-encoded requests) followed by the query string.
pub fn collect_parameters(
    method: &Method,
    uri: &Uri,
    headers: &HeaderMap,
    body: &[u8],
) -> ParameterSet {
    let body_params = if accepts_form_body(method, headers) {
        ParameterSet::from_urlencoded(body)
    } else {
        ParameterSet::new()
    };
    let query_params = uri
        .query()
        .map(|q| ParameterSet::from_urlencoded(q.as_bytes()))
        .unwrap_or_default();
    ParameterSet::merge(body_params, query_params)
}

fn accepts_form_body(method: &Method, headers: &HeaderMap) -> bool {
    if !matches!(*method, Method::POST | Method::PUT | Method::PATCH) {
        return false;
    }
    header_str(headers, header::CONTENT_TYPE.as_str())
        .and_then(|ct| ct.split(';').next())
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case(FORM_CONTENT_TYPE))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}
