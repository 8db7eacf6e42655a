use bytes::Bytes;
use reqwest::StatusCode;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, HeaderMap, HeaderValue, TRANSFER_ENCODING};

/// Transport headers that describe one connection, never the payload.
pub const HOP_BY_HOP_HEADERS: [&str; 6] = [
    "connection",
    "keep-alive",
    "proxy-connection",
    "transfer-encoding",
    "upgrade",
    "trailer",
];

/// True if `name` is a hop-by-hop header (case-insensitive).
pub fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP_HEADERS
        .iter()
        .any(|h| h.eq_ignore_ascii_case(name))
}

/// Copies `source` without hop-by-hop and framing headers.
///
/// The proxy re-frames the body itself, so `content-length` goes too.
pub fn sanitize_headers(source: &HeaderMap) -> HeaderMap {
    let mut target = HeaderMap::with_capacity(source.len());
    for (name, value) in source {
        if !is_hop_by_hop(name.as_str()) {
            target.append(name.clone(), value.clone());
        }
    }
    target.remove(CONTENT_LENGTH);
    target.remove(TRANSFER_ENCODING);
    target
}

/// Fully buffered reply handed back to the edge caller.
#[derive(Clone, Debug)]
pub struct ProxyResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ProxyResponse {
    /// Synthetic `503` carrying `{"error":"Server unavailable: <detail>"}`.
    pub fn unavailable(detail: impl std::fmt::Display) -> Self {
        let body = serde_json::json!({ "error": format!("Server unavailable: {detail}") });
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            headers,
            body: Bytes::from(body.to_string()),
        }
    }

    /// True for the synthetic degraded reply and genuine backend 503s alike.
    pub fn is_unavailable(&self) -> bool {
        self.status == StatusCode::SERVICE_UNAVAILABLE
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Decodes the body as JSON.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}
