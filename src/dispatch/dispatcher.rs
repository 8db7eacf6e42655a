use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::{Bytes, BytesMut};
use parking_lot::RwLock;
use reqwest::header::{CONTENT_TYPE, HeaderValue};

use crate::config::DispatcherConfig;
use crate::error::DispatchError;
use crate::events::{Bus, Event, EventKind};

use super::{ProxyResponse, sanitize_headers};

/// Round-robin reverse proxy over a fixed list of backend base URLs.
pub struct Dispatcher {
    cfg: DispatcherConfig,
    targets: RwLock<Vec<Arc<str>>>,
    cursor: AtomicUsize,
    client: reqwest::Client,
    bus: Option<Bus>,
}

impl Dispatcher {
    /// Creates a dispatcher and loads its targets from `cfg.servers`.
    pub fn new(cfg: DispatcherConfig) -> Result<Self, DispatchError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = cfg.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(|e| DispatchError::Client {
            error: e.to_string(),
        })?;

        let dispatcher = Self {
            cfg,
            targets: RwLock::new(Vec::new()),
            cursor: AtomicUsize::new(0),
            client,
            bus: None,
        };
        dispatcher.initialize();
        Ok(dispatcher)
    }

    /// Publishes forward outcomes on `bus`.
    pub fn with_bus(mut self, bus: Bus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Loads targets from config if the list is empty; returns the target count.
    ///
    /// Idempotent: a populated list is left alone.
    pub fn initialize(&self) -> usize {
        let mut targets = self.targets.write();
        if targets.is_empty() {
            targets.extend(
                self.cfg
                    .servers
                    .iter()
                    .map(|s| s.trim())
                    .filter(|s| !s.is_empty())
                    .map(Arc::from),
            );
            if targets.is_empty() {
                tracing::debug!("no dispatcher targets configured");
            } else {
                tracing::info!(count = targets.len(), servers = ?targets.as_slice(), "dispatcher targets loaded");
            }
        }
        targets.len()
    }

    /// Copy of the target list.
    pub fn targets(&self) -> Vec<String> {
        self.ensure_targets();
        self.targets.read().iter().map(|t| t.to_string()).collect()
    }

    /// Next target in round-robin order.
    ///
    /// The cursor advances exactly once per call and wraps at the list length.
    pub fn select_target(&self) -> Result<Arc<str>, DispatchError> {
        self.ensure_targets();
        let targets = self.targets.read();
        let len = targets.len();
        if len == 0 {
            return Err(DispatchError::NoTargets);
        }
        let idx = self
            .cursor
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| Some((c + 1) % len))
            .unwrap_or_else(|c| c);
        Ok(Arc::clone(&targets[idx % len]))
    }

    /// Proxies `path` to the next target: POST with a JSON body, GET without.
    ///
    /// Never fails: transport problems become [`ProxyResponse::unavailable`].
    pub async fn forward(&self, path: &str, body: Option<Bytes>) -> ProxyResponse {
        let target = match self.select_target() {
            Ok(t) => t,
            Err(err) => return self.degraded(None, path, &err),
        };

        tracing::info!(backend = %target, path, post = body.is_some(), "forwarding");
        match self.call(&target, path, body).await {
            Ok(resp) => {
                tracing::info!(backend = %target, path, status = resp.status.as_u16(), "backend replied");
                self.publish(
                    Event::new(EventKind::RequestForwarded)
                        .with_target(Arc::clone(&target))
                        .with_path(path)
                        .with_status(resp.status.as_u16()),
                );
                resp
            }
            Err(err) => self.degraded(Some(target), path, &err),
        }
    }

    async fn call(
        &self,
        target: &str,
        path: &str,
        body: Option<Bytes>,
    ) -> Result<ProxyResponse, DispatchError> {
        let url = format!("{target}{path}");
        let request = match body {
            Some(body) => self
                .client
                .post(&url)
                .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
                .body(body),
            None => self.client.get(&url),
        };

        let transport = |e: reqwest::Error| DispatchError::Transport {
            target: target.to_owned(),
            error: error_chain(&e),
        };
        let mut resp = request.send().await.map_err(transport)?;

        let limit = self.cfg.max_body_bytes;
        if resp.content_length().is_some_and(|n| n > limit as u64) {
            return Err(DispatchError::BodyTooLarge { limit });
        }
        let status = resp.status();
        let headers = sanitize_headers(resp.headers());

        let mut buf = BytesMut::new();
        while let Some(chunk) = resp.chunk().await.map_err(transport)? {
            if buf.len() + chunk.len() > limit {
                return Err(DispatchError::BodyTooLarge { limit });
            }
            buf.extend_from_slice(&chunk);
        }

        Ok(ProxyResponse {
            status,
            headers,
            body: buf.freeze(),
        })
    }

    fn degraded(&self, target: Option<Arc<str>>, path: &str, err: &DispatchError) -> ProxyResponse {
        let resp = ProxyResponse::unavailable(err);
        tracing::error!(
            backend = target.as_deref().unwrap_or("-"),
            path,
            label = err.as_label(),
            error = %err,
            "forward failed"
        );
        let mut ev = Event::new(EventKind::ForwardFailed)
            .with_path(path)
            .with_status(resp.status.as_u16())
            .with_reason(err.to_string());
        if let Some(target) = target {
            ev = ev.with_target(target);
        }
        self.publish(ev);
        resp
    }

    fn ensure_targets(&self) {
        if self.targets.read().is_empty() {
            self.initialize();
        }
    }

    fn publish(&self, ev: Event) {
        if let Some(bus) = &self.bus {
            bus.publish(ev);
        }
    }
}

/// Error message with its source chain, `": "`-separated.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Router, http::StatusCode, routing::get};
    use std::collections::HashMap;
    use std::time::Duration;

    fn dispatcher(servers: &[&str]) -> Dispatcher {
        Dispatcher::new(DispatcherConfig::with_servers(
            servers.iter().map(|s| s.to_string()).collect(),
        ))
        .unwrap()
    }

    async fn spawn_backend(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[test]
    fn test_round_robin_visits_each_target_evenly() {
        let d = dispatcher(&["http://a", "http://b", "http://c"]);
        let picks: Vec<_> = (0..6).map(|_| d.select_target().unwrap().to_string()).collect();
        assert_eq!(
            picks,
            ["http://a", "http://b", "http://c", "http://a", "http://b", "http://c"]
        );
    }

    #[test]
    fn test_concurrent_selection_is_even() {
        let d = Arc::new(dispatcher(&["http://a", "http://b", "http://c"]));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let d = d.clone();
                std::thread::spawn(move || {
                    (0..300)
                        .map(|_| d.select_target().unwrap().to_string())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut counts: HashMap<String, usize> = HashMap::new();
        for h in handles {
            for t in h.join().unwrap() {
                *counts.entry(t).or_default() += 1;
            }
        }
        assert_eq!(counts.len(), 3);
        assert!(counts.values().all(|&n| n == 800), "{counts:?}");
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let d = dispatcher(&[" http://a ", "http://b"]);
        assert_eq!(d.initialize(), 2);
        assert_eq!(d.initialize(), 2);
        assert_eq!(d.targets(), vec!["http://a", "http://b"]);
    }

    #[tokio::test]
    async fn test_no_targets_degrades() {
        let bus = Bus::new(8);
        let mut rx = bus.subscribe();
        let d = dispatcher(&[]).with_bus(bus);
        assert!(matches!(d.select_target(), Err(DispatchError::NoTargets)));

        let resp = d.forward("/api/courses", None).await;
        assert_eq!(resp.status.as_u16(), 503);
        let v: serde_json::Value = resp.json().unwrap();
        assert_eq!(v["error"], "Server unavailable: no backend targets configured");

        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::ForwardFailed);
        assert_eq!(ev.target, None);
    }

    #[tokio::test]
    async fn test_get_and_post_are_proxied() {
        let backend = spawn_backend(
            Router::new()
                .route(
                    "/api/courses",
                    get(|| async {
                        (
                            [("x-instance", "one"), ("proxy-connection", "keep-alive")],
                            r#"[{"id":1}]"#,
                        )
                    }),
                )
                .route(
                    "/api/enroll",
                    axum::routing::post(|headers: axum::http::HeaderMap, body: String| async move {
                        let ct = headers
                            .get("content-type")
                            .and_then(|v| v.to_str().ok())
                            .unwrap_or_default()
                            .to_owned();
                        (StatusCode::ACCEPTED, format!("{ct}|{body}"))
                    }),
                ),
        )
        .await;

        let bus = Bus::new(8);
        let mut rx = bus.subscribe();
        let d = dispatcher(&[&backend]).with_bus(bus);

        let resp = d.forward("/api/courses", None).await;
        assert_eq!(resp.status.as_u16(), 200);
        assert_eq!(&resp.body[..], br#"[{"id":1}]"#);
        assert_eq!(resp.header("x-instance"), Some("one"));
        assert!(resp.header("proxy-connection").is_none());
        assert!(resp.header("content-length").is_none());

        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::RequestForwarded);
        assert_eq!(ev.status, Some(200));
        assert_eq!(ev.path.as_deref(), Some("/api/courses"));

        let body = Bytes::from_static(br#"{"userId":1,"courseId":2,"priority":3}"#);
        let resp = d.forward("/api/enroll", Some(body)).await;
        assert_eq!(resp.status.as_u16(), 202);
        assert_eq!(
            &resp.body[..],
            br#"application/json|{"userId":1,"courseId":2,"priority":3}"#
        );
    }

    #[tokio::test]
    async fn test_backend_errors_pass_through() {
        let backend = spawn_backend(Router::new()).await;
        let d = dispatcher(&[&backend]);
        let resp = d.forward("/nope", None).await;
        assert_eq!(resp.status.as_u16(), 404);
    }

    #[tokio::test]
    async fn test_unreachable_target_degrades() {
        // bind then drop to get a port nobody listens on
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let bus = Bus::new(8);
        let mut rx = bus.subscribe();
        let d = Dispatcher::new(DispatcherConfig {
            servers: vec![format!("http://{addr}")],
            request_timeout_ms: 2_000,
            ..DispatcherConfig::default()
        })
        .unwrap()
        .with_bus(bus);

        let resp = tokio::time::timeout(Duration::from_secs(5), d.forward("/api/health", None))
            .await
            .unwrap();
        assert_eq!(resp.status.as_u16(), 503);
        assert_eq!(resp.header("content-type"), Some("application/json"));
        let v: serde_json::Value = resp.json().unwrap();
        assert!(v["error"].as_str().unwrap().starts_with("Server unavailable: "));

        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::ForwardFailed);
        assert_eq!(ev.target.as_deref(), Some(format!("http://{addr}").as_str()));
        assert_eq!(ev.status, Some(503));
    }

    #[tokio::test]
    async fn test_oversized_body_degrades() {
        let backend =
            spawn_backend(Router::new().route("/big", get(|| async { "x".repeat(4096) }))).await;
        let d = Dispatcher::new(DispatcherConfig {
            servers: vec![backend],
            max_body_bytes: 1024,
            ..DispatcherConfig::default()
        })
        .unwrap();

        let resp = d.forward("/big", None).await;
        assert_eq!(resp.status.as_u16(), 503);
        let v: serde_json::Value = resp.json().unwrap();
        assert_eq!(v["error"], "Server unavailable: response body exceeds 1024 bytes");
    }
}
