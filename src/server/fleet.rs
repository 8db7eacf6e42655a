//! # In-process fleet: N instances plus the edge, sharing one store.
//!
//! ```text
//!                      ┌──► instance :base+0 ──► Pipeline ─┐
//! load ──► Dispatcher ─┼──► instance :base+1 ──► Pipeline ─┼──► MemoryStore (shared)
//!          (edge :E)   └──► instance :base+N ──► Pipeline ─┘
//!
//! one Bus ──► SubscriberSet (LogWriter, OutcomeTally)
//! ```
//!
//! Port `0` picks ephemeral ports, which is what the tests use.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use futures::StreamExt;
use rand::Rng;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::error::{RuntimeError, StoreError};
use crate::events::Bus;
use crate::model::{Course, CourseId, EnrollmentRequest};
use crate::pipeline::Pipeline;
use crate::store::{EnrollmentStore, MemoryStore};
use crate::subscribers::{LogWriter, OutcomeTally, Subscribe, SubscriberSet, TallySnapshot};

use super::{InstanceState, edge_router, instance_router, serve};

/// Courses every fresh store starts with.
pub const SEED_COURSES: [(&str, u32); 3] = [
    ("Java Programming", 100),
    ("Spring Boot", 50),
    ("Database Design", 30),
];

/// Inserts [`SEED_COURSES`] into an empty store; leaves a populated one alone.
pub async fn seed_catalog(store: &dyn EnrollmentStore) -> Result<Vec<Course>, StoreError> {
    if store.courses().await?.is_empty() {
        for (name, capacity) in SEED_COURSES {
            store.insert_course(name, capacity).await?;
        }
        tracing::info!(count = SEED_COURSES.len(), "initial courses created");
    }
    store.courses().await
}

/// `n` requests for `course_id` with random users (1..=100000) and priorities (0..99).
pub fn random_requests<R: Rng>(
    n: usize,
    course_id: CourseId,
    rng: &mut R,
) -> Vec<EnrollmentRequest> {
    (0..n)
        .map(|_| {
            EnrollmentRequest::new(
                rng.random_range(1..=100_000),
                course_id,
                rng.random_range(0..99),
            )
        })
        .collect()
}

/// How the edge answered a burst of requests.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub sent: usize,
    pub accepted: usize,
    pub degraded: usize,
    pub other: usize,
}

/// Shape of a fleet.
#[derive(Clone, Debug)]
pub struct FleetOptions {
    pub host: IpAddr,
    pub instances: usize,
    pub base_port: u16,
    pub edge_port: u16,
    /// Requests in flight at once when firing load.
    pub load_concurrency: usize,
}

impl Default for FleetOptions {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            instances: 3,
            base_port: 8081,
            edge_port: 8080,
            load_concurrency: 64,
        }
    }
}

struct Instance {
    port: u16,
    pipeline: Arc<Pipeline>,
}

/// Running fleet. Stop it with [`Fleet::shutdown`].
pub struct Fleet {
    store: MemoryStore,
    instances: Vec<Instance>,
    dispatcher: Arc<Dispatcher>,
    edge_addr: SocketAddr,
    tally: Arc<OutcomeTally>,
    load_concurrency: usize,

    stop_servers: CancellationToken,
    servers: Vec<JoinHandle<std::io::Result<()>>>,
    stop_events: CancellationToken,
    events: JoinHandle<()>,
}

impl Fleet {
    /// Seeds a shared store, binds every instance and the edge, and starts serving.
    pub async fn start(cfg: &Config, opts: &FleetOptions) -> std::io::Result<Self> {
        let store = MemoryStore::new();
        seed_catalog(&store).await.map_err(std::io::Error::other)?;

        let bus = Bus::new(cfg.bus_capacity_clamped());
        let tally = Arc::new(OutcomeTally::new());
        let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new()), tally.clone()];
        let stop_events = CancellationToken::new();
        let events = SubscriberSet::new(subs, bus.clone()).listen(&bus, stop_events.clone());

        let stop_servers = CancellationToken::new();
        let mut servers = Vec::with_capacity(opts.instances + 1);
        let mut instances = Vec::with_capacity(opts.instances);
        let mut targets = Vec::with_capacity(opts.instances);

        for i in 0..opts.instances {
            let port = match opts.base_port {
                0 => 0,
                base => base.saturating_add(i as u16),
            };
            let listener = TcpListener::bind(SocketAddr::new(opts.host, port)).await?;
            let addr = listener.local_addr()?;

            let pipeline = Pipeline::builder(cfg.clone())
                .with_store(Arc::new(store.clone()))
                .with_bus(bus.clone())
                .build();
            let app = instance_router(InstanceState {
                pipeline: pipeline.clone(),
                port: addr.port(),
            });
            servers.push(tokio::spawn(serve(
                listener,
                app,
                stop_servers.clone().cancelled_owned(),
            )));
            tracing::info!(%addr, "instance listening");

            targets.push(format!("http://{addr}"));
            instances.push(Instance {
                port: addr.port(),
                pipeline,
            });
        }

        let mut dcfg = cfg.dispatcher.clone();
        dcfg.servers = targets;
        let dispatcher = Arc::new(
            Dispatcher::new(dcfg)
                .map_err(std::io::Error::other)?
                .with_bus(bus.clone()),
        );

        let listener = TcpListener::bind(SocketAddr::new(opts.host, opts.edge_port)).await?;
        let edge_addr = listener.local_addr()?;
        servers.push(tokio::spawn(serve(
            listener,
            edge_router(dispatcher.clone()),
            stop_servers.clone().cancelled_owned(),
        )));
        tracing::info!(addr = %edge_addr, instances = instances.len(), "edge listening");

        Ok(Self {
            store,
            instances,
            dispatcher,
            edge_addr,
            tally,
            load_concurrency: opts.load_concurrency.max(1),
            stop_servers,
            servers,
            stop_events,
            events,
        })
    }

    pub fn edge_url(&self) -> String {
        format!("http://{}", self.edge_addr)
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    /// Outcome counters collected from every instance.
    pub fn tally(&self) -> TallySnapshot {
        self.tally.snapshot()
    }

    /// Sends `requests` through the dispatcher (round-robin over the instances).
    pub async fn fire(&self, requests: Vec<EnrollmentRequest>) -> LoadReport {
        let sent = requests.len();
        let dispatcher = &self.dispatcher;
        let statuses: Vec<u16> = futures::stream::iter(requests)
            .map(|req| async move {
                match serde_json::to_vec(&req) {
                    Ok(body) => dispatcher
                        .forward("/api/enroll", Some(body.into()))
                        .await
                        .status
                        .as_u16(),
                    Err(_) => 0,
                }
            })
            .buffer_unordered(self.load_concurrency)
            .collect()
            .await;

        let mut report = LoadReport {
            sent,
            ..LoadReport::default()
        };
        for status in statuses {
            match status {
                200..=299 => report.accepted += 1,
                503 => report.degraded += 1,
                _ => report.other += 1,
            }
        }
        tracing::info!(?report, "load finished");
        report
    }

    /// Resolves once every instance has drained.
    pub async fn wait_idle(&self) {
        for instance in &self.instances {
            instance.pipeline.wait_idle().await;
        }
    }

    /// Logs each instance's queue status and the course table.
    pub async fn log_summary(&self) -> Result<(), StoreError> {
        for instance in &self.instances {
            let s = instance.pipeline.status();
            tracing::info!(
                port = instance.port,
                limit = s.max_concurrent_requests,
                processed = s.processed_count,
                ema_ms = s.ema_latency_ms,
                failures = s.consecutive_failures,
                "instance status"
            );
        }
        for course in self.store.courses().await? {
            tracing::info!(
                id = course.id(),
                name = course.name(),
                enrolled = course.current_enrollment(),
                capacity = course.capacity(),
                "course"
            );
        }
        let t = self.tally();
        tracing::info!(
            succeeded = t.succeeded,
            full = t.rejected_full,
            duplicate = t.rejected_duplicate,
            failed = t.failed,
            "outcomes"
        );
        Ok(())
    }

    /// Stops the listeners, shuts every pipeline down and flushes subscribers.
    ///
    /// Returns the first pipeline error, after all of them were asked to stop.
    pub async fn shutdown(self) -> Result<(), RuntimeError> {
        self.stop_servers.cancel();
        for server in self.servers {
            match server.await {
                Ok(Err(err)) => tracing::warn!(error = %err, "server exited with error"),
                Err(err) => tracing::warn!(error = %err, "server task failed"),
                Ok(Ok(())) => {}
            }
        }

        let mut first_err = None;
        for instance in &self.instances {
            if let Err(err) = instance.pipeline.shutdown().await {
                tracing::error!(port = instance.port, error = %err, "instance shutdown");
                first_err.get_or_insert(err);
            }
        }

        self.stop_events.cancel();
        let _ = self.events.await;
        first_err.map_or(Ok(()), Err)
    }
}
