use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use crate::{
    admission::{AdmissionQueue, Adjustment, Admitted, QueueStatus},
    config::Config,
    enrollment::{EnrollmentOutcome, EnrollmentProcessor},
    error::RuntimeError,
    events::{Bus, Event, EventKind},
    model::EnrollmentRequest,
    store::EnrollmentStore,
    subscribers::SubscriberSet,
};

use super::PipelineBuilder;

/// One backend instance: admission queue, critical section and event plumbing.
pub struct Pipeline {
    cfg: Config,
    bus: Bus,
    queue: Arc<AdmissionQueue>,
    processor: EnrollmentProcessor,

    wake: Notify,
    idle: Notify,
    tracker: TaskTracker,
    token: CancellationToken,

    listener_token: CancellationToken,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl Pipeline {
    /// Returns a builder.
    pub fn builder(cfg: Config) -> PipelineBuilder {
        PipelineBuilder::new(cfg)
    }

    pub(super) fn new_internal(cfg: Config, bus: Bus, processor: EnrollmentProcessor) -> Self {
        let queue = Arc::new(AdmissionQueue::new(&cfg.adaptive));
        Self {
            cfg,
            bus,
            queue,
            processor,
            wake: Notify::new(),
            idle: Notify::new(),
            tracker: TaskTracker::new(),
            token: CancellationToken::new(),
            listener_token: CancellationToken::new(),
            listener: Mutex::new(None),
        }
    }

    /// Buffers a request and wakes the drain loop. Returns the queue depth.
    pub fn submit(&self, request: EnrollmentRequest) -> Result<usize, RuntimeError> {
        if self.token.is_cancelled() {
            return Err(RuntimeError::Closed);
        }
        let depth = self.queue.enqueue(request);
        self.bus.publish(
            Event::new(EventKind::RequestQueued)
                .with_request(&request)
                .with_queue_depth(depth),
        );
        self.wake.notify_one();
        Ok(depth)
    }

    pub fn status(&self) -> QueueStatus {
        self.queue.status()
    }

    /// Operator override of the concurrency limit (not clamped).
    pub fn set_limit(&self, limit: usize) {
        let previous = self.queue.set_limit(limit);
        tracing::info!(previous, limit, "concurrency limit overridden");
        self.bus.publish(
            Event::new(EventKind::LimitOverridden)
                .with_limit(limit)
                .with_reason(format!("from={previous}")),
        );
        self.wake.notify_one();
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    pub fn store(&self) -> &Arc<dyn EnrollmentStore> {
        self.processor.store()
    }

    /// Resolves once nothing is queued and nothing is in flight.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.queue.is_idle() {
                return;
            }
            notified.await;
        }
    }

    /// Stops admitting, drops queued requests and waits for in-flight work.
    ///
    /// With a grace period, returns [`RuntimeError::GraceExceeded`] if units are
    /// still running when it elapses. Subscribers are flushed either way.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        self.bus.publish(Event::new(EventKind::ShutdownRequested));
        self.token.cancel();
        self.tracker.close();

        let dropped = self.queue.clear();
        if dropped > 0 {
            tracing::info!(dropped, "discarding queued requests");
        }
        if self.queue.is_idle() {
            self.idle.notify_waiters();
        }

        let res = self.wait_all_with_grace().await;
        self.stop_listener().await;
        res
    }

    async fn wait_all_with_grace(&self) -> Result<(), RuntimeError> {
        let Some(grace) = self.cfg.grace() else {
            return Ok(());
        };
        match tokio::time::timeout(grace, self.tracker.wait()).await {
            Ok(()) => {
                self.bus.publish(Event::new(EventKind::AllStoppedWithin));
                Ok(())
            }
            Err(_) => {
                let in_flight = self.queue.in_flight();
                self.bus.publish(
                    Event::new(EventKind::GraceExceeded)
                        .with_reason(format!("in_flight={in_flight}")),
                );
                Err(RuntimeError::GraceExceeded { grace, in_flight })
            }
        }
    }

    /// Subscribes to the bus and forwards events to the subscriber set.
    pub(super) fn subscriber_listener(&self, subs: SubscriberSet) {
        if subs.is_empty() {
            return;
        }
        let handle = subs.listen(&self.bus, self.listener_token.clone());
        *self.listener.lock() = Some(handle);
    }

    async fn stop_listener(&self) {
        self.listener_token.cancel();
        let handle = self.listener.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    /// Admits as much as the limit allows every time it is woken.
    pub(super) async fn drain_loop(self: Arc<Self>) {
        loop {
            tokio::select! {
                biased;
                _ = self.token.cancelled() => break,
                _ = self.wake.notified() => {}
            }
            while !self.token.is_cancelled() {
                let Some(admitted) = self.queue.try_admit() else {
                    break;
                };
                self.spawn_unit(admitted);
            }
        }
    }

    fn spawn_unit(self: &Arc<Self>, admitted: Admitted) {
        let (request, permit) = admitted.into_parts();
        self.bus.publish(
            Event::new(EventKind::RequestAdmitted)
                .with_request(&request)
                .with_limit(self.queue.limit()),
        );

        let this = Arc::clone(self);
        self.tracker.spawn(async move {
            let started = Instant::now();
            let outcome = this.processor.process(&request).await;
            let elapsed = started.elapsed();

            let adj = this.queue.report_outcome(elapsed, outcome.is_success());
            this.publish_outcome(&request, &outcome, elapsed);
            this.publish_adjustment(adj, elapsed);
            // events go out before the slot frees, so `wait_idle` observers see them
            permit.release();

            this.wake.notify_one();
            if this.queue.is_idle() {
                this.idle.notify_waiters();
            }
        });
    }

    fn publish_outcome(&self, req: &EnrollmentRequest, outcome: &EnrollmentOutcome, d: Duration) {
        self.bus.publish(
            Event::new(outcome.event_kind())
                .with_request(req)
                .with_duration(d)
                .with_reason(outcome.reason()),
        );
    }

    fn publish_adjustment(&self, adj: Adjustment, d: Duration) {
        let kind = if adj.is_increase() {
            EventKind::LimitIncreased
        } else if adj.is_decrease() {
            EventKind::LimitDecreased
        } else {
            return;
        };
        self.bus.publish(
            Event::new(kind)
                .with_limit(adj.after)
                .with_reason(format!("from={}", adj.before))
                .with_queue_depth(self.queue.depth())
                .with_duration(d),
        );
    }
}
