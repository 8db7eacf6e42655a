//! # Contention Example
//!
//! Floods one small course with concurrent enrollments and shows that it
//! never oversells, while the adaptive limiter moves the concurrency window.
//!
//! The example prints:
//! - Every limit change (via a custom subscriber)
//! - The outcome tally
//! - The final queue status and course occupancy
//!
//! ## Run
//! ```bash
//! cargo run --example fleet
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use seatvisor::{
    Config, EnrollmentRequest, EnrollmentStore, Event, EventKind, MemoryStore, OutcomeTally,
    Pipeline, Subscribe,
};

const SEATS: u32 = 30;
const USERS: u64 = 500;

#[derive(Default)]
struct LimitWatcher {
    moves: AtomicU64,
}

#[async_trait]
impl Subscribe for LimitWatcher {
    async fn on_event(&self, ev: &Event) {
        let arrow = match ev.kind {
            EventKind::LimitIncreased => "▲",
            EventKind::LimitDecreased => "▼",
            EventKind::LimitOverridden => "■",
            _ => return,
        };
        self.moves.fetch_add(1, Ordering::Relaxed);
        println!(
            " {arrow} limit={} depth={} ({})",
            ev.limit.unwrap_or_default(),
            ev.queue_depth.unwrap_or_default(),
            ev.reason.as_deref().unwrap_or("-"),
        );
    }

    fn name(&self) -> &'static str {
        "limit-watcher"
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let store = MemoryStore::new();
    let course = store.insert_course("Database Design", SEATS).await?;

    let mut cfg = Config::default();
    cfg.adaptive.min_concurrent = 4;
    cfg.adaptive.max_concurrent = 64;

    let watcher = Arc::new(LimitWatcher::default());
    let tally = Arc::new(OutcomeTally::new());
    let subs: Vec<Arc<dyn Subscribe>> = vec![watcher.clone(), tally.clone()];

    let pipeline = Pipeline::builder(cfg)
        .with_store(Arc::new(store.clone()))
        .with_subscribers(subs)
        .build();

    println!("Submitting {USERS} requests for {SEATS} seats...");
    let mut handles = Vec::new();
    for chunk in 0..4u64 {
        let p = pipeline.clone();
        let course_id = course.id();
        handles.push(tokio::spawn(async move {
            for user in (chunk * USERS / 4 + 1)..=((chunk + 1) * USERS / 4) {
                let priority = (user % 10) as i32;
                if p.submit(EnrollmentRequest::new(user, course_id, priority)).is_err() {
                    break;
                }
            }
        }));
    }
    for h in handles {
        h.await?;
    }

    // Widen the window by hand while the backlog drains.
    pipeline.set_limit(48);
    pipeline.wait_idle().await;

    let status = pipeline.status();
    pipeline.shutdown().await?;

    let t = tally.snapshot();
    let course = store
        .course(course.id())
        .await?
        .ok_or("course disappeared")?;

    println!();
    println!("Outcomes:");
    println!(" ├─► Enrolled:          {}", t.succeeded);
    println!(" ├─► Course full:       {}", t.rejected_full);
    println!(" ├─► Already enrolled:  {}", t.rejected_duplicate);
    println!(" ├─► Failed:            {}", t.failed);
    println!(" └─► Limit moves:       {}", watcher.moves.load(Ordering::Relaxed));
    println!();
    println!("Queue status: {}", serde_json::to_string_pretty(&status)?);
    println!(
        "Course '{}': {}/{} seats taken",
        course.name(),
        course.current_enrollment(),
        course.capacity()
    );
    assert!(course.current_enrollment() <= course.capacity());
    Ok(())
}
