//! # HTTP surface (feature `server`).
//!
//! - [`instance_router`] exposes one [`Pipeline`](crate::Pipeline) under `/api`.
//! - [`edge_router`] exposes the [`Dispatcher`](crate::Dispatcher) under `/lb`.
//! - [`fleet`] wires N instances and the edge together in one process.
//!
//! JSON bodies use camelCase field names.

mod edge;
mod error;
pub mod fleet;
mod instance;

use std::future::Future;

use axum::Router;
use tokio::net::TcpListener;

pub use edge::edge_router;
pub use error::ApiError;
pub use fleet::{Fleet, FleetOptions, LoadReport};
pub use instance::{InstanceState, instance_router};

/// Serves `router` until `shutdown` resolves, then drains open connections.
pub async fn serve<F>(listener: TcpListener, router: Router, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
}
