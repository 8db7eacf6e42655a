//! # Round-robin edge dispatcher.
//!
//! [`Dispatcher`] sits in front of a fixed set of pipeline instances and
//! forwards each call to the next one in turn.
//!
//! ```text
//! forward(path, body?)
//!   ├─ select_target()      cursor = (cursor + 1) mod N   (atomic)
//!   ├─ POST (json) | GET    reqwest, per-call timeout
//!   ├─ buffer body          <= max_body_bytes
//!   └─ sanitize headers     drop hop-by-hop + framing
//!
//! any failure ─► 503 {"error":"Server unavailable: <detail>"}
//! ```
//!
//! Backend replies are returned as-is, including non-2xx statuses. Only
//! transport-level problems are replaced by the synthetic response.

mod dispatcher;
mod response;

pub use dispatcher::Dispatcher;
pub use response::{HOP_BY_HOP_HEADERS, ProxyResponse, is_hop_by_hop, sanitize_headers};
