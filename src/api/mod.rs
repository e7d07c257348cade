//! API Module
//!
//! Admin HTTP surface a host can mount next to its own routes.
//!
//! # Endpoints
//! - `POST /invalidate` - Purge one or more models
//! - `DELETE /cache` - Drop every stored entry
//! - `GET /stats` - Routing counters and entry count
//! - `GET /health` - Health and caching mode

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
