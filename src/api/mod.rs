//! API Module
//!
//! HTTP handlers and routing for the resource cache REST API.
//!
//! # Endpoints
//! - `GET /resolve/*key` - Resolve a resource through its strategy
//! - `GET|PUT|DELETE /entries/*key`, `DELETE /entries` - Manual cache access
//! - `GET|DELETE /stats` - Statistics
//! - `POST /events`, `POST /navigate`, `GET /predictions/*key` - Behavior and prefetch
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
