//! Request and Response models for the resource cache API
//!
//! This module defines the DTOs (Data Transfer Objects) used for
//! serializing/deserializing HTTP request and response bodies.

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::{NavigateRequest, PredictionsQuery, PutQuery, RecordEventRequest, ResolveQuery};
pub use responses::{
    ClearResponse, HealthResponse, InvalidateResponse, MessageResponse, NavigateResponse,
    PredictionsResponse, StatsResponse,
};
