//! HTTP networking module
//!
//! Provides the client used to reach the hosted notes backend.

mod client;

pub use client::{BackendClient, BackendRequest, BackendResponse, HttpMethod};
