//! Protocol adapters over the shared [`Endpoints`](crate::server::endpoint::Endpoints).
//!
//! - [`http`] - JSON over HTTP/1.1 (axum).
//! - [`grpc`] - The `watermark.Watermark` gRPC service (tonic).
//!
//! Both adapters build a [`RequestContext`](watermark_core::context::RequestContext)
//! per call from a child of the process shutdown token and the optional
//! `traceparent` carried by the request.

pub mod grpc;
pub mod http;
