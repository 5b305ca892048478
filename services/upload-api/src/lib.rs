//! HTTP surface of Brain Intake: synchronous uploads gated by the brain quota,
//! plus routes that queue file and crawl jobs for the ingest worker.

pub mod api;
pub mod auth;
pub mod config;
pub mod server;
