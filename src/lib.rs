// SPDX-License-Identifier: MIT OR Apache-2.0

//! vecstash - Text embedding and vector search service
//!
//! Shared modules for the vecstash HTTP server and CLI.

pub mod config;
pub mod embedding;
pub mod errors;
pub mod http;
pub mod ingest;
pub mod output;
pub mod service;
pub mod store;
