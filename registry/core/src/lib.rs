// Copyright (c) 2026 Props Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Registry Proxy Core
//!
//! Access-controlled, audit-recording front for an OCI distribution registry.
//! Sandboxed agents reach shared image storage only through this proxy.
//!
//! # Architecture
//!
//! - **domain**: caller identities, references, the ACL matrix, audit records
//! - **application**: authentication, audit recording, request orchestration
//! - **infrastructure**: PostgreSQL identity store and audit table, upstream HTTP client
//! - **presentation**: the Axum router

pub mod domain;
pub mod application;
pub mod infrastructure;
pub mod presentation;

pub use domain::*;
