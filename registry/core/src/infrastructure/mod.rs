// Copyright (c) 2026 Props Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Infrastructure Layer
//!
//! Adapters for the domain ports: PostgreSQL for identities and audit rows,
//! HTTP for the upstream registry.

pub mod db;
pub mod identity;
pub mod repositories;
pub mod upstream;
