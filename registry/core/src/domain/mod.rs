// Copyright (c) 2026 Props Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Domain Layer
//!
//! Pure policy and value types. Nothing in here performs I/O; persistence and
//! upstream access are expressed as traits implemented in `crate::infrastructure`.

pub mod caller;
pub mod repository_name;
pub mod reference;
pub mod operation;
pub mod access;
pub mod audit;
pub mod manifest;
pub mod identity;
pub mod repository;
pub mod upstream;
pub mod errors;
pub mod proxy_config;
