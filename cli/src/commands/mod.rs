// Copyright (c) 2026 Props Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the registry-proxy CLI

pub mod config;
pub mod migrate;

pub use self::config::ConfigCommand;
pub use self::migrate::MigrateCommand;
