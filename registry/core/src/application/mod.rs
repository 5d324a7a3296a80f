// Copyright (c) 2026 Props Contributors
// SPDX-License-Identifier: AGPL-3.0

pub mod authentication;
pub mod audit_recorder;
pub mod registry_proxy;

pub use audit_recorder::{AuditRecorder, AuditToken};
pub use authentication::{parse_basic_auth, IdentityValidator};
pub use registry_proxy::RegistryProxyService;
