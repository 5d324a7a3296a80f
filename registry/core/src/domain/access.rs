// Copyright (c) 2026 Props Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # ACL Enforcer
//!
//! Decides `(caller, operation) → Allow | Deny`. Default deny: only the
//! operations recognised by [`RegistryOperation::parse`] can ever be allowed.
//!
//! `DELETE` is refused for every caller, admin included, before the ACL table
//! is consulted. Deleting content would leave audit rows pointing at nothing.

use crate::domain::caller::CallerIdentity;
use crate::domain::operation::RegistryOperation;
use crate::domain::reference::Reference;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    Allow,
    Deny(String),
}

impl AccessDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AccessDecision::Allow)
    }
}

/// What an operation requires of its caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Requirement {
    Authenticated,
    Read,
    Push,
    PushTag,
    Never,
}

fn requirement_for(operation: &RegistryOperation) -> Requirement {
    match operation {
        RegistryOperation::Delete | RegistryOperation::Unrecognized => Requirement::Never,
        RegistryOperation::ApiVersionCheck => Requirement::Authenticated,
        RegistryOperation::Catalog
        | RegistryOperation::TagList { .. }
        | RegistryOperation::ManifestRead { .. }
        | RegistryOperation::BlobRead { .. } => Requirement::Read,
        RegistryOperation::BlobUploadStart { .. }
        | RegistryOperation::BlobUploadChunk { .. }
        | RegistryOperation::BlobUploadComplete { .. } => Requirement::Push,
        RegistryOperation::ManifestPush { reference, .. } => match reference {
            Reference::Digest(_) => Requirement::Push,
            Reference::Tag(_) => Requirement::PushTag,
        },
    }
}

/// Evaluate the ACL matrix for one request.
pub fn evaluate(caller: &CallerIdentity, operation: &RegistryOperation) -> AccessDecision {
    if matches!(operation, RegistryOperation::Delete) {
        return AccessDecision::Deny("DELETE operations are forbidden".to_string());
    }

    match requirement_for(operation) {
        Requirement::Never => AccessDecision::Deny("operation not allowed".to_string()),
        Requirement::Authenticated => AccessDecision::Allow,
        Requirement::Read if caller.can_read() => AccessDecision::Allow,
        Requirement::Read => {
            AccessDecision::Deny(format!("{} not allowed to read", caller.label()))
        }
        Requirement::Push if caller.can_push() => AccessDecision::Allow,
        Requirement::Push => {
            AccessDecision::Deny(format!("{} not allowed to push", caller.label()))
        }
        Requirement::PushTag if caller.can_push_tags() => AccessDecision::Allow,
        Requirement::PushTag if caller.can_push() => {
            AccessDecision::Deny(format!("{} not allowed to push by tag", caller.label()))
        }
        Requirement::PushTag => {
            AccessDecision::Deny(format!("{} not allowed to push", caller.label()))
        }
    }
}
