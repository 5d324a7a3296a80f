// Copyright (c) 2026 Props Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Caller Identity
//!
//! Who is making a registry request, recomputed for every request and never
//! stored as a session.
//!
//! An agent's [`AgentKind`] is resolved from its run id by the identity store.
//! The client only ever supplies a username and secret, so a compromised agent
//! cannot claim a more privileged kind than the one it was launched as.
//!
//! | Caller | Read | Push by digest | Push by tag |
//! |--------|------|----------------|-------------|
//! | `Admin` | ✓ | ✓ | ✓ |
//! | `Agent` (publishing kind) | ✓ | ✓ | ✗ |
//! | `Agent` (non-publishing kind) | ✗ | ✗ | ✗ |

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Identifier of an agent run, as issued by the evaluation workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The closed set of agent kinds the evaluation workflow launches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AgentKind {
    Critic,
    Grader,
    PromptOptimizer,
    Improvement,
}

impl AgentKind {
    pub const ALL: [AgentKind; 4] = [
        AgentKind::Critic,
        AgentKind::Grader,
        AgentKind::PromptOptimizer,
        AgentKind::Improvement,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentKind::Critic => "critic",
            AgentKind::Grader => "grader",
            AgentKind::PromptOptimizer => "prompt-optimizer",
            AgentKind::Improvement => "improvement",
        }
    }

    /// Whether agents of this kind may read from and publish to the registry.
    pub fn can_publish(&self) -> bool {
        match self {
            AgentKind::PromptOptimizer | AgentKind::Improvement => true,
            AgentKind::Critic | AgentKind::Grader => false,
        }
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown agent kind: {0}")]
pub struct UnknownAgentKind(pub String);

impl FromStr for AgentKind {
    type Err = UnknownAgentKind;

    /// Accepts both the kebab-case wire names and the snake_case spelling the
    /// run table stores.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "critic" => Ok(AgentKind::Critic),
            "grader" => Ok(AgentKind::Grader),
            "prompt-optimizer" | "prompt_optimizer" => Ok(AgentKind::PromptOptimizer),
            "improvement" => Ok(AgentKind::Improvement),
            other => Err(UnknownAgentKind(other.to_string())),
        }
    }
}

/// Authenticated caller of a single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "caller_type", rename_all = "snake_case")]
pub enum CallerIdentity {
    Admin,
    Agent { run_id: RunId, kind: AgentKind },
}

impl CallerIdentity {
    pub fn can_read(&self) -> bool {
        match self {
            CallerIdentity::Admin => true,
            CallerIdentity::Agent { kind, .. } => kind.can_publish(),
        }
    }

    pub fn can_push(&self) -> bool {
        match self {
            CallerIdentity::Admin => true,
            CallerIdentity::Agent { kind, .. } => kind.can_publish(),
        }
    }

    /// Mutable tags have a single writer.
    pub fn can_push_tags(&self) -> bool {
        match self {
            CallerIdentity::Admin => true,
            CallerIdentity::Agent { .. } => false,
        }
    }

    pub fn run_id(&self) -> Option<RunId> {
        match self {
            CallerIdentity::Admin => None,
            CallerIdentity::Agent { run_id, .. } => Some(*run_id),
        }
    }

    /// Short label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            CallerIdentity::Admin => "admin",
            CallerIdentity::Agent { kind, .. } => kind.as_str(),
        }
    }
}

impl fmt::Display for CallerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallerIdentity::Admin => f.write_str("admin"),
            CallerIdentity::Agent { run_id, kind } => write!(f, "{}({})", kind, run_id),
        }
    }
}

/// Principal implied by the shape of a username, before the identity store
/// has been consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Principal {
    Admin,
    Agent(RunId),
}

/// Username conventions shared with the credential-issuance side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsernamePolicy {
    pub admin_username: String,
    pub agent_prefix: String,
}

impl Default for UsernamePolicy {
    fn default() -> Self {
        Self {
            admin_username: "postgres".to_string(),
            agent_prefix: "agent_".to_string(),
        }
    }
}

impl UsernamePolicy {
    /// Classify a username by shape alone. `None` means the username can never
    /// authenticate, whatever its secret.
    pub fn principal_for(&self, username: &str) -> Option<Principal> {
        if username == self.admin_username {
            return Some(Principal::Admin);
        }
        let run_id = username.strip_prefix(self.agent_prefix.as_str())?;
        Uuid::parse_str(run_id).ok().map(|id| Principal::Agent(RunId(id)))
    }
}

/// Reasons a credential fails to resolve to a caller.
///
/// Only ever logged. Callers see a single generic rejection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassificationError {
    #[error("agent run {0} not found")]
    UnknownRun(RunId),

    #[error("agent run {run_id} has unrecognised kind '{kind}'")]
    UnrecognisedKind { run_id: RunId, kind: String },
}

/// Resolve a validated principal to a caller, given the kind stored for its
/// run (if any).
pub fn classify_caller(
    principal: Principal,
    stored_kind: Option<&str>,
) -> Result<CallerIdentity, ClassificationError> {
    match principal {
        Principal::Admin => Ok(CallerIdentity::Admin),
        Principal::Agent(run_id) => {
            let raw = stored_kind.ok_or(ClassificationError::UnknownRun(run_id))?;
            let kind = raw.parse::<AgentKind>().map_err(|_| ClassificationError::UnrecognisedKind {
                run_id,
                kind: raw.to_string(),
            })?;
            Ok(CallerIdentity::Agent { run_id, kind })
        }
    }
}
