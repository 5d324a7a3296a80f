// Copyright (c) 2026 Props Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Registry namespace: one repository per [`AgentKind`], named after it.
//!
//! This is the only place the mapping is defined. Agents can never introduce
//! a repository the mapping does not name.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::domain::caller::AgentKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepositoryName(AgentKind);

impl RepositoryName {
    pub fn for_kind(kind: AgentKind) -> Self {
        Self(kind)
    }

    /// The artifact kind stored in this repository.
    pub fn kind(&self) -> AgentKind {
        self.0
    }

    pub fn as_str(&self) -> &'static str {
        self.0.as_str()
    }

    pub fn all() -> impl Iterator<Item = RepositoryName> {
        AgentKind::ALL.into_iter().map(RepositoryName)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown repository '{0}'")]
pub struct UnknownRepository(pub String);

impl FromStr for RepositoryName {
    type Err = UnknownRepository;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RepositoryName::all()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| UnknownRepository(s.to_string()))
    }
}

impl TryFrom<String> for RepositoryName {
    type Error = UnknownRepository;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RepositoryName> for String {
    fn from(value: RepositoryName) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for RepositoryName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
