// Copyright (c) 2026 Props Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Reference Classifier
//!
//! A manifest reference in a URL path is either an immutable content
//! [`Digest`] or a mutable [`Reference::Tag`]. The distinction decides who may
//! push: everyone allowed to publish may create content-addressed manifests,
//! only the admin may move tags.
//!
//! A segment is a digest iff it is `<algorithm>:<hex>` for a supported
//! algorithm, with lowercase hex of exactly the algorithm's length. Anything
//! else, including `sha256:` with the wrong length or uppercase hex, is a tag.

use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256, Sha512};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use thiserror::Error;

static DIGEST_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<algorithm>sha256|sha512):(?P<hex>[0-9a-f]+)$")
        .expect("digest pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
    Sha256,
    Sha512,
}

impl DigestAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            DigestAlgorithm::Sha256 => "sha256",
            DigestAlgorithm::Sha512 => "sha512",
        }
    }

    /// Number of hex characters in an encoded digest.
    pub fn hex_len(&self) -> usize {
        match self {
            DigestAlgorithm::Sha256 => 64,
            DigestAlgorithm::Sha512 => 128,
        }
    }

    fn hash_hex(&self, content: &[u8]) -> String {
        match self {
            DigestAlgorithm::Sha256 => hex::encode(Sha256::digest(content)),
            DigestAlgorithm::Sha512 => hex::encode(Sha512::digest(content)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("'{0}' is not a valid content digest")]
pub struct InvalidDigest(pub String);

/// Content hash of a manifest or blob, immutable by construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Digest {
    algorithm: DigestAlgorithm,
    hex: String,
}

impl Digest {
    /// Hash `content` with `algorithm`.
    pub fn compute(algorithm: DigestAlgorithm, content: &[u8]) -> Self {
        Self {
            algorithm,
            hex: algorithm.hash_hex(content),
        }
    }

    pub fn sha256(content: &[u8]) -> Self {
        Self::compute(DigestAlgorithm::Sha256, content)
    }

    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    pub fn hex(&self) -> &str {
        &self.hex
    }

    /// Whether `content` hashes to this digest.
    pub fn matches(&self, content: &[u8]) -> bool {
        self.algorithm.hash_hex(content) == self.hex
    }
}

impl FromStr for Digest {
    type Err = InvalidDigest;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let captures = DIGEST_PATTERN
            .captures(s)
            .ok_or_else(|| InvalidDigest(s.to_string()))?;
        let algorithm = match &captures["algorithm"] {
            "sha256" => DigestAlgorithm::Sha256,
            _ => DigestAlgorithm::Sha512,
        };
        let hex = &captures["hex"];
        if hex.len() != algorithm.hex_len() {
            return Err(InvalidDigest(s.to_string()));
        }
        Ok(Self {
            algorithm,
            hex: hex.to_string(),
        })
    }
}

impl TryFrom<String> for Digest {
    type Error = InvalidDigest;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Digest> for String {
    fn from(value: Digest) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm.as_str(), self.hex)
    }
}

/// A manifest reference taken from a request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    Tag(String),
    Digest(Digest),
}

impl Reference {
    /// Classify a path segment. Never fails: whatever is not a digest is a tag.
    pub fn classify(segment: &str) -> Self {
        match segment.parse::<Digest>() {
            Ok(digest) => Reference::Digest(digest),
            Err(_) => Reference::Tag(segment.to_string()),
        }
    }

    pub fn is_digest(&self) -> bool {
        matches!(self, Reference::Digest(_))
    }

    pub fn as_tag(&self) -> Option<&str> {
        match self {
            Reference::Tag(tag) => Some(tag),
            Reference::Digest(_) => None,
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reference::Tag(tag) => f.write_str(tag),
            Reference::Digest(digest) => digest.fmt(f),
        }
    }
}
