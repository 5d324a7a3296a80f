// Copyright (c) 2026 Props Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Registry Operations
//!
//! Recognises the subset of the OCI distribution API the proxy relays. Any
//! method/path combination not listed here parses to
//! [`RegistryOperation::Unrecognized`] and is denied by default.
//!
//! | Method | Path | Operation |
//! |--------|------|-----------|
//! | GET, HEAD | `/v2/` | `ApiVersionCheck` |
//! | GET | `/v2/_catalog` | `Catalog` |
//! | GET | `/v2/<repo>/tags/list` | `TagList` |
//! | GET, HEAD | `/v2/<repo>/manifests/<ref>` | `ManifestRead` |
//! | GET, HEAD | `/v2/<repo>/blobs/<digest>` | `BlobRead` |
//! | POST | `/v2/<repo>/blobs/uploads/` | `BlobUploadStart` |
//! | PATCH | `/v2/<repo>/blobs/uploads/<id>` | `BlobUploadChunk` |
//! | PUT | `/v2/<repo>/blobs/uploads/<id>?digest=` | `BlobUploadComplete` |
//! | PUT | `/v2/<repo>/manifests/<ref>` | `ManifestPush` |
//! | DELETE | anything | `Delete` |

use axum::http::{Method, Uri};

use crate::domain::reference::Reference;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryOperation {
    ApiVersionCheck,
    Catalog,
    TagList {
        repository: String,
    },
    ManifestRead {
        repository: String,
        reference: Reference,
    },
    BlobRead {
        repository: String,
        digest: String,
    },
    BlobUploadStart {
        repository: String,
    },
    BlobUploadChunk {
        repository: String,
        upload_id: String,
    },
    BlobUploadComplete {
        repository: String,
        upload_id: String,
        digest: Option<String>,
    },
    ManifestPush {
        repository: String,
        reference: Reference,
    },
    Delete,
    Unrecognized,
}

impl RegistryOperation {
    pub fn parse(method: &Method, uri: &Uri) -> Self {
        if method == Method::DELETE {
            return RegistryOperation::Delete;
        }

        let Some(rest) = uri.path().strip_prefix("/v2") else {
            return RegistryOperation::Unrecognized;
        };
        if rest.is_empty() || rest == "/" {
            return match *method {
                Method::GET | Method::HEAD => RegistryOperation::ApiVersionCheck,
                _ => RegistryOperation::Unrecognized,
            };
        }
        let Some(rest) = rest.strip_prefix('/') else {
            return RegistryOperation::Unrecognized;
        };

        let segments: Vec<&str> = rest.split('/').collect();
        if let Some(repo) = segments.first() {
            if segments.len() > 1 && !is_valid_segment(repo) {
                return RegistryOperation::Unrecognized;
            }
        }

        match (method.clone(), segments.as_slice()) {
            (Method::GET, ["_catalog"]) => RegistryOperation::Catalog,
            (Method::GET, [repo, "tags", "list"]) => RegistryOperation::TagList {
                repository: repo.to_string(),
            },
            (Method::GET | Method::HEAD, [repo, "manifests", reference])
                if is_valid_segment(reference) =>
            {
                RegistryOperation::ManifestRead {
                    repository: repo.to_string(),
                    reference: Reference::classify(reference),
                }
            }
            (Method::GET | Method::HEAD, [repo, "blobs", digest]) if is_valid_segment(digest) => {
                RegistryOperation::BlobRead {
                    repository: repo.to_string(),
                    digest: digest.to_string(),
                }
            }
            (Method::POST, [repo, "blobs", "uploads"] | [repo, "blobs", "uploads", ""]) => {
                RegistryOperation::BlobUploadStart {
                    repository: repo.to_string(),
                }
            }
            (Method::PATCH, [repo, "blobs", "uploads", id]) if is_valid_segment(id) => {
                RegistryOperation::BlobUploadChunk {
                    repository: repo.to_string(),
                    upload_id: id.to_string(),
                }
            }
            (Method::PUT, [repo, "blobs", "uploads", id]) if is_valid_segment(id) => {
                RegistryOperation::BlobUploadComplete {
                    repository: repo.to_string(),
                    upload_id: id.to_string(),
                    digest: query_param(uri, "digest"),
                }
            }
            (Method::PUT, [repo, "manifests", reference]) if is_valid_segment(reference) => {
                RegistryOperation::ManifestPush {
                    repository: repo.to_string(),
                    reference: Reference::classify(reference),
                }
            }
            _ => RegistryOperation::Unrecognized,
        }
    }

    /// Stable label for logs and metrics.
    pub fn name(&self) -> &'static str {
        match self {
            RegistryOperation::ApiVersionCheck => "api_version_check",
            RegistryOperation::Catalog => "catalog",
            RegistryOperation::TagList { .. } => "tag_list",
            RegistryOperation::ManifestRead { .. } => "manifest_read",
            RegistryOperation::BlobRead { .. } => "blob_read",
            RegistryOperation::BlobUploadStart { .. } => "blob_upload_start",
            RegistryOperation::BlobUploadChunk { .. } => "blob_upload_chunk",
            RegistryOperation::BlobUploadComplete { .. } => "blob_upload_complete",
            RegistryOperation::ManifestPush { .. } => "manifest_push",
            RegistryOperation::Delete => "delete",
            RegistryOperation::Unrecognized => "unrecognized",
        }
    }

    pub fn repository(&self) -> Option<&str> {
        match self {
            RegistryOperation::TagList { repository }
            | RegistryOperation::ManifestRead { repository, .. }
            | RegistryOperation::BlobRead { repository, .. }
            | RegistryOperation::BlobUploadStart { repository }
            | RegistryOperation::BlobUploadChunk { repository, .. }
            | RegistryOperation::BlobUploadComplete { repository, .. }
            | RegistryOperation::ManifestPush { repository, .. } => Some(repository),
            RegistryOperation::ApiVersionCheck
            | RegistryOperation::Catalog
            | RegistryOperation::Delete
            | RegistryOperation::Unrecognized => None,
        }
    }
}

fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty() && segment != "." && segment != ".."
}

fn query_param(uri: &Uri, name: &str) -> Option<String> {
    let query = uri.query()?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(method: Method, uri: &str) -> RegistryOperation {
        RegistryOperation::parse(&method, &uri.parse::<Uri>().unwrap())
    }

    #[test]
    fn test_delete_on_any_path() {
        assert_eq!(parse(Method::DELETE, "/v2/critic/manifests/latest"), RegistryOperation::Delete);
        assert_eq!(parse(Method::DELETE, "/v2/"), RegistryOperation::Delete);
        assert_eq!(parse(Method::DELETE, "/anything"), RegistryOperation::Delete);
    }

    #[test]
    fn test_reads() {
        assert_eq!(parse(Method::GET, "/v2/"), RegistryOperation::ApiVersionCheck);
        assert_eq!(parse(Method::HEAD, "/v2"), RegistryOperation::ApiVersionCheck);
        assert_eq!(parse(Method::GET, "/v2/_catalog"), RegistryOperation::Catalog);
        assert_eq!(
            parse(Method::GET, "/v2/critic/tags/list"),
            RegistryOperation::TagList { repository: "critic".into() }
        );
        assert_eq!(
            parse(Method::HEAD, "/v2/critic/manifests/latest"),
            RegistryOperation::ManifestRead {
                repository: "critic".into(),
                reference: Reference::Tag("latest".into()),
            }
        );
        assert_eq!(
            parse(Method::GET, "/v2/grader/blobs/sha256:abc"),
            RegistryOperation::BlobRead { repository: "grader".into(), digest: "sha256:abc".into() }
        );
    }

    #[test]
    fn test_upload_sequence() {
        assert_eq!(
            parse(Method::POST, "/v2/critic/blobs/uploads/"),
            RegistryOperation::BlobUploadStart { repository: "critic".into() }
        );
        assert_eq!(
            parse(Method::PATCH, "/v2/critic/blobs/uploads/abc-123?_state=xyz"),
            RegistryOperation::BlobUploadChunk {
                repository: "critic".into(),
                upload_id: "abc-123".into()
            }
        );
        assert_eq!(
            parse(Method::PUT, "/v2/critic/blobs/uploads/abc-123?_state=xyz&digest=sha256%3Aabc"),
            RegistryOperation::BlobUploadComplete {
                repository: "critic".into(),
                upload_id: "abc-123".into(),
                digest: Some("sha256:abc".into()),
            }
        );
        assert_eq!(
            parse(Method::PUT, "/v2/critic/blobs/uploads/abc-123"),
            RegistryOperation::BlobUploadComplete {
                repository: "critic".into(),
                upload_id: "abc-123".into(),
                digest: None,
            }
        );
    }

    #[test]
    fn test_manifest_push() {
        assert_eq!(
            parse(Method::PUT, "/v2/prompt-optimizer/manifests/v1"),
            RegistryOperation::ManifestPush {
                repository: "prompt-optimizer".into(),
                reference: Reference::Tag("v1".into()),
            }
        );
    }

    #[test]
    fn test_unrecognized_defaults() {
        for (method, uri) in [
            (Method::GET, "/"),
            (Method::GET, "/v3/critic/manifests/latest"),
            (Method::GET, "/v2/org/critic/manifests/latest"),
            (Method::GET, "/v2//manifests/latest"),
            (Method::GET, "/v2/../manifests/latest"),
            (Method::GET, "/v2/critic/blobs/uploads/abc"),
            (Method::POST, "/v2/"),
            (Method::POST, "/v2/critic/manifests/latest"),
            (Method::PATCH, "/v2/critic/blobs/uploads/"),
            (Method::PUT, "/v2/critic/manifests/"),
            (Method::OPTIONS, "/v2/critic/manifests/latest"),
            (Method::GET, "/v2extra"),
        ] {
            assert_eq!(
                parse(method.clone(), uri),
                RegistryOperation::Unrecognized,
                "{} {}",
                method,
                uri
            );
        }
    }
}
