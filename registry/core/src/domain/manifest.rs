// Copyright (c) 2026 Props Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Minimal views over OCI manifest and image-config JSON, only as much as the
//! audit trail needs to find a pushed image's parent.

use serde::Deserialize;
use std::collections::HashMap;

use crate::domain::reference::Digest;

/// Label carrying the digest of the image this one was built on.
pub const BASE_DIGEST_LABEL: &str = "org.opencontainers.image.base.digest";

#[derive(Debug, Deserialize)]
struct ManifestView {
    config: Option<DescriptorView>,
}

#[derive(Debug, Deserialize)]
struct DescriptorView {
    digest: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ImageConfigView {
    config: Option<ContainerConfigView>,
}

#[derive(Debug, Deserialize)]
struct ContainerConfigView {
    #[serde(rename = "Labels")]
    labels: Option<HashMap<String, String>>,
}

/// Digest of the image config blob referenced by a manifest, if the body is
/// an image manifest with a well-formed config descriptor.
pub fn config_digest(manifest_body: &[u8]) -> Option<Digest> {
    let manifest: ManifestView = serde_json::from_slice(manifest_body).ok()?;
    manifest.config?.digest?.parse().ok()
}

/// Value of [`BASE_DIGEST_LABEL`] in an image config blob.
pub fn base_digest_label(config_blob: &[u8]) -> Option<String> {
    let config: ImageConfigView = serde_json::from_slice(config_blob).ok()?;
    config.config?.labels?.remove(BASE_DIGEST_LABEL)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_config_digest_from_image_manifest() {
        let config = Digest::sha256(b"config");
        let manifest = json!({
            "schemaVersion": 2,
            "mediaType": "application/vnd.oci.image.manifest.v1+json",
            "config": {
                "mediaType": "application/vnd.oci.image.config.v1+json",
                "digest": config.to_string(),
                "size": 6
            },
            "layers": []
        });
        assert_eq!(config_digest(manifest.to_string().as_bytes()), Some(config));
    }

    #[test]
    fn test_config_digest_absent_for_index_or_garbage() {
        let index = json!({ "schemaVersion": 2, "manifests": [] });
        assert_eq!(config_digest(index.to_string().as_bytes()), None);
        assert_eq!(config_digest(b"not json"), None);
        let bad = json!({ "config": { "digest": "sha256:short" } });
        assert_eq!(config_digest(bad.to_string().as_bytes()), None);
    }

    #[test]
    fn test_base_digest_label() {
        let blob = json!({
            "architecture": "amd64",
            "config": {
                "Labels": { "org.opencontainers.image.base.digest": "sha256:abc", "other": "x" }
            }
        });
        assert_eq!(
            base_digest_label(blob.to_string().as_bytes()),
            Some("sha256:abc".to_string())
        );

        let unlabeled = json!({ "config": { "Labels": null } });
        assert_eq!(base_digest_label(unlabeled.to_string().as_bytes()), None);
    }
}
