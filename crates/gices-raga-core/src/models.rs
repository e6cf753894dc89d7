//! Core data models for evidence retrieval and artifact sealing.
//!
//! [`Fragment`] is the unit of retrievable normative text. [`Manifest`] and
//! [`ArtifactRecord`] describe a sealed audit package and match the JSON
//! layout of `evidence_manifest.json`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reasons a fragment is rejected at construction or deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FragmentError {
    #[error("fragment page must be >= 1")]
    ZeroPage,
    #[error("fragment content is empty")]
    EmptyContent,
    #[error("fragment source is empty")]
    EmptySource,
}

/// One page-scoped chunk of extracted document text.
///
/// Fields are private: a `Fragment` can only be built through
/// [`Fragment::new`] (or deserialized through the same checks), so every
/// instance has `page >= 1` and non-empty `content`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawFragment")]
pub struct Fragment {
    source: String,
    page: u32,
    content: String,
}

#[derive(Deserialize)]
struct RawFragment {
    source: String,
    page: u32,
    content: String,
}

impl TryFrom<RawFragment> for Fragment {
    type Error = FragmentError;

    fn try_from(raw: RawFragment) -> Result<Self, Self::Error> {
        Fragment::new(raw.source, raw.page, raw.content)
    }
}

impl Fragment {
    pub fn new(
        source: impl Into<String>,
        page: u32,
        content: impl Into<String>,
    ) -> Result<Self, FragmentError> {
        let source = source.into();
        let content = content.into();
        if source.trim().is_empty() {
            return Err(FragmentError::EmptySource);
        }
        if page == 0 {
            return Err(FragmentError::ZeroPage);
        }
        if content.trim().is_empty() {
            return Err(FragmentError::EmptyContent);
        }
        Ok(Self {
            source,
            page,
            content,
        })
    }

    /// Origin document identifier (usually the PDF file name).
    pub fn source(&self) -> &str {
        &self.source
    }

    /// 1-based page number within the source document.
    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// The `{source, content}` view handed to deliberation.
    pub fn evidence(&self) -> Evidence<'_> {
        Evidence {
            source: &self.source,
            content: &self.content,
        }
    }
}

/// Borrowed citation view of a [`Fragment`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Evidence<'a> {
    pub source: &'a str,
    pub content: &'a str,
}

/// Lifecycle state of a manifest. Only fully sealed manifests are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SealStatus {
    Sealed,
}

/// One hashed artifact inside a sealed package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    /// Logical name; also the entry name inside the archive.
    pub file: String,
    /// Lowercase hex SHA-256 of the artifact bytes at seal time.
    pub sha256: String,
    /// Capture instant, UTC ISO-8601 with trailing `Z`.
    pub timestamp: String,
}

impl ArtifactRecord {
    pub fn new(
        file: impl Into<String>,
        sha256: impl Into<String>,
        captured_at: DateTime<Utc>,
    ) -> Self {
        Self {
            file: file.into(),
            sha256: sha256.into(),
            timestamp: format_timestamp(captured_at),
        }
    }
}

/// Summary of a seal operation, persisted as `evidence_manifest.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub run_id: String,
    pub status: SealStatus,
    /// Aggregate digest, `SHA256:<hex>`.
    pub merkle_root: String,
    pub artifacts: Vec<ArtifactRecord>,
    /// Descriptive label only; no signature is computed.
    pub signature_algorithm: String,
}

impl Manifest {
    /// The aggregate digest without its `SHA256:` prefix.
    pub fn merkle_root_hex(&self) -> &str {
        self.merkle_root
            .strip_prefix(crate::digest::MERKLE_ROOT_PREFIX)
            .unwrap_or(&self.merkle_root)
    }

    pub fn artifact(&self, file: &str) -> Option<&ArtifactRecord> {
        self.artifacts.iter().find(|a| a.file == file)
    }
}

/// Format a UTC instant as ISO-8601 with microseconds and a trailing `Z`.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_fragment_rejects_zero_page() {
        let err = Fragment::new("a.pdf", 0, "text").unwrap_err();
        assert_eq!(err, FragmentError::ZeroPage);
    }

    #[test]
    fn test_fragment_rejects_blank_content() {
        let err = Fragment::new("a.pdf", 1, "   ").unwrap_err();
        assert_eq!(err, FragmentError::EmptyContent);
    }

    #[test]
    fn test_fragment_deserialize_validates() {
        let ok: Fragment =
            serde_json::from_str(r#"{"source":"a.pdf","page":2,"content":"restoration"}"#)
                .unwrap();
        assert_eq!(ok.page(), 2);
        assert_eq!(ok.source(), "a.pdf");

        let bad = serde_json::from_str::<Fragment>(
            r#"{"source":"a.pdf","page":0,"content":"restoration"}"#,
        );
        assert!(bad.is_err());

        let missing = serde_json::from_str::<Fragment>(r#"{"source":"a.pdf","page":1}"#);
        assert!(missing.is_err());
    }

    #[test]
    fn test_fragment_serializes_flat_shape() {
        let f = Fragment::new("a.pdf", 3, "permanence").unwrap();
        let json = serde_json::to_value(&f).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"source": "a.pdf", "page": 3, "content": "permanence"})
        );
    }

    #[test]
    fn test_timestamp_format() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
        assert_eq!(format_timestamp(ts), "2024-05-01T12:30:00.000000Z");
    }

    #[test]
    fn test_manifest_json_shape() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
        let manifest = Manifest {
            run_id: "GICES-1".to_string(),
            status: SealStatus::Sealed,
            merkle_root: "SHA256:abcd".to_string(),
            artifacts: vec![ArtifactRecord::new("kpis.json", "00ff", ts)],
            signature_algorithm: "RSA-SHA256 (Simulated)".to_string(),
        };
        let json = serde_json::to_value(&manifest).unwrap();
        assert_eq!(json["status"], "SEALED");
        assert_eq!(json["artifacts"][0]["file"], "kpis.json");
        assert_eq!(manifest.merkle_root_hex(), "abcd");
        assert!(manifest.artifact("kpis.json").is_some());
        assert!(manifest.artifact("explain.json").is_none());
    }
}
