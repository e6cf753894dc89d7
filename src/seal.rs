//! Forensic sealing of audit artifacts.
//!
//! A seal hashes a fixed, ordered set of artifact files, derives one
//! aggregate digest, writes `evidence_manifest.json`, and packs the artifacts
//! plus the manifest into `GICES_AUDIT_<run_id>.zip`.
//!
//! # Procedure
//!
//! 1. Materialize a placeholder for every artifact file that does not exist.
//! 2. Read each artifact once; hash and archive the same in-memory bytes.
//! 3. `merkle_root = SHA256(concat(sorted(hex digests)))`, prefixed `SHA256:`.
//! 4. Stage the archive and the manifest as temporary files next to their
//!    destinations, then rename both into place.
//!
//! Any failure aborts the whole seal: staged files are removed and the
//! previously persisted manifest is left untouched.

use chrono::Utc;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use thiserror::Error;
use uuid::Uuid;

use gices_raga_core::digest::{aggregate_root, format_merkle_root, sha256_hex};
use gices_raga_core::models::{ArtifactRecord, Manifest, SealStatus};

use crate::config::{AuditConfig, Config};

/// Entry name of the manifest inside the archive, and its persisted file name.
pub const MANIFEST_FILE_NAME: &str = "evidence_manifest.json";

const RUN_ID_PREFIX: &str = "GICES-";

#[derive(Debug, Error)]
pub enum SealError {
    #[error("artifact set is empty")]
    EmptyArtifactSet,
    #[error("duplicate artifact name: '{0}'")]
    DuplicateArtifact(String),
    #[error("invalid artifact name: '{0}'")]
    InvalidArtifactName(String),
    #[error("failed to create placeholder for '{name}' at {path}")]
    Placeholder {
        name: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("artifact '{name}' could not be read from {path}")]
    ArtifactUnreadable {
        name: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to build archive {path}")]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },
    #[error("failed to write {path}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize manifest")]
    Serialize(#[from] serde_json::Error),
}

/// Ordered mapping of logical artifact names to files on disk.
///
/// Logical names become archive entry names, so they must be unique, must
/// not contain path separators, and must not collide with the manifest.
#[derive(Debug, Clone)]
pub struct ArtifactSet {
    entries: Vec<(String, PathBuf)>,
}

impl ArtifactSet {
    pub fn new<I, N, P>(entries: I) -> Result<Self, SealError>
    where
        I: IntoIterator<Item = (N, P)>,
        N: Into<String>,
        P: Into<PathBuf>,
    {
        let mut validated: Vec<(String, PathBuf)> = Vec::new();
        for (name, path) in entries {
            let name = name.into();
            validate_name(&name)?;
            if validated.iter().any(|(existing, _)| *existing == name) {
                return Err(SealError::DuplicateArtifact(name));
            }
            validated.push((name, path.into()));
        }
        if validated.is_empty() {
            return Err(SealError::EmptyArtifactSet);
        }
        Ok(Self { entries: validated })
    }

    /// KPI results, narrative explanations, and the source-data snapshot.
    pub fn standard(raga_dir: &Path, source_data: &Path) -> Self {
        Self {
            entries: vec![
                ("kpis.json".to_string(), raga_dir.join("kpis.json")),
                ("explain.json".to_string(), raga_dir.join("explain.json")),
                ("source_data.json".to_string(), source_data.to_path_buf()),
            ],
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.entries
            .iter()
            .map(|(name, path)| (name.as_str(), path.as_path()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn validate_name(name: &str) -> Result<(), SealError> {
    let invalid = name.trim().is_empty()
        || name.contains('/')
        || name.contains('\\')
        || name == "."
        || name == ".."
        || name == MANIFEST_FILE_NAME;
    if invalid {
        return Err(SealError::InvalidArtifactName(name.to_string()));
    }
    Ok(())
}

/// Result of a successful seal.
#[derive(Debug, Clone)]
pub struct SealOutcome {
    pub manifest: Manifest,
    pub archive_path: PathBuf,
    pub manifest_path: PathBuf,
}

/// Seals artifact sets into archives under `release_dir` and persists the
/// latest manifest under `evidence_dir`.
#[derive(Debug, Clone)]
pub struct Sealer {
    evidence_dir: PathBuf,
    release_dir: PathBuf,
    signature_algorithm: String,
}

impl Sealer {
    pub fn new(
        evidence_dir: impl Into<PathBuf>,
        release_dir: impl Into<PathBuf>,
        signature_algorithm: impl Into<String>,
    ) -> Self {
        Self {
            evidence_dir: evidence_dir.into(),
            release_dir: release_dir.into(),
            signature_algorithm: signature_algorithm.into(),
        }
    }

    pub fn from_config(audit: &AuditConfig) -> Self {
        Self::new(
            &audit.evidence_dir,
            &audit.release_dir,
            audit.signature_algorithm.clone(),
        )
    }

    /// Durable location of the most recent manifest.
    pub fn manifest_path(&self) -> PathBuf {
        self.evidence_dir.join(MANIFEST_FILE_NAME)
    }

    pub fn seal(&self, artifacts: &ArtifactSet) -> Result<SealOutcome, SealError> {
        if artifacts.is_empty() {
            return Err(SealError::EmptyArtifactSet);
        }

        create_dir(&self.evidence_dir)?;
        create_dir(&self.release_dir)?;
        ensure_placeholders(artifacts)?;

        let mut payloads: Vec<(&str, Vec<u8>)> = Vec::with_capacity(artifacts.len());
        let mut records: Vec<ArtifactRecord> = Vec::with_capacity(artifacts.len());
        for (name, path) in artifacts.iter() {
            let bytes = std::fs::read(path).map_err(|source| SealError::ArtifactUnreadable {
                name: name.to_string(),
                path: path.to_path_buf(),
                source,
            })?;
            let digest = sha256_hex(&bytes);
            tracing::debug!(
                artifact = name,
                sha256 = %digest,
                bytes = bytes.len(),
                "hashed artifact"
            );
            records.push(ArtifactRecord::new(name, digest, Utc::now()));
            payloads.push((name, bytes));
        }

        let digests: Vec<&str> = records.iter().map(|r| r.sha256.as_str()).collect();
        let root = aggregate_root(&digests);

        let manifest = Manifest {
            run_id: next_run_id(),
            status: SealStatus::Sealed,
            merkle_root: format_merkle_root(&root),
            artifacts: records,
            signature_algorithm: self.signature_algorithm.clone(),
        };
        let manifest_json = serde_json::to_vec_pretty(&manifest)?;

        let archive_name = archive_file_name(&manifest.run_id);
        let archive_path = self.release_dir.join(&archive_name);
        let staged_archive = StagedFile::new(&self.release_dir, &archive_name);
        write_archive(staged_archive.path(), &payloads, &manifest_json).map_err(|source| {
            SealError::Archive {
                path: archive_path.clone(),
                source,
            }
        })?;

        let manifest_path = self.manifest_path();
        let staged_manifest = StagedFile::new(&self.evidence_dir, MANIFEST_FILE_NAME);
        std::fs::write(staged_manifest.path(), &manifest_json).map_err(|source| {
            SealError::Persist {
                path: manifest_path.clone(),
                source,
            }
        })?;

        staged_archive.promote(&archive_path)?;
        staged_manifest.promote(&manifest_path)?;

        tracing::info!(
            run_id = %manifest.run_id,
            artifacts = manifest.artifacts.len(),
            merkle_root = %manifest.merkle_root,
            archive = %archive_path.display(),
            "sealed audit package"
        );

        Ok(SealOutcome {
            manifest,
            archive_path,
            manifest_path,
        })
    }
}

/// `GICES_AUDIT_<run_id>.zip`
pub fn archive_file_name(run_id: &str) -> String {
    format!("GICES_AUDIT_{}.zip", run_id)
}

static LAST_RUN_STAMP: AtomicI64 = AtomicI64::new(0);

/// `GICES-<unix millis>`, strictly increasing within the process so that
/// concurrent seals never share a run id or an archive name.
fn next_run_id() -> String {
    let now = Utc::now().timestamp_millis();
    let previous = LAST_RUN_STAMP
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
            Some(now.max(last + 1))
        })
        .unwrap_or_else(|last| last);
    format!("{}{}", RUN_ID_PREFIX, now.max(previous + 1))
}

/// Deterministic stand-in content for an artifact that was never produced.
pub fn placeholder_bytes(name: &str) -> Vec<u8> {
    let value = serde_json::json!({
        "artifact": name,
        "status": "generated_for_audit",
    });
    // Serializing a literal object cannot fail.
    serde_json::to_vec_pretty(&value).unwrap_or_default()
}

/// Write placeholders for missing artifact files. Returns the logical names
/// that were materialized.
pub fn ensure_placeholders(artifacts: &ArtifactSet) -> Result<Vec<String>, SealError> {
    let mut created = Vec::new();
    for (name, path) in artifacts.iter() {
        if path.exists() {
            continue;
        }
        let placeholder_err = |source: std::io::Error| SealError::Placeholder {
            name: name.to_string(),
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(placeholder_err)?;
            }
        }
        std::fs::write(path, placeholder_bytes(name)).map_err(placeholder_err)?;
        tracing::warn!(
            artifact = name,
            path = %path.display(),
            "artifact missing; wrote placeholder"
        );
        created.push(name.to_string());
    }
    Ok(created)
}

fn create_dir(dir: &Path) -> Result<(), SealError> {
    std::fs::create_dir_all(dir).map_err(|source| SealError::Persist {
        path: dir.to_path_buf(),
        source,
    })
}

fn write_archive(
    path: &Path,
    payloads: &[(&str, Vec<u8>)],
    manifest_json: &[u8],
) -> zip::result::ZipResult<()> {
    let file = std::fs::File::create(path)?;
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);

    for (name, bytes) in payloads {
        zip.start_file(*name, options)?;
        zip.write_all(bytes)?;
    }
    zip.start_file(MANIFEST_FILE_NAME, options)?;
    zip.write_all(manifest_json)?;

    let file = zip.finish()?;
    file.sync_all()?;
    Ok(())
}

/// A temporary sibling of a destination file, removed on drop unless it has
/// been renamed into place.
struct StagedFile {
    path: PathBuf,
    promoted: bool,
}

impl StagedFile {
    fn new(dir: &Path, final_name: &str) -> Self {
        let name = format!(".{}.{}.tmp", final_name, Uuid::new_v4().simple());
        Self {
            path: dir.join(name),
            promoted: false,
        }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn promote(mut self, dest: &Path) -> Result<(), SealError> {
        std::fs::rename(&self.path, dest).map_err(|source| SealError::Persist {
            path: dest.to_path_buf(),
            source,
        })?;
        self.promoted = true;
        Ok(())
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if !self.promoted {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

/// CLI entry point: seal the standard artifact set and report the result.
pub fn run_seal(config: &Config) -> anyhow::Result<()> {
    let artifacts = ArtifactSet::standard(&config.output.raga_dir, &config.audit.source_data_path);
    let sealer = Sealer::from_config(&config.audit);
    let outcome = sealer.seal(&artifacts)?;

    println!("Sealed {}", outcome.manifest.run_id);
    println!("  merkle_root: {}", outcome.manifest.merkle_root);
    for record in &outcome.manifest.artifacts {
        println!("  {}  {}", record.sha256, record.file);
    }
    println!("  archive:  {}", outcome.archive_path.display());
    println!("  manifest: {}", outcome.manifest_path.display());
    Ok(())
}
