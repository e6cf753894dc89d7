//! Verification of sealed audit archives.
//!
//! Re-hashes every artifact stored in a `GICES_AUDIT_*.zip` and compares the
//! digests with the manifest embedded in the same archive, then recomputes
//! the aggregate digest. Optionally cross-checks the manifest persisted in
//! the evidence directory.

use anyhow::{bail, Context, Result};
use std::io::Read;
use std::path::Path;

use gices_raga_core::digest::{aggregate_root, sha256_hex};
use gices_raga_core::models::Manifest;

use crate::seal::MANIFEST_FILE_NAME;

/// Outcome for one manifest entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactStatus {
    Ok,
    /// Listed in the manifest but absent from the archive.
    Missing,
    Mismatch {
        expected: String,
        actual: String,
    },
}

#[derive(Debug, Clone)]
pub struct ArtifactCheck {
    pub file: String,
    pub status: ArtifactStatus,
}

#[derive(Debug, Clone)]
pub struct VerificationReport {
    pub manifest: Manifest,
    pub checks: Vec<ArtifactCheck>,
    /// Aggregate digest recomputed from the manifest's per-artifact digests.
    pub recomputed_root: String,
    /// Archive entries that the manifest does not mention.
    pub unlisted_entries: Vec<String>,
}

impl VerificationReport {
    pub fn root_matches(&self) -> bool {
        self.recomputed_root == self.manifest.merkle_root_hex()
    }

    pub fn is_valid(&self) -> bool {
        self.root_matches()
            && self.unlisted_entries.is_empty()
            && self.checks.iter().all(|c| c.status == ArtifactStatus::Ok)
    }
}

/// Verify an archive against the manifest it contains.
pub fn verify_archive(path: &Path) -> Result<VerificationReport> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open archive: {}", path.display()))?;
    let mut archive = zip::ZipArchive::new(file)
        .with_context(|| format!("Not a zip archive: {}", path.display()))?;

    let manifest_bytes = read_entry(&mut archive, MANIFEST_FILE_NAME)?
        .ok_or_else(|| anyhow::anyhow!("Archive has no {}", MANIFEST_FILE_NAME))?;
    let manifest: Manifest = serde_json::from_slice(&manifest_bytes)
        .with_context(|| format!("Invalid {} in archive", MANIFEST_FILE_NAME))?;

    let mut checks = Vec::with_capacity(manifest.artifacts.len());
    for record in &manifest.artifacts {
        let status = match read_entry(&mut archive, &record.file)? {
            None => ArtifactStatus::Missing,
            Some(bytes) => {
                let actual = sha256_hex(&bytes);
                if actual == record.sha256 {
                    ArtifactStatus::Ok
                } else {
                    ArtifactStatus::Mismatch {
                        expected: record.sha256.clone(),
                        actual,
                    }
                }
            }
        };
        checks.push(ArtifactCheck {
            file: record.file.clone(),
            status,
        });
    }

    let unlisted_entries: Vec<String> = archive
        .file_names()
        .filter(|name| *name != MANIFEST_FILE_NAME && manifest.artifact(name).is_none())
        .map(|name| name.to_string())
        .collect();

    let digests: Vec<&str> = manifest.artifacts.iter().map(|a| a.sha256.as_str()).collect();
    let recomputed_root = aggregate_root(&digests);

    Ok(VerificationReport {
        manifest,
        checks,
        recomputed_root,
        unlisted_entries,
    })
}

/// Check that the persisted manifest describes the same seal as the archive.
pub fn compare_with_persisted(report: &VerificationReport, manifest_path: &Path) -> Result<()> {
    let content = std::fs::read_to_string(manifest_path)
        .with_context(|| format!("Failed to read manifest: {}", manifest_path.display()))?;
    let persisted: Manifest = serde_json::from_str(&content)
        .with_context(|| format!("Invalid manifest: {}", manifest_path.display()))?;

    if persisted.run_id != report.manifest.run_id {
        bail!(
            "Persisted manifest is for run {}, archive is run {}",
            persisted.run_id,
            report.manifest.run_id
        );
    }
    if persisted != report.manifest {
        bail!(
            "Persisted manifest for run {} differs from the archived copy",
            persisted.run_id
        );
    }
    Ok(())
}

fn read_entry(
    archive: &mut zip::ZipArchive<std::fs::File>,
    name: &str,
) -> Result<Option<Vec<u8>>> {
    let mut entry = match archive.by_name(name) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e).with_context(|| format!("Failed to read archive entry {}", name)),
    };
    let mut out = Vec::new();
    entry
        .read_to_end(&mut out)
        .with_context(|| format!("Failed to read archive entry {}", name))?;
    Ok(Some(out))
}

/// CLI entry point. Exits non-zero when verification fails.
pub fn run_verify(archive: &Path, manifest_path: Option<&Path>) -> Result<()> {
    let report = verify_archive(archive)?;

    println!("run_id:      {}", report.manifest.run_id);
    println!("merkle_root: {}", report.manifest.merkle_root);
    for check in &report.checks {
        match &check.status {
            ArtifactStatus::Ok => println!("  OK        {}", check.file),
            ArtifactStatus::Missing => println!("  MISSING   {}", check.file),
            ArtifactStatus::Mismatch { expected, actual } => println!(
                "  MISMATCH  {} (manifest {}, archive {})",
                check.file, expected, actual
            ),
        }
    }
    for name in &report.unlisted_entries {
        println!("  UNLISTED  {}", name);
    }
    if !report.root_matches() {
        println!("  ROOT      recomputed {}", report.recomputed_root);
    }

    if let Some(path) = manifest_path {
        compare_with_persisted(&report, path)?;
        println!("  persisted manifest matches ({})", path.display());
    }

    if !report.is_valid() {
        bail!("Verification failed for {}", archive.display());
    }
    println!("Verified.");
    Ok(())
}
