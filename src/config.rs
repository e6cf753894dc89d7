//! TOML configuration for the `gices` toolkit.
//!
//! Every section has serde defaults matching the conventional project
//! layout (`rag/`, `raga/`, `evidence/`, `release/audit/`), so an empty file
//! is a valid configuration. Relative paths resolve against the working
//! directory.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use gices_raga_core::retrieve::DEFAULT_TOP_K;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub knowledge: KnowledgeConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub audit: AuditConfig,
    #[serde(default)]
    pub deliberation: DeliberationConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct KnowledgeConfig {
    #[serde(default = "default_pdf_dir")]
    pub pdf_dir: PathBuf,
    #[serde(default = "default_index_path")]
    pub index_path: PathBuf,
    /// Pages with this many characters or fewer are not indexed.
    #[serde(default = "default_min_fragment_chars")]
    pub min_fragment_chars: usize,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            pdf_dir: default_pdf_dir(),
            index_path: default_index_path(),
            min_fragment_chars: default_min_fragment_chars(),
        }
    }
}

fn default_pdf_dir() -> PathBuf {
    PathBuf::from("rag/knowledge_base")
}
fn default_index_path() -> PathBuf {
    PathBuf::from("rag/index.json")
}
fn default_min_fragment_chars() -> usize {
    100
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

#[derive(Debug, Deserialize, Clone)]
pub struct DataConfig {
    #[serde(default = "default_energy_path")]
    pub energy_path: PathBuf,
    #[serde(default = "default_biodiversity_path")]
    pub biodiversity_path: PathBuf,
    /// Grid emission factor in kg CO2e per kWh.
    #[serde(default = "default_emission_factor")]
    pub emission_factor_kg_per_kwh: f64,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            energy_path: default_energy_path(),
            biodiversity_path: default_biodiversity_path(),
            emission_factor_kg_per_kwh: default_emission_factor(),
        }
    }
}

fn default_energy_path() -> PathBuf {
    PathBuf::from("data/normalized/energy_2024-01.json")
}
fn default_biodiversity_path() -> PathBuf {
    PathBuf::from("data/normalized/biodiversity_2024.json")
}
fn default_emission_factor() -> f64 {
    0.23
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    #[serde(default = "default_raga_dir")]
    pub raga_dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            raga_dir: default_raga_dir(),
        }
    }
}

fn default_raga_dir() -> PathBuf {
    PathBuf::from("raga")
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuditConfig {
    /// Where `evidence_manifest.json` is persisted outside the archive.
    #[serde(default = "default_evidence_dir")]
    pub evidence_dir: PathBuf,
    /// Where `GICES_AUDIT_<run_id>.zip` archives are written.
    #[serde(default = "default_release_dir")]
    pub release_dir: PathBuf,
    /// Snapshot sealed as `source_data.json`.
    #[serde(default = "default_source_data_path")]
    pub source_data_path: PathBuf,
    #[serde(default = "default_signature_algorithm")]
    pub signature_algorithm: String,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            evidence_dir: default_evidence_dir(),
            release_dir: default_release_dir(),
            source_data_path: default_source_data_path(),
            signature_algorithm: default_signature_algorithm(),
        }
    }
}

fn default_evidence_dir() -> PathBuf {
    PathBuf::from("evidence")
}
fn default_release_dir() -> PathBuf {
    PathBuf::from("release/audit")
}
fn default_source_data_path() -> PathBuf {
    PathBuf::from("data/samples/biodiversity_2024.json")
}
fn default_signature_algorithm() -> String {
    "RSA-SHA256 (Simulated)".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct DeliberationConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Reviewer persona injected into the prompt.
    #[serde(default = "default_mode")]
    pub mode: String,
}

impl Default for DeliberationConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            mode: default_mode(),
        }
    }
}

impl DeliberationConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_model() -> String {
    "gpt-4o".to_string()
}
fn default_temperature() -> f64 {
    0.2
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_max_retries() -> u32 {
    3
}
fn default_mode() -> String {
    "Academic Validation".to_string()
}

impl Config {
    /// All-default configuration, used when no config file is present.
    pub fn minimal() -> Self {
        Self::default()
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    if config.retrieval.top_k == 0 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }

    let factor = config.data.emission_factor_kg_per_kwh;
    if !factor.is_finite() || factor < 0.0 {
        anyhow::bail!("data.emission_factor_kg_per_kwh must be a non-negative number");
    }

    if !(0.0..=2.0).contains(&config.deliberation.temperature) {
        anyhow::bail!("deliberation.temperature must be in [0.0, 2.0]");
    }

    if config.audit.signature_algorithm.trim().is_empty() {
        anyhow::bail!("audit.signature_algorithm must not be empty");
    }

    match config.deliberation.provider.as_str() {
        "disabled" | "openai" => {}
        other => anyhow::bail!(
            "Unknown deliberation provider: '{}'. Must be disabled or openai.",
            other
        ),
    }

    Ok(config)
}
