//! KPI computation for ESRS disclosures.
//!
//! Two paths feed the same report:
//!
//! - **Deterministic (E1-1)**: energy readings times a grid emission factor,
//!   reported in tonnes CO2e.
//! - **Deliberative (E4-5)**: each biodiversity record reports its ecosystem
//!   area, and its claim is checked by a [`Deliberator`] against evidence
//!   fragments retrieved from the knowledge base.
//!
//! Output is `kpis.json` (KPI id to value) and `explain.json` (KPI id to
//! [`Explanation`]) in the configured `raga_dir`. These are two of the
//! artifacts later sealed by [`crate::seal`].

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use gices_raga_core::models::{Evidence, Fragment};
use gices_raga_core::retrieve::retrieve;

use crate::config::Config;
use crate::deliberation::{create_deliberator, Deliberator};
use crate::index;

pub const ENERGY_KPI: &str = "E1-1.co2e";
const ENERGY_EXPLANATION_KEY: &str = "E1-1";
const BIODIVERSITY_KPI_PREFIX: &str = "E4-5.project_";

/// One metered energy consumption entry. Extra fields are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct EnergyReading {
    pub kwh: f64,
}

/// One reported nature-restoration project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BiodiversityRecord {
    pub ecosystem_area_ha: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_type: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub financial_risk_exposure: Option<serde_json::Value>,
    /// Remaining fields, passed through to deliberation untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl BiodiversityRecord {
    /// Keyword query used to pull supporting evidence for this record.
    pub fn evidence_query(&self) -> String {
        format!(
            "nature credits restoration integrity {} {}",
            query_part(self.project_type.as_ref()),
            query_part(self.financial_risk_exposure.as_ref())
        )
    }
}

fn query_part(value: Option<&serde_json::Value>) -> String {
    match value {
        None | Some(serde_json::Value::Null) => String::new(),
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Narrative attached to a KPI in `explain.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub narrative: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compliance: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence_used: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default)]
pub struct ComputeReport {
    pub kpis: BTreeMap<String, f64>,
    pub explanations: BTreeMap<String, Explanation>,
}

/// Total emissions in tonnes CO2e: `sum(kwh * factor) / 1000`.
pub fn co2e_tonnes(readings: &[EnergyReading], factor_kg_per_kwh: f64) -> f64 {
    readings
        .iter()
        .map(|r| r.kwh * factor_kg_per_kwh)
        .sum::<f64>()
        / 1000.0
}

/// Inputs for one compute run.
pub struct ComputeInputs<'a> {
    pub energy: &'a [EnergyReading],
    pub biodiversity: &'a [BiodiversityRecord],
    pub knowledge_base: &'a [Fragment],
    pub top_k: usize,
    pub emission_factor_kg_per_kwh: f64,
}

pub async fn compute_kpis(
    inputs: &ComputeInputs<'_>,
    deliberator: &dyn Deliberator,
) -> Result<ComputeReport> {
    let mut report = ComputeReport::default();

    if !inputs.energy.is_empty() {
        let total = co2e_tonnes(inputs.energy, inputs.emission_factor_kg_per_kwh);
        report.kpis.insert(ENERGY_KPI.to_string(), total);
        report.explanations.insert(
            ENERGY_EXPLANATION_KEY.to_string(),
            Explanation {
                kind: None,
                narrative: Some(
                    "Direct arithmetic calculation (kWh * emission factor).".to_string(),
                ),
                compliance: None,
                evidence_used: None,
            },
        );
    }

    for (i, record) in inputs.biodiversity.iter().enumerate() {
        let kpi_id = format!("{}{}", BIODIVERSITY_KPI_PREFIX, i + 1);
        report.kpis.insert(kpi_id.clone(), record.ecosystem_area_ha);

        let query = record.evidence_query();
        let context = retrieve(&query, inputs.knowledge_base, inputs.top_k);
        let evidence: Vec<Evidence<'_>> = context.iter().map(|f| f.evidence()).collect();
        tracing::debug!(
            kpi = %kpi_id,
            query = %query,
            evidence = evidence.len(),
            "retrieved evidence"
        );

        let data_point = serde_json::to_value(record)?;
        let (narrative, compliance) = match deliberator.deliberate(&data_point, &evidence).await {
            Ok(verdict) => (verdict.narrative, verdict.compliance_check),
            Err(e) => {
                tracing::warn!(kpi = %kpi_id, error = %e, "deliberation failed");
                (format!("Deliberation failed: {:#}", e), "FAIL".to_string())
            }
        };

        report.explanations.insert(
            kpi_id,
            Explanation {
                kind: Some("deliberative_validation".to_string()),
                narrative: Some(narrative),
                compliance: Some(compliance),
                evidence_used: Some(context.iter().map(|f| f.source().to_string()).collect()),
            },
        );
    }

    Ok(report)
}

/// Load a JSON array of records. A missing file means no records.
pub fn load_records<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "input not found; treating as empty");
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Invalid records in {}", path.display()))
}

pub fn write_report(raga_dir: &Path, report: &ComputeReport) -> Result<()> {
    std::fs::create_dir_all(raga_dir)
        .with_context(|| format!("Failed to create {}", raga_dir.display()))?;
    let kpis = serde_json::to_string_pretty(&report.kpis)?;
    std::fs::write(raga_dir.join("kpis.json"), kpis)?;
    let explanations = serde_json::to_string_pretty(&report.explanations)?;
    std::fs::write(raga_dir.join("explain.json"), explanations)?;
    Ok(())
}

/// CLI entry point: compute KPIs from the configured inputs and write them.
pub async fn run_compute(config: &Config) -> Result<()> {
    let energy: Vec<EnergyReading> = load_records(&config.data.energy_path)?;
    let biodiversity: Vec<BiodiversityRecord> = load_records(&config.data.biodiversity_path)?;

    // The knowledge base and provider are only needed for deliberative KPIs.
    let (knowledge_base, deliberator) = if biodiversity.is_empty() {
        (Vec::new(), create_deliberator(&Default::default())?)
    } else {
        let kb = index::load_index(&config.knowledge.index_path)?;
        if kb.is_empty() {
            tracing::warn!("knowledge base is empty; deliberation will run without evidence");
        }
        (kb, create_deliberator(&config.deliberation)?)
    };
    tracing::info!(
        energy = energy.len(),
        biodiversity = biodiversity.len(),
        fragments = knowledge_base.len(),
        provider = deliberator.name(),
        "computing KPIs"
    );

    let inputs = ComputeInputs {
        energy: &energy,
        biodiversity: &biodiversity,
        knowledge_base: &knowledge_base,
        top_k: config.retrieval.top_k,
        emission_factor_kg_per_kwh: config.data.emission_factor_kg_per_kwh,
    };
    let report = compute_kpis(&inputs, deliberator.as_ref()).await?;
    write_report(&config.output.raga_dir, &report)?;

    println!("Computed {} KPIs.", report.kpis.len());
    for (id, value) in &report.kpis {
        println!("  {:<20} {}", id, value);
    }
    println!("  output: {}", config.output.raga_dir.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deliberation::{Deliberation, DisabledDeliberator};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records the evidence it was shown and returns a fixed verdict.
    struct RecordingDeliberator {
        seen: Mutex<Vec<Vec<String>>>,
    }

    #[async_trait]
    impl Deliberator for RecordingDeliberator {
        fn name(&self) -> &str {
            "recording"
        }

        async fn deliberate(
            &self,
            _data_point: &serde_json::Value,
            evidence: &[Evidence<'_>],
        ) -> Result<Deliberation> {
            self.seen
                .lock()
                .unwrap()
                .push(evidence.iter().map(|e| e.source.to_string()).collect());
            Ok(Deliberation {
                narrative: "grounded".to_string(),
                compliance_check: "COMPLIANT".to_string(),
                citations: Vec::new(),
                key_risk: None,
            })
        }
    }

    struct FailingDeliberator;

    #[async_trait]
    impl Deliberator for FailingDeliberator {
        fn name(&self) -> &str {
            "failing"
        }

        async fn deliberate(
            &self,
            _data_point: &serde_json::Value,
            _evidence: &[Evidence<'_>],
        ) -> Result<Deliberation> {
            anyhow::bail!("upstream timeout")
        }
    }

    fn record(json: serde_json::Value) -> BiodiversityRecord {
        serde_json::from_value(json).unwrap()
    }

    fn inputs<'a>(
        energy: &'a [EnergyReading],
        biodiversity: &'a [BiodiversityRecord],
        kb: &'a [Fragment],
    ) -> ComputeInputs<'a> {
        ComputeInputs {
            energy,
            biodiversity,
            knowledge_base: kb,
            top_k: 4,
            emission_factor_kg_per_kwh: 0.23,
        }
    }

    #[test]
    fn test_co2e_tonnes() {
        let readings = vec![EnergyReading { kwh: 1000.0 }, EnergyReading { kwh: 3000.0 }];
        assert!((co2e_tonnes(&readings, 0.23) - 0.92).abs() < 1e-9);
        assert_eq!(co2e_tonnes(&[], 0.23), 0.0);
    }

    #[test]
    fn test_evidence_query() {
        let r = record(serde_json::json!({
            "ecosystem_area_ha": 150,
            "project_type": "Active Restoration",
            "financial_risk_exposure": "High"
        }));
        assert_eq!(
            r.evidence_query(),
            "nature credits restoration integrity Active Restoration High"
        );

        let bare = record(serde_json::json!({
            "ecosystem_area_ha": 1,
            "financial_risk_exposure": 0.4
        }));
        assert_eq!(bare.evidence_query(), "nature credits restoration integrity  0.4");
    }

    #[test]
    fn test_record_keeps_extra_fields() {
        let r = record(serde_json::json!({"ecosystem_area_ha": 150, "project": "Amazonia"}));
        let back = serde_json::to_value(&r).unwrap();
        assert_eq!(back["project"], "Amazonia");
        assert!(back.get("project_type").is_none());
    }

    #[tokio::test]
    async fn test_energy_only() {
        let energy = vec![EnergyReading { kwh: 2000.0 }];
        let report = compute_kpis(&inputs(&energy, &[], &[]), &DisabledDeliberator)
            .await
            .unwrap();
        assert!((report.kpis[ENERGY_KPI] - 0.46).abs() < 1e-9);
        assert!(report.explanations.contains_key("E1-1"));
        assert_eq!(report.kpis.len(), 1);
    }

    #[tokio::test]
    async fn test_biodiversity_uses_retrieved_evidence() {
        let kb = vec![
            Fragment::new("noise.pdf", 1, "unrelated accounting text").unwrap(),
            Fragment::new("roadmap.pdf", 4, "nature credits must show integrity").unwrap(),
            Fragment::new("regulation.pdf", 2, "restoration targets for 2030").unwrap(),
        ];
        let biodiversity = vec![record(serde_json::json!({
            "ecosystem_area_ha": 150.0,
            "project_type": "Active Restoration"
        }))];
        let deliberator = RecordingDeliberator {
            seen: Mutex::new(Vec::new()),
        };

        let report = compute_kpis(&inputs(&[], &biodiversity, &kb), &deliberator)
            .await
            .unwrap();

        assert_eq!(report.kpis["E4-5.project_1"], 150.0);
        let explanation = &report.explanations["E4-5.project_1"];
        assert_eq!(explanation.kind.as_deref(), Some("deliberative_validation"));
        assert_eq!(explanation.compliance.as_deref(), Some("COMPLIANT"));
        assert_eq!(
            explanation.evidence_used.as_deref(),
            Some(&["roadmap.pdf".to_string(), "regulation.pdf".to_string()][..])
        );
        assert_eq!(
            deliberator.seen.lock().unwrap()[0],
            vec!["roadmap.pdf", "regulation.pdf"]
        );
    }

    #[tokio::test]
    async fn test_deliberation_failure_is_recorded() {
        let biodiversity = vec![record(serde_json::json!({"ecosystem_area_ha": 10.0}))];
        let report = compute_kpis(&inputs(&[], &biodiversity, &[]), &FailingDeliberator)
            .await
            .unwrap();
        let explanation = &report.explanations["E4-5.project_1"];
        assert_eq!(explanation.compliance.as_deref(), Some("FAIL"));
        assert!(explanation
            .narrative
            .as_deref()
            .unwrap()
            .contains("upstream timeout"));
        assert_eq!(explanation.evidence_used.as_deref(), Some(&[][..]));
    }

    #[test]
    fn test_load_records_missing_and_malformed() {
        let tmp = tempfile::TempDir::new().unwrap();
        let missing: Vec<EnergyReading> = load_records(&tmp.path().join("none.json")).unwrap();
        assert!(missing.is_empty());

        let bad = tmp.path().join("bad.json");
        std::fs::write(&bad, r#"[{"kwh": "lots"}]"#).unwrap();
        assert!(load_records::<EnergyReading>(&bad).is_err());
    }

    #[test]
    fn test_write_report_layout() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut report = ComputeReport::default();
        report.kpis.insert(ENERGY_KPI.to_string(), 1.5);
        write_report(&tmp.path().join("raga"), &report).unwrap();
        let kpis: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(tmp.path().join("raga/kpis.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(kpis[ENERGY_KPI], 1.5);
        assert!(tmp.path().join("raga/explain.json").exists());
    }
}
