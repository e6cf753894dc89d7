//! # GICES-RAGA
//!
//! Compliance evidence toolkit for sustainability disclosures (CSRD/ESRS).
//!
//! Deterministic KPIs (energy emissions) and deliberative KPIs (biodiversity
//! claims checked against normative PDFs) are computed into JSON artifacts,
//! which are then sealed into a hashed, verifiable audit package.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌───────────┐   ┌──────────────┐
//! │ PDFs     │──▶│  ingest  │──▶│ index.json│──▶│  retrieve    │
//! └──────────┘   └──────────┘   └───────────┘   └──────┬───────┘
//!                                                      ▼
//! ┌──────────┐   ┌──────────┐   ┌───────────┐   ┌──────────────┐
//! │ verify   │◀──│  seal    │◀──│ kpis.json │◀──│ compute +    │
//! │          │   │  (zip)   │   │ explain   │   │ deliberation │
//! └──────────┘   └──────────┘   └───────────┘   └──────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`ingest`] | PDF pages to fragments |
//! | [`index`] | Fragment index persistence |
//! | [`search`] | CLI evidence retrieval |
//! | [`compute`] | E1-1 and E4-5 KPI computation |
//! | [`deliberation`] | Language-model verdict providers |
//! | [`seal`] | Artifact hashing, manifest, and archive |
//! | [`verify`] | Sealed archive verification |
//! | [`logging`] | Tracing setup |
//!
//! Retrieval and digest primitives live in the `gices-raga-core` crate.

pub mod compute;
pub mod config;
pub mod deliberation;
pub mod index;
pub mod ingest;
pub mod logging;
pub mod search;
pub mod seal;
pub mod verify;
