//! # GICES-RAGA Core
//!
//! Pure logic shared by the `gices` CLI: evidence fragment and manifest
//! models, the keyword-overlap retriever, and the digest helpers used to
//! seal audit artifacts.
//!
//! This crate performs no filesystem or network I/O. Callers load fragments
//! and artifact bytes themselves and hand them in.

pub mod digest;
pub mod models;
pub mod retrieve;
