//! Résumé-versus-jobs analysis backed by a remote LLM.
//!
//! `analyzer` holds the resilient completion client and result
//! normalization; `config` and `intake` are the thin caller-side pieces used
//! by the `cv-analyzer` binary.

pub mod analyzer;
pub mod config;
pub mod intake;
