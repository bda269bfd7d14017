//! ACE fraud decision engine.
//!
//! Five analyzers score every transaction, the aggregator turns their
//! outputs into one decision, and in ACE modes a playbook of weighted
//! heuristic bullets adjusts the analyzers. Online ACE keeps learning
//! from labeled outcomes.

pub mod aggregator;
pub mod analysis;
pub mod analyzer;
pub mod behavioral_analyzer;
pub mod config;
pub mod dataset;
pub mod engine;
pub mod error;
pub mod event;
pub mod experiment;
pub mod geographic_analyzer;
pub mod learning;
pub mod merchant_risk_analyzer;
pub mod pattern_analyzer;
pub mod pipeline;
pub mod playbook;
pub mod registry;
pub mod rng;
pub mod store;
pub mod transaction;
pub mod types;
pub mod velocity_analyzer;
