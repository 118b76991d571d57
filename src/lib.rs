//! ontreg - ONT discovery and registration for Huawei OLTs
//!
//! Scans an OLT for unregistered ONTs, lets the operator pick a subset and
//! registers it in one batch through a provisioning service. The `ontreg`
//! binary is a thin CLI over [`workflow::Workflow`].

pub mod command;
pub mod config;
pub mod error;
pub mod http;
pub mod models;
pub mod parser;
pub mod service;
pub mod workflow;
