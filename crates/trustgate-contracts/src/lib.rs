//! # trustgate-contracts
//!
//! Shared types, schemas, and contracts for the TRUSTGATE trust layer.
//!
//! All crates in the workspace import from here. No business logic lives in
//! this crate, only data definitions, the policy defaults, and error types.

pub mod action;
pub mod approval;
pub mod audit;
pub mod error;
pub mod execution;
pub mod plan;
pub mod policy;
pub mod risk;
pub mod run;
pub mod snapshot;
