//! # trustgate-core
//!
//! The trust pipeline for agent file-operation plans.
//!
//! This crate provides:
//! - The plan DSL parser and the sandbox path boundary
//! - The four trait seams (`PolicyEngine`, `RiskScorer`, `AuditWriter`, `SnapshotStore`)
//! - The approval gate state machine and the sandbox `Executor`
//! - `TrustLayer`, which wires them together in trust order
//!
//! ## Usage
//!
//! ```rust,ignore
//! use trustgate_core::{TrustLayer, Sandbox, traits::{PolicyEngine, AuditWriter}};
//!
//! let run = layer.submit("write notes/today.md | hello", Environment::Dev, None)?;
//! if run.state == RunState::PendingApproval {
//!     layer.approve(run.run_id(), "alice", "reviewed")?;
//! }
//! let report = layer.execute(run.run_id())?;
//! ```

pub mod executor;
pub mod gate;
pub mod parser;
pub mod report;
pub mod runtime;
pub mod sandbox;
pub mod traits;

pub use executor::Executor;
pub use gate::ApprovalGate;
pub use parser::parse_plan;
pub use report::render_risk_summary;
pub use runtime::TrustLayer;
pub use sandbox::Sandbox;
