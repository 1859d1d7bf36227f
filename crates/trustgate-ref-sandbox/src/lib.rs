//! # trustgate-ref-sandbox
//!
//! Reference runtime for the TRUSTGATE trust layer.
//!
//! Wires the concrete crates (keyword scorer, live policy engine, audit
//! writers, directory snapshot store) into a `TrustLayer` and drives it
//! through four scenarios:
//!
//! 1. **Mixed-risk approval**: a Medium plan waits for a human, then runs.
//! 2. **Prod lock**: a locked environment refuses approval until a policy
//!    reload lifts the lock; a malformed reload is rejected.
//! 3. **Move conflict**: a move onto an existing file aborts the run.
//! 4. **Rollback**: an executed plan is restored byte for byte.
//!
//! All file operations happen inside throwaway temporary directories.

pub mod scenarios;
pub mod seed;
pub mod wiring;

pub use seed::{seed_demo_files, SAMPLE_PLAN};
pub use wiring::{Harness, Station};
