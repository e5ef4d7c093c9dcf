//! Block-level orchestration: wires the four leaf modules into a
//! [`paw_api::services::access::ServiceDirectory`], commits each
//! transaction atomically through a `StateOverlay`, and drives the
//! ordered end-of-block sweep. Grounded on the teacher's
//! `ExecutionMachine` (`kernel/crates/execution/src/app/mod.rs`).

pub mod collaborators;
pub mod genesis;
pub mod machine;
pub mod wiring;

pub use genesis::Genesis;
pub use machine::{ExecutionMachine, END_BLOCK_ORDER};
pub use wiring::build_machine;
