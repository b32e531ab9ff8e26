//! Speculative plan simulation.
//!
//! Runs each step of a proposed plan through the policy engine and a
//! registry of non-destructive tool stubs, scoring risk against a cloned
//! fingerprint. No real tool is touched and the agent's live fingerprint
//! is never mutated.

pub mod simulator;
pub mod stub;

pub use simulator::{PlanSimulator, WhatIfOverrides};
pub use stub::{StubError, StubRegistry, ToolStub};
