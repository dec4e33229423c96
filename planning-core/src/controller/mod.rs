//! Control flow of the updater.
//!
//! [`UpdateController`] owns the cycle loop and the error budget;
//! [`BranchController`] drives a single branch through a cycle.

mod branch;
mod update;

pub use branch::{
    Branch, BranchController, BranchOutcome, BranchReport, BranchState, GroupOutcome, GroupReport,
};
pub use update::{ControllerState, CycleReport, Exit, UpdateController};
