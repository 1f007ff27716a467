// src/engine/mod.rs

//! Orchestration engine for stackguard.
//!
//! Startup is a fixed sequence:
//! reap ports → launch backend → probe backend → launch frontend → probe
//! frontend → ready, with an escape edge to `Aborting → Aborted` from every
//! intermediate stage.
//!
//! The pure state machine lives in [`core`]; the async/IO shell that reaps,
//! launches, probes and tears down is [`supervisor`].

use std::fmt;

use crate::types::ServiceName;

/// Supervisor state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StackState {
    Idle,
    ReapingPorts,
    StartingBackend,
    ProbingBackend,
    StartingFrontend,
    ProbingFrontend,
    /// Both services are healthy. The only state validation may run from.
    Ready,
    Aborting,
    /// Terminal; the run failed.
    Aborted,
    /// Orderly stop after `Ready` (Ctrl-C, end of validation).
    ShuttingDown,
    /// Terminal; the run succeeded and was stopped.
    Stopped,
}

impl StackState {
    /// States between `Idle` and `Ready` that may escape to `Aborting`.
    pub fn is_intermediate(self) -> bool {
        matches!(
            self,
            StackState::ReapingPorts
                | StackState::StartingBackend
                | StackState::ProbingBackend
                | StackState::StartingFrontend
                | StackState::ProbingFrontend
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, StackState::Aborted | StackState::Stopped)
    }

    pub fn starting(service: ServiceName) -> Self {
        match service {
            ServiceName::Backend => StackState::StartingBackend,
            ServiceName::Frontend => StackState::StartingFrontend,
        }
    }

    pub fn probing(service: ServiceName) -> Self {
        match service {
            ServiceName::Backend => StackState::ProbingBackend,
            ServiceName::Frontend => StackState::ProbingFrontend,
        }
    }
}

impl fmt::Display for StackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StackState::Idle => "idle",
            StackState::ReapingPorts => "reaping ports",
            StackState::StartingBackend => "starting backend",
            StackState::ProbingBackend => "probing backend",
            StackState::StartingFrontend => "starting frontend",
            StackState::ProbingFrontend => "probing frontend",
            StackState::Ready => "ready",
            StackState::Aborting => "aborting",
            StackState::Aborted => "aborted",
            StackState::ShuttingDown => "shutting down",
            StackState::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// Events fed into the state machine by the supervisor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageEvent {
    /// Kick off startup from `Idle`.
    Begin,
    /// The current stage's command completed.
    Succeeded,
    /// The current stage failed; the reason is recorded.
    Failed(String),
    /// Stop requested: interrupt during startup, or orderly stop when ready.
    ShutdownRequested,
    /// All handles have been terminated.
    TeardownDone,
}

/// Work the IO shell must perform after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackCommand {
    ReapPorts,
    Launch(ServiceName),
    Probe(ServiceName),
    Teardown,
}

/// Outcome of feeding one event into the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackStep {
    pub state: StackState,
    pub command: Option<StackCommand>,
}

/// Where and why a run was aborted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbortRecord {
    pub stage: StackState,
    pub reason: String,
}

pub mod core;
pub mod supervisor;

pub use core::StackMachine;
pub use supervisor::{StackControl, Supervisor};
