// src/engine/core.rs

//! Pure supervisor state machine.
//!
//! Consumes [`StageEvent`]s and produces the next [`StackState`] plus the
//! [`StackCommand`] the IO shell should run. No Tokio, no processes, no
//! network: every transition is unit-testable.

use crate::engine::{AbortRecord, StackCommand, StackState, StageEvent, StackStep};
use crate::errors::{Result, StackError};
use crate::types::ServiceName;

#[derive(Debug, Clone)]
pub struct StackMachine {
    state: StackState,
    trail: Vec<StackState>,
    abort: Option<AbortRecord>,
}

impl Default for StackMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StackMachine {
    pub fn new() -> Self {
        Self {
            state: StackState::Idle,
            trail: vec![StackState::Idle],
            abort: None,
        }
    }

    pub fn state(&self) -> StackState {
        self.state
    }

    /// Every state visited so far, in order.
    pub fn trail(&self) -> &[StackState] {
        &self.trail
    }

    pub fn abort_record(&self) -> Option<&AbortRecord> {
        self.abort.as_ref()
    }

    pub fn is_ready(&self) -> bool {
        self.state == StackState::Ready
    }

    /// Was `Ready` reached at some point in this run?
    pub fn reached_ready(&self) -> bool {
        self.trail.contains(&StackState::Ready)
    }

    /// Apply one event. Events that make no sense in the current state are
    /// rejected and leave the machine untouched.
    pub fn step(&mut self, event: StageEvent) -> Result<StackStep> {
        use StackState::*;

        let (next, command) = match (self.state, &event) {
            (Idle, StageEvent::Begin) => (ReapingPorts, Some(StackCommand::ReapPorts)),

            (ReapingPorts, StageEvent::Succeeded) => (
                StartingBackend,
                Some(StackCommand::Launch(ServiceName::Backend)),
            ),
            (StartingBackend, StageEvent::Succeeded) => (
                ProbingBackend,
                Some(StackCommand::Probe(ServiceName::Backend)),
            ),
            (ProbingBackend, StageEvent::Succeeded) => (
                StartingFrontend,
                Some(StackCommand::Launch(ServiceName::Frontend)),
            ),
            (StartingFrontend, StageEvent::Succeeded) => (
                ProbingFrontend,
                Some(StackCommand::Probe(ServiceName::Frontend)),
            ),
            (ProbingFrontend, StageEvent::Succeeded) => (Ready, None),

            (s, StageEvent::Failed(reason)) if s.is_intermediate() => {
                self.abort = Some(AbortRecord {
                    stage: s,
                    reason: reason.clone(),
                });
                (Aborting, Some(StackCommand::Teardown))
            }
            (s, StageEvent::ShutdownRequested) if s.is_intermediate() => {
                self.abort = Some(AbortRecord {
                    stage: s,
                    reason: "interrupted".to_string(),
                });
                (Aborting, Some(StackCommand::Teardown))
            }
            // Validation failures tear down from `Ready` and still fail the run.
            (Ready, StageEvent::Failed(reason)) => {
                self.abort = Some(AbortRecord {
                    stage: Ready,
                    reason: reason.clone(),
                });
                (Aborting, Some(StackCommand::Teardown))
            }
            (Ready, StageEvent::ShutdownRequested) => {
                (ShuttingDown, Some(StackCommand::Teardown))
            }

            (Aborting, StageEvent::TeardownDone) => (Aborted, None),
            (ShuttingDown, StageEvent::TeardownDone) => (Stopped, None),

            (state, event) => {
                return Err(StackError::Other(anyhow::anyhow!(
                    "invalid supervisor transition: {event:?} in state {state:?}"
                )));
            }
        };

        self.state = next;
        self.trail.push(next);
        Ok(StackStep {
            state: next,
            command,
        })
    }
}
