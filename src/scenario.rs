//! Scenario replay.
//!
//! This module drives a scripted sequence of registry operations against an
//! `IndexAllocator` and collects what happened, so that an operator can
//! check how a table's indexes evolve across registrations, releases and
//! session teardowns.

use crate::config::{AgentRole, Config, Expectation, Operation};
use crate::delegation::{IndexAllocator, SharedRegistryGateway};
use crate::index::{IndexRegistry, IndexValue, RegistryError, RegistrySnapshot};
use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;
use log::{debug, info, warn};
use std::sync::{Arc, Mutex};

const MASTER_NAME: &str = "in-process master agent";

/// Outcome of one replayed operation
#[derive(Debug, Clone)]
pub struct StepReport {
    /// 1-based position in the scenario
    pub position: usize,
    pub operation: Operation,
    pub expected: Expectation,
    /// Allocated value for registrations, released count for session teardown
    pub outcome: Result<StepOutput, RegistryError>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StepOutput {
    Allocated(IndexValue),
    Released(usize),
    Done,
    Dumped(String),
}

impl StepReport {
    pub fn matched(&self) -> bool {
        self.expected.is_met(&self.outcome)
    }
}

/// Everything a replay produced
#[derive(Debug)]
pub struct ScenarioReport {
    pub role: AgentRole,
    pub steps: Vec<StepReport>,
    /// Final allocation report of the authoritative registry
    pub final_dump: String,
    pub snapshot: RegistrySnapshot,
}

impl ScenarioReport {
    pub fn mismatches(&self) -> Vec<&StepReport> {
        self.steps.iter().filter(|step| !step.matched()).collect()
    }
}

/// Replays a scenario against a freshly built allocator
pub struct ScenarioRunner {
    allocator: IndexAllocator,
    master: Option<Arc<Mutex<IndexRegistry>>>,
}

impl ScenarioRunner {
    /// Build the allocator for `role`. A subagent gets a gateway to a
    /// master registry living in the same process.
    pub fn new(role: AgentRole) -> Self {
        match role {
            AgentRole::Master => ScenarioRunner {
                allocator: IndexAllocator::local(),
                master: None,
            },
            AgentRole::Subagent => {
                let master = Arc::new(Mutex::new(IndexRegistry::new()));
                let gateway = SharedRegistryGateway::new(master.clone(), MASTER_NAME);
                ScenarioRunner {
                    allocator: IndexAllocator::delegated(gateway),
                    master: Some(master),
                }
            }
        }
    }

    pub fn allocator(&self) -> &IndexAllocator {
        &self.allocator
    }

    /// Apply one operation
    pub fn apply(&mut self, operation: &Operation) -> Result<StepOutput, RegistryError> {
        match operation {
            Operation::Register { prefix, request, owner } => self
                .allocator
                .register(prefix, request.clone(), *owner)
                .map(StepOutput::Allocated),
            Operation::Release { prefix, value } => {
                self.allocator.release(prefix, value).map(|_| StepOutput::Done)
            }
            Operation::Remove { prefix, value, owner } => self
                .allocator
                .remove(prefix, value, *owner)
                .map(|_| StepOutput::Done),
            Operation::ReleaseSession(owner) => {
                Ok(StepOutput::Released(self.allocator.release_all(*owner)))
            }
            Operation::Dump => Ok(StepOutput::Dumped(self.dump())),
        }
    }

    /// Allocation report of the local allocator, followed by the master's
    /// registry when running as a subagent
    pub fn dump(&self) -> String {
        let mut report = self.allocator.dump();
        if let Some(master) = &self.master {
            match master.lock() {
                Ok(registry) => report.push_str(&registry.dump()),
                Err(_) => warn!("Master registry lock is poisoned, skipping its dump"),
            }
        }
        report
    }

    fn snapshot(&self) -> Result<RegistrySnapshot> {
        match (&self.master, self.allocator.registry()) {
            (Some(master), _) => master
                .lock()
                .map(|registry| registry.snapshot())
                .map_err(|_| eyre!("Master registry lock is poisoned")),
            (None, Some(registry)) => Ok(registry.snapshot()),
            (None, None) => Ok(RegistrySnapshot::default()),
        }
    }

    /// Replay every operation of `config` in order
    pub fn run(mut self, config: &Config) -> Result<ScenarioReport> {
        let operations = config
            .resolved_operations()
            .wrap_err("Failed to resolve scenario operations")?;

        let mut steps = Vec::with_capacity(operations.len());
        for (index, (operation, expected)) in operations.into_iter().enumerate() {
            let position = index + 1;
            let outcome = self.apply(&operation);
            let step = StepReport {
                position,
                operation,
                expected,
                outcome,
            };

            match (&step.outcome, step.matched()) {
                (Ok(output), true) => debug!("#{} {:?} -> {:?}", position, step.operation, output),
                (Err(e), true) => debug!(
                    "#{} {:?} failed as expected: {}",
                    position, step.operation, e
                ),
                (Ok(output), false) => warn!(
                    "#{} {:?} succeeded with {:?}, expected {:?}",
                    position, step.operation, output, step.expected
                ),
                (Err(e), false) => warn!(
                    "#{} {:?} failed: {} (expected {:?})",
                    position, step.operation, e, step.expected
                ),
            }
            steps.push(step);
        }

        let final_dump = self.dump();
        let snapshot = self.snapshot()?;
        self.allocator.shutdown();

        info!(
            "Replayed {} operation(s); {} index value(s) registered",
            steps.len(),
            snapshot.prefixes.iter().map(|prefix| prefix.values.len()).sum::<usize>()
        );

        Ok(ScenarioReport {
            role: config.general.role,
            steps,
            final_dump,
            snapshot,
        })
    }
}

/// Replay a loaded scenario
pub fn run_scenario(config: &Config) -> Result<ScenarioReport> {
    ScenarioRunner::new(config.general.role).run(config)
}
