//! Discovery-to-registration workflow
//!
//! One `Workflow` per operator session. It owns the phase machine
//!
//! ```text
//! Idle -> Scanning -> Scanned -> Registering -> Completed
//!           ^            |  ^                      |
//!           +------------+  +------ dismiss -------+
//! ```
//!
//! and glues the discovery orchestrator, the selection set and the batch
//! engine together. Every scan, including a rescan from `Scanned` or
//! `Completed`, empties the selection.

pub mod batch;
pub mod discovery;
pub mod report;
pub mod selection;

pub use batch::BatchEngine;
pub use discovery::{Discovery, DiscoveryOrchestrator, ScanSource};
pub use report::{discovery_table, present};
pub use selection::SelectionSet;

use crate::error::{ValidationError, WorkflowError};
use crate::models::{BatchResult, OltId, ProfileId, RegistrationEntry};
use crate::service::ProvisioningService;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Scanning,
    Scanned,
    Registering,
    Completed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Scanning => "scanning",
            Self::Scanned => "scanned",
            Self::Registering => "registering",
            Self::Completed => "completed",
        })
    }
}

#[derive(Debug)]
struct Session {
    phase: Phase,
    selection: SelectionSet,
    result: Option<BatchResult>,
}

pub struct Workflow {
    discovery: DiscoveryOrchestrator,
    engine: BatchEngine,
    session: Mutex<Session>,
}

/// Puts the phase back if an in-flight operation fails or is dropped
struct PhaseRestore<'a> {
    session: &'a Mutex<Session>,
    phase: Option<Phase>,
}

impl PhaseRestore<'_> {
    fn disarm(mut self) {
        self.phase = None;
    }
}

impl Drop for PhaseRestore<'_> {
    fn drop(&mut self) {
        if let Some(phase) = self.phase.take() {
            lock(self.session).phase = phase;
        }
    }
}

fn lock(session: &Mutex<Session>) -> MutexGuard<'_, Session> {
    session.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Workflow {
    pub fn new(service: Arc<dyn ProvisioningService>) -> Self {
        Self {
            discovery: DiscoveryOrchestrator::new(Arc::clone(&service)),
            engine: BatchEngine::new(service),
            session: Mutex::new(Session {
                phase: Phase::Idle,
                selection: SelectionSet::new(),
                result: None,
            }),
        }
    }

    pub fn phase(&self) -> Phase {
        lock(&self.session).phase
    }

    /// Scan `olt` and make the result the current sequence
    pub async fn scan(&self, olt: &OltId) -> Result<Arc<Discovery>, WorkflowError> {
        let previous = {
            let mut session = lock(&self.session);
            match session.phase {
                Phase::Scanning => return Err(WorkflowError::ScanInProgress),
                Phase::Registering => {
                    return Err(WorkflowError::InvalidState {
                        action: "scan",
                        phase: Phase::Registering,
                    })
                }
                phase => {
                    session.phase = Phase::Scanning;
                    phase
                }
            }
        };
        let restore = PhaseRestore {
            session: &self.session,
            phase: Some(previous),
        };

        let discovery = self.discovery.scan(olt).await?;

        let mut session = lock(&self.session);
        session.selection.reset(discovery.generation, discovery.devices.len());
        session.result = None;
        session.phase = Phase::Scanned;
        drop(session);
        restore.disarm();

        Ok(discovery)
    }

    /// The sequence from the last successful scan
    pub fn discovery(&self) -> Option<Arc<Discovery>> {
        self.discovery.current()
    }

    pub fn toggle(&self, position: usize) -> Result<bool, WorkflowError> {
        let mut session = self.scanned_session("change the selection")?;
        session.selection.toggle(position)
    }

    /// Select every device, or clear the selection if all are selected
    pub fn toggle_all(&self) -> Result<(), WorkflowError> {
        let mut session = self.scanned_session("change the selection")?;
        session.selection.toggle_all();
        Ok(())
    }

    pub fn selection(&self) -> SelectionSet {
        lock(&self.session).selection.clone()
    }

    /// Register the selected devices on `olt` using `profile`
    pub async fn register(
        &self,
        olt: Option<&OltId>,
        profile: Option<&ProfileId>,
    ) -> Result<BatchResult, WorkflowError> {
        let entries = {
            let mut session = lock(&self.session);
            if session.phase == Phase::Registering {
                return Err(WorkflowError::RegisterInProgress);
            }

            let current = self.discovery.current();
            let entries = match &current {
                Some(discovery) => {
                    if !session.selection.is_current(discovery.generation) {
                        session.selection.reset(discovery.generation, discovery.devices.len());
                    }
                    selected_entries(discovery, &session.selection)
                }
                None => Vec::new(),
            };

            let (olt, _) = batch::validate(olt, profile, &entries)?;
            if session.phase != Phase::Scanned {
                return Err(WorkflowError::InvalidState {
                    action: "register",
                    phase: session.phase,
                });
            }
            if let Some(discovery) = &current {
                if &discovery.olt != olt {
                    return Err(ValidationError::OltMismatch {
                        scanned: discovery.olt.clone(),
                        requested: olt.clone(),
                    }
                    .into());
                }
            }

            session.phase = Phase::Registering;
            entries
        };
        let restore = PhaseRestore {
            session: &self.session,
            phase: Some(Phase::Scanned),
        };

        let result = self.engine.register(olt, profile, &entries).await?;

        let mut session = lock(&self.session);
        session.result = Some(result.clone());
        session.phase = Phase::Completed;
        drop(session);
        restore.disarm();

        Ok(result)
    }

    /// The batch result held until the operator dismisses it
    pub fn result(&self) -> Option<BatchResult> {
        lock(&self.session).result.clone()
    }

    /// Close the result view and return to the scanned sequence
    pub fn dismiss(&self) -> Result<(), WorkflowError> {
        let mut session = lock(&self.session);
        if session.phase != Phase::Completed {
            return Err(WorkflowError::InvalidState {
                action: "dismiss a result",
                phase: session.phase,
            });
        }
        session.result = None;
        session.phase = Phase::Scanned;
        Ok(())
    }

    fn scanned_session(&self, action: &'static str) -> Result<MutexGuard<'_, Session>, WorkflowError> {
        let session = lock(&self.session);
        match session.phase {
            Phase::Scanned => Ok(session),
            phase => Err(WorkflowError::InvalidState { action, phase }),
        }
    }
}

/// Entries for the selected positions, in ascending position order
fn selected_entries(discovery: &Discovery, selection: &SelectionSet) -> Vec<RegistrationEntry> {
    selection
        .positions()
        .into_iter()
        .filter_map(|p| discovery.devices.get(p))
        .map(RegistrationEntry::from)
        .collect()
}
