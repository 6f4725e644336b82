//! Page-side update controller.
//!
//! Tracks the registration's slots through [`RegistrationEvent`]s and
//! decides when to prompt and when to reload:
//!
//! ```text
//! NoUpdate ──(waiting worker seen, page controlled)──▶ UpdateWaiting
//! UpdateWaiting ──(accept: SKIP_WAITING posted)──▶ UpdateWaiting
//! UpdateWaiting ──(dismiss)──▶ NoUpdate
//! any ──(controller change, page was controlled or update accepted)──▶ Reloading
//! ```
//!
//! The reload happens at most once per page load.

use crate::host::{PageHost, Prompt};
use stacker_sw::registration::RegistrationSnapshot;
use stacker_sw::{ClientMessage, RegistrationEvent, SwResult, WorkerId, WorkerState};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Observable controller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdateState {
    #[default]
    NoUpdate,
    UpdateWaiting,
    Reloading,
}

impl fmt::Display for UpdateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateState::NoUpdate => write!(f, "no-update"),
            UpdateState::UpdateWaiting => write!(f, "update-waiting"),
            UpdateState::Reloading => write!(f, "reloading"),
        }
    }
}

/// Drives prompt and reload behaviour for one page load.
pub struct UpdateController<P: PageHost> {
    page: Arc<P>,
    state: UpdateState,
    /// Waiting worker the prompt refers to.
    pending: Option<WorkerId>,
    /// Worker reported by the latest `UpdateFound`.
    installing: Option<WorkerId>,
    /// Worker controlling this page.
    controller: Option<WorkerId>,
    /// The user asked a waiting worker to take over.
    accepted: bool,
    reloading: bool,
}

impl<P: PageHost> UpdateController<P> {
    pub fn new(page: Arc<P>) -> Self {
        Self {
            page,
            state: UpdateState::NoUpdate,
            pending: None,
            installing: None,
            controller: None,
            accepted: false,
            reloading: false,
        }
    }

    pub fn state(&self) -> UpdateState {
        self.state
    }

    /// Waiting worker the user has not yet answered for.
    pub fn pending(&self) -> Option<WorkerId> {
        self.pending
    }

    pub fn controller(&self) -> Option<WorkerId> {
        self.controller
    }

    /// The registration resolved. The active worker, if any, controls this
    /// page; a worker already waiting is offered straight away.
    pub fn on_registered(&mut self, snapshot: RegistrationSnapshot) {
        self.controller = snapshot.active;
        if let Some(waiting) = snapshot.waiting {
            self.offer(waiting);
        }
    }

    pub fn on_update_found(&mut self, installing: WorkerId) {
        debug!(worker = %installing, "Tracking installing worker");
        self.installing = Some(installing);
    }

    pub fn on_state_change(&mut self, worker: WorkerId, state: WorkerState) {
        match state {
            WorkerState::Installed if self.installing == Some(worker) => {
                self.installing = None;
                // First install: nothing to replace, so nothing to offer.
                if self.controller.is_some() {
                    self.offer(worker);
                }
            }
            WorkerState::Redundant => {
                if self.installing == Some(worker) {
                    self.installing = None;
                }
                if self.pending == Some(worker) {
                    debug!(%worker, "Waiting worker went away, withdrawing prompt");
                    self.pending = None;
                    self.set_state(UpdateState::NoUpdate);
                }
            }
            _ => {}
        }
    }

    /// The user accepted: tell the waiting worker to activate. The reload
    /// follows the controller change. Returns whether a message was posted.
    pub fn accept(&mut self) -> SwResult<bool> {
        let Some(worker) = self.pending.take() else {
            return Ok(false);
        };
        info!(%worker, "Update accepted, asking worker to skip waiting");
        self.page.post_message(worker, ClientMessage::SkipWaiting)?;
        self.accepted = true;
        Ok(true)
    }

    pub fn dismiss(&mut self) {
        if self.pending.take().is_some() && self.state == UpdateState::UpdateWaiting {
            self.set_state(UpdateState::NoUpdate);
        }
    }

    /// A new worker controls the page. Returns whether a reload was issued.
    pub fn on_controller_change(&mut self, controller: WorkerId) -> bool {
        if self.reloading {
            debug!(%controller, "Already reloading");
            return false;
        }
        let previous = self.controller.replace(controller);
        // An unprompted first install has nothing to swap out.
        if previous.is_none() && !self.accepted {
            debug!(%controller, "First controller for this page, not reloading");
            return false;
        }
        self.reloading = true;
        self.pending = None;
        self.set_state(UpdateState::Reloading);
        info!(%controller, "Controller changed, reloading");
        self.page.reload();
        true
    }

    /// Re-check for a deployment when the tab becomes visible again.
    pub async fn on_visibility_change(&self, visible: bool) {
        if !visible || self.reloading {
            return;
        }
        if let Err(e) = self.page.check_for_update().await {
            warn!(error = %e, "Update check failed");
        }
    }

    pub fn handle_event(&mut self, event: RegistrationEvent) {
        match event {
            RegistrationEvent::UpdateFound { installing } => self.on_update_found(installing),
            RegistrationEvent::StateChange { worker, state } => self.on_state_change(worker, state),
            RegistrationEvent::ControllerChange { controller } => {
                self.on_controller_change(controller);
            }
        }
    }

    /// Consume registration events until the registration is dropped.
    pub async fn run(&mut self, mut events: mpsc::UnboundedReceiver<RegistrationEvent>) {
        while let Some(event) = events.recv().await {
            self.handle_event(event);
        }
    }

    fn offer(&mut self, worker: WorkerId) {
        if self.reloading {
            return;
        }
        self.pending = Some(worker);
        if self.state != UpdateState::UpdateWaiting {
            self.set_state(UpdateState::UpdateWaiting);
            self.page.show_prompt(Prompt::UpdateAvailable);
        }
    }

    fn set_state(&mut self, state: UpdateState) {
        debug!(from = %self.state, to = %state, "Update state");
        self.state = state;
    }
}
