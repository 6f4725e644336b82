//! Registration lifecycle: installing → waiting → active.
//!
//! At most one worker is active per scope. A waiting worker coexists with
//! the active one until it is promoted, at which point the old one becomes
//! redundant and the page's controller changes.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, info};
use url::Url;

/// Unique identifier for a worker instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkerId(u64);

impl WorkerId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker-{}", self.0)
    }
}

/// Service worker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkerState {
    /// Script fetched and parsed.
    #[default]
    Parsed,
    /// Install handler running.
    Installing,
    /// Installed, waiting to take control.
    Installed,
    /// Activate handler running.
    Activating,
    /// Active and controlling pages.
    Activated,
    /// Replaced, unregistered, or failed to install.
    Redundant,
}

/// A worker instance known to a registration.
#[derive(Debug, Clone)]
pub struct WorkerInfo {
    pub id: WorkerId,
    pub script_url: Url,
    pub state: WorkerState,
    pub state_changed_at: Instant,
}

impl WorkerInfo {
    fn new(script_url: Url) -> Self {
        Self {
            id: WorkerId::new(),
            script_url,
            state: WorkerState::Parsed,
            state_changed_at: Instant::now(),
        }
    }

    fn set_state(&mut self, state: WorkerState) {
        self.state = state;
        self.state_changed_at = Instant::now();
    }
}

/// Events observed by pages holding the registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationEvent {
    /// A new worker entered the installing slot.
    UpdateFound { installing: WorkerId },
    /// A worker changed state.
    StateChange { worker: WorkerId, state: WorkerState },
    /// Pages in scope are now controlled by `controller`.
    ControllerChange { controller: WorkerId },
}

/// Ids currently occupying each slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistrationSnapshot {
    pub installing: Option<WorkerId>,
    pub waiting: Option<WorkerId>,
    pub active: Option<WorkerId>,
}

/// A service worker registration for one scope.
#[derive(Debug)]
pub struct Registration {
    /// Scope URL.
    pub scope: Url,

    /// Installing worker.
    pub installing: Option<WorkerInfo>,

    /// Waiting worker (installed but not active).
    pub waiting: Option<WorkerInfo>,

    /// Active worker.
    pub active: Option<WorkerInfo>,

    events: mpsc::UnboundedSender<RegistrationEvent>,
}

impl Registration {
    /// Create a registration and the receiver its events are sent to.
    pub fn new(scope: Url) -> (Self, mpsc::UnboundedReceiver<RegistrationEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        (
            Self {
                scope,
                installing: None,
                waiting: None,
                active: None,
                events,
            },
            rx,
        )
    }

    pub fn snapshot(&self) -> RegistrationSnapshot {
        RegistrationSnapshot {
            installing: self.installing.as_ref().map(|w| w.id),
            waiting: self.waiting.as_ref().map(|w| w.id),
            active: self.active.as_ref().map(|w| w.id),
        }
    }

    /// Start installing a new script; any previous installing worker is
    /// discarded.
    pub fn begin_install(&mut self, script_url: Url) -> WorkerId {
        if let Some(mut previous) = self.installing.take() {
            previous.set_state(WorkerState::Redundant);
            self.emit_state(&previous);
        }
        let mut worker = WorkerInfo::new(script_url);
        let id = worker.id;
        debug!(worker = %id, script = %worker.script_url, "Update found");
        self.emit(RegistrationEvent::UpdateFound { installing: id });
        worker.set_state(WorkerState::Installing);
        self.emit_state(&worker);
        self.installing = Some(worker);
        id
    }

    /// Transition installing to waiting. Returns the waiting worker's id.
    pub fn install_complete(&mut self) -> Option<WorkerId> {
        let mut worker = self.installing.take()?;
        worker.set_state(WorkerState::Installed);
        self.emit_state(&worker);
        if let Some(mut superseded) = self.waiting.replace(worker) {
            superseded.set_state(WorkerState::Redundant);
            self.emit_state(&superseded);
        }
        self.waiting.as_ref().map(|w| w.id)
    }

    /// The installing worker failed; it becomes redundant.
    pub fn install_failed(&mut self) -> Option<WorkerId> {
        let mut worker = self.installing.take()?;
        worker.set_state(WorkerState::Redundant);
        self.emit_state(&worker);
        Some(worker.id)
    }

    /// Promote the waiting worker to active. The old active worker becomes
    /// redundant and every page's controller changes.
    pub fn activate(&mut self) -> Option<WorkerId> {
        let mut worker = self.waiting.take()?;
        worker.set_state(WorkerState::Activating);
        self.emit_state(&worker);

        if let Some(mut old) = self.active.take() {
            old.set_state(WorkerState::Redundant);
            self.emit_state(&old);
        }

        worker.set_state(WorkerState::Activated);
        self.emit_state(&worker);
        let id = worker.id;
        self.active = Some(worker);
        info!(worker = %id, scope = %self.scope, "Worker took control");
        self.emit(RegistrationEvent::ControllerChange { controller: id });
        Some(id)
    }

    /// Unregister: every worker becomes redundant.
    pub fn unregister(&mut self) {
        for mut worker in [
            self.installing.take(),
            self.waiting.take(),
            self.active.take(),
        ]
        .into_iter()
        .flatten()
        {
            worker.set_state(WorkerState::Redundant);
            self.emit_state(&worker);
        }
    }

    fn emit_state(&self, worker: &WorkerInfo) {
        self.emit(RegistrationEvent::StateChange {
            worker: worker.id,
            state: worker.state,
        });
    }

    fn emit(&self, event: RegistrationEvent) {
        // No listener left is fine: pages may have gone away.
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration() -> (Registration, mpsc::UnboundedReceiver<RegistrationEvent>) {
        Registration::new(Url::parse("https://hours.example/").unwrap())
    }

    fn script(tag: &str) -> Url {
        Url::parse(&format!("https://hours.example/sw.js?v={}", tag)).unwrap()
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<RegistrationEvent>) -> Vec<RegistrationEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_registration_lifecycle() {
        let (mut registration, mut rx) = registration();

        let id = registration.begin_install(script("a"));
        assert_eq!(registration.snapshot().installing, Some(id));

        assert_eq!(registration.install_complete(), Some(id));
        assert!(registration.installing.is_none());
        assert_eq!(registration.snapshot().waiting, Some(id));

        assert_eq!(registration.activate(), Some(id));
        assert!(registration.waiting.is_none());
        assert_eq!(
            registration.active.as_ref().map(|w| w.state),
            Some(WorkerState::Activated)
        );

        let events = drain(&mut rx);
        assert_eq!(events.first(), Some(&RegistrationEvent::UpdateFound { installing: id }));
        assert_eq!(
            events.last(),
            Some(&RegistrationEvent::ControllerChange { controller: id })
        );
    }

    #[test]
    fn test_waiting_coexists_with_active() {
        let (mut registration, _rx) = registration();
        registration.begin_install(script("a"));
        registration.install_complete();
        let first = registration.activate().unwrap();

        let second = registration.begin_install(script("b"));
        registration.install_complete();

        let snapshot = registration.snapshot();
        assert_eq!(snapshot.active, Some(first));
        assert_eq!(snapshot.waiting, Some(second));

        registration.activate();
        assert_eq!(registration.snapshot().active, Some(second));
        assert_eq!(registration.snapshot().waiting, None);
    }

    #[test]
    fn test_old_active_becomes_redundant() {
        let (mut registration, mut rx) = registration();
        registration.begin_install(script("a"));
        registration.install_complete();
        let first = registration.activate().unwrap();
        drain(&mut rx);

        registration.begin_install(script("b"));
        registration.install_complete();
        registration.activate();

        assert!(drain(&mut rx).contains(&RegistrationEvent::StateChange {
            worker: first,
            state: WorkerState::Redundant,
        }));
    }

    #[test]
    fn test_install_failure_leaves_active_in_control() {
        let (mut registration, _rx) = registration();
        registration.begin_install(script("a"));
        registration.install_complete();
        let first = registration.activate().unwrap();

        registration.begin_install(script("b"));
        registration.install_failed();

        let snapshot = registration.snapshot();
        assert_eq!(snapshot.active, Some(first));
        assert_eq!(snapshot.installing, None);
        assert_eq!(snapshot.waiting, None);
    }

    #[test]
    fn test_activate_without_waiting_is_noop() {
        let (mut registration, mut rx) = registration();
        assert_eq!(registration.activate(), None);
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_unregister() {
        let (mut registration, _rx) = registration();
        registration.begin_install(script("a"));
        registration.install_complete();
        registration.activate();
        registration.begin_install(script("b"));

        registration.unregister();
        assert_eq!(registration.snapshot(), RegistrationSnapshot::default());
    }
}
