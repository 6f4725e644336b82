//! Recording [`PageHost`] for tests and headless runs.

use crate::host::{PageHost, Prompt};
use hashbrown::HashMap;
use serde_json::Value as JsonValue;
use stacker_sw::{ClientMessage, HostFuture, SwError, SwResult, WorkerId};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use url::Url;

/// Everything the page was asked to do, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageAction {
    Prompt(Prompt),
    PostMessage(WorkerId, ClientMessage),
    Reload,
    Event(String, JsonValue),
    CheckForUpdate,
    UnregisterAll,
    ClearCaches,
    Fetch(String),
}

/// A page that records every capability call.
#[derive(Debug, Default)]
pub struct MemoryPage {
    actions: Mutex<Vec<PageAction>>,
    statuses: Mutex<HashMap<String, u16>>,
    registrations: AtomicUsize,
    fail_unregister: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl MemoryPage {
    pub fn new() -> Self {
        Self {
            registrations: AtomicUsize::new(1),
            ..Default::default()
        }
    }

    /// Answer `fetch_no_store` for a URL with a status. Unset URLs fail.
    pub fn set_status(&self, url: &str, status: u16) {
        lock(&self.statuses).insert(url.to_string(), status);
    }

    /// Make `unregister_all` fail.
    pub fn fail_unregister(&self, fail: bool) {
        self.fail_unregister.store(fail, Ordering::SeqCst);
    }

    pub fn actions(&self) -> Vec<PageAction> {
        lock(&self.actions).clone()
    }

    pub fn prompts(&self) -> Vec<Prompt> {
        self.actions()
            .into_iter()
            .filter_map(|a| match a {
                PageAction::Prompt(prompt) => Some(prompt),
                _ => None,
            })
            .collect()
    }

    pub fn reloads(&self) -> usize {
        self.count(|a| matches!(a, PageAction::Reload))
    }

    pub fn posted(&self) -> Vec<(WorkerId, ClientMessage)> {
        self.actions()
            .into_iter()
            .filter_map(|a| match a {
                PageAction::PostMessage(worker, message) => Some((worker, message)),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, predicate: impl Fn(&PageAction) -> bool) -> usize {
        lock(&self.actions).iter().filter(|a| predicate(a)).count()
    }

    fn record(&self, action: PageAction) {
        lock(&self.actions).push(action);
    }
}

impl PageHost for MemoryPage {
    fn show_prompt(&self, prompt: Prompt) {
        self.record(PageAction::Prompt(prompt));
    }

    fn post_message(&self, worker: WorkerId, message: ClientMessage) -> SwResult<()> {
        self.record(PageAction::PostMessage(worker, message));
        Ok(())
    }

    fn reload(&self) {
        self.record(PageAction::Reload);
    }

    fn dispatch_event(&self, name: &str, detail: JsonValue) {
        self.record(PageAction::Event(name.to_string(), detail));
    }

    fn check_for_update(&self) -> HostFuture<'_, ()> {
        self.record(PageAction::CheckForUpdate);
        Box::pin(async { Ok(()) })
    }

    fn unregister_all(&self) -> HostFuture<'_, usize> {
        self.record(PageAction::UnregisterAll);
        Box::pin(async move {
            if self.fail_unregister.load(Ordering::SeqCst) {
                return Err(SwError::InvalidState("unregister rejected".into()));
            }
            Ok(self.registrations.swap(0, Ordering::SeqCst))
        })
    }

    fn clear_caches(&self) -> HostFuture<'_, usize> {
        self.record(PageAction::ClearCaches);
        Box::pin(async { Ok(0) })
    }

    fn fetch_no_store<'a>(&'a self, url: &'a Url) -> HostFuture<'a, u16> {
        self.record(PageAction::Fetch(url.to_string()));
        Box::pin(async move {
            lock(&self.statuses)
                .get(url.as_str())
                .copied()
                .ok_or_else(|| SwError::Network(format!("no route to {}", url)))
        })
    }
}
