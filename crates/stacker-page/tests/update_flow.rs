//! Update flow from a new deployment to the single reload

use stacker_core::ShellConfig;
use stacker_page::{MemoryPage, Prompt, UpdateController, UpdateState};
use stacker_sw::lifecycle;
use stacker_sw::{ClientMessage, MemoryHost, Registration, RegistrationEvent};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use url::Url;

fn shell() -> ShellConfig {
    ShellConfig {
        precache_urls: vec!["/manifest.json".to_string()],
        ..Default::default()
    }
}

fn script(tag: &str) -> Url {
    Url::parse(&format!("https://hours.example/sw.js?v={}", tag)).unwrap()
}

fn pump(controller: &mut UpdateController<MemoryPage>, rx: &mut UnboundedReceiver<RegistrationEvent>) {
    while let Ok(event) = rx.try_recv() {
        controller.handle_event(event);
    }
}

#[tokio::test]
async fn test_accept_update_reloads_once() {
    let host = Arc::new(MemoryHost::new());
    host.respond("https://hours.example/manifest.json", "{}");
    let shell = shell();
    let (mut registration, mut rx) = Registration::new(Url::parse("https://hours.example/").unwrap());

    // Deployment A is already in control when the page loads.
    let first = lifecycle::register(&mut registration, host.clone(), &shell, script("abc123"))
        .await
        .unwrap();
    lifecycle::activate(&mut registration, &first).await.unwrap();
    while rx.try_recv().is_ok() {}

    let page = Arc::new(MemoryPage::new());
    let mut controller = UpdateController::new(page.clone());
    controller.on_registered(registration.snapshot());
    assert_eq!(controller.state(), UpdateState::NoUpdate);

    // Deployment B installs and waits.
    let second = lifecycle::register(&mut registration, host.clone(), &shell, script("def456"))
        .await
        .unwrap();
    pump(&mut controller, &mut rx);
    assert_eq!(controller.state(), UpdateState::UpdateWaiting);
    assert_eq!(page.prompts(), vec![Prompt::UpdateAvailable]);
    assert_eq!(page.reloads(), 0);

    // The user accepts; the page posts SKIP_WAITING to the waiting worker.
    assert!(controller.accept().unwrap());
    let posted = page.posted();
    assert_eq!(posted.len(), 1);
    let (target, message) = posted[0];
    assert_eq!(Some(target), registration.snapshot().waiting);
    assert!(second.message(&message.to_value()).await.unwrap());
    assert_eq!(message, ClientMessage::SkipWaiting);

    // The worker activates and claims the page; the controller changes.
    lifecycle::activate(&mut registration, &second).await.unwrap();
    pump(&mut controller, &mut rx);
    assert_eq!(controller.state(), UpdateState::Reloading);
    assert_eq!(page.reloads(), 1);

    // A repeated controller-change signal does not reload again.
    controller.handle_event(RegistrationEvent::ControllerChange { controller: target });
    assert_eq!(page.reloads(), 1);
    assert!(!host.has_cache("hour-stacker-precache-abc123").await);
}

#[tokio::test]
async fn test_first_deploy_accepted_reloads_once() {
    let host = Arc::new(MemoryHost::new());
    host.respond("https://hours.example/manifest.json", "{}");
    let shell = shell();
    let (mut registration, mut rx) = Registration::new(Url::parse("https://hours.example/").unwrap());

    // The first deployment finished installing before the page loaded.
    let first = lifecycle::register(&mut registration, host.clone(), &shell, script("abc123"))
        .await
        .unwrap();
    while rx.try_recv().is_ok() {}

    let page = Arc::new(MemoryPage::new());
    let mut controller = UpdateController::new(page.clone());
    controller.on_registered(registration.snapshot());
    assert_eq!(controller.controller(), None);
    assert_eq!(controller.state(), UpdateState::UpdateWaiting);

    assert!(controller.accept().unwrap());
    lifecycle::activate(&mut registration, &first).await.unwrap();
    pump(&mut controller, &mut rx);

    assert_eq!(controller.state(), UpdateState::Reloading);
    assert_eq!(page.reloads(), 1, "accepted update must reload exactly once");
}

#[tokio::test]
async fn test_failed_update_keeps_old_worker_and_never_prompts() {
    let host = Arc::new(MemoryHost::new());
    host.respond("https://hours.example/manifest.json", "{}");
    let shell = shell();
    let (mut registration, mut rx) = Registration::new(Url::parse("https://hours.example/").unwrap());

    let first = lifecycle::register(&mut registration, host.clone(), &shell, script("abc123"))
        .await
        .unwrap();
    let active = registration.waiting.as_ref().map(|w| w.id);
    lifecycle::activate(&mut registration, &first).await.unwrap();
    while rx.try_recv().is_ok() {}

    let page = Arc::new(MemoryPage::new());
    let mut controller = UpdateController::new(page.clone());
    controller.on_registered(registration.snapshot());

    host.set_offline(true);
    assert!(
        lifecycle::register(&mut registration, host.clone(), &shell, script("def456"))
            .await
            .is_err()
    );
    pump(&mut controller, &mut rx);

    assert_eq!(controller.state(), UpdateState::NoUpdate);
    assert!(page.prompts().is_empty());
    assert_eq!(registration.snapshot().active, active);
    assert!(host.has_cache("hour-stacker-precache-abc123").await);
}
