//! Timer actor through the system facade: virtual-clock determinism,
//! ordering, cancellation, and cleanup on actor stop.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use locus_rt::prelude::*;

struct Recorder {
    seen: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Behavior for Recorder {
    async fn on_message(&mut self, input: MessageInput<'_>) -> Result<MessagePlan, HandlerError> {
        self.seen.lock().push(input.msg.kind().to_string());
        Ok(MessagePlan::Noop)
    }
}

async fn virtual_system() -> ActorSystem {
    let config = SystemConfig::builder().with_virtual_clock(true).build().unwrap();
    let system = ActorSystem::create(config).unwrap();
    system.start().await.unwrap();
    system
}

async fn spawn_recorder(system: &ActorSystem) -> (Address, Arc<Mutex<Vec<String>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_factory = Arc::clone(&seen);
    let address = system
        .spawn(
            move || Recorder {
                seen: Arc::clone(&seen_factory),
            },
            SpawnOptions::new().with_kind("recorder"),
        )
        .await
        .unwrap();
    (address, seen)
}

async fn observed(seen: &Arc<Mutex<Vec<String>>>) -> Vec<String> {
    // Delivery enqueues to the mailbox; give the actor a beat to drain it.
    tokio::time::sleep(Duration::from_millis(30)).await;
    seen.lock().clone()
}

#[tokio::test]
async fn test_virtual_clock_delivers_in_deadline_order() {
    let system = virtual_system().await;
    let (actor, seen) = spawn_recorder(&system).await;

    let timer = system.timer();
    timer.schedule(actor.clone(), Envelope::new("MSG_50"), Duration::from_millis(50), None);
    timer.schedule(actor.clone(), Envelope::new("MSG_100"), Duration::from_millis(100), None);
    timer.schedule(actor.clone(), Envelope::new("MSG_200"), Duration::from_millis(200), None);

    timer.advance_time(50).await.unwrap();
    assert_eq!(observed(&seen).await, vec!["MSG_50"]);

    timer.advance_time(50).await.unwrap();
    assert_eq!(observed(&seen).await, vec!["MSG_50", "MSG_100"]);

    timer.advance_time(100).await.unwrap();
    assert_eq!(observed(&seen).await, vec!["MSG_50", "MSG_100", "MSG_200"]);

    system.stop().await.unwrap();
}

#[tokio::test]
async fn test_equal_deadlines_keep_insertion_order() {
    let system = virtual_system().await;
    let (actor, seen) = spawn_recorder(&system).await;

    let timer = system.timer();
    for name in ["FIRST", "SECOND", "THIRD"] {
        timer.schedule(actor.clone(), Envelope::new(name), Duration::from_millis(10), None);
    }

    timer.advance_time(10).await.unwrap();
    assert_eq!(observed(&seen).await, vec!["FIRST", "SECOND", "THIRD"]);

    system.stop().await.unwrap();
}

#[tokio::test]
async fn test_cancel_prevents_delivery() {
    let system = virtual_system().await;
    let (actor, seen) = spawn_recorder(&system).await;

    let timer = system.timer();
    let id = timer.schedule(
        actor.clone(),
        Envelope::new("CANCELLED"),
        Duration::from_millis(10),
        Some("tick".into()),
    );
    assert_eq!(id, "tick");
    assert!(timer.cancel(&id));

    timer.advance_time(50).await.unwrap();
    assert!(observed(&seen).await.is_empty());

    system.stop().await.unwrap();
}

#[tokio::test]
async fn test_scheduled_snapshot() {
    let system = virtual_system().await;
    let (actor, _seen) = spawn_recorder(&system).await;

    let timer = system.timer();
    timer.schedule(actor.clone(), Envelope::new("LATER"), Duration::from_millis(100), None);
    timer.schedule(actor.clone(), Envelope::new("SOON"), Duration::from_millis(10), None);

    let entries = timer.scheduled();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].envelope.kind(), "SOON");

    system.stop().await.unwrap();
}

#[tokio::test]
async fn test_stopping_actor_cancels_its_timers() {
    let system = virtual_system().await;
    let (actor, seen) = spawn_recorder(&system).await;

    system.timer().schedule(
        actor.clone(),
        Envelope::new("NEVER"),
        Duration::from_millis(50),
        None,
    );
    system.stop_actor(&actor).await.unwrap();
    assert!(system.timer().is_empty());

    system.timer().advance_time(100).await.unwrap();
    assert!(observed(&seen).await.is_empty());

    system.stop().await.unwrap();
}

#[tokio::test]
async fn test_flush_with_time_delivers_everything_due() {
    let system = virtual_system().await;
    let (actor, seen) = spawn_recorder(&system).await;

    let timer = system.timer();
    timer.schedule(actor.clone(), Envelope::new("A"), Duration::from_millis(30), None);
    timer.schedule(actor.clone(), Envelope::new("B"), Duration::from_millis(70), None);

    timer.flush_with_time(100).await.unwrap();
    assert_eq!(observed(&seen).await, vec!["A", "B"]);

    system.stop().await.unwrap();
}

#[tokio::test]
async fn test_monotonic_clock_rejects_advance() {
    let system = {
        let system = ActorSystem::create(SystemConfig::default()).unwrap();
        system.start().await.unwrap();
        system
    };

    let result = system.timer().advance_time(10).await;
    assert!(result.is_err());

    system.stop().await.unwrap();
}

#[tokio::test]
async fn test_production_clock_delivers_after_delay() {
    let system = {
        let system = ActorSystem::create(SystemConfig::default()).unwrap();
        system.start().await.unwrap();
        system
    };
    let (actor, seen) = spawn_recorder(&system).await;

    system.timer().schedule(
        actor.clone(),
        Envelope::new("TICK"),
        Duration::from_millis(50),
        None,
    );

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(seen.lock().is_empty());

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(seen.lock().clone(), vec!["TICK"]);

    system.stop().await.unwrap();
}
