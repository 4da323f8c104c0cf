//! Integration tests for the layersync crate
//!
//! These tests drive whole passes through the scheduler and check visit
//! order, lifecycle events and the persisted last-sync timestamp.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Barrier, Mutex};
use std::time::Duration;

use anyhow::bail;
use layersync::{
    Account, AccountSelector, CancellationFlag, ChannelEventSink, Extras, InMemorySyncStore,
    LocalHost, PassOutcome, ResourceGroup, ScheduleStore, SettingsStore, SqliteSyncStore,
    SyncError, SyncEvent, SyncResult, SyncScheduler, SyncTrigger, SyncableResource,
};
use tempfile::TempDir;

const TYPE: &str = "org.layersync.account";
const AUTH: &str = "org.layersync.provider";

/// What a test leaf does when synced
#[derive(Clone, Copy)]
enum Behavior {
    Succeed,
    Fail,
    /// Succeed, then cancel the pass through the flag
    CancelAfter,
}

struct TestLeaf {
    id: &'static str,
    behavior: Behavior,
    visits: Arc<Mutex<Vec<&'static str>>>,
}

impl SyncableResource for TestLeaf {
    fn id(&self) -> &str {
        self.id
    }

    fn sync(
        &self,
        _authority: &str,
        cancel: &CancellationFlag,
        _result: &mut SyncResult,
    ) -> anyhow::Result<()> {
        self.visits.lock().unwrap().push(self.id);
        match self.behavior {
            Behavior::Succeed => Ok(()),
            Behavior::Fail => bail!("{} rejected by server", self.id),
            Behavior::CancelAfter => {
                cancel.request_cancel();
                Ok(())
            }
        }
    }
}

struct World {
    scheduler: Arc<SyncScheduler>,
    store: Arc<InMemorySyncStore>,
    events: Receiver<SyncEvent>,
    visits: Arc<Mutex<Vec<&'static str>>>,
}

impl World {
    fn new() -> Self {
        let store = Arc::new(InMemorySyncStore::new());
        let host = Arc::new(LocalHost::new(store.clone()));
        host.add_account(Account::new("alice", TYPE)).unwrap();
        host.add_account(Account::new("bob", TYPE)).unwrap();

        let (tx, rx) = mpsc::channel();
        let scheduler = Arc::new(SyncScheduler::new(
            TYPE,
            host,
            Arc::new(ChannelEventSink::new(tx)),
            store.clone(),
        ));

        Self {
            scheduler,
            store,
            events: rx,
            visits: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn leaf(&self, id: &'static str, behavior: Behavior) -> Arc<dyn SyncableResource> {
        Arc::new(TestLeaf {
            id,
            behavior,
            visits: self.visits.clone(),
        })
    }

    /// Group[Leaf1, Group[Leaf2, Leaf3]]
    fn scenario_tree(&self, leaf1: Behavior, leaf2: Behavior) -> ResourceGroup {
        ResourceGroup::new()
            .with_leaf(self.leaf("leaf1", leaf1))
            .with_group(
                ResourceGroup::new()
                    .with_leaf(self.leaf("leaf2", leaf2))
                    .with_leaf(self.leaf("leaf3", Behavior::Succeed)),
            )
    }

    fn events(&self) -> Vec<SyncEvent> {
        self.events.try_iter().collect()
    }

    fn visits(&self) -> Vec<&'static str> {
        self.visits.lock().unwrap().clone()
    }

    fn trigger(account: &str) -> SyncTrigger {
        SyncTrigger::new(Account::new(account, TYPE), AUTH)
    }
}

#[test]
fn test_all_leaves_succeed() {
    let world = World::new();
    let tree = world.scenario_tree(Behavior::Succeed, Behavior::Succeed);
    world.scheduler.set_root(Some(Arc::new(tree)));

    let report = world.scheduler.perform_sync(&World::trigger("alice")).unwrap();

    assert_eq!(report.outcome, PassOutcome::Finished);
    assert_eq!(world.visits(), vec!["leaf1", "leaf2", "leaf3"]);
    assert_eq!(world.events(), vec![SyncEvent::Start, SyncEvent::Finish]);
    assert!(world.store.last_sync_timestamp().unwrap().is_some());
    assert_eq!(report.result.resources_synced, 3);
}

#[test]
fn test_cancel_after_first_leaf() {
    let world = World::new();
    let tree = world.scenario_tree(Behavior::CancelAfter, Behavior::Succeed);
    world.scheduler.set_root(Some(Arc::new(tree)));

    let report = world.scheduler.perform_sync(&World::trigger("alice")).unwrap();

    assert_eq!(report.outcome, PassOutcome::Canceled);
    assert_eq!(world.visits(), vec!["leaf1"]);
    assert_eq!(world.events(), vec![SyncEvent::Start, SyncEvent::Canceled]);
    assert_eq!(world.store.last_sync_timestamp().unwrap(), None);
}

#[test]
fn test_failing_leaf_does_not_stop_pass() {
    let world = World::new();
    let tree = world.scenario_tree(Behavior::Succeed, Behavior::Fail);
    world.scheduler.set_root(Some(Arc::new(tree)));

    let report = world.scheduler.perform_sync(&World::trigger("alice")).unwrap();

    assert_eq!(report.outcome, PassOutcome::Finished);
    assert_eq!(world.visits(), vec!["leaf1", "leaf2", "leaf3"]);
    assert_eq!(world.events(), vec![SyncEvent::Start, SyncEvent::Finish]);
    assert_eq!(report.result.error_count(), 1);
    assert_eq!(report.result.failures[0].resource_id, "leaf2");
    assert!(world.store.last_sync_timestamp().unwrap().is_some());
}

#[test]
fn test_timestamp_survives_cancelled_pass() {
    let world = World::new();
    world
        .scheduler
        .set_root(Some(Arc::new(world.scenario_tree(Behavior::Succeed, Behavior::Succeed))));
    world.scheduler.perform_sync(&World::trigger("alice")).unwrap();
    let first = world.store.last_sync_timestamp().unwrap();
    assert!(first.is_some());

    world
        .scheduler
        .set_root(Some(Arc::new(world.scenario_tree(Behavior::CancelAfter, Behavior::Succeed))));
    world.scheduler.perform_sync(&World::trigger("alice")).unwrap();
    assert_eq!(world.store.last_sync_timestamp().unwrap(), first);
}

#[test]
fn test_changes_event_when_leaves_apply_changes() {
    struct Changer;

    impl SyncableResource for Changer {
        fn id(&self) -> &str {
            "changer"
        }

        fn sync(
            &self,
            _authority: &str,
            _cancel: &CancellationFlag,
            result: &mut SyncResult,
        ) -> anyhow::Result<()> {
            result.record_changes(7);
            Ok(())
        }
    }

    let world = World::new();
    let changer: Arc<dyn SyncableResource> = Arc::new(Changer);
    world
        .scheduler
        .set_root(Some(Arc::new(ResourceGroup::new().with_leaf(changer))));

    let report = world.scheduler.perform_sync(&World::trigger("alice")).unwrap();
    assert_eq!(report.result.changes, 7);
    assert_eq!(
        world.events(),
        vec![SyncEvent::Start, SyncEvent::Changes, SyncEvent::Finish]
    );
}

/// Leaf that parks until released, so tests can act while a pass is in flight
struct Gate {
    entered: Arc<Barrier>,
    release: Mutex<Receiver<()>>,
}

impl SyncableResource for Gate {
    fn id(&self) -> &str {
        "gate"
    }

    fn sync(&self, _: &str, cancel: &CancellationFlag, _: &mut SyncResult) -> anyhow::Result<()> {
        self.entered.wait();
        let release = self.release.lock().unwrap();
        while !cancel.is_cancelled() {
            if release.recv_timeout(Duration::from_millis(10)).is_ok() {
                break;
            }
        }
        Ok(())
    }
}

fn gated_world() -> (World, Arc<Barrier>, mpsc::Sender<()>) {
    let world = World::new();
    let entered = Arc::new(Barrier::new(2));
    let (release_tx, release_rx) = mpsc::channel();
    let gate: Arc<dyn SyncableResource> = Arc::new(Gate {
        entered: entered.clone(),
        release: Mutex::new(release_rx),
    });
    let tree = ResourceGroup::new()
        .with_leaf(gate)
        .with_leaf(world.leaf("after-gate", Behavior::Succeed));
    world.scheduler.set_root(Some(Arc::new(tree)));
    (world, entered, release_tx)
}

#[test]
fn test_out_of_band_cancel() {
    let (world, entered, _release) = gated_world();
    let scheduler = world.scheduler.clone();
    let pass = std::thread::spawn(move || scheduler.perform_sync(&World::trigger("alice")));

    entered.wait();
    assert!(world.scheduler.is_syncing("alice", AUTH));
    assert!(world.scheduler.cancel_sync("alice", AUTH));

    let report = pass.join().unwrap().unwrap();
    assert_eq!(report.outcome, PassOutcome::Canceled);
    assert_eq!(world.visits(), Vec::<&str>::new());
    assert_eq!(world.events(), vec![SyncEvent::Start, SyncEvent::Canceled]);
    assert_eq!(world.store.last_sync_timestamp().unwrap(), None);

    // Late cancel after the pass ended is ignored
    assert!(!world.scheduler.cancel_sync("alice", AUTH));
    assert!(world.events().is_empty());
}

#[test]
fn test_concurrent_trigger_for_same_pair_rejected() {
    let (world, entered, release) = gated_world();
    let scheduler = world.scheduler.clone();
    let pass = std::thread::spawn(move || scheduler.perform_sync(&World::trigger("alice")));

    entered.wait();
    let err = world
        .scheduler
        .perform_sync(&World::trigger("alice"))
        .unwrap_err();
    assert!(matches!(err, SyncError::AlreadyRunning { .. }));

    release.send(()).unwrap();
    let report = pass.join().unwrap().unwrap();
    assert_eq!(report.outcome, PassOutcome::Finished);
    assert_eq!(world.visits(), vec!["after-gate"]);
}

/// Leaf that holds every pass inside it until the test lets them all go
struct Parked {
    entered: Arc<Barrier>,
    released: Arc<AtomicBool>,
}

impl SyncableResource for Parked {
    fn id(&self) -> &str {
        "parked"
    }

    fn sync(
        &self,
        _authority: &str,
        cancel: &CancellationFlag,
        result: &mut SyncResult,
    ) -> anyhow::Result<()> {
        self.entered.wait();
        while !cancel.is_cancelled() && !self.released.load(Ordering::SeqCst) {
            std::thread::sleep(Duration::from_millis(5));
        }
        if !cancel.is_cancelled() {
            result.record_changes(1);
        }
        Ok(())
    }
}

#[test]
fn test_cancel_one_pair_while_another_runs() {
    let world = World::new();
    let entered = Arc::new(Barrier::new(3));
    let released = Arc::new(AtomicBool::new(false));
    let parked: Arc<dyn SyncableResource> = Arc::new(Parked {
        entered: entered.clone(),
        released: released.clone(),
    });
    let tree = ResourceGroup::new()
        .with_leaf(parked)
        .with_leaf(world.leaf("after-park", Behavior::Succeed));
    world.scheduler.set_root(Some(Arc::new(tree)));

    let passes: Vec<_> = ["alice", "bob"]
        .into_iter()
        .map(|account| {
            let scheduler = world.scheduler.clone();
            std::thread::spawn(move || scheduler.perform_sync(&World::trigger(account)))
        })
        .collect();

    // Both passes are inside the parked leaf at once
    entered.wait();
    assert!(world.scheduler.is_syncing("alice", AUTH));
    assert!(world.scheduler.is_syncing("bob", AUTH));

    assert!(world.scheduler.cancel_sync("alice", AUTH));
    assert!(world.scheduler.is_syncing("bob", AUTH));
    released.store(true, Ordering::SeqCst);

    let mut reports = passes.into_iter().map(|pass| pass.join().unwrap().unwrap());
    let alice = reports.next().unwrap();
    let bob = reports.next().unwrap();

    assert_eq!(alice.account, "alice");
    assert_eq!(alice.outcome, PassOutcome::Canceled);
    assert_eq!(alice.result.resources_synced, 1);
    assert_eq!(alice.result.changes, 0);

    assert_eq!(bob.account, "bob");
    assert_eq!(bob.outcome, PassOutcome::Finished);
    assert_eq!(bob.result.resources_synced, 2);
    assert_eq!(bob.result.changes, 1);

    // Only bob reached the leaf after the parked one
    assert_eq!(world.visits(), vec!["after-park"]);

    let events = world.events();
    let count = |event: SyncEvent| events.iter().filter(|e| **e == event).count();
    assert_eq!(count(SyncEvent::Start), 2);
    assert_eq!(count(SyncEvent::Canceled), 1);
    assert_eq!(count(SyncEvent::Changes), 1);
    assert_eq!(count(SyncEvent::Finish), 1);
    assert!(world.store.last_sync_timestamp().unwrap().is_some());
    assert!(!world.scheduler.is_syncing("alice", AUTH));
    assert!(!world.scheduler.is_syncing("bob", AUTH));
}

#[test]
fn test_idempotent_scheduling_persists() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("sync.db");

    {
        let store = Arc::new(SqliteSyncStore::new(&db_path).unwrap());
        let host = Arc::new(LocalHost::new(store.clone()));
        host.add_account(Account::new("alice", TYPE)).unwrap();
        let scheduler = SyncScheduler::new(
            TYPE,
            host,
            Arc::new(|_: SyncEvent| {}),
            store.clone(),
        );

        let alice = AccountSelector::named("alice");
        scheduler.schedule(&alice, AUTH, &Extras::new(), 60).unwrap();
        scheduler.schedule(&alice, AUTH, &Extras::new(), 120).unwrap();
    }

    let store = SqliteSyncStore::new(&db_path).unwrap();
    let schedules = store.list_schedules().unwrap();
    assert_eq!(schedules.len(), 1);
    assert_eq!(schedules[0].account, "alice");
    assert_eq!(schedules[0].authority, AUTH);
    assert_eq!(schedules[0].interval_secs, 120);
}
