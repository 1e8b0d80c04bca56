//! Registration and unregistration from inside update calls.
//!
//! The queue being serviced is moved out of the scheduler for the duration
//! of a tick. These tests pin down what entities observe when they mutate
//! the scheduler mid-pass.

use std::cell::RefCell;
use std::rc::Rc;

use metronome_sched::prelude::*;

type Log = Rc<RefCell<Vec<&'static str>>>;

fn generous() -> SchedulerConfig {
    SchedulerConfig {
        enabled: true,
        job_allotment: 1.0,
        tick_budget: 1.0,
        ..Default::default()
    }
}

/// Logs its name.
struct Leaf {
    name: &'static str,
    log: Log,
}

impl Tickable for Leaf {
    fn tick(&mut self, _dt: f64, _ctx: &mut TickContext<'_>) {
        self.log.borrow_mut().push(self.name);
    }
}

fn leaf(name: &'static str, log: &Log) -> Rc<RefCell<Leaf>> {
    Rc::new(RefCell::new(Leaf {
        name,
        log: log.clone(),
    }))
}

/// Runs a scripted action against the scheduler on its first update.
struct Actor {
    name: &'static str,
    log: Log,
    action: Option<Box<dyn FnOnce(&mut TickContext<'_>)>>,
}

impl Tickable for Actor {
    fn tick(&mut self, _dt: f64, ctx: &mut TickContext<'_>) {
        self.log.borrow_mut().push(self.name);
        if let Some(action) = self.action.take() {
            action(ctx);
        }
    }
}

fn actor(
    name: &'static str,
    log: &Log,
    action: impl FnOnce(&mut TickContext<'_>) + 'static,
) -> Rc<RefCell<Actor>> {
    Rc::new(RefCell::new(Actor {
        name,
        log: log.clone(),
        action: Some(Box::new(action)),
    }))
}

#[test]
fn entity_registered_mid_tick_runs_next_tick() {
    let log: Log = Rc::default();
    let child = leaf("child", &log);
    let child_ref = EntityRef::new(&child);
    let spawn_ref = child_ref.clone();
    let spawner = actor("spawner", &log, move |ctx| {
        ctx.register(&spawn_ref).unwrap();
    });

    let mut scheduler = Scheduler::with_clock(generous(), ManualClock::new());
    scheduler.register(&EntityRef::new(&spawner)).unwrap();

    scheduler.tick(0.0);
    assert_eq!(*log.borrow(), vec!["spawner"]);
    assert!(scheduler.is_registered(&child_ref));
    assert_eq!(scheduler.membership(&child_ref).map(|m| m.level), Some(0));

    log.borrow_mut().clear();
    scheduler.tick(0.0);
    assert_eq!(*log.borrow(), vec!["spawner", "child"]);
}

#[test]
fn sibling_unregistered_mid_tick_does_not_run() {
    let log: Log = Rc::default();
    let victim = leaf("victim", &log);
    let victim_ref = EntityRef::new(&victim);
    let handle_slot: Rc<RefCell<Option<RegistrationHandle>>> = Rc::default();

    let slot = handle_slot.clone();
    let target = victim_ref.clone();
    let killer = actor("killer", &log, move |ctx| {
        let handle = slot.borrow().expect("victim handle recorded");
        ctx.unregister(handle, &target);
        assert!(!ctx.is_registered(&target));
    });

    let mut scheduler = Scheduler::with_clock(generous(), ManualClock::new());
    scheduler.register(&EntityRef::new(&killer)).unwrap();
    *handle_slot.borrow_mut() = Some(scheduler.register(&victim_ref).unwrap());

    scheduler.tick(0.0);
    assert_eq!(*log.borrow(), vec!["killer"]);
    assert!(!scheduler.is_registered(&victim_ref));
    assert_eq!(scheduler.len(), 1);
    assert_eq!(scheduler.level_len(0), 1);
}

#[test]
fn entity_can_unregister_itself() {
    let log: Log = Rc::default();
    let handle_slot: Rc<RefCell<Option<(RegistrationHandle, EntityRef)>>> = Rc::default();
    let slot = handle_slot.clone();
    let quitter = actor("quitter", &log, move |ctx| {
        let (handle, me) = slot.borrow_mut().take().expect("own handle recorded");
        ctx.unregister(handle, &me);
    });
    let quitter_ref = EntityRef::new(&quitter);

    let mut scheduler = Scheduler::with_clock(generous(), ManualClock::new());
    let handle = scheduler.register(&quitter_ref).unwrap();
    *handle_slot.borrow_mut() = Some((handle, quitter_ref.clone()));

    scheduler.tick(0.0);
    scheduler.tick(0.0);
    assert_eq!(*log.borrow(), vec!["quitter"]);
    assert!(scheduler.is_empty());
    assert_eq!(scheduler.queue().len(), 0);
}

#[test]
fn unregister_then_reregister_mid_tick_keeps_one_entry() {
    let log: Log = Rc::default();
    let bouncer = leaf("bouncer", &log);
    let bouncer_ref = EntityRef::new(&bouncer);
    let handle_slot: Rc<RefCell<Option<RegistrationHandle>>> = Rc::default();

    let slot = handle_slot.clone();
    let target = bouncer_ref.clone();
    let juggler = actor("juggler", &log, move |ctx| {
        let old = slot.borrow().expect("handle recorded");
        ctx.unregister(old, &target);
        let new = ctx.register(&target).unwrap();
        assert_ne!(old, new);
        *slot.borrow_mut() = Some(new);
    });

    let mut scheduler = Scheduler::with_clock(generous(), ManualClock::new());
    scheduler.register(&EntityRef::new(&juggler)).unwrap();
    *handle_slot.borrow_mut() = Some(scheduler.register(&bouncer_ref).unwrap());

    scheduler.tick(0.0);
    // The snapshot copy was tombstoned, the fresh copy waits for next tick.
    assert_eq!(*log.borrow(), vec!["juggler"]);
    assert_eq!(scheduler.len(), 2);
    assert_eq!(scheduler.queue().len(), 2);

    log.borrow_mut().clear();
    scheduler.tick(0.0);
    assert_eq!(*log.borrow(), vec!["juggler", "bouncer"]);

    // The refreshed handle is the live one.
    let live = handle_slot.borrow().expect("handle recorded");
    assert_eq!(scheduler.handle_of(&bouncer_ref), Some(live));
    scheduler.try_unregister(live, &bouncer_ref).unwrap();
    assert_eq!(scheduler.len(), 1);
}

#[test]
fn registering_an_in_flight_entity_is_idempotent() {
    let log: Log = Rc::default();
    let other = leaf("other", &log);
    let other_ref = EntityRef::new(&other);
    let target = other_ref.clone();
    let dup = actor("dup", &log, move |ctx| {
        ctx.register(&target).unwrap();
    });

    let mut scheduler = Scheduler::with_clock(generous(), ManualClock::new());
    scheduler.register(&EntityRef::new(&dup)).unwrap();
    let original = scheduler.register(&other_ref).unwrap();

    scheduler.tick(0.0);
    assert_eq!(*log.borrow(), vec!["dup", "other"]);
    assert_eq!(scheduler.handle_of(&other_ref), Some(original));
    assert_eq!(scheduler.queue().len(), 2);
}

#[test]
fn entity_destroyed_mid_tick_is_purged() {
    let log: Log = Rc::default();
    let victim = leaf("victim", &log);
    let victim_ref = EntityRef::new(&victim);
    let owner: Rc<RefCell<Option<Rc<RefCell<Leaf>>>>> = Rc::new(RefCell::new(Some(victim)));

    let held = owner.clone();
    let destroyer = actor("destroyer", &log, move |_ctx| {
        held.borrow_mut().take();
    });

    let mut scheduler = Scheduler::with_clock(generous(), ManualClock::new());
    scheduler.register(&EntityRef::new(&destroyer)).unwrap();
    scheduler.register(&victim_ref).unwrap();

    let diag = scheduler.tick(0.0).clone();
    assert_eq!(diag.purged, 1);
    assert_eq!(*log.borrow(), vec!["destroyer"]);
    assert!(!scheduler.is_registered(&victim_ref));
}

#[test]
fn unregistering_a_demoted_entity_mid_tick() {
    // Zero allotment with a wide budget: "victim" is demoted to level 1 by
    // the first group, then unregistered by an attached entity before level 1
    // is serviced.
    let log: Log = Rc::default();
    let head = leaf("head", &log);
    let victim = leaf("victim", &log);
    let victim_ref = EntityRef::new(&victim);
    let slot: Rc<RefCell<Option<RegistrationHandle>>> = Rc::default();

    let inner = slot.clone();
    let target = victim_ref.clone();
    let watcher = actor("watcher", &log, move |ctx| {
        let handle = inner.borrow().expect("handle recorded");
        ctx.unregister(handle, &target);
    });

    let config = SchedulerConfig {
        enabled: true,
        job_allotment: 0.0,
        tick_budget: 1.0,
        ..Default::default()
    };
    let mut scheduler = Scheduler::with_clock(config, ManualClock::new());
    scheduler.register(&EntityRef::new(&head)).unwrap();
    *slot.borrow_mut() = Some(scheduler.register(&victim_ref).unwrap());
    scheduler.register(&EntityRef::attached(&watcher)).unwrap();

    scheduler.tick(0.0);
    assert_eq!(*log.borrow(), vec!["head", "watcher"]);
    assert!(!scheduler.is_registered(&victim_ref));
    assert_eq!(scheduler.queue().len(), 2);
}
