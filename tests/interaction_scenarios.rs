//! Interaction timing through a full runtime

mod common;

use common::builders::{ActionMapBuilder, XInputEventBuilder};
use common::{assert_float_eq, ms, runtime};
use input_ingress::devices::xinput;
use input_ingress::{ActionEvent, DeviceId, InputRuntime, Phase};
use std::sync::{Arc, Mutex};

const SOUTH: u16 = 0x1000;
const EAST: u16 = 0x2000;

fn setup(interactions: &str) -> (InputRuntime, DeviceId) {
    let mut rt = runtime();
    let pad = rt.add_device(xinput::layout()).unwrap();
    let def = ActionMapBuilder::new("play")
        .action("fire", "<Gamepad>/buttonSouth", interactions)
        .build();
    assert!(rt.load_action_map(&def).unwrap().is_empty());
    rt.enable_action_map("play").unwrap();
    (rt, pad)
}

fn press(rt: &mut InputRuntime, pad: DeviceId, buttons: u16, at: u64) -> Vec<ActionEvent> {
    rt.queue_event(XInputEventBuilder::new().buttons(buttons).build(pad, at));
    rt.update().unwrap().events
}

fn phases(events: &[ActionEvent]) -> Vec<Phase> {
    events.iter().map(|e| e.phase).collect()
}

#[test]
fn test_hold_performs_after_duration() {
    let (mut rt, pad) = setup("hold(duration=0.5)");

    let started = press(&mut rt, pad, SOUTH, ms(0));
    assert_eq!(phases(&started), [Phase::Started]);
    assert_eq!(started[0].interaction.as_deref(), Some("hold"));
    assert_eq!(started[0].control, "<Gamepad>/buttonSouth");

    let performed = press(&mut rt, pad, 0, ms(600));
    assert_eq!(phases(&performed), [Phase::Performed]);
    assert_eq!(performed[0].start_time, ms(0));
    assert_float_eq(performed[0].duration, 0.6, 1e-9);
    assert_eq!(rt.action_map("play").unwrap().action("fire").unwrap().phase(), Phase::Waiting);
}

#[test]
fn test_hold_released_early_cancels() {
    let (mut rt, pad) = setup("hold(duration=0.5)");
    press(&mut rt, pad, SOUTH, ms(0));
    assert_eq!(phases(&press(&mut rt, pad, 0, ms(300))), [Phase::Canceled]);
}

#[test]
fn test_tap_and_slow_tap() {
    let (mut rt, pad) = setup("tap");
    press(&mut rt, pad, SOUTH, ms(1000));
    assert_eq!(phases(&press(&mut rt, pad, 0, ms(1100))), [Phase::Performed]);
    press(&mut rt, pad, SOUTH, ms(2000));
    assert_eq!(phases(&press(&mut rt, pad, 0, ms(2500))), [Phase::Canceled]);

    let (mut rt, pad) = setup("slowTap");
    press(&mut rt, pad, SOUTH, ms(0));
    assert_eq!(phases(&press(&mut rt, pad, 0, ms(700))), [Phase::Performed]);
    press(&mut rt, pad, SOUTH, ms(1000));
    assert_eq!(phases(&press(&mut rt, pad, 0, ms(1200))), [Phase::Canceled]);
}

#[test]
fn test_press_and_release_within_one_tick() {
    let (mut rt, pad) = setup("tap");
    rt.queue_event(XInputEventBuilder::new().buttons(SOUTH).build(pad, ms(10)));
    rt.queue_event(XInputEventBuilder::new().build(pad, ms(60)));
    let events = rt.update().unwrap().events;
    assert_eq!(phases(&events), [Phase::Started, Phase::Performed]);
    assert!(events[0].time <= events[1].time);
}

#[test]
fn test_press_performs_on_edge() {
    let (mut rt, pad) = setup("press");
    assert_eq!(phases(&press(&mut rt, pad, SOUTH, ms(0))), [Phase::Performed]);
    // Staying pressed does nothing more.
    assert!(press(&mut rt, pad, SOUTH, ms(16)).is_empty());
    assert!(press(&mut rt, pad, 0, ms(32)).is_empty());
}

#[test]
fn test_default_behavior_without_interactions() {
    let (mut rt, pad) = setup("");
    assert_eq!(phases(&press(&mut rt, pad, SOUTH, ms(0))), [Phase::Started]);
    let done = press(&mut rt, pad, 0, ms(100));
    assert_eq!(phases(&done), [Phase::Performed]);
    assert_eq!(done[0].interaction, None);
}

#[test]
fn test_disable_cancels_and_silences() {
    let (mut rt, pad) = setup("hold");
    press(&mut rt, pad, SOUTH, ms(0));
    rt.disable_action_map("play").unwrap();
    let report = rt.update().unwrap();
    assert_eq!(phases(&report.events), [Phase::Canceled]);
    assert!(press(&mut rt, pad, 0, ms(800)).is_empty());
}

#[test]
fn test_subscribers_see_every_event() {
    let (mut rt, pad) = setup("hold(duration=0.5)");
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    rt.action_map_mut("play")
        .unwrap()
        .subscribe(move |event| sink.lock().unwrap().push(event.phase));

    press(&mut rt, pad, SOUTH, ms(0));
    press(&mut rt, pad, 0, ms(700));
    assert_eq!(*seen.lock().unwrap(), [Phase::Started, Phase::Performed]);
}

#[test]
fn test_hold_on_second_binding_ignored_while_first_drives() {
    let mut rt = runtime();
    let pad = rt.add_device(xinput::layout()).unwrap();
    let def = ActionMapBuilder::new("play")
        .action("fire", "<Gamepad>/buttonSouth", "")
        .binding("<Gamepad>/buttonEast", "hold(duration=0.5)")
        .build();
    assert!(rt.load_action_map(&def).unwrap().is_empty());
    rt.enable_action_map("play").unwrap();

    let mut events = press(&mut rt, pad, SOUTH, ms(0));
    events.extend(press(&mut rt, pad, SOUTH | EAST, ms(5)));
    events.extend(press(&mut rt, pad, EAST, ms(10)));
    events.extend(press(&mut rt, pad, 0, ms(900)));

    assert_eq!(phases(&events), [Phase::Started, Phase::Performed]);
    assert_eq!(events[1].control, "<Gamepad>/buttonSouth");

    // The hold works on its own afterwards.
    press(&mut rt, pad, EAST, ms(1000));
    let done = press(&mut rt, pad, 0, ms(1600));
    assert_eq!(phases(&done), [Phase::Performed]);
    assert_eq!(done[0].interaction.as_deref(), Some("hold"));
}

#[test]
fn test_two_pads_do_not_share_hold_timing() {
    let (mut rt, first) = setup("hold(duration=0.5)");
    let second = rt.add_device(xinput::layout()).unwrap();

    let mut events = press(&mut rt, first, SOUTH, ms(0));
    events.extend(press(&mut rt, second, SOUTH, ms(100)));
    events.extend(press(&mut rt, second, 0, ms(200)));
    events.extend(press(&mut rt, first, 0, ms(700)));

    assert_eq!(phases(&events), [Phase::Started, Phase::Performed]);
    assert_eq!(events[1].start_time, ms(0));
}
