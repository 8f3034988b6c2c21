//! End-to-end ticks: native reports through the pipeline into state memory

mod common;

use common::builders::{HidEventBuilder, XInputEventBuilder};
use common::mock_helpers::RecordingHandler;
use common::{assert_float_eq, ms, runtime};
use input_ingress::devices::{hid, xinput, XINPUT_FORMAT};
use input_ingress::events::{DeviceCommand, KnownCommand};
use input_ingress::{InputEvent, IngressConfig, InputRuntime};

#[test]
fn test_xinput_buttons_and_triggers() {
    let mut rt = runtime();
    let pad = rt.add_device(xinput::layout()).unwrap();

    rt.queue_event(
        XInputEventBuilder::new()
            .buttons(0x1000)
            .triggers(255, 51)
            .build(pad, ms(5)),
    );
    let report = rt.update().unwrap();
    assert_eq!(report.stats.events_processed, 1);
    assert_eq!(report.stats.events_dropped, 0);

    assert_eq!(rt.read_control(pad, "<Gamepad>/buttonSouth").unwrap(), 1.0);
    assert_eq!(rt.read_control(pad, "<Gamepad>/buttonEast").unwrap(), 0.0);
    assert_float_eq(rt.read_control(pad, "<Gamepad>/leftTrigger").unwrap() as f64, 1.0, 1e-4);
    assert_float_eq(rt.read_control(pad, "<Gamepad>/rightTrigger").unwrap() as f64, 0.2, 1e-4);
    assert_eq!(rt.read_control(pad, "<Gamepad>/leftTriggerButton").unwrap(), 1.0);
    assert_eq!(rt.read_control(pad, "<Gamepad>/rightTriggerButton").unwrap(), 0.0);
    // Coalesced trigger follows the stronger side.
    assert_float_eq(rt.read_control(pad, "<Gamepad>/trigger").unwrap() as f64, 1.0, 1e-4);
}

#[test]
fn test_stick_deadzone() {
    let mut rt = runtime();
    let pad = rt.add_device(xinput::layout()).unwrap();

    rt.queue_event(XInputEventBuilder::new().left_stick(1000, 0).build(pad, ms(1)));
    rt.update().unwrap();
    assert_eq!(rt.read_control(pad, "<Gamepad>/leftStickX").unwrap(), 0.0);

    rt.queue_event(XInputEventBuilder::new().left_stick(i16::MAX, 0).build(pad, ms(2)));
    rt.update().unwrap();
    assert_float_eq(rt.read_control(pad, "<Gamepad>/leftStickX").unwrap() as f64, 1.0, 1e-4);
    assert_float_eq(rt.read_control(pad, "<Gamepad>/leftStickY").unwrap() as f64, 0.0, 1e-4);
}

#[test]
fn test_hid_hat_and_flipped_stick() {
    let mut rt = runtime();
    let pad = rt.add_device(hid::layout()).unwrap();

    // Hat east, left stick pushed fully up.
    rt.queue_event(HidEventBuilder::new().hat(2).left_stick(0x80, 0).build(pad, ms(3)));
    rt.update().unwrap();

    assert_eq!(rt.read_control(pad, "<Gamepad>/dpadRight").unwrap(), 1.0);
    assert_eq!(rt.read_control(pad, "<Gamepad>/dpadUp").unwrap(), 0.0);
    assert_float_eq(rt.read_control(pad, "<Gamepad>/leftStickX").unwrap() as f64, 0.0, 1e-4);
    assert_float_eq(rt.read_control(pad, "<Gamepad>/leftStickY").unwrap() as f64, 1.0, 1e-4);

    // Codes above 7 mean centered.
    rt.queue_event(HidEventBuilder::new().hat(8).buttons(0b1).build(pad, ms(4)));
    rt.update().unwrap();
    assert_eq!(rt.read_control(pad, "<Gamepad>/dpadRight").unwrap(), 0.0);
    assert_eq!(rt.read_control(pad, "<Gamepad>/buttonSouth").unwrap(), 1.0);
}

#[test]
fn test_delta_event_touches_only_its_range() {
    let mut rt = runtime();
    let pad = rt.add_device(xinput::layout()).unwrap();
    rt.queue_event(XInputEventBuilder::new().buttons(0x1000).build(pad, ms(1)));
    rt.update().unwrap();

    // Left trigger byte only.
    rt.queue_event(InputEvent::delta(pad, ms(2), XINPUT_FORMAT, 2, vec![255]));
    rt.update().unwrap();
    assert_float_eq(rt.read_control(pad, "<Gamepad>/leftTrigger").unwrap() as f64, 1.0, 1e-4);
    assert_eq!(rt.read_control(pad, "<Gamepad>/buttonSouth").unwrap(), 1.0);
}

#[test]
fn test_events_applied_in_timestamp_order() {
    let mut rt = runtime();
    let pad = rt.add_device(xinput::layout()).unwrap();
    rt.queue_event(XInputEventBuilder::new().build(pad, ms(20)));
    rt.queue_event(XInputEventBuilder::new().buttons(0x1000).build(pad, ms(10)));
    let report = rt.update().unwrap();

    assert_eq!(report.stats.events_processed, 2);
    assert_eq!(rt.read_control(pad, "<Gamepad>/buttonSouth").unwrap(), 0.0);
}

#[test]
fn test_front_buffer_stable_until_tick() {
    let mut rt = runtime();
    let pad = rt.add_device(xinput::layout()).unwrap();
    rt.queue_event(XInputEventBuilder::new().buttons(0x1000).build(pad, ms(1)));
    rt.update().unwrap();

    rt.queue_event(XInputEventBuilder::new().build(pad, ms(2)));
    assert_eq!(rt.read_control(pad, "<Gamepad>/buttonSouth").unwrap(), 1.0);
    rt.update().unwrap();
    assert_eq!(rt.read_control(pad, "<Gamepad>/buttonSouth").unwrap(), 0.0);
}

#[test]
fn test_devices_are_independent() {
    let mut rt = runtime();
    let a = rt.add_device(xinput::layout()).unwrap();
    let b = rt.add_device(hid::layout()).unwrap();
    assert_ne!(a, b);

    rt.queue_event(XInputEventBuilder::new().buttons(0x1000).build(a, ms(1)));
    rt.update().unwrap();
    assert_eq!(rt.read_control(a, "<Gamepad>/buttonSouth").unwrap(), 1.0);
    assert_eq!(rt.read_control(b, "<Gamepad>/buttonSouth").unwrap(), 0.0);
}

#[test]
fn test_max_events_per_tick_defers_rest() {
    let mut config = IngressConfig::default();
    config.queue.max_events_per_tick = 1;
    let mut rt = InputRuntime::new(config).unwrap();
    let pad = rt.add_device(xinput::layout()).unwrap();

    rt.queue_event(XInputEventBuilder::new().buttons(0x1000).build(pad, ms(1)));
    rt.queue_event(XInputEventBuilder::new().build(pad, ms(2)));
    assert_eq!(rt.update().unwrap().stats.events_processed, 1);
    assert_eq!(rt.read_control(pad, "<Gamepad>/buttonSouth").unwrap(), 1.0);
    assert_eq!(rt.update().unwrap().stats.events_processed, 1);
    assert_eq!(rt.read_control(pad, "<Gamepad>/buttonSouth").unwrap(), 0.0);
}

#[test]
fn test_rumble_command_recorded() {
    let mut rt = runtime();
    let handler = RecordingHandler::new();
    let pad = rt
        .add_device_with_handler(xinput::layout(), Box::new(handler.clone()))
        .unwrap();

    rt.queue_event(InputEvent::command(pad, ms(1), DeviceCommand::rumble(0.25, 0.75)));
    let mut ime = DeviceCommand::ime_cursor(1.0, 2.0);
    assert!(rt.send_command(pad, &mut ime).unwrap() < 0);
    rt.update().unwrap();

    assert_eq!(
        handler.received(),
        vec![(
            pad,
            KnownCommand::Rumble {
                low_frequency: 0.25,
                high_frequency: 0.75
            }
        )]
    );
}
