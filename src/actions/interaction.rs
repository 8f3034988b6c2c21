//! Interactions: per-binding logic turning control values into phase
//! requests.
//!
//! Each interaction sees every sample of its bound control in time order and
//! answers with a [`PhaseRequest`]. Durations are only checked at the next
//! press or release edge; nothing fires on a timer.

use super::phase::Phase;
use crate::controls::ControlKind;
use crate::types::{seconds_to_ticks, ticks_to_seconds, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default parameters for interactions that do not set their own.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InteractionSettings {
    /// Magnitude at which a control counts as pressed
    pub press_point: f32,
    /// Seconds within which a tap must be released
    pub tap_time: f64,
    /// Seconds a slow tap must be held
    pub slow_tap_time: f64,
    /// Seconds a hold must last
    pub hold_time: f64,
}

impl Default for InteractionSettings {
    fn default() -> Self {
        Self {
            press_point: 0.5,
            tap_time: 0.2,
            slow_tap_time: 0.5,
            hold_time: 0.4,
        }
    }
}

/// What an interaction asks the action to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseRequest {
    None,
    Started,
    Performed,
    Canceled,
}

impl PhaseRequest {
    pub fn phase(self) -> Option<Phase> {
        match self {
            PhaseRequest::None => None,
            PhaseRequest::Started => Some(Phase::Started),
            PhaseRequest::Performed => Some(Phase::Performed),
            PhaseRequest::Canceled => Some(Phase::Canceled),
        }
    }
}

/// One control sample as seen by an interaction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InteractionContext {
    pub time: Timestamp,
    pub value: f32,
    /// Rest value of the control
    pub default_value: f32,
    /// Phase of the interaction itself, `Waiting` or `Started`
    pub phase: Phase,
}

impl InteractionContext {
    pub fn new(time: Timestamp, value: f32) -> Self {
        Self {
            time,
            value,
            default_value: 0.0,
            phase: Phase::Waiting,
        }
    }

    pub fn is_at_default(&self) -> bool {
        self.value.is_nan() || self.value == self.default_value
    }

    pub fn is_pressed(&self, press_point: f32) -> bool {
        !self.is_at_default() && self.value.abs() >= press_point
    }
}

/// User-defined interaction, registered by name with the
/// [`InteractionRegistry`](super::InteractionRegistry).
pub trait CustomInteraction: fmt::Debug + Send {
    fn name(&self) -> &str;

    fn process(&mut self, ctx: &InteractionContext) -> PhaseRequest;

    /// Forget timing state. Must be safe to call repeatedly.
    fn reset(&mut self);

    fn accepts(&self, _kind: ControlKind) -> bool {
        true
    }
}

/// Performs on the rising edge past the press point.
#[derive(Debug, Clone, PartialEq)]
pub struct Press {
    pub press_point: f32,
    pressed: bool,
}

impl Press {
    pub fn new(press_point: f32) -> Self {
        Self {
            press_point,
            pressed: false,
        }
    }

    fn process(&mut self, ctx: &InteractionContext) -> PhaseRequest {
        let pressed = ctx.is_pressed(self.press_point);
        let rising = pressed && !self.pressed;
        self.pressed = pressed;
        if rising {
            PhaseRequest::Performed
        } else {
            PhaseRequest::None
        }
    }
}

/// Starts on press; performs on release if held for at least `duration`,
/// cancels otherwise.
#[derive(Debug, Clone, PartialEq)]
pub struct Hold {
    pub duration: Timestamp,
    pub press_point: f32,
    pressed_at: Option<Timestamp>,
}

impl Hold {
    pub fn new(duration_seconds: f64, press_point: f32) -> Self {
        Self {
            duration: seconds_to_ticks(duration_seconds),
            press_point,
            pressed_at: None,
        }
    }

    fn process(&mut self, ctx: &InteractionContext) -> PhaseRequest {
        match self.pressed_at {
            None if ctx.is_pressed(self.press_point) => {
                self.pressed_at = Some(ctx.time);
                PhaseRequest::Started
            }
            Some(at) if !ctx.is_pressed(self.press_point) => {
                self.pressed_at = None;
                if ctx.time.saturating_sub(at) >= self.duration {
                    PhaseRequest::Performed
                } else {
                    PhaseRequest::Canceled
                }
            }
            _ => PhaseRequest::None,
        }
    }
}

/// Press then release; the held time decides the outcome.
#[derive(Debug, Clone, PartialEq)]
struct TimedRelease {
    duration: Timestamp,
    press_point: f32,
    pressed_at: Option<Timestamp>,
}

impl TimedRelease {
    fn new(duration_seconds: f64, press_point: f32) -> Self {
        Self {
            duration: seconds_to_ticks(duration_seconds),
            press_point,
            pressed_at: None,
        }
    }

    /// Returns the held time on release.
    fn process(&mut self, ctx: &InteractionContext) -> Result<Option<Timestamp>, PhaseRequest> {
        match self.pressed_at {
            None if ctx.is_pressed(self.press_point) => {
                self.pressed_at = Some(ctx.time);
                Err(PhaseRequest::Started)
            }
            Some(at) if !ctx.is_pressed(self.press_point) => {
                self.pressed_at = None;
                Ok(Some(ctx.time.saturating_sub(at)))
            }
            _ => Ok(None),
        }
    }
}

/// Performs when released within `duration` of the press.
#[derive(Debug, Clone, PartialEq)]
pub struct Tap {
    inner: TimedRelease,
}

impl Tap {
    pub fn new(duration_seconds: f64, press_point: f32) -> Self {
        Self {
            inner: TimedRelease::new(duration_seconds, press_point),
        }
    }

    pub fn duration(&self) -> Timestamp {
        self.inner.duration
    }

    fn process(&mut self, ctx: &InteractionContext) -> PhaseRequest {
        match self.inner.process(ctx) {
            Err(request) => request,
            Ok(Some(held)) if held <= self.inner.duration => PhaseRequest::Performed,
            Ok(Some(_)) => PhaseRequest::Canceled,
            Ok(None) => PhaseRequest::None,
        }
    }
}

/// Performs when released after at least `duration`.
#[derive(Debug, Clone, PartialEq)]
pub struct SlowTap {
    inner: TimedRelease,
}

impl SlowTap {
    pub fn new(duration_seconds: f64, press_point: f32) -> Self {
        Self {
            inner: TimedRelease::new(duration_seconds, press_point),
        }
    }

    pub fn duration(&self) -> Timestamp {
        self.inner.duration
    }

    fn process(&mut self, ctx: &InteractionContext) -> PhaseRequest {
        match self.inner.process(ctx) {
            Err(request) => request,
            Ok(Some(held)) if held >= self.inner.duration => PhaseRequest::Performed,
            Ok(Some(_)) => PhaseRequest::Canceled,
            Ok(None) => PhaseRequest::None,
        }
    }
}

#[derive(Debug)]
pub enum Interaction {
    Press(Press),
    Hold(Hold),
    Tap(Tap),
    SlowTap(SlowTap),
    Custom(Box<dyn CustomInteraction>),
}

impl Interaction {
    pub fn name(&self) -> &str {
        match self {
            Interaction::Press(_) => "press",
            Interaction::Hold(_) => "hold",
            Interaction::Tap(_) => "tap",
            Interaction::SlowTap(_) => "slowTap",
            Interaction::Custom(custom) => custom.name(),
        }
    }

    pub fn process(&mut self, ctx: &InteractionContext) -> PhaseRequest {
        match self {
            Interaction::Press(i) => i.process(ctx),
            Interaction::Hold(i) => i.process(ctx),
            Interaction::Tap(i) => i.process(ctx),
            Interaction::SlowTap(i) => i.process(ctx),
            Interaction::Custom(i) => i.process(ctx),
        }
    }

    pub fn reset(&mut self) {
        match self {
            Interaction::Press(i) => i.pressed = false,
            Interaction::Hold(i) => i.pressed_at = None,
            Interaction::Tap(i) => i.inner.pressed_at = None,
            Interaction::SlowTap(i) => i.inner.pressed_at = None,
            Interaction::Custom(i) => i.reset(),
        }
    }

    /// Built-in interactions need a scalar control: buttons or axes.
    pub fn accepts(&self, kind: ControlKind) -> bool {
        match self {
            Interaction::Custom(i) => i.accepts(kind),
            _ => matches!(kind, ControlKind::Button | ControlKind::Axis),
        }
    }

    /// Duration parameter in seconds, for interactions that have one.
    pub fn duration_seconds(&self) -> Option<f64> {
        match self {
            Interaction::Hold(i) => Some(ticks_to_seconds(i.duration)),
            Interaction::Tap(i) => Some(ticks_to_seconds(i.duration())),
            Interaction::SlowTap(i) => Some(ticks_to_seconds(i.duration())),
            _ => None,
        }
    }
}

impl From<Press> for Interaction {
    fn from(i: Press) -> Self {
        Interaction::Press(i)
    }
}

impl From<Hold> for Interaction {
    fn from(i: Hold) -> Self {
        Interaction::Hold(i)
    }
}

impl From<Tap> for Interaction {
    fn from(i: Tap) -> Self {
        Interaction::Tap(i)
    }
}

impl From<SlowTap> for Interaction {
    fn from(i: SlowTap) -> Self {
        Interaction::SlowTap(i)
    }
}
