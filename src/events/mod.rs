//! Input events, device commands and the event queue.
//!
//! Device backends produce binary events (state writes and commands). The
//! runtime consumes them once per tick in timestamp order; events queued from
//! other threads go through an [`EventSender`] and are drained at tick start.

pub mod command;
pub mod event;
pub mod queue;

pub use command::{
    CommandHandler, DeviceCommand, KnownCommand, LoggingCommandHandler, COMMAND_UNSUPPORTED,
    IME_CURSOR_COMMAND, RUMBLE_COMMAND,
};
pub use event::{
    decode_events, encode_events, EventBody, InputEvent, StatePayload, COMMAND_EVENT,
    DELTA_STATE_EVENT, EVENT_HEADER_SIZE, STATE_EVENT,
};
pub use queue::{event_channel, EventQueue, EventSender};
