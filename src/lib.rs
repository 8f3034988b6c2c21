//! # input-ingress: Binary Input Report Ingestion
//!
//! Turns raw device reports (bit-packed buttons, fixed-point axes, enum
//! coded hats) into canonical per-control time series, publishes them
//! through double-buffered state memory and drives actions through
//! interactions such as hold and tap.
//!
//! ## Architecture
//!
//! - **Events**: Timestamped binary state writes and device commands,
//!   consumed once per tick in timestamp order
//! - **State**: Front/back byte arenas; readers see the front, the tick
//!   writes the back, and the two swap at the tick boundary
//! - **Pipeline**: Per-format fragments compiled into an ordered list of
//!   demux, merge and processing stages over a columnar dataset
//! - **Controls**: Device layouts and `<Layout>/control` paths resolved once
//!   at bind time
//! - **Actions**: Press, Hold, Tap and SlowTap interactions feeding the
//!   phase state machine
//!
//! ## Example
//!
//! ```ignore
//! use input_ingress::{
//!     devices::{xinput, XInputReport, XINPUT_FORMAT},
//!     events::InputEvent,
//!     IngressConfig, InputRuntime,
//! };
//!
//! let mut runtime = InputRuntime::new(IngressConfig::default())?;
//! let pad = runtime.add_device(xinput::layout())?;
//!
//! let report = XInputReport { buttons: 0x1000, ..Default::default() };
//! runtime.queue_event(InputEvent::state(pad, 0, XINPUT_FORMAT, report.to_bytes().to_vec()));
//! runtime.update()?;
//!
//! assert_eq!(runtime.read_control(pad, "<Gamepad>/buttonSouth")?, 1.0);
//! ```

pub mod actions;
pub mod config;
pub mod controls;
pub mod devices;
pub mod error;
pub mod events;
pub mod logging;
pub mod pipeline;
pub mod replay;
pub mod runtime;
pub mod state;
pub mod types;

// Re-export commonly used types
pub use actions::{ActionEvent, ActionMap, ActionMapDef, Interaction, InteractionRegistry, Phase};
pub use config::IngressConfig;
pub use controls::{ControlPath, DeviceLayout};
pub use error::{IngressError, Result};
pub use events::{DeviceCommand, InputEvent};
pub use pipeline::{PipelineCompiler, PipelineError};
pub use runtime::{InputRuntime, TickReport};
pub use types::{DeviceId, FourCC, Timestamp};
