//! Launchkey MK2 control surface
//!
//! Identifies a connected Launchkey MK2 with a SysEx identity handshake,
//! then routes its pads, encoders and sliders through a tree of
//! mutually exclusive modes into DAW actions.

pub mod config;
pub mod control_mapping;
pub mod device;
pub mod error;
pub mod handshake;
pub mod host;
pub mod midi;
pub mod modes;
pub mod sniffer;
pub mod surface;
pub mod task;

pub use error::{Result, SurfaceError};
pub use handshake::{HardwareVariant, IdentityHandshake};
pub use surface::Surface;
