//! Error types for the surface library.

use thiserror::Error;

/// Errors raised by the device driver, control table and mode tree.
#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("{direction} port matching '{pattern}' not found")]
    PortNotFound {
        direction: &'static str,
        pattern: String,
    },

    #[error("not connected to output port")]
    NotConnected,

    #[error("MIDI init failed: {0}")]
    MidiInit(#[from] midir::InitError),

    #[error("MIDI connect failed: {0}")]
    MidiConnect(String),

    #[error("MIDI send failed: {0}")]
    MidiSend(#[from] midir::SendError),

    #[error("invalid control '{control}': {reason}")]
    InvalidControl { control: String, reason: String },

    #[error("control table: {0}")]
    ControlTable(#[from] csv::Error),

    #[error("unknown mode '{mode}' in group '{group}'")]
    UnknownMode { group: String, mode: String },

    #[error("unknown mode group '{0}'")]
    UnknownGroup(String),
}

pub type Result<T> = std::result::Result<T, SurfaceError>;
