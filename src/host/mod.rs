//! DAW host integration
//!
//! The surface resolves controller input into [`SurfaceAction`]s; a [`Host`]
//! carries them into whatever owns the session, mixer and device model.

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

pub mod console;

pub use console::ConsoleHost;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportCommand {
    Play,
    Stop,
    Loop,
    Record,
    Metronome,
}

/// Action for the DAW, resolved from a control through the active modes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum SurfaceAction {
    LaunchClip { track: usize },
    LaunchScene,
    StopAllClips,
    StopTrackClip { track: usize },
    SetVolume { track: usize, value: u8 },
    SetMasterVolume { value: u8 },
    SetPan { track: usize, value: u8 },
    SetSend { track: usize, send: usize, value: u8 },
    ToggleMute { track: usize },
    ToggleSolo { track: usize },
    SetDeviceParameter { index: usize, value: u8 },
    SelectDeviceBank { index: usize },
    NavigateDevice { direction: Direction },
    SelectTrack { direction: Direction },
    SelectScene { direction: Direction },
    Transport { command: TransportCommand },
}

impl SurfaceAction {
    pub fn name(&self) -> &'static str {
        match self {
            SurfaceAction::LaunchClip { .. } => "launch_clip",
            SurfaceAction::LaunchScene => "launch_scene",
            SurfaceAction::StopAllClips => "stop_all_clips",
            SurfaceAction::StopTrackClip { .. } => "stop_track_clip",
            SurfaceAction::SetVolume { .. } => "set_volume",
            SurfaceAction::SetMasterVolume { .. } => "set_master_volume",
            SurfaceAction::SetPan { .. } => "set_pan",
            SurfaceAction::SetSend { .. } => "set_send",
            SurfaceAction::ToggleMute { .. } => "toggle_mute",
            SurfaceAction::ToggleSolo { .. } => "toggle_solo",
            SurfaceAction::SetDeviceParameter { .. } => "set_device_parameter",
            SurfaceAction::SelectDeviceBank { .. } => "select_device_bank",
            SurfaceAction::NavigateDevice { .. } => "navigate_device",
            SurfaceAction::SelectTrack { .. } => "select_track",
            SurfaceAction::SelectScene { .. } => "select_scene",
            SurfaceAction::Transport { .. } => "transport",
        }
    }
}

/// Host trait - DAW integrations implement this
///
/// All methods take &self so a host can sit behind an `Arc<dyn Host>`.
#[async_trait]
pub trait Host: Send + Sync {
    fn name(&self) -> &str;

    /// Connect to the DAW
    async fn init(&self) -> Result<()>;

    /// Apply one action
    async fn execute(&self, action: &SurfaceAction) -> Result<()>;

    async fn shutdown(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_serializes_tagged() {
        let json = serde_json::to_value(SurfaceAction::SetSend {
            track: 2,
            send: 1,
            value: 64,
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({"action": "set_send", "track": 2, "send": 1, "value": 64})
        );

        let json = serde_json::to_value(SurfaceAction::Transport {
            command: TransportCommand::Record,
        })
        .unwrap();
        assert_eq!(json["command"], "record");
        assert_eq!(
            SurfaceAction::Transport {
                command: TransportCommand::Record
            }
            .name(),
            "transport"
        );
    }
}
