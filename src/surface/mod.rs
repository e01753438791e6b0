//! Launchkey control surface
//!
//! One owned context for a connection session: the identity handshake, the
//! mode tree built once the variant is known, and the InControl state.
//! Everything runs on the event loop task; outbound MIDI and resolved host
//! actions are queued here and drained by the loop.

pub mod feedback;


use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::config::{AppConfig, SkinConfig};
use crate::control_mapping::{ControlInput, ControlMappingDB};
use crate::handshake::{HardwareVariant, IdentityHandshake, SysexOutcome};
use crate::host::{Direction, SurfaceAction, TransportCommand};
use crate::midi::{format_hex, MidiMessage};
use crate::modes::layout::{self, ENCODER_MODES, MAX_SENDS, MODE_SELECTOR, SESSION_MODE};
use crate::modes::{ModeAction, ModeTree, Target};

use feedback::LedFeedback;

/// Switches pads to drum InControl
pub const DRUM_IN_CONTROL_ON_MESSAGE: [u8; 3] = [0x9F, 0x0F, 0x7F];
/// Switches pads out of drum InControl
pub const DRUM_IN_CONTROL_OFF_MESSAGE: [u8; 3] = [0x9F, 0x0F, 0x00];

/// Control whose LED switches the Launchkey into extended mode
pub const EXTENDED_MODE_CONTROL: &str = "extended_mode";

/// Called once per session with the identified variant
pub type IdentifiedCallback = Arc<dyn Fn(HardwareVariant) + Send + Sync>;

pub struct Surface {
    controls: ControlMappingDB,
    handshake: IdentityHandshake,
    tree: Option<ModeTree>,
    skin: SkinConfig,
    leds: LedFeedback,
    return_tracks: usize,
    send_index: usize,
    is_in_control_on: bool,
    connected: bool,
    outgoing: Vec<Vec<u8>>,
    actions: Vec<SurfaceAction>,
    identified_callbacks: Vec<IdentifiedCallback>,
}

impl Surface {
    pub fn new(config: &AppConfig, controls: ControlMappingDB) -> Self {
        Self {
            controls,
            handshake: IdentityHandshake::new(config.handshake.request_delay()),
            tree: None,
            skin: config.skin,
            leds: LedFeedback::new(),
            return_tracks: config.session.return_tracks,
            send_index: 0,
            is_in_control_on: true,
            connected: false,
            outgoing: Vec::new(),
            actions: Vec::new(),
            identified_callbacks: Vec::new(),
        }
    }

    pub fn subscribe_identified(&mut self, callback: IdentifiedCallback) {
        self.identified_callbacks.push(callback);
    }

    pub fn handshake(&self) -> &IdentityHandshake {
        &self.handshake
    }

    pub fn tree(&self) -> Option<&ModeTree> {
        self.tree.as_ref()
    }

    pub fn variant(&self) -> Option<HardwareVariant> {
        self.handshake.variant()
    }

    pub fn controls(&self) -> &ControlMappingDB {
        &self.controls
    }

    pub fn send_index(&self) -> usize {
        self.send_index
    }

    pub fn is_in_control_on(&self) -> bool {
        self.is_in_control_on
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Next time the loop must call [`Surface::poll`]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.handshake.deadline()
    }

    /// Take queued outbound MIDI messages
    pub fn take_outgoing(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.outgoing)
    }

    /// Take queued host actions
    pub fn take_actions(&mut self) -> Vec<SurfaceAction> {
        std::mem::take(&mut self.actions)
    }

    /// Ports opened: schedule the identity request
    pub fn connect(&mut self, now: Instant) {
        self.connected = true;
        self.handshake.restart(now);
    }

    /// Ports changed under us: drop the mode tree and identify again
    pub fn port_settings_changed(&mut self, now: Instant) {
        info!("Port settings changed, restarting identification");
        self.teardown();
        self.connected = true;
        self.handshake.restart(now);
    }

    pub fn disconnect(&mut self) {
        if self.connected {
            for (control_id, value) in self.leds.clear() {
                self.send_control(&control_id, value);
            }
            self.send_control(EXTENDED_MODE_CONTROL, 0);
        }
        self.teardown();
        self.handshake.disconnect();
        self.connected = false;
    }

    fn teardown(&mut self) {
        if self.tree.take().is_some() {
            debug!("Mode tree released");
        }
        self.leds.reset();
        self.send_index = 0;
    }

    /// Fire due timers
    pub fn poll(&mut self, now: Instant) {
        if let Some(request) = self.handshake.poll(now) {
            self.outgoing.push(request.to_vec());
        }
    }

    /// Dispatch one inbound MIDI message; returns whether it was consumed
    pub fn handle_midi(&mut self, bytes: &[u8]) -> bool {
        let Some(message) = MidiMessage::parse(bytes) else {
            debug!("Unparsed MIDI: {}", format_hex(bytes));
            return false;
        };

        if message.is_sysex() {
            return self.handle_sysex(bytes);
        }

        let Some(input) = ControlInput::from_message(&message) else {
            trace!("Ignoring {}", message);
            return false;
        };

        let Some(tree) = self.tree.as_ref() else {
            trace!("Ignoring {} before identification", message);
            return false;
        };

        let Some(control) = self.controls.find_control(&input.address, tree.variant()) else {
            debug!("No control for {}", message);
            return false;
        };

        let Some(target) = tree.resolve(&control.id).cloned() else {
            trace!(control = control.id.as_str(), "unbound");
            return false;
        };

        self.dispatch(target, input.value);
        true
    }

    /// Offer an inbound SysEx to the handshake; unrelated SysEx falls
    /// through to the default handler
    pub fn handle_sysex(&mut self, bytes: &[u8]) -> bool {
        let outcome = self.handshake.handle_sysex(bytes);
        match outcome {
            SysexOutcome::Identified(variant) => self.on_identified(variant),
            SysexOutcome::Delegated => {
                debug!("Unhandled SysEx: {}", format_hex(bytes));
            }
            SysexOutcome::Revalidated(_) | SysexOutcome::Rejected(_) => {}
        }
        outcome.is_consumed()
    }

    fn on_identified(&mut self, variant: HardwareVariant) {
        self.send_control(EXTENDED_MODE_CONTROL, 127);

        let tree = match layout::build(variant, &self.controls) {
            Ok(tree) => tree,
            Err(e) => {
                warn!("Failed to build {} layout: {}", variant, e);
                return;
            }
        };
        self.tree = Some(tree);
        self.on_return_tracks_changed(self.return_tracks);

        if let Some(tree) = self.tree.as_mut() {
            match tree.select(MODE_SELECTOR, SESSION_MODE) {
                Ok(actions) => self.run_mode_actions(actions),
                Err(e) => warn!("Failed to select {}: {}", SESSION_MODE, e),
            }
        }
        self.refresh_feedback(true);

        info!("Surface ready ({} model)", variant);
        for callback in &self.identified_callbacks {
            callback(variant);
        }
    }

    /// The DAW's return track count changed; send modes follow it
    pub fn on_return_tracks_changed(&mut self, return_tracks: usize) {
        self.return_tracks = return_tracks;
        let Some(tree) = self.tree.as_mut() else {
            return;
        };
        for index in 0..MAX_SENDS {
            let name = layout::send_mode_name(index);
            if let Err(e) = tree.set_mode_enabled(ENCODER_MODES, &name, index < return_tracks) {
                warn!("Failed to update {}: {}", name, e);
            }
        }
        self.refresh_feedback(false);
    }

    pub fn set_skin(&mut self, skin: SkinConfig) {
        if self.skin != skin {
            self.skin = skin;
            self.refresh_feedback(true);
        }
    }

    /// Re-send mode button LEDs
    pub fn update(&mut self) {
        self.refresh_feedback(true);
    }

    fn refresh_feedback(&mut self, force: bool) {
        let Some(tree) = self.tree.as_ref() else {
            return;
        };
        let desired = feedback::desired_state(tree, &self.skin);
        for (control_id, value) in self.leds.diff(&desired, force) {
            self.send_control(&control_id, value);
        }
    }

    fn send_control(&mut self, control_id: &str, value: u8) {
        match self.controls.get(control_id) {
            Some(control) => self.outgoing.push(control.feedback_message(value).encode()),
            None => warn!("No control '{}' to send to", control_id),
        }
    }

    fn dispatch(&mut self, target: Target, value: u8) {
        match target {
            Target::ModeButton { group, mode } => {
                let Some(tree) = self.tree.as_mut() else {
                    return;
                };
                let result = if value > 0 {
                    tree.press(&group, &mode)
                } else {
                    tree.release(&group, &mode)
                };
                match result {
                    Ok(actions) => {
                        self.run_mode_actions(actions);
                        self.refresh_feedback(false);
                    }
                    Err(e) => warn!("Mode button failed: {}", e),
                }
            }
            Target::InControlStatus => {
                self.is_in_control_on = value != 0;
                debug!(in_control = self.is_in_control_on, "InControl status");
            }
            Target::RefreshFeedback => {
                if value > 0 {
                    self.update();
                }
            }
            Target::Background => {}
            target => {
                if !target.is_continuous() && value == 0 {
                    return;
                }
                if let Some(action) = target_action(&target, value, self.send_index) {
                    self.actions.push(action);
                }
            }
        }
    }

    fn run_mode_actions(&mut self, actions: Vec<ModeAction>) {
        for action in actions {
            match action {
                ModeAction::SetSendIndex(index) => self.send_index = index,
                ModeAction::ToggleInControl(on) => {
                    if !self.is_in_control_on {
                        let message = if on {
                            DRUM_IN_CONTROL_ON_MESSAGE
                        } else {
                            DRUM_IN_CONTROL_OFF_MESSAGE
                        };
                        self.outgoing.push(message.to_vec());
                    }
                }
            }
        }
    }
}

/// Host action for a bound target
fn target_action(target: &Target, value: u8, send_index: usize) -> Option<SurfaceAction> {
    let action = match *target {
        Target::ClipLaunch { track } => SurfaceAction::LaunchClip { track },
        Target::SceneLaunch => SurfaceAction::LaunchScene,
        Target::StopAllClips => SurfaceAction::StopAllClips,
        Target::StopTrackClip { track } => SurfaceAction::StopTrackClip { track },
        Target::Volume { track } => SurfaceAction::SetVolume { track, value },
        Target::MasterVolume => SurfaceAction::SetMasterVolume { value },
        Target::Pan { track } => SurfaceAction::SetPan { track, value },
        Target::Send { track } => SurfaceAction::SetSend {
            track,
            send: send_index,
            value,
        },
        Target::Mute { track } => SurfaceAction::ToggleMute { track },
        Target::Solo { track } => SurfaceAction::ToggleSolo { track },
        Target::DeviceParameter { index } => SurfaceAction::SetDeviceParameter { index, value },
        Target::DeviceBank { index } => SurfaceAction::SelectDeviceBank { index },
        Target::DeviceNavLeft => SurfaceAction::NavigateDevice {
            direction: Direction::Left,
        },
        Target::DeviceNavRight => SurfaceAction::NavigateDevice {
            direction: Direction::Right,
        },
        Target::PrevTrack => SurfaceAction::SelectTrack {
            direction: Direction::Left,
        },
        Target::NextTrack => SurfaceAction::SelectTrack {
            direction: Direction::Right,
        },
        Target::PrevScene => SurfaceAction::SelectScene {
            direction: Direction::Left,
        },
        Target::NextScene => SurfaceAction::SelectScene {
            direction: Direction::Right,
        },
        Target::Play => transport(TransportCommand::Play),
        Target::Stop => transport(TransportCommand::Stop),
        Target::Loop => transport(TransportCommand::Loop),
        Target::Record => transport(TransportCommand::Record),
        Target::Metronome => transport(TransportCommand::Metronome),
        Target::ModeButton { .. }
        | Target::InControlStatus
        | Target::RefreshFeedback
        | Target::Background => return None,
    };
    Some(action)
}

fn transport(command: TransportCommand) -> SurfaceAction {
    SurfaceAction::Transport { command }
}
