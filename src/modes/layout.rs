//! Launchkey MK2 layout
//!
//! Builds the base layers and mode groups for an identified variant. The
//! 25-key model has no sliders row and no mute buttons, so its bottom pads
//! double as stop/mute buttons and its single slider drives the master.

use crate::control_mapping::ControlMappingDB;
use crate::error::{Result, SurfaceError};
use crate::handshake::HardwareVariant;

use super::{Behaviour, Layer, Mode, ModeAction, ModeGroup, ModeTree, Target};

/// Channel strips covered by the pads, encoders and sliders
pub const NUM_TRACKS: usize = 7;

/// Send modes reachable from the bottom pads
pub const MAX_SENDS: usize = 3;

pub const MUTE_BUTTON_MODES: &str = "mute_buttons";
pub const ENCODER_MODES: &str = "encoder_modes";
pub const MODE_SELECTOR: &str = "mode_selector";

pub const MUTE_MODE: &str = "mute_mode";
pub const SOLO_MODE: &str = "solo_mode";
pub const STOP_MODE: &str = "stop_mode";
pub const DEVICE_MODE: &str = "device_mode";
pub const VOLUME_MODE: &str = "volume_mode";
pub const PAN_MODE: &str = "pan_mode";
pub const PAD_MODE: &str = "pad_mode";
pub const MODE_SELECTION: &str = "mode_selection";
pub const SESSION_MODE: &str = "session_mode";

pub fn send_mode_name(index: usize) -> String {
    format!("send_{}_mode", index)
}

fn row(prefix: &str) -> Vec<String> {
    (0..NUM_TRACKS).map(|i| format!("{}{}", prefix, i)).collect()
}

fn mode_button(group: &str, mode: &str) -> Target {
    Target::ModeButton {
        group: group.to_string(),
        mode: mode.to_string(),
    }
}

/// Builds the tree for one variant, checking every bound control exists on it
struct Builder<'a> {
    controls: &'a ControlMappingDB,
    variant: HardwareVariant,
    tree: ModeTree,
}

impl<'a> Builder<'a> {
    fn check(&self, layer: &Layer) -> Result<()> {
        for (control_id, _) in layer.bindings() {
            if self.controls.get_for_variant(control_id, self.variant).is_none() {
                return Err(SurfaceError::InvalidControl {
                    control: control_id.clone(),
                    reason: format!("not present on {} model", self.variant),
                });
            }
        }
        Ok(())
    }

    fn base(&mut self, owner: &str, layer: Layer) -> Result<()> {
        self.check(&layer)?;
        self.tree.add_base_layer(owner, layer);
        Ok(())
    }

    fn group(&mut self, group: ModeGroup, initial: Option<&str>) -> Result<()> {
        for mode in group.modes() {
            for layer in &mode.layers {
                self.check(layer)?;
            }
        }
        let name = group.name.clone();
        self.tree.add_group(group);
        if let Some(initial) = initial {
            self.tree.select(&name, initial)?;
        }
        Ok(())
    }
}

/// Build the mode tree for `variant`.
///
/// The mode selector is registered with nothing selected; the surface picks
/// `session_mode` once the tree is in place.
pub fn build(variant: HardwareVariant, controls: &ControlMappingDB) -> Result<ModeTree> {
    let mut b = Builder {
        controls,
        variant,
        tree: ModeTree::new(variant),
    };

    let top_pads = row("pad_0_");
    let bottom_pads = row("pad_1_");
    let encoders = row("encoder_");

    let mixer = match variant {
        HardwareVariant::FullSize => Layer::new()
            .row(&row("slider_"), |track| Target::Volume { track })
            .bind("master_slider", Target::MasterVolume),
        HardwareVariant::TwentyFiveKey => Layer::new().bind("slider_25", Target::MasterVolume),
    };
    b.base("mixer", mixer)?;

    b.base(
        "session",
        Layer::new()
            .row(&top_pads, |track| Target::ClipLaunch { track })
            .bind("scene_launch", Target::SceneLaunch)
            .bind("stop_all_clips", Target::StopAllClips),
    )?;

    match variant {
        HardwareVariant::FullSize => {
            let mute_buttons = row("mute_button_");
            b.group(
                ModeGroup::new(MUTE_BUTTON_MODES)
                    .add_mode(
                        Mode::new(MUTE_MODE)
                            .layer(Layer::new().row(&mute_buttons, |track| Target::Mute { track })),
                    )
                    .add_mode(
                        Mode::new(SOLO_MODE)
                            .layer(Layer::new().row(&mute_buttons, |track| Target::Solo { track }))
                            .behaviour(Behaviour::Cancellable),
                    ),
                Some(MUTE_MODE),
            )?;
            b.base(
                MUTE_BUTTON_MODES,
                Layer::new().bind("master_button", mode_button(MUTE_BUTTON_MODES, SOLO_MODE)),
            )?;
        }
        HardwareVariant::TwentyFiveKey => {
            b.group(
                ModeGroup::new(MUTE_BUTTON_MODES)
                    .add_mode(Mode::new(STOP_MODE).layer(
                        Layer::new().row(&bottom_pads, |track| Target::StopTrackClip { track }),
                    ))
                    .add_mode(
                        Mode::new(MUTE_MODE)
                            .layer(Layer::new().row(&bottom_pads, |track| Target::Mute { track }))
                            .behaviour(Behaviour::Cancellable),
                    ),
                Some(STOP_MODE),
            )?;
            b.base(
                MUTE_BUTTON_MODES,
                Layer::new().bind("mute_mode_pad", mode_button(MUTE_BUTTON_MODES, MUTE_MODE)),
            )?;
        }
    }

    b.base(
        "navigation",
        Layer::new()
            .bind("track_left", Target::PrevTrack)
            .bind("track_right", Target::NextTrack)
            .bind("scene_up", Target::PrevScene)
            .bind("scene_down", Target::NextScene),
    )?;

    b.base(
        "transport",
        Layer::new()
            .bind("play", Target::Play)
            .bind("stop", Target::Stop)
            .bind("loop", Target::Loop)
            .bind("record", Target::Record)
            .bind("metronome_pad", Target::Metronome),
    )?;

    let background = Layer::new().row(&top_pads, |_| Target::Background);
    let mut encoder_modes = ModeGroup::new(ENCODER_MODES)
        .skinned(true)
        .add_mode(
            Mode::new(DEVICE_MODE).layer(
                Layer::new()
                    .row(&encoders, |index| Target::DeviceParameter { index })
                    .row(&top_pads, |index| Target::DeviceBank { index }),
            ),
        )
        .add_mode(
            Mode::new(VOLUME_MODE)
                .layer(Layer::new().row(&encoders, |track| Target::Volume { track }))
                .layer(background.clone()),
        )
        .add_mode(
            Mode::new(PAN_MODE)
                .layer(Layer::new().row(&encoders, |track| Target::Pan { track }))
                .layer(background.clone()),
        )
        .add_mode(
            Mode::new(PAD_MODE)
                .layer(Layer::new().row(&encoders, |track| Target::Pan { track }))
                .layer(background.clone())
                .enabled(false),
        );
    for index in 0..MAX_SENDS {
        encoder_modes = encoder_modes.add_mode(
            Mode::new(send_mode_name(index))
                .layer(Layer::new().row(&encoders, |track| Target::Send { track }))
                .action(ModeAction::SetSendIndex(index))
                .layer(background.clone())
                .enabled(false),
        );
    }
    b.group(encoder_modes, Some(DEVICE_MODE))?;

    let mut mode_buttons = Layer::new()
        .bind(&bottom_pads[0], mode_button(ENCODER_MODES, DEVICE_MODE))
        .bind(&bottom_pads[1], mode_button(ENCODER_MODES, VOLUME_MODE))
        .bind(&bottom_pads[2], mode_button(ENCODER_MODES, PAN_MODE))
        .bind(&bottom_pads[3], mode_button(ENCODER_MODES, PAD_MODE));
    for index in 0..MAX_SENDS {
        mode_buttons = mode_buttons.bind(
            &bottom_pads[index + 3],
            mode_button(ENCODER_MODES, &send_mode_name(index)),
        );
    }
    b.group(
        ModeGroup::new(MODE_SELECTOR)
            .add_mode(
                Mode::new(MODE_SELECTION)
                    .action(ModeAction::ToggleInControl(true))
                    .layer(mode_buttons)
                    .layer(
                        Layer::new()
                            .bind("track_left", Target::DeviceNavLeft)
                            .bind("track_right", Target::DeviceNavRight),
                    )
                    .behaviour(Behaviour::Momentary),
            )
            .add_mode(
                Mode::new(SESSION_MODE)
                    .action(ModeAction::ToggleInControl(false))
                    .layer(Layer::new().row(&top_pads, |track| Target::ClipLaunch { track })),
            ),
        None,
    )?;
    b.base(
        MODE_SELECTOR,
        Layer::new().bind("mode_selection", mode_button(MODE_SELECTOR, MODE_SELECTION)),
    )?;

    b.base(
        "in_control_status",
        Layer::new()
            .bind("in_control_status", Target::InControlStatus)
            .bind("pad_in_control", Target::RefreshFeedback),
    )?;

    Ok(b.tree)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control_mapping::load_default_mappings;

    fn full() -> ModeTree {
        build(HardwareVariant::FullSize, &load_default_mappings().unwrap()).unwrap()
    }

    fn small() -> ModeTree {
        build(HardwareVariant::TwentyFiveKey, &load_default_mappings().unwrap()).unwrap()
    }

    #[test]
    fn test_initial_selection() {
        let tree = full();
        assert_eq!(tree.selected_mode(ENCODER_MODES), Some(DEVICE_MODE));
        assert_eq!(tree.selected_mode(MUTE_BUTTON_MODES), Some(MUTE_MODE));
        assert_eq!(tree.selected_mode(MODE_SELECTOR), None);

        let tree = small();
        assert_eq!(tree.selected_mode(MUTE_BUTTON_MODES), Some(STOP_MODE));
    }

    #[test]
    fn test_full_size_mixer() {
        let tree = full();
        assert_eq!(tree.resolve("slider_3"), Some(&Target::Volume { track: 3 }));
        assert_eq!(tree.resolve("master_slider"), Some(&Target::MasterVolume));
        assert_eq!(tree.resolve("mute_button_6"), Some(&Target::Mute { track: 6 }));
        assert_eq!(tree.resolve("slider_25"), None);
    }

    #[test]
    fn test_25_key_mixer() {
        let tree = small();
        assert_eq!(tree.resolve("slider_25"), Some(&Target::MasterVolume));
        assert_eq!(tree.resolve("slider_0"), None);
        assert_eq!(tree.resolve("pad_1_2"), Some(&Target::StopTrackClip { track: 2 }));
        assert_eq!(
            tree.resolve("mute_mode_pad"),
            Some(&mode_button(MUTE_BUTTON_MODES, MUTE_MODE))
        );
    }

    #[test]
    fn test_device_mode_owns_top_pads_until_session_mode() {
        let mut tree = full();
        assert_eq!(tree.resolve("pad_0_1"), Some(&Target::DeviceBank { index: 1 }));
        assert_eq!(tree.resolve("encoder_4"), Some(&Target::DeviceParameter { index: 4 }));

        tree.select(MODE_SELECTOR, SESSION_MODE).unwrap();
        assert_eq!(tree.resolve("pad_0_1"), Some(&Target::ClipLaunch { track: 1 }));
    }

    #[test]
    fn test_mode_selection_installs_mode_buttons() {
        let mut tree = full();
        tree.select(MODE_SELECTOR, SESSION_MODE).unwrap();
        assert_eq!(tree.resolve("pad_1_0"), None);

        tree.press(MODE_SELECTOR, MODE_SELECTION).unwrap();
        assert_eq!(
            tree.resolve("pad_1_1"),
            Some(&mode_button(ENCODER_MODES, VOLUME_MODE))
        );
        // Sends start at pad 3, over the pad mode button
        assert_eq!(
            tree.resolve("pad_1_3"),
            Some(&mode_button(ENCODER_MODES, &send_mode_name(0)))
        );
        assert_eq!(
            tree.resolve("pad_1_5"),
            Some(&mode_button(ENCODER_MODES, &send_mode_name(2)))
        );
        assert_ne!(
            tree.resolve("pad_1_6"),
            Some(&mode_button(ENCODER_MODES, &send_mode_name(2)))
        );
        assert_eq!(tree.resolve("track_left"), Some(&Target::DeviceNavLeft));

        tree.release(MODE_SELECTOR, MODE_SELECTION).unwrap();
        assert_eq!(tree.resolve("pad_1_1"), None);
        assert_eq!(tree.resolve("track_left"), Some(&Target::PrevTrack));
    }

    #[test]
    fn test_25_key_mode_selection_covers_stop_pads() {
        let mut tree = small();
        tree.select(MODE_SELECTOR, SESSION_MODE).unwrap();
        tree.press(MODE_SELECTOR, MODE_SELECTION).unwrap();
        assert_eq!(
            tree.resolve("pad_1_0"),
            Some(&mode_button(ENCODER_MODES, DEVICE_MODE))
        );
        tree.release(MODE_SELECTOR, MODE_SELECTION).unwrap();
        assert_eq!(tree.resolve("pad_1_0"), Some(&Target::StopTrackClip { track: 0 }));
    }

    #[test]
    fn test_send_and_pad_modes_start_disabled() {
        let tree = full();
        assert!(!tree.is_mode_enabled(ENCODER_MODES, PAD_MODE));
        for index in 0..MAX_SENDS {
            assert!(!tree.is_mode_enabled(ENCODER_MODES, &send_mode_name(index)));
        }
        assert!(tree.is_mode_enabled(ENCODER_MODES, PAN_MODE));
    }

    #[test]
    fn test_volume_mode_swallows_top_pads() {
        let mut tree = full();
        tree.select(ENCODER_MODES, VOLUME_MODE).unwrap();
        assert_eq!(tree.resolve("pad_0_0"), Some(&Target::Background));
        assert_eq!(tree.resolve("encoder_0"), Some(&Target::Volume { track: 0 }));
    }

    #[test]
    fn test_layout_rejects_missing_controls() {
        let csv = "control_id,group,kind,message,channel,variant\n\
                   encoder_0,encoders,encoder,cc=21,16,all\n";
        let db = ControlMappingDB::load_from_string(csv).unwrap();
        assert!(matches!(
            build(HardwareVariant::FullSize, &db),
            Err(SurfaceError::InvalidControl { .. })
        ));
    }
}
