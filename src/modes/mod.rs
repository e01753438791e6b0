//! Mode tree
//!
//! Modes are named sets of layers plus entry actions. A [`ModeGroup`] holds
//! mutually exclusive modes with at most one selected at a time; the
//! [`ModeTree`] registry owns every group, the always-on base layers, and the
//! binding table they all install into.
//!
//! Switching modes releases the old mode's bindings before the new mode's
//! bindings are installed.

pub mod layer;
pub mod layout;

pub use layer::{BindingTable, Layer, Target};

use tracing::debug;

use crate::error::{Result, SurfaceError};
use crate::handshake::HardwareVariant;

/// How a mode button selects its mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Behaviour {
    /// Press selects
    #[default]
    Immediate,
    /// Press selects, release returns to the previous mode
    Momentary,
    /// Press selects; pressing again while selected returns to the previous mode
    Cancellable,
}

/// Side effect run when a mode is entered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeAction {
    /// Point send controls at return track `index`
    SetSendIndex(usize),
    /// Switch the pads' drum InControl state
    ToggleInControl(bool),
}

#[derive(Debug, Clone)]
pub struct Mode {
    pub name: String,
    pub layers: Vec<Layer>,
    pub actions: Vec<ModeAction>,
    pub behaviour: Behaviour,
    pub enabled: bool,
}

impl Mode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            layers: Vec::new(),
            actions: Vec::new(),
            behaviour: Behaviour::default(),
            enabled: true,
        }
    }

    pub fn layer(mut self, layer: Layer) -> Self {
        self.layers.push(layer);
        self
    }

    pub fn action(mut self, action: ModeAction) -> Self {
        self.actions.push(action);
        self
    }

    pub fn behaviour(mut self, behaviour: Behaviour) -> Self {
        self.behaviour = behaviour;
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Mutually exclusive modes
#[derive(Debug, Clone)]
pub struct ModeGroup {
    pub name: String,
    modes: Vec<Mode>,
    selected: Option<usize>,
    previous: Option<usize>,
    /// Mode buttons of this group get LED feedback
    pub skinned: bool,
}

impl ModeGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            modes: Vec::new(),
            selected: None,
            previous: None,
            skinned: false,
        }
    }

    pub fn add_mode(mut self, mode: Mode) -> Self {
        self.modes.push(mode);
        self
    }

    pub fn skinned(mut self, skinned: bool) -> Self {
        self.skinned = skinned;
        self
    }

    pub fn modes(&self) -> &[Mode] {
        &self.modes
    }

    pub fn mode(&self, name: &str) -> Option<&Mode> {
        self.modes.iter().find(|m| m.name == name)
    }

    pub fn selected_mode(&self) -> Option<&str> {
        self.selected.map(|i| self.modes[i].name.as_str())
    }

    fn index_of(&self, mode: &str) -> Result<usize> {
        self.modes
            .iter()
            .position(|m| m.name == mode)
            .ok_or_else(|| SurfaceError::UnknownMode {
                group: self.name.clone(),
                mode: mode.to_string(),
            })
    }

    fn owner(&self, index: usize) -> String {
        mode_owner(&self.name, &self.modes[index].name)
    }
}

/// Binding owner key of a mode
pub fn mode_owner(group: &str, mode: &str) -> String {
    format!("{}/{}", group, mode)
}

/// Registry of base layers and mode groups for one session
#[derive(Debug, Clone)]
pub struct ModeTree {
    variant: HardwareVariant,
    groups: Vec<ModeGroup>,
    bindings: BindingTable,
}

impl ModeTree {
    pub fn new(variant: HardwareVariant) -> Self {
        Self {
            variant,
            groups: Vec::new(),
            bindings: BindingTable::new(),
        }
    }

    pub fn variant(&self) -> HardwareVariant {
        self.variant
    }

    pub fn bindings(&self) -> &BindingTable {
        &self.bindings
    }

    pub fn groups(&self) -> &[ModeGroup] {
        &self.groups
    }

    pub fn group(&self, name: &str) -> Option<&ModeGroup> {
        self.groups.iter().find(|g| g.name == name)
    }

    /// Install an always-on component layer
    pub fn add_base_layer(&mut self, owner: &str, layer: Layer) {
        self.bindings.install(owner, &layer);
    }

    /// Register a group; nothing is selected until [`ModeTree::select`]
    pub fn add_group(&mut self, group: ModeGroup) {
        self.groups.push(group);
    }

    /// Resolve a control to its current target
    pub fn resolve(&self, control_id: &str) -> Option<&Target> {
        self.bindings.resolve(control_id)
    }

    pub fn selected_mode(&self, group: &str) -> Option<&str> {
        self.group(group).and_then(ModeGroup::selected_mode)
    }

    fn group_index(&self, group: &str) -> Result<usize> {
        self.groups
            .iter()
            .position(|g| g.name == group)
            .ok_or_else(|| SurfaceError::UnknownGroup(group.to_string()))
    }

    /// Select a mode; returns the entry actions of the new mode.
    ///
    /// Disabled modes are refused without error and an already selected mode
    /// is left alone.
    pub fn select(&mut self, group: &str, mode: &str) -> Result<Vec<ModeAction>> {
        let g = self.group_index(group)?;
        let target = self.groups[g].index_of(mode)?;
        self.select_index(g, target)
    }

    fn select_index(&mut self, g: usize, target: usize) -> Result<Vec<ModeAction>> {
        let group = &self.groups[g];
        if group.selected == Some(target) {
            return Ok(Vec::new());
        }
        if !group.modes[target].enabled {
            debug!(group = group.name.as_str(), mode = group.modes[target].name.as_str(), "mode disabled");
            return Ok(Vec::new());
        }

        if let Some(current) = group.selected {
            let owner = group.owner(current);
            self.bindings.release(&owner);
        }

        let group = &mut self.groups[g];
        group.previous = group.selected;
        group.selected = Some(target);

        let owner = group.owner(target);
        let mode = &group.modes[target];
        for layer in &mode.layers {
            self.bindings.install(&owner, layer);
        }
        debug!(group = group.name.as_str(), mode = mode.name.as_str(), "mode selected");
        Ok(mode.actions.clone())
    }

    /// Mode button pressed
    pub fn press(&mut self, group: &str, mode: &str) -> Result<Vec<ModeAction>> {
        let g = self.group_index(group)?;
        let target = self.groups[g].index_of(mode)?;
        let state = &self.groups[g];
        let behaviour = state.modes[target].behaviour;
        let selected = state.selected;
        let previous = state.previous;

        if behaviour == Behaviour::Cancellable && selected == Some(target) {
            return match previous {
                Some(previous) => self.select_index(g, previous),
                None => Ok(Vec::new()),
            };
        }
        self.select_index(g, target)
    }

    /// Mode button released
    pub fn release(&mut self, group: &str, mode: &str) -> Result<Vec<ModeAction>> {
        let g = self.group_index(group)?;
        let target = self.groups[g].index_of(mode)?;
        let state = &self.groups[g];
        let behaviour = state.modes[target].behaviour;
        let selected = state.selected;
        let previous = state.previous;

        match previous {
            Some(previous) if behaviour == Behaviour::Momentary && selected == Some(target) => {
                self.select_index(g, previous)
            }
            _ => Ok(Vec::new()),
        }
    }

    /// Enable or disable a mode. A disabled mode cannot be selected; if it is
    /// the selected one it stays selected until something else is picked.
    pub fn set_mode_enabled(&mut self, group: &str, mode: &str, enabled: bool) -> Result<()> {
        let g = self.group_index(group)?;
        let index = self.groups[g].index_of(mode)?;
        self.groups[g].modes[index].enabled = enabled;
        Ok(())
    }

    pub fn is_mode_enabled(&self, group: &str, mode: &str) -> bool {
        self.group(group)
            .and_then(|g| g.mode(mode))
            .is_some_and(|m| m.enabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> ModeTree {
        let mut tree = ModeTree::new(HardwareVariant::FullSize);
        tree.add_base_layer("session", Layer::new().bind("pad", Target::ClipLaunch { track: 0 }));
        tree.add_group(
            ModeGroup::new("encoders")
                .add_mode(Mode::new("device").layer(
                    Layer::new()
                        .bind("enc", Target::DeviceParameter { index: 0 })
                        .bind("pad", Target::DeviceBank { index: 0 }),
                ))
                .add_mode(
                    Mode::new("volume")
                        .layer(Layer::new().bind("enc", Target::Volume { track: 0 }))
                        .layer(Layer::new().bind("pad", Target::Background)),
                )
                .add_mode(
                    Mode::new("send")
                        .layer(Layer::new().bind("enc", Target::Send { track: 0 }))
                        .action(ModeAction::SetSendIndex(1))
                        .enabled(false),
                ),
        );
        tree.add_group(
            ModeGroup::new("mutes")
                .add_mode(Mode::new("mute").layer(Layer::new().bind("btn", Target::Mute { track: 0 })))
                .add_mode(
                    Mode::new("solo")
                        .layer(Layer::new().bind("btn", Target::Solo { track: 0 }))
                        .behaviour(Behaviour::Cancellable),
                ),
        );
        tree.add_group(
            ModeGroup::new("selector")
                .add_mode(
                    Mode::new("selection")
                        .behaviour(Behaviour::Momentary)
                        .action(ModeAction::ToggleInControl(true)),
                )
                .add_mode(Mode::new("session").action(ModeAction::ToggleInControl(false))),
        );
        tree.select("encoders", "device").unwrap();
        tree.select("mutes", "mute").unwrap();
        tree
    }

    #[test]
    fn test_select_swaps_bindings() {
        let mut tree = tree();
        assert_eq!(tree.resolve("enc"), Some(&Target::DeviceParameter { index: 0 }));
        assert_eq!(tree.resolve("pad"), Some(&Target::DeviceBank { index: 0 }));

        tree.select("encoders", "volume").unwrap();
        assert_eq!(tree.resolve("enc"), Some(&Target::Volume { track: 0 }));
        assert_eq!(tree.resolve("pad"), Some(&Target::Background));
        assert!(!tree.bindings().has_owner("encoders/device"));
    }

    #[test]
    fn test_only_selected_mode_has_bindings() {
        let mut tree = tree();
        tree.select("encoders", "volume").unwrap();
        tree.select("encoders", "device").unwrap();

        // one base binding + two device bindings + one mute binding
        assert_eq!(tree.bindings().len(), 4);
        assert!(!tree.bindings().has_owner("encoders/volume"));
    }

    #[test]
    fn test_disabled_mode_is_refused() {
        let mut tree = tree();
        let actions = tree.select("encoders", "send").unwrap();
        assert!(actions.is_empty());
        assert_eq!(tree.selected_mode("encoders"), Some("device"));

        tree.set_mode_enabled("encoders", "send", true).unwrap();
        let actions = tree.select("encoders", "send").unwrap();
        assert_eq!(actions, vec![ModeAction::SetSendIndex(1)]);
        assert_eq!(tree.resolve("enc"), Some(&Target::Send { track: 0 }));
    }

    #[test]
    fn test_reselect_is_noop() {
        let mut tree = tree();
        let before = tree.bindings().len();
        assert!(tree.select("encoders", "device").unwrap().is_empty());
        assert_eq!(tree.bindings().len(), before);
    }

    #[test]
    fn test_cancellable_toggles_back() {
        let mut tree = tree();
        tree.press("mutes", "solo").unwrap();
        assert_eq!(tree.selected_mode("mutes"), Some("solo"));
        assert_eq!(tree.resolve("btn"), Some(&Target::Solo { track: 0 }));

        tree.release("mutes", "solo").unwrap();
        assert_eq!(tree.selected_mode("mutes"), Some("solo"));

        tree.press("mutes", "solo").unwrap();
        assert_eq!(tree.selected_mode("mutes"), Some("mute"));
        assert_eq!(tree.resolve("btn"), Some(&Target::Mute { track: 0 }));
    }

    #[test]
    fn test_momentary_returns_on_release() {
        let mut tree = tree();
        tree.select("selector", "session").unwrap();

        let actions = tree.press("selector", "selection").unwrap();
        assert_eq!(actions, vec![ModeAction::ToggleInControl(true)]);
        assert_eq!(tree.selected_mode("selector"), Some("selection"));

        let actions = tree.release("selector", "selection").unwrap();
        assert_eq!(actions, vec![ModeAction::ToggleInControl(false)]);
        assert_eq!(tree.selected_mode("selector"), Some("session"));
    }

    #[test]
    fn test_unknown_names() {
        let mut tree = tree();
        assert!(matches!(
            tree.select("nope", "device"),
            Err(SurfaceError::UnknownGroup(_))
        ));
        assert!(matches!(
            tree.press("encoders", "nope"),
            Err(SurfaceError::UnknownMode { .. })
        ));
    }
}
