//! Layers and the binding table
//!
//! A layer is a set of control → target bindings owned by a component or a
//! mode. Bindings stack per control: the most recently installed layer wins,
//! and releasing an owner uncovers whatever was below it.

use serde::Serialize;
use std::collections::HashMap;
use tracing::trace;

/// What a control drives while a binding is on top
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "target", rename_all = "snake_case")]
pub enum Target {
    // Session
    ClipLaunch { track: usize },
    SceneLaunch,
    StopAllClips,
    StopTrackClip { track: usize },

    // Mixer
    Volume { track: usize },
    MasterVolume,
    Pan { track: usize },
    Send { track: usize },
    Mute { track: usize },
    Solo { track: usize },

    // Device
    DeviceParameter { index: usize },
    DeviceBank { index: usize },
    DeviceNavLeft,
    DeviceNavRight,

    // Session navigation
    PrevTrack,
    NextTrack,
    PrevScene,
    NextScene,

    // Transport
    Play,
    Stop,
    Loop,
    Record,
    Metronome,

    /// Selects `mode` in `group` according to the mode's behaviour
    ModeButton { group: String, mode: String },
    /// Device-reported InControl state of the pads
    InControlStatus,
    /// Pad InControl switch; re-sends LED feedback when switched on
    RefreshFeedback,
    /// Swallows input so nothing below reacts
    Background,
}

impl Target {
    /// Targets that take the full 0-127 range instead of press/release
    pub fn is_continuous(&self) -> bool {
        matches!(
            self,
            Target::Volume { .. }
                | Target::MasterVolume
                | Target::Pan { .. }
                | Target::Send { .. }
                | Target::DeviceParameter { .. }
        )
    }
}

/// Set of bindings installed together
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Layer {
    bindings: Vec<(String, Target)>,
}

impl Layer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind one control
    pub fn bind(mut self, control_id: impl Into<String>, target: Target) -> Self {
        self.bindings.push((control_id.into(), target));
        self
    }

    /// Bind a row of controls, the target built from the index in the row
    pub fn row<S: AsRef<str>>(mut self, control_ids: &[S], target: impl Fn(usize) -> Target) -> Self {
        for (index, id) in control_ids.iter().enumerate() {
            self.bindings.push((id.as_ref().to_string(), target(index)));
        }
        self
    }

    pub fn bindings(&self) -> &[(String, Target)] {
        &self.bindings
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Binding {
    owner: String,
    target: Target,
}

/// Per-control binding stacks
#[derive(Debug, Clone, Default)]
pub struct BindingTable {
    stacks: HashMap<String, Vec<Binding>>,
}

impl BindingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a layer's bindings on top under `owner`
    pub fn install(&mut self, owner: &str, layer: &Layer) {
        for (control_id, target) in layer.bindings() {
            trace!(owner, control = control_id.as_str(), ?target, "bind");
            self.stacks
                .entry(control_id.clone())
                .or_default()
                .push(Binding {
                    owner: owner.to_string(),
                    target: target.clone(),
                });
        }
    }

    /// Remove every binding installed by `owner`
    pub fn release(&mut self, owner: &str) {
        self.stacks.retain(|_, stack| {
            stack.retain(|binding| binding.owner != owner);
            !stack.is_empty()
        });
    }

    /// Target currently on top for a control
    pub fn resolve(&self, control_id: &str) -> Option<&Target> {
        self.stacks
            .get(control_id)
            .and_then(|stack| stack.last())
            .map(|binding| &binding.target)
    }

    /// Owner of the binding currently on top for a control
    pub fn owner_of(&self, control_id: &str) -> Option<&str> {
        self.stacks
            .get(control_id)
            .and_then(|stack| stack.last())
            .map(|binding| binding.owner.as_str())
    }

    /// Whether `owner` has any binding installed
    pub fn has_owner(&self, owner: &str) -> bool {
        self.stacks
            .values()
            .any(|stack| stack.iter().any(|binding| binding.owner == owner))
    }

    /// Controls with their top target, sorted by control id
    pub fn active(&self) -> Vec<(&str, &Target)> {
        let mut active: Vec<_> = self
            .stacks
            .iter()
            .filter_map(|(id, stack)| stack.last().map(|b| (id.as_str(), &b.target)))
            .collect();
        active.sort_by(|a, b| a.0.cmp(b.0));
        active
    }

    pub fn len(&self) -> usize {
        self.stacks.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.stacks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_binds_by_index() {
        let layer = Layer::new().row(&["a", "b", "c"], |track| Target::Volume { track });
        assert_eq!(layer.bindings().len(), 3);
        assert_eq!(layer.bindings()[2], ("c".to_string(), Target::Volume { track: 2 }));
    }

    #[test]
    fn test_latest_install_wins() {
        let mut table = BindingTable::new();
        table.install("session", &Layer::new().bind("pad", Target::ClipLaunch { track: 0 }));
        table.install("device", &Layer::new().bind("pad", Target::DeviceBank { index: 0 }));

        assert_eq!(table.resolve("pad"), Some(&Target::DeviceBank { index: 0 }));
        assert_eq!(table.owner_of("pad"), Some("device"));
    }

    #[test]
    fn test_release_uncovers_lower_binding() {
        let mut table = BindingTable::new();
        table.install("session", &Layer::new().bind("pad", Target::ClipLaunch { track: 0 }));
        table.install("device", &Layer::new().bind("pad", Target::DeviceBank { index: 0 }));
        table.release("device");

        assert_eq!(table.resolve("pad"), Some(&Target::ClipLaunch { track: 0 }));
        assert!(!table.has_owner("device"));
    }

    #[test]
    fn test_release_from_middle_of_stack() {
        let mut table = BindingTable::new();
        table.install("a", &Layer::new().bind("x", Target::Play));
        table.install("b", &Layer::new().bind("x", Target::Stop));
        table.install("c", &Layer::new().bind("x", Target::Loop));
        table.release("b");

        assert_eq!(table.resolve("x"), Some(&Target::Loop));
        table.release("c");
        assert_eq!(table.resolve("x"), Some(&Target::Play));
        table.release("a");
        assert!(table.is_empty());
    }

    #[test]
    fn test_continuous_targets() {
        assert!(Target::Send { track: 1 }.is_continuous());
        assert!(!Target::Mute { track: 1 }.is_continuous());
        assert!(!Target::Background.is_continuous());
    }
}
