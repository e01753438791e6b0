//! LED feedback for mode buttons
//!
//! Mode buttons of skinned groups show whether their mode is selected,
//! selectable, or disabled. Only changes are sent unless a refresh is forced,
//! and buttons that lose their mode binding are switched off.

use std::collections::{BTreeMap, HashMap};

use crate::config::SkinConfig;
use crate::modes::{ModeTree, Target};

/// Skin velocity for one mode button
pub fn mode_color(skin: &SkinConfig, selected: bool, enabled: bool) -> u8 {
    if selected {
        skin.mode_selected
    } else if enabled {
        skin.mode_available
    } else {
        skin.mode_disabled
    }
}

/// Velocity each visible mode button should show
pub fn desired_state(tree: &ModeTree, skin: &SkinConfig) -> BTreeMap<String, u8> {
    let mut desired = BTreeMap::new();
    for (control_id, target) in tree.bindings().active() {
        let Target::ModeButton { group, mode } = target else {
            continue;
        };
        if !tree.group(group).is_some_and(|g| g.skinned) {
            continue;
        }
        let selected = tree.selected_mode(group) == Some(mode.as_str());
        let enabled = tree.is_mode_enabled(group, mode);
        desired.insert(control_id.to_string(), mode_color(skin, selected, enabled));
    }
    desired
}

/// Last velocity sent per control
#[derive(Debug, Default)]
pub struct LedFeedback {
    sent: HashMap<String, u8>,
}

impl LedFeedback {
    pub fn new() -> Self {
        Self::default()
    }

    /// Updates needed to reach `desired`, in control id order
    pub fn diff(&mut self, desired: &BTreeMap<String, u8>, force: bool) -> Vec<(String, u8)> {
        let mut updates: Vec<(String, u8)> = self
            .sent
            .keys()
            .filter(|id| !desired.contains_key(*id))
            .map(|id| (id.clone(), 0))
            .collect();
        updates.sort();

        for (id, &value) in desired {
            if force || self.sent.get(id) != Some(&value) {
                updates.push((id.clone(), value));
            }
        }

        self.sent = desired.clone().into_iter().collect();
        updates
    }

    /// Switch every lit button off and forget them
    pub fn clear(&mut self) -> Vec<(String, u8)> {
        let mut updates: Vec<(String, u8)> = self.sent.drain().map(|(id, _)| (id, 0)).collect();
        updates.sort();
        updates
    }

    /// Forget what was sent without sending anything
    pub fn reset(&mut self) {
        self.sent.clear();
    }
}
