//! Control table for the Launchkey MK2 family
//!
//! Parses `docs/launchkey-controls.csv` into named controls bound to their
//! MIDI note/CC identifiers, with the variant each control exists on.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;
use tracing::info;

use crate::error::SurfaceError;
use crate::handshake::HardwareVariant;
use crate::midi::MidiMessage;

/// Physical element kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlKind {
    /// Momentary button or pad
    Button,
    /// Latching button (InControl switches)
    Toggle,
    /// Absolute encoder
    Encoder,
    /// Fader
    Slider,
}

/// Which hardware variants carry a control
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum VariantFilter {
    #[serde(rename = "all")]
    All,
    #[serde(rename = "full")]
    FullSize,
    #[serde(rename = "25")]
    TwentyFiveKey,
}

impl VariantFilter {
    pub fn includes(self, variant: HardwareVariant) -> bool {
        match self {
            VariantFilter::All => true,
            VariantFilter::FullSize => variant == HardwareVariant::FullSize,
            VariantFilter::TwentyFiveKey => variant == HardwareVariant::TwentyFiveKey,
        }
    }
}

/// Control row from CSV
#[derive(Debug, Clone, Deserialize)]
pub struct ControlRow {
    pub control_id: String,
    pub group: String,
    pub kind: ControlKind,
    pub message: String,
    /// 1-based MIDI channel
    pub channel: u8,
    pub variant: VariantFilter,
}

/// Parsed MIDI identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MidiSpec {
    /// Control Change: cc=number
    ControlChange { cc: u8 },
    /// Note: note=number
    Note { note: u8 },
}

impl MidiSpec {
    /// Parse a spec string like "cc=21" or "note=96"
    pub fn parse(spec: &str) -> Result<Self> {
        let spec = spec.trim();

        if let Some(cc_str) = spec.strip_prefix("cc=") {
            let cc = cc_str
                .parse::<u8>()
                .with_context(|| format!("Invalid CC number: {}", cc_str))?;
            anyhow::ensure!(cc < 128, "CC number out of range: {}", cc);
            Ok(MidiSpec::ControlChange { cc })
        } else if let Some(note_str) = spec.strip_prefix("note=") {
            let note = note_str
                .parse::<u8>()
                .with_context(|| format!("Invalid note number: {}", note_str))?;
            anyhow::ensure!(note < 128, "Note number out of range: {}", note);
            Ok(MidiSpec::Note { note })
        } else {
            anyhow::bail!("Unknown MIDI spec format: {}", spec);
        }
    }
}

/// Address of a control on the wire: (spec, 0-based channel)
pub type ControlAddress = (MidiSpec, u8);

/// A control resolved from a row
#[derive(Debug, Clone)]
pub struct Control {
    pub id: String,
    pub group: String,
    pub kind: ControlKind,
    pub spec: MidiSpec,
    /// 0-based MIDI channel
    pub channel: u8,
    pub variant: VariantFilter,
}

impl Control {
    pub fn address(&self) -> ControlAddress {
        (self.spec, self.channel)
    }

    /// Message that lights this control with the given value
    pub fn feedback_message(&self, value: u8) -> MidiMessage {
        match self.spec {
            MidiSpec::Note { note } => MidiMessage::NoteOn {
                channel: self.channel,
                note,
                velocity: value,
            },
            MidiSpec::ControlChange { cc } => MidiMessage::ControlChange {
                channel: self.channel,
                cc,
                value,
            },
        }
    }
}

/// Input event resolved from an inbound message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlInput {
    pub address: ControlAddress,
    pub value: u8,
}

impl ControlInput {
    /// Extract address and value from note or CC messages
    pub fn from_message(message: &MidiMessage) -> Option<Self> {
        match *message {
            MidiMessage::NoteOn { channel, note, velocity } => Some(Self {
                address: (MidiSpec::Note { note }, channel),
                value: velocity,
            }),
            MidiMessage::NoteOff { channel, note, .. } => Some(Self {
                address: (MidiSpec::Note { note }, channel),
                value: 0,
            }),
            MidiMessage::ControlChange { channel, cc, value } => Some(Self {
                address: (MidiSpec::ControlChange { cc }, channel),
                value,
            }),
            _ => None,
        }
    }
}

/// Control table
#[derive(Debug, Clone)]
pub struct ControlMappingDB {
    /// Controls by control_id
    pub controls: HashMap<String, Control>,

    /// Control ids grouped by category, in file order
    pub groups: HashMap<String, Vec<String>>,
}

impl ControlMappingDB {
    /// Load control table from CSV file
    pub async fn load_from_csv(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let csv_content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read CSV file: {}", path.display()))?;

        Self::parse_csv(&csv_content)
    }

    /// Load from embedded CSV string
    pub fn load_from_string(csv_content: &str) -> Result<Self> {
        Self::parse_csv(csv_content)
    }

    fn parse_csv(csv_content: &str) -> Result<Self> {
        let mut reader = csv::Reader::from_reader(csv_content.as_bytes());
        let mut controls = HashMap::new();
        let mut groups: HashMap<String, Vec<String>> = HashMap::new();
        let mut seen: HashMap<ControlAddress, (String, VariantFilter)> = HashMap::new();

        for result in reader.deserialize() {
            let row: ControlRow = result
                .map_err(SurfaceError::from)
                .context("Failed to parse CSV row")?;

            let spec = MidiSpec::parse(&row.message)
                .with_context(|| format!("Invalid message for {}", row.control_id))?;

            if !(1..=16).contains(&row.channel) {
                return Err(SurfaceError::InvalidControl {
                    control: row.control_id,
                    reason: format!("channel {} out of range 1-16", row.channel),
                }
                .into());
            }
            let channel = row.channel - 1;

            if let Some((other, other_variant)) = seen.get(&(spec, channel)) {
                if overlaps(*other_variant, row.variant) {
                    return Err(SurfaceError::InvalidControl {
                        control: row.control_id,
                        reason: format!("same MIDI address as {}", other),
                    }
                    .into());
                }
            }
            seen.insert((spec, channel), (row.control_id.clone(), row.variant));

            if controls.contains_key(&row.control_id) {
                return Err(SurfaceError::InvalidControl {
                    control: row.control_id,
                    reason: "duplicate control id".to_string(),
                }
                .into());
            }

            groups
                .entry(row.group.clone())
                .or_default()
                .push(row.control_id.clone());

            controls.insert(
                row.control_id.clone(),
                Control {
                    id: row.control_id,
                    group: row.group,
                    kind: row.kind,
                    spec,
                    channel,
                    variant: row.variant,
                },
            );
        }

        info!(
            "Loaded {} controls in {} groups",
            controls.len(),
            groups.len()
        );

        Ok(Self { controls, groups })
    }

    /// Get a control by id
    pub fn get(&self, control_id: &str) -> Option<&Control> {
        self.controls.get(control_id)
    }

    /// Get a control by id if it exists on the variant
    pub fn get_for_variant(&self, control_id: &str, variant: HardwareVariant) -> Option<&Control> {
        self.get(control_id)
            .filter(|control| control.variant.includes(variant))
    }

    /// All control ids in a group
    pub fn get_group(&self, group: &str) -> Option<&Vec<String>> {
        self.groups.get(group)
    }

    pub fn groups(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(|s| s.as_str())
    }

    /// Find control by MIDI address on the given variant (reverse lookup)
    pub fn find_control(
        &self,
        address: &ControlAddress,
        variant: HardwareVariant,
    ) -> Option<&Control> {
        self.controls
            .values()
            .find(|control| control.address() == *address && control.variant.includes(variant))
    }

    /// Number of controls present on a variant
    pub fn count_for_variant(&self, variant: HardwareVariant) -> usize {
        self.controls
            .values()
            .filter(|control| control.variant.includes(variant))
            .count()
    }
}

fn overlaps(a: VariantFilter, b: VariantFilter) -> bool {
    a == VariantFilter::All || b == VariantFilter::All || a == b
}

/// Default embedded CSV content
pub const DEFAULT_CSV: &str = include_str!("../docs/launchkey-controls.csv");

static DEFAULT_DB: OnceLock<ControlMappingDB> = OnceLock::new();

/// Load the default control table (cached after first parse)
pub fn load_default_mappings() -> Result<ControlMappingDB> {
    if let Some(db) = DEFAULT_DB.get() {
        return Ok(db.clone());
    }

    let db = ControlMappingDB::load_from_string(DEFAULT_CSV)?;
    // Ignore error if another thread set it first
    let _ = DEFAULT_DB.set(db.clone());
    Ok(db)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_midi_spec_parsing() {
        assert_eq!(
            MidiSpec::parse("cc=21").unwrap(),
            MidiSpec::ControlChange { cc: 21 }
        );
        assert_eq!(
            MidiSpec::parse(" note=96 ").unwrap(),
            MidiSpec::Note { note: 96 }
        );
        assert!(MidiSpec::parse("cc=200").is_err());
        assert!(MidiSpec::parse("pb=ch1").is_err());
    }

    #[test]
    fn test_load_default_mappings() {
        let db = load_default_mappings().unwrap();
        assert_eq!(db.controls.len(), 56);

        let encoder = db.get("encoder_0").unwrap();
        assert_eq!(encoder.kind, ControlKind::Encoder);
        assert_eq!(encoder.spec, MidiSpec::ControlChange { cc: 21 });
        assert_eq!(encoder.channel, 15);

        assert_eq!(db.get_group("top_pads").unwrap().len(), 7);
        assert_eq!(db.get_group("bottom_pads").unwrap()[0], "pad_1_0");
        assert_eq!(db.groups().count(), 9);
        assert!(db.groups().any(|group| group == "transport"));
    }

    #[test]
    fn test_variant_counts() {
        let db = load_default_mappings().unwrap();
        assert_eq!(db.count_for_variant(HardwareVariant::FullSize), 54);
        assert_eq!(db.count_for_variant(HardwareVariant::TwentyFiveKey), 40);
    }

    #[test]
    fn test_reverse_lookup_respects_variant() {
        let db = load_default_mappings().unwrap();

        let master = (MidiSpec::ControlChange { cc: 7 }, 15);
        assert_eq!(
            db.find_control(&master, HardwareVariant::FullSize)
                .map(|c| c.id.as_str()),
            Some("master_slider")
        );
        assert!(db
            .find_control(&master, HardwareVariant::TwentyFiveKey)
            .is_none());

        let small = (MidiSpec::ControlChange { cc: 7 }, 0);
        assert_eq!(
            db.find_control(&small, HardwareVariant::TwentyFiveKey)
                .map(|c| c.id.as_str()),
            Some("slider_25")
        );
    }

    #[test]
    fn test_note_and_cc_share_numbers() {
        let db = load_default_mappings().unwrap();
        let pad = (MidiSpec::Note { note: 112 }, 15);
        let scene_up = (MidiSpec::ControlChange { cc: 112 }, 15);
        assert_eq!(
            db.find_control(&pad, HardwareVariant::FullSize).unwrap().id,
            "pad_1_0"
        );
        assert_eq!(
            db.find_control(&scene_up, HardwareVariant::FullSize)
                .unwrap()
                .id,
            "scene_up"
        );
    }

    #[test]
    fn test_duplicate_address_rejected() {
        let csv = "control_id,group,kind,message,channel,variant\n\
                   a,g,button,note=1,16,all\n\
                   b,g,button,note=1,16,full\n";
        assert!(ControlMappingDB::load_from_string(csv).is_err());
    }

    #[test]
    fn test_variant_exclusive_address_allowed() {
        let csv = "control_id,group,kind,message,channel,variant\n\
                   a,g,slider,cc=7,16,full\n\
                   b,g,slider,cc=7,16,25\n";
        let db = ControlMappingDB::load_from_string(csv).unwrap();
        assert_eq!(db.controls.len(), 2);
    }

    #[test]
    fn test_bad_channel_rejected() {
        let csv = "control_id,group,kind,message,channel,variant\n\
                   a,g,button,note=1,0,all\n";
        assert!(ControlMappingDB::load_from_string(csv).is_err());
    }

    #[test]
    fn test_control_input_from_message() {
        let input = ControlInput::from_message(&MidiMessage::NoteOff {
            channel: 15,
            note: 16,
            velocity: 64,
        })
        .unwrap();
        assert_eq!(input.value, 0);
        assert_eq!(input.address, (MidiSpec::Note { note: 16 }, 15));

        assert!(ControlInput::from_message(&MidiMessage::PitchBend {
            channel: 0,
            value: 0
        })
        .is_none());
    }

    #[test]
    fn test_feedback_message() {
        let db = load_default_mappings().unwrap();
        let pad = db.get("pad_1_0").unwrap();
        assert_eq!(pad.feedback_message(21).encode(), vec![0x9F, 112, 21]);
    }
}
