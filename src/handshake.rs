//! Identity handshake
//!
//! Detects which Launchkey variant is attached by sending a Universal Device
//! Inquiry after a short delay and validating the reply.
//!
//! States: `Idle → Requesting → AwaitingResponse → Identified`. A port
//! settings change restarts the sequence from any state. A reply with the
//! right header but an unknown product id is logged and dropped; nothing
//! resends the request until the next restart. Any valid reply cancels the
//! pending request timer, but only a reply to our own request identifies.

use serde::Serialize;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::midi::format_hex;
use crate::task::DelayedTask;

/// Universal Device Inquiry, addressed to all devices
pub const IDENTITY_REQUEST: [u8; 6] = [0xF0, 0x7E, 0x7F, 0x06, 0x01, 0xF7];

/// Sub-IDs of an Identity Reply, at bytes 3..5
pub const IDENTITY_RESPONSE_SIGNATURE: [u8; 2] = [0x06, 0x02];

/// Offset of the product-id payload in an Identity Reply
pub const PRODUCT_ID_OFFSET: usize = 5;

/// Novation manufacturer id, first three payload bytes
pub const PRODUCT_ID_PREFIX: [u8; 3] = [0x00, 0x20, 0x29];

pub const LAUNCHKEY_25_ID_BYTE: u8 = 0x7B;
pub const LAUNCHKEY_49_ID_BYTE: u8 = 0x7C;
pub const LAUNCHKEY_61_ID_BYTE: u8 = 0x7D;

/// Model selectors this surface accepts
pub const PRODUCT_ID_BYTES: [u8; 3] = [
    LAUNCHKEY_25_ID_BYTE,
    LAUNCHKEY_49_ID_BYTE,
    LAUNCHKEY_61_ID_BYTE,
];

pub const DEFAULT_REQUEST_DELAY: Duration = Duration::from_millis(500);

/// Hardware variant, decides which controls exist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HardwareVariant {
    /// Launchkey 49 / 61: sliders and mute buttons present
    FullSize,
    /// Launchkey 25: one slider, no mute buttons
    TwentyFiveKey,
}

impl HardwareVariant {
    pub fn from_model_byte(byte: u8) -> Self {
        if byte == LAUNCHKEY_25_ID_BYTE {
            HardwareVariant::TwentyFiveKey
        } else {
            HardwareVariant::FullSize
        }
    }
}

impl fmt::Display for HardwareVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HardwareVariant::FullSize => write!(f, "full-size"),
            HardwareVariant::TwentyFiveKey => write!(f, "25-key"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    Idle,
    Requesting,
    AwaitingResponse,
    Identified,
}

/// Result of offering a SysEx message to the handshake
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SysexOutcome {
    /// Not an identity reply; the default handler should see it
    Delegated,
    /// First valid reply to an outstanding request
    Identified(HardwareVariant),
    /// Valid reply with no request outstanding
    Revalidated(HardwareVariant),
    /// Identity header with an unknown product id
    Rejected(Vec<u8>),
}

impl SysexOutcome {
    /// Whether the handshake consumed the message
    pub fn is_consumed(&self) -> bool {
        !matches!(self, SysexOutcome::Delegated)
    }
}

/// Check the identity reply header at bytes 3..5
pub fn is_identity_response(midi_bytes: &[u8]) -> bool {
    midi_bytes.get(3..5) == Some(&IDENTITY_RESPONSE_SIGNATURE[..])
}

/// Product-id payload of an identity reply
pub fn extract_product_id_bytes(midi_bytes: &[u8]) -> &[u8] {
    midi_bytes.get(PRODUCT_ID_OFFSET..).unwrap_or_default()
}

/// Validate the manufacturer prefix and model selector
pub fn is_identity_response_valid(product_id_bytes: &[u8]) -> bool {
    product_id_bytes.get(..3) == Some(&PRODUCT_ID_PREFIX[..])
        && product_id_bytes
            .get(3)
            .is_some_and(|byte| PRODUCT_ID_BYTES.contains(byte))
}

/// Per-connection identity handshake
#[derive(Debug)]
pub struct IdentityHandshake {
    state: HandshakeState,
    pending: bool,
    variant: Option<HardwareVariant>,
    request_task: DelayedTask,
}

impl IdentityHandshake {
    pub fn new(request_delay: Duration) -> Self {
        Self {
            state: HandshakeState::Idle,
            pending: false,
            variant: None,
            request_task: DelayedTask::new(request_delay),
        }
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn variant(&self) -> Option<HardwareVariant> {
        self.variant
    }

    pub fn request_task(&self) -> &DelayedTask {
        &self.request_task
    }

    /// Next time the event loop must wake up, if a request is scheduled
    pub fn deadline(&self) -> Option<Instant> {
        self.request_task.deadline()
    }

    /// Start (or restart) a session: kill the old timer, arm a fresh one
    pub fn restart(&mut self, now: Instant) {
        self.request_task.restart(now);
        self.pending = false;
        self.variant = None;
        self.state = HandshakeState::Requesting;
        debug!(
            delay_ms = self.request_task.delay().as_millis() as u64,
            generation = self.request_task.generation(),
            "Identity request scheduled"
        );
    }

    /// Stop the session
    pub fn disconnect(&mut self) {
        self.request_task.kill();
        self.pending = false;
        self.state = HandshakeState::Idle;
    }

    /// Fire the delayed request if due; returns the bytes to send
    pub fn poll(&mut self, now: Instant) -> Option<&'static [u8]> {
        if !self.request_task.fire_if_due(now) {
            return None;
        }
        self.pending = true;
        self.state = HandshakeState::AwaitingResponse;
        info!("Sending identity request: {}", format_hex(&IDENTITY_REQUEST));
        Some(&IDENTITY_REQUEST)
    }

    /// Offer an inbound SysEx message
    pub fn handle_sysex(&mut self, midi_bytes: &[u8]) -> SysexOutcome {
        if !is_identity_response(midi_bytes) {
            return SysexOutcome::Delegated;
        }

        let product_id_bytes = extract_product_id_bytes(midi_bytes);
        if !is_identity_response_valid(product_id_bytes) {
            warn!(
                "MIDI device responded with wrong product id ({})",
                format_hex(product_id_bytes)
            );
            return SysexOutcome::Rejected(product_id_bytes.to_vec());
        }

        let variant = HardwareVariant::from_model_byte(product_id_bytes[3]);
        self.request_task.kill();

        if !self.pending {
            match self.variant {
                Some(known) if known != variant => {
                    warn!("Identity reply names {} but session is {}", variant, known);
                }
                _ => debug!("Identity reply re-validated ({})", variant),
            }
            return SysexOutcome::Revalidated(variant);
        }

        self.pending = false;
        self.variant = Some(variant);
        self.state = HandshakeState::Identified;
        info!("Launchkey identified: {} model", variant);
        SysexOutcome::Identified(variant)
    }
}

impl Default for IdentityHandshake {
    fn default() -> Self {
        Self::new(DEFAULT_REQUEST_DELAY)
    }
}
