//! Launchkey MIDI driver
//!
//! Owns the midir connections to the Launchkey's InControl ports. Inbound
//! messages are forwarded on an mpsc channel so the event loop stays the
//! only owner of surface state.

use midir::{Ignore, MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, info, trace};

use crate::config::MidiConfig;
use crate::error::{Result, SurfaceError};
use crate::midi::format_hex;

const CLIENT_NAME: &str = "Launchkey-Surface";

/// Raw MIDI event from the device
#[derive(Debug, Clone)]
pub struct DeviceEvent {
    pub raw_data: Vec<u8>,
}

pub struct LaunchkeyDriver {
    input_conn: Option<MidiInputConnection<()>>,
    output_conn: Option<Arc<Mutex<MidiOutputConnection>>>,
    event_tx: mpsc::Sender<DeviceEvent>,
    event_rx: Option<mpsc::Receiver<DeviceEvent>>,
    input_port_name: String,
    output_port_name: String,
}

impl LaunchkeyDriver {
    pub fn new(config: &MidiConfig) -> Self {
        let (event_tx, event_rx) = mpsc::channel(1000);

        Self {
            input_conn: None,
            output_conn: None,
            event_tx,
            event_rx: Some(event_rx),
            input_port_name: config.input_port.clone(),
            output_port_name: config.output_port.clone(),
        }
    }

    /// Point the driver at new ports; takes effect on the next connect
    pub fn set_ports(&mut self, config: &MidiConfig) {
        self.input_port_name = config.input_port.clone();
        self.output_port_name = config.output_port.clone();
    }

    /// Open both ports, closing any previous connection first
    pub fn connect(&mut self) -> Result<()> {
        self.disconnect();

        info!(
            "Connecting to Launchkey - Input: '{}', Output: '{}'",
            self.input_port_name, self.output_port_name
        );

        let mut midi_in = MidiInput::new(&format!("{}-Input", CLIENT_NAME))?;
        // Identity replies arrive as SysEx
        midi_in.ignore(Ignore::None);

        let (in_port, port_name) = find_input_port(&midi_in, &self.input_port_name).ok_or_else(|| {
            SurfaceError::PortNotFound {
                direction: "Input",
                pattern: self.input_port_name.clone(),
            }
        })?;
        info!("Connecting to input port: {}", port_name);

        let event_tx = self.event_tx.clone();
        let input_conn = midi_in
            .connect(
                &in_port,
                CLIENT_NAME,
                move |_timestamp, data, _| {
                    let event = DeviceEvent {
                        raw_data: data.to_vec(),
                    };
                    if event_tx.try_send(event).is_err() {
                        trace!("Dropped inbound MIDI: {}", format_hex(data));
                    }
                },
                (),
            )
            .map_err(|e| SurfaceError::MidiConnect(e.to_string()))?;
        self.input_conn = Some(input_conn);

        let midi_out = MidiOutput::new(&format!("{}-Output", CLIENT_NAME))?;
        let (out_port, port_name) =
            find_output_port(&midi_out, &self.output_port_name).ok_or_else(|| {
                SurfaceError::PortNotFound {
                    direction: "Output",
                    pattern: self.output_port_name.clone(),
                }
            })?;
        info!("Connecting to output port: {}", port_name);

        let output_conn = midi_out
            .connect(&out_port, CLIENT_NAME)
            .map_err(|e| SurfaceError::MidiConnect(e.to_string()))?;
        self.output_conn = Some(Arc::new(Mutex::new(output_conn)));

        info!("Launchkey ports open");
        Ok(())
    }

    pub fn disconnect(&mut self) {
        if self.input_conn.take().is_some() | self.output_conn.take().is_some() {
            info!("Launchkey disconnected");
        }
    }

    pub fn is_connected(&self) -> bool {
        self.input_conn.is_some() && self.output_conn.is_some()
    }

    pub fn send_raw(&self, data: &[u8]) -> Result<()> {
        let output = self.output_conn.as_ref().ok_or(SurfaceError::NotConnected)?;

        let mut conn = output.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        conn.send(data)?;

        debug!("Sent: {}", format_hex(data));
        Ok(())
    }

    /// Send a batch, stopping at the first failure
    pub fn send_all(&self, messages: &[Vec<u8>]) -> Result<()> {
        for data in messages {
            self.send_raw(data)?;
        }
        Ok(())
    }

    /// Take the event receiver (for the event loop to consume)
    pub fn take_event_receiver(&mut self) -> Option<mpsc::Receiver<DeviceEvent>> {
        self.event_rx.take()
    }
}

/// Case-insensitive substring match on port names
fn port_matches(name: &str, pattern: &str) -> bool {
    name.to_lowercase().contains(&pattern.to_lowercase())
}

fn find_input_port(midi_in: &MidiInput, pattern: &str) -> Option<(midir::MidiInputPort, String)> {
    midi_in.ports().into_iter().find_map(|port| {
        let name = midi_in.port_name(&port).ok()?;
        port_matches(&name, pattern).then(|| {
            debug!("Found port '{}' matching pattern '{}'", name, pattern);
            (port, name)
        })
    })
}

fn find_output_port(
    midi_out: &MidiOutput,
    pattern: &str,
) -> Option<(midir::MidiOutputPort, String)> {
    midi_out.ports().into_iter().find_map(|port| {
        let name = midi_out.port_name(&port).ok()?;
        port_matches(&name, pattern).then(|| {
            debug!("Found port '{}' matching pattern '{}'", name, pattern);
            (port, name)
        })
    })
}

/// Port discovery utilities
pub mod discovery {
    use super::*;

    /// Information about a MIDI port
    #[derive(Debug, Clone)]
    pub struct PortInfo {
        pub index: usize,
        pub name: String,
        pub is_virtual: bool,
    }

    fn is_virtual(name: &str) -> bool {
        name.contains("Virtual") || name.contains("loopMIDI") || name.contains("IAC")
    }

    pub fn discover_input_ports() -> Result<Vec<PortInfo>> {
        let midi_in = MidiInput::new(&format!("{}-Discovery", CLIENT_NAME))?;
        Ok(midi_in
            .ports()
            .iter()
            .enumerate()
            .filter_map(|(index, port)| {
                let name = midi_in.port_name(port).ok()?;
                Some(PortInfo {
                    index,
                    is_virtual: is_virtual(&name),
                    name,
                })
            })
            .collect())
    }

    pub fn discover_output_ports() -> Result<Vec<PortInfo>> {
        let midi_out = MidiOutput::new(&format!("{}-Discovery", CLIENT_NAME))?;
        Ok(midi_out
            .ports()
            .iter()
            .enumerate()
            .filter_map(|(index, port)| {
                let name = midi_out.port_name(port).ok()?;
                Some(PortInfo {
                    index,
                    is_virtual: is_virtual(&name),
                    name,
                })
            })
            .collect())
    }

    /// Find the Launchkey InControl port pair.
    ///
    /// The MK2 exposes two ports; the second one ("MIDI 2" or "InControl")
    /// carries the surface protocol.
    pub fn find_launchkey_ports() -> Option<(String, String)> {
        let inputs = discover_input_ports().ok()?;
        let outputs = discover_output_ports().ok()?;

        for pattern in ["InControl", "MIDIIN2", "MIDI 2", "Launchkey"] {
            let input = inputs.iter().find(|p| port_matches(&p.name, pattern) && !p.is_virtual);
            let output = outputs.iter().find(|p| port_matches(&p.name, pattern) && !p.is_virtual);
            if let (Some(inp), Some(out)) = (input, output) {
                return Some((inp.name.clone(), out.name.clone()));
            }
        }
        None
    }

    pub fn print_ports() {
        println!("\n=== MIDI Input Ports ===");
        match discover_input_ports() {
            Ok(ports) => {
                for port in &ports {
                    let virtual_tag = if port.is_virtual { " [VIRTUAL]" } else { "" };
                    println!("  {}: {}{}", port.index, port.name, virtual_tag);
                }
            }
            Err(e) => println!("  (unavailable: {})", e),
        }

        println!("\n=== MIDI Output Ports ===");
        match discover_output_ports() {
            Ok(ports) => {
                for port in &ports {
                    let virtual_tag = if port.is_virtual { " [VIRTUAL]" } else { "" };
                    println!("  {}: {}{}", port.index, port.name, virtual_tag);
                }
            }
            Err(e) => println!("  (unavailable: {})", e),
        }

        if let Some((input, output)) = find_launchkey_ports() {
            println!("\nSuggested config:\n  input_port: \"{}\"\n  output_port: \"{}\"", input, output);
        }
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_matching_ignores_case() {
        assert!(port_matches("Launchkey MK2 49 MIDI 2", "launchkey"));
        assert!(port_matches("LKMK2 InControl", "INCONTROL"));
        assert!(!port_matches("X-Touch", "Launchkey"));
    }

    #[test]
    fn test_send_without_connection_fails() {
        let driver = LaunchkeyDriver::new(&MidiConfig {
            input_port: "in".to_string(),
            output_port: "out".to_string(),
        });
        assert!(!driver.is_connected());
        assert!(matches!(
            driver.send_raw(&[0x90, 0x00, 0x00]),
            Err(SurfaceError::NotConnected)
        ));
    }

    #[test]
    fn test_port_discovery() {
        // Only checks the discovery calls don't panic without MIDI hardware
        let _ = discovery::discover_input_ports();
        let _ = discovery::discover_output_ports();
        let _ = discovery::find_launchkey_ports();
    }
}
