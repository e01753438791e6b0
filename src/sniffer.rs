//! MIDI sniffer for debugging
//!
//! Prints inbound traffic from the Launchkey ports and flags identity
//! replies so the handshake can be checked without a DAW.

use anyhow::{bail, Result};
use colored::*;
use midir::{Ignore, MidiInput, MidiInputConnection};
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::info;

use crate::device::discovery;
use crate::handshake::{extract_product_id_bytes, is_identity_response, is_identity_response_valid, HardwareVariant};
use crate::midi::{format_hex, MidiMessage};

/// Sniffed message
#[derive(Debug, Clone)]
pub struct SnifferEvent {
    pub timestamp_ms: u64,
    pub port_name: String,
    pub data: Vec<u8>,
    pub message: Option<MidiMessage>,
}

/// What an identity reply says about the device
pub fn describe_identity(data: &[u8]) -> Option<String> {
    if !is_identity_response(data) {
        return None;
    }
    let product_id = extract_product_id_bytes(data);
    if is_identity_response_valid(product_id) {
        Some(format!(
            "Launchkey MK2 ({} model)",
            HardwareVariant::from_model_byte(product_id[3])
        ))
    } else {
        Some(format!("unknown device ({})", format_hex(product_id)))
    }
}

/// Run the sniffer on ports matching `pattern`, or on every physical input
pub async fn run_cli_sniffer(pattern: Option<&str>) -> Result<()> {
    println!("{}", "=== MIDI Sniffer ===".bold().cyan());
    println!("Press Ctrl+C to exit\n");

    discovery::print_ports();

    let mut sniffer = CliSniffer::new();
    match pattern {
        Some(pattern) => sniffer.connect_input(pattern)?,
        None => sniffer.connect_all_inputs()?,
    }

    println!("\n{}", "Monitoring MIDI traffic...".green());
    println!("{}", "Format: [timestamp] PORT | HEX => PARSED".dimmed());
    println!("{}\n", "-".repeat(80).dimmed());

    sniffer.run().await
}

struct CliSniffer {
    connections: Vec<MidiInputConnection<()>>,
    event_rx: mpsc::Receiver<SnifferEvent>,
    event_tx: mpsc::Sender<SnifferEvent>,
    start_time: Instant,
}

impl CliSniffer {
    fn new() -> Self {
        let (event_tx, event_rx) = mpsc::channel(1000);

        Self {
            connections: Vec::new(),
            event_rx,
            event_tx,
            start_time: Instant::now(),
        }
    }

    fn connect_input(&mut self, pattern: &str) -> Result<()> {
        let midi_in = MidiInput::new("Launchkey-Sniffer")?;

        // A numeric pattern selects by index
        let found = if let Ok(index) = pattern.parse::<usize>() {
            midi_in.ports().into_iter().nth(index).and_then(|port| {
                let name = midi_in.port_name(&port).ok()?;
                Some((port, name))
            })
        } else {
            let pattern = pattern.to_lowercase();
            midi_in.ports().into_iter().find_map(|port| {
                let name = midi_in.port_name(&port).ok()?;
                name.to_lowercase().contains(&pattern).then_some((port, name))
            })
        };

        match found {
            Some((port, name)) => self.connect_port(midi_in, port, &name),
            None => bail!("No input port found matching: {}", pattern),
        }
    }

    fn connect_all_inputs(&mut self) -> Result<()> {
        for port_info in discovery::discover_input_ports()? {
            if port_info.is_virtual {
                continue;
            }
            let midi_in = MidiInput::new(&format!("Sniffer-{}", port_info.index))?;
            if let Some(port) = midi_in.ports().into_iter().nth(port_info.index) {
                self.connect_port(midi_in, port, &port_info.name)?;
            }
        }

        if self.connections.is_empty() {
            bail!("No physical MIDI ports found");
        }
        Ok(())
    }

    fn connect_port(
        &mut self,
        mut midi_in: MidiInput,
        port: midir::MidiInputPort,
        port_name: &str,
    ) -> Result<()> {
        midi_in.ignore(Ignore::None);

        let event_tx = self.event_tx.clone();
        let port_name = port_name.to_string();
        let start_time = self.start_time;

        info!("Connecting to: {}", port_name);

        let conn = midi_in
            .connect(
                &port,
                "Sniffer",
                move |_timestamp, data, _| {
                    let event = SnifferEvent {
                        timestamp_ms: start_time.elapsed().as_millis() as u64,
                        port_name: port_name.clone(),
                        data: data.to_vec(),
                        message: MidiMessage::parse(data),
                    };
                    let _ = event_tx.try_send(event);
                },
                (),
            )
            .map_err(|e| anyhow::anyhow!("Failed to connect: {}", e))?;

        self.connections.push(conn);
        Ok(())
    }

    async fn run(mut self) -> Result<()> {
        loop {
            tokio::select! {
                Some(event) = self.event_rx.recv() => print_event(&event),
                _ = tokio::signal::ctrl_c() => break,
            }
        }

        println!("\n{}", "Sniffer stopped".yellow());
        Ok(())
    }
}

fn print_event(event: &SnifferEvent) {
    let port = if event.port_name.chars().count() > 20 {
        format!("{}...", event.port_name.chars().take(17).collect::<String>())
    } else {
        event.port_name.clone()
    };

    let hex = format_hex(&event.data);
    let parsed = match event.message {
        Some(ref msg) => format!(" => {}", msg.to_string().bright_blue()),
        None => String::new(),
    };

    let hex_colored = match event.message {
        Some(MidiMessage::NoteOn { .. }) => hex.bright_green(),
        Some(MidiMessage::NoteOff { .. }) => hex.bright_red(),
        Some(MidiMessage::ControlChange { .. }) => hex.bright_yellow(),
        Some(MidiMessage::PitchBend { .. }) => hex.bright_cyan(),
        Some(MidiMessage::SysEx { .. }) => hex.bright_magenta(),
        Some(_) => hex.normal(),
        None => hex.bright_black(),
    };

    println!(
        "[{}ms] {:20} | {}{}",
        format!("{:08}", event.timestamp_ms).dimmed(),
        port.white(),
        hex_colored,
        parsed
    );

    if let Some(identity) = describe_identity(&event.data) {
        println!("           {} {}", "IDENTITY".bold().bright_green(), identity);
    }
}
