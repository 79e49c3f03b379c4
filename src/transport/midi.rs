//! SysEx over MIDI ports

use anyhow::{anyhow, Context, Result};
use bytes::Bytes;
use midir::{Ignore, MidiInput, MidiInputConnection, MidiInputPort, MidiOutput, MidiOutputConnection, MidiOutputPort};
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use super::{Transport, FRAME_CHANNEL_CAPACITY};
use crate::config::TransportConfig;
use crate::protocol::codec::SYSEX_START;

const CLIENT_NAME: &str = "surface-sync";

/// MIDI port pair carrying protocol frames
pub struct MidiTransport {
    input_conn: Option<MidiInputConnection<()>>,
    output_conn: Option<MidiOutputConnection>,
    frame_tx: mpsc::Sender<Bytes>,
    frame_rx: Option<mpsc::Receiver<Bytes>>,
    input_port_name: String,
    output_port_name: String,
    name: String,
}

impl MidiTransport {
    pub fn new(config: &TransportConfig) -> Self {
        let (frame_tx, frame_rx) = mpsc::channel(FRAME_CHANNEL_CAPACITY);
        Self {
            input_conn: None,
            output_conn: None,
            frame_tx,
            frame_rx: Some(frame_rx),
            input_port_name: config.input_port.clone(),
            output_port_name: config.output_port.clone(),
            name: format!("midi:{}", config.output_port),
        }
    }

    /// List available MIDI input ports
    pub fn list_input_ports() -> Result<Vec<String>> {
        let midi_in = MidiInput::new("surface-sync-scanner")?;
        Ok(midi_in
            .ports()
            .iter()
            .filter_map(|port| midi_in.port_name(port).ok())
            .collect())
    }

    /// List available MIDI output ports
    pub fn list_output_ports() -> Result<Vec<String>> {
        let midi_out = MidiOutput::new("surface-sync-scanner")?;
        Ok(midi_out
            .ports()
            .iter()
            .filter_map(|port| midi_out.port_name(port).ok())
            .collect())
    }

    /// Case-insensitive substring match on port names
    fn matches(name: &str, pattern: &str) -> bool {
        name.to_lowercase().contains(&pattern.to_lowercase())
    }

    fn find_input_port(midi_in: &MidiInput, pattern: &str) -> Option<(MidiInputPort, String)> {
        midi_in.ports().into_iter().find_map(|port| {
            let name = midi_in.port_name(&port).ok()?;
            Self::matches(&name, pattern).then_some((port, name))
        })
    }

    fn find_output_port(midi_out: &MidiOutput, pattern: &str) -> Option<(MidiOutputPort, String)> {
        midi_out.ports().into_iter().find_map(|port| {
            let name = midi_out.port_name(&port).ok()?;
            Self::matches(&name, pattern).then_some((port, name))
        })
    }

    /// Open both ports
    pub fn connect(&mut self) -> Result<()> {
        self.close();

        info!(
            "🔌 Connecting to host - Input: '{}', Output: '{}'",
            self.input_port_name, self.output_port_name
        );

        let mut midi_in =
            MidiInput::new(&format!("{}-input", CLIENT_NAME)).context("Failed to create MIDI input")?;
        // Protocol frames are SysEx, which midir drops by default
        midi_in.ignore(Ignore::None);

        let (in_port, port_name) = Self::find_input_port(&midi_in, &self.input_port_name)
            .ok_or_else(|| anyhow!("Input port '{}' not found", self.input_port_name))?;
        info!("Connecting to input port: {}", port_name);

        let frame_tx = self.frame_tx.clone();
        let input_conn = midi_in
            .connect(
                &in_port,
                CLIENT_NAME,
                move |_timestamp, data, _| {
                    if data.first() != Some(&SYSEX_START) {
                        trace!("Ignoring non-SysEx MIDI: {}", hex::encode_upper(data));
                        return;
                    }
                    // Never block the MIDI thread
                    if let Err(e) = frame_tx.try_send(Bytes::copy_from_slice(data)) {
                        warn!("⚠️  Dropping inbound frame: {}", e);
                    }
                },
                (),
            )
            .map_err(|e| anyhow!("Failed to connect to input port: {}", e))?;
        self.input_conn = Some(input_conn);

        let midi_out = MidiOutput::new(&format!("{}-output", CLIENT_NAME))
            .context("Failed to create MIDI output")?;
        let (out_port, port_name) = Self::find_output_port(&midi_out, &self.output_port_name)
            .ok_or_else(|| anyhow!("Output port '{}' not found", self.output_port_name))?;
        info!("Connecting to output port: {}", port_name);

        let output_conn = midi_out
            .connect(&out_port, CLIENT_NAME)
            .map_err(|e| anyhow!("Failed to connect to output port: {}", e))?;
        self.output_conn = Some(output_conn);

        info!("✅ MIDI transport connected");
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.input_conn.is_some() && self.output_conn.is_some()
    }
}

impl Transport for MidiTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn send(&mut self, frame: &[u8]) -> Result<()> {
        let output = self
            .output_conn
            .as_mut()
            .ok_or_else(|| anyhow!("Not connected to output port"))?;
        output.send(frame).context("Failed to send SysEx frame")?;
        debug!("Sent {} bytes", frame.len());
        Ok(())
    }

    fn take_receiver(&mut self) -> Option<mpsc::Receiver<Bytes>> {
        self.frame_rx.take()
    }

    fn close(&mut self) {
        let was_open = self.input_conn.is_some() || self.output_conn.is_some();
        self.input_conn = None;
        self.output_conn = None;
        if was_open {
            info!("🔌 MIDI transport disconnected");
        }
    }
}

/// Print available ports, highlighting those matching the configured names
pub fn list_ports_formatted(config: &TransportConfig) {
    use colored::*;

    println!("\n{}", "=== Available MIDI Ports ===".bold().cyan());

    let sections = [
        ("Input Ports:", MidiTransport::list_input_ports(), &config.input_port),
        ("Output Ports:", MidiTransport::list_output_ports(), &config.output_port),
    ];

    for (title, ports, pattern) in sections {
        println!("\n{}", title.bold());
        match ports {
            Ok(ports) if ports.is_empty() => println!("  {}", "No ports found".dimmed()),
            Ok(ports) => {
                for port in ports {
                    if MidiTransport::matches(&port, pattern) {
                        println!("  {} {}", "[MATCH]".green(), port.bright_white());
                    } else {
                        println!("  {} {}", "       ".normal(), port);
                    }
                }
            }
            Err(e) => println!("  {} {}", "Failed to enumerate:".red(), e),
        }
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_match_is_case_insensitive_substring() {
        assert!(MidiTransport::matches("Bitwig Surface Port 1", "surface"));
        assert!(MidiTransport::matches("SURFACE", "Surface"));
        assert!(!MidiTransport::matches("X-Touch", "surface"));
    }

    #[test]
    fn test_send_without_connection_fails() {
        let mut transport = MidiTransport::new(&TransportConfig::default());
        assert!(!transport.is_connected());
        assert!(transport.send(&[0xF0, 0xF7]).is_err());
        assert!(transport.take_receiver().is_some());
        assert!(transport.take_receiver().is_none());
    }
}
