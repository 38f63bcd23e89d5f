//! Protocol commands
//!
//! Outbound control requests and their newline-terminated ASCII encoding.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Operating mode of the motor driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Mode {
    /// Firmware runs its own program, gated by start/stop
    #[default]
    Auto,
    /// Host drives each motor channel with setpoints
    Manual,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Auto => write!(f, "Auto"),
            Mode::Manual => write!(f, "Manual"),
        }
    }
}

/// Auto-mode run request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunCommand {
    /// Start the program (`START`)
    Start,
    /// Stop the program (`STOP`)
    Stop,
}

/// Motor channel addressed by a setpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MotorChannel {
    /// Left wheel (`L`)
    Left,
    /// Right wheel (`R`)
    Right,
}

impl MotorChannel {
    /// Single-letter wire tag
    pub fn tag(&self) -> char {
        match self {
            MotorChannel::Left => 'L',
            MotorChannel::Right => 'R',
        }
    }
}

impl fmt::Display for MotorChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MotorChannel::Left => write!(f, "left"),
            MotorChannel::Right => write!(f, "right"),
        }
    }
}

/// Commands sent to the motor driver
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Command {
    /// Switch operating mode (`MODE-A` / `MODE-M`)
    ModeSwitch(Mode),

    /// Start or stop the auto program (`START` / `STOP`)
    Run(RunCommand),

    /// Target value for one motor channel (`L<value>` / `R<value>`)
    Setpoint {
        /// Channel addressed
        channel: MotorChannel,
        /// Validated target value
        value: f64,
    },
}

impl Command {
    /// Encode the command as wire bytes, including the trailing newline.
    ///
    /// Setpoint values are expected to be validated by the caller; encoding
    /// never rejects a value.
    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = match self {
            Command::ModeSwitch(Mode::Auto) => b"MODE-A".to_vec(),
            Command::ModeSwitch(Mode::Manual) => b"MODE-M".to_vec(),
            Command::Run(RunCommand::Start) => b"START".to_vec(),
            Command::Run(RunCommand::Stop) => b"STOP".to_vec(),
            Command::Setpoint { channel, value } => {
                format!("{}{}", channel.tag(), setpoint_text(*value)).into_bytes()
            }
        };
        bytes.push(b'\n');
        bytes
    }

    /// Parse a single wire line (without newline) back into a command.
    ///
    /// Used by the demo device to interpret what the host sent.
    pub fn parse_wire(line: &str) -> Option<Command> {
        match line.trim() {
            "MODE-A" => Some(Command::ModeSwitch(Mode::Auto)),
            "MODE-M" => Some(Command::ModeSwitch(Mode::Manual)),
            "START" => Some(Command::Run(RunCommand::Start)),
            "STOP" => Some(Command::Run(RunCommand::Stop)),
            other => {
                let channel = match other.chars().next()? {
                    'L' => MotorChannel::Left,
                    'R' => MotorChannel::Right,
                    _ => return None,
                };
                let value = other[1..].parse::<f64>().ok()?;
                Some(Command::Setpoint { channel, value })
            }
        }
    }
}

/// Longest plain decimal rendering sent for a setpoint
const MAX_PLAIN_SETPOINT_LEN: usize = 24;

/// Plain decimal for ordinary values; exponent form when the plain digits
/// would run past [`MAX_PLAIN_SETPOINT_LEN`] (e.g. `1e300`, `1e-300`)
fn setpoint_text(value: f64) -> String {
    let plain = value.to_string();
    if plain.len() <= MAX_PLAIN_SETPOINT_LEN {
        plain
    } else {
        format!("{value:e}")
    }
}

/// Encode a command into wire bytes
pub fn encode(command: &Command) -> Vec<u8> {
    command.encode()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_switch_encoding() {
        assert_eq!(encode(&Command::ModeSwitch(Mode::Auto)), b"MODE-A\n".to_vec());
        assert_eq!(encode(&Command::ModeSwitch(Mode::Manual)), b"MODE-M\n".to_vec());
    }

    #[test]
    fn test_run_encoding() {
        assert_eq!(encode(&Command::Run(RunCommand::Start)), b"START\n".to_vec());
        assert_eq!(encode(&Command::Run(RunCommand::Stop)), b"STOP\n".to_vec());
    }

    #[test]
    fn test_setpoint_encoding() {
        let cmd = Command::Setpoint {
            channel: MotorChannel::Left,
            value: 42.5,
        };
        assert_eq!(encode(&cmd), b"L42.5\n".to_vec());

        let cmd = Command::Setpoint {
            channel: MotorChannel::Right,
            value: -120.0,
        };
        assert_eq!(encode(&cmd), b"R-120\n".to_vec());
    }

    #[test]
    fn test_extreme_setpoints_stay_short() {
        let huge = Command::Setpoint {
            channel: MotorChannel::Left,
            value: 1e300,
        };
        assert_eq!(encode(&huge), b"L1e300\n".to_vec());

        let tiny = Command::Setpoint {
            channel: MotorChannel::Right,
            value: -1e-300,
        };
        assert_eq!(encode(&tiny), b"R-1e-300\n".to_vec());
        assert_eq!(Command::parse_wire("R-1e-300"), Some(tiny));

        let small = Command::Setpoint {
            channel: MotorChannel::Left,
            value: 0.0001,
        };
        assert_eq!(encode(&small), b"L0.0001\n".to_vec());
    }

    #[test]
    fn test_parse_wire() {
        assert_eq!(
            Command::parse_wire("MODE-M"),
            Some(Command::ModeSwitch(Mode::Manual))
        );
        assert_eq!(Command::parse_wire("STOP\r"), Some(Command::Run(RunCommand::Stop)));
        assert_eq!(
            Command::parse_wire("R12.25"),
            Some(Command::Setpoint {
                channel: MotorChannel::Right,
                value: 12.25
            })
        );
        assert_eq!(Command::parse_wire("Lfast"), None);
        assert_eq!(Command::parse_wire(""), None);
        assert_eq!(Command::parse_wire("HELLO"), None);
    }

    #[test]
    fn test_default_mode_is_auto() {
        assert_eq!(Mode::default(), Mode::Auto);
    }
}
