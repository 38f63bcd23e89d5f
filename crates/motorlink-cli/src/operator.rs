//! Operator commands typed on stdin

use motorlink_core::protocol::{Mode, MotorChannel};

/// One parsed operator request
#[derive(Debug, Clone, PartialEq)]
pub enum OperatorCommand {
    SwitchMode(Mode),
    Start,
    Stop,
    Toggle,
    /// Setpoint text is validated by the controller
    Setpoint(MotorChannel, String),
    Status,
    /// Demo only: stop emitting telemetry (or resume)
    Pause(bool),
    /// Demo only: pull (or reinsert) the virtual cable
    Plug(bool),
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  auto | manual        switch mode
  start | stop | t     start/stop the auto program (t toggles)
  l <value>            left setpoint (manual mode)
  r <value>            right setpoint (manual mode)
  status               print status now
  pause | resume       demo: silence the device
  unplug | plug        demo: pull the virtual cable
  help | quit";

impl OperatorCommand {
    pub fn parse(input: &str) -> Result<Self, String> {
        let mut words = input.split_whitespace();
        let Some(head) = words.next() else {
            return Err("empty command".to_string());
        };
        let arg = words.next();

        let command = match (head.to_ascii_lowercase().as_str(), arg) {
            ("auto", None) => Self::SwitchMode(Mode::Auto),
            ("manual", None) => Self::SwitchMode(Mode::Manual),
            ("start", None) => Self::Start,
            ("stop", None) => Self::Stop,
            ("t" | "toggle", None) => Self::Toggle,
            ("l" | "left", Some(v)) => Self::Setpoint(MotorChannel::Left, v.to_string()),
            ("r" | "right", Some(v)) => Self::Setpoint(MotorChannel::Right, v.to_string()),
            ("l" | "left" | "r" | "right", None) => {
                return Err(format!("'{head}' needs a value"));
            }
            ("status" | "s", None) => Self::Status,
            ("pause", None) => Self::Pause(true),
            ("resume", None) => Self::Pause(false),
            ("unplug", None) => Self::Plug(false),
            ("plug", None) => Self::Plug(true),
            ("help" | "?", None) => Self::Help,
            ("quit" | "exit" | "q", None) => Self::Quit,
            _ => return Err(format!("unknown command '{}'", input.trim())),
        };

        if words.next().is_some() {
            return Err(format!("too many arguments in '{}'", input.trim()));
        }
        Ok(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mode_and_run() {
        assert_eq!(
            OperatorCommand::parse("manual"),
            Ok(OperatorCommand::SwitchMode(Mode::Manual))
        );
        assert_eq!(
            OperatorCommand::parse("  AUTO "),
            Ok(OperatorCommand::SwitchMode(Mode::Auto))
        );
        assert_eq!(OperatorCommand::parse("t"), Ok(OperatorCommand::Toggle));
        assert_eq!(OperatorCommand::parse("stop"), Ok(OperatorCommand::Stop));
    }

    #[test]
    fn test_parse_setpoints_keep_raw_text() {
        assert_eq!(
            OperatorCommand::parse("l 42.5"),
            Ok(OperatorCommand::Setpoint(MotorChannel::Left, "42.5".to_string()))
        );
        assert_eq!(
            OperatorCommand::parse("right abc"),
            Ok(OperatorCommand::Setpoint(MotorChannel::Right, "abc".to_string()))
        );
        assert!(OperatorCommand::parse("l").is_err());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(OperatorCommand::parse("").is_err());
        assert!(OperatorCommand::parse("warp 9").is_err());
        assert!(OperatorCommand::parse("start now").is_err());
        assert!(OperatorCommand::parse("l 1 2").is_err());
    }

    #[test]
    fn test_parse_demo_controls() {
        assert_eq!(OperatorCommand::parse("pause"), Ok(OperatorCommand::Pause(true)));
        assert_eq!(OperatorCommand::parse("plug"), Ok(OperatorCommand::Plug(true)));
        assert_eq!(OperatorCommand::parse("unplug"), Ok(OperatorCommand::Plug(false)));
    }
}
