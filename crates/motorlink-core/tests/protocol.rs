use motorlink_core::protocol::{
    encode, Command, DecodeError, LinkError, Mode, MotorChannel, RunCommand,
};
use motorlink_core::telemetry::decode;
use std::time::Instant;

#[test]
fn test_wire_tokens() {
    assert_eq!(encode(&Command::ModeSwitch(Mode::Auto)), b"MODE-A\n");
    assert_eq!(encode(&Command::ModeSwitch(Mode::Manual)), b"MODE-M\n");
    assert_eq!(encode(&Command::Run(RunCommand::Start)), b"START\n");
    assert_eq!(encode(&Command::Run(RunCommand::Stop)), b"STOP\n");
    assert_eq!(
        encode(&Command::Setpoint {
            channel: MotorChannel::Left,
            value: 42.5
        }),
        b"L42.5\n"
    );
}

#[test]
fn test_every_encoding_is_one_line() {
    let commands = [
        Command::ModeSwitch(Mode::Auto),
        Command::Run(RunCommand::Stop),
        Command::Setpoint {
            channel: MotorChannel::Right,
            value: 0.001,
        },
    ];
    for cmd in commands {
        let bytes = encode(&cmd);
        assert_eq!(bytes.last(), Some(&b'\n'));
        assert_eq!(bytes.iter().filter(|&&b| b == b'\n').count(), 1);
        assert!(bytes.is_ascii());
    }
}

#[test]
fn test_setpoint_text_round_trips_through_parse_wire() {
    for value in [0.0, 1.0, -3.75, 255.0, 1e-3] {
        let cmd = Command::Setpoint {
            channel: MotorChannel::Left,
            value,
        };
        let bytes = encode(&cmd);
        let line = std::str::from_utf8(&bytes).unwrap();
        assert_eq!(Command::parse_wire(line), Some(cmd));
    }
}

#[test]
fn test_decode_preserves_fields() {
    let cases = [
        ("0,0,0", (0.0, 0.0, 0.0)),
        ("200.5,300.35,1000.2", (200.5, 300.35, 1000.2)),
        ("-1.25,1.25,99999", (-1.25, 1.25, 99999.0)),
    ];
    for (line, expected) in cases {
        let s = decode(line, Instant::now()).unwrap();
        assert_eq!((s.left_speed, s.right_speed, s.distance), expected, "{line}");
    }
}

#[test]
fn test_decode_failures_are_distinguishable() {
    let now = Instant::now();
    assert!(matches!(
        decode("1,2", now),
        Err(DecodeError::MalformedLine { found: 2 })
    ));
    assert!(matches!(
        decode("1,two,3", now),
        Err(DecodeError::NonNumericField { index: 1, .. })
    ));
}

#[test]
fn test_error_display() {
    assert_eq!(LinkError::NotOpen.to_string(), "Link is not open");
    let err = LinkError::PortUnavailable {
        port: "COM13".to_string(),
        reason: "busy".to_string(),
    };
    assert_eq!(err.to_string(), "Port 'COM13' unavailable: busy");

    let err = DecodeError::NonNumericField {
        index: 0,
        value: "x".to_string(),
    };
    assert_eq!(err.to_string(), "Field 0 is not a number: 'x'");
}
