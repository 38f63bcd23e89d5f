//! Telemetry line decoder
//!
//! Lines look like `200.5,300.35,1000.2`: left speed, right speed and
//! distance. Extra trailing fields are ignored.

use std::time::Instant;

use super::Sample;
use crate::protocol::DecodeError;

/// Separator between fields
pub const FIELD_DELIMITER: char = ',';

/// Fields required for a sample
pub const MIN_FIELDS: usize = 3;

/// Decode one newline-stripped line into a sample stamped with `received_at`.
///
/// Either all three leading fields parse as finite numbers, or nothing is
/// produced.
pub fn decode(line: &str, received_at: Instant) -> Result<Sample, DecodeError> {
    let fields: Vec<&str> = line.trim().split(FIELD_DELIMITER).collect();
    if fields.len() < MIN_FIELDS {
        return Err(DecodeError::MalformedLine {
            found: if line.trim().is_empty() { 0 } else { fields.len() },
        });
    }

    let mut values = [0.0f64; MIN_FIELDS];
    for (index, (slot, field)) in values.iter_mut().zip(&fields).enumerate() {
        *slot = parse_field(index, field)?;
    }
    let [left_speed, right_speed, distance] = values;

    Ok(Sample {
        left_speed,
        right_speed,
        distance,
        received_at,
    })
}

fn parse_field(index: usize, field: &str) -> Result<f64, DecodeError> {
    let field = field.trim();
    match field.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(DecodeError::NonNumericField {
            index,
            value: field.to_string(),
        }),
    }
}
