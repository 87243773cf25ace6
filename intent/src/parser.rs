use std::str::FromStr;

use crate::types::intent::{TransferIntent, DELIMITER, MARKER};

const FIELD_COUNT: usize = 5;

/// A payload that carries the intent marker but cannot be decoded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MalformedIntent {
    #[error("Missing 'cbdc:' marker")]
    MissingMarker,

    #[error("Expected 5 fields, found {found}")]
    FieldCount { found: usize },

    #[error("Invalid amount: {value:?}")]
    InvalidAmount { value: String },

    #[error("Empty {field} field")]
    EmptyField { field: &'static str },

    #[error("Field {field} contains the ':' delimiter")]
    DelimiterInField { field: &'static str },
}

/// Extract an intent from a free-form text message.
///
/// Returns `Ok(None)` when the text does not contain the `cbdc:` marker at
/// all; such messages are ordinary chatter and are not intents. The whole
/// trimmed text is split on `:`, so leading text is tolerated only when it
/// carries no delimiter of its own.
pub fn parse_message(raw: &str) -> Result<Option<TransferIntent>, MalformedIntent> {
    if !raw.contains(MARKER) {
        return Ok(None);
    }
    decode(raw.trim()).map(Some)
}

impl FromStr for TransferIntent {
    type Err = MalformedIntent;

    /// Strict decoding of a canonical serialization.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !s.starts_with(MARKER) {
            return Err(MalformedIntent::MissingMarker);
        }
        decode(s)
    }
}

// The first field is the marker tag, possibly preceded by free text.
fn decode(payload: &str) -> Result<TransferIntent, MalformedIntent> {
    let fields: Vec<&str> = payload.split(DELIMITER).collect();
    if fields.len() != FIELD_COUNT {
        return Err(MalformedIntent::FieldCount {
            found: fields.len(),
        });
    }
    if !fields[0].ends_with(MARKER.trim_end_matches(DELIMITER)) {
        return Err(MalformedIntent::MissingMarker);
    }

    let amount = parse_amount(fields[3])?;
    TransferIntent::new(fields[1], fields[2], amount, fields[4])
}

fn parse_amount(value: &str) -> Result<u64, MalformedIntent> {
    let invalid = || MalformedIntent::InvalidAmount {
        value: value.to_string(),
    };
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    value.parse().map_err(|_| invalid())
}
