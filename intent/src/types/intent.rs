use serde::{Deserialize, Serialize};
use std::fmt;

use crate::parser::MalformedIntent;

/// Prefix that identifies an intent inside a text message.
pub const MARKER: &str = "cbdc:";

/// Field separator of the wire format.
pub const DELIMITER: char = ':';

/// A requested transfer awaiting eligibility proofs from both parties.
///
/// All four fields together form the identity of the transaction, so the
/// type doubles as the ledger key. Deserialization goes through
/// [`TransferIntent::new`], so decoded values are always valid.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "UncheckedIntent")]
pub struct TransferIntent {
    pub from: String,
    pub to: String,
    pub amount: u64,
    pub nonce: String,
}

#[derive(Deserialize)]
struct UncheckedIntent {
    from: String,
    to: String,
    amount: u64,
    nonce: String,
}

impl TryFrom<UncheckedIntent> for TransferIntent {
    type Error = MalformedIntent;

    fn try_from(raw: UncheckedIntent) -> Result<Self, Self::Error> {
        TransferIntent::new(raw.from, raw.to, raw.amount, raw.nonce)
    }
}

impl TransferIntent {
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        amount: u64,
        nonce: impl Into<String>,
    ) -> Result<Self, MalformedIntent> {
        let intent = Self {
            from: from.into(),
            to: to.into(),
            amount,
            nonce: nonce.into(),
        };
        intent.validate()?;
        Ok(intent)
    }

    /// Token echoed back by the credential exchange to re-identify this intent.
    pub fn correlation_token(&self) -> String {
        self.to_string()
    }

    pub fn validate(&self) -> Result<(), MalformedIntent> {
        for (field, value) in [("from", &self.from), ("to", &self.to), ("nonce", &self.nonce)] {
            if value.is_empty() {
                return Err(MalformedIntent::EmptyField { field });
            }
            if value.contains(DELIMITER) {
                return Err(MalformedIntent::DelimiterInField { field });
            }
        }
        Ok(())
    }
}

impl fmt::Display for TransferIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}{}{}{}{}{}",
            MARKER, self.from, DELIMITER, self.to, DELIMITER, self.amount, DELIMITER, self.nonce
        )
    }
}
