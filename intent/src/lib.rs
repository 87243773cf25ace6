//! Transfer intents as they travel between parties.
//!
//! Intents are carried as plain text in the form
//! `cbdc:<from>:<to>:<amount>:<nonce>`. The same string is used as the
//! correlation token attached to proof requests, so parsing and rendering
//! must round-trip exactly.

pub mod types {
    pub mod intent;
}

pub mod parser;

pub use parser::{parse_message, MalformedIntent};
pub use types::intent::{TransferIntent, DELIMITER, MARKER};
