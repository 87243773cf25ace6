//! Narrow interfaces to the systems the sentinel talks to, plus the
//! in-process implementations used by the binary.

pub mod directory;
pub mod exchange;
pub mod gateway;

pub use directory::{AddressBook, IdentityResolver};
pub use exchange::{CredentialExchange, SimulatedCredentialExchange};
pub use gateway::{ExecutionGateway, LoggingExecutionGateway};
