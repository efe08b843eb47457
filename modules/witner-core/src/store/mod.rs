pub mod memory;

pub use memory::{MemoryIncidentStore, TransactionError, MAX_TRANSACTION_ATTEMPTS};
