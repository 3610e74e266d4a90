//! File-backed persistence for session and ledger state.

pub mod error;
pub mod ledger;
pub mod session;

pub use error::{StorageError, StorageResult};
pub use ledger::FileLedgerStore;
pub use session::FileSessionStore;
