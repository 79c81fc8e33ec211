//! Posting engine (C3) and reversal protocol (C4).

mod engine;
mod memory_store;
mod pg_store;
mod reversal;
mod txn;

pub use engine::{PostJournalRequest, PostingEngine};
pub use memory_store::InMemoryPostingStore;
pub use pg_store::PgPostingStore;
pub use reversal::ReversalProtocol;
pub use txn::{PostingStore, PostingTransaction};
