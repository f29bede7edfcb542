pub mod compose;
pub mod console;
pub mod entry;
pub mod expr;
pub mod import;
pub mod ledger;
pub mod money;
pub mod payees;
pub mod reconcile;
pub mod session;
pub mod validate;

pub type Decimal = rust_decimal::Decimal;

pub use anyhow::Result;

pub use entry::{Amount, Flag, LedgerEntry, MetaValue, Posting, PostingInput};
pub use import::{ImportBatch, ImportedTransaction, Period};
pub use ledger::Ledger;
