//! A posting is reconciled once it carries the imported id under [`REC_KEY`].

mod matching;
mod pending;

pub use matching::{Match, find_matches};
pub use pending::{PendingOrder, compute_pending};

use crate::entry::{LedgerEntry, MetaValue, Posting};
use std::borrow::Cow;

pub const REC_KEY: &str = "rec";

pub fn rec_id(posting: &Posting) -> Option<Cow<'_, str>> {
    match posting.metadata.get(REC_KEY)? {
        MetaValue::String(id) | MetaValue::Raw(id) => Some(Cow::Borrowed(id)),
        MetaValue::Number(id) => Some(Cow::Owned(id.to_string())),
    }
}

/// Index of the first posting of `entry` to `account`.
pub fn target_posting(entry: &LedgerEntry, account: &str) -> Option<usize> {
    entry
        .postings()
        .iter()
        .position(|posting| posting.account == account)
}

/// Record `id` on the first posting to `account`. Returns `false` if the
/// entry has no such posting.
pub fn mark_reconciled(entry: &mut LedgerEntry, account: &str, id: &str) -> bool {
    match target_posting(entry, account) {
        Some(index) => mark_posting(entry, index, id),
        None => false,
    }
}

pub fn mark_posting(entry: &mut LedgerEntry, index: usize, id: &str) -> bool {
    match entry.posting_metadata_mut(index) {
        Some(metadata) => {
            metadata.insert(REC_KEY.to_owned(), MetaValue::String(id.to_owned()));
            true
        }
        None => false,
    }
}
