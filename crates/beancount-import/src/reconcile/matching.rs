use super::REC_KEY;
use crate::Decimal;
use crate::entry::{LedgerEntry, Posting};
use crate::import::ImportedTransaction;
use crate::money::round2;

#[derive(Debug, Clone, Copy)]
pub struct Match<'a> {
    pub entry: &'a LedgerEntry,
    /// Index of the qualifying posting within `entry`.
    pub posting: usize,
}

impl<'a> Match<'a> {
    pub fn posting(&self) -> &'a Posting {
        &self.entry.postings()[self.posting]
    }
}

fn posting_matches(posting: &Posting, account: &str, amount: Decimal) -> bool {
    posting.account == account
        && !posting.metadata.contains_key(REC_KEY)
        && posting
            .number()
            .is_some_and(|number| round2(number.abs()) == amount)
}

/// Unreconciled postings to `account` whose absolute amount equals the
/// transaction's, at most one per entry, in ledger order.
pub fn find_matches<'a>(
    txn: &ImportedTransaction,
    entries: &'a [LedgerEntry],
    account: &str,
) -> Vec<Match<'a>> {
    let amount = round2(txn.abs_amount());
    let matches: Vec<Match<'a>> = entries
        .iter()
        .filter_map(|entry| {
            let posting = entry
                .postings()
                .iter()
                .position(|posting| posting_matches(posting, account, amount))?;
            Some(Match { entry, posting })
        })
        .collect();
    tracing::debug!("{} candidate entries for {}", matches.len(), txn.id);
    matches
}
