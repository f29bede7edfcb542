use super::rec_id;
use crate::entry::LedgerEntry;
use crate::import::ImportedTransaction;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PendingOrder {
    Input,
    /// Oldest first; transactions on the same day keep their export order.
    #[default]
    ByDate,
}

pub fn compute_pending(
    imported: &[ImportedTransaction],
    entries: &[LedgerEntry],
    order: PendingOrder,
) -> Vec<ImportedTransaction> {
    let reconciled: HashSet<_> = entries
        .iter()
        .flat_map(LedgerEntry::postings)
        .filter_map(rec_id)
        .collect();

    let mut pending: Vec<ImportedTransaction> = imported
        .iter()
        .filter(|txn| !reconciled.contains(txn.id.as_str()))
        .cloned()
        .collect();
    if order == PendingOrder::ByDate {
        pending.sort_by_key(|txn| txn.date);
    }

    tracing::debug!(
        "{} of {} imported transactions pending ({} reconciled ids in ledger)",
        pending.len(),
        imported.len(),
        reconciled.len()
    );
    pending
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Ledger;

    const LEDGER: &str = r#"
2024-01-01 open Assets:Checking

2024-01-05 * "Coffee"
  Assets:Checking  -4.00 USD
    rec: "t1"
  Expenses:Food     4.00 USD

2024-01-07 * "Transfer"
  Assets:Savings   -20.00 USD
    rec: "t3"
  Assets:Checking   20.00 USD
"#;

    fn txn(id: &str, date: &str) -> ImportedTransaction {
        ImportedTransaction {
            id: id.to_string(),
            date: date.parse().unwrap(),
            payee: id.to_uppercase(),
            amount: "-1".parse().unwrap(),
        }
    }

    fn ids(txns: &[ImportedTransaction]) -> Vec<&str> {
        txns.iter().map(|txn| txn.id.as_str()).collect()
    }

    #[test]
    fn excludes_reconciled_ids_on_any_account() {
        let ledger = Ledger::parse("main.beancount", LEDGER.to_string());
        let imported = [
            txn("t4", "2024-01-09"),
            txn("t1", "2024-01-05"),
            txn("t2", "2024-01-06"),
            txn("t3", "2024-01-07"),
        ];

        let pending = compute_pending(&imported, &ledger.entries, PendingOrder::Input);
        assert_eq!(ids(&pending), ["t4", "t2"]);
    }

    #[test]
    fn date_order_is_stable() {
        let imported = [
            txn("c", "2024-01-09"),
            txn("a", "2024-01-02"),
            txn("b", "2024-01-09"),
            txn("d", "2024-01-01"),
        ];
        let pending = compute_pending(&imported, &[], PendingOrder::ByDate);
        assert_eq!(ids(&pending), ["d", "a", "c", "b"]);

        let pending = compute_pending(&imported, &[], PendingOrder::Input);
        assert_eq!(ids(&pending), ["c", "a", "b", "d"]);
    }

    #[test]
    fn empty_inputs() {
        assert!(compute_pending(&[], &[], PendingOrder::ByDate).is_empty());
    }
}
