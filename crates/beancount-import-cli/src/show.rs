use anyhow::Result;
use beancount_import::console::{Console, Line, Tone};
use beancount_import::reconcile;
use beancount_import::session::SessionConfig;
use beancount_import::{ImportBatch, Ledger};

/// List the imported transactions the ledger does not know yet, without asking anything.
pub fn show_pending(
    config: &SessionConfig,
    batches: &[ImportBatch],
    console: &mut dyn Console,
) -> Result<()> {
    let ledger = Ledger::load(&config.ledger)?;

    let mut pending_count = 0;
    let mut unmatched_count = 0;

    for batch in batches {
        let transactions = match &config.period {
            Some(period) => period.filter(&batch.transactions),
            None => batch.transactions.clone(),
        };
        let pending = reconcile::compute_pending(&transactions, &ledger.entries, config.order);
        if pending.is_empty() {
            continue;
        }

        let title = match batch.account_id.as_str() {
            "" => format!("━━━ {} - {} ━━━", batch.institution, batch.name),
            id => format!("━━━ {} - {} ({id}) ━━━", batch.institution, batch.name),
        };
        console.print(Line::styled(Tone::Warning, title));
        for txn in &pending {
            let mut line = Line::plain("  ").append(txn.summary_line());
            if let Some(account) = &config.account {
                let matches = reconcile::find_matches(txn, &ledger.entries, account);
                line = line.push(Tone::Plain, "  ");
                line = if matches.is_empty() {
                    unmatched_count += 1;
                    line.push(Tone::Warning, "no match")
                } else {
                    line.push(Tone::Number, matches.len().to_string())
                        .push(Tone::Plain, " match(es)")
                };
            }
            console.print(line);
        }
        console.print(Line::new());
        pending_count += pending.len();
    }

    if pending_count == 0 {
        console.print(Line::plain("✓ All transactions are in the ledger!"));
        return Ok(());
    }

    console.print(Line::plain("━━━ Summary ━━━"));
    console.print(
        Line::plain("  ")
            .push(Tone::Number, pending_count.to_string())
            .push(Tone::Plain, " transaction(s) not in LEDGER"),
    );
    if unmatched_count > 0 {
        console.print(
            Line::plain("  ")
                .push(Tone::Warning, unmatched_count.to_string())
                .push(Tone::Plain, " transaction(s) without a matching entry"),
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use beancount_import::console::BufferConsole;
    use beancount_import::import::ofx;

    const LEDGER: &str = r#"2024-01-01 open Assets:Checking

2024-01-05 * "Coffee Shop"
  Assets:Checking  -42.00 USD
  Expenses:Food     42.00 USD

2024-01-06 * "Done"
  Assets:Checking  -3.00 USD
    rec: "t3"
  Expenses:Food
"#;

    const OFX: &str = "\
<OFX><BANKACCTFROM><ACCTID>77<ACCTTYPE>CHECKING</BANKACCTFROM>
<STMTTRN><DTPOSTED>20240107<TRNAMT>-12.50<FITID>t2<NAME>GROCER</STMTTRN>
<STMTTRN><DTPOSTED>20240105<TRNAMT>-42.00<FITID>t1<NAME>COFFEE</STMTTRN>
<STMTTRN><DTPOSTED>20240106<TRNAMT>-3.00<FITID>t3<NAME>DONE</STMTTRN>
</OFX>
";

    fn run(name: &str, account: Option<&str>) -> String {
        let dir = std::env::temp_dir().join(format!("bean-import-show-{}-{name}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let ledger = dir.join("main.beancount");
        std::fs::write(&ledger, LEDGER).unwrap();

        let mut config = SessionConfig::new(&ledger);
        config.account = account.map(ToOwned::to_owned);
        let batch = ofx::parse(OFX).unwrap();
        let mut console = BufferConsole::default();
        show_pending(&config, &[batch], &mut console).unwrap();

        std::fs::remove_dir_all(dir).unwrap();
        console.contents()
    }

    #[test]
    fn lists_pending_with_match_counts() {
        let output = run("matches", Some("Assets:Checking"));
        assert!(output.contains("  2024-01-05 COFFEE -42.00  1 match(es)"));
        assert!(output.contains("  2024-01-07 GROCER -12.50  no match"));
        assert!(output.starts_with("━━━ Unknown - CHECKING (77) ━━━\n"));
        assert!(!output.contains("DONE"));
        assert!(output.ends_with(
            "━━━ Summary ━━━\n  2 transaction(s) not in LEDGER\n  1 transaction(s) without a matching entry"
        ));
    }

    #[test]
    fn without_account_only_lists() {
        let output = run("plain", None);
        assert!(output.contains("  2024-01-07 GROCER -12.50\n"));
        assert!(!output.contains("match"));
    }
}
