use crate::compose::{ComposeOutcome, ComposePrompts, ComposeSettings, Composer};
use crate::console::{Console, Line, Tone};
use crate::entry::{Flag, LedgerEntry};
use crate::import::{ImportBatch, ImportedTransaction, Period};
use crate::ledger::{self, Ledger};
use crate::money::format_amount;
use crate::payees::PayeeMap;
use crate::reconcile::{self, PendingOrder};
use crate::Result;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Reconcile,
    Insert,
    Skip,
    Quit,
}

/// Everything a session asks the operator. `None` means the operator cancelled.
pub trait SessionPrompts: ComposePrompts {
    /// Called whenever the ledger has been (re)loaded, e.g. to refresh completions.
    fn ledger_loaded(&mut self, _ledger: &Ledger) {}

    fn account(&mut self, accounts: &[String]) -> Option<String>;

    /// Pick one of `count` listed options; the default is the first one.
    fn choose(&mut self, question: &str, count: usize) -> Option<usize>;

    fn resolve(&mut self, txn: &ImportedTransaction) -> Resolution;

    fn confirm(&mut self, question: &str, default: bool) -> bool;

    fn payee(&mut self, raw: &str, known: &[String]) -> Option<String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub ledger: PathBuf,
    pub account: Option<String>,
    pub period: Option<Period>,
    pub flag: Flag,
    pub order: PendingOrder,
    pub operating_currency: bool,
    /// Used when the ledger sets no `operating_currency`.
    pub default_currency: Option<String>,
    pub payees: PathBuf,
    /// Where inserted entries go. Without one they are printed at the end.
    pub output: Option<PathBuf>,
}

impl SessionConfig {
    pub fn new(ledger: impl Into<PathBuf>) -> Self {
        SessionConfig {
            ledger: ledger.into(),
            account: None,
            period: None,
            flag: Flag::Cleared,
            order: PendingOrder::default(),
            operating_currency: false,
            default_currency: None,
            payees: PathBuf::from("payees.json"),
            output: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    pub reconciled: usize,
    pub inserted: usize,
    pub skipped: usize,
    pub ended_early: bool,
    /// Inserted entries when there is no output file.
    pub buffer: String,
}

enum Reconciled {
    Done,
    NoMatch,
    Failed,
}

struct Session<'a, P> {
    config: &'a SessionConfig,
    prompts: &'a mut P,
    console: &'a mut dyn Console,
    account: String,
    summary: Summary,
}

pub fn run<P: SessionPrompts>(
    config: &SessionConfig,
    batches: Vec<ImportBatch>,
    prompts: &mut P,
    console: &mut dyn Console,
) -> Result<Summary> {
    print_files(config, console);

    let Some(batch) = select_batch(batches, prompts, console) else {
        return Ok(end_early(console, "No transactions found. Please provide a valid file to parse."));
    };
    tracing::debug!(
        "importing account {} at {}",
        batch.account_id,
        batch.institution
    );
    console.print(
        Line::plain("Parsed ")
            .push(Tone::Number, batch.transactions.len().to_string())
            .push(Tone::Plain, " transactions"),
    );

    let ledger = Ledger::load(&config.ledger)?;
    for error in &ledger.errors {
        console.print(Line::styled(Tone::Warning, format!("Ledger parse error: {error}")));
    }
    if ledger.entries.is_empty() {
        return Ok(end_early(console, "No transaction entries found in LEDGER file. Exiting."));
    }
    prompts.ledger_loaded(&ledger);
    console.print(
        Line::plain("Parsed ")
            .push(Tone::Number, ledger.entries.len().to_string())
            .push(Tone::Plain, " beans from LEDGER file"),
    );
    console.print(
        Line::plain("Default currency: ")
            .push(Tone::Answer, default_currency(config, &ledger)),
    );

    let filtered = match &config.period {
        Some(period) => {
            let filtered = period.filter(&batch.transactions);
            if filtered.is_empty() {
                return Ok(end_early(
                    console,
                    &format!("No transactions found within the specified period {period}. Exiting."),
                ));
            }
            console.print(
                Line::plain("Found ")
                    .push(Tone::Number, filtered.len().to_string())
                    .push(Tone::Plain, " transactions within period ")
                    .push(Tone::Date, period.to_string()),
            );
            filtered
        }
        None => batch.transactions,
    };

    let account = match &config.account {
        Some(account) => account.clone(),
        None => match prompts.account(&ledger.accounts) {
            Some(account) => account,
            None => return Ok(end_early(console, "No account given. Exiting.")),
        },
    };
    console.print(Line::plain("Transaction account: ").push(Tone::Answer, account.clone()));

    let pending = reconcile::compute_pending(&filtered, &ledger.entries, config.order);
    if pending.is_empty() {
        return Ok(end_early(console, "No pending transactions found. Exiting."));
    }
    console.print(
        Line::plain("Found ")
            .push(Tone::Number, pending.len().to_string())
            .push(Tone::Plain, " transactions not in LEDGER"),
    );

    let mut session = Session {
        config,
        prompts,
        console,
        account,
        summary: Summary::default(),
    };
    for (index, txn) in pending.iter().enumerate() {
        session.console.print(
            Line::plain(format!("Parsing {}/{}: ", index + 1, pending.len()))
                .push(Tone::Date, txn.date.to_string())
                .push(Tone::Plain, " ")
                .push(Tone::Text, txn.payee.clone())
                .push(Tone::Plain, " ")
                .push(Tone::Number, format_amount(txn.amount)),
        );
        if !session.process(txn) {
            break;
        }
    }
    Ok(session.finish(pending.len()))
}

fn print_files(config: &SessionConfig, console: &mut dyn Console) {
    let file_line = |label: &str, path: &Path| {
        Line::plain(format!("{label} File: ")).push(Tone::File, path.display().to_string())
    };
    console.print(file_line("LEDGER", &config.ledger));
    console.print(file_line("PAYEES", &config.payees));
    if let Some(output) = &config.output {
        console.print(file_line("OUTPUT", output));
    }
}

fn select_batch<P: SessionPrompts>(
    mut batches: Vec<ImportBatch>,
    prompts: &mut P,
    console: &mut dyn Console,
) -> Option<ImportBatch> {
    batches.retain(|batch| !batch.transactions.is_empty());
    if batches.len() <= 1 {
        return batches.pop();
    }

    console.print(Line::plain("...Accounts available:"));
    for (i, batch) in batches.iter().enumerate() {
        console.print(Line::plain(format!(
            "   [{i}] {} - {}",
            batch.institution, batch.name
        )));
    }
    let choice = prompts.choose("Select account to parse", batches.len())?;
    (choice < batches.len()).then(|| batches.swap_remove(choice))
}

fn default_currency(config: &SessionConfig, ledger: &Ledger) -> String {
    ledger
        .operating_currency
        .clone()
        .or_else(|| config.default_currency.clone())
        .unwrap_or_default()
}

fn end_early(console: &mut dyn Console, message: &str) -> Summary {
    tracing::debug!("session ended early: {message}");
    console.print(Line::styled(Tone::Warning, message));
    Summary {
        ended_early: true,
        ..Summary::default()
    }
}

impl<P: SessionPrompts> Session<'_, P> {
    fn process(&mut self, txn: &ImportedTransaction) -> bool {
        let mut ledger = match Ledger::load(&self.config.ledger) {
            Ok(ledger) => ledger,
            Err(error) => {
                self.report(&error);
                return true;
            }
        };
        self.prompts.ledger_loaded(&ledger);

        let mut resolution = self.prompts.resolve(txn);
        if resolution == Resolution::Reconcile {
            self.console.print(Line::plain("...Reconciling"));
            match self.reconcile(&mut ledger, txn) {
                Reconciled::Done => self.summary.reconciled += 1,
                Reconciled::Failed => {}
                Reconciled::NoMatch => {
                    let insert = self.prompts.confirm(
                        "...No matching transactions found. Would you like to insert instead?",
                        true,
                    );
                    resolution = if insert {
                        Resolution::Insert
                    } else {
                        Resolution::Skip
                    };
                }
            }
        }

        match resolution {
            Resolution::Insert => {
                self.console.print(Line::plain("...Inserting"));
                if self.insert(&ledger, txn) {
                    self.summary.inserted += 1;
                }
            }
            Resolution::Skip => self.console.print(Line::plain("...Skipping")),
            Resolution::Quit => return false,
            Resolution::Reconcile => {}
        }
        true
    }

    fn reconcile(&mut self, ledger: &mut Ledger, txn: &ImportedTransaction) -> Reconciled {
        let matches = reconcile::find_matches(txn, &ledger.entries, &self.account);
        if matches.is_empty() {
            return Reconciled::NoMatch;
        }

        self.console.print(Line::plain("...Found matches:\n"));
        for (i, candidate) in matches.iter().enumerate() {
            let posting = candidate.posting();
            let number = posting.number().map(format_amount).unwrap_or_default();
            self.console.print(
                Line::plain(format!("   [{i}] ")).append(candidate.entry.summary_line()),
            );
            self.console.print(Line::plain(format!(
                "          {} {number}",
                posting.account
            )));
        }
        let range = match matches.len() {
            1 => "[0]".to_owned(),
            n => format!("[0-{}]", n - 1),
        };
        let Some(choice) = self
            .prompts
            .choose(&format!("Select match {range}"), matches.len())
        else {
            return Reconciled::NoMatch;
        };
        let Some(chosen) = matches.get(choice) else {
            return Reconciled::NoMatch;
        };

        let mut entry = chosen.entry.clone();
        reconcile::mark_posting(&mut entry, chosen.posting, &txn.id);
        self.console.print(
            Line::plain("...Reconciling ")
                .append(entry.summary_line())
                .push(Tone::Plain, "\n"),
        );
        if let Err(error) = ledger.replace_entry(&entry) {
            self.report(&anyhow::Error::new(error));
            return Reconciled::Failed;
        }
        self.console.print(Line::plain(entry.render()));
        Reconciled::Done
    }

    fn insert(&mut self, ledger: &Ledger, txn: &ImportedTransaction) -> bool {
        let payee = self.substitute_payee(ledger, &txn.payee);

        let target = self
            .prompts
            .total(txn.abs_amount())
            .unwrap_or_else(|| txn.abs_amount());
        let currency = default_currency(self.config, ledger);
        let settings = ComposeSettings {
            ask_currency: !self.config.operating_currency || currency.is_empty(),
            default_currency: currency,
            debit_account: Some(self.account.clone()),
        };
        let entry = LedgerEntry::new(txn.date, self.config.flag, Some(payee));

        let ComposeOutcome::Saved(mut entry) =
            Composer::new(entry, target, settings).run(&mut *self.prompts, &mut *self.console)
        else {
            return false;
        };

        if !reconcile::mark_reconciled(&mut entry, &self.account, &txn.id) {
            let question = format!(
                "...Transaction account {} not found, continue anyways?",
                self.account
            );
            if !self.prompts.confirm(&question, true) {
                self.console.print(Line::plain("...Skipping"));
                return false;
            }
        }

        let destination = match &self.config.output {
            Some(output) => {
                if let Err(error) = ledger::append_entry(output, &entry) {
                    self.report(&anyhow::Error::new(error));
                    return false;
                }
                output.display().to_string()
            }
            None => {
                self.summary.buffer.push('\n');
                self.summary.buffer.push_str(&entry.render());
                "buffer".to_owned()
            }
        };
        self.console.print(
            Line::plain("...Inserted ")
                .append(entry.summary_line())
                .push(Tone::Plain, " into ")
                .push(Tone::File, destination),
        );
        self.console.print(Line::plain(format!("\n{}", entry.render())));
        true
    }

    fn substitute_payee(&mut self, ledger: &Ledger, raw: &str) -> String {
        let mut payees = PayeeMap::load(&self.config.payees);
        let replacement = match payees.get(raw) {
            Some(known) => Some(known.to_owned()),
            None => {
                let known = payees.known_payees(&ledger.payees);
                self.prompts
                    .payee(raw, &known)
                    .filter(|payee| !payee.trim().is_empty())
            }
        };
        let Some(replacement) = replacement else {
            return raw.to_owned();
        };

        self.console.print(
            Line::plain("...Replaced ")
                .push(Tone::Text, raw)
                .push(Tone::Plain, " with ")
                .push(Tone::Answer, replacement.clone()),
        );
        if let Err(error) = payees.set(raw, &replacement) {
            self.report(&error);
        }
        replacement
    }

    fn report(&mut self, error: &anyhow::Error) {
        tracing::warn!("{error:#}");
        self.console
            .print(Line::styled(Tone::Error, format!("...{error:#}")));
    }

    fn finish(mut self, pending: usize) -> Summary {
        let summary = &mut self.summary;
        summary.skipped = pending - summary.reconciled - summary.inserted;

        if self.config.output.is_none() && !summary.buffer.is_empty() {
            self.console.print(Line::plain(summary.buffer.clone()));
        }
        for (label, count) in [
            ("Reconciled", summary.reconciled),
            ("Inserted", summary.inserted),
            ("Skipped", summary.skipped),
        ] {
            if count > 0 {
                self.console.print(
                    Line::styled(Tone::Text, format!("{label} "))
                        .push(Tone::Number, count.to_string())
                        .push(Tone::Text, " transactions"),
                );
            }
        }
        self.console
            .print(Line::styled(Tone::Warning, "Finished parsing. Exiting"));
        self.summary
    }
}
