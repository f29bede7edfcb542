use crate::Decimal;
use crate::console::{Console, Line, Tone};
use crate::entry::{EntryUpdate, Flag, LedgerEntry, PostingInput};
use crate::money::format_amount;
use chrono::NaiveDate;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposeState {
    AccumulatingCredits,
    AwaitingDebit,
    Editing,
    Saved,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Credit,
    Debit,
}

impl Side {
    pub fn label(self) -> &'static str {
        match self {
            Side::Credit => "Credit",
            Side::Debit => "Debit",
        }
    }

    pub fn tone(self) -> Tone {
        match self {
            Side::Credit => Tone::Credit,
            Side::Debit => Tone::Debit,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostingRequest {
    pub side: Side,
    pub default_amount: Decimal,
    pub default_currency: String,
    pub default_account: Option<String>,
    /// `false` when the default currency is used without asking.
    pub ask_currency: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edit {
    Date(NaiveDate),
    Flag(Flag),
    Payee(String),
    Narration(String),
    Tags(BTreeSet<String>),
    Links(BTreeSet<String>),
    Postings,
    Save,
}

/// Operator input needed while composing. `None` means the operator cancelled.
pub trait ComposePrompts {
    fn total(&mut self, default: Decimal) -> Option<Decimal>;
    fn posting(&mut self, request: &PostingRequest) -> Option<PostingInput>;
    fn edit(&mut self, entry: &LedgerEntry) -> Option<Edit>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposeSettings {
    pub default_currency: String,
    pub ask_currency: bool,
    pub debit_account: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComposeOutcome {
    Saved(LedgerEntry),
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct Composer {
    state: ComposeState,
    entry: LedgerEntry,
    target: Decimal,
    settings: ComposeSettings,
}

impl Composer {
    pub fn new(entry: LedgerEntry, target: Decimal, settings: ComposeSettings) -> Self {
        Composer {
            state: ComposeState::AccumulatingCredits,
            entry,
            target,
            settings,
        }
    }

    pub fn state(&self) -> ComposeState {
        self.state
    }

    pub fn entry(&self) -> &LedgerEntry {
        &self.entry
    }

    pub fn step(
        &mut self,
        prompts: &mut dyn ComposePrompts,
        console: &mut dyn Console,
    ) -> ComposeState {
        let next = match self.state {
            ComposeState::AccumulatingCredits => self.credit(prompts, console),
            ComposeState::AwaitingDebit => self.debit(prompts, console),
            ComposeState::Editing => self.edit(prompts, console),
            done @ (ComposeState::Saved | ComposeState::Cancelled) => done,
        };
        if next != self.state {
            tracing::debug!("compose: {:?} -> {:?}", self.state, next);
        }
        self.state = next;
        next
    }

    pub fn run(
        mut self,
        prompts: &mut dyn ComposePrompts,
        console: &mut dyn Console,
    ) -> ComposeOutcome {
        loop {
            match self.step(prompts, console) {
                ComposeState::Saved => return ComposeOutcome::Saved(self.entry),
                ComposeState::Cancelled => return ComposeOutcome::Cancelled,
                _ => {}
            }
        }
    }

    fn show(&self, console: &mut dyn Console) {
        console.print(Line::plain(format!("\n{}", self.entry.render())));
    }

    fn request(&self, side: Side, default_amount: Decimal) -> PostingRequest {
        PostingRequest {
            side,
            default_amount,
            default_currency: self.settings.default_currency.clone(),
            default_account: match side {
                Side::Credit => None,
                Side::Debit => self.settings.debit_account.clone(),
            },
            ask_currency: self.settings.ask_currency,
        }
    }

    fn credit(
        &mut self,
        prompts: &mut dyn ComposePrompts,
        console: &mut dyn Console,
    ) -> ComposeState {
        if self.entry.amount() >= self.target {
            return ComposeState::AwaitingDebit;
        }

        self.show(console);
        let request = self.request(Side::Credit, self.target - self.entry.amount());
        let Some(posting) = prompts.posting(&request) else {
            tracing::debug!(
                "credits abandoned at {} of {}",
                self.entry.amount(),
                self.target
            );
            return ComposeState::Editing;
        };
        if posting.amount <= Decimal::ZERO {
            console.print(
                Line::styled(Tone::Error, "...Credit amount must be positive, got ")
                    .push(Tone::Number, format_amount(posting.amount)),
            );
            return ComposeState::AccumulatingCredits;
        }

        self.entry.add_posting(posting);
        if self.entry.amount() >= self.target {
            ComposeState::AwaitingDebit
        } else {
            ComposeState::AccumulatingCredits
        }
    }

    fn debit(
        &mut self,
        prompts: &mut dyn ComposePrompts,
        console: &mut dyn Console,
    ) -> ComposeState {
        self.show(console);
        let request = self.request(Side::Debit, -self.target);
        if let Some(posting) = prompts.posting(&request) {
            self.entry.add_posting(posting);
        }
        ComposeState::Editing
    }

    fn edit(&mut self, prompts: &mut dyn ComposePrompts, console: &mut dyn Console) -> ComposeState {
        self.show(console);
        let Some(edit) = prompts.edit(&self.entry) else {
            return ComposeState::Cancelled;
        };

        let update = match edit {
            Edit::Save => {
                console.print(Line::plain("...Finished editing"));
                return ComposeState::Saved;
            }
            Edit::Postings => {
                self.entry.update(EntryUpdate {
                    postings: Some(Vec::new()),
                    ..EntryUpdate::default()
                });
                if let Some(target) = prompts.total(self.target) {
                    self.target = target;
                }
                return ComposeState::AccumulatingCredits;
            }
            Edit::Date(date) => EntryUpdate {
                date: Some(date),
                ..EntryUpdate::default()
            },
            Edit::Flag(flag) => EntryUpdate {
                flag: Some(flag),
                ..EntryUpdate::default()
            },
            Edit::Payee(payee) => EntryUpdate {
                payee: Some(payee),
                ..EntryUpdate::default()
            },
            Edit::Narration(narration) => EntryUpdate {
                narration: Some(narration),
                ..EntryUpdate::default()
            },
            Edit::Tags(tags) => EntryUpdate {
                tags: Some(tags),
                ..EntryUpdate::default()
            },
            Edit::Links(links) => EntryUpdate {
                links: Some(links),
                ..EntryUpdate::default()
            },
        };
        self.entry.update(update);
        ComposeState::Editing
    }
}
