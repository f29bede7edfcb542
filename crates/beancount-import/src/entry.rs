use crate::Decimal;
use crate::console::{Line, Tone};
use crate::money::{format_amount, round2};
use crate::validate::InvalidInput;
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Write as _};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Flag {
    #[default]
    Cleared,
    Pending,
    Other(char),
}

impl Flag {
    pub fn from_char(c: char) -> Flag {
        match c {
            '*' => Flag::Cleared,
            '!' => Flag::Pending,
            other => Flag::Other(other),
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Flag::Cleared => '*',
            Flag::Pending => '!',
            Flag::Other(c) => c,
        }
    }
}

impl FromStr for Flag {
    type Err = InvalidInput;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "*" => Ok(Flag::Cleared),
            "!" => Ok(Flag::Pending),
            _ => Err(InvalidInput::Flag),
        }
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_char(self.as_char())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetaValue {
    String(String),
    Number(Decimal),
    Raw(String),
}

impl fmt::Display for MetaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetaValue::String(s) => f.write_str(&quote(s)),
            MetaValue::Number(n) => write!(f, "{n}"),
            MetaValue::Raw(raw) => f.write_str(raw),
        }
    }
}

pub type Metadata = BTreeMap<String, MetaValue>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Amount {
    pub number: Decimal,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Posting {
    pub flag: Option<char>,
    pub account: String,
    /// `None` when the amount is left for beancount to infer.
    pub units: Option<Amount>,
    pub metadata: Metadata,
}

impl Posting {
    pub fn new(account: impl Into<String>, units: Option<Amount>) -> Self {
        Posting {
            flag: None,
            account: account.into(),
            units,
            metadata: Metadata::new(),
        }
    }

    pub fn number(&self) -> Option<Decimal> {
        self.units.as_ref().map(|units| units.number)
    }

    pub fn meta_string(&self, key: &str) -> Option<&str> {
        match self.metadata.get(key)? {
            MetaValue::String(s) | MetaValue::Raw(s) => Some(s),
            MetaValue::Number(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostingInput {
    pub account: String,
    pub amount: Decimal,
    pub currency: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Source {
    /// Index of the ledger file, 0 being the main file and the rest its includes.
    pub file: usize,
    pub block: usize,
    pub line: usize,
    /// Whether `render` reproduces everything the source block contains.
    pub lossless: bool,
}

#[derive(Debug, Clone, Default)]
pub struct EntryUpdate {
    pub date: Option<NaiveDate>,
    pub flag: Option<Flag>,
    pub payee: Option<String>,
    pub narration: Option<String>,
    pub tags: Option<BTreeSet<String>>,
    pub links: Option<BTreeSet<String>>,
    pub postings: Option<Vec<Posting>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub date: NaiveDate,
    pub flag: Flag,
    pub payee: Option<String>,
    pub narration: Option<String>,
    pub tags: BTreeSet<String>,
    pub links: BTreeSet<String>,
    pub metadata: Metadata,
    pub source: Option<Source>,
    postings: Vec<Posting>,
    amount: Decimal,
}

impl LedgerEntry {
    pub fn new(date: NaiveDate, flag: Flag, payee: Option<String>) -> Self {
        LedgerEntry {
            date,
            flag,
            payee: payee.filter(|p| !p.is_empty()),
            narration: None,
            tags: BTreeSet::new(),
            links: BTreeSet::new(),
            metadata: Metadata::new(),
            source: None,
            postings: Vec::new(),
            amount: Decimal::ZERO,
        }
    }

    pub fn postings(&self) -> &[Posting] {
        &self.postings
    }

    pub fn posting_metadata_mut(&mut self, index: usize) -> Option<&mut Metadata> {
        self.postings.get_mut(index).map(|posting| &mut posting.metadata)
    }

    /// Sum of the positive posting amounts, i.e. the credit side accumulated so far.
    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn recompute_total(&mut self) {
        self.amount = self
            .postings
            .iter()
            .filter_map(Posting::number)
            .filter(|number| number.is_sign_positive() && !number.is_zero())
            .sum();
    }

    /// Add `candidate`, merging it into an existing posting to the same account.
    pub fn add_posting(&mut self, candidate: PostingInput) {
        let existing = self
            .postings
            .iter()
            .position(|posting| posting.account == candidate.account);

        let mut number = round2(candidate.amount);
        if let Some(previous) = existing.and_then(|index| self.postings[index].number()) {
            number += round2(previous);
        }

        let posting = Posting::new(
            candidate.account,
            Some(Amount {
                number,
                currency: candidate.currency,
            }),
        );
        match existing {
            Some(index) => self.postings[index] = posting,
            None => self.postings.push(posting),
        }
        self.recompute_total();
    }

    pub fn update(&mut self, update: EntryUpdate) {
        let EntryUpdate {
            date,
            flag,
            payee,
            narration,
            tags,
            links,
            postings,
        } = update;

        if let Some(date) = date {
            self.date = date;
        }
        if let Some(flag) = flag {
            self.flag = flag;
        }
        if let Some(payee) = payee {
            self.payee = Some(payee).filter(|p| !p.is_empty());
        }
        if let Some(narration) = narration {
            self.narration = Some(narration).filter(|n| !n.is_empty());
        }
        if let Some(tags) = tags {
            self.tags = tags;
        }
        if let Some(links) = links {
            self.links = links;
        }
        if let Some(postings) = postings {
            self.postings = postings;
        }
        self.recompute_total();
    }

    pub fn render(&self) -> String {
        let mut out = format!("{} {}", self.date, self.flag);
        match (&self.payee, &self.narration) {
            (Some(payee), narration) => {
                let narration = narration.as_deref().unwrap_or_default();
                let _ = write!(out, " {} {}", quote(payee), quote(narration));
            }
            (None, Some(narration)) => {
                let _ = write!(out, " {}", quote(narration));
            }
            (None, None) => {}
        }
        for tag in &self.tags {
            let _ = write!(out, " #{tag}");
        }
        for link in &self.links {
            let _ = write!(out, " ^{link}");
        }
        for (key, value) in &self.metadata {
            let _ = write!(out, "\n  {key}: {value}");
        }

        let account_width = self
            .postings
            .iter()
            .map(|posting| posting_label(posting).len())
            .max()
            .unwrap_or(0);
        let number_width = self
            .postings
            .iter()
            .filter_map(|posting| posting.number())
            .map(|number| number.to_string().len())
            .max()
            .unwrap_or(0);

        for posting in &self.postings {
            let label = posting_label(posting);
            match &posting.units {
                Some(units) => {
                    let _ = write!(
                        out,
                        "\n  {label:<account_width$}  {:>number_width$} {}",
                        units.number.to_string(),
                        units.currency
                    );
                }
                None => {
                    let _ = write!(out, "\n  {label}");
                }
            }
            for (key, value) in &posting.metadata {
                let _ = write!(out, "\n    {key}: {value}");
            }
        }
        out
    }

    pub fn summary_line(&self) -> Line {
        let mut parts = vec![
            (Tone::Date, self.date.to_string()),
            (Tone::Flag, self.flag.to_string()),
        ];
        match (&self.payee, &self.narration) {
            (Some(payee), narration) => {
                parts.push((Tone::Text, quote(&collapse_spaces(payee))));
                let narration = narration.as_deref().unwrap_or_default();
                parts.push((Tone::Text, quote(&collapse_spaces(narration))));
            }
            (None, Some(narration)) => {
                parts.push((Tone::Text, quote(&collapse_spaces(narration))))
            }
            (None, None) => {}
        }
        if !self.tags.is_empty() {
            let tags: Vec<String> = self.tags.iter().map(|tag| format!("#{tag}")).collect();
            parts.push((Tone::File, tags.join(" ")));
        }
        if !self.links.is_empty() {
            let links: Vec<String> = self.links.iter().map(|link| format!("^{link}")).collect();
            parts.push((Tone::File, links.join(" ")));
        }
        parts.push((Tone::Number, format_amount(self.amount)));

        let mut line = Line::new();
        for (i, (tone, text)) in parts.into_iter().enumerate() {
            if i > 0 {
                line = line.push(Tone::Plain, " ");
            }
            line = line.push(tone, text);
        }
        line
    }

    pub fn summary(&self) -> String {
        self.summary_line().to_string()
    }
}

impl fmt::Display for LedgerEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

fn posting_label(posting: &Posting) -> String {
    match posting.flag {
        Some(flag) => format!("{flag} {}", posting.account),
        None => posting.account.clone(),
    }
}

pub(crate) fn quote(text: &str) -> String {
    format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
}

fn collapse_spaces(text: &str) -> String {
    text.split(' ')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
