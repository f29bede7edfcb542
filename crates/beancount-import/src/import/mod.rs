pub mod ofx;
pub mod simplefin;

use crate::Decimal;
use crate::console::{Line, Tone};
use crate::money::format_amount;
use crate::validate::InvalidInput;
use chrono::NaiveDate;
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedTransaction {
    /// Identifier assigned by the export, stored as `rec` metadata once reconciled.
    pub id: String,
    pub date: NaiveDate,
    pub payee: String,
    pub amount: Decimal,
}

impl ImportedTransaction {
    pub fn abs_amount(&self) -> Decimal {
        self.amount.abs()
    }

    pub fn summary_line(&self) -> Line {
        Line::styled(Tone::Date, self.date.to_string())
            .push(Tone::Plain, " ")
            .push(Tone::Text, self.payee.clone())
            .push(Tone::Plain, " ")
            .push(Tone::Number, format_amount(self.amount))
    }
}

impl fmt::Display for ImportedTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.date,
            self.payee,
            format_amount(self.amount)
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportBatch {
    pub account_id: String,
    pub name: String,
    pub institution: String,
    pub transactions: Vec<ImportedTransaction>,
}

static PERIOD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{4}(-(0[1-9]|1[0-2])(-(0[1-9]|[12]\d|3[01]))?)?$")
        .expect("period pattern is valid")
});

/// A year, month or day given as `YYYY`, `YYYY-MM` or `YYYY-MM-DD`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Period(String);

impl Period {
    pub fn contains(&self, date: NaiveDate) -> bool {
        date.to_string().starts_with(&self.0)
    }

    pub fn filter(&self, transactions: &[ImportedTransaction]) -> Vec<ImportedTransaction> {
        transactions
            .iter()
            .filter(|txn| self.contains(txn.date))
            .cloned()
            .collect()
    }
}

impl FromStr for Period {
    type Err = InvalidInput;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if PERIOD.is_match(s) {
            Ok(Period(s.to_owned()))
        } else {
            Err(InvalidInput::Period)
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
