use chrono::NaiveDate;
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;
use thiserror::Error;

static ACCOUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(Assets|Liabilities|Equity|Income|Expenses)(:[A-Z0-9][A-Za-z0-9-]*)+$")
        .expect("account pattern is valid")
});
static ISO_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("date pattern is valid"));
static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_-]*$").expect("tag pattern is valid"));

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InvalidInput {
    #[error("not a valid account")]
    Account,
    #[error("not a valid date, use YYYY-MM-DD")]
    Date,
    #[error("not a valid flag, use '*' or '!'")]
    Flag,
    #[error("not a valid link or tag: {0}")]
    Tag(String),
    #[error("not a valid period, use YYYY, YYYY-MM or YYYY-MM-DD")]
    Period,
}

pub fn is_account(text: &str) -> bool {
    ACCOUNT.is_match(text)
}

pub fn parse_account(text: &str) -> Result<String, InvalidInput> {
    let text = text.trim();
    if is_account(text) {
        Ok(text.to_owned())
    } else {
        Err(InvalidInput::Account)
    }
}

pub fn parse_date(text: &str) -> Result<NaiveDate, InvalidInput> {
    let text = text.trim();
    if !ISO_DATE.is_match(text) || text.starts_with("0000") {
        return Err(InvalidInput::Date);
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d").map_err(|_| InvalidInput::Date)
}

pub fn parse_tags(text: &str) -> Result<BTreeSet<String>, InvalidInput> {
    text.split_whitespace()
        .map(|word| {
            let name = word.trim_start_matches(['#', '^']);
            if TAG.is_match(name) {
                Ok(name.to_owned())
            } else {
                Err(InvalidInput::Tag(word.to_owned()))
            }
        })
        .collect()
}
