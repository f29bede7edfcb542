use super::{ImportBatch, ImportedTransaction};
use crate::{Decimal, Result};
use anyhow::{Context, anyhow};
use chrono::{DateTime, Local, NaiveDate};
use serde::Deserialize;
use std::path::Path;

#[derive(Deserialize)]
struct RawFile {
    #[serde(default)]
    accounts: Vec<RawAccount>,
}

#[derive(Deserialize)]
struct RawAccount {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    org: RawOrg,
    #[serde(default)]
    transactions: Vec<RawTransaction>,
}

#[derive(Deserialize, Default)]
struct RawOrg {
    name: Option<String>,
}

#[derive(Deserialize)]
struct RawTransaction {
    id: String,
    posted: i64,
    #[serde(default)]
    payee: Option<String>,
    #[serde(default)]
    description: Option<String>,
    amount: serde_json::Value,
}

pub fn load(path: impl AsRef<Path>) -> Result<Vec<ImportBatch>> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read SimpleFIN file: {}", path.display()))?;
    parse(&contents).with_context(|| format!("Failed to parse SimpleFIN file: {}", path.display()))
}

pub fn parse(source: &str) -> Result<Vec<ImportBatch>> {
    let file: RawFile = serde_json::from_str(source)?;
    file.accounts.into_iter().map(account).collect()
}

fn account(raw: RawAccount) -> Result<ImportBatch> {
    let transactions = raw
        .transactions
        .into_iter()
        .map(|txn| {
            let id = txn.id.clone();
            transaction(txn).with_context(|| format!("transaction '{id}'"))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(ImportBatch {
        account_id: raw.id,
        name: raw.name,
        institution: raw
            .org
            .name
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| "Unknown".to_owned()),
        transactions,
    })
}

fn transaction(raw: RawTransaction) -> Result<ImportedTransaction> {
    let amount: Decimal = match &raw.amount {
        serde_json::Value::String(s) => s.trim().parse()?,
        serde_json::Value::Number(n) => n.to_string().parse()?,
        other => return Err(anyhow!("unexpected amount {other}")),
    };

    Ok(ImportedTransaction {
        id: raw.id,
        date: local_date(raw.posted)?,
        payee: raw.payee.or(raw.description).unwrap_or_default(),
        amount,
    })
}

fn local_date(timestamp: i64) -> Result<NaiveDate> {
    let utc = DateTime::from_timestamp(timestamp, 0)
        .ok_or_else(|| anyhow!("timestamp {timestamp} out of range"))?;
    Ok(utc.with_timezone(&Local).date_naive())
}
