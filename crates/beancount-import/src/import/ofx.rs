use super::{ImportBatch, ImportedTransaction};
use crate::{Decimal, Result};
use anyhow::{Context, anyhow};
use chrono::NaiveDate;
use regex::Regex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

static STATEMENT_TRANSACTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<STMTTRN>(.*?)</STMTTRN>").expect("transaction pattern is valid")
});
static ELEMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<([A-Z0-9.]+)>([^<]*)").expect("element pattern is valid"));

pub fn load(path: impl AsRef<Path>) -> Result<ImportBatch> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read OFX file: {}", path.display()))?;
    parse(&String::from_utf8_lossy(&bytes))
        .with_context(|| format!("Failed to parse OFX file: {}", path.display()))
}

pub fn parse(source: &str) -> Result<ImportBatch> {
    let header = STATEMENT_TRANSACTION
        .find(source)
        .map_or(source, |first| &source[..first.start()]);
    let header = elements(header);

    let mut transactions = Vec::new();
    for (index, captures) in STATEMENT_TRANSACTION.captures_iter(source).enumerate() {
        let fields = elements(&captures[1]);
        let txn = transaction(&fields).with_context(|| format!("transaction #{}", index + 1))?;
        transactions.push(txn);
    }
    tracing::debug!("parsed {} OFX transactions", transactions.len());

    Ok(ImportBatch {
        account_id: header.get("ACCTID").cloned().unwrap_or_default(),
        name: header.get("ACCTTYPE").cloned().unwrap_or_default(),
        institution: header
            .get("ORG")
            .cloned()
            .unwrap_or_else(|| "Unknown".to_owned()),
        transactions,
    })
}

fn transaction(fields: &HashMap<String, String>) -> Result<ImportedTransaction> {
    let id = fields.get("FITID").ok_or_else(|| anyhow!("missing FITID"))?;
    let posted = fields
        .get("DTPOSTED")
        .ok_or_else(|| anyhow!("missing DTPOSTED"))?;
    let amount = fields
        .get("TRNAMT")
        .ok_or_else(|| anyhow!("missing TRNAMT"))?;
    let payee = ["NAME", "PAYEE", "MEMO"]
        .iter()
        .find_map(|key| fields.get(*key))
        .cloned()
        .unwrap_or_default();

    Ok(ImportedTransaction {
        id: id.clone(),
        date: parse_date(posted)?,
        payee,
        amount: parse_amount(amount)?,
    })
}

fn elements(fragment: &str) -> HashMap<String, String> {
    let mut fields = HashMap::new();
    for captures in ELEMENT.captures_iter(fragment) {
        let value = decode_entities(captures[2].trim());
        if value.is_empty() {
            continue;
        }
        fields
            .entry(captures[1].to_ascii_uppercase())
            .or_insert(value);
    }
    fields
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    let digits = raw
        .get(..8)
        .ok_or_else(|| anyhow!("malformed date '{raw}'"))?;
    NaiveDate::parse_from_str(digits, "%Y%m%d").with_context(|| format!("malformed date '{raw}'"))
}

fn parse_amount(raw: &str) -> Result<Decimal> {
    let normalized = raw.trim_start_matches('+').replace(',', ".");
    normalized
        .parse()
        .with_context(|| format!("malformed amount '{raw}'"))
}

fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SGML: &str = "OFXHEADER:100
DATA:OFXSGML
VERSION:102

<OFX>
<SIGNONMSGSRSV1><SONRS><STATUS><CODE>0<SEVERITY>INFO</STATUS>
<FI><ORG>First Bank<FID>1001</FI></SONRS></SIGNONMSGSRSV1>
<BANKMSGSRSV1><STMTTRNRS><STMTRS><CURDEF>USD
<BANKACCTFROM><BANKID>121000248<ACCTID>000123456<ACCTTYPE>CHECKING</BANKACCTFROM>
<BANKTRANLIST><DTSTART>20240101<DTEND>20240131
<STMTTRN><TRNTYPE>DEBIT<DTPOSTED>20240105120000[-5:EST]<TRNAMT>-42.00<FITID>t1<NAME>Coffee &amp; Co</STMTTRN>
<STMTTRN><TRNTYPE>CREDIT<DTPOSTED>20240110<TRNAMT>+1500,5<FITID>t2<MEMO>Payroll</STMTTRN>
</BANKTRANLIST></STMTRS></STMTTRNRS></BANKMSGSRSV1>
</OFX>
";

    #[test]
    fn parses_sgml_statement() {
        let batch = parse(SGML).unwrap();
        assert_eq!(batch.account_id, "000123456");
        assert_eq!(batch.name, "CHECKING");
        assert_eq!(batch.institution, "First Bank");

        let summary: Vec<String> = batch
            .transactions
            .iter()
            .map(|txn| format!("{} {txn}", txn.id))
            .collect();
        assert_eq!(
            summary,
            ["t1 2024-01-05 Coffee & Co -42.00", "t2 2024-01-10 Payroll 1500.50"]
        );
    }

    #[test]
    fn parses_xml_statement() {
        let xml = r#"<?xml version="1.0"?>
<OFX><BANKMSGSRSV1><STMTTRNRS><STMTRS>
  <BANKACCTFROM><ACCTID>42</ACCTID></BANKACCTFROM>
  <BANKTRANLIST>
    <STMTTRN>
      <DTPOSTED>20240301</DTPOSTED>
      <TRNAMT>-9.99</TRNAMT>
      <FITID>x-1</FITID>
      <NAME>Streaming</NAME>
    </STMTTRN>
  </BANKTRANLIST>
</STMTRS></STMTTRNRS></BANKMSGSRSV1></OFX>"#;
        let batch = parse(xml).unwrap();
        assert_eq!(batch.account_id, "42");
        assert_eq!(batch.institution, "Unknown");
        assert_eq!(batch.transactions.len(), 1);
        assert_eq!(batch.transactions[0].to_string(), "2024-03-01 Streaming -9.99");
    }

    #[test]
    fn missing_id_is_an_error() {
        let broken = "<OFX><STMTTRN><DTPOSTED>20240301<TRNAMT>1</STMTTRN></OFX>";
        let error = parse(broken).unwrap_err();
        assert_eq!(format!("{error:#}"), "transaction #1: missing FITID");
    }
}
