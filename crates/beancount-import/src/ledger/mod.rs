mod document;

use document::{Block, BlockKind, Document};

use crate::entry::{Amount, EntryUpdate, Flag, LedgerEntry, MetaValue, Metadata, Posting, Source};
use crate::{Decimal, Result};
use anyhow::Context as _;
use beancount_parser::{DirectiveContent, Entry, metadata};
use chrono::NaiveDate;
use regex::Regex;
use std::collections::{BTreeSet, HashSet, VecDeque};
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;

static OPTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^option\s+"([^"]*)"\s+"([^"]*)""#).expect("option pattern is valid")
});
static INCLUDE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^include\s+"([^"]*)""#).expect("include pattern is valid"));

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("{} changed on disk since it was loaded", .0.display())]
    ChangedOnDisk(PathBuf),
    #[error("entry was not loaded from the ledger")]
    NotFromLedger,
    #[error("the ledger has no entry at line {0}")]
    UnknownEntry(usize),
    #[error("the entry at line {0} can only gain metadata when it is not re-rendered")]
    Unrepresentable(usize),
    #[error("posting {account} not found in the entry at line {line}")]
    PostingNotFound { account: String, line: usize },
    #[error("failed to access {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl LedgerError {
    fn io(path: &Path) -> impl FnOnce(std::io::Error) -> LedgerError + '_ {
        move |source| LedgerError::Io {
            path: path.to_owned(),
            source,
        }
    }
}

#[derive(Debug, Clone)]
struct LedgerFile {
    path: PathBuf,
    loaded: String,
    document: Document,
}

#[derive(Debug, Clone, Default)]
pub struct Ledger {
    files: Vec<LedgerFile>,
    pub entries: Vec<LedgerEntry>,
    /// Accounts with an `open` directive, in file order.
    pub accounts: Vec<String>,
    pub tags: BTreeSet<String>,
    pub links: BTreeSet<String>,
    pub payees: BTreeSet<String>,
    pub operating_currency: Option<String>,
    pub title: Option<String>,
    pub errors: Vec<String>,
}

impl Ledger {
    /// Load the file at `path` and every file it includes.
    pub fn load(path: impl AsRef<Path>) -> Result<Ledger> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read ledger file: {}", path.display()))?;

        let mut ledger = Ledger::default();
        let mut seen = HashSet::from([canonical(path)]);
        let mut includes: VecDeque<PathBuf> = ledger.add_file(path.to_owned(), source).into();
        while let Some(include) = includes.pop_front() {
            if !seen.insert(canonical(&include)) {
                tracing::debug!("{} is already loaded", include.display());
                continue;
            }
            match std::fs::read_to_string(&include) {
                Ok(source) => includes.extend(ledger.add_file(include, source)),
                Err(error) => ledger
                    .errors
                    .push(format!("include {}: {error}", include.display())),
            }
        }

        tracing::debug!(
            "loaded {} entries from {} file(s) ({} errors)",
            ledger.entries.len(),
            ledger.files.len(),
            ledger.errors.len()
        );
        Ok(ledger)
    }

    /// Build a ledger from `source` as if it had been read from `path`. Includes are not followed.
    pub fn parse(path: impl Into<PathBuf>, source: String) -> Ledger {
        let mut ledger = Ledger::default();
        let includes = ledger.add_file(path.into(), source);
        if !includes.is_empty() {
            tracing::debug!("{} include(s) not followed", includes.len());
        }
        ledger
    }

    fn add_file(&mut self, path: PathBuf, source: String) -> Vec<PathBuf> {
        let file = self.files.len();
        let document = Document::parse(&source);
        let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let mut includes = Vec::new();

        for (index, block) in document.blocks().iter().enumerate() {
            match block.kind {
                BlockKind::Directive => self.read_directive_block(file, &path, index, block),
                BlockKind::Option => self.read_option(block),
                BlockKind::Include => match INCLUDE.captures(block.text.trim()) {
                    Some(captures) => includes.push(base_dir.join(&captures[1])),
                    None => self.errors.push(format!(
                        "{}: malformed include",
                        location(file, &path, block.line)
                    )),
                },
                _ => {}
            }
        }

        self.files.push(LedgerFile {
            path,
            loaded: source,
            document,
        });
        includes
    }

    fn read_option(&mut self, block: &Block) {
        let Some(captures) = OPTION.captures(block.text.trim()) else {
            return;
        };
        match &captures[1] {
            "operating_currency" if self.operating_currency.is_none() => {
                self.operating_currency = Some(captures[2].to_owned());
            }
            "title" => self.title = Some(captures[2].to_owned()),
            _ => {}
        }
    }

    fn read_directive_block(&mut self, file: usize, path: &Path, index: usize, block: &Block) {
        for entry in beancount_parser::parse_iter::<Decimal>(&block.text) {
            let directive = match entry {
                Ok(Entry::Directive(directive)) => directive,
                Ok(_) => continue,
                Err(error) => {
                    self.errors
                        .push(format!("{}: {error}", location(file, path, block.line)));
                    continue;
                }
            };

            match &directive.content {
                DirectiveContent::Open(open) => self.accounts.push(open.account.to_string()),
                DirectiveContent::Transaction(txn) => {
                    let date = match directive.date.to_string().parse::<NaiveDate>() {
                        Ok(date) => date,
                        Err(error) => {
                            self.errors
                                .push(format!("{}: {error}", location(file, path, block.line)));
                            continue;
                        }
                    };
                    let lossless = !document::has_comment(&block.text)
                        && txn
                            .postings
                            .iter()
                            .all(|posting| posting.cost.is_none() && posting.price.is_none());
                    let source = Source {
                        file,
                        block: index,
                        line: block.line,
                        lossless,
                    };
                    let entry = convert_transaction(date, &directive.metadata, txn, source);

                    self.tags.extend(entry.tags.iter().cloned());
                    self.links.extend(entry.links.iter().cloned());
                    if let Some(payee) = &entry.payee {
                        self.payees.insert(payee.clone());
                    }
                    self.entries.push(entry);
                }
                _ => {}
            }
        }
    }

    /// Write `entry` back over the block it was loaded from and rewrite that file.
    ///
    /// Nothing is written if the file no longer matches what was loaded.
    pub fn replace_entry(&mut self, entry: &LedgerEntry) -> Result<(), LedgerError> {
        let source = entry.source.ok_or(LedgerError::NotFromLedger)?;
        let position = self
            .entries
            .iter()
            .position(|loaded| {
                loaded
                    .source
                    .is_some_and(|s| s.file == source.file && s.block == source.block)
            })
            .ok_or(LedgerError::UnknownEntry(source.line))?;
        let file = self
            .files
            .get(source.file)
            .ok_or(LedgerError::UnknownEntry(source.line))?;
        let block = file
            .document
            .blocks()
            .get(source.block)
            .ok_or(LedgerError::UnknownEntry(source.line))?;

        let line_ending = if block.text.contains("\r\n") { "\r\n" } else { "\n" };
        let mut text = if source.lossless {
            entry.render().replace('\n', line_ending)
        } else {
            annotate_block(&block.text, &self.entries[position], entry, line_ending)?
        };
        if block.text.ends_with('\n') && !text.ends_with('\n') {
            text.push_str(line_ending);
        }

        let on_disk = std::fs::read_to_string(&file.path).map_err(LedgerError::io(&file.path))?;
        if on_disk != file.loaded {
            return Err(LedgerError::ChangedOnDisk(file.path.clone()));
        }

        let mut document = file.document.clone();
        document.replace(source.block, text);
        let rendered = document.render();
        write_replacing(&file.path, &rendered)?;
        tracing::info!(
            "rewrote entry at line {} of {}",
            source.line,
            file.path.display()
        );

        self.entries[position] = entry.clone();
        for loaded in &mut self.entries {
            if let Some(loaded_source) = &mut loaded.source
                && loaded_source.file == source.file
            {
                loaded_source.line = document.blocks()[loaded_source.block].line;
            }
        }
        let file = &mut self.files[source.file];
        file.document = document;
        file.loaded = rendered;
        Ok(())
    }
}

fn canonical(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_owned())
}

fn location(file: usize, path: &Path, line: usize) -> String {
    if file == 0 {
        format!("line {line}")
    } else {
        format!("{} line {line}", path.display())
    }
}

pub fn append_entry(path: &Path, entry: &LedgerEntry) -> Result<(), LedgerError> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(LedgerError::io(path))?;
    writeln!(file, "\n{}", entry.render()).map_err(LedgerError::io(path))?;
    tracing::info!("appended entry {} to {}", entry.summary(), path.display());
    Ok(())
}

fn write_replacing(path: &Path, contents: &str) -> Result<(), LedgerError> {
    let target = std::fs::canonicalize(path).map_err(LedgerError::io(path))?;
    let permissions = std::fs::metadata(&target)
        .map_err(LedgerError::io(&target))?
        .permissions();

    let file_name = target
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp = target.with_file_name(format!(".{file_name}.tmp"));
    std::fs::write(&temp, contents).map_err(LedgerError::io(&temp))?;
    std::fs::set_permissions(&temp, permissions).map_err(LedgerError::io(&temp))?;
    std::fs::rename(&temp, &target).map_err(LedgerError::io(&target))
}

/// Insert the metadata `updated` has gained over `loaded` into the original
/// block text, leaving every existing line untouched.
fn annotate_block(
    text: &str,
    loaded: &LedgerEntry,
    updated: &LedgerEntry,
    line_ending: &str,
) -> Result<String, LedgerError> {
    let line = loaded.source.map_or(0, |source| source.line);
    let (old_postings, new_postings) = (loaded.postings(), updated.postings());
    let same_shape = old_postings.len() == new_postings.len()
        && old_postings.iter().zip(new_postings).all(|(old, new)| {
            old.account == new.account
                && old.units == new.units
                && old.metadata.iter().all(|(k, v)| new.metadata.get(k) == Some(v))
        })
        && loaded.same_header(updated);
    if !same_shape {
        return Err(LedgerError::Unrepresentable(line));
    }

    let mut lines: Vec<String> = text.split_inclusive('\n').map(str::to_owned).collect();
    let mut cursor = 1;
    let mut insertions = Vec::new();
    for (old, new) in old_postings.iter().zip(new_postings) {
        let found = (cursor..lines.len())
            .find(|&i| is_posting_line(&lines[i], &old.account))
            .ok_or_else(|| LedgerError::PostingNotFound {
                account: old.account.clone(),
                line,
            })?;
        let indent = indentation(&lines[found]);
        let mut end = found + 1;
        while end < lines.len() && indentation(&lines[end]).len() > indent.len() {
            end += 1;
        }
        cursor = end;

        let added: Vec<String> = new
            .metadata
            .iter()
            .filter(|(key, _)| !old.metadata.contains_key(*key))
            .map(|(key, value)| format!("{indent}  {key}: {value}"))
            .collect();
        if !added.is_empty() {
            insertions.push((end, added));
        }
    }

    for (at, added) in insertions.into_iter().rev() {
        if let Some(previous) = lines.get_mut(at - 1)
            && !previous.ends_with('\n')
        {
            previous.push_str(line_ending);
        }
        let chunk = added.into_iter().map(|line| format!("{line}{line_ending}"));
        lines.splice(at..at, chunk);
    }

    let mut annotated = lines.concat();
    if !text.ends_with('\n') && annotated.ends_with(line_ending) {
        annotated.truncate(annotated.len() - line_ending.len());
    }
    Ok(annotated)
}

fn indentation(line: &str) -> &str {
    let trimmed = line.trim_start_matches([' ', '\t']);
    &line[..line.len() - trimmed.len()]
}

fn is_posting_line(line: &str, account: &str) -> bool {
    if indentation(line).is_empty() {
        return false;
    }
    let mut words = line.split_whitespace();
    let first = words.next();
    let candidate = match first {
        Some(flag) if flag.chars().count() == 1 && !flag.starts_with(char::is_alphabetic) => {
            words.next()
        }
        other => other,
    };
    candidate == Some(account)
}

impl LedgerEntry {
    fn same_header(&self, other: &LedgerEntry) -> bool {
        self.date == other.date
            && self.flag == other.flag
            && self.payee == other.payee
            && self.narration == other.narration
            && self.tags == other.tags
            && self.links == other.links
            && self.metadata == other.metadata
    }
}

fn convert_transaction<K: fmt::Display>(
    date: NaiveDate,
    entry_metadata: &std::collections::HashMap<K, metadata::Value<Decimal>>,
    txn: &beancount_parser::Transaction<Decimal>,
    source: Source,
) -> LedgerEntry {
    let flag = txn.flag.map_or(Flag::Cleared, Flag::from_char);
    let mut entry = LedgerEntry::new(date, flag, txn.payee.clone());
    entry.narration = txn.narration.clone().filter(|n| !n.is_empty());
    entry.tags = txn
        .tags
        .iter()
        .map(|tag| tag.to_string().trim_start_matches('#').to_owned())
        .collect();
    entry.links = txn
        .links
        .iter()
        .map(|link| link.to_string().trim_start_matches('^').to_owned())
        .collect();
    entry.metadata = convert_metadata(entry_metadata);
    entry.source = Some(source);

    let postings = txn
        .postings
        .iter()
        .map(|posting| Posting {
            flag: posting.flag,
            account: posting.account.to_string(),
            units: posting.amount.as_ref().map(|amount| Amount {
                number: amount.value,
                currency: amount.currency.to_string(),
            }),
            metadata: convert_metadata(&posting.metadata),
        })
        .collect();
    entry.update(EntryUpdate {
        postings: Some(postings),
        ..Default::default()
    });
    entry
}

fn convert_metadata<K: fmt::Display>(
    map: &std::collections::HashMap<K, metadata::Value<Decimal>>,
) -> Metadata {
    map.iter()
        .map(|(key, value)| {
            let value = match value {
                metadata::Value::String(s) => MetaValue::String(s.clone()),
                metadata::Value::Number(n) => MetaValue::Number(*n),
                metadata::Value::Currency(c) => MetaValue::Raw(c.to_string()),
            };
            (key.to_string(), value)
        })
        .collect()
}
