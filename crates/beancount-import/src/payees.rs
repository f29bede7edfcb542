use crate::Result;
use anyhow::Context as _;
use serde::Serialize as _;
use serde_json::ser::{PrettyFormatter, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PayeeMap {
    path: PathBuf,
    replacements: BTreeMap<String, String>,
}

impl PayeeMap {
    /// Read the map stored at `path`. A missing, empty or malformed file gives an empty map.
    pub fn load(path: impl Into<PathBuf>) -> PayeeMap {
        let path = path.into();
        let replacements = match std::fs::read_to_string(&path) {
            Ok(contents) if contents.trim().is_empty() => BTreeMap::new(),
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|error| {
                tracing::warn!("ignoring payee file {}: {error}", path.display());
                BTreeMap::new()
            }),
            Err(error) => {
                tracing::debug!("no payee file at {}: {error}", path.display());
                BTreeMap::new()
            }
        };
        PayeeMap { path, replacements }
    }

    pub fn get(&self, raw: &str) -> Option<&str> {
        self.replacements.get(raw).map(String::as_str)
    }

    pub fn set(&mut self, raw: &str, replacement: &str) -> Result<()> {
        if self.get(raw) == Some(replacement) {
            return Ok(());
        }
        self.replacements
            .insert(raw.to_owned(), replacement.to_owned());
        self.save()
    }

    fn save(&self) -> Result<()> {
        let mut out = Vec::new();
        let mut serializer = Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(b"    "));
        self.replacements.serialize(&mut serializer)?;
        std::fs::write(&self.path, out)
            .with_context(|| format!("Failed to write payee file: {}", self.path.display()))?;
        tracing::info!(
            "saved {} payee replacements to {}",
            self.replacements.len(),
            self.path.display()
        );
        Ok(())
    }

    pub fn known_payees(&self, ledger_payees: &BTreeSet<String>) -> Vec<String> {
        let mut known: BTreeSet<&str> = self.replacements.values().map(String::as_str).collect();
        known.extend(ledger_payees.iter().map(String::as_str));
        known.into_iter().map(str::to_owned).collect()
    }
}
