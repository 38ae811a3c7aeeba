//! Ticker universe — the ordered set of symbols a run collects.
//!
//! Three sources, all normalized to an ordered, de-duplicated list of
//! uppercase symbols:
//! - explicit symbol lists (CLI `--tickers`)
//! - sector TOML files (`[sectors]` table, sector name to ticker list)
//! - exchange listing files (pipe- or comma-delimited with a Symbol column,
//!   nasdaqlisted.txt style)

use serde::Deserialize;
use std::collections::BTreeMap;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors while loading a universe from disk.
#[derive(Debug, Error)]
pub enum UniverseError {
    #[error("failed to read universe file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse universe TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("failed to parse listing file: {0}")]
    Listing(#[from] csv::Error),
    #[error("no Symbol column in listing file {}", path.display())]
    NoSymbolColumn { path: PathBuf },
}

/// Sector TOML file shape: `[sectors]` with one ticker list per sector.
#[derive(Debug, Deserialize)]
struct SectorFile {
    sectors: BTreeMap<String, Vec<String>>,
}

/// The ordered, de-duplicated list of tickers for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Universe {
    tickers: Vec<String>,
}

impl Universe {
    /// Normalize raw symbols: trim, uppercase, drop empties and exchange
    /// noise (test issues, footer rows, unit/warrant suffixes), keep first
    /// occurrence order.
    pub fn from_symbols<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let mut tickers = Vec::new();
        for raw in symbols {
            let sym = raw.as_ref().trim().to_uppercase();
            if sym.is_empty() || sym.contains(' ') || sym.contains('$') {
                continue;
            }
            if seen.insert(sym.clone()) {
                tickers.push(sym);
            }
        }
        Self { tickers }
    }

    /// Load a universe from a file, dispatching on extension: `.toml` is a
    /// sector file, anything else a delimited exchange listing.
    pub fn from_file(path: &Path) -> Result<Self, UniverseError> {
        let content = std::fs::read_to_string(path).map_err(|e| UniverseError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        if path.extension().and_then(|e| e.to_str()) == Some("toml") {
            Self::from_toml(&content)
        } else {
            Self::from_listing(&content, path)
        }
    }

    /// Parse a sector TOML string. Sector order is alphabetical (BTreeMap),
    /// ticker order within a sector is preserved.
    pub fn from_toml(content: &str) -> Result<Self, UniverseError> {
        let file: SectorFile = toml::from_str(content)?;
        Ok(Self::from_symbols(
            file.sectors.values().flat_map(|tickers| tickers.iter()),
        ))
    }

    /// Parse an exchange listing. The delimiter is sniffed from the header
    /// line (nasdaqlisted.txt uses `|`); rows flagged as test issues are
    /// dropped, as is the "File Creation Time" footer nasdaq appends.
    pub fn from_listing(content: &str, path: &Path) -> Result<Self, UniverseError> {
        let delimiter = if content.lines().next().is_some_and(|l| l.contains('|')) {
            b'|'
        } else {
            b','
        };

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .from_reader(content.as_bytes());

        let headers = reader.headers()?.clone();
        let symbol_col = headers
            .iter()
            .position(|h| {
                let h = h.trim();
                h.eq_ignore_ascii_case("symbol") || h.eq_ignore_ascii_case("act symbol")
            })
            .ok_or_else(|| UniverseError::NoSymbolColumn {
                path: path.to_path_buf(),
            })?;
        let test_issue_col = headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case("test issue"));

        let mut symbols = Vec::new();
        for record in reader.records() {
            let record = record?;
            if let Some(col) = test_issue_col {
                if record.get(col).map(str::trim) == Some("Y") {
                    continue;
                }
            }
            if let Some(sym) = record.get(symbol_col) {
                symbols.push(sym.to_string());
            }
        }

        Ok(Self::from_symbols(symbols))
    }

    /// The fixed liquid-name sample used for smoke runs.
    pub fn test_sample() -> Self {
        Self::from_symbols([
            "AAPL", "GOOGL", "MSFT", "AMZN", "TSLA", "META", "NVDA", "NFLX", "JPM", "BAC",
        ])
    }

    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }

    pub fn len(&self) -> usize {
        self.tickers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.tickers.iter().map(String::as_str)
    }
}
