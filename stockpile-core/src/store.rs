//! On-disk store for collected market data.
//!
//! Layout under the store root:
//! - `historical/{TICKER}.parquet` with a `{TICKER}.meta.json` sidecar
//! - `fundamentals/{TICKER}.json`
//! - `metadata/collection_manifest.json` and `collection_summary.json`
//!
//! Features:
//! - Atomic writes (write to .tmp, rename into place)
//! - Integrity validation on load (schema check, row count > 0)
//! - Quarantine for corrupt files ({filename}.quarantined)
//! - Metadata sidecar per ticker (hash, date range, source)

use crate::fundamentals::FundamentalsSnapshot;
use crate::manifest::{CollectionManifest, RunSummary};
use crate::series::{DailyBar, HistoricalSeries};
use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{what}: {source}")]
    Json {
        what: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("parquet error: {0}")]
    Parquet(String),

    #[error("refusing to store empty series for {ticker}")]
    EmptySeries { ticker: String },

    #[error("no stored data for {ticker}")]
    NoData { ticker: String },

    #[error("corrupt data file quarantined: {}", path.display())]
    Corrupt { path: PathBuf },
}

/// Metadata sidecar for a stored series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesMeta {
    pub ticker: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub bar_count: usize,
    pub data_hash: String,
    pub source: String,
    pub written_at: chrono::NaiveDateTime,
}

/// The on-disk data store.
pub struct DataStore {
    root: PathBuf,
}

impl DataStore {
    /// Open a store rooted at `root`, creating the area directories.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        for area in ["historical", "fundamentals", "metadata"] {
            let dir = root.join(area);
            fs::create_dir_all(&dir).map_err(|e| StoreError::Io {
                path: dir.clone(),
                source: e,
            })?;
        }
        Ok(Self { root })
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the Parquet file a ticker's history lives in.
    pub fn history_path(&self, ticker: &str) -> PathBuf {
        self.root.join("historical").join(format!("{ticker}.parquet"))
    }

    fn history_meta_path(&self, ticker: &str) -> PathBuf {
        self.root.join("historical").join(format!("{ticker}.meta.json"))
    }

    /// Path of a ticker's fundamentals snapshot.
    pub fn fundamentals_path(&self, ticker: &str) -> PathBuf {
        self.root.join("fundamentals").join(format!("{ticker}.json"))
    }

    fn manifest_path(&self) -> PathBuf {
        self.root.join("metadata").join("collection_manifest.json")
    }

    fn summary_path(&self) -> PathBuf {
        self.root.join("metadata").join("collection_summary.json")
    }

    /// Write a series to `historical/`, replacing any previous file.
    ///
    /// The Parquet file and its metadata sidecar are both written
    /// atomically; `source` names the provider the bars came from.
    pub fn write_history(
        &self,
        series: &HistoricalSeries,
        source: &str,
    ) -> Result<SeriesMeta, StoreError> {
        let coverage = series.coverage().ok_or_else(|| StoreError::EmptySeries {
            ticker: series.ticker().to_string(),
        })?;

        let path = self.history_path(series.ticker());
        let tmp_path = path.with_extension("parquet.tmp");

        let df = bars_to_dataframe(series.bars())?;
        write_parquet(&df, &tmp_path)?;

        fs::rename(&tmp_path, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            StoreError::Io {
                path: path.clone(),
                source: e,
            }
        })?;

        let hashed = serde_json::to_vec(series.bars()).map_err(|e| StoreError::Json {
            what: "series hash input".into(),
            source: e,
        })?;

        let meta = SeriesMeta {
            ticker: series.ticker().to_string(),
            start_date: coverage.start,
            end_date: coverage.end,
            bar_count: series.len(),
            data_hash: blake3::hash(&hashed).to_hex().to_string(),
            source: source.to_string(),
            written_at: chrono::Local::now().naive_local(),
        };
        atomic_write_json(&self.history_meta_path(series.ticker()), &meta, "series meta")?;

        Ok(meta)
    }

    /// Load the stored series for a ticker, validating on the way in.
    ///
    /// A file that fails validation is renamed to `.quarantined` so the
    /// next collection run rebuilds it instead of tripping on it again.
    pub fn load_history(&self, ticker: &str) -> Result<HistoricalSeries, StoreError> {
        let path = self.history_path(ticker);
        if !path.exists() {
            return Err(StoreError::NoData {
                ticker: ticker.to_string(),
            });
        }

        let loaded = load_and_validate_parquet(&path).and_then(|bars| {
            HistoricalSeries::from_bars(ticker, bars)
                .map_err(|e| StoreError::Parquet(e.to_string()))
        });

        match loaded {
            Ok(series) => Ok(series),
            Err(e) => {
                let quarantine = path.with_extension("parquet.quarantined");
                eprintln!(
                    "WARNING: quarantining corrupt data file {}: {e}",
                    path.display()
                );
                let _ = fs::rename(&path, &quarantine);
                Err(StoreError::Corrupt { path })
            }
        }
    }

    /// Metadata sidecar for a ticker, if one exists and parses.
    pub fn history_meta(&self, ticker: &str) -> Option<SeriesMeta> {
        let content = fs::read_to_string(self.history_meta_path(ticker)).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// All series metadata sidecars under `historical/`, sorted by ticker.
    pub fn stored_series(&self) -> Vec<SeriesMeta> {
        let dir = self.root.join("historical");
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(_) => return Vec::new(),
        };

        let mut metas: Vec<SeriesMeta> = entries
            .flatten()
            .filter(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| name.ends_with(".meta.json"))
            })
            .filter_map(|entry| {
                let content = fs::read_to_string(entry.path()).ok()?;
                serde_json::from_str(&content).ok()
            })
            .collect();

        metas.sort_by(|a, b| a.ticker.cmp(&b.ticker));
        metas
    }

    /// Write a fundamentals snapshot to `fundamentals/{TICKER}.json`.
    pub fn write_fundamentals(&self, snapshot: &FundamentalsSnapshot) -> Result<(), StoreError> {
        atomic_write_json(
            &self.fundamentals_path(&snapshot.ticker),
            snapshot,
            "fundamentals",
        )
    }

    /// Load the stored fundamentals snapshot for a ticker.
    pub fn load_fundamentals(&self, ticker: &str) -> Result<FundamentalsSnapshot, StoreError> {
        let path = self.fundamentals_path(ticker);
        if !path.exists() {
            return Err(StoreError::NoData {
                ticker: ticker.to_string(),
            });
        }
        let content = fs::read_to_string(&path).map_err(|e| StoreError::Io {
            path: path.clone(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(|e| StoreError::Json {
            what: format!("fundamentals for {ticker}"),
            source: e,
        })
    }

    /// Persist the collection manifest.
    pub fn write_manifest(&self, manifest: &CollectionManifest) -> Result<(), StoreError> {
        atomic_write_json(&self.manifest_path(), manifest, "manifest")
    }

    /// Load the manifest from a previous run, if any.
    ///
    /// A missing manifest is not an error; an unparseable one is, so the
    /// caller can decide whether to start fresh.
    pub fn load_manifest(&self) -> Result<Option<CollectionManifest>, StoreError> {
        let path = self.manifest_path();
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path).map_err(|e| StoreError::Io {
            path: path.clone(),
            source: e,
        })?;
        let manifest = serde_json::from_str(&content).map_err(|e| StoreError::Json {
            what: "manifest".into(),
            source: e,
        })?;
        Ok(Some(manifest))
    }

    /// Persist the summary of a completed run.
    pub fn write_summary(&self, summary: &RunSummary) -> Result<(), StoreError> {
        atomic_write_json(&self.summary_path(), summary, "run summary")
    }
}

/// Serialize to pretty JSON and move it into place atomically.
fn atomic_write_json<T: Serialize>(path: &Path, value: &T, what: &str) -> Result<(), StoreError> {
    let json = serde_json::to_string_pretty(value).map_err(|e| StoreError::Json {
        what: format!("{what} serialization"),
        source: e,
    })?;

    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, json).map_err(|e| StoreError::Io {
        path: tmp_path.clone(),
        source: e,
    })?;
    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        StoreError::Io {
            path: path.to_path_buf(),
            source: e,
        }
    })
}

// ── Parquet I/O helpers ─────────────────────────────────────────────

/// Convert bars to a Polars DataFrame.
fn bars_to_dataframe(bars: &[DailyBar]) -> Result<DataFrame, StoreError> {
    let dates: Vec<i32> = bars
        .iter()
        .map(|b| (b.date - NaiveDate::from_ymd_opt(1970, 1, 1).unwrap()).num_days() as i32)
        .collect();
    let opens: Vec<f64> = bars.iter().map(|b| b.open).collect();
    let highs: Vec<f64> = bars.iter().map(|b| b.high).collect();
    let lows: Vec<f64> = bars.iter().map(|b| b.low).collect();
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let volumes: Vec<u64> = bars.iter().map(|b| b.volume).collect();
    let adj_closes: Vec<f64> = bars.iter().map(|b| b.adj_close).collect();

    DataFrame::new(vec![
        Column::new("date".into(), dates)
            .cast(&DataType::Date)
            .map_err(|e| StoreError::Parquet(format!("date cast: {e}")))?,
        Column::new("open".into(), opens),
        Column::new("high".into(), highs),
        Column::new("low".into(), lows),
        Column::new("close".into(), closes),
        Column::new("volume".into(), volumes),
        Column::new("adj_close".into(), adj_closes),
    ])
    .map_err(|e| StoreError::Parquet(format!("dataframe creation: {e}")))
}

/// Write a DataFrame to a Parquet file.
fn write_parquet(df: &DataFrame, path: &Path) -> Result<(), StoreError> {
    let file =
        fs::File::create(path).map_err(|e| StoreError::Parquet(format!("create file: {e}")))?;
    ParquetWriter::new(file)
        .finish(&mut df.clone())
        .map_err(|e| StoreError::Parquet(format!("write parquet: {e}")))?;
    Ok(())
}

/// Load a Parquet file and validate its integrity.
fn load_and_validate_parquet(path: &Path) -> Result<Vec<DailyBar>, StoreError> {
    let file = fs::File::open(path).map_err(|e| StoreError::Parquet(format!("open: {e}")))?;
    let df = ParquetReader::new(file)
        .finish()
        .map_err(|e| StoreError::Parquet(format!("read: {e}")))?;

    // Validate: must have rows
    if df.height() == 0 {
        return Err(StoreError::Parquet("empty parquet file".into()));
    }

    // Validate: must have expected columns
    let expected_cols = [
        "date",
        "open",
        "high",
        "low",
        "close",
        "volume",
        "adj_close",
    ];
    for col_name in &expected_cols {
        if df.column(col_name).is_err() {
            return Err(StoreError::Parquet(format!("missing column '{col_name}'")));
        }
    }

    dataframe_to_bars(&df)
}

/// Convert a DataFrame back to bars.
fn dataframe_to_bars(df: &DataFrame) -> Result<Vec<DailyBar>, StoreError> {
    let map_err = |e: PolarsError| StoreError::Parquet(format!("column read: {e}"));

    let dates = df.column("date").map_err(map_err)?;
    let opens = df.column("open").map_err(map_err)?;
    let highs = df.column("high").map_err(map_err)?;
    let lows = df.column("low").map_err(map_err)?;
    let closes = df.column("close").map_err(map_err)?;
    let volumes = df.column("volume").map_err(map_err)?;
    let adj_closes = df.column("adj_close").map_err(map_err)?;

    let n = df.height();
    let mut bars = Vec::with_capacity(n);

    let date_ca = dates
        .date()
        .map_err(|e| StoreError::Parquet(format!("date column type: {e}")))?;
    let open_ca = opens
        .f64()
        .map_err(|e| StoreError::Parquet(format!("open column type: {e}")))?;
    let high_ca = highs
        .f64()
        .map_err(|e| StoreError::Parquet(format!("high column type: {e}")))?;
    let low_ca = lows
        .f64()
        .map_err(|e| StoreError::Parquet(format!("low column type: {e}")))?;
    let close_ca = closes
        .f64()
        .map_err(|e| StoreError::Parquet(format!("close column type: {e}")))?;
    let vol_ca = volumes
        .u64()
        .map_err(|e| StoreError::Parquet(format!("volume column type: {e}")))?;
    let adj_ca = adj_closes
        .f64()
        .map_err(|e| StoreError::Parquet(format!("adj_close column type: {e}")))?;

    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();

    for i in 0..n {
        let date_days = date_ca
            .get(i)
            .ok_or_else(|| StoreError::Parquet(format!("null date at row {i}")))?;
        let date = epoch + chrono::Duration::days(date_days as i64);

        bars.push(DailyBar {
            date,
            open: open_ca.get(i).unwrap_or(f64::NAN),
            high: high_ca.get(i).unwrap_or(f64::NAN),
            low: low_ca.get(i).unwrap_or(f64::NAN),
            close: close_ca.get(i).unwrap_or(f64::NAN),
            volume: vol_ca.get(i).unwrap_or(0),
            adj_close: adj_ca.get(i).unwrap_or(f64::NAN),
        });
    }

    Ok(bars)
}
