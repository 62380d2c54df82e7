//! Content-addressed, disk-backed table cache.
//!
//! A committed table is written once as `<fingerprint>.parquet` under the
//! cache root; the returned [`TableHandle`] carries only metadata plus the
//! fingerprint, so it can flow through workflow state without dragging the
//! payload along. The fingerprint is a SHA-256 digest over the sorted
//! source list and the ordered processing-stage labels — a provenance key,
//! not a hash of the data bytes.

use anyhow::{bail, Context, Result};
use arrow::{compute::concat_batches, record_batch::RecordBatch};
use parquet::{
    arrow::{arrow_reader::ParquetRecordBatchReaderBuilder, ArrowWriter},
    basic::Compression,
    file::properties::WriterProperties,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::{
    fs::{self, File},
    path::PathBuf,
    str::FromStr,
};
use tracing::info;

use crate::table::Table;

/// In-memory representation to load a cached table into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableShape {
    /// Eager row-oriented [`Table`].
    Rows,
    /// Columnar Arrow [`RecordBatch`].
    Batch,
}

impl TableShape {
    pub fn as_str(&self) -> &'static str {
        match self {
            TableShape::Rows => "rows",
            TableShape::Batch => "batch",
        }
    }
}

impl FromStr for TableShape {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "rows" => Ok(TableShape::Rows),
            "batch" => Ok(TableShape::Batch),
            other => bail!("output shape must be one of: rows, batch (got `{other}`)"),
        }
    }
}

#[derive(Debug)]
pub enum LoadedTable {
    Rows(Table),
    Batch(RecordBatch),
}

impl LoadedTable {
    /// Collapse either shape into the row-oriented table.
    pub fn into_table(self) -> Result<Table> {
        match self {
            LoadedTable::Rows(t) => Ok(t),
            LoadedTable::Batch(b) => Table::from_record_batch(&b),
        }
    }
}

/// Metadata-only reference to a cached table. Serializes without touching
/// the payload; a deserialized handle resolves its cache file from the
/// stored fingerprint and root, never re-deriving the fingerprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableHandle {
    pub fingerprint: String,
    /// Bookkeeping tag for the committed representation, not semantics.
    pub flavor: String,
    /// Source identifiers, sorted.
    pub sources: Vec<String>,
    /// Processing-stage labels applied so far, in order.
    pub processing_fingerprints: Vec<String>,
    pub shape: (usize, usize),
    pub columns: Vec<String>,
    pub cache_dir: PathBuf,
}

impl TableHandle {
    pub fn cache_path(&self) -> PathBuf {
        self.cache_dir.join(format!("{}.parquet", self.fingerprint))
    }

    /// Re-read the cached payload in the requested shape. Fails with a
    /// not-found error when the backing file is gone (cache root changed or
    /// the file was evicted externally).
    pub fn load(&self, shape: TableShape) -> Result<LoadedTable> {
        let path = self.cache_path();
        if !path.exists() {
            bail!(
                "cache file not found for fingerprint {} at {}",
                self.fingerprint,
                path.display()
            );
        }

        let file =
            File::open(&path).with_context(|| format!("opening cache file {}", path.display()))?;
        let builder = ParquetRecordBatchReaderBuilder::try_new(file)
            .with_context(|| format!("reading parquet metadata from {}", path.display()))?;
        let schema = builder.schema().clone();
        let reader = builder
            .with_batch_size(8192)
            .build()
            .with_context(|| format!("building parquet reader for {}", path.display()))?;

        let batches: Vec<RecordBatch> = reader
            .collect::<std::result::Result<_, _>>()
            .with_context(|| format!("reading record batches from {}", path.display()))?;

        let batch = if batches.is_empty() {
            RecordBatch::new_empty(schema)
        } else {
            concat_batches(&batches[0].schema(), &batches).context("concatenating cache batches")?
        };

        match shape {
            TableShape::Rows => Ok(LoadedTable::Rows(Table::from_record_batch(&batch)?)),
            TableShape::Batch => Ok(LoadedTable::Batch(batch)),
        }
    }
}

/// Directory-owning cache service. Injected into the pipeline; there is no
/// process-wide singleton.
pub struct TableCache {
    root: PathBuf,
}

impl TableCache {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .with_context(|| format!("creating cache directory {}", root.display()))?;
        Ok(TableCache { root })
    }

    /// Persist a table and return its handle. An existing file for the same
    /// fingerprint is silently overwritten; callers reuse a fingerprint only
    /// when the logical content is identical, so the race is safe.
    pub fn commit(
        &self,
        table: &Table,
        sources: &[String],
        processing_fingerprints: &[String],
        flavor: &str,
    ) -> Result<TableHandle> {
        let mut sorted_sources = sources.to_vec();
        sorted_sources.sort();

        let fingerprint = fingerprint(&sorted_sources, processing_fingerprints);
        let path = self.root.join(format!("{fingerprint}.parquet"));

        let batch = table.to_record_batch()?;
        let file = File::create(&path)
            .with_context(|| format!("creating cache file {}", path.display()))?;
        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build();
        let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))
            .context("creating parquet writer for cache commit")?;
        writer.write(&batch).context("writing cache batch")?;
        writer.close().context("closing cache writer")?;

        info!(
            "committed table {:?} to cache as {} ({})",
            table.shape(),
            &fingerprint[..12],
            flavor
        );

        Ok(TableHandle {
            fingerprint,
            flavor: flavor.to_string(),
            sources: sorted_sources,
            processing_fingerprints: processing_fingerprints.to_vec(),
            shape: table.shape(),
            columns: table.columns.clone(),
            cache_dir: self.root.clone(),
        })
    }
}

/// SHA-256 over sorted sources then ordered stage labels. Stage order
/// matters; source order does not (callers pre-sort).
fn fingerprint(sorted_sources: &[String], processing_fingerprints: &[String]) -> String {
    let mut hasher = Sha256::new();
    for source in sorted_sources {
        hasher.update(source.as_bytes());
    }
    for label in processing_fingerprints {
        hasher.update(label.as_bytes());
    }
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}
