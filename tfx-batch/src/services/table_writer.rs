//! Output table serialization
//!
//! Columns are the union of all row keys in first-seen order; a row
//! lacking a column gets null there. With no rows, the canonical layout is
//! written so downstream readers still see the schema.
//!
//! **Formats** (by output file extension):
//! - `.parquet` / `.pq`: Arrow schema, Snappy-compressed Parquet
//! - `.csv`: header row, genres joined with `;`, nulls as empty fields

use arrow::array::{ArrayRef, Float64Array, ListBuilder, StringArray, StringBuilder};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::errors::ParquetError;
use parquet::file::properties::WriterProperties;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use crate::services::row_assembler::canonical_layout;
use crate::types::{ColumnKind, ColumnValue, FeatureRow};

/// Separator for list cells in CSV output
const CSV_LIST_SEPARATOR: &str = ";";

/// Serialization errors (fatal to the run)
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Unsupported output format: {0} (expected .parquet, .pq or .csv)")]
    UnsupportedFormat(PathBuf),

    #[error("I/O error writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] ParquetError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// On-disk table format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Parquet,
    Csv,
}

impl TableFormat {
    /// Pick the format from the output path's extension
    pub fn from_path(path: &Path) -> Result<Self, OutputError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match extension.as_deref() {
            Some("parquet") | Some("pq") => Ok(TableFormat::Parquet),
            Some("csv") => Ok(TableFormat::Csv),
            _ => Err(OutputError::UnsupportedFormat(path.to_path_buf())),
        }
    }
}

/// One column of the output schema
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSpec {
    pub name: String,
    pub kind: ColumnKind,
    pub nullable: bool,
}

/// Union of row columns in first-seen order, or the canonical layout
pub fn table_layout(rows: &[FeatureRow], contrast_bands: usize) -> Vec<ColumnSpec> {
    if rows.is_empty() {
        return canonical_layout(contrast_bands)
            .into_iter()
            .map(|(name, kind)| ColumnSpec {
                nullable: kind == ColumnKind::NullableText,
                name,
                kind,
            })
            .collect();
    }

    let mut layout: Vec<ColumnSpec> = Vec::new();
    for row in rows {
        for (name, value) in row.columns() {
            if !layout.iter().any(|c| c.name == name) {
                layout.push(ColumnSpec {
                    name: name.to_string(),
                    kind: value.kind(),
                    nullable: value.kind() == ColumnKind::NullableText,
                });
            }
        }
    }

    for column in layout.iter_mut() {
        if rows.iter().any(|row| row.get(&column.name).is_none()) {
            column.nullable = true;
        }
    }

    layout
}

/// Write `rows` to `path`, returning the number of rows written
///
/// Creates the parent directory if missing.
pub fn write_table(
    path: &Path,
    rows: &[FeatureRow],
    contrast_bands: usize,
) -> Result<usize, OutputError> {
    let format = TableFormat::from_path(path)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| OutputError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let layout = table_layout(rows, contrast_bands);

    match format {
        TableFormat::Parquet => write_parquet(path, rows, &layout)?,
        TableFormat::Csv => write_csv(path, rows, &layout)?,
    }

    tracing::info!(
        path = %path.display(),
        rows = rows.len(),
        columns = layout.len(),
        format = ?format,
        "Output table written"
    );

    Ok(rows.len())
}

fn arrow_type(kind: ColumnKind) -> DataType {
    match kind {
        ColumnKind::Text | ColumnKind::NullableText => DataType::Utf8,
        ColumnKind::TextList => {
            DataType::List(Arc::new(Field::new("item", DataType::Utf8, true)))
        }
        ColumnKind::Float => DataType::Float64,
    }
}

/// Build the Arrow record batch for `rows` under `layout`
pub fn to_record_batch(rows: &[FeatureRow], layout: &[ColumnSpec]) -> Result<RecordBatch, OutputError> {
    let schema = Arc::new(Schema::new(
        layout
            .iter()
            .map(|c| Field::new(c.name.as_str(), arrow_type(c.kind), c.nullable))
            .collect::<Vec<_>>(),
    ));

    let columns: Vec<ArrayRef> = layout
        .iter()
        .map(|column| build_array(rows, column))
        .collect();

    Ok(RecordBatch::try_new(schema, columns)?)
}

fn build_array(rows: &[FeatureRow], column: &ColumnSpec) -> ArrayRef {
    let cells = rows.iter().map(|row| row.get(&column.name));

    match column.kind {
        ColumnKind::Text | ColumnKind::NullableText => {
            let values: Vec<Option<String>> = cells
                .map(|cell| cell.and_then(|v| v.as_text()).map(str::to_string))
                .collect();
            Arc::new(StringArray::from(values))
        }
        ColumnKind::Float => {
            let values: Vec<Option<f64>> = cells.map(|cell| cell.and_then(|v| v.as_f64())).collect();
            Arc::new(Float64Array::from(values))
        }
        ColumnKind::TextList => {
            let mut builder = ListBuilder::new(StringBuilder::new());
            for cell in cells {
                match cell {
                    Some(ColumnValue::TextList(items)) => {
                        for item in items {
                            builder.values().append_value(item);
                        }
                        builder.append(true);
                    }
                    _ => builder.append(false),
                }
            }
            Arc::new(builder.finish())
        }
    }
}

fn write_parquet(path: &Path, rows: &[FeatureRow], layout: &[ColumnSpec]) -> Result<(), OutputError> {
    let batch = to_record_batch(rows, layout)?;

    let file = File::create(path).map_err(|source| OutputError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();

    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
    if batch.num_rows() > 0 {
        writer.write(&batch)?;
    }
    writer.close()?;
    Ok(())
}

fn write_csv(path: &Path, rows: &[FeatureRow], layout: &[ColumnSpec]) -> Result<(), OutputError> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(layout.iter().map(|c| c.name.as_str()))?;

    for row in rows {
        let record: Vec<String> = layout
            .iter()
            .map(|column| match row.get(&column.name) {
                Some(ColumnValue::Text(s)) => s.clone(),
                Some(ColumnValue::NullableText(s)) => s.clone().unwrap_or_default(),
                Some(ColumnValue::TextList(items)) => items.join(CSV_LIST_SEPARATOR),
                Some(ColumnValue::Float(v)) => v.to_string(),
                None => String::new(),
            })
            .collect();
        writer.write_record(&record)?;
    }

    writer.flush().map_err(|source| OutputError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}
