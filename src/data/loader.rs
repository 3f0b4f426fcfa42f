use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use arrow::array::{
    Array, ArrayRef, AsArray, BooleanArray, Float64Array, Float64Builder, Int64Array, StringArray,
};
use arrow::datatypes::{DataType, Field, Float32Type, Float64Type, Int32Type, Int64Type, Schema};
use arrow::record_batch::RecordBatch;
use bzip2::read::MultiBzDecoder;
use ndarray::Array2;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;

use super::files::write_atomic;
use super::model::{CovariateTable, MetadataValue, NumericTable};
use crate::error::DataError;

/// Name of the index column in cached tables.
pub const INDEX_COLUMN: &str = "sample_id";

/// Rows per record batch when writing a cache.
const BATCH_ROWS: usize = 1024;

// ---------------------------------------------------------------------------
// TSV readers
// ---------------------------------------------------------------------------

/// Open a table for reading, decompressing `.bz2` files on the fly.
fn open_text(path: &Path) -> Result<Box<dyn Read>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let reader = BufReader::new(file);
    let compressed = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("bz2"));
    if compressed {
        Ok(Box::new(MultiBzDecoder::new(reader)))
    } else {
        Ok(Box::new(reader))
    }
}

fn tsv_reader(path: &Path) -> Result<csv::Reader<Box<dyn Read>>> {
    Ok(csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .from_reader(open_text(path)?))
}

/// Read a TSV whose first column is the sample id and whose remaining
/// columns are all numeric. Empty and `NA` cells become `NaN`.
pub fn read_numeric_tsv(path: &Path) -> Result<NumericTable> {
    let mut reader = tsv_reader(path)?;
    let headers = reader.headers().context("reading TSV headers")?.clone();
    if headers.is_empty() {
        bail!("{} has no header row", path.display());
    }
    let columns: Vec<String> = headers.iter().skip(1).map(str::to_string).collect();

    let mut index = Vec::new();
    let mut flat: Vec<f64> = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("TSV row {row_no}"))?;
        if record.len() != headers.len() {
            bail!(
                "TSV row {row_no}: expected {} fields, found {}",
                headers.len(),
                record.len()
            );
        }
        index.push(record.get(0).unwrap_or_default().to_string());
        for (j, cell) in record.iter().skip(1).enumerate() {
            flat.push(parse_number(cell).with_context(|| {
                format!("TSV row {row_no}, column {}: '{cell}' is not a number", columns[j])
            })?);
        }
    }

    let values = Array2::from_shape_vec((index.len(), columns.len()), flat)?;
    NumericTable::new(index, columns, values)
}

fn parse_number(cell: &str) -> Result<f64> {
    let cell = cell.trim();
    if cell.is_empty() || cell == "NA" {
        return Ok(f64::NAN);
    }
    Ok(cell.parse::<f64>()?)
}

/// Read a TSV of mixed-type covariates keyed by its first column.
pub fn read_covariate_tsv(path: &Path) -> Result<CovariateTable> {
    let mut reader = tsv_reader(path)?;
    let headers = reader.headers().context("reading TSV headers")?.clone();
    let columns: Vec<String> = headers.iter().skip(1).map(str::to_string).collect();

    let mut table = CovariateTable {
        columns: columns.clone(),
        ..Default::default()
    };
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("TSV row {row_no}"))?;
        table
            .index
            .push(record.get(0).unwrap_or_default().to_string());
        let row: BTreeMap<String, MetadataValue> = columns
            .iter()
            .zip(record.iter().skip(1))
            .map(|(col, cell)| (col.clone(), MetadataValue::parse(cell)))
            .collect();
        table.rows.push(row);
    }
    Ok(table)
}

// ---------------------------------------------------------------------------
// Parquet cache
// ---------------------------------------------------------------------------

fn write_batches(path: &Path, schema: Arc<Schema>, batches: Vec<RecordBatch>) -> Result<()> {
    write_atomic(path, |out| {
        let mut writer = ArrowWriter::try_new(out, schema, None)
            .map_err(|e| DataError::Parse(e.into()))?;
        for batch in &batches {
            writer.write(batch).map_err(|e| DataError::Parse(e.into()))?;
        }
        writer.close().map_err(|e| DataError::Parse(e.into()))?;
        Ok(())
    })?;
    Ok(())
}

/// Cache a numeric table as Parquet: a `sample_id` string column followed by
/// one Float64 column per table column.
pub fn write_numeric_parquet(path: &Path, table: &NumericTable) -> Result<()> {
    let mut fields = vec![Field::new(INDEX_COLUMN, DataType::Utf8, false)];
    fields.extend(
        table
            .columns
            .iter()
            .map(|c| Field::new(c, DataType::Float64, true)),
    );
    let schema = Arc::new(Schema::new(fields));

    let mut batches = Vec::new();
    let mut start = 0;
    while start < table.n_rows() {
        let end = (start + BATCH_ROWS).min(table.n_rows());
        let mut arrays: Vec<ArrayRef> = Vec::with_capacity(table.n_cols() + 1);
        arrays.push(Arc::new(StringArray::from_iter_values(
            table.index[start..end].iter(),
        )));
        for j in 0..table.n_cols() {
            let mut builder = Float64Builder::with_capacity(end - start);
            for i in start..end {
                builder.append_value(table.values[[i, j]]);
            }
            arrays.push(Arc::new(builder.finish()));
        }
        batches.push(RecordBatch::try_new(schema.clone(), arrays).context("building record batch")?);
        start = end;
    }
    write_batches(path, schema, batches)
}

/// Load a table written by [`write_numeric_parquet`].
pub fn read_numeric_parquet(path: &Path) -> Result<NumericTable> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let schema = builder.schema().clone();
    let id_idx = schema
        .index_of(INDEX_COLUMN)
        .map_err(|_| anyhow::anyhow!("parquet cache missing '{INDEX_COLUMN}' column"))?;
    let value_cols: Vec<(usize, String)> = schema
        .fields()
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != id_idx)
        .map(|(i, f)| (i, f.name().clone()))
        .collect();
    let reader = builder.build().context("building parquet reader")?;

    let mut index = Vec::new();
    let mut flat = Vec::new();
    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let ids = batch
            .column(id_idx)
            .as_any()
            .downcast_ref::<StringArray>()
            .context("sample_id column is not Utf8")?;
        let columns: Vec<Vec<f64>> = value_cols
            .iter()
            .map(|(i, name)| {
                extract_f64_column(batch.column(*i))
                    .with_context(|| format!("reading column '{name}'"))
            })
            .collect::<Result<_>>()?;
        for row in 0..batch.num_rows() {
            index.push(ids.value(row).to_string());
            flat.extend(columns.iter().map(|c| c[row]));
        }
    }

    let columns: Vec<String> = value_cols.into_iter().map(|(_, name)| name).collect();
    let values = Array2::from_shape_vec((index.len(), columns.len()), flat)?;
    NumericTable::new(index, columns, values)
}

/// Widen a numeric Arrow column to `f64`; nulls become `NaN`.
fn extract_f64_column(col: &ArrayRef) -> Result<Vec<f64>> {
    let values = match col.data_type() {
        DataType::Float64 => col
            .as_primitive::<Float64Type>()
            .iter()
            .map(|v| v.unwrap_or(f64::NAN))
            .collect(),
        DataType::Float32 => col
            .as_primitive::<Float32Type>()
            .iter()
            .map(|v| v.map_or(f64::NAN, f64::from))
            .collect(),
        DataType::Int64 => col
            .as_primitive::<Int64Type>()
            .iter()
            .map(|v| v.map_or(f64::NAN, |i| i as f64))
            .collect(),
        DataType::Int32 => col
            .as_primitive::<Int32Type>()
            .iter()
            .map(|v| v.map_or(f64::NAN, f64::from))
            .collect(),
        other => bail!("expected a numeric column, got {other:?}"),
    };
    Ok(values)
}

/// Arrow type that can hold every non-null value of a covariate column.
fn covariate_type<'a>(values: impl Iterator<Item = &'a MetadataValue>) -> DataType {
    let mut ty: Option<DataType> = None;
    for value in values {
        let next = match value {
            MetadataValue::Null => continue,
            MetadataValue::Integer(_) => DataType::Int64,
            MetadataValue::Float(_) => DataType::Float64,
            MetadataValue::Bool(_) => DataType::Boolean,
            MetadataValue::String(_) => DataType::Utf8,
        };
        ty = Some(match (ty, next) {
            (None, t) => t,
            (Some(a), b) if a == b => a,
            (Some(DataType::Int64), DataType::Float64) | (Some(DataType::Float64), DataType::Int64) => {
                DataType::Float64
            }
            _ => DataType::Utf8,
        });
    }
    ty.unwrap_or(DataType::Utf8)
}

/// Cache covariates as Parquet with one typed column per covariate.
pub fn write_covariate_parquet(path: &Path, table: &CovariateTable) -> Result<()> {
    let null = MetadataValue::Null;
    let cell = |row: usize, col: &str| table.rows[row].get(col).unwrap_or(&null);

    let mut fields = vec![Field::new(INDEX_COLUMN, DataType::Utf8, false)];
    let mut arrays: Vec<ArrayRef> = vec![Arc::new(StringArray::from_iter_values(
        table.index.iter(),
    ))];
    for col in &table.columns {
        let ty = covariate_type((0..table.len()).map(|r| cell(r, col)));
        let array: ArrayRef = match ty {
            DataType::Int64 => Arc::new(Int64Array::from_iter((0..table.len()).map(|r| {
                match cell(r, col) {
                    MetadataValue::Integer(i) => Some(*i),
                    _ => None,
                }
            }))),
            DataType::Float64 => Arc::new(Float64Array::from_iter(
                (0..table.len()).map(|r| cell(r, col).as_f64()),
            )),
            DataType::Boolean => Arc::new(BooleanArray::from_iter((0..table.len()).map(|r| {
                match cell(r, col) {
                    MetadataValue::Bool(b) => Some(*b),
                    _ => None,
                }
            }))),
            _ => Arc::new(StringArray::from_iter((0..table.len()).map(|r| {
                match cell(r, col) {
                    MetadataValue::Null => None,
                    other => Some(other.to_string()),
                }
            }))),
        };
        fields.push(Field::new(col, array.data_type().clone(), true));
        arrays.push(array);
    }

    let schema = Arc::new(Schema::new(fields));
    let batch = RecordBatch::try_new(schema.clone(), arrays).context("building record batch")?;
    write_batches(path, schema, vec![batch])
}

/// Load covariates written by [`write_covariate_parquet`].
pub fn read_covariate_parquet(path: &Path) -> Result<CovariateTable> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)
        .context("reading parquet metadata")?
        .build()
        .context("building parquet reader")?;

    let mut table = CovariateTable::default();
    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let schema = batch.schema();
        let id_idx = schema
            .index_of(INDEX_COLUMN)
            .map_err(|_| anyhow::anyhow!("parquet cache missing '{INDEX_COLUMN}' column"))?;
        let meta_cols: Vec<(usize, String)> = schema
            .fields()
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != id_idx)
            .map(|(i, f)| (i, f.name().clone()))
            .collect();
        if table.columns.is_empty() {
            table.columns = meta_cols.iter().map(|(_, name)| name.clone()).collect();
        }

        let ids = batch
            .column(id_idx)
            .as_any()
            .downcast_ref::<StringArray>()
            .context("sample_id column is not Utf8")?;
        for row in 0..batch.num_rows() {
            table.index.push(ids.value(row).to_string());
            let values = meta_cols
                .iter()
                .map(|(i, name)| (name.clone(), extract_metadata_value(batch.column(*i), row)))
                .collect();
            table.rows.push(values);
        }
    }
    Ok(table)
}

/// Extract a single covariate value from an Arrow column at a given row.
fn extract_metadata_value(col: &ArrayRef, row: usize) -> MetadataValue {
    if col.is_null(row) {
        return MetadataValue::Null;
    }
    match col.data_type() {
        DataType::Utf8 => MetadataValue::String(col.as_string::<i32>().value(row).to_string()),
        DataType::LargeUtf8 => MetadataValue::String(col.as_string::<i64>().value(row).to_string()),
        DataType::Int64 => MetadataValue::Integer(col.as_primitive::<Int64Type>().value(row)),
        DataType::Int32 => {
            MetadataValue::Integer(i64::from(col.as_primitive::<Int32Type>().value(row)))
        }
        DataType::Float64 => MetadataValue::Float(col.as_primitive::<Float64Type>().value(row)),
        DataType::Float32 => {
            MetadataValue::Float(f64::from(col.as_primitive::<Float32Type>().value(row)))
        }
        DataType::Boolean => MetadataValue::Bool(col.as_boolean().value(row)),
        other => MetadataValue::String(format!("{other:?}")),
    }
}
