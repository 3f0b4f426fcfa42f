use std::collections::{BTreeMap, HashMap};
use std::fmt;

use anyhow::{bail, Result};
use ndarray::{Array2, ArrayView1, Axis};

// ---------------------------------------------------------------------------
// MetadataValue – a single covariate cell
// ---------------------------------------------------------------------------

/// A dynamically-typed covariate value mirroring the dtypes of a TSV column.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Null,
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::String(s) => write!(f, "{s}"),
            MetadataValue::Integer(i) => write!(f, "{i}"),
            MetadataValue::Float(v) => write!(f, "{v:.4}"),
            MetadataValue::Bool(b) => write!(f, "{b}"),
            MetadataValue::Null => write!(f, "<null>"),
        }
    }
}

impl MetadataValue {
    /// Numeric view of the cell; booleans count as 0/1.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetadataValue::Float(v) => Some(*v),
            MetadataValue::Integer(i) => Some(*i as f64),
            MetadataValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Infer the type of a raw TSV cell.
    pub fn parse(s: &str) -> Self {
        if s.is_empty() || s == "NA" || s == "NaN" {
            return MetadataValue::Null;
        }
        if let Ok(i) = s.parse::<i64>() {
            return MetadataValue::Integer(i);
        }
        if let Ok(f) = s.parse::<f64>() {
            return MetadataValue::Float(f);
        }
        match s {
            "true" | "True" => MetadataValue::Bool(true),
            "false" | "False" => MetadataValue::Bool(false),
            _ => MetadataValue::String(s.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// NumericTable – expression / mutation matrices
// ---------------------------------------------------------------------------

/// A dense sample × feature matrix with a string row index.
#[derive(Debug, Clone, PartialEq)]
pub struct NumericTable {
    /// Row labels (sample ids).
    pub index: Vec<String>,
    /// Column labels (genes, mutations, covariates).
    pub columns: Vec<String>,
    /// `index.len()` × `columns.len()` values.
    pub values: Array2<f64>,
}

impl NumericTable {
    pub fn new(index: Vec<String>, columns: Vec<String>, values: Array2<f64>) -> Result<Self> {
        if values.nrows() != index.len() || values.ncols() != columns.len() {
            bail!(
                "table shape {:?} does not match {} rows x {} columns",
                values.shape(),
                index.len(),
                columns.len()
            );
        }
        Ok(Self {
            index,
            columns,
            values,
        })
    }

    pub fn n_rows(&self) -> usize {
        self.index.len()
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Map from sample id to row position. The first occurrence wins.
    pub fn index_map(&self) -> HashMap<&str, usize> {
        let mut map = HashMap::with_capacity(self.index.len());
        for (row, id) in self.index.iter().enumerate() {
            map.entry(id.as_str()).or_insert(row);
        }
        map
    }

    pub fn column(&self, name: &str) -> Option<ArrayView1<'_, f64>> {
        self.columns
            .iter()
            .position(|c| c == name)
            .map(|j| self.values.column(j))
    }

    /// Replace missing (non-finite) cells with the mean of the finite cells
    /// in the same column, or 0 for a column with none. Returns the number
    /// of cells replaced.
    pub fn impute_column_means(&mut self) -> usize {
        let mut filled = 0;
        for mut column in self.values.columns_mut() {
            let (sum, n) = column
                .iter()
                .filter(|v| v.is_finite())
                .fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
            let mean = if n == 0 { 0.0 } else { sum / n as f64 };
            for v in column.iter_mut().filter(|v| !v.is_finite()) {
                *v = mean;
                filled += 1;
            }
        }
        filled
    }

    /// New table holding the given rows, in the given order.
    pub fn select_rows(&self, rows: &[usize]) -> NumericTable {
        NumericTable {
            index: rows.iter().map(|&r| self.index[r].clone()).collect(),
            columns: self.columns.clone(),
            values: self.values.select(Axis(0), rows),
        }
    }

    /// Append the columns of `other`, which must share this table's index.
    pub fn hstack(&self, other: &NumericTable) -> Result<NumericTable> {
        if self.index != other.index {
            bail!("cannot append columns: row indices differ");
        }
        let values = ndarray::concatenate(Axis(1), &[self.values.view(), other.values.view()])?;
        let mut columns = self.columns.clone();
        columns.extend(other.columns.iter().cloned());
        NumericTable::new(self.index.clone(), columns, values)
    }
}

// ---------------------------------------------------------------------------
// CovariateTable – per-sample clinical covariates
// ---------------------------------------------------------------------------

/// Covariates keyed by sample id, with one typed cell per column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CovariateTable {
    pub index: Vec<String>,
    pub columns: Vec<String>,
    pub rows: Vec<BTreeMap<String, MetadataValue>>,
}

impl CovariateTable {
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Extract numeric covariate columns aligned to `index`.
    ///
    /// Samples without a covariate row and null cells take the column mean of
    /// the observed values.
    pub fn numeric_columns(&self, names: &[String], index: &[String]) -> Result<NumericTable> {
        let by_id: HashMap<&str, usize> = self
            .index
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect();

        let mut values = Array2::<f64>::zeros((index.len(), names.len()));
        for (j, name) in names.iter().enumerate() {
            if !self.columns.contains(name) {
                bail!("covariate column {name} not found");
            }
            // every covariate row, not only the requested samples
            let mut column: Vec<Option<f64>> = Vec::with_capacity(self.rows.len());
            for row in &self.rows {
                let cell = row.get(name).unwrap_or(&MetadataValue::Null);
                match cell {
                    MetadataValue::Null => column.push(None),
                    other => match other.as_f64() {
                        Some(v) if v.is_finite() => column.push(Some(v)),
                        Some(_) => column.push(None),
                        None => bail!("covariate column {name} is not numeric ({other})"),
                    },
                }
            }
            let present: Vec<f64> = column.iter().flatten().copied().collect();
            let fill = if present.is_empty() {
                0.0
            } else {
                present.iter().sum::<f64>() / present.len() as f64
            };
            for (i, id) in index.iter().enumerate() {
                values[[i, j]] = by_id
                    .get(id.as_str())
                    .and_then(|&row| column[row])
                    .unwrap_or(fill);
            }
        }
        NumericTable::new(index.to_vec(), names.to_vec(), values)
    }
}

// ---------------------------------------------------------------------------
// LabelSeries – binary mutation status per sample
// ---------------------------------------------------------------------------

/// Ordered `(sample_id, status)` pairs with status in {0, 1}.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSeries {
    ids: Vec<String>,
    status: Vec<u8>,
}

impl LabelSeries {
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, u8)>,
        S: Into<String>,
    {
        let (ids, status) = pairs.into_iter().map(|(id, s)| (id.into(), s)).unzip();
        Self { ids, status }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn statuses(&self) -> &[u8] {
        &self.status
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u8)> {
        self.ids.iter().map(String::as_str).zip(self.status.iter().copied())
    }

    pub fn positives(&self) -> usize {
        self.status.iter().filter(|&&s| s == 1).count()
    }

    /// Fraction of positive labels, `None` when empty.
    pub fn prevalence(&self) -> Option<f64> {
        if self.is_empty() {
            None
        } else {
            Some(self.positives() as f64 / self.len() as f64)
        }
    }

    /// Keep the first `n` labels.
    pub fn head(&self, n: usize) -> LabelSeries {
        let n = n.min(self.len());
        LabelSeries {
            ids: self.ids[..n].to_vec(),
            status: self.status[..n].to_vec(),
        }
    }
}
