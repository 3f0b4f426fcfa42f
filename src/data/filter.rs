use std::collections::HashSet;

use log::{info, warn};

use super::labels::to_status;
use super::model::{LabelSeries, NumericTable};
use crate::error::DataError;

/// Expression rows aligned with the labels that matched them.
#[derive(Debug, Clone)]
pub struct FilterOutcome {
    /// Rows of the expression table whose id is labelled, in label order.
    pub table: NumericTable,
    /// Labels aligned row-for-row with `table`.
    pub labels: LabelSeries,
    /// Label ids with no expression row.
    pub unmatched: Vec<String>,
    /// Repeated label ids that were collapsed onto their first occurrence.
    pub duplicates: usize,
}

/// Keep the expression rows whose sample id appears in `labels`.
///
/// The result index is exactly the intersection of both id sets. Rows are
/// never fabricated: labelled ids missing from the table are returned in
/// `unmatched` and logged. A repeated label id keeps its first status.
pub fn filter_by_labels(table: &NumericTable, labels: &LabelSeries) -> FilterOutcome {
    let positions = table.index_map();
    let mut seen = HashSet::with_capacity(labels.len());
    let mut rows = Vec::with_capacity(labels.len());
    let mut kept = Vec::with_capacity(labels.len());
    let mut unmatched = Vec::new();
    let mut duplicates = 0;

    for (id, status) in labels.iter() {
        if !seen.insert(id) {
            duplicates += 1;
            continue;
        }
        match positions.get(id) {
            Some(&row) => {
                rows.push(row);
                kept.push((id.to_string(), status));
            }
            None => unmatched.push(id.to_string()),
        }
    }

    if !unmatched.is_empty() {
        warn!(
            "{} labelled samples have no expression data and were dropped",
            unmatched.len()
        );
    }
    if duplicates > 0 {
        warn!("{duplicates} duplicate sample ids in the labels were ignored");
    }
    info!(
        "Filtered expression table to {} of {} samples",
        rows.len(),
        table.n_rows()
    );

    FilterOutcome {
        table: table.select_rows(&rows),
        labels: LabelSeries::from_pairs(kept),
        unmatched,
        duplicates,
    }
}

/// Use one column of the sample × gene mutation matrix as labels.
pub fn filter_data_by_mutation(
    mutation: &str,
    mutations: &NumericTable,
) -> Result<LabelSeries, DataError> {
    info!("Filtering to mutation {mutation}");
    let column = mutations
        .column(mutation)
        .ok_or_else(|| DataError::UnknownMutation(mutation.to_string()))?;
    let mut pairs = Vec::with_capacity(column.len());
    for (id, &value) in mutations.index.iter().zip(column.iter()) {
        pairs.push((id.clone(), to_status(id, value)?));
    }
    Ok(LabelSeries::from_pairs(pairs))
}
