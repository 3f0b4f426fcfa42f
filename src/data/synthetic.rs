//! Deterministic synthetic expression data for offline runs and tests.

use std::path::Path;

use anyhow::{Context, Result};
use ndarray::Array2;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::dataset::Dataset;
use super::model::{LabelSeries, NumericTable};

/// Shape of a generated dataset.
#[derive(Debug, Clone)]
pub struct SyntheticSpec {
    /// Labelled samples.
    pub samples: usize,
    /// How many labelled samples are mutated.
    pub positives: usize,
    /// Extra samples with expression data but no label.
    pub unlabeled: usize,
    pub features: usize,
    /// Leading features whose mean shifts with mutation status.
    pub informative: usize,
    /// Mean shift of informative features in mutated samples.
    pub effect: f64,
    pub seed: u64,
}

impl Default for SyntheticSpec {
    fn default() -> Self {
        Self {
            samples: 100,
            positives: 30,
            unlabeled: 0,
            features: 40,
            informative: 5,
            effect: 1.5,
            seed: 42,
        }
    }
}

/// Box-Muller draw from N(mean, std_dev).
fn gauss(rng: &mut impl Rng, mean: f64, std_dev: f64) -> f64 {
    let u1: f64 = rng.gen::<f64>().max(1e-15);
    let u2: f64 = rng.gen();
    let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
    mean + std_dev * z
}

/// Generate expression data and labels.
///
/// Samples are named `S0000`, `S0001`, ...; the labelled ones come first in
/// the table and the positive labels are shuffled among them.
pub fn generate(spec: &SyntheticSpec) -> Dataset {
    let mut rng = ChaCha8Rng::seed_from_u64(spec.seed);
    let total = spec.samples + spec.unlabeled;

    let mut status: Vec<u8> = (0..spec.samples)
        .map(|i| u8::from(i < spec.positives))
        .collect();
    status.shuffle(&mut rng);

    let index: Vec<String> = (0..total).map(|i| format!("S{i:04}")).collect();
    let columns: Vec<String> = (0..spec.features).map(|j| format!("gene_{j}")).collect();
    let mut values = Array2::<f64>::zeros((total, spec.features));
    for i in 0..total {
        let mutated = status.get(i).copied() == Some(1);
        for j in 0..spec.features {
            // Per-gene baseline so features differ in scale.
            let base = (j % 7) as f64;
            let shift = if mutated && j < spec.informative {
                spec.effect
            } else {
                0.0
            };
            values[[i, j]] = gauss(&mut rng, base + shift, 1.0);
        }
    }

    let labels = LabelSeries::from_pairs(index.iter().cloned().zip(status));
    Dataset {
        features: NumericTable {
            index,
            columns,
            values,
        },
        labels,
    }
}

/// Write a numeric table as a TSV with a `sample_id` index column.
pub fn write_tsv(path: &Path, table: &NumericTable) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    let mut header = vec!["sample_id".to_string()];
    header.extend(table.columns.iter().cloned());
    writer.write_record(&header)?;
    for (i, id) in table.index.iter().enumerate() {
        let mut record = vec![id.clone()];
        record.extend(table.values.row(i).iter().map(|v| format!("{v:.6}")));
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write labels in the records form of the mutation-label feed.
pub fn write_labels_json(path: &Path, labels: &LabelSeries) -> Result<()> {
    let records: Vec<serde_json::Value> = labels
        .iter()
        .map(|(id, status)| serde_json::json!({"sample_id": id, "mutation_status": status}))
        .collect();
    let text = serde_json::to_string_pretty(&records)?;
    std::fs::write(path, text).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}
