use serde::Deserialize;
use serde_json::Value as JsonValue;

use super::model::LabelSeries;
use super::remote::Remote;
use crate::error::DataError;

#[derive(Debug, Deserialize)]
struct LabelRecord {
    sample_id: String,
    mutation_status: f64,
}

/// The two shapes the mutation feed comes in.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LabelFeed {
    /// `[{"sample_id": "...", "mutation_status": 0}, ...]`
    Records(Vec<LabelRecord>),
    /// `{"sample_id": [...], "mutation_status": [...], ...}`
    Columns {
        sample_id: Vec<String>,
        mutation_status: Vec<f64>,
    },
}

/// Parse a mutation-label document into a [`LabelSeries`].
pub fn parse_mutation_labels(doc: JsonValue) -> Result<LabelSeries, DataError> {
    let feed: LabelFeed = serde_json::from_value(doc)
        .map_err(|e| DataError::Parse(anyhow::anyhow!("mutation label feed: {e}")))?;
    let pairs: Vec<(String, f64)> = match feed {
        LabelFeed::Records(records) => records
            .into_iter()
            .map(|r| (r.sample_id, r.mutation_status))
            .collect(),
        LabelFeed::Columns {
            sample_id,
            mutation_status,
        } => {
            if sample_id.len() != mutation_status.len() {
                return Err(DataError::Parse(anyhow::anyhow!(
                    "mutation label feed has {} sample ids but {} statuses",
                    sample_id.len(),
                    mutation_status.len()
                )));
            }
            sample_id.into_iter().zip(mutation_status).collect()
        }
    };

    let mut labels = Vec::with_capacity(pairs.len());
    for (sample_id, value) in pairs {
        labels.push((sample_id.clone(), to_status(&sample_id, value)?));
    }
    Ok(LabelSeries::from_pairs(labels))
}

/// Convert a 0/1 float cell to a status.
pub(crate) fn to_status(sample_id: &str, value: f64) -> Result<u8, DataError> {
    if value == 0.0 {
        Ok(0)
    } else if value == 1.0 {
        Ok(1)
    } else {
        Err(DataError::InvalidLabel {
            sample_id: sample_id.to_string(),
            value,
        })
    }
}

/// Fetch and parse the mutation-label feed.
pub fn fetch_mutation_labels(remote: &dyn Remote, url: &str) -> Result<LabelSeries, DataError> {
    parse_mutation_labels(remote.get_json(url)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::remote::fake::FakeRemote;
    use serde_json::json;

    #[test]
    fn parses_record_feed() {
        let labels = parse_mutation_labels(json!([
            {"sample_id": "TCGA-01", "mutation_status": 1},
            {"sample_id": "TCGA-02", "mutation_status": 0},
        ]))
        .unwrap();
        assert_eq!(labels.ids(), ["TCGA-01", "TCGA-02"]);
        assert_eq!(labels.statuses(), [1, 0]);
    }

    #[test]
    fn parses_column_feed_with_extra_fields() {
        let remote = FakeRemote {
            json: [(
                "https://feed".to_string(),
                json!({
                    "mutation_status": [0, 0, 1],
                    "sample_id": ["a", "b", "c"],
                    "data_version": 4,
                }),
            )]
            .into_iter()
            .collect(),
            ..Default::default()
        };
        let labels = fetch_mutation_labels(&remote, "https://feed").unwrap();
        assert_eq!(labels.len(), 3);
        assert_eq!(labels.positives(), 1);
    }

    #[test]
    fn rejects_non_binary_status() {
        let err = parse_mutation_labels(json!([{"sample_id": "x", "mutation_status": 2}]))
            .unwrap_err();
        assert!(matches!(err, DataError::InvalidLabel { value, .. } if value == 2.0));
    }

    #[test]
    fn rejects_ragged_columns() {
        assert!(parse_mutation_labels(json!({"sample_id": ["a"], "mutation_status": []})).is_err());
    }
}
