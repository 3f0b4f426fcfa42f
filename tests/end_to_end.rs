use std::collections::HashMap;
use std::io::Write;

use bzip2::write::BzEncoder;
use bzip2::Compression;
use serde_json::{json, Value as JsonValue};
use tempfile::tempdir;

use cognoml::classify;
use cognoml::config::{ClassifierConfig, Config};
use cognoml::data::dataset::{CognomlData, Dataset, LabelSource};
use cognoml::data::remote::Remote;
use cognoml::data::synthetic::{generate, write_labels_json, write_tsv, SyntheticSpec};
use cognoml::error::DataError;
use cognoml::learn::GridSearch;
use cognoml::report::UNKNOWN;

const VERSIONS: &str = "https://api.figshare.com/v2/articles/3487685/versions";
const FEED: &str = "https://labels.test/mutations.json";

/// Serves canned JSON documents and file bodies by URL.
#[derive(Default)]
struct CannedRemote {
    json: HashMap<String, JsonValue>,
    files: HashMap<String, Vec<u8>>,
}

impl Remote for CannedRemote {
    fn get_json(&self, url: &str) -> Result<JsonValue, DataError> {
        self.json.get(url).cloned().ok_or_else(|| DataError::Remote {
            url: url.to_string(),
            message: "404".into(),
        })
    }

    fn download(&self, url: &str, sink: &mut dyn Write) -> Result<u64, DataError> {
        let body = self.files.get(url).ok_or_else(|| DataError::Remote {
            url: url.to_string(),
            message: "404".into(),
        })?;
        sink.write_all(body).map_err(|e| DataError::Remote {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        Ok(body.len() as u64)
    }
}

fn bz2(text: &str) -> Vec<u8> {
    let mut encoder = BzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(text.as_bytes()).unwrap();
    encoder.finish().unwrap()
}

/// A figshare article whose expression matrix holds 100 labelled samples
/// (30 mutated) and 10 unlabelled ones.
fn synthetic_remote() -> CannedRemote {
    let dataset = generate(&SyntheticSpec {
        unlabeled: 10,
        ..SyntheticSpec::default()
    });
    let table = &dataset.features;
    let mut tsv = format!("sample_id\t{}\n", table.columns.join("\t"));
    for (i, id) in table.index.iter().enumerate() {
        let row: Vec<String> = table.values.row(i).iter().map(|v| v.to_string()).collect();
        tsv.push_str(&format!("{id}\t{}\n", row.join("\t")));
    }
    let feed: Vec<JsonValue> = dataset
        .labels
        .iter()
        .map(|(id, status)| json!({"sample_id": id, "mutation_status": status}))
        .collect();

    let mut remote = CannedRemote::default();
    remote.json.insert(
        VERSIONS.into(),
        json!([
            {"version": 6, "url": format!("{VERSIONS}/6")},
            {"version": 7, "url": format!("{VERSIONS}/7")},
        ]),
    );
    remote.json.insert(
        format!("{VERSIONS}/7"),
        json!({"files": [
            {"name": "expression-matrix.tsv.bz2", "download_url": "https://files.test/expr"},
            {"name": "mutation-matrix.tsv.bz2", "download_url": "https://files.test/mut"},
            {"name": "covariates.tsv", "download_url": "https://files.test/cov"},
        ]}),
    );
    remote.json.insert(FEED.into(), JsonValue::Array(feed));
    remote.files.insert("https://files.test/expr".into(), bz2(&tsv));
    remote.files.insert(
        "https://files.test/mut".into(),
        bz2("sample_id\t7157\nS0000\t1\nS0001\t0\n"),
    );
    remote.files.insert(
        "https://files.test/cov".into(),
        b"sample_id\tage\nS0000\t61\n".to_vec(),
    );
    remote
}

fn small_grid() -> ClassifierConfig {
    ClassifierConfig {
        n_features: 20,
        alphas: vec![0.01, 0.1],
        l1_ratios: vec![0.15, 0.5],
        max_iter: 200,
        ..ClassifierConfig::default()
    }
}

#[test]
fn classifies_the_latest_version_from_the_label_feed() {
    let dir = tempdir().unwrap();
    let config = Config {
        directory: dir.path().join("download"),
        mutations_json_url: FEED.into(),
        classifier: small_grid(),
        ..Config::default()
    };
    let settings = config.classifier.clone();
    let labels = LabelSource::from_config(&config);
    let data = CognomlData::new(synthetic_remote(), config).unwrap();
    assert_eq!(data.version(), 7);

    let dataset = data.run(&labels).unwrap();
    assert_eq!(dataset.features.n_rows(), 110);
    assert_eq!(dataset.labels.len(), 100);
    assert!(data.download_path().join("expression.parquet").exists());

    let mut search = GridSearch::from_config(&settings);
    let report = classify(
        &dataset.features,
        &dataset.labels,
        &mut search,
        settings.test_size,
        settings.seed,
    )
    .unwrap();

    let d = &report.dimensions;
    assert_eq!(d.positives, 30);
    assert_eq!(d.negatives, 70);
    assert_eq!(d.training_observations + d.testing_observations, 100);
    assert_eq!(d.testing_observations, 10);
    assert_eq!(d.observations_selected, 100);
    assert_eq!(d.observations_unselected, 10);
    assert_eq!(d.features, 40);
    assert_eq!(d.labels_unmatched, 0);
    assert_eq!(report.performance.testing.class.n_positives, 3);

    let cv = report.performance.cv.auroc.unwrap();
    assert!((0.0..=1.0).contains(&cv));
    assert!(cv > 0.6, "cv auroc {cv}");
    assert_eq!(report.grid_search.cv_scores.len(), 4);
    assert_eq!(report.model.as_ref().unwrap().features.len(), 20);

    let ids: Vec<&str> = report.observations.iter().map(|o| o.sample_id.as_str()).collect();
    let mut sorted = ids.clone();
    sorted.sort_unstable();
    assert_eq!(ids, sorted);
    for unlabeled in report.observations.iter().filter(|o| o.selected == 0) {
        assert_eq!(unlabeled.status, UNKNOWN);
        assert_eq!(unlabeled.testing, UNKNOWN);
        assert!(unlabeled.predicted_score.is_some());
    }
}

#[test]
fn report_json_has_the_documented_sections() {
    let dir = tempdir().unwrap();
    let config = Config {
        directory: dir.path().join("download"),
        mutations_json_url: FEED.into(),
        version: Some(7),
        ..Config::default()
    };
    let labels = LabelSource::from_config(&config);
    let data = CognomlData::new(synthetic_remote(), config).unwrap();
    let dataset = data.run(&labels).unwrap();

    let mut search = GridSearch::from_config(&small_grid());
    let report = classify(&dataset.features, &dataset.labels, &mut search, 0.1, 0).unwrap();
    let json: JsonValue = serde_json::from_str(&report.to_json_pretty().unwrap()).unwrap();

    let dimensions = json["dimensions"].as_object().unwrap();
    for key in [
        "observations_selected",
        "observations_unselected",
        "features",
        "positives",
        "negatives",
        "positive_prevalence",
        "training_observations",
        "testing_observations",
        "labels_unmatched",
        "labels_duplicated",
    ] {
        assert!(dimensions.contains_key(key), "missing dimensions.{key}");
    }
    assert_eq!(json["dimensions"]["positive_prevalence"], json!(0.3));
    for part in ["training", "testing"] {
        let metrics = &json["performance"][part];
        for key in ["accuracy", "precision", "recall", "f1", "auroc", "auprc"] {
            assert!(metrics.get(key).is_some(), "missing {part}.{key}");
        }
        // the infinite first ROC threshold is not valid JSON
        assert!(metrics["roc_curve"]["threshold"][0].is_null());
    }
    let first = &json["grid_search"]["cv_scores"][0];
    assert!(first["alpha"].is_number());
    assert!(first["rank_test_score"].is_number());
    assert_eq!(json["model"]["class"], "LogisticRegression");
    assert_eq!(json["observations"].as_array().unwrap().len(), 110);
}

#[test]
fn generated_files_with_a_gap_classify_offline() {
    let dir = tempdir().unwrap();
    let generated = generate(&SyntheticSpec {
        unlabeled: 10,
        ..SyntheticSpec::default()
    });
    let expression = dir.path().join("expression-matrix.tsv");
    let labels = dir.path().join("mutation-labels.json");
    write_tsv(&expression, &generated.features).unwrap();
    write_labels_json(&labels, &generated.labels).unwrap();

    // blank the first gene of the first sample
    let text = std::fs::read_to_string(&expression).unwrap();
    let mut lines: Vec<String> = text.lines().map(str::to_string).collect();
    let mut cells: Vec<&str> = lines[1].split('\t').collect();
    cells[1] = "NA";
    lines[1] = cells.join("\t");
    std::fs::write(&expression, lines.join("\n") + "\n").unwrap();

    let dataset = Dataset::from_files(&expression, &labels, None).unwrap();
    assert!(dataset.features.values.iter().all(|v| v.is_finite()));

    let settings = small_grid();
    let mut search = GridSearch::from_config(&settings);
    let report = classify(
        &dataset.features,
        &dataset.labels,
        &mut search,
        settings.test_size,
        settings.seed,
    )
    .unwrap();
    assert!(report.fit_error.is_none());
    assert!(report.grid_search.cv_scores.iter().all(|c| c.mean_test_score.is_some()));
    assert!(report.performance.cv.auroc.unwrap() > 0.6);
    assert_eq!(report.observations.len(), 110);
}

#[test]
fn unknown_version_is_rejected() {
    let dir = tempdir().unwrap();
    let config = Config {
        directory: dir.path().to_path_buf(),
        version: Some(3),
        ..Config::default()
    };
    assert!(matches!(
        CognomlData::new(synthetic_remote(), config),
        Err(DataError::UnknownVersion(3))
    ));
}

#[test]
fn cached_tables_serve_a_fresh_instance() {
    let dir = tempdir().unwrap();
    let config = Config {
        directory: dir.path().join("download"),
        mutations_json_url: FEED.into(),
        ..Config::default()
    };
    let labels = LabelSource::from_config(&config);
    let data = CognomlData::new(synthetic_remote(), config.clone()).unwrap();
    data.download_files(&labels).unwrap();

    let again = CognomlData::new(synthetic_remote(), config).unwrap();
    let first = data.run(&labels).unwrap();
    let second = again.run(&labels).unwrap();
    assert_eq!(first.features, second.features);
}

#[test]
#[ignore = "talks to api.figshare.com"]
fn live_figshare_listing_resolves_a_version() {
    use cognoml::data::figshare::{get_article_versions, resolve_version};
    use cognoml::data::remote::HttpRemote;

    let config = Config::default();
    let remote = HttpRemote::new().unwrap();
    let versions = get_article_versions(&remote, &config.figshare_url, config.article_id).unwrap();
    let latest = resolve_version(&versions, None).unwrap();
    let url = regex::Regex::new(r"^https://api\.figshare\.com/v2/articles/(\d+)/versions/(\d+)$").unwrap();
    assert!(url.is_match(&versions[&latest]), "{}", versions[&latest]);
}
