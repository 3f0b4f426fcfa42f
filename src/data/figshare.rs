use std::collections::BTreeMap;
use std::path::{Component, Path};

use log::info;
use serde::Deserialize;
use serde_json::Value as JsonValue;

use super::files::{create_dir, write_atomic};
use super::remote::Remote;
use crate::error::DataError;

/// Expand the versions endpoint template for an article.
pub fn versions_url(template: &str, article_id: u64) -> String {
    template.replacen("{}", &article_id.to_string(), 1)
}

#[derive(Debug, Deserialize)]
struct VersionEntry {
    version: u32,
    url: String,
}

/// Parse the versions listing `[{"version": 1, "url": "..."}, ...]`.
pub fn parse_article_versions(listing: JsonValue) -> Result<BTreeMap<u32, String>, DataError> {
    let entries: Vec<VersionEntry> = serde_json::from_value(listing)
        .map_err(|e| DataError::Parse(anyhow::anyhow!("figshare versions listing: {e}")))?;
    Ok(entries.into_iter().map(|e| (e.version, e.url)).collect())
}

/// Map each published version of an article to its API URL.
pub fn get_article_versions(
    remote: &dyn Remote,
    template: &str,
    article_id: u64,
) -> Result<BTreeMap<u32, String>, DataError> {
    let url = versions_url(template, article_id);
    parse_article_versions(remote.get_json(&url)?)
}

/// Pick the requested version, or the latest one when none is requested.
pub fn resolve_version(
    versions: &BTreeMap<u32, String>,
    requested: Option<u32>,
) -> Result<u32, DataError> {
    match requested {
        Some(v) if versions.contains_key(&v) => Ok(v),
        Some(v) => Err(DataError::UnknownVersion(v)),
        None => versions.keys().next_back().copied().ok_or(DataError::NoVersions),
    }
}

// ---------------------------------------------------------------------------
// Article manifest
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ArticleFile {
    pub name: String,
    pub download_url: String,
}

/// A version's manifest: the file list plus the raw document for `info.json`.
#[derive(Debug, Clone)]
pub struct Article {
    pub files: Vec<ArticleFile>,
    pub raw: JsonValue,
}

#[derive(Deserialize)]
struct ArticleFiles {
    files: Vec<ArticleFile>,
}

pub fn fetch_article(remote: &dyn Remote, version_url: &str) -> Result<Article, DataError> {
    let raw = remote.get_json(version_url)?;
    let ArticleFiles { files } = serde_json::from_value(raw.clone())
        .map_err(|e| DataError::Parse(anyhow::anyhow!("figshare manifest {version_url}: {e}")))?;
    Ok(Article { files, raw })
}

/// A manifest name must be a single normal path component.
fn check_file_name(name: &str) -> Result<(), DataError> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) if name != "info.json" => Ok(()),
        _ => Err(DataError::UnsafeFileName(name.to_string())),
    }
}

/// Download every file of `article` into `download_path`.
///
/// Files already present are skipped. Each name in `required` must be listed
/// in the manifest, and every listed name must be a bare file name. Nothing
/// is written when a check fails. `info.json` is rewritten on every call.
pub fn download_files(
    remote: &dyn Remote,
    article: &Article,
    download_path: &Path,
    required: &[&str],
) -> Result<(), DataError> {
    for name in required {
        if !article.files.iter().any(|f| f.name == *name) {
            return Err(DataError::MissingRemoteFile(name.to_string()));
        }
    }
    for file in &article.files {
        check_file_name(&file.name)?;
    }

    create_dir(download_path)?;

    let info_path = download_path.join("info.json");
    write_atomic(&info_path, |out| {
        serde_json::to_writer_pretty(&mut *out, &article.raw)
            .map_err(|e| DataError::Parse(e.into()))
    })?;

    for file in &article.files {
        let path = download_path.join(&file.name);
        if path.exists() {
            info!("{} already exists, checking next file", path.display());
            continue;
        }
        info!("Downloading {} to `{}`", file.download_url, file.name);
        let mut bytes = 0;
        write_atomic(&path, |out| {
            bytes = remote.download(&file.download_url, out)?;
            Ok(())
        })?;
        info!("Wrote {bytes} bytes to {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::remote::fake::FakeRemote;
    use regex::Regex;
    use serde_json::json;
    use std::fs;
    use tempfile::tempdir;

    const VERSIONS: &str = "https://api.figshare.com/v2/articles/3487685/versions";

    fn remote_with_versions() -> FakeRemote {
        let mut remote = FakeRemote::default();
        remote.json.insert(
            VERSIONS.into(),
            json!([
                {"version": 1, "url": format!("{VERSIONS}/1")},
                {"version": 4, "url": format!("{VERSIONS}/4")},
                {"version": 2, "url": format!("{VERSIONS}/2")},
            ]),
        );
        remote
    }

    fn article() -> Article {
        let raw = json!({
            "title": "Cognoma data",
            "files": [
                {"name": "covariates.tsv", "download_url": "https://files/1"},
                {"name": "expression-matrix.tsv", "download_url": "https://files/2"},
            ]
        });
        Article {
            files: serde_json::from_value::<ArticleFiles>(raw.clone()).unwrap().files,
            raw,
        }
    }

    #[test]
    fn version_urls_match_api_pattern() {
        let pattern = Regex::new(r"^https://api.figshare.com/v2/articles/([0-9]*)/versions/([0-9]*)$")
            .unwrap();
        let remote = remote_with_versions();
        let versions =
            get_article_versions(&remote, crate::config::DEFAULT_FIGSHARE_URL, 3487685).unwrap();
        assert_eq!(versions.len(), 3);
        for url in versions.values() {
            assert!(pattern.is_match(url), "{url}");
        }
    }

    #[test]
    fn resolves_latest_and_rejects_unknown() {
        let versions = parse_article_versions(remote_with_versions().json[VERSIONS].clone()).unwrap();
        assert_eq!(resolve_version(&versions, None).unwrap(), 4);
        assert_eq!(resolve_version(&versions, Some(2)).unwrap(), 2);
        assert!(matches!(
            resolve_version(&versions, Some(3)),
            Err(DataError::UnknownVersion(3))
        ));
        assert!(matches!(
            resolve_version(&BTreeMap::new(), None),
            Err(DataError::NoVersions)
        ));
    }

    #[test]
    fn unreachable_listing_is_an_error() {
        let remote = FakeRemote::default();
        let err = get_article_versions(&remote, crate::config::DEFAULT_FIGSHARE_URL, 1).unwrap_err();
        assert!(matches!(err, DataError::Remote { .. }));
    }

    #[test]
    fn downloads_missing_files_and_skips_present_ones() {
        let dir = tempdir().unwrap();
        let download_path = dir.path().join("v4");
        let mut remote = FakeRemote::default();
        remote.files.insert("https://files/1".into(), b"sample_id\tage\n".to_vec());
        remote.files.insert("https://files/2".into(), b"sample_id\tg1\n".to_vec());

        fs::create_dir(&download_path).unwrap();
        fs::write(download_path.join("covariates.tsv"), "already here").unwrap();

        download_files(&remote, &article(), &download_path, &["expression-matrix.tsv"]).unwrap();

        assert_eq!(*remote.downloads.borrow(), vec!["https://files/2".to_string()]);
        assert_eq!(
            fs::read_to_string(download_path.join("covariates.tsv")).unwrap(),
            "already here"
        );
        assert_eq!(
            fs::read_to_string(download_path.join("expression-matrix.tsv")).unwrap(),
            "sample_id\tg1\n"
        );
        let info: JsonValue =
            serde_json::from_str(&fs::read_to_string(download_path.join("info.json")).unwrap())
                .unwrap();
        assert_eq!(info["title"], "Cognoma data");

        let leftovers = fs::read_dir(&download_path)
            .unwrap()
            .filter(|e| e.as_ref().unwrap().file_name().to_string_lossy().ends_with(".part"))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn failed_download_leaves_no_file() {
        let dir = tempdir().unwrap();
        let download_path = dir.path().join("v4");
        let remote = FakeRemote::default();

        let err = download_files(&remote, &article(), &download_path, &[]).unwrap_err();
        assert!(matches!(err, DataError::Remote { .. }));
        assert!(!download_path.join("covariates.tsv").exists());
        assert!(!download_path.join(".covariates.tsv.part").exists());
    }

    #[test]
    fn names_escaping_the_download_directory_are_rejected() {
        let dir = tempdir().unwrap();
        let download_path = dir.path().join("a").join("v4");
        for name in ["../../escaped.txt", "/tmp/escaped.txt", "sub/escaped.txt", "..", "info.json"] {
            let raw = json!({"files": [
                {"name": "covariates.tsv", "download_url": "https://files/1"},
                {"name": name, "download_url": "https://files/evil"},
            ]});
            let article = Article {
                files: serde_json::from_value::<ArticleFiles>(raw.clone()).unwrap().files,
                raw,
            };
            let mut remote = FakeRemote::default();
            remote.files.insert("https://files/1".into(), b"ok".to_vec());
            remote.files.insert("https://files/evil".into(), b"pwned".to_vec());

            let err = download_files(&remote, &article, &download_path, &[]).unwrap_err();
            assert!(matches!(&err, DataError::UnsafeFileName(n) if n == name), "{err}");
            assert!(remote.downloads.borrow().is_empty());
        }
        assert!(!download_path.exists());
        assert!(!dir.path().join("escaped.txt").exists());
        assert!(check_file_name("expression-matrix.tsv.bz2").is_ok());
    }

    #[test]
    fn missing_required_file_is_reported() {
        let dir = tempdir().unwrap();
        let remote = FakeRemote::default();
        let err = download_files(&remote, &article(), dir.path(), &["mutation-matrix.tsv.bz2"])
            .unwrap_err();
        assert!(matches!(err, DataError::MissingRemoteFile(name) if name == "mutation-matrix.tsv.bz2"));
    }
}
