//! Loading configuration from several files and directories.

use std::path::Path;

use indexmap::IndexMap;
use snafu::ResultExt;

use crate::config::{ConfigPath, MetricsConfig, interpolate, is_yaml_file};
use crate::error::{ConfigError, ReadDirSnafu, ReadFileSnafu};

/// Configs whose components can be merged from multiple files.
///
/// Components are keyed; the same key appearing in two files is an error
/// rather than a silent override.
pub trait Mergeable: Sized + Default {
    type Key: Eq + std::hash::Hash + Clone + std::fmt::Display;
    type Component;

    fn components(&self) -> &IndexMap<Self::Key, Self::Component>;
    fn components_mut(&mut self) -> &mut IndexMap<Self::Key, Self::Component>;
    fn metrics(&self) -> &MetricsConfig;
    fn metrics_mut(&mut self) -> &mut MetricsConfig;
    fn parse_yaml(contents: &str) -> Result<Self, ConfigError>;

    fn merge(&mut self, mut other: Self) -> Result<(), ConfigError> {
        let duplicates: Vec<String> = other
            .components()
            .keys()
            .filter(|key| self.components().contains_key(*key))
            .map(|key| key.to_string())
            .collect();

        if !duplicates.is_empty() {
            return Err(ConfigError::DuplicateComponents { keys: duplicates });
        }

        for (key, component) in other.components_mut().drain(..) {
            self.components_mut().insert(key, component);
        }

        self.metrics_mut()
            .merge_from(std::mem::take(other.metrics_mut()));
        Ok(())
    }
}

/// Load and merge every configured path, reporting all failures at once.
pub fn load_from_paths<C: Mergeable>(paths: &[ConfigPath]) -> Result<C, ConfigError> {
    let mut config = C::default();
    let mut errors = Vec::new();

    for path in paths {
        let (display, loaded) = match path {
            ConfigPath::File(file_path) => (file_path.display(), load_file::<C>(file_path)),
            ConfigPath::Dir(dir_path) => (dir_path.display(), load_dir::<C>(dir_path)),
        };

        match loaded.and_then(|partial| config.merge(partial)) {
            Ok(()) => {}
            Err(e) => errors.push(format!("{display}: {e}")),
        }
    }

    if !errors.is_empty() {
        return Err(ConfigError::MultipleErrors { errors });
    }
    Ok(config)
}

fn load_file<C: Mergeable>(path: &Path) -> Result<C, ConfigError> {
    if !is_yaml_file(path) {
        return Err(ConfigError::UnsupportedFormat {
            path: path.to_path_buf(),
        });
    }

    let contents = std::fs::read_to_string(path).context(ReadFileSnafu)?;

    let result = interpolate(&contents);
    if !result.is_ok() {
        return Err(ConfigError::EnvInterpolation {
            message: result.errors.join("\n"),
        });
    }

    C::parse_yaml(&result.text)
}

fn load_dir<C: Mergeable>(dir: &Path) -> Result<C, ConfigError> {
    let mut files: Vec<_> = std::fs::read_dir(dir)
        .context(ReadDirSnafu { path: dir })?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_yaml_file(path))
        .collect();

    // Deterministic merge order regardless of directory iteration order.
    files.sort();

    let mut config = C::default();
    let mut errors = Vec::new();

    for path in files {
        if let Err(e) = load_file::<C>(&path).and_then(|partial| config.merge(partial)) {
            errors.push(format!("{}: {}", path.display(), e));
        }
    }

    if !errors.is_empty() {
        return Err(ConfigError::MultipleErrors { errors });
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use snafu::ResultExt;

    use crate::error::YamlParseSnafu;

    #[derive(Debug, Default, Deserialize)]
    struct TestConfig {
        #[serde(default)]
        jobs: IndexMap<String, u32>,
        #[serde(default)]
        metrics: MetricsConfig,
    }

    impl Mergeable for TestConfig {
        type Key = String;
        type Component = u32;

        fn components(&self) -> &IndexMap<String, u32> {
            &self.jobs
        }
        fn components_mut(&mut self) -> &mut IndexMap<String, u32> {
            &mut self.jobs
        }
        fn metrics(&self) -> &MetricsConfig {
            &self.metrics
        }
        fn metrics_mut(&mut self) -> &mut MetricsConfig {
            &mut self.metrics
        }
        fn parse_yaml(contents: &str) -> Result<Self, ConfigError> {
            serde_yaml::from_str(contents).context(YamlParseSnafu)
        }
    }

    fn write(dir: &Path, name: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_merges_files_and_directories() {
        let dir = tempfile::tempdir().unwrap();
        let file = write(dir.path(), "a.yaml", "jobs:\n  first: 1\n");

        let sub = dir.path().join("more");
        std::fs::create_dir(&sub).unwrap();
        write(&sub, "b.yml", "jobs:\n  second: 2\n");
        write(&sub, "c.yaml", "jobs:\n  third: 3\n");
        write(&sub, "notes.txt", "ignored");

        let config: TestConfig =
            load_from_paths(&[ConfigPath::file(file), ConfigPath::dir(&sub)]).unwrap();

        let keys: Vec<_> = config.jobs.keys().cloned().collect();
        assert_eq!(keys, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_duplicate_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(dir.path(), "a.yaml", "jobs:\n  same: 1\n");
        let b = write(dir.path(), "b.yaml", "jobs:\n  same: 2\n");

        let err = load_from_paths::<TestConfig>(&[ConfigPath::file(a), ConfigPath::file(b)])
            .unwrap_err();
        assert!(err.to_string().contains("Duplicate job keys: same"));
    }

    #[test]
    fn test_non_yaml_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let toml = write(dir.path(), "config.toml", "jobs = {}");

        let err = load_from_paths::<TestConfig>(&[ConfigPath::file(toml)]).unwrap_err();
        assert!(err.to_string().contains("only .yaml/.yml supported"));
    }
}
