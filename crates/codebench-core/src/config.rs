use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the configuration file looked up in the dataset root and its ancestors.
pub const CONFIG_FILE_NAME: &str = ".codebench.toml";

/// Top-level configuration from `.codebench.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub extract: ExtractConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub dataset: DatasetConfig,
}

/// Which record categories an extraction run produces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractConfig {
    #[serde(default = "default_true")]
    pub executions: bool,
    #[serde(default = "default_true")]
    pub solutions: bool,
    #[serde(default)]
    pub logins: bool,
    #[serde(default)]
    pub grades: bool,
    /// Course and semester records (`courses.csv`, `semesters.csv`).
    #[serde(default)]
    pub courses: bool,
    #[serde(default)]
    pub assignments: bool,
    /// Enrolment questionnaires (`users.csv`).
    #[serde(default)]
    pub users: bool,
    /// Editor event logs.
    #[serde(default)]
    pub codemirror: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            executions: true,
            solutions: true,
            logins: false,
            grades: false,
            courses: false,
            assignments: false,
            users: false,
            codemirror: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("csv")
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Also compute code metrics for attempts that ended in an error.
    #[serde(default)]
    pub on_error: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Worker threads; 0 means one per CPU.
    #[serde(default)]
    pub jobs: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Globs matched against dataset-relative paths; matching files are skipped.
    #[serde(default = "default_exclude_patterns")]
    pub exclude_patterns: Vec<String>,
}

fn default_exclude_patterns() -> Vec<String> {
    vec!["**/grades/final_grade*".to_string()]
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            exclude_patterns: default_exclude_patterns(),
        }
    }
}

impl Config {
    /// Load configuration from a `.codebench.toml` file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file '{}'", path.display()))?;
        let config: Config = toml::from_str(&content).with_context(|| {
            format!(
                "failed to parse '{}'. Run `codebench init` to create a valid config file",
                path.display()
            )
        })?;
        Ok(config)
    }

    /// Load from `.codebench.toml` in the given directory or any ancestor, or return defaults.
    pub fn load_or_default(dir: &Path) -> Self {
        match find_config_file(dir) {
            Some(config_path) => match Self::load(&config_path) {
                Ok(config) => {
                    tracing::debug!(path = %config_path.display(), "loaded config");
                    config
                }
                Err(e) => {
                    tracing::warn!(
                        path = %config_path.display(),
                        "failed to load config: {e:#}. Using defaults."
                    );
                    Self::default()
                }
            },
            None => Self::default(),
        }
    }

    /// Generate default TOML content for `codebench init`.
    pub fn default_toml() -> String {
        r#"# codebench - grading-platform log extraction

[extract]
# Record categories to produce (one CSV file each)
executions = true
solutions = true
logins = false
grades = false
courses = false
assignments = false
users = false
codemirror = false

[output]
dir = "csv"

[metrics]
# Also compute code metrics for attempts whose log carries an ERROR section
on_error = false

[runtime]
# Worker threads, 0 = one per CPU
jobs = 0

[dataset]
# Globs matched against paths relative to the dataset root
exclude_patterns = ["**/grades/final_grade*"]
"#
        .to_string()
    }
}

/// Walk up from `dir` looking for `.codebench.toml` (similar to how git finds .git).
pub fn find_config_file(dir: &Path) -> Option<PathBuf> {
    let start = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());
    start
        .ancestors()
        .map(|ancestor| ancestor.join(CONFIG_FILE_NAME))
        .find(|candidate| candidate.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.extract.executions);
        assert!(config.extract.solutions);
        assert!(!config.extract.logins);
        assert!(!config.extract.grades);
        assert!(!config.extract.courses);
        assert!(!config.extract.assignments);
        assert!(!config.extract.users);
        assert!(!config.extract.codemirror);
        assert_eq!(config.output.dir, PathBuf::from("csv"));
        assert!(!config.metrics.on_error);
        assert_eq!(config.runtime.jobs, 0);
        assert_eq!(config.dataset.exclude_patterns, vec!["**/grades/final_grade*"]);
    }

    #[test]
    fn test_deserialize_partial_config() {
        let toml_str = r#"
[extract]
logins = true
codemirror = true

[metrics]
on_error = true
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert!(config.extract.logins);
        assert!(config.extract.codemirror);
        assert!(config.extract.executions, "unset fields keep defaults");
        assert!(!config.extract.users);
        assert!(config.metrics.on_error);
        assert_eq!(config.output.dir, PathBuf::from("csv"));
        assert_eq!(config.dataset.exclude_patterns.len(), 1);
    }

    #[test]
    fn test_default_toml_is_valid() {
        let config: Config = toml::from_str(&Config::default_toml()).unwrap();
        let defaults = Config::default();
        assert_eq!(config.extract.executions, defaults.extract.executions);
        assert_eq!(config.extract.grades, defaults.extract.grades);
        assert_eq!(config.extract.courses, defaults.extract.courses);
        assert_eq!(config.extract.codemirror, defaults.extract.codemirror);
        assert_eq!(config.output.dir, defaults.output.dir);
        assert_eq!(config.runtime.jobs, defaults.runtime.jobs);
        assert_eq!(
            config.dataset.exclude_patterns,
            defaults.dataset.exclude_patterns
        );
    }

    #[test]
    fn test_load_or_default_walks_up() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join(CONFIG_FILE_NAME),
            "[output]\ndir = \"out\"\n",
        )
        .unwrap();
        let nested = tmp.path().join("2019-1").join("cs1");
        std::fs::create_dir_all(&nested).unwrap();

        let config = Config::load_or_default(&nested);
        assert_eq!(config.output.dir, PathBuf::from("out"));
    }

    #[test]
    fn test_invalid_config_falls_back_to_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[runtime]\njobs = \"many\"\n").unwrap();

        assert!(Config::load(&path).is_err());
        let config = Config::load_or_default(tmp.path());
        assert_eq!(config.runtime.jobs, 0);
    }
}
