use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::errors::BenchError;

const DEFAULT_EXECUTABLE: &str = "./plankton";
const DEFAULT_FLAG: &str = "-g";
const DEFAULT_TIMEOUT_SECS: u64 = 6 * 60 * 60;
const DEFAULT_GRACE_MS: u64 = 2000;

/// Harness settings, read from TOML and then overridden from the command line.
///
/// ```toml
/// executable = "./build/bin/plankton"
/// flag = "-g"
/// timeout_secs = 3600
/// repetitions = 3
/// workloads = ["examples/FineSet.pl", "examples/Harris.pl"]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HarnessConfig {
    pub executable: PathBuf,
    pub flag: String,
    pub timeout_secs: u64,
    pub grace_ms: u64,
    pub repetitions: u32,
    pub variant: Option<String>,
    pub workloads: Vec<String>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        HarnessConfig {
            executable: PathBuf::from(DEFAULT_EXECUTABLE),
            flag: DEFAULT_FLAG.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            grace_ms: DEFAULT_GRACE_MS,
            repetitions: 1,
            variant: None,
            workloads: Vec::new(),
        }
    }
}

/// Command-line values that win over the config file when present.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub executable: Option<PathBuf>,
    pub flag: Option<String>,
    pub timeout_secs: Option<u64>,
    pub grace_ms: Option<u64>,
    pub repetitions: Option<u32>,
    pub variant: Option<String>,
    pub workloads: Vec<String>,
}

impl HarnessConfig {
    /// `{config_dir}/gistbench/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("gistbench").join("config.toml"))
    }

    pub fn load(path: &Path) -> Result<HarnessConfig, BenchError> {
        let text = std::fs::read_to_string(path).map_err(|source| BenchError::ConfigReadError {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|e| BenchError::ConfigParseError {
            path: path.to_path_buf(),
            detail: e.message().to_string(),
        })
    }

    /// An explicit path must exist; the default location is optional.
    pub fn resolve(explicit: Option<&Path>) -> Result<HarnessConfig, BenchError> {
        if let Some(path) = explicit {
            return HarnessConfig::load(path);
        }
        match HarnessConfig::default_path() {
            Some(path) if path.is_file() => {
                tracing::debug!(path = %path.display(), "using default config");
                HarnessConfig::load(&path)
            }
            _ => Ok(HarnessConfig::default()),
        }
    }

    pub fn apply(&mut self, overrides: Overrides) {
        if let Some(executable) = overrides.executable {
            self.executable = executable;
        }
        if let Some(flag) = overrides.flag {
            self.flag = flag;
        }
        if let Some(timeout_secs) = overrides.timeout_secs {
            self.timeout_secs = timeout_secs;
        }
        if let Some(grace_ms) = overrides.grace_ms {
            self.grace_ms = grace_ms;
        }
        if let Some(repetitions) = overrides.repetitions {
            self.repetitions = repetitions;
        }
        if overrides.variant.is_some() {
            self.variant = overrides.variant;
        }
        if !overrides.workloads.is_empty() {
            self.workloads = overrides.workloads;
        }
    }

    pub fn validate(&self) -> Result<(), BenchError> {
        if self.workloads.is_empty() {
            return Err(BenchError::NoWorkloads);
        }
        if self.repetitions == 0 {
            return Err(BenchError::NoRepetitions);
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn grace(&self) -> Duration {
        Duration::from_millis(self.grace_ms)
    }

    /// Label for the per-variant views: explicit name, else the executable's file name.
    pub fn variant_name(&self) -> String {
        if let Some(ref variant) = self.variant {
            return variant.clone();
        }
        self.executable
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "default".to_string())
    }
}
