use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum BenchError {
    #[error("Failed to read config file {path}: {source}")]
    ConfigReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {detail}")]
    ConfigParseError { path: PathBuf, detail: String },

    #[error("No workloads configured. Pass them on the command line or list them in the config file")]
    NoWorkloads,

    #[error("Repetition count must be at least 1")]
    NoRepetitions,

    #[error("Failed to launch {executable}: {source}")]
    LaunchError {
        executable: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to wait for child process: {source}")]
    WaitError { source: std::io::Error },

    #[error("Failed to install interrupt handler: {detail}")]
    SignalError { detail: String },

    #[error("Failed to read log file {path}: {source}")]
    LogReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Malformed log record on line {line}: {detail}")]
    MalformedRecord { line: usize, detail: String },
}
