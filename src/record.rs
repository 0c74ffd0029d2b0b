use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::errors::BenchError;

/// One measured sub-event from the tool's flat evaluation log.
///
/// Line shape: `method,footprint,time_ns,workload,repetition[,ignored tail]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub method: String,
    pub footprint: u64,
    pub time_ns: u64,
    pub workload: String,
    pub repetition: u32,
}

impl LogRecord {
    pub fn decode(line: &str, line_no: usize) -> Result<LogRecord, BenchError> {
        let fields: Vec<&str> = line.trim_end().splitn(6, ',').collect();
        if fields.len() < 5 {
            return Err(BenchError::MalformedRecord {
                line: line_no,
                detail: format!("expected at least 5 fields, found {}", fields.len()),
            });
        }

        let footprint = parse_field(fields[1], "footprint", line_no)?;
        let time_ns = parse_field(fields[2], "time", line_no)?;
        let repetition = parse_field(fields[4], "repetition", line_no)?;

        Ok(LogRecord {
            method: fields[0].trim().to_string(),
            footprint,
            time_ns,
            workload: fields[3].trim().to_string(),
            repetition,
        })
    }
}

fn parse_field<T: std::str::FromStr>(raw: &str, name: &str, line_no: usize) -> Result<T, BenchError> {
    raw.trim().parse().map_err(|_| BenchError::MalformedRecord {
        line: line_no,
        detail: format!("{} field {:?} is not a non-negative integer", name, raw),
    })
}

/// Stream every record in `reader` to `visit`, one line at a time.
///
/// Blank lines are skipped. The first malformed row stops the pass. Returns
/// the number of records visited.
pub fn for_each_record<R, F>(reader: R, mut visit: F) -> Result<usize, BenchError>
where
    R: BufRead,
    F: FnMut(LogRecord),
{
    let mut count = 0;
    for (idx, line_result) in reader.lines().enumerate() {
        let line = line_result.map_err(|source| BenchError::MalformedRecord {
            line: idx + 1,
            detail: source.to_string(),
        })?;
        if line.trim().is_empty() {
            continue;
        }
        visit(LogRecord::decode(&line, idx + 1)?);
        count += 1;
    }
    Ok(count)
}

pub fn read_log_file<F>(path: &Path, visit: F) -> Result<usize, BenchError>
where
    F: FnMut(LogRecord),
{
    let file = File::open(path).map_err(|source| BenchError::LogReadError {
        path: path.to_path_buf(),
        source,
    })?;
    let count = for_each_record(BufReader::new(file), visit)?;
    tracing::debug!(path = %path.display(), records = count, "log file processed");
    Ok(count)
}
