//! Access to the warehouse through the external `bq` command-line tool.

use std::io::{self, Write};
use std::process::{Command, Output, Stdio};

use tracing::{debug, warn};

use crate::error::{AppError, Result};
use crate::estimator::parse_bytes_processed;

/// Job-status polling text `bq` writes to stderr while a job runs
const JOB_POLLING_MARKER: &str = "Waiting on bqjob";

/// Result of a real query execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Completed {
        output: String,
    },
    /// Non-zero exit, but stdout carries a usable partial result
    SoftWarning {
        output: String,
        exit_code: i32,
        /// `None` when stderr was blank or only job polling noise
        stderr: Option<String>,
    },
    CancelledBySafetyGate,
    Failed {
        exit_code: i32,
        stderr: String,
    },
}

impl Outcome {
    /// Result payload, if the query produced one
    pub fn output(&self) -> Option<&str> {
        match self {
            Outcome::Completed { output } | Outcome::SoftWarning { output, .. } => {
                Some(output.as_str())
            }
            Outcome::CancelledBySafetyGate | Outcome::Failed { .. } => None,
        }
    }

    /// Process exit code a caller should finish with
    pub fn exit_code(&self) -> i32 {
        match self {
            Outcome::Failed { exit_code, .. } => *exit_code,
            _ => 0,
        }
    }
}

/// The two operations the cost guard needs from a warehouse
pub trait WarehouseClient {
    /// Bytes the query would process, without billing or returning rows
    fn estimate(&self, query: &str) -> Result<u64>;

    /// Run the query; the warehouse refuses to bill beyond `max_bytes_billed`
    fn execute(&self, query: &str, max_bytes_billed: u64) -> Result<Outcome>;
}

impl<T: WarehouseClient + ?Sized> WarehouseClient for &T {
    fn estimate(&self, query: &str) -> Result<u64> {
        (**self).estimate(query)
    }

    fn execute(&self, query: &str, max_bytes_billed: u64) -> Result<Outcome> {
        (**self).execute(query, max_bytes_billed)
    }
}

/// [`WarehouseClient`] backed by the `bq` subprocess, SQL passed on stdin
#[derive(Debug, Clone)]
pub struct BqCli {
    program: String,
    leading_args: Vec<String>,
    format: Option<String>,
}

impl Default for BqCli {
    fn default() -> Self {
        Self::new("bq")
    }
}

impl BqCli {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
            format: None,
        }
    }

    /// Build from a command line such as `["bq", "--project_id=demo"]`
    pub fn from_command(command: &[String]) -> Result<Self> {
        let (program, rest) = command.split_first().ok_or_else(|| {
            AppError::InvalidArgument("warehouse command must not be empty".to_string())
        })?;
        Ok(Self {
            program: program.clone(),
            leading_args: rest.to_vec(),
            format: None,
        })
    }

    /// Result format for execution, e.g. `csv`
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn dry_run_args() -> Vec<String> {
        vec![
            "query".to_string(),
            "--dry_run".to_string(),
            "--use_legacy_sql=false".to_string(),
            "--format=json".to_string(),
        ]
    }

    pub fn execute_args(&self, max_bytes_billed: u64) -> Vec<String> {
        let mut args = vec![
            "query".to_string(),
            "--use_legacy_sql=false".to_string(),
        ];
        if let Some(format) = &self.format {
            args.push(format!("--format={}", format));
        }
        args.push(format!("--maximum_bytes_billed={}", max_bytes_billed));
        args
    }

    /// Shell-style rendering of the execute command, for display only
    pub fn describe_execute(&self, max_bytes_billed: u64) -> String {
        std::iter::once(self.program.clone())
            .chain(self.leading_args.iter().cloned())
            .chain(self.execute_args(max_bytes_billed))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn run(&self, args: &[String], query: &str) -> Result<Output> {
        debug!(program = %self.program, ?args, "spawning warehouse tool");

        let spawn_err = |source: io::Error| AppError::Spawn {
            program: self.program.clone(),
            source,
        };

        let mut child = Command::new(&self.program)
            .args(&self.leading_args)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(spawn_err)?;

        if let Some(mut stdin) = child.stdin.take() {
            // EPIPE means the tool exited without reading; its status reports why
            match stdin.write_all(query.as_bytes()) {
                Err(e) if e.kind() != io::ErrorKind::BrokenPipe => return Err(spawn_err(e)),
                _ => {}
            }
        }

        child.wait_with_output().map_err(spawn_err)
    }
}

impl WarehouseClient for BqCli {
    fn estimate(&self, query: &str) -> Result<u64> {
        let output = self.run(&Self::dry_run_args(), query)?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if !output.status.success() {
            let raw_output = if stderr.trim().is_empty() {
                stdout.trim().to_string()
            } else {
                stderr.trim().to_string()
            };
            return Err(AppError::EstimationFailed { raw_output });
        }

        parse_bytes_processed(&stdout).ok_or_else(|| AppError::EstimationFailed {
            raw_output: stdout.trim().to_string(),
        })
    }

    fn execute(&self, query: &str, max_bytes_billed: u64) -> Result<Outcome> {
        let output = self.run(&self.execute_args(max_bytes_billed), query)?;
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        let exit_code = if output.status.success() {
            None
        } else {
            // A signal leaves no exit code
            Some(output.status.code().unwrap_or(-1))
        };

        Ok(classify_execution(exit_code, stdout, stderr))
    }
}

/// Turn the raw result of an execution into an [`Outcome`].
///
/// `exit_code` is `None` when the process succeeded.
pub fn classify_execution(exit_code: Option<i32>, stdout: String, stderr: String) -> Outcome {
    let Some(exit_code) = exit_code else {
        if !stderr.trim().is_empty() {
            debug!(stderr = %stderr.trim(), "warehouse tool wrote to stderr");
        }
        return Outcome::Completed { output: stdout };
    };

    if stdout.trim().is_empty() {
        return Outcome::Failed { exit_code, stderr };
    }

    warn!(exit_code, "query exited non-zero but produced output");
    Outcome::SoftWarning {
        output: stdout,
        exit_code,
        stderr: meaningful_stderr(&stderr),
    }
}

/// Stderr worth showing, or `None` for blank text and job polling noise
pub fn meaningful_stderr(stderr: &str) -> Option<String> {
    let trimmed = stderr.trim();
    if trimmed.is_empty() || trimmed.contains(JOB_POLLING_MARKER) {
        None
    } else {
        Some(trimmed.to_string())
    }
}
