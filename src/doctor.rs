//! Environment checks: external tools, authentication and working directories.

use std::fmt;
use std::path::Path;
use std::process::{Command, Stdio};

use tracing::debug;

/// Directories the query commands expect next to the SQL files
pub const EXPECTED_DIRECTORIES: [&str; 2] = ["queries", "results"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckStatus {
    Passed(String),
    Warning(String),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Check {
    pub name: String,
    pub status: CheckStatus,
}

impl Check {
    fn new(name: &str, status: CheckStatus) -> Self {
        Self {
            name: name.to_string(),
            status,
        }
    }
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.status {
            CheckStatus::Passed(detail) => write!(f, "[ok]   {}: {}", self.name, detail),
            CheckStatus::Warning(detail) => write!(f, "[warn] {}: {}", self.name, detail),
            CheckStatus::Failed(detail) => write!(f, "[fail] {}: {}", self.name, detail),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DoctorReport {
    pub checks: Vec<Check>,
}

impl DoctorReport {
    pub fn is_healthy(&self) -> bool {
        !self
            .checks
            .iter()
            .any(|c| matches!(c.status, CheckStatus::Failed(_)))
    }

    pub fn warnings(&self) -> usize {
        self.checks
            .iter()
            .filter(|c| matches!(c.status, CheckStatus::Warning(_)))
            .count()
    }
}

/// Runs a command and returns the first line of its stdout if it succeeded
pub type Probe<'a> = &'a dyn Fn(&str, &[String]) -> Option<String>;

/// Run `program args...` with no stdin, capturing output
pub fn probe_command(program: &str, args: &[String]) -> Option<String> {
    debug!(program, ?args, "probing");
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    Some(stdout.lines().next().unwrap_or("").trim().to_string())
}

fn args(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn tool_check(probe: Probe<'_>, name: &str, program: &str, argv: &[String], required: bool) -> Check {
    match probe(program, argv) {
        Some(version) => Check::new(name, CheckStatus::Passed(version)),
        None if required => Check::new(
            name,
            CheckStatus::Failed("not installed or not in PATH".to_string()),
        ),
        None => Check::new(name, CheckStatus::Warning("not installed (optional)".to_string())),
    }
}

/// Run every check. `warehouse_command` is the program plus leading arguments
/// used for `bq`, as configured in settings.
pub fn run_checks(probe: Probe<'_>, base_dir: &Path, warehouse_command: &[String]) -> DoctorReport {
    let mut checks = Vec::new();

    let (bq_program, bq_leading) = match warehouse_command.split_first() {
        Some((program, rest)) => (program.as_str(), rest.to_vec()),
        None => ("bq", Vec::new()),
    };
    let bq_args = |extra: &[&str]| {
        let mut v = bq_leading.clone();
        v.extend(args(extra));
        v
    };

    let gcloud = tool_check(probe, "Google Cloud SDK", "gcloud", &args(&["--version"]), true);
    checks.push(gcloud);

    let bq = tool_check(probe, "BigQuery CLI", bq_program, &bq_args(&["version"]), true);
    let bq_installed = matches!(bq.status, CheckStatus::Passed(_));
    checks.push(bq);

    checks.push(tool_check(probe, "Git", "git", &args(&["--version"]), false));
    checks.push(tool_check(probe, "GitHub CLI", "gh", &args(&["--version"]), false));

    let account = probe(
        "gcloud",
        &args(&[
            "auth",
            "list",
            "--filter=status:ACTIVE",
            "--format=value(account)",
        ]),
    )
    .filter(|a| !a.is_empty());
    let auth_ok = account.is_some();
    checks.push(match account {
        Some(account) => Check::new(
            "Google Cloud authentication",
            CheckStatus::Passed(format!("active account {}", account)),
        ),
        None => Check::new(
            "Google Cloud authentication",
            CheckStatus::Warning("no active account, run \"gcloud auth login\"".to_string()),
        ),
    });

    if bq_installed && auth_ok {
        let access = probe(bq_program, &bq_args(&["ls", "--max_results=1"]));
        checks.push(match access {
            Some(_) => Check::new("BigQuery access", CheckStatus::Passed("confirmed".to_string())),
            None => Check::new(
                "BigQuery access",
                CheckStatus::Warning("listing datasets failed, check permissions and project".to_string()),
            ),
        });
    }

    for dir in EXPECTED_DIRECTORIES {
        let path = base_dir.join(dir);
        let name = format!("{} directory", dir);
        checks.push(if path.is_dir() {
            Check::new(&name, CheckStatus::Passed(path.display().to_string()))
        } else {
            Check::new(&name, CheckStatus::Warning(format!("not found: {}", path.display())))
        });
    }

    DoctorReport { checks }
}
