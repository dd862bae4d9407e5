use std::process::{Command, ExitStatus};

pub struct CmdResult {
    pub case: String,
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl CmdResult {
    /// Context for assertion messages.
    pub fn describe(&self) -> String {
        format!(
            "case={} status={}\n--- stdout ---\n{}\n--- stderr ---\n{}",
            self.case, self.status, self.stdout, self.stderr
        )
    }
}

/// Run the binary with `args` and extra environment, capturing its output.
pub fn run_cli_case(case_name: &str, args: &[&str], envs: &[(&str, &str)]) -> CmdResult {
    let output = Command::new(env!("CARGO_BIN_EXE_bundle-janitor"))
        .args(args)
        .env_remove("BUNDLE_JANITOR_OUTPUT_FORMAT")
        .envs(envs.iter().copied())
        .output()
        .expect("execute bundle-janitor command");

    CmdResult {
        case: case_name.to_string(),
        status: output.status,
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    }
}
