//! Thin child-process wrapper building a `CrashReport` on non-zero exit.
//! Not the CLI argument surface spec.md excludes - just enough glue for
//! C4-C10 to run against. Grounded in `cosmos::safe_apply::run_cmd`
//! (spawn + capture) and `cosmos::git_ops` (`Command` with `.current_dir`).

use crate::model::CrashReport;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

/// Runs `command` (split naively on whitespace - no shell interpretation)
/// in `working_directory`, capturing stderr. Returns `None` when the child
/// exited successfully; `eprintln!`s progress the way `cosmos`'s own LLM
/// client narrates its retry loop.
pub async fn run(command: &str, working_directory: &Path) -> anyhow::Result<Option<CrashReport>> {
    let mut parts = command.split_whitespace();
    let program = parts
        .next()
        .ok_or_else(|| anyhow::anyhow!("empty command"))?;
    let args: Vec<&str> = parts.collect();

    eprintln!("tsugix: running `{command}`");

    let output = Command::new(program)
        .args(&args)
        .current_dir(working_directory)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if output.status.success() {
        eprintln!("tsugix: `{command}` exited successfully");
        return Ok(None);
    }

    let exit_code = output.status.code().unwrap_or(-1);
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    eprintln!("tsugix: `{command}` exited with code {exit_code}");

    Ok(Some(CrashReport::new(
        stderr,
        exit_code,
        command.to_string(),
        working_directory.to_path_buf(),
    )))
}
