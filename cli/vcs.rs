use crate::cli_args::GitOpts;
use anyhow::{Context, Result, bail};
use codecontext_core::VcsContext;
use log;
use std::path::Path;
use std::process::Command;

/// Runs git in the codebase root for every requested diff or log.
pub fn collect(project_root: &Path, opts: &GitOpts) -> Result<VcsContext> {
    let mut vcs = VcsContext::new();
    if opts.diff {
        vcs = vcs.with_diff(run_git(project_root, &["diff", "HEAD"])?);
    }
    if let Some((from, to)) = branch_pair(opts.git_diff_branch.as_deref()) {
        let range = format!("{}..{}", from, to);
        vcs = vcs.with_branch_diff(from, to, run_git(project_root, &["diff", &range])?);
    }
    if let Some((from, to)) = branch_pair(opts.git_log_branch.as_deref()) {
        let range = format!("{}..{}", from, to);
        vcs = vcs.with_branch_log(from, to, run_git(project_root, &["log", &range, "--oneline"])?);
    }
    Ok(vcs)
}

fn branch_pair(values: Option<&[String]>) -> Option<(&str, &str)> {
    match values {
        Some([from, to]) => Some((from.as_str(), to.as_str())),
        _ => None,
    }
}

fn run_git(project_root: &Path, args: &[&str]) -> Result<String> {
    log::debug!("Running git {} in {}", args.join(" "), project_root.display());
    let output = Command::new("git")
        .args(args)
        .current_dir(project_root)
        .output()
        .context("Failed to run git. Is it installed and on PATH?")?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("git {} failed: {}", args.join(" "), stderr.trim());
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
