use std::{fs, path::Path, process::Command};

fn main() {
    println!("cargo:rerun-if-changed=.git/HEAD");
    if Path::new(".git/refs/heads").exists() {
        println!("cargo:rerun-if-changed=.git/refs/heads");
    }

    let (branch, commit) = git_info();
    println!("cargo:rustc-env=GIT_BRANCH={}", branch);
    println!("cargo:rustc-env=GIT_COMMIT_SHORT={}", commit);
}

fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let value = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!value.is_empty()).then_some(value)
}

fn git_info() -> (String, String) {
    let mut branch = git(&["rev-parse", "--abbrev-ref", "HEAD"]);
    let mut commit = git(&["rev-parse", "--short", "HEAD"]);

    // no git binary: read the ref files directly
    if branch.is_none() || commit.is_none() {
        if let Ok(head) = fs::read_to_string(".git/HEAD") {
            if let Some(ref_path) = head.trim().strip_prefix("ref: ") {
                branch = ref_path.rsplit('/').next().map(str::to_string);
                commit = fs::read_to_string(format!(".git/{}", ref_path))
                    .ok()
                    .map(|c| c.trim().chars().take(7).collect());
            } else {
                commit = Some(head.trim().chars().take(7).collect());
            }
        }
    }

    (
        branch.unwrap_or_else(|| "unknown".to_string()),
        commit.unwrap_or_else(|| "unknown".to_string()),
    )
}
