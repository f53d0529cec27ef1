use std::process::Command;
use vergen::EmitBuilder;

fn git_available() -> bool {
    Command::new("git")
        .args(["rev-parse", "--git-dir"])
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

fn main() {
    let mut builder = EmitBuilder::builder();
    builder.build_timestamp();
    if git_available() {
        builder.git_sha(true);
    }

    // /api/version falls back to "unknown" when metadata is missing
    if let Err(e) = builder.emit() {
        println!("cargo:warning=build metadata unavailable: {}", e);
    }
}
