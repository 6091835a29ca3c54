#![allow(clippy::expect_used, clippy::unwrap_used)]

use assert_cmd::Command;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

#[allow(dead_code)]
pub const CMD_TIMEOUT: Duration = Duration::from_secs(30);

/// A `blogmap` command isolated from the caller's environment.
#[allow(dead_code)]
pub fn blogmap_cmd() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("blogmap"));
    cmd.timeout(CMD_TIMEOUT);
    cmd.env_remove("FIRECRAWL_API_KEY");
    cmd.env_remove("FIRECRAWL_API_URL");
    cmd.env_remove("BLOGMAP_OUTPUT_FORMAT");
    cmd.env_remove("BLOGMAP_CONFIG");
    cmd.env("NO_COLOR", "1");
    cmd
}

/// Write `toml` to a temporary config file, kept alive by the returned handle.
#[allow(dead_code)]
pub fn config_file(toml: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("failed to create config file");
    file.write_all(toml.as_bytes())
        .expect("failed to write config file");
    file
}

/// Run `cmd` to success and parse its stdout as JSON.
#[allow(dead_code)]
pub fn json_output(cmd: &mut Command) -> serde_json::Value {
    let output = cmd.assert().success().get_output().stdout.clone();
    serde_json::from_slice(&output).expect("stdout is not JSON")
}
