//! Shared helpers for integration tests.
//!
//! [`ScriptTemplate`] replaces ffmpeg with `/bin/sh -c <script>`, picking a
//! script per stream key. Scripts get the placeholder path as `$1` and the
//! destination URL as `$2`. A key can also be pointed at another program.

#![allow(dead_code)]

use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use keeper_av::{destination_url, EncoderCommand, EncoderTemplate};
use keeper_common::StreamKey;
use tempfile::TempDir;

#[derive(Debug, Clone)]
pub struct ScriptTemplate {
    default_script: String,
    scripts: HashMap<String, String>,
    programs: HashMap<String, PathBuf>,
}

impl ScriptTemplate {
    /// Run `script` for every key without an override.
    pub fn new(script: &str) -> Self {
        Self {
            default_script: script.to_string(),
            scripts: HashMap::new(),
            programs: HashMap::new(),
        }
    }

    /// Run `script` for `key` instead of the default.
    pub fn with_script(mut self, key: &str, script: &str) -> Self {
        self.scripts.insert(key.to_string(), script.to_string());
        self
    }

    /// Launch `program` for `key` instead of `/bin/sh`.
    pub fn with_program(mut self, key: &str, program: impl Into<PathBuf>) -> Self {
        self.programs.insert(key.to_string(), program.into());
        self
    }
}

impl EncoderTemplate for ScriptTemplate {
    fn program(&self) -> &Path {
        Path::new("/bin/sh")
    }

    fn args(&self, source: &Path, key: &StreamKey) -> Vec<OsString> {
        let script = self
            .scripts
            .get(key.as_str())
            .unwrap_or(&self.default_script);
        vec![
            "-c".into(),
            script.into(),
            "sh".into(),
            source.as_os_str().to_owned(),
            destination_url(key).into(),
        ]
    }

    fn command(&self, source: &Path, key: &StreamKey) -> EncoderCommand {
        let program = self
            .programs
            .get(key.as_str())
            .map_or_else(|| self.program(), PathBuf::as_path);
        let mut cmd = EncoderCommand::new(program.to_path_buf());
        cmd.args(self.args(source, key));
        cmd
    }
}

pub fn keys(raw: &[&str]) -> Vec<StreamKey> {
    raw.iter().map(|k| StreamKey::new(*k).unwrap()).collect()
}

/// A temp dir holding a stand-in `placeholder.jpg`.
pub fn placeholder_image() -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let image = dir.path().join("placeholder.jpg");
    std::fs::write(&image, b"\xff\xd8\xff\xe0placeholder").unwrap();
    (dir, image)
}

/// Write an executable shell script named `name` into `dir`.
#[cfg(unix)]
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}
