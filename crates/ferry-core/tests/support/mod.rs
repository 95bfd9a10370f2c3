//! Fakes and fixtures shared by the pipeline integration tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};

use ferry_core::command::{CommandOutput, CommandRunner};
use ferry_core::config::{PipelineConfig, RunOptions, parse_ferry_toml_str};
use ferry_core::error::{TransportError, TransportFailure, TriggerError};
use ferry_core::transport::{MountedTransport, RemoteTransport};
use ferry_core::trigger::{HttpResponse, TriggerClient};
use tempfile::TempDir;
use url::Url;

pub const TARGET: &str = "stagingFTP";
pub const BASE_PATH: &str = "domains/test.example.com";

/// A project tree plus a directory standing in for the remote disk.
pub struct Sandbox {
    _temp: TempDir,
    pub project: PathBuf,
    pub remote: PathBuf,
}

impl Sandbox {
    /// Layout: `app/` sources, a `.git/` dir, a runtime log and a secrets file.
    pub fn new() -> Self {
        let temp = TempDir::new().expect("tempdir should succeed");
        let project = temp.path().join("project");
        let remote = temp.path().join("remote");

        write(&project.join("app/Http/Kernel.php"), "<?php // kernel");
        write(&project.join("app/Models/User.php"), "<?php // user");
        write(&project.join(".git/HEAD"), "ref: refs/heads/main\n");
        write(&project.join(".git/config"), "[core]\n");
        write(&project.join("storage/logs/debug.log"), "old log line\n");
        write(&project.join(".env"), "APP_NAME=Demo\nAPP_KEY=base64:abc\n");
        std::fs::create_dir_all(remote.join(BASE_PATH).join("public"))
            .expect("create remote dirs");

        Self {
            _temp: temp,
            project,
            remote,
        }
    }

    pub fn config(&self, extra_deploy: &str, options: RunOptions) -> PipelineConfig {
        let toml = format!(
            "[deploy]\n{extra_deploy}\n\n[targets.{TARGET}]\nroot = \"{}\"\nbase_path = \"{BASE_PATH}\"\nhostname = \"test.example.com\"\n",
            self.remote.display().to_string().replace('\\', "/"),
        );
        let config = parse_ferry_toml_str(&toml).expect("test config should parse");
        PipelineConfig::from_config(&config, &self.project, &options)
            .expect("pipeline config should resolve")
    }

    pub fn default_config(&self) -> PipelineConfig {
        self.config("", RunOptions::new(TARGET))
    }

    pub fn remote_file(&self, relative: &str) -> PathBuf {
        self.remote.join(BASE_PATH).join(relative)
    }

    pub fn secrets(&self) -> String {
        std::fs::read_to_string(self.project.join(".env")).expect("read secrets file")
    }
}

pub fn write(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create parent dirs");
    }
    std::fs::write(path, contents).expect("write file");
}

/// Value of `MIGRATION_HASH` in a secrets file body.
pub fn migration_hash(secrets: &str) -> Option<String> {
    secrets
        .lines()
        .find_map(|line| line.strip_prefix("MIGRATION_HASH="))
        .map(str::to_string)
}

/// Mounted transport that records every call and can be told to fail.
pub struct RecordingTransport {
    inner: MountedTransport,
    pub calls: RefCell<Vec<(&'static str, String)>>,
    fail_put_of: Option<String>,
    fail_delete: bool,
}

impl RecordingTransport {
    pub fn new(sandbox: &Sandbox) -> Self {
        Self {
            inner: MountedTransport::new(TARGET, sandbox.remote.clone()),
            calls: RefCell::new(Vec::new()),
            fail_put_of: None,
            fail_delete: false,
        }
    }

    /// Fail any put whose remote path ends with `suffix`.
    pub fn failing_put(mut self, suffix: &str) -> Self {
        self.fail_put_of = Some(suffix.to_string());
        self
    }

    pub fn failing_delete(mut self) -> Self {
        self.fail_delete = true;
        self
    }

    pub fn operations(&self) -> Vec<&'static str> {
        self.calls.borrow().iter().map(|(op, _)| *op).collect()
    }

    fn record(&self, operation: &'static str, path: &str) {
        self.calls.borrow_mut().push((operation, path.to_string()));
    }
}

impl RemoteTransport for RecordingTransport {
    fn target(&self) -> &str {
        self.inner.target()
    }

    fn put_bytes(&self, remote_path: &str, contents: &[u8]) -> Result<(), TransportError> {
        self.record("put", remote_path);
        if let Some(suffix) = &self.fail_put_of {
            if remote_path.ends_with(suffix.as_str()) {
                return Err(TransportError::new(
                    TARGET,
                    "put",
                    remote_path,
                    TransportFailure::Connection,
                    "connection reset by peer",
                ));
            }
        }
        self.inner.put_bytes(remote_path, contents)
    }

    fn get(&self, remote_path: &str) -> Result<Vec<u8>, TransportError> {
        self.record("get", remote_path);
        self.inner.get(remote_path)
    }

    fn delete(&self, remote_path: &str) -> Result<(), TransportError> {
        self.record("delete", remote_path);
        if self.fail_delete {
            return Err(TransportError::new(
                TARGET,
                "delete",
                remote_path,
                TransportFailure::Authentication,
                "530 permission denied",
            ));
        }
        self.inner.delete(remote_path)
    }

    fn exists(&self, remote_path: &str) -> Result<bool, TransportError> {
        self.record("exists", remote_path);
        self.inner.exists(remote_path)
    }
}

/// Trigger client answering from a queue; `200 complete` once it runs dry.
///
/// Queued failures become `TriggerError::Request` against the URL actually
/// called, so error messages carry the real query string.
#[derive(Default)]
pub struct ScriptedTrigger {
    pub urls: RefCell<Vec<Url>>,
    responses: RefCell<VecDeque<Result<HttpResponse, String>>>,
}

impl ScriptedTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, status: u16, body: &str) -> Self {
        self.responses
            .borrow_mut()
            .push_back(Ok(HttpResponse::new(status, body)));
        self
    }

    pub fn fail(self, cause: &str) -> Self {
        self.responses.borrow_mut().push_back(Err(cause.to_string()));
        self
    }

    pub fn called(&self) -> Vec<Url> {
        self.urls.borrow().clone()
    }
}

impl TriggerClient for ScriptedTrigger {
    fn invoke(&self, url: &Url) -> Result<HttpResponse, TriggerError> {
        self.urls.borrow_mut().push(url.clone());
        match self.responses.borrow_mut().pop_front() {
            Some(Ok(response)) => Ok(response),
            Some(Err(cause)) => Err(TriggerError::Request {
                url: url.to_string(),
                cause,
            }),
            None => Ok(HttpResponse::new(200, "complete")),
        }
    }
}

/// Command runner with canned results; unknown commands succeed silently.
#[derive(Default)]
pub struct FakeRunner {
    pub commands: RefCell<Vec<String>>,
    outputs: HashMap<String, std::io::Result<CommandOutput>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_exit(mut self, command: &str, code: i32, stdout: &str) -> Self {
        self.outputs.insert(
            command.to_string(),
            Ok(CommandOutput {
                code: Some(code),
                stdout: stdout.to_string(),
                stderr: String::new(),
            }),
        );
        self
    }

    pub fn with_spawn_error(mut self, command: &str) -> Self {
        self.outputs.insert(
            command.to_string(),
            Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "command not found",
            )),
        );
        self
    }
}

impl CommandRunner for FakeRunner {
    fn run(&self, command: &str) -> std::io::Result<CommandOutput> {
        self.commands.borrow_mut().push(command.to_string());
        match self.outputs.get(command) {
            Some(Ok(output)) => Ok(output.clone()),
            Some(Err(err)) => Err(std::io::Error::new(err.kind(), err.to_string())),
            None => Ok(CommandOutput {
                code: Some(0),
                stdout: String::new(),
                stderr: String::new(),
            }),
        }
    }
}
