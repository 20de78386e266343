//! Test helpers for behavioral scenarios.
//!
//! Provides a small DSL for running the ctlwire CLI and a real socket
//! controller to point it at.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, dead_code)]

use ctlwire_core::protocol::{decode, encode, read_frame, write_frame};
use ctlwire_core::{Request, Response};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::Arc;

// Aggressive timeouts for fast tests.
//
// IMPORTANT:
//   Do NOT change these.
//   File a performance bug instead.
const CTLWIRE_TIMEOUT_CONNECT_MS: &str = "2000";
const CTLWIRE_TIMEOUT_IPC_MS: &str = "500";
const CTLWIRE_POLL_MS: &str = "5";

/// Returns the path to a binary, checking the llvm-cov target directory
/// first, then the standard one, then asking assert_cmd.
fn binary_path(name: &str) -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));

    let llvm_cov_path = manifest_dir.join("target/llvm-cov-target/debug").join(name);
    if llvm_cov_path.exists() {
        return llvm_cov_path;
    }

    let standard = manifest_dir.join("target/debug").join(name);
    if standard.exists() {
        return standard;
    }

    assert_cmd::cargo::cargo_bin(name)
}

/// Create a CLI builder for ctlwire commands
pub fn cli() -> CliBuilder {
    CliBuilder::new()
}

/// High-level CLI builder for fluent test assertions
pub struct CliBuilder {
    args: Vec<String>,
    envs: Vec<(String, String)>,
}

impl CliBuilder {
    fn new() -> Self {
        Self {
            args: Vec::new(),
            envs: vec![
                (
                    "CTLWIRE_TIMEOUT_CONNECT_MS".into(),
                    CTLWIRE_TIMEOUT_CONNECT_MS.into(),
                ),
                ("CTLWIRE_TIMEOUT_IPC_MS".into(), CTLWIRE_TIMEOUT_IPC_MS.into()),
                ("CTLWIRE_POLL_MS".into(), CTLWIRE_POLL_MS.into()),
            ],
        }
    }

    /// Add CLI arguments
    pub fn args(mut self, args: &[&str]) -> Self {
        self.args.extend(args.iter().map(|s| s.to_string()));
        self
    }

    /// Set environment variable
    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.envs.push((key.to_string(), value.to_string()));
        self
    }

    /// Build the command without running it
    pub fn command(self) -> Command {
        let mut cmd = Command::new(binary_path("ctlwire"));
        cmd.args(&self.args);

        // Keep the caller's log filter out of stderr assertions
        cmd.env_remove("CTLWIRE_LOG");

        for (key, value) in self.envs {
            cmd.env(key, value);
        }
        cmd
    }

    /// Run and expect success (exit code 0)
    pub fn passes(self) -> RunAssert {
        let output = self.command().output().expect("command should run");
        assert!(
            output.status.success(),
            "expected command to pass, got exit code {:?}\nstdout: {}\nstderr: {}",
            output.status.code(),
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        RunAssert { output }
    }

    /// Run and expect failure (non-zero exit code)
    pub fn fails(self) -> RunAssert {
        let output = self.command().output().expect("command should run");
        assert!(
            !output.status.success(),
            "expected command to fail, but it passed\nstdout: {}\nstderr: {}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        RunAssert { output }
    }
}

/// Result of a CLI run for chaining assertions
pub struct RunAssert {
    output: Output,
}

impl RunAssert {
    pub fn stdout(&self) -> String {
        String::from_utf8_lossy(&self.output.stdout).into_owned()
    }

    pub fn stderr(&self) -> String {
        String::from_utf8_lossy(&self.output.stderr).into_owned()
    }

    /// Assert stdout equals expected exactly.
    /// **Prefer this for format specs** - catches format regressions.
    pub fn stdout_eq(self, expected: &str) -> Self {
        assert_eq!(self.stdout(), expected);
        self
    }

    /// Assert stdout contains substring
    pub fn stdout_has(self, expected: &str) -> Self {
        let stdout = self.stdout();
        assert!(
            stdout.contains(expected),
            "stdout does not contain '{}'\nstdout: {}",
            expected,
            stdout
        );
        self
    }

    /// Assert stderr contains substring
    pub fn stderr_has(self, expected: &str) -> Self {
        let stderr = self.stderr();
        assert!(
            stderr.contains(expected),
            "stderr does not contain '{}'\nstderr: {}",
            expected,
            stderr
        );
        self
    }

    /// Assert the process exited with `code`
    pub fn code(self, code: i32) -> Self {
        assert_eq!(self.output.status.code(), Some(code));
        self
    }
}

type Handler = Arc<dyn Fn(Request) -> Response + Send + Sync>;

/// Controller listening on a Unix socket in a temp directory.
///
/// Every accepted connection is served on its own thread until the peer
/// hangs up.
pub struct Controller {
    dir: tempfile::TempDir,
    address: String,
}

impl Controller {
    /// Controller that echoes request arguments with code 0
    pub fn echo() -> Self {
        Self::with_handler(|request| Response::Reply {
            code: 0,
            values: request.args,
        })
    }

    pub fn with_handler(handler: impl Fn(Request) -> Response + Send + Sync + 'static) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ctl.sock");
        let listener = UnixListener::bind(&path).unwrap();
        let handler: Handler = Arc::new(handler);

        std::thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                let handler = Arc::clone(&handler);
                std::thread::spawn(move || serve(stream, &handler));
            }
        });

        Self {
            address: format!("unix:{}", path.display()),
            dir,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Write a file next to the socket and return its path
    pub fn file(&self, name: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }
}

fn serve(mut stream: UnixStream, handler: &Handler) {
    while let Ok(frame) = read_frame(&mut stream) {
        let request: Request = decode(&frame).unwrap();
        let reply = encode(&handler(request)).unwrap();
        if write_frame(&mut stream, &reply).is_err() {
            break;
        }
    }
}
