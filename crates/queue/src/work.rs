// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Work payloads: what a job executes when a worker picks it up.

use crate::cancel::CancelToken;
use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::Duration;
use thiserror::Error;

/// Poll interval for child-process liveness and cancellation checks.
const CHILD_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Failure cause reported by a worker.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WorkError {
    #[error("{0}")]
    Failed(String),
    #[error("worker panicked: {0}")]
    Panicked(String),
    #[error("command exited with status {code}")]
    ExitCode { code: i32 },
    #[error("command terminated by signal")]
    Signalled,
    #[error("cancelled")]
    Cancelled,
    #[error("failed to spawn worker: {0}")]
    Spawn(String),
}

/// Scope handed to a job's callable.
pub struct JobContext {
    /// Opaque payload attached at enqueue time.
    pub data: serde_json::Value,
    /// Cooperative cancellation flag for this job.
    pub cancel: CancelToken,
}

/// Boxed callable shape for in-process work.
pub type WorkFn = Box<dyn FnMut(&JobContext) -> Result<(), WorkError> + Send + 'static>;

/// An external command to run as a worker.
#[derive(Debug, Clone)]
pub struct ExecSpec {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub cwd: Option<PathBuf>,
}

impl ExecSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            cwd: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub(crate) fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        for (key, value) in &self.env {
            cmd.env(key, value);
        }
        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }
        cmd
    }
}

/// What a job executes: an in-process callable or an external command.
pub enum Work {
    Call(WorkFn),
    Exec(ExecSpec),
}

impl Work {
    /// Run this work to completion on the current thread.
    ///
    /// Callable panics are caught and reported as [`WorkError::Panicked`].
    pub(crate) fn execute(&mut self, ctx: &JobContext) -> Result<(), WorkError> {
        if ctx.cancel.is_cancelled() {
            return Err(WorkError::Cancelled);
        }
        match self {
            Work::Call(func) => match catch_unwind(AssertUnwindSafe(|| func(ctx))) {
                Ok(result) => result,
                Err(payload) => Err(WorkError::Panicked(panic_message(payload))),
            },
            Work::Exec(spec) => {
                let child = spec
                    .command()
                    .spawn()
                    .map_err(|e| WorkError::Spawn(e.to_string()))?;
                wait_child(&Mutex::new(child), &ctx.cancel)
            }
        }
    }
}

impl std::fmt::Debug for Work {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Work::Call(_) => f.write_str("Work::Call"),
            Work::Exec(spec) => f.debug_tuple("Work::Exec").field(spec).finish(),
        }
    }
}

/// Wait for a child process, honouring cancellation by killing it.
pub(crate) fn wait_child(child: &Mutex<Child>, cancel: &CancelToken) -> Result<(), WorkError> {
    loop {
        {
            let mut guard = child.lock();
            if cancel.is_cancelled() {
                let _ = guard.kill();
                let _ = guard.wait();
                return Err(WorkError::Cancelled);
            }
            match guard.try_wait() {
                Ok(Some(status)) => return status_to_result(status),
                Ok(None) => {}
                Err(e) => return Err(WorkError::Failed(e.to_string())),
            }
        }
        std::thread::sleep(CHILD_POLL_INTERVAL);
    }
}

fn status_to_result(status: ExitStatus) -> Result<(), WorkError> {
    if status.success() {
        return Ok(());
    }
    match status.code() {
        Some(code) => Err(WorkError::ExitCode { code }),
        None => Err(WorkError::Signalled),
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
#[path = "work_tests.rs"]
mod tests;
