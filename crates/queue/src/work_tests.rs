// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn context() -> JobContext {
    JobContext {
        data: serde_json::Value::Null,
        cancel: CancelToken::new(),
    }
}

#[test]
fn call_work_returns_callable_result() {
    let mut work = Work::Call(Box::new(|_| Ok(())));
    assert_eq!(work.execute(&context()), Ok(()));

    let mut work = Work::Call(Box::new(|_| Err(WorkError::Failed("boom".into()))));
    assert_eq!(work.execute(&context()), Err(WorkError::Failed("boom".into())));
}

#[test]
fn call_work_sees_payload() {
    let mut work = Work::Call(Box::new(|ctx: &JobContext| {
        if ctx.data["host"] == "rt1" {
            Ok(())
        } else {
            Err(WorkError::Failed("wrong payload".into()))
        }
    }));
    let ctx = JobContext {
        data: serde_json::json!({"host": "rt1"}),
        cancel: CancelToken::new(),
    };
    assert_eq!(work.execute(&ctx), Ok(()));
}

#[test]
fn panicking_callable_is_reported_not_propagated() {
    let mut work = Work::Call(Box::new(|_| panic!("wire fell out")));
    let err = work.execute(&context()).unwrap_err();
    assert_eq!(err, WorkError::Panicked("wire fell out".into()));
}

#[test]
fn cancelled_context_short_circuits() {
    let mut work = Work::Call(Box::new(|_| Ok(())));
    let ctx = context();
    ctx.cancel.cancel();
    assert_eq!(work.execute(&ctx), Err(WorkError::Cancelled));
}

#[test]
fn exec_work_reports_exit_code() {
    let mut work = Work::Exec(ExecSpec::new("sh").arg("-c").arg("exit 3"));
    assert_eq!(work.execute(&context()), Err(WorkError::ExitCode { code: 3 }));

    let mut work = Work::Exec(ExecSpec::new("true"));
    assert_eq!(work.execute(&context()), Ok(()));
}

#[test]
fn exec_work_missing_program_is_a_spawn_error() {
    let mut work = Work::Exec(ExecSpec::new("definitely-not-a-real-binary"));
    assert!(matches!(
        work.execute(&context()),
        Err(WorkError::Spawn(_))
    ));
}

#[test]
fn exec_spec_passes_env_and_cwd() {
    let dir = std::env::temp_dir();
    let mut work = Work::Exec(
        ExecSpec::new("sh")
            .arg("-c")
            .arg("test \"$CONVOY_PROBE\" = yes")
            .env("CONVOY_PROBE", "yes")
            .cwd(&dir),
    );
    assert_eq!(work.execute(&context()), Ok(()));
}
