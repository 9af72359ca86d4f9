//! Supervisor integration tests
//!
//! Drives whole cohorts against `/bin/sh` scripts standing in for ffmpeg.

#![cfg(unix)]

mod common;

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use common::{keys, placeholder_image, ScriptTemplate};
use stream_keeper::events::{EventLog, EventPayload};
use stream_keeper::supervisor::{RunError, Supervisor, TaskFailure, TaskState};
use tokio_util::sync::CancellationToken;

fn supervisor(template: ScriptTemplate, log: &Arc<EventLog>) -> Supervisor {
    Supervisor::new(Arc::new(template)).with_observer(log.clone())
}

/// Wait until `n` encoders report as launched.
async fn wait_for_launches(log: &EventLog, n: usize) {
    tokio::time::timeout(Duration::from_secs(10), async {
        while log.count(|p| matches!(p, EventPayload::EncoderLaunched { .. })) < n {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("encoders did not launch");
}

#[tokio::test]
async fn test_all_encoders_exit_cleanly() {
    let (_dir, image) = placeholder_image();
    let log = Arc::new(EventLog::new());
    let template = ScriptTemplate::new("exit 0");

    let report = supervisor(template, &log)
        .run(&image, &keys(&["abc123", "def456"]), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.tasks.len(), 2);
    assert!(report.tasks.iter().all(|t| t.state == TaskState::CompletedOk));
    assert_eq!(report.tasks[0].key.as_str(), "abc123");
    assert_eq!(report.tasks[1].key.as_str(), "def456");

    assert_eq!(
        log.count(|p| matches!(p, EventPayload::TaskStarted { .. })),
        2
    );
    assert_eq!(
        log.count(|p| matches!(p, EventPayload::RunFinished { ok: 2, .. })),
        1
    );
}

#[tokio::test]
async fn test_one_task_per_key() {
    let (_dir, image) = placeholder_image();
    let log = Arc::new(EventLog::new());
    let raw = ["k1", "k2", "k3", "k4", "k5"];

    let report = supervisor(ScriptTemplate::new("exit 0"), &log)
        .run(&image, &keys(&raw), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.tasks.len(), raw.len());
    assert_eq!(
        log.count(|p| matches!(p, EventPayload::EncoderLaunched { .. })),
        raw.len()
    );
}

#[tokio::test]
async fn test_duplicate_keys_get_duplicate_tasks() {
    let (_dir, image) = placeholder_image();
    let log = Arc::new(EventLog::new());

    let report = supervisor(ScriptTemplate::new("exit 0"), &log)
        .run(&image, &keys(&["abc123", "abc123"]), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.tasks.len(), 2);
    assert_eq!(report.ok(), 2);
}

#[tokio::test]
async fn test_failing_encoder_is_reported_with_its_key() {
    let (_dir, image) = placeholder_image();
    let log = Arc::new(EventLog::new());
    let template = ScriptTemplate::new("exit 0").with_script(
        "abc123",
        "echo 'rtmp://a.rtmp.youtube.com/live2/abc123: Connection refused' >&2; exit 1",
    );

    let result = supervisor(template, &log)
        .run(&image, &keys(&["abc123", "def456"]), &CancellationToken::new())
        .await;

    let report = match result {
        Err(RunError::Failed(report)) => report,
        other => panic!("expected failure, got {other:?}"),
    };
    assert_eq!(report.failed(), 1);
    assert_eq!(report.ok(), 1);

    let failed = report.failures().next().unwrap();
    assert_eq!(failed.key.as_str(), "abc123");
    assert_matches!(
        failed.error,
        Some(TaskFailure::Encoder(keeper_av::Error::Exited { .. }))
    );

    let summary = report.failure_summary();
    assert!(summary.contains("abc123"), "{summary}");
    assert!(summary.contains("Connection refused"), "{summary}");
    assert!(!summary.contains("def456"), "{summary}");
}

#[tokio::test]
async fn test_failure_does_not_stop_other_encoders() {
    let (_dir, image) = placeholder_image();
    let log = Arc::new(EventLog::new());
    // The healthy encoder outlives the failing one.
    let template = ScriptTemplate::new("sleep 0.5; exit 0").with_script("bad", "exit 3");

    let result = supervisor(template, &log)
        .run(&image, &keys(&["bad", "good"]), &CancellationToken::new())
        .await;

    let report = match result {
        Err(RunError::Failed(report)) => report,
        other => panic!("expected failure, got {other:?}"),
    };
    assert_eq!(report.tasks[0].state, TaskState::CompletedError);
    assert_eq!(report.tasks[1].state, TaskState::CompletedOk);
    assert_eq!(
        log.count(|p| matches!(p, EventPayload::ShutdownRequested { .. })),
        0
    );
}

#[tokio::test]
async fn test_launch_failure_does_not_stop_other_encoders() {
    let (_dir, image) = placeholder_image();
    let log = Arc::new(EventLog::new());
    let template = ScriptTemplate::new("sleep 0.3; exit 0")
        .with_program("missing", "/nonexistent/bin/ffmpeg");

    let result = supervisor(template, &log)
        .run(
            &image,
            &keys(&["good1", "missing", "good2"]),
            &CancellationToken::new(),
        )
        .await;

    let report = match result {
        Err(RunError::Failed(report)) => report,
        other => panic!("expected failure, got {other:?}"),
    };
    assert_eq!(report.tasks[0].state, TaskState::CompletedOk);
    assert_eq!(report.tasks[1].state, TaskState::CompletedError);
    assert_eq!(report.tasks[2].state, TaskState::CompletedOk);
    assert_matches!(
        report.tasks[1].error,
        Some(TaskFailure::Encoder(keeper_av::Error::Launch { .. }))
    );
    assert_eq!(
        log.count(|p| matches!(p, EventPayload::EncoderLaunched { .. })),
        2
    );
}

#[tokio::test]
async fn test_every_failure_is_collected() {
    let (_dir, image) = placeholder_image();
    let log = Arc::new(EventLog::new());
    let template = ScriptTemplate::new("exit 2");

    let err = supervisor(template, &log)
        .run(&image, &keys(&["abc123", "def456", "ghi789"]), &CancellationToken::new())
        .await
        .unwrap_err();

    let message = err.to_string();
    assert!(message.starts_with("3 of 3 encoder(s) failed"), "{message}");
    for key in ["abc123", "def456", "ghi789"] {
        assert!(message.contains(key), "{message}");
    }
}

#[tokio::test]
async fn test_cancel_stops_every_encoder() {
    let (_dir, image) = placeholder_image();
    let log = Arc::new(EventLog::new());
    let cancel = CancellationToken::new();
    let sup = supervisor(ScriptTemplate::new("exec sleep 30"), &log);
    let key_list = keys(&["abc123", "def456", "ghi789"]);

    let run = {
        let cancel = cancel.clone();
        let image = image.clone();
        tokio::spawn(async move { sup.run(&image, &key_list, &cancel).await })
    };

    wait_for_launches(&log, 3).await;
    cancel.cancel();

    let report = tokio::time::timeout(Duration::from_secs(10), run)
        .await
        .expect("run did not stop")
        .unwrap()
        .unwrap();

    assert_eq!(report.cancelled(), 3);
    assert!(report.is_success());
    assert_eq!(
        log.count(|p| matches!(p, EventPayload::ShutdownRequested { .. })),
        1
    );
}

#[tokio::test]
async fn test_repeated_cancel_is_announced_once() {
    let (_dir, image) = placeholder_image();
    let log = Arc::new(EventLog::new());
    let cancel = CancellationToken::new();
    let sup = supervisor(ScriptTemplate::new("exec sleep 30"), &log);
    let key_list = keys(&["abc123"]);

    let run = {
        let cancel = cancel.clone();
        let image = image.clone();
        tokio::spawn(async move { sup.run(&image, &key_list, &cancel).await })
    };

    wait_for_launches(&log, 1).await;
    cancel.cancel();
    cancel.cancel();

    let report = tokio::time::timeout(Duration::from_secs(10), run)
        .await
        .expect("run did not stop")
        .unwrap()
        .unwrap();

    assert_eq!(report.cancelled(), 1);
    assert_eq!(
        log.count(|p| matches!(p, EventPayload::ShutdownRequested { .. })),
        1
    );
}

#[tokio::test]
async fn test_cancel_before_run_launches_nothing() {
    let (_dir, image) = placeholder_image();
    let log = Arc::new(EventLog::new());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let report = supervisor(ScriptTemplate::new("exec sleep 30"), &log)
        .run(&image, &keys(&["abc123", "def456"]), &cancel)
        .await
        .unwrap();

    assert_eq!(report.cancelled(), 2);
    assert_eq!(
        log.count(|p| matches!(p, EventPayload::EncoderLaunched { .. })),
        0
    );
    assert_eq!(
        log.count(|p| matches!(p, EventPayload::TaskStarted { .. })),
        2
    );
}

#[tokio::test]
async fn test_encoder_finishing_before_cancel_stays_ok() {
    let (_dir, image) = placeholder_image();
    let log = Arc::new(EventLog::new());
    let cancel = CancellationToken::new();
    let template = ScriptTemplate::new("exec sleep 30").with_script("quick", "exit 0");
    let sup = supervisor(template, &log);
    let key_list = keys(&["quick", "slow"]);

    let run = {
        let cancel = cancel.clone();
        let image = image.clone();
        tokio::spawn(async move { sup.run(&image, &key_list, &cancel).await })
    };

    tokio::time::timeout(Duration::from_secs(10), async {
        while log.count(|p| matches!(p, EventPayload::TaskFinished { task: 0, .. })) == 0 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("quick encoder did not finish");
    wait_for_launches(&log, 2).await;
    cancel.cancel();

    let report = tokio::time::timeout(Duration::from_secs(10), run)
        .await
        .expect("run did not stop")
        .unwrap()
        .unwrap();

    assert_eq!(report.tasks[0].state, TaskState::CompletedOk);
    assert_eq!(report.tasks[1].state, TaskState::Cancelled);
}

#[tokio::test]
async fn test_encoder_receives_placeholder_and_destination() {
    let (dir, image) = placeholder_image();
    let log = Arc::new(EventLog::new());
    let out = dir.path().join("args.txt");
    let template = ScriptTemplate::new(&format!(
        "echo \"$1 $2\" >> '{}'",
        out.display()
    ));

    supervisor(template, &log)
        .run(&image, &keys(&["abc123"]), &CancellationToken::new())
        .await
        .unwrap();

    let written = std::fs::read_to_string(&out).unwrap();
    assert!(written.contains("placeholder.jpg"), "{written}");
    assert!(
        written.contains("rtmp://a.rtmp.youtube.com/live2/abc123"),
        "{written}"
    );
}
