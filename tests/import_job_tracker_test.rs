// ==========================================
// 导入任务跟踪器测试
// ==========================================
// 测试目标: 状态机转移、进度单调、并发推进、取消语义
// ==========================================

use icp_qc_pipeline::domain::ImportJobState;
use icp_qc_pipeline::engine::{EngineError, ImportJobTracker, CANCELLED_MESSAGE};
use icp_qc_pipeline::logging;

#[test]
fn test_full_lifecycle_snapshots() {
    logging::init_test();

    let tracker = ImportJobTracker::new();
    let job_id = tracker.create(200).unwrap();

    let status = tracker.status(&job_id).unwrap();
    assert_eq!(status.state, ImportJobState::Pending);
    assert_eq!(status.processed_rows, 0);
    assert!(status.started_at.is_none());

    let status = tracker.start(&job_id).unwrap();
    assert_eq!(status.state, ImportJobState::Running);
    assert!(status.started_at.is_some());

    let mut last_percent = 0.0;
    for _ in 0..4 {
        let status = tracker.advance(&job_id, 50).unwrap();
        assert!(status.percent >= last_percent);
        last_percent = status.percent;
    }
    assert_eq!(last_percent, 100.0);

    let status = tracker.complete(&job_id, "P1").unwrap();
    assert_eq!(status.state, ImportJobState::Completed);
    assert!(status.finished_at.is_some());
    assert!(status.state.is_terminal());
}

#[test]
fn test_advance_requires_running() {
    let tracker = ImportJobTracker::new();
    let job_id = tracker.create(10).unwrap();

    assert!(matches!(
        tracker.advance(&job_id, 1),
        Err(EngineError::InvalidState { .. })
    ));
    assert!(matches!(
        tracker.complete(&job_id, "P1"),
        Err(EngineError::InvalidState { .. })
    ));
}

#[test]
fn test_cancel_keeps_processed_rows() {
    let tracker = ImportJobTracker::new();
    let job_id = tracker.create(100).unwrap();
    tracker.start(&job_id).unwrap();
    tracker.advance(&job_id, 30).unwrap();

    let status = tracker.cancel(&job_id).unwrap();
    assert_eq!(status.state, ImportJobState::Failed);
    assert_eq!(status.message.as_deref(), Some(CANCELLED_MESSAGE));
    assert_eq!(status.processed_rows, 30);

    assert!(tracker.start(&job_id).is_err());
    assert!(tracker.advance(&job_id, 1).is_err());
}

#[test]
fn test_pending_job_can_fail_and_list_is_ordered() {
    let tracker = ImportJobTracker::new();
    let first = tracker.create(1).unwrap();
    let second = tracker.create(2).unwrap();

    tracker.fail(&first, "文件损坏").unwrap();

    let jobs = tracker.list().unwrap();
    assert_eq!(jobs.len(), 2);
    assert!(jobs[0].created_at <= jobs[1].created_at);
    let failed = jobs.iter().find(|j| j.job_id == first).unwrap();
    assert_eq!(failed.state, ImportJobState::Failed);
    let pending = jobs.iter().find(|j| j.job_id == second).unwrap();
    assert_eq!(pending.state, ImportJobState::Pending);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_advance_is_serialized_per_job() {
    logging::init_test();

    let tracker = ImportJobTracker::new();
    let job_id = tracker.create(1_000).unwrap();
    tracker.start(&job_id).unwrap();

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let tracker = tracker.clone();
            let job_id = job_id.clone();
            tokio::spawn(async move {
                let mut seen = Vec::with_capacity(100);
                for _ in 0..100 {
                    seen.push(tracker.advance(&job_id, 1).unwrap().processed_rows);
                    tokio::task::yield_now().await;
                }
                seen
            })
        })
        .collect();

    for handle in handles {
        let seen = handle.await.unwrap();
        // 单个写者观察到的进度严格递增
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
    }

    let status = tracker.status(&job_id).unwrap();
    assert_eq!(status.processed_rows, 1_000);
    assert_eq!(status.percent, 100.0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_independent_jobs_do_not_interfere() {
    let tracker = ImportJobTracker::new();
    let a = tracker.create(10).unwrap();
    let b = tracker.create(10).unwrap();
    tracker.start(&a).unwrap();
    tracker.start(&b).unwrap();

    let (ta, tb) = (tracker.clone(), tracker.clone());
    let (ja, jb) = (a.clone(), b.clone());
    let fa = tokio::spawn(async move { ta.advance(&ja, 7).unwrap() });
    let fb = tokio::spawn(async move { tb.cancel(&jb).unwrap() });
    fa.await.unwrap();
    fb.await.unwrap();

    assert_eq!(tracker.status(&a).unwrap().processed_rows, 7);
    assert_eq!(tracker.status(&a).unwrap().state, ImportJobState::Running);
    assert_eq!(tracker.status(&b).unwrap().state, ImportJobState::Failed);
}
