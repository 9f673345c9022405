// ==========================================
// 并发导入测试
// ==========================================
// 测试目标: 多任务并发导入互不干扰；同一项目并发/重复导入样品编号不冲突
// ==========================================

mod test_helpers;

use icp_qc_pipeline::config::ConfigManager;
use icp_qc_pipeline::domain::{CheckType, ImportJobState, ProjectSettings};
use icp_qc_pipeline::engine::ImportJobTracker;
use icp_qc_pipeline::importer::{CsvRowDecoder, ImportError, SampleImporter};
use icp_qc_pipeline::logging;
use icp_qc_pipeline::repository::{
    InMemoryCurveStore, InMemorySampleStore, RepositoryError, SampleStore,
};
use std::collections::HashSet;
use std::sync::Arc;
use test_helpers::{create_orchestrator, create_stores, write_csv, PROJECT};

type TestImporter = SampleImporter<InMemorySampleStore, InMemoryCurveStore, ConfigManager>;

const PROJECT_B: &str = "P2";

fn sample_lines(prefix: &str, count: usize) -> Vec<String> {
    let mut lines = vec!["Solution Label,Type,Weight,Element,Intensity".to_string()];
    for i in 0..count {
        lines.push(format!("{}-{:03},Sample,0.25,Cu63,{}", prefix, i, 100 + i));
        lines.push(format!("{}-{:03},Sample,0.25,Zn66,{}", prefix, i, 200 + i));
    }
    lines
}

fn create_importer(
    tracker: &ImportJobTracker,
    samples: &Arc<InMemorySampleStore>,
    curves: &Arc<InMemoryCurveStore>,
    config: &Arc<ConfigManager>,
) -> TestImporter {
    SampleImporter::new(
        tracker.clone(),
        Arc::clone(samples),
        Arc::new(create_orchestrator(samples, curves, config)),
        Arc::clone(config),
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_imports_into_two_projects() {
    logging::init_test();

    let (samples, curves, config) = create_stores(ProjectSettings::default());
    samples
        .register_project(PROJECT_B, ProjectSettings::default())
        .unwrap();
    config
        .set_config_value("import_progress_batch_size", "7")
        .unwrap();

    let tracker = ImportJobTracker::new();
    let importer = Arc::new(create_importer(&tracker, &samples, &curves, &config));

    let lines_a = sample_lines("A", 40);
    let lines_b = sample_lines("B", 25);
    let csv_a = write_csv(&lines_a.iter().map(String::as_str).collect::<Vec<_>>());
    let csv_b = write_csv(&lines_b.iter().map(String::as_str).collect::<Vec<_>>());

    let (a, b) = tokio::join!(
        importer.import_file(&CsvRowDecoder, csv_a.path(), PROJECT),
        importer.import_file(&CsvRowDecoder, csv_b.path(), PROJECT_B),
    );
    let a = a.expect("import A failed");
    let b = b.expect("import B failed");

    assert_ne!(a.job.job_id, b.job.job_id);
    assert_eq!(a.samples_imported, 40);
    assert_eq!(b.samples_imported, 25);
    assert_eq!(a.job.processed_rows, 80);
    assert_eq!(b.job.processed_rows, 50);

    let jobs = tracker.list().unwrap();
    assert_eq!(jobs.len(), 2);
    assert!(jobs.iter().all(|j| j.state == ImportJobState::Completed));

    let stored_a = samples.list_samples(PROJECT).await.unwrap();
    let stored_b = samples.list_samples(PROJECT_B).await.unwrap();
    assert!(stored_a.iter().all(|s| s.solution_label.starts_with("A-")));
    assert!(stored_b.iter().all(|s| s.solution_label.starts_with("B-")));
}

#[tokio::test]
async fn test_reimport_same_project_keeps_ids_unique() {
    let (samples, curves, config) = create_stores(ProjectSettings::default());
    let tracker = ImportJobTracker::new();
    let importer = create_importer(&tracker, &samples, &curves, &config);

    let first = sample_lines("R1", 3);
    let second = sample_lines("R2", 2);
    let csv_first = write_csv(&first.iter().map(String::as_str).collect::<Vec<_>>());
    let csv_second = write_csv(&second.iter().map(String::as_str).collect::<Vec<_>>());

    importer
        .import_file(&CsvRowDecoder, csv_first.path(), PROJECT)
        .await
        .unwrap();
    importer
        .import_file(&CsvRowDecoder, csv_second.path(), PROJECT)
        .await
        .unwrap();

    let stored = samples.list_samples(PROJECT).await.unwrap();
    assert_eq!(stored.len(), 5);

    let ids: HashSet<&str> = stored.iter().map(|s| s.sample_id.as_str()).collect();
    assert_eq!(ids.len(), 5);

    let sequences: Vec<usize> = stored.iter().map(|s| s.sequence_no).collect();
    assert_eq!(sequences, vec![0, 1, 2, 3, 4]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_imports_into_same_project_keep_every_sample() {
    logging::init_test();

    let (samples, curves, config) = create_stores(ProjectSettings::default());
    config
        .set_config_value("import_progress_batch_size", "2")
        .unwrap();
    let tracker = ImportJobTracker::new();
    let importer = Arc::new(create_importer(&tracker, &samples, &curves, &config));

    let lines_a = sample_lines("A", 3);
    let lines_b = sample_lines("B", 3);
    let csv_a = write_csv(&lines_a.iter().map(String::as_str).collect::<Vec<_>>());
    let csv_b = write_csv(&lines_b.iter().map(String::as_str).collect::<Vec<_>>());

    let (a, b) = tokio::join!(
        importer.import_file(&CsvRowDecoder, csv_a.path(), PROJECT),
        importer.import_file(&CsvRowDecoder, csv_b.path(), PROJECT),
    );
    assert_eq!(a.expect("import A failed").samples_imported, 3);
    assert_eq!(b.expect("import B failed").samples_imported, 3);

    let stored = samples.list_samples(PROJECT).await.unwrap();
    assert_eq!(stored.len(), 6);
    let ids: HashSet<&str> = stored.iter().map(|s| s.sample_id.as_str()).collect();
    assert_eq!(ids.len(), 6);
    let sequences: HashSet<usize> = stored.iter().map(|s| s.sequence_no).collect();
    assert_eq!(sequences.len(), 6);

    let orchestrator = create_orchestrator(&samples, &curves, &config);
    let evaluated = orchestrator
        .run_check(PROJECT, CheckType::WeightCheck)
        .await
        .unwrap();
    assert_eq!(evaluated, 6);
    let summary = orchestrator.get_summary(PROJECT).await.unwrap();
    assert_eq!(summary.total, 6);
}

#[tokio::test]
async fn test_reimport_with_explicit_ids_is_rejected() {
    let (samples, curves, config) = create_stores(ProjectSettings::default());
    let tracker = ImportJobTracker::new();
    let importer = create_importer(&tracker, &samples, &curves, &config);

    let csv = write_csv(&[
        "Sample Id,Solution Label,Type,Element,Intensity",
        "LIMS-1,SOIL-01,Sample,Cu63,100",
        "LIMS-2,SOIL-02,Sample,Cu63,120",
    ]);

    importer
        .import_file(&CsvRowDecoder, csv.path(), PROJECT)
        .await
        .unwrap();
    let err = importer
        .import_file(&CsvRowDecoder, csv.path(), PROJECT)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ImportError::Repository(RepositoryError::AlreadyExists { .. })
    ));

    // 首次导入的样品保持原样，未被覆盖或重复
    let stored = samples.list_samples(PROJECT).await.unwrap();
    assert_eq!(stored.len(), 2);

    let jobs = tracker.list().unwrap();
    assert_eq!(jobs.len(), 2);
    assert_eq!(
        jobs.iter()
            .filter(|j| j.state == ImportJobState::Failed)
            .count(),
        1
    );
}
