// ==========================================
// ICP 分析质控系统 - 命令行入口
// ==========================================
// 用法:
//   icp-qc-pipeline <csv_path> [project_id] [config.json] [settings.json]
// 流程: 导入 CSV → 全量质控 → 汇总 + 透视报表（JSON 输出到 stdout）
// 存储: 进程内内存仓储
// ==========================================

use anyhow::Context;
use icp_qc_pipeline::config::ConfigManager;
use icp_qc_pipeline::domain::ProjectSettings;
use icp_qc_pipeline::engine::ElementOrder;
use icp_qc_pipeline::repository::{InMemoryCurveStore, InMemorySampleStore};
use icp_qc_pipeline::{logging, QcApi, APP_NAME, VERSION};
use std::path::PathBuf;
use std::sync::Arc;

const USAGE: &str =
    "用法: icp-qc-pipeline <csv_path> [project_id] [config.json] [settings.json]";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志系统
    logging::init();

    let mut args = std::env::args().skip(1);
    let csv_path = match args.next() {
        Some(path) => PathBuf::from(path),
        None => {
            eprintln!("{}", USAGE);
            std::process::exit(2);
        }
    };
    let project_id = args
        .next()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "default".to_string());

    let config = match args.next() {
        Some(path) => ConfigManager::from_json_file(&path)
            .with_context(|| format!("配置文件加载失败: {}", path))?,
        None => ConfigManager::new(),
    };

    let settings: ProjectSettings = match args.next() {
        Some(path) => {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("项目设置读取失败: {}", path))?;
            serde_json::from_str(&raw).with_context(|| format!("项目设置格式错误: {}", path))?
        }
        None => ProjectSettings::default(),
    };

    tracing::info!("==================================================");
    tracing::info!("{} v{}", APP_NAME, VERSION);
    tracing::info!("==================================================");

    // 内存仓储
    let samples = Arc::new(InMemorySampleStore::new());
    samples.register_project(&project_id, settings.clone())?;
    let curves = Arc::new(InMemoryCurveStore::new());
    let api = QcApi::new(samples, curves, Arc::new(config));

    // 导入
    let outcome = api.import_csv(&csv_path, &project_id).await?;

    // 质控（自动质控已运行时不重复）
    let evaluated = match outcome.checks_evaluated {
        Some(n) => n,
        None => api.run_all_checks(&project_id).await?,
    };

    let summary = api.get_summary(&project_id).await?;
    let report = api
        .build_pivot_report(&project_id, ElementOrder::FirstSeen)
        .await?;

    let output = serde_json::json!({
        "import": outcome,
        "checks_evaluated": evaluated,
        "summary": summary,
        "report": report,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}
