// ==========================================
// ICP 分析质控系统 - 导入层
// ==========================================
// 职责: 外部仪器导出 → 样品，驱动导入任务进度
// 支持: CSV；其他格式实现 RowDecoder 即可接入
// ==========================================

// 模块声明
pub mod error;
pub mod field_mapper;
pub mod file_parser;
pub mod sample_importer;

// 重导出核心类型
pub use error::{ImportError, ImportResult};
pub use field_mapper::{MappedRow, SampleAssembler, SampleFieldMapper, SourceField};
pub use file_parser::{CsvRowDecoder, RawRow, RowDecoder};
pub use sample_importer::{ImportOutcome, SampleImporter};
