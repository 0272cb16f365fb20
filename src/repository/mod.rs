// ==========================================
// 组套排产系统 - 仓储层
// ==========================================
// 职责: SQLite 数据访问, 行映射, 事务编排
// 红线: Repository 不含业务逻辑
// 红线: 行映射失败必须上抛转换错误, 禁止静默回退默认值
// ==========================================

pub mod delay_repo;
pub mod error;
pub mod job_repo;
pub mod scenario_repo;
pub mod shift_repo;

pub use delay_repo::DelayRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use job_repo::JobRepository;
pub use scenario_repo::ScenarioRepository;
pub use shift_repo::ShiftRepository;

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::types::Type;
use serde::de::DeserializeOwned;

/// 时间戳列的存储格式
pub(crate) const DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";
/// 日期列的存储格式
pub(crate) const DATE_FMT: &str = "%Y-%m-%d";

/// 解析时间戳列, 失败转为 rusqlite 列转换错误
pub(crate) fn parse_datetime_col(idx: usize, raw: &str) -> rusqlite::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, DATETIME_FMT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// 解析日期列, 失败转为 rusqlite 列转换错误
pub(crate) fn parse_date_col(idx: usize, raw: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, DATE_FMT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// 解析 JSON 列, 失败转为 rusqlite 列转换错误
pub(crate) fn parse_json_col<T: DeserializeOwned>(idx: usize, raw: &str) -> rusqlite::Result<T> {
    serde_json::from_str(raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
