// ==========================================
// 组套排产系统 - 引擎层错误类型
// ==========================================
// 工具: thiserror 派生宏
// 红线: 预期内的失败(无可用班次/悬空引用)是数据不是异常;
//       悬空引用走跳过清单, 不进本错误类型
// ==========================================

use crate::domain::types::DomainError;
use thiserror::Error;

/// 引擎层错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    // ===== 输入错误 =====
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Domain(#[from] DomainError),

    // ===== 排程失败 =====
    /// 作业的可用班次集合为空, 或在日数上限内找不到任何生产窗口。
    /// 单次 schedule_forward 调用级失败; 是否退化为 24/7 朴素排程由调用方决定。
    #[error("无可用班次: 在 {searched_days} 天内未找到生产窗口")]
    NoEligibleShifts { searched_days: i64 },
}

/// Result 类型别名
pub type EngineResult<T> = Result<T, EngineError>;
