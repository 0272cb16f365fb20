// ==========================================
// 组套排产系统 - 引擎层
// ==========================================
// 职责: 纯业务规则, 只在内存快照上计算
// 红线: 引擎不触碰数据库; 数据装载与落盘由 API 层编排
// ==========================================

pub mod calendar;
pub mod duration;
pub mod error;
pub mod partitioner;
pub mod scenario;
pub mod scheduler;

// 重导出核心类型
pub use calendar::{ShiftCalendar, DAY_END};
pub use duration::DurationEngine;
pub use error::{EngineError, EngineResult};
pub use partitioner::{DayPartitioner, DaySegment};
pub use scenario::{CommitResult, MaterializeResult, ScenarioEngine, SkippedEntry};
pub use scheduler::{ForwardScheduler, DEFAULT_MAX_SEARCH_DAYS};
