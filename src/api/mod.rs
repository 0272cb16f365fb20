// ==========================================
// 组套排产系统 - API 层
// ==========================================
// 职责: 业务接口编排 - 装载数据, 调用引擎, 落盘结果
// 红线: API 层不做排程算术, 不绕过仓储直接写库
// ==========================================

pub mod error;
pub mod scenario_api;
pub mod schedule_api;

pub use error::{ApiError, ApiResult};
pub use scenario_api::{CommitOutcome, ScenarioApi, ScenarioJobView, ScenarioView};
pub use schedule_api::{ScheduleApi, ScheduledSpan};
