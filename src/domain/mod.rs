// ==========================================
// 组套排产系统 - 领域层
// ==========================================
// 职责: 实体与值类型定义, 仅含校验与派生访问器
// 红线: 领域对象是计算的只读快照, 引擎返回新快照
// ==========================================

pub mod delay;
pub mod job;
pub mod scenario;
pub mod shift;
pub mod time_of_day;
pub mod types;

// 重导出核心类型
pub use delay::Delay;
pub use job::{Job, RouteStep};
pub use scenario::{ChangeData, Scenario, ScenarioChange};
pub use shift::Shift;
pub use time_of_day::MinuteOfDay;
pub use types::{ChangeOperation, DomainError, JobStatus};
