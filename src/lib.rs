// ==========================================
// 组套排产系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 组套作业排程与情景推演核心 (决策支持, 人工最终控制权)
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{ChangeOperation, DomainError, JobStatus};

// 领域实体
pub use domain::{ChangeData, Delay, Job, MinuteOfDay, RouteStep, Scenario, ScenarioChange, Shift};

// 引擎
pub use engine::{
    DayPartitioner, DaySegment, DurationEngine, EngineError, ForwardScheduler, ScenarioEngine,
    ShiftCalendar, SkippedEntry,
};

// API
pub use api::{ApiError, ScenarioApi, ScheduleApi, ScheduledSpan};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "组套排产系统";

// ==========================================
// 预编译检查
// ==========================================
