// ==========================================
// 组套排产系统 - 配置层
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

pub mod config_manager;

pub use config_manager::ConfigManager;

/// 配置键常量
pub mod config_keys {
    /// 前向排程向后搜索日数上限
    pub const MAX_SEARCH_DAYS: &str = "max_search_days";
    /// 情景推演是否忽略班次启用标记
    pub const SCENARIO_IGNORE_ACTIVE_FLAG: &str = "scenario_ignore_active_flag";
}

/// 配置默认值
pub mod config_defaults {
    /// 搜索日数上限默认值
    pub const MAX_SEARCH_DAYS: i64 = 400;
    /// 情景推演默认忽略启用标记
    pub const SCENARIO_IGNORE_ACTIVE_FLAG: bool = true;
}
