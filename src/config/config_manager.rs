// ==========================================
// 组套排产系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// 口径: 配置缺失/解析失败回退默认值并记 warn, 不让业务流程失败
// ==========================================

use crate::config::{config_defaults, config_keys};
use crate::db::configure_sqlite_connection;
use rusqlite::{params, Connection};
use std::error::Error;
use std::sync::{Arc, Mutex};
use tracing::warn;

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, Box<dyn Error>> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    fn get_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 写入配置值（scope_id='global'）
    pub fn set_config_value(&self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        conn.execute(
            r#"
            INSERT INTO config_kv (scope_id, key, value, updated_at)
            VALUES ('global', ?1, ?2, datetime('now'))
            ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')
            "#,
            params![key, value],
        )?;
        Ok(())
    }

    /// 排程搜索日数上限
    pub fn get_max_search_days(&self) -> i64 {
        match self.get_config_value(config_keys::MAX_SEARCH_DAYS) {
            Ok(Some(raw)) => match raw.trim().parse::<i64>() {
                Ok(v) if v > 0 => v,
                _ => {
                    warn!("配置 {} 值非法: {}, 使用默认值", config_keys::MAX_SEARCH_DAYS, raw);
                    config_defaults::MAX_SEARCH_DAYS
                }
            },
            Ok(None) => config_defaults::MAX_SEARCH_DAYS,
            Err(e) => {
                warn!("读取配置 {} 失败: {}, 使用默认值", config_keys::MAX_SEARCH_DAYS, e);
                config_defaults::MAX_SEARCH_DAYS
            }
        }
    }

    /// 情景推演是否忽略班次启用标记
    pub fn get_scenario_ignore_active_flag(&self) -> bool {
        match self.get_config_value(config_keys::SCENARIO_IGNORE_ACTIVE_FLAG) {
            Ok(Some(raw)) => match raw.trim().to_lowercase().as_str() {
                "true" | "1" => true,
                "false" | "0" => false,
                _ => {
                    warn!(
                        "配置 {} 值非法: {}, 使用默认值",
                        config_keys::SCENARIO_IGNORE_ACTIVE_FLAG, raw
                    );
                    config_defaults::SCENARIO_IGNORE_ACTIVE_FLAG
                }
            },
            Ok(None) => config_defaults::SCENARIO_IGNORE_ACTIVE_FLAG,
            Err(e) => {
                warn!(
                    "读取配置 {} 失败: {}, 使用默认值",
                    config_keys::SCENARIO_IGNORE_ACTIVE_FLAG, e
                );
                config_defaults::SCENARIO_IGNORE_ACTIVE_FLAG
            }
        }
    }
}
