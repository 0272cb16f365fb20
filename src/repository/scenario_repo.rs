// ==========================================
// 组套排产系统 - 情景仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 红线: scenario_change 只追加; 读取按 (created_at, seq_no) 升序
// 删除情景时变更日志由外键 ON DELETE CASCADE 级联清除
// ==========================================

use crate::domain::scenario::{ChangeData, Scenario, ScenarioChange};
use crate::domain::types::ChangeOperation;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::{parse_datetime_col, parse_json_col, DATETIME_FMT};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};
use serde_json::Value as JsonValue;
use std::sync::{Arc, Mutex};

// ==========================================
// ScenarioRepository - 情景仓储
// ==========================================

/// 情景仓储
/// 职责: 管理scenario与scenario_change表
pub struct ScenarioRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ScenarioRepository {
    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 行映射: scenario 表 -> Scenario
    fn map_scenario_row(row: &Row) -> SqliteResult<Scenario> {
        Ok(Scenario {
            scenario_id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            is_active: row.get::<_, i64>(3)? != 0,
            created_at: parse_datetime_col(4, &row.get::<_, String>(4)?)?,
            updated_at: parse_datetime_col(5, &row.get::<_, String>(5)?)?,
        })
    }

    /// 行映射: scenario_change 表 -> ScenarioChange
    fn map_change_row(row: &Row) -> SqliteResult<ScenarioChange> {
        let op_raw: String = row.get(3)?;
        let operation = ChangeOperation::parse(&op_raw).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                3,
                Type::Text,
                format!("未知变更操作: {}", op_raw).into(),
            )
        })?;
        let change_data: ChangeData = parse_json_col(4, &row.get::<_, String>(4)?)?;
        let original_data: Option<JsonValue> = match row.get::<_, Option<String>>(5)? {
            Some(raw) => Some(parse_json_col(5, &raw)?),
            None => None,
        };

        Ok(ScenarioChange {
            change_id: row.get(0)?,
            scenario_id: row.get(1)?,
            job_id: row.get(2)?,
            operation,
            change_data,
            original_data,
            seq_no: row.get(6)?,
            created_at: parse_datetime_col(7, &row.get::<_, String>(7)?)?,
        })
    }

    // ===== 情景 CRUD =====

    /// 插入或更新情景
    pub fn upsert_scenario(&self, scenario: &Scenario) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT OR REPLACE INTO scenario (
                scenario_id, name, description, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                scenario.scenario_id,
                scenario.name,
                scenario.description,
                scenario.is_active as i64,
                scenario.created_at.format(DATETIME_FMT).to_string(),
                scenario.updated_at.format(DATETIME_FMT).to_string(),
            ],
        )?;
        Ok(())
    }

    /// 按ID查询情景
    pub fn find_scenario(&self, scenario_id: &str) -> RepositoryResult<Option<Scenario>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT scenario_id, name, description, is_active, created_at, updated_at
            FROM scenario WHERE scenario_id = ?1
            "#,
        )?;
        let scenario = stmt
            .query_row(params![scenario_id], Self::map_scenario_row)
            .optional()?;
        Ok(scenario)
    }

    /// 查询全部情景
    pub fn list_scenarios(&self) -> RepositoryResult<Vec<Scenario>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT scenario_id, name, description, is_active, created_at, updated_at
            FROM scenario ORDER BY created_at, scenario_id
            "#,
        )?;
        let scenarios = stmt
            .query_map([], Self::map_scenario_row)?
            .collect::<SqliteResult<Vec<Scenario>>>()?;
        Ok(scenarios)
    }

    /// 删除情景 (变更日志级联清除)
    ///
    /// # 返回
    /// - Ok(true): 已删除
    /// - Ok(false): 记录不存在
    pub fn delete_scenario(&self, scenario_id: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "DELETE FROM scenario WHERE scenario_id = ?1",
            params![scenario_id],
        )?;
        Ok(affected > 0)
    }

    // ===== 变更日志 =====

    /// 追加变更行 (只增不改)
    ///
    /// seq_no 取该情景现有最大值 + 1, 同一时间戳内保序。
    pub fn append_change(&self, change: &ScenarioChange) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;

        let next_seq: i64 = conn.query_row(
            "SELECT COALESCE(MAX(seq_no), 0) + 1 FROM scenario_change WHERE scenario_id = ?1",
            params![change.scenario_id],
            |row| row.get(0),
        )?;

        let change_data_json = serde_json::to_string(&change.change_data)
            .map_err(|e| RepositoryError::InternalError(e.to_string()))?;
        let original_json = match &change.original_data {
            Some(v) => Some(
                serde_json::to_string(v)
                    .map_err(|e| RepositoryError::InternalError(e.to_string()))?,
            ),
            None => None,
        };

        conn.execute(
            r#"
            INSERT INTO scenario_change (
                change_id, scenario_id, job_id, operation, change_data,
                original_data, seq_no, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                change.change_id,
                change.scenario_id,
                change.job_id,
                change.operation.as_str(),
                change_data_json,
                original_json,
                next_seq,
                change.created_at.format(DATETIME_FMT).to_string(),
            ],
        )?;

        Ok(next_seq)
    }

    /// 按重放顺序读取某情景的变更日志
    pub fn find_changes(&self, scenario_id: &str) -> RepositoryResult<Vec<ScenarioChange>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT change_id, scenario_id, job_id, operation, change_data,
                   original_data, seq_no, created_at
            FROM scenario_change
            WHERE scenario_id = ?1
            ORDER BY created_at, seq_no
            "#,
        )?;
        let changes = stmt
            .query_map(params![scenario_id], Self::map_change_row)?
            .collect::<SqliteResult<Vec<ScenarioChange>>>()?;
        Ok(changes)
    }

    /// 统计某情景的变更行数
    pub fn count_changes(&self, scenario_id: &str) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM scenario_change WHERE scenario_id = ?1",
            params![scenario_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}
