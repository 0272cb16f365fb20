// ==========================================
// 组套排产系统 - 延误仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// scenario_id 为 NULL = 生产延误; 情景提交时整批置 NULL (转正)
// ==========================================

use crate::domain::delay::Delay;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::{parse_datetime_col, DATETIME_FMT};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

// ==========================================
// DelayRepository - 延误仓储
// ==========================================

/// 延误仓储
/// 职责: 管理delay表的CRUD操作与情景延误转正
pub struct DelayRepository {
    conn: Arc<Mutex<Connection>>,
}

impl DelayRepository {
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

    const SELECT_COLS: &'static str = r#"
        delay_id, scenario_id, job_id, name, duration_s,
        insert_after_step_order, created_at
    "#;

    /// 行映射: delay 表 -> Delay
    fn map_row(row: &Row) -> SqliteResult<Delay> {
        Ok(Delay {
            delay_id: row.get(0)?,
            scenario_id: row.get(1)?,
            job_id: row.get(2)?,
            name: row.get(3)?,
            duration_s: row.get(4)?,
            insert_after_step_order: row.get(5)?,
            created_at: parse_datetime_col(6, &row.get::<_, String>(6)?)?,
        })
    }

    /// 插入延误 (延误一经写入不可修改, 只增删)
    pub fn insert(&self, delay: &Delay) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO delay (
                delay_id, scenario_id, job_id, name, duration_s,
                insert_after_step_order, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                delay.delay_id,
                delay.scenario_id,
                delay.job_id,
                delay.name,
                delay.duration_s,
                delay.insert_after_step_order,
                delay.created_at.format(DATETIME_FMT).to_string(),
            ],
        )?;
        Ok(())
    }

    /// 按ID查询延误
    pub fn find_by_id(&self, delay_id: &str) -> RepositoryResult<Option<Delay>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM delay WHERE delay_id = ?1", Self::SELECT_COLS);
        let mut stmt = conn.prepare(&sql)?;
        let delay = stmt.query_row(params![delay_id], Self::map_row).optional()?;
        Ok(delay)
    }

    /// 查询全部生产延误 (scenario_id IS NULL)
    pub fn find_production(&self) -> RepositoryResult<Vec<Delay>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM delay WHERE scenario_id IS NULL ORDER BY created_at, delay_id",
            Self::SELECT_COLS
        );
        let mut stmt = conn.prepare(&sql)?;
        let delays = stmt
            .query_map([], Self::map_row)?
            .collect::<SqliteResult<Vec<Delay>>>()?;
        Ok(delays)
    }

    /// 查询某作业的生产延误
    pub fn find_production_by_job(&self, job_id: &str) -> RepositoryResult<Vec<Delay>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM delay WHERE scenario_id IS NULL AND job_id = ?1 ORDER BY created_at, delay_id",
            Self::SELECT_COLS
        );
        let mut stmt = conn.prepare(&sql)?;
        let delays = stmt
            .query_map(params![job_id], Self::map_row)?
            .collect::<SqliteResult<Vec<Delay>>>()?;
        Ok(delays)
    }

    /// 查询某情景的推演延误
    pub fn find_by_scenario(&self, scenario_id: &str) -> RepositoryResult<Vec<Delay>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM delay WHERE scenario_id = ?1 ORDER BY created_at, delay_id",
            Self::SELECT_COLS
        );
        let mut stmt = conn.prepare(&sql)?;
        let delays = stmt
            .query_map(params![scenario_id], Self::map_row)?
            .collect::<SqliteResult<Vec<Delay>>>()?;
        Ok(delays)
    }

    /// 情景延误转正: 提交时整批置 scenario_id 为 NULL
    ///
    /// # 返回
    /// - Ok(usize): 转正的延误数
    pub fn promote_to_production(&self, scenario_id: &str) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "UPDATE delay SET scenario_id = NULL WHERE scenario_id = ?1",
            params![scenario_id],
        )?;
        Ok(affected)
    }

    /// 删除某情景的全部推演延误 (丢弃情景时)
    pub fn delete_by_scenario(&self, scenario_id: &str) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "DELETE FROM delay WHERE scenario_id = ?1",
            params![scenario_id],
        )?;
        Ok(affected)
    }

    /// 批量删除指定作业的全部延误 (作业从基线物理移除时同步清理)
    ///
    /// # 返回
    /// - Ok(usize): 删除的延误行数
    pub fn delete_by_jobs(&self, job_ids: &[String]) -> RepositoryResult<usize> {
        if job_ids.is_empty() {
            return Ok(0);
        }
        let conn = self.get_conn()?;
        conn.execute("BEGIN TRANSACTION", [])?;
        let mut deleted = 0;
        for job_id in job_ids {
            match conn.execute("DELETE FROM delay WHERE job_id = ?1", params![job_id]) {
                Ok(affected) => deleted += affected,
                Err(e) => {
                    conn.execute("ROLLBACK", [])?;
                    return Err(e.into());
                }
            }
        }
        conn.execute("COMMIT", [])?;
        Ok(deleted)
    }

    /// 删除延误
    pub fn delete(&self, delay_id: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let affected = conn.execute("DELETE FROM delay WHERE delay_id = ?1", params![delay_id])?;
        Ok(affected > 0)
    }
}
