// ==========================================
// 组套排产系统 - 组套作业仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 口径: job 表只存基线, 情景叠加标记是视图层派生字段不落库
// 嵌套字段 (route_steps / allowed_shift_ids) 以 JSON 文本存储
// ==========================================

use crate::domain::job::{Job, RouteStep};
use crate::domain::time_of_day::MinuteOfDay;
use crate::domain::types::JobStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::{parse_date_col, parse_datetime_col, parse_json_col, DATETIME_FMT, DATE_FMT};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

// ==========================================
// JobRepository - 组套作业仓储
// ==========================================

/// 组套作业仓储
/// 职责: 管理job表的CRUD操作与提交回写
pub struct JobRepository {
    conn: Arc<Mutex<Connection>>,
}

impl JobRepository {
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
        job_id, job_number, customer_name, ordered_quantity, station_count,
        expected_kit_duration_s, expected_job_duration_s, setup_s, make_ready_s,
        take_down_s, route_steps, allowed_shift_ids, include_weekends,
        scheduled_date, scheduled_start_time, status, created_at, updated_at
    "#;

    /// 行映射: job 表 -> Job (情景标记恒为空)
    fn map_row(row: &Row) -> SqliteResult<Job> {
        let route_steps: Vec<RouteStep> = parse_json_col(10, &row.get::<_, String>(10)?)?;
        let allowed_shift_ids: BTreeSet<String> = parse_json_col(11, &row.get::<_, String>(11)?)?;

        let scheduled_date = match row.get::<_, Option<String>>(13)? {
            Some(raw) => Some(parse_date_col(13, &raw)?),
            None => None,
        };
        let scheduled_start_time = match row.get::<_, Option<String>>(14)? {
            Some(raw) => Some(MinuteOfDay::parse(&raw).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(14, Type::Text, Box::new(e))
            })?),
            None => None,
        };
        let status_raw: String = row.get(15)?;
        let status = JobStatus::parse(&status_raw).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                15,
                Type::Text,
                format!("未知作业状态: {}", status_raw).into(),
            )
        })?;

        Ok(Job {
            job_id: row.get(0)?,
            job_number: row.get(1)?,
            customer_name: row.get(2)?,
            ordered_quantity: row.get(3)?,
            station_count: row.get(4)?,
            expected_kit_duration_s: row.get(5)?,
            expected_job_duration_s: row.get(6)?,
            setup_s: row.get(7)?,
            make_ready_s: row.get(8)?,
            take_down_s: row.get(9)?,
            route_steps,
            allowed_shift_ids,
            include_weekends: row.get::<_, i64>(12)? != 0,
            scheduled_date,
            scheduled_start_time,
            status,
            scenario_id: None,
            scenario_name: None,
            scenario_deleted: false,
            created_at: parse_datetime_col(16, &row.get::<_, String>(16)?)?,
            updated_at: parse_datetime_col(17, &row.get::<_, String>(17)?)?,
        })
    }

    /// 在连接上执行单条 upsert (供批量接口复用)
    fn upsert_on(conn: &Connection, job: &Job) -> RepositoryResult<()> {
        let route_steps_json = serde_json::to_string(&job.route_steps)
            .map_err(|e| RepositoryError::InternalError(e.to_string()))?;
        let allowed_json = serde_json::to_string(&job.allowed_shift_ids)
            .map_err(|e| RepositoryError::InternalError(e.to_string()))?;

        conn.execute(
            r#"
            INSERT OR REPLACE INTO job (
                job_id, job_number, customer_name, ordered_quantity, station_count,
                expected_kit_duration_s, expected_job_duration_s, setup_s, make_ready_s,
                take_down_s, route_steps, allowed_shift_ids, include_weekends,
                scheduled_date, scheduled_start_time, status, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)
            "#,
            params![
                job.job_id,
                job.job_number,
                job.customer_name,
                job.ordered_quantity,
                job.station_count,
                job.expected_kit_duration_s,
                job.expected_job_duration_s,
                job.setup_s,
                job.make_ready_s,
                job.take_down_s,
                route_steps_json,
                allowed_json,
                job.include_weekends as i64,
                job.scheduled_date.map(|d| d.format(DATE_FMT).to_string()),
                job.scheduled_start_time.map(|t| t.to_string()),
                job.status.as_str(),
                job.created_at.format(DATETIME_FMT).to_string(),
                job.updated_at.format(DATETIME_FMT).to_string(),
            ],
        )?;
        Ok(())
    }

    /// 插入或更新单个作业
    pub fn upsert(&self, job: &Job) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        Self::upsert_on(&conn, job)
    }

    /// 批量插入或更新作业 (事务内)
    ///
    /// # 返回
    /// - Ok(usize): 写入的记录数
    pub fn batch_upsert(&self, jobs: &[Job]) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;

        conn.execute("BEGIN TRANSACTION", [])?;
        for job in jobs {
            if let Err(e) = Self::upsert_on(&conn, job) {
                let _ = conn.execute("ROLLBACK", []);
                return Err(e);
            }
        }
        conn.execute("COMMIT", [])?;

        Ok(jobs.len())
    }

    /// 按ID查询作业
    pub fn find_by_id(&self, job_id: &str) -> RepositoryResult<Option<Job>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM job WHERE job_id = ?1", Self::SELECT_COLS);
        let mut stmt = conn.prepare(&sql)?;
        let job = stmt.query_row(params![job_id], Self::map_row).optional()?;
        Ok(job)
    }

    /// 查询全部基线作业
    pub fn find_all(&self) -> RepositoryResult<Vec<Job>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM job ORDER BY job_number", Self::SELECT_COLS);
        let mut stmt = conn.prepare(&sql)?;
        let jobs = stmt
            .query_map([], Self::map_row)?
            .collect::<SqliteResult<Vec<Job>>>()?;
        Ok(jobs)
    }

    /// 删除作业
    ///
    /// # 返回
    /// - Ok(true): 已删除
    /// - Ok(false): 记录不存在
    pub fn delete(&self, job_id: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let affected = conn.execute("DELETE FROM job WHERE job_id = ?1", params![job_id])?;
        Ok(affected > 0)
    }

    /// 批量删除作业 (事务内, 供提交回写使用)
    pub fn batch_delete(&self, job_ids: &[String]) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;

        conn.execute("BEGIN TRANSACTION", [])?;
        let mut deleted = 0;
        for job_id in job_ids {
            match conn.execute("DELETE FROM job WHERE job_id = ?1", params![job_id]) {
                Ok(affected) => deleted += affected,
                Err(e) => {
                    let _ = conn.execute("ROLLBACK", []);
                    return Err(e.into());
                }
            }
        }
        conn.execute("COMMIT", [])?;

        Ok(deleted)
    }
}
