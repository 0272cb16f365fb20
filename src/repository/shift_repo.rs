// ==========================================
// 组套排产系统 - 班次仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 时刻列以 "HH:MM" 文本存储, 读出时严格解析
// ==========================================

use crate::domain::shift::Shift;
use crate::domain::time_of_day::MinuteOfDay;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::{parse_datetime_col, DATETIME_FMT};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

// ==========================================
// ShiftRepository - 班次仓储
// ==========================================

/// 班次仓储
/// 职责: 管理shift表的CRUD操作
pub struct ShiftRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ShiftRepository {
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

    /// 行映射: shift 表 -> Shift
    fn map_row(row: &Row) -> SqliteResult<Shift> {
        let start_raw: String = row.get(2)?;
        let end_raw: String = row.get(3)?;
        let break_raw: Option<String> = row.get(4)?;

        let parse_minute = |idx: usize, raw: &str| -> SqliteResult<MinuteOfDay> {
            MinuteOfDay::parse(raw)
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
        };

        Ok(Shift {
            shift_id: row.get(0)?,
            name: row.get(1)?,
            start_time: parse_minute(2, &start_raw)?,
            end_time: parse_minute(3, &end_raw)?,
            break_start: match break_raw {
                Some(raw) => Some(parse_minute(4, &raw)?),
                None => None,
            },
            break_duration_min: row.get(5)?,
            color: row.get(6)?,
            is_active: row.get::<_, i64>(7)? != 0,
            created_at: parse_datetime_col(8, &row.get::<_, String>(8)?)?,
            updated_at: parse_datetime_col(9, &row.get::<_, String>(9)?)?,
        })
    }

    const SELECT_COLS: &'static str = r#"
        shift_id, name, start_time, end_time, break_start,
        break_duration_min, color, is_active, created_at, updated_at
    "#;

    /// 插入或更新班次
    ///
    /// # 参数
    /// - shift: 班次数据 (调用方已完成领域校验)
    pub fn upsert(&self, shift: &Shift) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT OR REPLACE INTO shift (
                shift_id, name, start_time, end_time, break_start,
                break_duration_min, color, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                shift.shift_id,
                shift.name,
                shift.start_time.to_string(),
                shift.end_time.to_string(),
                shift.break_start.map(|t| t.to_string()),
                shift.break_duration_min,
                shift.color,
                shift.is_active as i64,
                shift.created_at.format(DATETIME_FMT).to_string(),
                shift.updated_at.format(DATETIME_FMT).to_string(),
            ],
        )?;
        Ok(())
    }

    /// 按ID查询班次
    ///
    /// # 返回
    /// - Ok(Some(Shift)): 找到班次
    /// - Ok(None): 未找到
    pub fn find_by_id(&self, shift_id: &str) -> RepositoryResult<Option<Shift>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM shift WHERE shift_id = ?1",
            Self::SELECT_COLS
        );
        let mut stmt = conn.prepare(&sql)?;
        let shift = stmt
            .query_row(params![shift_id], Self::map_row)
            .optional()?;
        Ok(shift)
    }

    /// 查询全部班次 (含停用)
    pub fn find_all(&self) -> RepositoryResult<Vec<Shift>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM shift ORDER BY start_time", Self::SELECT_COLS);
        let mut stmt = conn.prepare(&sql)?;
        let shifts = stmt
            .query_map([], Self::map_row)?
            .collect::<SqliteResult<Vec<Shift>>>()?;
        Ok(shifts)
    }

    /// 查询启用班次
    pub fn list_active(&self) -> RepositoryResult<Vec<Shift>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM shift WHERE is_active = 1 ORDER BY start_time",
            Self::SELECT_COLS
        );
        let mut stmt = conn.prepare(&sql)?;
        let shifts = stmt
            .query_map([], Self::map_row)?
            .collect::<SqliteResult<Vec<Shift>>>()?;
        Ok(shifts)
    }

    /// 删除班次
    ///
    /// # 返回
    /// - Ok(true): 已删除
    /// - Ok(false): 记录不存在
    pub fn delete(&self, shift_id: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let affected = conn.execute("DELETE FROM shift WHERE shift_id = ?1", params![shift_id])?;
        Ok(affected > 0)
    }
}
