// ==========================================
// 组套排产系统 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为，避免“部分模块外键开启/部分不开启”
// - 统一 busy_timeout，减少并发写入时的偶发 busy 错误
// - 内嵌建表语句，首次启动即可用
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::path::PathBuf;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 内嵌建库语句 (幂等, 可在已有库上重复执行)
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS shift (
    shift_id            TEXT PRIMARY KEY,
    name                TEXT NOT NULL,
    start_time          TEXT NOT NULL,
    end_time            TEXT NOT NULL,
    break_start         TEXT,
    break_duration_min  INTEGER NOT NULL DEFAULT 0,
    color               TEXT,
    is_active           INTEGER NOT NULL DEFAULT 1,
    created_at          TEXT NOT NULL,
    updated_at          TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS job (
    job_id                  TEXT PRIMARY KEY,
    job_number              TEXT NOT NULL,
    customer_name           TEXT,
    ordered_quantity        INTEGER NOT NULL DEFAULT 0,
    station_count           INTEGER NOT NULL DEFAULT 1,
    expected_kit_duration_s INTEGER NOT NULL DEFAULT 0,
    expected_job_duration_s INTEGER NOT NULL DEFAULT 0,
    setup_s                 INTEGER NOT NULL DEFAULT 0,
    make_ready_s            INTEGER NOT NULL DEFAULT 0,
    take_down_s             INTEGER NOT NULL DEFAULT 0,
    route_steps             TEXT NOT NULL DEFAULT '[]',
    allowed_shift_ids       TEXT NOT NULL DEFAULT '[]',
    include_weekends        INTEGER NOT NULL DEFAULT 0,
    scheduled_date          TEXT,
    scheduled_start_time    TEXT,
    status                  TEXT NOT NULL DEFAULT 'PENDING',
    created_at              TEXT NOT NULL,
    updated_at              TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS scenario (
    scenario_id  TEXT PRIMARY KEY,
    name         TEXT NOT NULL,
    description  TEXT,
    is_active    INTEGER NOT NULL DEFAULT 1,
    created_at   TEXT NOT NULL,
    updated_at   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS scenario_change (
    change_id     TEXT PRIMARY KEY,
    scenario_id   TEXT NOT NULL,
    job_id        TEXT,
    operation     TEXT NOT NULL,
    change_data   TEXT NOT NULL,
    original_data TEXT,
    seq_no        INTEGER NOT NULL,
    created_at    TEXT NOT NULL,
    FOREIGN KEY (scenario_id) REFERENCES scenario(scenario_id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_scenario_change_replay
    ON scenario_change (scenario_id, created_at, seq_no);

CREATE TABLE IF NOT EXISTS delay (
    delay_id                TEXT PRIMARY KEY,
    scenario_id             TEXT,
    job_id                  TEXT NOT NULL,
    name                    TEXT NOT NULL,
    duration_s              INTEGER NOT NULL,
    insert_after_step_order INTEGER NOT NULL DEFAULT 0,
    created_at              TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_delay_job ON delay (job_id);

CREATE TABLE IF NOT EXISTS config_kv (
    scope_id   TEXT NOT NULL,
    key        TEXT NOT NULL,
    value      TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (scope_id, key)
);

CREATE TABLE IF NOT EXISTS schema_version (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL
);
"#;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 初始化建表并记录 schema_version
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (?1, datetime('now'))",
        [CURRENT_SCHEMA_VERSION],
    )?;
    Ok(())
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

/// 默认数据库文件路径: <数据目录>/kitting-aps/kitting_aps.db
pub fn default_db_path() -> PathBuf {
    let base = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
    base.join("kitting-aps").join("kitting_aps.db")
}
