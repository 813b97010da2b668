// ==========================================
// 设备维保系统 - SQLite 连接初始化与建表
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为（外键、busy_timeout）
// - 幂等建表，启动时即可在空库上运行
// ==========================================

use chrono::NaiveDateTime;
use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 时间存储格式（本地时间，精确到秒）
pub const DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";

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

/// 打开内存库并建表（单元测试使用）
pub fn open_in_memory() -> rusqlite::Result<Connection> {
    let conn = Connection::open_in_memory()?;
    configure_sqlite_connection(&conn)?;
    ensure_schema(&conn)?;
    Ok(conn)
}

/// 时间格式化为存储字符串
pub fn fmt_datetime(dt: &NaiveDateTime) -> String {
    dt.format(DATETIME_FMT).to_string()
}

/// 幂等建表
pub fn ensure_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL DEFAULT 'global',
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (scope_id, key)
        );

        CREATE TABLE IF NOT EXISTS devices (
            device_id INTEGER PRIMARY KEY AUTOINCREMENT,
            asset_no TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            location TEXT
        );

        CREATE TABLE IF NOT EXISTS spare_parts (
            part_id INTEGER PRIMARY KEY AUTOINCREMENT,
            part_no TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            spec_json TEXT NOT NULL DEFAULT '{}',
            supplier TEXT,
            stock_milli INTEGER NOT NULL DEFAULT 0 CHECK (stock_milli >= 0),
            unit TEXT NOT NULL DEFAULT 'pc',
            location TEXT
        );

        CREATE TABLE IF NOT EXISTS maintenance_plans (
            plan_id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            description TEXT,
            frequency_type TEXT NOT NULL,
            frequency_value INTEGER NOT NULL CHECK (frequency_value > 0),
            next_due_at TEXT,
            active INTEGER NOT NULL DEFAULT 1,
            assigned_to INTEGER,
            created_by INTEGER,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS maintenance_items (
            item_id INTEGER PRIMARY KEY AUTOINCREMENT,
            plan_id INTEGER NOT NULL REFERENCES maintenance_plans(plan_id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            item_type TEXT NOT NULL,
            qualitative_options_json TEXT,
            quantitative_settings_json TEXT,
            sort_order INTEGER NOT NULL DEFAULT 0,
            description TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_maintenance_items_plan
            ON maintenance_items(plan_id, sort_order);

        CREATE TABLE IF NOT EXISTS maintenance_plan_devices (
            plan_id INTEGER NOT NULL REFERENCES maintenance_plans(plan_id) ON DELETE CASCADE,
            device_id INTEGER NOT NULL REFERENCES devices(device_id) ON DELETE CASCADE,
            PRIMARY KEY (plan_id, device_id)
        );

        CREATE TABLE IF NOT EXISTS work_orders (
            order_id INTEGER PRIMARY KEY AUTOINCREMENT,
            order_no TEXT NOT NULL UNIQUE,
            reporter_id INTEGER,
            device_id INTEGER REFERENCES devices(device_id) ON DELETE SET NULL,
            title TEXT NOT NULL,
            description TEXT,
            priority TEXT NOT NULL DEFAULT 'normal',
            status TEXT NOT NULL DEFAULT 'created',
            assigned_to INTEGER,
            contact TEXT,
            started_at TEXT,
            finished_at TEXT,
            accepted_at TEXT,
            reported_at TEXT,
            response_time INTEGER,
            repair_time INTEGER,
            attachments_json TEXT NOT NULL DEFAULT '[]',
            fault_category TEXT,
            fault_cause TEXT,
            solution TEXT,
            revision INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS maintenance_tasks (
            task_id INTEGER PRIMARY KEY AUTOINCREMENT,
            plan_id INTEGER REFERENCES maintenance_plans(plan_id) ON DELETE SET NULL,
            device_id INTEGER NOT NULL REFERENCES devices(device_id) ON DELETE CASCADE,
            scheduled_at TEXT NOT NULL,
            assigned_to INTEGER,
            status TEXT NOT NULL DEFAULT 'pending',
            started_at TEXT,
            finished_at TEXT,
            result_json TEXT NOT NULL DEFAULT '{}',
            has_abnormal INTEGER NOT NULL DEFAULT 0,
            abnormal_work_order_id INTEGER REFERENCES work_orders(order_id) ON DELETE SET NULL,
            attachments_json TEXT NOT NULL DEFAULT '[]',
            notes TEXT,
            review_notes TEXT,
            reviewed_at TEXT,
            reviewed_by INTEGER,
            created_at TEXT NOT NULL
        );

        CREATE UNIQUE INDEX IF NOT EXISTS uq_maintenance_tasks_plan_device_time
            ON maintenance_tasks(plan_id, device_id, scheduled_at);

        CREATE TABLE IF NOT EXISTS work_order_parts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            work_order_id INTEGER NOT NULL REFERENCES work_orders(order_id) ON DELETE CASCADE,
            part_id INTEGER NOT NULL REFERENCES spare_parts(part_id),
            qty REAL NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS old_parts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            work_order_id INTEGER REFERENCES work_orders(order_id) ON DELETE SET NULL,
            device_id INTEGER REFERENCES devices(device_id) ON DELETE SET NULL,
            part_no TEXT NOT NULL,
            qty REAL NOT NULL,
            name TEXT NOT NULL,
            spec_json TEXT NOT NULL DEFAULT '{}',
            supplier TEXT,
            unit TEXT,
            location TEXT,
            notes TEXT,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_old_parts_order ON old_parts(work_order_id);
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
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

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}
