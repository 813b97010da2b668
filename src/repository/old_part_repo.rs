// ==========================================
// 设备维保系统 - 旧件台账仓储
// ==========================================
// 红线: 只追加，不提供修改/删除
// ==========================================

use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

use crate::db::fmt_datetime;
use crate::domain::work_order::OldPart;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row::json_col;

const OLD_PART_COLUMNS: &str = r#"id, work_order_id, device_id, part_no, qty, name, spec_json,
    supplier, unit, location, notes, created_at"#;

pub struct OldPartRepository {
    conn: Arc<Mutex<Connection>>,
}

impl OldPartRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub fn list_by_order(&self, work_order_id: i64) -> RepositoryResult<Vec<OldPart>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM old_parts WHERE work_order_id = ?1 ORDER BY id ASC",
            OLD_PART_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![work_order_id], map_old_part)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// 全部台账（按写入顺序）
    pub fn list_all(&self) -> RepositoryResult<Vec<OldPart>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM old_parts ORDER BY id ASC", OLD_PART_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], map_old_part)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub(crate) fn insert_in(conn: &Connection, old_part: &OldPart) -> RepositoryResult<i64> {
        conn.execute(
            r#"INSERT INTO old_parts (
                work_order_id, device_id, part_no, qty, name, spec_json,
                supplier, unit, location, notes, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"#,
            params![
                old_part.work_order_id,
                old_part.device_id,
                old_part.part_no,
                old_part.qty,
                old_part.name,
                old_part.spec.to_string(),
                old_part.supplier,
                old_part.unit,
                old_part.location,
                old_part.notes,
                fmt_datetime(&old_part.created_at),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }
}

fn map_old_part(row: &rusqlite::Row<'_>) -> rusqlite::Result<OldPart> {
    Ok(OldPart {
        id: row.get(0)?,
        work_order_id: row.get(1)?,
        device_id: row.get(2)?,
        part_no: row.get(3)?,
        qty: row.get(4)?,
        name: row.get(5)?,
        spec: json_col(row, 6)?,
        supplier: row.get(7)?,
        unit: row.get(8)?,
        location: row.get(9)?,
        notes: row.get(10)?,
        created_at: row.get(11)?,
    })
}
