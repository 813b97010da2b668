// ==========================================
// 设备维保系统 - 备件目录仓储
// ==========================================
// 职责: 备件查询、库存回写
// 说明: 库存扣减只发生在 engine::inventory 的事务内
// ==========================================

use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

use crate::domain::asset::SparePart;
use crate::domain::quantity::Quantity;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row::json_col;

const PART_COLUMNS: &str = "part_id, part_no, name, spec_json, supplier, stock_milli, unit, location";

pub struct SparePartRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SparePartRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 登记备件（part_id 由数据库分配）
    pub fn insert(&self, part: &SparePart) -> RepositoryResult<i64> {
        if part.stock_qty < Quantity::ZERO {
            return Err(RepositoryError::ValidationError(format!(
                "备件 {} 的库存不能为负数: {}",
                part.part_no, part.stock_qty
            )));
        }
        let conn = self.get_conn()?;
        conn.execute(
            r#"INSERT INTO spare_parts (part_no, name, spec_json, supplier, stock_milli, unit, location)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
            params![
                part.part_no,
                part.name,
                part.spec.to_string(),
                part.supplier,
                part.stock_qty.milli(),
                part.unit,
                part.location,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn get_part(&self, part_id: i64) -> RepositoryResult<Option<SparePart>> {
        let conn = self.get_conn()?;
        Self::get_part_in(&conn, part_id)
    }

    pub(crate) fn get_part_in(conn: &Connection, part_id: i64) -> RepositoryResult<Option<SparePart>> {
        let sql = format!("SELECT {} FROM spare_parts WHERE part_id = ?1", PART_COLUMNS);
        let part = conn.query_row(&sql, params![part_id], map_part).optional()?;
        Ok(part)
    }

    /// 回写库存
    pub(crate) fn save_stock_in(conn: &Connection, part: &SparePart) -> RepositoryResult<()> {
        let rows = conn.execute(
            "UPDATE spare_parts SET stock_milli = ?1 WHERE part_id = ?2",
            params![part.stock_qty.milli(), part.part_id],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("SparePart", part.part_id));
        }
        Ok(())
    }
}

fn map_part(row: &rusqlite::Row<'_>) -> rusqlite::Result<SparePart> {
    Ok(SparePart {
        part_id: row.get(0)?,
        part_no: row.get(1)?,
        name: row.get(2)?,
        spec: json_col(row, 3)?,
        supplier: row.get(4)?,
        stock_qty: Quantity::from_milli(row.get(5)?),
        unit: row.get(6)?,
        location: row.get(7)?,
    })
}
