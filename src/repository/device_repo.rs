// ==========================================
// 设备维保系统 - 设备目录仓储
// ==========================================
// 职责: 设备存在性校验、计划绑定设备查询
// 说明: 设备主数据的增删改由外部模块负责，这里只提供登记入口
// ==========================================

use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

use crate::domain::asset::Device;
use crate::repository::error::{RepositoryError, RepositoryResult};

const DEVICE_COLUMNS: &str = "d.device_id, d.asset_no, d.name, d.location";

pub struct DeviceRepository {
    conn: Arc<Mutex<Connection>>,
}

impl DeviceRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 登记设备，返回 device_id
    pub fn insert(&self, asset_no: &str, name: &str, location: Option<&str>) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO devices (asset_no, name, location) VALUES (?1, ?2, ?3)",
            params![asset_no, name, location],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn find_by_id(&self, device_id: i64) -> RepositoryResult<Option<Device>> {
        let conn = self.get_conn()?;
        Self::find_by_id_in(&conn, device_id)
    }

    pub fn device_exists(&self, device_id: i64) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        Self::device_exists_in(&conn, device_id)
    }

    pub fn devices_bound_to_plan(&self, plan_id: i64) -> RepositoryResult<Vec<Device>> {
        let conn = self.get_conn()?;
        Self::devices_bound_to_plan_in(&conn, plan_id)
    }

    // ==========================================
    // 事务内操作（接收已持有的连接/事务）
    // ==========================================

    pub(crate) fn find_by_id_in(conn: &Connection, device_id: i64) -> RepositoryResult<Option<Device>> {
        let sql = format!("SELECT {} FROM devices d WHERE d.device_id = ?1", DEVICE_COLUMNS);
        let device = conn
            .query_row(&sql, params![device_id], map_device)
            .optional()?;
        Ok(device)
    }

    pub(crate) fn device_exists_in(conn: &Connection, device_id: i64) -> RepositoryResult<bool> {
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM devices WHERE device_id = ?1",
                params![device_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// 返回所有不存在的设备ID（保持输入顺序）
    pub(crate) fn missing_ids_in(conn: &Connection, device_ids: &[i64]) -> RepositoryResult<Vec<i64>> {
        let mut missing = Vec::new();
        for &device_id in device_ids {
            if !Self::device_exists_in(conn, device_id)? {
                missing.push(device_id);
            }
        }
        Ok(missing)
    }

    pub(crate) fn devices_bound_to_plan_in(conn: &Connection, plan_id: i64) -> RepositoryResult<Vec<Device>> {
        let sql = format!(
            r#"SELECT {}
               FROM maintenance_plan_devices pd
               JOIN devices d ON d.device_id = pd.device_id
               WHERE pd.plan_id = ?1
               ORDER BY d.device_id ASC"#,
            DEVICE_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let devices = stmt
            .query_map(params![plan_id], map_device)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(devices)
    }
}

fn map_device(row: &rusqlite::Row<'_>) -> rusqlite::Result<Device> {
    Ok(Device {
        device_id: row.get(0)?,
        asset_no: row.get(1)?,
        name: row.get(2)?,
        location: row.get(3)?,
    })
}
