// ==========================================
// 设备维保系统 - 保养计划仓储
// ==========================================
// 职责: maintenance_plans / maintenance_items / maintenance_plan_devices
// 红线: Repository 不做业务校验，只做数据映射
// ==========================================

use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

use crate::db::fmt_datetime;
use crate::domain::plan::{ChecklistItem, ChecklistItemInput, MaintenancePlan};
use crate::domain::types::{ChecklistItemType, FrequencyType};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row::{enum_col, opt_json_col};

const PLAN_COLUMNS: &str = r#"plan_id, title, description, frequency_type, frequency_value,
    next_due_at, active, assigned_to, created_by, created_at, updated_at"#;

const ITEM_COLUMNS: &str = r#"item_id, plan_id, name, item_type, qualitative_options_json,
    quantitative_settings_json, sort_order, description"#;

// ==========================================
// PlanRepository - 保养计划仓储
// ==========================================
pub struct PlanRepository {
    conn: Arc<Mutex<Connection>>,
}

impl PlanRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub fn find_by_id(&self, plan_id: i64) -> RepositoryResult<Option<MaintenancePlan>> {
        let conn = self.get_conn()?;
        Self::find_by_id_in(&conn, plan_id)
    }

    pub fn find_items(&self, plan_id: i64) -> RepositoryResult<Vec<ChecklistItem>> {
        let conn = self.get_conn()?;
        Self::find_items_in(&conn, plan_id)
    }

    /// 查询指定频率下所有激活计划（定时触发使用）
    pub fn list_active_by_frequency(&self, frequency: FrequencyType) -> RepositoryResult<Vec<MaintenancePlan>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM maintenance_plans WHERE active = 1 AND frequency_type = ?1 ORDER BY plan_id ASC",
            PLAN_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let plans = stmt
            .query_map(params![frequency.to_db_str()], map_plan)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(plans)
    }

    // ==========================================
    // 事务内操作
    // ==========================================

    pub(crate) fn insert_plan_in(conn: &Connection, plan: &MaintenancePlan) -> RepositoryResult<i64> {
        conn.execute(
            r#"INSERT INTO maintenance_plans (
                title, description, frequency_type, frequency_value, next_due_at,
                active, assigned_to, created_by, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"#,
            params![
                plan.title,
                plan.description,
                plan.frequency_type.to_db_str(),
                plan.frequency_value,
                plan.next_due_at.as_ref().map(fmt_datetime),
                plan.active,
                plan.assigned_to,
                plan.created_by,
                fmt_datetime(&plan.created_at),
                fmt_datetime(&plan.updated_at),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// 更新计划标量字段（不触碰内容项与绑定）
    pub(crate) fn update_plan_in(conn: &Connection, plan: &MaintenancePlan) -> RepositoryResult<()> {
        let rows = conn.execute(
            r#"UPDATE maintenance_plans
               SET title = ?1, description = ?2, frequency_type = ?3, frequency_value = ?4,
                   next_due_at = ?5, active = ?6, assigned_to = ?7, updated_at = ?8
               WHERE plan_id = ?9"#,
            params![
                plan.title,
                plan.description,
                plan.frequency_type.to_db_str(),
                plan.frequency_value,
                plan.next_due_at.as_ref().map(fmt_datetime),
                plan.active,
                plan.assigned_to,
                fmt_datetime(&plan.updated_at),
                plan.plan_id,
            ],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("MaintenancePlan", plan.plan_id));
        }
        Ok(())
    }

    pub(crate) fn update_next_due_at_in(
        conn: &Connection,
        plan_id: i64,
        next_due_at: NaiveDateTime,
        now: NaiveDateTime,
    ) -> RepositoryResult<()> {
        conn.execute(
            "UPDATE maintenance_plans SET next_due_at = ?1, updated_at = ?2 WHERE plan_id = ?3",
            params![fmt_datetime(&next_due_at), fmt_datetime(&now), plan_id],
        )?;
        Ok(())
    }

    pub(crate) fn delete_plan_in(conn: &Connection, plan_id: i64) -> RepositoryResult<usize> {
        let rows = conn.execute("DELETE FROM maintenance_plans WHERE plan_id = ?1", params![plan_id])?;
        Ok(rows)
    }

    pub(crate) fn find_by_id_in(conn: &Connection, plan_id: i64) -> RepositoryResult<Option<MaintenancePlan>> {
        let sql = format!("SELECT {} FROM maintenance_plans WHERE plan_id = ?1", PLAN_COLUMNS);
        let plan = conn.query_row(&sql, params![plan_id], map_plan).optional()?;
        Ok(plan)
    }

    // ===== 保养内容项 =====

    /// 批量写入内容项（sort_order 缺省为输入下标）
    pub(crate) fn insert_items_in(
        conn: &Connection,
        plan_id: i64,
        items: &[ChecklistItemInput],
    ) -> RepositoryResult<usize> {
        let mut stmt = conn.prepare(
            r#"INSERT INTO maintenance_items (
                plan_id, name, item_type, qualitative_options_json,
                quantitative_settings_json, sort_order, description
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
        )?;

        for (index, item) in items.iter().enumerate() {
            let qualitative = match &item.qualitative_options {
                Some(options) => Some(serde_json::to_string(options)?),
                None => None,
            };
            let quantitative = match &item.quantitative_settings {
                Some(settings) => Some(serde_json::to_string(settings)?),
                None => None,
            };
            stmt.execute(params![
                plan_id,
                item.name,
                item.item_type.to_db_str(),
                qualitative,
                quantitative,
                item.sort_order.unwrap_or(index as i32),
                item.description,
            ])?;
        }
        Ok(items.len())
    }

    pub(crate) fn delete_items_in(conn: &Connection, plan_id: i64) -> RepositoryResult<usize> {
        let rows = conn.execute("DELETE FROM maintenance_items WHERE plan_id = ?1", params![plan_id])?;
        Ok(rows)
    }

    /// 按 sort_order 升序返回内容项
    pub(crate) fn find_items_in(conn: &Connection, plan_id: i64) -> RepositoryResult<Vec<ChecklistItem>> {
        let sql = format!(
            "SELECT {} FROM maintenance_items WHERE plan_id = ?1 ORDER BY sort_order ASC, item_id ASC",
            ITEM_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let items = stmt
            .query_map(params![plan_id], map_item)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }

    // ===== 设备绑定 =====

    /// 整体替换设备绑定
    pub(crate) fn replace_bindings_in(
        conn: &Connection,
        plan_id: i64,
        device_ids: &[i64],
    ) -> RepositoryResult<()> {
        conn.execute(
            "DELETE FROM maintenance_plan_devices WHERE plan_id = ?1",
            params![plan_id],
        )?;
        let mut stmt = conn.prepare(
            "INSERT OR IGNORE INTO maintenance_plan_devices (plan_id, device_id) VALUES (?1, ?2)",
        )?;
        for device_id in device_ids {
            stmt.execute(params![plan_id, device_id])?;
        }
        Ok(())
    }

    pub(crate) fn unbind_in(conn: &Connection, plan_id: i64, device_id: i64) -> RepositoryResult<usize> {
        let rows = conn.execute(
            "DELETE FROM maintenance_plan_devices WHERE plan_id = ?1 AND device_id = ?2",
            params![plan_id, device_id],
        )?;
        Ok(rows)
    }

    pub(crate) fn is_device_bound_in(conn: &Connection, plan_id: i64, device_id: i64) -> RepositoryResult<bool> {
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM maintenance_plan_devices WHERE plan_id = ?1 AND device_id = ?2",
                params![plan_id, device_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }
}

fn map_plan(row: &rusqlite::Row<'_>) -> rusqlite::Result<MaintenancePlan> {
    Ok(MaintenancePlan {
        plan_id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        frequency_type: enum_col(row, 3, FrequencyType::parse)?,
        frequency_value: row.get(4)?,
        next_due_at: row.get(5)?,
        active: row.get(6)?,
        assigned_to: row.get(7)?,
        created_by: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

fn map_item(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChecklistItem> {
    Ok(ChecklistItem {
        item_id: row.get(0)?,
        plan_id: row.get(1)?,
        name: row.get(2)?,
        item_type: enum_col(row, 3, ChecklistItemType::parse)?,
        qualitative_options: opt_json_col(row, 4)?,
        quantitative_settings: opt_json_col(row, 5)?,
        sort_order: row.get(6)?,
        description: row.get(7)?,
    })
}
