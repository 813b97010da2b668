// ==========================================
// 设备维保系统 - 工单仓储
// ==========================================
// 职责: work_orders / work_order_parts
// 并发控制: revision 乐观锁（更新时校验并自增）
// ==========================================

use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

use crate::db::fmt_datetime;
use crate::domain::types::{WorkOrderPriority, WorkOrderStatus};
use crate::domain::work_order::{WorkOrder, WorkOrderPart};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row::{enum_col, json_col};

const ORDER_COLUMNS: &str = r#"order_id, order_no, reporter_id, device_id, title, description,
    priority, status, assigned_to, contact, started_at, finished_at, accepted_at, reported_at,
    response_time, repair_time, attachments_json, fault_category, fault_cause, solution,
    revision, created_at, updated_at"#;

// ==========================================
// WorkOrderRepository - 工单仓储
// ==========================================
pub struct WorkOrderRepository {
    conn: Arc<Mutex<Connection>>,
}

impl WorkOrderRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub fn find_by_id(&self, order_id: i64) -> RepositoryResult<Option<WorkOrder>> {
        let conn = self.get_conn()?;
        Self::find_by_id_in(&conn, order_id)
    }

    pub fn list_parts(&self, order_id: i64) -> RepositoryResult<Vec<WorkOrderPart>> {
        let conn = self.get_conn()?;
        Self::list_parts_in(&conn, order_id)
    }

    // ==========================================
    // 事务内操作
    // ==========================================

    pub(crate) fn insert_in(conn: &Connection, order: &WorkOrder) -> RepositoryResult<i64> {
        conn.execute(
            r#"INSERT INTO work_orders (
                order_no, reporter_id, device_id, title, description, priority, status,
                assigned_to, contact, started_at, finished_at, accepted_at, reported_at,
                response_time, repair_time, attachments_json, fault_category, fault_cause,
                solution, revision, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
                      ?16, ?17, ?18, ?19, ?20, ?21, ?22)"#,
            params![
                order.order_no,
                order.reporter_id,
                order.device_id,
                order.title,
                order.description,
                order.priority.to_db_str(),
                order.status.to_db_str(),
                order.assigned_to,
                order.contact,
                order.started_at.as_ref().map(fmt_datetime),
                order.finished_at.as_ref().map(fmt_datetime),
                order.accepted_at.as_ref().map(fmt_datetime),
                order.reported_at.as_ref().map(fmt_datetime),
                order.response_time,
                order.repair_time,
                serde_json::to_string(&order.attachments)?,
                order.fault_category,
                order.fault_cause,
                order.solution,
                order.revision,
                fmt_datetime(&order.created_at),
                fmt_datetime(&order.updated_at),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub(crate) fn find_by_id_in(conn: &Connection, order_id: i64) -> RepositoryResult<Option<WorkOrder>> {
        let sql = format!("SELECT {} FROM work_orders WHERE order_id = ?1", ORDER_COLUMNS);
        let order = conn.query_row(&sql, params![order_id], map_order).optional()?;
        Ok(order)
    }

    /// 更新工单 (带乐观锁检查)
    ///
    /// # 返回
    /// - `Ok(new_revision)`: 更新成功
    ///
    /// # 错误
    /// - `RepositoryError::OptimisticLockFailure`: revision 不匹配（其他调用方已更新）
    /// - `RepositoryError::NotFound`: order_id 不存在
    pub(crate) fn update_in(conn: &Connection, order: &WorkOrder) -> RepositoryResult<i32> {
        let rows_affected = conn.execute(
            r#"UPDATE work_orders
               SET title = ?1, description = ?2, priority = ?3, status = ?4, assigned_to = ?5,
                   contact = ?6, started_at = ?7, finished_at = ?8, accepted_at = ?9,
                   response_time = ?10, repair_time = ?11, attachments_json = ?12,
                   fault_category = ?13, fault_cause = ?14, solution = ?15,
                   updated_at = ?16, revision = revision + 1
               WHERE order_id = ?17 AND revision = ?18"#,
            params![
                order.title,
                order.description,
                order.priority.to_db_str(),
                order.status.to_db_str(),
                order.assigned_to,
                order.contact,
                order.started_at.as_ref().map(fmt_datetime),
                order.finished_at.as_ref().map(fmt_datetime),
                order.accepted_at.as_ref().map(fmt_datetime),
                order.response_time,
                order.repair_time,
                serde_json::to_string(&order.attachments)?,
                order.fault_category,
                order.fault_cause,
                order.solution,
                fmt_datetime(&order.updated_at),
                order.order_id,
                order.revision,
            ],
        )?;

        if rows_affected == 0 {
            let actual: Option<i32> = conn
                .query_row(
                    "SELECT revision FROM work_orders WHERE order_id = ?1",
                    params![order.order_id],
                    |row| row.get(0),
                )
                .optional()?;

            return match actual {
                Some(actual_revision) => Err(RepositoryError::OptimisticLockFailure {
                    entity: "WorkOrder".to_string(),
                    id: order.order_id.to_string(),
                    expected: order.revision,
                    actual: actual_revision,
                }),
                None => Err(RepositoryError::not_found("WorkOrder", order.order_id)),
            };
        }

        Ok(order.revision + 1)
    }

    pub(crate) fn delete_in(conn: &Connection, order_id: i64) -> RepositoryResult<usize> {
        let rows = conn.execute("DELETE FROM work_orders WHERE order_id = ?1", params![order_id])?;
        Ok(rows)
    }

    // ===== 备件使用记录 =====

    pub(crate) fn insert_part_usage_in(
        conn: &Connection,
        work_order_id: i64,
        part_id: i64,
        qty: f64,
        now: NaiveDateTime,
    ) -> RepositoryResult<i64> {
        conn.execute(
            r#"INSERT INTO work_order_parts (work_order_id, part_id, qty, created_at)
               VALUES (?1, ?2, ?3, ?4)"#,
            params![work_order_id, part_id, qty, fmt_datetime(&now)],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub(crate) fn list_parts_in(conn: &Connection, order_id: i64) -> RepositoryResult<Vec<WorkOrderPart>> {
        let mut stmt = conn.prepare(
            r#"SELECT id, work_order_id, part_id, qty, created_at
               FROM work_order_parts
               WHERE work_order_id = ?1
               ORDER BY id ASC"#,
        )?;
        let parts = stmt
            .query_map(params![order_id], |row| {
                Ok(WorkOrderPart {
                    id: row.get(0)?,
                    work_order_id: row.get(1)?,
                    part_id: row.get(2)?,
                    qty: row.get(3)?,
                    created_at: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(parts)
    }
}

fn map_order(row: &rusqlite::Row<'_>) -> rusqlite::Result<WorkOrder> {
    Ok(WorkOrder {
        order_id: row.get(0)?,
        order_no: row.get(1)?,
        reporter_id: row.get(2)?,
        device_id: row.get(3)?,
        title: row.get(4)?,
        description: row.get(5)?,
        priority: enum_col(row, 6, WorkOrderPriority::parse)?,
        status: enum_col(row, 7, WorkOrderStatus::parse)?,
        assigned_to: row.get(8)?,
        contact: row.get(9)?,
        started_at: row.get(10)?,
        finished_at: row.get(11)?,
        accepted_at: row.get(12)?,
        reported_at: row.get(13)?,
        response_time: row.get(14)?,
        repair_time: row.get(15)?,
        attachments: json_col(row, 16)?,
        fault_category: row.get(17)?,
        fault_cause: row.get(18)?,
        solution: row.get(19)?,
        revision: row.get(20)?,
        created_at: row.get(21)?,
        updated_at: row.get(22)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;
    use chrono::NaiveDate;

    fn sample_order() -> WorkOrder {
        let ts = NaiveDate::from_ymd_opt(2024, 6, 15)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        WorkOrder {
            order_id: 0,
            order_no: "WO-TEST-1".to_string(),
            reporter_id: Some(1),
            device_id: None,
            title: "主轴异响".to_string(),
            description: None,
            priority: WorkOrderPriority::Normal,
            status: WorkOrderStatus::Created,
            assigned_to: None,
            contact: None,
            started_at: None,
            finished_at: None,
            accepted_at: None,
            reported_at: Some(ts),
            response_time: None,
            repair_time: None,
            attachments: vec![],
            fault_category: None,
            fault_cause: None,
            solution: None,
            revision: 0,
            created_at: ts,
            updated_at: ts,
        }
    }

    #[test]
    fn test_stale_revision_is_rejected() {
        let conn = open_in_memory().unwrap();
        let mut order = sample_order();
        order.order_id = WorkOrderRepository::insert_in(&conn, &order).unwrap();

        let mut first = order.clone();
        first.status = WorkOrderStatus::InProgress;
        assert_eq!(WorkOrderRepository::update_in(&conn, &first).unwrap(), 1);

        // 第二个调用方仍持有 revision=0 的快照
        let mut second = order.clone();
        second.status = WorkOrderStatus::Assigned;
        let err = WorkOrderRepository::update_in(&conn, &second).unwrap_err();
        assert!(matches!(
            err,
            RepositoryError::OptimisticLockFailure { expected: 0, actual: 1, .. }
        ));

        let stored = WorkOrderRepository::find_by_id_in(&conn, order.order_id)
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, WorkOrderStatus::InProgress);
    }

    #[test]
    fn test_update_missing_order_is_not_found() {
        let conn = open_in_memory().unwrap();
        let mut order = sample_order();
        order.order_id = 999;
        let err = WorkOrderRepository::update_in(&conn, &order).unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound { .. }));
    }
}
