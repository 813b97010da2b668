// ==========================================
// 设备维保系统 - 保养任务仓储
// ==========================================
// 唯一约束: (plan_id, device_id, scheduled_at)
// ==========================================

use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

use crate::db::fmt_datetime;
use crate::domain::task::{MaintenanceTask, NewTask};
use crate::domain::types::TaskStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row::{enum_col, json_col};

const TASK_COLUMNS: &str = r#"task_id, plan_id, device_id, scheduled_at, assigned_to, status,
    started_at, finished_at, result_json, has_abnormal, abnormal_work_order_id,
    attachments_json, notes, review_notes, reviewed_at, reviewed_by, created_at"#;

pub struct TaskRepository {
    conn: Arc<Mutex<Connection>>,
}

impl TaskRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub fn find_by_id(&self, task_id: i64) -> RepositoryResult<Option<MaintenanceTask>> {
        let conn = self.get_conn()?;
        Self::find_by_id_in(&conn, task_id)
    }

    /// 查询计划下的所有任务（按计划时间倒序）
    pub fn list_by_plan(&self, plan_id: i64) -> RepositoryResult<Vec<MaintenanceTask>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM maintenance_tasks WHERE plan_id = ?1 ORDER BY scheduled_at DESC, task_id ASC",
            TASK_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let tasks = stmt
            .query_map(params![plan_id], map_task)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tasks)
    }

    // ==========================================
    // 事务内操作
    // ==========================================

    /// 查找同一 (计划, 设备, 时间) 的已有任务
    pub(crate) fn find_existing_in(
        conn: &Connection,
        plan_id: i64,
        device_id: i64,
        scheduled_at: NaiveDateTime,
    ) -> RepositoryResult<Option<i64>> {
        let existing = conn
            .query_row(
                r#"SELECT task_id FROM maintenance_tasks
                   WHERE plan_id = ?1 AND device_id = ?2 AND scheduled_at = ?3"#,
                params![plan_id, device_id, fmt_datetime(&scheduled_at)],
                |row| row.get(0),
            )
            .optional()?;
        Ok(existing)
    }

    pub(crate) fn insert_in(conn: &Connection, task: &NewTask, now: NaiveDateTime) -> RepositoryResult<i64> {
        conn.execute(
            r#"INSERT INTO maintenance_tasks (
                plan_id, device_id, scheduled_at, assigned_to, status, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"#,
            params![
                task.plan_id,
                task.device_id,
                fmt_datetime(&task.scheduled_at),
                task.assigned_to,
                TaskStatus::Pending.to_db_str(),
                fmt_datetime(&now),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub(crate) fn find_by_id_in(conn: &Connection, task_id: i64) -> RepositoryResult<Option<MaintenanceTask>> {
        let sql = format!("SELECT {} FROM maintenance_tasks WHERE task_id = ?1", TASK_COLUMNS);
        let task = conn.query_row(&sql, params![task_id], map_task).optional()?;
        Ok(task)
    }

    /// 回写提交结果
    pub(crate) fn save_submission_in(conn: &Connection, task: &MaintenanceTask) -> RepositoryResult<()> {
        let rows = conn.execute(
            r#"UPDATE maintenance_tasks
               SET status = ?1, finished_at = ?2, result_json = ?3, has_abnormal = ?4,
                   abnormal_work_order_id = ?5, attachments_json = ?6, notes = ?7
               WHERE task_id = ?8"#,
            params![
                task.status.to_db_str(),
                task.finished_at.as_ref().map(fmt_datetime),
                serde_json::to_string(&task.result)?,
                task.has_abnormal,
                task.abnormal_work_order_id,
                serde_json::to_string(&task.attachments)?,
                task.notes,
                task.task_id,
            ],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("MaintenanceTask", task.task_id));
        }
        Ok(())
    }
}

fn map_task(row: &rusqlite::Row<'_>) -> rusqlite::Result<MaintenanceTask> {
    Ok(MaintenanceTask {
        task_id: row.get(0)?,
        plan_id: row.get(1)?,
        device_id: row.get(2)?,
        scheduled_at: row.get(3)?,
        assigned_to: row.get(4)?,
        status: enum_col(row, 5, TaskStatus::parse)?,
        started_at: row.get(6)?,
        finished_at: row.get(7)?,
        result: json_col(row, 8)?,
        has_abnormal: row.get(9)?,
        abnormal_work_order_id: row.get(10)?,
        attachments: json_col(row, 11)?,
        notes: row.get(12)?,
        review_notes: row.get(13)?,
        reviewed_at: row.get(14)?,
        reviewed_by: row.get(15)?,
        created_at: row.get(16)?,
    })
}
