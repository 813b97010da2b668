// ==========================================
// 设备维保系统 - 工单引擎
// ==========================================
// 职责: 工单创建 / 字段更新 + 状态流转 / 指派 / 删除
// 并发控制: BEGIN IMMEDIATE + revision 乐观锁，
//           保证“首次”副作用（开始时间、维修时长）只被记录一次
// ==========================================

use chrono::NaiveDateTime;
use rusqlite::{Connection, TransactionBehavior};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, instrument};

use crate::config::MaintenanceSettings;
use crate::domain::work_order::{CreateWorkOrderInput, WorkOrder, WorkOrderDetail, WorkOrderUpdate};
use crate::engine::detail::work_order_detail_in;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::work_order_fsm::{self, TransitionEffect};
use crate::repository::device_repo::DeviceRepository;
use crate::repository::error::RepositoryError;
use crate::repository::work_order_repo::WorkOrderRepository;

/// 更新结果: 最新工单详情 + 是否发生流转 + 副作用
#[derive(Debug, Clone, Serialize)]
pub struct WorkOrderChange {
    pub detail: WorkOrderDetail,
    pub applied: bool,
    pub effects: Vec<TransitionEffect>,
}

pub struct WorkOrderEngine {
    conn: Arc<Mutex<Connection>>,
    settings: MaintenanceSettings,
}

impl WorkOrderEngine {
    pub fn new(conn: Arc<Mutex<Connection>>, settings: MaintenanceSettings) -> Self {
        Self { conn, settings }
    }

    fn get_conn(&self) -> EngineResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()).into())
    }

    /// 创建工单（人工报修）
    #[instrument(skip(self, input), fields(title = %input.title))]
    pub fn create(
        &self,
        input: &CreateWorkOrderInput,
        reporter_id: Option<i64>,
        now: NaiveDateTime,
    ) -> EngineResult<WorkOrderDetail> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let order = Self::create_in(&tx, input, reporter_id, &self.settings, now)?;
        let detail = work_order_detail_in(&tx, order.order_id)?;
        tx.commit()?;
        Ok(detail)
    }

    /// 事务内创建工单（任务提交自动生成工单也走这里）
    pub(crate) fn create_in(
        conn: &Connection,
        input: &CreateWorkOrderInput,
        reporter_id: Option<i64>,
        settings: &MaintenanceSettings,
        now: NaiveDateTime,
    ) -> EngineResult<WorkOrder> {
        if input.title.trim().is_empty() {
            return Err(EngineError::Validation("工单标题不能为空".to_string()));
        }
        if let Some(device_id) = input.device_id {
            if !DeviceRepository::device_exists_in(conn, device_id)? {
                return Err(RepositoryError::not_found("Device", device_id).into());
            }
        }

        let order_no = work_order_fsm::generate_order_no(&settings.order_no_prefix, now);
        let mut order = work_order_fsm::build_new_order(input, reporter_id, order_no, now);
        order.order_id = WorkOrderRepository::insert_in(conn, &order)?;

        info!(
            order_id = order.order_id,
            order_no = %order.order_no,
            priority = %order.priority,
            "工单已创建"
        );
        Ok(order)
    }

    /// 更新工单字段，并按需请求一次状态流转
    ///
    /// 不允许的目标状态被忽略（`applied = false`），字段修改仍然生效
    #[instrument(skip(self, update), fields(target = ?update.status))]
    pub fn update(
        &self,
        order_id: i64,
        update: &WorkOrderUpdate,
        now: NaiveDateTime,
    ) -> EngineResult<WorkOrderChange> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let order = WorkOrderRepository::find_by_id_in(&tx, order_id)?
            .ok_or_else(|| RepositoryError::not_found("WorkOrder", order_id))?;
        let outcome = work_order_fsm::apply_update(&order, update, now)?;

        if content_changed(&order, &outcome.order) {
            WorkOrderRepository::update_in(&tx, &outcome.order)?;
        }

        let detail = work_order_detail_in(&tx, order_id)?;
        tx.commit()?;

        if outcome.applied {
            info!(
                order_id,
                from = %outcome.from,
                to = %detail.order.status,
                effects = ?outcome.effects,
                "工单状态已流转"
            );
        } else if let Some(target) = update.status {
            debug!(order_id, from = %outcome.from, to = %target, "目标状态不在允许列表中，已忽略");
        }

        Ok(WorkOrderChange {
            detail,
            applied: outcome.applied,
            effects: outcome.effects,
        })
    }

    /// 指派负责人，状态强制置为 assigned
    #[instrument(skip(self))]
    pub fn assign(&self, order_id: i64, user_id: i64, now: NaiveDateTime) -> EngineResult<WorkOrderDetail> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let order = WorkOrderRepository::find_by_id_in(&tx, order_id)?
            .ok_or_else(|| RepositoryError::not_found("WorkOrder", order_id))?;
        let assigned = work_order_fsm::assign(&order, user_id, now);
        WorkOrderRepository::update_in(&tx, &assigned)?;

        let detail = work_order_detail_in(&tx, order_id)?;
        tx.commit()?;

        info!(order_id, user_id, from = %order.status, "工单已指派");
        Ok(detail)
    }

    /// 删除工单（备件使用记录随工单删除，旧件台账保留）
    #[instrument(skip(self))]
    pub fn delete(&self, order_id: i64) -> EngineResult<()> {
        let conn = self.get_conn()?;
        let rows = WorkOrderRepository::delete_in(&conn, order_id)?;
        if rows == 0 {
            return Err(RepositoryError::not_found("WorkOrder", order_id).into());
        }
        info!(order_id, "工单已删除");
        Ok(())
    }
}

/// 除 updated_at 外是否有变化
fn content_changed(before: &WorkOrder, after: &WorkOrder) -> bool {
    let mut normalized = after.clone();
    normalized.updated_at = before.updated_at;
    normalized != *before
}
