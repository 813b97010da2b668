// ==========================================
// 设备维保系统 - 仓储聚合
// ==========================================
// 职责: 聚合查询所需的所有 Repository（共享同一连接）
// 目标: 减少 API 层构造参数数量
// ==========================================

use rusqlite::Connection;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::domain::plan::PlanDetail;
use crate::domain::task::TaskDetail;
use crate::domain::work_order::WorkOrderDetail;
use crate::engine::detail::{plan_detail_in, task_detail_in, work_order_detail_in};
use crate::repository::{
    DeviceRepository, OldPartRepository, PlanRepository, RepositoryError, RepositoryResult,
    SparePartRepository, TaskRepository, WorkOrderRepository,
};

/// 维保仓储集合
///
/// # 包含的仓储
/// - `plan_repo`: 计划 / 内容项 / 设备绑定
/// - `task_repo`: 保养任务
/// - `device_repo`: 设备目录
/// - `spare_part_repo`: 备件目录
/// - `work_order_repo`: 工单 / 备件使用记录
/// - `old_part_repo`: 旧件台账
#[derive(Clone)]
pub struct MaintenanceRepositories {
    pub plan_repo: Arc<PlanRepository>,
    pub task_repo: Arc<TaskRepository>,
    pub device_repo: Arc<DeviceRepository>,
    pub spare_part_repo: Arc<SparePartRepository>,
    pub work_order_repo: Arc<WorkOrderRepository>,
    pub old_part_repo: Arc<OldPartRepository>,
    conn: Arc<Mutex<Connection>>,
}

impl MaintenanceRepositories {
    /// 基于同一连接创建全部仓储
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self {
            plan_repo: Arc::new(PlanRepository::new(conn.clone())),
            task_repo: Arc::new(TaskRepository::new(conn.clone())),
            device_repo: Arc::new(DeviceRepository::new(conn.clone())),
            spare_part_repo: Arc::new(SparePartRepository::new(conn.clone())),
            work_order_repo: Arc::new(WorkOrderRepository::new(conn.clone())),
            old_part_repo: Arc::new(OldPartRepository::new(conn.clone())),
            conn,
        }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 聚合读模型（单次加锁内完成组装）
    // ==========================================

    pub fn plan_detail(&self, plan_id: i64) -> RepositoryResult<PlanDetail> {
        let conn = self.get_conn()?;
        plan_detail_in(&conn, plan_id)
    }

    pub fn task_detail(&self, task_id: i64) -> RepositoryResult<TaskDetail> {
        let conn = self.get_conn()?;
        task_detail_in(&conn, task_id)
    }

    pub fn work_order_detail(&self, order_id: i64) -> RepositoryResult<WorkOrderDetail> {
        let conn = self.get_conn()?;
        work_order_detail_in(&conn, order_id)
    }
}
