// ==========================================
// 设备维保系统 - 工单 API
// ==========================================
// 职责: 工单创建、更新与状态流转、指派、备件领用、查询
// ==========================================

use std::sync::Arc;

use crate::api::error::{ApiError, ApiResult};
use crate::clock::Clock;
use crate::domain::types::WorkOrderStatus;
use crate::domain::work_order::{
    CreateWorkOrderInput, OldPart, PartUsage, WorkOrderDetail, WorkOrderPart, WorkOrderUpdate,
};
use crate::engine::{
    ConsumptionReceipt, InventoryEngine, MaintenanceRepositories, WorkOrderChange, WorkOrderEngine,
};

// ==========================================
// WorkOrderApi - 工单 API
// ==========================================
pub struct WorkOrderApi {
    engine: Arc<WorkOrderEngine>,
    inventory: Arc<InventoryEngine>,
    repos: MaintenanceRepositories,
    clock: Arc<dyn Clock>,
}

impl WorkOrderApi {
    pub fn new(
        engine: Arc<WorkOrderEngine>,
        inventory: Arc<InventoryEngine>,
        repos: MaintenanceRepositories,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            engine,
            inventory,
            repos,
            clock,
        }
    }

    /// 创建工单（人工报修）
    ///
    /// # 参数
    /// - input: 工单内容（优先级缺省为 normal）
    /// - reporter_id: 报修人
    pub fn create_work_order(
        &self,
        input: &CreateWorkOrderInput,
        reporter_id: Option<i64>,
    ) -> ApiResult<WorkOrderDetail> {
        Ok(self.engine.create(input, reporter_id, self.clock.now())?)
    }

    /// 更新工单字段，可附带一次状态流转
    ///
    /// 目标状态不在允许列表中时状态保持不变，`applied` 为 false
    pub fn update_work_order(&self, order_id: i64, update: &WorkOrderUpdate) -> ApiResult<WorkOrderChange> {
        Ok(self.engine.update(order_id, update, self.clock.now())?)
    }

    /// 仅状态流转
    pub fn transition_work_order(
        &self,
        order_id: i64,
        target: WorkOrderStatus,
    ) -> ApiResult<WorkOrderChange> {
        self.update_work_order(order_id, &WorkOrderUpdate::status(target))
    }

    /// 指派负责人（状态强制置为 assigned）
    pub fn assign_work_order(&self, order_id: i64, user_id: i64) -> ApiResult<WorkOrderDetail> {
        Ok(self.engine.assign(order_id, user_id, self.clock.now())?)
    }

    /// 领用备件（整批原子执行）
    pub fn use_spare_parts(
        &self,
        order_id: i64,
        usages: &[PartUsage],
        user_id: Option<i64>,
    ) -> ApiResult<ConsumptionReceipt> {
        Ok(self.inventory.use_parts(order_id, usages, user_id, self.clock.now())?)
    }

    pub fn find_work_order(&self, order_id: i64) -> ApiResult<WorkOrderDetail> {
        Ok(self.repos.work_order_detail(order_id)?)
    }

    pub fn list_work_order_parts(&self, order_id: i64) -> ApiResult<Vec<WorkOrderPart>> {
        if self.repos.work_order_repo.find_by_id(order_id)?.is_none() {
            return Err(ApiError::NotFound(format!("WorkOrder(id={})不存在", order_id)));
        }
        Ok(self.repos.work_order_repo.list_parts(order_id)?)
    }

    /// 按工单查询旧件台账（工单删除后可用 list_all_old_parts 查询）
    pub fn list_old_parts_by_order(&self, order_id: i64) -> ApiResult<Vec<OldPart>> {
        Ok(self.repos.old_part_repo.list_by_order(order_id)?)
    }

    pub fn list_all_old_parts(&self) -> ApiResult<Vec<OldPart>> {
        Ok(self.repos.old_part_repo.list_all()?)
    }

    /// 删除工单（外部协作方的移除路径，旧件台账保留）
    pub fn delete_work_order(&self, order_id: i64) -> ApiResult<()> {
        Ok(self.engine.delete(order_id)?)
    }
}
