// ==========================================
// 设备维保系统 - 聚合读模型装配
// ==========================================
// 职责: 组装 PlanDetail / TaskDetail / WorkOrderDetail
// 调用方拿到结果后无需再次查询即可渲染
// ==========================================

use rusqlite::Connection;

use crate::domain::plan::PlanDetail;
use crate::domain::task::TaskDetail;
use crate::domain::work_order::{UsedPart, WorkOrderDetail};
use crate::repository::device_repo::DeviceRepository;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::plan_repo::PlanRepository;
use crate::repository::spare_part_repo::SparePartRepository;
use crate::repository::task_repo::TaskRepository;
use crate::repository::work_order_repo::WorkOrderRepository;

pub(crate) fn plan_detail_in(conn: &Connection, plan_id: i64) -> RepositoryResult<PlanDetail> {
    let plan = PlanRepository::find_by_id_in(conn, plan_id)?
        .ok_or_else(|| RepositoryError::not_found("MaintenancePlan", plan_id))?;
    let items = PlanRepository::find_items_in(conn, plan_id)?;
    let devices = DeviceRepository::devices_bound_to_plan_in(conn, plan_id)?;
    Ok(PlanDetail { plan, items, devices })
}

pub(crate) fn task_detail_in(conn: &Connection, task_id: i64) -> RepositoryResult<TaskDetail> {
    let task = TaskRepository::find_by_id_in(conn, task_id)?
        .ok_or_else(|| RepositoryError::not_found("MaintenanceTask", task_id))?;
    let device = DeviceRepository::find_by_id_in(conn, task.device_id)?;
    let (plan, items) = match task.plan_id {
        Some(plan_id) => (
            PlanRepository::find_by_id_in(conn, plan_id)?,
            PlanRepository::find_items_in(conn, plan_id)?,
        ),
        None => (None, Vec::new()),
    };
    Ok(TaskDetail {
        task,
        device,
        plan,
        items,
    })
}

pub(crate) fn work_order_detail_in(conn: &Connection, order_id: i64) -> RepositoryResult<WorkOrderDetail> {
    let order = WorkOrderRepository::find_by_id_in(conn, order_id)?
        .ok_or_else(|| RepositoryError::not_found("WorkOrder", order_id))?;
    let device = match order.device_id {
        Some(device_id) => DeviceRepository::find_by_id_in(conn, device_id)?,
        None => None,
    };
    let used_parts = WorkOrderRepository::list_parts_in(conn, order_id)?
        .into_iter()
        .map(|usage| {
            let part = SparePartRepository::get_part_in(conn, usage.part_id)?;
            Ok(UsedPart { usage, part })
        })
        .collect::<RepositoryResult<Vec<_>>>()?;
    Ok(WorkOrderDetail {
        order,
        device,
        used_parts,
    })
}
