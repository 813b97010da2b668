// ==========================================
// 设备维保系统 - 工单领域模型
// ==========================================
// 工单拥有备件使用记录 (work_order_part)
// 旧件台账 (old_part) 独立存在，工单删除后仍保留
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::domain::asset::{Device, SparePart};
use crate::domain::types::{WorkOrderPriority, WorkOrderStatus};

// ==========================================
// WorkOrder - 维修工单
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkOrder {
    pub order_id: i64,
    pub order_no: String,
    pub reporter_id: Option<i64>,
    pub device_id: Option<i64>,
    pub title: String,
    pub description: Option<String>,
    pub priority: WorkOrderPriority,
    pub status: WorkOrderStatus,
    pub assigned_to: Option<i64>,
    pub contact: Option<String>,
    pub started_at: Option<NaiveDateTime>,
    pub finished_at: Option<NaiveDateTime>,
    pub accepted_at: Option<NaiveDateTime>,
    pub reported_at: Option<NaiveDateTime>,
    pub response_time: Option<i64>, // 响应时间（分钟）
    pub repair_time: Option<i64>,   // 维修时间（分钟）
    pub attachments: Vec<String>,
    pub fault_category: Option<String>,
    pub fault_cause: Option<String>,
    pub solution: Option<String>,
    pub revision: i32, // 乐观锁
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// 新建工单输入（人工报修 / 保养异常自动生成共用）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateWorkOrderInput {
    pub device_id: Option<i64>,
    pub title: String,
    pub description: Option<String>,
    pub priority: Option<WorkOrderPriority>,
    pub contact: Option<String>,
    pub fault_category: Option<String>,
    pub attachments: Option<Vec<String>>,
}

/// 工单更新输入
///
/// `status` 为 Some 时请求一次状态流转；不在允许列表中的目标被静默忽略。
/// `assigned_to` 仅在 created -> in_progress 且原先无负责人时被采纳。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkOrderUpdate {
    pub status: Option<WorkOrderStatus>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<WorkOrderPriority>,
    pub contact: Option<String>,
    pub fault_category: Option<String>,
    pub fault_cause: Option<String>,
    pub solution: Option<String>,
    pub attachments: Option<Vec<String>>,
    pub assigned_to: Option<i64>,
}

impl WorkOrderUpdate {
    /// 仅状态流转
    pub fn status(target: WorkOrderStatus) -> Self {
        Self {
            status: Some(target),
            ..Default::default()
        }
    }
}

// ==========================================
// WorkOrderPart - 工单备件使用记录
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkOrderPart {
    pub id: i64,
    pub work_order_id: i64,
    pub part_id: i64,
    pub qty: f64,
    pub created_at: NaiveDateTime,
}

/// 使用记录 + 备件当前快照
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsedPart {
    pub usage: WorkOrderPart,
    pub part: Option<SparePart>,
}

// ==========================================
// OldPart - 旧件台账
// ==========================================
// 只追加，不修改不删除
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OldPart {
    pub id: i64,
    pub work_order_id: Option<i64>, // 工单删除后置空
    pub device_id: Option<i64>,
    pub part_no: String, // 带退役后缀
    pub qty: f64,
    pub name: String,
    pub spec: serde_json::Value,
    pub supplier: Option<String>,
    pub unit: Option<String>,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
}

/// 单行备件领用
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PartUsage {
    pub part_id: i64,
    pub qty: f64,
}

// ==========================================
// WorkOrderDetail - 工单 + 设备 + 使用备件
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkOrderDetail {
    pub order: WorkOrder,
    pub device: Option<Device>,
    pub used_parts: Vec<UsedPart>,
}
