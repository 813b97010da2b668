// ==========================================
// 设备维保系统 - 保养任务领域模型
// ==========================================
// 唯一约束: (plan_id, device_id, scheduled_at)
// 任务只由生成器创建、由提交修改，本引擎不删除任务
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::asset::Device;
use crate::domain::plan::{ChecklistItem, MaintenancePlan};
use crate::domain::types::{ChecklistItemType, ResultStatus, TaskStatus};

/// 单个内容项的执行结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemResult {
    #[serde(rename = "type")]
    pub item_type: ChecklistItemType,
    /// 定性为字符串，定量为数字（提交时也允许数字字符串）
    pub value: serde_json::Value,
    pub status: ResultStatus,
}

/// 执行结果，键为内容项ID
pub type TaskResults = BTreeMap<String, ItemResult>;

// ==========================================
// MaintenanceTask - 保养任务
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceTask {
    pub task_id: i64,
    pub plan_id: Option<i64>, // 计划删除后置空
    pub device_id: i64,
    pub scheduled_at: NaiveDateTime,
    pub assigned_to: Option<i64>,
    pub status: TaskStatus,
    pub started_at: Option<NaiveDateTime>,
    pub finished_at: Option<NaiveDateTime>,
    pub result: TaskResults,
    pub has_abnormal: bool,
    pub abnormal_work_order_id: Option<i64>,
    pub attachments: Vec<String>,
    pub notes: Option<String>,
    // 验收信息（外部流程写入）
    pub review_notes: Option<String>,
    pub reviewed_at: Option<NaiveDateTime>,
    pub reviewed_by: Option<i64>,
    pub created_at: NaiveDateTime,
}

/// 新任务（生成器写入前的形态）
#[derive(Debug, Clone)]
pub struct NewTask {
    pub plan_id: i64,
    pub device_id: i64,
    pub scheduled_at: NaiveDateTime,
    pub assigned_to: Option<i64>,
}

// ==========================================
// TaskDetail - 任务 + 设备 + 计划 + 内容项
// ==========================================
// 调用方无需再次查询即可渲染
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDetail {
    pub task: MaintenanceTask,
    pub device: Option<Device>,
    pub plan: Option<MaintenancePlan>,
    pub items: Vec<ChecklistItem>,
}

/// 任务提交输入
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubmitTaskInput {
    pub results: TaskResults,
    pub notes: Option<String>,
    pub attachments: Option<Vec<String>>,
}
