// ==========================================
// 设备维保系统 - 领域类型定义
// ==========================================
// 职责: 保养频率、内容项类型、任务/工单状态等枚举
// 存储格式: 小写 snake_case（与数据库一致）
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 保养频率 (Frequency Type)
// ==========================================
// 同时作为定时触发器的分桶键
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrequencyType {
    Shift,   // 班次
    Daily,   // 每日
    Weekly,  // 每周
    Monthly, // 每月
    Yearly,  // 每年
}

impl FrequencyType {
    /// 全部频率（定时器按此顺序注册）
    pub const ALL: [FrequencyType; 5] = [
        FrequencyType::Shift,
        FrequencyType::Daily,
        FrequencyType::Weekly,
        FrequencyType::Monthly,
        FrequencyType::Yearly,
    ];

    /// 从字符串解析频率，未知值返回 None
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "shift" => Some(FrequencyType::Shift),
            "daily" => Some(FrequencyType::Daily),
            "weekly" => Some(FrequencyType::Weekly),
            "monthly" => Some(FrequencyType::Monthly),
            "yearly" => Some(FrequencyType::Yearly),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            FrequencyType::Shift => "shift",
            FrequencyType::Daily => "daily",
            FrequencyType::Weekly => "weekly",
            FrequencyType::Monthly => "monthly",
            FrequencyType::Yearly => "yearly",
        }
    }
}

impl fmt::Display for FrequencyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 保养内容项类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChecklistItemType {
    Qualitative,  // 定性（正常/异常）
    Quantitative, // 定量（数值 + 上下限）
}

impl ChecklistItemType {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "qualitative" => Some(ChecklistItemType::Qualitative),
            "quantitative" => Some(ChecklistItemType::Quantitative),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            ChecklistItemType::Qualitative => "qualitative",
            ChecklistItemType::Quantitative => "quantitative",
        }
    }
}

impl fmt::Display for ChecklistItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 单项执行结果状态
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    Normal,
    Abnormal,
}

impl ResultStatus {
    pub fn is_abnormal(&self) -> bool {
        matches!(self, ResultStatus::Abnormal)
    }
}

// ==========================================
// 保养任务状态
// ==========================================
// 本引擎只执行 pending -> completed，其余状态由外部协作方写入
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,           // 待执行
    InProgress,        // 执行中
    PendingAcceptance, // 待验收
    Completed,         // 已完成
    Cancelled,         // 已取消
    Overdue,           // 已逾期
}

impl TaskStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Some(TaskStatus::Pending),
            "in_progress" => Some(TaskStatus::InProgress),
            "pending_acceptance" => Some(TaskStatus::PendingAcceptance),
            "completed" => Some(TaskStatus::Completed),
            "cancelled" => Some(TaskStatus::Cancelled),
            "overdue" => Some(TaskStatus::Overdue),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::PendingAcceptance => "pending_acceptance",
            TaskStatus::Completed => "completed",
            TaskStatus::Cancelled => "cancelled",
            TaskStatus::Overdue => "overdue",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 工单状态
// ==========================================
// 流转表见 engine::work_order_fsm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkOrderStatus {
    Created,           // 待报修
    Assigned,          // 待执行
    Accepted,          // 已接受
    InProgress,        // 执行中
    PendingAcceptance, // 待验收
    Completed,         // 已完成
    Closed,            // 已关闭
}

impl WorkOrderStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "created" => Some(WorkOrderStatus::Created),
            "assigned" => Some(WorkOrderStatus::Assigned),
            "accepted" => Some(WorkOrderStatus::Accepted),
            "in_progress" => Some(WorkOrderStatus::InProgress),
            "pending_acceptance" => Some(WorkOrderStatus::PendingAcceptance),
            "completed" => Some(WorkOrderStatus::Completed),
            "closed" => Some(WorkOrderStatus::Closed),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            WorkOrderStatus::Created => "created",
            WorkOrderStatus::Assigned => "assigned",
            WorkOrderStatus::Accepted => "accepted",
            WorkOrderStatus::InProgress => "in_progress",
            WorkOrderStatus::PendingAcceptance => "pending_acceptance",
            WorkOrderStatus::Completed => "completed",
            WorkOrderStatus::Closed => "closed",
        }
    }

    /// 是否为终态
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkOrderStatus::Closed)
    }
}

impl fmt::Display for WorkOrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 工单优先级
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkOrderPriority {
    Low,
    Normal,
    High,
    Urgent,
}

impl Default for WorkOrderPriority {
    fn default() -> Self {
        WorkOrderPriority::Normal
    }
}

impl WorkOrderPriority {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" => Some(WorkOrderPriority::Low),
            "normal" => Some(WorkOrderPriority::Normal),
            "high" => Some(WorkOrderPriority::High),
            "urgent" => Some(WorkOrderPriority::Urgent),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            WorkOrderPriority::Low => "low",
            WorkOrderPriority::Normal => "normal",
            WorkOrderPriority::High => "high",
            WorkOrderPriority::Urgent => "urgent",
        }
    }
}

impl fmt::Display for WorkOrderPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}
