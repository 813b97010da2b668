// ==========================================
// 设备维保系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod asset;
pub mod plan;
pub mod quantity;
pub mod task;
pub mod types;
pub mod work_order;

// 重导出核心类型
pub use asset::{Device, SparePart};
pub use plan::{
    ChecklistItem, ChecklistItemInput, CreatePlanInput, MaintenancePlan, PlanDetail,
    QualitativeOptions, QuantitativeSettings, UpdatePlanInput,
};
pub use quantity::Quantity;
pub use task::{ItemResult, MaintenanceTask, NewTask, SubmitTaskInput, TaskDetail, TaskResults};
pub use types::{
    ChecklistItemType, FrequencyType, ResultStatus, TaskStatus, WorkOrderPriority,
    WorkOrderStatus,
};
pub use work_order::{
    CreateWorkOrderInput, OldPart, PartUsage, UsedPart, WorkOrder, WorkOrderDetail,
    WorkOrderPart, WorkOrderUpdate,
};
