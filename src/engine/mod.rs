// ==========================================
// 设备维保系统 - 引擎层
// ==========================================
// 职责: 实现维保业务规则（任务生成 / 提交判定 / 工单流转 / 备件领用）
// 红线: 多表写入必须在单个事务内完成；“当前时间”由调用方传入
// ==========================================

pub mod detail;
pub mod due_date;
pub mod error;
pub mod inventory;
pub mod plan_service;
pub mod repositories;
pub mod scheduler;
pub mod task_executor;
pub mod task_generator;
pub mod work_order_engine;
pub mod work_order_fsm;

// 重导出核心引擎
pub use due_date::next_due;
pub use error::{EngineError, EngineResult};
pub use inventory::{ConsumptionReceipt, InventoryEngine};
pub use plan_service::PlanService;
pub use repositories::MaintenanceRepositories;
pub use scheduler::{next_fire_after, BucketRunReport, MaintenanceScheduler, PlanRunFailure};
pub use task_executor::{evaluate, AbnormalItem, Evaluation, TaskExecutor};
pub use task_generator::{GenerationMode, GenerationOutcome, TaskGenerator};
pub use work_order_engine::{WorkOrderChange, WorkOrderEngine};
pub use work_order_fsm::{TransitionEffect, TransitionOutcome};
