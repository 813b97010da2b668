// ==========================================
// 设备维保系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite + tokio
// 系统定位: 保养计划 → 任务 → 异常工单 → 备件领用 的维保闭环
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA/建表）
pub mod db;

// 日志系统
pub mod logging;

// 时钟
pub mod clock;

// API 层 - 业务接口
pub mod api;

// 应用层 - 组件装配
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{
    ChecklistItemType, FrequencyType, ResultStatus, TaskStatus, WorkOrderPriority,
    WorkOrderStatus,
};

// 领域实体
pub use domain::{
    ChecklistItem, Device, MaintenancePlan, MaintenanceTask, OldPart, SparePart, WorkOrder,
    WorkOrderPart,
};

// 引擎
pub use engine::{
    GenerationMode, InventoryEngine, MaintenanceScheduler, PlanService, TaskExecutor,
    TaskGenerator, WorkOrderEngine,
};

// API
pub use api::{ApiError, ApiResult, MaintenanceApi, WorkOrderApi};

// 时钟
pub use clock::{Clock, FixedClock, SystemClock};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "设备维保系统";
