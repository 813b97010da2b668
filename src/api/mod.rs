// ==========================================
// 设备维保系统 - API 层
// ==========================================
// 职责: 对外暴露的业务接口，统一错误类型
// ==========================================

pub mod error;
pub mod maintenance_api;
pub mod work_order_api;

// 重导出
pub use error::{ApiError, ApiResult, ErrorKind};
pub use maintenance_api::MaintenanceApi;
pub use work_order_api::WorkOrderApi;
