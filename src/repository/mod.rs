// ==========================================
// 设备维保系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================
// 约定: `*_in(conn, ..)` 形式的函数接收调用方持有的连接/事务，
//       供引擎层在单个事务内组合多表读写
// ==========================================

pub mod device_repo;
pub mod error;
pub mod old_part_repo;
pub mod plan_repo;
pub mod spare_part_repo;
pub mod task_repo;
pub mod work_order_repo;

mod row;

// 重导出核心仓储
pub use device_repo::DeviceRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use old_part_repo::OldPartRepository;
pub use plan_repo::PlanRepository;
pub use spare_part_repo::SparePartRepository;
pub use task_repo::TaskRepository;
pub use work_order_repo::WorkOrderRepository;
