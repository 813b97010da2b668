// ==========================================
// 设备维保系统 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型，转换引擎/仓储错误为用户可读的错误消息
// 约束: 错误消息必须点名出问题的实体（设备资产编号、备件名称、内容项名称）
// ==========================================

use serde::Serialize;
use thiserror::Error;

use crate::domain::quantity::Quantity;
use crate::engine::error::EngineError;
use crate::repository::error::RepositoryError;

/// 错误分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// 输入不合法，调用方修正后重试
    Validation,
    /// 与当前数据状态冲突（重复、库存、守卫）
    Conflict,
    NotFound,
    Internal,
}

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 校验错误
    // ==========================================
    #[error("数据验证失败: {0}")]
    ValidationError(String),

    // ==========================================
    // 冲突错误
    // ==========================================
    #[error("操作冲突: {0}")]
    Conflict(String),

    #[error("{}已经有任务了，请在保养任务中执行", .devices.join("、"))]
    DuplicateTask { devices: Vec<String> },

    #[error("备件 {part} 库存不足，当前库存：{current}，需要：{requested}")]
    InsufficientStock {
        part: String,
        current: Quantity,
        requested: Quantity,
    },

    #[error("备件 {part} 的单位是 {unit}，数量必须是整数")]
    FractionalQuantity { part: String, unit: String },

    #[error("无法从 {from} 流转到 {to}: {reason}")]
    TransitionGuard {
        from: String,
        to: String,
        reason: String,
    },

    // ==========================================
    // 资源错误
    // ==========================================
    #[error("资源未找到: {0}")]
    NotFound(String),

    // ==========================================
    // 并发控制错误
    // ==========================================
    #[error("乐观锁冲突: {0}")]
    OptimisticLockFailure(String),

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

}

impl ApiError {
    /// 错误分类（调用方据此决定提示方式）
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::ValidationError(_) => ErrorKind::Validation,
            ApiError::Conflict(_)
            | ApiError::DuplicateTask { .. }
            | ApiError::InsufficientStock { .. }
            | ApiError::FractionalQuantity { .. }
            | ApiError::TransitionGuard { .. }
            | ApiError::OptimisticLockFailure(_) => ErrorKind::Conflict,
            ApiError::NotFound(_) => ErrorKind::NotFound,
            ApiError::DatabaseError(_)
            | ApiError::DatabaseConnectionError(_) => ErrorKind::Internal,
        }
    }

    /// 稳定的错误码
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::ValidationError(_) => "VALIDATION_ERROR",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::DuplicateTask { .. } => "DUPLICATE_TASK",
            ApiError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            ApiError::FractionalQuantity { .. } => "FRACTIONAL_QUANTITY",
            ApiError::TransitionGuard { .. } => "TRANSITION_GUARD",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::OptimisticLockFailure(_) => "OPTIMISTIC_LOCK_FAILURE",
            ApiError::DatabaseError(_) => "DATABASE_ERROR",
            ApiError::DatabaseConnectionError(_) => "DATABASE_CONNECTION_ERROR",
        }
    }
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::OptimisticLockFailure {
                entity,
                id,
                expected,
                actual,
            } => ApiError::OptimisticLockFailure(format!(
                "{}(id={})已被其他操作修改（期望revision={}，实际revision={}）",
                entity, id, expected, actual
            )),
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::Conflict(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::Conflict(format!("外键约束违反: {}", msg))
            }
            RepositoryError::ValidationError(msg) => ApiError::ValidationError(msg),
            RepositoryError::FieldValueError { field, message } => {
                ApiError::ValidationError(format!("字段{}错误: {}", field, message))
            }
        }
    }
}

// ==========================================
// 从 EngineError 转换
// ==========================================
impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Validation(msg) => ApiError::ValidationError(msg),
            EngineError::InvalidState(msg) => ApiError::Conflict(msg),
            EngineError::DuplicateTask { devices } => ApiError::DuplicateTask { devices },
            EngineError::InsufficientStock {
                part,
                current,
                requested,
            } => ApiError::InsufficientStock {
                part,
                current,
                requested,
            },
            EngineError::FractionalQuantity { part, unit } => {
                ApiError::FractionalQuantity { part, unit }
            }
            EngineError::TransitionGuard { from, to, reason } => ApiError::TransitionGuard {
                from: from.to_string(),
                to: to.to_string(),
                reason,
            },
            EngineError::Repository(err) => ApiError::from(err),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;
