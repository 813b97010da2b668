// ==========================================
// 设备维保系统 - 引擎层错误类型
// ==========================================
// 职责: 表达业务规则拒绝（校验失败 / 冲突 / 守卫拒绝）
// 说明: 静默跳过不是错误，由返回值表达
// ==========================================

use thiserror::Error;

use crate::domain::quantity::Quantity;
use crate::domain::types::WorkOrderStatus;
use crate::repository::error::RepositoryError;

#[derive(Error, Debug)]
pub enum EngineError {
    /// 输入不合法（缺少结果、非数值、计划内容项超限等）
    #[error("数据验证失败: {0}")]
    Validation(String),

    /// 当前状态不允许该操作（任务已完成、工单不在执行中等）
    #[error("状态冲突: {0}")]
    InvalidState(String),

    /// 重复生成任务，devices 为“资产编号（名称）”列表
    #[error("以下设备在该时间已存在保养任务: {}", .devices.join("、"))]
    DuplicateTask { devices: Vec<String> },

    #[error("备件库存不足: {part}，当前库存 {current}，申请数量 {requested}")]
    InsufficientStock {
        part: String,
        current: Quantity,
        requested: Quantity,
    },

    #[error("备件 {part} 的单位为 {unit}，领用数量必须为整数")]
    FractionalQuantity { part: String, unit: String },

    #[error("工单状态流转被拒绝: {from} -> {to}，{reason}")]
    TransitionGuard {
        from: WorkOrderStatus,
        to: WorkOrderStatus,
        reason: String,
    },

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<rusqlite::Error> for EngineError {
    fn from(err: rusqlite::Error) -> Self {
        EngineError::Repository(RepositoryError::from(err))
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
