// ==========================================
// 设备维保系统 - 外部主数据读模型
// ==========================================
// 设备、备件的主数据由外部模块维护，这里只保留本引擎需要的字段
// ==========================================

use serde::{Deserialize, Serialize};

use crate::domain::quantity::Quantity;

/// 设备
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub device_id: i64,
    pub asset_no: String, // 资产编号（错误提示中使用）
    pub name: String,
    pub location: Option<String>,
}

impl Device {
    /// 提示用标签: 资产编号（名称）
    pub fn label(&self) -> String {
        format!("{}（{}）", self.asset_no, self.name)
    }
}

/// 备件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SparePart {
    pub part_id: i64,
    pub part_no: String,
    pub name: String,
    pub spec: serde_json::Value, // 规格（JSON 对象）
    pub supplier: Option<String>,
    pub stock_qty: Quantity, // 当前库存（千分位定点）
    pub unit: String, // pc / set / m ...
    pub location: Option<String>,
}
