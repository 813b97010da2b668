// ==========================================
// 设备维保系统 - 配置读取 Trait
// ==========================================
// 职责: 定义引擎所需的配置读取接口（不包含实现）
// 实现者: ConfigManager（从 config_kv 表读取）
// ==========================================

use async_trait::async_trait;
use std::error::Error;

#[async_trait]
pub trait MaintenanceConfigReader: Send + Sync {
    /// 班次交接时刻 (早班, 晚班)
    ///
    /// # 默认值
    /// - (8, 20)
    async fn get_shift_hours(&self) -> Result<(u32, u32), Box<dyn Error>>;

    /// 单个计划内容项上限
    ///
    /// # 默认值
    /// - 30
    async fn get_max_checklist_items(&self) -> Result<usize, Box<dyn Error>>;

    /// 必须整数领用的备件单位
    ///
    /// # 默认值
    /// - ["pc", "set"]
    async fn get_whole_units(&self) -> Result<Vec<String>, Box<dyn Error>>;

    /// 旧件编号后缀
    ///
    /// # 默认值
    /// - "J"
    async fn get_old_part_suffix(&self) -> Result<String, Box<dyn Error>>;

    /// 工单号前缀
    ///
    /// # 默认值
    /// - "WO"
    async fn get_order_no_prefix(&self) -> Result<String, Box<dyn Error>>;
}
