// ==========================================
// 设备维保系统 - 保养计划领域模型
// ==========================================
// 计划拥有保养内容项与设备绑定（级联删除）
// 内容项/绑定在更新时整体替换，不做合并
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::domain::asset::Device;
use crate::domain::types::{ChecklistItemType, FrequencyType};

// ==========================================
// MaintenancePlan - 保养计划
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenancePlan {
    pub plan_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub frequency_type: FrequencyType,
    pub frequency_value: u32,             // 频率倍数（正整数）
    pub next_due_at: Option<NaiveDateTime>, // 下次到期时间
    pub active: bool,
    pub assigned_to: Option<i64>,         // 默认执行人，生成任务时继承
    pub created_by: Option<i64>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

// ==========================================
// 定性选项 / 定量设置
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualitativeOptions {
    pub normal: String,
    pub abnormal: String,
}

impl Default for QualitativeOptions {
    fn default() -> Self {
        Self {
            normal: "正常".to_string(),
            abnormal: "异常".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantitativeSettings {
    pub unit: String,
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
}

// ==========================================
// ChecklistItem - 保养内容项
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub item_id: i64,
    pub plan_id: i64,
    pub name: String,
    pub item_type: ChecklistItemType,
    pub qualitative_options: Option<QualitativeOptions>,
    pub quantitative_settings: Option<QuantitativeSettings>,
    pub sort_order: i32,
    pub description: Option<String>,
}

impl ChecklistItem {
    /// 提交结果中使用的键（内容项ID的字符串形式）
    pub fn result_key(&self) -> String {
        self.item_id.to_string()
    }
}

// ==========================================
// PlanDetail - 计划 + 内容项 + 绑定设备
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanDetail {
    pub plan: MaintenancePlan,
    pub items: Vec<ChecklistItem>, // 已按 sort_order 排序
    pub devices: Vec<Device>,
}

// ==========================================
// 输入模型
// ==========================================

/// 新建内容项输入
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChecklistItemInput {
    pub name: String,
    pub item_type: ChecklistItemType,
    pub qualitative_options: Option<QualitativeOptions>,
    pub quantitative_settings: Option<QuantitativeSettings>,
    pub sort_order: Option<i32>, // 缺省时取输入下标
    pub description: Option<String>,
}

impl ChecklistItemInput {
    /// 定性内容项（默认选项文本）
    pub fn qualitative(name: &str) -> Self {
        Self {
            name: name.to_string(),
            item_type: ChecklistItemType::Qualitative,
            qualitative_options: Some(QualitativeOptions::default()),
            quantitative_settings: None,
            sort_order: None,
            description: None,
        }
    }

    /// 定量内容项
    pub fn quantitative(name: &str, unit: &str, min_value: Option<f64>, max_value: Option<f64>) -> Self {
        Self {
            name: name.to_string(),
            item_type: ChecklistItemType::Quantitative,
            qualitative_options: None,
            quantitative_settings: Some(QuantitativeSettings {
                unit: unit.to_string(),
                min_value,
                max_value,
            }),
            sort_order: None,
            description: None,
        }
    }
}

/// 新建计划输入
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePlanInput {
    pub title: String,
    pub description: Option<String>,
    pub frequency_type: FrequencyType,
    pub frequency_value: u32,
    pub next_due_at: Option<NaiveDateTime>,
    pub active: bool,
    pub assigned_to: Option<i64>,
    pub items: Vec<ChecklistItemInput>,
    pub device_ids: Vec<i64>,
}

/// 更新计划输入（None 表示不修改）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdatePlanInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub frequency_type: Option<FrequencyType>,
    pub frequency_value: Option<u32>,
    pub next_due_at: Option<NaiveDateTime>,
    pub active: Option<bool>,
    pub assigned_to: Option<i64>,
    pub items: Option<Vec<ChecklistItemInput>>,  // Some 时整体替换
    pub device_ids: Option<Vec<i64>>,            // Some 时整体替换
}
