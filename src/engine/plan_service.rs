// ==========================================
// 设备维保系统 - 保养计划服务
// ==========================================
// 职责: 计划创建 / 更新 / 设备绑定 / 删除
// 规则: 内容项数量 1..=上限；内容项与设备绑定更新时整体替换
// 事务: 计划 + 内容项 + 绑定在同一事务内写入
// ==========================================

use chrono::NaiveDateTime;
use rusqlite::{Connection, TransactionBehavior};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{info, instrument};

use crate::config::MaintenanceSettings;
use crate::domain::plan::{
    ChecklistItemInput, CreatePlanInput, MaintenancePlan, PlanDetail, QualitativeOptions,
    UpdatePlanInput,
};
use crate::domain::types::ChecklistItemType;
use crate::engine::detail::plan_detail_in;
use crate::engine::error::{EngineError, EngineResult};
use crate::repository::device_repo::DeviceRepository;
use crate::repository::error::RepositoryError;
use crate::repository::plan_repo::PlanRepository;

pub struct PlanService {
    conn: Arc<Mutex<Connection>>,
    settings: MaintenanceSettings,
}

impl PlanService {
    pub fn new(conn: Arc<Mutex<Connection>>, settings: MaintenanceSettings) -> Self {
        Self { conn, settings }
    }

    fn get_conn(&self) -> EngineResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()).into())
    }

    /// 创建计划（含内容项与设备绑定）
    #[instrument(skip(self, input), fields(title = %input.title))]
    pub fn create_plan(
        &self,
        input: &CreatePlanInput,
        user_id: Option<i64>,
        now: NaiveDateTime,
    ) -> EngineResult<PlanDetail> {
        validate_title(&input.title)?;
        validate_frequency_value(input.frequency_value)?;
        let items = self.normalize_items(&input.items)?;

        let mut conn = self.get_conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        ensure_devices_exist(&tx, &input.device_ids)?;

        let plan = MaintenancePlan {
            plan_id: 0,
            title: input.title.trim().to_string(),
            description: input.description.clone(),
            frequency_type: input.frequency_type,
            frequency_value: input.frequency_value,
            next_due_at: input.next_due_at,
            active: input.active,
            assigned_to: input.assigned_to,
            created_by: user_id,
            created_at: now,
            updated_at: now,
        };
        let plan_id = PlanRepository::insert_plan_in(&tx, &plan)?;
        PlanRepository::insert_items_in(&tx, plan_id, &items)?;
        PlanRepository::replace_bindings_in(&tx, plan_id, &input.device_ids)?;

        let detail = plan_detail_in(&tx, plan_id)?;
        tx.commit()?;

        info!(
            plan_id,
            frequency = %detail.plan.frequency_type,
            items = detail.items.len(),
            devices = detail.devices.len(),
            "保养计划已创建"
        );
        Ok(detail)
    }

    /// 部分更新计划；items / device_ids 为 Some 时整体替换
    #[instrument(skip(self, input))]
    pub fn update_plan(
        &self,
        plan_id: i64,
        input: &UpdatePlanInput,
        now: NaiveDateTime,
    ) -> EngineResult<PlanDetail> {
        let items = match &input.items {
            Some(items) => Some(self.normalize_items(items)?),
            None => None,
        };

        let mut conn = self.get_conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let mut plan = PlanRepository::find_by_id_in(&tx, plan_id)?
            .ok_or_else(|| RepositoryError::not_found("MaintenancePlan", plan_id))?;

        if let Some(title) = &input.title {
            validate_title(title)?;
            plan.title = title.trim().to_string();
        }
        if let Some(description) = &input.description {
            plan.description = Some(description.clone());
        }
        if let Some(frequency_type) = input.frequency_type {
            plan.frequency_type = frequency_type;
        }
        if let Some(frequency_value) = input.frequency_value {
            validate_frequency_value(frequency_value)?;
            plan.frequency_value = frequency_value;
        }
        if let Some(next_due_at) = input.next_due_at {
            plan.next_due_at = Some(next_due_at);
        }
        if let Some(active) = input.active {
            plan.active = active;
        }
        if let Some(assigned_to) = input.assigned_to {
            plan.assigned_to = Some(assigned_to);
        }
        plan.updated_at = now;
        PlanRepository::update_plan_in(&tx, &plan)?;

        if let Some(items) = &items {
            PlanRepository::delete_items_in(&tx, plan_id)?;
            PlanRepository::insert_items_in(&tx, plan_id, items)?;
        }
        if let Some(device_ids) = &input.device_ids {
            ensure_devices_exist(&tx, device_ids)?;
            PlanRepository::replace_bindings_in(&tx, plan_id, device_ids)?;
        }

        let detail = plan_detail_in(&tx, plan_id)?;
        tx.commit()?;

        info!(
            plan_id,
            items_replaced = items.is_some(),
            devices_replaced = input.device_ids.is_some(),
            "保养计划已更新"
        );
        Ok(detail)
    }

    /// 整体替换设备绑定
    #[instrument(skip(self, device_ids))]
    pub fn bind_devices(&self, plan_id: i64, device_ids: &[i64]) -> EngineResult<PlanDetail> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if PlanRepository::find_by_id_in(&tx, plan_id)?.is_none() {
            return Err(RepositoryError::not_found("MaintenancePlan", plan_id).into());
        }
        ensure_devices_exist(&tx, device_ids)?;
        PlanRepository::replace_bindings_in(&tx, plan_id, device_ids)?;

        let detail = plan_detail_in(&tx, plan_id)?;
        tx.commit()?;

        info!(plan_id, devices = detail.devices.len(), "设备绑定已替换");
        Ok(detail)
    }

    /// 解除单个设备绑定，返回是否存在该绑定
    pub fn unbind_device(&self, plan_id: i64, device_id: i64) -> EngineResult<bool> {
        let conn = self.get_conn()?;
        let removed = PlanRepository::unbind_in(&conn, plan_id, device_id)? > 0;
        info!(plan_id, device_id, removed, "解除设备绑定");
        Ok(removed)
    }

    /// 删除计划（内容项与绑定级联删除，已生成的任务保留）
    #[instrument(skip(self))]
    pub fn delete_plan(&self, plan_id: i64) -> EngineResult<()> {
        let conn = self.get_conn()?;
        if PlanRepository::delete_plan_in(&conn, plan_id)? == 0 {
            return Err(RepositoryError::not_found("MaintenancePlan", plan_id).into());
        }
        info!(plan_id, "保养计划已删除");
        Ok(())
    }

    /// 校验内容项并补齐缺省值
    fn normalize_items(&self, items: &[ChecklistItemInput]) -> EngineResult<Vec<ChecklistItemInput>> {
        let max = self.settings.max_checklist_items;
        if items.is_empty() || items.len() > max {
            return Err(EngineError::Validation(format!(
                "保养内容项数量必须在 1 到 {} 之间，当前为 {}",
                max,
                items.len()
            )));
        }

        items
            .iter()
            .map(|item| {
                let mut item = item.clone();
                item.name = item.name.trim().to_string();
                if item.name.is_empty() {
                    return Err(EngineError::Validation("保养内容项名称不能为空".to_string()));
                }
                match item.item_type {
                    ChecklistItemType::Qualitative => {
                        item.quantitative_settings = None;
                        if item.qualitative_options.is_none() {
                            item.qualitative_options = Some(QualitativeOptions::default());
                        }
                    }
                    ChecklistItemType::Quantitative => {
                        item.qualitative_options = None;
                        let settings = item.quantitative_settings.as_ref().ok_or_else(|| {
                            EngineError::Validation(format!("定量内容项「{}」缺少单位与上下限设置", item.name))
                        })?;
                        if let (Some(min), Some(max)) = (settings.min_value, settings.max_value) {
                            if min > max {
                                return Err(EngineError::Validation(format!(
                                    "定量内容项「{}」的下限 {} 大于上限 {}",
                                    item.name, min, max
                                )));
                            }
                        }
                    }
                }
                Ok(item)
            })
            .collect()
    }
}

fn validate_title(title: &str) -> EngineResult<()> {
    if title.trim().is_empty() {
        return Err(EngineError::Validation("保养计划标题不能为空".to_string()));
    }
    Ok(())
}

fn validate_frequency_value(value: u32) -> EngineResult<()> {
    if value == 0 {
        return Err(EngineError::Validation("频率倍数必须为正整数".to_string()));
    }
    Ok(())
}

fn ensure_devices_exist(conn: &Connection, device_ids: &[i64]) -> EngineResult<()> {
    let missing = DeviceRepository::missing_ids_in(conn, device_ids)?;
    if !missing.is_empty() {
        let ids: Vec<String> = missing.iter().map(i64::to_string).collect();
        return Err(RepositoryError::not_found("Device", ids.join(",")).into());
    }
    Ok(())
}
