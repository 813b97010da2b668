// ==========================================
// 设备维保系统 - 保养任务生成引擎
// ==========================================
// 职责: 按计划为绑定设备生成待执行任务
// 模式: Strict（手动，任一冲突整体拒绝） / NonStrict（定时，静默跳过）
// 唯一性: (plan_id, device_id, scheduled_at)
// ==========================================
// 两种模式共用同一条路径，只在遇到“无事可做/重复”时分叉
// ==========================================

use chrono::NaiveDateTime;
use rusqlite::{Connection, TransactionBehavior};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, instrument, warn};

use crate::config::MaintenanceSettings;
use crate::domain::asset::Device;
use crate::domain::plan::MaintenancePlan;
use crate::domain::task::{NewTask, TaskDetail};
use crate::engine::detail::task_detail_in;
use crate::engine::due_date::next_due;
use crate::engine::error::{EngineError, EngineResult};
use crate::repository::device_repo::DeviceRepository;
use crate::repository::error::RepositoryError;
use crate::repository::plan_repo::PlanRepository;
use crate::repository::task_repo::TaskRepository;

/// 生成模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMode {
    /// 手动生成: 前置条件不满足或存在重复任务时拒绝，且不创建任何任务
    Strict,
    /// 定时生成: 前置条件不满足返回空结果，重复设备跳过
    NonStrict,
}

/// 生成结果
#[derive(Debug, Clone, Default, Serialize)]
pub struct GenerationOutcome {
    pub created: Vec<TaskDetail>,
    /// 因已存在任务而跳过的设备（仅 NonStrict）
    pub skipped: Vec<Device>,
    /// 实际使用的计划时间；前置条件不满足时为 None
    pub scheduled_at: Option<NaiveDateTime>,
}

// ==========================================
// TaskGenerator - 任务生成引擎
// ==========================================
pub struct TaskGenerator {
    conn: Arc<Mutex<Connection>>,
    settings: MaintenanceSettings,
}

impl TaskGenerator {
    pub fn new(conn: Arc<Mutex<Connection>>, settings: MaintenanceSettings) -> Self {
        Self { conn, settings }
    }

    /// 为计划生成任务
    ///
    /// # 参数
    /// - device_ids: 指定设备子集（必须均已绑定到计划）；None 或空表示全部绑定设备
    /// - scheduled_at: 指定计划时间；缺省依次取计划的 next_due_at、按频率从 now 推算
    /// - now: 本次操作的当前时间
    #[instrument(skip(self, device_ids))]
    pub fn generate(
        &self,
        plan_id: i64,
        device_ids: Option<&[i64]>,
        scheduled_at: Option<NaiveDateTime>,
        mode: GenerationMode,
        now: NaiveDateTime,
    ) -> EngineResult<GenerationOutcome> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let outcome = self.generate_in(&tx, plan_id, device_ids, scheduled_at, mode, now)?;

        tx.commit()?;

        if !outcome.skipped.is_empty() {
            // 定时模式下的部分生成可能意味着设备绑定配置有误，需要留痕
            let skipped: Vec<String> = outcome.skipped.iter().map(Device::label).collect();
            warn!(
                plan_id,
                skipped = %skipped.join("、"),
                "部分设备已存在同一时间的任务，已跳过"
            );
        }
        info!(
            plan_id,
            created = outcome.created.len(),
            skipped = outcome.skipped.len(),
            scheduled_at = ?outcome.scheduled_at,
            "保养任务生成完成"
        );
        Ok(outcome)
    }

    fn generate_in(
        &self,
        conn: &Connection,
        plan_id: i64,
        device_ids: Option<&[i64]>,
        scheduled_at: Option<NaiveDateTime>,
        mode: GenerationMode,
        now: NaiveDateTime,
    ) -> EngineResult<GenerationOutcome> {
        let strict = mode == GenerationMode::Strict;
        let plan = PlanRepository::find_by_id_in(conn, plan_id)?
            .ok_or_else(|| RepositoryError::not_found("MaintenancePlan", plan_id))?;

        // ===== 前置条件 =====
        if !plan.active {
            return nothing_to_do(strict, || {
                EngineError::InvalidState(format!("保养计划「{}」未启用，无法生成任务", plan.title))
            });
        }

        let items = PlanRepository::find_items_in(conn, plan_id)?;
        if items.is_empty() {
            return nothing_to_do(strict, || {
                EngineError::Validation(format!("保养计划「{}」没有保养内容项，无法生成任务", plan.title))
            });
        }

        let targets = match device_ids.filter(|ids| !ids.is_empty()) {
            Some(ids) => resolve_subset(conn, &plan, ids)?,
            None => {
                let bound = DeviceRepository::devices_bound_to_plan_in(conn, plan_id)?;
                if bound.is_empty() {
                    return nothing_to_do(strict, || {
                        EngineError::Validation(format!("保养计划「{}」未绑定设备，无法生成任务", plan.title))
                    });
                }
                bound
            }
        };

        // ===== 计划时间 =====
        let effective_at = match scheduled_at.or(plan.next_due_at) {
            Some(at) => at,
            None => self.due_from(&plan, now)?,
        };

        // ===== 重复检查 =====
        let mut fresh = Vec::with_capacity(targets.len());
        let mut skipped = Vec::new();
        for device in targets {
            if TaskRepository::find_existing_in(conn, plan_id, device.device_id, effective_at)?.is_some() {
                skipped.push(device);
            } else {
                fresh.push(device);
            }
        }

        if strict && !skipped.is_empty() {
            return Err(EngineError::DuplicateTask {
                devices: skipped.iter().map(Device::label).collect(),
            });
        }
        if fresh.is_empty() {
            debug!(plan_id, "所有设备均已存在同一时间的任务");
            return Ok(GenerationOutcome {
                created: Vec::new(),
                skipped,
                scheduled_at: Some(effective_at),
            });
        }

        // ===== 写入 =====
        let mut task_ids = Vec::with_capacity(fresh.len());
        for device in fresh {
            let new_task = NewTask {
                plan_id,
                device_id: device.device_id,
                scheduled_at: effective_at,
                assigned_to: plan.assigned_to,
            };
            match TaskRepository::insert_in(conn, &new_task, now) {
                Ok(task_id) => task_ids.push(task_id),
                Err(RepositoryError::UniqueConstraintViolation(_)) => {
                    // 唯一索引兜底：预检查之后被并发写入抢先
                    if strict {
                        return Err(EngineError::DuplicateTask {
                            devices: vec![device.label()],
                        });
                    }
                    skipped.push(device);
                }
                Err(e) => return Err(e.into()),
            }
        }

        if plan.next_due_at.is_none() || scheduled_at.is_some() {
            let next = self.due_after(&plan, effective_at)?;
            PlanRepository::update_next_due_at_in(conn, plan_id, next, now)?;
            debug!(plan_id, next_due_at = %next, "计划下次到期时间已更新");
        }

        let created = task_ids
            .into_iter()
            .map(|task_id| task_detail_in(conn, task_id))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(GenerationOutcome {
            created,
            skipped,
            scheduled_at: Some(effective_at),
        })
    }

    /// 从当前时间推算到期时刻（定时触发使用）
    pub fn due_from(&self, plan: &MaintenancePlan, now: NaiveDateTime) -> EngineResult<NaiveDateTime> {
        self.due_after(plan, now)
    }

    fn due_after(&self, plan: &MaintenancePlan, anchor: NaiveDateTime) -> EngineResult<NaiveDateTime> {
        next_due(plan.frequency_type, plan.frequency_value, anchor, &self.settings).ok_or_else(|| {
            EngineError::Validation(format!(
                "保养计划「{}」的频率倍数 {} 超出可计算范围",
                plan.title, plan.frequency_value
            ))
        })
    }
}

/// 前置条件不满足: Strict 返回错误，NonStrict 返回空结果
fn nothing_to_do(
    strict: bool,
    error: impl FnOnce() -> EngineError,
) -> EngineResult<GenerationOutcome> {
    if strict {
        Err(error())
    } else {
        Ok(GenerationOutcome::default())
    }
}

/// 校验指定设备子集：设备必须存在且已绑定到计划（两种模式都拒绝）
fn resolve_subset(conn: &Connection, plan: &MaintenancePlan, ids: &[i64]) -> EngineResult<Vec<Device>> {
    let mut devices: Vec<Device> = Vec::with_capacity(ids.len());
    let mut unbound = Vec::new();
    for &device_id in ids {
        if devices.iter().any(|d| d.device_id == device_id) {
            continue;
        }
        let device = DeviceRepository::find_by_id_in(conn, device_id)?
            .ok_or_else(|| RepositoryError::not_found("Device", device_id))?;
        if PlanRepository::is_device_bound_in(conn, plan.plan_id, device_id)? {
            devices.push(device);
        } else {
            unbound.push(device.label());
        }
    }
    if !unbound.is_empty() {
        return Err(EngineError::Validation(format!(
            "以下设备未绑定到保养计划「{}」: {}",
            plan.title,
            unbound.join("、")
        )));
    }
    Ok(devices)
}
