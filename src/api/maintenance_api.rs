// ==========================================
// 设备维保系统 - 保养计划 / 任务 API
// ==========================================
// 职责: 计划管理、任务生成（手动 / 定时）、任务提交与查询
// 时间: 每个操作读取一次时钟，显式传入引擎
// ==========================================

use chrono::NaiveDateTime;
use std::sync::Arc;

use crate::api::error::{ApiError, ApiResult};
use crate::clock::Clock;
use crate::domain::asset::Device;
use crate::domain::plan::{CreatePlanInput, MaintenancePlan, PlanDetail, UpdatePlanInput};
use crate::domain::task::{MaintenanceTask, SubmitTaskInput, TaskDetail};
use crate::domain::types::FrequencyType;
use crate::engine::{
    GenerationMode, GenerationOutcome, MaintenanceRepositories, PlanService, TaskExecutor,
    TaskGenerator,
};

// ==========================================
// MaintenanceApi - 保养计划 / 任务 API
// ==========================================

/// 保养 API
///
/// 职责：
/// 1. 计划增删改查、设备绑定
/// 2. 手动生成任务（严格模式）与定时生成任务（非严格模式）
/// 3. 任务提交（异常时自动生成工单）
pub struct MaintenanceApi {
    plan_service: Arc<PlanService>,
    generator: Arc<TaskGenerator>,
    executor: Arc<TaskExecutor>,
    repos: MaintenanceRepositories,
    clock: Arc<dyn Clock>,
}

impl MaintenanceApi {
    pub fn new(
        plan_service: Arc<PlanService>,
        generator: Arc<TaskGenerator>,
        executor: Arc<TaskExecutor>,
        repos: MaintenanceRepositories,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            plan_service,
            generator,
            executor,
            repos,
            clock,
        }
    }

    // ==========================================
    // 计划管理
    // ==========================================

    /// 创建保养计划
    ///
    /// # 参数
    /// - input: 计划定义（内容项 1..=上限，设备必须存在）
    /// - user_id: 创建人
    pub fn create_plan(&self, input: &CreatePlanInput, user_id: Option<i64>) -> ApiResult<PlanDetail> {
        Ok(self.plan_service.create_plan(input, user_id, self.clock.now())?)
    }

    pub fn update_plan(&self, plan_id: i64, input: &UpdatePlanInput) -> ApiResult<PlanDetail> {
        Ok(self.plan_service.update_plan(plan_id, input, self.clock.now())?)
    }

    /// 整体替换计划的设备绑定
    pub fn bind_devices(&self, plan_id: i64, device_ids: &[i64]) -> ApiResult<PlanDetail> {
        Ok(self.plan_service.bind_devices(plan_id, device_ids)?)
    }

    /// 解除单个设备绑定
    ///
    /// # 返回
    /// - Ok(true): 已解除
    /// - Ok(false): 该设备原本未绑定
    pub fn unbind_device(&self, plan_id: i64, device_id: i64) -> ApiResult<bool> {
        Ok(self.plan_service.unbind_device(plan_id, device_id)?)
    }

    pub fn get_plan_devices(&self, plan_id: i64) -> ApiResult<Vec<Device>> {
        self.ensure_plan_exists(plan_id)?;
        Ok(self.repos.device_repo.devices_bound_to_plan(plan_id)?)
    }

    /// 查询计划详情（内容项按 sort_order 排序）
    pub fn find_plan(&self, plan_id: i64) -> ApiResult<PlanDetail> {
        Ok(self.repos.plan_detail(plan_id)?)
    }

    /// 查询某频率下所有激活计划
    pub fn list_plans_for_bucket(&self, frequency: FrequencyType) -> ApiResult<Vec<MaintenancePlan>> {
        Ok(self.repos.plan_repo.list_active_by_frequency(frequency)?)
    }

    /// 删除计划（已生成的任务保留，plan_id 置空）
    pub fn delete_plan(&self, plan_id: i64) -> ApiResult<()> {
        Ok(self.plan_service.delete_plan(plan_id)?)
    }

    // ==========================================
    // 任务生成
    // ==========================================

    /// 手动生成任务
    ///
    /// 任一设备在该时间已有任务时整体拒绝，错误信息列出全部冲突设备
    pub fn generate_tasks(
        &self,
        plan_id: i64,
        scheduled_at: Option<NaiveDateTime>,
        device_ids: Option<&[i64]>,
    ) -> ApiResult<Vec<TaskDetail>> {
        let outcome = self.generator.generate(
            plan_id,
            device_ids,
            scheduled_at,
            GenerationMode::Strict,
            self.clock.now(),
        )?;
        Ok(outcome.created)
    }

    /// 自动生成任务（定时入口）
    ///
    /// 计划未启用 / 无内容项 / 无绑定设备时返回空列表，重复设备静默跳过
    pub fn generate_tasks_auto(
        &self,
        plan_id: i64,
        scheduled_at: Option<NaiveDateTime>,
    ) -> ApiResult<Vec<TaskDetail>> {
        Ok(self.generate_tasks_auto_detailed(plan_id, scheduled_at)?.created)
    }

    /// 自动生成任务，同时返回被跳过的设备
    pub fn generate_tasks_auto_detailed(
        &self,
        plan_id: i64,
        scheduled_at: Option<NaiveDateTime>,
    ) -> ApiResult<GenerationOutcome> {
        Ok(self.generator.generate(
            plan_id,
            None,
            scheduled_at,
            GenerationMode::NonStrict,
            self.clock.now(),
        )?)
    }

    // ==========================================
    // 任务提交与查询
    // ==========================================

    /// 提交任务执行结果
    pub fn submit_task(
        &self,
        task_id: i64,
        input: &SubmitTaskInput,
        user_id: Option<i64>,
    ) -> ApiResult<TaskDetail> {
        Ok(self.executor.submit(task_id, input, user_id, self.clock.now())?)
    }

    pub fn find_task(&self, task_id: i64) -> ApiResult<TaskDetail> {
        Ok(self.repos.task_detail(task_id)?)
    }

    pub fn list_tasks_by_plan(&self, plan_id: i64) -> ApiResult<Vec<MaintenanceTask>> {
        Ok(self.repos.task_repo.list_by_plan(plan_id)?)
    }

    fn ensure_plan_exists(&self, plan_id: i64) -> ApiResult<()> {
        match self.repos.plan_repo.find_by_id(plan_id)? {
            Some(_) => Ok(()),
            None => Err(ApiError::NotFound(format!("MaintenancePlan(id={})不存在", plan_id))),
        }
    }
}
