// ==========================================
// 设备维保系统 - 保养任务提交引擎
// ==========================================
// 职责: 校验执行结果、判定异常、完成任务、异常时自动生成工单
// 事务: 校验 + 任务回写 + 工单创建 在同一事务内，任一失败全部回滚
// ==========================================

use chrono::NaiveDateTime;
use rusqlite::{Connection, TransactionBehavior};
use serde::Serialize;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tracing::{info, instrument};

use crate::config::MaintenanceSettings;
use crate::domain::plan::ChecklistItem;
use crate::domain::task::{ItemResult, SubmitTaskInput, TaskDetail, TaskResults};
use crate::domain::types::{ChecklistItemType, ResultStatus, TaskStatus, WorkOrderPriority};
use crate::domain::work_order::CreateWorkOrderInput;
use crate::engine::detail::task_detail_in;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::work_order_engine::WorkOrderEngine;
use crate::repository::error::RepositoryError;
use crate::repository::plan_repo::PlanRepository;
use crate::repository::task_repo::TaskRepository;

/// 异常项（内容项名称 + 原因）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AbnormalItem {
    pub item_id: i64,
    pub item_name: String,
    pub reason: String,
}

/// 结果判定输出
#[derive(Debug, Clone)]
pub struct Evaluation {
    /// 规范化后的结果（仅包含计划内容项，定量值统一为数字）
    pub results: TaskResults,
    /// 按内容项顺序排列，每项至多一条
    pub abnormal: Vec<AbnormalItem>,
}

/// 按内容项逐项判定提交结果
///
/// # 错误
/// - 缺少任一内容项的结果
/// - 定量项数值无法解析
pub fn evaluate(items: &[ChecklistItem], submitted: &TaskResults) -> EngineResult<Evaluation> {
    let mut results = TaskResults::new();
    let mut abnormal = Vec::new();

    for item in items {
        let key = item.result_key();
        let result = submitted
            .get(&key)
            .ok_or_else(|| EngineError::Validation(format!("保养内容项「{}」未填写结果", item.name)))?;

        let (final_result, reason) = match item.item_type {
            ChecklistItemType::Qualitative => {
                // 定性项信任提交方的判定
                let reason = result.status.is_abnormal().then(|| "选择异常".to_string());
                (
                    ItemResult {
                        item_type: ChecklistItemType::Qualitative,
                        value: result.value.clone(),
                        status: result.status,
                    },
                    reason,
                )
            }
            ChecklistItemType::Quantitative => {
                let value = parse_number(&result.value).ok_or_else(|| {
                    EngineError::Validation(format!("保养内容项「{}」的数值格式不正确", item.name))
                })?;
                let bound_violation = item
                    .quantitative_settings
                    .as_ref()
                    .and_then(|settings| check_bounds(value, settings));
                let status = if bound_violation.is_some() {
                    ResultStatus::Abnormal
                } else {
                    result.status
                };
                let reason = match (bound_violation, status) {
                    (Some(reason), _) => Some(reason),
                    (None, ResultStatus::Abnormal) => Some("数值异常".to_string()),
                    (None, ResultStatus::Normal) => None,
                };
                (
                    ItemResult {
                        item_type: ChecklistItemType::Quantitative,
                        value: number_value(value),
                        status,
                    },
                    reason,
                )
            }
        };

        if let Some(reason) = reason {
            abnormal.push(AbnormalItem {
                item_id: item.item_id,
                item_name: item.name.clone(),
                reason,
            });
        }
        results.insert(key, final_result);
    }

    Ok(Evaluation { results, abnormal })
}

/// 数值解析: JSON 数字，或去除首尾空白后可完整解析的数字字符串
fn parse_number(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    parsed.is_finite().then_some(parsed)
}

fn number_value(value: f64) -> Value {
    serde_json::Number::from_f64(value).map_or(Value::Null, Value::Number)
}

fn check_bounds(value: f64, settings: &crate::domain::plan::QuantitativeSettings) -> Option<String> {
    let unit = &settings.unit;
    if let Some(min) = settings.min_value {
        if value < min {
            return Some(format!("数值 {}{} 低于下限 {}{}", value, unit, min, unit));
        }
    }
    if let Some(max) = settings.max_value {
        if value > max {
            return Some(format!("数值 {}{} 高于上限 {}{}", value, unit, max, unit));
        }
    }
    None
}

// ==========================================
// TaskExecutor - 任务提交
// ==========================================
pub struct TaskExecutor {
    conn: Arc<Mutex<Connection>>,
    settings: MaintenanceSettings,
}

impl TaskExecutor {
    pub fn new(conn: Arc<Mutex<Connection>>, settings: MaintenanceSettings) -> Self {
        Self { conn, settings }
    }

    /// 提交任务执行结果
    ///
    /// 返回回写后的任务详情；存在异常项时 `abnormal_work_order_id` 指向新工单
    #[instrument(skip(self, input))]
    pub fn submit(
        &self,
        task_id: i64,
        input: &SubmitTaskInput,
        user_id: Option<i64>,
        now: NaiveDateTime,
    ) -> EngineResult<TaskDetail> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let mut task = TaskRepository::find_by_id_in(&tx, task_id)?
            .ok_or_else(|| RepositoryError::not_found("MaintenanceTask", task_id))?;
        if task.status == TaskStatus::Completed {
            return Err(EngineError::InvalidState(format!(
                "保养任务 {} 已完成，无法再次提交",
                task_id
            )));
        }

        let plan = match task.plan_id {
            Some(plan_id) => PlanRepository::find_by_id_in(&tx, plan_id)?,
            None => None,
        }
        .ok_or_else(|| EngineError::Validation(format!("保养任务 {} 所属计划已删除", task_id)))?;
        let items = PlanRepository::find_items_in(&tx, plan.plan_id)?;
        if items.is_empty() {
            return Err(EngineError::Validation(format!(
                "保养计划「{}」没有保养内容项",
                plan.title
            )));
        }

        let evaluation = evaluate(&items, &input.results)?;

        task.result = evaluation.results;
        task.has_abnormal = !evaluation.abnormal.is_empty();
        task.status = TaskStatus::Completed;
        task.finished_at = Some(now);
        task.notes = input.notes.clone();
        if let Some(attachments) = &input.attachments {
            task.attachments = attachments.clone();
        }

        if task.has_abnormal {
            let summary: Vec<String> = evaluation
                .abnormal
                .iter()
                .map(|a| format!("- {}: {}", a.item_name, a.reason))
                .collect();
            let order_input = CreateWorkOrderInput {
                device_id: Some(task.device_id),
                title: format!("保养异常：{}", plan.title),
                description: Some(format!(
                    "保养任务执行发现异常项：\n{}\n\n保养任务ID: {}",
                    summary.join("\n"),
                    task_id
                )),
                priority: Some(WorkOrderPriority::High),
                ..Default::default()
            };
            let order = WorkOrderEngine::create_in(&tx, &order_input, user_id, &self.settings, now)?;
            task.abnormal_work_order_id = Some(order.order_id);
        }

        TaskRepository::save_submission_in(&tx, &task)?;
        let detail = task_detail_in(&tx, task_id)?;
        tx.commit()?;

        info!(
            task_id,
            abnormal = evaluation.abnormal.len(),
            work_order_id = ?task.abnormal_work_order_id,
            "保养任务已提交"
        );
        Ok(detail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::plan::{QualitativeOptions, QuantitativeSettings};
    use serde_json::json;

    fn quantitative(item_id: i64, min: Option<f64>, max: Option<f64>) -> ChecklistItem {
        ChecklistItem {
            item_id,
            plan_id: 1,
            name: "排气温度".to_string(),
            item_type: ChecklistItemType::Quantitative,
            qualitative_options: None,
            quantitative_settings: Some(QuantitativeSettings {
                unit: "℃".to_string(),
                min_value: min,
                max_value: max,
            }),
            sort_order: 0,
            description: None,
        }
    }

    fn qualitative(item_id: i64) -> ChecklistItem {
        ChecklistItem {
            item_id,
            plan_id: 1,
            name: "皮带张紧".to_string(),
            item_type: ChecklistItemType::Qualitative,
            qualitative_options: Some(QualitativeOptions::default()),
            quantitative_settings: None,
            sort_order: 1,
            description: None,
        }
    }

    fn result(item_type: ChecklistItemType, value: Value, status: ResultStatus) -> ItemResult {
        ItemResult {
            item_type,
            value,
            status,
        }
    }

    #[test]
    fn test_out_of_range_forces_abnormal() {
        let items = vec![quantitative(1, Some(10.0), Some(80.0))];
        let mut submitted = TaskResults::new();
        submitted.insert(
            "1".to_string(),
            result(ChecklistItemType::Quantitative, json!(95), ResultStatus::Normal),
        );

        let evaluation = evaluate(&items, &submitted).unwrap();
        assert_eq!(evaluation.results["1"].status, ResultStatus::Abnormal);
        assert_eq!(evaluation.abnormal.len(), 1);
        assert_eq!(evaluation.abnormal[0].reason, "数值 95℃ 高于上限 80℃");
    }

    #[test]
    fn test_numeric_string_is_accepted_and_normalised() {
        let items = vec![quantitative(1, Some(10.0), None)];
        let mut submitted = TaskResults::new();
        submitted.insert(
            "1".to_string(),
            result(ChecklistItemType::Quantitative, json!(" 9.5 "), ResultStatus::Normal),
        );

        let evaluation = evaluate(&items, &submitted).unwrap();
        assert_eq!(evaluation.results["1"].value, json!(9.5));
        assert_eq!(evaluation.abnormal[0].reason, "数值 9.5℃ 低于下限 10℃");
    }

    #[test]
    fn test_non_numeric_value_is_rejected() {
        let items = vec![quantitative(1, None, None)];
        let mut submitted = TaskResults::new();
        submitted.insert(
            "1".to_string(),
            result(ChecklistItemType::Quantitative, json!("12abc"), ResultStatus::Normal),
        );

        let err = evaluate(&items, &submitted).unwrap_err();
        assert!(matches!(err, EngineError::Validation(msg) if msg.contains("排气温度")));
    }

    #[test]
    fn test_missing_result_names_the_item() {
        let items = vec![quantitative(1, None, None), qualitative(2)];
        let mut submitted = TaskResults::new();
        submitted.insert(
            "1".to_string(),
            result(ChecklistItemType::Quantitative, json!(20), ResultStatus::Normal),
        );

        let err = evaluate(&items, &submitted).unwrap_err();
        assert!(matches!(err, EngineError::Validation(msg) if msg.contains("皮带张紧")));
    }

    #[test]
    fn test_abnormal_items_are_listed_once_in_item_order() {
        let items = vec![quantitative(1, Some(10.0), Some(80.0)), qualitative(2)];
        let mut submitted = TaskResults::new();
        submitted.insert(
            "2".to_string(),
            result(ChecklistItemType::Qualitative, json!("异常"), ResultStatus::Abnormal),
        );
        submitted.insert(
            "1".to_string(),
            result(ChecklistItemType::Quantitative, json!(5), ResultStatus::Abnormal),
        );

        let evaluation = evaluate(&items, &submitted).unwrap();
        let names: Vec<&str> = evaluation.abnormal.iter().map(|a| a.item_name.as_str()).collect();
        assert_eq!(names, vec!["排气温度", "皮带张紧"]);
        assert_eq!(evaluation.abnormal[1].reason, "选择异常");
    }

    #[test]
    fn test_marked_abnormal_within_bounds() {
        let items = vec![quantitative(1, Some(10.0), Some(80.0))];
        let mut submitted = TaskResults::new();
        submitted.insert(
            "1".to_string(),
            result(ChecklistItemType::Quantitative, json!(50), ResultStatus::Abnormal),
        );

        let evaluation = evaluate(&items, &submitted).unwrap();
        assert_eq!(evaluation.abnormal[0].reason, "数值异常");
    }

    #[test]
    fn test_extra_keys_are_dropped() {
        let items = vec![qualitative(2)];
        let mut submitted = TaskResults::new();
        submitted.insert(
            "2".to_string(),
            result(ChecklistItemType::Qualitative, json!("正常"), ResultStatus::Normal),
        );
        submitted.insert(
            "99".to_string(),
            result(ChecklistItemType::Qualitative, json!("正常"), ResultStatus::Normal),
        );

        let evaluation = evaluate(&items, &submitted).unwrap();
        assert_eq!(evaluation.results.len(), 1);
        assert!(evaluation.abnormal.is_empty());
    }
}
