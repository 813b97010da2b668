// ==========================================
// 设备维保系统 - 工单状态机
// ==========================================
// 职责: 工单状态流转表 + 流转副作用（时间戳、响应/维修时长）
// 红线: 纯函数，“当前时间”由调用方传入；不访问数据库
// ==========================================
// 流转表:
//   created            → assigned | in_progress
//   assigned           → accepted | in_progress
//   accepted           → in_progress
//   in_progress        → pending_acceptance（需故障原因 + 解决方案）
//   pending_acceptance → completed | closed | in_progress（退回）
//   completed          → closed
// 不在表内的目标状态被忽略（状态不变），不视为错误
// ==========================================

use chrono::NaiveDateTime;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::types::{WorkOrderPriority, WorkOrderStatus};
use crate::domain::work_order::{CreateWorkOrderInput, WorkOrder, WorkOrderUpdate};
use crate::engine::error::{EngineError, EngineResult};

/// 源状态允许流转到的目标状态
pub fn allowed_targets(from: WorkOrderStatus) -> &'static [WorkOrderStatus] {
    use WorkOrderStatus::*;
    match from {
        Created => &[Assigned, InProgress],
        Assigned => &[Accepted, InProgress],
        Accepted => &[InProgress],
        InProgress => &[PendingAcceptance],
        PendingAcceptance => &[Completed, Closed, InProgress],
        Completed => &[Closed],
        Closed => &[],
    }
}

pub fn can_transition(from: WorkOrderStatus, to: WorkOrderStatus) -> bool {
    allowed_targets(from).contains(&to)
}

// ==========================================
// 流转副作用
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum TransitionEffect {
    /// 首次进入执行中
    Started { response_time: Option<i64> },
    /// 从待报修直接开始执行时采纳负责人
    AssigneeAdopted { user_id: i64 },
    /// 首次接受
    Accepted,
    /// 首次记录完工时间
    Finished { repair_time: Option<i64> },
    /// 验收退回，清空故障原因与解决方案
    FaultInfoCleared,
}

/// 一次更新的结果
#[derive(Debug, Clone, Serialize)]
pub struct TransitionOutcome {
    pub order: WorkOrder,
    pub from: WorkOrderStatus,
    /// 是否发生了状态流转（被忽略的目标为 false）
    pub applied: bool,
    pub effects: Vec<TransitionEffect>,
}

/// 两个时刻之间的分钟数（四舍五入）
pub fn minutes_between(start: NaiveDateTime, end: NaiveDateTime) -> i64 {
    let millis = (end - start).num_milliseconds();
    (millis as f64 / 60_000.0 + 0.5).floor() as i64
}

/// 合并可编辑字段，并按需执行一次状态流转
///
/// # 错误
/// - `EngineError::TransitionGuard`: in_progress → pending_acceptance 时故障原因或解决方案为空
pub fn apply_update(
    order: &WorkOrder,
    update: &WorkOrderUpdate,
    now: NaiveDateTime,
) -> EngineResult<TransitionOutcome> {
    let from = order.status;
    let mut next = order.clone();
    merge_fields(&mut next, update);
    next.updated_at = now;

    let mut effects = Vec::new();
    let target = match update.status {
        Some(target) if can_transition(from, target) => target,
        _ => {
            return Ok(TransitionOutcome {
                order: next,
                from,
                applied: false,
                effects,
            })
        }
    };

    match target {
        WorkOrderStatus::InProgress => {
            if from == WorkOrderStatus::PendingAcceptance {
                // 退回后必须重新填写，即使本次更新同时提交了新值
                next.fault_cause = None;
                next.solution = None;
                effects.push(TransitionEffect::FaultInfoCleared);
            }
            if next.started_at.is_none() {
                next.started_at = Some(now);
                next.response_time = next.reported_at.map(|reported| minutes_between(reported, now));
                effects.push(TransitionEffect::Started {
                    response_time: next.response_time,
                });
            }
            if from == WorkOrderStatus::Created && next.assigned_to.is_none() {
                if let Some(user_id) = update.assigned_to {
                    next.assigned_to = Some(user_id);
                    effects.push(TransitionEffect::AssigneeAdopted { user_id });
                }
            }
        }
        WorkOrderStatus::PendingAcceptance => {
            let mut missing = Vec::new();
            if is_blank(&next.fault_cause) {
                missing.push("故障原因");
            }
            if is_blank(&next.solution) {
                missing.push("解决方案");
            }
            if !missing.is_empty() {
                return Err(EngineError::TransitionGuard {
                    from,
                    to: target,
                    reason: format!("{}不能为空", missing.join("、")),
                });
            }
            if next.finished_at.is_none() {
                next.finished_at = Some(now);
                next.repair_time = next.started_at.map(|started| minutes_between(started, now));
                effects.push(TransitionEffect::Finished {
                    repair_time: next.repair_time,
                });
            }
        }
        WorkOrderStatus::Completed => {
            if next.finished_at.is_none() {
                next.finished_at = Some(now);
                if next.repair_time.is_none() {
                    next.repair_time = next.started_at.map(|started| minutes_between(started, now));
                }
                effects.push(TransitionEffect::Finished {
                    repair_time: next.repair_time,
                });
            }
        }
        WorkOrderStatus::Accepted => {
            if next.accepted_at.is_none() {
                next.accepted_at = Some(now);
                effects.push(TransitionEffect::Accepted);
            }
        }
        WorkOrderStatus::Created | WorkOrderStatus::Assigned | WorkOrderStatus::Closed => {}
    }

    next.status = target;
    Ok(TransitionOutcome {
        order: next,
        from,
        applied: true,
        effects,
    })
}

/// 指派：不经过流转表，总是设置负责人并置为 assigned
pub fn assign(order: &WorkOrder, user_id: i64, now: NaiveDateTime) -> WorkOrder {
    let mut next = order.clone();
    next.assigned_to = Some(user_id);
    next.status = WorkOrderStatus::Assigned;
    next.updated_at = now;
    next
}

/// 构造新工单（order_id 由数据库分配）
pub fn build_new_order(
    input: &CreateWorkOrderInput,
    reporter_id: Option<i64>,
    order_no: String,
    now: NaiveDateTime,
) -> WorkOrder {
    WorkOrder {
        order_id: 0,
        order_no,
        reporter_id,
        device_id: input.device_id,
        title: input.title.trim().to_string(),
        description: input.description.clone(),
        priority: input.priority.unwrap_or(WorkOrderPriority::Normal),
        status: WorkOrderStatus::Created,
        assigned_to: None,
        contact: input.contact.clone(),
        started_at: None,
        finished_at: None,
        accepted_at: None,
        reported_at: Some(now),
        response_time: None,
        repair_time: None,
        attachments: input.attachments.clone().unwrap_or_default(),
        fault_category: input.fault_category.clone(),
        fault_cause: None,
        solution: None,
        revision: 0,
        created_at: now,
        updated_at: now,
    }
}

/// 工单号: {前缀}-{yyyyMMddHHmmss}-{8位随机十六进制}
pub fn generate_order_no(prefix: &str, now: NaiveDateTime) -> String {
    let random = Uuid::new_v4().simple().to_string();
    format!("{}-{}-{}", prefix, now.format("%Y%m%d%H%M%S"), &random[..8])
}

fn merge_fields(order: &mut WorkOrder, update: &WorkOrderUpdate) {
    if let Some(title) = &update.title {
        order.title = title.clone();
    }
    if let Some(description) = &update.description {
        order.description = Some(description.clone());
    }
    if let Some(priority) = update.priority {
        order.priority = priority;
    }
    if let Some(contact) = &update.contact {
        order.contact = Some(contact.clone());
    }
    if let Some(category) = &update.fault_category {
        order.fault_category = Some(category.clone());
    }
    if let Some(cause) = &update.fault_cause {
        order.fault_cause = Some(cause.clone());
    }
    if let Some(solution) = &update.solution {
        order.solution = Some(solution.clone());
    }
    if let Some(attachments) = &update.attachments {
        order.attachments = attachments.clone();
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map(str::trim).map_or(true, str::is_empty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn t0() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 15)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
    }

    fn created_order() -> WorkOrder {
        let input = CreateWorkOrderInput {
            title: "冷却泵漏水".to_string(),
            ..Default::default()
        };
        build_new_order(&input, Some(1), "WO-TEST".to_string(), t0())
    }

    fn step(order: &WorkOrder, target: WorkOrderStatus, minutes: i64) -> TransitionOutcome {
        apply_update(order, &WorkOrderUpdate::status(target), t0() + Duration::minutes(minutes)).unwrap()
    }

    #[test]
    fn test_transition_table() {
        use WorkOrderStatus::*;
        assert!(can_transition(Created, InProgress));
        assert!(can_transition(PendingAcceptance, InProgress));
        assert!(!can_transition(Created, Completed));
        assert!(!can_transition(Completed, InProgress));
        assert!(allowed_targets(Closed).is_empty());
    }

    #[test]
    fn test_disallowed_target_is_ignored() {
        let order = created_order();
        let outcome = step(&order, WorkOrderStatus::Completed, 5);
        assert!(!outcome.applied);
        assert_eq!(outcome.order.status, WorkOrderStatus::Created);
        assert!(outcome.order.finished_at.is_none());
    }

    #[test]
    fn test_start_sets_response_time_once() {
        let order = created_order();
        let started = step(&order, WorkOrderStatus::InProgress, 30);
        assert!(started.applied);
        assert_eq!(started.order.started_at, Some(t0() + Duration::minutes(30)));
        assert_eq!(started.order.response_time, Some(30));
        assert_eq!(
            started.effects,
            vec![TransitionEffect::Started { response_time: Some(30) }]
        );
    }

    #[test]
    fn test_response_time_rounds_half_up() {
        assert_eq!(minutes_between(t0(), t0() + Duration::seconds(89)), 1);
        assert_eq!(minutes_between(t0(), t0() + Duration::seconds(90)), 2);
        assert_eq!(minutes_between(t0(), t0()), 0);
    }

    #[test]
    fn test_pending_acceptance_guard() {
        let order = step(&created_order(), WorkOrderStatus::InProgress, 10).order;

        let update = WorkOrderUpdate {
            status: Some(WorkOrderStatus::PendingAcceptance),
            fault_cause: Some("   ".to_string()),
            solution: Some("更换密封圈".to_string()),
            ..Default::default()
        };
        let err = apply_update(&order, &update, t0() + Duration::minutes(60)).unwrap_err();
        match err {
            EngineError::TransitionGuard { from, to, reason } => {
                assert_eq!(from, WorkOrderStatus::InProgress);
                assert_eq!(to, WorkOrderStatus::PendingAcceptance);
                assert!(reason.contains("故障原因"));
                assert!(!reason.contains("解决方案"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_repair_time_computed_once_across_bounce_back() {
        let order = step(&created_order(), WorkOrderStatus::InProgress, 10).order;

        let finish = WorkOrderUpdate {
            status: Some(WorkOrderStatus::PendingAcceptance),
            fault_cause: Some("密封圈老化".to_string()),
            solution: Some("更换密封圈".to_string()),
            ..Default::default()
        };
        let pending = apply_update(&order, &finish, t0() + Duration::minutes(100)).unwrap().order;
        assert_eq!(pending.repair_time, Some(90));
        let first_finish = pending.finished_at;

        // 验收退回
        let bounced = step(&pending, WorkOrderStatus::InProgress, 120);
        assert_eq!(bounced.effects, vec![TransitionEffect::FaultInfoCleared]);
        assert!(bounced.order.fault_cause.is_none());
        assert!(bounced.order.solution.is_none());
        assert_eq!(bounced.order.finished_at, first_finish);
        assert_eq!(bounced.order.started_at, order.started_at);

        // 再次提交验收不改变完工时间和维修时长
        let again = apply_update(&bounced.order, &finish, t0() + Duration::minutes(200)).unwrap();
        assert!(again.applied);
        assert!(again.effects.is_empty());
        assert_eq!(again.order.finished_at, first_finish);
        assert_eq!(again.order.repair_time, Some(90));
    }

    #[test]
    fn test_bounce_back_clears_values_supplied_in_same_update() {
        let mut order = created_order();
        order.status = WorkOrderStatus::PendingAcceptance;
        order.started_at = Some(t0());
        let update = WorkOrderUpdate {
            status: Some(WorkOrderStatus::InProgress),
            fault_cause: Some("新原因".to_string()),
            ..Default::default()
        };
        let outcome = apply_update(&order, &update, t0()).unwrap();
        assert!(outcome.order.fault_cause.is_none());
    }

    #[test]
    fn test_assignee_adopted_only_from_created() {
        let update = WorkOrderUpdate {
            status: Some(WorkOrderStatus::InProgress),
            assigned_to: Some(42),
            ..Default::default()
        };
        let outcome = apply_update(&created_order(), &update, t0()).unwrap();
        assert_eq!(outcome.order.assigned_to, Some(42));

        let mut accepted = created_order();
        accepted.status = WorkOrderStatus::Accepted;
        let outcome = apply_update(&accepted, &update, t0()).unwrap();
        assert_eq!(outcome.order.assigned_to, None);
    }

    #[test]
    fn test_accept_and_complete_stamp_times() {
        let assigned = assign(&created_order(), 7, t0());
        assert_eq!(assigned.status, WorkOrderStatus::Assigned);
        assert_eq!(assigned.assigned_to, Some(7));

        let accepted = step(&assigned, WorkOrderStatus::Accepted, 3).order;
        assert_eq!(accepted.accepted_at, Some(t0() + Duration::minutes(3)));

        let mut pending = accepted.clone();
        pending.status = WorkOrderStatus::PendingAcceptance;
        pending.started_at = Some(t0() + Duration::minutes(5));
        let completed = step(&pending, WorkOrderStatus::Completed, 65).order;
        assert_eq!(completed.finished_at, Some(t0() + Duration::minutes(65)));
        assert_eq!(completed.repair_time, Some(60));
    }

    #[test]
    fn test_order_no_format() {
        let no = generate_order_no("WO", t0());
        assert!(no.starts_with("WO-20240615080000-"));
        assert_eq!(no.len(), "WO-20240615080000-".len() + 8);
    }
}
