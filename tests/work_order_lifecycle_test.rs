// ==========================================
// 工单生命周期集成测试
// ==========================================
// 测试范围:
// 1. 创建: 默认优先级、报修时间
// 2. 流转: 响应时间、完工守卫、维修时间只记录一次、验收退回
// 3. 非法目标: 状态不变，字段修改仍生效
// 4. 指派 / 接受 / 删除
// ==========================================


use chrono::Duration;

use equipment_maintenance::api::{ApiError, ErrorKind};
use equipment_maintenance::domain::types::{WorkOrderPriority, WorkOrderStatus};
use equipment_maintenance::domain::{CreateWorkOrderInput, WorkOrderUpdate};
use equipment_maintenance::engine::TransitionEffect;
use test_helpers::*;

fn report(env: &TestEnv) -> i64 {
    let device = env.add_device("BSJ-003", "包装机3号");
    let input = CreateWorkOrderInput {
        device_id: Some(device),
        title: "封口温度不稳定".to_string(),
        description: Some("夜班反馈封口不牢".to_string()),
        contact: Some("分机 8021".to_string()),
        ..Default::default()
    };
    env.state
        .work_order_api
        .create_work_order(&input, Some(3))
        .expect("创建工单失败")
        .order
        .order_id
}

fn fault_info() -> WorkOrderUpdate {
    WorkOrderUpdate {
        status: Some(WorkOrderStatus::PendingAcceptance),
        fault_cause: Some("加热管老化".to_string()),
        solution: Some("更换加热管".to_string()),
        ..Default::default()
    }
}

#[test]
fn test_create_work_order_默认值() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let order_id = report(&env);

    let detail = env
        .state
        .work_order_api
        .find_work_order(order_id)
        .expect("查询工单失败");
    assert_eq!(detail.order.status, WorkOrderStatus::Created);
    assert_eq!(detail.order.priority, WorkOrderPriority::Normal);
    assert_eq!(detail.order.reported_at, Some(base_time()));
    assert_eq!(detail.order.reporter_id, Some(3));
    assert_eq!(detail.device.map(|d| d.asset_no), Some("BSJ-003".to_string()));
    assert!(detail.used_parts.is_empty());
}

#[test]
fn test_create_work_order_标题不能为空() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let input = CreateWorkOrderInput {
        title: "   ".to_string(),
        ..Default::default()
    };
    let err = env
        .state
        .work_order_api
        .create_work_order(&input, None)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn test_work_order_完整流转() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let order_id = report(&env);
    let api = &env.state.work_order_api;

    // created → in_progress: 记录开始时间与响应时间，采纳负责人
    env.clock.advance_minutes(30);
    let change = api
        .update_work_order(
            order_id,
            &WorkOrderUpdate {
                status: Some(WorkOrderStatus::InProgress),
                assigned_to: Some(12),
                ..Default::default()
            },
        )
        .expect("开始维修失败");
    assert!(change.applied);
    let order = &change.detail.order;
    assert_eq!(order.status, WorkOrderStatus::InProgress);
    assert_eq!(order.started_at, Some(base_time() + Duration::minutes(30)));
    assert_eq!(order.response_time, Some(30));
    assert_eq!(order.assigned_to, Some(12));
    assert!(change
        .effects
        .contains(&TransitionEffect::AssigneeAdopted { user_id: 12 }));

    // in_progress → pending_acceptance: 记录完工时间与维修时间
    env.clock.advance_minutes(90);
    let change = api.update_work_order(order_id, &fault_info()).expect("提交验收失败");
    let order = &change.detail.order;
    assert_eq!(order.status, WorkOrderStatus::PendingAcceptance);
    assert_eq!(order.finished_at, Some(base_time() + Duration::minutes(120)));
    assert_eq!(order.repair_time, Some(90));

    // pending_acceptance → completed → closed
    let change = api
        .transition_work_order(order_id, WorkOrderStatus::Completed)
        .expect("验收失败");
    assert_eq!(change.detail.order.status, WorkOrderStatus::Completed);
    assert_eq!(change.detail.order.repair_time, Some(90));

    let change = api
        .transition_work_order(order_id, WorkOrderStatus::Closed)
        .expect("关闭失败");
    assert_eq!(change.detail.order.status, WorkOrderStatus::Closed);

    // 终态不再流转
    let change = api
        .transition_work_order(order_id, WorkOrderStatus::InProgress)
        .expect("更新失败");
    assert!(!change.applied);
    assert_eq!(change.detail.order.status, WorkOrderStatus::Closed);
}

#[test]
fn test_work_order_响应时间四舍五入到分钟() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let order_id = report(&env);

    env.clock.set(base_time() + Duration::seconds(90));
    let change = env
        .state
        .work_order_api
        .transition_work_order(order_id, WorkOrderStatus::InProgress)
        .expect("开始维修失败");
    assert_eq!(change.detail.order.response_time, Some(2));
}

#[test]
fn test_work_order_缺少故障信息不能提交验收() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let order_id = report(&env);
    let api = &env.state.work_order_api;

    api.transition_work_order(order_id, WorkOrderStatus::InProgress)
        .expect("开始维修失败");

    let err = api
        .update_work_order(
            order_id,
            &WorkOrderUpdate {
                status: Some(WorkOrderStatus::PendingAcceptance),
                fault_cause: Some("加热管老化".to_string()),
                solution: Some("  ".to_string()),
                ..Default::default()
            },
        )
        .unwrap_err();
    match &err {
        ApiError::TransitionGuard { reason, .. } => assert!(reason.contains("解决方案")),
        other => panic!("期望 TransitionGuard，实际: {other:?}"),
    }

    // 被拒绝的更新不落库
    let detail = api.find_work_order(order_id).expect("查询工单失败");
    assert_eq!(detail.order.status, WorkOrderStatus::InProgress);
    assert_eq!(detail.order.fault_cause, None);
    assert_eq!(detail.order.finished_at, None);
}

#[test]
fn test_work_order_验收退回后维修时间不重算() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let order_id = report(&env);
    let api = &env.state.work_order_api;

    env.clock.advance_minutes(10);
    api.transition_work_order(order_id, WorkOrderStatus::InProgress)
        .expect("开始维修失败");
    env.clock.advance_minutes(45);
    api.update_work_order(order_id, &fault_info()).expect("提交验收失败");
    let finished_at = base_time() + Duration::minutes(55);

    // 退回: 清空故障原因与解决方案，保留开始/完工时间
    env.clock.advance_minutes(5);
    let change = api
        .update_work_order(
            order_id,
            &WorkOrderUpdate {
                status: Some(WorkOrderStatus::InProgress),
                fault_cause: Some("随退回一起提交".to_string()),
                ..Default::default()
            },
        )
        .expect("退回失败");
    assert!(change.effects.contains(&TransitionEffect::FaultInfoCleared));
    let order = &change.detail.order;
    assert_eq!(order.status, WorkOrderStatus::InProgress);
    assert_eq!(order.fault_cause, None);
    assert_eq!(order.solution, None);
    assert_eq!(order.finished_at, Some(finished_at));
    assert_eq!(order.started_at, Some(base_time() + Duration::minutes(10)));
    assert_eq!(order.response_time, Some(10));

    // 再次提交验收: 完工时间与维修时间保持首次记录的值
    env.clock.advance_minutes(20);
    let change = api.update_work_order(order_id, &fault_info()).expect("再次提交验收失败");
    let order = &change.detail.order;
    assert_eq!(order.status, WorkOrderStatus::PendingAcceptance);
    assert_eq!(order.finished_at, Some(finished_at));
    assert_eq!(order.repair_time, Some(45));
    assert_eq!(order.fault_cause.as_deref(), Some("加热管老化"));
}

#[test]
fn test_work_order_非法目标被忽略但字段生效() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let order_id = report(&env);

    let change = env
        .state
        .work_order_api
        .update_work_order(
            order_id,
            &WorkOrderUpdate {
                status: Some(WorkOrderStatus::Completed),
                title: Some("封口温度波动大".to_string()),
                priority: Some(WorkOrderPriority::Urgent),
                ..Default::default()
            },
        )
        .expect("更新失败");

    assert!(!change.applied);
    assert!(change.effects.is_empty());
    let order = &change.detail.order;
    assert_eq!(order.status, WorkOrderStatus::Created);
    assert_eq!(order.title, "封口温度波动大");
    assert_eq!(order.priority, WorkOrderPriority::Urgent);
    assert_eq!(order.finished_at, None);
}

#[test]
fn test_work_order_指派与接受() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let order_id = report(&env);
    let api = &env.state.work_order_api;

    let detail = api.assign_work_order(order_id, 21).expect("指派失败");
    assert_eq!(detail.order.status, WorkOrderStatus::Assigned);
    assert_eq!(detail.order.assigned_to, Some(21));

    env.clock.advance_minutes(5);
    let change = api
        .transition_work_order(order_id, WorkOrderStatus::Accepted)
        .expect("接受失败");
    assert_eq!(change.detail.order.accepted_at, Some(base_time() + Duration::minutes(5)));

    env.clock.advance_minutes(15);
    let change = api
        .update_work_order(
            order_id,
            &WorkOrderUpdate {
                status: Some(WorkOrderStatus::InProgress),
                assigned_to: Some(99),
                ..Default::default()
            },
        )
        .expect("开始维修失败");
    // 非 created 起点不采纳负责人
    assert_eq!(change.detail.order.assigned_to, Some(21));
    assert_eq!(change.detail.order.response_time, Some(20));

    // 重新指派总是置为 assigned
    let detail = api.assign_work_order(order_id, 22).expect("重新指派失败");
    assert_eq!(detail.order.status, WorkOrderStatus::Assigned);
    assert_eq!(detail.order.assigned_to, Some(22));
    assert!(detail.order.started_at.is_some());
}

#[test]
fn test_work_order_删除() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let order_id = report(&env);
    let api = &env.state.work_order_api;

    api.delete_work_order(order_id).expect("删除失败");
    assert_eq!(
        api.find_work_order(order_id).unwrap_err().kind(),
        ErrorKind::NotFound
    );
    assert_eq!(api.delete_work_order(order_id).unwrap_err().kind(), ErrorKind::NotFound);
}
