// ==========================================
// 保养计划与定时生成集成测试
// ==========================================
// 测试范围:
// 1. 计划管理: 内容项校验、整体替换、设备绑定、删除后任务保留
// 2. 定时生成: 分桶运行、重复跳过、单计划失败不影响其余计划
// ==========================================


use serde_json::json;

use equipment_maintenance::api::ErrorKind;
use equipment_maintenance::domain::types::FrequencyType;
use equipment_maintenance::domain::{ChecklistItemInput, UpdatePlanInput};
use test_helpers::*;

// ==========================================
// 计划管理
// ==========================================

#[test]
fn test_create_plan_内容项数量校验() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let api = &env.state.maintenance_api;

    let mut input = plan_input("空内容", FrequencyType::Daily, vec![]);
    input.items.clear();
    assert_eq!(api.create_plan(&input, None).unwrap_err().kind(), ErrorKind::Validation);

    let mut input = plan_input("内容过多", FrequencyType::Daily, vec![]);
    input.items = (0..31)
        .map(|i| ChecklistItemInput::qualitative(&format!("检查项{}", i)))
        .collect();
    assert_eq!(api.create_plan(&input, None).unwrap_err().kind(), ErrorKind::Validation);

    let mut input = plan_input("上下限颠倒", FrequencyType::Daily, vec![]);
    input.items = vec![ChecklistItemInput::quantitative("油压", "MPa", Some(5.0), Some(1.0))];
    assert_eq!(api.create_plan(&input, None).unwrap_err().kind(), ErrorKind::Validation);

    let input = plan_input("设备不存在", FrequencyType::Daily, vec![404]);
    assert_eq!(api.create_plan(&input, None).unwrap_err().kind(), ErrorKind::NotFound);

    let mut input = plan_input("零倍数", FrequencyType::Daily, vec![]);
    input.frequency_value = 0;
    assert_eq!(api.create_plan(&input, None).unwrap_err().kind(), ErrorKind::Validation);
}

#[test]
fn test_create_plan_定性项补齐默认选项() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let mut input = plan_input("巡检", FrequencyType::Shift, vec![]);
    let mut item = ChecklistItemInput::qualitative("油位");
    item.qualitative_options = None;
    input.items = vec![item];

    let plan = env
        .state
        .maintenance_api
        .create_plan(&input, Some(1))
        .expect("创建计划失败");
    let options = plan.items[0]
        .qualitative_options
        .as_ref()
        .expect("应补齐默认选项");
    assert_eq!(options.normal, "正常");
    assert_eq!(options.abnormal, "异常");
    assert_eq!(plan.plan.created_by, Some(1));
}

#[test]
fn test_update_plan_整体替换内容项与设备() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let a = env.add_device("KYJ-001", "空压机1号");
    let b = env.add_device("KYJ-002", "空压机2号");
    let plan = env.create_plan("空压机日检", FrequencyType::Daily, vec![a]);
    let plan_id = plan.plan.plan_id;

    let updated = env
        .state
        .maintenance_api
        .update_plan(
            plan_id,
            &UpdatePlanInput {
                title: Some("空压机周检".to_string()),
                frequency_type: Some(FrequencyType::Weekly),
                items: Some(vec![ChecklistItemInput::qualitative("冷凝水排放")]),
                device_ids: Some(vec![b]),
                ..Default::default()
            },
        )
        .expect("更新计划失败");

    assert_eq!(updated.plan.title, "空压机周检");
    assert_eq!(updated.plan.frequency_type, FrequencyType::Weekly);
    assert_eq!(updated.items.len(), 1);
    assert_eq!(updated.items[0].name, "冷凝水排放");
    let stored = env
        .state
        .repos
        .plan_repo
        .find_items(plan_id)
        .expect("查询内容项失败");
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].name, "冷凝水排放");
    assert_eq!(updated.devices.len(), 1);
    assert_eq!(updated.devices[0].device_id, b);
    // 未提供的字段保持不变
    assert_eq!(updated.plan.description.as_deref(), Some("例行点检"));
    assert_eq!(updated.plan.assigned_to, Some(7));
}

#[test]
fn test_bind_and_unbind_devices() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let a = env.add_device("KYJ-001", "空压机1号");
    let b = env.add_device("KYJ-002", "空压机2号");
    let plan = env.create_plan("空压机日检", FrequencyType::Daily, vec![]);
    let plan_id = plan.plan.plan_id;
    let api = &env.state.maintenance_api;

    let detail = api.bind_devices(plan_id, &[a, b]).expect("绑定失败");
    assert_eq!(detail.devices.len(), 2);

    assert!(api.unbind_device(plan_id, a).expect("解绑失败"));
    assert!(!api.unbind_device(plan_id, a).expect("解绑失败"));

    let devices = api.get_plan_devices(plan_id).expect("查询设备失败");
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].asset_no, "KYJ-002");

    let device_repo = &env.state.repos.device_repo;
    assert!(device_repo.device_exists(a).expect("查询设备失败"));
    assert!(!device_repo.device_exists(404).expect("查询设备失败"));

    assert_eq!(api.get_plan_devices(404).unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(api.bind_devices(404, &[a]).unwrap_err().kind(), ErrorKind::NotFound);
}

#[test]
fn test_delete_plan_已生成任务保留() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let a = env.add_device("KYJ-001", "空压机1号");
    let plan = env.create_plan("空压机日检", FrequencyType::Daily, vec![a]);
    let plan_id = plan.plan.plan_id;
    let api = &env.state.maintenance_api;

    let created = api
        .generate_tasks(plan_id, Some(dt(2024, 6, 16, 0, 0)), None)
        .expect("生成任务失败");
    let task_id = created[0].task.task_id;

    api.delete_plan(plan_id).expect("删除计划失败");
    assert_eq!(api.find_plan(plan_id).unwrap_err().kind(), ErrorKind::NotFound);

    let orphan = api.find_task(task_id).expect("任务应保留");
    assert_eq!(orphan.task.plan_id, None);
    assert!(orphan.plan.is_none());
    assert!(orphan.items.is_empty());

    // 计划已删除的任务无法提交
    let input = submission(&plan, json!(50), true);
    let err = api.submit_task(task_id, &input, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    assert_eq!(api.delete_plan(plan_id).unwrap_err().kind(), ErrorKind::NotFound);
}

// ==========================================
// 定时生成
// ==========================================

#[test]
fn test_run_bucket_为激活计划生成任务() {
    // 2024-06-17 是周一
    let env = TestEnv::at(dt(2024, 6, 17, 1, 0)).expect("无法创建测试环境");
    let a = env.add_device("KYJ-001", "空压机1号");
    let b = env.add_device("KYJ-002", "空压机2号");
    let daily = env.create_plan("空压机日检", FrequencyType::Daily, vec![a, b]);
    let idle = env.create_plan("未绑定设备的日检", FrequencyType::Daily, vec![]);
    let weekly = env.create_plan("空压机周检", FrequencyType::Weekly, vec![a]);

    let mut paused = plan_input("停用日检", FrequencyType::Daily, vec![a]);
    paused.active = false;
    env.state
        .maintenance_api
        .create_plan(&paused, None)
        .expect("创建计划失败");

    let listed = env
        .state
        .maintenance_api
        .list_plans_for_bucket(FrequencyType::Daily)
        .expect("查询计划失败");
    assert_eq!(listed.len(), 2);

    let report = env
        .state
        .scheduler
        .run_bucket(FrequencyType::Daily)
        .expect("定时运行失败");
    assert_eq!(report.plans_processed, 2);
    assert_eq!(report.tasks_created, 2);
    assert_eq!(report.devices_skipped, 0);
    assert!(report.failures.is_empty());

    let tasks = env
        .state
        .maintenance_api
        .list_tasks_by_plan(daily.plan.plan_id)
        .expect("查询任务失败");
    assert_eq!(tasks.len(), 2);
    assert!(tasks.iter().all(|t| t.scheduled_at == dt(2024, 6, 18, 0, 0)));

    assert!(env
        .state
        .maintenance_api
        .list_tasks_by_plan(idle.plan.plan_id)
        .expect("查询任务失败")
        .is_empty());
    // 其他分桶的计划不受影响
    assert!(env
        .state
        .maintenance_api
        .list_tasks_by_plan(weekly.plan.plan_id)
        .expect("查询任务失败")
        .is_empty());
}

#[test]
fn test_run_bucket_同一时刻重复触发静默跳过() {
    let env = TestEnv::at(dt(2024, 6, 17, 1, 0)).expect("无法创建测试环境");
    let a = env.add_device("KYJ-001", "空压机1号");
    env.create_plan("空压机日检", FrequencyType::Daily, vec![a]);

    let first = env
        .state
        .scheduler
        .run_bucket(FrequencyType::Daily)
        .expect("定时运行失败");
    let second = env
        .state
        .scheduler
        .run_bucket(FrequencyType::Daily)
        .expect("定时运行失败");

    assert_eq!(first.tasks_created, 1);
    assert_eq!(second.tasks_created, 0);
    assert_eq!(second.devices_skipped, 1);
    assert!(second.failures.is_empty());
}

#[test]
fn test_run_bucket_班次计划推进到交接时刻() {
    let env = TestEnv::at(dt(2024, 6, 17, 8, 0)).expect("无法创建测试环境");
    let a = env.add_device("KYJ-001", "空压机1号");
    let plan = env.create_plan("空压机班检", FrequencyType::Shift, vec![a]);

    let report = env
        .state
        .scheduler
        .run_bucket(FrequencyType::Shift)
        .expect("定时运行失败");
    assert_eq!(report.tasks_created, 1);

    let tasks = env
        .state
        .maintenance_api
        .list_tasks_by_plan(plan.plan.plan_id)
        .expect("查询任务失败");
    assert_eq!(tasks[0].scheduled_at, dt(2024, 6, 17, 20, 0));
}

#[test]
fn test_run_bucket_单个计划失败不影响其余计划() {
    let env = TestEnv::at(dt(2024, 6, 17, 8, 0)).expect("无法创建测试环境");
    let a = env.add_device("LQT-001", "冷却塔1号");
    let broken = env.create_plan("倍数溢出的年检", FrequencyType::Yearly, vec![a]);
    let healthy = env.create_plan("冷却塔年检", FrequencyType::Yearly, vec![a]);

    env.state
        .maintenance_api
        .update_plan(
            broken.plan.plan_id,
            &UpdatePlanInput {
                frequency_value: Some(u32::MAX),
                ..Default::default()
            },
        )
        .expect("更新计划失败");

    let report = env
        .state
        .scheduler
        .run_bucket(FrequencyType::Yearly)
        .expect("定时运行失败");
    assert_eq!(report.plans_processed, 2);
    assert_eq!(report.tasks_created, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].plan_id, broken.plan.plan_id);

    let tasks = env
        .state
        .maintenance_api
        .list_tasks_by_plan(healthy.plan.plan_id)
        .expect("查询任务失败");
    assert_eq!(tasks[0].scheduled_at, dt(2025, 1, 1, 0, 0));
}

#[tokio::test]
async fn test_spawn_bucket_timers_每个分桶一个定时器() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let timers = env.state.scheduler.spawn_bucket_timers();
    assert_eq!(timers.len(), FrequencyType::ALL.len());
    for timer in timers {
        timer.abort();
    }
}
