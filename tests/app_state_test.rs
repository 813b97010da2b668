// ==========================================
// 应用启动集成测试
// ==========================================
// 测试范围:
// 1. AppState::new 从 config_kv 加载配置
// 2. 启动流程可在多线程运行时的独立任务中执行
// ==========================================


use std::sync::Arc;

use equipment_maintenance::app::AppState;
use equipment_maintenance::clock::{Clock, FixedClock};
use equipment_maintenance::config::{config_keys, ConfigManager, MaintenanceSettings};
use equipment_maintenance::logging;
use test_helpers::*;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_app_state_new_加载数据库配置() {
    logging::init_test();
    let (_temp_file, db_path) = create_test_db().expect("无法创建临时数据库");

    {
        let config = ConfigManager::new(&db_path).expect("无法创建ConfigManager");
        config
            .set_config_value(config_keys::SHIFT_MORNING_HOUR, "6")
            .expect("写入配置失败");
        config
            .set_config_value(config_keys::SHIFT_EVENING_HOUR, "18")
            .expect("写入配置失败");
        config
            .set_config_value(config_keys::ORDER_NO_PREFIX, "BX")
            .expect("写入配置失败");
    }

    let clock: Arc<dyn Clock> = Arc::new(FixedClock::new(base_time()));
    let state = tokio::spawn(AppState::new(db_path.clone(), clock))
        .await
        .expect("启动任务异常退出")
        .expect("无法初始化AppState");

    assert_eq!(state.db_path, db_path);
    assert_eq!(state.settings.shift_morning_hour, 6);
    assert_eq!(state.settings.shift_evening_hour, 18);
    assert_eq!(state.settings.order_no_prefix, "BX");
    assert_eq!(
        state.settings.whole_units,
        MaintenanceSettings::default().whole_units
    );
}

#[tokio::test]
async fn test_app_state_new_空配置使用默认值() {
    logging::init_test();
    let (_temp_file, db_path) = create_test_db().expect("无法创建临时数据库");

    let clock: Arc<dyn Clock> = Arc::new(FixedClock::new(base_time()));
    let state = AppState::new(db_path, clock)
        .await
        .expect("无法初始化AppState");
    assert_eq!(state.settings, MaintenanceSettings::default());
}
