// ==========================================
// 设备维保系统 - 定时任务守护进程
// ==========================================
// 职责: 初始化日志与配置，按频率分桶定时生成保养任务
// 退出: Ctrl-C
// ==========================================

use std::sync::Arc;

use equipment_maintenance::app::{get_default_db_path, AppState};
use equipment_maintenance::clock::SystemClock;
use equipment_maintenance::logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志系统
    logging::init();

    tracing::info!("==================================================");
    tracing::info!("{}", equipment_maintenance::APP_NAME);
    tracing::info!("系统版本: {}", equipment_maintenance::VERSION);
    tracing::info!("==================================================");

    // 获取数据库路径
    let db_path = get_default_db_path();
    tracing::info!("使用数据库: {}", db_path);

    let app_state = AppState::new(db_path, Arc::new(SystemClock))
        .await
        .map_err(|e| anyhow::anyhow!("无法初始化AppState: {}", e))?;

    let timers = app_state.scheduler.spawn_bucket_timers();
    tracing::info!(buckets = timers.len(), "定时器已启动，按 Ctrl-C 退出");

    tokio::signal::ctrl_c().await?;

    tracing::info!("收到退出信号，停止定时器");
    for timer in timers {
        timer.abort();
    }

    Ok(())
}
