// ==========================================
// 设备维保系统 - 应用状态
// ==========================================
// 职责: 打开数据库、加载配置、装配仓储/引擎/API/定时器
// 约束: 全部组件共享同一 SQLite 连接（Arc<Mutex<Connection>>）
// ==========================================

use rusqlite::Connection;
use std::sync::{Arc, Mutex};

use crate::api::{MaintenanceApi, WorkOrderApi};
use crate::clock::Clock;
use crate::config::{ConfigManager, MaintenanceSettings};
use crate::db::{ensure_schema, open_sqlite_connection};
use crate::engine::{
    InventoryEngine, MaintenanceRepositories, MaintenanceScheduler, PlanService, TaskExecutor,
    TaskGenerator, WorkOrderEngine,
};

/// 应用状态
pub struct AppState {
    pub db_path: String,
    pub settings: MaintenanceSettings,
    pub config_manager: Arc<ConfigManager>,
    pub repos: MaintenanceRepositories,
    pub maintenance_api: Arc<MaintenanceApi>,
    pub work_order_api: Arc<WorkOrderApi>,
    pub scheduler: Arc<MaintenanceScheduler>,
}

impl AppState {
    /// 打开数据库并从 config_kv 加载配置
    pub async fn new(db_path: String, clock: Arc<dyn Clock>) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        let conn = open_database(&db_path)?;
        let config_manager = ConfigManager::from_connection(conn.clone())
            .map_err(|e| format!("无法创建ConfigManager: {}", e))?;
        let settings = config_manager
            .load_settings()
            .await
            .map_err(|e| format!("加载配置失败: {}", e))?;
        tracing::info!(settings = ?settings, "配置加载完成");

        Ok(Self::assemble(db_path, conn, Arc::new(config_manager), settings, clock))
    }

    /// 使用给定配置装配（不读取 config_kv，测试使用）
    pub fn with_settings(
        db_path: String,
        settings: MaintenanceSettings,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, String> {
        let conn = open_database(&db_path)?;
        let config_manager = ConfigManager::from_connection(conn.clone())
            .map_err(|e| format!("无法创建ConfigManager: {}", e))?;
        Ok(Self::assemble(db_path, conn, Arc::new(config_manager), settings, clock))
    }

    fn assemble(
        db_path: String,
        conn: Arc<Mutex<Connection>>,
        config_manager: Arc<ConfigManager>,
        settings: MaintenanceSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        // ==========================================
        // Repository 层
        // ==========================================
        let repos = MaintenanceRepositories::new(conn.clone());

        // ==========================================
        // Engine 层
        // ==========================================
        let plan_service = Arc::new(PlanService::new(conn.clone(), settings.clone()));
        let generator = Arc::new(TaskGenerator::new(conn.clone(), settings.clone()));
        let executor = Arc::new(TaskExecutor::new(conn.clone(), settings.clone()));
        let work_order_engine = Arc::new(WorkOrderEngine::new(conn.clone(), settings.clone()));
        let inventory = Arc::new(InventoryEngine::new(conn, settings.clone()));

        // ==========================================
        // API 层
        // ==========================================
        let maintenance_api = Arc::new(MaintenanceApi::new(
            plan_service,
            generator.clone(),
            executor,
            repos.clone(),
            clock.clone(),
        ));
        let work_order_api = Arc::new(WorkOrderApi::new(
            work_order_engine,
            inventory,
            repos.clone(),
            clock.clone(),
        ));

        let scheduler = Arc::new(MaintenanceScheduler::new(
            generator,
            repos.plan_repo.clone(),
            clock,
            settings.clone(),
        ));

        tracing::info!("AppState初始化完成");

        Self {
            db_path,
            settings,
            config_manager,
            repos,
            maintenance_api,
            work_order_api,
            scheduler,
        }
    }
}

fn open_database(db_path: &str) -> Result<Arc<Mutex<Connection>>, String> {
    let conn = open_sqlite_connection(db_path).map_err(|e| format!("无法打开数据库: {}", e))?;
    ensure_schema(&conn).map_err(|e| format!("数据库初始化失败: {}", e))?;
    Ok(Arc::new(Mutex::new(conn)))
}

/// 默认数据库路径
///
/// 优先级: 环境变量 EQUIPMENT_MAINTENANCE_DB_PATH > 用户数据目录 > 当前目录
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    if let Ok(path) = std::env::var("EQUIPMENT_MAINTENANCE_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./equipment_maintenance.db");

    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("equipment-maintenance");
        // 目录创建失败时回退到当前目录
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("equipment_maintenance.db");
        }
    }

    path.to_string_lossy().to_string()
}
