// ==========================================
// 设备维保系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use async_trait::async_trait;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::error::Error;
use std::sync::{Arc, Mutex};

use crate::config::settings_reader::MaintenanceConfigReader;
use crate::db::open_sqlite_connection;

// ==========================================
// 配置键
// ==========================================
pub mod config_keys {
    /// 早班交接时刻（小时）
    pub const SHIFT_MORNING_HOUR: &str = "maintenance.shift_morning_hour";
    /// 晚班交接时刻（小时）
    pub const SHIFT_EVENING_HOUR: &str = "maintenance.shift_evening_hour";
    /// 单个计划内容项上限
    pub const MAX_CHECKLIST_ITEMS: &str = "maintenance.max_checklist_items";
    /// 必须整数领用的备件单位（逗号分隔）
    pub const WHOLE_UNITS: &str = "spare_part.whole_units";
    /// 旧件编号后缀
    pub const OLD_PART_SUFFIX: &str = "spare_part.old_part_suffix";
    /// 工单号前缀
    pub const ORDER_NO_PREFIX: &str = "work_order.no_prefix";
}

// ==========================================
// MaintenanceSettings - 引擎使用的配置快照
// ==========================================
// 启动时加载一次，按值传给各引擎
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceSettings {
    pub shift_morning_hour: u32,
    pub shift_evening_hour: u32,
    pub max_checklist_items: usize,
    pub whole_units: Vec<String>,
    pub old_part_suffix: String,
    pub order_no_prefix: String,
}

impl Default for MaintenanceSettings {
    fn default() -> Self {
        Self {
            shift_morning_hour: 8,
            shift_evening_hour: 20,
            max_checklist_items: 30,
            whole_units: vec!["pc".to_string(), "set".to_string()],
            old_part_suffix: "J".to_string(),
            order_no_prefix: "WO".to_string(),
        }
    }
}

impl MaintenanceSettings {
    /// 该单位是否只允许整数数量
    pub fn is_whole_unit(&self, unit: &str) -> bool {
        let unit = unit.trim();
        self.whole_units.iter().any(|u| u.eq_ignore_ascii_case(unit))
    }
}

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error>> {
        let conn = open_sqlite_connection(db_path)?;
        crate::db::ensure_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, Box<dyn Error>> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    fn get_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 读取 global scope 的配置值（公开方法，供其他模块复用）
    pub fn get_global_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        self.get_config_value(key)
    }

    /// 从 config_kv 表读取配置值，带默认值
    fn get_config_or_default(&self, key: &str, default: &str) -> Result<String, Box<dyn Error>> {
        Ok(self.get_config_value(key)?.unwrap_or_else(|| default.to_string()))
    }

    /// 写入 global scope 配置（UPSERT）
    pub fn set_config_value(&self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        Ok(())
    }

    /// 获取所有配置的快照（JSON格式）
    pub fn get_config_snapshot(&self) -> Result<String, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let mut stmt = conn.prepare(
            "SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key"
        )?;

        let mut config_map: HashMap<String, String> = HashMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        Ok(serde_json::to_string(&json!(config_map))?)
    }

    /// 一次性加载完整配置快照
    ///
    /// 每项读取完立即落到局部变量，错误值不会跨越后续 await
    pub async fn load_settings(&self) -> Result<MaintenanceSettings, Box<dyn Error + Send + Sync>> {
        let (shift_morning_hour, shift_evening_hour) =
            self.get_shift_hours().await.map_err(|e| e.to_string())?;
        let max_checklist_items = self
            .get_max_checklist_items()
            .await
            .map_err(|e| e.to_string())?;
        let whole_units = self.get_whole_units().await.map_err(|e| e.to_string())?;
        let old_part_suffix = self.get_old_part_suffix().await.map_err(|e| e.to_string())?;
        let order_no_prefix = self.get_order_no_prefix().await.map_err(|e| e.to_string())?;

        Ok(MaintenanceSettings {
            shift_morning_hour,
            shift_evening_hour,
            max_checklist_items,
            whole_units,
            old_part_suffix,
            order_no_prefix,
        })
    }

    /// 读取整数配置；格式错误时告警并回退默认值
    fn get_parsed_or_default<T>(&self, key: &str, default: T) -> Result<T, Box<dyn Error>>
    where
        T: std::str::FromStr + std::fmt::Display + Copy,
    {
        let value = self.get_config_or_default(key, &default.to_string())?;
        match value.trim().parse::<T>() {
            Ok(parsed) => Ok(parsed),
            Err(_) => {
                tracing::warn!(config_key = key, raw_value = %value, "配置格式错误，使用默认值");
                Ok(default)
            }
        }
    }
}

// ==========================================
// MaintenanceConfigReader Trait 实现
// ==========================================
#[async_trait]
impl MaintenanceConfigReader for ConfigManager {
    async fn get_shift_hours(&self) -> Result<(u32, u32), Box<dyn Error>> {
        let defaults = MaintenanceSettings::default();
        let morning = self.get_parsed_or_default(config_keys::SHIFT_MORNING_HOUR, defaults.shift_morning_hour)?;
        let evening = self.get_parsed_or_default(config_keys::SHIFT_EVENING_HOUR, defaults.shift_evening_hour)?;

        // 早班必须早于晚班，且都在 0..24 内
        if morning < evening && evening < 24 {
            Ok((morning, evening))
        } else {
            tracing::warn!(morning, evening, "班次时刻配置无效，使用默认 8/20");
            Ok((defaults.shift_morning_hour, defaults.shift_evening_hour))
        }
    }

    async fn get_max_checklist_items(&self) -> Result<usize, Box<dyn Error>> {
        let default = MaintenanceSettings::default().max_checklist_items;
        let value = self.get_parsed_or_default(config_keys::MAX_CHECKLIST_ITEMS, default)?;
        Ok(if value == 0 { default } else { value })
    }

    async fn get_whole_units(&self) -> Result<Vec<String>, Box<dyn Error>> {
        let value = self.get_config_or_default(config_keys::WHOLE_UNITS, "pc,set")?;
        let units: Vec<String> = value
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if units.is_empty() {
            Ok(MaintenanceSettings::default().whole_units)
        } else {
            Ok(units)
        }
    }

    async fn get_old_part_suffix(&self) -> Result<String, Box<dyn Error>> {
        let value = self.get_config_or_default(config_keys::OLD_PART_SUFFIX, "J")?;
        let trimmed = value.trim();
        Ok(if trimmed.is_empty() { "J".to_string() } else { trimmed.to_string() })
    }

    async fn get_order_no_prefix(&self) -> Result<String, Box<dyn Error>> {
        let value = self.get_config_or_default(config_keys::ORDER_NO_PREFIX, "WO")?;
        let trimmed = value.trim();
        Ok(if trimmed.is_empty() { "WO".to_string() } else { trimmed.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;

    fn manager() -> ConfigManager {
        let conn = Arc::new(Mutex::new(open_in_memory().unwrap()));
        ConfigManager::from_connection(conn).unwrap()
    }

    #[tokio::test]
    async fn test_defaults_when_table_empty() {
        let settings = manager().load_settings().await.unwrap();
        assert_eq!(settings, MaintenanceSettings::default());
    }

    #[tokio::test]
    async fn test_overrides_are_applied() {
        let config = manager();
        config.set_config_value(config_keys::SHIFT_MORNING_HOUR, "7").unwrap();
        config.set_config_value(config_keys::SHIFT_EVENING_HOUR, "19").unwrap();
        config.set_config_value(config_keys::WHOLE_UNITS, "pc, set, box").unwrap();

        let settings = config.load_settings().await.unwrap();
        assert_eq!((settings.shift_morning_hour, settings.shift_evening_hour), (7, 19));
        assert!(settings.is_whole_unit("BOX"));
        assert!(!settings.is_whole_unit("m"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_load_settings_runs_in_spawned_task() {
        let config = manager();
        config.set_config_value(config_keys::OLD_PART_SUFFIX, "OLD").unwrap();
        let settings = tokio::spawn(async move { config.load_settings().await })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(settings.old_part_suffix, "OLD");
    }

    #[tokio::test]
    async fn test_invalid_shift_hours_fall_back() {
        let config = manager();
        config.set_config_value(config_keys::SHIFT_MORNING_HOUR, "21").unwrap();
        let (morning, evening) = config.get_shift_hours().await.unwrap();
        assert_eq!((morning, evening), (8, 20));
    }

    #[test]
    fn test_snapshot_contains_written_keys() {
        let config = manager();
        config.set_config_value(config_keys::OLD_PART_SUFFIX, "OLD").unwrap();
        let snapshot = config.get_config_snapshot().unwrap();
        let parsed: HashMap<String, String> = serde_json::from_str(&snapshot).unwrap();
        assert_eq!(parsed.get(config_keys::OLD_PART_SUFFIX).map(String::as_str), Some("OLD"));
    }
}
