// ==========================================
// 设备维保系统 - 备件领用引擎
// ==========================================
// 职责: 执行中工单领用备件，扣减库存，写入使用记录与旧件台账
// 事务: 整批领用在同一事务内，任一行失败全部回滚
// 红线: 不允许出现“库存已扣减但没有旧件台账”的中间状态
// ==========================================

use chrono::NaiveDateTime;
use rusqlite::{Connection, TransactionBehavior};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, instrument};

use crate::config::MaintenanceSettings;
use crate::domain::asset::SparePart;
use crate::domain::quantity::Quantity;
use crate::domain::types::WorkOrderStatus;
use crate::domain::work_order::{OldPart, PartUsage, WorkOrder, WorkOrderDetail};
use crate::engine::detail::work_order_detail_in;
use crate::engine::error::{EngineError, EngineResult};
use crate::repository::device_repo::DeviceRepository;
use crate::repository::error::RepositoryError;
use crate::repository::old_part_repo::OldPartRepository;
use crate::repository::spare_part_repo::SparePartRepository;
use crate::repository::work_order_repo::WorkOrderRepository;

/// 领用结果
#[derive(Debug, Clone, Serialize)]
pub struct ConsumptionReceipt {
    pub detail: WorkOrderDetail,
    /// 本次写入的旧件台账（与领用行一一对应）
    pub old_parts: Vec<OldPart>,
}

pub struct InventoryEngine {
    conn: Arc<Mutex<Connection>>,
    settings: MaintenanceSettings,
}

impl InventoryEngine {
    pub fn new(conn: Arc<Mutex<Connection>>, settings: MaintenanceSettings) -> Self {
        Self { conn, settings }
    }

    /// 工单领用备件
    ///
    /// # 错误
    /// - 工单不在执行中
    /// - 备件不存在
    /// - 整数单位（pc/set 等）的数量不是整数
    /// - 库存不足
    #[instrument(skip(self, usages), fields(lines = usages.len()))]
    pub fn use_parts(
        &self,
        order_id: i64,
        usages: &[PartUsage],
        user_id: Option<i64>,
        now: NaiveDateTime,
    ) -> EngineResult<ConsumptionReceipt> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let order = WorkOrderRepository::find_by_id_in(&tx, order_id)?
            .ok_or_else(|| RepositoryError::not_found("WorkOrder", order_id))?;
        if order.status != WorkOrderStatus::InProgress {
            return Err(EngineError::InvalidState(format!(
                "工单 {} 当前状态为 {}，只能在执行中的工单中使用备件",
                order.order_no, order.status
            )));
        }

        if usages.is_empty() {
            debug!(order_id, "领用清单为空");
            let detail = work_order_detail_in(&tx, order_id)?;
            return Ok(ConsumptionReceipt {
                detail,
                old_parts: Vec::new(),
            });
        }

        let device_name = match order.device_id {
            Some(device_id) => DeviceRepository::find_by_id_in(&tx, device_id)?.map(|d| d.name),
            None => None,
        };

        let mut old_parts = Vec::with_capacity(usages.len());
        for usage in usages {
            let old_part = self.consume_line(&tx, &order, device_name.as_deref(), usage, now)?;
            old_parts.push(old_part);
        }

        let detail = work_order_detail_in(&tx, order_id)?;
        tx.commit()?;

        info!(
            order_id,
            user_id = ?user_id,
            lines = old_parts.len(),
            "备件领用完成"
        );
        Ok(ConsumptionReceipt { detail, old_parts })
    }

    fn consume_line(
        &self,
        conn: &Connection,
        order: &WorkOrder,
        device_name: Option<&str>,
        usage: &PartUsage,
        now: NaiveDateTime,
    ) -> EngineResult<OldPart> {
        // 每行重新读取，同一备件多行领用时按累计扣减校验
        let mut part = SparePartRepository::get_part_in(conn, usage.part_id)?
            .ok_or_else(|| RepositoryError::not_found("SparePart", usage.part_id))?;

        let requested = check_quantity(&part, usage.qty, &self.settings)?;

        part.stock_qty = part.stock_qty - requested;
        SparePartRepository::save_stock_in(conn, &part)?;
        let qty = requested.to_f64();
        WorkOrderRepository::insert_part_usage_in(conn, order.order_id, part.part_id, qty, now)?;

        let mut old_part = OldPart {
            id: 0,
            work_order_id: Some(order.order_id),
            device_id: order.device_id,
            part_no: retired_part_no(&part.part_no, &self.settings.old_part_suffix),
            qty,
            name: part.name.clone(),
            spec: part.spec.clone(),
            supplier: part.supplier.clone(),
            unit: Some(part.unit.clone()),
            location: part.location.clone(),
            notes: Some(format!(
                "来自工单 {}，设备 {}",
                order.order_no,
                device_name.unwrap_or("未知设备")
            )),
            created_at: now,
        };
        old_part.id = OldPartRepository::insert_in(conn, &old_part)?;

        debug!(
            part_id = part.part_id,
            qty = %requested,
            remaining = %part.stock_qty,
            old_part_no = %old_part.part_no,
            "备件已扣减"
        );
        Ok(old_part)
    }
}

/// 校验领用数量: 正数、最多三位小数、整数单位必须为整数、库存充足
///
/// 返回换算后的定点数量
fn check_quantity(part: &SparePart, qty: f64, settings: &MaintenanceSettings) -> EngineResult<Quantity> {
    let requested = Quantity::from_f64(qty).ok_or_else(|| {
        EngineError::Validation(format!(
            "备件 {} 的领用数量 {} 不合法，最多保留三位小数",
            part.name, qty
        ))
    })?;
    if !requested.is_positive() {
        return Err(EngineError::Validation(format!(
            "备件 {} 的领用数量必须大于 0",
            part.name
        )));
    }
    if settings.is_whole_unit(&part.unit) && !requested.is_whole() {
        return Err(EngineError::FractionalQuantity {
            part: part.name.clone(),
            unit: part.unit.clone(),
        });
    }
    if part.stock_qty < requested {
        return Err(EngineError::InsufficientStock {
            part: part.name.clone(),
            current: part.stock_qty,
            requested,
        });
    }
    Ok(requested)
}

/// 旧件编号: 追加退役后缀（已带后缀则不重复追加）
pub fn retired_part_no(part_no: &str, suffix: &str) -> String {
    if part_no.ends_with(suffix) {
        part_no.to_string()
    } else {
        format!("{}{}", part_no, suffix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn part(unit: &str, stock_milli: i64) -> SparePart {
        SparePart {
            part_id: 1,
            part_no: "BRG-6204".to_string(),
            name: "深沟球轴承".to_string(),
            spec: json!({"model": "6204"}),
            supplier: None,
            stock_qty: Quantity::from_milli(stock_milli),
            unit: unit.to_string(),
            location: None,
        }
    }

    #[test]
    fn test_suffix_is_idempotent() {
        assert_eq!(retired_part_no("BRG-6204", "J"), "BRG-6204J");
        assert_eq!(retired_part_no("BRG-6204J", "J"), "BRG-6204J");
    }

    #[test]
    fn test_fractional_quantity_on_whole_unit() {
        let settings = MaintenanceSettings::default();
        let err = check_quantity(&part("pc", 5000), 2.5, &settings).unwrap_err();
        assert!(matches!(err, EngineError::FractionalQuantity { ref unit, .. } if unit == "pc"));

        // 米制单位允许小数
        assert_eq!(
            check_quantity(&part("m", 5000), 2.5, &settings).unwrap(),
            Quantity::from_milli(2500)
        );
    }

    #[test]
    fn test_insufficient_stock_reports_numbers() {
        let settings = MaintenanceSettings::default();
        let err = check_quantity(&part("set", 1000), 2.0, &settings).unwrap_err();
        match err {
            EngineError::InsufficientStock { current, requested, .. } => {
                assert_eq!(current, Quantity::whole(1));
                assert_eq!(requested, Quantity::whole(2));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_non_positive_quantity_is_rejected() {
        let settings = MaintenanceSettings::default();
        assert!(matches!(
            check_quantity(&part("m", 5000), 0.0, &settings),
            Err(EngineError::Validation(_))
        ));
        assert!(matches!(
            check_quantity(&part("m", 5000), 0.0005, &settings),
            Err(EngineError::Validation(_))
        ));
    }
}
