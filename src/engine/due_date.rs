// ==========================================
// 设备维保系统 - 到期时间计算
// ==========================================
// 职责: 按保养频率计算下一次到期时刻
// 红线: 纯函数，不读取系统时间，不访问数据库
// ==========================================
// 规则:
// - shift:   早于晚班交接 → 当天晚班时刻；否则 → 次日早班时刻
// - daily:   +N 天，00:00
// - weekly:  +N×7 天，对齐到当周周一 00:00
// - monthly: 当月 1 日 +N 月，00:00
// - yearly:  当年 1 月 1 日 +N 年，00:00
// ==========================================

use chrono::{Datelike, Duration, Months, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

use crate::config::MaintenanceSettings;
use crate::domain::types::FrequencyType;

/// 计算下一次到期时刻
///
/// `from` 为锚点（自动触发时为当前时间，手动生成时为实际排期时间）。
/// 频率倍数过大导致日期溢出时返回 None。
pub fn next_due(
    frequency: FrequencyType,
    frequency_value: u32,
    from: NaiveDateTime,
    settings: &MaintenanceSettings,
) -> Option<NaiveDateTime> {
    let date = from.date();
    match frequency {
        FrequencyType::Shift => {
            // 班次频率不使用倍数，始终推进到下一个交接点
            if from.hour() < settings.shift_evening_hour {
                at_hour(date, settings.shift_evening_hour)
            } else {
                at_hour(date.succ_opt()?, settings.shift_morning_hour)
            }
        }
        FrequencyType::Daily => {
            let target = date.checked_add_signed(Duration::days(i64::from(frequency_value)))?;
            Some(midnight(target))
        }
        FrequencyType::Weekly => {
            let days = i64::from(frequency_value).checked_mul(7)?;
            let target = date.checked_add_signed(Duration::days(days))?;
            let offset = i64::from(target.weekday().num_days_from_monday());
            let monday = target.checked_sub_signed(Duration::days(offset))?;
            Some(midnight(monday))
        }
        FrequencyType::Monthly => {
            let first = date.with_day(1)?;
            let target = first.checked_add_months(Months::new(frequency_value))?;
            Some(midnight(target))
        }
        FrequencyType::Yearly => {
            let year = date.year().checked_add(i32::try_from(frequency_value).ok()?)?;
            let target = NaiveDate::from_ymd_opt(year, 1, 1)?;
            Some(midnight(target))
        }
    }
}

fn midnight(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

fn at_hour(date: NaiveDate, hour: u32) -> Option<NaiveDateTime> {
    date.and_hms_opt(hour, 0, 0)
}
