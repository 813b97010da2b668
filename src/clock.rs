// ==========================================
// 设备维保系统 - 时钟
// ==========================================
// 每个操作只读取一次“当前时间”，并显式传递给引擎
// 测试中注入固定时间以断言精确的时长
// ==========================================

use chrono::{Local, NaiveDateTime, Timelike};
use std::sync::Mutex;

/// 时钟接口
pub trait Clock: Send + Sync {
    /// 当前本地时间（精确到秒）
    fn now(&self) -> NaiveDateTime;
}

/// 系统时钟
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        truncate_to_second(Local::now().naive_local())
    }
}

/// 固定时钟（可手动推进）
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<NaiveDateTime>,
}

impl FixedClock {
    pub fn new(now: NaiveDateTime) -> Self {
        Self {
            now: Mutex::new(truncate_to_second(now)),
        }
    }

    /// 设置当前时间
    pub fn set(&self, now: NaiveDateTime) {
        if let Ok(mut guard) = self.now.lock() {
            *guard = truncate_to_second(now);
        }
    }

    /// 时间前进若干分钟
    pub fn advance_minutes(&self, minutes: i64) {
        if let Ok(mut guard) = self.now.lock() {
            *guard += chrono::Duration::minutes(minutes);
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        match self.now.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

fn truncate_to_second(dt: NaiveDateTime) -> NaiveDateTime {
    dt.with_nanosecond(0).unwrap_or(dt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_fixed_clock_advance() {
        let start = NaiveDate::from_ymd_opt(2024, 6, 15)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        let clock = FixedClock::new(start);
        clock.advance_minutes(90);
        assert_eq!(clock.now(), start + chrono::Duration::minutes(90));
    }

    #[test]
    fn test_system_clock_has_no_subseconds() {
        assert_eq!(SystemClock.now().nanosecond(), 0);
    }
}
