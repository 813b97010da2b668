// ==========================================
// 设备维保系统 - 定时任务生成
// ==========================================
// 职责: 按频率分桶触发，为每个激活计划自动生成任务（NonStrict）
// 触发日历:
//   shift   每天早班/晚班交接时刻（默认 08:00 / 20:00）
//   daily   每天 01:00
//   weekly  每周一 08:00
//   monthly 每月 1 日 08:00
//   yearly  每年 1 月 1 日 08:00
// 并发: 每个分桶一个独立 tokio 任务；分桶之间只共享存储层
//       同一计划同一时刻的重复生成由唯一性约束兜底
// ==========================================

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::clock::Clock;
use crate::config::MaintenanceSettings;
use crate::domain::types::FrequencyType;
use crate::engine::error::EngineResult;
use crate::engine::task_generator::{GenerationMode, TaskGenerator};
use crate::repository::plan_repo::PlanRepository;

/// 分桶触发的下一个时刻（严格晚于 now）
pub fn next_fire_after(
    bucket: FrequencyType,
    now: NaiveDateTime,
    settings: &MaintenanceSettings,
) -> Option<NaiveDateTime> {
    let today = now.date();
    match bucket {
        FrequencyType::Shift => {
            let morning = today.and_hms_opt(settings.shift_morning_hour, 0, 0)?;
            let evening = today.and_hms_opt(settings.shift_evening_hour, 0, 0)?;
            if now < morning {
                Some(morning)
            } else if now < evening {
                Some(evening)
            } else {
                today.succ_opt()?.and_hms_opt(settings.shift_morning_hour, 0, 0)
            }
        }
        FrequencyType::Daily => first_after(now, today, |date| date.succ_opt(), 1),
        FrequencyType::Weekly => {
            let offset = i64::from(today.weekday().num_days_from_monday());
            let monday = today.checked_sub_signed(Duration::days(offset))?;
            first_after(now, monday, |date| date.checked_add_signed(Duration::days(7)), 8)
        }
        FrequencyType::Monthly => {
            let first = today.with_day(1)?;
            first_after(now, first, |date| date.checked_add_months(chrono::Months::new(1)), 8)
        }
        FrequencyType::Yearly => {
            let first = NaiveDate::from_ymd_opt(today.year(), 1, 1)?;
            first_after(now, first, |date| NaiveDate::from_ymd_opt(date.year() + 1, 1, 1), 8)
        }
    }
}

/// 本周期的触发时刻已过则取下一周期
fn first_after(
    now: NaiveDateTime,
    period_start: NaiveDate,
    next_period: impl Fn(NaiveDate) -> Option<NaiveDate>,
    hour: u32,
) -> Option<NaiveDateTime> {
    let fire_time = NaiveTime::from_hms_opt(hour, 0, 0)?;
    let candidate = period_start.and_time(fire_time);
    if candidate > now {
        Some(candidate)
    } else {
        next_period(period_start).map(|date| date.and_time(fire_time))
    }
}

/// 单个计划的运行失败
#[derive(Debug, Clone, Serialize)]
pub struct PlanRunFailure {
    pub plan_id: i64,
    pub message: String,
}

/// 一次分桶运行的汇总
#[derive(Debug, Clone, Serialize)]
pub struct BucketRunReport {
    pub frequency: FrequencyType,
    pub fired_at: NaiveDateTime,
    pub plans_processed: usize,
    pub tasks_created: usize,
    pub devices_skipped: usize,
    pub failures: Vec<PlanRunFailure>,
}

// ==========================================
// MaintenanceScheduler
// ==========================================
pub struct MaintenanceScheduler {
    generator: Arc<TaskGenerator>,
    plan_repo: Arc<PlanRepository>,
    clock: Arc<dyn Clock>,
    settings: MaintenanceSettings,
}

impl MaintenanceScheduler {
    pub fn new(
        generator: Arc<TaskGenerator>,
        plan_repo: Arc<PlanRepository>,
        clock: Arc<dyn Clock>,
        settings: MaintenanceSettings,
    ) -> Self {
        Self {
            generator,
            plan_repo,
            clock,
            settings,
        }
    }

    /// 运行一个分桶：逐个计划生成任务，单个计划失败不影响其余计划
    pub fn run_bucket(&self, bucket: FrequencyType) -> EngineResult<BucketRunReport> {
        let now = self.clock.now();
        let plans = self.plan_repo.list_active_by_frequency(bucket)?;

        let mut report = BucketRunReport {
            frequency: bucket,
            fired_at: now,
            plans_processed: plans.len(),
            tasks_created: 0,
            devices_skipped: 0,
            failures: Vec::new(),
        };

        for plan in &plans {
            // 定时触发总是从当前时间向前推算
            let result = self.generator.due_from(plan, now).and_then(|scheduled_at| {
                self.generator.generate(
                    plan.plan_id,
                    None,
                    Some(scheduled_at),
                    GenerationMode::NonStrict,
                    now,
                )
            });
            match result {
                Ok(outcome) => {
                    report.tasks_created += outcome.created.len();
                    report.devices_skipped += outcome.skipped.len();
                }
                Err(e) => {
                    error!(plan_id = plan.plan_id, error = %e, "定时生成保养任务失败");
                    report.failures.push(PlanRunFailure {
                        plan_id: plan.plan_id,
                        message: e.to_string(),
                    });
                }
            }
        }

        info!(
            frequency = %bucket,
            plans = report.plans_processed,
            created = report.tasks_created,
            skipped = report.devices_skipped,
            failed = report.failures.len(),
            "定时任务运行完成"
        );
        Ok(report)
    }

    /// 为每个频率分桶启动独立的定时器
    ///
    /// 返回各分桶的 JoinHandle，调用方在退出时 abort
    pub fn spawn_bucket_timers(self: &Arc<Self>) -> Vec<JoinHandle<()>> {
        FrequencyType::ALL
            .iter()
            .map(|&bucket| {
                let scheduler = Arc::clone(self);
                tokio::spawn(async move { scheduler.bucket_loop(bucket).await })
            })
            .collect()
    }

    async fn bucket_loop(self: Arc<Self>, bucket: FrequencyType) {
        loop {
            let now = self.clock.now();
            let Some(fire_at) = next_fire_after(bucket, now, &self.settings) else {
                error!(frequency = %bucket, "无法计算下一次触发时间，定时器停止");
                return;
            };
            let wait = (fire_at - now).to_std().unwrap_or_default();
            info!(frequency = %bucket, fire_at = %fire_at, "等待下一次触发");
            tokio::time::sleep(wait).await;

            // 存储层为同步调用，放入阻塞线程池执行
            let scheduler = Arc::clone(&self);
            match tokio::task::spawn_blocking(move || scheduler.run_bucket(bucket)).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => warn!(frequency = %bucket, error = %e, "分桶运行失败"),
                Err(e) => error!(frequency = %bucket, error = %e, "分桶任务异常退出"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[test]
    fn test_shift_fires_at_both_boundaries() {
        let s = MaintenanceSettings::default();
        assert_eq!(next_fire_after(FrequencyType::Shift, dt(2024, 6, 15, 7, 0), &s), Some(dt(2024, 6, 15, 8, 0)));
        assert_eq!(next_fire_after(FrequencyType::Shift, dt(2024, 6, 15, 8, 0), &s), Some(dt(2024, 6, 15, 20, 0)));
        assert_eq!(next_fire_after(FrequencyType::Shift, dt(2024, 6, 15, 21, 0), &s), Some(dt(2024, 6, 16, 8, 0)));
    }

    #[test]
    fn test_daily_fires_at_one_am() {
        let s = MaintenanceSettings::default();
        assert_eq!(next_fire_after(FrequencyType::Daily, dt(2024, 6, 15, 0, 30), &s), Some(dt(2024, 6, 15, 1, 0)));
        assert_eq!(next_fire_after(FrequencyType::Daily, dt(2024, 6, 15, 1, 0), &s), Some(dt(2024, 6, 16, 1, 0)));
    }

    #[test]
    fn test_weekly_fires_on_monday() {
        let s = MaintenanceSettings::default();
        // 2024-06-15 周六 → 2024-06-17 周一
        assert_eq!(next_fire_after(FrequencyType::Weekly, dt(2024, 6, 15, 9, 0), &s), Some(dt(2024, 6, 17, 8, 0)));
        // 周一 07:00 → 当天 08:00
        assert_eq!(next_fire_after(FrequencyType::Weekly, dt(2024, 6, 17, 7, 0), &s), Some(dt(2024, 6, 17, 8, 0)));
    }

    #[test]
    fn test_monthly_and_yearly() {
        let s = MaintenanceSettings::default();
        assert_eq!(next_fire_after(FrequencyType::Monthly, dt(2024, 12, 1, 9, 0), &s), Some(dt(2025, 1, 1, 8, 0)));
        assert_eq!(next_fire_after(FrequencyType::Yearly, dt(2024, 1, 1, 7, 59), &s), Some(dt(2024, 1, 1, 8, 0)));
        assert_eq!(next_fire_after(FrequencyType::Yearly, dt(2024, 6, 15, 9, 0), &s), Some(dt(2025, 1, 1, 8, 0)));
    }
}
