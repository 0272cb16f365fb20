// ==========================================
// 组套排产系统 - 前向排程引擎
// ==========================================
// 职责: 从起始时刻逐窗口消耗作业时长, 计算预计完工时刻
// 红线: 未配置任何班次 = 朴素 24/7 排程并记 warn 日志;
//       可用班次集合为空 = 排程失败, 二者语义不同
// ==========================================

use crate::domain::shift::Shift;
use crate::engine::calendar::ShiftCalendar;
use crate::engine::error::{EngineError, EngineResult};
use chrono::{Duration, NaiveDateTime};
use std::collections::BTreeSet;
use tracing::{instrument, warn};

/// 向后搜索生产窗口的默认日数上限
pub const DEFAULT_MAX_SEARCH_DAYS: i64 = 400;

// ==========================================
// ForwardScheduler - 前向排程器
// ==========================================
#[derive(Debug)]
pub struct ForwardScheduler {
    calendar: ShiftCalendar,
    max_search_days: i64,
}

impl Default for ForwardScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SEARCH_DAYS)
    }
}

impl ForwardScheduler {
    /// 构造函数
    ///
    /// # 参数
    /// - `max_search_days`: 窗口搜索日数上限 (非正值回退到默认值)
    pub fn new(max_search_days: i64) -> Self {
        let max_search_days = if max_search_days > 0 {
            max_search_days
        } else {
            DEFAULT_MAX_SEARCH_DAYS
        };
        Self {
            calendar: ShiftCalendar::new(),
            max_search_days,
        }
    }

    /// 解析作业的可用班次集合
    ///
    /// 口径: 先按 allowed_shift_ids 过滤 (空集合 = 不限),
    /// 再按启用标记过滤 (ignore_active_flag 时跳过, 供情景推演用)
    pub fn resolve_eligible(
        all_shifts: &[Shift],
        allowed_shift_ids: &BTreeSet<String>,
        ignore_active_flag: bool,
    ) -> Vec<Shift> {
        all_shifts
            .iter()
            .filter(|s| allowed_shift_ids.is_empty() || allowed_shift_ids.contains(&s.shift_id))
            .filter(|s| ignore_active_flag || s.is_active)
            .cloned()
            .collect()
    }

    /// 前向排程: 计算预计完工时刻
    ///
    /// # 参数
    /// - `start`: 排程起始时刻
    /// - `duration_s`: 待消耗的生产时长(秒), 含延误
    /// - `all_shifts`: 全部班次快照
    /// - `allowed_shift_ids`: 作业可用班次集合, 空=不限
    /// - `include_weekends`: 是否允许周末排程
    /// - `ignore_active_flag`: 是否忽略班次启用标记
    ///
    /// # 返回
    /// - `Ok(end)`: 预计完工时刻
    /// - `Err(InvalidInput)`: 时长为负
    /// - `Err(NoEligibleShifts)`: 可用集合为空或上限内无窗口
    #[instrument(skip(self, all_shifts), fields(duration_s = duration_s, shift_count = all_shifts.len()))]
    pub fn schedule_forward(
        &self,
        start: NaiveDateTime,
        duration_s: i64,
        all_shifts: &[Shift],
        allowed_shift_ids: &BTreeSet<String>,
        include_weekends: bool,
        ignore_active_flag: bool,
    ) -> EngineResult<NaiveDateTime> {
        if duration_s < 0 {
            return Err(EngineError::InvalidInput(format!(
                "生产时长不能为负: {}",
                duration_s
            )));
        }

        // 系统未配置任何班次: 退化为 24/7 朴素排程
        if all_shifts.is_empty() {
            warn!("系统未配置任何班次, 退化为朴素排程 (不扣除非生产时间)");
            return Ok(start + Duration::seconds(duration_s));
        }

        let eligible = Self::resolve_eligible(all_shifts, allowed_shift_ids, ignore_active_flag);
        if eligible.is_empty() {
            return Err(EngineError::NoEligibleShifts {
                searched_days: 0,
            });
        }

        let mut cursor = start;
        let mut remaining = duration_s;
        let bound = start + Duration::days(self.max_search_days);

        while remaining > 0 {
            if cursor >= bound {
                return Err(EngineError::NoEligibleShifts {
                    searched_days: self.max_search_days,
                });
            }
            let (window_start, window_end) = self
                .calendar
                .next_productive_window(cursor, &eligible, include_weekends, self.max_search_days)
                .ok_or(EngineError::NoEligibleShifts {
                    searched_days: self.max_search_days,
                })?;

            let capacity = (window_end - window_start).num_seconds();
            if remaining <= capacity {
                return Ok(window_start + Duration::seconds(remaining));
            }
            remaining -= capacity;
            cursor = window_end;
        }

        // duration_s == 0: 起始即完工
        Ok(start)
    }
}

// ==========================================
// 测试模块
// ==========================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::time_of_day::MinuteOfDay;
    use chrono::NaiveDate;

    fn create_test_shift(id: &str, start: &str, end: &str) -> Shift {
        let now = NaiveDate::from_ymd_opt(2026, 3, 2)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        Shift {
            shift_id: id.to_string(),
            name: format!("班次{}", id),
            start_time: MinuteOfDay::parse(start).unwrap(),
            end_time: MinuteOfDay::parse(end).unwrap(),
            break_start: None,
            break_duration_min: 0,
            color: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn dt(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    fn no_allowed() -> BTreeSet<String> {
        BTreeSet::new()
    }

    #[test]
    fn test_within_single_shift() {
        // 周一 08:00 起 2 小时, 班次 08:00-17:00
        let scheduler = ForwardScheduler::default();
        let shifts = vec![create_test_shift("S1", "08:00", "17:00")];
        let end = scheduler
            .schedule_forward(dt(2026, 3, 2, 8, 0), 7200, &shifts, &no_allowed(), false, false)
            .unwrap();
        assert_eq!(end, dt(2026, 3, 2, 10, 0));
    }

    #[test]
    fn test_spills_into_next_day() {
        // 周一 15:00 起 4 小时, 班次 08:00-17:00:
        // 当日消耗 2h, 余 2h 次日 08:00 起 -> 10:00
        let scheduler = ForwardScheduler::default();
        let shifts = vec![create_test_shift("S1", "08:00", "17:00")];
        let end = scheduler
            .schedule_forward(dt(2026, 3, 2, 15, 0), 14400, &shifts, &no_allowed(), false, false)
            .unwrap();
        assert_eq!(end, dt(2026, 3, 3, 10, 0));
    }

    #[test]
    fn test_overnight_shift_crosses_midnight() {
        // 跨夜班 22:00-06:00, 周一 23:00 起 3 小时 -> 周二 02:00
        let scheduler = ForwardScheduler::default();
        let shifts = vec![create_test_shift("N1", "22:00", "06:00")];
        let end = scheduler
            .schedule_forward(dt(2026, 3, 2, 23, 0), 10800, &shifts, &no_allowed(), false, false)
            .unwrap();
        assert_eq!(end, dt(2026, 3, 3, 2, 0));
    }

    #[test]
    fn test_weekend_exclusion_adds_skipped_days() {
        // 周五(3/6) 15:00 起 4 小时: 余 2h 跳过周末, 周一 10:00 完工
        let scheduler = ForwardScheduler::default();
        let shifts = vec![create_test_shift("S1", "08:00", "17:00")];
        let excluded = scheduler
            .schedule_forward(dt(2026, 3, 6, 15, 0), 14400, &shifts, &no_allowed(), false, false)
            .unwrap();
        assert_eq!(excluded, dt(2026, 3, 9, 10, 0));

        // 允许周末: 周六 10:00 完工, 恰好差整数个跳过日
        let included = scheduler
            .schedule_forward(dt(2026, 3, 6, 15, 0), 14400, &shifts, &no_allowed(), true, false)
            .unwrap();
        assert_eq!(included, dt(2026, 3, 7, 10, 0));
        assert_eq!((excluded - included).num_days(), 2);
    }

    #[test]
    fn test_naive_fallback_without_shifts() {
        // 未配置任何班次: start + duration, 不扣非生产时间
        let scheduler = ForwardScheduler::default();
        let end = scheduler
            .schedule_forward(dt(2026, 3, 6, 15, 0), 100_000, &[], &no_allowed(), false, false)
            .unwrap();
        assert_eq!(end, dt(2026, 3, 6, 15, 0) + Duration::seconds(100_000));
    }

    #[test]
    fn test_empty_eligible_set_fails() {
        // 仅有停用班次且不忽略启用标记: 排程失败
        let scheduler = ForwardScheduler::default();
        let mut shift = create_test_shift("S1", "08:00", "17:00");
        shift.is_active = false;
        let result = scheduler.schedule_forward(
            dt(2026, 3, 2, 8, 0),
            3600,
            &[shift.clone()],
            &no_allowed(),
            false,
            false,
        );
        assert!(matches!(result, Err(EngineError::NoEligibleShifts { .. })));

        // 忽略启用标记 (情景推演口径): 可排程
        let end = scheduler
            .schedule_forward(dt(2026, 3, 2, 8, 0), 3600, &[shift], &no_allowed(), false, true)
            .unwrap();
        assert_eq!(end, dt(2026, 3, 2, 9, 0));
    }

    #[test]
    fn test_allowed_set_filters_shifts() {
        let scheduler = ForwardScheduler::default();
        let shifts = vec![
            create_test_shift("S1", "08:00", "12:00"),
            create_test_shift("S2", "14:00", "18:00"),
        ];
        let mut allowed = BTreeSet::new();
        allowed.insert("S2".to_string());
        // 仅允许下午班: 08:00 的查询落到 14:00 开工
        let end = scheduler
            .schedule_forward(dt(2026, 3, 2, 8, 0), 3600, &shifts, &allowed, false, false)
            .unwrap();
        assert_eq!(end, dt(2026, 3, 2, 15, 0));
    }

    #[test]
    fn test_dangling_allowed_id_fails() {
        let scheduler = ForwardScheduler::default();
        let shifts = vec![create_test_shift("S1", "08:00", "17:00")];
        let mut allowed = BTreeSet::new();
        allowed.insert("GHOST".to_string());
        let result =
            scheduler.schedule_forward(dt(2026, 3, 2, 8, 0), 3600, &shifts, &allowed, false, false);
        assert!(matches!(result, Err(EngineError::NoEligibleShifts { .. })));
    }

    #[test]
    fn test_negative_duration_rejected() {
        let scheduler = ForwardScheduler::default();
        let shifts = vec![create_test_shift("S1", "08:00", "17:00")];
        let result =
            scheduler.schedule_forward(dt(2026, 3, 2, 8, 0), -1, &shifts, &no_allowed(), false, false);
        assert!(matches!(result, Err(EngineError::InvalidInput(_))));
    }

    #[test]
    fn test_zero_duration_is_start() {
        let scheduler = ForwardScheduler::default();
        let shifts = vec![create_test_shift("S1", "08:00", "17:00")];
        let end = scheduler
            .schedule_forward(dt(2026, 3, 2, 10, 30), 0, &shifts, &no_allowed(), false, false)
            .unwrap();
        assert_eq!(end, dt(2026, 3, 2, 10, 30));
    }

    #[test]
    fn test_search_bound_is_finite() {
        // 日数上限很小且周末排除: 大时长作业必须报错而非死循环
        let scheduler = ForwardScheduler::new(3);
        let shifts = vec![create_test_shift("S1", "08:00", "09:00")];
        let result = scheduler.schedule_forward(
            dt(2026, 3, 2, 8, 0),
            3600 * 100,
            &shifts,
            &no_allowed(),
            false,
            false,
        );
        assert!(matches!(
            result,
            Err(EngineError::NoEligibleShifts { searched_days: 3 })
        ));
    }

    #[test]
    fn test_partial_day_ends_mid_shift_second_precision() {
        // 12045 秒 = 3h20m45s, 周一 08:00 起, 班次 08:00-17:00 -> 11:20:45
        let scheduler = ForwardScheduler::default();
        let shifts = vec![create_test_shift("S1", "08:00", "17:00")];
        let end = scheduler
            .schedule_forward(dt(2026, 3, 2, 8, 0), 12045, &shifts, &no_allowed(), false, false)
            .unwrap();
        assert_eq!(
            end,
            NaiveDate::from_ymd_opt(2026, 3, 2)
                .unwrap()
                .and_hms_opt(11, 20, 45)
                .unwrap()
        );
    }
}
