// ==========================================
// 组套排产系统 - 班次日历引擎
// ==========================================
// 职责: 班次窗口几何 - 生产分钟数 / 下一生产窗口 / 单日展示窗口
// 口径: 班次实例锚定在"开始日期"; 跨夜班锚定周五则合法
//       延伸到周六凌晨 (排除周末 = 排除周末锚定的实例)
// ==========================================

use crate::domain::shift::Shift;
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};

/// 单日展示窗口的收盘标记 (跨夜班当日未收班时显示到 23:59)
pub const DAY_END: NaiveTime = match NaiveTime::from_hms_opt(23, 59, 0) {
    Some(t) => t,
    None => panic!("invalid DAY_END"),
};

// ==========================================
// ShiftCalendar - 班次日历
// ==========================================
// 无状态引擎, 所有班次数据由调用方以快照传入
#[derive(Debug, Default)]
pub struct ShiftCalendar;

impl ShiftCalendar {
    /// 构造函数
    pub fn new() -> Self {
        Self
    }

    /// 判断日期是否为周末
    pub fn is_weekend(date: NaiveDate) -> bool {
        matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
    }

    /// 班次单日生产分钟数: 跨度(含跨夜折算)减去工间休息
    pub fn productive_minutes(&self, shift: &Shift) -> u32 {
        let span = shift.span_minutes();
        match shift.break_offset_minutes() {
            Some(_) => span.saturating_sub(shift.break_duration_min),
            None => span,
        }
    }

    /// 锚定某日期的班次实例的生产区间 (已剔除工间休息)
    ///
    /// 跨夜班的区间自然延伸到次日; 有休息时拆成最多两段。
    fn instance_intervals(
        &self,
        shift: &Shift,
        anchor: NaiveDate,
    ) -> Vec<(NaiveDateTime, NaiveDateTime)> {
        let shift_start = anchor.and_time(shift.start_time.to_naive_time());
        let shift_end = shift_start + Duration::minutes(i64::from(shift.span_minutes()));

        match shift.break_offset_minutes() {
            None => {
                if shift_end > shift_start {
                    vec![(shift_start, shift_end)]
                } else {
                    vec![]
                }
            }
            Some(offset) => {
                let break_start = shift_start + Duration::minutes(i64::from(offset));
                let break_end =
                    break_start + Duration::minutes(i64::from(shift.break_duration_min));
                let mut intervals = Vec::with_capacity(2);
                if break_start > shift_start {
                    intervals.push((shift_start, break_start));
                }
                if shift_end > break_end {
                    intervals.push((break_end, shift_end));
                }
                intervals
            }
        }
    }

    /// 寻找 pointer 之后最早的生产窗口
    ///
    /// # 参数
    /// - `pointer`: 搜索起点
    /// - `eligible`: 已按资格过滤的班次集合
    /// - `include_weekends`: 是否允许周末锚定的实例
    /// - `max_days`: 向后搜索的日数上限
    ///
    /// # 返回
    /// - `Some((window_start, window_end))`: 连续生产区间,
    ///   window_start = max(pointer, 区间开始)
    /// - `None`: 上限内无窗口 (调用方映射为无可用班次错误)
    pub fn next_productive_window(
        &self,
        pointer: NaiveDateTime,
        eligible: &[Shift],
        include_weekends: bool,
        max_days: i64,
    ) -> Option<(NaiveDateTime, NaiveDateTime)> {
        if eligible.is_empty() {
            return None;
        }

        let mut best: Option<(NaiveDateTime, NaiveDateTime)> = None;
        let mut found_offset: Option<i64> = None;

        // 从前一天开始扫描: 跨夜实例可能在 pointer 当日凌晨仍开放
        for offset in -1..=max_days {
            // 找到候选后再多看一天即可: 更晚锚定的实例不可能更早开始
            if let Some(fo) = found_offset {
                if offset > fo + 1 {
                    break;
                }
            }

            let anchor = pointer.date() + Duration::days(offset);
            if !include_weekends && Self::is_weekend(anchor) {
                continue;
            }

            for shift in eligible {
                for (start, end) in self.instance_intervals(shift, anchor) {
                    if end <= pointer {
                        continue;
                    }
                    let window_start = start.max(pointer);
                    if window_start >= end {
                        continue;
                    }
                    let candidate = (window_start, end);
                    let better = match best {
                        None => true,
                        Some(b) => candidate < b,
                    };
                    if better {
                        best = Some(candidate);
                    }
                }
            }

            if best.is_some() && found_offset.is_none() {
                found_offset = Some(offset);
            }
        }

        best
    }

    /// 计算某日期的展示窗口 (用于日历分段)
    ///
    /// 口径:
    /// - 锚定当日的实例贡献 [start, end] (跨夜实例贡献 [start, 23:59])
    /// - 前一日跨夜实例的凌晨延伸贡献 [00:00, end]
    /// - 多班次取并集外沿 (min开盘, max收盘)
    /// - 可用班次为空 = 朴素模式, 全天窗口
    pub fn day_window(
        &self,
        date: NaiveDate,
        eligible: &[Shift],
        include_weekends: bool,
    ) -> Option<(NaiveTime, NaiveTime)> {
        if eligible.is_empty() {
            return Some((NaiveTime::MIN, DAY_END));
        }

        let mut open: Option<NaiveTime> = None;
        let mut close: Option<NaiveTime> = None;
        let mut merge = |s: NaiveTime, e: NaiveTime| {
            open = Some(open.map_or(s, |o| o.min(s)));
            close = Some(close.map_or(e, |c| c.max(e)));
        };

        // 锚定当日的实例
        if include_weekends || !Self::is_weekend(date) {
            for shift in eligible {
                let start = shift.start_time.to_naive_time();
                if shift.is_overnight() {
                    merge(start, DAY_END);
                } else {
                    merge(start, shift.end_time.to_naive_time());
                }
            }
        }

        // 前一日跨夜实例的凌晨延伸
        let prev = date - Duration::days(1);
        if include_weekends || !Self::is_weekend(prev) {
            for shift in eligible {
                if shift.is_overnight() && shift.end_time.minutes() > 0 {
                    merge(NaiveTime::MIN, shift.end_time.to_naive_time());
                }
            }
        }

        match (open, close) {
            (Some(o), Some(c)) if c > o => Some((o, c)),
            _ => None,
        }
    }
}
