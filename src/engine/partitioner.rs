// ==========================================
// 组套排产系统 - 跨日分段引擎
// ==========================================
// 职责: 把 [开工, 完工] 区间切成逐日日历分段, 供前端按天渲染
// 口径: 跨夜当日收盘显示 23:59; 无窗口日期 (周末/停产) 不产生分段
// ==========================================

use crate::domain::shift::Shift;
use crate::engine::calendar::ShiftCalendar;
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

// ==========================================
// DaySegment - 单日分段
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaySegment {
    pub date: NaiveDate,         // 日历日期
    pub start_time: NaiveTime,   // 当日分段开始
    pub end_time: NaiveTime,     // 当日分段结束
}

// ==========================================
// DayPartitioner - 跨日分段器
// ==========================================
#[derive(Debug, Default)]
pub struct DayPartitioner {
    calendar: ShiftCalendar,
}

impl DayPartitioner {
    /// 构造函数
    pub fn new() -> Self {
        Self {
            calendar: ShiftCalendar::new(),
        }
    }

    /// 把排程区间切成逐日分段
    ///
    /// # 参数
    /// - `start` / `end`: 排程器给出的开工/完工时刻
    /// - `eligible`: 已过滤的可用班次 (空 = 朴素全天窗口)
    /// - `include_weekends`: 是否允许周末分段
    ///
    /// # 返回
    /// 按日期升序的分段列表; `end <= start` 时为空
    pub fn partition(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
        eligible: &[Shift],
        include_weekends: bool,
    ) -> Vec<DaySegment> {
        if end <= start {
            return Vec::new();
        }

        // 同日: 单段, 直接取两端时刻
        if start.date() == end.date() {
            return vec![DaySegment {
                date: start.date(),
                start_time: start.time(),
                end_time: end.time(),
            }];
        }

        let mut segments = Vec::new();
        let mut date = start.date();
        while date <= end.date() {
            let window = self.calendar.day_window(date, eligible, include_weekends);
            if let Some((open, close)) = window {
                let seg_start = if date == start.date() {
                    start.time()
                } else {
                    open
                };
                let seg_end = if date == end.date() { end.time() } else { close };
                // 退化分段 (如首日开工晚于当日收盘) 不输出
                if seg_end > seg_start {
                    segments.push(DaySegment {
                        date,
                        start_time: seg_start,
                        end_time: seg_end,
                    });
                }
            }
            date += Duration::days(1);
        }
        segments
    }
}
