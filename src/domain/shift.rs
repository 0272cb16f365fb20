// ==========================================
// 组套排产系统 - 班次领域模型
// ==========================================
// 不变式: end_time <= start_time 视为跨夜班,
//         真实跨度 = (end_time + 24h) - start_time
// 不变式: 工间休息必须完整落在班次跨度内(含跨夜)
// ==========================================

use crate::domain::time_of_day::{MinuteOfDay, MINUTES_PER_DAY};
use crate::domain::types::DomainError;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ==========================================
// Shift - 班次
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shift {
    pub shift_id: String,                   // 班次ID
    pub name: String,                       // 班次名称 (早班/晚班等)
    pub start_time: MinuteOfDay,            // 上班时刻
    pub end_time: MinuteOfDay,              // 下班时刻 (<=start_time 为跨夜)
    pub break_start: Option<MinuteOfDay>,   // 工间休息开始时刻
    pub break_duration_min: u32,            // 工间休息时长(分钟), 0=无休息
    pub color: Option<String>,              // 展示颜色 (仅前端使用)
    pub is_active: bool,                    // 是否全局启用
    pub created_at: NaiveDateTime,          // 创建时间
    pub updated_at: NaiveDateTime,          // 更新时间
}

impl Shift {
    /// 判断是否为跨夜班
    pub fn is_overnight(&self) -> bool {
        self.end_time <= self.start_time
    }

    /// 班次跨度(分钟), 跨夜时折算 +24h
    pub fn span_minutes(&self) -> u32 {
        if self.is_overnight() {
            u32::from(self.end_time.minutes() + MINUTES_PER_DAY - self.start_time.minutes())
        } else {
            u32::from(self.end_time.minutes() - self.start_time.minutes())
        }
    }

    /// 工间休息相对班次开始的偏移(分钟)
    ///
    /// 跨夜班的休息可能落在午夜之后, 此时 break_start < start_time,
    /// 偏移折算 +24h。无休息配置时返回 None。
    pub fn break_offset_minutes(&self) -> Option<u32> {
        let break_start = self.break_start?;
        if self.break_duration_min == 0 {
            return None;
        }
        let offset = if break_start >= self.start_time {
            u32::from(break_start.minutes() - self.start_time.minutes())
        } else {
            u32::from(break_start.minutes() + MINUTES_PER_DAY - self.start_time.minutes())
        };
        Some(offset)
    }

    /// 校验班次配置
    ///
    /// # 错误
    /// - `DomainError::BreakOutsideShift`: 休息窗口超出班次跨度(含跨夜折算)
    /// - `DomainError::FieldValueError`: 名称为空 / 零跨度且非跨夜等
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.name.trim().is_empty() {
            return Err(DomainError::FieldValueError {
                field: "name".to_string(),
                message: "班次名称不能为空".to_string(),
            });
        }

        if let Some(offset) = self.break_offset_minutes() {
            if offset + self.break_duration_min > self.span_minutes() {
                return Err(DomainError::BreakOutsideShift {
                    shift_id: self.shift_id.clone(),
                    break_start: self
                        .break_start
                        .map(|b| b.to_string())
                        .unwrap_or_default(),
                    break_minutes: self.break_duration_min,
                });
            }
        }

        Ok(())
    }
}
