// ==========================================
// 组套排产系统 - 分钟制时刻值类型
// ==========================================
// 职责: 统一"HH:MM"字符串与分钟制时刻的转换
// 红线: 非法时间字符串必须在边界拒绝,不得静默兜底
// ==========================================

use crate::domain::types::DomainError;
use chrono::NaiveTime;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// 一天内的分钟数上限
pub const MINUTES_PER_DAY: u16 = 1440;

// ==========================================
// MinuteOfDay - 分钟制时刻 (00:00-23:59)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MinuteOfDay(u16);

impl MinuteOfDay {
    /// 从分钟数构造 (0..=1439)
    pub fn from_minutes(minutes: u16) -> Result<Self, DomainError> {
        if minutes >= MINUTES_PER_DAY {
            return Err(DomainError::InvalidTimeFormat {
                raw: format!("minute_of_day={}", minutes),
            });
        }
        Ok(Self(minutes))
    }

    /// 从时分构造
    pub fn from_hm(hour: u16, minute: u16) -> Result<Self, DomainError> {
        if hour >= 24 || minute >= 60 {
            return Err(DomainError::InvalidTimeFormat {
                raw: format!("{:02}:{:02}", hour, minute),
            });
        }
        Ok(Self(hour * 60 + minute))
    }

    /// 严格解析 "HH:MM" 字符串
    ///
    /// # 参数
    /// - `raw`: 形如 "08:30" 的时刻字符串
    ///
    /// # 返回
    /// - `Ok(MinuteOfDay)`: 解析成功
    /// - `Err(DomainError::InvalidTimeFormat)`: 格式非法
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let invalid = || DomainError::InvalidTimeFormat {
            raw: raw.to_string(),
        };

        let (h, m) = raw.split_once(':').ok_or_else(invalid)?;
        // 拒绝 "8:30" / "08:3" 这类宽松写法,与持久化格式保持一致
        if h.len() != 2 || m.len() != 2 {
            return Err(invalid());
        }

        let hour: u16 = h.parse().map_err(|_| invalid())?;
        let minute: u16 = m.parse().map_err(|_| invalid())?;
        Self::from_hm(hour, minute).map_err(|_| invalid())
    }

    /// 分钟数 (0..=1439)
    pub fn minutes(&self) -> u16 {
        self.0
    }

    /// 秒数 (用于排程的秒级推进)
    pub fn seconds(&self) -> i64 {
        i64::from(self.0) * 60
    }

    /// 小时部分
    pub fn hour(&self) -> u16 {
        self.0 / 60
    }

    /// 分钟部分
    pub fn minute(&self) -> u16 {
        self.0 % 60
    }

    /// 转换为 chrono::NaiveTime
    pub fn to_naive_time(&self) -> NaiveTime {
        // 0..=1439 范围内构造必然成功
        NaiveTime::from_hms_opt(u32::from(self.hour()), u32::from(self.minute()), 0)
            .unwrap_or(NaiveTime::MIN)
    }
}

impl fmt::Display for MinuteOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

impl FromStr for MinuteOfDay {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// ==========================================
// Serde 实现 - 以 "HH:MM" 字符串收发
// ==========================================
impl Serialize for MinuteOfDay {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for MinuteOfDay {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        MinuteOfDay::parse(&raw).map_err(serde::de::Error::custom)
    }
}
