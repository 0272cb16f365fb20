// ==========================================
// 组套排产系统 - 组套作业领域模型
// ==========================================
// 不变式: expected_job_duration_s 非负, 是排程消耗
//         生产时间的唯一依据 (route_steps 仅用于延误锚定)
// ==========================================

use crate::domain::time_of_day::MinuteOfDay;
use crate::domain::types::{DomainError, JobStatus};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ==========================================
// RouteStep - 工艺路线步骤
// ==========================================
// 用途: 延误插入点锚定与前端步骤展示, 不参与排程算术
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteStep {
    pub name: String,          // 步骤名称
    pub expected_seconds: i64, // 预计耗时(秒)
    pub order: i32,            // 步骤序号 (延误 insert_after 对齐此序号)
}

// ==========================================
// Job - 组套作业
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    // ===== 主键与标识 =====
    pub job_id: String,                        // 作业ID
    pub job_number: String,                    // 作业单号
    pub customer_name: Option<String>,         // 客户名称

    // ===== 工艺参数 =====
    pub ordered_quantity: i64,                 // 订购套数
    pub station_count: i64,                    // 并行组套工位数 (>=1)
    pub expected_kit_duration_s: i64,          // 单套预计耗时(秒)
    pub expected_job_duration_s: i64,          // 作业名义总时长(秒)
    pub setup_s: i64,                          // 产前准备(秒)
    pub make_ready_s: i64,                     // 调机(秒)
    pub take_down_s: i64,                      // 收尾(秒)
    pub route_steps: Vec<RouteStep>,           // 工艺路线

    // ===== 排程约束 =====
    pub allowed_shift_ids: BTreeSet<String>,   // 可用班次集合, 空=全局启用班次
    pub include_weekends: bool,                // 是否允许周末排程
    pub scheduled_date: Option<NaiveDate>,     // 排程起始日期
    pub scheduled_start_time: Option<MinuteOfDay>, // 排程起始时刻
    pub status: JobStatus,                     // 作业状态

    // ===== 情景叠加标记 =====
    // 基线作业三项均为 None/false; 被情景触达的作业打上情景标记
    pub scenario_id: Option<String>,           // 所属情景ID
    pub scenario_name: Option<String>,         // 所属情景名称 (展示用)
    pub scenario_deleted: bool,                // 情景内软删除 (前端置灰)

    // ===== 时间戳 =====
    pub created_at: NaiveDateTime,             // 创建时间
    pub updated_at: NaiveDateTime,             // 更新时间
}

impl Job {
    /// 固定开销(秒): 产前准备 + 调机 + 收尾, 与工位数无关
    pub fn fixed_overhead_s(&self) -> i64 {
        self.setup_s + self.make_ready_s + self.take_down_s
    }

    /// 排程起始时刻 (日期+时刻均配置时才可排程)
    pub fn scheduled_start(&self) -> Option<NaiveDateTime> {
        let date = self.scheduled_date?;
        let time = self.scheduled_start_time?;
        Some(date.and_time(time.to_naive_time()))
    }

    /// 校验作业配置
    ///
    /// # 错误
    /// - `DomainError::InvalidDuration`: 名义总时长为负
    /// - `DomainError::InvalidStationCount`: 工位数 < 1
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.expected_job_duration_s < 0 {
            return Err(DomainError::InvalidDuration {
                field: "expected_job_duration_s".to_string(),
                value: self.expected_job_duration_s,
                requirement: ">= 0".to_string(),
            });
        }
        if self.station_count < 1 {
            return Err(DomainError::InvalidStationCount {
                value: self.station_count,
            });
        }
        if self.job_number.trim().is_empty() {
            return Err(DomainError::FieldValueError {
                field: "job_number".to_string(),
                message: "作业单号不能为空".to_string(),
            });
        }
        Ok(())
    }
}

// ==========================================
// 测试模块
// ==========================================
#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_job() -> Job {
        let now = NaiveDate::from_ymd_opt(2026, 3, 2)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        Job {
            job_id: "J001".to_string(),
            job_number: "KIT-2026-001".to_string(),
            customer_name: Some("测试客户".to_string()),
            ordered_quantity: 100,
            station_count: 2,
            expected_kit_duration_s: 120,
            expected_job_duration_s: 9000,
            setup_s: 1800,
            make_ready_s: 600,
            take_down_s: 600,
            route_steps: vec![RouteStep {
                name: "拣料".to_string(),
                expected_seconds: 3000,
                order: 1,
            }],
            allowed_shift_ids: BTreeSet::new(),
            include_weekends: false,
            scheduled_date: NaiveDate::from_ymd_opt(2026, 3, 2),
            scheduled_start_time: Some(MinuteOfDay::parse("08:00").unwrap()),
            status: JobStatus::Pending,
            scenario_id: None,
            scenario_name: None,
            scenario_deleted: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_fixed_overhead() {
        let job = create_test_job();
        assert_eq!(job.fixed_overhead_s(), 3000);
    }

    #[test]
    fn test_scheduled_start() {
        let job = create_test_job();
        assert_eq!(
            job.scheduled_start(),
            Some(
                NaiveDate::from_ymd_opt(2026, 3, 2)
                    .unwrap()
                    .and_hms_opt(8, 0, 0)
                    .unwrap()
            )
        );

        let mut unscheduled = create_test_job();
        unscheduled.scheduled_date = None;
        assert_eq!(unscheduled.scheduled_start(), None);
    }

    #[test]
    fn test_validate_rejects_negative_duration() {
        let mut job = create_test_job();
        job.expected_job_duration_s = -1;
        assert!(matches!(
            job.validate(),
            Err(DomainError::InvalidDuration { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_zero_stations() {
        let mut job = create_test_job();
        job.station_count = 0;
        assert!(matches!(
            job.validate(),
            Err(DomainError::InvalidStationCount { .. })
        ));
    }

    #[test]
    fn test_clone_is_deep() {
        // 深拷贝校验: 修改克隆体的嵌套字段不得影响原对象
        let job = create_test_job();
        let mut cloned = job.clone();
        cloned.route_steps[0].name = "改名".to_string();
        cloned.allowed_shift_ids.insert("S9".to_string());
        assert_eq!(job.route_steps[0].name, "拣料");
        assert!(job.allowed_shift_ids.is_empty());
    }
}
