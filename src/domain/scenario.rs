// ==========================================
// 组套排产系统 - 情景(What-If)领域模型
// ==========================================
// 红线: 情景只存变更日志, 从不存物化后的作业状态
// 红线: 变更行只追加不修改; changeData 为累积式部分字段,
//       按创建顺序重放时同字段后写覆盖先写
// ==========================================

use crate::domain::job::{Job, RouteStep};
use crate::domain::time_of_day::MinuteOfDay;
use crate::domain::types::{ChangeOperation, JobStatus};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeSet;

// ==========================================
// Scenario - 情景
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub scenario_id: String,           // 情景ID
    pub name: String,                  // 情景名称
    pub description: Option<String>,   // 描述
    pub is_active: bool,               // 是否在前端展示叠加层
    pub created_at: NaiveDateTime,     // 创建时间
    pub updated_at: NaiveDateTime,     // 更新时间
}

// ==========================================
// ScenarioChange - 情景变更行
// ==========================================
// 重放顺序: (created_at, seq_no) 升序
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioChange {
    pub change_id: String,             // 变更ID
    pub scenario_id: String,           // 所属情景
    pub job_id: Option<String>,        // 目标作业 (ADD 时为 None)
    pub operation: ChangeOperation,    // 操作类型
    pub change_data: ChangeData,       // 累积式部分字段
    pub original_data: Option<JsonValue>, // 变更前快照 (审计/回滚用)
    pub seq_no: i64,                   // 追加序号 (同一时间戳内保序)
    pub created_at: NaiveDateTime,     // 创建时间
}

// ==========================================
// ChangeData - 累积式部分作业字段
// ==========================================
// 全部字段可缺省; 序列化时省略 None, 与前端提交格式一致
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,        // ADD 时指定新作业ID (可缺省)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ordered_quantity: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub station_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_kit_duration_s: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_job_duration_s: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub setup_s: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub make_ready_s: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub take_down_s: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route_steps: Option<Vec<RouteStep>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_shift_ids: Option<BTreeSet<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_weekends: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_start_time: Option<MinuteOfDay>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<JobStatus>,
}

impl ChangeData {
    /// 将已提供的字段覆盖到目标作业上
    ///
    /// 注意: 工位数变更引起的时长重算由 ScenarioEngine 在调用本方法
    /// 之前完成; 此处 expected_job_duration_s 仅在显式提供时覆盖。
    pub fn merge_onto(&self, job: &mut Job) {
        if let Some(v) = &self.job_number {
            job.job_number = v.clone();
        }
        if let Some(v) = &self.customer_name {
            job.customer_name = Some(v.clone());
        }
        if let Some(v) = self.ordered_quantity {
            job.ordered_quantity = v;
        }
        if let Some(v) = self.station_count {
            job.station_count = v;
        }
        if let Some(v) = self.expected_kit_duration_s {
            job.expected_kit_duration_s = v;
        }
        if let Some(v) = self.expected_job_duration_s {
            job.expected_job_duration_s = v;
        }
        if let Some(v) = self.setup_s {
            job.setup_s = v;
        }
        if let Some(v) = self.make_ready_s {
            job.make_ready_s = v;
        }
        if let Some(v) = self.take_down_s {
            job.take_down_s = v;
        }
        if let Some(v) = &self.route_steps {
            job.route_steps = v.clone();
        }
        if let Some(v) = &self.allowed_shift_ids {
            job.allowed_shift_ids = v.clone();
        }
        if let Some(v) = self.include_weekends {
            job.include_weekends = v;
        }
        if let Some(v) = self.scheduled_date {
            job.scheduled_date = Some(v);
        }
        if let Some(v) = self.scheduled_start_time {
            job.scheduled_start_time = Some(v);
        }
        if let Some(v) = self.status {
            job.status = v;
        }
    }

    /// 由 ADD 变更构造新作业
    ///
    /// # 参数
    /// - `job_id`: 新作业ID (changeData 未指定时由调用方生成)
    /// - `now`: 时间戳
    ///
    /// # 返回
    /// - `Err(String)`: 缺少必要字段 (作业单号), 由调用方记入跳过清单
    pub fn build_job(&self, job_id: String, now: NaiveDateTime) -> Result<Job, String> {
        let job_number = self
            .job_number
            .clone()
            .ok_or_else(|| "ADD 变更缺少 job_number".to_string())?;

        let mut job = Job {
            job_id,
            job_number,
            customer_name: None,
            ordered_quantity: 0,
            station_count: 1,
            expected_kit_duration_s: 0,
            expected_job_duration_s: 0,
            setup_s: 0,
            make_ready_s: 0,
            take_down_s: 0,
            route_steps: Vec::new(),
            allowed_shift_ids: BTreeSet::new(),
            include_weekends: false,
            scheduled_date: None,
            scheduled_start_time: None,
            status: JobStatus::Pending,
            scenario_id: None,
            scenario_name: None,
            scenario_deleted: false,
            created_at: now,
            updated_at: now,
        };
        self.merge_onto(&mut job);
        Ok(job)
    }
}

// ==========================================
// 测试模块
// ==========================================
#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 2)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_merge_onto_overrides_only_present_fields() {
        let data = ChangeData {
            station_count: Some(4),
            customer_name: Some("新客户".to_string()),
            ..ChangeData::default()
        };
        let err = data
            .clone()
            .build_job("J1".to_string(), now())
            .unwrap_err(); // 缺 job_number
        assert!(err.contains("job_number"));

        let full = ChangeData {
            job_number: Some("KIT-001".to_string()),
            ..data
        };
        let mut built = full.build_job("J1".to_string(), now()).unwrap();
        assert_eq!(built.station_count, 4);
        assert_eq!(built.customer_name.as_deref(), Some("新客户"));

        // 再次合并: 仅覆盖提供的字段
        let patch = ChangeData {
            ordered_quantity: Some(50),
            ..ChangeData::default()
        };
        patch.merge_onto(&mut built);
        assert_eq!(built.ordered_quantity, 50);
        assert_eq!(built.station_count, 4); // 未提供, 保持
    }

    #[test]
    fn test_change_data_serde_omits_none() {
        let data = ChangeData {
            station_count: Some(3),
            ..ChangeData::default()
        };
        let json = serde_json::to_string(&data).unwrap();
        assert_eq!(json, r#"{"station_count":3}"#);
    }

    #[test]
    fn test_change_data_partial_deserialize() {
        let data: ChangeData =
            serde_json::from_str(r#"{"scheduled_start_time":"09:30","include_weekends":true}"#)
                .unwrap();
        assert_eq!(
            data.scheduled_start_time,
            Some(MinuteOfDay::parse("09:30").unwrap())
        );
        assert_eq!(data.include_weekends, Some(true));
        assert!(data.station_count.is_none());
    }
}
