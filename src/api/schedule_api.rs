// ==========================================
// 组套排产系统 - 排程 API
// ==========================================
// 职责: 装载数据 -> 注入延误 -> 前向排程 -> 跨日分段
// 红线: API 层只编排, 排程算术全部在引擎层
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::ConfigManager;
use crate::domain::delay::Delay;
use crate::domain::job::Job;
use crate::domain::shift::Shift;
use crate::engine::duration::DurationEngine;
use crate::engine::partitioner::{DayPartitioner, DaySegment};
use crate::engine::scheduler::ForwardScheduler;
use crate::repository::{DelayRepository, JobRepository, ShiftRepository};
use chrono::{Local, NaiveDateTime};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tracing::instrument;
use uuid::Uuid;

// ==========================================
// ScheduledSpan - 排程结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledSpan {
    pub job_id: String,             // 作业ID
    pub start: NaiveDateTime,       // 开工时刻
    pub end: NaiveDateTime,         // 预计完工时刻
    pub segments: Vec<DaySegment>,  // 逐日分段
    pub naive_fallback: bool,       // 是否为朴素 24/7 排程
}

// ==========================================
// ScheduleApi - 排程接口
// ==========================================
pub struct ScheduleApi {
    job_repo: JobRepository,
    shift_repo: ShiftRepository,
    delay_repo: DelayRepository,
    config: ConfigManager,
}

impl ScheduleApi {
    /// 从共享连接创建排程接口
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> ApiResult<Self> {
        let config = ConfigManager::from_connection(conn.clone())
            .map_err(|e| ApiError::InternalError(e.to_string()))?;
        Ok(Self {
            job_repo: JobRepository::from_connection(conn.clone()),
            shift_repo: ShiftRepository::from_connection(conn.clone()),
            delay_repo: DelayRepository::from_connection(conn),
            config,
        })
    }

    /// 对基线作业排程
    ///
    /// # 参数
    /// - job_id: 作业ID
    ///
    /// # 返回
    /// - Ok(ScheduledSpan): 开工/完工时刻与逐日分段
    /// - Err(NotFound): 作业不存在
    /// - Err(InvalidInput): 作业未配置排程起点
    /// - Err(NoEligibleShifts): 可用班次集合为空或上限内无窗口
    #[instrument(skip(self))]
    pub fn schedule_job(&self, job_id: &str) -> ApiResult<ScheduledSpan> {
        let job = self
            .job_repo
            .find_by_id(job_id)?
            .ok_or_else(|| ApiError::NotFound(format!("作业(id={})不存在", job_id)))?;

        let all_shifts = self.shift_repo.find_all()?;
        let delays = self.delay_repo.find_production_by_job(job_id)?;

        self.schedule_snapshot(&job, &delays, &all_shifts, false)
    }

    /// 对内存快照排程 (情景叠加视图渲染复用此入口)
    ///
    /// # 参数
    /// - job: 作业快照
    /// - delays: 适用的延误集合
    /// - all_shifts: 全部班次快照
    /// - ignore_active_flag: 是否忽略班次启用标记
    pub fn schedule_snapshot(
        &self,
        job: &Job,
        delays: &[Delay],
        all_shifts: &[Shift],
        ignore_active_flag: bool,
    ) -> ApiResult<ScheduledSpan> {
        job.validate()?;
        let start = job.scheduled_start().ok_or_else(|| {
            ApiError::InvalidInput(format!("作业 {} 未配置排程起始日期/时刻", job.job_id))
        })?;

        let duration_engine = DurationEngine::new();
        let adjusted = duration_engine.apply_delays(job, delays);

        let max_days = self.config.get_max_search_days();
        let scheduler = ForwardScheduler::new(max_days);
        let end = scheduler.schedule_forward(
            start,
            adjusted.expected_job_duration_s,
            all_shifts,
            &adjusted.allowed_shift_ids,
            adjusted.include_weekends,
            ignore_active_flag,
        )?;

        let naive_fallback = all_shifts.is_empty();
        let eligible = ForwardScheduler::resolve_eligible(
            all_shifts,
            &adjusted.allowed_shift_ids,
            ignore_active_flag,
        );
        let partitioner = DayPartitioner::new();
        let segments = partitioner.partition(start, end, &eligible, adjusted.include_weekends);

        Ok(ScheduledSpan {
            job_id: job.job_id.clone(),
            start,
            end,
            segments,
            naive_fallback,
        })
    }

    /// 登记生产延误 (作用于基线, 立即计入后续排程)
    ///
    /// # 参数
    /// - job_id: 目标作业 (必须存在于基线)
    /// - name: 延误名称
    /// - duration_s: 延误时长(秒), 必须为正
    /// - insert_after_step_order: 插入点, 0=产前准备之后
    #[instrument(skip(self))]
    pub fn add_production_delay(
        &self,
        job_id: &str,
        name: &str,
        duration_s: i64,
        insert_after_step_order: i32,
    ) -> ApiResult<Delay> {
        if self.job_repo.find_by_id(job_id)?.is_none() {
            return Err(ApiError::NotFound(format!("作业(id={})不存在", job_id)));
        }
        let delay = Delay {
            delay_id: Uuid::new_v4().to_string(),
            scenario_id: None,
            job_id: job_id.to_string(),
            name: name.to_string(),
            duration_s,
            insert_after_step_order,
            created_at: Local::now().naive_local(),
        };
        delay.validate()?;
        self.delay_repo.insert(&delay)?;
        Ok(delay)
    }
}
