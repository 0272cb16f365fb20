// ==========================================
// 组套排产系统 - 情景推演 API
// ==========================================
// 职责: 情景生命周期 - 创建 / 追加变更 / 物化视图 / 提交 / 丢弃
// 红线: 基线只在提交时改动; 物化视图是只读计算
// 红线: 提交后情景整体删除, 推演延误转正为生产延误
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::api::schedule_api::{ScheduleApi, ScheduledSpan};
use crate::config::ConfigManager;
use crate::domain::job::Job;
use crate::domain::scenario::{ChangeData, Scenario, ScenarioChange};
use crate::domain::types::ChangeOperation;
use crate::engine::scenario::{ScenarioEngine, SkippedEntry};
use crate::repository::{DelayRepository, JobRepository, ScenarioRepository, ShiftRepository};
use chrono::Local;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tracing::{instrument, warn};
use uuid::Uuid;

// ==========================================
// 视图与结果类型
// ==========================================

/// 叠加视图中的单个作业: 快照 + 排程结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioJobView {
    pub job: Job,
    /// 排程结果; 作业被软删除、未配置起点或排程失败时为 None
    pub span: Option<ScheduledSpan>,
}

/// 物化视图结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioView {
    pub scenario: Scenario,
    pub jobs: Vec<ScenarioJobView>,
    pub skipped: Vec<SkippedEntry>,
}

/// 提交结果汇总
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitOutcome {
    pub upserted_jobs: usize,     // 回写的作业数
    pub deleted_jobs: usize,      // 物理移除的作业数
    pub deleted_delays: usize,    // 随移除作业一并清理的延误数
    pub promoted_delays: usize,   // 转正的推演延误数
    pub skipped: Vec<SkippedEntry>,
}

// ==========================================
// ScenarioApi - 情景接口
// ==========================================
pub struct ScenarioApi {
    job_repo: JobRepository,
    delay_repo: DelayRepository,
    scenario_repo: ScenarioRepository,
    shift_repo: ShiftRepository,
    schedule_api: ScheduleApi,
    config: ConfigManager,
    engine: ScenarioEngine,
}

impl ScenarioApi {
    /// 从共享连接创建情景接口
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> ApiResult<Self> {
        let config = ConfigManager::from_connection(conn.clone())
            .map_err(|e| ApiError::InternalError(e.to_string()))?;
        Ok(Self {
            job_repo: JobRepository::from_connection(conn.clone()),
            delay_repo: DelayRepository::from_connection(conn.clone()),
            scenario_repo: ScenarioRepository::from_connection(conn.clone()),
            shift_repo: ShiftRepository::from_connection(conn.clone()),
            schedule_api: ScheduleApi::from_connection(conn)?,
            config,
            engine: ScenarioEngine::new(),
        })
    }

    fn load_scenario(&self, scenario_id: &str) -> ApiResult<Scenario> {
        self.scenario_repo
            .find_scenario(scenario_id)?
            .ok_or_else(|| ApiError::NotFound(format!("情景(id={})不存在", scenario_id)))
    }

    /// 创建情景
    #[instrument(skip(self))]
    pub fn create_scenario(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> ApiResult<Scenario> {
        if name.trim().is_empty() {
            return Err(ApiError::InvalidInput("情景名称不能为空".to_string()));
        }
        let now = Local::now().naive_local();
        let scenario = Scenario {
            scenario_id: Uuid::new_v4().to_string(),
            name: name.trim().to_string(),
            description: description.map(|s| s.to_string()),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.scenario_repo.upsert_scenario(&scenario)?;
        Ok(scenario)
    }

    /// 追加变更行 (只增不改; "编辑变更" = 追加一条新的累积变更)
    ///
    /// # 参数
    /// - scenario_id: 目标情景
    /// - job_id: 目标作业 (MODIFY/DELETE 必填; ADD 可缺省)
    /// - operation: 操作类型
    /// - change_data: 累积式部分字段
    #[instrument(skip(self, change_data))]
    pub fn append_change(
        &self,
        scenario_id: &str,
        job_id: Option<&str>,
        operation: ChangeOperation,
        change_data: ChangeData,
    ) -> ApiResult<ScenarioChange> {
        let scenario = self.load_scenario(scenario_id)?;

        if matches!(operation, ChangeOperation::Modify | ChangeOperation::Delete)
            && job_id.is_none()
        {
            return Err(ApiError::InvalidInput(format!(
                "{} 变更必须指定目标作业",
                operation
            )));
        }

        // 变更前快照 (审计用): 目标为基线作业时记录其当前状态
        let original_data = match job_id {
            Some(id) => self
                .job_repo
                .find_by_id(id)?
                .map(|job| serde_json::to_value(&job))
                .transpose()
                .map_err(|e| ApiError::InternalError(e.to_string()))?,
            None => None,
        };

        let mut change = ScenarioChange {
            change_id: Uuid::new_v4().to_string(),
            scenario_id: scenario.scenario_id.clone(),
            job_id: job_id.map(|s| s.to_string()),
            operation,
            change_data,
            original_data,
            seq_no: 0,
            created_at: Local::now().naive_local(),
        };
        change.seq_no = self.scenario_repo.append_change(&change)?;
        Ok(change)
    }

    /// 物化情景叠加视图
    ///
    /// 每个被触达且未软删除的作业渲染一条排程结果;
    /// 单个作业排程失败只降级为 warn, 不影响其他作业。
    #[instrument(skip(self))]
    pub fn materialize_view(&self, scenario_id: &str) -> ApiResult<ScenarioView> {
        let scenario = self.load_scenario(scenario_id)?;
        let baseline = self.job_repo.find_all()?;
        let changes = self.scenario_repo.find_changes(scenario_id)?;
        let production_delays = self.delay_repo.find_production()?;
        let scenario_delays = self.delay_repo.find_by_scenario(scenario_id)?;
        let all_shifts = self.shift_repo.find_all()?;
        let ignore_active = self.config.get_scenario_ignore_active_flag();

        let now = Local::now().naive_local();
        let result = self.engine.materialize(
            &baseline,
            &scenario,
            &changes,
            &production_delays,
            &scenario_delays,
            now,
        );
        for entry in &result.skipped {
            warn!(
                entry_id = %entry.entry_id,
                job_id = ?entry.job_id,
                reason = %entry.reason,
                "情景变更或延误被跳过"
            );
        }

        let mut views = Vec::with_capacity(result.jobs.len());
        for job in result.jobs {
            // 物化阶段已把两类延误折进名义总时长, 渲染时不再注入
            let span = if job.scenario_deleted || job.scheduled_start().is_none() {
                None
            } else {
                match self
                    .schedule_api
                    .schedule_snapshot(&job, &[], &all_shifts, ignore_active)
                {
                    Ok(span) => Some(span),
                    Err(e) => {
                        warn!(job_id = %job.job_id, error = %e, "叠加视图作业排程失败");
                        None
                    }
                }
            };
            views.push(ScenarioJobView { job, span });
        }

        Ok(ScenarioView {
            scenario,
            jobs: views,
            skipped: result.skipped,
        })
    }

    /// 提交情景: 重放结果回写基线, 推演延误转正, 情景删除
    #[instrument(skip(self))]
    pub fn commit(&self, scenario_id: &str) -> ApiResult<CommitOutcome> {
        let scenario = self.load_scenario(scenario_id)?;
        let baseline = self.job_repo.find_all()?;
        let changes = self.scenario_repo.find_changes(scenario_id)?;

        let now = Local::now().naive_local();
        let result = self.engine.commit(&baseline, &scenario, &changes, now);
        for entry in &result.skipped {
            warn!(
                entry_id = %entry.entry_id,
                job_id = ?entry.job_id,
                reason = %entry.reason,
                "提交时情景变更被跳过"
            );
        }

        // 基线中被 DELETE 移除的作业: 新基线里不存在的ID
        let removed: Vec<String> = baseline
            .iter()
            .filter(|b| !result.jobs.iter().any(|j| j.job_id == b.job_id))
            .map(|b| b.job_id.clone())
            .collect();

        let upserted = self.job_repo.batch_upsert(&result.jobs)?;
        let deleted = self.job_repo.batch_delete(&removed)?;
        // delay.job_id 无外键, 被移除作业的延误行必须在转正前显式清理
        let deleted_delays = self.delay_repo.delete_by_jobs(&removed)?;
        let promoted = self.delay_repo.promote_to_production(scenario_id)?;
        self.scenario_repo.delete_scenario(scenario_id)?;

        Ok(CommitOutcome {
            upserted_jobs: upserted,
            deleted_jobs: deleted,
            deleted_delays,
            promoted_delays: promoted,
            skipped: result.skipped,
        })
    }

    /// 登记推演延误 (随情景提交转正, 随情景丢弃删除)
    ///
    /// 目标作业允许是情景内 ADD 的新作业, 因此不校验基线存在性。
    #[instrument(skip(self))]
    pub fn add_scenario_delay(
        &self,
        scenario_id: &str,
        job_id: &str,
        name: &str,
        duration_s: i64,
        insert_after_step_order: i32,
    ) -> ApiResult<crate::domain::Delay> {
        let scenario = self.load_scenario(scenario_id)?;
        let delay = crate::domain::Delay {
            delay_id: Uuid::new_v4().to_string(),
            scenario_id: Some(scenario.scenario_id),
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

    /// 丢弃情景: 变更日志级联清除, 推演延误一并删除
    #[instrument(skip(self))]
    pub fn discard(&self, scenario_id: &str) -> ApiResult<()> {
        let scenario = self.load_scenario(scenario_id)?;
        self.delay_repo.delete_by_scenario(&scenario.scenario_id)?;
        self.scenario_repo.delete_scenario(&scenario.scenario_id)?;
        Ok(())
    }

    /// 查询全部情景
    pub fn list_scenarios(&self) -> ApiResult<Vec<Scenario>> {
        Ok(self.scenario_repo.list_scenarios()?)
    }

    /// 按重放顺序查询某情景的变更日志
    pub fn list_changes(&self, scenario_id: &str) -> ApiResult<Vec<ScenarioChange>> {
        self.load_scenario(scenario_id)?;
        Ok(self.scenario_repo.find_changes(scenario_id)?)
    }
}
