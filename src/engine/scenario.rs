// ==========================================
// 组套排产系统 - 情景推演引擎
// ==========================================
// 职责: 变更日志重放 - 物化叠加视图 与 提交回写基线
// 红线: 基线入参绝不修改, 一切计算在深拷贝上进行
// 红线: 工位数重算以情景开始前的原值为基准, 反复编辑不复利
// 红线: 悬空 job_id 跳过并记入清单, 不让整次重放失败
// ==========================================

use crate::domain::job::Job;
use crate::domain::delay::Delay;
use crate::domain::scenario::{Scenario, ScenarioChange};
use crate::domain::types::ChangeOperation;
use crate::engine::duration::DurationEngine;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::instrument;

// ==========================================
// SkippedEntry - 跳过清单条目
// ==========================================
// 悬空引用 (变更或延误指向不存在的作业) 统一走此清单
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedEntry {
    pub entry_id: String,         // 被跳过的变更ID或延误ID
    pub job_id: Option<String>,   // 目标作业 (可能缺失)
    pub reason: String,           // 跳过原因
}

/// 物化结果: 叠加视图作业 (仅被触达的) + 跳过清单
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterializeResult {
    pub jobs: Vec<Job>,
    pub skipped: Vec<SkippedEntry>,
}

/// 提交结果: 回写后的完整新基线 + 跳过清单
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitResult {
    pub jobs: Vec<Job>,
    pub skipped: Vec<SkippedEntry>,
}

// ==========================================
// ScenarioEngine - 情景引擎
// ==========================================
#[derive(Debug, Default)]
pub struct ScenarioEngine {
    duration_engine: DurationEngine,
}

/// 重放上下文: 工作副本 + 原值映射 + 触达集合 + 跳过清单
struct ReplayState {
    working: Vec<Job>,
    originals: BTreeMap<String, Job>,
    touched: BTreeSet<String>,
    skipped: Vec<SkippedEntry>,
}

impl ReplayState {
    fn position(&self, job_id: &str) -> Option<usize> {
        self.working.iter().position(|j| j.job_id == job_id)
    }
}

impl ScenarioEngine {
    /// 构造函数
    pub fn new() -> Self {
        Self {
            duration_engine: DurationEngine::new(),
        }
    }

    /// 按 (created_at, seq_no) 升序排序变更日志
    fn ordered_changes(changes: &[ScenarioChange]) -> Vec<&ScenarioChange> {
        let mut ordered: Vec<&ScenarioChange> = changes.iter().collect();
        ordered.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then(a.seq_no.cmp(&b.seq_no))
        });
        ordered
    }

    /// ADD 变更的作业ID: changeData 指定优先, 否则由变更ID派生
    fn add_job_id(change: &ScenarioChange) -> String {
        change
            .change_data
            .job_id
            .clone()
            .or_else(|| change.job_id.clone())
            .unwrap_or_else(|| format!("scn-{}", change.change_id))
    }

    /// 在工作副本上重放全部变更 (物化与提交共用)
    fn replay(
        &self,
        baseline: &[Job],
        changes: &[ScenarioChange],
        now: NaiveDateTime,
    ) -> ReplayState {
        let mut state = ReplayState {
            working: baseline.to_vec(),
            originals: baseline
                .iter()
                .map(|j| (j.job_id.clone(), j.clone()))
                .collect(),
            touched: BTreeSet::new(),
            skipped: Vec::new(),
        };

        for change in Self::ordered_changes(changes) {
            match change.operation {
                ChangeOperation::Add => {
                    let job_id = Self::add_job_id(change);
                    if state.originals.contains_key(&job_id) {
                        state.skipped.push(SkippedEntry {
                            entry_id: change.change_id.clone(),
                            job_id: Some(job_id),
                            reason: "ADD 目标作业ID已存在".to_string(),
                        });
                        continue;
                    }
                    match change.change_data.build_job(job_id.clone(), now) {
                        Ok(job) => {
                            // 新增作业自身即为后续重算的原值
                            state.originals.insert(job_id.clone(), job.clone());
                            state.working.push(job);
                            state.touched.insert(job_id);
                        }
                        Err(reason) => {
                            state.skipped.push(SkippedEntry {
                                entry_id: change.change_id.clone(),
                                job_id: Some(job_id),
                                reason,
                            });
                        }
                    }
                }
                ChangeOperation::Modify => {
                    let Some(job_id) = change.job_id.clone() else {
                        state.skipped.push(SkippedEntry {
                            entry_id: change.change_id.clone(),
                            job_id: None,
                            reason: "MODIFY 变更缺少目标作业ID".to_string(),
                        });
                        continue;
                    };
                    let Some(pos) = state.position(&job_id) else {
                        state.skipped.push(SkippedEntry {
                            entry_id: change.change_id.clone(),
                            job_id: Some(job_id),
                            reason: "目标作业不存在 (悬空引用)".to_string(),
                        });
                        continue;
                    };

                    // 工位数变更: 以情景开始前的原值为基准重算时长,
                    // 显式提供的名义总时长覆盖重算结果
                    if let Some(new_count) = change.change_data.station_count {
                        if change.change_data.expected_job_duration_s.is_none() {
                            // 工作副本里的作业必有原值 (基线或 ADD 时登记)
                            let original = state
                                .originals
                                .get(&job_id)
                                .cloned()
                                .unwrap_or_else(|| state.working[pos].clone());
                            if new_count != original.station_count {
                                match self
                                    .duration_engine
                                    .recalculate_duration(&original, new_count)
                                {
                                    Ok(recalced) => {
                                        state.working[pos].expected_job_duration_s =
                                            recalced.expected_job_duration_s;
                                    }
                                    Err(e) => {
                                        state.skipped.push(SkippedEntry {
                                            entry_id: change.change_id.clone(),
                                            job_id: Some(job_id),
                                            reason: e.to_string(),
                                        });
                                        continue;
                                    }
                                }
                            }
                        }
                    }

                    change.change_data.merge_onto(&mut state.working[pos]);
                    state.working[pos].updated_at = now;
                    state.touched.insert(job_id);
                }
                ChangeOperation::Delete => {
                    let Some(job_id) = change.job_id.clone() else {
                        state.skipped.push(SkippedEntry {
                            entry_id: change.change_id.clone(),
                            job_id: None,
                            reason: "DELETE 变更缺少目标作业ID".to_string(),
                        });
                        continue;
                    };
                    let Some(pos) = state.position(&job_id) else {
                        state.skipped.push(SkippedEntry {
                            entry_id: change.change_id.clone(),
                            job_id: Some(job_id),
                            reason: "目标作业不存在 (悬空引用)".to_string(),
                        });
                        continue;
                    };
                    // 重放期间统一软删除, 提交阶段再物理移除
                    state.working[pos].scenario_deleted = true;
                    state.working[pos].updated_at = now;
                    state.touched.insert(job_id);
                }
            }
        }

        state
    }

    /// 物化情景叠加视图
    ///
    /// # 参数
    /// - `baseline`: 生产基线作业 (只读)
    /// - `scenario`: 目标情景
    /// - `changes`: 该情景的全部变更日志
    /// - `production_delays`: 生产延误 (作用于所有作业)
    /// - `scenario_delays`: 该情景的推演延误
    /// - `now`: 时间戳
    ///
    /// # 返回
    /// 仅含被触达作业的叠加视图; 每个作业打上情景标记,
    /// 名义总时长已含两类延误; 悬空延误记入跳过清单
    #[instrument(skip_all, fields(scenario_id = %scenario.scenario_id, change_count = changes.len()))]
    pub fn materialize(
        &self,
        baseline: &[Job],
        scenario: &Scenario,
        changes: &[ScenarioChange],
        production_delays: &[Delay],
        scenario_delays: &[Delay],
        now: NaiveDateTime,
    ) -> MaterializeResult {
        let mut state = self.replay(baseline, changes, now);

        // 延误的悬空引用同样跳过并上报: 目标既不在基线也不是本情景 ADD 的作业
        for delay in production_delays.iter().chain(scenario_delays.iter()) {
            if !state.originals.contains_key(&delay.job_id) {
                state.skipped.push(SkippedEntry {
                    entry_id: delay.delay_id.clone(),
                    job_id: Some(delay.job_id.clone()),
                    reason: "延误目标作业不存在 (悬空引用)".to_string(),
                });
            }
        }

        let jobs = state
            .working
            .into_iter()
            .filter(|j| state.touched.contains(&j.job_id))
            .map(|mut job| {
                job.scenario_id = Some(scenario.scenario_id.clone());
                job.scenario_name = Some(scenario.name.clone());
                let with_prod = self.duration_engine.apply_delays(&job, production_delays);
                self.duration_engine.apply_delays(&with_prod, scenario_delays)
            })
            .collect();

        MaterializeResult {
            jobs,
            skipped: state.skipped,
        }
    }

    /// 提交情景: 重放结果回写为新基线
    ///
    /// ADD 作为无情景标记的基线作业追加; MODIFY 合并;
    /// DELETE 物理移除。返回完整的新基线。
    #[instrument(skip_all, fields(scenario_id = %scenario.scenario_id, change_count = changes.len()))]
    pub fn commit(
        &self,
        baseline: &[Job],
        scenario: &Scenario,
        changes: &[ScenarioChange],
        now: NaiveDateTime,
    ) -> CommitResult {
        let state = self.replay(baseline, changes, now);

        let jobs = state
            .working
            .into_iter()
            .filter(|j| !j.scenario_deleted)
            .map(|mut job| {
                // 回写基线: 清除一切情景标记
                job.scenario_id = None;
                job.scenario_name = None;
                job
            })
            .collect();

        CommitResult {
            jobs,
            skipped: state.skipped,
        }
    }
}

// ==========================================
// 测试模块
// ==========================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::scenario::ChangeData;
    use crate::domain::types::JobStatus;
    use chrono::NaiveDate;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 2)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    fn create_test_job(job_id: &str, station_count: i64, duration_s: i64) -> Job {
        Job {
            job_id: job_id.to_string(),
            job_number: format!("KIT-{}", job_id),
            customer_name: None,
            ordered_quantity: 100,
            station_count,
            expected_kit_duration_s: 120,
            expected_job_duration_s: duration_s,
            setup_s: 1800,
            make_ready_s: 600,
            take_down_s: 600,
            route_steps: Vec::new(),
            allowed_shift_ids: BTreeSet::new(),
            include_weekends: false,
            scheduled_date: None,
            scheduled_start_time: None,
            status: JobStatus::Pending,
            scenario_id: None,
            scenario_name: None,
            scenario_deleted: false,
            created_at: now(),
            updated_at: now(),
        }
    }

    fn create_test_scenario(id: &str) -> Scenario {
        Scenario {
            scenario_id: id.to_string(),
            name: format!("推演-{}", id),
            description: None,
            is_active: true,
            created_at: now(),
            updated_at: now(),
        }
    }

    fn create_test_change(
        change_id: &str,
        job_id: Option<&str>,
        operation: ChangeOperation,
        data: ChangeData,
        seq_no: i64,
    ) -> ScenarioChange {
        ScenarioChange {
            change_id: change_id.to_string(),
            scenario_id: "SC1".to_string(),
            job_id: job_id.map(|s| s.to_string()),
            operation,
            change_data: data,
            original_data: None,
            seq_no,
            created_at: now(),
        }
    }

    #[test]
    fn test_materialize_leaves_baseline_untouched() {
        let engine = ScenarioEngine::new();
        let baseline = vec![create_test_job("J1", 2, 9000)];
        let scenario = create_test_scenario("SC1");
        let changes = vec![create_test_change(
            "C1",
            Some("J1"),
            ChangeOperation::Modify,
            ChangeData {
                ordered_quantity: Some(500),
                ..ChangeData::default()
            },
            1,
        )];
        let result = engine.materialize(&baseline, &scenario, &changes, &[], &[], now());
        assert_eq!(result.jobs.len(), 1);
        assert_eq!(result.jobs[0].ordered_quantity, 500);
        // 基线不动
        assert_eq!(baseline[0].ordered_quantity, 100);
        assert!(baseline[0].scenario_id.is_none());
    }

    #[test]
    fn test_materialize_only_touched_jobs_returned() {
        let engine = ScenarioEngine::new();
        let baseline = vec![
            create_test_job("J1", 2, 9000),
            create_test_job("J2", 2, 9000),
        ];
        let scenario = create_test_scenario("SC1");
        let changes = vec![create_test_change(
            "C1",
            Some("J2"),
            ChangeOperation::Modify,
            ChangeData {
                customer_name: Some("改派客户".to_string()),
                ..ChangeData::default()
            },
            1,
        )];
        let result = engine.materialize(&baseline, &scenario, &changes, &[], &[], now());
        assert_eq!(result.jobs.len(), 1);
        assert_eq!(result.jobs[0].job_id, "J2");
        assert_eq!(result.jobs[0].scenario_id.as_deref(), Some("SC1"));
        assert_eq!(result.jobs[0].scenario_name.as_deref(), Some("推演-SC1"));
    }

    #[test]
    fn test_cumulative_last_write_wins() {
        let engine = ScenarioEngine::new();
        let baseline = vec![create_test_job("J1", 2, 9000)];
        let scenario = create_test_scenario("SC1");
        let changes = vec![
            create_test_change(
                "C1",
                Some("J1"),
                ChangeOperation::Modify,
                ChangeData {
                    ordered_quantity: Some(200),
                    customer_name: Some("甲".to_string()),
                    ..ChangeData::default()
                },
                1,
            ),
            create_test_change(
                "C2",
                Some("J1"),
                ChangeOperation::Modify,
                ChangeData {
                    ordered_quantity: Some(300),
                    ..ChangeData::default()
                },
                2,
            ),
        ];
        let result = engine.materialize(&baseline, &scenario, &changes, &[], &[], now());
        // 同字段后写覆盖先写, 未重写的字段保留
        assert_eq!(result.jobs[0].ordered_quantity, 300);
        assert_eq!(result.jobs[0].customer_name.as_deref(), Some("甲"));
    }

    #[test]
    fn test_station_recalc_from_original_no_compounding() {
        // 2 工位 9000 秒 (固定开销 3000): 改 4 工位 -> 6000;
        // 再改回 2 工位 -> 9000 (从原值重算, 不复利)
        let engine = ScenarioEngine::new();
        let baseline = vec![create_test_job("J1", 2, 9000)];
        let scenario = create_test_scenario("SC1");
        let to_four = create_test_change(
            "C1",
            Some("J1"),
            ChangeOperation::Modify,
            ChangeData {
                station_count: Some(4),
                ..ChangeData::default()
            },
            1,
        );
        let back_to_two = create_test_change(
            "C2",
            Some("J1"),
            ChangeOperation::Modify,
            ChangeData {
                station_count: Some(2),
                ..ChangeData::default()
            },
            2,
        );

        let first = engine.materialize(&baseline, &scenario, &[to_four.clone()], &[], &[], now());
        assert_eq!(first.jobs[0].expected_job_duration_s, 6000);
        assert_eq!(first.jobs[0].station_count, 4);

        let round_trip =
            engine.materialize(&baseline, &scenario, &[to_four, back_to_two], &[], &[], now());
        assert_eq!(round_trip.jobs[0].expected_job_duration_s, 9000);
        assert_eq!(round_trip.jobs[0].station_count, 2);
    }

    #[test]
    fn test_explicit_duration_overrides_recalc() {
        let engine = ScenarioEngine::new();
        let baseline = vec![create_test_job("J1", 2, 9000)];
        let scenario = create_test_scenario("SC1");
        let changes = vec![create_test_change(
            "C1",
            Some("J1"),
            ChangeOperation::Modify,
            ChangeData {
                station_count: Some(4),
                expected_job_duration_s: Some(7777),
                ..ChangeData::default()
            },
            1,
        )];
        let result = engine.materialize(&baseline, &scenario, &changes, &[], &[], now());
        assert_eq!(result.jobs[0].expected_job_duration_s, 7777);
    }

    #[test]
    fn test_add_then_modify_uses_added_job_as_original() {
        let engine = ScenarioEngine::new();
        let baseline = vec![];
        let scenario = create_test_scenario("SC1");
        let add = create_test_change(
            "C1",
            None,
            ChangeOperation::Add,
            ChangeData {
                job_id: Some("NEW1".to_string()),
                job_number: Some("KIT-NEW".to_string()),
                station_count: Some(2),
                expected_job_duration_s: Some(8000),
                setup_s: Some(2000),
                ..ChangeData::default()
            },
            1,
        );
        // 固定开销 2000, 并行 6000; 2->3 工位: 2000 + 4000 = 6000
        let modify = create_test_change(
            "C2",
            Some("NEW1"),
            ChangeOperation::Modify,
            ChangeData {
                station_count: Some(3),
                ..ChangeData::default()
            },
            2,
        );
        let result = engine.materialize(&baseline, &scenario, &[add, modify], &[], &[], now());
        assert_eq!(result.jobs.len(), 1);
        assert_eq!(result.jobs[0].expected_job_duration_s, 6000);
    }

    #[test]
    fn test_add_without_job_number_skipped() {
        let engine = ScenarioEngine::new();
        let scenario = create_test_scenario("SC1");
        let changes = vec![create_test_change(
            "C1",
            None,
            ChangeOperation::Add,
            ChangeData::default(),
            1,
        )];
        let result = engine.materialize(&[], &scenario, &changes, &[], &[], now());
        assert!(result.jobs.is_empty());
        assert_eq!(result.skipped.len(), 1);
        assert!(result.skipped[0].reason.contains("job_number"));
    }

    #[test]
    fn test_soft_delete_tags_job() {
        let engine = ScenarioEngine::new();
        let baseline = vec![create_test_job("J1", 2, 9000)];
        let scenario = create_test_scenario("SC1");
        let changes = vec![create_test_change(
            "C1",
            Some("J1"),
            ChangeOperation::Delete,
            ChangeData::default(),
            1,
        )];
        let result = engine.materialize(&baseline, &scenario, &changes, &[], &[], now());
        assert_eq!(result.jobs.len(), 1);
        assert!(result.jobs[0].scenario_deleted);
        // 基线不受影响
        assert!(!baseline[0].scenario_deleted);
    }

    #[test]
    fn test_dangling_reference_skipped_not_fatal() {
        let engine = ScenarioEngine::new();
        let baseline = vec![create_test_job("J1", 2, 9000)];
        let scenario = create_test_scenario("SC1");
        let changes = vec![
            create_test_change(
                "C1",
                Some("GHOST"),
                ChangeOperation::Modify,
                ChangeData {
                    ordered_quantity: Some(1),
                    ..ChangeData::default()
                },
                1,
            ),
            create_test_change(
                "C2",
                Some("J1"),
                ChangeOperation::Modify,
                ChangeData {
                    ordered_quantity: Some(42),
                    ..ChangeData::default()
                },
                2,
            ),
        ];
        let result = engine.materialize(&baseline, &scenario, &changes, &[], &[], now());
        assert_eq!(result.skipped.len(), 1);
        assert_eq!(result.skipped[0].job_id.as_deref(), Some("GHOST"));
        // 后续合法变更照常生效
        assert_eq!(result.jobs[0].ordered_quantity, 42);
    }

    #[test]
    fn test_dangling_delay_reported_in_skip_list() {
        let engine = ScenarioEngine::new();
        let baseline = vec![create_test_job("J1", 2, 9000)];
        let scenario = create_test_scenario("SC1");
        let changes = vec![create_test_change(
            "C1",
            Some("J1"),
            ChangeOperation::Modify,
            ChangeData {
                ordered_quantity: Some(1),
                ..ChangeData::default()
            },
            1,
        )];
        let ghost_delay = vec![Delay {
            delay_id: "D9".to_string(),
            scenario_id: Some("SC1".to_string()),
            job_id: "GHOST".to_string(),
            name: "指向已删作业的停机".to_string(),
            duration_s: 600,
            insert_after_step_order: 0,
            created_at: now(),
        }];
        let result =
            engine.materialize(&baseline, &scenario, &changes, &[], &ghost_delay, now());
        // 悬空延误不致命, 但必须出现在跳过清单里
        assert_eq!(result.skipped.len(), 1);
        assert_eq!(result.skipped[0].entry_id, "D9");
        assert_eq!(result.skipped[0].job_id.as_deref(), Some("GHOST"));
        assert!(result.skipped[0].reason.contains("悬空"));
        // 其他作业的名义总时长不受影响
        assert_eq!(result.jobs[0].expected_job_duration_s, 9000);
    }

    #[test]
    fn test_materialize_applies_both_delay_kinds() {
        let engine = ScenarioEngine::new();
        let baseline = vec![create_test_job("J1", 2, 9000)];
        let scenario = create_test_scenario("SC1");
        let changes = vec![create_test_change(
            "C1",
            Some("J1"),
            ChangeOperation::Modify,
            ChangeData {
                ordered_quantity: Some(1),
                ..ChangeData::default()
            },
            1,
        )];
        let production = vec![Delay {
            delay_id: "D1".to_string(),
            scenario_id: None,
            job_id: "J1".to_string(),
            name: "缺料".to_string(),
            duration_s: 600,
            insert_after_step_order: 0,
            created_at: now(),
        }];
        let what_if = vec![Delay {
            delay_id: "D2".to_string(),
            scenario_id: Some("SC1".to_string()),
            job_id: "J1".to_string(),
            name: "推演停机".to_string(),
            duration_s: 300,
            insert_after_step_order: 0,
            created_at: now(),
        }];
        let result =
            engine.materialize(&baseline, &scenario, &changes, &production, &what_if, now());
        assert_eq!(result.jobs[0].expected_job_duration_s, 9900);
    }

    #[test]
    fn test_two_scenarios_are_isolated() {
        let engine = ScenarioEngine::new();
        let baseline = vec![create_test_job("J1", 2, 9000)];
        let sc_a = create_test_scenario("A");
        let sc_b = create_test_scenario("B");
        let change_a = vec![create_test_change(
            "CA",
            Some("J1"),
            ChangeOperation::Modify,
            ChangeData {
                ordered_quantity: Some(111),
                ..ChangeData::default()
            },
            1,
        )];
        let change_b = vec![create_test_change(
            "CB",
            Some("J1"),
            ChangeOperation::Modify,
            ChangeData {
                ordered_quantity: Some(222),
                ..ChangeData::default()
            },
            1,
        )];
        let view_a = engine.materialize(&baseline, &sc_a, &change_a, &[], &[], now());
        let view_b = engine.materialize(&baseline, &sc_b, &change_b, &[], &[], now());
        assert_eq!(view_a.jobs[0].ordered_quantity, 111);
        assert_eq!(view_b.jobs[0].ordered_quantity, 222);
        assert_eq!(baseline[0].ordered_quantity, 100);
    }

    #[test]
    fn test_commit_produces_new_baseline() {
        let engine = ScenarioEngine::new();
        let baseline = vec![
            create_test_job("J1", 2, 9000),
            create_test_job("J2", 2, 9000),
        ];
        let scenario = create_test_scenario("SC1");
        let changes = vec![
            create_test_change(
                "C1",
                Some("J1"),
                ChangeOperation::Modify,
                ChangeData {
                    ordered_quantity: Some(500),
                    ..ChangeData::default()
                },
                1,
            ),
            create_test_change(
                "C2",
                Some("J2"),
                ChangeOperation::Delete,
                ChangeData::default(),
                2,
            ),
            create_test_change(
                "C3",
                None,
                ChangeOperation::Add,
                ChangeData {
                    job_id: Some("J3".to_string()),
                    job_number: Some("KIT-J3".to_string()),
                    ..ChangeData::default()
                },
                3,
            ),
        ];
        let result = engine.commit(&baseline, &scenario, &changes, now());
        // DELETE 物理移除; ADD 追加且无情景标记
        let ids: Vec<&str> = result.jobs.iter().map(|j| j.job_id.as_str()).collect();
        assert_eq!(ids, vec!["J1", "J3"]);
        assert_eq!(result.jobs[0].ordered_quantity, 500);
        assert!(result.jobs.iter().all(|j| j.scenario_id.is_none()));
        assert!(result.jobs.iter().all(|j| !j.scenario_deleted));
    }
}
