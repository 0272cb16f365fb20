// ==========================================
// 组套排产系统 - 时长计算引擎
// ==========================================
// 职责: 延误注入 与 工位数变更引起的时长重算
// 红线: 重算必须以变更前原值为基准, 反复编辑工位数不得复利
//       (基准的选取由调用方 ScenarioEngine 保证, 本引擎是纯函数)
// ==========================================

use crate::domain::delay::Delay;
use crate::domain::job::Job;
use crate::engine::error::{EngineError, EngineResult};

// ==========================================
// DurationEngine - 时长引擎
// ==========================================
#[derive(Debug, Default)]
pub struct DurationEngine;

impl DurationEngine {
    /// 构造函数
    pub fn new() -> Self {
        Self
    }

    /// 延误注入: 名义总时长加上该作业全部延误之和
    ///
    /// 延误按 job_id 匹配; 插入点序号只影响前端展示, 不影响总时长。
    /// 返回新快照, 不修改入参。
    pub fn apply_delays(&self, job: &Job, delays: &[Delay]) -> Job {
        let total: i64 = delays
            .iter()
            .filter(|d| d.job_id == job.job_id)
            .map(|d| d.duration_s)
            .sum();
        let mut adjusted = job.clone();
        adjusted.expected_job_duration_s += total;
        adjusted
    }

    /// 工位数变更的时长重算
    ///
    /// 口径: 固定开销 (产前准备+调机+收尾) 不随工位数变化;
    /// 并行部分按 旧工位数/新工位数 等比缩放, 四舍五入到整秒。
    /// 固定开销超过名义总时长时按总时长封顶, 保证单调性。
    ///
    /// # 参数
    /// - `job`: 变更前的原作业快照
    /// - `new_station_count`: 新工位数 (>=1)
    ///
    /// # 返回
    /// - `Ok(Job)`: 重算后的新快照 (工位数与名义总时长已更新)
    /// - `Err(InvalidInput)`: 新工位数 < 1
    pub fn recalculate_duration(
        &self,
        job: &Job,
        new_station_count: i64,
    ) -> EngineResult<Job> {
        if new_station_count < 1 {
            return Err(EngineError::InvalidInput(format!(
                "工位数必须 >= 1: {}",
                new_station_count
            )));
        }

        let mut recalced = job.clone();
        recalced.station_count = new_station_count;

        // 工位数不变: 严格不动名义总时长
        if new_station_count == job.station_count {
            return Ok(recalced);
        }

        let duration = job.expected_job_duration_s;
        let effective_fixed = job.fixed_overhead_s().min(duration).max(0);
        let parallel = duration - effective_fixed;
        let scaled = (parallel as f64 * job.station_count as f64 / new_station_count as f64)
            .round() as i64;
        recalced.expected_job_duration_s = effective_fixed + scaled;
        Ok(recalced)
    }
}
