// ==========================================
// 组套排产系统 - 延误领域模型
// ==========================================
// 不变式: duration_s > 0, 创建时拒绝, 引擎不再兜底
// scenario_id 为 None 表示生产延误, 作用于基线作业
// ==========================================

use crate::domain::types::DomainError;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ==========================================
// Delay - 延误
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delay {
    pub delay_id: String,              // 延误ID
    pub scenario_id: Option<String>,   // 所属情景, None=生产延误
    pub job_id: String,                // 关联作业
    pub name: String,                  // 延误名称 (缺料/设备故障等)
    pub duration_s: i64,               // 延误时长(秒), 必须为正
    pub insert_after_step_order: i32,  // 插入点: 0=产前准备之后, 否则为路线步骤序号
    pub created_at: NaiveDateTime,     // 创建时间
}

impl Delay {
    /// 判断是否为生产延误 (作用于基线, 不随情景丢弃)
    pub fn is_production(&self) -> bool {
        self.scenario_id.is_none()
    }

    /// 校验延误配置
    ///
    /// # 错误
    /// - `DomainError::InvalidDuration`: 时长非正
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.duration_s <= 0 {
            return Err(DomainError::InvalidDuration {
                field: "duration_s".to_string(),
                value: self.duration_s,
                requirement: "> 0".to_string(),
            });
        }
        if self.name.trim().is_empty() {
            return Err(DomainError::FieldValueError {
                field: "name".to_string(),
                message: "延误名称不能为空".to_string(),
            });
        }
        Ok(())
    }
}
