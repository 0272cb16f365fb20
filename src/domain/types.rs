// ==========================================
// 组套排产系统 - 领域类型定义
// ==========================================
// 职责: 作业状态、情景变更操作等基础枚举与领域错误
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// ==========================================
// JobStatus - 作业状态
// ==========================================
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,    // 待排产
    Scheduled,  // 已排产
    InProgress, // 组套进行中
    Completed,  // 已完成
    Cancelled,  // 已取消
}

impl JobStatus {
    /// 转换为字符串 (用于数据库存储)
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Scheduled => "SCHEDULED",
            JobStatus::InProgress => "IN_PROGRESS",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Cancelled => "CANCELLED",
        }
    }

    /// 从字符串解析
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "PENDING" => Some(JobStatus::Pending),
            "SCHEDULED" => Some(JobStatus::Scheduled),
            "IN_PROGRESS" => Some(JobStatus::InProgress),
            "COMPLETED" => Some(JobStatus::Completed),
            "CANCELLED" => Some(JobStatus::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// ChangeOperation - 情景变更操作
// ==========================================
// 红线: 变更一经写入不可修改,"编辑"=追加新行
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeOperation {
    Add,    // 情景内新增作业
    Modify, // 覆盖基线作业字段 (累积式 changeData)
    Delete, // 情景内软删除
}

impl ChangeOperation {
    /// 转换为字符串 (用于数据库存储)
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeOperation::Add => "ADD",
            ChangeOperation::Modify => "MODIFY",
            ChangeOperation::Delete => "DELETE",
        }
    }

    /// 从字符串解析
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "ADD" => Some(ChangeOperation::Add),
            "MODIFY" => Some(ChangeOperation::Modify),
            "DELETE" => Some(ChangeOperation::Delete),
            _ => None,
        }
    }
}

impl fmt::Display for ChangeOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// DomainError - 领域校验错误
// ==========================================
// 红线: 输入边界显式拒绝,不静默纠正
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("非法时间格式: {raw}")]
    InvalidTimeFormat { raw: String },

    #[error("工间休息越界: 班次{shift_id} 休息({break_start}+{break_minutes}min)超出班次窗口")]
    BreakOutsideShift {
        shift_id: String,
        break_start: String,
        break_minutes: u32,
    },

    #[error("非法时长: {field}={value} (要求 {requirement})")]
    InvalidDuration {
        field: String,
        value: i64,
        requirement: String,
    },

    #[error("非法工位数: {value} (至少为1)")]
    InvalidStationCount { value: i64 },

    #[error("字段值错误 (field={field}): {message}")]
    FieldValueError { field: String, message: String },
}
