// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// 任务实体
///
/// 任务图中的一个工作单元。重试预算与优先级在创建时确定，
/// 传输失败时由调度器消耗重试次数。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// 任务唯一标识符
    pub id: Uuid,
    /// 父任务标识符
    pub parent_id: Option<Uuid>,
    /// 任务类型
    pub kind: TaskKind,
    /// 任务状态
    pub status: TaskStatus,
    /// 任务优先级
    pub priority: Priority,
    /// 目标URL
    pub url: String,
    /// 请求方法
    pub method: String,
    /// 已失败的尝试次数
    pub attempt_count: u32,
    /// 最大重试次数
    pub max_retries: u32,
    /// 创建时间
    pub created_at: DateTime<Utc>,
    /// 最近一次派发时间
    pub dispatched_at: Option<DateTime<Utc>>,
    /// 完成时间
    pub completed_at: Option<DateTime<Utc>>,
}

/// 任务类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// 搜索结果列表
    Search,
    /// 单个商户详情
    Place,
    /// 商户网站上的联系邮箱
    Email,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TaskKind::Search => write!(f, "search"),
            TaskKind::Place => write!(f, "place"),
            TaskKind::Email => write!(f, "email"),
        }
    }
}

impl FromStr for TaskKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "search" => Ok(TaskKind::Search),
            "place" => Ok(TaskKind::Place),
            "email" => Ok(TaskKind::Email),
            _ => Err(()),
        }
    }
}

/// 任务状态
///
/// Pending → Dispatched → Completed | Failed；
/// 传输失败且仍有重试预算时 Dispatched 回到 Pending
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    Dispatched,
    Completed,
    Failed,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::Dispatched => write!(f, "dispatched"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Failed => write!(f, "failed"),
        }
    }
}

/// 任务优先级，数值越大越先执行
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low = 0,
    Medium = 1,
    High = 2,
}

/// 领域错误类型
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DomainError {
    /// 无效的状态转换
    #[error("Invalid state transition from {from} via {action}")]
    InvalidStateTransition {
        from: TaskStatus,
        action: &'static str,
    },
}

impl Task {
    /// 创建一个新的任务
    ///
    /// # 参数
    ///
    /// * `kind` - 任务类型
    /// * `parent_id` - 父任务ID
    /// * `url` - 目标URL
    /// * `max_retries` - 最大重试次数
    /// * `priority` - 优先级
    ///
    /// # 返回值
    ///
    /// 处于 Pending 且重试计数为零的任务
    pub fn new(
        kind: TaskKind,
        parent_id: Option<Uuid>,
        url: String,
        max_retries: u32,
        priority: Priority,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            parent_id,
            kind,
            status: TaskStatus::Pending,
            priority,
            url,
            method: "GET".to_string(),
            attempt_count: 0,
            max_retries,
            created_at: Utc::now(),
            dispatched_at: None,
            completed_at: None,
        }
    }

    fn invalid(&self, action: &'static str) -> DomainError {
        DomainError::InvalidStateTransition {
            from: self.status,
            action,
        }
    }

    /// 派发任务：Pending → Dispatched
    pub fn dispatch(mut self) -> Result<Self, DomainError> {
        match self.status {
            TaskStatus::Pending => {
                self.status = TaskStatus::Dispatched;
                self.dispatched_at = Some(Utc::now());
                Ok(self)
            }
            _ => Err(self.invalid("dispatch")),
        }
    }

    /// 完成任务：Dispatched → Completed
    pub fn complete(mut self) -> Result<Self, DomainError> {
        match self.status {
            TaskStatus::Dispatched => {
                self.status = TaskStatus::Completed;
                self.completed_at = Some(Utc::now());
                Ok(self)
            }
            _ => Err(self.invalid("complete")),
        }
    }

    /// 标记任务失败：Dispatched → Failed
    pub fn fail(mut self) -> Result<Self, DomainError> {
        match self.status {
            TaskStatus::Dispatched => {
                self.status = TaskStatus::Failed;
                self.completed_at = Some(Utc::now());
                Ok(self)
            }
            _ => Err(self.invalid("fail")),
        }
    }

    /// 传输失败后重新排队：Dispatched → Pending，消耗一次重试
    pub fn requeue(mut self) -> Result<Self, DomainError> {
        match self.status {
            TaskStatus::Dispatched if self.can_retry() => {
                self.attempt_count += 1;
                self.status = TaskStatus::Pending;
                Ok(self)
            }
            _ => Err(self.invalid("requeue")),
        }
    }

    /// 是否还有重试预算
    pub fn can_retry(&self) -> bool {
        self.attempt_count < self.max_retries
    }

    /// 剩余重试次数
    pub fn remaining_retries(&self) -> u32 {
        self.max_retries.saturating_sub(self.attempt_count)
    }
}
