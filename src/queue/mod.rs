// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 队列模块
///
/// 提供任务队列和调度功能
/// 负责任务的排队、有限并发执行与重试
pub mod scheduler;
pub mod task_queue;

pub use scheduler::{PipelineScheduler, RunSummary, SchedulerError};
pub use task_queue::{InMemoryTaskQueue, QueueError, TaskQueue};
