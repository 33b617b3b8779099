// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::task::{Priority, TaskStatus};
use crate::tasks::PipelineTask;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;
use thiserror::Error;

/// 队列错误类型
#[derive(Error, Debug)]
pub enum QueueError {
    /// 只有 Pending 状态的任务可以入队
    #[error("Task {id} is {status}, expected pending")]
    NotPending { id: uuid::Uuid, status: TaskStatus },

    /// 队列已关闭
    #[error("Queue closed")]
    Closed,
}

/// 任务队列特质
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// 入队任务
    async fn enqueue(&self, task: PipelineTask) -> Result<(), QueueError>;

    /// 出队优先级最高的任务，队列为空时返回 `None`
    async fn dequeue(&self) -> Result<Option<PipelineTask>, QueueError>;

    /// 排队中的任务数
    async fn len(&self) -> usize;

    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// 堆中的条目：先比较优先级，同优先级按入队顺序
struct Queued {
    priority: Priority,
    sequence: u64,
    task: PipelineTask,
}

impl PartialEq for Queued {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Queued {}

impl PartialOrd for Queued {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Queued {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

#[derive(Default)]
struct HeapState {
    heap: BinaryHeap<Queued>,
    next_sequence: u64,
}

/// 进程内优先级队列
///
/// 高优先级任务（邮箱）先于商户任务，商户任务先于搜索任务，
/// 使已经开始的记录尽快完成。
#[derive(Default)]
pub struct InMemoryTaskQueue {
    state: Mutex<HeapState>,
}

impl InMemoryTaskQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskQueue for InMemoryTaskQueue {
    /// 入队任务
    ///
    /// # 参数
    ///
    /// * `task` - 要入队的任务
    ///
    /// # 返回值
    ///
    /// * `Ok(())` - 入队成功
    /// * `Err(QueueError::NotPending)` - 任务不处于 Pending 状态
    async fn enqueue(&self, task: PipelineTask) -> Result<(), QueueError> {
        let meta = task.meta();
        if meta.status != TaskStatus::Pending {
            return Err(QueueError::NotPending {
                id: meta.id,
                status: meta.status,
            });
        }
        let priority = meta.priority;
        let mut state = self.state.lock();
        let sequence = state.next_sequence;
        state.next_sequence += 1;
        state.heap.push(Queued {
            priority,
            sequence,
            task,
        });
        Ok(())
    }

    async fn dequeue(&self) -> Result<Option<PipelineTask>, QueueError> {
        Ok(self.state.lock().heap.pop().map(|q| q.task))
    }

    async fn len(&self) -> usize {
        self.state.lock().heap.len()
    }
}

#[async_trait]
impl<T: TaskQueue + ?Sized> TaskQueue for Arc<T> {
    async fn enqueue(&self, task: PipelineTask) -> Result<(), QueueError> {
        (**self).enqueue(task).await
    }

    async fn dequeue(&self) -> Result<Option<PipelineTask>, QueueError> {
        (**self).dequeue().await
    }

    async fn len(&self) -> usize {
        (**self).len().await
    }
}
