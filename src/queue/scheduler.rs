// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::query::ListingQuery;
use crate::domain::models::task::{Task, TaskKind};
use crate::infrastructure::result_sink::{ResultSink, SinkError};
use crate::queue::task_queue::{QueueError, TaskQueue};
use crate::tasks::{PipelineContext, PipelineTask, SearchTask, TaskError, TaskOutput};
use futures::FutureExt;
use std::io::Write;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// 调度错误
#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error("Failed to write result: {0}")]
    Sink(#[from] SinkError),
}

/// 一次运行的统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub completed: usize,
    pub failed: usize,
    pub retried: usize,
    pub written: usize,
    pub cancelled: bool,
}

/// 单个任务执行的结局
enum Execution {
    Done(TaskOutput),
    /// 取页面失败，任务原样交回以便重新排队
    Transport(PipelineTask, TaskError),
    Failed(TaskError),
}

/// 任务图调度器
///
/// 从队列中取任务，以有限并发执行；子任务重新入队，终态记录写入结果输出。
/// 单个任务的 panic 被限制在该任务内，不影响其他任务。
pub struct PipelineScheduler<Q: TaskQueue, W: Write + Send> {
    queue: Arc<Q>,
    context: PipelineContext,
    sink: Arc<ResultSink<W>>,
    concurrency: usize,
}

impl<Q: TaskQueue + 'static, W: Write + Send> PipelineScheduler<Q, W> {
    /// 创建调度器
    ///
    /// # 参数
    ///
    /// * `queue` - 任务队列
    /// * `context` - 任务执行上下文
    /// * `sink` - 结果输出
    /// * `concurrency` - 同时执行的任务数上限
    pub fn new(
        queue: Arc<Q>,
        context: PipelineContext,
        sink: Arc<ResultSink<W>>,
        concurrency: usize,
    ) -> Self {
        Self {
            queue,
            context,
            sink,
            concurrency: concurrency.max(1),
        }
    }

    /// 为每个查询入队一个搜索任务
    pub async fn seed(&self, queries: Vec<ListingQuery>) -> Result<usize, QueueError> {
        let count = queries.len();
        for query in queries {
            self.queue
                .enqueue(PipelineTask::Search(SearchTask::new(query)))
                .await?;
        }
        info!("Seeded {} search tasks", count);
        Ok(count)
    }

    /// 运行直到队列清空或收到取消信号
    ///
    /// # 返回值
    ///
    /// * `Ok(RunSummary)` - 运行统计
    /// * `Err(SchedulerError)` - 队列或结果写出失败
    pub async fn run(&self) -> Result<RunSummary, SchedulerError> {
        let mut in_flight: JoinSet<(Task, Execution)> = JoinSet::new();
        let mut summary = RunSummary::default();

        loop {
            while in_flight.len() < self.concurrency {
                let Some(task) = self.queue.dequeue().await? else {
                    break;
                };
                match task.transition(Task::dispatch) {
                    Ok(task) => self.spawn(&mut in_flight, task),
                    Err(e) => warn!("Dropping task: {}", e),
                }
            }

            if in_flight.is_empty() {
                break;
            }

            let joined = tokio::select! {
                biased;
                _ = self.context.cancel.cancelled() => {
                    info!("Cancelled with {} tasks in flight", in_flight.len());
                    in_flight.abort_all();
                    summary.cancelled = true;
                    break;
                }
                joined = in_flight.join_next() => joined,
            };

            match joined {
                Some(Ok((meta, execution))) => self.settle(meta, execution, &mut summary).await?,
                Some(Err(e)) if e.is_cancelled() => {}
                Some(Err(e)) => {
                    // 只有执行包装本身失败才会到这里
                    error!("Task join failed: {}", e);
                    summary.failed += 1;
                }
                None => {}
            }
        }

        summary.written = self.sink.written();
        info!(
            "Run finished: {} completed, {} failed, {} retried, {} written",
            summary.completed, summary.failed, summary.retried, summary.written
        );
        Ok(summary)
    }

    fn spawn(&self, in_flight: &mut JoinSet<(Task, Execution)>, task: PipelineTask) {
        let meta = task.meta().clone();
        let context = self.context.clone();
        in_flight.spawn(async move {
            let execution = match AssertUnwindSafe(execute(task, &context)).catch_unwind().await {
                Ok(execution) => execution,
                Err(panic) => Execution::Failed(TaskError::Panicked(panic_message(panic.as_ref()))),
            };
            (meta, execution)
        });
    }

    async fn settle(
        &self,
        meta: Task,
        execution: Execution,
        summary: &mut RunSummary,
    ) -> Result<(), SchedulerError> {
        let kind = meta.kind;
        match execution {
            Execution::Done(output) => {
                record(kind, "completed");
                summary.completed += 1;
                if let Some(entry) = output.result {
                    self.sink.admit(&entry)?;
                }
                for child in output.children {
                    self.queue.enqueue(child).await?;
                }
            }
            Execution::Transport(task, e) if task.meta().can_retry() => {
                warn!(
                    "{} task {} failed ({}), {} retries left",
                    kind,
                    meta.id,
                    e,
                    task.meta().remaining_retries()
                );
                match task.transition(Task::requeue) {
                    Ok(task) => {
                        record(kind, "retried");
                        summary.retried += 1;
                        self.queue.enqueue(task).await?;
                    }
                    Err(e) => {
                        error!("Could not requeue task {}: {}", meta.id, e);
                        summary.failed += 1;
                    }
                }
            }
            Execution::Transport(_, e) => {
                record(kind, "failed");
                summary.failed += 1;
                warn!("{} task {} exhausted retries: {}", kind, meta.id, e);
            }
            Execution::Failed(e) => {
                record(kind, "failed");
                summary.failed += 1;
                warn!("{} task {} failed: {}", kind, meta.id, e);
            }
        }
        Ok(())
    }
}

async fn execute(task: PipelineTask, context: &PipelineContext) -> Execution {
    if let Err(e) = task.validate() {
        return Execution::Failed(e);
    }

    let request = task.page_request(context);
    match context.load(&request).await {
        Err(e) if !task.processes_fetch_errors() => {
            Execution::Transport(task, TaskError::Transport(e))
        }
        page => outcome(task.process(page, context).await),
    }
}

fn outcome(result: Result<TaskOutput, TaskError>) -> Execution {
    match result {
        Ok(output) => Execution::Done(output),
        Err(e) => Execution::Failed(e),
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn record(kind: TaskKind, outcome: &'static str) {
    metrics::counter!("pipeline_task_total", "kind" => kind.to_string(), "outcome" => outcome)
        .increment(1);
}
