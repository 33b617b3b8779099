// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::entry::{Entry, EntryRecord};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// 结果写出错误
#[derive(Error, Debug)]
pub enum SinkError {
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// 单条记录的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkDecision {
    /// 已写出
    Written,
    /// 邮箱、电话或名称已出现过
    Duplicate,
    /// 没有任何富化字段
    NoEnrichment,
}

impl SinkDecision {
    fn label(self) -> &'static str {
        match self {
            SinkDecision::Written => "written",
            SinkDecision::Duplicate => "duplicate",
            SinkDecision::NoEnrichment => "no_enrichment",
        }
    }
}

#[derive(Default)]
struct SeenSets {
    emails: HashSet<String>,
    phones: HashSet<String>,
    names: HashSet<String>,
}

struct SinkState<W: Write> {
    seen: SeenSets,
    writer: csv::Writer<W>,
    written: usize,
}

/// 结果输出
///
/// 在一个输出批次内按邮箱、电话、名称去重，每个身份最多写出一次。
/// 查重与写入在同一把锁内完成。
pub struct ResultSink<W: Write> {
    state: Mutex<SinkState<W>>,
}

impl ResultSink<File> {
    /// 创建输出文件（覆盖已有文件）
    pub fn create(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Self::new(File::create(path)?))
    }
}

impl<W: Write> ResultSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            state: Mutex::new(SinkState {
                seen: SeenSets::default(),
                writer: csv::Writer::from_writer(writer),
                written: 0,
            }),
        }
    }

    /// 提交一条记录
    ///
    /// # 返回值
    ///
    /// * `Ok(SinkDecision)` - 写出、重复或无富化数据
    /// * `Err(SinkError)` - 写出失败
    pub fn admit(&self, entry: &Entry) -> Result<SinkDecision, SinkError> {
        let decision = self.admit_inner(entry)?;
        metrics::counter!("result_sink_total", "decision" => decision.label()).increment(1);
        if decision != SinkDecision::Written {
            debug!("Dropping {:?}: {:?}", entry.title, decision);
        }
        Ok(decision)
    }

    fn admit_inner(&self, entry: &Entry) -> Result<SinkDecision, SinkError> {
        if entry.enrichment.is_empty() {
            return Ok(SinkDecision::NoEnrichment);
        }

        let email = entry.email.trim().to_lowercase();
        let phone: String = entry.phone.chars().filter(|c| !c.is_whitespace()).collect();
        let name = entry.title.trim().to_lowercase();

        let mut state = self.state.lock();
        let seen = &state.seen;
        if (!email.is_empty() && seen.emails.contains(&email))
            || (!phone.is_empty() && seen.phones.contains(&phone))
            || (!name.is_empty() && seen.names.contains(&name))
        {
            return Ok(SinkDecision::Duplicate);
        }

        state.writer.serialize(EntryRecord::from(entry))?;
        state.writer.flush()?;
        state.written += 1;

        if !email.is_empty() {
            state.seen.emails.insert(email);
        }
        if !phone.is_empty() {
            state.seen.phones.insert(phone);
        }
        if !name.is_empty() {
            state.seen.names.insert(name);
        }
        Ok(SinkDecision::Written)
    }

    /// 已写出的记录数
    pub fn written(&self) -> usize {
        self.state.lock().written
    }

    /// 结束批次，返回底层写入器
    pub fn finish(self) -> Result<W, SinkError> {
        let state = self.state.into_inner();
        state
            .writer
            .into_inner()
            .map_err(|e| SinkError::Io(e.into_error()))
    }
}

/// 读回结果文件，用于外发批次
pub fn load_entries(path: impl AsRef<Path>) -> Result<Vec<Entry>, SinkError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path.as_ref())?;
    reader
        .deserialize::<EntryRecord>()
        .map(|row| row.map(Entry::from).map_err(SinkError::from))
        .collect()
}
