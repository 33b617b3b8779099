// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::dispatch::{SendLogRecord, SendStatus};
use crate::infrastructure::curation_log::{open_append, CsvLogError};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::path::Path;
use tracing::{debug, warn};

struct SendLogState {
    statuses: HashMap<String, SendStatus>,
    in_flight: HashSet<String>,
    writer: csv::Writer<File>,
}

/// 持久化的发送日志
///
/// 启动时读入已有记录，之后只追加。日志是断点续发的依据：
/// 已成功发送的地址不会再次发送，进行中的地址不会被其他工作协程领取。
pub struct SendLog {
    state: Mutex<SendLogState>,
}

impl SendLog {
    /// 打开发送日志，读入已有记录
    ///
    /// # 参数
    ///
    /// * `path` - 日志路径，不存在时创建
    ///
    /// # 返回值
    ///
    /// * `Ok(SendLog)` - 已加载的日志
    /// * `Err(CsvLogError)` - 文件无法读取或写入
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CsvLogError> {
        let path = path.as_ref();
        let mut statuses = HashMap::new();
        if path.exists() {
            let mut reader = csv::Reader::from_path(path)?;
            for row in reader.deserialize::<SendLogRecord>() {
                match row {
                    Ok(record) => {
                        let email = record.email.trim().to_lowercase();
                        let status = SendStatus::parse(&record.status);
                        // a later failure never hides an earlier success
                        let keep_previous = statuses.get(&email).is_some_and(SendStatus::is_sent);
                        if !keep_previous {
                            statuses.insert(email, status);
                        }
                    }
                    Err(e) => warn!("Skipping malformed send log row: {}", e),
                }
            }
            debug!("Loaded {} addresses from send log", statuses.len());
        }

        Ok(Self {
            state: Mutex::new(SendLogState {
                statuses,
                in_flight: HashSet::new(),
                writer: open_append(path)?,
            }),
        })
    }

    /// 地址是否已成功发送过
    pub fn already_sent(&self, email: &str) -> bool {
        self.state
            .lock()
            .statuses
            .get(&email.trim().to_lowercase())
            .is_some_and(SendStatus::is_sent)
    }

    /// 领取地址；已发送或正在发送时返回 false
    pub fn try_claim(&self, email: &str) -> bool {
        let email = email.trim().to_lowercase();
        let mut state = self.state.lock();
        if state.statuses.get(&email).is_some_and(SendStatus::is_sent) {
            return false;
        }
        state.in_flight.insert(email)
    }

    /// 放弃已领取的地址（未发送）
    pub fn release(&self, email: &str) {
        self.state.lock().in_flight.remove(&email.trim().to_lowercase());
    }

    /// 追加一次发送结果并释放领取
    ///
    /// 内存状态先于落盘更新：写入失败时本次运行也不会重发同一地址。
    pub fn record_outcome(&self, record: SendLogRecord) -> Result<(), CsvLogError> {
        let email = record.email.trim().to_lowercase();
        let status = SendStatus::parse(&record.status);
        let mut state = self.state.lock();
        if !state.statuses.get(&email).is_some_and(SendStatus::is_sent) {
            state.statuses.insert(email.clone(), status);
        }
        state.in_flight.remove(&email);
        state.writer.serialize(&record)?;
        state.writer.flush()?;
        Ok(())
    }
}

/// 退订列表，每行一个地址；文件不存在视为空列表
#[derive(Debug, Clone, Default)]
pub struct OptOutList {
    addresses: HashSet<String>,
}

impl OptOutList {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CsvLogError> {
        let path = path.as_ref();
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No opt-out list at {}", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(CsvLogError::Open {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        Ok(Self::from_iter(text.lines()))
    }

    pub fn contains(&self, email: &str) -> bool {
        self.addresses.contains(&email.trim().to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }
}

impl<'a> FromIterator<&'a str> for OptOutList {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        Self {
            addresses: iter
                .into_iter()
                .map(|l| l.trim().to_lowercase())
                .filter(|l| !l.is_empty() && !l.starts_with('#'))
                .collect(),
        }
    }
}
