// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// CSV 文件写入错误
#[derive(Error, Debug)]
pub enum CsvLogError {
    #[error("cannot open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// 未匹配的名称服务器，供人工补充托管商表
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnmatchedNameserver {
    pub domain: String,
    pub raw_nameserver: String,
    pub normalized: String,
    pub whois_guess: String,
    pub logged_at: String,
}

/// 追加写入的未匹配名称服务器日志
pub struct UnmatchedNameserverLog {
    writer: Mutex<csv::Writer<File>>,
}

impl UnmatchedNameserverLog {
    /// 打开日志文件，新文件写入表头
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CsvLogError> {
        Ok(Self {
            writer: Mutex::new(open_append(path.as_ref())?),
        })
    }

    pub fn record(
        &self,
        domain: &str,
        raw_nameserver: &str,
        normalized: &str,
        whois_guess: &str,
    ) -> Result<(), CsvLogError> {
        let row = UnmatchedNameserver {
            domain: domain.to_string(),
            raw_nameserver: raw_nameserver.to_string(),
            normalized: normalized.to_string(),
            whois_guess: whois_guess.to_string(),
            logged_at: Utc::now().to_rfc3339(),
        };
        let mut writer = self.writer.lock();
        writer.serialize(row)?;
        writer.flush()?;
        Ok(())
    }
}

/// 以追加方式打开 CSV；文件为空时由 writer 写表头
pub fn open_append(path: &Path) -> Result<csv::Writer<File>, CsvLogError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| CsvLogError::Open {
            path: path.to_path_buf(),
            source,
        })?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| CsvLogError::Open {
            path: path.to_path_buf(),
            source,
        })?;
    let is_new = file.metadata()?.len() == 0;
    Ok(csv::WriterBuilder::new()
        .has_headers(is_new)
        .from_writer(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_header_written_once() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/unmatched.csv");

        let log = UnmatchedNameserverLog::open(&path).unwrap();
        log.record("a.it", "ns1.foo.net.", "foo.net", "Aruba").unwrap();
        drop(log);
        let log = UnmatchedNameserverLog::open(&path).unwrap();
        log.record("b.it", "dns.bar.org", "bar.org", "").unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("domain,raw_nameserver,normalized,whois_guess,logged_at"));
        assert!(lines[1].starts_with("a.it,ns1.foo.net.,foo.net,Aruba,"));
        assert!(lines[2].starts_with("b.it,dns.bar.org,bar.org,,"));
    }
}
