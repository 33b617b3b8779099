// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use config::{builder::DefaultState, Config, ConfigBuilder, ConfigError, Environment, File};
use serde::Deserialize;
use std::time::Duration;

/// 应用程序配置设置
///
/// 包含抓取、各解析器、查找表路径以及外发队列的所有配置项
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// 日志配置
    pub log: LogSettings,
    /// HTTP 抓取配置
    pub http: HttpSettings,
    /// 可用性检测配置
    pub availability: AvailabilitySettings,
    /// 托管商解析配置
    pub hosting: HostingSettings,
    /// PageSpeed 评分配置
    pub pagespeed: PageSpeedSettings,
    /// 查找表路径
    pub tables: TableSettings,
    /// 任务图配置
    pub scraper: ScraperSettings,
    /// 外发队列配置
    pub dispatch: DispatchSettings,
}

/// 日志配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct LogSettings {
    /// 输出格式 (text, json)
    pub format: String,
}

/// HTTP 抓取配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct HttpSettings {
    /// 请求使用的 User-Agent
    pub user_agent: String,
    /// 协议探测与页面抓取的超时时间（秒）
    pub request_timeout_secs: u64,
    /// 技术识别时最多额外抓取的脚本数
    pub script_fetch_limit: usize,
    /// 外部脚本抓取超时时间（秒）
    pub script_timeout_secs: u64,
    /// 浏览器渲染超时时间（秒）
    pub browser_timeout_secs: u64,
}

/// 可用性检测配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct AvailabilitySettings {
    /// 最大尝试次数
    pub max_attempts: u32,
    /// 最大重定向次数
    pub max_redirects: u32,
    /// 单次请求超时时间（秒）
    pub timeout_secs: u64,
    /// 退避下限（毫秒）
    pub initial_backoff_ms: u64,
    /// 退避上限（毫秒）
    pub max_backoff_ms: u64,
    /// 最终确认请求的超时时间（秒）
    pub confirm_timeout_secs: u64,
    /// 503 `Retry-After` 等待上限（秒），不受退避上限约束
    pub max_retry_after_secs: u64,
}

/// 托管商解析配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct HostingSettings {
    /// IP 元数据服务端点
    pub ip_metadata_endpoint: String,
    /// 主机情报服务端点
    pub intel_endpoint: String,
    /// 主机情报服务密钥，未设置时跳过该阶段
    pub intel_api_key: Option<String>,
    /// 固定的 WHOIS 服务器，未设置时通过 IANA 查询
    pub whois_server: Option<String>,
    /// WHOIS 超时时间（秒）
    pub whois_timeout_secs: u64,
    /// 外部查询超时时间（秒）
    pub lookup_timeout_secs: u64,
    /// 单个阶段遇到瞬时错误时的最大尝试次数
    pub stage_attempts: u32,
    /// 未匹配名称服务器日志路径
    pub unmatched_log_path: String,
}

/// PageSpeed 评分配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct PageSpeedSettings {
    /// 是否启用
    pub enabled: bool,
    /// 服务端点
    pub endpoint: String,
    /// API 密钥
    pub api_key: Option<String>,
    /// 最大尝试次数
    pub max_attempts: u32,
    /// 重试间隔（毫秒）
    pub retry_delay_ms: u64,
    /// 请求超时时间（秒）
    pub timeout_secs: u64,
}

/// 查找表路径设置
#[derive(Debug, Clone, Deserialize)]
pub struct TableSettings {
    /// 平台特征表 (JSON)
    pub platform_signatures: String,
    /// 排除域名表（每行一个域名）
    pub excluded_domains: String,
    /// 托管商模式表 (JSON)
    pub hosting_providers: String,
    /// 外发消息模板 (JSON)
    pub message_templates: String,
}

/// 任务图配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct ScraperSettings {
    /// 并发执行的任务数
    pub concurrency: usize,
    /// 搜索语言
    pub language_code: String,
    /// 结果列表最大滚动次数
    pub max_scroll_depth: u32,
    /// 是否抓取联系邮箱
    pub extract_email: bool,
    /// 结果 CSV 路径
    pub output_path: String,
}

/// 外发队列配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct DispatchSettings {
    /// 工作协程数量
    pub workers: usize,
    /// 队列容量
    pub queue_capacity: usize,
    /// 每小时最多发送数
    pub sends_per_hour: u32,
    /// 每日发送上限
    pub daily_cap: u32,
    /// 每发送 N 封后暂停
    pub pause_every: u32,
    /// 暂停时长（秒）
    pub pause_secs: u64,
    /// 发送日志路径
    pub send_log_path: String,
    /// 退订列表路径
    pub opt_out_path: String,
    /// 直接排除的收件域名后缀（如认证邮箱）
    pub excluded_suffixes: Vec<String>,
    /// 评分低于此阈值时在评估邮件中提示性能问题
    pub performance_threshold: u8,
}

impl HttpSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn script_timeout(&self) -> Duration {
        Duration::from_secs(self.script_timeout_secs)
    }

    pub fn browser_timeout(&self) -> Duration {
        Duration::from_secs(self.browser_timeout_secs)
    }
}

impl Settings {
    /// 创建新的配置实例
    ///
    /// 依次叠加内置默认值、`config/default`、`config/{APP_ENVIRONMENT}` 与 `SITESCOUT__*` 环境变量
    ///
    /// # Returns
    ///
    /// * `Ok(Settings)` - 成功加载的配置
    /// * `Err(ConfigError)` - 配置加载失败
    pub fn new() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "default".to_string());
        Self::with_defaults()?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(
                Environment::with_prefix("SITESCOUT")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("dispatch.excluded_suffixes")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// 仅包含内置默认值的配置构建器
    pub fn with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Config::builder()
            .set_default("log.format", "text")?
            // HTTP
            .set_default("http.user_agent", "Mozilla/5.0 (compatible; sitescout/0.1)")?
            .set_default("http.request_timeout_secs", 15)?
            .set_default("http.script_fetch_limit", 5)?
            .set_default("http.script_timeout_secs", 5)?
            .set_default("http.browser_timeout_secs", 30)?
            // Availability
            .set_default("availability.max_attempts", 3)?
            .set_default("availability.max_redirects", 5)?
            .set_default("availability.timeout_secs", 10)?
            .set_default("availability.initial_backoff_ms", 1000)?
            .set_default("availability.max_backoff_ms", 8000)?
            .set_default("availability.confirm_timeout_secs", 30)?
            .set_default("availability.max_retry_after_secs", 300)?
            // Hosting
            .set_default("hosting.ip_metadata_endpoint", "http://ip-api.com/json")?
            .set_default("hosting.intel_endpoint", "https://api.shodan.io")?
            .set_default("hosting.whois_timeout_secs", 8)?
            .set_default("hosting.lookup_timeout_secs", 5)?
            .set_default("hosting.stage_attempts", 2)?
            .set_default("hosting.unmatched_log_path", "data/unmatched_nameservers.csv")?
            // PageSpeed
            .set_default("pagespeed.enabled", false)?
            .set_default(
                "pagespeed.endpoint",
                "https://www.googleapis.com/pagespeedonline/v5/runPagespeed",
            )?
            .set_default("pagespeed.max_attempts", 3)?
            .set_default("pagespeed.retry_delay_ms", 2000)?
            .set_default("pagespeed.timeout_secs", 60)?
            // Tables
            .set_default("tables.platform_signatures", "config/platform_signatures.json")?
            .set_default("tables.excluded_domains", "config/excluded_domains.txt")?
            .set_default("tables.hosting_providers", "config/hosting_providers.json")?
            .set_default("tables.message_templates", "config/message_templates.json")?
            // Scraper
            .set_default("scraper.concurrency", 4)?
            .set_default("scraper.language_code", "en")?
            .set_default("scraper.max_scroll_depth", 10)?
            .set_default("scraper.extract_email", true)?
            .set_default("scraper.output_path", "data/results.csv")?
            // Dispatch
            .set_default("dispatch.workers", 5)?
            .set_default("dispatch.queue_capacity", 100)?
            .set_default("dispatch.sends_per_hour", 100)?
            .set_default("dispatch.daily_cap", 400)?
            .set_default("dispatch.pause_every", 25)?
            .set_default("dispatch.pause_secs", 600)?
            .set_default("dispatch.send_log_path", "data/send_log.csv")?
            .set_default("dispatch.opt_out_path", "data/opt_out.txt")?
            .set_default("dispatch.excluded_suffixes", vec!["pec.it", "legalmail.it", "pec.aruba.it"])?
            .set_default("dispatch.performance_threshold", 75)
    }
}

#[cfg(test)]
#[path = "settings_test.rs"]
mod tests;
