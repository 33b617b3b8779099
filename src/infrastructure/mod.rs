// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 基础设施层模块
///
/// 该模块包含系统的技术实现细节，负责与外部系统的交互。
///
/// 包含的子模块：
/// - DNS（dns）：地址与名称服务器查询
/// - WHOIS（whois）：TCP 43 端口查询与 IANA 引荐
/// - IP 元数据（ip_metadata）与主机情报（host_intel）：HTTP 查询服务
/// - 未匹配名称服务器日志（curation_log）
/// - 结果输出（result_sink）、发送日志（send_log）与种子文件读取（seed_reader）
pub mod curation_log;
pub mod dns;
pub mod host_intel;
pub mod ip_metadata;
pub mod result_sink;
pub mod seed_reader;
pub mod send_log;
pub mod whois;
