// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 配置模块
///
/// 处理应用程序的配置设置、环境变量以及启动时加载的查找表
pub mod config;

/// 领域模块
///
/// 包含核心业务实体与各解析器服务
pub mod domain;

/// 引擎模块
///
/// 实现 HTTP 抓取与无头浏览器渲染
pub mod engines;

/// 基础设施模块
///
/// 提供外部服务集成，如 DNS、WHOIS、查询服务与 CSV 文件
pub mod infrastructure;

/// 队列模块
///
/// 实现任务队列和调度功能
pub mod queue;

/// 任务模块
///
/// 搜索、商户与邮箱三类任务组成的任务图
pub mod tasks;

/// 工具模块
///
/// 提供通用的工具函数和辅助功能
pub mod utils;

/// 工作器模块
///
/// 实现限速的外发队列
pub mod workers;

#[cfg(test)]
mod test_support;
