// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域层模块
///
/// 该模块包含系统的核心业务逻辑，包括：
/// - 领域模型（models）：商户记录、任务与外发记录
/// - 服务（services）：排除过滤、各解析器与富化流水线
///
/// 领域层只通过 trait 依赖抓取器、DNS 与 WHOIS 等外部能力。
pub mod models;
pub mod services;
