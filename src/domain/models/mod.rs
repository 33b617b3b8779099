// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域模型模块
///
/// 该模块定义了系统的核心业务实体，包括：
/// - 商户记录（entry）：富化结果的聚合体与输出行
/// - 原始载荷（payload）：商户详情的嵌套数组
/// - 搜索查询（query）：关键词与地区的组合
/// - 任务（task）：任务图中的执行单元
/// - 外发记录（dispatch）：待发送消息与发送日志
pub mod dispatch;
pub mod entry;
pub mod payload;
pub mod query;
pub mod task;
