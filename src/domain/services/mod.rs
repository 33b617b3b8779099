// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域服务模块
///
/// 包含的服务：
/// - 排除过滤（exclusion_filter）：富化前丢弃无关域名
/// - 协议解析（protocol_resolver）：https 优先，回退 http
/// - 技术识别（technology_resolver）：静态分析，必要时浏览器渲染
/// - 托管商解析（hosting_resolver）：四阶段级联
/// - 可用性检测（availability_checker）：带退避与确认请求的状态标签
/// - 维护检测（maintenance_detector）与 Cookie 横幅检测（cookie_banner）
/// - PageSpeed 评分（pagespeed_service）
/// - 邮箱提取（email_extractor）
/// - 模板选择（template_selector）
/// - 富化流水线（enrichment_service）：按固定顺序串联上述解析器
pub mod availability_checker;
pub mod cookie_banner;
pub mod email_extractor;
pub mod enrichment_service;
pub mod exclusion_filter;
pub mod hosting_resolver;
pub mod maintenance_detector;
pub mod pagespeed_service;
pub mod protocol_resolver;
pub mod resolution;
pub mod technology_resolver;
pub mod template_selector;
