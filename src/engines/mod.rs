// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 引擎模块
///
/// 定义抓取与浏览器渲染能力，并提供基于 reqwest 与 chromiumoxide 的实现
pub mod chromium_engine;
pub mod reqwest_engine;
pub mod traits;
