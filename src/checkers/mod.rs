// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 检查器模块
///
/// 外部检查器接口、按来源类型的注册表与基于 reqwest 的整页检查器
pub mod http_checker;
pub mod registry;
pub mod traits;
