// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 调度模块
///
/// 来源监视调度器及其在途来源集合
pub mod in_flight;
pub mod scheduler;
