// Copyright 2026 The Scriptguard Project
// SPDX-License-Identifier: Apache-2.0

pub mod action;
pub mod config;
pub mod eval;
pub mod extract;
pub mod normalize;
pub mod outcome;
pub mod pipeline;
pub mod placeholder;
pub mod stream;
pub mod validate;
