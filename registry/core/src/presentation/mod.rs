// Copyright (c) 2026 Props Contributors
// SPDX-License-Identifier: AGPL-3.0

pub mod api;
