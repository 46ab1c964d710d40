// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests Module

mod array_operators;
mod version_matching;
