// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Error types for caller memory access.
//!
//! Both faults are expected, recoverable outcomes: handlers translate
//! them into "leave the operation untouched" rather than failing the
//! caller's operation.

/// Reading caller-owned memory faulted before the bound was reached.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("fault while reading caller memory")]
pub struct ReadFault;

/// Writing to caller-owned memory faulted.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("fault while writing caller memory")]
pub struct WriteFault;
