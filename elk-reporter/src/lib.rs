// Copyright (c) The elk-reporter Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Test outcome reporting and duration-based run slicing, backed by an
//! Elasticsearch-compatible document store.
//!
//! The host test runner feeds a [`session::ReporterSession`] one
//! [`events::PhaseReport`] per lifecycle phase of each test. The session
//! reconciles those phases into exactly one [`record::FinalRecord`] per test
//! (or sub-test), tallies [`stats::RunStats`], and publishes each record
//! best-effort to the backend; a run is never failed by reporting problems.
//!
//! Separately, at collection time, [`history::DurationFetcher`] pulls
//! per-test duration percentiles from the same backend and
//! [`partition::pack`] splits the planned run into duration-bounded slices
//! for parallel executors.

pub mod config;
pub mod errors;
pub mod events;
pub mod history;
pub mod outcome;
pub mod partition;
pub mod record;
pub mod reconciler;
pub mod session;
pub mod sink;
pub mod stats;
