// Copyright (c) The elk-reporter Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Partitioning a planned run into duration-bounded slices.
//!
//! Tests are packed first-fit over a list sorted ascending by estimated
//! duration: each test goes into the first slice that still has budget for
//! it, or opens a new slice. A test whose own estimate exceeds the budget
//! gets a slice to itself; tests are never split or dropped. Packing is
//! fully deterministic for a given input order.

use crate::{
    errors::SliceFileError,
    history::{DurationFetcher, DurationSample},
    sink::ElasticSink,
};
use camino::Utf8Path;
use smol_str::SmolStr;
use tracing::info;

/// One duration-bounded partition of the test list.
#[derive(Clone, Debug, PartialEq)]
pub struct Slice {
    tests: Vec<SmolStr>,
    total: f64,
}

impl Slice {
    /// The tests in this slice, in packing order.
    pub fn tests(&self) -> &[SmolStr] {
        &self.tests
    }

    /// The cumulative estimated duration of this slice, in seconds.
    pub fn total_duration(&self) -> f64 {
        self.total
    }

    /// The cumulative duration rendered as `H:MM:SS`, for run logs.
    pub fn display_duration(&self) -> String {
        let total = self.total.round() as u64;
        let hours = total / 3600;
        let minutes = (total % 3600) / 60;
        let seconds = total % 60;
        format!("{hours}:{minutes:02}:{seconds:02}")
    }
}

/// Packs duration samples into slices whose totals stay within
/// `budget_seconds`.
///
/// `samples` must already be sorted ascending by duration (the shape
/// [`DurationFetcher::fetch`] returns). The scan over existing slices is in
/// creation order, so the output is identical for identical input.
pub fn pack(samples: &[DurationSample], budget_seconds: f64) -> Vec<Slice> {
    let mut slices: Vec<Slice> = Vec::new();
    for sample in samples {
        match slices
            .iter_mut()
            .find(|slice| slice.total + sample.duration <= budget_seconds)
        {
            Some(slice) => {
                slice.tests.push(sample.name.clone());
                slice.total += sample.duration;
            }
            None => slices.push(Slice {
                tests: vec![sample.name.clone()],
                total: sample.duration,
            }),
        }
    }
    slices
}

/// Fetches duration history for `identities` and packs them into slices.
///
/// Convenience for the collection-only slicing flow: history retrieval (with
/// `default_seconds` as the no-history fallback, `max_parallel` concurrent
/// queries) followed by [`pack`].
pub fn slice_tests(
    sink: &ElasticSink,
    identities: &[SmolStr],
    budget_seconds: f64,
    default_seconds: f64,
    max_parallel: usize,
) -> Vec<Slice> {
    let samples = DurationFetcher::new(sink).fetch(identities, default_seconds, max_parallel);
    let slices = pack(&samples, budget_seconds);
    for (index, slice) in slices.iter().enumerate() {
        info!(
            slice = index,
            tests = slice.tests().len(),
            duration = %slice.display_duration(),
            "packed slice"
        );
    }
    slices
}

/// Writes one `include_NNN.txt` manifest per slice into `dir`.
///
/// Each manifest is a newline-separated list of test identities. Manifests
/// left over from a prior run are deleted first, so the directory always
/// reflects exactly the latest packing.
pub fn write_slice_files(slices: &[Slice], dir: &Utf8Path) -> Result<(), SliceFileError> {
    std::fs::create_dir_all(dir).map_err(|error| SliceFileError::new(dir, error))?;

    let read_dir = dir
        .read_dir_utf8()
        .map_err(|error| SliceFileError::new(dir, error))?;
    for entry in read_dir {
        let entry = entry.map_err(|error| SliceFileError::new(dir, error))?;
        let file_name = entry.file_name();
        if file_name.starts_with("include_") && file_name.ends_with(".txt") {
            std::fs::remove_file(entry.path())
                .map_err(|error| SliceFileError::new(entry.path(), error))?;
        }
    }

    for (index, slice) in slices.iter().enumerate() {
        let path = dir.join(format!("include_{index:03}.txt"));
        let mut contents = String::new();
        for test in slice.tests() {
            contents.push_str(test);
            contents.push('\n');
        }
        std::fs::write(&path, contents).map_err(|error| SliceFileError::new(&path, error))?;
    }
    Ok(())
}
