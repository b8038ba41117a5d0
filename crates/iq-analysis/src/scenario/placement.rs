// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Transmitter time placement.
//!
//! All transmitters share the same frequency columns, so placement only
//! decides start rows.

use rand::Rng;

use super::InvalidParameterError;

/// Half-open intervals `[a, a+len)` and `[b, b+len)` intersect.
pub(super) fn overlaps(a: usize, b: usize, len: usize) -> bool {
    a < b + len && a + len > b
}

/// Draw start rows uniformly, rejecting any that overlap an earlier transmitter.
///
/// Each transmitter gets at most `max_attempts` draws.
pub(super) fn random<R: Rng + ?Sized>(
    rows: usize,
    active_time: usize,
    count: usize,
    max_attempts: usize,
    rng: &mut R,
) -> Result<Vec<usize>, InvalidParameterError> {
    let latest = rows - active_time;
    let mut starts: Vec<usize> = Vec::with_capacity(count);

    for index in 0..count {
        let mut attempts = 0;
        let start = loop {
            if attempts == max_attempts {
                return Err(InvalidParameterError::PlacementExhausted { index, attempts });
            }
            attempts += 1;

            let candidate = rng.gen_range(0..=latest);
            if starts.iter().all(|&other| !overlaps(candidate, other, active_time)) {
                break candidate;
            }
        };

        log::trace!("Transmitter {index} placed at row {start} after {attempts} draws");
        starts.push(start);
    }

    Ok(starts)
}

/// Place one transmitter in the upper part of the span and the rest at a fixed gap after it.
///
/// With `T = (rows - active_time) / 3`, the first start is drawn from
/// `[T/2, T/2 + T]`. Transmitter `i >= 1` starts at
/// `first + active_time + i * gap` where
/// `gap = (rows - first - active_time) / count`. Later starts are not checked
/// against `rows`.
pub(super) fn equally_spaced<R: Rng + ?Sized>(
    rows: usize,
    active_time: usize,
    count: usize,
    rng: &mut R,
) -> Vec<usize> {
    let latest = rows - active_time;
    if count == 1 {
        return vec![rng.gen_range(0..=latest)];
    }

    let top_third = latest / 3;
    let margin = top_third / 2;
    let first = rng.gen_range(margin..=margin + top_third);
    let gap = (latest - first) / count;

    let starts: Vec<usize> = std::iter::once(first)
        .chain((1..count).map(|i| first + active_time + i * gap))
        .collect();

    if let Some(&last) = starts.last() {
        if last + active_time > rows {
            log::warn!(
                "Equally spaced layout extends past row {rows} (last start {last}); bursts will be clipped"
            );
        }
    }

    starts
}
