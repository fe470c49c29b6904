//! Lookup table discovery.
//!
//! The firmware image carries no pointer to the map lookup table, so its start
//! is inferred from structure alone: a run of consecutive, contiguous,
//! plausible records is taken as evidence that the table begins at the first
//! record of the run. When a run breaks before reaching the threshold, the
//! scan resumes one alignment step after the run's first record.

use std::num::NonZeroUsize;

use thiserror::Error;

use crate::mapinfo::{classify, is_plausible};

/// Consecutive plausible records required to accept a table start.
pub const DEFAULT_MIN_RUN: NonZeroUsize = NonZeroUsize::new(5).unwrap();
/// Byte alignment of candidate record starts.
pub const DEFAULT_ALIGNMENT: NonZeroUsize = NonZeroUsize::new(4).unwrap();

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocateError {
    #[error("cannot determine lookup table offset")]
    TableNotFound,
}

/// Tunable parameters of the table scan.
///
/// # Examples
/// ```
/// use densoxdf_core::LocatorConfig;
///
/// let config = LocatorConfig::default();
/// assert_eq!(config.min_run().get(), 5);
/// assert_eq!(config.alignment().get(), 4);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocatorConfig {
    min_run: NonZeroUsize,
    alignment: NonZeroUsize,
}

impl LocatorConfig {
    pub fn new(min_run: NonZeroUsize, alignment: NonZeroUsize) -> Self {
        Self { min_run, alignment }
    }

    pub fn min_run(&self) -> NonZeroUsize {
        self.min_run
    }

    pub fn alignment(&self) -> NonZeroUsize {
        self.alignment
    }
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            min_run: DEFAULT_MIN_RUN,
            alignment: DEFAULT_ALIGNMENT,
        }
    }
}

/// State of the table scan between two probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    /// No run in progress.
    Idle,
    /// `run` contiguous plausible records found, the first at `candidate`.
    Accumulating { candidate: usize, run: usize },
    /// Table start accepted.
    Found(usize),
}

impl ScanState {
    /// Advance the scan after probing `position`.
    ///
    /// `hit` is the record size when a plausible record starts at `position`.
    /// Returns the next state and the next position to probe.
    pub fn step(
        self,
        position: usize,
        hit: Option<usize>,
        config: &LocatorConfig,
    ) -> (ScanState, usize) {
        let alignment = config.alignment().get();
        match (self, hit) {
            (ScanState::Found(offset), _) => (ScanState::Found(offset), position),
            (ScanState::Idle, Some(size)) => {
                Self::extend(position, 1, position, size, config)
            }
            (ScanState::Accumulating { candidate, run }, Some(size)) => {
                Self::extend(candidate, run + 1, position, size, config)
            }
            (ScanState::Idle, None) => (ScanState::Idle, position.saturating_add(alignment)),
            (ScanState::Accumulating { candidate, .. }, None) => {
                (ScanState::Idle, candidate.saturating_add(alignment))
            }
        }
    }

    fn extend(
        candidate: usize,
        run: usize,
        position: usize,
        size: usize,
        config: &LocatorConfig,
    ) -> (ScanState, usize) {
        if run >= config.min_run().get() {
            (ScanState::Found(candidate), position)
        } else {
            (
                ScanState::Accumulating { candidate, run },
                position.saturating_add(size),
            )
        }
    }
}

/// Size of the plausible record starting at `position`, if any.
///
/// A window running past the end of the image is not a record.
pub fn probe(image: &[u8], position: usize) -> Option<usize> {
    let type_id = *image.get(position)?;
    let size = classify(type_id).ok()?.record_size();
    let window = image.get(position..position.checked_add(size)?)?;
    is_plausible(window, image.len()).then_some(size)
}

/// Find the lookup table start with the default scan parameters.
///
/// # Errors
/// Returns `LocateError::TableNotFound` when no qualifying run exists.
pub fn find_lookup_table_offset(image: &[u8]) -> Result<usize, LocateError> {
    find_lookup_table_offset_with(image, &LocatorConfig::default())
}

/// Find the lookup table start with explicit scan parameters.
///
/// # Errors
/// Returns `LocateError::TableNotFound` when the scan reaches the end of the
/// image without a run of `config.min_run()` records.
pub fn find_lookup_table_offset_with(
    image: &[u8],
    config: &LocatorConfig,
) -> Result<usize, LocateError> {
    let mut state = ScanState::Idle;
    let mut position = 0;

    while position < image.len() {
        let hit = probe(image, position);
        let (next, next_position) = state.step(position, hit, config);
        if let ScanState::Found(offset) = next {
            return Ok(offset);
        }
        state = next;
        position = next_position;
    }

    Err(LocateError::TableNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_2d(x_address: u32, z_address: u32) -> [u8; 16] {
        let mut bytes = [0u8; 16];
        bytes[0] = 0x09;
        bytes[1] = 0x1d;
        bytes[2] = 0xff;
        bytes[3] = 0xff;
        bytes[4..8].copy_from_slice(&x_address.to_be_bytes());
        bytes[8..12].copy_from_slice(&z_address.to_be_bytes());
        bytes
    }

    fn record_3d(x_address: u32, y_address: u32, z_address: u32) -> [u8; 20] {
        let mut bytes = [0u8; 20];
        bytes[0] = 0x29;
        bytes[1] = 0x06;
        bytes[2] = 0x19;
        bytes[3] = 0xff;
        bytes[4..8].copy_from_slice(&x_address.to_be_bytes());
        bytes[8..12].copy_from_slice(&y_address.to_be_bytes());
        bytes[12..16].copy_from_slice(&z_address.to_be_bytes());
        bytes
    }

    fn filler(len: usize) -> Vec<u8> {
        vec![0xff; len]
    }

    fn config(min_run: usize, alignment: usize) -> LocatorConfig {
        LocatorConfig::new(
            NonZeroUsize::new(min_run).unwrap(),
            NonZeroUsize::new(alignment).unwrap(),
        )
    }

    #[test]
    fn default_config_uses_default_constants() {
        let cfg = LocatorConfig::default();
        assert_eq!(cfg.min_run(), DEFAULT_MIN_RUN);
        assert_eq!(cfg.alignment(), DEFAULT_ALIGNMENT);
        assert_eq!(cfg, config(5, 4));
    }

    #[test]
    fn idle_miss_advances_by_alignment() {
        let cfg = LocatorConfig::default();
        assert_eq!(ScanState::Idle.step(8, None, &cfg), (ScanState::Idle, 12));
    }

    #[test]
    fn hit_starts_run_and_skips_record() {
        let cfg = LocatorConfig::default();
        assert_eq!(
            ScanState::Idle.step(8, Some(20), &cfg),
            (
                ScanState::Accumulating {
                    candidate: 8,
                    run: 1
                },
                28
            )
        );
    }

    #[test]
    fn broken_run_backtracks_to_candidate() {
        let cfg = LocatorConfig::default();
        let state = ScanState::Accumulating {
            candidate: 8,
            run: 3,
        };
        assert_eq!(state.step(60, None, &cfg), (ScanState::Idle, 12));
    }

    #[test]
    fn threshold_hit_returns_candidate() {
        let cfg = LocatorConfig::default();
        let state = ScanState::Accumulating {
            candidate: 8,
            run: 4,
        };
        assert_eq!(state.step(72, Some(16), &cfg), (ScanState::Found(8), 72));
    }

    #[test]
    fn found_is_terminal() {
        let cfg = LocatorConfig::default();
        assert_eq!(
            ScanState::Found(4).step(100, None, &cfg),
            (ScanState::Found(4), 100)
        );
    }

    #[test]
    fn single_record_run_with_threshold_one() {
        let cfg = config(1, 4);
        assert_eq!(ScanState::Idle.step(16, Some(16), &cfg), (ScanState::Found(16), 16));
    }

    #[test]
    fn probe_rejects_window_past_end() {
        let record = record_2d(0x10, 0x14);
        let mut image = filler(32);
        image.extend_from_slice(&record[..8]);
        assert_eq!(probe(&image, 32), None);
        assert_eq!(probe(&image, image.len()), None);
    }

    #[test]
    fn probe_reports_record_size() {
        let mut image = Vec::new();
        image.extend_from_slice(&record_3d(0x40, 0x44, 0x48));
        image.extend_from_slice(&filler(0x40));
        assert_eq!(probe(&image, 0), Some(20));
    }

    #[test]
    fn finds_table_after_filler() {
        let mut image = filler(0x100);
        for index in 0..3u32 {
            image.extend_from_slice(&record_2d(0x123 + index, 0x234 + index));
        }
        for index in 0..3u32 {
            image.extend_from_slice(&record_3d(0x345, 0x356 + index, 0x367));
        }
        image.extend_from_slice(&filler(0x400));

        assert_eq!(find_lookup_table_offset(&image), Ok(0x100));
    }

    #[test]
    fn table_at_image_start_is_found() {
        let mut image = Vec::new();
        for _ in 0..5 {
            image.extend_from_slice(&record_2d(0x123, 0x234));
        }
        image.extend_from_slice(&filler(0x300));

        assert_eq!(find_lookup_table_offset(&image), Ok(0));
    }

    #[test]
    fn short_run_is_abandoned_for_later_table() {
        // Three plausible records at 0, then a break, then the real table.
        let mut image = Vec::new();
        for _ in 0..3 {
            image.extend_from_slice(&record_2d(0x123, 0x234));
        }
        image.extend_from_slice(&filler(4));
        for _ in 0..5 {
            image.extend_from_slice(&record_2d(0x123, 0x234));
        }
        image.extend_from_slice(&filler(0x300));

        assert_eq!(find_lookup_table_offset(&image), Ok(52));
    }

    #[test]
    fn four_records_are_not_enough() {
        let mut image = filler(0x40);
        for _ in 0..4 {
            image.extend_from_slice(&record_2d(0x123, 0x234));
        }
        image.extend_from_slice(&filler(0x300));

        assert_eq!(
            find_lookup_table_offset(&image),
            Err(LocateError::TableNotFound)
        );
        assert_eq!(find_lookup_table_offset_with(&image, &config(4, 4)), Ok(0x40));
    }

    #[test]
    fn unaligned_table_is_missed_with_default_alignment() {
        let mut image = filler(2);
        for _ in 0..5 {
            image.extend_from_slice(&record_2d(0x123, 0x234));
        }
        image.extend_from_slice(&filler(0x300));

        assert_eq!(
            find_lookup_table_offset(&image),
            Err(LocateError::TableNotFound)
        );
        assert_eq!(find_lookup_table_offset_with(&image, &config(5, 2)), Ok(2));
    }

    #[test]
    fn empty_and_blank_images_have_no_table() {
        assert_eq!(
            find_lookup_table_offset(&[]),
            Err(LocateError::TableNotFound)
        );
        assert_eq!(
            find_lookup_table_offset(&filler(0x1000)),
            Err(LocateError::TableNotFound)
        );
        // All-zero windows decode but carry zero addresses.
        assert_eq!(
            find_lookup_table_offset(&vec![0u8; 0x1000]),
            Err(LocateError::TableNotFound)
        );
    }
}
