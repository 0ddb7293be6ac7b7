use std::path::Path;

use anyhow::Result;
use thiserror::Error;

use crate::fastx::{open_records, FastxWriter, Record};

/// The slice interval requested on the command line, validated once at
/// construction so that inconsistent argument combinations never reach the
/// slicing logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SliceSpec {
    /// A 1-based center position, optionally widened by `range` bases up- and
    /// downstream.
    Position { pos: i64, range: Option<i64> },
    /// 1-based inclusive bounds; either side may be left open.
    Bounds { lo: Option<i64>, hi: Option<i64> },
    /// The first `n` bases of each read.
    FromStart(i64),
    /// The last `n` bases of each read.
    FromEnd(i64),
}

/// A half-open, 0-based interval `[start, end)`.
///
/// `end == -1` is a sentinel meaning "to the end of the sequence"; a negative
/// `start` counts from the end of the sequence. Both are resolved against the
/// live sequence length in `apply_slice`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SliceRegion {
    pub start: i64,
    pub end: i64,
}

pub const TO_END: i64 = -1;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SliceError {
    #[error(
        "exactly one of --position (with optional --range), --lowerbound/--upperbound, \
         --slice-start or --slice-end must be supplied"
    )]
    AmbiguousSpec,

    #[error("lowerbound of slice [{start}, {end}) is below zero")]
    NegativeStart { start: i64, end: i64 },

    #[error("slice [{start}, {end}) too large for sequence `{id}` with length {len}")]
    OutOfRange {
        id: String,
        start: i64,
        end: i64,
        len: usize,
    },
}

impl SliceSpec {
    /// Builds a spec from the raw optional arguments, enforcing mutual
    /// exclusion eagerly. Supplying a position together with either bound is
    /// a contract violation, as is supplying nothing at all.
    pub fn from_args(
        position: Option<i64>,
        range: Option<i64>,
        lowerbound: Option<i64>,
        upperbound: Option<i64>,
        slice_start: Option<i64>,
        slice_end: Option<i64>,
    ) -> Result<Self, SliceError> {
        let has_bounds = lowerbound.is_some() || upperbound.is_some();
        let has_position = position.is_some() || range.is_some();
        let has_counts = slice_start.is_some() || slice_end.is_some();

        if has_counts && (has_position || has_bounds) {
            return Err(SliceError::AmbiguousSpec);
        }

        match (position, lowerbound, upperbound, slice_start, slice_end) {
            (_, _, _, Some(n), None) if !has_position && !has_bounds => Ok(SliceSpec::FromStart(n)),
            (_, _, _, None, Some(n)) if !has_position && !has_bounds => Ok(SliceSpec::FromEnd(n)),
            (Some(pos), None, None, None, None) => Ok(SliceSpec::Position { pos, range }),
            (None, lo, hi, None, None) if has_bounds && range.is_none() => {
                Ok(SliceSpec::Bounds { lo, hi })
            }
            _ => Err(SliceError::AmbiguousSpec),
        }
    }

    /// Resolves the 1-based command-line shape into a 0-based half-open
    /// region. A resolved start below zero is invalid for the position and
    /// bounds shapes; `FromEnd` legitimately produces a negative start.
    pub fn resolve(&self) -> Result<SliceRegion, SliceError> {
        let region = match *self {
            SliceSpec::Position {
                pos,
                range: Some(range),
            } => SliceRegion {
                start: pos - 1 - range,
                end: pos + range,
            },
            SliceSpec::Position { pos, range: None } => SliceRegion {
                start: pos - 1,
                end: pos,
            },
            SliceSpec::Bounds { lo, hi } => SliceRegion {
                start: lo.map_or(0, |l| l - 1),
                end: hi.unwrap_or(TO_END),
            },
            SliceSpec::FromStart(n) => SliceRegion { start: 0, end: n },
            SliceSpec::FromEnd(n) => {
                return Ok(SliceRegion {
                    start: -n,
                    end: TO_END,
                })
            }
        };

        if region.start < 0 {
            return Err(SliceError::NegativeStart {
                start: region.start,
                end: region.end,
            });
        }
        Ok(region)
    }
}

/// Extracts the region from the record's sequence (and qualities, for FASTQ
/// records), annotating the description with the 1-based inclusive interval
/// actually applied, e.g. `sliced=(3,5)`.
pub fn apply_slice(record: &mut Record, region: SliceRegion) -> Result<(), SliceError> {
    let len = record.len() as i64;

    if region.end != TO_END && len < region.end {
        return Err(SliceError::OutOfRange {
            id: record.id.clone(),
            start: region.start,
            end: region.end,
            len: record.len(),
        });
    }

    let start = if region.start < 0 {
        len + region.start
    } else {
        region.start
    };
    let end = if region.end == TO_END { len } else { region.end };

    if start < 0 || start > end {
        return Err(SliceError::OutOfRange {
            id: record.id.clone(),
            start: region.start,
            end: region.end,
            len: record.len(),
        });
    }
    let (start, end) = (start as usize, end as usize);

    record.seq = record.seq[start..end].to_vec();
    // never leave qualities stale after truncating the sequence
    if let Some(qual) = &record.qual {
        record.qual = Some(qual[start..end].to_vec());
    }
    record.annotate(&format!("sliced=({},{})", start + 1, end));

    Ok(())
}

/// Slices every record of the input file and writes the result.
///
/// When `id` is given, only the matching record is sliced and written; all
/// other records are dropped from the output.
pub fn slice_file(
    input: &Path,
    output: &Path,
    spec: SliceSpec,
    id: Option<&str>,
    append: bool,
) -> Result<usize> {
    let region = spec.resolve()?;

    let (_, reader) = open_records(input)?;
    let mut writer = FastxWriter::create(output, false, append)?;

    let mut sliced = 0usize;
    for record in reader {
        let mut record = record?;
        if let Some(wanted) = id {
            if record.id != wanted {
                continue;
            }
        }

        apply_slice(&mut record, region)?;
        writer.write_record(&record)?;
        sliced += 1;
    }
    writer.finish()?;

    info!(
        "Sliced {sliced} records over region [{}, {})",
        region.start, region.end
    );
    Ok(sliced)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(seq: &[u8], qual: Option<&[u8]>) -> Record {
        Record {
            id: "read1".to_string(),
            desc: None,
            seq: seq.to_vec(),
            qual: qual.map(|q| q.to_vec()),
        }
    }

    #[test]
    fn position_with_range_resolves_to_a_window() {
        let spec = SliceSpec::Position {
            pos: 10,
            range: Some(5),
        };
        assert_eq!(spec.resolve().unwrap(), SliceRegion { start: 4, end: 15 });
    }

    #[test]
    fn position_alone_selects_a_single_base() {
        let spec = SliceSpec::Position { pos: 3, range: None };
        assert_eq!(spec.resolve().unwrap(), SliceRegion { start: 2, end: 3 });
    }

    #[test]
    fn bounds_convert_to_zero_based_half_open() {
        let spec = SliceSpec::Bounds {
            lo: Some(5),
            hi: Some(15),
        };
        assert_eq!(spec.resolve().unwrap(), SliceRegion { start: 4, end: 15 });
    }

    #[test]
    fn open_upperbound_uses_the_sentinel() {
        let spec = SliceSpec::Bounds {
            lo: Some(3),
            hi: None,
        };
        assert_eq!(
            spec.resolve().unwrap(),
            SliceRegion {
                start: 2,
                end: TO_END
            }
        );
    }

    #[test]
    fn start_below_zero_is_invalid() {
        let spec = SliceSpec::Position {
            pos: 2,
            range: Some(5),
        };
        assert!(matches!(
            spec.resolve(),
            Err(SliceError::NegativeStart { .. })
        ));
    }

    #[test]
    fn position_and_bounds_together_are_rejected() {
        assert_eq!(
            SliceSpec::from_args(Some(10), None, Some(5), None, None, None),
            Err(SliceError::AmbiguousSpec)
        );
    }

    #[test]
    fn no_shape_at_all_is_rejected() {
        assert_eq!(
            SliceSpec::from_args(None, None, None, None, None, None),
            Err(SliceError::AmbiguousSpec)
        );
    }

    #[test]
    fn count_shapes_resolve_to_read_edges() {
        assert_eq!(
            SliceSpec::from_args(None, None, None, None, Some(4), None)
                .unwrap()
                .resolve()
                .unwrap(),
            SliceRegion { start: 0, end: 4 }
        );
        assert_eq!(
            SliceSpec::from_args(None, None, None, None, None, Some(4))
                .unwrap()
                .resolve()
                .unwrap(),
            SliceRegion {
                start: -4,
                end: TO_END
            }
        );
    }

    #[test]
    fn slicing_extracts_and_annotates() {
        let mut rec = record(b"AAGGTT", None);
        apply_slice(&mut rec, SliceRegion { start: 2, end: 5 }).unwrap();
        assert_eq!(rec.seq, b"GGT");
        assert_eq!(rec.desc.as_deref(), Some("sliced=(3,5)"));
    }

    #[test]
    fn qualities_are_sliced_over_the_same_interval() {
        let mut rec = record(b"AAGGTT", Some(b"IIJJKK"));
        apply_slice(&mut rec, SliceRegion { start: 2, end: 5 }).unwrap();
        assert_eq!(rec.seq, b"GGT");
        assert_eq!(rec.qual.as_deref(), Some(&b"JJK"[..]));
    }

    #[test]
    fn from_end_counts_back_from_the_read_end() {
        let mut rec = record(b"AAGGTT", None);
        apply_slice(
            &mut rec,
            SliceRegion {
                start: -2,
                end: TO_END,
            },
        )
        .unwrap();
        assert_eq!(rec.seq, b"TT");
        assert_eq!(rec.desc.as_deref(), Some("sliced=(5,6)"));
    }

    #[test]
    fn region_longer_than_the_sequence_is_an_error() {
        let mut rec = record(b"AAGG", None);
        let err = apply_slice(&mut rec, SliceRegion { start: 2, end: 9 }).unwrap_err();
        assert!(matches!(err, SliceError::OutOfRange { len: 4, .. }));
    }
}
