use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use rand::seq::index::sample;
use rand::Rng;
use rust_htslib::bam::record::Cigar;
use rust_htslib::{bam, bam::Read as BamRead};

use crate::fastx::{check_collision, sniff_format, Format, Record};
use crate::ids::IdSet;

/// Length filter direction: `Long` keeps reads at least as long as the
/// threshold, `Short` keeps reads no longer than it. A read of exactly the
/// threshold length is kept by both.
#[derive(Copy, Clone, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum LengthMode {
    Long,
    Short,
}

impl LengthMode {
    pub fn keeps(&self, length: usize, threshold: usize) -> bool {
        match self {
            LengthMode::Long => length >= threshold,
            LengthMode::Short => length <= threshold,
        }
    }
}

/// How a single pass over the records partitioned the identifiers.
///
/// `found` and `removed` together cover every id seen in the input; `missing`
/// holds the wanted ids that never appeared and is disjoint from both.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct IdFilterOutcome {
    pub found: BTreeSet<String>,
    pub removed: BTreeSet<String>,
    pub missing: BTreeSet<String>,
}

/// Selects the records whose id is in `wanted`, emitting them in input order.
pub fn filter_by_ids(
    records: impl Iterator<Item = Result<Record>>,
    wanted: &IdSet,
    mut emit: impl FnMut(Record) -> Result<()>,
) -> Result<IdFilterOutcome> {
    info!("Looking for {} ids", wanted.len());

    let mut remaining: IdSet = wanted.clone();
    let mut outcome = IdFilterOutcome::default();

    let mut seen = 0usize;
    for record in records {
        let record = record?;
        seen += 1;
        if seen % 50000 == 0 {
            info!("Processed: {seen}");
        }

        if remaining.remove(&record.id) {
            outcome.found.insert(record.id.clone());
            emit(record)?;
        } else {
            outcome.removed.insert(record.id.clone());
        }
    }

    outcome.missing = remaining;

    info!(
        "Found {} ids, filtered {} ids, missed {} ids",
        outcome.found.len(),
        outcome.removed.len(),
        outcome.missing.len()
    );
    Ok(outcome)
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct LengthSummary {
    pub kept: usize,
    /// Longest/shortest lengths over *all* input records, selected or not.
    /// `None` when the input stream was empty.
    pub longest: Option<usize>,
    pub shortest: Option<usize>,
}

/// Selects records by length threshold. The longest and shortest lengths are
/// tracked across the whole input for reporting, regardless of selection.
pub fn filter_by_length(
    records: impl Iterator<Item = Result<Record>>,
    threshold: usize,
    mode: LengthMode,
    mut emit: impl FnMut(Record) -> Result<()>,
) -> Result<LengthSummary> {
    let mut summary = LengthSummary::default();

    for record in records {
        let record = record?;
        let len = record.len();

        summary.longest = Some(summary.longest.map_or(len, |l| l.max(len)));
        summary.shortest = Some(summary.shortest.map_or(len, |s| s.min(len)));

        if mode.keeps(len, threshold) {
            summary.kept += 1;
            emit(record)?;
        }
    }

    Ok(summary)
}

/// Draws `n` records uniformly at random without replacement. Sampling more
/// records than exist is an error, raised before anything is returned so the
/// caller can defer creating its output file. Output order is not required
/// to match input order.
pub fn sample_records(records: Vec<Record>, n: usize, rng: &mut impl Rng) -> Result<Vec<Record>> {
    if n > records.len() {
        bail!(
            "cannot sample {n} records from an input with only {} records",
            records.len()
        );
    }

    let mut slots: Vec<Option<Record>> = records.into_iter().map(Some).collect();
    let mut sampled = Vec::with_capacity(n);
    for idx in sample(rng, slots.len(), n) {
        if let Some(record) = slots[idx].take() {
            sampled.push(record);
        }
    }

    Ok(sampled)
}

/// Query bases consumed by the alignment, soft clips excluded. Matches the
/// aligned-length convention of `query_alignment_length`.
fn aligned_query_len(record: &bam::Record) -> usize {
    record
        .cigar()
        .iter()
        .map(|op| match op {
            Cigar::Match(n) | Cigar::Ins(n) | Cigar::Equal(n) | Cigar::Diff(n) => *n as usize,
            _ => 0,
        })
        .sum()
}

/// Filters mapped reads of a BAM file by aligned length and writes the
/// passing reads to a FASTA file.
pub fn filter_bam_by_length(
    bam_path: &Path,
    out_path: &Path,
    threshold: usize,
    mode: LengthMode,
    force: bool,
) -> Result<usize> {
    if sniff_format(out_path)? != Format::Fasta {
        bail!(
            "output file {} must be FASTA (.fa/.fasta); FASTQ output is not available for BAM input",
            out_path.display()
        );
    }
    check_collision(out_path, force)?;

    let mut reader = bam::Reader::from_path(bam_path)
        .with_context(|| format!("Unable to open BAM file {}", bam_path.display()))?;
    let file = File::create(out_path)
        .with_context(|| format!("Unable to create output file {}", out_path.display()))?;
    let mut out = BufWriter::new(file);

    let mut kept = 0usize;
    for result in reader.records() {
        let record = result?;
        if record.is_unmapped() {
            continue;
        }

        let len = aligned_query_len(&record);
        if mode.keeps(len, threshold) {
            let name = std::str::from_utf8(record.qname())?;
            debug!("Found {name} with length {len}");

            out.write_all(b">")?;
            out.write_all(record.qname())?;
            out.write_all(b"\n")?;
            out.write_all(&record.seq().as_bytes())?;
            out.write_all(b"\n")?;
            kept += 1;
        }
    }
    out.flush()?;

    info!("Kept {kept} mapped reads");
    Ok(kept)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn record(id: &str, seq: &[u8]) -> Record {
        Record {
            id: id.to_string(),
            desc: None,
            seq: seq.to_vec(),
            qual: None,
        }
    }

    fn stream(records: Vec<Record>) -> impl Iterator<Item = Result<Record>> {
        records.into_iter().map(Ok)
    }

    fn ids(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn ids_partition_into_found_removed_and_missing() {
        let records = vec![
            record("id1", b"AA"),
            record("id2", b"CC"),
            record("id3", b"GG"),
            record("id4", b"TT"),
        ];
        let wanted = ids(&["id1", "id3"]);

        let mut emitted = Vec::new();
        let outcome = filter_by_ids(stream(records), &wanted, |r| {
            emitted.push(r.id.clone());
            Ok(())
        })
        .unwrap();

        assert_eq!(outcome.found, ids(&["id1", "id3"]));
        assert_eq!(outcome.removed, ids(&["id2", "id4"]));
        assert!(outcome.missing.is_empty());
        assert_eq!(emitted, vec!["id1", "id3"]);
    }

    #[test]
    fn wanted_ids_never_seen_are_reported_missing() {
        let records = vec![record("id1", b"AA")];
        let wanted = ids(&["id1", "ghost"]);

        let outcome = filter_by_ids(stream(records), &wanted, |_| Ok(())).unwrap();
        assert_eq!(outcome.missing, ids(&["ghost"]));
    }

    #[test]
    fn boundary_length_is_kept_by_both_modes() {
        let records = || {
            vec![
                record("a", b"AAAA"),
                record("b", b"AAAAAA"),
                record("c", b"AA"),
            ]
        };

        let mut long_kept = Vec::new();
        let summary = filter_by_length(stream(records()), 4, LengthMode::Long, |r| {
            long_kept.push(r.id.clone());
            Ok(())
        })
        .unwrap();
        assert_eq!(long_kept, vec!["a", "b"]);
        assert_eq!(summary.longest, Some(6));
        assert_eq!(summary.shortest, Some(2));

        let mut short_kept = Vec::new();
        filter_by_length(stream(records()), 4, LengthMode::Short, |r| {
            short_kept.push(r.id.clone());
            Ok(())
        })
        .unwrap();
        assert_eq!(short_kept, vec!["a", "c"]);
    }

    #[test]
    fn empty_input_leaves_extremes_undefined() {
        let summary =
            filter_by_length(stream(Vec::new()), 4, LengthMode::Long, |_| Ok(())).unwrap();
        assert_eq!(summary.longest, None);
        assert_eq!(summary.shortest, None);
        assert_eq!(summary.kept, 0);
    }

    #[test]
    fn sampling_returns_exactly_n_distinct_records() {
        let records: Vec<Record> = (0..10)
            .map(|i| record(&format!("id{i}"), b"ACGT"))
            .collect();

        let mut rng = StdRng::seed_from_u64(7);
        let sampled = sample_records(records, 4, &mut rng).unwrap();

        let distinct: BTreeSet<String> = sampled.iter().map(|r| r.id.clone()).collect();
        assert_eq!(sampled.len(), 4);
        assert_eq!(distinct.len(), 4);
    }

    #[test]
    fn sampling_more_than_available_fails() {
        let records = vec![record("a", b"AA")];
        let mut rng = StdRng::seed_from_u64(7);
        assert!(sample_records(records, 2, &mut rng).is_err());
    }
}
