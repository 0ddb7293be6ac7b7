use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use itertools::Itertools;
use serde::Serialize;

use crate::alphabet::{Alphabet, UnknownBase};
use crate::fastx::{check_collision, open_records};

const GAP: u8 = b'-';

/// Counts every IUPAC symbol of the alphabet across the sequence. Characters
/// outside the table are fatal.
pub fn count_bases(seq: &[u8], alphabet: Alphabet) -> Result<BTreeMap<char, usize>, UnknownBase> {
    let mut counts: BTreeMap<char, usize> = alphabet
        .symbols()
        .iter()
        .map(|&b| (b as char, 0))
        .collect();

    for &base in seq {
        match counts.get_mut(&(base as char)) {
            Some(count) => *count += 1,
            None => return Err(UnknownBase(base as char)),
        }
    }
    Ok(counts)
}

/// Aggregate sequence content derived from per-symbol counts.
///
/// `at` and `gc` include the ambiguity codes that resolve within one pair
/// (W for A/T, S for G/C), weighted by how often they were counted.
#[derive(Debug, PartialEq, Eq)]
pub struct SeqContent {
    pub total: usize,
    pub accurate: usize,
    pub ambiguous: usize,
    pub at: usize,
    pub gc: usize,
}

impl std::fmt::Display for SeqContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "total: {}, accurate: {}, ambiguous: {}, AT: {}, GC: {}",
            self.total, self.accurate, self.ambiguous, self.at, self.gc
        )
    }
}

pub fn seq_content(counts: &BTreeMap<char, usize>) -> SeqContent {
    let mut content = SeqContent {
        total: 0,
        accurate: 0,
        ambiguous: 0,
        at: 0,
        gc: 0,
    };

    for (&symbol, &count) in counts {
        content.total += count;
        if matches!(symbol, 'A' | 'C' | 'G' | 'T' | 'U') {
            content.accurate += count;
        } else {
            content.ambiguous += count;
        }

        match symbol {
            'A' | 'T' | 'U' | 'W' => content.at += count,
            'G' | 'C' | 'S' => content.gc += count,
            _ => {}
        }
    }

    content
}

/// Column-by-column differences between two aligned sequences.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct PairwiseComparison {
    pub substitutions: usize,
    pub insertions: usize,
    pub deletions: usize,
    pub size: usize,
}

impl PairwiseComparison {
    pub fn identity(&self) -> f64 {
        let muts = self.substitutions + self.insertions + self.deletions;
        1.0 - (muts as f64 / self.size as f64)
    }
}

/// Classifies each aligned column of a pair: a gap in the first row is a
/// deletion, a gap in the second an insertion, and differing bases a
/// substitution. Both rows must be non-empty and the same length.
pub fn compare_pair(first: &[u8], second: &[u8]) -> Result<PairwiseComparison> {
    if first.len() != second.len() {
        bail!(
            "alignment rows are not all the same length ({} vs {})",
            first.len(),
            second.len()
        );
    }
    if first.is_empty() {
        bail!("alignment rows are empty");
    }

    let mut cmp = PairwiseComparison {
        size: first.len(),
        ..Default::default()
    };

    for (&b1, &b2) in first.iter().zip(second) {
        if b1 == GAP {
            cmp.deletions += 1;
        } else if b2 == GAP {
            cmp.insertions += 1;
        } else if b1 != b2 {
            cmp.substitutions += 1;
        }
    }

    Ok(cmp)
}

/// The polymorphism category of one alignment column.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    /// Gap against a single distinct base.
    Gap,
    /// Multiple distinct bases, no gap.
    Substitution,
    /// Gap and multiple distinct bases at once.
    Both,
}

/// One polymorphic column of a multiple alignment, written as a CSV row for
/// downstream plotting.
#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct ColumnVariant {
    pub position: usize,
    #[serde(rename = "type")]
    pub kind: ColumnKind,
}

/// Scans a multiple alignment column-wise and reports every polymorphic
/// column. All rows must have the same length.
pub fn compare_multi(rows: &[Vec<u8>]) -> Result<Vec<ColumnVariant>> {
    let Some(size) = rows.first().map(|r| r.len()) else {
        bail!("no sequences to compare");
    };
    if rows.iter().any(|r| r.len() != size) {
        bail!("alignment rows are not all the same length");
    }

    let mut variants = Vec::new();
    for position in 0..size {
        let bases: Vec<u8> = rows.iter().map(|r| r[position]).unique().collect();
        if bases.len() == 1 {
            continue;
        }

        let has_gap = bases.contains(&GAP);
        let distinct_bases = bases.iter().filter(|&&b| b != GAP).count();

        let kind = match (has_gap, distinct_bases) {
            (true, 0 | 1) => ColumnKind::Gap,
            (true, _) => ColumnKind::Both,
            (false, _) => ColumnKind::Substitution,
        };
        variants.push(ColumnVariant { position, kind });
    }

    Ok(variants)
}

/// Prints the per-record content report for a FASTA file, or for a bare
/// sequence given directly on the command line.
pub fn report_content(fasta_or_seq: &str, alphabet: Alphabet) -> Result<()> {
    let path = Path::new(fasta_or_seq);
    let is_file = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| matches!(e.to_lowercase().as_str(), "fa" | "fasta"))
        .unwrap_or(false);

    if is_file {
        let (_, reader) = open_records(path)?;
        for record in reader {
            let record = record?;
            let counts = count_bases(&record.seq, alphabet)?;
            println!("{}", record.id);
            println!("{}", seq_content(&counts));
        }
    } else {
        let counts = count_bases(fasta_or_seq.as_bytes(), alphabet)?;
        println!("{}", seq_content(&counts));
    }

    Ok(())
}

/// Compares the sequences of an aligned FASTA file.
///
/// Two records give a pairwise substitution/insertion/deletion report; more
/// than two give a per-column polymorphism report, with the column table
/// written to `table` as CSV for external plotting. Fewer than two is an
/// error.
pub fn report_comparison(aln: &Path, table: &Path, force: bool) -> Result<()> {
    let (_, reader) = open_records(aln)?;
    let rows: Vec<(String, Vec<u8>)> = reader
        .map(|r| r.map(|rec| (rec.id, rec.seq)))
        .collect::<Result<_>>()?;

    match rows.len() {
        0 | 1 => bail!("not enough sequences found in {}", aln.display()),
        2 => {
            let cmp = compare_pair(&rows[0].1, &rows[1].1)?;
            println!(
                "Alignmentsize: {}, Identity: {:.4}, Substitutions: {}, Insertions: {}, Deletions: {}",
                cmp.size,
                cmp.identity(),
                cmp.substitutions,
                cmp.insertions,
                cmp.deletions
            );
        }
        _ => {
            let seqs: Vec<Vec<u8>> = rows.into_iter().map(|(_, seq)| seq).collect();
            let variants = compare_multi(&seqs)?;

            check_collision(table, force)?;
            let mut wtr = csv::Writer::from_path(table)
                .with_context(|| format!("Unable to create column table {}", table.display()))?;
            for variant in &variants {
                wtr.serialize(variant)?;
            }
            wtr.flush()?;

            let by_kind = |kind| variants.iter().filter(|v| v.kind == kind).count();
            println!(
                "Alignmentsize: {}, Polymorphic columns: {}, Substitutions: {}, Gaps: {}, Both: {}",
                seqs[0].len(),
                variants.len(),
                by_kind(ColumnKind::Substitution),
                by_kind(ColumnKind::Gap),
                by_kind(ColumnKind::Both)
            );
            info!("Wrote column table to {}", table.display());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bases_are_counted_per_symbol() {
        let counts = count_bases(b"AACGTN", Alphabet::Dna).unwrap();
        assert_eq!(counts[&'A'], 2);
        assert_eq!(counts[&'C'], 1);
        assert_eq!(counts[&'N'], 1);
        assert_eq!(counts[&'K'], 0);
    }

    #[test]
    fn unknown_symbol_is_fatal() {
        assert_eq!(count_bases(b"ACGX", Alphabet::Dna), Err(UnknownBase('X')));
        // U is only valid under the RNA alphabet
        assert!(count_bases(b"ACGU", Alphabet::Dna).is_err());
        assert!(count_bases(b"ACGU", Alphabet::Rna).is_ok());
    }

    #[test]
    fn content_is_weighted_by_counts() {
        let counts = count_bases(b"AATTGCWS", Alphabet::Dna).unwrap();
        let content = seq_content(&counts);
        assert_eq!(content.total, 8);
        assert_eq!(content.accurate, 6);
        assert_eq!(content.ambiguous, 2);
        assert_eq!(content.at, 5); // A, A, T, T, W
        assert_eq!(content.gc, 3); // G, C, S
    }

    #[test]
    fn pairwise_columns_are_classified() {
        //   ACG-T
        //   A-GCC
        let cmp = compare_pair(b"ACG-T", b"A-GCC").unwrap();
        assert_eq!(cmp.deletions, 1);
        assert_eq!(cmp.insertions, 1);
        assert_eq!(cmp.substitutions, 1);
        assert_eq!(cmp.size, 5);
        assert!((cmp.identity() - 0.4).abs() < 1e-9);
    }

    #[test]
    fn pairwise_rows_of_unequal_length_are_rejected() {
        assert!(compare_pair(b"ACGT", b"AC").is_err());
    }

    #[test]
    fn empty_pairwise_rows_are_rejected() {
        assert!(compare_pair(b"", b"").is_err());
    }

    #[test]
    fn multi_comparison_reports_polymorphic_columns() {
        let rows = vec![
            b"ACG-A".to_vec(),
            b"ACC-A".to_vec(),
            b"AC--T".to_vec(),
        ];
        let variants = compare_multi(&rows).unwrap();

        assert_eq!(
            variants,
            vec![
                ColumnVariant {
                    position: 2,
                    kind: ColumnKind::Both
                },
                ColumnVariant {
                    position: 4,
                    kind: ColumnKind::Substitution
                },
            ]
        );
    }

    #[test]
    fn gap_against_one_base_is_a_gap_column() {
        let rows = vec![b"A-".to_vec(), b"AA".to_vec()];
        let variants = compare_multi(&rows).unwrap();
        assert_eq!(variants[0].kind, ColumnKind::Gap);
    }

    #[test]
    fn ragged_alignments_are_rejected() {
        let rows = vec![b"ACGT".to_vec(), b"AC".to_vec()];
        assert!(compare_multi(&rows).is_err());
    }
}
