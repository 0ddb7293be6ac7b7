use std::path::Path;

use anyhow::{Context, Result};
use indexmap::IndexMap;
use rust_htslib::{bam, bam::Read as BamRead};
use thiserror::Error;

use crate::alphabet::Alphabet;
use crate::fastx::check_collision;
use crate::replace::ReplacementEntry;

/// Replacement log grouped by read id, built once before the alignment scan
/// so lookups during the scan are a single map access.
pub type ReplacementIndex = IndexMap<String, Vec<ReplacementEntry>>;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ReconcileError {
    #[error("read `{id}`: replacement position {position} is past the end of the {len} bp sequence")]
    PositionOutOfRange {
        id: String,
        position: usize,
        len: usize,
    },

    #[error(
        "read `{id}` position {position}: expected replaced base `{expected}` but found \
         `{found}`; the replacement log does not match this alignment"
    )]
    BaseMismatch {
        id: String,
        position: usize,
        expected: char,
        found: char,
    },
}

/// Loads the full replacement log into memory, grouped by read id.
pub fn load_replacement_log(path: &Path) -> Result<ReplacementIndex> {
    let mut rdr = csv::Reader::from_path(path)
        .with_context(|| format!("Unable to open replacement log {}", path.display()))?;

    let mut index = ReplacementIndex::new();
    for result in rdr.deserialize() {
        let entry: ReplacementEntry = result?;
        index.entry(entry.readid.clone()).or_default().push(entry);
    }

    info!("Loaded replacement entries for {} reads", index.len());
    Ok(index)
}

/// Writes the original source bases back over the recorded positions of a
/// forward-orientation sequence.
///
/// Every entry is checked against the base actually present: finding anything
/// other than the recorded target base means the log and the alignment are
/// out of sync, which is fatal for the whole run.
pub fn restore_bases(forward: &mut [u8], entries: &[ReplacementEntry]) -> Result<(), ReconcileError> {
    for entry in entries {
        let Some(base) = forward.get_mut(entry.position) else {
            return Err(ReconcileError::PositionOutOfRange {
                id: entry.readid.clone(),
                position: entry.position,
                len: forward.len(),
            });
        };

        if *base != entry.targetbase as u8 {
            return Err(ReconcileError::BaseMismatch {
                id: entry.readid.clone(),
                position: entry.position,
                expected: entry.targetbase,
                found: *base as char,
            });
        }
        *base = entry.sourcebase as u8;
    }
    Ok(())
}

/// Produces the corrected on-strand sequence for an aligned read.
///
/// The stored sequence of a reverse-strand alignment is the reverse
/// complement of the read as it was sequenced; the recorded positions refer
/// to the sequencing orientation, so the sequence is flipped to forward
/// orientation, corrected, and flipped back. The stored bases are always
/// DNA, replacement having rewritten any U to T before alignment, so the
/// inbound flip uses the DNA table; `alphabet` applies only to the outbound
/// flip, once the original bases are back in place.
pub fn corrected_sequence(
    on_strand: &[u8],
    is_reverse: bool,
    entries: &[ReplacementEntry],
    alphabet: Alphabet,
) -> Result<Vec<u8>> {
    let mut forward = if is_reverse {
        Alphabet::Dna.reverse_complement(on_strand)?
    } else {
        on_strand.to_vec()
    };

    restore_bases(&mut forward, entries)?;

    if is_reverse {
        Ok(alphabet.reverse_complement(&forward)?)
    } else {
        Ok(forward)
    }
}

/// Re-applies the original bases recorded in the replacement log onto every
/// aligned read of the input BAM, writing a corrected BAM.
///
/// Supplementary alignments are passed through unmodified; no corrective
/// mechanism exists for them. Quality scores are preserved verbatim, since
/// substitution never changes the read length.
pub fn reconcile_bam(
    inbam: &Path,
    outbam: &Path,
    log_path: &Path,
    alphabet: Alphabet,
    force: bool,
) -> Result<()> {
    let index = load_replacement_log(log_path)?;

    check_collision(outbam, force)?;
    let mut reader = bam::Reader::from_path(inbam)
        .with_context(|| format!("Unable to open BAM file {}", inbam.display()))?;
    let header = bam::Header::from_template(reader.header());
    let mut writer = bam::Writer::from_path(outbam, &header, bam::Format::Bam)
        .with_context(|| format!("Unable to create BAM file {}", outbam.display()))?;

    let mut processed = 0usize;
    let mut corrected = 0usize;
    for result in reader.records() {
        let mut record = result?;
        processed += 1;
        if processed % 10000 == 0 {
            info!("Read {processed}");
        }

        if record.is_supplementary() {
            warn!(
                "Passing supplementary alignment of `{}` through uncorrected",
                String::from_utf8_lossy(record.qname())
            );
            writer.write(&record)?;
            continue;
        }

        let qname = std::str::from_utf8(record.qname())?.to_string();
        let Some(entries) = index.get(&qname) else {
            writer.write(&record)?;
            continue;
        };

        let seq = record.seq().as_bytes();
        let fixed = corrected_sequence(&seq, record.is_reverse(), entries, alphabet)
            .with_context(|| format!("while reconciling read `{qname}`"))?;

        let qual = record.qual().to_vec();
        let cigar = record.cigar().take();
        record.set(qname.as_bytes(), Some(&cigar), &fixed, &qual);

        writer.write(&record)?;
        corrected += 1;
    }

    info!("Reconciled {corrected} of {processed} alignments");
    Ok(())
}
