use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::fastx::{check_collision, open_records, FastxWriter, Format, Record};

/// One replaced base, in 0-based coordinates of the sequence *before*
/// replacement. Serialized as a CSV row with the header
/// `readid,position,sourcebase,targetbase`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplacementEntry {
    pub readid: String,
    pub position: usize,
    pub sourcebase: char,
    pub targetbase: char,
}

/// Rewrites every occurrence of `src` to `tgt` in the record and returns one
/// entry per replaced position. Records without any occurrence produce no
/// entries.
pub fn replace_in_record(record: &mut Record, src: u8, tgt: u8) -> Vec<ReplacementEntry> {
    let mut entries = Vec::new();

    for (position, base) in record.seq.iter_mut().enumerate() {
        if *base == src {
            entries.push(ReplacementEntry {
                readid: record.id.clone(),
                position,
                sourcebase: src as char,
                targetbase: tgt as char,
            });
            *base = tgt;
        }
    }

    entries
}

/// Output paths derived from the input stem: `<stem>_replaced<SRC><TGT>` with
/// the input's extension for the sequence file and `.csv` for the log.
pub fn replaced_paths(input: &Path, outdir: Option<&Path>, src: u8, tgt: u8) -> (PathBuf, PathBuf) {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("replaced");
    let ext = input
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();

    let dir = outdir
        .map(Path::to_path_buf)
        .unwrap_or_else(|| input.parent().unwrap_or(Path::new(".")).to_path_buf());

    let base = format!("{stem}_replaced{}{}", src as char, tgt as char);
    (
        dir.join(format!("{base}.{ext}")),
        dir.join(format!("{base}.csv")),
    )
}

/// Replaces `src` with `tgt` in every record of the input file, writing the
/// rewritten records next to a CSV log of every replaced position.
pub fn replace_file(
    input: &Path,
    outdir: Option<&Path>,
    src: char,
    tgt: char,
    force: bool,
) -> Result<(PathBuf, PathBuf)> {
    if !src.is_ascii() || !tgt.is_ascii() {
        bail!("source and target bases must be single ASCII characters");
    }
    let (src, tgt) = (src as u8, tgt as u8);

    let (out_fastx, out_csv) = replaced_paths(input, outdir, src, tgt);
    check_collision(&out_fastx, force)?;
    check_collision(&out_csv, force)?;

    let (format, reader) = open_records(input)?;
    let mut writer = FastxWriter::create(&out_fastx, force, false)?;
    let mut log = csv::Writer::from_path(&out_csv)
        .with_context(|| format!("Unable to create replacement log {}", out_csv.display()))?;

    let mut replaced = 0usize;
    let mut records = 0usize;
    for record in reader {
        let mut record = record?;
        records += 1;
        if records % 50000 == 0 {
            info!("Processed: {records}");
        }

        for entry in replace_in_record(&mut record, src, tgt) {
            log.serialize(entry)?;
            replaced += 1;
        }
        writer.write_record(&record)?;
    }

    writer.finish()?;
    log.flush()?;

    info!(
        "Replaced {replaced} bases over {records} {} records",
        match format {
            Format::Fasta => "FASTA",
            Format::Fastq => "FASTQ",
        }
    );

    Ok((out_fastx, out_csv))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, seq: &[u8]) -> Record {
        Record {
            id: id.to_string(),
            desc: None,
            seq: seq.to_vec(),
            qual: None,
        }
    }

    #[test]
    fn every_occurrence_is_replaced_and_logged() {
        let mut rec = record("read1", b"ATGA");
        let entries = replace_in_record(&mut rec, b'A', b'G');

        assert_eq!(rec.seq, b"GTGG");
        assert_eq!(
            entries,
            vec![
                ReplacementEntry {
                    readid: "read1".to_string(),
                    position: 0,
                    sourcebase: 'A',
                    targetbase: 'G',
                },
                ReplacementEntry {
                    readid: "read1".to_string(),
                    position: 3,
                    sourcebase: 'A',
                    targetbase: 'G',
                },
            ]
        );
    }

    #[test]
    fn untouched_records_produce_no_entries() {
        let mut rec = record("read1", b"GGCC");
        assert!(replace_in_record(&mut rec, b'A', b'T').is_empty());
        assert_eq!(rec.seq, b"GGCC");
    }

    #[test]
    fn output_paths_derive_from_the_input_stem() {
        let (fastx, csv) = replaced_paths(Path::new("/data/reads.fastq"), None, b'U', b'T');
        assert_eq!(fastx, Path::new("/data/reads_replacedUT.fastq"));
        assert_eq!(csv, Path::new("/data/reads_replacedUT.csv"));
    }

    #[test]
    fn log_header_matches_the_expected_columns() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.fa");
        std::fs::write(&input, ">read1\nATGA\n").unwrap();

        let (out_fastx, out_csv) = replace_file(&input, None, 'A', 'G', false).unwrap();

        let fastx = std::fs::read_to_string(out_fastx).unwrap();
        assert_eq!(fastx, ">read1\nGTGG\n");

        let log = std::fs::read_to_string(out_csv).unwrap();
        assert_eq!(
            log,
            "readid,position,sourcebase,targetbase\nread1,0,A,G\nread1,3,A,G\n"
        );
    }
}
