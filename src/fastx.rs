use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use needletail::parser::SequenceRecord;
use needletail::{parse_fastx_file, FastxReader};
use thiserror::Error;

/// An owned FASTA/FASTQ record.
///
/// Qualities are kept as the raw PHRED+33 bytes of the source file and are
/// present iff the record came from a FASTQ file. They always have the same
/// length as `seq`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub id: String,
    pub desc: Option<String>,
    pub seq: Vec<u8>,
    pub qual: Option<Vec<u8>>,
}

impl Record {
    pub fn len(&self) -> usize {
        self.seq.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seq.is_empty()
    }

    /// The full header line: id plus the free-text description, if any.
    pub fn header(&self) -> String {
        match &self.desc {
            Some(desc) => format!("{} {}", self.id, desc),
            None => self.id.clone(),
        }
    }

    /// Appends a token to the description field.
    pub fn annotate(&mut self, note: &str) {
        self.desc = Some(match &self.desc {
            Some(desc) => format!("{desc} {note}"),
            None => note.to_string(),
        });
    }
}

impl TryFrom<&SequenceRecord<'_>> for Record {
    type Error = anyhow::Error;

    fn try_from(rec: &SequenceRecord) -> Result<Self> {
        let header = String::from_utf8(rec.id().to_vec())?;
        let mut parts = header.splitn(2, char::is_whitespace);
        let id = parts.next().unwrap_or_default().to_string();
        let desc = parts
            .next()
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());

        Ok(Record {
            id,
            desc,
            seq: rec.seq().into_owned(),
            qual: rec.qual().map(|q| q.to_vec()),
        })
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Format {
    Fasta,
    Fastq,
}

#[derive(Error, Debug)]
pub enum FastxError {
    #[error("unknown file extension for `{0}`: expected .fa/.fasta/.fn or .fq/.fastq")]
    UnknownExtension(PathBuf),

    #[error("`{0}` already exists! Use a different name, or pass the overwrite flag")]
    OutputExists(PathBuf),

    #[error("record `{0}` has no quality scores and cannot be written as FASTQ")]
    MissingQuality(String),
}

/// Determine the file format from the path extension. Unknown extensions are
/// fatal and reported before any processing begins.
pub fn sniff_format(path: &Path) -> Result<Format, FastxError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());

    match ext.as_deref() {
        Some("fa" | "fasta" | "fn") => Ok(Format::Fasta),
        Some("fq" | "fastq") => Ok(Format::Fastq),
        _ => Err(FastxError::UnknownExtension(path.to_path_buf())),
    }
}

/// Errors when `path` already exists, unless the caller explicitly allowed
/// overwriting or appending.
pub fn check_collision(path: &Path, allow_existing: bool) -> Result<(), FastxError> {
    if !allow_existing && path.exists() {
        return Err(FastxError::OutputExists(path.to_path_buf()));
    }
    Ok(())
}

/// Lazy iterator of owned records over a FASTA/FASTQ file.
pub struct RecordReader {
    inner: Box<dyn FastxReader>,
}

impl Iterator for RecordReader {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        let rec = self.inner.next()?;
        Some(
            rec.map_err(anyhow::Error::from)
                .and_then(|r| Record::try_from(&r)),
        )
    }
}

/// Opens a FASTA/FASTQ file for record-by-record reading. The extension is
/// checked eagerly so that format errors surface before any processing.
pub fn open_records(path: &Path) -> Result<(Format, RecordReader)> {
    let format = sniff_format(path)?;
    let inner = parse_fastx_file(path)
        .with_context(|| format!("Unable to open file {}", path.display()))?;
    Ok((format, RecordReader { inner }))
}

/// A buffered FASTA/FASTQ writer. The output format is taken from the
/// destination extension, independent of the input format.
pub struct FastxWriter {
    out: BufWriter<File>,
    format: Format,
}

impl FastxWriter {
    /// Creates the output file, failing if it already exists and neither
    /// `force` nor `append` was given.
    pub fn create(path: &Path, force: bool, append: bool) -> Result<Self> {
        let format = sniff_format(path)?;
        check_collision(path, force || append)?;

        let mut options = OpenOptions::new();
        options.create(true);
        if append {
            options.append(true);
        } else {
            options.write(true).truncate(true);
        }
        let file = options
            .open(path)
            .with_context(|| format!("Unable to create output file {}", path.display()))?;

        Ok(FastxWriter {
            out: BufWriter::new(file),
            format,
        })
    }

    pub fn write_record(&mut self, rec: &Record) -> Result<()> {
        match self.format {
            Format::Fasta => {
                writeln!(self.out, ">{}", rec.header())?;
                self.out.write_all(&rec.seq)?;
                writeln!(self.out)?;
            }
            Format::Fastq => {
                let qual = rec
                    .qual
                    .as_deref()
                    .ok_or_else(|| FastxError::MissingQuality(rec.id.clone()))?;
                writeln!(self.out, "@{}", rec.header())?;
                self.out.write_all(&rec.seq)?;
                writeln!(self.out, "\n+")?;
                self.out.write_all(qual)?;
                writeln!(self.out)?;
            }
        }
        Ok(())
    }

    pub fn finish(mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}
