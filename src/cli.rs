use std::path::PathBuf;

use clap::builder::styling::AnsiColor;
use clap::builder::Styles;
use clap::{Parser, Subcommand, ValueEnum};

use crate::filter::LengthMode;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

const INFO_STRING: &str = "
🧬 seqsmith version ";
const AFTER_STRING: &str = "
   ──────────────────────────────────
   utilities for FASTA/FASTQ/BAM record manipulation";

// colouring of the help
const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Yellow.on_default().bold())
    .usage(AnsiColor::BrightMagenta.on_default().bold())
    .literal(AnsiColor::BrightMagenta.on_default())
    .placeholder(AnsiColor::White.on_default());

#[derive(Parser)]
#[command(
    version = VERSION,
    about = format!("{}{}{}", INFO_STRING, VERSION, AFTER_STRING),
    arg_required_else_help = true,
    flatten_help = true,
    styles = STYLES
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum MergeMethod {
    Intersect,
    Union,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the IUPAC complement (or reverse complement) of a sequence
    #[command(arg_required_else_help = true)]
    Complement {
        /// the sequence to complement
        sequence: String,

        /// print the reverse complement instead of the plain complement
        #[arg(long)]
        reverse: bool,

        /// use the RNA alphabet (A pairs with U)
        #[arg(long)]
        rna: bool,
    },

    /// Merge identifier files into one set by intersection or union
    #[command(arg_required_else_help = true)]
    MergeIds {
        /// identifier files, one id per line
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// merge method for the lists of ids
        #[arg(value_enum, long, default_value = "intersect")]
        method: MergeMethod,

        /// file to write the merged ids to
        #[arg(short, long)]
        outfile: PathBuf,

        /// overwrite the output file if it exists
        #[arg(long)]
        force: bool,
    },

    /// Filter a FASTA/FASTQ file by read ids, length, or a random sample
    #[command(arg_required_else_help = true)]
    Filter {
        /// the input FASTA/FASTQ file
        input: PathBuf,

        /// the output FASTA/FASTQ file
        #[arg(short, long)]
        output: PathBuf,

        /// file with one read id per line; keeps the listed reads
        #[arg(short = 'i', long, conflicts_with_all = ["long", "short", "count"])]
        read_ids: Option<PathBuf>,

        /// keep reads of the given length or longer
        #[arg(short, long, conflicts_with_all = ["short", "count"])]
        long: Option<usize>,

        /// keep reads of the given length or shorter
        #[arg(short, long, conflicts_with = "count")]
        short: Option<usize>,

        /// keep a uniform random sample of this many reads
        #[arg(short = 'n', long)]
        count: Option<usize>,

        /// overwrite the output file if it exists
        #[arg(long)]
        force: bool,
    },

    /// Filter mapped BAM reads by aligned length and write them as FASTA
    #[command(arg_required_else_help = true)]
    FilterBam {
        /// the mapping BAM file
        #[arg(long)]
        bam: PathBuf,

        /// length threshold
        #[arg(short, long)]
        threshold: usize,

        /// keep reads at least (long) or at most (short) the threshold
        #[arg(value_enum, short, long)]
        mode: LengthMode,

        /// FASTA file to write the passing reads to
        #[arg(short, long)]
        outfile: PathBuf,

        /// overwrite the output file if it exists
        #[arg(long)]
        force: bool,
    },

    /// Slice a subsequence out of every read (or one read) of a FASTA/FASTQ file
    #[command(arg_required_else_help = true)]
    Slice {
        /// FASTA/FASTQ file from which to slice subsequences
        input: PathBuf,

        /// FASTA/FASTQ file to write the slices to
        output: PathBuf,

        /// append slices to an existing output file
        #[arg(long)]
        append: bool,

        /// center position of the slice (1-based)
        #[arg(long, conflicts_with_all = ["lowerbound", "upperbound", "slice_start", "slice_end"])]
        position: Option<i64>,

        /// bases to include up- and downstream of --position
        #[arg(long, requires = "position")]
        range: Option<i64>,

        /// lower bound of the slice interval (1-based, inclusive)
        #[arg(long, conflicts_with_all = ["slice_start", "slice_end"])]
        lowerbound: Option<i64>,

        /// upper bound of the slice interval (1-based, inclusive)
        #[arg(long, conflicts_with_all = ["slice_start", "slice_end"])]
        upperbound: Option<i64>,

        /// slice this many bases from the start of each read
        #[arg(long, conflicts_with = "slice_end")]
        slice_start: Option<i64>,

        /// slice this many bases from the end of each read
        #[arg(long)]
        slice_end: Option<i64>,

        /// only slice (and emit) the record with this id; all others are dropped
        #[arg(long)]
        id: Option<String>,
    },

    /// Replace one base with another, recording every replaced position
    #[command(arg_required_else_help = true)]
    Replace {
        /// input FASTA/FASTQ file
        fastx: PathBuf,

        /// source base to be replaced
        srcbase: char,

        /// target base that is inserted
        tgtbase: char,

        /// output directory (defaults to the input file's directory)
        #[arg(long)]
        outdir: Option<PathBuf>,

        /// overwrite the output files if they exist
        #[arg(long)]
        force: bool,
    },

    /// Restore recorded source bases into the reads of a BAM file
    #[command(arg_required_else_help = true)]
    Reconcile {
        /// the BAM file produced from the replaced reads
        inbam: PathBuf,

        /// the corrected BAM file to write
        outbam: PathBuf,

        /// the replacement log written by `replace`
        log: PathBuf,

        /// use the RNA alphabet when re-orienting reverse-strand reads
        #[arg(long)]
        rna: bool,

        /// overwrite the output file if it exists
        #[arg(long)]
        force: bool,
    },

    /// Report the IUPAC base content of a FASTA file or a bare sequence
    #[command(arg_required_else_help = true)]
    Content {
        /// FASTA file (.fa/.fasta) or a sequence given directly
        fasta_or_seq: String,

        /// use the RNA alphabet
        #[arg(long)]
        rna: bool,
    },

    /// Compare the rows of an aligned FASTA file column by column
    #[command(arg_required_else_help = true)]
    Compare {
        /// aligned multi-FASTA file, `-` as the gap symbol
        aln: PathBuf,

        /// CSV file for the per-column table (written for >2 sequences)
        #[arg(long, default_value = "alignment_columns.csv")]
        table: PathBuf,

        /// overwrite the column table if it exists
        #[arg(long)]
        force: bool,
    },
}
