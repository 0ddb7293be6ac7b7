#[macro_use]
extern crate log;

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;

mod alphabet;
mod cli;
mod fastx;
mod filter;
mod ids;
mod reconcile;
mod replace;
mod slice;
mod stats;

use alphabet::Alphabet;
use cli::{Cli, Commands, MergeMethod};
use filter::LengthMode;

/// Prints the complement of a single sequence, with strand orientation
/// markers matching the input's 5'→3' reading direction.
fn run_complement(sequence: &str, reverse: bool, alphabet: Alphabet) -> Result<()> {
    let complement = alphabet.complement_seq(sequence.as_bytes())?;
    let pad = " ".repeat(sequence.len().saturating_sub(3));

    println!("Input");
    println!("5'{pad}3'");
    println!("{sequence}\n");

    if reverse {
        let mut rc = complement;
        rc.reverse();
        println!("5'{pad}3'");
        println!("{}", String::from_utf8(rc)?);
    } else {
        println!("3'{pad}5'");
        println!("{}", String::from_utf8(complement)?);
    }
    Ok(())
}

enum FilterMode<'a> {
    Ids(&'a PathBuf),
    Length(usize, LengthMode),
    Count(usize),
}

fn run_filter(
    input: &PathBuf,
    output: &PathBuf,
    mode: FilterMode,
    force: bool,
) -> Result<()> {
    let (_, reader) = fastx::open_records(input)?;

    match mode {
        FilterMode::Ids(path) => {
            let wanted = ids::read_id_file(path)?;
            let mut writer = fastx::FastxWriter::create(output, force, false)?;
            let outcome = filter::filter_by_ids(reader, &wanted, |r| writer.write_record(&r))?;
            writer.finish()?;
            if !outcome.missing.is_empty() {
                warn!(
                    "{} wanted ids were not present in the input: {:?}",
                    outcome.missing.len(),
                    outcome.missing
                );
            }
        }
        FilterMode::Length(threshold, length_mode) => {
            let mut writer = fastx::FastxWriter::create(output, force, false)?;
            let summary =
                filter::filter_by_length(reader, threshold, length_mode, |r| {
                    writer.write_record(&r)
                })?;
            writer.finish()?;
            let fmt = |v: Option<usize>| v.map_or("n/a".to_string(), |l| l.to_string());
            info!(
                "Kept {} records (longest input read: {}, shortest: {})",
                summary.kept,
                fmt(summary.longest),
                fmt(summary.shortest)
            );
        }
        FilterMode::Count(n) => {
            // the sample size is validated before the output file is created
            let records = reader.collect::<Result<Vec<_>>>()?;
            let sampled = filter::sample_records(records, n, &mut rand::thread_rng())?;

            let mut writer = fastx::FastxWriter::create(output, force, false)?;
            for record in &sampled {
                writer.write_record(record)?;
            }
            writer.finish()?;
            info!("Sampled {n} records");
        }
    }

    Ok(())
}

fn try_main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_target(false)
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Complement {
            sequence,
            reverse,
            rna,
        } => {
            run_complement(sequence, *reverse, Alphabet::from_rna_flag(*rna))?;
        }
        Commands::MergeIds {
            files,
            method,
            outfile,
            force,
        } => {
            let sets = files
                .iter()
                .map(|f| ids::read_id_file(f))
                .collect::<Result<Vec<_>>>()?;

            let merged = match method {
                MergeMethod::Intersect => ids::intersect(sets)?,
                MergeMethod::Union => ids::union(sets),
            };

            ids::write_ids(&merged, outfile, *force)?;
            info!("Wrote {} ids to {}", merged.len(), outfile.display());
        }
        Commands::Filter {
            input,
            output,
            read_ids,
            long,
            short,
            count,
            force,
        } => {
            // exactly one mode; clap rules out combinations, this rules out none
            let mode = match (read_ids, long, short, count) {
                (Some(path), None, None, None) => FilterMode::Ids(path),
                (None, Some(t), None, None) => FilterMode::Length(*t, LengthMode::Long),
                (None, None, Some(t), None) => FilterMode::Length(*t, LengthMode::Short),
                (None, None, None, Some(n)) => FilterMode::Count(*n),
                _ => bail!("exactly one of --read-ids, --long, --short or --count is required"),
            };
            run_filter(input, output, mode, *force)?;
        }
        Commands::FilterBam {
            bam,
            threshold,
            mode,
            outfile,
            force,
        } => {
            filter::filter_bam_by_length(bam, outfile, *threshold, *mode, *force)?;
        }
        Commands::Slice {
            input,
            output,
            append,
            position,
            range,
            lowerbound,
            upperbound,
            slice_start,
            slice_end,
            id,
        } => {
            let spec = slice::SliceSpec::from_args(
                *position,
                *range,
                *lowerbound,
                *upperbound,
                *slice_start,
                *slice_end,
            )?;
            slice::slice_file(input, output, spec, id.as_deref(), *append)?;
        }
        Commands::Replace {
            fastx,
            srcbase,
            tgtbase,
            outdir,
            force,
        } => {
            let (out_fastx, out_csv) =
                replace::replace_file(fastx, outdir.as_deref(), *srcbase, *tgtbase, *force)?;
            info!(
                "Wrote replaced records to {} and the log to {}",
                out_fastx.display(),
                out_csv.display()
            );
        }
        Commands::Reconcile {
            inbam,
            outbam,
            log,
            rna,
            force,
        } => {
            reconcile::reconcile_bam(inbam, outbam, log, Alphabet::from_rna_flag(*rna), *force)?;
        }
        Commands::Content { fasta_or_seq, rna } => {
            stats::report_content(fasta_or_seq, Alphabet::from_rna_flag(*rna))?;
        }
        Commands::Compare { aln, table, force } => {
            stats::report_comparison(aln, table, *force)?;
        }
    };
    Ok(())
}

fn main() {
    if let Err(err) = try_main() {
        error!("{}", err);

        // report any errors that are produced
        err.chain()
            .skip(1)
            .for_each(|cause| error!("  because: {}", cause));

        std::process::exit(1);
    }
}
