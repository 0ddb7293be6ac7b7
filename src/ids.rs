use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::fastx::check_collision;

/// A deduplicated set of read identifiers. A BTreeSet keeps output order
/// deterministic across runs.
pub type IdSet = BTreeSet<String>;

/// Reads one identifier per line, trimming surrounding whitespace and line
/// terminators. Blank lines are ignored.
pub fn read_id_file(path: &Path) -> Result<IdSet> {
    let file =
        File::open(path).with_context(|| format!("Unable to open id file {}", path.display()))?;

    let mut ids = IdSet::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        let id = line.trim();
        if !id.is_empty() {
            ids.insert(id.to_string());
        }
    }
    Ok(ids)
}

/// Identifiers present in every set simultaneously. An empty list of sets is
/// an error, not an empty result.
pub fn intersect(sets: Vec<IdSet>) -> Result<IdSet> {
    let mut iter = sets.into_iter();
    let Some(first) = iter.next() else {
        bail!("no id files provided to intersect");
    };

    Ok(iter.fold(first, |acc, set| acc.intersection(&set).cloned().collect()))
}

/// Identifiers present in any of the sets.
pub fn union(sets: Vec<IdSet>) -> IdSet {
    sets.into_iter().flatten().collect()
}

/// Writes the merged set, one identifier per line.
pub fn write_ids(ids: &IdSet, path: &Path, force: bool) -> Result<()> {
    check_collision(path, force)?;
    let file = File::create(path)
        .with_context(|| format!("Unable to create output file {}", path.display()))?;
    let mut out = BufWriter::new(file);

    for id in ids {
        writeln!(out, "{id}")?;
    }
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(ids: &[&str]) -> IdSet {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn intersect_keeps_ids_present_everywhere() {
        let merged = intersect(vec![set(&["a", "b", "c"]), set(&["b", "c", "d"])]).unwrap();
        assert_eq!(merged, set(&["b", "c"]));
    }

    #[test]
    fn intersect_of_nothing_is_an_error() {
        assert!(intersect(Vec::new()).is_err());
    }

    #[test]
    fn union_merges_everything() {
        let merged = union(vec![set(&["a", "b"]), set(&["b", "c"])]);
        assert_eq!(merged, set(&["a", "b", "c"]));
    }

    #[test]
    fn id_files_are_trimmed_and_deduplicated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ids.txt");
        std::fs::write(&path, "read1\nread2  \n\nread1\n").unwrap();

        let ids = read_id_file(&path).unwrap();
        assert_eq!(ids, set(&["read1", "read2"]));
    }
}
