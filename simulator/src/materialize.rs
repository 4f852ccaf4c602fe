//! Parallel FASTA materialization.
//! Once the tree is final, each (clone, allele) pair is an independent,
//! read-only job: stream the germline haplotype FASTA and re-emit every
//! chromosome as the concatenation of the slices named by the clone's final
//! bin list. Jobs run on the rayon pool, consume no randomness, and report
//! success or failure individually; one failed job never blocks the rest.
use crate::phylogeny::Tumor;
use bio::io::fasta;
use definitions::{Allele, Bin, SimError, ALLELES};
use rayon::prelude::*;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

/// One materialization job: rebuild one allele of one clone.
#[derive(Debug, Clone)]
pub struct BuildUnit {
    pub label: String,
    pub allele: Allele,
    /// Germline haplotype FASTA this allele descends from.
    pub source: PathBuf,
    pub output: PathBuf,
    /// Final bin list per chromosome, reference order. Chromosomes whose
    /// haplotype is empty are skipped entirely.
    pub haplotypes: Vec<(String, Vec<Bin>)>,
    /// Reference lengths, used to sanity-check the source sequences.
    pub lengths: Vec<(String, usize)>,
}

/// Expand the finalized tumor into one job per (clone, allele).
pub fn units(tumor: &Tumor, maternal_fa: &Path, paternal_fa: &Path, out_dir: &Path) -> Vec<BuildUnit> {
    let mut units = vec![];
    for clone in tumor.clones.iter() {
        for &allele in ALLELES.iter() {
            let source = match allele {
                Allele::Maternal => maternal_fa.to_path_buf(),
                Allele::Paternal => paternal_fa.to_path_buf(),
            };
            let output = out_dir.join(format!("{}.{}.fa", clone.label, allele));
            let haplotypes = clone
                .genome
                .iter()
                .map(|c| (c.name.clone(), c.haplotype(allele).bins().to_vec()))
                .collect();
            let lengths = clone.genome.iter().map(|c| (c.name.clone(), c.length)).collect();
            units.push(BuildUnit {
                label: clone.label.clone(),
                allele,
                source,
                output,
                haplotypes,
                lengths,
            });
        }
    }
    units
}

/// Run every job on the current rayon pool and collect per-unit outcomes.
pub fn build_all(units: &[BuildUnit]) -> Result<(), SimError> {
    let results: Vec<(usize, Result<(), SimError>)> = units
        .par_iter()
        .enumerate()
        .map(|(index, unit)| (index, build_unit(unit)))
        .collect();
    let total = results.len();
    let mut failed = 0;
    for (index, result) in results {
        let unit = &units[index];
        match result {
            Ok(()) => debug!("BUILT\t{}\t{}", unit.label, unit.output.display()),
            Err(why) => {
                failed += 1;
                error!("FAILED\t{}\t{}\t{}", unit.label, unit.output.display(), why);
            }
        }
    }
    match failed {
        0 => Ok(()),
        failed => Err(SimError::Materialize { failed, total }),
    }
}

fn build_unit(unit: &BuildUnit) -> Result<(), SimError> {
    let reader = std::fs::File::open(&unit.source)
        .map(BufReader::new)
        .map(fasta::Reader::new)?;
    let mut wtr = std::fs::File::create(&unit.output)
        .map(BufWriter::new)
        .map(fasta::Writer::new)?;
    for record in reader.records() {
        let record = record?;
        let name = record.id();
        let bins = match unit.haplotypes.iter().find(|(n, _)| n == name) {
            Some((_, bins)) if !bins.is_empty() => bins,
            _ => continue,
        };
        if let Some(&(_, expected)) = unit.lengths.iter().find(|(n, _)| n == name) {
            if record.seq().len() != expected {
                let msg = format!(
                    "{}: {} is {} bp in {}, expected {}",
                    unit.label,
                    name,
                    record.seq().len(),
                    unit.source.display(),
                    expected
                );
                return Err(SimError::Config(msg));
            }
        }
        let sequence = assemble(record.seq(), bins);
        wtr.write(name, None, &sequence)?;
    }
    Ok(())
}

fn assemble(reference: &[u8], bins: &[Bin]) -> Vec<u8> {
    let total: usize = bins.iter().map(Bin::span).sum();
    let mut sequence = Vec::with_capacity(total);
    for bin in bins {
        sequence.extend_from_slice(&reference[bin.begin..bin.end]);
    }
    sequence
}
