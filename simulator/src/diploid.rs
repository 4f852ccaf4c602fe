//! Diploid genome construction.
//! Reads the reference FASTA once and writes the two germline haplotype
//! files (`human.maternal.fa` / `human.paternal.fa`), substituting SNPs on
//! the way. SNP positions come either from a list file or from a random
//! ratio; each SNP is heterozygous (two distinct alleles, one per haplotype)
//! or homozygous (one allele on both) according to the het/hom ratio. The
//! case of the reference base is preserved.
use bio::io::fasta;
use definitions::SimError;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashMap;
use std::io::{BufRead, BufReader, BufWriter};
use std::path::{Path, PathBuf};

const NUCLEOTIDES: [u8; 4] = *b"ACGT";

#[derive(Debug, Clone, Default)]
pub struct DiploidConfig {
    /// SNP positions and candidate alleles, `CHR POS ALLELES...` per line.
    pub snp_list: Option<PathBuf>,
    /// Fraction of positions to turn into SNPs when no list is given.
    pub snp_ratio: Option<f64>,
    /// Fraction of SNPs that are heterozygous.
    pub het_ratio: f64,
    /// Chromosome names to drop from the reference.
    pub ignore: Vec<String>,
}

impl DiploidConfig {
    fn validate(&self) -> Result<(), SimError> {
        if self.snp_list.is_none() && self.snp_ratio.is_none() {
            let msg = "either a SNP list or a SNP ratio must be given".to_string();
            return Err(SimError::Config(msg));
        }
        if let Some(ratio) = self.snp_ratio {
            if !(0.0..=1.0).contains(&ratio) {
                let msg = format!("SNP ratio must lie in [0,1], got {}", ratio);
                return Err(SimError::Config(msg));
            }
        }
        if !(0.0..=1.0).contains(&self.het_ratio) {
            let msg = format!("het/hom ratio must lie in [0,1], got {}", self.het_ratio);
            return Err(SimError::Config(msg));
        }
        Ok(())
    }
}

/// The built germline genome: chromosome names and lengths in reference
/// order, the two haplotype FASTA files, and SNP tallies.
#[derive(Debug, Clone)]
pub struct DiploidGenome {
    pub chromosomes: Vec<(String, usize)>,
    pub maternal_fa: PathBuf,
    pub paternal_fa: PathBuf,
    pub num_snps: usize,
    pub het_snps: usize,
}

pub fn build<R: Rng>(
    reference: &Path,
    config: &DiploidConfig,
    out_dir: &Path,
    rng: &mut R,
) -> Result<DiploidGenome, SimError> {
    config.validate()?;
    let snp_list = match &config.snp_list {
        Some(path) => Some(parse_snp_list(path)?),
        None => None,
    };
    let maternal_fa = out_dir.join("human.maternal.fa");
    let paternal_fa = out_dir.join("human.paternal.fa");
    let reader = std::fs::File::open(reference)
        .map(BufReader::new)
        .map(fasta::Reader::new)?;
    let mut maternal_wtr = std::fs::File::create(&maternal_fa)
        .map(BufWriter::new)
        .map(fasta::Writer::new)?;
    let mut paternal_wtr = std::fs::File::create(&paternal_fa)
        .map(BufWriter::new)
        .map(fasta::Writer::new)?;
    let mut chromosomes = vec![];
    let (mut num_snps, mut het_snps) = (0, 0);
    for record in reader.records() {
        let record = record?;
        let name = record.id().to_string();
        if config.ignore.contains(&name) {
            debug!("IGNORE\t{}", name);
            continue;
        }
        if record.seq().is_empty() {
            let msg = format!("chromosome {} has no sequence", name);
            return Err(SimError::Config(msg));
        }
        let mut maternal = record.seq().to_vec();
        let mut paternal = record.seq().to_vec();
        let length = maternal.len();
        let snps = match (&snp_list, config.snp_ratio) {
            (Some(list), _) => list.get(&name).cloned().unwrap_or_default(),
            (None, Some(ratio)) => random_snps(length, ratio, rng),
            (None, None) => unreachable!("validated above"),
        };
        for (position, candidates) in snps {
            if position >= length {
                continue;
            }
            num_snps += 1;
            let heterozygous = rng.gen_bool(config.het_ratio) && candidates.len() >= 2;
            if heterozygous {
                let picks: Vec<u8> = candidates.choose_multiple(rng, 2).copied().collect();
                maternal[position] = match_case(maternal[position], picks[0]);
                paternal[position] = match_case(paternal[position], picks[1]);
                het_snps += 1;
            } else {
                let &allele = candidates
                    .choose(rng)
                    .expect("SNP entries carry at least one allele");
                maternal[position] = match_case(maternal[position], allele);
                paternal[position] = match_case(paternal[position], allele);
            }
        }
        maternal_wtr.write(&name, None, &maternal)?;
        paternal_wtr.write(&name, None, &paternal)?;
        chromosomes.push((name, length));
    }
    Ok(DiploidGenome {
        chromosomes,
        maternal_fa,
        paternal_fa,
        num_snps,
        het_snps,
    })
}

/// Pick `round(length * ratio)` distinct positions, each with two distinct
/// candidate nucleotides.
fn random_snps<R: Rng>(length: usize, ratio: f64, rng: &mut R) -> Vec<(usize, Vec<u8>)> {
    let amount = (length as f64 * ratio).round() as usize;
    rand::seq::index::sample(rng, length, amount)
        .into_iter()
        .map(|position| {
            let alleles: Vec<u8> = NUCLEOTIDES.choose_multiple(rng, 2).copied().collect();
            (position, alleles)
        })
        .collect()
}

fn match_case(reference: u8, allele: u8) -> u8 {
    match reference.is_ascii_lowercase() {
        true => allele.to_ascii_lowercase(),
        false => allele.to_ascii_uppercase(),
    }
}

type SnpList = HashMap<String, Vec<(usize, Vec<u8>)>>;

/// Parse a SNP list file: `CHR POS ALLELES...` per line, `#` lines skipped.
/// Allele columns are flattened into the set of A/C/G/T characters they
/// contain.
fn parse_snp_list(path: &Path) -> Result<SnpList, SimError> {
    let reader = std::fs::File::open(path).map(BufReader::new)?;
    let mut list: SnpList = HashMap::new();
    for line in reader.lines() {
        let line = line?;
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() <= 2 {
            continue;
        }
        let position: usize = fields[1].parse().map_err(|_| {
            SimError::Config(format!("malformed SNP position in line `{}`", line))
        })?;
        let mut alleles: Vec<u8> = fields[2..]
            .iter()
            .flat_map(|field| field.bytes())
            .map(|c| c.to_ascii_uppercase())
            .filter(|c| NUCLEOTIDES.contains(c))
            .collect();
        alleles.sort_unstable();
        alleles.dedup();
        if alleles.is_empty() {
            let msg = format!("SNP entry `{}` carries no A/C/G/T allele", line);
            return Err(SimError::Config(msg));
        }
        let entries = list.entry(fields[0].to_string()).or_default();
        if entries.iter().all(|(p, _)| *p != position) {
            entries.push((position, alleles));
        }
    }
    Ok(list)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;
    use std::io::Write;

    fn write_reference(dir: &Path) -> PathBuf {
        let path = dir.join("ref.fa");
        let mut wtr = std::fs::File::create(&path).unwrap();
        writeln!(wtr, ">chr1\nACGTACGTAC\n>chrM\nACGT\n>chr2\nacgtacgt").unwrap();
        path
    }

    fn read_fasta(path: &Path) -> Vec<(String, Vec<u8>)> {
        let reader = std::fs::File::open(path)
            .map(BufReader::new)
            .map(fasta::Reader::new)
            .unwrap();
        reader
            .records()
            .map(|r| {
                let r = r.unwrap();
                (r.id().to_string(), r.seq().to_vec())
            })
            .collect()
    }

    #[test]
    fn builds_both_haplotypes_and_skips_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let reference = write_reference(dir.path());
        let config = DiploidConfig {
            snp_ratio: Some(0.5),
            het_ratio: 0.67,
            ignore: vec!["chrM".to_string()],
            ..Default::default()
        };
        let mut rng: Xoshiro256PlusPlus = SeedableRng::seed_from_u64(0);
        let genome = build(&reference, &config, dir.path(), &mut rng).unwrap();
        assert_eq!(
            genome.chromosomes,
            vec![("chr1".to_string(), 10), ("chr2".to_string(), 8)]
        );
        let maternal = read_fasta(&genome.maternal_fa);
        let paternal = read_fasta(&genome.paternal_fa);
        assert_eq!(maternal.len(), 2);
        assert_eq!(paternal.len(), 2);
        // SNPs substitute in place; lengths never change.
        for ((_, m), (_, p)) in maternal.iter().zip(paternal.iter()) {
            assert_eq!(m.len(), p.len());
        }
        assert_eq!(genome.num_snps, 9);
        assert!(genome.het_snps <= genome.num_snps);
        // Lowercase reference stays lowercase.
        assert!(maternal[1].1.iter().all(|c| c.is_ascii_lowercase()));
    }

    #[test]
    fn snp_list_drives_positions() {
        let dir = tempfile::tempdir().unwrap();
        let reference = write_reference(dir.path());
        let list = dir.path().join("snps.tsv");
        let mut wtr = std::fs::File::create(&list).unwrap();
        writeln!(wtr, "#CHR\tPOS\tREF\tALT").unwrap();
        writeln!(wtr, "chr1\t0\tA\tC").unwrap();
        writeln!(wtr, "chr1\t99\tA\tC").unwrap();
        let config = DiploidConfig {
            snp_list: Some(list),
            het_ratio: 0.0,
            ..Default::default()
        };
        let mut rng: Xoshiro256PlusPlus = SeedableRng::seed_from_u64(1);
        let genome = build(&reference, &config, dir.path(), &mut rng).unwrap();
        // The out-of-range position is dropped.
        assert_eq!(genome.num_snps, 1);
        assert_eq!(genome.het_snps, 0);
        let maternal = read_fasta(&genome.maternal_fa);
        let paternal = read_fasta(&genome.paternal_fa);
        // Homozygous: both haplotypes carry the same base at position 0.
        assert_eq!(maternal[0].1[0], paternal[0].1[0]);
        assert!(maternal[0].1[0] == b'A' || maternal[0].1[0] == b'C');
    }

    #[test]
    fn snp_entry_without_valid_alleles_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let reference = write_reference(dir.path());
        let list = dir.path().join("snps.tsv");
        let mut wtr = std::fs::File::create(&list).unwrap();
        writeln!(wtr, "chr1\t0\tN\tN").unwrap();
        let config = DiploidConfig {
            snp_list: Some(list),
            het_ratio: 0.5,
            ..Default::default()
        };
        let mut rng: Xoshiro256PlusPlus = SeedableRng::seed_from_u64(0);
        assert!(matches!(
            build(&reference, &config, dir.path(), &mut rng),
            Err(SimError::Config(_))
        ));
    }

    #[test]
    fn missing_snp_source_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let reference = write_reference(dir.path());
        let config = DiploidConfig::default();
        let mut rng: Xoshiro256PlusPlus = SeedableRng::seed_from_u64(0);
        assert!(matches!(
            build(&reference, &config, dir.path(), &mut rng),
            Err(SimError::Config(_))
        ));
    }

    #[test]
    fn empty_reference_record_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let reference = dir.path().join("ref.fa");
        let mut wtr = std::fs::File::create(&reference).unwrap();
        writeln!(wtr, ">chr1\nACGTACGT\n>chrE\n>chr2\nACGT").unwrap();
        let config = DiploidConfig {
            snp_ratio: Some(0.1),
            het_ratio: 0.67,
            ..Default::default()
        };
        let mut rng: Xoshiro256PlusPlus = SeedableRng::seed_from_u64(0);
        assert!(matches!(
            build(&reference, &config, dir.path(), &mut rng),
            Err(SimError::Config(_))
        ));
        // Ignoring the empty record makes the same reference acceptable.
        let config = DiploidConfig {
            ignore: vec!["chrE".to_string()],
            ..config
        };
        let genome = build(&reference, &config, dir.path(), &mut rng).unwrap();
        assert_eq!(
            genome.chromosomes,
            vec![("chr1".to_string(), 8), ("chr2".to_string(), 4)]
        );
    }
}
