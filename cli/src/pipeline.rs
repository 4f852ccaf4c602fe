//! End-to-end run: germline construction, clonal evolution, segmentation,
//! and genome materialization, all driven by the parsed command line.
use crate::commands::{base_size, parse_focal};
use clap::ArgMatches;
use definitions::{MutationConfig, SimError};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use simulator::diploid::{self, DiploidConfig};
use simulator::materialize;
use simulator::mutation::Evolve;
use simulator::phylogeny::Tumor;
use simulator::segmentation::Segmentation;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

pub fn run(matches: &ArgMatches) -> Result<(), SimError> {
    let reference = existing_file(matches.get_one::<String>("reference").unwrap())?;
    let rundir = PathBuf::from(matches.get_one::<String>("rundir").unwrap());
    if !rundir.is_dir() {
        let msg = format!("run directory {} does not exist", rundir.display());
        return Err(SimError::Config(msg));
    }
    let bin_size = base_size(matches.get_one::<String>("binsize").unwrap())?;
    if bin_size == 0 {
        return Err(SimError::Config("bin size must be positive".to_string()));
    }
    let num_clones = *matches.get_one::<usize>("numclones").unwrap();
    let jobs = *matches.get_one::<usize>("jobs").unwrap();
    if jobs == 0 {
        return Err(SimError::Config("at least one job is required".to_string()));
    }
    if let Err(why) = rayon::ThreadPoolBuilder::new().num_threads(jobs).build_global() {
        // A pool already exists; keep it.
        warn!("POOL\t{}", why);
    }
    let mut rng: Xoshiro256PlusPlus = match matches.get_one::<u64>("rndseed") {
        Some(&seed) => {
            debug!("SEED\t{}", seed);
            SeedableRng::seed_from_u64(seed)
        }
        None => Xoshiro256PlusPlus::from_entropy(),
    };
    let diploid_config = diploid_config(matches)?;
    let mutation_config = mutation_config(matches)?;
    mutation_config.validate(num_clones)?;

    let genome = diploid::build(&reference, &diploid_config, &rundir, &mut rng)?;
    for (name, length) in genome.chromosomes.iter() {
        debug!("CHR\t{}\t{}", name, length);
    }
    info!(
        "GERMLINE\t{} chromosomes\t{} SNPs ({} heterozygous)",
        genome.chromosomes.len(),
        genome.num_snps,
        genome.het_snps
    );
    if num_clones == 0 {
        // Matched-normal only; no tumor stages.
        info!("DONE\tnormal sample in {}", rundir.display());
        return Ok(());
    }

    let mut tumor = Tumor::random(num_clones, &genome.chromosomes, bin_size, &mut rng)?;
    tumor.evolve(&mutation_config, &mut rng)?;
    for clone in tumor.clones.iter() {
        debug!("CLONE\t{}\t{} bp", clone.label, clone.genome_length());
    }

    let dot = rundir.join("tumor.dot");
    std::fs::write(&dot, tumor.draw())?;
    let json = rundir.join("tumor.json");
    let mut wtr = std::fs::File::create(&json).map(BufWriter::new)?;
    serde_json::to_writer(&mut wtr, &tumor)
        .map_err(|why| SimError::Config(format!("serializing the tumor: {}", why)))?;
    wtr.flush()?;

    let table = tumor.segmentation();
    let tsv = rundir.join("copynumbers.tsv");
    let mut wtr = std::fs::File::create(&tsv).map(BufWriter::new)?;
    table.write_tsv(&tumor.labels(), &mut wtr)?;
    wtr.flush()?;
    info!("SEGMENTS\t{}", table.num_segments());

    let units = materialize::units(&tumor, &genome.maternal_fa, &genome.paternal_fa, &rundir);
    materialize::build_all(&units)?;
    info!("DONE\t{} clone genomes in {}", units.len(), rundir.display());
    Ok(())
}

fn diploid_config(matches: &ArgMatches) -> Result<DiploidConfig, SimError> {
    let snp_list = match matches.get_one::<String>("snplist") {
        Some(path) => Some(existing_file(path)?),
        None => None,
    };
    let ignore = match matches.get_one::<String>("ignore") {
        Some(path) => read_names(&existing_file(path)?)?,
        None => vec![],
    };
    Ok(DiploidConfig {
        snp_list,
        snp_ratio: matches.get_one::<f64>("snpratio").copied(),
        het_ratio: *matches.get_one::<f64>("hehoratio").unwrap(),
        ignore,
    })
}

fn mutation_config(matches: &ArgMatches) -> Result<MutationConfig, SimError> {
    let focal = |name| match matches.get_one::<String>(name) {
        Some(spec) => parse_focal(spec),
        None => Ok(vec![]),
    };
    Ok(MutationConfig {
        clonal_wgd: *matches.get_one::<usize>("clonalwgd").unwrap(),
        clonal_wcl: *matches.get_one::<usize>("clonalwcl").unwrap(),
        clonal_cam: *matches.get_one::<usize>("clonalcam").unwrap(),
        clonal_focal: focal("clonalcna")?,
        subclonal_wgd: *matches.get_one::<usize>("subclonalwgd").unwrap(),
        subclonal_wcl: *matches.get_one::<usize>("subclonalwcl").unwrap(),
        subclonal_cam: *matches.get_one::<usize>("subclonalcam").unwrap(),
        subclonal_focal: focal("subclonalcna")?,
        ratio_ad: *matches.get_one::<f64>("adratio").unwrap(),
    })
}

fn existing_file(path: &str) -> Result<PathBuf, SimError> {
    let path = PathBuf::from(path);
    match path.is_file() {
        true => Ok(path),
        false => Err(SimError::Config(format!(
            "{} does not exist or is not a file",
            path.display()
        ))),
    }
}

/// One chromosome name per line, blank lines and `#` comments skipped.
fn read_names(path: &Path) -> Result<Vec<String>, SimError> {
    let reader = std::fs::File::open(path).map(BufReader::new)?;
    let mut names = vec![];
    for line in reader.lines() {
        let line = line?;
        let name = line.trim();
        if !name.is_empty() && !name.starts_with('#') {
            names.push(name.to_string());
        }
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_reference(dir: &Path) -> PathBuf {
        let path = dir.join("ref.fa");
        let mut wtr = std::fs::File::create(&path).unwrap();
        writeln!(wtr, ">chr1\n{}", "ACGTACGTAC".repeat(10)).unwrap();
        path
    }

    fn run_with(args: &[&str]) -> Result<(), SimError> {
        let matches = crate::commands::command().get_matches_from(args);
        run(&matches)
    }

    #[test]
    fn zero_clones_builds_only_the_normal() {
        let dir = tempfile::tempdir().unwrap();
        let reference = write_reference(dir.path());
        let result = run_with(&[
            "cnasim",
            reference.to_str().unwrap(),
            "-n",
            "0",
            "-p",
            "0.1",
            "-s",
            "7",
            "-x",
            dir.path().to_str().unwrap(),
        ]);
        result.unwrap();
        assert!(dir.path().join("human.maternal.fa").is_file());
        assert!(dir.path().join("human.paternal.fa").is_file());
        assert!(!dir.path().join("tumor.dot").exists());
        assert!(!dir.path().join("tumor.json").exists());
        assert!(!dir.path().join("copynumbers.tsv").exists());
    }

    #[test]
    fn full_run_writes_every_output() {
        let dir = tempfile::tempdir().unwrap();
        let reference = write_reference(dir.path());
        run_with(&[
            "cnasim",
            reference.to_str().unwrap(),
            "-n",
            "2",
            "-p",
            "0.1",
            "-s",
            "11",
            "-b",
            "10",
            "--clonalwgd",
            "1",
            "-x",
            dir.path().to_str().unwrap(),
        ])
        .unwrap();
        assert!(dir.path().join("tumor.dot").is_file());
        assert!(dir.path().join("tumor.json").is_file());
        assert!(dir.path().join("copynumbers.tsv").is_file());
        for clone in ["clone0", "clone1"] {
            assert!(dir.path().join(format!("{}.maternal.fa", clone)).is_file());
            assert!(dir.path().join(format!("{}.paternal.fa", clone)).is_file());
        }
    }
}
