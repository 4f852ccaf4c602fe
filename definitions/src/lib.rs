//! Definitions -- the shared data model of the cnasim workspace.
//! A simulated tumor is a set of clones, each owning a per-chromosome pair of
//! haplotypes. A haplotype is an ordered list of reference bins; copy-number
//! aberrations duplicate or delete runs of bins, so the bin list is the whole
//! state of an allele. Everything here is serializable so that a finished
//! simulation can be dumped as one JSON object.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("mutation start {start} lies beyond the current haplotype length {length}")]
    StartBeyondEnd { start: usize, length: usize },
    #[error("no bin covers position {start} in the current haplotype")]
    OutOfBins { start: usize },
    #[error("allele selector `{0}` is neither maternal nor paternal")]
    InvalidAllele(String),
    #[error("unknown chromosome `{0}`")]
    UnknownChromosome(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("{failed} of {total} genome build job(s) failed")]
    Materialize { failed: usize, total: usize },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A half-open interval `[begin, end)` over the original, unmutated sequence
/// of one chromosome. Bins are created once when a chromosome is partitioned
/// and never change afterwards; haplotypes refer to them by value.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Bin {
    pub begin: usize,
    pub end: usize,
}

impl Bin {
    pub fn span(&self) -> usize {
        self.end - self.begin
    }
}

impl std::fmt::Display for Bin {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "[{},{})", self.begin, self.end)
    }
}

/// Partition `[0, length)` into bins of `bin_size`. The last bin starts at the
/// largest multiple of `bin_size` below `length` and may be shorter than the
/// others; when `length <= bin_size` it is the only bin.
pub fn partition(length: usize, bin_size: usize) -> Vec<Bin> {
    assert!(length > 0 && bin_size > 0);
    let last = (length - 1) / bin_size * bin_size;
    let mut bins: Vec<_> = (0..last)
        .step_by(bin_size)
        .map(|begin| Bin {
            begin,
            end: begin + bin_size,
        })
        .collect();
    bins.push(Bin { begin: last, end: length });
    bins
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Allele {
    Maternal,
    Paternal,
}

pub const ALLELES: [Allele; 2] = [Allele::Maternal, Allele::Paternal];

impl Allele {
    /// Parse an allele selector. Accepts `m`/`p` or the full word,
    /// case-insensitively; anything else is an error.
    pub fn parse(token: &str) -> Result<Self, SimError> {
        match token.to_ascii_lowercase().as_str() {
            "m" | "maternal" => Ok(Allele::Maternal),
            "p" | "paternal" => Ok(Allele::Paternal),
            _ => Err(SimError::InvalidAllele(token.to_string())),
        }
    }
    /// One-letter tag used in mutation labels.
    pub fn letter(self) -> char {
        match self {
            Allele::Maternal => 'M',
            Allele::Paternal => 'P',
        }
    }
}

impl std::fmt::Display for Allele {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Allele::Maternal => write!(f, "maternal"),
            Allele::Paternal => write!(f, "paternal"),
        }
    }
}

/// One allele of one chromosome: an ordered list of reference bins. Bins may
/// repeat after a duplication and disappear after a deletion. The cached
/// `length` always equals the sum of the bin spans.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Haplotype {
    bins: Vec<Bin>,
    length: usize,
}

impl Haplotype {
    pub fn new(bins: Vec<Bin>) -> Self {
        let length = bins.iter().map(Bin::span).sum();
        Self { bins, length }
    }
    pub fn len(&self) -> usize {
        self.length
    }
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }
    pub fn bins(&self) -> &[Bin] {
        &self.bins
    }
    /// Locate the run of bins covered by `[start, start+size)` in the
    /// *current* coordinate space of this haplotype. Returns the half-open
    /// index range `[start_bin, end_bin)`. The start bin is the first whose
    /// cumulative end exceeds `start`; the run extends through the first bin
    /// whose cumulative end exceeds `start + size`, or to the end of the
    /// list if no such bin exists.
    fn locate(&self, start: usize, size: usize) -> Result<(usize, usize), SimError> {
        let mut cum = 0;
        let mut start_bin = None;
        let mut end_bin = self.bins.len();
        for (index, bin) in self.bins.iter().enumerate() {
            cum += bin.span();
            if start_bin.is_none() && cum > start {
                start_bin = Some(index);
            }
            if start_bin.is_some() && cum > start + size {
                end_bin = index + 1;
                break;
            }
        }
        match start_bin {
            Some(start_bin) => Ok((start_bin, end_bin)),
            None => Err(SimError::OutOfBins { start }),
        }
    }
    /// Replace the bins covered by `[start, start+size)` with two consecutive
    /// copies of themselves. The length grows by exactly the span of the
    /// duplicated run, which is at least `size` unless the range sticks out
    /// past the current end.
    pub fn tandem_duplicate(&mut self, start: usize, size: usize) -> Result<(), SimError> {
        if start > self.length {
            return Err(SimError::StartBeyondEnd {
                start,
                length: self.length,
            });
        }
        let (start_bin, end_bin) = self.locate(start, size)?;
        let copy: Vec<_> = self.bins[start_bin..end_bin].to_vec();
        self.bins.splice(end_bin..end_bin, copy);
        self.length = self.bins.iter().map(Bin::span).sum();
        Ok(())
    }
    /// Remove the bins covered by `[start, start+size)`.
    pub fn delete(&mut self, start: usize, size: usize) -> Result<(), SimError> {
        if start > self.length {
            return Err(SimError::StartBeyondEnd {
                start,
                length: self.length,
            });
        }
        let (start_bin, end_bin) = self.locate(start, size)?;
        self.bins.drain(start_bin..end_bin);
        self.length = self.bins.iter().map(Bin::span).sum();
        Ok(())
    }
    /// Occurrence count of every bin of `reference` in this haplotype.
    pub fn copy_numbers(&self, reference: &[Bin]) -> Vec<u32> {
        let index: HashMap<Bin, usize> = reference
            .iter()
            .enumerate()
            .map(|(index, &bin)| (bin, index))
            .collect();
        let mut counts = vec![0; reference.len()];
        for bin in self.bins.iter() {
            counts[index[bin]] += 1;
        }
        counts
    }
}

/// Per-clone state of one chromosome: the fixed reference partition plus the
/// two mutable haplotypes, both starting as the full partition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chromosome {
    pub name: String,
    pub length: usize,
    pub bin_size: usize,
    reference: Vec<Bin>,
    maternal: Haplotype,
    paternal: Haplotype,
}

impl Chromosome {
    pub fn new(name: &str, length: usize, bin_size: usize) -> Self {
        let reference = partition(length, bin_size);
        let maternal = Haplotype::new(reference.clone());
        let paternal = Haplotype::new(reference.clone());
        Self {
            name: name.to_string(),
            length,
            bin_size,
            reference,
            maternal,
            paternal,
        }
    }
    pub fn reference(&self) -> &[Bin] {
        &self.reference
    }
    pub fn haplotype(&self, allele: Allele) -> &Haplotype {
        match allele {
            Allele::Maternal => &self.maternal,
            Allele::Paternal => &self.paternal,
        }
    }
    fn haplotype_mut(&mut self, allele: Allele) -> &mut Haplotype {
        match allele {
            Allele::Maternal => &mut self.maternal,
            Allele::Paternal => &mut self.paternal,
        }
    }
    pub fn tandem_duplicate(
        &mut self,
        start: usize,
        size: usize,
        allele: Allele,
    ) -> Result<(), SimError> {
        self.haplotype_mut(allele).tandem_duplicate(start, size)
    }
    pub fn delete(&mut self, start: usize, size: usize, allele: Allele) -> Result<(), SimError> {
        self.haplotype_mut(allele).delete(start, size)
    }
}

/// One clone of the simulated tumor, a slot in the clone arena. The genome is
/// exclusively owned; `inherit` replaces it wholesale with a copy of the
/// parent's. `mutation_labels` is the append-only history shown on the tree
/// edge leading into this clone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloneNode {
    pub id: usize,
    pub label: String,
    pub genome: Vec<Chromosome>,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    pub mutation_labels: Vec<String>,
}

impl CloneNode {
    pub fn new(id: usize, label: String, template: &[Chromosome]) -> Self {
        Self {
            id,
            label,
            genome: template.to_vec(),
            parent: None,
            children: Vec::new(),
            mutation_labels: Vec::new(),
        }
    }
    /// Replace this clone's genome with a copy of the parent's current state.
    pub fn inherit(&mut self, parent_genome: &[Chromosome]) {
        self.genome = parent_genome.to_vec();
    }
    /// Total length over both haplotypes of every chromosome.
    pub fn genome_length(&self) -> usize {
        self.genome
            .iter()
            .map(|c| c.haplotype(Allele::Maternal).len() + c.haplotype(Allele::Paternal).len())
            .sum()
    }
    pub fn chromosome_index(&self, name: &str) -> Result<usize, SimError> {
        self.genome
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| SimError::UnknownChromosome(name.to_string()))
    }
    /// Whole-genome duplication: tandem-duplicate every nonzero haplotype of
    /// every chromosome.
    pub fn wgd(&mut self) -> Result<(), SimError> {
        for chromosome in self.genome.iter_mut() {
            for &allele in ALLELES.iter() {
                let length = chromosome.haplotype(allele).len();
                if length > 0 {
                    chromosome.tandem_duplicate(0, length, allele)?;
                }
            }
        }
        self.mutation_labels.push("WGD".to_string());
        Ok(())
    }
    /// Whole-chromosome loss: delete the entire current haplotype. The allele
    /// stays at length zero for the rest of this lineage.
    pub fn wcl(&mut self, chromosome: usize, allele: Allele) -> Result<(), SimError> {
        let chromosome = &mut self.genome[chromosome];
        let size = chromosome.haplotype(allele).len();
        chromosome.delete(0, size, allele)?;
        let label = format!("{}-{} loss", allele.letter(), chromosome.name);
        self.mutation_labels.push(label);
        Ok(())
    }
    pub fn tandem_duplicate(
        &mut self,
        chromosome: usize,
        start: usize,
        size: usize,
        allele: Allele,
        arm: bool,
    ) -> Result<(), SimError> {
        let chromosome = &mut self.genome[chromosome];
        chromosome.tandem_duplicate(start, size, allele)?;
        let label = match arm {
            false => format!(
                "({},{}) tdup in {}-{}",
                start,
                start + size,
                allele.letter(),
                chromosome.name
            ),
            true => format!(
                "({},{}) dup of {}-{} arm",
                start,
                start + size,
                allele.letter(),
                chromosome.name
            ),
        };
        self.mutation_labels.push(label);
        Ok(())
    }
    pub fn delete(
        &mut self,
        chromosome: usize,
        start: usize,
        size: usize,
        allele: Allele,
        arm: bool,
    ) -> Result<(), SimError> {
        let chromosome = &mut self.genome[chromosome];
        chromosome.delete(start, size, allele)?;
        let label = match arm {
            false => format!(
                "({},{}) del in {}-{}",
                start,
                start + size,
                allele.letter(),
                chromosome.name
            ),
            true => format!(
                "({},{}) del of {}-{} arm",
                start,
                start + size,
                allele.letter(),
                chromosome.name
            ),
        };
        self.mutation_labels.push(label);
        Ok(())
    }
}

/// One class of focal events: `quantity` events whose sizes are drawn from a
/// normal distribution with the given mean and standard deviation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct FocalSpec {
    pub mean: usize,
    pub std_dev: usize,
    pub quantity: usize,
}

/// Counts of the structural events to introduce, split into clonal events
/// (applied once, to the founder) and subclonal events (spread over the
/// non-root clones), plus the global duplication-versus-deletion ratio.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MutationConfig {
    pub clonal_wgd: usize,
    pub clonal_wcl: usize,
    pub clonal_cam: usize,
    pub clonal_focal: Vec<FocalSpec>,
    pub subclonal_wgd: usize,
    pub subclonal_wcl: usize,
    pub subclonal_cam: usize,
    pub subclonal_focal: Vec<FocalSpec>,
    pub ratio_ad: f64,
}

impl MutationConfig {
    /// Reject inconsistent settings before any simulation runs.
    pub fn validate(&self, num_clones: usize) -> Result<(), SimError> {
        if !(0.0..=1.0).contains(&self.ratio_ad) {
            let msg = format!("ratio_ad must lie in [0,1], got {}", self.ratio_ad);
            return Err(SimError::Config(msg));
        }
        let subclones = num_clones.saturating_sub(1);
        if self.subclonal_wgd > subclones {
            let msg = format!(
                "{} subclonal WGDs requested but only {} non-root clones exist",
                self.subclonal_wgd, subclones
            );
            return Err(SimError::Config(msg));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_even() {
        let bins = partition(1000, 100);
        assert_eq!(bins.len(), 10);
        assert_eq!(bins[0], Bin { begin: 0, end: 100 });
        assert_eq!(bins[9], Bin { begin: 900, end: 1000 });
        assert_eq!(bins.iter().map(Bin::span).sum::<usize>(), 1000);
    }

    #[test]
    fn partition_ragged_tail() {
        let bins = partition(250, 100);
        assert_eq!(
            bins,
            vec![
                Bin { begin: 0, end: 100 },
                Bin { begin: 100, end: 200 },
                Bin { begin: 200, end: 250 },
            ]
        );
    }

    #[test]
    fn partition_single_bin() {
        assert_eq!(partition(100, 100), vec![Bin { begin: 0, end: 100 }]);
        assert_eq!(partition(40, 100), vec![Bin { begin: 0, end: 40 }]);
    }

    #[test]
    fn allele_parsing() {
        assert_eq!(Allele::parse("m").unwrap(), Allele::Maternal);
        assert_eq!(Allele::parse("P").unwrap(), Allele::Paternal);
        assert_eq!(Allele::parse("Maternal").unwrap(), Allele::Maternal);
        assert!(matches!(
            Allele::parse("x"),
            Err(SimError::InvalidAllele(_))
        ));
    }

    #[test]
    fn duplicate_whole_doubles() {
        let mut hap = Haplotype::new(partition(1000, 100));
        hap.tandem_duplicate(0, 1000).unwrap();
        assert_eq!(hap.len(), 2000);
        assert_eq!(hap.len(), hap.bins().iter().map(Bin::span).sum::<usize>());
        hap.tandem_duplicate(0, 2000).unwrap();
        assert_eq!(hap.len(), 4000);
    }

    #[test]
    fn delete_whole_empties() {
        let mut hap = Haplotype::new(partition(1000, 100));
        hap.delete(0, 1000).unwrap();
        assert_eq!(hap.len(), 0);
        assert!(hap.bins().is_empty());
    }

    #[test]
    fn duplicate_inner_range() {
        let mut hap = Haplotype::new(partition(1000, 100));
        // [100, 150) touches only the second bin.
        hap.tandem_duplicate(100, 50).unwrap();
        assert_eq!(hap.len(), 1100);
        assert_eq!(hap.bins()[1], hap.bins()[2]);
        assert_eq!(hap.len(), hap.bins().iter().map(Bin::span).sum::<usize>());
    }

    #[test]
    fn range_extends_to_touched_bin() {
        // A range ending exactly on a bin boundary still takes the bin that
        // starts there, so the edited span rounds up to bin granularity.
        let mut hap = Haplotype::new(partition(1000, 100));
        hap.delete(0, 100).unwrap();
        assert_eq!(hap.len(), 800);
    }

    #[test]
    fn delete_ragged_suffix() {
        let mut hap = Haplotype::new(partition(250, 100));
        hap.delete(150, 100).unwrap();
        assert_eq!(hap.len(), 100);
        assert_eq!(hap.bins(), &[Bin { begin: 0, end: 100 }]);
    }

    #[test]
    fn start_beyond_length_is_fatal() {
        let mut hap = Haplotype::new(partition(1000, 100));
        assert!(matches!(
            hap.tandem_duplicate(1001, 10),
            Err(SimError::StartBeyondEnd { .. })
        ));
        assert!(matches!(
            hap.delete(1001, 10),
            Err(SimError::StartBeyondEnd { .. })
        ));
    }

    #[test]
    fn start_at_length_misses_all_bins() {
        let mut hap = Haplotype::new(partition(1000, 100));
        assert!(matches!(
            hap.delete(1000, 10),
            Err(SimError::OutOfBins { .. })
        ));
    }

    #[test]
    fn copy_numbers_after_edits() {
        let reference = partition(300, 100);
        let mut hap = Haplotype::new(reference.clone());
        hap.tandem_duplicate(0, 50).unwrap();
        hap.delete(300, 100).unwrap();
        let counts = hap.copy_numbers(&reference);
        assert_eq!(counts, vec![2, 1, 0]);
        assert_eq!(
            hap.len(),
            counts
                .iter()
                .zip(reference.iter())
                .map(|(&n, bin)| n as usize * bin.span())
                .sum::<usize>()
        );
    }

    #[test]
    fn wgd_doubles_every_nonzero_haplotype() {
        let template = vec![
            Chromosome::new("chr1", 1000, 100),
            Chromosome::new("chr2", 500, 100),
        ];
        let mut clone = CloneNode::new(0, "clone0".to_string(), &template);
        clone.wcl(1, Allele::Paternal).unwrap();
        clone.wgd().unwrap();
        let chr1 = &clone.genome[0];
        assert_eq!(chr1.haplotype(Allele::Maternal).len(), 2000);
        assert_eq!(chr1.haplotype(Allele::Paternal).len(), 2000);
        let chr2 = &clone.genome[1];
        assert_eq!(chr2.haplotype(Allele::Maternal).len(), 1000);
        assert_eq!(chr2.haplotype(Allele::Paternal).len(), 0);
        assert_eq!(clone.mutation_labels, vec!["P-chr2 loss", "WGD"]);
    }

    #[test]
    fn wcl_zeroes_one_allele() {
        let template = vec![Chromosome::new("chr1", 1000, 100)];
        let mut clone = CloneNode::new(0, "clone0".to_string(), &template);
        clone.wcl(0, Allele::Maternal).unwrap();
        assert_eq!(clone.genome[0].haplotype(Allele::Maternal).len(), 0);
        assert_eq!(clone.genome[0].haplotype(Allele::Paternal).len(), 1000);
        assert_eq!(clone.mutation_labels, vec!["M-chr1 loss"]);
    }

    #[test]
    fn inherit_copies_parent_state() {
        let template = vec![Chromosome::new("chr1", 1000, 100)];
        let mut parent = CloneNode::new(0, "clone0".to_string(), &template);
        parent.wgd().unwrap();
        let mut child = CloneNode::new(1, "clone1".to_string(), &template);
        child.inherit(&parent.genome);
        assert_eq!(child.genome_length(), 4000);
        // The child's copy is its own; further edits do not leak back.
        child.wcl(0, Allele::Maternal).unwrap();
        assert_eq!(parent.genome_length(), 4000);
        assert_eq!(child.genome_length(), 2000);
    }

    #[test]
    fn config_validation() {
        let mut config = MutationConfig {
            ratio_ad: 0.65,
            ..Default::default()
        };
        config.validate(4).unwrap();
        config.subclonal_wgd = 3;
        config.validate(4).unwrap();
        config.subclonal_wgd = 4;
        assert!(config.validate(4).is_err());
        config.subclonal_wgd = 0;
        config.ratio_ad = 1.2;
        assert!(config.validate(4).is_err());
    }
}
