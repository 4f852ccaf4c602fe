//! Mutation engine.
//! The founder receives the clonal events; every other clone first inherits
//! its parent's genome, then receives its own shuffled timeline of subclonal
//! events. The traversal is depth-first from the root, so a descendant's
//! aberrations always compose on top of its ancestors'.
use crate::phylogeny::Tumor;
use definitions::{Allele, CloneNode, FocalSpec, MutationConfig, SimError, ALLELES};
use rand::seq::SliceRandom;
use rand::Rng;
use rand_distr::{Distribution, Normal};

/// One entry of a clone's event timeline. The concrete target chromosome,
/// allele, position, and size are resolved only when the event is applied.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Event {
    Wgd,
    Wcl,
    Cam,
    Focal { mean: f64, std_dev: f64 },
}

/// Which non-root clones receive the subclonal WGD/WCL/CAM events. WGD
/// targets are sampled without replacement, so a clone sees at most one;
/// WCL and CAM targets are independent draws with replacement.
#[derive(Debug, Clone, Default)]
struct SubclonalTargets {
    wgd: Vec<usize>,
    wcl: Vec<usize>,
    cam: Vec<usize>,
}

fn subclonal_targets<R: Rng>(
    tumor: &Tumor,
    config: &MutationConfig,
    rng: &mut R,
) -> SubclonalTargets {
    let subclones: Vec<usize> = tumor
        .clones
        .iter()
        .filter(|c| c.parent.is_some())
        .map(|c| c.id)
        .collect();
    if subclones.is_empty() {
        return SubclonalTargets::default();
    }
    let wgd: Vec<usize> = subclones
        .choose_multiple(rng, config.subclonal_wgd)
        .copied()
        .collect();
    let pick = |rng: &mut R, count: usize| -> Vec<usize> {
        (0..count)
            .filter_map(|_| subclones.choose(rng).copied())
            .collect()
    };
    let wcl = pick(rng, config.subclonal_wcl);
    let cam = pick(rng, config.subclonal_cam);
    SubclonalTargets { wgd, wcl, cam }
}

fn focal_events(specs: &[FocalSpec]) -> impl Iterator<Item = Event> + '_ {
    specs.iter().flat_map(|spec| {
        let event = Event::Focal {
            mean: spec.mean as f64,
            std_dev: spec.std_dev as f64,
        };
        std::iter::repeat(event).take(spec.quantity)
    })
}

fn clonal_timeline(config: &MutationConfig) -> Vec<Event> {
    let mut timeline = vec![Event::Wgd; config.clonal_wgd];
    timeline.extend(vec![Event::Wcl; config.clonal_wcl]);
    timeline.extend(vec![Event::Cam; config.clonal_cam]);
    timeline.extend(focal_events(&config.clonal_focal));
    timeline
}

fn subclonal_timeline(id: usize, config: &MutationConfig, targets: &SubclonalTargets) -> Vec<Event> {
    let count = |picks: &[usize]| picks.iter().filter(|&&t| t == id).count();
    let mut timeline = vec![Event::Wgd; count(&targets.wgd)];
    timeline.extend(vec![Event::Wcl; count(&targets.wcl)]);
    timeline.extend(vec![Event::Cam; count(&targets.cam)]);
    timeline.extend(focal_events(&config.subclonal_focal));
    timeline
}

pub trait Evolve {
    /// Apply the configured mutations over the whole tree. All randomness
    /// comes from `rng`, so a fixed seed reproduces the run exactly.
    fn evolve<R: Rng>(&mut self, config: &MutationConfig, rng: &mut R) -> Result<(), SimError>;
}

impl Evolve for Tumor {
    fn evolve<R: Rng>(&mut self, config: &MutationConfig, rng: &mut R) -> Result<(), SimError> {
        config.validate(self.num_clones())?;
        let targets = subclonal_targets(self, config, rng);
        mutate(self, self.root, config, &targets, rng)
    }
}

fn mutate<R: Rng>(
    tumor: &mut Tumor,
    id: usize,
    config: &MutationConfig,
    targets: &SubclonalTargets,
    rng: &mut R,
) -> Result<(), SimError> {
    let mut timeline = match tumor.clones[id].parent {
        None => clonal_timeline(config),
        Some(parent) => {
            let parent_genome = tumor.clones[parent].genome.clone();
            tumor.clones[id].inherit(&parent_genome);
            subclonal_timeline(id, config, targets)
        }
    };
    timeline.shuffle(rng);
    for event in timeline {
        apply(&mut tumor.clones[id], event, config.ratio_ad, rng)?;
    }
    let children = tumor.clones[id].children.clone();
    for child in children {
        mutate(tumor, child, config, targets, rng)?;
    }
    Ok(())
}

/// All (chromosome, allele) pairs whose haplotype still has nonzero length,
/// with the current length as selection weight.
fn active_pairs(clone: &CloneNode) -> Vec<(usize, Allele, usize)> {
    let mut actives = vec![];
    for &allele in ALLELES.iter() {
        for (index, chromosome) in clone.genome.iter().enumerate() {
            let length = chromosome.haplotype(allele).len();
            if length > 0 {
                actives.push((index, allele, length));
            }
        }
    }
    actives
}

fn apply<R: Rng>(
    clone: &mut CloneNode,
    event: Event,
    ratio_ad: f64,
    rng: &mut R,
) -> Result<(), SimError> {
    if let Event::Wgd = event {
        return clone.wgd();
    }
    let actives = active_pairs(clone);
    let &(chromosome, allele, length) = match actives.as_slice() {
        [] => {
            warn!(
                "SKIP\t{}\tno active haplotype left for {:?}",
                clone.label, event
            );
            return Ok(());
        }
        _ => match event {
            // Focal events hit long haplotypes more often.
            Event::Focal { .. } => actives
                .choose_weighted(rng, |&(_, _, length)| length as f64)
                .expect("active pairs are nonempty with positive weights"),
            _ => actives.choose(rng).expect("active pairs are nonempty"),
        },
    };
    match event {
        Event::Wcl => clone.wcl(chromosome, allele),
        Event::Cam => {
            let breakpoint = length / 2;
            let (start, size) = match rng.gen_bool(0.5) {
                true => (0, breakpoint),
                false => (breakpoint, breakpoint.max(length - breakpoint)),
            };
            match rng.gen_bool(ratio_ad) {
                true => clone.tandem_duplicate(chromosome, start, size, allele, true),
                false => clone.delete(chromosome, start, size, allele, true),
            }
        }
        Event::Focal { mean, std_dev } => {
            let normal = Normal::new(mean, std_dev)
                .map_err(|why| SimError::Config(format!("bad focal spec: {}", why)))?;
            let size = normal.sample(rng).round().max(0.0) as usize;
            let size = size.min(length);
            let start = rng.gen_range(0..=length.saturating_sub(1 + size));
            match rng.gen_bool(ratio_ad) {
                true => clone.tandem_duplicate(chromosome, start, size, allele, false),
                false => clone.delete(chromosome, start, size, allele, false),
            }
        }
        Event::Wgd => unreachable!(),
    }
}
