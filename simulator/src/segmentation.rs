//! Joint copy-number segmentation.
//! After the tree has been mutated, every reference bin carries one
//! (maternal, paternal) copy-number pair per clone. Adjacent bins whose
//! pairs agree across *all* clones simultaneously are merged into maximal
//! runs, giving the minimal segmentation shared by the whole tumor.
use crate::phylogeny::Tumor;
use definitions::{Allele, Bin};
use serde::{Deserialize, Serialize};
use std::io::Write;

/// A maximal run of reference bins with constant per-clone copy numbers.
/// `copy_numbers[i]` is the (maternal, paternal) pair of clone `i`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Segment {
    pub begin: usize,
    pub end: usize,
    pub copy_numbers: Vec<(u32, u32)>,
}

/// Per-chromosome segment lists, in reference chromosome order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentTable {
    pub chromosomes: Vec<(String, Vec<Segment>)>,
}

impl SegmentTable {
    pub fn num_segments(&self) -> usize {
        self.chromosomes.iter().map(|(_, segs)| segs.len()).sum()
    }
    /// Tab-separated dump: `#CHR START END <label>...`, one row per segment,
    /// each clone cell formatted as `maternal|paternal`.
    pub fn write_tsv<W: Write>(&self, labels: &[String], wtr: &mut W) -> std::io::Result<()> {
        writeln!(wtr, "#CHR\tSTART\tEND\t{}", labels.join("\t"))?;
        for (name, segments) in self.chromosomes.iter() {
            for segment in segments.iter() {
                let cells: Vec<String> = segment
                    .copy_numbers
                    .iter()
                    .map(|(m, p)| format!("{}|{}", m, p))
                    .collect();
                writeln!(
                    wtr,
                    "{}\t{}\t{}\t{}",
                    name,
                    segment.begin,
                    segment.end,
                    cells.join("\t")
                )?;
            }
        }
        Ok(())
    }
}

pub trait Segmentation {
    /// Merge the per-clone copy-number state into maximal constant runs,
    /// chromosome by chromosome. O(bins x clones).
    fn segmentation(&self) -> SegmentTable;
}

impl Segmentation for Tumor {
    fn segmentation(&self) -> SegmentTable {
        let chromosomes = (0..self.chromosomes.len())
            .map(|index| {
                let name = self.chromosomes[index].clone();
                (name, segment_chromosome(self, index))
            })
            .collect();
        SegmentTable { chromosomes }
    }
}

fn segment_chromosome(tumor: &Tumor, index: usize) -> Vec<Segment> {
    let reference: &[Bin] = tumor.clones[tumor.root].genome[index].reference();
    // One (maternal, paternal) count per reference bin, per clone.
    let profiles: Vec<Vec<(u32, u32)>> = tumor
        .clones
        .iter()
        .map(|clone| {
            let chromosome = &clone.genome[index];
            let maternal = chromosome.haplotype(Allele::Maternal).copy_numbers(reference);
            let paternal = chromosome.haplotype(Allele::Paternal).copy_numbers(reference);
            maternal.into_iter().zip(paternal.into_iter()).collect()
        })
        .collect();
    let column = |bin: usize| -> Vec<(u32, u32)> {
        profiles.iter().map(|profile| profile[bin]).collect()
    };
    let mut segments = vec![];
    let mut run_start = 0;
    for bin in 1..reference.len() {
        let changed = profiles
            .iter()
            .any(|profile| profile[bin] != profile[bin - 1]);
        if changed {
            segments.push(Segment {
                begin: reference[run_start].begin,
                end: reference[bin - 1].end,
                copy_numbers: column(bin - 1),
            });
            run_start = bin;
        }
    }
    let last = reference.len() - 1;
    segments.push(Segment {
        begin: reference[run_start].begin,
        end: reference[last].end,
        copy_numbers: column(last),
    });
    segments
}
