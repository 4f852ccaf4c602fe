//! Random phylogeny over the clone set.
//! For four clones or more the tree shape is drawn uniformly over all labeled
//! trees via a Prüfer sequence, then rooted at clone 0 by a randomized
//! depth-first walk. Smaller clone counts are handled as explicit special
//! cases.
use definitions::{Chromosome, CloneNode, SimError};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// The clone arena plus the tree structure over it. Clone 0 is always the
/// root (the founder); every other clone descends from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tumor {
    pub clones: Vec<CloneNode>,
    pub root: usize,
    pub chromosomes: Vec<String>,
}

impl Tumor {
    /// Build a random tree of `n` clones, each starting from the unmutated
    /// diploid genome given by `lengths` (chromosome name and length, in
    /// reference order) partitioned into bins of `bin_size`.
    pub fn random<R: Rng>(
        n: usize,
        lengths: &[(String, usize)],
        bin_size: usize,
        rng: &mut R,
    ) -> Result<Self, SimError> {
        if n == 0 {
            let msg = "a tree cannot be built with zero clones".to_string();
            return Err(SimError::Config(msg));
        }
        let template: Vec<_> = lengths
            .iter()
            .map(|(name, length)| Chromosome::new(name, *length, bin_size))
            .collect();
        let mut clones: Vec<_> = (0..n)
            .map(|id| CloneNode::new(id, format!("clone{}", id), &template))
            .collect();
        match n {
            1 => {}
            2 => link(&mut clones, 0, 1),
            3 => {
                link(&mut clones, 0, 1);
                if rng.gen_bool(0.5) {
                    link(&mut clones, 1, 2);
                } else {
                    link(&mut clones, 0, 2);
                }
            }
            _ => {
                let adjacency = random_labeled_tree(n, rng);
                orient(&mut clones, adjacency, 0, rng);
            }
        }
        let roots = clones.iter().filter(|c| c.parent.is_none()).count();
        assert_eq!(roots, 1);
        let chromosomes = lengths.iter().map(|(name, _)| name.clone()).collect();
        Ok(Self {
            clones,
            root: 0,
            chromosomes,
        })
    }
    pub fn num_clones(&self) -> usize {
        self.clones.len()
    }
    pub fn labels(&self) -> Vec<String> {
        self.clones.iter().map(|c| c.label.clone()).collect()
    }
    /// Render the clone tree as a graphviz digraph. Each edge carries the
    /// mutation labels of the clone it leads into; the founder hangs off a
    /// `Normal` node.
    pub fn draw(&self) -> String {
        const COLORS: [&str; 11] = [
            "red",
            "blue",
            "purple",
            "green",
            "brown",
            "cadetblue",
            "chartreuse",
            "cyan",
            "pink",
            "Grey",
            "orange",
        ];
        let mut out = String::new();
        out.push_str("digraph EvolutionaryCloneTree {\n");
        out.push_str("splines=true;\nsep=\"+25,25\";\noverlap=scalexy;\nnodesep=0.6;\n");
        out.push_str("\tsubgraph T {\n");
        out.push_str("\t\tN[label=<<B>Normal</B>>,color=black]\n");
        let mut leaves = vec![];
        for clone in self.clones.iter() {
            let color = COLORS[clone.id % COLORS.len()];
            let line = format!(
                "\t\t{}[label=<<B>clone</B><SUB>{}</SUB>>,color={}]\n",
                clone.id, clone.id, color
            );
            out.push_str(&line);
            if clone.children.is_empty() {
                leaves.push(clone.id.to_string());
            }
        }
        out.push_str(&format!("\t{{rank = same; {}}}\n", leaves.join("; ")));
        out.push_str("\t}\n");
        let root = &self.clones[self.root];
        out.push_str(&format!(
            "\tN -> {} [label=\"{}\", fontsize=5, fixedsize=true]\n",
            root.id,
            root.mutation_labels.join("\\n")
        ));
        for clone in self.clones.iter() {
            for &child in clone.children.iter() {
                let child = &self.clones[child];
                out.push_str(&format!(
                    "\t{} -> {} [label=\"{}\", fontsize=5, fixedsize=true]\n",
                    clone.id,
                    child.id,
                    child.mutation_labels.join("\\n")
                ));
            }
        }
        out.push_str("}\n");
        out
    }
}

fn link(clones: &mut [CloneNode], parent: usize, child: usize) {
    clones[parent].children.push(child);
    clones[child].parent = Some(parent);
}

/// Draw a Prüfer sequence of length n-2 and decode it into an undirected
/// labeled tree, returned as adjacency lists. Each entry of the sequence is
/// connected to the lowest-index node currently at degree one; the two nodes
/// left at degree one in the end are joined directly.
fn random_labeled_tree<R: Rng>(n: usize, rng: &mut R) -> Vec<Vec<usize>> {
    let sequence: Vec<usize> = (0..n - 2).map(|_| rng.gen_range(0..n)).collect();
    let mut degrees = vec![1; n];
    for &node in sequence.iter() {
        degrees[node] += 1;
    }
    let mut adjacency = vec![Vec::new(); n];
    for &node in sequence.iter() {
        let leaf = degrees
            .iter()
            .position(|&d| d == 1)
            .expect("a Prufer sequence always leaves a degree-one node");
        adjacency[node].push(leaf);
        adjacency[leaf].push(node);
        degrees[node] -= 1;
        degrees[leaf] -= 1;
    }
    let mut remaining = degrees.iter().enumerate().filter(|&(_, &d)| d == 1);
    let (u, _) = remaining.next().expect("two degree-one nodes remain");
    let (v, _) = remaining.next().expect("two degree-one nodes remain");
    adjacency[u].push(v);
    adjacency[v].push(u);
    adjacency
}

/// Orient the undirected tree away from `root` by a depth-first walk,
/// shuffling each adjacency list before descending so that the parent/child
/// assignment among equivalent orientations is random.
fn orient<R: Rng>(clones: &mut [CloneNode], mut adjacency: Vec<Vec<usize>>, root: usize, rng: &mut R) {
    let mut placed = vec![false; clones.len()];
    placed[root] = true;
    descend(clones, &mut adjacency, root, &mut placed, rng);
}

fn descend<R: Rng>(
    clones: &mut [CloneNode],
    adjacency: &mut Vec<Vec<usize>>,
    node: usize,
    placed: &mut Vec<bool>,
    rng: &mut R,
) {
    adjacency[node].shuffle(rng);
    let neighbors = adjacency[node].clone();
    for next in neighbors {
        if !placed[next] {
            clones[node].children.push(next);
            clones[next].parent = Some(node);
            placed[next] = true;
            descend(clones, adjacency, next, placed, rng);
        }
    }
}
