//! Simulator -- the algorithms behind cnasim.
//! A run proceeds in four stages: build a diploid genome from the reference
//! ([diploid]), grow a random phylogeny of clones ([phylogeny]), mutate it
//! with copy-number aberrations ([mutation]), and derive the joint
//! segmentation ([segmentation]). The [materialize] stage turns the finished
//! clones back into FASTA files on a rayon pool.
pub mod diploid;
pub mod materialize;
pub mod mutation;
pub mod phylogeny;
pub mod segmentation;
#[macro_use]
extern crate log;
