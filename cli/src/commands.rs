//! Command-line definition and parsing helpers for the `cnasim` binary.
use clap::{value_parser, Arg, ArgAction, Command};
use definitions::{FocalSpec, SimError};

pub fn command() -> Command {
    Command::new("cnasim")
        .version("0.1")
        .about("Simulate tumor clones carrying copy-number aberrations along a random evolutionary tree.")
        .arg(
            Arg::new("reference")
                .value_name("REFERENCE")
                .required(true)
                .help("Reference genome in FASTA format"),
        )
        .arg(
            Arg::new("numclones")
                .short('n')
                .long("numclones")
                .required(true)
                .value_parser(value_parser!(usize))
                .help("Number of tumor clones to simulate; 0 builds only the matched normal"),
        )
        .arg(
            Arg::new("rndseed")
                .short('s')
                .long("rndseed")
                .value_parser(value_parser!(u64))
                .help("Seed of the random generator (default: from entropy)"),
        )
        .arg(
            Arg::new("ignore")
                .short('g')
                .long("ignore")
                .value_name("FILE")
                .help("File with a chromosome name per line to drop from the reference"),
        )
        .arg(
            Arg::new("snplist")
                .short('l')
                .long("snplist")
                .value_name("FILE")
                .help("SNP positions to place, `CHR POS ALLELES...` per line (default: random placement)"),
        )
        .arg(
            Arg::new("snpratio")
                .short('p')
                .long("snpratio")
                .value_parser(value_parser!(f64))
                .help("Ratio of positions to turn into SNPs when no list is given"),
        )
        .arg(
            Arg::new("hehoratio")
                .short('e')
                .long("hehoratio")
                .default_value("0.67")
                .value_parser(value_parser!(f64))
                .help("Ratio of heterozygous to homozygous SNPs"),
        )
        .arg(
            Arg::new("rundir")
                .short('x')
                .long("rundir")
                .default_value("./")
                .help("Directory where all resulting files are created"),
        )
        .arg(
            Arg::new("binsize")
                .short('b')
                .long("binsize")
                .default_value("10kb")
                .help("Bin size of the simulated genomes, optionally suffixed kb or Mb"),
        )
        .arg(
            Arg::new("adratio")
                .short('r')
                .long("adratio")
                .default_value("0.65")
                .value_parser(value_parser!(f64))
                .help("Proportion of duplications among arm and focal events"),
        )
        .arg(
            Arg::new("clonalwgd")
                .long("clonalwgd")
                .default_value("0")
                .value_parser(value_parser!(usize))
                .help("Clonal whole-genome duplications in the founder clone"),
        )
        .arg(
            Arg::new("clonalwcl")
                .long("clonalwcl")
                .default_value("0")
                .value_parser(value_parser!(usize))
                .help("Clonal whole-chromosome losses in the founder clone"),
        )
        .arg(
            Arg::new("clonalcam")
                .long("clonalcam")
                .default_value("0")
                .value_parser(value_parser!(usize))
                .help("Clonal chromosome-arm changes in the founder clone"),
        )
        .arg(
            Arg::new("clonalcna")
                .long("clonalcna")
                .value_name("SPEC")
                .help("Clonal focal CNAs, space-separated MEAN[:STD]:QTY entries (STD defaults to 20% of MEAN)"),
        )
        .arg(
            Arg::new("subclonalwgd")
                .long("subclonalwgd")
                .default_value("0")
                .value_parser(value_parser!(usize))
                .help("Subclonal whole-genome duplications, spread over distinct non-root clones"),
        )
        .arg(
            Arg::new("subclonalwcl")
                .long("subclonalwcl")
                .default_value("0")
                .value_parser(value_parser!(usize))
                .help("Subclonal whole-chromosome losses, assigned to random non-root clones"),
        )
        .arg(
            Arg::new("subclonalcam")
                .long("subclonalcam")
                .default_value("0")
                .value_parser(value_parser!(usize))
                .help("Subclonal chromosome-arm changes, assigned to random non-root clones"),
        )
        .arg(
            Arg::new("subclonalcna")
                .long("subclonalcna")
                .value_name("SPEC")
                .help("Subclonal focal CNAs applied to every non-root clone, same format as --clonalcna"),
        )
        .arg(
            Arg::new("jobs")
                .short('j')
                .long("jobs")
                .default_value("1")
                .value_parser(value_parser!(usize))
                .help("Number of parallel jobs for writing the clone genomes"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::Count)
                .help("Verbosity; repeat for more detail"),
        )
}

/// Parse a base-pair size, optionally suffixed `kb` or `Mb`.
pub fn base_size(input: &str) -> Result<usize, SimError> {
    let (digits, multiplier) = match input {
        _ if input.ends_with("kb") => (&input[..input.len() - 2], 1_000),
        _ if input.ends_with("Mb") => (&input[..input.len() - 2], 1_000_000),
        _ => (input, 1),
    };
    let number: usize = digits.parse().map_err(|_| {
        SimError::Config(format!(
            "`{}` is not a size; expected a number optionally ending with kb or Mb",
            input
        ))
    })?;
    Ok(number * multiplier)
}

/// Parse a focal-CNA specification: whitespace-separated entries, each
/// `MEAN:QTY` or `MEAN:STD:QTY`. When the standard deviation is omitted it
/// defaults to 20% of the mean. Mean and deviation accept kb/Mb suffixes.
pub fn parse_focal(input: &str) -> Result<Vec<FocalSpec>, SimError> {
    input
        .split_whitespace()
        .map(|entry| {
            let fields: Vec<&str> = entry.split(':').collect();
            let bad = || SimError::Config(format!("focal CNA entry `{}` is malformed", entry));
            match fields.as_slice() {
                [mean, quantity] => {
                    let mean = base_size(mean)?;
                    Ok(FocalSpec {
                        mean,
                        std_dev: (mean as f64 * 0.2) as usize,
                        quantity: quantity.parse().map_err(|_| bad())?,
                    })
                }
                [mean, std_dev, quantity] => Ok(FocalSpec {
                    mean: base_size(mean)?,
                    std_dev: base_size(std_dev)?,
                    quantity: quantity.parse().map_err(|_| bad())?,
                }),
                _ => Err(bad()),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_is_well_formed() {
        command().debug_assert();
    }

    #[test]
    fn base_sizes() {
        assert_eq!(base_size("100").unwrap(), 100);
        assert_eq!(base_size("10kb").unwrap(), 10_000);
        assert_eq!(base_size("2Mb").unwrap(), 2_000_000);
        assert!(base_size("10k").is_err());
        assert!(base_size("kb").is_err());
    }

    #[test]
    fn focal_specs() {
        let specs = parse_focal("100kb:5 2Mb:500kb:3").unwrap();
        assert_eq!(
            specs,
            vec![
                FocalSpec {
                    mean: 100_000,
                    std_dev: 20_000,
                    quantity: 5,
                },
                FocalSpec {
                    mean: 2_000_000,
                    std_dev: 500_000,
                    quantity: 3,
                },
            ]
        );
        assert!(parse_focal("100kb").is_err());
        assert!(parse_focal("a:b:c").is_err());
        assert!(parse_focal("1:2:3:4").is_err());
    }
}
