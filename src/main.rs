use std::{
    io::{self, BufReader},
    path::{Path, PathBuf},
    time::Instant,
};

use clap::Parser;
use fst_lattice::{
    Dataset, Error, Evaluation, ExpectedCounts, Lattice, TableTransducer, Transducer, INFINITE_COST,
};

/// Decode the sequences in each data set (FILE) with a transducer (MODEL).
/// If FILE is omitted or '-', the data set is read from STDIN.
/// Lines are `label<TAB>token`; blank lines separate sequences.
#[derive(Debug, Parser)]
#[command(version)]
struct Argv {
    /// read a transducer definition from a JSON file (MODEL)
    #[arg(short, long, required = true, value_name = "MODEL")]
    model: PathBuf,
    /// report the performance of the model on the data
    #[arg(short = 't', long = "test")]
    evaluate: bool,
    /// output the reference labels in the input data
    #[arg(short, long)]
    reference: bool,
    /// output the lattice cost, the best path cost and its probability
    #[arg(short, long)]
    probability: bool,
    /// output the marginal probability of items for their predicted label
    #[arg(short = 'i', long)]
    marginal: bool,
    /// accumulate expected counts over the data and print them as JSON
    #[arg(short, long)]
    counts: bool,
    /// constrain the expected counts to the reference labels
    #[arg(long, requires = "counts")]
    clamped: bool,
    /// suppress tagging results (useful for test mode)
    #[arg(short, long)]
    quiet: bool,
    #[arg(value_name = "FILE")]
    datasets: Vec<PathBuf>,
}

fn read_dataset(path: &Path) -> Result<Dataset, Error> {
    if path.as_os_str() == "-" {
        Dataset::read(BufReader::new(io::stdin().lock()))
    } else {
        Dataset::from_path(path)
    }
}

/// Probability of the best path among all paths; zero when either cost is
/// infinite.
fn path_probability(total_cost: f64, path_cost: f64) -> f64 {
    if total_cost < INFINITE_COST && path_cost < INFINITE_COST {
        (total_cost - path_cost).exp()
    } else {
        0.0
    }
}

fn main() -> Result<(), Error> {
    env_logger::init();
    let mut argv = Argv::parse();
    log::info!("{:?}", argv);
    if argv.datasets.is_empty() {
        argv.datasets.push(PathBuf::from("-"));
    }

    let model = TableTransducer::from_path(&argv.model)?;
    let alphabet = model.output_alphabet();
    let mut evaluation = Evaluation::default();
    let mut counts = ExpectedCounts::new(model.num_states());
    let begin = Instant::now();
    let mut n = 0;

    for fpath in &argv.datasets {
        let ds = read_dataset(fpath)?;
        for seq in ds.iter() {
            n += 1;
            let path = model.viterbi_path(&seq.input, None)?;
            let lattice = if argv.probability || argv.marginal || argv.counts {
                let output = argv.clamped.then_some(seq.output.as_slice());
                Some(Lattice::new(&model, &seq.input[..], output, argv.counts, Some(&alphabet))?)
            } else {
                None
            };
            if let Some(c) = lattice.as_ref().and_then(Lattice::expected_counts) {
                counts.merge(c);
            }

            let prediction = path.output().unwrap_or_default();
            if argv.evaluate {
                evaluation.accumulate(&seq.output, prediction);
            }
            if argv.quiet {
                continue;
            }

            if let (true, Some(lattice)) = (argv.probability, &lattice) {
                if argv.clamped {
                    // The clamped lattice does not sum over every path.
                    println!("@cost\t{}\t{}", lattice.cost(), path.cost());
                } else {
                    println!(
                        "@cost\t{}\t{}\t{}",
                        lattice.cost(),
                        path.cost(),
                        path_probability(lattice.cost(), path.cost())
                    );
                }
            }
            if !path.is_feasible() {
                println!("@nopath");
            }
            for (t, label) in prediction.iter().enumerate() {
                let mut line = String::new();
                if argv.reference {
                    line.push_str(&seq.output[t]);
                    line.push('\t');
                }
                line.push_str(label);
                if let (true, Some(labeling)) = (
                    argv.marginal,
                    lattice.as_ref().and_then(|l| l.labeling_at(t)),
                ) {
                    line.push_str(&format!(":{:.6}", labeling.probability_of(&alphabet, label)));
                }
                println!("{line}");
            }
            println!();
        }
    }

    if argv.evaluate {
        evaluation.evaluate();
        println!("{}", evaluation);
        let sec = begin.elapsed().as_secs_f64();
        println!("Elapsed time: {:.6} [sec] ({:.1} [instance/sec])", sec, n as f64 / sec);
    }
    if argv.counts {
        println!("{}", serde_json::to_string_pretty(&counts)?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probability_of_infeasible_path() {
        assert_eq!(path_probability(INFINITE_COST, INFINITE_COST), 0.0);
        assert_eq!(path_probability(2.0, INFINITE_COST), 0.0);
        assert_eq!(path_probability(INFINITE_COST, 2.0), 0.0);
        assert!((path_probability(1.0, 1.0) - 1.0).abs() < 1e-12);
        assert!((path_probability(1.0, 1.5) - (-0.5f64).exp()).abs() < 1e-12);
    }

    #[test]
    fn read_dataset_from_file() {
        let ds = read_dataset(Path::new("tests/data/weather.data")).expect("failed to read dataset");
        assert_eq!(ds.len(), 3);
    }
}
