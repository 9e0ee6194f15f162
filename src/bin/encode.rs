use std::path::PathBuf;

use clap::Parser;
use color_eyre::eyre::ensure;

use bels::encode::{encode_with_options, CircuitFamily, EncodeOptions};
use bels::network::BayesianNetwork;

#[derive(Debug, Parser)]
#[command(author, version, about = "Bayesian network circuit encoder")]
struct Cli {
    /// Input network file (must end with `.bif`).
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Output file for the CNF formula (must not exist yet).
    #[arg(value_name = "OUTPUT")]
    output: PathBuf,

    /// Circuit family: nwDNNF, dDNNF, or sdDNNF.
    #[clap(short = 'f', long, value_name = "FAMILY", default_value = "nwDNNF")]
    family: CircuitFamily,

    /// Exploit context-specific independence (nwDNNF only).
    #[clap(long)]
    csi: bool,
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    simplelog::TermLogger::init(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    let args = Cli::parse();

    ensure!(
        args.input.extension().is_some_and(|ext| ext == "bif"),
        "the input file name must end with `.bif`"
    );
    ensure!(
        !args.output.exists(),
        "the output file {} already exists; delete it or choose another name",
        args.output.display()
    );

    let network = BayesianNetwork::load_bif(&args.input)?;
    println!(
        "Loaded {} ({} variables) from {}",
        network.name(),
        network.num_variables(),
        args.input.display()
    );

    let options = EncodeOptions { csi: args.csi };
    let encoded = encode_with_options(&network, args.family, &options)?;
    encoded.cnf.save(&args.output)?;

    println!(
        "Encoded as {}: {} variables, {} clauses ({} zero rows) into {}",
        args.family,
        encoded.cnf.num_vars(),
        encoded.cnf.num_clauses(),
        encoded.stats.zero_rows,
        args.output.display()
    );

    Ok(())
}
