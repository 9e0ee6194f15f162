use std::path::PathBuf;

use clap::Parser;
use color_eyre::eyre::ensure;

use bels::generate::{generate, LayeredShape};

#[derive(Debug, Parser)]
#[command(author, version, about = "Layered Bayesian network generator")]
struct Cli {
    /// Output file for the generated network (must end with `.bif` and must
    /// not exist yet).
    #[arg(value_name = "FILE")]
    output: PathBuf,

    /// Top layer size.
    #[clap(short = 't', long, value_name = "INT", default_value = "5")]
    top_layer_size: usize,

    /// Bottom layer size.
    #[clap(short = 'b', long, value_name = "INT", default_value = "5")]
    bottom_layer_size: usize,

    /// Domain size.
    #[clap(short = 'd', long, value_name = "INT", default_value = "2")]
    domain_size: usize,

    /// Edge density percentage.
    #[clap(short = 'p', long, value_name = "PCT", default_value = "100")]
    density: u32,

    /// Seed; a fresh one is drawn and reported when omitted. The network
    /// structure ignores the seed at density 100.
    #[clap(short = 's', long, value_name = "INT")]
    seed: Option<u64>,
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
        args.output.extension().is_some_and(|ext| ext == "bif"),
        "the output file name must end with `.bif`"
    );
    ensure!(
        !args.output.exists(),
        "the output file {} already exists; delete it or choose another name",
        args.output.display()
    );

    let shape = LayeredShape {
        top: args.top_layer_size,
        bottom: args.bottom_layer_size,
        domain_size: args.domain_size,
        density: args.density,
        seed: args.seed,
    };

    let generated = generate(&shape)?;
    generated.network.save_bif(&args.output)?;

    println!(
        "Generated {} ({} variables) into {}",
        generated.network.name(),
        generated.network.num_variables(),
        args.output.display()
    );
    println!("Seed: {}", generated.seed);

    Ok(())
}
