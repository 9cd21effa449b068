use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use tracing::error;

use marker_dosage::blend::CategoryOutcome;
use marker_dosage::config::Config;
use marker_dosage::derived::DerivedQuantities;
use marker_dosage::estimator::{estimate, Strategy};
use marker_dosage::fiber::Composition;
use marker_dosage::joint::estimate_joint;
use marker_dosage::sample::{BodyColor, NewEntry};
use marker_dosage::store::TableSource;
use marker_dosage::{logging, QueryComposition, Result};

#[derive(Parser)]
#[command(version, about = "Record reference samples and estimate luminescent marker dosage")]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Reference CSV file, overriding the configuration
    #[arg(long, global = true)]
    data: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create an empty reference file
    Init,
    /// Record a new reference sample
    Add(AddArgs),
    /// Print every reference sample
    List,
    /// Print the distinct LOT numbers
    Lots,
    /// Remove every sample recorded under a LOT number
    Delete { lot: String },
    /// Estimate an unknown sample
    Estimate(EstimateArgs),
    /// Compute the derived ppm quantities without saving
    Derive {
        #[arg(long)]
        dosage: f64,
        #[arg(long, default_value_t = 4.0)]
        luminescent_content: f64,
        #[arg(long, default_value_t = 20.0)]
        marked_share: f64,
    },
}

#[derive(Args)]
struct CompositionArgs {
    #[arg(long, default_value_t = 0.0)]
    natural: f64,
    #[arg(long, default_value_t = 0.0)]
    black: f64,
    #[arg(long, default_value_t = 0.0)]
    white: f64,
    /// Indigo or denim fiber
    #[arg(long, default_value_t = 0.0)]
    denim: f64,
}

impl CompositionArgs {
    const fn composition(&self) -> Composition {
        Composition::new(self.natural, self.black, self.white, self.denim)
    }
}

#[derive(Args)]
struct AddArgs {
    #[arg(long)]
    lot: String,
    #[command(flatten)]
    composition: CompositionArgs,
    /// Mastermix dosage as a fraction of one
    #[arg(long)]
    dosage: f64,
    /// Luminescent content in the dosed fiber, percent
    #[arg(long, default_value_t = 4.0)]
    luminescent_content: f64,
    /// Marked fiber in the sample, percent
    #[arg(long, default_value_t = 20.0)]
    marked_share: f64,
    #[arg(long)]
    emission: u32,
    /// Ash body color, `#rrggbb` or `rgb(r,g,b)`
    #[arg(long, default_value = "#d3d3d3")]
    color: BodyColor,
}

#[derive(Args)]
struct EstimateArgs {
    #[command(flatten)]
    composition: CompositionArgs,
    /// Emission count, or the target quantity when estimating the expected signal
    #[arg(long)]
    input: f64,
    /// Ash body color, required by the joint strategy
    #[arg(long)]
    color: Option<BodyColor>,
    /// Use the joint model instead of the configured strategy
    #[arg(long)]
    joint: bool,
}

fn main() -> ExitCode {
    logging::init();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, "command failed");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    if let Some(data) = cli.data {
        config.store.path = data;
    }
    let store = config.store();

    match cli.command {
        Command::Init => {
            store.ensure_exists()?;
            println!("reference file ready at {}", store.path().display());
        }
        Command::Add(args) => {
            let sample = NewEntry {
                lot_id: args.lot,
                composition: args.composition.composition(),
                mastermix_dosage: args.dosage,
                luminescent_content: args.luminescent_content,
                marked_fiber_share: args.marked_share,
                emission_count: args.emission,
                body_color: args.color,
            }
            .into_sample()?;
            store.append(&sample)?;
            println!(
                "saved {} (marker {:.2} ppm, effective dosage {:.2} ppm)",
                sample.lot_id,
                sample.marker_concentration_ppm.unwrap_or_default(),
                sample.effective_dosage_ppm.unwrap_or_default()
            );
        }
        Command::List => {
            let table = store.load()?;
            if table.is_empty() {
                println!("no reference samples recorded");
            }
            for row in table.iter() {
                let cell =
                    |value: Option<f64>| value.map_or_else(|| "-".to_owned(), |v| v.to_string());
                println!(
                    "{:<12} natural {:>6} black {:>6} white {:>6} denim {:>6} | dosage {:>8} ppm | emission {:>6} | {}",
                    row.lot_id,
                    cell(row.natural),
                    cell(row.black),
                    cell(row.white),
                    cell(row.denim),
                    cell(row.effective_dosage_ppm),
                    row.emission_count.map_or_else(|| "-".to_owned(), |c| c.to_string()),
                    row.body_color.map_or_else(|| "-".to_owned(), BodyColor::to_hex),
                );
            }
        }
        Command::Lots => {
            for lot in store.load()?.lots() {
                println!("{lot}");
            }
        }
        Command::Delete { lot } => {
            let removed = store.delete_lot(&lot)?;
            println!("removed {removed} sample(s) with LOT number {lot}");
        }
        Command::Estimate(args) => {
            let query = QueryComposition {
                composition: args.composition.composition(),
                input: args.input,
                body_color: args.color,
            };
            if args.joint || config.estimation.strategy == Strategy::Joint {
                print_joint(&store, &query, &config)?;
            } else {
                print_estimate(&store, &query, &config)?;
            }
        }
        Command::Derive {
            dosage,
            luminescent_content,
            marked_share,
        } => {
            let derived = DerivedQuantities::checked(dosage, luminescent_content, marked_share)?;
            println!("marker in fiber:  {:.2} ppm", derived.marker_concentration_ppm);
            println!("effective dosage: {:.2} ppm", derived.effective_dosage_ppm);
        }
    }
    Ok(())
}

fn print_estimate(store: &impl TableSource, query: &QueryComposition, config: &Config) -> Result<()> {
    let result = estimate(store, query, config)?;
    println!(
        "estimate: {:.2} {} (± {:.2})",
        result.value, result.unit, result.uncertainty
    );
    println!("confidence: {}", result.confidence);
    for detail in &result.per_category {
        match &detail.outcome {
            CategoryOutcome::Used {
                tier,
                training_rows,
                prediction,
                lower,
                upper,
                contribution,
                ..
            } => println!(
                "  {:<13} weight {:.3}  prediction {prediction:.2} (band {lower:.2}..{upper:.2})  contribution {contribution:.2}  ({training_rows} rows, {tier:?})",
                detail.category.to_string(),
                detail.weight,
            ),
            CategoryOutcome::Skipped { reason } => println!(
                "  {:<13} weight {:.3}  not used: {reason}",
                detail.category.to_string(),
                detail.weight,
            ),
        }
    }
    Ok(())
}

fn print_joint(store: &impl TableSource, query: &QueryComposition, config: &Config) -> Result<()> {
    let result = estimate_joint(store, query, config)?;
    println!(
        "estimate: {:.2} {} (rmse {:.2}, {} rows)",
        result.value, result.unit, result.rmse, result.training_rows
    );
    println!("  intercept {:.6}", result.intercept);
    for term in result.terms.iter().filter(|term| term.kept) {
        println!("  {:<8} {:.6}", term.feature, term.coefficient);
    }
    Ok(())
}
