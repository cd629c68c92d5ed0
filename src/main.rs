use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod log;
mod model;
mod regress;
mod render;
mod roofline;
mod schema;
mod table;

pub type Result<T> = anyhow::Result<T>;

#[derive(Parser)]
#[command(name = "perfmodel")]
#[command(about = "Perf-counter dataset builder and CPI modeler", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the combined dataset from perf interval logs.
    Dataset {
        /// Perf log files; visited in file-creation-time order.
        #[arg(required = true)]
        logs: Vec<PathBuf>,

        /// Instruction threshold for closing an aggregation window.
        #[arg(long, default_value_t = 100_000_000, value_parser = clap::value_parser!(u64).range(1..))]
        threshold: u64,

        /// Output CSV path.
        #[arg(long, default_value = "combined_perf.csv")]
        csv: PathBuf,

        /// Output JSON path.
        #[arg(long, default_value = "combined_perf.json")]
        json: PathBuf,
    },

    /// Fit the non-negative CPI regression on a combined dataset CSV.
    Regress {
        /// Input CSV (must contain cycles and instructions columns).
        input: PathBuf,

        /// Directory for the timestamped output artifacts.
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },

    /// Render a roofline chart from a roofline spec JSON.
    Roofline {
        /// Roofline spec (machine ceilings + measured points).
        #[arg(long)]
        spec: PathBuf,

        /// Output PNG path.
        #[arg(short = 'o', long)]
        out: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.cmd {
        Commands::Dataset {
            logs,
            threshold,
            csv,
            json,
        } => {
            let schema = schema::CounterSchema::default_events();
            let combined = model::build_dataset(&logs, threshold, &schema)?;
            if combined.is_empty() {
                eprintln!("WARN: no aggregation window met the threshold; outputs are empty");
            }
            combined.write_csv_path(&csv)?;
            combined.write_json_path(&json)?;
            println!(
                "Done! CSV and JSON saved. Total rows: {}",
                combined.len()
            );
            println!("Wrote {}", csv.display());
            println!("Wrote {}", json.display());
        }

        Commands::Regress { input, out_dir } => {
            let artifacts = regress::run(&input, &out_dir)?;
            println!("Residuals saved to: {}", artifacts.residuals_csv.display());
            println!("Metrics JSON: {}", artifacts.metrics_json.display());
            println!("Plot: {}", artifacts.plot_png.display());
        }

        Commands::Roofline { spec, out } => {
            let spec = roofline::RooflineSpec::load(&spec)?;
            render::render_roofline(&spec, &out)?;
            println!("Wrote {}", out.display());
        }
    }

    Ok(())
}
