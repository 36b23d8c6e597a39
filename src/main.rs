use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde_json::json;

use lifecost::core::{
    UserAssumptions, builtin_defaults, create_combined_assumptions,
    get_cost_per_life_for_recipient_from_combined, get_cost_per_life_from_combined,
    normalize_user_assumptions,
};

#[derive(Parser, Debug)]
#[command(
    name = "lifecost",
    about = "Cost-per-life estimator (layered assumption overrides + causal effects)"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the HTTP API
    Serve {
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
    /// Run one estimate against the built-in defaults and print JSON
    Estimate {
        #[arg(long, conflicts_with = "category")]
        recipient: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long, help = "Simulated donation amount in dollars")]
        amount: Option<f64>,
        #[arg(long, default_value_t = 2025)]
        year: i32,
        #[arg(long, help = "Path to a user-assumptions JSON document")]
        assumptions: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match cli.command {
        Command::Serve { port } => {
            if let Err(e) = lifecost::api::run_http_server(port).await {
                eprintln!("Server error: {e}");
                return ExitCode::FAILURE;
            }
            ExitCode::SUCCESS
        }
        Command::Estimate {
            recipient,
            category,
            amount,
            year,
            assumptions,
        } => match run_estimate(recipient, category, amount, year, assumptions) {
            Ok(output) => {
                println!("{output}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("{e}");
                ExitCode::FAILURE
            }
        },
    }
}

fn run_estimate(
    recipient: Option<String>,
    category: Option<String>,
    amount: Option<f64>,
    year: i32,
    assumptions_path: Option<PathBuf>,
) -> Result<String, String> {
    let defaults = builtin_defaults();

    let user = match assumptions_path {
        Some(path) => {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
            let raw: UserAssumptions = serde_json::from_str(&text)
                .map_err(|e| format!("invalid assumptions document: {e}"))?;
            normalize_user_assumptions(&raw, &defaults).map_err(|e| e.to_string())?
        }
        None => None,
    };
    let combined = create_combined_assumptions(&defaults, user.as_ref());

    let (label, cost) = match (recipient, category) {
        (Some(id), None) => (
            id.clone(),
            get_cost_per_life_for_recipient_from_combined(&combined, &id, year)
                .map_err(|e| e.to_string())?,
        ),
        (None, Some(id)) => (
            id.clone(),
            get_cost_per_life_from_combined(&combined, &id, year).map_err(|e| e.to_string())?,
        ),
        _ => return Err("specify exactly one of --recipient or --category".to_string()),
    };

    let body = json!({
        "target": label,
        "year": year,
        "costPerLife": cost.is_finite().then_some(cost),
        "livesSaved": amount.map(|a| a / cost),
    });
    serde_json::to_string_pretty(&body).map_err(|e| e.to_string())
}
