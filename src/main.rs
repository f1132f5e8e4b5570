use std::path::PathBuf;

use tracing::info;
use tracing_subscriber::EnvFilter;

use recital_assigner::parser::{load_exceptions, load_performers};
use recital_assigner::report::{print_run_summary, write_reports, Reports};
use recital_assigner::schedule::{assign, SchoolExceptions};
use recital_assigner::web::{self, AppState};
use recital_assigner::CycleConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = CycleConfig::from_env()?;
    let args: Vec<String> = std::env::args().collect();

    // Web mode: recital-assigner web [port]
    if args.len() > 1 && args[1] == "web" {
        let port = args.get(2)
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(8080);
        let password = std::env::var("ADMIN_PASSWORD")
            .unwrap_or_else(|_| "admin123".to_string());

        info!("starting web server on port {}", port);
        info!("access the API at http://localhost:{}/api/stats", port);

        web::start_server(port, AppState::new(config, SchoolExceptions::new(), password)).await?;
        return Ok(());
    }

    let Some(records_path) = args.get(1) else {
        eprintln!("usage: recital-assigner <records.csv> [exceptions.csv]");
        eprintln!("       recital-assigner web [port]");
        std::process::exit(2);
    };

    let performers = load_performers(records_path, &config)?;
    info!("loaded {} performers from {}", performers.len(), records_path);

    let exceptions = match args.get(2) {
        Some(path) => {
            let exceptions = load_exceptions(path)?;
            info!("loaded {} school exceptions from {}", exceptions.len(), path);
            exceptions
        }
        None => SchoolExceptions::new(),
    };

    let result = assign(&config, exceptions, performers);
    let reports = Reports::build(&result, &config);

    let output_dir = PathBuf::from(std::env::var("RECITAL_OUTPUT_DIR").unwrap_or_else(|_| "output".to_string()));
    let written = write_reports(&output_dir, &reports)?;

    print_run_summary(&result, &config);

    println!("\nReports saved to:");
    for path in written {
        println!("  - {}", path.display());
    }

    Ok(())
}
