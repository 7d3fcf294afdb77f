//! anycalc command-line entry point.

#[tokio::main]
async fn main() {
    if let Err(e) = anycalc::cli::run().await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
