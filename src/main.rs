use az_docs::cli::Cli;
use az_docs::config::LOG_CONFIG_FILE;
use clap::Parser;
use colored::Colorize;

#[tokio::main]
async fn main() {
    // Do as little as possible in main.rs as it can't contain any tests
    let cli = Cli::parse();
    if let Err(e) = log4rs::init_file(LOG_CONFIG_FILE, Default::default()) {
        eprintln!("Logging disabled, cannot load {LOG_CONFIG_FILE}: {e}");
    }
    dotenv::dotenv().ok();
    //
    log::info!("#Start main()");

    if let Err(e) = az_docs::commands::run(cli).await {
        log::error!("{e}");
        eprintln!("{} {e}", "Error:".red());
        let mut source = std::error::Error::source(&e);
        while let Some(cause) = source {
            eprintln!("  caused by: {cause}");
            source = cause.source();
        }
        std::process::exit(1);
    }
}
