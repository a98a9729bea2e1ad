use clap::Parser;
use scuc_cli::{init_tracing, run, Cli};

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.log_level);

    match run(&cli) {
        Ok(summary) => {
            println!("{summary}");
        }
        Err(err) => {
            tracing::error!("{err:#}");
            eprintln!("error: {err:#}");
            std::process::exit(1);
        }
    }
}
