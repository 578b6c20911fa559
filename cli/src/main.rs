use anyhow::Result;
use clap::Parser;

mod args;

use args::{Cli, Commands};
use cli::commands::{disassemble, run};

fn main() -> Result<()> {
    let cli = Cli::parse();
    cli::init_logging(cli.verbose);

    match &cli.command {
        Commands::Run {
            path,
            export,
            args,
            stress_gc,
            max_depth,
            config,
        } => run::run_file(&run::RunOptions {
            path: path.clone(),
            export: export.clone(),
            args: args.clone(),
            stress_gc: *stress_gc,
            max_depth: *max_depth,
            config: config.clone(),
        }),
        Commands::Disassemble { path } => disassemble::disassemble_file(path),
    }
}
