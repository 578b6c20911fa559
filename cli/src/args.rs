use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "clvm")]
#[command(about = "CLVM bytecode runner", long_about = None)]
pub struct Cli {
    /// Log VM internals (equivalent to RUST_LOG=debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a .clnu module
    Run {
        /// Path to the module
        path: String,
        /// Enter at this export instead of pc 0
        #[arg(short, long)]
        export: Option<String>,
        /// Integer arguments bound to the export's parameters (comma-separated)
        #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
        args: Vec<i64>,
        /// Collect garbage after every instruction (Stress Mode)
        #[arg(long)]
        stress_gc: bool,
        /// Maximum running stack depth
        #[arg(long)]
        max_depth: Option<usize>,
        /// TOML file with VM settings
        #[arg(short, long)]
        config: Option<String>,
    },
    /// Print a listing of a .clnu module
    #[command(alias = "disasm")]
    Disassemble {
        /// Path to the module
        path: String,
    },
}
