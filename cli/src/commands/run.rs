use anyhow::{Context, Result};
use memory::Value;
use std::fs;
use std::path::Path;
use tracing::info;
use vm::loader::read_module;
use vm::VM;

use super::config::load_config;

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub path: String,
    pub export: Option<String>,
    pub args: Vec<i64>,
    pub stress_gc: bool,
    pub max_depth: Option<usize>,
    pub config: Option<String>,
}

/// Module name for a container path: its file stem.
pub fn module_name(path: &str) -> String {
    Path::new(path)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("main")
        .to_string()
}

/// Load and run a module, returning its result rendered as text.
pub fn execute_file(opts: &RunOptions) -> Result<String> {
    let mut config = load_config(opts.config.as_deref())?;
    if opts.stress_gc {
        config.stress_gc = true;
    }
    if let Some(depth) = opts.max_depth {
        config.max_depth = depth;
    }

    let mut file =
        fs::File::open(&opts.path).with_context(|| format!("Failed to open {}", opts.path))?;
    let module = read_module(&module_name(&opts.path), &mut file)
        .map_err(|e| anyhow::anyhow!("Loader Error: {}", e))?;

    let mut vm = VM::with_config(config);
    let idx = vm.load_module(module);
    let args: Vec<Value> = opts.args.iter().map(|n| Value::int(*n)).collect();
    let id = match &opts.export {
        Some(name) => vm.spawn_export(idx, name, args),
        None => vm.spawn(idx, 0, args),
    }
    .map_err(|e| anyhow::anyhow!("Runtime Error: {}", e))?;

    vm.run();
    let steps = vm.thread(id).map(|t| t.steps).unwrap_or(0);
    info!(steps, path = %opts.path, "run finished");

    match vm.outcome(id) {
        Some(Ok(value)) => Ok(vm.val_to_string(value)),
        Some(Err(record)) => Err(anyhow::anyhow!("Runtime Error: {}", record)),
        None => Err(anyhow::anyhow!("Runtime Error: thread did not terminate")),
    }
}

pub fn run_file(opts: &RunOptions) -> Result<()> {
    let result = execute_file(opts)?;
    println!("{}", result);
    Ok(())
}
