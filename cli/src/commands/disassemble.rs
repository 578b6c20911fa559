use anyhow::{Context, Result};
use std::fs;
use vm::disasm::disassemble;
use vm::loader::read_module;

use super::run::module_name;

pub fn disassembly(path: &str) -> Result<String> {
    let mut file = fs::File::open(path).with_context(|| format!("Failed to open {}", path))?;
    let module = read_module(&module_name(path), &mut file)
        .map_err(|e| anyhow::anyhow!("Loader Error: {}", e))?;
    Ok(disassemble(&module))
}

pub fn disassemble_file(path: &str) -> Result<()> {
    println!("== Disassembly of {} ==", path);
    print!("{}", disassembly(path)?);
    Ok(())
}
