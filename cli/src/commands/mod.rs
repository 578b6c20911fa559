pub mod config;
pub mod disassemble;
pub mod run;
