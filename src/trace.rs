//! Trace file discovery and parsing.
//!
//! Each core's trace is read fully into a `Vec<Instruction>` up front, so
//! the simulation's hot loop never touches the filesystem.

use std::fs;
use std::path::Path;

use log::debug;

use crate::addr::Addr;
use crate::config::{trace_path, Config, NUM_CORES};
use crate::error::{Result, SimError};
use crate::instr::Instruction;

/// Read all four per-core traces for `cfg.trace_base`.
pub fn read_traces(cfg: &Config) -> Result<Vec<Vec<Instruction>>> {
    (0..NUM_CORES)
        .map(|core_id| read_one(&trace_path(&cfg.trace_base, core_id), core_id))
        .collect()
}

fn read_one(path: &Path, core_id: usize) -> Result<Vec<Instruction>> {
    let contents = fs::read_to_string(path)?;
    let mut instrs = Vec::new();
    for (line_no, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        instrs.push(parse_line(path, line_no + 1, line)?);
    }
    debug!("core {core_id}: loaded {} instructions from {}", instrs.len(), path.display());
    Ok(instrs)
}

fn parse_line(path: &Path, line_no: usize, line: &str) -> Result<Instruction> {
    let mut tokens = line.split_whitespace();
    let kind = tokens.next();
    let operand = tokens.next();
    let (kind, operand) = match (kind, operand) {
        (Some(k), Some(o)) => (k, o),
        _ => return Err(parse_err(path, line_no, line)),
    };
    let value =
        u64::from_str_radix(operand, 16).map_err(|_| parse_err(path, line_no, line))?;
    match kind {
        "0" => Ok(Instruction::Load(Addr(value))),
        "1" => Ok(Instruction::Store(Addr(value))),
        "2" => Ok(Instruction::Other(value)),
        _ => Err(parse_err(path, line_no, line)),
    }
}

fn parse_err(path: &Path, line_no: usize, line: &str) -> SimError {
    SimError::TraceParse {
        path: path.to_path_buf(),
        line_no,
        line: line.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_load_store_other() {
        let path = Path::new("trace_0.data");
        assert_eq!(
            parse_line(path, 1, "0 1a").unwrap(),
            Instruction::Load(Addr(0x1a))
        );
        assert_eq!(
            parse_line(path, 2, "1 20").unwrap(),
            Instruction::Store(Addr(0x20))
        );
        assert_eq!(parse_line(path, 3, "2 5").unwrap(), Instruction::Other(5));
    }

    #[test]
    fn rejects_malformed_line() {
        let path = Path::new("trace_0.data");
        assert!(parse_line(path, 1, "3 10").is_err());
        assert!(parse_line(path, 1, "0 zz").is_err());
        assert!(parse_line(path, 1, "0").is_err());
    }
}
