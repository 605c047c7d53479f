use std::fmt::{self, Write as _};

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::instruction::Instruction;
use crate::source_map::SourceMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Constant {
    Number(f64),
    String(String),
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Number(n) => write!(f, "{n}"),
            Constant::String(s) => write!(f, "{s:?}"),
        }
    }
}

/// What a unit is called and how it binds arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitSignature {
    /// Entry method name (`global_` for script bodies).
    pub method_name: String,
    /// Name shown in stack traces.
    pub display_name: String,
    pub params: Vec<String>,
    pub strict: bool,
}

/// Finished, immutable bytecode for one unit.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Code {
    pub signature: UnitSignature,
    pub instructions: Vec<Instruction>,
    pub constants: Vec<Constant>,
    pub source_map: Option<SourceMap>,
}

impl Code {
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn constant(&self, index: u32) -> Option<&Constant> {
        self.constants.get(index as usize)
    }

    /// Constant at `index` if it is a string, used for name operands.
    pub fn name(&self, index: u32) -> Option<&str> {
        match self.constant(index)? {
            Constant::String(name) => Some(name),
            Constant::Number(_) => None,
        }
    }

    /// Render a listing with jump targets labelled `L0`, `L1`, ...
    pub fn disassemble(&self) -> String {
        let mut targets: Vec<u32> = self
            .instructions
            .iter()
            .filter_map(Instruction::jump_target)
            .collect();
        targets.sort_unstable();
        targets.dedup();
        let labels: AHashMap<u32, usize> = targets
            .into_iter()
            .enumerate()
            .map(|(i, addr)| (addr, i))
            .collect();

        let mut out = String::new();
        let _ = writeln!(
            out,
            "{} ({}) params={:?} strict={}",
            self.signature.method_name,
            self.signature.display_name,
            self.signature.params,
            self.signature.strict
        );

        for (addr, instr) in self.instructions.iter().enumerate() {
            let addr = addr as u32;
            let label = labels
                .get(&addr)
                .map(|l| format!("L{l}:"))
                .unwrap_or_default();
            let _ = write!(out, "  {addr:4} {label:>4}  {instr:?}");

            if let Some(target) = instr.jump_target() {
                let target_label = labels
                    .get(&target)
                    .map_or_else(|| format!("@{target}"), |l| format!("L{l}"));
                let _ = write!(out, " (to {target_label})");
            } else if let Some(constant) = instr.constant_operand().and_then(|i| self.constant(i)) {
                let _ = write!(out, " ; {constant}");
            }
            out.push('\n');
        }

        out
    }
}

impl fmt::Debug for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Code {{")?;
        if self.constants.is_empty() {
            writeln!(f, "  constants: []")?;
        } else {
            writeln!(f, "  constants: [")?;
            for (i, constant) in self.constants.iter().enumerate() {
                writeln!(f, "    [{i}] = {constant}")?;
            }
            writeln!(f, "  ]")?;
        }
        write!(f, "{}", self.disassemble())?;
        write!(f, "}}")
    }
}
