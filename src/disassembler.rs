use crate::bytecode::CodeUnit;
use crate::instruction::{Instruction, Operand};
use indexmap::IndexSet;
use std::fmt::{self, Display, Formatter, Write};

/// Produces a readable listing of a code unit: instruction index, byte
/// offset, raw bytes, mnemonic and operand, with string operands resolved
/// and jump/call targets marked with labels
pub struct Disassembler<'a> {
    unit: &'a CodeUnit,
}

impl<'a> Disassembler<'a> {
    pub fn new(unit: &'a CodeUnit) -> Self {
        Disassembler { unit }
    }

    /// Every code position some instruction jumps or calls to, in order
    fn targets(&self) -> IndexSet<u32> {
        let mut targets: IndexSet<u32> = self
            .unit
            .instructions
            .iter()
            .filter_map(Instruction::target)
            .collect();
        targets.sort();
        targets
    }

    fn label(targets: &IndexSet<u32>, pos: u32) -> Option<String> {
        targets.get_index_of(&pos).map(|i| format!("L{}", i + 1))
    }

    /// Format a single instruction with its operand resolved
    pub fn format_instruction(&self, inst: &Instruction) -> String {
        let targets = self.targets();
        self.format_with(inst, &targets)
    }

    fn format_with(&self, inst: &Instruction, targets: &IndexSet<u32>) -> String {
        let mut text = inst.opcode.name().to_string();
        match inst.operand {
            Operand::StringIndex(i) => match self.unit.get_string(i) {
                Some(s) => {
                    let _ = write!(text, " {:?}", s);
                }
                None => {
                    let _ = write!(text, " str[{}] <missing>", i);
                }
            },
            Operand::CodeOffset(_) | Operand::CallTarget(_) => {
                let target = inst.target().unwrap_or_default();
                match Self::label(targets, target) {
                    Some(label) => {
                        let _ = write!(text, " {} (@{})", label, target);
                    }
                    None => {
                        let _ = write!(text, " @{}", target);
                    }
                }
            }
            Operand::None => {}
            // slots, numbers and entities print as the instruction does
            _ => text = inst.to_string(),
        }
        text
    }

    /// Disassemble the whole unit into a string
    pub fn disassemble(&self) -> String {
        self.to_string()
    }
}

impl Display for Disassembler<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let unit = self.unit;
        writeln!(
            f,
            "; {} instructions, {} strings, {} slots",
            unit.len(),
            unit.strings.len(),
            unit.slot_count
        )?;
        for (i, s) in unit.strings.iter().enumerate() {
            writeln!(f, "; str[{}] = {:?}", i, s)?;
        }

        let targets = self.targets();
        let mut bytes = Vec::new();
        let mut offset = 0;
        for (index, inst) in unit.instructions.iter().enumerate() {
            if let Some(label) = Self::label(&targets, index as u32) {
                writeln!(f, "{}:", label)?;
            }
            bytes.clear();
            inst.encode(&mut bytes);
            let hex: Vec<String> = bytes.iter().map(|b| format!("{:02x}", b)).collect();
            writeln!(
                f,
                "{:04} {:06x}  {:<15} {}",
                index,
                offset,
                hex.join(" "),
                self.format_with(inst, &targets)
            )?;
            offset += bytes.len();
        }
        if let Some(label) = Self::label(&targets, unit.len() as u32) {
            writeln!(f, "{}:", label)?;
            writeln!(f, "{:04} <end>", unit.len())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::assemble;

    #[test]
    fn test_listing_resolves_strings_and_labels() {
        let unit = assemble(
            r#"
            loop:   push "Hello"
                    print
                    jmp loop
                    call done
            done:   ret
            "#,
        )
        .unwrap();
        let listing = Disassembler::new(&unit).disassemble();
        assert!(listing.contains("push_str \"Hello\""));
        assert!(listing.contains("L1:"));
        assert!(listing.contains("jmp L1 (@0)"));
        assert!(listing.contains("call L2 (@4)"));
    }

    #[test]
    fn test_end_label_when_jumping_past_last_instruction() {
        let unit = assemble("jmp end\nnop\nend:").unwrap();
        let listing = Disassembler::new(&unit).disassemble();
        assert!(listing.contains("0002 <end>"));
    }

    #[test]
    fn test_plain_operands() {
        let unit = assemble("push 2.5\nload $3\npush #9").unwrap();
        let d = Disassembler::new(&unit);
        assert_eq!(d.format_instruction(&unit.instructions[0]), "push 2.5");
        assert_eq!(d.format_instruction(&unit.instructions[1]), "load $3");
        assert_eq!(d.format_instruction(&unit.instructions[2]), "push_ent #9");
    }
}
