//! Compiled code units
//!
//! A code unit is the instruction sequence of one script together with its
//! string table and memory slot count. Units are decoded once at load time
//! and shared (via `Rc`) by every script instance running them.
//!
//! Container layout (all integers little-endian):
//!
//! ```text
//! magic      "GRIM"
//! version    u16
//! slot_count u16
//! string_cnt u32
//! strings    string_cnt x (u16 length, UTF-8 bytes)
//! code_len   u32
//! code       code_len bytes
//! ```

use crate::error::DecodeError;
use crate::instruction::{Instruction, Operand};
use log::debug;
use std::sync::atomic::{AtomicU32, Ordering};

pub const MAGIC: [u8; 4] = *b"GRIM";
pub const FORMAT_VERSION: u16 = 1;

static NEXT_UNIT_ID: AtomicU32 = AtomicU32::new(1);

/// Sequential little-endian reader over a byte slice
pub struct ByteCursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        ByteCursor { bytes, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        if self.remaining() < n {
            return Err(DecodeError::Underrun {
                offset: self.pos,
                needed: n,
                remaining: self.remaining(),
            });
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut buf = [0u8; N];
        buf.copy_from_slice(self.read_bytes(N)?);
        Ok(buf)
    }

    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, DecodeError> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32, DecodeError> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    pub fn read_f32(&mut self) -> Result<f32, DecodeError> {
        Ok(f32::from_le_bytes(self.read_array()?))
    }
}

/// Identity of a loaded code unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CodeUnitId(pub u32);

/// A decoded, validated script code unit
#[derive(Debug)]
pub struct CodeUnit {
    pub id: CodeUnitId,
    pub instructions: Vec<Instruction>,
    pub strings: Vec<String>,
    pub slot_count: u16,
}

impl CodeUnit {
    /// Build a code unit from already-decoded parts, validating jump/call
    /// targets and string references
    pub fn new(
        instructions: Vec<Instruction>,
        strings: Vec<String>,
        slot_count: u16,
    ) -> Result<Self, DecodeError> {
        let unit = CodeUnit {
            id: CodeUnitId(NEXT_UNIT_ID.fetch_add(1, Ordering::Relaxed)),
            instructions,
            strings,
            slot_count,
        };
        unit.validate()?;
        Ok(unit)
    }

    /// Decode a raw instruction stream (no container header)
    pub fn decode_code(code: &[u8]) -> Result<Vec<Instruction>, DecodeError> {
        let mut cursor = ByteCursor::new(code);
        let mut instructions = Vec::new();
        while !cursor.is_empty() {
            instructions.push(Instruction::decode(&mut cursor)?);
        }
        Ok(instructions)
    }

    /// Load a code unit from its container bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut cursor = ByteCursor::new(bytes);

        let magic: [u8; 4] = cursor.read_array()?;
        if magic != MAGIC {
            return Err(DecodeError::BadMagic(magic));
        }
        let version = cursor.read_u16()?;
        if version != FORMAT_VERSION {
            return Err(DecodeError::UnsupportedVersion(version));
        }
        let slot_count = cursor.read_u16()?;

        let string_count = cursor.read_u32()? as usize;
        let mut strings = Vec::new();
        for index in 0..string_count {
            let len = cursor.read_u16()? as usize;
            let raw = cursor.read_bytes(len)?;
            let text = std::str::from_utf8(raw).map_err(|_| DecodeError::InvalidString { index })?;
            strings.push(text.to_string());
        }

        let code_len = cursor.read_u32()? as usize;
        let code = cursor.read_bytes(code_len)?;
        if !cursor.is_empty() {
            return Err(DecodeError::TrailingBytes(cursor.remaining()));
        }
        let instructions = Self::decode_code(code)?;

        debug!(
            "Loaded code unit: {} instructions, {} strings, {} slots",
            instructions.len(),
            strings.len(),
            slot_count
        );
        CodeUnit::new(instructions, strings, slot_count)
    }

    /// Serialize into container bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&MAGIC);
        out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        out.extend_from_slice(&self.slot_count.to_le_bytes());
        out.extend_from_slice(&(self.strings.len() as u32).to_le_bytes());
        for s in &self.strings {
            out.extend_from_slice(&(s.len() as u16).to_le_bytes());
            out.extend_from_slice(s.as_bytes());
        }
        let mut code = Vec::new();
        for inst in &self.instructions {
            inst.encode(&mut code);
        }
        out.extend_from_slice(&(code.len() as u32).to_le_bytes());
        out.extend_from_slice(&code);
        out
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn get_string(&self, index: u32) -> Option<&str> {
        self.strings.get(index as usize).map(String::as_str)
    }

    fn validate(&self) -> Result<(), DecodeError> {
        // string lengths are written as u16
        for (index, s) in self.strings.iter().enumerate() {
            if s.len() > u16::MAX as usize {
                return Err(DecodeError::StringTooLong { index, len: s.len() });
            }
        }
        let len = self.instructions.len();
        for (index, inst) in self.instructions.iter().enumerate() {
            // a target equal to len means "fall off the end"
            if let Some(target) = inst.target() {
                if target as usize > len {
                    return Err(DecodeError::TargetOutOfRange { index, target, len });
                }
            }
            if let Operand::StringIndex(string) = inst.operand {
                if string as usize >= self.strings.len() {
                    return Err(DecodeError::StringOutOfRange {
                        index,
                        string,
                        len: self.strings.len(),
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcode_tables::Opcode;

    fn sample_unit() -> CodeUnit {
        CodeUnit::new(
            vec![
                Instruction::new(Opcode::PushString, Operand::StringIndex(0)),
                Instruction::new(Opcode::JumpIfTrue, Operand::CodeOffset(3)),
                Instruction::new(Opcode::Nop, Operand::None),
                Instruction::new(Opcode::Return, Operand::None),
            ],
            vec!["héllo".to_string()],
            4,
        )
        .unwrap()
    }

    #[test]
    fn test_container_load() {
        let unit = sample_unit();
        let bytes = unit.to_bytes();
        let loaded = CodeUnit::from_bytes(&bytes).unwrap();
        assert_eq!(loaded.slot_count, 4);
        assert_eq!(loaded.strings, vec!["héllo".to_string()]);
        assert_eq!(loaded.len(), 4);
        assert_eq!(loaded.instructions[1].operand, Operand::CodeOffset(3));
        assert_eq!(loaded.instructions[1].offset, 5);
        assert_ne!(loaded.id, unit.id);
    }

    #[test]
    fn test_bad_magic() {
        let mut bytes = sample_unit().to_bytes();
        bytes[0] = b'X';
        assert!(matches!(
            CodeUnit::from_bytes(&bytes),
            Err(DecodeError::BadMagic(_))
        ));
    }

    #[test]
    fn test_truncated_container() {
        let bytes = sample_unit().to_bytes();
        let err = CodeUnit::from_bytes(&bytes[..bytes.len() - 2]).unwrap_err();
        assert!(matches!(err, DecodeError::Underrun { .. }));
    }

    #[test]
    fn test_target_out_of_range() {
        let err = CodeUnit::new(
            vec![Instruction::new(Opcode::Jump, Operand::CodeOffset(9))],
            vec![],
            0,
        )
        .unwrap_err();
        assert_eq!(
            err,
            DecodeError::TargetOutOfRange {
                index: 0,
                target: 9,
                len: 1
            }
        );
    }

    #[test]
    fn test_string_too_long_for_container() {
        let err = CodeUnit::new(
            vec![Instruction::new(Opcode::PushString, Operand::StringIndex(0))],
            vec!["x".repeat(70_000)],
            0,
        )
        .unwrap_err();
        assert_eq!(
            err,
            DecodeError::StringTooLong {
                index: 0,
                len: 70_000
            }
        );
    }

    #[test]
    fn test_string_reference_out_of_range() {
        let err = CodeUnit::new(
            vec![Instruction::new(Opcode::PushString, Operand::StringIndex(0))],
            vec![],
            0,
        )
        .unwrap_err();
        assert!(matches!(err, DecodeError::StringOutOfRange { .. }));
    }
}
