use crate::bytecode::ByteCursor;
use crate::error::DecodeError;
use crate::opcode_tables::{Opcode, OperandLayout};
use crate::value::EntityHandle;
use std::fmt::{Display, Formatter};

/// Decoded operand of an instruction
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operand {
    None,
    /// Absolute code position (instruction index)
    CodeOffset(u32),
    /// Memory slot index
    Slot(u16),
    /// Float literal
    Number(f32),
    /// Index into the code unit's string table
    StringIndex(u32),
    /// Raw entity handle literal
    Entity(EntityHandle),
    /// Call target (instruction index)
    CallTarget(u16),
}

/// A decoded script instruction. Immutable once decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    /// The opcode
    pub opcode: Opcode,
    /// Operand, decoded per the opcode's layout
    pub operand: Operand,
    /// Byte offset of the opcode in the instruction stream
    pub offset: usize,
}

impl Instruction {
    pub fn new(opcode: Opcode, operand: Operand) -> Self {
        Instruction {
            opcode,
            operand,
            offset: 0,
        }
    }

    /// Decode one instruction from the cursor. Fails on stream underrun or
    /// an unknown opcode byte.
    pub fn decode(cursor: &mut ByteCursor<'_>) -> Result<Self, DecodeError> {
        let offset = cursor.position();
        let byte = cursor.read_u8()?;
        let opcode =
            Opcode::from_byte(byte).ok_or(DecodeError::UnknownOpcode { opcode: byte, offset })?;

        let operand = match opcode.layout() {
            OperandLayout::None => Operand::None,
            OperandLayout::CodeOffset => Operand::CodeOffset(cursor.read_u32()?),
            OperandLayout::Slot => Operand::Slot(cursor.read_u16()?),
            OperandLayout::Number => Operand::Number(cursor.read_f32()?),
            OperandLayout::StringIndex => Operand::StringIndex(cursor.read_u32()?),
            OperandLayout::Entity => Operand::Entity(EntityHandle(cursor.read_u16()?)),
            OperandLayout::CallTarget => Operand::CallTarget(cursor.read_u16()?),
        };

        Ok(Instruction {
            opcode,
            operand,
            offset,
        })
    }

    /// Append the binary form of this instruction to `out`
    pub fn encode(&self, out: &mut Vec<u8>) {
        out.push(self.opcode as u8);
        match self.operand {
            Operand::None => {}
            Operand::CodeOffset(v) | Operand::StringIndex(v) => {
                out.extend_from_slice(&v.to_le_bytes())
            }
            Operand::Slot(v) | Operand::CallTarget(v) => out.extend_from_slice(&v.to_le_bytes()),
            Operand::Number(n) => out.extend_from_slice(&n.to_le_bytes()),
            Operand::Entity(h) => out.extend_from_slice(&h.0.to_le_bytes()),
        }
    }

    /// Size in bytes of the encoded instruction
    pub fn size(&self) -> usize {
        1 + self.opcode.layout().size()
    }

    /// Code position this instruction may transfer control to
    pub fn target(&self) -> Option<u32> {
        match self.operand {
            Operand::CodeOffset(t) => Some(t),
            Operand::CallTarget(t) => Some(t as u32),
            _ => None,
        }
    }
}

impl Display for Instruction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.opcode.name())?;
        match self.operand {
            Operand::None => Ok(()),
            Operand::CodeOffset(t) => write!(f, " @{t}"),
            Operand::Slot(s) => write!(f, " ${s}"),
            Operand::Number(n) => write!(f, " {}", crate::value::format_number(n)),
            Operand::StringIndex(i) => write!(f, " str[{i}]"),
            Operand::Entity(h) => write!(f, " {h}"),
            Operand::CallTarget(t) => write!(f, " @{t}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_one(bytes: &[u8]) -> Result<Instruction, DecodeError> {
        let mut cursor = ByteCursor::new(bytes);
        Instruction::decode(&mut cursor)
    }

    #[test]
    fn test_decode_jump_operand() {
        let inst = decode_one(&[0x20, 0x10, 0x00, 0x00, 0x00]).unwrap();
        assert_eq!(inst.opcode, Opcode::Jump);
        assert_eq!(inst.operand, Operand::CodeOffset(16));
        assert_eq!(inst.size(), 5);
    }

    #[test]
    fn test_decode_push_number() {
        let mut bytes = vec![0x38];
        bytes.extend_from_slice(&2.5f32.to_le_bytes());
        let inst = decode_one(&bytes).unwrap();
        assert_eq!(inst.operand, Operand::Number(2.5));
    }

    #[test]
    fn test_decode_entity_and_slot() {
        let inst = decode_one(&[0x3A, 0x07, 0x01]).unwrap();
        assert_eq!(inst.operand, Operand::Entity(EntityHandle(0x0107)));
        let inst = decode_one(&[0x31, 0x02, 0x00]).unwrap();
        assert_eq!(inst.opcode, Opcode::Store);
        assert_eq!(inst.operand, Operand::Slot(2));
    }

    #[test]
    fn test_decode_underrun() {
        let err = decode_one(&[0x20, 0x01, 0x00]).unwrap_err();
        assert!(matches!(err, DecodeError::Underrun { needed: 4, .. }));
        assert!(matches!(decode_one(&[]), Err(DecodeError::Underrun { .. })));
    }

    #[test]
    fn test_decode_unknown_opcode() {
        let err = decode_one(&[0xEE]).unwrap_err();
        assert_eq!(
            err,
            DecodeError::UnknownOpcode {
                opcode: 0xEE,
                offset: 0
            }
        );
    }

    #[test]
    fn test_api_opcodes_take_no_inline_operands() {
        let inst = decode_one(&[0xA3, 0xFF]).unwrap();
        assert_eq!(inst.opcode, Opcode::Attack);
        assert_eq!(inst.operand, Operand::None);
        assert_eq!(inst.size(), 1);
    }
}
