use std::collections::HashMap;

/// Operand layout following an opcode byte in the instruction stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandLayout {
    /// No operands; arguments travel on the value stack
    None,
    /// 4-byte absolute code position
    CodeOffset,
    /// 2-byte memory slot index
    Slot,
    /// 4-byte float literal
    Number,
    /// 4-byte string table index
    StringIndex,
    /// 2-byte entity handle literal
    Entity,
    /// 2-byte call target code index
    CallTarget,
}

impl OperandLayout {
    /// Size of the operand in bytes
    pub fn size(&self) -> usize {
        match self {
            OperandLayout::None => 0,
            OperandLayout::CodeOffset | OperandLayout::Number | OperandLayout::StringIndex => 4,
            OperandLayout::Slot | OperandLayout::Entity | OperandLayout::CallTarget => 2,
        }
    }
}

/// Opcode families, used by the dispatcher to route execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpcodeFamily {
    Math,
    Flow,
    Memory,
    Stack,
    World,
    Gui,
    Combat,
}

macro_rules! opcodes {
    ($( $variant:ident = $byte:literal, $name:literal, $layout:ident, $family:ident; )*) => {
        /// Every opcode understood by the script VM
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum Opcode {
            $( $variant = $byte, )*
        }

        impl Opcode {
            pub fn from_byte(byte: u8) -> Option<Opcode> {
                match byte {
                    $( $byte => Some(Opcode::$variant), )*
                    _ => None,
                }
            }

            pub fn name(&self) -> &'static str {
                match self {
                    $( Opcode::$variant => $name, )*
                }
            }

            pub fn layout(&self) -> OperandLayout {
                match self {
                    $( Opcode::$variant => OperandLayout::$layout, )*
                }
            }

            pub fn family(&self) -> OpcodeFamily {
                match self {
                    $( Opcode::$variant => OpcodeFamily::$family, )*
                }
            }

            pub const ALL: &'static [Opcode] = &[ $( Opcode::$variant, )* ];
        }
    };
}

opcodes! {
    Nop = 0x00, "nop", None, Stack;

    Negate = 0x01, "neg", None, Math;
    Multiply = 0x02, "mul", None, Math;
    Add = 0x03, "add", None, Math;
    Modulo = 0x04, "mod", None, Math;
    Divide = 0x05, "div", None, Math;
    Subtract = 0x06, "sub", None, Math;
    Concat = 0x07, "concat", None, Math;

    Not = 0x08, "not", None, Math;
    And = 0x09, "and", None, Math;
    Or = 0x0A, "or", None, Math;
    Equal = 0x0B, "eq", None, Math;
    NotEqual = 0x0C, "ne", None, Math;
    Less = 0x0D, "lt", None, Math;
    LessEqual = 0x0E, "le", None, Math;
    Greater = 0x0F, "gt", None, Math;
    GreaterEqual = 0x10, "ge", None, Math;
    StrEqual = 0x11, "str_eq", None, Math;
    StrNotEqual = 0x12, "str_ne", None, Math;
    EntityEqual = 0x13, "ent_eq", None, Math;
    EntityNotEqual = 0x14, "ent_ne", None, Math;

    Jump = 0x20, "jmp", CodeOffset, Flow;
    JumpIfFalse = 0x21, "jf", CodeOffset, Flow;
    JumpIfTrue = 0x22, "jt", CodeOffset, Flow;
    JumpIfEqual = 0x23, "jeq", CodeOffset, Flow;
    JumpIfNotEqual = 0x24, "jne", CodeOffset, Flow;
    JumpIfStrEqual = 0x25, "jstr_eq", CodeOffset, Flow;
    JumpIfStrNotEqual = 0x26, "jstr_ne", CodeOffset, Flow;
    JumpIfEntityEqual = 0x27, "jent_eq", CodeOffset, Flow;
    JumpIfEntityNotEqual = 0x28, "jent_ne", CodeOffset, Flow;
    JumpIfGreaterEqual = 0x29, "jge", CodeOffset, Flow;
    JumpIfGreater = 0x2A, "jgt", CodeOffset, Flow;
    JumpIfLess = 0x2B, "jlt", CodeOffset, Flow;
    JumpIfLessEqual = 0x2C, "jle", CodeOffset, Flow;

    Load = 0x30, "load", Slot, Memory;
    Store = 0x31, "store", Slot, Memory;

    PushNumber = 0x38, "push", Number, Memory;
    PushString = 0x39, "push_str", StringIndex, Memory;
    PushEntity = 0x3A, "push_ent", Entity, Memory;

    Pop = 0x40, "pop", None, Stack;
    Dup = 0x41, "dup", None, Stack;

    Call = 0x48, "call", CallTarget, Stack;
    Return = 0x49, "ret", None, Stack;

    NumberToString = 0x50, "num2str", None, Math;
    StringToNumber = 0x51, "str2num", None, Math;

    Print = 0x80, "print", None, Gui;
    Random = 0x81, "random", None, World;
    GetSelf = 0x82, "self", None, World;
    EntityExists = 0x83, "exists", None, World;
    GetName = 0x84, "name", None, World;
    GetHitPoints = 0x85, "get_hp", None, World;
    SetHitPoints = 0x86, "set_hp", None, World;
    GetDistance = 0x87, "distance", None, World;
    IsWallOpen = 0x88, "wall_open", None, World;
    SetWallOpen = 0x89, "set_wall_open", None, World;
    GetEquipped = 0x8A, "equipped", None, World;
    GetAlignment = 0x8B, "alignment", None, World;
    SetAlignment = 0x8C, "set_alignment", None, World;
    DestroyEntity = 0x8D, "destroy", None, World;

    Wait = 0x90, "wait", None, World;
    MoveTo = 0x91, "move_to", None, World;
    Speak = 0x92, "speak", None, World;

    ShowMessage = 0x98, "message", None, Gui;
    Dialog = 0x99, "dialog", None, Gui;
    FadeScreen = 0x9A, "fade", None, Gui;
    GetInterfaceState = 0x9B, "ui_state", None, Gui;

    InCombat = 0xA0, "in_combat", None, Combat;
    StartCombat = 0xA1, "start_combat", None, Combat;
    EndCombat = 0xA2, "end_combat", None, Combat;
    Attack = 0xA3, "attack", None, Combat;
    GetActionPoints = 0xA4, "action_points", None, Combat;
}

impl Opcode {
    /// API instructions call into engine subsystems rather than only
    /// touching VM-local state
    pub fn is_api(&self) -> bool {
        (*self as u8) >= 0x80
    }
}

lazy_static! {
    /// Mnemonic lookup used by the assembler
    pub static ref MNEMONICS: HashMap<&'static str, Opcode> = {
        let mut m = HashMap::new();
        for op in Opcode::ALL {
            m.insert(op.name(), *op);
        }
        m
    };
}

/// Get an opcode by mnemonic, case-insensitively
pub fn lookup_mnemonic(name: &str) -> Option<Opcode> {
    MNEMONICS.get(name.to_ascii_lowercase().as_str()).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_roundtrip_for_every_opcode() {
        for op in Opcode::ALL {
            assert_eq!(Opcode::from_byte(*op as u8), Some(*op), "{}", op.name());
        }
        assert_eq!(Opcode::from_byte(0xFF), None);
    }

    #[test]
    fn test_mnemonics_are_unique() {
        assert_eq!(MNEMONICS.len(), Opcode::ALL.len());
        assert_eq!(lookup_mnemonic("ADD"), Some(Opcode::Add));
        assert_eq!(lookup_mnemonic("frobnicate"), None);
    }

    #[test]
    fn test_operand_sizes() {
        assert_eq!(Opcode::Jump.layout().size(), 4);
        assert_eq!(Opcode::Load.layout().size(), 2);
        assert_eq!(Opcode::PushNumber.layout().size(), 4);
        assert_eq!(Opcode::PushString.layout().size(), 4);
        assert_eq!(Opcode::PushEntity.layout().size(), 2);
        assert_eq!(Opcode::Call.layout().size(), 2);
        assert_eq!(Opcode::Attack.layout().size(), 0);
        assert!(Opcode::Attack.is_api());
        assert!(!Opcode::Return.is_api());
    }
}
