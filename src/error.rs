// Script engine error handling

use crate::value::EntityHandle;
use thiserror::Error;

/// Failure while decoding a code unit. Loading of the unit is abandoned.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("bytecode underrun at offset {offset}: needed {needed} bytes, {remaining} left")]
    Underrun {
        offset: usize,
        needed: usize,
        remaining: usize,
    },

    #[error("unknown opcode 0x{opcode:02x} at offset {offset}")]
    UnknownOpcode { opcode: u8, offset: usize },

    #[error("bad container magic {0:02x?}")]
    BadMagic([u8; 4]),

    #[error("unsupported container version {0}")]
    UnsupportedVersion(u16),

    #[error("string table entry {index} is not valid UTF-8")]
    InvalidString { index: usize },

    #[error("instruction {index} targets code position {target}, but the unit has {len} instructions")]
    TargetOutOfRange { index: usize, target: u32, len: usize },

    #[error("instruction {index} references string {string}, but the table has {len} entries")]
    StringOutOfRange { index: usize, string: u32, len: usize },

    #[error("string table entry {index} is {len} bytes, over the 65535 byte limit")]
    StringTooLong { index: usize, len: usize },

    #[error("{0} trailing bytes after code stream")]
    TrailingBytes(usize),
}

/// Reason attached to an `ErrorInterrupt`. The script stops silently; the
/// engine keeps running.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScriptError {
    #[error("value stack underflow")]
    StackUnderflow,

    #[error("value stack overflow (limit {0})")]
    StackOverflow(usize),

    #[error("call depth limit {0} exceeded")]
    CallDepthExceeded(usize),

    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("division by zero")]
    DivisionByZero,

    #[error("memory slot {slot} out of range ({count} slots)")]
    SlotOutOfRange { slot: u16, count: usize },

    #[error("string index {index} out of range ({count} strings)")]
    StringOutOfRange { index: u32, count: usize },

    #[error("code position {target} out of range ({len} instructions)")]
    CodePositionOutOfRange { target: u32, len: usize },

    #[error("invalid entity handle {0}")]
    InvalidHandle(EntityHandle),

    #[error("entity {handle} is not a {expected}")]
    WrongEntityKind {
        handle: EntityHandle,
        expected: &'static str,
    },

    #[error("{what} value {value} out of range")]
    OutOfRange { what: &'static str, value: f32 },

    #[error("operation not allowed: {0}")]
    Disallowed(&'static str),

    #[error("instruction at code position {0} already has an outstanding wait")]
    WaitAlreadyPending(usize),

    #[error("wait disqualified: {0}")]
    Disqualified(String),

    #[error("unhandled opcode {0}")]
    UnhandledOpcode(&'static str),
}

/// Failure loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Failure assembling script source text.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AssembleError {
    #[error("line {line}: unknown mnemonic '{mnemonic}'")]
    UnknownMnemonic { line: usize, mnemonic: String },

    #[error("line {line}: {message}")]
    BadOperand { line: usize, message: String },

    #[error("line {line}: undefined label '{label}'")]
    UndefinedLabel { line: usize, label: String },

    #[error("line {line}: duplicate label '{label}'")]
    DuplicateLabel { line: usize, label: String },

    #[error(transparent)]
    Decode(#[from] DecodeError),
}
