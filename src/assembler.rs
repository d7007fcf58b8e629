//! Text assembler for script code units
//!
//! One instruction per line:
//!
//! ```text
//! .slots 2            ; memory slots for the unit
//! start:
//!     push 3
//!     push 4
//!     add
//!     num2str
//!     push "Total: "  ; `push` with a string or #entity picks the right opcode
//!     concat
//!     jmp end
//! end:
//!     ret
//! ```
//!
//! Operands: numbers, `"strings"` (interned into the string table),
//! `#N` entity literals, `$N` or `N` memory slots, and labels or raw
//! indices for jumps and calls.

use crate::bytecode::CodeUnit;
use crate::error::AssembleError;
use crate::instruction::{Instruction, Operand};
use crate::opcode_tables::{lookup_mnemonic, Opcode, OperandLayout};
use crate::value::EntityHandle;
use indexmap::IndexMap;
use log::debug;

struct PendingLine<'a> {
    line: usize,
    opcode: Opcode,
    operand: Option<&'a str>,
}

/// Assemble source text into a validated code unit
pub fn assemble(source: &str) -> Result<CodeUnit, AssembleError> {
    let mut labels: IndexMap<String, u32> = IndexMap::new();
    let mut pending: Vec<PendingLine<'_>> = Vec::new();
    let mut slot_count: u16 = 0;

    // First pass: labels, directives and mnemonics
    for (i, raw) in source.lines().enumerate() {
        let line = i + 1;
        let mut text = strip_comment(raw).trim();

        if let Some((head, rest)) = split_label(text) {
            if !is_identifier(head) {
                return Err(AssembleError::BadOperand {
                    line,
                    message: format!("invalid label name '{}'", head),
                });
            }
            if labels.contains_key(head) {
                return Err(AssembleError::DuplicateLabel {
                    line,
                    label: head.to_string(),
                });
            }
            labels.insert(head.to_string(), pending.len() as u32);
            text = rest.trim();
        }
        if text.is_empty() {
            continue;
        }

        let (mnemonic, operand) = match text.split_once(char::is_whitespace) {
            Some((m, rest)) => (m, Some(rest.trim()).filter(|r| !r.is_empty())),
            None => (text, None),
        };

        if mnemonic.eq_ignore_ascii_case(".slots") {
            let value = operand.ok_or_else(|| AssembleError::BadOperand {
                line,
                message: ".slots needs a count".to_string(),
            })?;
            slot_count = value.parse().map_err(|_| AssembleError::BadOperand {
                line,
                message: format!("bad slot count '{}'", value),
            })?;
            continue;
        }

        let mut opcode = lookup_mnemonic(mnemonic).ok_or_else(|| AssembleError::UnknownMnemonic {
            line,
            mnemonic: mnemonic.to_string(),
        })?;
        if opcode == Opcode::PushNumber {
            match operand {
                Some(op) if op.starts_with('"') => opcode = Opcode::PushString,
                Some(op) if op.starts_with('#') => opcode = Opcode::PushEntity,
                _ => {}
            }
        }
        pending.push(PendingLine {
            line,
            opcode,
            operand,
        });
    }

    // Second pass: operands
    let mut strings: IndexMap<String, u32> = IndexMap::new();
    let mut instructions = Vec::with_capacity(pending.len());
    for p in &pending {
        let operand = parse_operand(p, &labels, &mut strings)?;
        instructions.push(Instruction::new(p.opcode, operand));
    }

    debug!(
        "Assembled {} instructions, {} strings, {} labels",
        instructions.len(),
        strings.len(),
        labels.len()
    );
    let unit = CodeUnit::new(instructions, strings.into_keys().collect(), slot_count)?;
    Ok(unit)
}

fn parse_operand(
    p: &PendingLine<'_>,
    labels: &IndexMap<String, u32>,
    strings: &mut IndexMap<String, u32>,
) -> Result<Operand, AssembleError> {
    let line = p.line;
    let bad = |message: String| AssembleError::BadOperand { line, message };
    let layout = p.opcode.layout();

    let text = match (layout, p.operand) {
        (OperandLayout::None, None) => return Ok(Operand::None),
        (OperandLayout::None, Some(extra)) => {
            return Err(bad(format!("{} takes no operand, got '{}'", p.opcode.name(), extra)))
        }
        (_, None) => return Err(bad(format!("{} needs an operand", p.opcode.name()))),
        (_, Some(text)) => text,
    };

    match layout {
        OperandLayout::None => Ok(Operand::None),
        OperandLayout::CodeOffset => Ok(Operand::CodeOffset(resolve_target(line, text, labels)?)),
        OperandLayout::CallTarget => {
            let target = resolve_target(line, text, labels)?;
            let target = u16::try_from(target)
                .map_err(|_| bad(format!("call target {} does not fit in 16 bits", target)))?;
            Ok(Operand::CallTarget(target))
        }
        OperandLayout::Slot => {
            let digits = text.strip_prefix('$').unwrap_or(text);
            let slot = digits
                .parse()
                .map_err(|_| bad(format!("bad slot '{}'", text)))?;
            Ok(Operand::Slot(slot))
        }
        OperandLayout::Number => {
            let n: f32 = text
                .parse()
                .map_err(|_| bad(format!("bad number '{}'", text)))?;
            Ok(Operand::Number(n))
        }
        OperandLayout::Entity => {
            let digits = text
                .strip_prefix('#')
                .ok_or_else(|| bad(format!("entity literal must look like #N, got '{}'", text)))?;
            let handle = digits
                .parse()
                .map_err(|_| bad(format!("bad entity handle '{}'", text)))?;
            Ok(Operand::Entity(EntityHandle(handle)))
        }
        OperandLayout::StringIndex => {
            let value = parse_string_literal(text)
                .ok_or_else(|| bad(format!("bad string literal {}", text)))?;
            let next = strings.len() as u32;
            let index = *strings.entry(value).or_insert(next);
            Ok(Operand::StringIndex(index))
        }
    }
}

fn resolve_target(
    line: usize,
    text: &str,
    labels: &IndexMap<String, u32>,
) -> Result<u32, AssembleError> {
    let name = text.strip_prefix('@').unwrap_or(text);
    if let Ok(index) = name.parse::<u32>() {
        return Ok(index);
    }
    labels
        .get(name)
        .copied()
        .ok_or_else(|| AssembleError::UndefinedLabel {
            line,
            label: name.to_string(),
        })
}

/// Remove a trailing `;` comment that is not inside a string literal
fn strip_comment(line: &str) -> &str {
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in line.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            ';' if !in_string => return &line[..i],
            _ => {}
        }
    }
    line
}

/// Split `label: rest` into its parts
fn split_label(text: &str) -> Option<(&str, &str)> {
    if text.starts_with('"') {
        return None;
    }
    let head_end = text.find(char::is_whitespace).unwrap_or(text.len());
    let head = &text[..head_end];
    let label = head.strip_suffix(':')?;
    Some((label, &text[head_end..]))
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Parse a double-quoted literal with `\"`, `\\`, `\n` and `\t` escapes
fn parse_string_literal(text: &str) -> Option<String> {
    let inner = text.strip_prefix('"')?.strip_suffix('"')?;
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next()? {
                'n' => out.push('\n'),
                't' => out.push('\t'),
                '"' => out.push('"'),
                '\\' => out.push('\\'),
                _ => return None,
            },
            '"' => return None,
            c => out.push(c),
        }
    }
    Some(out)
}
