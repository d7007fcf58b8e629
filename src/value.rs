/// Tagged values carried on the script value stack and in memory slots
///
/// A value is exactly one of Number, String or Entity. Operators are only
/// defined between like-kinded operands; the compiler guarantees this, so
/// a mismatch at runtime surfaces as a `ScriptError::TypeMismatch` that the
/// dispatcher turns into an error interrupt.
///
/// Number is the sole boolean carrier: anything below 1.0 is false.
use crate::error::ScriptError;
use std::cmp::Ordering;
use std::fmt;

/// Opaque handle naming a world entity. Handle 0 is the null entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct EntityHandle(pub u16);

impl EntityHandle {
    pub const NULL: EntityHandle = EntityHandle(0);

    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for EntityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub enum StackValue {
    Number(f32),
    String(String),
    Entity(EntityHandle),
}

impl StackValue {
    pub const TRUE: StackValue = StackValue::Number(1.0);
    pub const FALSE: StackValue = StackValue::Number(0.0);

    pub fn from_bool(b: bool) -> Self {
        if b {
            StackValue::TRUE
        } else {
            StackValue::FALSE
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            StackValue::Number(_) => "number",
            StackValue::String(_) => "string",
            StackValue::Entity(_) => "entity",
        }
    }

    fn mismatch(&self, expected: &'static str) -> ScriptError {
        ScriptError::TypeMismatch {
            expected,
            found: self.kind_name(),
        }
    }

    pub fn as_number(&self) -> Result<f32, ScriptError> {
        match self {
            StackValue::Number(n) => Ok(*n),
            other => Err(other.mismatch("number")),
        }
    }

    pub fn as_entity(&self) -> Result<EntityHandle, ScriptError> {
        match self {
            StackValue::Entity(h) => Ok(*h),
            other => Err(other.mismatch("entity")),
        }
    }

    pub fn as_str(&self) -> Result<&str, ScriptError> {
        match self {
            StackValue::String(s) => Ok(s),
            other => Err(other.mismatch("string")),
        }
    }

    pub fn into_string(self) -> Result<String, ScriptError> {
        match self {
            StackValue::String(s) => Ok(s),
            other => Err(other.mismatch("string")),
        }
    }

    /// Truthiness: a Number at or above 1.0 is true.
    pub fn is_true(&self) -> Result<bool, ScriptError> {
        Ok(self.as_number()? >= 1.0)
    }

    pub fn add(&self, rhs: &StackValue) -> Result<StackValue, ScriptError> {
        match (self, rhs) {
            (StackValue::Number(a), StackValue::Number(b)) => Ok(StackValue::Number(a + b)),
            (StackValue::String(a), StackValue::String(b)) => {
                Ok(StackValue::String(format!("{a}{b}")))
            }
            (StackValue::Number(_), other) => Err(other.mismatch("number")),
            (StackValue::String(_), other) => Err(other.mismatch("string")),
            (other, _) => Err(other.mismatch("number")),
        }
    }

    pub fn sub(&self, rhs: &StackValue) -> Result<StackValue, ScriptError> {
        Ok(StackValue::Number(self.as_number()? - rhs.as_number()?))
    }

    pub fn mul(&self, rhs: &StackValue) -> Result<StackValue, ScriptError> {
        Ok(StackValue::Number(self.as_number()? * rhs.as_number()?))
    }

    /// Division does not check for zero; callers decide how to signal it.
    pub fn div(&self, rhs: &StackValue) -> Result<StackValue, ScriptError> {
        Ok(StackValue::Number(self.as_number()? / rhs.as_number()?))
    }

    /// Floating remainder, sign follows the dividend.
    pub fn rem(&self, rhs: &StackValue) -> Result<StackValue, ScriptError> {
        Ok(StackValue::Number(self.as_number()? % rhs.as_number()?))
    }

    pub fn neg(&self) -> Result<StackValue, ScriptError> {
        Ok(StackValue::Number(-self.as_number()?))
    }

    /// Number to String: integral values print without a decimal point.
    pub fn to_string_value(&self) -> Result<StackValue, ScriptError> {
        Ok(StackValue::String(format_number(self.as_number()?)))
    }

    /// String to Number with permissive parsing; unparseable text is 0.
    pub fn to_number_value(&self) -> Result<StackValue, ScriptError> {
        Ok(StackValue::Number(parse_number(self.as_str()?)))
    }

    /// Equality that refuses mixed kinds instead of answering false.
    pub fn equals(&self, rhs: &StackValue) -> Result<bool, ScriptError> {
        if std::mem::discriminant(self) != std::mem::discriminant(rhs) {
            return Err(rhs.mismatch(self.kind_name()));
        }
        Ok(self == rhs)
    }

    /// Ordering that refuses mixed kinds. Entities have no order.
    pub fn compare(&self, rhs: &StackValue) -> Result<Option<Ordering>, ScriptError> {
        match (self, rhs) {
            (StackValue::Number(_), StackValue::Number(_))
            | (StackValue::String(_), StackValue::String(_)) => Ok(self.partial_cmp(rhs)),
            (StackValue::Entity(_), _) => Err(self.mismatch("number")),
            (_, other) => Err(other.mismatch(self.kind_name())),
        }
    }
}

/// Strings compare case-insensitively, entities by identity.
impl PartialEq for StackValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (StackValue::Number(a), StackValue::Number(b)) => a == b,
            (StackValue::String(a), StackValue::String(b)) => {
                a.to_lowercase() == b.to_lowercase()
            }
            (StackValue::Entity(a), StackValue::Entity(b)) => a == b,
            _ => false,
        }
    }
}

impl PartialOrd for StackValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (StackValue::Number(a), StackValue::Number(b)) => a.partial_cmp(b),
            (StackValue::String(a), StackValue::String(b)) => {
                Some(a.to_lowercase().cmp(&b.to_lowercase()))
            }
            _ => None,
        }
    }
}

impl fmt::Display for StackValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StackValue::Number(n) => write!(f, "{}", format_number(*n)),
            StackValue::String(s) => write!(f, "{s:?}"),
            StackValue::Entity(h) => write!(f, "{h}"),
        }
    }
}

impl From<f32> for StackValue {
    fn from(n: f32) -> Self {
        StackValue::Number(n)
    }
}

impl From<&str> for StackValue {
    fn from(s: &str) -> Self {
        StackValue::String(s.to_string())
    }
}

impl From<String> for StackValue {
    fn from(s: String) -> Self {
        StackValue::String(s)
    }
}

impl From<EntityHandle> for StackValue {
    fn from(h: EntityHandle) -> Self {
        StackValue::Entity(h)
    }
}

pub fn format_number(n: f32) -> String {
    if n.is_finite() && n.fract() == 0.0 {
        if n == 0.0 {
            // avoids "-0"
            return "0".to_string();
        }
        format!("{n:.0}")
    } else {
        format!("{n}")
    }
}

/// Parse the longest numeric prefix of `text` after leading whitespace.
pub fn parse_number(text: &str) -> f32 {
    let s = text.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;

    if end < bytes.len() && (bytes[end] == b'+' || bytes[end] == b'-') {
        end += 1;
    }
    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;
    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        if digits > 0 {
            end = frac_end;
        }
    }
    if digits == 0 {
        return 0.0;
    }
    // exponent only counts when followed by at least one digit
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && (bytes[exp_end] == b'+' || bytes[exp_end] == b'-') {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    s[..end].parse::<f32>().unwrap_or(0.0)
}
