//! Constant values.
//!
//! Everything the compiler evaluates ahead of time ends up as a [`Value`] in
//! a unit's constant pool. Payloads are `Arc`-shared so compiled units can be
//! handed to other threads.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::ast::QuantityPart;
use crate::compiler::bytecode::{CompiledFunction, UnitId};

/// A compile-time constant.
#[derive(Debug, Clone)]
pub enum Value {
    /// nil
    Nil,
    /// Boolean
    Bool(bool),
    /// 64-bit integer
    Int(i64),
    /// 64-bit float
    Float(f64),
    /// Unicode scalar
    Rune(char),
    /// String (also used for names: properties, globals, patterns)
    Str(Arc<str>),
    /// Duration, byte count or ratio
    Quantity(Quantity),
    /// Integer range
    IntRange(IntRange),
    /// Filesystem path
    Path(Arc<str>),
    /// Parsed URL
    Url(Arc<url::Url>),
    /// Compiled regular expression
    Regex(Arc<regex::Regex>),
    /// Immutable tuple
    Tuple(Arc<[Value]>),
    /// Immutable record
    Record(Arc<[(String, Value)]>),
    /// Compiled function
    Function(Arc<CompiledFunction>),
    /// Embedded bytecode unit
    Unit(UnitId),
    /// Pre-built string pattern
    Pattern(Arc<PrebuiltPattern>),
    /// Capture group names of a sequence pattern, one per element
    GroupNames(Arc<[Option<String>]>),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Rune(a), Value::Rune(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Quantity(a), Value::Quantity(b)) => a == b,
            (Value::IntRange(a), Value::IntRange(b)) => a == b,
            (Value::Path(a), Value::Path(b)) => a == b,
            (Value::Url(a), Value::Url(b)) => a == b,
            (Value::Regex(a), Value::Regex(b)) => a.as_str() == b.as_str(),
            (Value::Tuple(a), Value::Tuple(b)) => a == b,
            (Value::Record(a), Value::Record(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => Arc::ptr_eq(a, b),
            (Value::Unit(a), Value::Unit(b)) => a == b,
            (Value::Pattern(a), Value::Pattern(b)) => a == b,
            (Value::GroupNames(a), Value::GroupNames(b)) => a == b,
            _ => false,
        }
    }
}

impl Value {
    /// Creates a string value.
    pub fn string(s: &str) -> Self {
        Value::Str(Arc::from(s))
    }

    /// Returns the string payload of a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the compiled function of a function value.
    pub fn as_function(&self) -> Option<&CompiledFunction> {
        match self {
            Value::Function(f) => Some(f),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(n) => write!(f, "{:?}", n),
            Value::Rune(c) => write!(f, "{:?}", c),
            Value::Str(s) => write!(f, "{:?}", s),
            Value::Quantity(q) => write!(f, "{}", q),
            Value::IntRange(r) => write!(f, "{}", r),
            Value::Path(p) => write!(f, "{}", p),
            Value::Url(u) => write!(f, "{}", u),
            Value::Regex(r) => write!(f, "%`{}`", r.as_str()),
            Value::Tuple(items) => {
                write!(f, "#[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Record(entries) => {
                write!(f, "#{{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                write!(f, "}}")
            }
            Value::Function(func) => write!(
                f,
                "<fn params={} locals={} len={}>",
                func.param_count,
                func.local_count,
                func.instructions.len()
            ),
            Value::Unit(id) => write!(f, "<unit {}>", id),
            Value::Pattern(p) => write!(f, "{}", p),
            Value::GroupNames(names) => {
                write!(f, "<groups")?;
                for name in names.iter() {
                    write!(f, " {}", name.as_deref().unwrap_or("_"))?;
                }
                write!(f, ">")
            }
        }
    }
}

/// An integer range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntRange {
    /// First value
    pub start: i64,
    /// Last value (or one past it when exclusive)
    pub end: i64,
    /// Whether `end` is part of the range
    pub inclusive: bool,
}

impl IntRange {
    /// Number of values in the range.
    pub fn len(&self) -> u64 {
        let last = if self.inclusive { self.end } else { self.end - 1 };
        if last < self.start {
            0
        } else {
            (last - self.start) as u64 + 1
        }
    }

    /// Returns true if the range contains no value.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for IntRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = if self.inclusive { ".." } else { "..<" };
        write!(f, "{}{}{}", self.start, op, self.end)
    }
}

/// A quantity literal, evaluated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Quantity {
    /// Time duration
    Duration(Duration),
    /// Number of bytes
    ByteCount(u64),
    /// Ratio (50% is 0.5)
    Ratio(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dimension {
    Time,
    Bytes,
    Ratio,
}

fn unit_scale(unit: &str) -> Option<(Dimension, f64)> {
    let scale = match unit {
        "ns" => (Dimension::Time, 1e-9),
        "us" | "µs" => (Dimension::Time, 1e-6),
        "ms" => (Dimension::Time, 1e-3),
        "s" => (Dimension::Time, 1.0),
        "min" => (Dimension::Time, 60.0),
        "h" => (Dimension::Time, 3600.0),
        "d" => (Dimension::Time, 86400.0),
        "B" => (Dimension::Bytes, 1.0),
        "kB" => (Dimension::Bytes, 1e3),
        "MB" => (Dimension::Bytes, 1e6),
        "GB" => (Dimension::Bytes, 1e9),
        "TB" => (Dimension::Bytes, 1e12),
        "%" => (Dimension::Ratio, 0.01),
        _ => return None,
    };
    Some(scale)
}

impl Quantity {
    /// Evaluates the parts of a quantity literal, e.g. `1h30min`.
    ///
    /// All parts must share one dimension.
    pub fn from_parts(parts: &[QuantityPart]) -> Result<Quantity, String> {
        let mut dimension = None;
        let mut total = 0.0;
        for part in parts {
            let (dim, scale) =
                unit_scale(&part.unit).ok_or_else(|| format!("unknown unit '{}'", part.unit))?;
            if dimension.is_some_and(|d| d != dim) {
                return Err(format!("unit '{}' mixes dimensions", part.unit));
            }
            dimension = Some(dim);
            total += part.value * scale;
        }

        match dimension {
            None => Err("empty quantity".to_string()),
            Some(Dimension::Time) => Duration::try_from_secs_f64(total)
                .map(Quantity::Duration)
                .map_err(|e| e.to_string()),
            Some(Dimension::Bytes) => {
                if total < 0.0 || total.fract() != 0.0 {
                    Err(format!("{} is not a whole number of bytes", total))
                } else {
                    Ok(Quantity::ByteCount(total as u64))
                }
            }
            Some(Dimension::Ratio) => Ok(Quantity::Ratio(total)),
        }
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quantity::Duration(d) => write!(f, "{:?}", d),
            Quantity::ByteCount(n) => write!(f, "{}B", n),
            Quantity::Ratio(r) => write!(f, "{}%", r * 100.0),
        }
    }
}

/// A string pattern the compiler builds ahead of time.
#[derive(Debug, Clone)]
pub enum PrebuiltPattern {
    /// Matches exactly one string
    Exact(String),
    /// Matches one rune in the inclusive range
    RuneRange {
        /// Lower bound
        start: char,
        /// Upper bound
        end: char,
    },
    /// Matches the whole string against a regex
    Regex(regex::Regex),
}

impl PartialEq for PrebuiltPattern {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (PrebuiltPattern::Exact(a), PrebuiltPattern::Exact(b)) => a == b,
            (
                PrebuiltPattern::RuneRange { start: a, end: b },
                PrebuiltPattern::RuneRange { start: c, end: d },
            ) => a == c && b == d,
            (PrebuiltPattern::Regex(a), PrebuiltPattern::Regex(b)) => a.as_str() == b.as_str(),
            _ => false,
        }
    }
}

impl fmt::Display for PrebuiltPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrebuiltPattern::Exact(s) => write!(f, "%{:?}", s),
            PrebuiltPattern::RuneRange { start, end } => write!(f, "%({:?}..{:?})", start, end),
            PrebuiltPattern::Regex(r) => write!(f, "%`{}`", r.as_str()),
        }
    }
}
