//! The value model (C2): a uniform dynamically-typed value that scalars,
//! objects, row sources and wrapped lists all funnel through before the
//! interpreter formats or escapes them.

use std::fmt;
use std::rc::Rc;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

/// A capability handle for caller-provided record-like objects.
///
/// The reflective bridge to the host object graph is the one
/// implementation-specific adapter in the whole engine: everything else
/// operates purely on [`Value`].
pub trait Object {
    /// Look up a single field/property by name. `None` means the field
    /// does not exist on this object (distinct from it existing and
    /// holding `Value::Empty`).
    fn get(&self, name: &str) -> Option<Value>;
}

/// A capability handle for tabular data: named, typed columns and a
/// current cursor position.
pub trait RowSource {
    /// Value of `column` at the current cursor position.
    fn column(&self, column: &str) -> Option<Value>;
    /// Number of rows.
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    /// Move the cursor. `position` is 0-based.
    fn seek(&self, position: usize);
    fn position(&self) -> usize;
}

/// A capability handle replacing the duck-typed `Add/Clear/Count/GetItem`
/// probe: anything that can report its length and hand back an element by
/// index is iterable.
pub trait WrappedList {
    fn count(&self) -> usize;
    fn item(&self, index: usize) -> Option<Value>;
}

/// The uniform value every variable, loop element, and filter result is
/// expressed as.
#[derive(Clone)]
pub enum Value {
    Empty,
    Integer(i64),
    Float(f64),
    Boolean(bool),
    String(Rc<str>),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Time(NaiveTime),
    /// Fixed-point currency amount stored as minor units (e.g. cents).
    Currency(i64),
    /// Binary-coded-decimal-style exact decimal, stored as a string of
    /// digits plus a scale, mirroring the source engine's BCD scalar.
    Bcd { digits: Rc<str>, scale: u8 },
    Object(Rc<dyn Object>),
    RowSource(Rc<dyn RowSource>),
    WrappedList(Rc<dyn WrappedList>),
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Empty => write!(f, "Empty"),
            Value::Integer(v) => write!(f, "Integer({v})"),
            Value::Float(v) => write!(f, "Float({v})"),
            Value::Boolean(v) => write!(f, "Boolean({v})"),
            Value::String(v) => write!(f, "String({v:?})"),
            Value::Date(v) => write!(f, "Date({v})"),
            Value::DateTime(v) => write!(f, "DateTime({v})"),
            Value::Time(v) => write!(f, "Time({v})"),
            Value::Currency(v) => write!(f, "Currency({v})"),
            Value::Bcd { digits, scale } => write!(f, "Bcd({digits}, scale={scale})"),
            Value::Object(_) => write!(f, "Object(..)"),
            Value::RowSource(_) => write!(f, "RowSource(..)"),
            Value::WrappedList(_) => write!(f, "WrappedList(..)"),
        }
    }
}

impl Value {
    pub fn string(s: impl Into<Rc<str>>) -> Value {
        Value::String(s.into())
    }

    /// Whether this is a scalar variant that can meaningfully be
    /// "missing" — mirrors the source's nullable-wrapper capability.
    pub fn has_value(&self) -> bool {
        !matches!(self, Value::Empty)
    }

    /// Whether this value can be iterated by a `for` loop or `@@index`
    /// family of pseudo-variables.
    pub fn is_iterable(&self) -> bool {
        matches!(self, Value::WrappedList(_) | Value::RowSource(_))
    }

    pub fn len(&self) -> Option<usize> {
        match self {
            Value::WrappedList(list) => Some(list.count()),
            Value::RowSource(rows) => Some(rows.len()),
            _ => None,
        }
    }

    /// §4.3 truthiness: `Empty` is false, `Boolean` is itself, everything
    /// else is false iff its string form is (case-insensitively) `"false"`,
    /// `"0"`, or empty.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Empty => false,
            Value::Boolean(b) => *b,
            other => {
                let s = other.to_display_string();
                !(s.is_empty() || s.eq_ignore_ascii_case("false") || s == "0")
            }
        }
    }

    /// Render the value as plain text, with no locale-sensitive
    /// formatting and no escaping. Used both for truthiness and as a
    /// default `Display` fallback; real output formatting goes through
    /// [`crate::format::format_value`].
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Empty => String::new(),
            Value::Integer(v) => v.to_string(),
            Value::Float(v) => v.to_string(),
            Value::Boolean(v) => v.to_string(),
            Value::String(v) => v.to_string(),
            Value::Date(v) => v.to_string(),
            Value::DateTime(v) => v.to_string(),
            Value::Time(v) => v.to_string(),
            Value::Currency(minor) => format!("{}.{:02}", minor / 100, (minor % 100).abs()),
            Value::Bcd { digits, .. } => digits.to_string(),
            Value::Object(_) => String::new(),
            Value::RowSource(_) => String::new(),
            Value::WrappedList(_) => String::new(),
        }
    }

    /// Descend one path segment: object field, list index, or row-source
    /// column. Returns `None` on a miss, which the interpreter treats as
    /// "ask the unresolved-lookup callback".
    pub fn get_member(&self, member: &str) -> Option<Value> {
        if let Some(index) = parse_bracket_index(member) {
            return match self {
                Value::WrappedList(list) => list.item(index),
                _ => None,
            };
        }
        match self {
            Value::Object(obj) => obj.get(member),
            Value::RowSource(rows) => rows.column(member),
            _ => None,
        }
    }
}

/// Parse a bare `[N]` path segment into its integer index.
pub fn parse_bracket_index(segment: &str) -> Option<usize> {
    let inner = segment.strip_prefix('[')?.strip_suffix(']')?;
    inner.parse::<usize>().ok()
}
