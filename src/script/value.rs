//! Runtime values of the script engine.

use std::fmt;
use std::path::PathBuf;
use std::rc::Rc;

use crate::script::ast::FunctionDef;
use crate::script::error::ErrorKind;
use crate::script::interp::Interpreter;
use crate::script::namespace::Namespace;

pub type BuiltinFn = fn(&mut Interpreter, Vec<Value>) -> Result<Value, ErrorKind>;

#[derive(Clone, Copy)]
pub struct Builtin {
    pub name: &'static str,
    pub func: BuiltinFn,
}

/// A user-defined function, closed over the namespace and file it was defined in.
pub struct Function {
    pub def: Rc<FunctionDef>,
    pub module: Rc<Namespace>,
    pub file: Option<PathBuf>,
}

/// The testing macros exported by the built-in `Test` module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacroKind {
    Test,
    TestThrows,
    TestSet,
}

impl MacroKind {
    pub fn name(self) -> &'static str {
        match self {
            MacroKind::Test => "@test",
            MacroKind::TestThrows => "@test_throws",
            MacroKind::TestSet => "@testset",
        }
    }
}

#[derive(Clone)]
pub enum Value {
    Nothing,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    Array(Rc<Vec<Value>>),
    Range(i64, i64),
    Function(Rc<Function>),
    Builtin(Builtin),
    Module(Rc<Namespace>),
    Macro(MacroKind),
}

impl Value {
    pub fn str(s: impl AsRef<str>) -> Self {
        Value::Str(Rc::from(s.as_ref()))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nothing => "Nothing",
            Value::Bool(_) => "Bool",
            Value::Int(_) => "Int64",
            Value::Float(_) => "Float64",
            Value::Str(_) => "String",
            Value::Array(_) => "Vector",
            Value::Range(..) => "UnitRange",
            Value::Function(_) | Value::Builtin(_) => "Function",
            Value::Module(_) => "Module",
            Value::Macro(_) => "Macro",
        }
    }

    /// Conditions must be `Bool`; anything else is a type error.
    pub fn as_bool(&self, context: &str) -> Result<bool, ErrorKind> {
        match self {
            Value::Bool(b) => Ok(*b),
            other => Err(ErrorKind::Type(format!(
                "non-boolean ({}) used in {context}",
                other.type_name()
            ))),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Lazily yields the elements of an iterable value, or `None` if it is not iterable.
    pub fn elements(&self) -> Option<Elements> {
        match self {
            Value::Array(items) => Some(Elements::Array {
                items: items.clone(),
                next: 0,
            }),
            Value::Range(lo, hi) => Some(Elements::Range {
                next: *lo,
                hi: *hi,
                done: lo > hi,
            }),
            Value::Str(text) => Some(Elements::Chars {
                text: text.clone(),
                offset: 0,
            }),
            _ => None,
        }
    }

    /// Number of elements of an iterable value. Ranges are measured arithmetically,
    /// so `typemin(Int64):typemax(Int64)` has a length even though it is not an `Int64`.
    pub fn element_count(&self) -> Option<u128> {
        match self {
            Value::Array(items) => Some(items.len() as u128),
            Value::Range(lo, hi) => Some(range_len(*lo, *hi)),
            Value::Str(text) => Some(text.chars().count() as u128),
            _ => None,
        }
    }

    /// The 1-based `index`-th element, without materializing ranges or strings.
    pub fn element_at(&self, index: i64) -> Option<Value> {
        let offset = usize::try_from(index).ok()?.checked_sub(1)?;
        match self {
            Value::Array(items) => items.get(offset).cloned(),
            Value::Range(lo, hi) => {
                let value = i128::from(*lo) + offset as i128;
                (value <= i128::from(*hi))
                    .then(|| i64::try_from(value).ok())
                    .flatten()
                    .map(Value::Int)
            }
            Value::Str(text) => text.chars().nth(offset).map(char_value),
            _ => None,
        }
    }

    /// Structural equality with numeric promotion (`1 == 1.0`).
    pub fn equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Nothing, Value::Nothing) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Range(a, b), Value::Range(c, d)) => a == c && b == d,
            (Value::Array(_) | Value::Range(..), Value::Array(_) | Value::Range(..)) => {
                if self.element_count() != other.element_count() {
                    return false;
                }
                match (self.elements(), other.elements()) {
                    (Some(a), Some(b)) => a.zip(b).all(|(x, y)| x.equals(&y)),
                    _ => false,
                }
            }
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Builtin(a), Value::Builtin(b)) => a.name == b.name,
            (Value::Module(a), Value::Module(b)) => Rc::ptr_eq(a, b),
            (Value::Macro(a), Value::Macro(b)) => a == b,
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x == y,
                _ => false,
            },
        }
    }

    /// Source-like rendering: strings quoted, used in test descriptions.
    pub fn repr(&self) -> String {
        match self {
            Value::Str(s) => format!("{:?}", s.as_ref()),
            Value::Array(items) => {
                let inner: Vec<String> = items.iter().map(Value::repr).collect();
                format!("[{}]", inner.join(", "))
            }
            other => other.to_string(),
        }
    }
}

/// Length of `lo:hi`; empty when `hi < lo`.
pub fn range_len(lo: i64, hi: i64) -> u128 {
    if hi < lo {
        0
    } else {
        (i128::from(hi) - i128::from(lo) + 1) as u128
    }
}

fn char_value(c: char) -> Value {
    let mut buf = [0u8; 4];
    Value::str(c.encode_utf8(&mut buf))
}

/// Iterator returned by [`Value::elements`].
pub enum Elements {
    Array { items: Rc<Vec<Value>>, next: usize },
    Range { next: i64, hi: i64, done: bool },
    Chars { text: Rc<str>, offset: usize },
}

impl Iterator for Elements {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        match self {
            Elements::Array { items, next } => {
                let item = items.get(*next).cloned()?;
                *next += 1;
                Some(item)
            }
            Elements::Range { next, hi, done } => {
                if *done {
                    return None;
                }
                let value = *next;
                if value == *hi {
                    *done = true;
                } else {
                    *next += 1;
                }
                Some(Value::Int(value))
            }
            Elements::Chars { text, offset } => {
                let c = text[*offset..].chars().next()?;
                *offset += c.len_utf8();
                Some(char_value(c))
            }
        }
    }
}

fn format_float(f: f64) -> String {
    if f.is_nan() {
        "NaN".to_string()
    } else if f.is_infinite() {
        if f > 0.0 { "Inf".to_string() } else { "-Inf".to_string() }
    } else if f.fract() == 0.0 && f.abs() < 1e16 {
        format!("{f:.1}")
    } else {
        format!("{f}")
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nothing => write!(f, "nothing"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{}", format_float(*x)),
            Value::Str(s) => write!(f, "{s}"),
            Value::Array(_) => write!(f, "{}", self.repr()),
            Value::Range(lo, hi) => write!(f, "{lo}:{hi}"),
            Value::Function(func) => write!(f, "{}", func.def.name),
            Value::Builtin(b) => write!(f, "{}", b.name),
            Value::Module(m) => write!(f, "{}", m.name()),
            Value::Macro(kind) => write!(f, "{}", kind.name()),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.repr(), self.type_name())
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other)
    }
}
