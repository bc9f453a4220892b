use std::fmt;

use crate::emit::{Operand, Register};

/// Compile-time value: what constants hold and what macros receive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Number(i64),
    Text(String),
    Register(Register),
    /// Address of a labelled word, e.g. an extension's data cell.
    Label(String),
    Tuple(Vec<Value>),
    List(Vec<Value>),
    Map(Vec<(Value, Value)>),
}

impl Value {
    pub fn as_number(&self) -> Option<i64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }

    /// The value as an instruction operand, if it is one.
    pub fn to_operand(&self) -> Option<Operand> {
        match self {
            Value::Number(n) => word(*n).map(Operand::Lit),
            Value::Register(reg) => Some(Operand::Reg(*reg)),
            Value::Label(label) => Some(Operand::Label(label.clone())),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Text(_) => "string",
            Value::Register(_) => "register",
            Value::Label(_) => "label",
            Value::Tuple(_) => "tuple",
            Value::List(_) => "list",
            Value::Map(_) => "mapping",
        }
    }
}

/// Fits a literal into a machine word; negative values wrap to two's complement.
pub fn word(value: i64) -> Option<u16> {
    if (-0x8000..=0xffff).contains(&value) {
        Some(value as u16)
    } else {
        None
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{n}"),
            Value::Text(text) => write!(f, "{text:?}"),
            Value::Register(reg) => write!(f, "{reg}"),
            Value::Label(label) => f.write_str(label),
            Value::Tuple(items) => {
                write!(f, "(")?;
                write_items(f, items)?;
                if items.len() == 1 {
                    write!(f, ",")?;
                }
                write!(f, ")")
            }
            Value::List(items) => {
                write!(f, "[")?;
                write_items(f, items)?;
                write!(f, "]")
            }
            Value::Map(entries) => {
                write!(f, "{{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

fn write_items(f: &mut fmt::Formatter<'_>, items: &[Value]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}
