//! Bundled native extensions.

use indexmap::IndexMap;

use crate::emit::Operand;
use crate::error::MacroError;
use crate::extension::ExtensionRegistry;
use crate::value::{word, Value};

pub mod cpu;
pub mod display;
pub mod drivers;
pub mod mem;

pub fn register(registry: &mut ExtensionRegistry) {
    registry.register("mem", mem::module());
    registry.register("dev.cpu", cpu::module());
    registry.register("dev.display", display::module());
    registry.register("dev.drivers", drivers::module());
}

/// Positional argument `index`, or the keyword `name` when not given positionally.
pub(crate) fn argument<'a>(
    args: &'a [Value],
    kwargs: &'a IndexMap<String, Value>,
    index: usize,
    name: &str,
) -> Option<&'a Value> {
    args.get(index).or_else(|| kwargs.get(name))
}

pub(crate) fn required<'a>(
    args: &'a [Value],
    kwargs: &'a IndexMap<String, Value>,
    index: usize,
    name: &str,
) -> Result<&'a Value, MacroError> {
    argument(args, kwargs, index, name).ok_or_else(|| MacroError::new(format!("missing argument `{name}`")))
}

pub(crate) fn reject_extra(args: &[Value], max: usize) -> Result<(), MacroError> {
    if args.len() > max {
        return Err(MacroError::new(format!(
            "expected at most {max} arguments, found {}",
            args.len()
        )));
    }
    Ok(())
}

pub(crate) fn number(value: &Value, name: &str) -> Result<i64, MacroError> {
    value
        .as_number()
        .ok_or_else(|| MacroError::new(format!("`{name}` must be a number, found {}", value.kind())))
}

pub(crate) fn text<'a>(value: &'a Value, name: &str) -> Result<&'a str, MacroError> {
    value
        .as_text()
        .ok_or_else(|| MacroError::new(format!("`{name}` must be a string, found {}", value.kind())))
}

pub(crate) fn operand(value: &Value, name: &str) -> Result<Operand, MacroError> {
    value
        .to_operand()
        .ok_or_else(|| MacroError::new(format!("`{name}` cannot be used as an operand: {value}")))
}

/// `[location]` for a number, register or label.
pub(crate) fn memory(value: &Value, name: &str) -> Result<Operand, MacroError> {
    operand(value, name).map(Operand::mem)
}

/// Address `start + offset` as a literal memory operand.
pub(crate) fn address(start: i64, offset: usize) -> Result<Operand, MacroError> {
    let location = start + offset as i64;
    word(location)
        .filter(|_| location >= 0)
        .map(|addr| Operand::mem(Operand::Lit(addr)))
        .ok_or_else(|| MacroError::new(format!("address {location:#x} is out of range")))
}

/// Display cell: glyph in the low byte, foreground in bits 12..16 and
/// background in bits 8..12.
pub(crate) fn screen_word(ch: char, color: i64, highlight: i64) -> Result<u16, MacroError> {
    if !ch.is_ascii() {
        return Err(MacroError::new(format!("character {ch:?} has no display glyph")));
    }
    for (name, value) in [("color", color), ("highlight color", highlight)] {
        if !(0..16).contains(&value) {
            return Err(MacroError::new(format!("{name} {value} is not in 0..16")));
        }
    }
    Ok(ch as u16 | (color as u16) << 12 | (highlight as u16) << 8)
}
