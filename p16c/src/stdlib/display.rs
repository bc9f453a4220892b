//! `dev.display`: static text on the memory-mapped display.
//!
//! `configure` stores default colours in the namespace configuration;
//! `write_static` falls back to them when called without explicit colours.

use crate::error::MacroError;
use crate::extension::NativeModule;
use crate::value::Value;

use super::{address, argument, number, reject_extra, required, screen_word, text};

const COLORS: [&str; 16] = [
    "color_black",
    "color_dark_blue",
    "color_green",
    "color_teal",
    "color_purple",
    "color_dark_red",
    "color_brown",
    "color_light_gray",
    "color_gray",
    "color_blue",
    "color_light_green",
    "color_light_blue",
    "color_red",
    "color_pink",
    "color_yellow",
    "color_white",
];

pub fn module() -> NativeModule {
    let mut module = NativeModule::new()
        .with_macro("configure", |_, symbols, args, kwargs| {
            reject_extra(args, 0)?;
            for (key, value) in kwargs {
                symbols.set_config(key.as_str(), value.clone());
            }
            Ok(())
        })
        .with_macro("write_static", |emitter, symbols, args, kwargs| {
            reject_extra(args, 4)?;
            let text = text(required(args, kwargs, 0, "text")?, "text")?;
            let location = number(required(args, kwargs, 1, "location")?, "location")?;
            let mut colors = [0i64; 2];
            for (slot, (index, key)) in colors.iter_mut().zip([(2, "color"), (3, "highlight_color")]) {
                let value = argument(args, kwargs, index, key)
                    .or_else(|| symbols.get_config(key))
                    .ok_or_else(|| MacroError::new(format!("no `{key}` given or configured")))?;
                *slot = number(value, key)?;
            }
            for (offset, ch) in text.chars().enumerate() {
                let cell = screen_word(ch, colors[0], colors[1])?;
                emitter.set(address(location, offset)?, cell);
            }
            Ok(())
        });
    for (value, name) in COLORS.iter().enumerate() {
        module = module.with_constant(name, Value::Number(value as i64));
    }
    module
}
