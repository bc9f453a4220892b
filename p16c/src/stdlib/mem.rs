//! `mem`: raw memory writes.

use crate::extension::NativeModule;

use super::{address, memory, number, operand, reject_extra, required, screen_word, text};

pub fn module() -> NativeModule {
    NativeModule::new()
        .with_macro("set", |emitter, _, args, kwargs| {
            reject_extra(args, 2)?;
            let location = memory(required(args, kwargs, 0, "location")?, "location")?;
            let value = operand(required(args, kwargs, 1, "value")?, "value")?;
            emitter.set(location, value);
            Ok(())
        })
        .with_macro("set_string", |emitter, _, args, kwargs| {
            reject_extra(args, 4)?;
            let start = number(required(args, kwargs, 0, "start")?, "start")?;
            let text = text(required(args, kwargs, 1, "text")?, "text")?;
            let color = number(required(args, kwargs, 2, "color")?, "color")?;
            let highlight = number(required(args, kwargs, 3, "highlight_color")?, "highlight_color")?;
            for (offset, ch) in text.chars().enumerate() {
                let cell = screen_word(ch, color, highlight)?;
                emitter.set(address(start, offset)?, cell);
            }
            Ok(())
        })
}

#[cfg(test)]
mod tests {
    use indexmap::IndexMap;

    use crate::emit::{Emitter, Register};
    use crate::symbols::SymbolStore;
    use crate::value::Value;

    use super::*;

    fn body(emitter: &Emitter) -> Vec<String> {
        emitter.body().iter().map(ToString::to_string).collect()
    }

    #[test]
    fn set_writes_through_memory_operand() {
        let module = module();
        let mut emitter = Emitter::new();
        let mut symbols = SymbolStore::new();
        module.install(&mut emitter, &mut symbols).expect("install");
        let set = symbols.get_macro("set").cloned().expect("macro");
        set.invoke(
            &mut emitter,
            &mut symbols,
            &[Value::Register(Register::I), Value::Number(7)],
            &IndexMap::new(),
        )
        .expect("invoke");
        assert_eq!(body(&emitter), vec!["SET [I], 0x0007"]);
    }

    #[test]
    fn set_string_writes_one_cell_per_character() {
        let module = module();
        let mut emitter = Emitter::new();
        let mut symbols = SymbolStore::new();
        module.install(&mut emitter, &mut symbols).expect("install");
        let set_string = symbols.get_macro("set_string").cloned().expect("macro");
        set_string
            .invoke(
                &mut emitter,
                &mut symbols,
                &[
                    Value::Number(0x8000),
                    Value::Text("hi".to_string()),
                    Value::Number(15),
                    Value::Number(0),
                ],
                &IndexMap::new(),
            )
            .expect("invoke");
        assert_eq!(body(&emitter), vec!["SET [0x8000], 0xf068", "SET [0x8001], 0xf069"]);
    }
}
