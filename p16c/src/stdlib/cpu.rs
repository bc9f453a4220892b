//! `dev.cpu`: hardware interrupts.

use crate::emit::{Opcode, Operand, Register};
use crate::extension::NativeModule;
use crate::value::Value;

use super::{operand, reject_extra, required};

pub fn module() -> NativeModule {
    NativeModule::new().with_macro("interrupt", |emitter, _, args, kwargs| {
        reject_extra(args, 2)?;
        let hardware = match required(args, kwargs, 0, "hardware")? {
            // A label names the word a driver stored the device index in.
            Value::Label(label) => Operand::mem(Operand::label(label.as_str())),
            other => operand(other, "hardware")?,
        };
        let message = operand(required(args, kwargs, 1, "message")?, "message")?;
        emitter.preserve(&[Register::A], |e| {
            e.set(Register::A, message);
            e.special(Opcode::Hwi, hardware);
        });
        Ok(())
    })
}
