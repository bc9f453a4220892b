//! `dev.drivers`: hardware discovery.
//!
//! Importing the module calls an enumeration routine once. It walks every
//! attached device with `HWQ` and records the index of each known device in
//! that device's data word. Words of absent devices keep `0xffff`.

use crate::emit::{Emitter, Opcode, Operand, Register};
use crate::extension::NativeModule;
use crate::symbols::SymbolStore;

struct Device {
    data: &'static str,
    detected: &'static str,
    id_high: u16,
    id_low: u16,
}

const DEVICES: [Device; 6] = [
    Device {
        data: "generic_clock",
        detected: "clock_detected",
        id_high: 0x12d0,
        id_low: 0xb402,
    },
    Device {
        data: "floppy_drive",
        detected: "floppy_detected",
        id_high: 0x4fd5,
        id_low: 0x24c5,
    },
    Device {
        data: "generic_keyboard",
        detected: "keyboard_detected",
        id_high: 0x30cf,
        id_low: 0x7406,
    },
    Device {
        data: "display_monitor",
        detected: "monitor_detected",
        id_high: 0x7349,
        id_low: 0xf615,
    },
    Device {
        data: "sleep_chamber",
        detected: "chamber_detected",
        id_high: 0x30e4,
        id_low: 0x1d9d,
    },
    Device {
        data: "vector_display",
        detected: "vector_detected",
        id_high: 0x42ba,
        id_low: 0xbf3c,
    },
];

/// Registers clobbered by the routine (`HWQ` writes A, B, C, X and Y).
const CLOBBERED: [Register; 7] = [
    Register::A,
    Register::B,
    Register::C,
    Register::X,
    Register::Y,
    Register::I,
    Register::J,
];

pub fn module() -> NativeModule {
    let mut module = NativeModule::new();
    for device in &DEVICES {
        module = module.with_data_label(device.data);
    }
    module.with_init(|emitter, symbols| {
        let routine = symbols.expand_name("initialize");
        emitter.preserve(&CLOBBERED, |e| e.jsr(&routine));
        emitter.in_footer(|e| emit_routine(e, symbols, &routine));
        Ok(())
    })
}

fn emit_routine(emitter: &mut Emitter, symbols: &SymbolStore, routine: &str) {
    let loop_start = symbols.expand_name("loop_start");
    let next = symbols.expand_name("continue");

    emitter.write_label(routine);
    emitter.special(Opcode::Hwn, Register::I);
    emitter.set(Register::J, 0u16);
    emitter.write_label(&loop_start);
    emitter.binary(Opcode::Ife, Register::J, Register::I);
    emitter.return_from_subroutine();
    emitter.special(Opcode::Hwq, Register::J);
    for device in &DEVICES {
        emitter.binary(Opcode::Ife, Register::A, device.id_low);
        emitter.binary(Opcode::Ife, Register::B, device.id_high);
        emitter.goto(&symbols.expand_name(device.detected));
    }
    emitter.write_label(&next);
    emitter.binary(Opcode::Add, Register::J, 1u16);
    emitter.goto(&loop_start);

    for device in &DEVICES {
        let data = symbols.expand_name(device.data);
        emitter.write_label(&symbols.expand_name(device.detected));
        emitter.set(Operand::mem(Operand::label(data.as_str())), Register::J);
        emitter.goto(&next);
        emitter.write_label(&data);
        emitter.data(vec![Operand::Lit(0xffff)]);
    }
}

#[cfg(test)]
mod tests {
    use crate::symbols::NamespacePath;
    use crate::value::Value;

    use super::*;

    #[test]
    fn install_calls_enumeration_routine() {
        let mut emitter = Emitter::new();
        let mut symbols = SymbolStore::new();
        symbols
            .with_namespace(NamespacePath::parse("dev.drivers"), |symbols| {
                module().install(&mut emitter, symbols)
            })
            .expect("install");

        let body: Vec<String> = emitter.body().iter().map(ToString::to_string).collect();
        assert_eq!(body.len(), 15);
        assert_eq!(body[7], "JSR dev__drivers__initialize");

        let footer: Vec<String> = emitter.footer().iter().map(ToString::to_string).collect();
        assert!(footer.contains(&":dev__drivers__initialize".to_string()));
        assert!(footer.contains(&"SET [dev__drivers__display_monitor], J".to_string()));
        assert_eq!(
            footer.iter().filter(|line| line.as_str() == "DAT 0xffff").count(),
            DEVICES.len()
        );

        assert_eq!(
            symbols.constant_in(&NamespacePath::parse("dev.drivers"), "generic_keyboard"),
            Some(&Value::Label("dev__drivers__generic_keyboard".to_string()))
        );
    }
}
