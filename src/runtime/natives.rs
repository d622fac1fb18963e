use crate::runtime::{interpreter::Interpreter, platform::Platform, value::Value};
use std::rc::Rc;

/// Installs `clock` and `date` into the interpreter's globals.
pub fn register_std(interpreter: &mut Interpreter, platform: Rc<dyn Platform>) {
    let clock_platform = Rc::clone(&platform);
    interpreter.define_native("clock", 0, move |_, _| {
        Ok(Value::String(
            clock_platform.now().format("%H:%M:%S").to_string(),
        ))
    });

    interpreter.define_native("date", 0, move |_, _| {
        Ok(Value::String(platform.now().format("%Y-%b-%d").to_string()))
    });
}
