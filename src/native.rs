//! Host functions available to every program.

use std::time::Instant;

use log::debug;

use crate::value::{NativeFunction, Value};

/// `clock()`: seconds elapsed since `started`, as a number.
pub fn clock(started: Instant) -> NativeFunction {
    NativeFunction::new("clock", 0, move |_args: &[Value]| {
        let elapsed: f64 = started.elapsed().as_secs_f64();

        debug!("Native function 'clock' returned: {}", elapsed);

        Ok(Value::Number(elapsed))
    })
}

/// Every native installed into a fresh interpreter's global frame.
pub fn standard_library(started: Instant) -> Vec<NativeFunction> {
    vec![clock(started)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_is_monotonic_and_nullary() {
        let native = clock(Instant::now());
        assert_eq!(native.arity, 0);

        let Ok(Value::Number(first)) = (native.func)(&[]) else {
            panic!("clock must return a number");
        };
        let Ok(Value::Number(second)) = (native.func)(&[]) else {
            panic!("clock must return a number");
        };
        assert!(first >= 0.0);
        assert!(second >= first);
    }
}
