//! A small harness binary: `cargo run --example arithmetic -- --verbose`.

use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use verdict::prelude::*;

fn checked_div(a: i64, b: i64) -> Option<i64> {
    if b == 0 { None } else { Some(a / b) }
}

fn math(t: &mut FileScope<'_>) {
    let setups = Arc::new(AtomicUsize::new(0));

    t.describe("addition", |t| {
        t.it("adds small numbers", || async {
            expect(2 + 2).to_be(4)?;
            Ok(())
        });
        t.it("is commutative", || async {
            expect(3 + 7).to_be(7 + 3)?;
            expect(3 + 7).to_be_greater_than(9)?;
            Ok(())
        });
    });

    t.describe("division", |t| {
        let counter = Arc::clone(&setups);
        t.before_each(move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });
        t.it("divides evenly", || async {
            expect(checked_div(10, 2)).to_be(Some(5))?;
            Ok(())
        });
        t.it("refuses zero", || async {
            expect(checked_div(1, 0)).to_be_none()?;
            Ok(())
        });
        let counter = Arc::clone(&setups);
        t.it("ran setup before each test", move || {
            let counter = Arc::clone(&counter);
            async move {
                expect(counter.load(Ordering::SeqCst)).to_be(3)?;
                Ok(())
            }
        });
    });
}

fn callbacks(t: &mut FileScope<'_>) {
    t.describe("callbacks", |t| {
        t.it("records every call", || async {
            let double: Mock<i32, i32> = Mock::new();
            double.mock_implementation(|x| x * 2);
            let results: Vec<i32> = [1, 2, 3].into_iter().map(|x| double.call(x)).collect();

            expect(results).to_have_length(3)?;
            expect(&double).to_have_been_called_times(3)?;
            expect(&double).to_have_been_last_called_with(&3)?;
            Ok(())
        });
        t.it("matches messages", || async {
            expect("division by zero").to_match(r"^division\b")?;
            expect("division by zero").not().to_contain("overflow")?;
            Ok(())
        });
    });
}

fn main() -> ExitCode {
    Harness::new(env!("CARGO_MANIFEST_DIR"))
        .module("demos/arithmetic.rs", math)
        .module("demos/callbacks.rs", callbacks)
        .run_cli()
}
