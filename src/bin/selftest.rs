// Trial's own suite binary: exercises hooks, async bodies, matchers and spies.
// Usage: cargo run --bin trial-selftest [-- --reporter ipc]

use std::cell::Cell;
use std::process::ExitCode;
use std::rc::Rc;
use std::time::Duration;

use trial::{asynchronous, expect, run_main, values, Class, Object, Spy, Value};

fn main() -> ExitCode {
    run_main(|r| {
        r.describe("Test context", |r| {
            let x = Rc::new(Cell::new(0));

            let before = Rc::clone(&x);
            r.before(move || before.set(1));
            let before_each = Rc::clone(&x);
            r.before_each(move || before_each.set(before_each.get() + 1));
            let after = Rc::clone(&x);
            r.after(move || after.set(0));
            let after_each = Rc::clone(&x);
            r.after_each(move || after_each.set(after_each.get() - 1));

            let seen = Rc::clone(&x);
            r.it("task", move || expect(seen.get()).to_equal(2));

            r.describe("Promise handling", |r| {
                r.it("promise", asynchronous(|| async { Ok(()) }));
                r.it(
                    "rejects",
                    asynchronous(|| async {
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        expect(true).to_be_true()
                    }),
                );
            });

            r.describe("expectations", |r| {
                r.it("detects deep-equal", || {
                    let nested = || {
                        Object::new().field(
                            "test",
                            Value::seq([Value::from(Object::new().field("x", 12)), "a".into()]),
                        )
                    };
                    expect(nested()).to_deep_equal(nested())
                });

                r.it("can expect exceptions", || {
                    expect(Value::function(|_| Err(Value::error("TypeError", ""))))
                        .to_throw_matching(Class("TypeError"))?;
                    expect(Value::function(|_| {
                        Err(Value::error("Error", "Test message from sub function"))
                    }))
                    .to_throw_matching("Test")?;
                    expect(Value::function(|_| {
                        Err(Value::from("test message from sub function"))
                    }))
                    .to_throw_matching("sub")?;
                    expect(Value::function(|_| Ok(Value::Undefined)))
                        .to_not_throw_matching(Class("Error"))?;
                    expect(Value::function(|_| Err(Value::error("Error", ""))))
                        .to_not_throw_matching(Class("TypeError"))?;
                    expect(Value::function(|_| Err(Value::error("Error", "Regular message"))))
                        .to_not_throw_matching("Weird message")
                });
            });

            r.describe("spies", |r| {
                r.it("can create spies", || {
                    let s = Spy::new();
                    expect(&s).to_be_a("function")?;
                    s.returns("test");
                    let result = s.call(values![]);
                    expect(&s).to_have_been_called()?;
                    expect(result).to_equal("test")?;
                    s.call(values!["a", 5]);
                    expect(&s).to_have_been_called_times(2)?;
                    expect(&s).to_have_been_called_with(values!["a", 5])
                });
            });
        });
    })
}
