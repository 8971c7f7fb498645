#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|input: &str| {
    minimus::Environment::new()
        .add_template("fuzz.mustache", input)
        .ok();
});
