#![no_main]
use std::collections::BTreeMap;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use serde::Serialize;

#[derive(Debug, Serialize, Arbitrary)]
enum Value {
    None,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

fuzz_target!(|data: (&str, BTreeMap<String, String>, Value)| {
    let (root, partials, value) = data;

    let env = minimus::Environment::new();
    let tmpl = match env.compile(root) {
        Ok(tmpl) => tmpl,
        Err(_) => return,
    };
    tmpl.render(&value, &partials).ok();
});
