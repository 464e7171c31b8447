#![no_main]

use arbitrary::Arbitrary;
use elements_kind::{classify, ElementsConfig, SiteTable, TransitionEngine, Value};
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
enum FuzzValue {
    Undefined,
    Null,
    Bool(bool),
    Int(i32),
    Number(f64),
    String(String),
}

impl FuzzValue {
    fn to_value(&self) -> Value {
        match self {
            FuzzValue::Undefined => Value::Undefined,
            FuzzValue::Null => Value::Null,
            FuzzValue::Bool(b) => Value::from(*b),
            FuzzValue::Int(i) => Value::from(*i),
            FuzzValue::Number(n) => Value::from(*n),
            FuzzValue::String(s) => Value::from(s.as_str()),
        }
    }
}

#[derive(Arbitrary, Debug)]
enum Op {
    Store(u16, FuzzValue),
    Push(FuzzValue),
    Pop,
}

fuzz_target!(|ops: Vec<Op>| {
    let config = ElementsConfig::default();
    let sites = SiteTable::with_config(&config);
    let engine = TransitionEngine::new(&config, &sites);
    let mut array = engine.new_array();
    let mut last = array.elements_kind();

    for op in &ops {
        match op {
            Op::Store(index, value) => {
                let value = value.to_value();
                let needed = classify(&value);
                engine.store(&mut array, usize::from(*index), value).unwrap();
                assert!(array.elements_kind() >= Some(needed));
            }
            Op::Push(value) => {
                engine.push(&mut array, value.to_value()).unwrap();
            }
            Op::Pop => {
                array.pop();
            }
        }
        assert!(array.elements_kind() >= last);
        last = array.elements_kind();
    }
});
