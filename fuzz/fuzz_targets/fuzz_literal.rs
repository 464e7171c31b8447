#![no_main]

use arbitrary::Arbitrary;
use elements_kind::{
    ArrayLiteral, ElementsConfig, LiteralAllocator, LiteralElement, SiteFeedback, SiteId,
    SiteTable, Value,
};
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
enum FuzzElement {
    Int(i32),
    Number(f64),
    String(String),
    Nested(u8, Vec<FuzzElement>),
}

fn to_literal(position: u8, elements: &[FuzzElement]) -> ArrayLiteral {
    let elements = elements
        .iter()
        .map(|e| match e {
            FuzzElement::Int(i) => LiteralElement::Value(Value::from(*i)),
            FuzzElement::Number(n) => LiteralElement::Value(Value::from(*n)),
            FuzzElement::String(s) => LiteralElement::Value(Value::from(s.as_str())),
            FuzzElement::Nested(p, inner) => LiteralElement::Array(to_literal(*p, inner)),
        })
        .collect();
    ArrayLiteral::new(SiteId::new(0, u32::from(position)), elements)
}

fuzz_target!(|input: (bool, Vec<(u8, Vec<FuzzElement>)>)| {
    let (smi_only_arrays, literals) = input;
    let config = ElementsConfig {
        smi_only_arrays,
        ..ElementsConfig::default()
    };
    let sites = SiteTable::with_config(&config);
    let allocator = LiteralAllocator::new(&config, &sites);

    for (position, elements) in &literals {
        let literal = to_literal(*position, elements);
        let array = allocator.allocate(&literal).unwrap();
        assert_eq!(array.borrow().len(), elements.len());
        let _ = sites.snapshot_json().unwrap();
    }
});
