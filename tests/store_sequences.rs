/// Randomized store sequences: kinds never narrow, site feedback is
/// monotone, and literals always start at least as wide as their elements.
use elements_kind::{
    classify, ArrayLiteral, ElementsConfig, ElementsKind, LiteralAllocator, SiteFeedback, SiteId,
    SiteTable, TransitionEngine, Value,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn random_value(rng: &mut StdRng) -> Value {
    match rng.gen_range(0..10) {
        0..=4 => Value::from(rng.gen_range(-1000..1000)),
        5..=6 => Value::from(rng.gen::<f64>() * 100.0),
        7 => Value::from("s"),
        8 => Value::from(rng.gen::<bool>()),
        _ => Value::Null,
    }
}

fn random_index(rng: &mut StdRng, len: usize) -> usize {
    match rng.gen_range(0..20) {
        0 => len + rng.gen_range(0..5000),
        1..=4 => len,
        _ => rng.gen_range(0..len.max(1)),
    }
}

#[test]
fn kinds_never_narrow() {
    let config = ElementsConfig::default();
    let sites = SiteTable::with_config(&config);
    let engine = TransitionEngine::new(&config, &sites);
    let mut rng = StdRng::seed_from_u64(0x5eed);

    for _ in 0..50 {
        let mut array = engine.new_array();
        let mut last = array.elements_kind().unwrap();
        for _ in 0..200 {
            let index = random_index(&mut rng, array.len());
            let value = random_value(&mut rng);
            let needed = classify(&value);
            engine.store(&mut array, index, value.clone()).unwrap();

            let kind = array.elements_kind().unwrap();
            assert!(kind >= last, "{:?} narrowed to {:?}", last, kind);
            assert!(kind >= needed, "{:?} cannot hold {:?}", kind, value);
            assert_eq!(array.get(index).unwrap(), value);
            last = kind;

            if rng.gen_range(0..10) == 0 {
                array.pop();
                assert_eq!(array.elements_kind(), Some(last));
            }
        }
    }
}

#[test]
fn remembered_kinds_are_monotone() {
    let config = ElementsConfig::default();
    let sites = SiteTable::with_config(&config);
    let allocator = LiteralAllocator::new(&config, &sites);
    let engine = TransitionEngine::new(&config, &sites);
    let mut rng = StdRng::seed_from_u64(42);
    let site_ids: Vec<SiteId> = (0..8).map(|p| SiteId::new(7, p)).collect();
    let mut seen = vec![ElementsKind::PackedSmi; site_ids.len()];

    for _ in 0..500 {
        let which = rng.gen_range(0..site_ids.len());
        let site = site_ids[which];
        let literal = ArrayLiteral::of_values(site, vec![1, 2, 3]);
        let array = allocator.allocate(&literal).unwrap();
        assert!(array.borrow().elements_kind().unwrap() >= seen[which]);

        let index = random_index(&mut rng, 3);
        engine
            .store(&mut array.borrow_mut(), index, random_value(&mut rng))
            .unwrap();

        let remembered = sites.remembered_kind(site).unwrap();
        assert!(remembered >= seen[which]);
        assert!(!remembered.is_dictionary());
        seen[which] = remembered;
    }
}

#[test]
fn literals_start_at_their_floor() {
    let config = ElementsConfig::default();
    let sites = SiteTable::with_config(&config);
    let allocator = LiteralAllocator::new(&config, &sites);
    let mut rng = StdRng::seed_from_u64(7);

    for position in 0..200 {
        let len = rng.gen_range(0..12);
        let values: Vec<Value> = (0..len).map(|_| random_value(&mut rng)).collect();
        let floor = values
            .iter()
            .fold(ElementsKind::PackedSmi, |kind, v| kind.join(classify(v)));
        let literal = ArrayLiteral::of_values(SiteId::new(3, position), values.clone());

        let array = allocator.allocate(&literal).unwrap();
        let array = array.borrow();
        assert!(array.elements_kind().unwrap() >= floor);
        assert_eq!(array.to_vec(), values);
    }
}
