use cellmap_rs::{ordinal_keys, ConcurrentEnumMap, Ordinal};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Letter {
    A, B, C, D, E, F, G, H, I, J, K, L, M,
    N, O, P, Q, R, S, T, U, V, W, X, Y, Z,
}

ordinal_keys!(Letter {
    A, B, C, D, E, F, G, H, I, J, K, L, M,
    N, O, P, Q, R, S, T, U, V, W, X, Y, Z,
});

#[test]
fn test_ordinal_domain() {
    assert_eq!(Letter::cardinality(), 26);
    assert_eq!(Letter::A.ordinal(), 0);
    assert_eq!(Letter::Z.ordinal(), 25);
    assert_eq!(Letter::VALUES[13], Letter::N);
}

#[test]
fn test_insert_get_remove() {
    let m: ConcurrentEnumMap<Letter, i32> = ConcurrentEnumMap::new();
    assert!(m.is_empty());
    assert_eq!(m.get(Letter::A), None);

    assert_eq!(m.insert(Letter::A, 1), None);
    assert_eq!(m.len(), 1);
    assert_eq!(m.get(Letter::A), Some(1));
    assert!(m.contains_key(Letter::A));

    // update existing
    assert_eq!(m.insert(Letter::A, 10), Some(1));
    assert_eq!(m.len(), 1);
    assert_eq!(m.get(Letter::A), Some(10));

    let _ = m.insert(Letter::B, 2);
    assert_eq!(m.len(), 2);

    assert_eq!(m.remove(Letter::B), Some(2));
    assert_eq!(m.len(), 1);
    assert_eq!(m.get(Letter::B), None);
}

#[test]
fn test_remove_idempotent() {
    let m: ConcurrentEnumMap<Letter, i32> = ConcurrentEnumMap::new();
    m.insert(Letter::Q, 5);
    assert_eq!(m.remove(Letter::Q), Some(5));
    assert_eq!(m.remove(Letter::Q), None);
    assert_eq!(m.len(), 0);
    assert!(m.is_empty());
}

#[test]
fn test_insert_if_absent() {
    let m: ConcurrentEnumMap<Letter, i32> = ConcurrentEnumMap::new();
    assert_eq!(m.insert_if_absent(Letter::C, 3), None);
    assert_eq!(m.insert_if_absent(Letter::C, 99), Some(3));
    assert_eq!(m.get(Letter::C), Some(3));
    assert_eq!(m.len(), 1);
}

#[test]
fn test_compare_remove() {
    let m: ConcurrentEnumMap<Letter, i32> = ConcurrentEnumMap::new();
    m.insert(Letter::D, 4);
    assert!(!m.compare_remove(Letter::D, &5));
    assert_eq!(m.get(Letter::D), Some(4));
    assert!(m.compare_remove(Letter::D, &4));
    assert_eq!(m.get(Letter::D), None);
    assert_eq!(m.len(), 0);
    // absent key never matches
    assert!(!m.compare_remove(Letter::D, &4));
}

#[test]
fn test_compare_replace() {
    let m: ConcurrentEnumMap<Letter, i32> = ConcurrentEnumMap::new();
    m.insert(Letter::E, 1);
    assert!(!m.compare_replace(Letter::E, &2, 20));
    assert_eq!(m.get(Letter::E), Some(1));
    assert!(m.compare_replace(Letter::E, &1, 20));
    assert_eq!(m.get(Letter::E), Some(20));
    assert_eq!(m.len(), 1);
    assert!(!m.compare_replace(Letter::F, &1, 2));
}

#[test]
fn test_alter_transitions() {
    let m: ConcurrentEnumMap<Letter, i32> = ConcurrentEnumMap::new();

    // absent -> absent
    assert_eq!(m.alter(Letter::G, |prev| { assert!(prev.is_none()); None }), None);
    assert_eq!(m.len(), 0);

    // absent -> present
    assert_eq!(m.alter(Letter::G, |_| Some(7)), Some(7));
    assert_eq!(m.len(), 1);

    // present -> present
    assert_eq!(m.alter(Letter::G, |prev| prev.map(|v| v + 1)), Some(8));
    assert_eq!(m.len(), 1);

    // present -> absent
    assert_eq!(m.alter(Letter::G, |_| None), None);
    assert_eq!(m.len(), 0);
}

#[test]
fn test_alter_present() {
    let m: ConcurrentEnumMap<Letter, i32> = ConcurrentEnumMap::new();
    assert_eq!(m.alter_present(Letter::H, |v| Some(v + 1)), None);
    assert_eq!(m.len(), 0);

    m.insert(Letter::H, 1);
    assert_eq!(m.alter_present(Letter::H, |v| Some(v * 10)), Some(10));
    assert_eq!(m.alter_present(Letter::H, |_| None), None);
    assert_eq!(m.get(Letter::H), None);
    assert_eq!(m.len(), 0);
}

#[test]
fn test_get_or_insert_with() {
    let m: ConcurrentEnumMap<Letter, String> = ConcurrentEnumMap::new();

    // mapping function declines: nothing installed
    assert_eq!(m.get_or_insert_with(Letter::I, || None), None);
    assert_eq!(m.len(), 0);

    assert_eq!(
        m.get_or_insert_with(Letter::I, || Some("hello".to_string())),
        Some("hello".to_string())
    );
    assert_eq!(m.len(), 1);

    // present: the mapping function is not consulted
    assert_eq!(
        m.get_or_insert_with(Letter::I, || panic!("must not run")),
        Some("hello".to_string())
    );
}

#[test]
fn test_merge() {
    let m: ConcurrentEnumMap<Letter, i32> = ConcurrentEnumMap::new();
    assert_eq!(m.merge(Letter::J, 5, |a, b| Some(a + b)), Some(5));
    assert_eq!(m.len(), 1);
    assert_eq!(m.merge(Letter::J, 3, |a, b| Some(a + b)), Some(8));
    assert_eq!(m.len(), 1);
    assert_eq!(m.merge(Letter::J, 0, |_, _| None), None);
    assert_eq!(m.get(Letter::J), None);
    assert_eq!(m.len(), 0);
}

#[test]
fn test_contains_value() {
    let m: ConcurrentEnumMap<Letter, i32> = ConcurrentEnumMap::new();
    m.insert(Letter::K, 11);
    m.insert(Letter::L, 12);
    assert!(m.contains_value(&11));
    assert!(m.contains_value(&12));
    assert!(!m.contains_value(&13));
}

#[test]
fn test_clear_after_population() {
    let m: ConcurrentEnumMap<Letter, i32> = ConcurrentEnumMap::new();
    for (i, &k) in Letter::VALUES.iter().enumerate() {
        m.insert(k, i as i32);
    }
    assert_eq!(m.len(), 26);

    m.clear();
    assert_eq!(m.len(), 0);
    assert!(m.is_empty());
    for &k in Letter::VALUES {
        assert_eq!(m.get(k), None);
    }
}

#[test]
fn test_iterators_ordinal_order() {
    let m: ConcurrentEnumMap<Letter, i32> = ConcurrentEnumMap::new();
    m.insert(Letter::C, 2);
    m.insert(Letter::A, 0);
    m.insert(Letter::Z, 25);

    let pairs: Vec<(Letter, i32)> = m.iter().collect();
    assert_eq!(pairs, vec![(Letter::A, 0), (Letter::C, 2), (Letter::Z, 25)]);

    let keys: Vec<Letter> = m.keys().collect();
    assert_eq!(keys, vec![Letter::A, Letter::C, Letter::Z]);

    let values: Vec<i32> = m.values().collect();
    assert_eq!(values, vec![0, 2, 25]);
}

#[test]
fn test_iterator_remove() {
    let m: ConcurrentEnumMap<Letter, i32> = ConcurrentEnumMap::new();
    m.insert(Letter::A, 0);
    m.insert(Letter::B, 1);
    m.insert(Letter::C, 2);

    let mut it = m.iter();
    // remove before the first yield is a no-op
    it.remove();
    assert_eq!(m.len(), 3);

    assert_eq!(it.next(), Some((Letter::A, 0)));
    it.remove();
    assert_eq!(m.get(Letter::A), None);
    assert_eq!(m.len(), 2);
    // second remove of the same position is a no-op
    it.remove();
    assert_eq!(m.len(), 2);

    assert_eq!(it.next(), Some((Letter::B, 1)));
    assert_eq!(it.next(), Some((Letter::C, 2)));
    assert_eq!(it.next(), None);
}

#[test]
fn test_insert_all_round_trip() {
    let m: ConcurrentEnumMap<Letter, i32> = ConcurrentEnumMap::new();
    for (i, &k) in Letter::VALUES.iter().enumerate().step_by(2) {
        m.insert(k, i as i32);
    }

    let copy: ConcurrentEnumMap<Letter, i32> = ConcurrentEnumMap::new();
    copy.insert_all(&m);
    assert_eq!(copy, m);
    assert_eq!(copy.len(), m.len());

    // overwriting copy diverges
    copy.insert(Letter::B, -1);
    assert_ne!(copy, m);
}

#[test]
fn test_clone_and_eq() {
    let m: ConcurrentEnumMap<Letter, String> = ConcurrentEnumMap::new();
    m.insert(Letter::M, "m".to_string());
    m.insert(Letter::N, "n".to_string());

    let c = m.clone();
    assert_eq!(c, m);
    c.remove(Letter::M);
    assert_ne!(c, m);
}

#[test]
fn test_from_iterator_and_extend() {
    let m: ConcurrentEnumMap<Letter, i32> =
        [(Letter::A, 1), (Letter::B, 2)].into_iter().collect();
    assert_eq!(m.len(), 2);
    assert_eq!(m.get(Letter::B), Some(2));

    let mut m = m;
    m.extend([(Letter::C, 3)]);
    assert_eq!(m.len(), 3);
    assert_eq!(m.get(Letter::C), Some(3));
}

#[test]
fn test_for_each_and_retain() {
    let m: ConcurrentEnumMap<Letter, i32> = ConcurrentEnumMap::new();
    for (i, &k) in Letter::VALUES.iter().enumerate() {
        m.insert(k, i as i32);
    }

    let mut sum = 0;
    m.for_each(|_, v| sum += *v);
    assert_eq!(sum, (0..26).sum::<i32>());

    m.retain(|_, v| v % 2 == 0);
    assert_eq!(m.len(), 13);
    assert!(m.values().all(|v| v % 2 == 0));
}

#[test]
fn test_debug_formats_entries() {
    let m: ConcurrentEnumMap<Letter, i32> = ConcurrentEnumMap::new();
    m.insert(Letter::A, 1);
    assert_eq!(format!("{m:?}"), "{A: 1}");
}
