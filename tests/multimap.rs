use rc_multimap::{
    AlternateKey, ByBorrow, CollectionLookup, Error, ListMultiMap, ReadMultiMap, ReadValues,
    SetMultiMap,
};
use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn keys_of<V: Clone + PartialEq>(d: &ListMultiMap<u32, V>) -> BTreeSet<u32> {
    d.keys().iter().collect::<Result<_, _>>().unwrap()
}

fn assert_consistent<V: Clone + PartialEq>(d: &ListMultiMap<u32, V>, probe: impl Iterator<Item = u32>) {
    let keys = keys_of(d);
    for k in probe {
        assert_eq!(keys.contains(&k), d.value_count_of(&k) > 0, "key {k}");
    }
    let total: usize = keys.iter().map(|k| d.value_count_of(k)).sum();
    assert_eq!(d.value_count(), total);
    assert_eq!(d.len(), keys.len());
}

#[test]
fn presence_tracks_non_emptiness() {
    init_logging();
    let d: ListMultiMap<u32, char> = ListMultiMap::new();
    d.add(1, 'a');
    assert_consistent(&d, 0..6);
    d.add_range(2, ['b', 'c', 'd']);
    assert_consistent(&d, 0..6);
    d.view(3).push('e');
    assert_consistent(&d, 0..6);
    d.view(2).remove_range(0, 3).unwrap();
    assert_consistent(&d, 0..6);
    d.set_range(1, ['x', 'y']);
    assert_consistent(&d, 0..6);
    d.view(3).clear();
    assert_consistent(&d, 0..6);
    d.remove_value(&1, &'x');
    d.remove(&4);
    assert_consistent(&d, 0..6);
    d.clear();
    assert_consistent(&d, 0..6);
    assert!(d.is_empty());
}

#[test]
fn clear_key_is_idempotent() {
    init_logging();
    let d: ListMultiMap<u32, u8> = ListMultiMap::new();
    d.add_range(1, [1, 2, 3]);
    d.add(2, 4);
    assert!(d.clear_key(&1));
    let snapshot = (d.len(), d.value_count(), d.version(), keys_of(&d));
    assert!(!d.clear_key(&1));
    assert_eq!(snapshot, (d.len(), d.value_count(), d.version(), keys_of(&d)));
}

#[test]
fn read_only_lookup_equals_view() {
    let d: ListMultiMap<u32, &str> = ListMultiMap::new();
    d.add_range(5, ["p", "q"]);
    let ro = d.read_only();
    let got = ro.get(&5).expect("present");
    assert!(got == d.view(5));
    assert_eq!(got.to_vec(), d.view(5).to_vec());
    assert_eq!(ro.value_count(), d.value_count());
    assert!(ro.get(&6).is_none());
}

#[test]
fn empty_to_attached_and_back() {
    init_logging();
    let d: ListMultiMap<&str, i32> = ListMultiMap::new();
    let v = d.view("k");
    assert_eq!(v.len(), 0);
    assert!(!d.keys().contains("k"));
    d.view("k").push(7);
    assert!(d.keys().contains("k"));
    assert_eq!(d.value_count_of("k"), 1);
    assert_eq!(v.len(), 1, "earlier handle sees the attached storage");
    assert!(d.view("k").remove(&7));
    assert!(!d.keys().contains("k"));
}

#[test]
fn enumerators_fail_fast() {
    let d: ListMultiMap<u32, u32> = (0..4).map(|i| (i, i)).collect();
    let mut keys = d.keys().iter();
    let mut values = d.values().iter();
    let mut pairs = d.iter();
    assert!(keys.next().unwrap().is_ok());
    assert!(values.next().unwrap().is_ok());
    assert!(pairs.next().unwrap().is_ok());
    d.add(9, 9);
    assert_eq!(keys.next(), Some(Err(Error::ConcurrentModification)));
    assert_eq!(values.next(), Some(Err(Error::ConcurrentModification)));
    assert!(matches!(pairs.next(), Some(Err(Error::ConcurrentModification))));
    assert!(keys.next().is_none());
}

/// Case-insensitive ASCII relation between `&str` probes and `String` keys
/// stored in lowercase.
struct AsciiLower;

impl AlternateKey<String> for AsciiLower {
    type Alternate = str;

    fn hash<H: Hasher>(&self, alternate: &str, state: &mut H) {
        alternate.to_ascii_lowercase().hash(state)
    }

    fn matches(&self, alternate: &str, key: &String) -> bool {
        alternate.eq_ignore_ascii_case(key)
    }

    fn to_key(&self, alternate: &str) -> String {
        alternate.to_ascii_lowercase()
    }
}

#[test]
fn alternate_lookup_equals_canonical() {
    let d: SetMultiMap<String, u8> = SetMultiMap::new();
    d.add_range("alpha".to_string(), [1, 2]);
    let alt = d.alternate_lookup(AsciiLower);
    assert_eq!(
        alt.view("ALPHA").to_vec(),
        d.view("alpha".to_string()).to_vec()
    );
    assert_eq!(alt.add("Beta", 3), ("beta".to_string(), true));
    assert_eq!(alt.add("BETA", 3), ("beta".to_string(), false));
    assert_eq!(d.view("beta".to_string()).to_vec(), [3]);
    assert_eq!(alt.remove("bEtA"), Some("beta".to_string()));

    let by_borrow = d.alternate_lookup(ByBorrow::<str>::new());
    assert_eq!(by_borrow.value_count_of("alpha"), 2);
    assert_eq!(by_borrow.value_count_of("ALPHA"), 0);
}

#[test]
fn add_remove_scenario() {
    init_logging();
    let d: ListMultiMap<u32, &str> = ListMultiMap::new();
    d.add(1, "x");
    d.add(1, "y");
    assert!(d.remove_value(&1, &"x"));
    assert_eq!(d.view(1).to_vec(), ["y"]);
    assert!(d.contains_key(&1));
    assert!(d.remove_value(&1, &"y"));
    assert!(!d.contains_key(&1));
    assert_eq!(d.view(1).len(), 0);
}

#[test]
fn read_only_view_of_removed_key_stays_readable() {
    let d: ListMultiMap<u32, u32> = ListMultiMap::new();
    d.add_range(1, [1, 2]);
    let ro = d.view(1).read_only();
    d.remove(&1);
    assert_eq!(ReadValues::to_vec(&ro), [1, 2]);
    assert_eq!(*ReadValues::key(&ro), 1);
    assert!(!d.contains_key(&1));
}
