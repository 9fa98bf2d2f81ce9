// Reentrancy through user `Eq` code, observed via the public API.

use rc_multimap::ListMultiMap;
use std::cell::RefCell;
use std::hash::{Hash, Hasher};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::{Rc, Weak};

type Hook = Rc<RefCell<Option<Box<dyn Fn()>>>>;

// Key whose equality runs an arbitrary hook first.
#[derive(Clone)]
struct Probe {
    id: u32,
    hook: Hook,
}

impl PartialEq for Probe {
    fn eq(&self, other: &Self) -> bool {
        if let Some(h) = self.hook.borrow().as_ref() {
            h();
        }
        self.id == other.id
    }
}
impl Eq for Probe {}

impl Hash for Probe {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state)
    }
}

fn quiet() -> Hook {
    Rc::new(RefCell::new(None))
}

// A map holding key 1, whose equality probes the map again for key 99.
fn setup() -> (Rc<ListMultiMap<Probe, i32>>, Hook) {
    let hook = quiet();
    let d = Rc::new(ListMultiMap::new());
    d.add(
        Probe {
            id: 1,
            hook: hook.clone(),
        },
        10,
    );
    let weak: Weak<ListMultiMap<Probe, i32>> = Rc::downgrade(&d);
    *hook.borrow_mut() = Some(Box::new(move || {
        if let Some(m) = weak.upgrade() {
            let _ = m.contains_key(&Probe {
                id: 99,
                hook: quiet(),
            });
        }
    }));
    (d, hook)
}

#[test]
fn reentrant_mutation_panics() {
    let (d, _hook) = setup();
    let res = catch_unwind(AssertUnwindSafe(|| {
        d.add(
            Probe {
                id: 1,
                hook: quiet(),
            },
            11,
        );
    }));
    assert!(res.is_err(), "probing a map that is being mutated must panic");
}

#[cfg(debug_assertions)]
#[test]
fn reentrant_probe_panics_in_debug() {
    let (d, _hook) = setup();
    let res = catch_unwind(AssertUnwindSafe(|| {
        d.contains_key(&Probe {
            id: 1,
            hook: quiet(),
        })
    }));
    assert!(res.is_err(), "expected reentrancy to panic in debug builds");
}

#[cfg(not(debug_assertions))]
#[test]
fn reentrant_probe_is_noop_in_release() {
    let (d, _hook) = setup();
    assert!(d.contains_key(&Probe {
        id: 1,
        hook: quiet(),
    }));
}

#[test]
fn hook_outside_probe_is_fine() {
    let (d, hook) = setup();
    if let Some(h) = hook.borrow().as_ref() {
        h();
    }
    assert_eq!(d.value_count(), 1);
}
