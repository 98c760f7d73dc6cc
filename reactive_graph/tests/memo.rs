use reactive_graph::{computed::Memo, owner::Owner, prelude::*, signal::RwSignal};
use std::{cell::RefCell, rc::Rc};

#[test]
fn memo_recomputes_only_when_source_changes() {
    let (_owner, _) = Owner::new(|| {
        let a = RwSignal::new(1);
        let calls = Rc::new(RefCell::new(0));
        let calls2 = calls.clone();
        let doubled = Memo::new(move |_| {
            *calls2.borrow_mut() += 1;
            a.get() * 2
        });
        assert_eq!(doubled.get(), 2);
        assert_eq!(doubled.get(), 2);
        assert_eq!(doubled.get(), 2);
        assert_eq!(*calls.borrow(), 1);

        a.set(5);
        assert_eq!(doubled.get(), 10);
        assert_eq!(*calls.borrow(), 2);
    });
}

#[test]
fn memo_filters_by_equality_not_just_source_change() {
    let (_owner, _) = Owner::new(|| {
        let a = RwSignal::new(4);
        let calls = Rc::new(RefCell::new(0));
        let calls2 = calls.clone();
        // Always parity, so writing an odd number followed by another odd number should not
        // produce a second distinct value even though `a` itself changed twice.
        let parity = Memo::new(move |_| {
            *calls2.borrow_mut() += 1;
            a.get() % 2 == 0
        });
        assert_eq!(parity.get(), true);
        a.set(6);
        assert_eq!(parity.get(), true);
        assert_eq!(*calls.borrow(), 2, "memo recomputes on every source write");

        let b = RwSignal::new(0);
        let downstream_calls = Rc::new(RefCell::new(0));
        let downstream_calls2 = downstream_calls.clone();
        let downstream = Memo::new(move |_| {
            *downstream_calls2.borrow_mut() += 1;
            b.get();
            parity.get()
        });
        assert_eq!(downstream.get(), true);
        assert_eq!(*downstream_calls.borrow(), 1);
        // `b` changing dirties `downstream` directly; `parity` staying `true` across the `a`
        // write above must not cause a second, redundant recompute of `downstream`.
        b.set(1);
        assert_eq!(downstream.get(), true);
        assert_eq!(*downstream_calls.borrow(), 2);
    });
}

#[test]
fn diamond_dependency_recomputes_shared_memo_once() {
    let (_owner, _) = Owner::new(|| {
        let name = RwSignal::new("Ada Lovelace".to_string());
        let first = Memo::new(move |_| name.get().split_whitespace().next().unwrap().to_string());
        let last = Memo::new(move |_| name.get().split_whitespace().nth(1).unwrap().to_string());

        let combine_calls = Rc::new(RefCell::new(0));
        let combine_calls2 = combine_calls.clone();
        let combined = Memo::new(move |_| {
            *combine_calls2.borrow_mut() += 1;
            format!("{} {}", first.get(), last.get())
        });

        assert_eq!(combined.get(), "Ada Lovelace");
        name.set("Grace Hopper".to_string());
        assert_eq!(combined.get(), "Grace Hopper");
        assert_eq!(*combine_calls.borrow(), 2);
    });
}

#[test]
fn nested_memo_chain_propagates_in_order() {
    let (_owner, _) = Owner::new(|| {
        let a = RwSignal::new(0);
        let b = Memo::new(move |_| a.get() + 1);
        let c = Memo::new(move |_| b.get() * 2);
        let d = Memo::new(move |_| c.get() + 1);

        assert_eq!(d.get(), 3);
        a.set(10);
        assert_eq!(b.get(), 11);
        assert_eq!(c.get(), 22);
        assert_eq!(d.get(), 23);
    });
}
