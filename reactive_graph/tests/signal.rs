use reactive_graph::{owner::Owner, prelude::*, signal::RwSignal};

#[test]
fn signal_reads_default_and_updated_value() {
    let (_owner, _) = Owner::new(|| {
        let a = RwSignal::new(1);
        assert_eq!(a.get(), 1);
        a.set(2);
        assert_eq!(a.get(), 2);
    });
}

#[test]
fn update_mutates_in_place() {
    let (_owner, _) = Owner::new(|| {
        let list = RwSignal::new(vec![1, 2, 3]);
        list.update(|v| v.push(4));
        assert_eq!(list.get(), vec![1, 2, 3, 4]);
    });
}

#[test]
fn write_guard_commits_on_drop() {
    let (_owner, _) = Owner::new(|| {
        let a = RwSignal::new(0);
        {
            let mut guard = a.write();
            *guard = 42;
        }
        assert_eq!(a.get(), 42);
    });
}

#[test]
fn get_untracked_does_not_add_a_dependency() {
    let (_owner, _) = Owner::new(|| {
        let a = RwSignal::new(1);
        let calls = std::rc::Rc::new(std::cell::RefCell::new(0));
        let calls2 = calls.clone();
        // Reading `a` untracked from inside a memo must not make the memo depend on `a`.
        let memo = reactive_graph::computed::Memo::new(move |_| {
            *calls2.borrow_mut() += 1;
            a.get_untracked() + 1
        });
        assert_eq!(memo.get(), 2);
        a.set(5);
        // The memo's only read of `a` was untracked, so writing `a` doesn't dirty it; the
        // second `.get()` below is served from the cached value without recomputing.
        assert_eq!(memo.get(), 2);
        assert_eq!(*calls.borrow(), 1);
    });
}

#[test]
fn split_produces_independent_read_write_handles() {
    let (_owner, _) = Owner::new(|| {
        let (read, write) = RwSignal::new(0).split();
        write.set(9);
        assert_eq!(read.get(), 9);
    });
}

#[test]
fn disposed_signal_read_returns_error_instead_of_panicking() {
    let (owner, signal) = Owner::new(|| RwSignal::new(1));
    owner.dispose();
    assert!(signal.try_get().is_err());
}
