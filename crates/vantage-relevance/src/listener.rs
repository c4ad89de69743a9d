use crate::ids::{EntityId, ObserverId};

/// Receives the entities whose relevance changed for an observer. Called synchronously.
pub trait RelevanceListener {
    fn entity_relevancy_changed(&mut self, observer: ObserverId, changed: &[EntityId]);
}

impl<F> RelevanceListener for F
where
    F: FnMut(ObserverId, &[EntityId]),
{
    fn entity_relevancy_changed(&mut self, observer: ObserverId, changed: &[EntityId]) {
        self(observer, changed)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerHandle(u64);

struct Entry {
    handle: ListenerHandle,
    priority: i32,
    listener: Box<dyn RelevanceListener>,
}

/// Listeners ordered by descending priority; equal priorities keep registration order.
#[derive(Default)]
pub struct ListenerRegistry {
    entries: Vec<Entry>,
    next_handle: u64,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, priority: i32, listener: Box<dyn RelevanceListener>) -> ListenerHandle {
        let handle = ListenerHandle(self.next_handle);
        self.next_handle += 1;
        // insert after every entry with priority >= ours
        let at = self
            .entries
            .iter()
            .position(|e| e.priority < priority)
            .unwrap_or(self.entries.len());
        self.entries.insert(
            at,
            Entry {
                handle,
                priority,
                listener,
            },
        );
        handle
    }

    pub fn remove(&mut self, handle: ListenerHandle) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.handle != handle);
        before != self.entries.len()
    }

    pub fn notify(&mut self, observer: ObserverId, changed: &[EntityId]) {
        if changed.is_empty() {
            return;
        }
        for e in self.entries.iter_mut() {
            e.listener.entity_relevancy_changed(observer, changed);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn higher_priority_first_ties_in_registration_order() {
        let log: Rc<RefCell<Vec<&'static str>>> = Rc::new(RefCell::new(Vec::new()));
        let mut reg = ListenerRegistry::new();
        for (prio, name) in [(0, "a"), (10, "b"), (0, "c"), (10, "d"), (-5, "e")] {
            let log = log.clone();
            reg.add(prio, Box::new(move |_: ObserverId, _: &[EntityId]| log.borrow_mut().push(name)));
        }
        reg.notify(ObserverId(1), &[EntityId(1)]);
        assert_eq!(*log.borrow(), vec!["b", "d", "a", "c", "e"]);
    }

    #[test]
    fn removed_listener_is_not_called_and_empty_changes_are_skipped() {
        let calls = Rc::new(RefCell::new(0));
        let mut reg = ListenerRegistry::new();
        let c = calls.clone();
        let h = reg.add(0, Box::new(move |_: ObserverId, _: &[EntityId]| *c.borrow_mut() += 1));
        reg.notify(ObserverId(1), &[]);
        assert_eq!(*calls.borrow(), 0);
        reg.notify(ObserverId(1), &[EntityId(3)]);
        assert_eq!(*calls.borrow(), 1);
        assert!(reg.remove(h));
        assert!(!reg.remove(h));
        reg.notify(ObserverId(1), &[EntityId(3)]);
        assert_eq!(*calls.borrow(), 1);
    }
}
