//! Arena-backed doubly linked list ordering entries by last promotion.
//!
//! Only the store's worker thread owns one of these, so it needs no locking.
//! Slots are reused through a free list; a slot id stays valid until it is
//! removed.

pub(crate) type SlotId = usize;

struct Node<T> {
    value: Option<T>,
    prev: Option<SlotId>,
    next: Option<SlotId>,
}

pub(crate) struct RecencyList<T> {
    nodes: Vec<Node<T>>,
    free: Vec<SlotId>,
    head: Option<SlotId>,
    tail: Option<SlotId>,
    len: usize,
}

impl<T> RecencyList<T> {
    pub(crate) fn new() -> Self {
        Self {
            nodes: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            len: 0,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub(crate) fn contains(&self, id: SlotId) -> bool {
        self.nodes.get(id).is_some_and(|node| node.value.is_some())
    }

    pub(crate) fn get(&self, id: SlotId) -> Option<&T> {
        self.nodes.get(id).and_then(|node| node.value.as_ref())
    }

    pub(crate) fn back(&self) -> Option<SlotId> {
        self.tail
    }

    pub(crate) fn prev(&self, id: SlotId) -> Option<SlotId> {
        self.nodes.get(id).and_then(|node| node.prev)
    }

    pub(crate) fn push_front(&mut self, value: T) -> SlotId {
        let node = Node {
            value: Some(value),
            prev: None,
            next: None,
        };
        let id = match self.free.pop() {
            Some(id) => {
                self.nodes[id] = node;
                id
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        };
        self.attach_front(id);
        self.len += 1;
        id
    }

    pub(crate) fn move_to_front(&mut self, id: SlotId) -> bool {
        if !self.contains(id) {
            return false;
        }
        if self.head == Some(id) {
            return true;
        }
        self.detach(id);
        self.attach_front(id);
        true
    }

    pub(crate) fn remove(&mut self, id: SlotId) -> Option<T> {
        if !self.contains(id) {
            return None;
        }
        self.detach(id);
        self.free.push(id);
        self.len -= 1;
        self.nodes[id].value.take()
    }

    pub(crate) fn clear(&mut self) {
        self.nodes.clear();
        self.free.clear();
        self.head = None;
        self.tail = None;
        self.len = 0;
    }

    /// Values from front (most recent) to back.
    #[cfg(test)]
    pub(crate) fn iter(&self) -> impl Iterator<Item = &T> {
        let mut cursor = self.head;
        std::iter::from_fn(move || {
            let id = cursor?;
            let node = &self.nodes[id];
            cursor = node.next;
            node.value.as_ref()
        })
    }

    fn detach(&mut self, id: SlotId) {
        let (prev, next) = {
            let node = &self.nodes[id];
            (node.prev, node.next)
        };
        match prev {
            Some(prev) => self.nodes[prev].next = next,
            None => self.head = next,
        }
        match next {
            Some(next) => self.nodes[next].prev = prev,
            None => self.tail = prev,
        }
        let node = &mut self.nodes[id];
        node.prev = None;
        node.next = None;
    }

    fn attach_front(&mut self, id: SlotId) {
        let old_head = self.head;
        {
            let node = &mut self.nodes[id];
            node.prev = None;
            node.next = old_head;
        }
        match old_head {
            Some(head) => self.nodes[head].prev = Some(id),
            None => self.tail = Some(id),
        }
        self.head = Some(id);
    }
}
