//! Bounded, strict-LRU object cache (spec.md §4.4), ported from the
//! `cache_node`/`cache_list`/`cache_start`/`cache_lru` doubly-linked list
//! in `original_source/proxy/proxy.c`.
//!
//! Rather than the original's raw `prev`/`next` pointers, the list and its
//! free pool live in one arena (`Vec<Node>`) indexed by `usize`, exactly as
//! spec.md §9 suggests ("Express it as an arena of nodes plus indices").
//! A node's index is stable for the arena's lifetime — eviction recycles a
//! node in place rather than deallocating it — so a [`Handle`] captured
//! under a read lock remains a valid (if possibly stale) arena index after
//! the lock is dropped, which is exactly the property the read-then-promote
//! handoff in spec.md §4.3 step 5 depends on.

use parking_lot::RwLock;

pub const MAX_OBJECT_SIZE: usize = 100 * 1024;
pub const MAX_CACHE_SIZE: usize = 20 * 1024 * 1024;

/// An arena index captured at lookup time and redeemed at promote time.
/// Opaque to callers; carries no guarantee that the node it names still
/// holds the same entry by the time it's used (see [`Cache::promote`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handle(usize);

struct Node {
    uri: String,
    body: Box<[u8]>,
    size: usize,
    prev: Option<usize>,
    next: Option<usize>,
}

impl Node {
    fn vacant() -> Self {
        Node {
            uri: String::new(),
            body: Box::new([]),
            size: 0,
            prev: None,
            next: None,
        }
    }
}

struct Inner {
    nodes: Vec<Node>,
    /// Head of the in-use recency list (most recently used), `None` if empty.
    mru: Option<usize>,
    /// Tail of the in-use recency list (least recently used), `None` if empty.
    lru: Option<usize>,
    /// Free pool: singly linked via `next`, pushed/popped from the head.
    free: Option<usize>,
    total: usize,
}

pub struct Cache {
    inner: RwLock<Inner>,
    max_total: usize,
}

impl Default for Cache {
    fn default() -> Self {
        Self::new()
    }
}

impl Cache {
    pub fn new() -> Self {
        Self::with_capacity(MAX_CACHE_SIZE)
    }

    pub fn with_capacity(max_total: usize) -> Self {
        Cache {
            inner: RwLock::new(Inner {
                nodes: Vec::new(),
                mru: None,
                lru: None,
                free: None,
                total: 0,
            }),
            max_total,
        }
    }

    /// spec.md §4.4 `lookup`: read-lock, linear scan MRU → LRU, first
    /// byte-exact URI match wins. On hit, the body is copied out while
    /// still holding the read lock (so the write lock can be dropped
    /// entirely between the read and the later promote), and a [`Handle`]
    /// is returned for the caller to redeem via [`Cache::promote`].
    pub fn lookup(&self, key: &str) -> Option<(Handle, Vec<u8>)> {
        let inner = self.inner.read();
        let mut cur = inner.mru;
        while let Some(idx) = cur {
            let node = &inner.nodes[idx];
            if node.uri == key {
                return Some((Handle(idx), node.body.to_vec()));
            }
            cur = node.next;
        }
        None
    }

    /// spec.md §4.4 `promote` / §9 "Rwlock promotion race": takes the
    /// write lock and re-checks `size > 0` on the node the handle names —
    /// never trusting the liveness observed while only the read lock was
    /// held — before unlinking and relinking it at the MRU position. If a
    /// concurrent eviction already recycled this slot, this is a no-op:
    /// spec.md is explicit that a promotion racing an eviction is simply
    /// dropped, not retried or re-validated by URI.
    pub fn promote(&self, handle: Handle) {
        let mut inner = self.inner.write();
        let idx = handle.0;
        if inner.nodes[idx].size == 0 {
            return;
        }
        if inner.mru == Some(idx) {
            return;
        }
        self_unlink(&mut inner, idx);
        self_link_at_mru(&mut inner, idx);
    }

    /// spec.md §4.4 `insert`: acquire a node (free pool first, else grow
    /// the arena), copy `body` into a freshly sized allocation, link at
    /// MRU, then evict from the LRU end while `total > max_total`.
    pub fn insert(&self, key: String, body: &[u8]) {
        let mut inner = self.inner.write();

        let idx = match inner.free {
            Some(free_idx) => {
                let next_free = inner.nodes[free_idx].next;
                inner.free = next_free;
                free_idx
            }
            None => {
                inner.nodes.push(Node::vacant());
                inner.nodes.len() - 1
            }
        };

        {
            let node = &mut inner.nodes[idx];
            node.uri = key;
            node.body = body.to_vec().into_boxed_slice();
            node.size = body.len();
            node.prev = None;
            node.next = None;
        }

        self_link_at_mru(&mut inner, idx);
        inner.total += body.len();

        while inner.total > self.max_total {
            let victim = match inner.lru {
                Some(v) => v,
                None => break,
            };
            self_unlink(&mut inner, victim);
            let freed = inner.nodes[victim].size;
            inner.nodes[victim].body = Box::new([]);
            inner.nodes[victim].size = 0;
            inner.nodes[victim].uri.clear();
            let old_free_head = inner.free;
            inner.nodes[victim].next = old_free_head;
            inner.nodes[victim].prev = None;
            inner.free = Some(victim);
            inner.total -= freed;
        }
    }

    pub fn total_size(&self) -> usize {
        self.inner.read().total
    }

    pub fn len(&self) -> usize {
        let inner = self.inner.read();
        let mut n = 0;
        let mut cur = inner.mru;
        while let Some(idx) = cur {
            n += 1;
            cur = inner.nodes[idx].next;
        }
        n
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().mru.is_none()
    }

    /// Ordered (MRU → LRU) snapshot of `(uri, size)`, for invariant tests.
    #[cfg(test)]
    pub fn snapshot(&self) -> Vec<(String, usize)> {
        let inner = self.inner.read();
        let mut out = Vec::new();
        let mut cur = inner.mru;
        while let Some(idx) = cur {
            let node = &inner.nodes[idx];
            out.push((node.uri.clone(), node.size));
            cur = node.next;
        }
        out
    }
}

fn self_unlink(inner: &mut Inner, idx: usize) {
    let (prev, next) = (inner.nodes[idx].prev, inner.nodes[idx].next);
    match prev {
        Some(p) => inner.nodes[p].next = next,
        None => inner.mru = next,
    }
    match next {
        Some(n) => inner.nodes[n].prev = prev,
        None => inner.lru = prev,
    }
    inner.nodes[idx].prev = None;
    inner.nodes[idx].next = None;
}

fn self_link_at_mru(inner: &mut Inner, idx: usize) {
    let old_mru = inner.mru;
    inner.nodes[idx].prev = None;
    inner.nodes[idx].next = old_mru;
    if let Some(old) = old_mru {
        inner.nodes[old].prev = Some(idx);
    }
    inner.mru = Some(idx);
    if inner.lru.is_none() {
        inner.lru = Some(idx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_then_lookup_roundtrips_body() {
        let cache = Cache::new();
        cache.insert("http://h:80/a".into(), b"AAAA");
        let (_, body) = cache.lookup("http://h:80/a").unwrap();
        assert_eq!(body, b"AAAA");
    }

    #[test]
    fn lookup_miss_returns_none() {
        let cache = Cache::new();
        assert!(cache.lookup("http://h:80/nope").is_none());
    }

    #[test]
    fn insert_then_promote_moves_predecessor_to_head() {
        let cache = Cache::new();
        cache.insert("http://h:80/a".into(), b"a");
        cache.insert("http://h:80/b".into(), b"b");
        // MRU order is now b, a (b inserted last).
        assert_eq!(
            cache.snapshot(),
            vec![
                ("http://h:80/b".into(), 1),
                ("http://h:80/a".into(), 1)
            ]
        );

        let (handle, _) = cache.lookup("http://h:80/a").unwrap();
        cache.promote(handle);
        assert_eq!(
            cache.snapshot(),
            vec![
                ("http://h:80/a".into(), 1),
                ("http://h:80/b".into(), 1)
            ]
        );
    }

    #[test]
    fn fill_to_capacity_plus_one_evicts_exactly_one_lru() {
        let entry_size = 100 * 1024;
        let capacity = entry_size * 200; // a clean multiple, unlike the spec's illustrative 20 MiB
        let cache = Cache::with_capacity(capacity);
        let body = vec![0u8; entry_size];

        let n = capacity / entry_size;
        for i in 0..n {
            cache.insert(format!("http://h:80/{i}"), &body);
        }
        assert_eq!(cache.total_size(), capacity);
        assert_eq!(cache.len(), n);

        cache.insert(format!("http://h:80/{n}"), &body);

        assert_eq!(cache.total_size(), capacity);
        assert_eq!(cache.len(), n);
        // The first entry (LRU at the time of overflow) is gone.
        assert!(cache.lookup("http://h:80/0").is_none());
        // The newest entry is present.
        assert!(cache.lookup(&format!("http://h:80/{n}")).is_some());
    }

    #[test]
    fn promote_after_eviction_is_a_noop() {
        let entry_size = 100 * 1024;
        let cache = Cache::with_capacity(entry_size); // room for exactly one

        cache.insert("http://h:80/a".into(), &vec![0u8; entry_size]);
        let (handle, _) = cache.lookup("http://h:80/a").unwrap();

        // Evict "a" by inserting "b" into a cache that only fits one entry.
        cache.insert("http://h:80/b".into(), &vec![0u8; entry_size]);
        assert!(cache.lookup("http://h:80/a").is_none());

        // Promoting the stale handle must not resurrect or corrupt the list.
        cache.promote(handle);
        assert_eq!(cache.snapshot(), vec![("http://h:80/b".into(), entry_size)]);
    }

    #[test]
    fn free_pool_node_is_reused_on_next_insert() {
        let entry_size = 10;
        let cache = Cache::with_capacity(entry_size);
        cache.insert("http://h:80/a".into(), &vec![1u8; entry_size]);
        cache.insert("http://h:80/b".into(), &vec![2u8; entry_size]); // evicts a
        cache.insert("http://h:80/c".into(), &vec![3u8; entry_size]); // evicts b, reuses a's node

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.total_size(), entry_size);
        assert!(cache.lookup("http://h:80/c").is_some());
    }

    #[test]
    fn no_two_in_use_entries_share_a_uri_key() {
        // insert() always adds a fresh node even for a repeated key; this
        // test documents that callers (the pipeline) are responsible for
        // checking `lookup` before inserting to preserve invariant I4 — the
        // cache itself does not deduplicate on insert.
        let cache = Cache::with_capacity(1000);
        cache.insert("http://h:80/a".into(), b"first");
        cache.insert("http://h:80/a".into(), b"second");
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn boundary_object_sizes() {
        let cache = Cache::with_capacity(MAX_CACHE_SIZE);
        let at_cap = vec![0u8; MAX_OBJECT_SIZE];
        cache.insert("http://h:80/exact".into(), &at_cap);
        assert!(cache.lookup("http://h:80/exact").is_some());
    }
}
