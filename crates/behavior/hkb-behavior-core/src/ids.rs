//! Object id allocation.

/// Numeric suffix of an id (`"object42"` -> 42). Ids without trailing digits have none.
pub fn numeric_suffix(id: &str) -> Option<u64> {
    let digits_start = id
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(i, _)| i)?;
    id[digits_start..].parse().ok()
}

/// Monotonic allocator for object ids.
/// The counter only moves forward, so ids of deleted objects are never handed out again.
/// It starts at 1: suffix 0 belongs to the null pointer.
#[derive(Debug, Clone)]
pub struct IdAllocator {
    next: u64,
}

impl Default for IdAllocator {
    fn default() -> Self {
        IdAllocator { next: 1 }
    }
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed past the highest numeric suffix among `ids`.
    pub fn seeded<'a>(ids: impl IntoIterator<Item = &'a str>) -> Self {
        let mut alloc = Self::new();
        for id in ids {
            alloc.observe(id);
        }
        alloc
    }

    /// Account for an id that entered the container from elsewhere.
    #[inline]
    pub fn observe(&mut self, id: &str) {
        if let Some(n) = numeric_suffix(id) {
            self.next = self.next.max(n.saturating_add(1));
        }
    }

    /// Next counter value, for inspection.
    pub fn peek(&self) -> u64 {
        self.next
    }

    /// `prefix + counter`, skipping any candidate `taken` reports as in use.
    /// `None` once the counter is exhausted.
    pub fn alloc(&mut self, prefix: &str, taken: impl Fn(&str) -> bool) -> Option<String> {
        loop {
            let n = self.next;
            self.next = n.checked_add(1)?;
            let candidate = format!("{prefix}{n}");
            if !taken(&candidate) {
                return Some(candidate);
            }
        }
    }
}
