use std::marker::PhantomData;
use std::sync::atomic::{AtomicI32, Ordering};

/// Lazily assigned id storage. Zero means "not assigned yet".
pub type IdCell = AtomicI32;

/// Hands out small non-zero ids from a counter private to `Tag`.
///
/// Declare one `static` allocator per tag type; ids are unique per allocator
/// for the lifetime of the process (modulo wrap-around).
pub struct IdAllocator<Tag> {
    last_id: AtomicI32,
    _tag: PhantomData<fn() -> Tag>,
}

impl<Tag> IdAllocator<Tag> {
    pub const fn new() -> Self {
        Self {
            last_id: AtomicI32::new(0),
            _tag: PhantomData,
        }
    }

    /// Returns the id stored in `cell`, assigning a fresh one if the cell is
    /// still zero. When several threads race on the same cell they all get the
    /// value that won the compare-and-swap.
    pub fn get_id(&self, cell: &IdCell) -> i32 {
        let current = cell.load(Ordering::Acquire);
        if current != 0 {
            return current;
        }

        let new_id = self.next();
        match cell.compare_exchange(0, new_id, Ordering::AcqRel, Ordering::Acquire) {
            Ok(_) => new_id,
            Err(existing) => existing,
        }
    }

    /// Next raw value of the counter, never zero.
    pub fn next(&self) -> i32 {
        loop {
            // fetch_add wraps on overflow, so we can walk back through zero
            let id = self.last_id.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
            if id != 0 {
                return id;
            }
        }
    }
}

impl<Tag> Default for IdAllocator<Tag> {
    fn default() -> Self {
        Self::new()
    }
}
