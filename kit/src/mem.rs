//! Heap: first-fit allocator over one static arena.
//!
//! **Layout:** every block, including the root, starts with a 16-byte
//! aligned [`Header`] `{prev, next, size}`. Live blocks form a list sorted by
//! address; `size` covers the header and the payload. The root header spans
//! the whole arena and is never handed out.
//!
//! **Allocation** walks the list and takes the first gap between the end of
//! one block and the start of the next (or the end of the arena) that fits.
//!
//! **Free** only unlinks the block. There is no free list and no coalescing
//! step; space left by unlinked blocks simply becomes part of the gap the
//! next walk sees.
//!
//! Foreground use only: nothing here masks interrupts, and interrupt
//! handlers must not allocate.

use core::alloc::{GlobalAlloc, Layout};
use core::ptr::{self, NonNull};

use spin::Mutex;

/// Block and payload alignment.
pub const ALIGNMENT: usize = 0x10;

#[inline]
const fn align_up(x: usize) -> usize {
    (x + (ALIGNMENT - 1)) & !(ALIGNMENT - 1)
}

#[repr(C)]
struct Header {
    prev: *mut Header,
    next: *mut Header,
    size: usize,
}

/// Header footprint including padding.
const HEADER_SIZE: usize = align_up(core::mem::size_of::<Header>());

/// Usage figures reported by [`Heap::profile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Profile {
    /// Bytes held by live blocks, headers included.
    pub used: usize,
    /// Bytes available to blocks.
    pub total: usize,
    /// Live blocks.
    pub blocks: usize,
}

pub struct Heap {
    root: *mut Header,
}

// Safety: the heap only ever touches its own arena; `LockedHeap` provides
// the exclusion.
unsafe impl Send for Heap {}

impl Heap {
    pub const fn empty() -> Self {
        Self { root: ptr::null_mut() }
    }

    /// Take ownership of `size` bytes at `start`.
    ///
    /// # Safety
    ///
    /// The region must be valid for reads and writes, unused by anything
    /// else for as long as this heap lives, and large enough for a header
    /// after alignment.
    pub unsafe fn init(&mut self, start: *mut u8, size: usize) {
        let base = align_up(start as usize);
        let end = start as usize + size;
        let root = base as *mut Header;
        // SAFETY: `root` lies inside the caller's region and is aligned.
        unsafe {
            root.write(Header {
                prev: ptr::null_mut(),
                next: ptr::null_mut(),
                size: end - base,
            });
        }
        self.root = root;
    }

    pub fn is_initialised(&self) -> bool {
        !self.root.is_null()
    }

    /// First-fit allocation. `None` when no gap is large enough.
    pub fn alloc(&mut self, size: usize) -> Option<NonNull<u8>> {
        if self.root.is_null() {
            return None;
        }
        // Payload rounded up, plus its header.
        let size = size.checked_add(HEADER_SIZE + ALIGNMENT - 1)? & !(ALIGNMENT - 1);

        // SAFETY: every header reachable from `root` was written by `init`
        // or by a previous `alloc` inside the arena.
        unsafe {
            let root = self.root;
            let arena_end = root as usize + (*root).size;
            let mut hpos = root as usize + HEADER_SIZE;
            let mut prev = root;
            let mut next = (*prev).next;

            while !next.is_null() {
                if next as usize - hpos >= size {
                    break;
                }
                hpos = next as usize + (*next).size;
                prev = next;
                next = (*prev).next;
            }
            if next.is_null() && arena_end.saturating_sub(hpos) < size {
                return None;
            }

            let head = hpos as *mut Header;
            head.write(Header { prev, next, size });
            if !next.is_null() {
                (*next).prev = head;
            }
            (*prev).next = head;

            NonNull::new((hpos + HEADER_SIZE) as *mut u8)
        }
    }

    /// [`Heap::alloc`], treating exhaustion as fatal.
    pub fn alloc_or_abort(&mut self, size: usize) -> NonNull<u8> {
        match self.alloc(size) {
            Some(block) => block,
            None => panic!("Mem::Alloc failed"),
        }
    }

    /// Release a block. Null is ignored.
    ///
    /// # Safety
    ///
    /// `block` must have come from this heap and not been freed since.
    pub unsafe fn free(&mut self, block: *mut u8) {
        if block.is_null() {
            return;
        }
        // SAFETY: the caller guarantees `block` is a live payload pointer,
        // so a valid header sits right before it.
        unsafe {
            let head = block.sub(HEADER_SIZE) as *mut Header;
            let prev = (*head).prev;
            let next = (*head).next;
            (*prev).next = next;
            if !next.is_null() {
                (*next).prev = prev;
            }
        }
    }

    /// Resize a block, moving it if it does not fit in place.
    ///
    /// Returns `None` (leaving `block` untouched) if a move was needed and
    /// no gap fits. A null `block` behaves like [`Heap::alloc`].
    ///
    /// # Safety
    ///
    /// As for [`Heap::free`].
    pub unsafe fn realloc(&mut self, block: *mut u8, size: usize) -> Option<NonNull<u8>> {
        if block.is_null() {
            return self.alloc(size);
        }
        // SAFETY: as in `free`.
        let capacity = unsafe { (*(block.sub(HEADER_SIZE) as *mut Header)).size - HEADER_SIZE };
        // `capacity` is a multiple of the alignment.
        if size <= capacity {
            return NonNull::new(block);
        }

        let moved = self.alloc(size)?;
        // SAFETY: both blocks are live, distinct and at least `capacity`
        // bytes long.
        unsafe {
            ptr::copy_nonoverlapping(block, moved.as_ptr(), capacity.min(size));
            self.free(block);
        }
        Some(moved)
    }

    pub fn profile(&self) -> Profile {
        if self.root.is_null() {
            return Profile::default();
        }
        let mut profile = Profile::default();
        // SAFETY: walks headers written by `init`/`alloc`.
        unsafe {
            profile.total = (*self.root).size - HEADER_SIZE;
            let mut head = (*self.root).next;
            while !head.is_null() {
                profile.used += (*head).size;
                profile.blocks += 1;
                head = (*head).next;
            }
        }
        profile
    }
}

// ── Global allocator ────────────────────────────────────────────

/// [`Heap`] behind a spin lock, usable as `#[global_allocator]`.
pub struct LockedHeap(Mutex<Heap>);

impl LockedHeap {
    pub const fn empty() -> Self {
        Self(Mutex::new(Heap::empty()))
    }

    /// # Safety
    ///
    /// As for [`Heap::init`].
    pub unsafe fn init(&self, start: *mut u8, size: usize) {
        let mut heap = self.0.lock();
        unsafe { heap.init(start, size) };
        plog::info!(
            "heap initialised: {} KiB at {:#x}",
            heap.profile().total / 1024,
            start as usize,
        );
    }

    pub fn profile(&self) -> Profile {
        self.0.lock().profile()
    }
}

unsafe impl GlobalAlloc for LockedHeap {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        if layout.align() > ALIGNMENT {
            return ptr::null_mut();
        }
        self.0
            .lock()
            .alloc(layout.size())
            .map_or(ptr::null_mut(), NonNull::as_ptr)
    }

    unsafe fn dealloc(&self, block: *mut u8, _layout: Layout) {
        unsafe { self.0.lock().free(block) }
    }

    unsafe fn realloc(&self, block: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        if layout.align() > ALIGNMENT {
            return ptr::null_mut();
        }
        unsafe { self.0.lock().realloc(block, new_size) }.map_or(ptr::null_mut(), NonNull::as_ptr)
    }
}
