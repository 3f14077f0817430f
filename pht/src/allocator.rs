//! Pluggable memory provider and the buffers allocated through it.

use crate::error::{Error, Result};
use core::alloc::Layout;
use core::fmt;
use core::ops::{Deref, DerefMut};
use core::ptr::NonNull;
use core::sync::atomic::{AtomicUsize, Ordering};

/// Memory provider used for every table and graph buffer.
///
/// Tables borrow their allocator, so it must outlive them; construction hands the same allocator
/// to several worker threads, hence the [`Sync`] bound.
///
/// # Safety
///
/// Blocks returned by `malloc`, `calloc` and `realloc` must be valid for the requested layout until
/// they are passed to `free`. Blocks returned by `calloc` must be zero-filled. Callers never request
/// zero-sized layouts.
pub unsafe trait Allocator: Sync {
    /// Allocate an uninitialized block.
    fn malloc(&self, layout: Layout) -> Option<NonNull<u8>>;

    /// Allocate a zero-filled block.
    fn calloc(&self, layout: Layout) -> Option<NonNull<u8>>;

    /// Grow or shrink a block, preserving the common prefix.
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by this allocator for `layout` and not freed yet. `new_size`
    /// must be non-zero and, rounded up to `layout.align()`, must not overflow `isize`.
    unsafe fn realloc(&self, ptr: NonNull<u8>, layout: Layout, new_size: usize)
        -> Option<NonNull<u8>>;

    /// Release a block.
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by this allocator for `layout` and not freed yet.
    unsafe fn free(&self, ptr: NonNull<u8>, layout: Layout);
}

/// Allocator backed by the global heap that counts live blocks.
///
/// The counters make double frees and leaks observable, which is what the lifecycle tests rely on.
#[derive(Debug, Default)]
pub struct HeapAllocator {
    outstanding: AtomicUsize,
    total: AtomicUsize,
}

impl HeapAllocator {
    /// Create an allocator with no live blocks.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            outstanding: AtomicUsize::new(0),
            total: AtomicUsize::new(0),
        }
    }

    /// Number of blocks allocated and not yet freed.
    #[inline]
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::Acquire)
    }

    /// Number of blocks ever allocated.
    #[inline]
    pub fn total_allocations(&self) -> usize {
        self.total.load(Ordering::Acquire)
    }

    fn track(&self, ptr: *mut u8) -> Option<NonNull<u8>> {
        let ptr = NonNull::new(ptr)?;
        self.outstanding.fetch_add(1, Ordering::AcqRel);
        self.total.fetch_add(1, Ordering::AcqRel);
        Some(ptr)
    }
}

// SAFETY: Delegates to the global allocator, which upholds the block contract for non-zero sizes.
unsafe impl Allocator for HeapAllocator {
    #[inline]
    fn malloc(&self, layout: Layout) -> Option<NonNull<u8>> {
        if layout.size() == 0 {
            return None;
        }
        // SAFETY: The layout has a non-zero size.
        self.track(unsafe { std::alloc::alloc(layout) })
    }

    #[inline]
    fn calloc(&self, layout: Layout) -> Option<NonNull<u8>> {
        if layout.size() == 0 {
            return None;
        }
        // SAFETY: The layout has a non-zero size.
        self.track(unsafe { std::alloc::alloc_zeroed(layout) })
    }

    #[inline]
    unsafe fn realloc(
        &self,
        ptr: NonNull<u8>,
        layout: Layout,
        new_size: usize,
    ) -> Option<NonNull<u8>> {
        // SAFETY: Forwarded from the caller.
        let new = unsafe { std::alloc::realloc(ptr.as_ptr(), layout, new_size) };
        NonNull::new(new)
    }

    #[inline]
    unsafe fn free(&self, ptr: NonNull<u8>, layout: Layout) {
        self.outstanding.fetch_sub(1, Ordering::AcqRel);
        // SAFETY: Forwarded from the caller.
        unsafe { std::alloc::dealloc(ptr.as_ptr(), layout) };
    }
}

/// Element types for which the all-zero bit pattern is a valid value.
///
/// # Safety
///
/// Zero-filled memory must be a valid `Self`.
pub unsafe trait Zeroable: Copy {}

// SAFETY: Integers are valid at zero.
unsafe impl Zeroable for u8 {}
// SAFETY: Integers are valid at zero.
unsafe impl Zeroable for u32 {}
// SAFETY: Integers are valid at zero.
unsafe impl Zeroable for u64 {}

/// Fixed-length array allocated through an [`Allocator`].
///
/// Dereferences to a slice. The memory is returned to the allocator exactly once, on drop.
/// Zero-length buffers never touch the allocator.
pub struct Buffer<'a, T: Zeroable> {
    ptr: NonNull<T>,
    len: usize,
    allocator: &'a dyn Allocator,
}

// SAFETY: `Buffer` uniquely owns its elements, like `Vec<T>`, and the allocator is `Sync`.
unsafe impl<T: Zeroable + Send> Send for Buffer<'_, T> {}
// SAFETY: Shared access only hands out `&[T]`.
unsafe impl<T: Zeroable + Sync> Sync for Buffer<'_, T> {}

impl<'a, T: Zeroable> Buffer<'a, T> {
    fn layout(len: usize) -> Result<Layout> {
        Layout::array::<T>(len).map_err(|_| Error::OutOfMemory(usize::MAX))
    }

    /// Allocate `len` zero-initialized elements.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfMemory`] if the allocator refuses the request.
    #[inline]
    pub fn zeroed(allocator: &'a dyn Allocator, len: usize) -> Result<Self> {
        let layout = Self::layout(len)?;
        let ptr = if layout.size() == 0 {
            NonNull::dangling()
        } else {
            allocator
                .calloc(layout)
                .ok_or(Error::OutOfMemory(layout.size()))?
                .cast()
        };
        Ok(Self {
            ptr,
            len,
            allocator,
        })
    }

    /// Allocate a copy of `data`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfMemory`] if the allocator refuses the request.
    #[inline]
    pub fn from_slice(allocator: &'a dyn Allocator, data: &[T]) -> Result<Self> {
        let mut buffer = Self::zeroed(allocator, data.len())?;
        buffer.copy_from_slice(data);
        Ok(buffer)
    }

    /// Change the length, keeping the common prefix and zeroing any new tail.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfMemory`] if the allocator refuses the request. The buffer is left
    /// untouched in that case.
    pub fn resize(&mut self, new_len: usize) -> Result<()> {
        if new_len == self.len {
            return Ok(());
        }
        let old_layout = Self::layout(self.len)?;
        let new_layout = Self::layout(new_len)?;
        if old_layout.size() == 0 || new_layout.size() == 0 {
            *self = Self::zeroed(self.allocator, new_len)?;
            return Ok(());
        }

        // SAFETY: `ptr` was obtained from `allocator` for `old_layout`. `new_layout` was validated
        // by `Layout::array`.
        let ptr = unsafe {
            self.allocator
                .realloc(self.ptr.cast(), old_layout, new_layout.size())
        }
        .ok_or(Error::OutOfMemory(new_layout.size()))?;
        self.ptr = ptr.cast();

        let old_len = core::mem::replace(&mut self.len, new_len);
        if new_len > old_len {
            // SAFETY: The block now spans `new_len` elements, and zero is a valid `T`.
            unsafe {
                self.ptr
                    .as_ptr()
                    .add(old_len)
                    .write_bytes(0, new_len - old_len);
            }
        }
        Ok(())
    }

    /// Set every element to zero.
    #[inline]
    pub fn clear(&mut self) {
        // SAFETY: The block spans `len` elements, and zero is a valid `T`.
        unsafe { self.ptr.as_ptr().write_bytes(0, self.len) };
    }

    /// Drop the buffer held in `slot`, if any, leaving `None` behind.
    #[inline]
    pub fn free_pointer(slot: &mut Option<Self>) {
        drop(slot.take());
    }

    /// The allocator that owns this buffer.
    #[inline]
    #[must_use]
    pub fn allocator(&self) -> &'a dyn Allocator {
        self.allocator
    }
}

impl<T: Zeroable> Deref for Buffer<'_, T> {
    type Target = [T];

    #[inline]
    fn deref(&self) -> &[T] {
        // SAFETY: `ptr` is valid for `len` initialized elements, or dangling with `len == 0`.
        unsafe { core::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

impl<T: Zeroable> DerefMut for Buffer<'_, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut [T] {
        // SAFETY: As in `deref`, and `&mut self` guarantees uniqueness.
        unsafe { core::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl<T: Zeroable> Drop for Buffer<'_, T> {
    #[inline]
    fn drop(&mut self) {
        let Ok(layout) = Self::layout(self.len) else {
            return;
        };
        if layout.size() != 0 {
            // SAFETY: `ptr` was obtained from `allocator` for this layout and is freed only here.
            unsafe { self.allocator.free(self.ptr.cast(), layout) };
        }
    }
}

impl<T: Zeroable + fmt::Debug> fmt::Debug for Buffer<'_, T> {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}
