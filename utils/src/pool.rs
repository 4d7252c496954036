//! Fixed-size block arenas for node-heavy containers.
//!
//! An [`Arena`] hands out blocks of exactly one [`Layout`]. Returned blocks are kept on a
//! lock-free freelist ([`crossbeam_queue::ArrayQueue`]) and reused by later allocations, so
//! containers that allocate many small nodes of the same type avoid general-purpose allocator
//! churn.
//!
//! # Thread Safety
//!
//! [`Arena`] and [`ArenaRegistry`] are `Send + Sync`. Allocation and deallocation are lock-free;
//! only the creation of a new arena in a registry takes a lock.
//!
//! # Lifecycle
//!
//! Blocks hold a weak reference to their arena:
//! - If a block is returned after its arena is dropped, it is deallocated directly.
//! - The process-wide registry ([`ArenaRegistry::global`]) is never torn down, so arenas obtained
//!   from it live until process exit.
//!
//! # Misuse
//!
//! A block must be returned to the arena that produced it. [`Arena::deallocate`] asserts this in
//! debug builds; in release builds the block is routed back to its own arena regardless.

use crossbeam_queue::ArrayQueue;
use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{counter::Counter, family::Family, gauge::Gauge},
    registry::Registry,
};
use std::{
    alloc::{alloc, dealloc, handle_alloc_error, Layout},
    collections::HashMap,
    fmt,
    marker::PhantomData,
    mem::ManuallyDrop,
    num::NonZeroUsize,
    ops::{Deref, DerefMut},
    ptr::{self, NonNull},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex, OnceLock, PoisonError, Weak,
    },
};
use thiserror::Error;
use tracing::debug;

/// Errors returned by arena operations.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArenaError {
    #[error("layout mismatch: arena serves {arena_size}/{arena_align}, value needs {size}/{align}")]
    LayoutMismatch {
        arena_size: usize,
        arena_align: usize,
        size: usize,
        align: usize,
    },
}

/// Configuration for arenas created by an [`ArenaRegistry`].
#[derive(Debug, Clone)]
pub struct ArenaConfig {
    /// Maximum number of free blocks cached per arena. Blocks returned beyond
    /// this bound are deallocated.
    pub max_free: NonZeroUsize,
    /// Number of blocks to allocate eagerly when an arena is created.
    pub prefill: usize,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            max_free: crate::NZUsize!(4096),
            prefill: 0,
        }
    }
}

impl ArenaConfig {
    /// Validates the configuration, panicking on invalid values.
    ///
    /// # Panics
    ///
    /// - `prefill > max_free`
    fn validate(&self) {
        assert!(
            self.prefill <= self.max_free.get(),
            "prefill ({}) must be <= max_free ({})",
            self.prefill,
            self.max_free
        );
    }
}

/// Returns the block layout used for values of type `T`.
///
/// Zero-sized types are given a one-byte block so every block has a unique address.
pub fn layout_for<T>() -> Layout {
    let layout = Layout::new::<T>();
    if layout.size() == 0 {
        // A size of one with the type's alignment is always a valid layout.
        Layout::from_size_align(1, layout.align()).unwrap_or(layout)
    } else {
        layout
    }
}

/// Label for arena metrics, identifying the block size.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct BlockSizeLabel {
    block_size: u64,
}

/// Metrics shared by every arena of a registry.
#[derive(Clone, Default)]
struct ArenaMetrics {
    /// Number of blocks currently handed out.
    allocated: Family<BlockSizeLabel, Gauge>,
    /// Number of blocks cached on freelists.
    available: Family<BlockSizeLabel, Gauge>,
    /// Total number of allocations served.
    allocations_total: Family<BlockSizeLabel, Counter>,
}

/// A raw allocation of one block.
///
/// Deallocates itself on drop using the stored layout.
struct RawBlock {
    ptr: NonNull<u8>,
    layout: Layout,
}

// SAFETY: RawBlock owns its memory and can be sent between threads.
unsafe impl Send for RawBlock {}
// SAFETY: RawBlock exposes no interior mutability through a shared reference.
unsafe impl Sync for RawBlock {}

impl RawBlock {
    fn new(layout: Layout) -> Self {
        // SAFETY: `layout_for` never produces a zero-sized layout.
        let ptr = unsafe { alloc(layout) };
        let Some(ptr) = NonNull::new(ptr) else {
            handle_alloc_error(layout);
        };
        Self { ptr, layout }
    }
}

impl Drop for RawBlock {
    fn drop(&mut self) {
        // SAFETY: ptr was allocated with this layout.
        unsafe { dealloc(self.ptr.as_ptr(), self.layout) };
    }
}

struct ArenaInner {
    layout: Layout,
    free: ArrayQueue<RawBlock>,
    allocated: AtomicUsize,
    label: BlockSizeLabel,
    metrics: ArenaMetrics,
}

impl ArenaInner {
    fn recycle(&self, raw: RawBlock) {
        debug_assert_eq!(raw.layout, self.layout);
        self.allocated.fetch_sub(1, Ordering::Relaxed);
        self.metrics.allocated.get_or_create(&self.label).dec();
        if self.free.push(raw).is_ok() {
            self.metrics.available.get_or_create(&self.label).inc();
        }
        // else: freelist full, the block is dropped and deallocated
    }
}

/// A fixed-layout block allocator.
///
/// Cloning an [`Arena`] yields another handle to the same freelist.
#[derive(Clone)]
pub struct Arena {
    inner: Arc<ArenaInner>,
}

impl fmt::Debug for Arena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arena")
            .field("layout", &self.inner.layout)
            .field("allocated", &self.allocated())
            .field("available", &self.available())
            .finish()
    }
}

impl Arena {
    /// Creates a standalone arena serving blocks of `layout`.
    ///
    /// # Panics
    ///
    /// Panics if the configuration is invalid or `layout` is zero-sized.
    pub fn new(layout: Layout, config: &ArenaConfig) -> Self {
        Self::with_metrics(layout, config, ArenaMetrics::default())
    }

    /// Creates a standalone arena serving blocks for values of type `T`.
    pub fn for_type<T>(config: &ArenaConfig) -> Self {
        Self::new(layout_for::<T>(), config)
    }

    fn with_metrics(layout: Layout, config: &ArenaConfig, metrics: ArenaMetrics) -> Self {
        config.validate();
        assert!(layout.size() > 0, "arena blocks must not be zero-sized");

        let label = BlockSizeLabel {
            block_size: layout.size() as u64,
        };
        let free = ArrayQueue::new(config.max_free.get());
        for _ in 0..config.prefill {
            let _ = free.push(RawBlock::new(layout));
        }
        metrics
            .available
            .get_or_create(&label)
            .inc_by(config.prefill as i64);

        Self {
            inner: Arc::new(ArenaInner {
                layout,
                free,
                allocated: AtomicUsize::new(0),
                label,
                metrics,
            }),
        }
    }

    /// Returns the layout of every block served by this arena.
    pub fn layout(&self) -> Layout {
        self.inner.layout
    }

    /// Returns the number of blocks currently handed out.
    pub fn allocated(&self) -> usize {
        self.inner.allocated.load(Ordering::Relaxed)
    }

    /// Returns the number of blocks cached for reuse.
    pub fn available(&self) -> usize {
        self.inner.free.len()
    }

    /// Returns one block, reusing a cached block when possible.
    ///
    /// The block's memory is **uninitialized**.
    pub fn allocate(&self) -> Block {
        let inner = &self.inner;
        let raw = match inner.free.pop() {
            Some(raw) => {
                inner.metrics.available.get_or_create(&inner.label).dec();
                raw
            }
            None => RawBlock::new(inner.layout),
        };
        inner.allocated.fetch_add(1, Ordering::Relaxed);
        inner.metrics.allocated.get_or_create(&inner.label).inc();
        inner
            .metrics
            .allocations_total
            .get_or_create(&inner.label)
            .inc();

        Block {
            raw: ManuallyDrop::new(raw),
            arena: Arc::downgrade(inner),
        }
    }

    /// Returns a block to this arena.
    ///
    /// Equivalent to dropping the block; debug builds additionally assert the block was produced
    /// by this arena.
    pub fn deallocate(&self, block: Block) {
        debug_assert!(
            block.belongs_to(self),
            "block returned to an arena that did not allocate it"
        );
        drop(block);
    }
}

/// One block of arena memory.
///
/// The block is returned to its arena when dropped (or deallocated directly if the arena is
/// gone).
pub struct Block {
    raw: ManuallyDrop<RawBlock>,
    arena: Weak<ArenaInner>,
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Block")
            .field("ptr", &self.raw.ptr)
            .field("layout", &self.raw.layout)
            .finish()
    }
}

impl Block {
    /// Returns a pointer to the start of the block.
    pub fn as_ptr(&self) -> NonNull<u8> {
        self.raw.ptr
    }

    /// Returns the layout of the block.
    pub fn layout(&self) -> Layout {
        self.raw.layout
    }

    /// Returns true if `arena` produced this block.
    pub fn belongs_to(&self, arena: &Arena) -> bool {
        ptr::eq(self.arena.as_ptr(), Arc::as_ptr(&arena.inner))
    }

    /// Returns the arena this block will be returned to, if it still exists.
    pub fn arena(&self) -> Option<Arena> {
        self.arena.upgrade().map(|inner| Arena { inner })
    }
}

impl Drop for Block {
    fn drop(&mut self) {
        // SAFETY: Drop is only called once.
        let raw = unsafe { ManuallyDrop::take(&mut self.raw) };
        if let Some(arena) = self.arena.upgrade() {
            arena.recycle(raw);
        }
        // else: raw is dropped here, which deallocates it
    }
}

/// A value stored in an arena block.
///
/// Behaves like a `Box<T>` whose storage is recycled through the arena.
pub struct Pooled<T> {
    block: Block,
    _marker: PhantomData<T>,
}

// SAFETY: Pooled<T> owns its T exclusively, like Box<T>.
unsafe impl<T: Send> Send for Pooled<T> {}
// SAFETY: Shared access to Pooled<T> only yields &T.
unsafe impl<T: Sync> Sync for Pooled<T> {}

impl<T> Pooled<T> {
    /// Moves `value` into a block of `arena`.
    ///
    /// # Panics
    ///
    /// Panics if the arena does not serve the layout of `T`.
    pub fn new_in(arena: &Arena, value: T) -> Self {
        match Self::try_new_in(arena, value) {
            Ok(pooled) => pooled,
            Err(err) => panic!("{err}"),
        }
    }

    /// Moves `value` into a block of `arena`, failing if the arena serves a different layout.
    pub fn try_new_in(arena: &Arena, value: T) -> Result<Self, ArenaError> {
        let expected = layout_for::<T>();
        let layout = arena.layout();
        if layout != expected {
            return Err(ArenaError::LayoutMismatch {
                arena_size: layout.size(),
                arena_align: layout.align(),
                size: expected.size(),
                align: expected.align(),
            });
        }

        let block = arena.allocate();
        // SAFETY: the block is sized and aligned for T and uninitialized.
        unsafe { block.as_ptr().cast::<T>().as_ptr().write(value) };
        Ok(Self {
            block,
            _marker: PhantomData,
        })
    }

    /// Moves `value` into a block of the process-wide arena for `T`.
    pub fn new(value: T) -> Self {
        Self::new_in(&ArenaRegistry::global().arena_for::<T>(), value)
    }

    /// Returns the arena backing this value, if it still exists.
    pub fn arena(&self) -> Option<Arena> {
        self.block.arena()
    }

    /// Moves the value out, returning the block to its arena.
    pub fn into_inner(self) -> T {
        let this = ManuallyDrop::new(self);
        // SAFETY: the value is initialized and `this` is never dropped, so it is read exactly once.
        let value = unsafe { this.block.as_ptr().cast::<T>().as_ptr().read() };
        // SAFETY: `this` is never used again, so the block is moved out exactly once.
        let block = unsafe { ptr::read(&this.block) };
        drop(block);
        value
    }
}

impl<T> Deref for Pooled<T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: the block holds an initialized T for the lifetime of self.
        unsafe { self.block.as_ptr().cast::<T>().as_ref() }
    }
}

impl<T> DerefMut for Pooled<T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: the block holds an initialized T and we have exclusive access.
        unsafe { self.block.as_ptr().cast::<T>().as_mut() }
    }
}

impl<T> Drop for Pooled<T> {
    fn drop(&mut self) {
        // SAFETY: the value is initialized; the block field is dropped (and recycled) afterwards.
        unsafe { ptr::drop_in_place(self.block.as_ptr().cast::<T>().as_ptr()) };
    }
}

impl<T: Clone> Clone for Pooled<T> {
    fn clone(&self) -> Self {
        let arena = self
            .arena()
            .unwrap_or_else(|| ArenaRegistry::global().arena_for::<T>());
        Self::new_in(&arena, (**self).clone())
    }
}

impl<T: fmt::Debug> fmt::Debug for Pooled<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        (**self).fmt(f)
    }
}

impl<T: PartialEq> PartialEq for Pooled<T> {
    fn eq(&self, other: &Self) -> bool {
        **self == **other
    }
}

/// A set of arenas, one per distinct block layout.
///
/// Arenas are created lazily on first request and live as long as the registry.
pub struct ArenaRegistry {
    config: ArenaConfig,
    arenas: Mutex<HashMap<Layout, Arena>>,
    metrics: ArenaMetrics,
}

impl fmt::Debug for ArenaRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArenaRegistry")
            .field("config", &self.config)
            .field("arenas", &self.len())
            .finish()
    }
}

impl Default for ArenaRegistry {
    fn default() -> Self {
        Self::new(ArenaConfig::default())
    }
}

impl ArenaRegistry {
    /// Creates an empty registry.
    ///
    /// # Panics
    ///
    /// Panics if the configuration is invalid.
    pub fn new(config: ArenaConfig) -> Self {
        config.validate();
        Self {
            config,
            arenas: Mutex::new(HashMap::new()),
            metrics: ArenaMetrics::default(),
        }
    }

    /// Returns the process-wide registry.
    pub fn global() -> &'static ArenaRegistry {
        static GLOBAL: OnceLock<ArenaRegistry> = OnceLock::new();
        GLOBAL.get_or_init(ArenaRegistry::default)
    }

    /// Returns the arena serving `layout`, creating it on first use.
    pub fn arena(&self, layout: Layout) -> Arena {
        let mut arenas = self.arenas.lock().unwrap_or_else(PoisonError::into_inner);
        arenas
            .entry(layout)
            .or_insert_with(|| {
                debug!(
                    size = layout.size(),
                    align = layout.align(),
                    "created arena"
                );
                Arena::with_metrics(layout, &self.config, self.metrics.clone())
            })
            .clone()
    }

    /// Returns the arena serving values of type `T`.
    pub fn arena_for<T>(&self) -> Arena {
        self.arena(layout_for::<T>())
    }

    /// Returns the number of arenas created so far.
    pub fn len(&self) -> usize {
        self.arenas
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns true if no arena has been created yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registers the registry's metrics with `registry`.
    pub fn register_metrics(&self, registry: &mut Registry) {
        registry.register(
            "arena_allocated",
            "Number of blocks currently allocated from arenas",
            self.metrics.allocated.clone(),
        );
        registry.register(
            "arena_available",
            "Number of blocks cached on arena freelists",
            self.metrics.available.clone(),
        );
        registry.register(
            "arena_allocations_total",
            "Total number of arena allocations",
            self.metrics.allocations_total.clone(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NZUsize;
    use prometheus_client::encoding::text::encode;
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use std::thread;

    fn test_config(max_free: usize, prefill: usize) -> ArenaConfig {
        ArenaConfig {
            max_free: NZUsize!(max_free),
            prefill,
        }
    }

    #[test]
    fn test_block_reuse() {
        let arena = Arena::for_type::<u64>(&test_config(4, 0));
        let block = arena.allocate();
        assert_eq!(block.layout(), Layout::new::<u64>());
        let ptr = block.as_ptr();
        assert_eq!(arena.allocated(), 1);
        assert_eq!(arena.available(), 0);

        arena.deallocate(block);
        assert_eq!(arena.allocated(), 0);
        assert_eq!(arena.available(), 1);

        // The cached block is handed out again
        let block = arena.allocate();
        assert_eq!(block.as_ptr(), ptr);
        assert_eq!(arena.available(), 0);
    }

    #[test]
    fn test_freelist_bound() {
        let arena = Arena::for_type::<u32>(&test_config(2, 0));
        let blocks: Vec<_> = (0..5).map(|_| arena.allocate()).collect();
        assert_eq!(arena.allocated(), 5);
        drop(blocks);
        assert_eq!(arena.allocated(), 0);
        assert_eq!(arena.available(), 2);
    }

    #[test]
    fn test_prefill() {
        let arena = Arena::for_type::<[u8; 24]>(&test_config(8, 3));
        assert_eq!(arena.available(), 3);
        let _block = arena.allocate();
        assert_eq!(arena.available(), 2);
    }

    #[test]
    #[should_panic(expected = "prefill (3) must be <= max_free (2)")]
    fn test_invalid_config() {
        ArenaRegistry::new(test_config(2, 3));
    }

    #[test]
    fn test_block_outlives_arena() {
        let arena = Arena::for_type::<u64>(&test_config(4, 0));
        let block = arena.allocate();
        drop(arena);
        assert!(block.arena().is_none());
        drop(block);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "block returned to an arena that did not allocate it")]
    fn test_foreign_block() {
        let left = Arena::for_type::<u64>(&test_config(4, 0));
        let right = Arena::for_type::<u64>(&test_config(4, 0));
        let block = left.allocate();
        right.deallocate(block);
    }

    #[test]
    fn test_pooled_value() {
        let arena = Arena::for_type::<String>(&ArenaConfig::default());
        let mut value = Pooled::new_in(&arena, String::from("alpha"));
        value.push_str("-beta");
        assert_eq!(&*value, "alpha-beta");
        assert_eq!(arena.allocated(), 1);

        let cloned = value.clone();
        assert_eq!(cloned, value);
        assert_eq!(arena.allocated(), 2);

        assert_eq!(value.into_inner(), "alpha-beta");
        assert_eq!(arena.allocated(), 1);
        drop(cloned);
        assert_eq!(arena.allocated(), 0);
        assert_eq!(arena.available(), 2);
    }

    #[test]
    fn test_pooled_drops_value() {
        struct Counted(Arc<AtomicUsize>);
        impl Drop for Counted {
            fn drop(&mut self) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let drops = Arc::new(AtomicUsize::new(0));
        let arena = Arena::for_type::<Counted>(&ArenaConfig::default());
        let pooled = Pooled::new_in(&arena, Counted(drops.clone()));
        assert_eq!(drops.load(Ordering::SeqCst), 0);
        drop(pooled);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_pooled_zero_sized() {
        let arena = Arena::for_type::<()>(&ArenaConfig::default());
        let a = Pooled::new_in(&arena, ());
        let b = Pooled::new_in(&arena, ());
        assert_ne!(a.block.as_ptr(), b.block.as_ptr());
    }

    #[test]
    fn test_layout_mismatch() {
        let arena = Arena::for_type::<u32>(&ArenaConfig::default());
        let err = Pooled::try_new_in(&arena, 1u64).unwrap_err();
        assert_eq!(
            err,
            ArenaError::LayoutMismatch {
                arena_size: 4,
                arena_align: 4,
                size: 8,
                align: 8,
            }
        );
    }

    #[test]
    fn test_registry_one_arena_per_layout() {
        let registry = ArenaRegistry::default();
        assert!(registry.is_empty());
        let a = registry.arena_for::<u64>();
        let b = registry.arena_for::<i64>();
        let c = registry.arena_for::<u32>();
        assert_eq!(registry.len(), 2);

        let block = a.allocate();
        assert!(block.belongs_to(&b));
        assert!(!block.belongs_to(&c));
    }

    #[test]
    fn test_concurrent_allocation() {
        let registry = Arc::new(ArenaRegistry::default());
        let handles: Vec<_> = (0..8u64)
            .map(|seed| {
                let registry = registry.clone();
                thread::spawn(move || {
                    let arena = registry.arena_for::<[u64; 4]>();
                    let mut rng = StdRng::seed_from_u64(seed);
                    let mut live = Vec::new();
                    for i in 0..1_000u64 {
                        if live.is_empty() || rng.gen_bool(0.6) {
                            live.push(Pooled::new_in(&arena, [i; 4]));
                        } else {
                            let index = rng.gen_range(0..live.len());
                            let value = live.swap_remove(index);
                            assert_eq!(value[0], value[3]);
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(registry.arena_for::<[u64; 4]>().allocated(), 0);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_metrics() {
        let arenas = ArenaRegistry::default();
        let mut registry = Registry::default();
        arenas.register_metrics(&mut registry);

        let arena = arenas.arena_for::<u64>();
        let _block = arena.allocate();

        let mut buffer = String::new();
        encode(&mut buffer, &registry).unwrap();
        assert!(buffer.contains("arena_allocated{block_size=\"8\"} 1"));
        assert!(buffer.contains("arena_available"));
        assert!(buffer.contains("arena_allocations_total"));
    }
}
