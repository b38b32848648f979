//! Memory bridge.
//!
//! Moves bytes between the module's linear memory and the host. Requests
//! are copied out before anything else runs; responses are written into
//! space the module hands out through its `get_allocation` export.

use alloc::vec::Vec;

use crate::error::{BridgeError, BridgeResult};

/// Page size in bytes (64 KB).
pub const PAGE_SIZE: usize = 65536;

/// Maximum memory size (4 GB).
pub const MAX_MEMORY_SIZE: usize = 4 * 1024 * 1024 * 1024;

/// Initial size of the module's response scratch region.
pub const SCRATCH_INITIAL: u32 = 1024;

/// Name of the module's callback export.
pub const CALLBACK_EXPORT: &str = "handle_callback";

/// What the bridge needs from a running module.
pub trait GuestModule {
    /// The module's linear memory.
    fn memory(&self) -> &[u8];

    /// The module's linear memory, writable.
    fn memory_mut(&mut self) -> &mut [u8];

    /// Ask the module for at least `len` free bytes; returns their address.
    ///
    /// The region stays valid until the next call.
    fn get_allocation(&mut self, len: u32) -> BridgeResult<u32>;

    /// Run the module's closure registered as `callback`. `event` is a
    /// handle the module now owns, or `-1`.
    fn handle_callback(&mut self, _callback: u32, _event: i32) -> BridgeResult<()> {
        Err(BridgeError::MissingExport(CALLBACK_EXPORT))
    }
}

fn out_of_bounds(ptr: u32, len: u32, size: usize) -> BridgeError {
    BridgeError::OutOfBounds { ptr, len, size }
}

/// Check that `ptr..ptr + len` lies inside a memory of `size` bytes.
pub fn check_bounds(size: usize, ptr: u32, len: u32) -> BridgeResult<core::ops::Range<usize>> {
    let start = ptr as usize;
    let end = start
        .checked_add(len as usize)
        .ok_or_else(|| out_of_bounds(ptr, len, size))?;
    if end > size {
        return Err(out_of_bounds(ptr, len, size));
    }
    Ok(start..end)
}

/// Copy `len` bytes starting at `ptr` out of `memory`.
pub fn read_range(memory: &[u8], ptr: u32, len: u32) -> BridgeResult<Vec<u8>> {
    let range = check_bounds(memory.len(), ptr, len)?;
    Ok(memory[range].to_vec())
}

/// Write `bytes` into module-provided space and return its address.
pub fn write_response<M: GuestModule + ?Sized>(module: &mut M, bytes: &[u8]) -> BridgeResult<u32> {
    let len = u32::try_from(bytes.len())
        .map_err(|_| BridgeError::Allocation(alloc::format!("{} bytes", bytes.len())))?;
    let ptr = module.get_allocation(len)?;
    let memory = module.memory_mut();
    let size = memory.len();
    let range = check_bounds(size, ptr, len).map_err(|_| {
        BridgeError::Allocation(alloc::format!(
            "get_allocation({}) returned {:#x}, memory is {} bytes",
            len,
            ptr,
            size
        ))
    })?;
    memory[range].copy_from_slice(bytes);
    Ok(ptr)
}

/// Linear memory for an in-process module.
#[derive(Clone)]
pub struct LinearMemory {
    /// Memory data.
    data: Vec<u8>,

    /// Current size in pages.
    current_pages: u32,

    /// Maximum size in pages (if specified).
    max_pages: Option<u32>,
}

impl LinearMemory {
    /// Create a new linear memory.
    pub fn new(initial_pages: u32, max_pages: Option<u32>) -> BridgeResult<Self> {
        let initial_size = initial_pages as usize * PAGE_SIZE;

        if initial_size > MAX_MEMORY_SIZE {
            return Err(BridgeError::Allocation(
                "Initial memory size exceeds maximum".into(),
            ));
        }

        if let Some(max) = max_pages {
            if initial_pages > max {
                return Err(BridgeError::Allocation(
                    "Initial pages exceeds maximum pages".into(),
                ));
            }
        }

        let mut data = Vec::new();
        data.resize(initial_size, 0);

        Ok(LinearMemory {
            data,
            current_pages: initial_pages,
            max_pages,
        })
    }

    /// Get the current size in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Get the current size in pages.
    pub fn pages(&self) -> u32 {
        self.current_pages
    }

    /// Get the maximum size in pages.
    pub fn max_pages(&self) -> Option<u32> {
        self.max_pages
    }

    /// Grow memory by the specified number of pages.
    /// Returns the previous size in pages, or an error if growth fails.
    pub fn grow(&mut self, delta_pages: u32) -> BridgeResult<u32> {
        let new_pages = self
            .current_pages
            .checked_add(delta_pages)
            .ok_or_else(|| BridgeError::Allocation("Page count overflow".into()))?;

        if let Some(max) = self.max_pages {
            if new_pages > max {
                return Err(BridgeError::Allocation(alloc::format!(
                    "Would exceed maximum memory size ({} > {} pages)",
                    new_pages,
                    max
                )));
            }
        }

        let new_size = new_pages as usize * PAGE_SIZE;
        if new_size > MAX_MEMORY_SIZE {
            return Err(BridgeError::Allocation(
                "Would exceed absolute maximum memory size".into(),
            ));
        }

        let old_pages = self.current_pages;
        self.data.resize(new_size, 0);
        self.current_pages = new_pages;
        log::debug!("memory grew {} -> {} pages", old_pages, new_pages);

        Ok(old_pages)
    }

    /// Read bytes from memory.
    pub fn read_bytes(&self, ptr: u32, len: u32) -> BridgeResult<&[u8]> {
        let range = check_bounds(self.data.len(), ptr, len)?;
        Ok(&self.data[range])
    }

    /// Write bytes to memory.
    pub fn write_bytes(&mut self, ptr: u32, bytes: &[u8]) -> BridgeResult<()> {
        let len = u32::try_from(bytes.len()).map_err(|_| out_of_bounds(ptr, u32::MAX, self.size()))?;
        let range = check_bounds(self.data.len(), ptr, len)?;
        self.data[range].copy_from_slice(bytes);
        Ok(())
    }

    /// Whole memory.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Whole memory, writable.
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

/// In-process module: a linear memory plus the allocation export.
///
/// `get_allocation` hands out one scratch region that is reused between
/// calls and replaced by a larger one when a bigger request arrives.
pub struct LocalModule {
    memory: LinearMemory,
    /// Next free byte for `reserve`.
    heap_top: u32,
    /// Current scratch region (address, capacity).
    scratch: Option<(u32, u32)>,
    /// Length of the last `get_allocation` request.
    last_request: u32,
    /// `handle_callback` calls not yet taken, oldest first.
    callbacks: Vec<(u32, i32)>,
}

impl LocalModule {
    /// Address of the first byte handed out; 0 stays unused.
    const HEAP_BASE: u32 = 16;

    /// Create a module with the given memory limits.
    pub fn new(initial_pages: u32, max_pages: Option<u32>) -> BridgeResult<Self> {
        Ok(LocalModule {
            memory: LinearMemory::new(initial_pages.max(1), max_pages)?,
            heap_top: Self::HEAP_BASE,
            scratch: None,
            last_request: 0,
            callbacks: Vec::new(),
        })
    }

    /// Underlying memory.
    pub fn linear_memory(&self) -> &LinearMemory {
        &self.memory
    }

    /// Bump-allocate `len` bytes (8-aligned), growing memory if needed.
    pub fn reserve(&mut self, len: u32) -> BridgeResult<u32> {
        let ptr = self
            .heap_top
            .checked_add(7)
            .map(|p| p & !7)
            .ok_or_else(|| BridgeError::Allocation("address space exhausted".into()))?;
        let end = ptr
            .checked_add(len)
            .ok_or_else(|| BridgeError::Allocation("address space exhausted".into()))?;
        let size = self.memory.size();
        if end as usize > size {
            let missing = end as usize - size;
            let pages = missing.div_ceil(PAGE_SIZE) as u32;
            self.memory.grow(pages)?;
        }
        self.heap_top = end;
        Ok(ptr)
    }

    /// Copy `bytes` into fresh space and return `(ptr, len)`.
    pub fn store(&mut self, bytes: &[u8]) -> BridgeResult<(u32, u32)> {
        let len = u32::try_from(bytes.len())
            .map_err(|_| BridgeError::Allocation(alloc::format!("{} bytes", bytes.len())))?;
        let ptr = self.reserve(len)?;
        self.memory.write_bytes(ptr, bytes)?;
        Ok((ptr, len))
    }

    /// Bytes of the most recent response, as requested through `get_allocation`.
    pub fn response(&self) -> Option<&[u8]> {
        let (ptr, _) = self.scratch?;
        self.memory.read_bytes(ptr, self.last_request).ok()
    }

    /// Current scratch capacity.
    pub fn scratch_capacity(&self) -> u32 {
        self.scratch.map_or(0, |(_, cap)| cap)
    }

    /// Take the `(callback, event)` pairs delivered since the last take.
    pub fn take_callbacks(&mut self) -> Vec<(u32, i32)> {
        core::mem::take(&mut self.callbacks)
    }
}

impl GuestModule for LocalModule {
    fn memory(&self) -> &[u8] {
        self.memory.data()
    }

    fn memory_mut(&mut self) -> &mut [u8] {
        self.memory.data_mut()
    }

    fn get_allocation(&mut self, len: u32) -> BridgeResult<u32> {
        let ptr = match self.scratch {
            Some((ptr, cap)) if cap >= len => ptr,
            current => {
                let cap = len.max(SCRATCH_INITIAL).max(current.map_or(0, |(_, c)| c));
                let ptr = self.reserve(cap)?;
                log::debug!("scratch region now {} bytes at {:#x}", cap, ptr);
                self.scratch = Some((ptr, cap));
                ptr
            }
        };
        self.last_request = len;
        Ok(ptr)
    }

    fn handle_callback(&mut self, callback: u32, event: i32) -> BridgeResult<()> {
        self.callbacks.push((callback, event));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_range_boundary() {
        let memory = [0u8; 32];
        assert_eq!(read_range(&memory, 30, 2).unwrap().len(), 2);
        assert_eq!(read_range(&memory, 32, 0).unwrap().len(), 0);
        assert_eq!(
            read_range(&memory, 31, 2),
            Err(BridgeError::OutOfBounds { ptr: 31, len: 2, size: 32 })
        );
        assert!(read_range(&memory, u32::MAX, u32::MAX).is_err());
    }

    #[test]
    fn test_read_range_copies() {
        let mut memory = [1u8, 2, 3, 4];
        let copy = read_range(&memory, 1, 2).unwrap();
        memory[1] = 9;
        assert_eq!(copy, alloc::vec![2, 3]);
    }

    #[test]
    fn test_linear_memory_grow() {
        let mut mem = LinearMemory::new(1, Some(2)).unwrap();
        assert_eq!(mem.size(), PAGE_SIZE);
        assert_eq!(mem.grow(1).unwrap(), 1);
        assert_eq!(mem.pages(), 2);
        assert!(mem.grow(1).is_err());
        assert!(LinearMemory::new(3, Some(2)).is_err());
    }

    #[test]
    fn test_scratch_is_reused_until_outgrown() {
        let mut module = LocalModule::new(1, None).unwrap();
        let a = module.get_allocation(10).unwrap();
        let b = module.get_allocation(SCRATCH_INITIAL).unwrap();
        assert_eq!(a, b);
        assert_eq!(module.scratch_capacity(), SCRATCH_INITIAL);

        let c = module.get_allocation(4000).unwrap();
        assert_ne!(c, a);
        assert_eq!(module.scratch_capacity(), 4000);
    }

    #[test]
    fn test_write_response_and_growth() {
        let mut module = LocalModule::new(1, Some(4)).unwrap();
        let big = alloc::vec![7u8; PAGE_SIZE + 10];
        let ptr = write_response(&mut module, &big).unwrap();
        assert!(module.linear_memory().pages() >= 2);
        assert_eq!(module.response().unwrap(), &big[..]);
        assert_eq!(module.memory()[ptr as usize], 7);
    }

    #[test]
    fn test_store_is_aligned() {
        let mut module = LocalModule::new(1, None).unwrap();
        let (p1, _) = module.store(b"abc").unwrap();
        let (p2, l2) = module.store(b"de").unwrap();
        assert_eq!(p1 % 8, 0);
        assert_eq!(p2 % 8, 0);
        assert_eq!(read_range(module.memory(), p2, l2).unwrap(), b"de");
    }

    struct LyingModule(alloc::vec::Vec<u8>);

    impl GuestModule for LyingModule {
        fn memory(&self) -> &[u8] {
            &self.0
        }
        fn memory_mut(&mut self) -> &mut [u8] {
            &mut self.0
        }
        fn get_allocation(&mut self, _len: u32) -> BridgeResult<u32> {
            Ok(self.0.len() as u32)
        }
    }

    #[test]
    fn test_write_response_rejects_bad_allocation() {
        let mut module = LyingModule(alloc::vec![0; 8]);
        assert!(matches!(
            write_response(&mut module, &[1, 2]),
            Err(BridgeError::Allocation(_))
        ));
        assert_eq!(module.memory(), &[0; 8]);
    }
}
