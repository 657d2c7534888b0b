//! The accelerator context every pipeline is constructed against.
//!
//! A [`DeviceContext`] is an explicitly owned handle, cloned into whatever needs it; there
//! is no process-wide device state. It tracks the device memory budget and holds armed
//! test faults.

use super::error::OffloadError;
use super::queue::Stage;
use crate::core::models::locality::LocalityClass;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, warn};

/// Device-resident storage shared between the pipeline and the commands it issues.
pub type DeviceSlice<T> = Arc<Mutex<Vec<T>>>;

#[derive(Debug)]
struct ContextInner {
    name: String,
    capacity: Option<usize>,
    allocated: Mutex<usize>,
    armed_faults: Mutex<Vec<(LocalityClass, Stage)>>,
}

#[derive(Debug, Clone)]
pub struct DeviceContext {
    inner: Arc<ContextInner>,
}

impl DeviceContext {
    /// A context with `capacity` bytes of device memory, unbounded when `None`.
    pub fn new(name: impl Into<String>, capacity: Option<usize>) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                name: name.into(),
                capacity,
                allocated: Mutex::new(0),
                armed_faults: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn capacity(&self) -> Option<usize> {
        self.inner.capacity
    }

    pub fn allocated_bytes(&self) -> usize {
        *self.inner.allocated.lock()
    }

    /// Allocates a zero-initialized buffer of `len` elements.
    pub fn allocate<T: Clone + Default>(&self, len: usize) -> Result<DeviceBuffer<T>, OffloadError> {
        let bytes = len * size_of::<T>();
        self.reserve(bytes)?;
        Ok(DeviceBuffer {
            data: Arc::new(Mutex::new(vec![T::default(); len])),
            bytes,
            context: self.clone(),
        })
    }

    /// Arms a one-shot fault: the next `stage` command executed on the `locality` queue fails.
    pub fn inject_fault(&self, locality: LocalityClass, stage: Stage) {
        warn!(%locality, %stage, "Arming injected device fault");
        self.inner.armed_faults.lock().push((locality, stage));
    }

    /// Consumes an armed fault matching `locality` and `stage`, if any.
    pub(crate) fn take_fault(&self, locality: LocalityClass, stage: Stage) -> bool {
        let mut faults = self.inner.armed_faults.lock();
        match faults.iter().position(|f| *f == (locality, stage)) {
            Some(idx) => {
                faults.remove(idx);
                true
            }
            None => false,
        }
    }

    fn reserve(&self, bytes: usize) -> Result<(), OffloadError> {
        let mut allocated = self.inner.allocated.lock();
        if let Some(capacity) = self.inner.capacity {
            let available = capacity.saturating_sub(*allocated);
            if bytes > available {
                return Err(OffloadError::Allocation {
                    requested: bytes,
                    available,
                });
            }
        }
        *allocated += bytes;
        Ok(())
    }

    fn release(&self, bytes: usize) {
        let mut allocated = self.inner.allocated.lock();
        *allocated = allocated.saturating_sub(bytes);
    }
}

/// An owned device allocation. Dropping it returns its bytes to the context's budget.
#[derive(Debug)]
pub struct DeviceBuffer<T> {
    data: DeviceSlice<T>,
    bytes: usize,
    context: DeviceContext,
}

impl<T: Clone + Default> DeviceBuffer<T> {
    /// Allocated element count.
    pub fn capacity(&self) -> usize {
        self.data.lock().len()
    }

    pub fn bytes(&self) -> usize {
        self.bytes
    }

    /// A handle for commands running on an execution queue.
    pub fn slice(&self) -> DeviceSlice<T> {
        Arc::clone(&self.data)
    }

    /// Makes room for at least `len` elements, over-allocating by `growth` when the
    /// buffer has to grow. Returns whether a reallocation happened; contents are not
    /// preserved across one.
    ///
    /// Must only be called while no queued command holds this buffer.
    pub fn ensure_capacity(&mut self, len: usize, growth: f64) -> Result<bool, OffloadError> {
        let current = self.capacity();
        if current >= len {
            return Ok(false);
        }
        let grown = ((len as f64) * growth).ceil() as usize;
        let new_len = grown.max(len);
        let new_bytes = new_len * size_of::<T>();

        self.context.release(self.bytes);
        self.bytes = 0;
        let mut data = self.data.lock();
        data.clear();
        data.shrink_to_fit();
        self.context.reserve(new_bytes)?;
        *data = vec![T::default(); new_len];
        self.bytes = new_bytes;
        debug!(from = current, to = new_len, bytes = new_bytes, "Reallocated device buffer");
        Ok(true)
    }
}

impl<T> Drop for DeviceBuffer<T> {
    fn drop(&mut self) {
        self.context.release(self.bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocation_is_charged_and_released_on_drop() {
        let ctx = DeviceContext::new("test", None);
        let buffer = ctx.allocate::<f64>(16).unwrap();
        assert_eq!(ctx.allocated_bytes(), 128);
        assert_eq!(buffer.capacity(), 16);
        drop(buffer);
        assert_eq!(ctx.allocated_bytes(), 0);
    }

    #[test]
    fn allocation_beyond_capacity_fails() {
        let ctx = DeviceContext::new("small", Some(64));
        let _held = ctx.allocate::<u8>(60).unwrap();
        let err = ctx.allocate::<f64>(1).unwrap_err();
        assert!(matches!(
            err,
            OffloadError::Allocation {
                requested: 8,
                available: 4
            }
        ));
    }

    #[test]
    fn growth_over_allocates_and_reuses() {
        let ctx = DeviceContext::new("test", None);
        let mut buffer = ctx.allocate::<u32>(0).unwrap();
        assert!(buffer.ensure_capacity(10, 1.5).unwrap());
        assert_eq!(buffer.capacity(), 15);
        assert_eq!(ctx.allocated_bytes(), 60);
        assert!(!buffer.ensure_capacity(12, 1.5).unwrap());
        assert_eq!(buffer.capacity(), 15);
    }

    #[test]
    fn failed_growth_leaves_nothing_charged() {
        let ctx = DeviceContext::new("small", Some(32));
        let mut buffer = ctx.allocate::<u8>(16).unwrap();
        assert!(buffer.ensure_capacity(64, 1.0).is_err());
        assert_eq!(ctx.allocated_bytes(), 0);
        drop(buffer);
        assert_eq!(ctx.allocated_bytes(), 0);
    }

    #[test]
    fn injected_faults_fire_once_per_arming() {
        let ctx = DeviceContext::new("test", None);
        ctx.inject_fault(LocalityClass::Local, Stage::Kernel);
        assert!(!ctx.take_fault(LocalityClass::NonLocal, Stage::Kernel));
        assert!(!ctx.take_fault(LocalityClass::Local, Stage::Transfer));
        assert!(ctx.take_fault(LocalityClass::Local, Stage::Kernel));
        assert!(!ctx.take_fault(LocalityClass::Local, Stage::Kernel));
    }

    #[test]
    fn clones_share_one_budget() {
        let ctx = DeviceContext::new("shared", Some(100));
        let other = ctx.clone();
        let _a = ctx.allocate::<u8>(70).unwrap();
        assert!(other.allocate::<u8>(40).is_err());
        assert_eq!(other.allocated_bytes(), 70);
    }
}
