//! An AtomicCell type which uses a critical_section Mutex to enforce atomic store/load
//!
//! Crossbeam's AtomicCell requires CAS, which is not available on thumbv6m, so all shared state in
//! the PDO and SYNC objects goes through this type instead.

use core::cell::Cell;
use critical_section::Mutex;

/// A cell which can be shared between the receive and tick contexts
#[derive(Debug)]
pub struct AtomicCell<T: Copy> {
    inner: Mutex<Cell<T>>,
}

impl<T: Send + Copy> AtomicCell<T> {
    /// Create a new cell holding `value`
    pub const fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(Cell::new(value)),
        }
    }

    /// Read the current value
    pub fn load(&self) -> T {
        critical_section::with(|cs| self.inner.borrow(cs).get())
    }

    /// Replace the current value
    pub fn store(&self, value: T) {
        critical_section::with(|cs| self.inner.borrow(cs).set(value));
    }

    /// Replace the current value, returning the previous one
    pub fn swap(&self, value: T) -> T {
        critical_section::with(|cs| self.inner.borrow(cs).replace(value))
    }

    /// Apply `f` to the current value inside a single critical section
    ///
    /// If `f` returns `Some`, the new value is stored and the old value is returned as `Ok`.
    /// Otherwise the cell is left unchanged and the current value is returned as `Err`.
    pub fn fetch_update(&self, mut f: impl FnMut(T) -> Option<T>) -> Result<T, T> {
        critical_section::with(|cs| {
            let cell = self.inner.borrow(cs);
            let old_value = cell.get();
            match f(old_value) {
                Some(new_value) => {
                    cell.set(new_value);
                    Ok(old_value)
                }
                None => Err(old_value),
            }
        })
    }
}

impl<T: Send + Copy + Default> AtomicCell<T> {
    /// Take the value, leaving the default in its place
    pub fn take(&self) -> T {
        critical_section::with(|cs| self.inner.borrow(cs).take())
    }
}

impl<T: Default + Copy + Send> Default for AtomicCell<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_update_rejects_without_store() {
        let cell = AtomicCell::new(7u8);
        assert_eq!(Err(7), cell.fetch_update(|_| None));
        assert_eq!(Ok(7), cell.fetch_update(|v| Some(v + 1)));
        assert_eq!(8, cell.load());
        assert_eq!(8, cell.swap(1));
        assert_eq!(1, cell.take());
        assert_eq!(0, cell.load());
    }
}
