//! Collection of generic fields which implement a sub-object

use pdosync_common::{sdo::AbortCode, AtomicCell};

/// Allow transparent byte level access to a sub object
pub trait SubObjectAccess: Sync + Send {
    /// Read data from the sub object
    ///
    /// Read `buf.len()` bytes, starting at offset
    ///
    /// All sub objects are required to support partial read
    fn read(&self, offset: usize, buf: &mut [u8]) -> Result<usize, AbortCode>;

    /// Return the amount of data which can be read
    fn read_size(&self) -> usize;

    /// Write data to the sub object
    ///
    /// For most objects, the length of data must match the size of the object exactly.
    ///
    /// # Errors
    ///
    /// - [`AbortCode::DataTypeMismatchLengthHigh`] if `data.len()` exceeds the object size
    /// - [`AbortCode::DataTypeMismatchLengthLow`] if `data.len()` is smaller than the object size
    ///   and the object does not support this
    /// - [`AbortCode::ReadOnly`] if the object does not support writing
    fn write(&self, data: &[u8]) -> Result<(), AbortCode>;

    /// Overwrite the first `data.len()` bytes of the value
    ///
    /// The default implementation only accepts a full length write.
    fn write_prefix(&self, data: &[u8]) -> Result<(), AbortCode> {
        if data.len() == self.read_size() {
            self.write(data)
        } else {
            Err(AbortCode::UnsupportedAccess)
        }
    }
}

/// A sub object which contains a single scalar value of type T, which is a standard rust type
#[allow(missing_debug_implementations)]
pub struct ScalarField<T: Copy> {
    value: AtomicCell<T>,
}

impl<T: Send + Copy> ScalarField<T> {
    /// Create a new ScalarField with the given value
    pub const fn new(value: T) -> Self {
        Self {
            value: AtomicCell::new(value),
        }
    }

    /// Atomically read the value of the field
    pub fn load(&self) -> T {
        self.value.load()
    }

    /// Atomically store a new value into the field
    pub fn store(&self, value: T) {
        self.value.store(value);
    }
}

impl<T: Copy + Default + Send> Default for ScalarField<T> {
    fn default() -> Self {
        Self {
            value: AtomicCell::default(),
        }
    }
}

macro_rules! impl_scalar_field {
    ($rust_type: ty) => {
        impl SubObjectAccess for ScalarField<$rust_type> {
            fn read(&self, offset: usize, buf: &mut [u8]) -> Result<usize, AbortCode> {
                let bytes = self.value.load().to_le_bytes();
                if offset < bytes.len() {
                    let read_len = buf.len().min(bytes.len() - offset);
                    buf[0..read_len].copy_from_slice(&bytes[offset..offset + read_len]);
                    Ok(read_len)
                } else {
                    Ok(0)
                }
            }

            fn read_size(&self) -> usize {
                core::mem::size_of::<$rust_type>()
            }

            fn write(&self, data: &[u8]) -> Result<(), AbortCode> {
                let value = <$rust_type>::from_le_bytes(data.try_into().map_err(|_| {
                    if data.len() < size_of::<$rust_type>() {
                        AbortCode::DataTypeMismatchLengthLow
                    } else {
                        AbortCode::DataTypeMismatchLengthHigh
                    }
                })?);
                self.value.store(value);
                Ok(())
            }

            fn write_prefix(&self, data: &[u8]) -> Result<(), AbortCode> {
                if data.len() > size_of::<$rust_type>() {
                    return Err(AbortCode::DataTypeMismatchLengthHigh);
                }
                // The closure always returns Some, so the update can't fail
                let _ = self.value.fetch_update(|old| {
                    let mut bytes = old.to_le_bytes();
                    bytes[..data.len()].copy_from_slice(data);
                    Some(<$rust_type>::from_le_bytes(bytes))
                });
                Ok(())
            }
        }
    };
}

impl_scalar_field!(u8);
impl_scalar_field!(u16);
impl_scalar_field!(u32);
impl_scalar_field!(i8);
impl_scalar_field!(i16);
impl_scalar_field!(i32);
impl_scalar_field!(f32);

// bool doesn't support from_le_bytes so it needs a special implementation
impl SubObjectAccess for ScalarField<bool> {
    fn read(&self, offset: usize, buf: &mut [u8]) -> Result<usize, AbortCode> {
        let value = self.value.load();
        if offset != 0 || buf.len() > 1 {
            return Err(AbortCode::DataTypeMismatchLengthHigh);
        }
        if let Some(b) = buf.first_mut() {
            *b = value as u8;
        }
        Ok(buf.len())
    }

    fn read_size(&self) -> usize {
        1
    }

    fn write(&self, data: &[u8]) -> Result<(), AbortCode> {
        match data {
            [value] => {
                self.value.store(*value != 0);
                Ok(())
            }
            [] => Err(AbortCode::DataTypeMismatchLengthLow),
            _ => Err(AbortCode::DataTypeMismatchLengthHigh),
        }
    }

    fn write_prefix(&self, data: &[u8]) -> Result<(), AbortCode> {
        if data.is_empty() {
            Ok(())
        } else {
            self.write(data)
        }
    }
}

/// A sub object which holds a constant value
#[allow(missing_debug_implementations)]
pub struct ConstField<const N: usize> {
    bytes: [u8; N],
}

impl<const N: usize> ConstField<N> {
    /// Create a new ConstField
    pub const fn new(bytes: [u8; N]) -> Self {
        Self { bytes }
    }
}

impl<const N: usize> SubObjectAccess for ConstField<N> {
    fn read(&self, offset: usize, buf: &mut [u8]) -> Result<usize, AbortCode> {
        if offset < N {
            let read_len = buf.len().min(N - offset);
            buf[0..read_len].copy_from_slice(&self.bytes[offset..offset + read_len]);
            Ok(read_len)
        } else {
            Ok(0)
        }
    }

    fn read_size(&self) -> usize {
        N
    }

    fn write(&self, _data: &[u8]) -> Result<(), AbortCode> {
        Err(AbortCode::ReadOnly)
    }

    fn write_prefix(&self, _data: &[u8]) -> Result<(), AbortCode> {
        Err(AbortCode::ReadOnly)
    }
}
