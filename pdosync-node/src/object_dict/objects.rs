//! Traits and types for implementing objects in the OD

use pdosync_common::{
    objects::{AccessType, DataType, ObjectCode, SubInfo},
    sdo::AbortCode,
};

use super::SubObjectAccess;

/// The largest object which supports writing a prefix of its value without a custom
/// implementation
const MAX_PREFIX_WRITE_SIZE: usize = 8;

/// A trait for accessing objects
///
/// Any struct which implements an object in the object dictionary must implement this trait
pub trait ObjectAccess: Sync + Send {
    /// Read raw bytes from a subobject
    ///
    /// All implementers are required to allow reading a subset of the object bytes, i.e. offset may
    /// be non-zero, and/or the buf length may be shorter than the object data. Returns the number
    /// of bytes read.
    fn read(&self, sub: u8, offset: usize, buf: &mut [u8]) -> Result<usize, AbortCode>;

    /// Get the number of bytes available for a read
    fn read_size(&self, sub: u8) -> Result<usize, AbortCode>;

    /// Write raw bytes to a subobject
    ///
    /// The length of `data` must match the size of the object, or else it will fail with either
    /// [`AbortCode::DataTypeMismatchLengthLow`] or [`AbortCode::DataTypeMismatchLengthHigh`].
    ///
    /// If the sub is does not exist, it shall fail with [`AbortCode::NoSuchSubIndex`].
    ///
    /// If the sub exists but is not writeable, it shall fail with [`AbortCode::ReadOnly`].
    fn write(&self, sub: u8, data: &[u8]) -> Result<(), AbortCode>;

    /// Write the leading bytes of a subobject, leaving the remaining bytes unchanged
    ///
    /// This is used to apply received PDO data when a mapping covers only the low order bytes of a
    /// value. The default implementation performs a read-modify-write, which is not atomic with
    /// respect to other writers; objects which can do better should override it.
    fn write_prefix(&self, sub: u8, data: &[u8]) -> Result<(), AbortCode> {
        let size = self.size(sub)?;
        if data.len() == size {
            return self.write(sub, data);
        }
        if data.len() > size {
            return Err(AbortCode::DataTypeMismatchLengthHigh);
        }
        if size > MAX_PREFIX_WRITE_SIZE {
            return Err(AbortCode::UnsupportedAccess);
        }
        let mut buf = [0u8; MAX_PREFIX_WRITE_SIZE];
        self.read(sub, 0, &mut buf[..size])?;
        buf[..data.len()].copy_from_slice(data);
        self.write(sub, &buf[..size])
    }

    /// Get the type of this object
    fn object_code(&self) -> ObjectCode;

    /// Get metadata about a sub object
    fn sub_info(&self, sub: u8) -> Result<SubInfo, AbortCode>;

    /// Get the highest sub index available in this object
    fn max_sub_number(&self) -> u8 {
        match self.object_code() {
            ObjectCode::Var => 0,
            ObjectCode::Array | ObjectCode::Record => self.read_u8(0).unwrap_or(0),
        }
    }

    /// Get the access type of a specific sub object
    fn access_type(&self, sub: u8) -> Result<AccessType, AbortCode> {
        Ok(self.sub_info(sub)?.access_type)
    }

    /// Get the data type of a specific sub object
    fn data_type(&self, sub: u8) -> Result<DataType, AbortCode> {
        Ok(self.sub_info(sub)?.data_type)
    }

    /// Get the declared size of a sub object
    fn size(&self, sub: u8) -> Result<usize, AbortCode> {
        Ok(self.sub_info(sub)?.size)
    }

    /// Read a sub object as a u32
    fn read_u32(&self, sub: u8) -> Result<u32, AbortCode> {
        let mut buf = [0; 4];
        self.read(sub, 0, &mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    /// Read a sub object as a u16
    fn read_u16(&self, sub: u8) -> Result<u16, AbortCode> {
        let mut buf = [0; 2];
        self.read(sub, 0, &mut buf)?;
        Ok(u16::from_le_bytes(buf))
    }

    /// Read a sub object as a u8
    fn read_u8(&self, sub: u8) -> Result<u8, AbortCode> {
        let mut buf = [0; 1];
        self.read(sub, 0, &mut buf)?;
        Ok(buf[0])
    }
}

/// A trait for structs which represent Objects to implement
///
/// Implementing this type allows a type with sub objects which implement [`SubObjectAccess`] to
/// implement [`ObjectAccess`] simply by providing a sub object for each sub index.
pub trait ProvidesSubObjects {
    /// Get a sub object
    ///
    /// It should return None if the sub object does not exist, and when it does exist it returns a
    /// tuple containing a [`SubInfo`] with metadata about the sub object, and [`dyn
    /// SubObjectAccess`] which provides read/write access to the sub object data.
    fn get_sub_object(&self, sub: u8) -> Option<(SubInfo, &dyn SubObjectAccess)>;

    /// What type of object is this
    fn object_code(&self) -> ObjectCode;
}

// Implement ObjectAccess for any type that implements ProvidesSubObjects
impl<T: ProvidesSubObjects + Sync + Send> ObjectAccess for T {
    fn read(&self, sub: u8, offset: usize, buf: &mut [u8]) -> Result<usize, AbortCode> {
        let (info, access) = self.get_sub_object(sub).ok_or(AbortCode::NoSuchSubIndex)?;
        if info.access_type.is_readable() {
            access.read(offset, buf)
        } else {
            Err(AbortCode::WriteOnly)
        }
    }

    fn read_size(&self, sub: u8) -> Result<usize, AbortCode> {
        let (_info, access) = self.get_sub_object(sub).ok_or(AbortCode::NoSuchSubIndex)?;
        Ok(access.read_size())
    }

    fn write(&self, sub: u8, data: &[u8]) -> Result<(), AbortCode> {
        let (info, access) = self.get_sub_object(sub).ok_or(AbortCode::NoSuchSubIndex)?;
        if info.access_type.is_writable() {
            access.write(data)
        } else {
            Err(AbortCode::ReadOnly)
        }
    }

    fn write_prefix(&self, sub: u8, data: &[u8]) -> Result<(), AbortCode> {
        let (info, access) = self.get_sub_object(sub).ok_or(AbortCode::NoSuchSubIndex)?;
        if info.access_type.is_writable() {
            access.write_prefix(data)
        } else {
            Err(AbortCode::ReadOnly)
        }
    }

    fn object_code(&self) -> ObjectCode {
        ProvidesSubObjects::object_code(self)
    }

    fn sub_info(&self, sub: u8) -> Result<SubInfo, AbortCode> {
        self.get_sub_object(sub)
            .map(|(info, _)| info)
            .ok_or(AbortCode::NoSuchSubIndex)
    }
}

/// Represents one item in the in-memory table of objects
#[allow(missing_debug_implementations)]
pub struct ODEntry<'a> {
    /// The object index
    pub index: u16,
    /// The object implementation
    pub data: &'a dyn ObjectAccess,
}

/// Lookup an object from the Object dictionary table
///
/// Note: `table` must be sorted by index
pub fn find_object<'a>(table: &[ODEntry<'a>], index: u16) -> Option<&'a dyn ObjectAccess> {
    table
        .binary_search_by_key(&index, |e| e.index)
        .ok()
        .map(|i| table[i].data)
}

/// Copy the bytes of a value into `buf`, starting at `offset`
///
/// Helper for implementing [`ObjectAccess::read`] on objects which compute their values.
pub(crate) fn read_value_bytes(
    value: &[u8],
    offset: usize,
    buf: &mut [u8],
) -> Result<usize, AbortCode> {
    if offset > value.len() {
        return Err(AbortCode::DataTypeMismatchLengthHigh);
    }
    let read_len = buf.len().min(value.len() - offset);
    buf[..read_len].copy_from_slice(&value[offset..offset + read_len]);
    Ok(read_len)
}

/// Check that written data matches the size of a sub object
pub(crate) fn check_write_len(data: &[u8], size: usize) -> Result<(), AbortCode> {
    if data.len() < size {
        Err(AbortCode::DataTypeMismatchLengthLow)
    } else if data.len() > size {
        Err(AbortCode::DataTypeMismatchLengthHigh)
    } else {
        Ok(())
    }
}

/// Read a little endian u32 from written data
pub(crate) fn u32_from_data(data: &[u8]) -> Result<u32, AbortCode> {
    check_write_len(data, 4)?;
    Ok(u32::from_le_bytes([data[0], data[1], data[2], data[3]]))
}

/// Read a little endian u16 from written data
pub(crate) fn u16_from_data(data: &[u8]) -> Result<u16, AbortCode> {
    check_write_len(data, 2)?;
    Ok(u16::from_le_bytes([data[0], data[1]]))
}

/// Read a u8 from written data
pub(crate) fn u8_from_data(data: &[u8]) -> Result<u8, AbortCode> {
    check_write_len(data, 1)?;
    Ok(data[0])
}
