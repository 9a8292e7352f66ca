use pdosync_common::objects::{ObjectCode, SubInfo};

use super::{ConstField, ProvidesSubObjects, ScalarField, SubObjectAccess};

/// An ARRAY object holding `N` scalar values of the same type
///
/// Sub index 0 reads as `N`, and the values are accessed at sub indices 1 through `N`. All elements
/// share the same [`SubInfo`].
#[allow(missing_debug_implementations)]
pub struct ArrayObject<T: Copy, const N: usize> {
    len: ConstField<1>,
    values: [ScalarField<T>; N],
    info: SubInfo,
}

impl<T: Copy + Send, const N: usize> ArrayObject<T, N> {
    /// Create a new array object from its initial values
    pub const fn new(values: [ScalarField<T>; N], info: SubInfo) -> Self {
        assert!(N > 0 && N < 255, "Array length must be 1..=254");
        Self {
            len: ConstField::new([N as u8]),
            values,
            info,
        }
    }

    /// Read element `i`, counting from 0
    pub fn load(&self, i: usize) -> Option<T> {
        self.values.get(i).map(|v| v.load())
    }

    /// Store a new value into element `i`, counting from 0
    ///
    /// Out of range indices are ignored.
    pub fn store(&self, i: usize, value: T) {
        if let Some(v) = self.values.get(i) {
            v.store(value);
        }
    }
}

impl<T: Copy + Send + Sync, const N: usize> ProvidesSubObjects for ArrayObject<T, N>
where
    ScalarField<T>: SubObjectAccess,
{
    fn get_sub_object(&self, sub: u8) -> Option<(SubInfo, &dyn SubObjectAccess)> {
        if sub == 0 {
            Some((SubInfo::MAX_SUB_NUMBER, &self.len))
        } else {
            let value = self.values.get(sub as usize - 1)?;
            Some((self.info, value))
        }
    }

    fn object_code(&self) -> ObjectCode {
        ObjectCode::Array
    }
}

#[cfg(test)]
mod tests {
    use pdosync_common::objects::PdoMapping;
    use pdosync_common::sdo::AbortCode;

    use super::*;
    use crate::object_dict::ObjectAccess;

    #[test]
    fn test_array_object_access() {
        let obj = ArrayObject::new(
            [ScalarField::new(1i16), ScalarField::new(-2), ScalarField::new(3)],
            SubInfo::new_i16()
                .rw_access()
                .pdo_mapping(PdoMapping::Both),
        );
        assert_eq!(ObjectCode::Array, ObjectAccess::object_code(&obj));
        assert_eq!(3, obj.max_sub_number());
        assert_eq!(Ok(3), obj.read_u8(0));
        assert_eq!(Ok(0xfffe), obj.read_u16(2));
        assert_eq!(Err(AbortCode::NoSuchSubIndex), obj.read_u16(4));
        assert_eq!(Err(AbortCode::ReadOnly), obj.write(0, &[4]));

        obj.write(3, &[0x00, 0x80]).unwrap();
        assert_eq!(Some(i16::MIN), obj.load(2));
        obj.store(0, 42);
        assert_eq!(Ok(42), obj.read_u16(1));
        assert_eq!(None, obj.load(3));
    }
}
