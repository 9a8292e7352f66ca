use pdosync_common::objects::{ObjectCode, SubInfo};

use super::{ProvidesSubObjects, ScalarField, SubObjectAccess};

/// A VAR object holding a single scalar value
///
/// The [`SubInfo`] determines how the object may be accessed and whether it can be mapped to
/// PDOs.
#[allow(missing_debug_implementations)]
pub struct VarObject<T: Copy> {
    value: ScalarField<T>,
    info: SubInfo,
}

impl<T: Copy + Send> VarObject<T> {
    /// Create a new object with an initial value
    pub const fn new(value: T, info: SubInfo) -> Self {
        Self {
            value: ScalarField::new(value),
            info,
        }
    }

    /// Read the current value
    pub fn load(&self) -> T {
        self.value.load()
    }

    /// Store a new value
    pub fn store(&self, value: T) {
        self.value.store(value)
    }
}

impl<T: Copy + Send + Sync> ProvidesSubObjects for VarObject<T>
where
    ScalarField<T>: SubObjectAccess,
{
    fn get_sub_object(&self, sub: u8) -> Option<(SubInfo, &dyn SubObjectAccess)> {
        match sub {
            0 => Some((self.info, &self.value)),
            _ => None,
        }
    }

    fn object_code(&self) -> ObjectCode {
        ObjectCode::Var
    }
}

#[cfg(test)]
mod tests {
    use pdosync_common::sdo::AbortCode;

    use super::*;
    use crate::object_dict::ObjectAccess;

    #[test]
    fn test_var_object_access() {
        let obj = VarObject::new(0x1234u16, SubInfo::new_u16().rw_access());
        assert_eq!(Ok(0x1234), obj.read_u16(0));
        assert_eq!(0, obj.max_sub_number());
        assert_eq!(Err(AbortCode::NoSuchSubIndex), obj.read_u16(1));

        obj.write(0, &[0x78, 0x56]).unwrap();
        assert_eq!(0x5678, obj.load());

        obj.write_prefix(0, &[0x11]).unwrap();
        assert_eq!(0x5611, obj.load());
    }

    #[test]
    fn test_read_only_var_object() {
        let obj = VarObject::new(5u8, SubInfo::new_u8().ro_access());
        assert_eq!(Err(AbortCode::ReadOnly), obj.write(0, &[1]));
        assert_eq!(Err(AbortCode::ReadOnly), obj.write_prefix(0, &[1]));
        assert_eq!(Ok(5), obj.read_u8(0));
    }
}
