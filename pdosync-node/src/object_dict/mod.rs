//! Object Dictionary access
//!
//! # Objects Overview
//!
//! The object dictionary holds all of the values which can be mapped into PDOs, as well as the
//! communication and mapping parameters of the PDOs themselves. Objects are identified by a
//! 16-bit index, and contain one or more sub objects identified by an 8-bit sub index:
//!
//! - VAR: A single variable of any type (accessed at sub index 0)
//! - ARRAY: An array of sub-objects, all with the same type. Sub-index 0 is a u8 containing the
//!   size of the array. Sub indices 1-N contain the array values.
//! - RECORD: A collection of sub-objects of heterogenous types. Sub-index 0 contains the highest
//!   implemented sub index.
//!
//! # The ObjectAccess trait
//!
//! Any struct which implements the [`ObjectAccess`] trait can be used to represent an object in the
//! dictionary. The PDO and SYNC parameter objects in this crate implement it directly, so that
//! writes are validated and applied to the running PDOs.
//!
//! Application objects are easier to implement via the [`ProvidesSubObjects`] trait, with the sub
//! objects implemented individually by implementing [`SubObjectAccess`]. Most sub objects can use
//! one of the existing types:
//!
//! - [`ScalarField<T>`]
//! - [`ConstField`]
//!
//! [`VarObject`] covers the common case of an object holding a single scalar, and [`ArrayObject`]
//! an array of scalars of one type.
//!
//! # Byte order
//!
//! All values are read and written as little-endian bytes, which is the CANopen wire order, no
//! matter the endianness of the host. A PDO mapping which covers fewer bytes than the object holds
//! therefore always addresses the least significant bytes of the value.
//!
//! # Object threading support
//!
//! All objects must be `Sync` and `Send`, to allow for access from the receive and the process
//! contexts. This is implemented using the `critical_section` crate.

mod array_object;
mod objects;
mod sub_objects;
mod var_object;

pub use array_object::*;
pub use objects::*;
pub use sub_objects::*;
pub use var_object::*;
