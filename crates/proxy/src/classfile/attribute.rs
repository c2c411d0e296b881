//! Attributes the generators attach to classes and members.

use super::pool::Pool;
use crate::error::Result;
use ristretto_classfile::Method;
use ristretto_classfile::attributes::{Attribute, InnerClass, NestedClassAccessFlags};

/// Remove and return the `Code` attribute of `method`.
pub fn take_code(method: &mut Method) -> Option<Attribute> {
    let position = method
        .attributes
        .iter()
        .position(|a| matches!(a, Attribute::Code { .. }))?;
    Some(method.attributes.remove(position))
}

pub fn signature(pool: &mut Pool, signature: &str) -> Result<Attribute> {
    Ok(Attribute::Signature {
        name_index: pool.add_utf8("Signature")?,
        signature_index: pool.add_utf8(signature)?,
    })
}

pub fn exceptions(pool: &mut Pool, names: &[String]) -> Result<Attribute> {
    let name_index = pool.add_utf8("Exceptions")?;
    let exception_indexes = names
        .iter()
        .map(|name| pool.add_class(name))
        .collect::<Result<Vec<_>>>()?;
    Ok(Attribute::Exceptions {
        name_index,
        exception_indexes,
    })
}

pub fn constant_value(pool: &mut Pool, index: u16) -> Result<Attribute> {
    Ok(Attribute::ConstantValue {
        name_index: pool.add_utf8("ConstantValue")?,
        constant_value_index: index,
    })
}

/// `InnerClasses` with the single entry describing `inner`.
pub fn inner_class(
    pool: &mut Pool,
    inner: &str,
    outer: Option<&str>,
    simple_name: &str,
    access: u16,
) -> Result<Attribute> {
    let name_index = pool.add_utf8("InnerClasses")?;
    let entry = InnerClass {
        class_info_index: pool.add_class(inner)?,
        outer_class_info_index: match outer {
            Some(outer) => pool.add_class(outer)?,
            None => 0,
        },
        name_index: pool.add_utf8(simple_name)?,
        access_flags: NestedClassAccessFlags::from_bits_retain(access),
    };
    Ok(Attribute::InnerClasses {
        name_index,
        classes: vec![entry],
    })
}
