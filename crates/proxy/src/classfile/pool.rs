//! Interning on top of ristretto's `ConstantPool`, which appends a new entry
//! on every `add_*` call. Generated code asks for the same names and
//! references over and over; each ends up in the pool once.

use crate::error::Result;
use ristretto_classfile::{Constant, ConstantPool};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Key {
    Utf8(String),
    Integer(i32),
    Long(i64),
    Class(u16),
    String(u16),
    NameAndType(u16, u16),
    FieldRef(u16, u16),
    MethodRef(u16, u16),
    InterfaceMethodRef(u16, u16),
}

impl Key {
    fn of(constant: &Constant) -> Option<Key> {
        Some(match constant {
            Constant::Utf8(value) => Key::Utf8(value.clone()),
            Constant::Integer(value) => Key::Integer(*value),
            Constant::Long(value) => Key::Long(*value),
            Constant::Class(name) => Key::Class(*name),
            Constant::String(value) => Key::String(*value),
            Constant::NameAndType {
                name_index,
                descriptor_index,
            } => Key::NameAndType(*name_index, *descriptor_index),
            Constant::FieldRef {
                class_index,
                name_and_type_index,
            } => Key::FieldRef(*class_index, *name_and_type_index),
            Constant::MethodRef {
                class_index,
                name_and_type_index,
            } => Key::MethodRef(*class_index, *name_and_type_index),
            Constant::InterfaceMethodRef {
                class_index,
                name_and_type_index,
            } => Key::InterfaceMethodRef(*class_index, *name_and_type_index),
            _ => return None,
        })
    }

    fn constant(&self) -> Constant {
        match self {
            Key::Utf8(value) => Constant::Utf8(value.clone()),
            Key::Integer(value) => Constant::Integer(*value),
            Key::Long(value) => Constant::Long(*value),
            Key::Class(name) => Constant::Class(*name),
            Key::String(value) => Constant::String(*value),
            Key::NameAndType(name_index, descriptor_index) => Constant::NameAndType {
                name_index: *name_index,
                descriptor_index: *descriptor_index,
            },
            Key::FieldRef(class_index, name_and_type_index) => Constant::FieldRef {
                class_index: *class_index,
                name_and_type_index: *name_and_type_index,
            },
            Key::MethodRef(class_index, name_and_type_index) => Constant::MethodRef {
                class_index: *class_index,
                name_and_type_index: *name_and_type_index,
            },
            Key::InterfaceMethodRef(class_index, name_and_type_index) => {
                Constant::InterfaceMethodRef {
                    class_index: *class_index,
                    name_and_type_index: *name_and_type_index,
                }
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct Pool {
    constants: ConstantPool,
    index: HashMap<Key, u16>,
}

impl Pool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps the pool of a parsed class. Existing entries keep their indices
    /// and are reused by later additions.
    pub fn from_constants(constants: ConstantPool) -> Self {
        let mut index = HashMap::new();
        let len = u16::try_from(constants.len()).unwrap_or(u16::MAX);
        for i in 1..=len {
            if let Some(key) = constants.get(i).and_then(Key::of) {
                index.entry(key).or_insert(i);
            }
        }
        Self { constants, index }
    }

    pub fn constants(&self) -> &ConstantPool {
        &self.constants
    }

    pub fn into_constants(self) -> ConstantPool {
        self.constants
    }

    fn intern(&mut self, key: Key) -> Result<u16> {
        if let Some(index) = self.index.get(&key) {
            return Ok(*index);
        }
        let index = self.constants.add(key.constant())?;
        self.index.insert(key, index);
        Ok(index)
    }

    pub fn add_utf8(&mut self, value: &str) -> Result<u16> {
        self.intern(Key::Utf8(value.to_string()))
    }

    /// Arrays are named by descriptor.
    pub fn add_class(&mut self, name: &str) -> Result<u16> {
        let name = self.add_utf8(name)?;
        self.intern(Key::Class(name))
    }

    pub fn add_string(&mut self, value: &str) -> Result<u16> {
        let value = self.add_utf8(value)?;
        self.intern(Key::String(value))
    }

    pub fn add_integer(&mut self, value: i32) -> Result<u16> {
        self.intern(Key::Integer(value))
    }

    pub fn add_long(&mut self, value: i64) -> Result<u16> {
        self.intern(Key::Long(value))
    }

    pub fn add_name_and_type(&mut self, name: &str, descriptor: &str) -> Result<u16> {
        let name = self.add_utf8(name)?;
        let descriptor = self.add_utf8(descriptor)?;
        self.intern(Key::NameAndType(name, descriptor))
    }

    pub fn add_field_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> Result<u16> {
        let class = self.add_class(owner)?;
        let name_and_type = self.add_name_and_type(name, descriptor)?;
        self.intern(Key::FieldRef(class, name_and_type))
    }

    pub fn add_method_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> Result<u16> {
        let class = self.add_class(owner)?;
        let name_and_type = self.add_name_and_type(name, descriptor)?;
        self.intern(Key::MethodRef(class, name_and_type))
    }

    pub fn add_interface_method_ref(
        &mut self,
        owner: &str,
        name: &str,
        descriptor: &str,
    ) -> Result<u16> {
        let class = self.add_class(owner)?;
        let name_and_type = self.add_name_and_type(name, descriptor)?;
        self.intern(Key::InterfaceMethodRef(class, name_and_type))
    }

    pub fn utf8(&self, index: u16) -> Result<&str> {
        Ok(self.constants.try_get_utf8(index)?)
    }

    pub fn class_name(&self, index: u16) -> Result<&str> {
        Ok(self.constants.try_get_class(index)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_references_are_interned() {
        let mut pool = Pool::new();
        let first = pool.add_method_ref("p/A", "run", "()V").unwrap();
        let again = pool.add_method_ref("p/A", "run", "()V").unwrap();
        assert_eq!(first, again);
        // utf8 x3, class, name-and-type, method ref
        assert_eq!(pool.constants().len(), 6);
        let class_index = pool.add_class("p/A").unwrap();
        assert_eq!(pool.class_name(class_index).unwrap(), "p/A");
    }

    #[test]
    fn test_existing_entries_are_reused() {
        let mut constants = ConstantPool::new();
        let long = constants.add_long(7).unwrap();
        let name = constants.add_utf8("value").unwrap();
        let mut pool = Pool::from_constants(constants);
        assert_eq!(pool.add_long(7).unwrap(), long);
        assert_eq!(pool.add_utf8("value").unwrap(), name);
        // a long takes two slots
        assert_eq!(name, 3);
    }
}
