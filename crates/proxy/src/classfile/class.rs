use super::pool::Pool;
use crate::error::{ProxyError, Result};
use ristretto_classfile::attributes::Attribute;
use ristretto_classfile::{
    ClassAccessFlags, ClassFile, Field, FieldAccessFlags, Method, MethodAccessFlags, Version,
};
use std::io::Cursor;

/// Parse a whole class file. Bytes after the last attribute are an error.
pub fn read_class(bytes: &[u8]) -> Result<ClassFile> {
    let mut cursor = Cursor::new(bytes);
    let class = ClassFile::from_bytes(&mut cursor)?;
    if cursor.position() != bytes.len() as u64 {
        return Err(ProxyError::format(format!(
            "{} trailing bytes after the class attributes",
            bytes.len() as u64 - cursor.position()
        )));
    }
    Ok(class)
}

/// A class being generated or edited. The constant pool lives in [`Pool`]
/// until the class is written out.
#[derive(Debug)]
pub struct ClassWriter {
    class: ClassFile,
    pub pool: Pool,
}

impl From<ClassFile> for ClassWriter {
    fn from(mut class: ClassFile) -> Self {
        let pool = Pool::from_constants(std::mem::take(&mut class.constant_pool));
        Self { class, pool }
    }
}

impl ClassWriter {
    pub fn new(major: u16, access: u16, this_class: &str, super_class: Option<&str>) -> Result<Self> {
        let mut pool = Pool::new();
        let this_class = pool.add_class(this_class)?;
        let super_class = match super_class {
            Some(name) => pool.add_class(name)?,
            None => 0,
        };
        let class = ClassFile {
            version: Version::from(major, 0)?,
            access_flags: ClassAccessFlags::from_bits_retain(access),
            this_class,
            super_class,
            ..ClassFile::default()
        };
        Ok(Self { class, pool })
    }

    pub fn parse(bytes: &[u8]) -> Result<Self> {
        Ok(Self::from(read_class(bytes)?))
    }

    pub fn name(&self) -> Result<&str> {
        self.pool.class_name(self.class.this_class)
    }

    pub fn major_version(&self) -> u16 {
        self.class.version.major()
    }

    /// Raise the class-file version to at least `major`.
    pub fn require_version(&mut self, major: u16) -> Result<()> {
        if self.class.version.major() < major {
            self.class.version = Version::from(major, 0)?;
        }
        Ok(())
    }

    pub fn add_interface(&mut self, name: &str) -> Result<()> {
        let index = self.pool.add_class(name)?;
        self.class.interfaces.push(index);
        Ok(())
    }

    pub fn add_attribute(&mut self, attribute: Attribute) {
        self.class.attributes.push(attribute);
    }

    pub fn add_field(
        &mut self,
        access: u16,
        name: &str,
        descriptor: &str,
        attributes: Vec<Attribute>,
    ) -> Result<()> {
        let field = Field {
            access_flags: FieldAccessFlags::from_bits_retain(access),
            name_index: self.pool.add_utf8(name)?,
            descriptor_index: self.pool.add_utf8(descriptor)?,
            field_type: ristretto_classfile::FieldType::parse(descriptor)?,
            attributes,
        };
        self.class.fields.push(field);
        Ok(())
    }

    pub fn add_method(
        &mut self,
        access: u16,
        name: &str,
        descriptor: &str,
        attributes: Vec<Attribute>,
    ) -> Result<()> {
        let method = new_method(&mut self.pool, access, name, descriptor, attributes)?;
        self.class.methods.push(method);
        Ok(())
    }

    pub fn push_method(&mut self, method: Method) {
        self.class.methods.push(method);
    }

    pub fn take_methods(&mut self) -> Vec<Method> {
        std::mem::take(&mut self.class.methods)
    }

    /// Name and descriptor of `method`.
    pub fn method_key(&self, method: &Method) -> Result<(String, String)> {
        Ok((
            self.pool.utf8(method.name_index)?.to_string(),
            self.pool.utf8(method.descriptor_index)?.to_string(),
        ))
    }

    /// Run `edit` on the method `name` + `descriptor`, if the class declares
    /// it.
    pub fn edit_method<T>(
        &mut self,
        name: &str,
        descriptor: &str,
        edit: impl FnOnce(&mut Method, &mut Pool) -> Result<T>,
    ) -> Result<Option<T>> {
        let mut found = None;
        for (i, method) in self.class.methods.iter().enumerate() {
            if self.pool.utf8(method.name_index)? == name
                && self.pool.utf8(method.descriptor_index)? == descriptor
            {
                found = Some(i);
                break;
            }
        }
        match found {
            Some(i) => edit(&mut self.class.methods[i], &mut self.pool).map(Some),
            None => Ok(None),
        }
    }

    pub fn to_bytes(mut self) -> Result<Vec<u8>> {
        self.class.constant_pool = self.pool.into_constants();
        let mut bytes = Vec::new();
        self.class.to_bytes(&mut bytes)?;
        Ok(bytes)
    }
}

pub fn new_method(
    pool: &mut Pool,
    access: u16,
    name: &str,
    descriptor: &str,
    attributes: Vec<Attribute>,
) -> Result<Method> {
    Ok(Method {
        access_flags: MethodAccessFlags::from_bits_retain(access),
        name_index: pool.add_utf8(name)?,
        descriptor_index: pool.add_utf8(descriptor)?,
        attributes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classfile::{access, attribute};

    fn sample() -> Vec<u8> {
        let mut class = ClassWriter::new(52, access::PUBLIC | access::SUPER, "p/A", Some("java/lang/Object")).unwrap();
        class.add_interface("java/io/Serializable").unwrap();
        let value = class.pool.add_long(42).unwrap();
        let attribute = attribute::constant_value(&mut class.pool, value).unwrap();
        class
            .add_field(access::STATIC | access::FINAL, "serialVersionUID", "J", vec![attribute])
            .unwrap();
        class.add_method(access::ABSTRACT, "run", "()V", Vec::new()).unwrap();
        class.to_bytes().unwrap()
    }

    #[test]
    fn test_writes_a_readable_class() {
        let bytes = sample();
        let class = ClassWriter::parse(&bytes).unwrap();
        assert_eq!(class.name().unwrap(), "p/A");
        assert_eq!(class.major_version(), 52);
        let class = read_class(&bytes).unwrap();
        assert_eq!(class.interfaces.len(), 1);
        assert_eq!(class.fields.len(), 1);
        assert_eq!(class.methods.len(), 1);
    }

    #[test]
    fn test_rejects_truncated_and_padded_input() {
        let bytes = sample();
        assert!(matches!(read_class(&bytes[..bytes.len() - 3]), Err(ProxyError::ClassFormat(_))));
        let mut padded = bytes.clone();
        padded.push(0);
        assert!(matches!(read_class(&padded), Err(ProxyError::ClassFormat(_))));
    }

    #[test]
    fn test_edit_method_finds_by_name_and_descriptor() {
        let mut class = ClassWriter::parse(&sample()).unwrap();
        let found = class
            .edit_method("run", "()V", |method, _| Ok(method.access_flags.bits()))
            .unwrap();
        assert_eq!(found, Some(access::ABSTRACT));
        assert_eq!(class.edit_method("run", "(I)V", |_, _| Ok(())).unwrap(), None);
    }
}
