//! Default `serialVersionUID`, computed the way `java.io.ObjectStreamClass`
//! does when a class declares none.

use crate::classfile::access;
use crate::error::Result;
use crate::model::{ClassDescriptor, ConstantValue};
use byteorder::{BigEndian, WriteBytesExt};
use ristretto_classfile::mutf8;
use sha1::{Digest, Sha1};

pub const FIELD_NAME: &str = "serialVersionUID";

const CLASS_MASK: u16 = access::PUBLIC | access::FINAL | access::INTERFACE | access::ABSTRACT;
const FIELD_MASK: u16 = access::PUBLIC
    | access::PRIVATE
    | access::PROTECTED
    | access::STATIC
    | access::FINAL
    | access::VOLATILE
    | access::TRANSIENT;
const METHOD_MASK: u16 = access::PUBLIC
    | access::PRIVATE
    | access::PROTECTED
    | access::STATIC
    | access::FINAL
    | access::SYNCHRONIZED
    | access::NATIVE
    | access::ABSTRACT
    | access::STRICT;

/// The value of a declared `static final long serialVersionUID`.
pub fn declared_serial_version_uid(class: &ClassDescriptor) -> Option<i64> {
    let field = class.field(FIELD_NAME)?;
    let required = access::STATIC | access::FINAL;
    if field.descriptor != "J" || field.access & required != required {
        return None;
    }
    match field.constant_value {
        Some(ConstantValue::Long(v)) => Some(v),
        _ => None,
    }
}

pub fn default_serial_version_uid(class: &ClassDescriptor) -> Result<i64> {
    let mut out = Vec::new();
    write_utf(&mut out, &class.java_name())?;

    let mut class_mods = class
        .self_inner_entry()
        .map_or(class.access, |e| e.access)
        & CLASS_MASK;
    if class_mods & access::INTERFACE != 0 {
        let has_methods = class
            .methods
            .iter()
            .any(|m| !m.is_constructor() && !m.is_static_init());
        if has_methods {
            class_mods |= access::ABSTRACT;
        } else {
            class_mods &= !access::ABSTRACT;
        }
    }
    write_int(&mut out, class_mods);

    let mut interfaces: Vec<String> = class.interfaces.iter().map(|i| i.replace('/', ".")).collect();
    interfaces.sort();
    for i in &interfaces {
        write_utf(&mut out, i)?;
    }

    let mut fields: Vec<_> = class.fields.iter().collect();
    fields.sort_by(|a, b| a.name.cmp(&b.name));
    for f in fields {
        let mods = f.access & FIELD_MASK;
        let private = mods & access::PRIVATE != 0;
        if !private || mods & (access::STATIC | access::TRANSIENT) == 0 {
            write_utf(&mut out, &f.name)?;
            write_int(&mut out, mods);
            write_utf(&mut out, &f.descriptor)?;
        }
    }

    if class.methods.iter().any(|m| m.is_static_init()) {
        write_utf(&mut out, "<clinit>")?;
        write_int(&mut out, access::STATIC);
        write_utf(&mut out, "()V")?;
    }

    let mut constructors: Vec<_> = class.methods.iter().filter(|m| m.is_constructor()).collect();
    constructors.sort_by(|a, b| a.descriptor.cmp(&b.descriptor));
    for c in constructors {
        let mods = c.access & METHOD_MASK;
        if mods & access::PRIVATE == 0 {
            write_utf(&mut out, "<init>")?;
            write_int(&mut out, mods);
            write_utf(&mut out, &c.descriptor.replace('/', "."))?;
        }
    }

    let mut methods: Vec<_> = class
        .methods
        .iter()
        .filter(|m| !m.is_constructor() && !m.is_static_init())
        .collect();
    methods.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.descriptor.cmp(&b.descriptor)));
    for m in methods {
        let mods = m.access & METHOD_MASK;
        if mods & access::PRIVATE == 0 {
            write_utf(&mut out, &m.name)?;
            write_int(&mut out, mods);
            write_utf(&mut out, &m.descriptor.replace('/', "."))?;
        }
    }

    let digest = Sha1::digest(&out);
    let mut first = [0u8; 8];
    first.copy_from_slice(&digest[..8]);
    Ok(i64::from_le_bytes(first))
}

/// `DataOutputStream.writeUTF`.
fn write_utf(out: &mut Vec<u8>, s: &str) -> Result<()> {
    let bytes = mutf8::to_bytes(s)?;
    out.write_u16::<BigEndian>(bytes.len() as u16)?;
    out.extend_from_slice(&bytes);
    Ok(())
}

fn write_int(out: &mut Vec<u8>, value: u16) {
    let _ = out.write_i32::<BigEndian>(i32::from(value));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::ClassBuilder;

    fn describe(builder: ClassBuilder) -> ClassDescriptor {
        ClassDescriptor::parse(&builder.build().unwrap()).unwrap()
    }

    #[test]
    fn test_private_members_do_not_change_the_uid() {
        let base = || {
            ClassBuilder::new("p/Data")
                .implements("java/io/Serializable")
                .default_constructor()
                .field(access::PRIVATE, "value", "I")
                .method(access::PUBLIC, "value", "()I")
        };
        let plain = default_serial_version_uid(&describe(base())).unwrap();
        let with_private = default_serial_version_uid(&describe(
            base()
                .method(access::PRIVATE, "helper", "()V")
                .field(access::PRIVATE | access::STATIC, "CACHE", "Ljava/lang/Object;"),
        ))
        .unwrap();
        let with_public = default_serial_version_uid(&describe(
            base().method(access::PUBLIC, "other", "()V"),
        ))
        .unwrap();
        assert_eq!(plain, with_private);
        assert_ne!(plain, with_public);
    }

    #[test]
    fn test_member_order_does_not_matter() {
        let a = describe(
            ClassBuilder::new("p/Data")
                .method(access::PUBLIC, "a", "()V")
                .method(access::PUBLIC, "b", "()V"),
        );
        let b = describe(
            ClassBuilder::new("p/Data")
                .method(access::PUBLIC, "b", "()V")
                .method(access::PUBLIC, "a", "()V"),
        );
        assert_eq!(
            default_serial_version_uid(&a).unwrap(),
            default_serial_version_uid(&b).unwrap()
        );
    }

    #[test]
    fn test_declared_uid() {
        let class = describe(
            ClassBuilder::new("p/Data")
                .long_constant(access::PRIVATE | access::STATIC | access::FINAL, FIELD_NAME, 7),
        );
        assert_eq!(declared_serial_version_uid(&class), Some(7));
        let not_final = describe(ClassBuilder::new("p/Data").long_constant(access::STATIC, FIELD_NAME, 7));
        assert_eq!(declared_serial_version_uid(&not_final), None);
    }
}
