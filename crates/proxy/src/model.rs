//! Read-only type descriptions built from class-file bytes.

use crate::classfile::{access, read_class};
use crate::error::Result;
use ristretto_classfile::attributes::Attribute;
use ristretto_classfile::{ClassFile, Constant, ConstantPool};
use serde::Serialize;
use std::sync::Arc;

pub const OBJECT: &str = "java/lang/Object";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ConstantValue {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldInfo {
    pub name: String,
    pub descriptor: String,
    pub access: u16,
    pub signature: Option<String>,
    pub constant_value: Option<ConstantValue>,
}

impl FieldInfo {
    pub fn is_static(&self) -> bool {
        access::is(self.access, access::STATIC)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MethodInfo {
    pub name: String,
    pub descriptor: String,
    pub access: u16,
    pub signature: Option<String>,
    pub exceptions: Vec<String>,
}

impl MethodInfo {
    pub fn has(&self, flag: u16) -> bool {
        access::is(self.access, flag)
    }

    pub fn is_constructor(&self) -> bool {
        self.name == "<init>"
    }

    pub fn is_static_init(&self) -> bool {
        self.name == "<clinit>"
    }

    pub fn is_package_private(&self) -> bool {
        self.access & (access::PUBLIC | access::PROTECTED | access::PRIVATE) == 0
    }
}

/// One `InnerClasses` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InnerClassInfo {
    pub inner: String,
    pub outer: Option<String>,
    pub simple_name: Option<String>,
    pub access: u16,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassDescriptor {
    pub name: String,
    pub super_name: Option<String>,
    pub interfaces: Vec<String>,
    pub access: u16,
    pub signature: Option<String>,
    pub fields: Vec<FieldInfo>,
    pub methods: Vec<MethodInfo>,
    pub inner_classes: Vec<InnerClassInfo>,
    pub major_version: u16,
    #[serde(skip)]
    pub bytes: Arc<[u8]>,
}

impl ClassDescriptor {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let class = read_class(bytes)?;
        Self::from_class_file(&class, bytes)
    }

    pub fn from_class_file(class: &ClassFile, bytes: &[u8]) -> Result<Self> {
        let pool = &class.constant_pool;

        let mut fields = Vec::with_capacity(class.fields.len());
        for f in &class.fields {
            let mut constant_value = None;
            for a in &f.attributes {
                if let Attribute::ConstantValue {
                    constant_value_index,
                    ..
                } = a
                {
                    constant_value = match pool.try_get(*constant_value_index)? {
                        Constant::Integer(v) => Some(ConstantValue::Int(*v)),
                        Constant::Long(v) => Some(ConstantValue::Long(*v)),
                        Constant::Float(v) => Some(ConstantValue::Float(*v)),
                        Constant::Double(v) => Some(ConstantValue::Double(*v)),
                        Constant::String(value) => {
                            Some(ConstantValue::String(pool.try_get_utf8(*value)?.to_string()))
                        }
                        _ => None,
                    };
                }
            }
            fields.push(FieldInfo {
                name: pool.try_get_utf8(f.name_index)?.to_string(),
                descriptor: pool.try_get_utf8(f.descriptor_index)?.to_string(),
                access: f.access_flags.bits(),
                signature: signature_of(pool, &f.attributes)?,
                constant_value,
            });
        }

        let mut methods = Vec::with_capacity(class.methods.len());
        for m in &class.methods {
            let mut exceptions = Vec::new();
            for a in &m.attributes {
                if let Attribute::Exceptions {
                    exception_indexes, ..
                } = a
                {
                    for index in exception_indexes {
                        exceptions.push(pool.try_get_class(*index)?.to_string());
                    }
                }
            }
            methods.push(MethodInfo {
                name: pool.try_get_utf8(m.name_index)?.to_string(),
                descriptor: pool.try_get_utf8(m.descriptor_index)?.to_string(),
                access: m.access_flags.bits(),
                signature: signature_of(pool, &m.attributes)?,
                exceptions,
            });
        }

        let mut inner_classes = Vec::new();
        for a in &class.attributes {
            let Attribute::InnerClasses { classes, .. } = a else {
                continue;
            };
            for entry in classes {
                let outer = match entry.outer_class_info_index {
                    0 => None,
                    index => Some(pool.try_get_class(index)?.to_string()),
                };
                let simple_name = match entry.name_index {
                    0 => None,
                    index => Some(pool.try_get_utf8(index)?.to_string()),
                };
                inner_classes.push(InnerClassInfo {
                    inner: pool.try_get_class(entry.class_info_index)?.to_string(),
                    outer,
                    simple_name,
                    access: entry.access_flags.bits(),
                });
            }
        }

        let super_name = match class.super_class {
            0 => None,
            index => Some(pool.try_get_class(index)?.to_string()),
        };
        let interfaces = class
            .interfaces
            .iter()
            .map(|index| Ok(pool.try_get_class(*index)?.to_string()))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            name: pool.try_get_class(class.this_class)?.to_string(),
            super_name,
            interfaces,
            access: class.access_flags.bits(),
            signature: signature_of(pool, &class.attributes)?,
            fields,
            methods,
            inner_classes,
            major_version: class.version.major(),
            bytes: Arc::from(bytes),
        })
    }

    /// Stand-in used when no class source can supply `java/lang/Object`.
    pub fn object() -> Self {
        let method = |access: u16, name: &str, descriptor: &str| MethodInfo {
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            access,
            signature: None,
            exceptions: Vec::new(),
        };
        let final_native = access::PUBLIC | access::FINAL | access::NATIVE;
        let mut wait = method(access::PUBLIC | access::FINAL, "wait", "(J)V");
        wait.exceptions.push("java/lang/InterruptedException".to_string());
        Self {
            name: OBJECT.to_string(),
            super_name: None,
            interfaces: Vec::new(),
            access: access::PUBLIC | access::SUPER,
            signature: None,
            fields: Vec::new(),
            methods: vec![
                method(access::PUBLIC, "<init>", "()V"),
                method(final_native, "getClass", "()Ljava/lang/Class;"),
                method(access::PUBLIC | access::NATIVE, "hashCode", "()I"),
                method(access::PUBLIC, "equals", "(Ljava/lang/Object;)Z"),
                method(access::PROTECTED | access::NATIVE, "clone", "()Ljava/lang/Object;"),
                method(access::PUBLIC, "toString", "()Ljava/lang/String;"),
                method(final_native, "notify", "()V"),
                method(final_native, "notifyAll", "()V"),
                wait,
                method(access::PROTECTED, "finalize", "()V"),
            ],
            inner_classes: Vec::new(),
            major_version: 52,
            bytes: Arc::from(Vec::new()),
        }
    }

    pub fn has(&self, flag: u16) -> bool {
        access::is(self.access, flag)
    }

    pub fn is_final(&self) -> bool {
        self.has(access::FINAL)
    }

    pub fn is_interface(&self) -> bool {
        self.has(access::INTERFACE)
    }

    pub fn package(&self) -> &str {
        package_of(&self.name)
    }

    pub fn simple_name(&self) -> &str {
        match self.name.rfind('/') {
            Some(i) => &self.name[i + 1..],
            None => &self.name,
        }
    }

    pub fn java_name(&self) -> String {
        self.name.replace('/', ".")
    }

    /// The `InnerClasses` entry describing this class itself.
    pub fn self_inner_entry(&self) -> Option<&InnerClassInfo> {
        self.inner_classes.iter().find(|e| e.inner == self.name)
    }

    /// Member classes declared without `static` capture their outer instance
    /// and have no usable no-argument constructor.
    pub fn is_inner_non_static(&self) -> bool {
        self.self_inner_entry()
            .is_some_and(|e| e.outer.is_some() && e.access & access::STATIC == 0)
    }

    pub fn method(&self, name: &str, descriptor: &str) -> Option<&MethodInfo> {
        self.methods
            .iter()
            .find(|m| m.name == name && m.descriptor == descriptor)
    }

    pub fn declares_method_named(&self, name: &str) -> bool {
        self.methods.iter().any(|m| m.name == name)
    }

    pub fn no_arg_constructor(&self) -> Option<&MethodInfo> {
        self.method("<init>", "()V")
    }

    pub fn field(&self, name: &str) -> Option<&FieldInfo> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn implements(&self, interface: &str) -> bool {
        self.interfaces.iter().any(|i| i == interface)
    }
}

fn signature_of(pool: &ConstantPool, attributes: &[Attribute]) -> Result<Option<String>> {
    for a in attributes {
        if let Attribute::Signature {
            signature_index, ..
        } = a
        {
            return Ok(Some(pool.try_get_utf8(*signature_index)?.to_string()));
        }
    }
    Ok(None)
}

/// Package part of an internal name, empty for the default package.
pub fn package_of(name: &str) -> &str {
    match name.rfind('/') {
        Some(i) => &name[..i],
        None => "",
    }
}
