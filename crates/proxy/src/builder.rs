//! Assembles small but complete classes, mostly for fixtures. Method bodies
//! are trivial: constructors call `super()`, everything else returns the
//! default value of its return type.

use crate::classfile::{Attribute, ClassWriter, CodeBuilder, Instruction, access, attribute};
use crate::descriptor::MethodDescriptor;
use crate::emit;
use crate::error::Result;
use crate::model::OBJECT;

struct MethodSpec {
    access: u16,
    name: String,
    descriptor: String,
    signature: Option<String>,
    exceptions: Vec<String>,
}

pub struct ClassBuilder {
    name: String,
    access: u16,
    major_version: u16,
    super_name: String,
    interfaces: Vec<String>,
    signature: Option<String>,
    fields: Vec<(u16, String, String, Option<i64>)>,
    methods: Vec<MethodSpec>,
    inner: Option<(Option<String>, String, u16)>,
    static_init: bool,
}

impl ClassBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            access: access::PUBLIC | access::SUPER,
            major_version: 52,
            super_name: OBJECT.to_string(),
            interfaces: Vec::new(),
            signature: None,
            fields: Vec::new(),
            methods: Vec::new(),
            inner: None,
            static_init: false,
        }
    }

    /// Replaces the class flags. `ACC_SUPER` is added for classes.
    pub fn access(mut self, flags: u16) -> Self {
        self.access = if flags & access::INTERFACE != 0 {
            flags
        } else {
            flags | access::SUPER
        };
        self
    }

    pub fn version(mut self, major: u16) -> Self {
        self.major_version = major;
        self
    }

    pub fn extends(mut self, super_name: &str) -> Self {
        self.super_name = super_name.to_string();
        self
    }

    pub fn implements(mut self, interface: &str) -> Self {
        self.interfaces.push(interface.to_string());
        self
    }

    pub fn signature(mut self, signature: &str) -> Self {
        self.signature = Some(signature.to_string());
        self
    }

    pub fn field(mut self, flags: u16, name: &str, descriptor: &str) -> Self {
        self.fields
            .push((flags, name.to_string(), descriptor.to_string(), None));
        self
    }

    /// A `long` field with a `ConstantValue`, e.g. a declared
    /// `serialVersionUID`.
    pub fn long_constant(mut self, flags: u16, name: &str, value: i64) -> Self {
        self.fields
            .push((flags, name.to_string(), "J".to_string(), Some(value)));
        self
    }

    pub fn method(self, flags: u16, name: &str, descriptor: &str) -> Self {
        self.method_with(flags, name, descriptor, None, &[])
    }

    pub fn method_with(
        mut self,
        flags: u16,
        name: &str,
        descriptor: &str,
        signature: Option<&str>,
        exceptions: &[&str],
    ) -> Self {
        self.methods.push(MethodSpec {
            access: flags,
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            signature: signature.map(str::to_string),
            exceptions: exceptions.iter().map(|e| e.to_string()).collect(),
        });
        self
    }

    pub fn default_constructor(self) -> Self {
        self.method(access::PUBLIC, "<init>", "()V")
    }

    /// Mark the class as a member of `outer`.
    pub fn inner_class(mut self, outer: &str, simple_name: &str, flags: u16) -> Self {
        self.inner = Some((Some(outer.to_string()), simple_name.to_string(), flags));
        self
    }

    /// Adds a `<clinit>` with a branch and a stack map frame.
    pub fn static_init(mut self) -> Self {
        self.static_init = true;
        self
    }

    pub fn build(self) -> Result<Vec<u8>> {
        let mut class = ClassWriter::new(
            self.major_version,
            self.access,
            &self.name,
            Some(&self.super_name),
        )?;
        for interface in &self.interfaces {
            class.add_interface(interface)?;
        }
        if let Some(sig) = &self.signature {
            let attribute = attribute::signature(&mut class.pool, sig)?;
            class.add_attribute(attribute);
        }

        for (flags, name, descriptor, constant) in &self.fields {
            let mut attributes = Vec::new();
            if let Some(value) = constant {
                let index = class.pool.add_long(*value)?;
                attributes.push(attribute::constant_value(&mut class.pool, index)?);
            }
            class.add_field(*flags, name, descriptor, attributes)?;
        }

        for spec in &self.methods {
            let mut attributes = Vec::new();
            if spec.access & (access::ABSTRACT | access::NATIVE) == 0 {
                attributes.push(self.body(&mut class, spec)?);
            }
            if !spec.exceptions.is_empty() {
                attributes.push(attribute::exceptions(&mut class.pool, &spec.exceptions)?);
            }
            if let Some(sig) = &spec.signature {
                attributes.push(attribute::signature(&mut class.pool, sig)?);
            }
            class.add_method(spec.access, &spec.name, &spec.descriptor, attributes)?;
        }

        if self.static_init {
            let mut code = CodeBuilder::new(&mut class.pool, 0);
            let done = code.new_label();
            code.iconst(0)?;
            code.jump(Instruction::Ifeq, done);
            code.op(Instruction::Nop);
            code.frame(done, vec![], vec![]);
            code.op(Instruction::Return);
            let attribute = code.finish()?;
            class.add_method(access::STATIC, "<clinit>", "()V", vec![attribute])?;
        }

        if let Some((outer, simple_name, flags)) = &self.inner {
            let attribute =
                attribute::inner_class(&mut class.pool, &self.name, outer.as_deref(), simple_name, *flags)?;
            class.add_attribute(attribute);
        }

        class.to_bytes()
    }

    fn body(&self, class: &mut ClassWriter, spec: &MethodSpec) -> Result<Attribute> {
        let desc = MethodDescriptor::parse(&spec.descriptor)?;
        let receiver = u16::from(spec.access & access::STATIC == 0);
        let mut code = CodeBuilder::new(&mut class.pool, receiver + desc.arg_slots());
        if spec.name == "<init>" {
            code.aload(0);
            code.invokespecial(&self.super_name, "<init>", "()V")?;
            code.op(Instruction::Return);
            return code.finish();
        }
        emit::push_default(&mut code, desc.ret.as_ref())?;
        code.return_value(desc.ret.as_ref());
        code.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ClassDescriptor;

    #[test]
    fn test_builds_parseable_class() {
        let bytes = ClassBuilder::new("p/Outer$Inner")
            .inner_class("p/Outer", "Inner", access::PUBLIC)
            .default_constructor()
            .method_with(
                access::PUBLIC,
                "get",
                "()Ljava/lang/Object;",
                Some("()TT;"),
                &["java/io/IOException"],
            )
            .long_constant(access::STATIC | access::FINAL, "serialVersionUID", 42)
            .static_init()
            .build()
            .unwrap();
        let class = ClassDescriptor::parse(&bytes).unwrap();
        assert!(class.is_inner_non_static());
        let get = class.method("get", "()Ljava/lang/Object;").unwrap();
        assert_eq!(get.signature.as_deref(), Some("()TT;"));
        assert_eq!(get.exceptions, vec!["java/io/IOException".to_string()]);
        assert!(class.method("<clinit>", "()V").is_some());
        assert_eq!(
            class.field("serialVersionUID").unwrap().constant_value,
            Some(crate::model::ConstantValue::Long(42))
        );
    }
}
