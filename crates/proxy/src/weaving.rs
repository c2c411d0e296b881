//! In-place weaving: a class is rewritten so that instances created through
//! its rebinding constructor delegate to a dispatcher, optionally reporting
//! to an invocation listener.

use crate::classfile::class::new_method;
use crate::classfile::{
    Attribute, ClassWriter, CodeBuilder, Instruction, Pool, VType, access, attribute,
    prepend_static_call, read_class,
};
use crate::descriptor::MethodDescriptor;
use crate::emit;
use crate::error::{ProxyError, Result};
use crate::method_set::method_key;
use crate::model::{ClassDescriptor, MethodInfo, OBJECT};
use crate::source::ClassRepository;
use crate::suid;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

pub const WOVEN_PROXY: &str = "org/apache/aries/proxy/weaving/WovenProxy";
pub const INVOCATION_LISTENER: &str = "org/apache/aries/proxy/InvocationListener";
pub const DISPATCHER_FIELD: &str = "woven_proxy_dispatcher";
pub const LISTENER_FIELD: &str = "woven_proxy_listener";
pub const UNWRAP_METHOD: &str = "org_apache_aries_proxy_weaving_WovenProxy_unwrap";
pub const IS_PROXY_INSTANCE_METHOD: &str = "org_apache_aries_proxy_weaving_WovenProxy_isProxyInstance";
pub const CREATE_NEW_PROXY_INSTANCE_METHOD: &str =
    "org_apache_aries_proxy_weaving_WovenProxy_createNewProxyInstance";
pub const REBIND_DESC: &str =
    "(Ljava/util/concurrent/Callable;Lorg/apache/aries/proxy/InvocationListener;)V";
pub const FACTORY_DESC: &str = "(Ljava/util/concurrent/Callable;Lorg/apache/aries/proxy/InvocationListener;)Lorg/apache/aries/proxy/weaving/WovenProxy;";
pub const ORIGINAL_SUFFIX: &str = "$woven_proxy_original";
pub const STATIC_INIT_METHOD: &str = "woven_proxy_static_init";

const CALLABLE: &str = "java/util/concurrent/Callable";
const DISPATCHER_DESC: &str = "Ljava/util/concurrent/Callable;";
const LISTENER_DESC: &str = "Lorg/apache/aries/proxy/InvocationListener;";
const PRE_INVOKE_DESC: &str =
    "(Ljava/lang/Object;Ljava/lang/reflect/Method;[Ljava/lang/Object;)Ljava/lang/Object;";
const POST_INVOKE_DESC: &str =
    "(Ljava/lang/Object;Ljava/lang/Object;Ljava/lang/reflect/Method;Ljava/lang/Object;)V";
const POST_INVOKE_EXCEPTIONAL_DESC: &str =
    "(Ljava/lang/Object;Ljava/lang/Object;Ljava/lang/reflect/Method;Ljava/lang/Throwable;)V";
const NPE: &str = "java/lang/NullPointerException";

fn method_field(index: usize) -> String {
    format!("woven_proxy_method_{index}")
}

/// Decides which classes get woven when they are defined.
pub trait WeavingPolicy: Send + Sync {
    fn is_weavable(&self, class_name: &str) -> bool;
}

impl<F> WeavingPolicy for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn is_weavable(&self, class_name: &str) -> bool {
        self(class_name)
    }
}

/// Weaves everything outside a list of excluded name prefixes.
#[derive(Debug, Clone)]
pub struct PrefixWeavingPolicy {
    excluded: Vec<String>,
}

impl PrefixWeavingPolicy {
    pub fn new(excluded: Vec<String>) -> Self {
        Self { excluded }
    }
}

impl Default for PrefixWeavingPolicy {
    fn default() -> Self {
        Self::new(vec!["java/".into(), "javax/".into(), "sun/".into()])
    }
}

impl WeavingPolicy for PrefixWeavingPolicy {
    fn is_weavable(&self, class_name: &str) -> bool {
        !self.excluded.iter().any(|p| class_name.starts_with(p.as_str()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WovenMethod {
    pub name: String,
    pub descriptor: String,
}

/// An override added for a method inherited from an unwoven ancestor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CopiedMethod {
    pub name: String,
    pub descriptor: String,
    pub declaring_class: String,
}

/// How a new delegating instance of a woven class is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rebinding {
    pub class_name: String,
    pub constructor_descriptor: &'static str,
    pub factory_method: &'static str,
    pub factory_descriptor: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct WovenClass {
    pub class_name: String,
    #[serde(skip)]
    pub bytes: Vec<u8>,
    /// False when the input was returned untouched.
    pub changed: bool,
    pub woven_methods: Vec<WovenMethod>,
    pub copied_methods: Vec<CopiedMethod>,
    pub implements_woven_proxy: bool,
    /// A `serialVersionUID` pinned by the weaver.
    pub serial_version_uid: Option<i64>,
}

impl WovenClass {
    fn unchanged(class_name: &str, bytes: &[u8]) -> Self {
        Self {
            class_name: class_name.to_string(),
            bytes: bytes.to_vec(),
            changed: false,
            woven_methods: Vec::new(),
            copied_methods: Vec::new(),
            implements_woven_proxy: false,
            serial_version_uid: None,
        }
    }

    pub fn rebinding(&self) -> Option<Rebinding> {
        self.changed.then(|| Rebinding {
            class_name: self.class_name.clone(),
            constructor_descriptor: REBIND_DESC,
            factory_method: CREATE_NEW_PROXY_INSTANCE_METHOD,
            factory_descriptor: FACTORY_DESC,
        })
    }
}

/// Where a wrapper goes when no dispatcher is set.
enum Fallback<'a> {
    /// The moved original body.
    Original,
    /// The inherited implementation.
    Super(&'a str),
}

/// A method whose reflective `Method` the static initializer caches.
struct Dispatched {
    owner: String,
    name: String,
    descriptor: String,
}

pub struct WovenProxyGenerator {
    repository: Arc<ClassRepository>,
    policy: Arc<dyn WeavingPolicy>,
}

impl WovenProxyGenerator {
    pub fn new(repository: Arc<ClassRepository>, policy: impl WeavingPolicy + 'static) -> Self {
        Self {
            repository,
            policy: Arc::new(policy),
        }
    }

    /// Whether instances of `class` will carry the woven-proxy plumbing.
    pub fn is_woven(&self, class: &ClassDescriptor) -> bool {
        class.implements(WOVEN_PROXY)
            || class.declares_method_named(CREATE_NEW_PROXY_INSTANCE_METHOD)
            || self.policy.is_weavable(&class.name)
    }

    pub fn weave(&self, class_name: &str) -> Result<WovenClass> {
        let class = self.repository.load(&class_name.replace('.', "/"))?;
        self.weave_bytes(&class.bytes)
    }

    /// Weave a class that is about to be defined.
    pub fn weave_bytes(&self, bytes: &[u8]) -> Result<WovenClass> {
        let parsed = read_class(bytes)?;
        let original = Arc::new(ClassDescriptor::from_class_file(&parsed, bytes)?);
        let mut class = ClassWriter::from(parsed);
        let name = original.name.clone();

        if original.is_interface()
            || original.implements(WOVEN_PROXY)
            || original.declares_method_named(CREATE_NEW_PROXY_INSTANCE_METHOD)
            || !self.policy.is_weavable(&name)
            || original.super_name.is_none()
        {
            debug!("Leaving {} unwoven", name);
            return Ok(WovenClass::unchanged(&name, bytes));
        }

        let chain = self.repository.superclasses(&original)?;
        let ancestors: Vec<_> = chain[1..].iter().filter(|c| c.name != OBJECT).collect();
        let woven: Vec<bool> = ancestors.iter().map(|a| self.is_woven(a)).collect();
        let implement = !woven.iter().any(|w| *w);
        if !implement && !woven[0] {
            return Err(ProxyError::unable(
                original.java_name(),
                format!(
                    "the superclass {} is not woven but one of its ancestors is",
                    ancestors[0].java_name()
                ),
            ));
        }

        let copies = if implement {
            collect_copies(&original, &ancestors)?
        } else {
            Vec::new()
        };
        let super_name = chain[1].name.clone();
        let init_owner = if implement {
            Some(no_arg_constructor_owner(&original, &chain[1])?)
        } else {
            None
        };

        let mut dispatched = Vec::new();
        let mut woven_methods = Vec::new();
        for mut method in class.take_methods() {
            let (method_name, descriptor) = class.method_key(&method)?;
            let flags = method.access_flags.bits();
            if !is_weavable_method(flags, &method_name) {
                class.push_method(method);
                continue;
            }
            let Some(body) = attribute::take_code(&mut method) else {
                class.push_method(method);
                continue;
            };
            let index = dispatched.len();
            let wrapper = write_wrapper(
                &mut class.pool,
                &name,
                &method_name,
                &descriptor,
                Fallback::Original,
                index,
            )?;
            let moved = new_method(
                &mut class.pool,
                access::PRIVATE | access::SYNTHETIC | (flags & access::STRICT),
                &format!("{method_name}{ORIGINAL_SUFFIX}"),
                &descriptor,
                vec![body],
            )?;
            method.attributes.push(wrapper);
            class.push_method(method);
            class.push_method(moved);
            dispatched.push(Dispatched {
                owner: name.clone(),
                name: method_name.clone(),
                descriptor: descriptor.clone(),
            });
            woven_methods.push(WovenMethod {
                name: method_name,
                descriptor,
            });
        }

        for copy in &copies {
            let index = dispatched.len();
            let mut attributes = vec![write_wrapper(
                &mut class.pool,
                &name,
                &copy.name,
                &copy.descriptor,
                Fallback::Super(&super_name),
                index,
            )?];
            if !copy.exceptions.is_empty() {
                attributes.push(attribute::exceptions(&mut class.pool, &copy.exceptions)?);
            }
            if let Some(signature) = &copy.signature {
                attributes.push(attribute::signature(&mut class.pool, signature)?);
            }
            class.add_method(
                copy.access & !(access::ABSTRACT | access::NATIVE | access::SYNCHRONIZED),
                &copy.name,
                &copy.descriptor,
                attributes,
            )?;
            dispatched.push(Dispatched {
                owner: copy.declaring_class.clone(),
                name: copy.name.clone(),
                descriptor: copy.descriptor.clone(),
            });
        }

        if let Some(init_owner) = &init_owner {
            write_woven_proxy_members(&mut class, &name)?;
            class.add_interface(WOVEN_PROXY)?;
            debug!("{} is the highest woven class of its hierarchy", name);
        }
        write_factory(&mut class, &name, &super_name, init_owner.as_deref())?;
        write_static_init(&mut class, &name, &dispatched)?;

        let mut serial_version_uid = None;
        if original.field(suid::FIELD_NAME).is_none() && self.repository.is_serializable(&original)? {
            let value = suid::default_serial_version_uid(&original)?;
            let index = class.pool.add_long(value)?;
            let constant = attribute::constant_value(&mut class.pool, index)?;
            class.add_field(
                access::PRIVATE | access::STATIC | access::FINAL | access::SYNTHETIC,
                suid::FIELD_NAME,
                "J",
                vec![constant],
            )?;
            serial_version_uid = Some(value);
        }

        class.require_version(49)?;
        let bytes = class.to_bytes()?;
        info!(
            "Wove {} ({} methods, {} copied)",
            name,
            woven_methods.len(),
            copies.len()
        );
        Ok(WovenClass {
            class_name: name,
            bytes,
            changed: true,
            woven_methods,
            copied_methods: copies
                .into_iter()
                .map(|c| CopiedMethod {
                    name: c.name,
                    descriptor: c.descriptor,
                    declaring_class: c.declaring_class,
                })
                .collect(),
            implements_woven_proxy: init_owner.is_some(),
            serial_version_uid,
        })
    }
}

fn is_weavable_method(flags: u16, name: &str) -> bool {
    let skipped = access::STATIC
        | access::PRIVATE
        | access::SYNTHETIC
        | access::NATIVE
        | access::BRIDGE
        | access::ABSTRACT;
    flags & skipped == 0 && name != "<init>" && name != "<clinit>"
}

struct Copy {
    name: String,
    descriptor: String,
    declaring_class: String,
    access: u16,
    signature: Option<String>,
    exceptions: Vec<String>,
}

fn is_inherited_instance_method(m: &MethodInfo) -> bool {
    !m.is_constructor()
        && !m.is_static_init()
        && !m.has(access::STATIC)
        && !m.has(access::PRIVATE)
        && !m.has(access::SYNTHETIC)
        && !m.has(access::BRIDGE)
}

/// Reachable instance methods of unwoven ancestors that the class does not
/// override itself.
fn collect_copies(class: &ClassDescriptor, ancestors: &[&Arc<ClassDescriptor>]) -> Result<Vec<Copy>> {
    let mut known: HashSet<String> = class
        .methods
        .iter()
        .map(|m| method_key(&m.name, &m.descriptor))
        .collect();
    let mut copies = Vec::new();
    for ancestor in ancestors {
        let mut finals = Vec::new();
        for m in ancestor.methods.iter().filter(|m| is_inherited_instance_method(m)) {
            if m.has(access::FINAL) {
                finals.push(m.name.clone());
                continue;
            }
            if m.is_package_private() && ancestor.package() != class.package() {
                return Err(ProxyError::unable(
                    ancestor.java_name(),
                    format!(
                        "the package-private method {}{} is not visible from {}",
                        m.name,
                        m.descriptor,
                        class.java_name()
                    ),
                ));
            }
            if !known.insert(method_key(&m.name, &m.descriptor)) || m.has(access::ABSTRACT) {
                continue;
            }
            copies.push(Copy {
                name: m.name.clone(),
                descriptor: m.descriptor.clone(),
                declaring_class: ancestor.name.clone(),
                access: m.access,
                signature: m.signature.clone(),
                exceptions: m.exceptions.clone(),
            });
        }
        if !finals.is_empty() {
            return Err(ProxyError::FinalMethods {
                class_name: ancestor.java_name(),
                methods: finals,
            });
        }
    }
    Ok(copies)
}

/// The class whose `<init>()V` the rebinding constructor calls.
fn no_arg_constructor_owner(class: &ClassDescriptor, super_class: &ClassDescriptor) -> Result<String> {
    let accessible = super_class.no_arg_constructor().is_some_and(|c| {
        !c.has(access::PRIVATE)
            && (!c.is_package_private() || super_class.package() == class.package())
    });
    if accessible {
        return Ok(super_class.name.clone());
    }
    if class.no_arg_constructor().is_some() {
        return Ok(class.name.clone());
    }
    Err(ProxyError::unable(
        class.java_name(),
        format!(
            "neither it nor its superclass {} has an accessible no-argument constructor",
            super_class.java_name()
        ),
    ))
}

/// Dispatching body for `name` + `descriptor`.
fn write_wrapper(
    pool: &mut Pool,
    this: &str,
    name: &str,
    descriptor: &str,
    fallback: Fallback<'_>,
    index: usize,
) -> Result<Attribute> {
    let desc = MethodDescriptor::parse(descriptor)?;
    let ret = desc.ret.as_ref();
    let token = 1 + desc.arg_slots();
    let (target, exception, result) = (token + 1, token + 2, token + 3);
    let locals = emit::entry_locals(this, &desc.params);
    let field = method_field(index);

    let mut code = CodeBuilder::new(pool, token);
    let dispatch = code.new_label();
    let listen = code.new_label();
    let start = code.new_label();
    let end = code.new_label();
    let handler = code.new_label();

    code.aload(0);
    code.getfield(this, DISPATCHER_FIELD, DISPATCHER_DESC)?;
    code.jump(Instruction::Ifnonnull, dispatch);
    code.aload(0);
    emit::load_args(&mut code, &desc.params);
    match fallback {
        Fallback::Original => {
            code.invokespecial(this, &format!("{name}{ORIGINAL_SUFFIX}"), descriptor)?
        }
        Fallback::Super(owner) => code.invokespecial(owner, name, descriptor)?,
    }
    code.return_value(ret);

    code.frame(dispatch, locals.clone(), vec![]);
    code.aload(0);
    code.getfield(this, LISTENER_FIELD, LISTENER_DESC)?;
    code.jump(Instruction::Ifnonnull, listen);
    code.aload(0);
    code.getfield(this, DISPATCHER_FIELD, DISPATCHER_DESC)?;
    code.invokeinterface(CALLABLE, "call", "()Ljava/lang/Object;")?;
    code.checkcast(this)?;
    emit::load_args(&mut code, &desc.params);
    code.invokevirtual(this, name, descriptor)?;
    code.return_value(ret);

    code.frame(listen, locals.clone(), vec![]);
    code.aload(0);
    code.getfield(this, LISTENER_FIELD, LISTENER_DESC)?;
    code.aload(0);
    code.getstatic(this, &field, emit::METHOD_DESC)?;
    emit::args_array(&mut code, &desc.params)?;
    code.invokeinterface(INVOCATION_LISTENER, "preInvoke", PRE_INVOKE_DESC)?;
    code.astore(token);

    code.mark(start);
    code.aload(0);
    code.getfield(this, DISPATCHER_FIELD, DISPATCHER_DESC)?;
    code.invokeinterface(CALLABLE, "call", "()Ljava/lang/Object;")?;
    code.checkcast(this)?;
    code.astore(target);
    code.aload(target);
    emit::load_args(&mut code, &desc.params);
    code.invokevirtual(this, name, descriptor)?;
    if let Some(ty) = ret {
        code.store(ty, result);
    }
    code.mark(end);

    code.aload(0);
    code.getfield(this, LISTENER_FIELD, LISTENER_DESC)?;
    code.aload(token);
    code.aload(0);
    code.getstatic(this, &field, emit::METHOD_DESC)?;
    match ret {
        Some(ty) => {
            code.load(ty, result);
            emit::box_value(&mut code, ty)?;
        }
        None => code.op(Instruction::Aconst_null),
    }
    code.invokeinterface(INVOCATION_LISTENER, "postInvoke", POST_INVOKE_DESC)?;
    if let Some(ty) = ret {
        code.load(ty, result);
    }
    code.return_value(ret);

    let mut handler_locals = locals;
    handler_locals.push(VType::object(OBJECT));
    code.frame(handler, handler_locals, vec![VType::object(emit::THROWABLE)]);
    code.astore(exception);
    code.aload(0);
    code.getfield(this, LISTENER_FIELD, LISTENER_DESC)?;
    code.aload(token);
    code.aload(0);
    code.getstatic(this, &field, emit::METHOD_DESC)?;
    code.aload(exception);
    code.invokeinterface(
        INVOCATION_LISTENER,
        "postInvokeExceptionalReturn",
        POST_INVOKE_EXCEPTIONAL_DESC,
    )?;
    code.aload(exception);
    code.op(Instruction::Athrow);
    code.try_catch(start, end, handler, Some(emit::THROWABLE));
    code.finish()
}

/// Fields and accessors that only the highest woven class declares.
fn write_woven_proxy_members(class: &mut ClassWriter, this: &str) -> Result<()> {
    let field_flags = access::PROTECTED | access::TRANSIENT | access::SYNTHETIC | access::FINAL;
    class.add_field(field_flags, DISPATCHER_FIELD, DISPATCHER_DESC, Vec::new())?;
    class.add_field(field_flags, LISTENER_FIELD, LISTENER_DESC, Vec::new())?;

    let method_flags = access::PUBLIC | access::FINAL | access::SYNTHETIC;
    let unwrap = {
        let mut code = CodeBuilder::new(&mut class.pool, 1);
        code.aload(0);
        code.getfield(this, DISPATCHER_FIELD, DISPATCHER_DESC)?;
        code.op(Instruction::Areturn);
        code.finish()?
    };
    class.add_method(method_flags, UNWRAP_METHOD, &format!("(){DISPATCHER_DESC}"), vec![unwrap])?;

    let is_proxy = {
        let mut code = CodeBuilder::new(&mut class.pool, 1);
        let yes = code.new_label();
        code.aload(0);
        code.getfield(this, DISPATCHER_FIELD, DISPATCHER_DESC)?;
        code.jump(Instruction::Ifnonnull, yes);
        code.aload(0);
        code.getfield(this, LISTENER_FIELD, LISTENER_DESC)?;
        code.jump(Instruction::Ifnonnull, yes);
        code.iconst(0)?;
        code.op(Instruction::Ireturn);
        code.frame(yes, vec![VType::object(this)], vec![]);
        code.iconst(1)?;
        code.op(Instruction::Ireturn);
        code.finish()?
    };
    class.add_method(method_flags, IS_PROXY_INSTANCE_METHOD, "()Z", vec![is_proxy])?;
    Ok(())
}

/// `createNewProxyInstance` and the rebinding constructor it calls. With
/// `init_owner` set the class declares the fields itself; otherwise the
/// constructor chains to the superclass's rebinding constructor.
fn write_factory(
    class: &mut ClassWriter,
    this: &str,
    super_name: &str,
    init_owner: Option<&str>,
) -> Result<()> {
    let factory = {
        let mut code = CodeBuilder::new(&mut class.pool, 3);
        code.new_object(this)?;
        code.op(Instruction::Dup);
        code.aload(1);
        code.aload(2);
        code.invokespecial(this, "<init>", REBIND_DESC)?;
        code.op(Instruction::Areturn);
        code.finish()?
    };
    class.add_method(
        access::PUBLIC,
        CREATE_NEW_PROXY_INSTANCE_METHOD,
        FACTORY_DESC,
        vec![factory],
    )?;

    let constructor = {
        let mut code = CodeBuilder::new(&mut class.pool, 3);
        let ok = code.new_label();
        code.aload(0);
        match init_owner {
            Some(owner) => {
                code.invokespecial(owner, "<init>", "()V")?;
                code.aload(0);
                code.aload(1);
                code.putfield(this, DISPATCHER_FIELD, DISPATCHER_DESC)?;
                code.aload(0);
                code.aload(2);
                code.putfield(this, LISTENER_FIELD, LISTENER_DESC)?;
            }
            None => {
                code.aload(1);
                code.aload(2);
                code.invokespecial(super_name, "<init>", REBIND_DESC)?;
            }
        }
        code.aload(1);
        code.jump(Instruction::Ifnonnull, ok);
        code.new_object(NPE)?;
        code.op(Instruction::Dup);
        code.ldc_string("The dispatcher must never be null!")?;
        code.invokespecial(NPE, "<init>", "(Ljava/lang/String;)V")?;
        code.op(Instruction::Athrow);
        code.frame(
            ok,
            vec![
                VType::object(this),
                VType::object(CALLABLE),
                VType::object(INVOCATION_LISTENER),
            ],
            vec![],
        );
        code.op(Instruction::Return);
        code.finish()?
    };
    class.add_method(
        access::PROTECTED | access::SYNTHETIC,
        "<init>",
        REBIND_DESC,
        vec![constructor],
    )?;
    Ok(())
}

/// Cache the reflective `Method` of every dispatched method. An existing
/// `<clinit>` calls the cache filler first.
fn write_static_init(class: &mut ClassWriter, this: &str, dispatched: &[Dispatched]) -> Result<()> {
    if dispatched.is_empty() {
        return Ok(());
    }
    for index in 0..dispatched.len() {
        class.add_field(
            access::PRIVATE | access::STATIC | access::SYNTHETIC,
            &method_field(index),
            emit::METHOD_DESC,
            Vec::new(),
        )?;
    }
    let fill = {
        let mut code = CodeBuilder::new(&mut class.pool, 0);
        emit::store_class_loader(&mut code, this, 0)?;
        for (index, d) in dispatched.iter().enumerate() {
            let descriptor = MethodDescriptor::parse(&d.descriptor)?;
            emit::lookup_method(&mut code, &d.owner, &d.name, &descriptor, 0)?;
            code.putstatic(this, &method_field(index), emit::METHOD_DESC)?;
        }
        code.op(Instruction::Return);
        code.finish()?
    };
    class.add_method(
        access::PRIVATE | access::STATIC | access::SYNTHETIC,
        STATIC_INIT_METHOD,
        "()V",
        vec![fill],
    )?;

    let extended = class.edit_method("<clinit>", "()V", |method, pool| {
        match method
            .attributes
            .iter_mut()
            .find(|a| matches!(a, Attribute::Code { .. }))
        {
            Some(code) => prepend_static_call(code, pool, this, STATIC_INIT_METHOD),
            None => Ok(()),
        }
    })?;
    if extended.is_none() {
        let clinit = {
            let mut code = CodeBuilder::new(&mut class.pool, 0);
            code.invokestatic(this, STATIC_INIT_METHOD, "()V")?;
            code.op(Instruction::Return);
            code.finish()?
        };
        class.add_method(access::STATIC, "<clinit>", "()V", vec![clinit])?;
    }
    Ok(())
}
