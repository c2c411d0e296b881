//! Subclass proxies: a generated class extends the target and routes every
//! overridable method through an `InvocationHandler`.

use crate::classfile::{ClassWriter, CodeBuilder, Instruction, VType, access, attribute};
use crate::descriptor::MethodDescriptor;
use crate::emit;
use crate::error::{ProxyError, Result};
use crate::method_set::{ProxyMethod, ProxySubclassMethodSet};
use crate::model::{ClassDescriptor, package_of};
use crate::source::ClassRepository;
use crate::suid;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

pub const DEFAULT_RELOCATION_PREFIX: &str = "org/apache/aries/blueprint/proxy";
pub const HANDLER_FIELD: &str = "ih";
pub const INVOCATION_HANDLER: &str = "java/lang/reflect/InvocationHandler";
const HANDLER_DESC: &str = "Ljava/lang/reflect/InvocationHandler;";
const INVOKE_DESC: &str =
    "(Ljava/lang/Object;Ljava/lang/reflect/Method;[Ljava/lang/Object;)Ljava/lang/Object;";
const INVOCATION_TARGET_EXCEPTION: &str = "java/lang/reflect/InvocationTargetException";

/// A generated proxy class.
#[derive(Debug, Serialize)]
pub struct GeneratedProxy {
    pub class_name: String,
    pub target: String,
    #[serde(skip)]
    pub bytes: Vec<u8>,
    pub methods: Vec<ProxyMethod>,
    /// `Some` when the proxy carries a `serialVersionUID`.
    pub serial_version_uid: Option<i64>,
    /// Whether that field was computed rather than copied from the target.
    pub synthetic_serial_version_uid: bool,
    pub handler_field: &'static str,
}

impl GeneratedProxy {
    pub fn bridge_count(&self) -> usize {
        self.methods.iter().map(|m| m.bridges.len()).sum()
    }
}

enum Outcome {
    Generated(Arc<GeneratedProxy>),
    Failed(ProxyError),
}

pub struct ProxySubclassGenerator {
    repository: Arc<ClassRepository>,
    relocation_prefix: String,
    cache: DashMap<String, Outcome>,
    /// Generated class name to target name.
    proxies: DashMap<String, String>,
}

impl ProxySubclassGenerator {
    pub fn new(repository: Arc<ClassRepository>) -> Self {
        Self::with_relocation_prefix(repository, DEFAULT_RELOCATION_PREFIX)
    }

    /// `prefix` is the package that hosts proxies of `java.*` and `javax.*`
    /// classes.
    pub fn with_relocation_prefix(repository: Arc<ClassRepository>, prefix: &str) -> Self {
        Self {
            repository,
            relocation_prefix: prefix.trim_end_matches('/').to_string(),
            cache: DashMap::new(),
            proxies: DashMap::new(),
        }
    }

    pub fn repository(&self) -> &Arc<ClassRepository> {
        &self.repository
    }

    /// Proxy for `class_name` (internal or binary name). Results are cached,
    /// and so are structural failures: a class that could not be proxied
    /// fails again with the same error without being reexamined.
    pub fn generate(&self, class_name: &str) -> Result<Arc<GeneratedProxy>> {
        let class_name = class_name.replace('.', "/");
        if let Some(outcome) = self.cache.get(&class_name) {
            return match outcome.value() {
                Outcome::Generated(proxy) => {
                    debug!("Found proxy subclass for {}: {}", class_name, proxy.class_name);
                    Ok(proxy.clone())
                }
                Outcome::Failed(err) => Err(err.terminal_copy().unwrap_or_else(|| {
                    ProxyError::unable(class_name.clone(), err.to_string())
                })),
            };
        }

        match self.build(&class_name) {
            Ok(proxy) => {
                let proxy = Arc::new(proxy);
                let stored = self
                    .cache
                    .entry(class_name.clone())
                    .or_insert_with(|| Outcome::Generated(proxy.clone()));
                match stored.value() {
                    Outcome::Generated(existing) => {
                        self.proxies
                            .insert(existing.class_name.clone(), class_name.clone());
                        info!("Generated proxy subclass {} for {}", existing.class_name, class_name);
                        Ok(existing.clone())
                    }
                    Outcome::Failed(_) => Ok(proxy),
                }
            }
            Err(err) => {
                if let Some(copy) = err.terminal_copy() {
                    debug!("Caching proxy failure for {}: {}", class_name, copy);
                    self.cache.insert(class_name, Outcome::Failed(copy));
                }
                Err(err)
            }
        }
    }

    pub fn is_proxy_class(&self, class_name: &str) -> bool {
        self.proxies.contains_key(&class_name.replace('.', "/"))
    }

    pub fn proxy_name(&self, target: &ClassDescriptor) -> String {
        let package = target.package();
        let package = if package.starts_with("java/") || package.starts_with("javax/") {
            format!("{}/{}", self.relocation_prefix, package)
        } else {
            package.to_string()
        };
        let simple = format!("${}{}", target.simple_name(), java_hash(&target.java_name()) as u32);
        if package.is_empty() {
            simple
        } else {
            format!("{package}/{simple}")
        }
    }

    fn build(&self, class_name: &str) -> Result<GeneratedProxy> {
        let target = self.repository.load(class_name)?;
        if target.is_final() {
            return Err(ProxyError::FinalClass {
                class_name: target.java_name(),
            });
        }
        if target.is_interface() {
            return Err(ProxyError::unable(
                target.java_name(),
                "interfaces cannot be subclassed",
            ));
        }

        let chain = self.repository.superclasses(&target)?;
        scan_final_methods(&chain)?;

        let proxy_name = self.proxy_name(&target);
        let relocated = package_of(&proxy_name) != target.package();
        check_constructor(&target, relocated)?;

        let methods = ProxySubclassMethodSet::collect(&chain, package_of(&proxy_name))?;
        debug!(
            "Proxying {} methods of {} as {}",
            methods.len(),
            target.name,
            proxy_name
        );

        let serial_version_uid = if self.repository.is_serializable(&target)? {
            match suid::declared_serial_version_uid(&target) {
                Some(v) => Some((v, false)),
                None => Some((suid::default_serial_version_uid(&target)?, true)),
            }
        } else {
            None
        };

        let bytes = write_proxy(&target, &proxy_name, &methods, serial_version_uid)?;
        Ok(GeneratedProxy {
            class_name: proxy_name,
            target: target.name.clone(),
            bytes,
            methods: methods.iter().cloned().collect(),
            serial_version_uid: serial_version_uid.map(|(v, _)| v),
            synthetic_serial_version_uid: serial_version_uid.is_some_and(|(_, s)| s),
            handler_field: HANDLER_FIELD,
        })
    }
}

/// Every non-static final method below `java.*`/`javax.*`, reported together.
fn scan_final_methods(chain: &[Arc<ClassDescriptor>]) -> Result<()> {
    let mut finals = Vec::new();
    for class in chain {
        if class.name.starts_with("java/") || class.name.starts_with("javax/") {
            break;
        }
        finals.extend(
            class
                .methods
                .iter()
                .filter(|m| m.has(access::FINAL) && !m.has(access::STATIC))
                .map(|m| m.name.clone()),
        );
    }
    if finals.is_empty() {
        return Ok(());
    }
    Err(ProxyError::FinalMethods {
        class_name: chain[0].java_name(),
        methods: finals,
    })
}

fn check_constructor(target: &ClassDescriptor, relocated: bool) -> Result<()> {
    if target.is_inner_non_static() {
        return Err(ProxyError::unable(
            target.java_name(),
            "non-static inner classes have no no-argument constructor",
        ));
    }
    let Some(ctor) = target.no_arg_constructor() else {
        return Err(ProxyError::unable(
            target.java_name(),
            "no no-argument constructor",
        ));
    };
    if ctor.has(access::PRIVATE) || (relocated && ctor.is_package_private()) {
        return Err(ProxyError::unable(
            target.java_name(),
            "the no-argument constructor is not accessible to the proxy",
        ));
    }
    Ok(())
}

/// `String.hashCode` of a Java string.
fn java_hash(s: &str) -> i32 {
    s.encode_utf16()
        .fold(0i32, |h, c| h.wrapping_mul(31).wrapping_add(i32::from(c)))
}

fn method_field(index: usize) -> String {
    format!("methodField{index}")
}

fn write_proxy(
    target: &ClassDescriptor,
    proxy_name: &str,
    methods: &ProxySubclassMethodSet,
    serial_version_uid: Option<(i64, bool)>,
) -> Result<Vec<u8>> {
    let mut class = ClassWriter::new(
        target.major_version.max(50),
        (target.access & !access::ABSTRACT) | access::SUPER,
        proxy_name,
        Some(&target.name),
    )?;
    if let Some(signature) = target
        .signature
        .as_deref()
        .and_then(|s| proxy_signature(&target.name, s))
    {
        let attribute = attribute::signature(&mut class.pool, &signature)?;
        class.add_attribute(attribute);
    }

    class.add_field(access::PRIVATE, HANDLER_FIELD, HANDLER_DESC, Vec::new())?;
    if let Some((value, synthetic)) = serial_version_uid {
        let mut flags = access::PRIVATE | access::STATIC | access::FINAL;
        if synthetic {
            flags |= access::SYNTHETIC;
        }
        let index = class.pool.add_long(value)?;
        let constant = attribute::constant_value(&mut class.pool, index)?;
        class.add_field(flags, suid::FIELD_NAME, "J", vec![constant])?;
    }

    let init = {
        let mut code = CodeBuilder::new(&mut class.pool, 1);
        code.aload(0);
        code.invokespecial(&target.name, "<init>", "()V")?;
        code.op(Instruction::Return);
        code.finish()?
    };
    class.add_method(access::PUBLIC, "<init>", "()V", vec![init])?;
    write_handler_accessors(&mut class, proxy_name)?;

    for (index, method) in methods.iter().enumerate() {
        class.add_field(
            access::PRIVATE | access::STATIC,
            &method_field(index),
            emit::METHOD_DESC,
            Vec::new(),
        )?;
        write_dispatch(&mut class, proxy_name, method, index)?;
        for bridge in &method.bridges {
            write_bridge(&mut class, proxy_name, method, bridge)?;
        }
    }

    if !methods.is_empty() {
        let clinit = {
            let mut code = CodeBuilder::new(&mut class.pool, 0);
            emit::store_class_loader(&mut code, proxy_name, 0)?;
            for (index, method) in methods.iter().enumerate() {
                let descriptor = MethodDescriptor::parse(&method.descriptor)?;
                emit::lookup_method(&mut code, &method.declaring_class, &method.name, &descriptor, 0)?;
                code.putstatic(proxy_name, &method_field(index), emit::METHOD_DESC)?;
            }
            code.op(Instruction::Return);
            code.finish()?
        };
        class.add_method(access::STATIC, "<clinit>", "()V", vec![clinit])?;
    }

    class.to_bytes()
}

fn write_handler_accessors(class: &mut ClassWriter, proxy_name: &str) -> Result<()> {
    let getter = {
        let mut code = CodeBuilder::new(&mut class.pool, 1);
        code.aload(0);
        code.getfield(proxy_name, HANDLER_FIELD, HANDLER_DESC)?;
        code.op(Instruction::Areturn);
        code.finish()?
    };
    let setter = {
        let mut code = CodeBuilder::new(&mut class.pool, 2);
        code.aload(0);
        code.aload(1);
        code.putfield(proxy_name, HANDLER_FIELD, HANDLER_DESC)?;
        code.op(Instruction::Return);
        code.finish()?
    };
    let flags = access::PUBLIC | access::FINAL;
    class.add_method(flags, "getInvocationHandler", &format!("(){HANDLER_DESC}"), vec![getter])?;
    class.add_method(flags, "setInvocationHandler", &format!("({HANDLER_DESC})V"), vec![setter])?;
    Ok(())
}

/// `return (R) ih.invoke(this, methodFieldN, args)`, rethrowing the cause of
/// an `InvocationTargetException`.
fn write_dispatch(
    class: &mut ClassWriter,
    proxy_name: &str,
    method: &ProxyMethod,
    index: usize,
) -> Result<()> {
    let descriptor = MethodDescriptor::parse(&method.descriptor)?;
    let mut attributes = Vec::new();
    {
        let mut code = CodeBuilder::new(&mut class.pool, 1 + descriptor.arg_slots());
        let start = code.new_label();
        let end = code.new_label();
        let handler = code.new_label();

        code.mark(start);
        code.aload(0);
        code.getfield(proxy_name, HANDLER_FIELD, HANDLER_DESC)?;
        code.aload(0);
        code.getstatic(proxy_name, &method_field(index), emit::METHOD_DESC)?;
        emit::args_array(&mut code, &descriptor.params)?;
        code.invokeinterface(INVOCATION_HANDLER, "invoke", INVOKE_DESC)?;
        emit::return_from_object(&mut code, descriptor.ret.as_ref())?;
        code.mark(end);

        code.frame(
            handler,
            emit::entry_locals(proxy_name, &descriptor.params),
            vec![VType::object(INVOCATION_TARGET_EXCEPTION)],
        );
        code.invokevirtual(
            INVOCATION_TARGET_EXCEPTION,
            "getCause",
            "()Ljava/lang/Throwable;",
        )?;
        code.op(Instruction::Athrow);
        code.try_catch(start, end, handler, Some(INVOCATION_TARGET_EXCEPTION));
        attributes.push(code.finish()?);
    }
    if !method.exceptions.is_empty() {
        attributes.push(attribute::exceptions(&mut class.pool, &method.exceptions)?);
    }
    if let Some(signature) = &method.signature {
        attributes.push(attribute::signature(&mut class.pool, signature)?);
    }

    let flags = method.access & !(access::NATIVE | access::SYNCHRONIZED | access::ABSTRACT);
    class.add_method(flags, &method.name, &method.descriptor, attributes)
}

/// Synthetic bridge from an ancestor's descriptor to the most-derived one.
fn write_bridge(
    class: &mut ClassWriter,
    proxy_name: &str,
    method: &ProxyMethod,
    bridge: &str,
) -> Result<()> {
    let descriptor = MethodDescriptor::parse(bridge)?;
    let code = {
        let mut code = CodeBuilder::new(&mut class.pool, 1 + descriptor.arg_slots());
        code.aload(0);
        emit::load_args(&mut code, &descriptor.params);
        code.invokevirtual(proxy_name, &method.name, &method.descriptor)?;
        code.return_value(descriptor.ret.as_ref());
        code.finish()?
    };
    let visibility = method.access & (access::PUBLIC | access::PROTECTED);
    let flags = visibility | access::BRIDGE | access::SYNTHETIC;
    class.add_method(flags, &method.name, bridge, vec![code])
}

/// `<T:...>LTarget<TT;>;` for a generic target, so the proxy keeps the
/// target's type parameters.
fn proxy_signature(target: &str, signature: &str) -> Option<String> {
    let (formals, names) = formal_type_parameters(signature)?;
    let args: String = names.iter().map(|n| format!("T{n};")).collect();
    Some(format!("{formals}L{target}<{args}>;"))
}

fn formal_type_parameters(signature: &str) -> Option<(&str, Vec<&str>)> {
    let bytes = signature.as_bytes();
    if bytes.first() != Some(&b'<') {
        return None;
    }
    let mut names = Vec::new();
    let mut i = 1;
    while *bytes.get(i)? != b'>' {
        let colon = i + signature[i..].find(':')?;
        names.push(&signature[i..colon]);
        i = colon;
        while bytes.get(i) == Some(&b':') {
            i += 1;
            if matches!(bytes.get(i), Some(b'L' | b'T' | b'[')) {
                i = skip_reference_type(bytes, i)?;
            }
        }
    }
    Some((&signature[..=i], names))
}

fn skip_reference_type(bytes: &[u8], mut i: usize) -> Option<usize> {
    match bytes.get(i)? {
        b'T' => {
            while *bytes.get(i)? != b';' {
                i += 1;
            }
            Some(i + 1)
        }
        b'[' => match bytes.get(i + 1)? {
            b'L' | b'T' | b'[' => skip_reference_type(bytes, i + 1),
            _ => Some(i + 2),
        },
        b'L' => {
            let mut depth = 0usize;
            loop {
                i += 1;
                match bytes.get(i)? {
                    b'<' => depth += 1,
                    b'>' => depth = depth.checked_sub(1)?,
                    b';' if depth == 0 => return Some(i + 1),
                    _ => {}
                }
            }
        }
        _ => None,
    }
}
