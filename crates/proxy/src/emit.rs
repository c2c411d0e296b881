//! Instruction sequences shared by the subclass and weaving generators.

use crate::classfile::{CodeBuilder, Instruction, VType};
use crate::descriptor::{FieldType, MethodDescriptor};
use crate::error::Result;

pub(crate) const CLASS: &str = "java/lang/Class";
pub(crate) const METHOD_DESC: &str = "Ljava/lang/reflect/Method;";
pub(crate) const THROWABLE: &str = "java/lang/Throwable";

/// Push every argument, starting at slot 1.
pub(crate) fn load_args(code: &mut CodeBuilder<'_>, params: &[FieldType]) {
    let mut slot = 1;
    for p in params {
        code.load(p, slot);
        slot += p.size();
    }
}

/// Box the primitive on top of the stack; references are left alone.
pub(crate) fn box_value(code: &mut CodeBuilder<'_>, ty: &FieldType) -> Result<()> {
    if let Some(boxing) = ty.boxing() {
        code.invokestatic(boxing.wrapper, "valueOf", &boxing.value_of)?;
    }
    Ok(())
}

/// Push an `Object[]` holding the (boxed) arguments.
pub(crate) fn args_array(code: &mut CodeBuilder<'_>, params: &[FieldType]) -> Result<()> {
    code.iconst(params.len() as i32)?;
    code.anewarray("java/lang/Object")?;
    let mut slot = 1;
    for (i, p) in params.iter().enumerate() {
        code.op(Instruction::Dup);
        code.iconst(i as i32)?;
        code.load(p, slot);
        box_value(code, p)?;
        code.op(Instruction::Aastore);
        slot += p.size();
    }
    Ok(())
}

/// Turn the `Object` on top of the stack into `ret` and return it.
pub(crate) fn return_from_object(code: &mut CodeBuilder<'_>, ret: Option<&FieldType>) -> Result<()> {
    match ret {
        None => code.op(Instruction::Pop),
        Some(ty) => match ty.boxing() {
            Some(boxing) => {
                code.checkcast(boxing.wrapper)?;
                code.invokevirtual(boxing.wrapper, boxing.unbox, &boxing.unbox_descriptor)?;
            }
            None => match ty.class_operand() {
                Some(class) if class != "java/lang/Object" => code.checkcast(&class)?,
                _ => {}
            },
        },
    }
    code.return_value(ret);
    Ok(())
}

/// Push the `Class` object for a parameter type. Primitive classes come
/// from the wrapper's `TYPE` field.
pub(crate) fn push_class(code: &mut CodeBuilder<'_>, ty: &FieldType) -> Result<()> {
    match (ty.boxing(), ty.class_operand()) {
        (Some(boxing), _) => code.getstatic(boxing.wrapper, "TYPE", "Ljava/lang/Class;"),
        (None, Some(class)) => code.ldc_class(&class),
        (None, None) => Ok(()),
    }
}

/// Store the calling class's loader in `slot`.
pub(crate) fn store_class_loader(code: &mut CodeBuilder<'_>, this_class: &str, slot: u16) -> Result<()> {
    code.ldc_class(this_class)?;
    code.invokevirtual(CLASS, "getClassLoader", "()Ljava/lang/ClassLoader;")?;
    code.astore(slot);
    Ok(())
}

/// Push `Class.forName(owner, false, loader).getDeclaredMethod(name, params)`.
/// `forName` is asked not to initialise `owner`.
pub(crate) fn lookup_method(
    code: &mut CodeBuilder<'_>,
    owner: &str,
    name: &str,
    descriptor: &MethodDescriptor,
    loader_slot: u16,
) -> Result<()> {
    code.ldc_string(&owner.replace('/', "."))?;
    code.iconst(0)?;
    code.aload(loader_slot);
    code.invokestatic(
        CLASS,
        "forName",
        "(Ljava/lang/String;ZLjava/lang/ClassLoader;)Ljava/lang/Class;",
    )?;
    code.ldc_string(name)?;
    code.iconst(descriptor.params.len() as i32)?;
    code.anewarray(CLASS)?;
    for (i, p) in descriptor.params.iter().enumerate() {
        code.op(Instruction::Dup);
        code.iconst(i as i32)?;
        push_class(code, p)?;
        code.op(Instruction::Aastore);
    }
    code.invokevirtual(
        CLASS,
        "getDeclaredMethod",
        "(Ljava/lang/String;[Ljava/lang/Class;)Ljava/lang/reflect/Method;",
    )
}

/// Frame locals of an instance method on entry: `this` then the parameters.
pub(crate) fn entry_locals(this_class: &str, params: &[FieldType]) -> Vec<VType> {
    let mut locals = vec![VType::object(this_class)];
    locals.extend(params.iter().map(FieldType::verification_type));
    locals
}

/// Push the zero value of `ret`.
pub(crate) fn push_default(code: &mut CodeBuilder<'_>, ret: Option<&FieldType>) -> Result<()> {
    match ret.map(FieldType::verification_type) {
        None => {}
        Some(VType::Long) => code.op(Instruction::Lconst_0),
        Some(VType::Double) => code.op(Instruction::Dconst_0),
        Some(VType::Float) => code.op(Instruction::Fconst_0),
        Some(VType::Object(_)) => code.op(Instruction::Aconst_null),
        Some(_) => code.iconst(0)?,
    }
    Ok(())
}
