//! Bytecode assembly for generated methods, plus the one edit applied to
//! existing code: prepending a call to a static initializer.
//!
//! ristretto addresses code by instruction index: branch targets, handler
//! ranges, line numbers and stack map deltas all count instructions, while
//! local variable ranges and `Uninitialized` offsets stay in bytes.

use super::pool::Pool;
use crate::descriptor::{FieldType, MethodDescriptor};
use crate::error::{ProxyError, Result};
use ristretto_classfile::attributes::{
    Attribute, ExceptionTableEntry, Instruction, StackFrame, VerificationType,
};

/// Verification type used in stack map frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VType {
    Integer,
    Float,
    Long,
    Double,
    Object(String),
}

impl VType {
    pub fn object(name: impl Into<String>) -> Self {
        VType::Object(name.into())
    }

    fn words(&self) -> u16 {
        match self {
            VType::Long | VType::Double => 2,
            _ => 1,
        }
    }

    fn resolve(&self, pool: &mut Pool) -> Result<VerificationType> {
        Ok(match self {
            VType::Integer => VerificationType::Integer,
            VType::Float => VerificationType::Float,
            VType::Long => VerificationType::Long,
            VType::Double => VerificationType::Double,
            VType::Object(name) => VerificationType::Object {
                cpool_index: pool.add_class(name)?,
            },
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Label(usize);

struct Handler {
    start: Label,
    end: Label,
    handler: Label,
    catch_type: Option<String>,
}

struct FrameAt {
    label: Label,
    locals: Vec<VType>,
    stack: Vec<VType>,
}

/// Assembles one method body. Stack depth is tracked per instruction, and
/// every branch target or handler must be marked with [`CodeBuilder::frame`].
pub struct CodeBuilder<'p> {
    pool: &'p mut Pool,
    code: Vec<Instruction>,
    labels: Vec<Option<usize>>,
    branches: Vec<(usize, Label)>,
    handlers: Vec<Handler>,
    frames: Vec<FrameAt>,
    stack: u16,
    max_stack: u16,
    max_locals: u16,
}

impl<'p> CodeBuilder<'p> {
    /// `params` is the number of local slots taken by `this` and the
    /// arguments.
    pub fn new(pool: &'p mut Pool, params: u16) -> Self {
        Self {
            pool,
            code: Vec::new(),
            labels: Vec::new(),
            branches: Vec::new(),
            handlers: Vec::new(),
            frames: Vec::new(),
            stack: 0,
            max_stack: 0,
            max_locals: params,
        }
    }

    fn emit(&mut self, instruction: Instruction, pop: u16, push: u16) {
        self.code.push(instruction);
        self.stack = self.stack.saturating_sub(pop) + push;
        self.max_stack = self.max_stack.max(self.stack);
    }

    fn touch_local(&mut self, slot: u16, size: u16) {
        self.max_locals = self.max_locals.max(slot + size);
    }

    pub fn new_label(&mut self) -> Label {
        self.labels.push(None);
        Label(self.labels.len() - 1)
    }

    pub fn mark(&mut self, label: Label) {
        self.labels[label.0] = Some(self.code.len());
    }

    /// Marks `label` and records the full frame that holds there. The
    /// tracked stack depth is reset to the frame's stack.
    pub fn frame(&mut self, label: Label, locals: Vec<VType>, stack: Vec<VType>) {
        self.mark(label);
        let local_words: u16 = locals.iter().map(VType::words).sum();
        self.max_locals = self.max_locals.max(local_words);
        self.stack = stack.iter().map(VType::words).sum();
        self.max_stack = self.max_stack.max(self.stack);
        self.frames.push(FrameAt {
            label,
            locals,
            stack,
        });
    }

    pub fn try_catch(&mut self, start: Label, end: Label, handler: Label, catch_type: Option<&str>) {
        self.handlers.push(Handler {
            start,
            end,
            handler,
            catch_type: catch_type.map(str::to_string),
        });
    }

    /// An instruction without operands.
    pub fn op(&mut self, instruction: Instruction) {
        let (pop, push) = match instruction {
            Instruction::Aconst_null | Instruction::Fconst_0 => (0, 1),
            Instruction::Lconst_0 | Instruction::Dconst_0 => (0, 2),
            Instruction::Aastore => (3, 0),
            Instruction::Pop => (1, 0),
            Instruction::Dup => (1, 2),
            Instruction::Ireturn
            | Instruction::Freturn
            | Instruction::Areturn
            | Instruction::Athrow => (1, 0),
            Instruction::Lreturn | Instruction::Dreturn => (2, 0),
            _ => (0, 0),
        };
        self.emit(instruction, pop, push);
    }

    pub fn iconst(&mut self, value: i32) -> Result<()> {
        let instruction = match value {
            -1 => Instruction::Iconst_m1,
            0 => Instruction::Iconst_0,
            1 => Instruction::Iconst_1,
            2 => Instruction::Iconst_2,
            3 => Instruction::Iconst_3,
            4 => Instruction::Iconst_4,
            5 => Instruction::Iconst_5,
            -128..=127 => Instruction::Bipush(value as i8),
            -32768..=32767 => Instruction::Sipush(value as i16),
            _ => {
                let index = self.pool.add_integer(value)?;
                self.ldc_index(index);
                return Ok(());
            }
        };
        self.emit(instruction, 0, 1);
        Ok(())
    }

    fn ldc_index(&mut self, index: u16) {
        match u8::try_from(index) {
            Ok(index) => self.emit(Instruction::Ldc(index), 0, 1),
            Err(_) => self.emit(Instruction::Ldc_w(index), 0, 1),
        }
    }

    pub fn ldc_string(&mut self, value: &str) -> Result<()> {
        let index = self.pool.add_string(value)?;
        self.ldc_index(index);
        Ok(())
    }

    /// Pushes a `Class` constant. Arrays are named by descriptor.
    pub fn ldc_class(&mut self, name: &str) -> Result<()> {
        let index = self.pool.add_class(name)?;
        self.ldc_index(index);
        Ok(())
    }

    fn local_op(
        &mut self,
        short: [Instruction; 4],
        narrow: fn(u8) -> Instruction,
        wide: fn(u16) -> Instruction,
        slot: u16,
        pop: u16,
        push: u16,
    ) {
        let instruction = match slot {
            0..=3 => short[slot as usize].clone(),
            4..=0xff => narrow(slot as u8),
            _ => wide(slot),
        };
        self.emit(instruction, pop, push);
    }

    pub fn aload(&mut self, slot: u16) {
        self.load(&FieldType::Object(String::new()), slot);
    }

    pub fn astore(&mut self, slot: u16) {
        self.store(&FieldType::Object(String::new()), slot);
    }

    pub fn load(&mut self, ty: &FieldType, slot: u16) {
        let size = ty.size();
        self.touch_local(slot, size);
        use Instruction as I;
        match ty {
            FieldType::Long => self.local_op(
                [I::Lload_0, I::Lload_1, I::Lload_2, I::Lload_3],
                I::Lload,
                I::Lload_w,
                slot,
                0,
                2,
            ),
            FieldType::Double => self.local_op(
                [I::Dload_0, I::Dload_1, I::Dload_2, I::Dload_3],
                I::Dload,
                I::Dload_w,
                slot,
                0,
                2,
            ),
            FieldType::Float => self.local_op(
                [I::Fload_0, I::Fload_1, I::Fload_2, I::Fload_3],
                I::Fload,
                I::Fload_w,
                slot,
                0,
                1,
            ),
            FieldType::Object(_) | FieldType::Array(_) => self.local_op(
                [I::Aload_0, I::Aload_1, I::Aload_2, I::Aload_3],
                I::Aload,
                I::Aload_w,
                slot,
                0,
                1,
            ),
            _ => self.local_op(
                [I::Iload_0, I::Iload_1, I::Iload_2, I::Iload_3],
                I::Iload,
                I::Iload_w,
                slot,
                0,
                1,
            ),
        }
    }

    pub fn store(&mut self, ty: &FieldType, slot: u16) {
        let size = ty.size();
        self.touch_local(slot, size);
        use Instruction as I;
        match ty {
            FieldType::Long => self.local_op(
                [I::Lstore_0, I::Lstore_1, I::Lstore_2, I::Lstore_3],
                I::Lstore,
                I::Lstore_w,
                slot,
                2,
                0,
            ),
            FieldType::Double => self.local_op(
                [I::Dstore_0, I::Dstore_1, I::Dstore_2, I::Dstore_3],
                I::Dstore,
                I::Dstore_w,
                slot,
                2,
                0,
            ),
            FieldType::Float => self.local_op(
                [I::Fstore_0, I::Fstore_1, I::Fstore_2, I::Fstore_3],
                I::Fstore,
                I::Fstore_w,
                slot,
                1,
                0,
            ),
            FieldType::Object(_) | FieldType::Array(_) => self.local_op(
                [I::Astore_0, I::Astore_1, I::Astore_2, I::Astore_3],
                I::Astore,
                I::Astore_w,
                slot,
                1,
                0,
            ),
            _ => self.local_op(
                [I::Istore_0, I::Istore_1, I::Istore_2, I::Istore_3],
                I::Istore,
                I::Istore_w,
                slot,
                1,
                0,
            ),
        }
    }

    /// Return instruction for `ret`; `None` is `void`.
    pub fn return_value(&mut self, ret: Option<&FieldType>) {
        match ret {
            None => self.op(Instruction::Return),
            Some(FieldType::Long) => self.op(Instruction::Lreturn),
            Some(FieldType::Double) => self.op(Instruction::Dreturn),
            Some(FieldType::Float) => self.op(Instruction::Freturn),
            Some(FieldType::Object(_)) | Some(FieldType::Array(_)) => self.op(Instruction::Areturn),
            Some(_) => self.op(Instruction::Ireturn),
        }
    }

    pub fn getstatic(&mut self, owner: &str, name: &str, descriptor: &str) -> Result<()> {
        let index = self.pool.add_field_ref(owner, name, descriptor)?;
        let words = FieldType::parse(descriptor)?.size();
        self.emit(Instruction::Getstatic(index), 0, words);
        Ok(())
    }

    pub fn putstatic(&mut self, owner: &str, name: &str, descriptor: &str) -> Result<()> {
        let index = self.pool.add_field_ref(owner, name, descriptor)?;
        let words = FieldType::parse(descriptor)?.size();
        self.emit(Instruction::Putstatic(index), words, 0);
        Ok(())
    }

    pub fn getfield(&mut self, owner: &str, name: &str, descriptor: &str) -> Result<()> {
        let index = self.pool.add_field_ref(owner, name, descriptor)?;
        let words = FieldType::parse(descriptor)?.size();
        self.emit(Instruction::Getfield(index), 1, words);
        Ok(())
    }

    pub fn putfield(&mut self, owner: &str, name: &str, descriptor: &str) -> Result<()> {
        let index = self.pool.add_field_ref(owner, name, descriptor)?;
        let words = FieldType::parse(descriptor)?.size();
        self.emit(Instruction::Putfield(index), 1 + words, 0);
        Ok(())
    }

    /// Stack effect of a call: (popped, pushed).
    fn call_effect(descriptor: &str, receiver: bool) -> Result<(u16, u16)> {
        let method = MethodDescriptor::parse(descriptor)?;
        let ret = method.ret.as_ref().map_or(0, FieldType::size);
        Ok((method.arg_slots() + u16::from(receiver), ret))
    }

    pub fn invokevirtual(&mut self, owner: &str, name: &str, descriptor: &str) -> Result<()> {
        let (pop, push) = Self::call_effect(descriptor, true)?;
        let index = self.pool.add_method_ref(owner, name, descriptor)?;
        self.emit(Instruction::Invokevirtual(index), pop, push);
        Ok(())
    }

    pub fn invokespecial(&mut self, owner: &str, name: &str, descriptor: &str) -> Result<()> {
        let (pop, push) = Self::call_effect(descriptor, true)?;
        let index = self.pool.add_method_ref(owner, name, descriptor)?;
        self.emit(Instruction::Invokespecial(index), pop, push);
        Ok(())
    }

    pub fn invokestatic(&mut self, owner: &str, name: &str, descriptor: &str) -> Result<()> {
        let (pop, push) = Self::call_effect(descriptor, false)?;
        let index = self.pool.add_method_ref(owner, name, descriptor)?;
        self.emit(Instruction::Invokestatic(index), pop, push);
        Ok(())
    }

    pub fn invokeinterface(&mut self, owner: &str, name: &str, descriptor: &str) -> Result<()> {
        let (pop, push) = Self::call_effect(descriptor, true)?;
        let index = self.pool.add_interface_method_ref(owner, name, descriptor)?;
        let count = u8::try_from(pop)
            .map_err(|_| ProxyError::format(format!("too many arguments for {name}{descriptor}")))?;
        self.emit(Instruction::Invokeinterface(index, count), pop, push);
        Ok(())
    }

    fn type_op(&mut self, op: fn(u16) -> Instruction, class: &str, pop: u16) -> Result<()> {
        let index = self.pool.add_class(class)?;
        self.emit(op(index), pop, 1);
        Ok(())
    }

    pub fn new_object(&mut self, class: &str) -> Result<()> {
        self.type_op(Instruction::New, class, 0)
    }

    pub fn anewarray(&mut self, class: &str) -> Result<()> {
        self.type_op(Instruction::Anewarray, class, 1)
    }

    pub fn checkcast(&mut self, class: &str) -> Result<()> {
        self.type_op(Instruction::Checkcast, class, 1)
    }

    pub fn instanceof(&mut self, class: &str) -> Result<()> {
        self.type_op(Instruction::Instanceof, class, 1)
    }

    /// Conditional or unconditional jump to `target`, e.g.
    /// `code.jump(Instruction::Ifnonnull, done)`.
    pub fn jump(&mut self, branch: fn(u16) -> Instruction, target: Label) {
        let instruction = branch(0);
        let pop = match instruction {
            Instruction::Goto(_) => 0,
            _ => 1,
        };
        self.branches.push((self.code.len(), target));
        self.emit(instruction, pop, 0);
    }

    fn position(&self, label: Label) -> Result<u16> {
        let position = self
            .labels
            .get(label.0)
            .copied()
            .flatten()
            .ok_or_else(|| ProxyError::format("branch to an unmarked label"))?;
        u16::try_from(position).map_err(|_| ProxyError::format("generated method too large"))
    }

    /// Resolve branches and frames into a `Code` attribute.
    pub fn finish(mut self) -> Result<Attribute> {
        for i in 0..self.branches.len() {
            let (at, label) = self.branches[i];
            let target = self.position(label)?;
            match branch_target(&mut self.code[at]) {
                Some(operand) => *operand = target,
                None => return Err(ProxyError::format("jump through a non-branch instruction")),
            }
        }

        let mut exception_table = Vec::with_capacity(self.handlers.len());
        for h in &self.handlers {
            let catch_type = match &h.catch_type {
                Some(name) => self.pool.add_class(name)?,
                None => 0,
            };
            exception_table.push(ExceptionTableEntry {
                range_pc: self.position(h.start)?..self.position(h.end)?,
                handler_pc: self.position(h.handler)?,
                catch_type,
            });
        }

        let mut resolved = Vec::with_capacity(self.frames.len());
        for frame in &self.frames {
            resolved.push((self.position(frame.label)?, frame));
        }
        resolved.sort_by_key(|(index, _)| *index);
        resolved.dedup_by_key(|(index, _)| *index);

        let mut frames = Vec::with_capacity(resolved.len());
        let mut previous: Option<u16> = None;
        for (index, frame) in resolved {
            let offset_delta = match previous {
                None => index,
                Some(p) => index - p - 1,
            };
            previous = Some(index);
            let locals = frame
                .locals
                .iter()
                .map(|v| v.resolve(self.pool))
                .collect::<Result<Vec<_>>>()?;
            let stack = frame
                .stack
                .iter()
                .map(|v| v.resolve(self.pool))
                .collect::<Result<Vec<_>>>()?;
            frames.push(StackFrame::FullFrame {
                frame_type: 255,
                offset_delta,
                locals,
                stack,
            });
        }

        let mut attributes = Vec::new();
        if !frames.is_empty() {
            attributes.push(Attribute::StackMapTable {
                name_index: self.pool.add_utf8("StackMapTable")?,
                frames,
            });
        }
        Ok(Attribute::Code {
            name_index: self.pool.add_utf8("Code")?,
            max_stack: self.max_stack,
            max_locals: self.max_locals,
            code: self.code,
            exception_table,
            attributes,
        })
    }
}

/// The 16-bit absolute target of a branch instruction.
fn branch_target(instruction: &mut Instruction) -> Option<&mut u16> {
    match instruction {
        Instruction::Ifeq(target)
        | Instruction::Ifne(target)
        | Instruction::Iflt(target)
        | Instruction::Ifge(target)
        | Instruction::Ifgt(target)
        | Instruction::Ifle(target)
        | Instruction::If_icmpeq(target)
        | Instruction::If_icmpne(target)
        | Instruction::If_icmplt(target)
        | Instruction::If_icmpge(target)
        | Instruction::If_icmpgt(target)
        | Instruction::If_icmple(target)
        | Instruction::If_acmpeq(target)
        | Instruction::If_acmpne(target)
        | Instruction::Goto(target)
        | Instruction::Jsr(target)
        | Instruction::Ifnull(target)
        | Instruction::Ifnonnull(target) => Some(target),
        _ => None,
    }
}

/// Insert `invokestatic owner.name()V` before the first instruction of
/// `code`.
///
/// The call is padded with a `nop` to four bytes so `tableswitch` and
/// `lookupswitch` alignment is unchanged and every byte offset moves by
/// exactly four.
pub fn prepend_static_call(
    attribute: &mut Attribute,
    pool: &mut Pool,
    owner: &str,
    name: &str,
) -> Result<()> {
    const INSTRUCTIONS: u16 = 2;
    const BYTES: u16 = 4;
    let Attribute::Code {
        code,
        exception_table,
        attributes,
        ..
    } = attribute
    else {
        return Err(ProxyError::format("expected a Code attribute"));
    };
    if code.len() + INSTRUCTIONS as usize > u16::MAX as usize {
        return Err(ProxyError::format("static initializer too large to extend"));
    }
    let index = pool.add_method_ref(owner, name, "()V")?;

    for instruction in code.iter_mut() {
        match instruction {
            Instruction::Goto_w(target) | Instruction::Jsr_w(target) => *target += i32::from(INSTRUCTIONS),
            other => {
                if let Some(target) = branch_target(other) {
                    *target += INSTRUCTIONS;
                }
            }
        }
    }
    code.insert(0, Instruction::Nop);
    code.insert(0, Instruction::Invokestatic(index));

    for entry in exception_table.iter_mut() {
        entry.range_pc = entry.range_pc.start + INSTRUCTIONS..entry.range_pc.end + INSTRUCTIONS;
        entry.handler_pc += INSTRUCTIONS;
    }

    // Offsets inside type annotations are not worth rewriting.
    attributes.retain(|a| {
        !matches!(
            a,
            Attribute::RuntimeVisibleTypeAnnotations { .. }
                | Attribute::RuntimeInvisibleTypeAnnotations { .. }
        )
    });
    for attribute in attributes.iter_mut() {
        match attribute {
            Attribute::LineNumberTable { line_numbers, .. } => {
                for line in line_numbers {
                    line.start_pc += INSTRUCTIONS;
                }
            }
            Attribute::LocalVariableTable { variables, .. } => {
                for variable in variables {
                    variable.start_pc += BYTES;
                }
            }
            Attribute::LocalVariableTypeTable { variable_types, .. } => {
                for variable in variable_types {
                    variable.start_pc += BYTES;
                }
            }
            Attribute::StackMapTable { frames, .. } => shift_frames(frames, INSTRUCTIONS, BYTES),
            _ => {}
        }
    }
    Ok(())
}

/// Only the first frame's delta is absolute. It is rewritten in its extended
/// form since the byte delta written for a compact frame may no longer fit.
fn shift_frames(frames: &mut [StackFrame], instructions: u16, bytes: u16) {
    if let Some(first) = frames.first_mut() {
        let shifted = match first.clone() {
            StackFrame::SameFrame { frame_type } => StackFrame::SameFrameExtended {
                frame_type: 251,
                offset_delta: u16::from(frame_type) + instructions,
            },
            StackFrame::SameFrameExtended { offset_delta, .. } => StackFrame::SameFrameExtended {
                frame_type: 251,
                offset_delta: offset_delta + instructions,
            },
            StackFrame::SameLocals1StackItemFrame { frame_type, stack } => {
                StackFrame::SameLocals1StackItemFrameExtended {
                    frame_type: 247,
                    offset_delta: u16::from(frame_type - 64) + instructions,
                    stack,
                }
            }
            StackFrame::SameLocals1StackItemFrameExtended {
                offset_delta,
                stack,
                ..
            } => StackFrame::SameLocals1StackItemFrameExtended {
                frame_type: 247,
                offset_delta: offset_delta + instructions,
                stack,
            },
            StackFrame::ChopFrame {
                frame_type,
                offset_delta,
            } => StackFrame::ChopFrame {
                frame_type,
                offset_delta: offset_delta + instructions,
            },
            StackFrame::AppendFrame {
                frame_type,
                offset_delta,
                locals,
            } => StackFrame::AppendFrame {
                frame_type,
                offset_delta: offset_delta + instructions,
                locals,
            },
            StackFrame::FullFrame {
                frame_type,
                offset_delta,
                locals,
                stack,
            } => StackFrame::FullFrame {
                frame_type,
                offset_delta: offset_delta + instructions,
                locals,
                stack,
            },
        };
        *first = shifted;
    }

    for frame in frames.iter_mut() {
        let types: Vec<&mut VerificationType> = match frame {
            StackFrame::SameFrame { .. }
            | StackFrame::SameFrameExtended { .. }
            | StackFrame::ChopFrame { .. } => Vec::new(),
            StackFrame::SameLocals1StackItemFrame { stack, .. }
            | StackFrame::SameLocals1StackItemFrameExtended { stack, .. } => stack.iter_mut().collect(),
            StackFrame::AppendFrame { locals, .. } => locals.iter_mut().collect(),
            StackFrame::FullFrame { locals, stack, .. } => {
                locals.iter_mut().chain(stack.iter_mut()).collect()
            }
        };
        for v in types {
            if let VerificationType::Uninitialized { offset } = v {
                *offset += bytes;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ristretto_classfile::attributes::LineNumber;

    fn code_parts(attribute: &Attribute) -> (&Vec<Instruction>, &Vec<ExceptionTableEntry>, &Vec<Attribute>) {
        match attribute {
            Attribute::Code {
                code,
                exception_table,
                attributes,
                ..
            } => (code, exception_table, attributes),
            other => panic!("not a Code attribute: {other:?}"),
        }
    }

    #[test]
    fn test_branch_targets_and_max_stack() {
        let mut pool = Pool::new();
        let mut code = CodeBuilder::new(&mut pool, 1);
        let done = code.new_label();
        code.aload(0);
        code.jump(Instruction::Ifnull, done);
        code.iconst(1).unwrap();
        code.return_value(Some(&FieldType::Int));
        code.frame(done, vec![VType::object("A")], vec![]);
        code.iconst(0).unwrap();
        code.return_value(Some(&FieldType::Int));
        let attribute = code.finish().unwrap();

        let Attribute::Code {
            max_stack,
            max_locals,
            ..
        } = &attribute
        else {
            panic!("expected Code");
        };
        assert_eq!((*max_stack, *max_locals), (1, 1));
        let (code, _, attributes) = code_parts(&attribute);
        assert_eq!(
            code,
            &vec![
                Instruction::Aload_0,
                Instruction::Ifnull(4),
                Instruction::Iconst_1,
                Instruction::Ireturn,
                Instruction::Iconst_0,
                Instruction::Ireturn,
            ]
        );
        match &attributes[0] {
            Attribute::StackMapTable { frames, .. } => {
                assert_eq!(frames.len(), 1);
                assert_eq!(frames[0].offset_delta(), 4);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_wide_locals_and_interface_counts() {
        let mut pool = Pool::new();
        let mut code = CodeBuilder::new(&mut pool, 1);
        code.load(&FieldType::Long, 300);
        code.store(&FieldType::Long, 5);
        code.aload(0);
        code.iconst(1).unwrap();
        code.invokeinterface("p/I", "call", "(I)V").unwrap();
        code.op(Instruction::Return);
        let attribute = code.finish().unwrap();
        let (code, _, _) = code_parts(&attribute);
        assert_eq!(code[0], Instruction::Lload_w(300));
        assert_eq!(code[1], Instruction::Lstore(5));
        assert!(matches!(code[4], Instruction::Invokeinterface(_, 2)));
        let Attribute::Code { max_locals, .. } = attribute else {
            panic!("expected Code");
        };
        assert_eq!(max_locals, 302);
    }

    #[test]
    fn test_prepend_shifts_targets_and_tables() {
        let mut pool = Pool::new();
        let mut code = CodeBuilder::new(&mut pool, 0);
        let target = code.new_label();
        code.iconst(0).unwrap();
        code.jump(Instruction::Ifeq, target);
        code.frame(target, vec![], vec![]);
        code.op(Instruction::Return);
        let mut attribute = code.finish().unwrap();
        if let Attribute::Code {
            exception_table,
            attributes,
            ..
        } = &mut attribute
        {
            exception_table.push(ExceptionTableEntry {
                range_pc: 0..2,
                handler_pc: 2,
                catch_type: 0,
            });
            attributes.push(Attribute::LineNumberTable {
                name_index: 1,
                line_numbers: vec![LineNumber {
                    start_pc: 1,
                    line_number: 10,
                }],
            });
        }

        prepend_static_call(&mut attribute, &mut pool, "A", "init").unwrap();

        let (code, exception_table, attributes) = code_parts(&attribute);
        assert!(matches!(code[0], Instruction::Invokestatic(_)));
        assert_eq!(code[1], Instruction::Nop);
        assert_eq!(code[3], Instruction::Ifeq(4));
        assert_eq!(exception_table[0].range_pc, 2..4);
        assert_eq!(exception_table[0].handler_pc, 4);
        match &attributes[0] {
            Attribute::StackMapTable { frames, .. } => {
                assert!(matches!(frames[0], StackFrame::FullFrame { offset_delta: 4, .. }));
            }
            other => panic!("unexpected {other:?}"),
        }
        match &attributes[1] {
            Attribute::LineNumberTable { line_numbers, .. } => assert_eq!(line_numbers[0].start_pc, 3),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_compact_first_frame_is_widened() {
        let mut frames = vec![
            StackFrame::SameFrame { frame_type: 63 },
            StackFrame::SameLocals1StackItemFrame {
                frame_type: 64,
                stack: vec![VerificationType::Uninitialized { offset: 10 }],
            },
        ];
        shift_frames(&mut frames, 2, 4);
        assert_eq!(
            frames[0],
            StackFrame::SameFrameExtended {
                frame_type: 251,
                offset_delta: 65
            }
        );
        assert_eq!(
            frames[1],
            StackFrame::SameLocals1StackItemFrame {
                frame_type: 64,
                stack: vec![VerificationType::Uninitialized { offset: 14 }],
            }
        );
    }
}
