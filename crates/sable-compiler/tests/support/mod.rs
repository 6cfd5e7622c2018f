//! A small stack interpreter for compiled units.
//!
//! It runs the subset of opcodes the tests need and counts every executed
//! instruction, so tests can assert on control flow as well as results.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use sable_compiler::Value;
use sable_compiler::compiler::{Artifact, Bytecode, CompiledFunction, Decoder, OpCode};

/// A run-time value.
#[derive(Debug, Clone)]
pub enum RtValue {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Rc<RefCell<Vec<RtValue>>>),
    Function(Rc<Closure>),
    Iterator(Rc<RefCell<IterState>>),
}

impl PartialEq for RtValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (RtValue::Nil, RtValue::Nil) => true,
            (RtValue::Bool(a), RtValue::Bool(b)) => a == b,
            (RtValue::Int(a), RtValue::Int(b)) => a == b,
            (RtValue::Float(a), RtValue::Float(b)) => a == b,
            (RtValue::Str(a), RtValue::Str(b)) => a == b,
            (RtValue::List(a), RtValue::List(b)) => *a.borrow() == *b.borrow(),
            (RtValue::Function(a), RtValue::Function(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl RtValue {
    pub fn list(items: Vec<RtValue>) -> Self {
        RtValue::List(Rc::new(RefCell::new(items)))
    }

    fn truthy(&self) -> bool {
        !matches!(self, RtValue::Nil | RtValue::Bool(false))
    }
}

/// A function together with its captured values.
#[derive(Debug)]
pub struct Closure {
    pub function: Arc<CompiledFunction>,
    pub captured: Vec<RtValue>,
}

/// Iteration state: materialized entries and a cursor.
#[derive(Debug)]
pub struct IterState {
    entries: Vec<(RtValue, RtValue)>,
    current: Option<usize>,
}

struct CallFrame {
    function: Arc<CompiledFunction>,
    pc: usize,
    locals: Vec<RtValue>,
}

/// Executes the root unit of an artifact.
pub struct Machine<'a> {
    unit: &'a Bytecode,
    pub globals: HashMap<String, RtValue>,
    counts: HashMap<OpCode, usize>,
    stack: Vec<RtValue>,
    frames: Vec<CallFrame>,
}

impl<'a> Machine<'a> {
    pub fn new(artifact: &'a Artifact) -> Self {
        Self {
            unit: artifact.root(),
            globals: HashMap::new(),
            counts: HashMap::new(),
            stack: Vec::new(),
            frames: Vec::new(),
        }
    }

    /// Number of times `opcode` was executed.
    pub fn count(&self, opcode: OpCode) -> usize {
        self.counts.get(&opcode).copied().unwrap_or(0)
    }

    pub fn global(&self, name: &str) -> Option<&RtValue> {
        self.globals.get(name)
    }

    /// Runs the main function until `Suspend`, returning the top of the stack.
    pub fn run(&mut self) -> Result<Option<RtValue>, String> {
        let main = Arc::new(self.unit.main.clone());
        let locals = vec![RtValue::Nil; main.local_count];
        self.frames.push(CallFrame {
            function: main,
            pc: 0,
            locals,
        });

        loop {
            let frame = self.frames.last_mut().ok_or("no frame")?;
            let (_, instruction) = Decoder::new(&frame.function.instructions[frame.pc..])
                .next()
                .ok_or_else(|| format!("ran off the end at {}", frame.pc))?;
            frame.pc += instruction.opcode.size();
            *self.counts.entry(instruction.opcode).or_default() += 1;

            let operand = instruction.operand().unwrap_or(0);
            match instruction.opcode {
                OpCode::PushConstant => {
                    let value = self.constant(operand)?;
                    self.stack.push(value);
                }
                OpCode::PushNil => self.stack.push(RtValue::Nil),
                OpCode::PushTrue => self.stack.push(RtValue::Bool(true)),
                OpCode::PushFalse => self.stack.push(RtValue::Bool(false)),
                OpCode::Pop => {
                    self.pop()?;
                }
                OpCode::Dup => {
                    let top = self.peek()?.clone();
                    self.stack.push(top);
                }
                OpCode::Dup2 => {
                    let len = self.stack.len();
                    if len < 2 {
                        return Err("stack underflow".to_string());
                    }
                    let pair = self.stack[len - 2..].to_vec();
                    self.stack.extend(pair);
                }
                OpCode::Swap => {
                    let len = self.stack.len();
                    self.stack.swap(len - 1, len - 2);
                }

                OpCode::GetLocal => {
                    let value = self.frame().locals[operand as usize].clone();
                    self.stack.push(value);
                }
                OpCode::SetLocal => {
                    let value = self.pop()?;
                    self.frame_mut().locals[operand as usize] = value;
                }
                OpCode::GetGlobal => {
                    let name = self.name(operand)?;
                    let value = self
                        .globals
                        .get(&name)
                        .cloned()
                        .ok_or_else(|| format!("undefined global {}", name))?;
                    self.stack.push(value);
                }
                OpCode::SetGlobal => {
                    let name = self.name(operand)?;
                    let value = self.pop()?;
                    self.globals.insert(name, value);
                }

                OpCode::Add
                | OpCode::IntAdd
                | OpCode::FloatAdd
                | OpCode::Sub
                | OpCode::IntSub
                | OpCode::FloatSub
                | OpCode::Mul
                | OpCode::IntMul
                | OpCode::FloatMul
                | OpCode::Div
                | OpCode::IntDiv
                | OpCode::FloatDiv
                | OpCode::Less
                | OpCode::IntLess
                | OpCode::FloatLess
                | OpCode::LessEq
                | OpCode::IntLessEq
                | OpCode::FloatLessEq
                | OpCode::Greater
                | OpCode::IntGreater
                | OpCode::FloatGreater
                | OpCode::GreaterEq
                | OpCode::IntGreaterEq
                | OpCode::FloatGreaterEq => {
                    let right = self.pop()?;
                    let left = self.pop()?;
                    self.stack.push(binary(instruction.opcode, left, right)?);
                }
                OpCode::Equal => {
                    let right = self.pop()?;
                    let left = self.pop()?;
                    self.stack.push(RtValue::Bool(left == right));
                }
                OpCode::NotEqual => {
                    let right = self.pop()?;
                    let left = self.pop()?;
                    self.stack.push(RtValue::Bool(left != right));
                }
                OpCode::Not => {
                    let value = self.pop()?;
                    self.stack.push(RtValue::Bool(!value.truthy()));
                }
                OpCode::Negate => match self.pop()? {
                    RtValue::Int(n) => self.stack.push(RtValue::Int(-n)),
                    RtValue::Float(n) => self.stack.push(RtValue::Float(-n)),
                    other => return Err(format!("cannot negate {:?}", other)),
                },

                OpCode::Jump => self.frame_mut().pc = operand as usize,
                OpCode::JumpIfFalse => {
                    if !self.pop()?.truthy() {
                        self.frame_mut().pc = operand as usize;
                    }
                }
                OpCode::JumpIfTrue => {
                    if self.pop()?.truthy() {
                        self.frame_mut().pc = operand as usize;
                    }
                }
                OpCode::JumpIfNotNil => {
                    if self.pop()? != RtValue::Nil {
                        self.frame_mut().pc = operand as usize;
                    }
                }

                OpCode::CreateRange => {
                    let end = self.pop_int()?;
                    let start = self.pop_int()?;
                    let end = if operand == 1 { end - 1 } else { end };
                    self.stack.push(RtValue::list((start..=end).map(RtValue::Int).collect()));
                }
                OpCode::CreateList => {
                    let items = self.pop_n(operand as usize)?;
                    self.stack.push(RtValue::list(items));
                }
                OpCode::AppendList => {
                    let items = self.pop_n(operand as usize)?;
                    match self.peek()? {
                        RtValue::List(list) => list.borrow_mut().extend(items),
                        other => return Err(format!("cannot append to {:?}", other)),
                    }
                }
                OpCode::CreateListDynamic => {
                    let count = self.pop_int()?;
                    let items = self.pop_n(count as usize)?;
                    self.stack.push(RtValue::list(items));
                }
                OpCode::GetIndex | OpCode::GetIndexOrNil => {
                    let index = self.pop_int()?;
                    let list = match self.pop()? {
                        RtValue::List(list) => list,
                        other => return Err(format!("cannot index {:?}", other)),
                    };
                    let item = list.borrow().get(index as usize).cloned();
                    match item {
                        Some(item) => self.stack.push(item),
                        None if instruction.opcode == OpCode::GetIndexOrNil => self.stack.push(RtValue::Nil),
                        None => return Err(format!("index {} out of bounds", index)),
                    }
                }
                OpCode::SetIndex => {
                    let value = self.pop()?;
                    let index = self.pop_int()?;
                    match self.pop()? {
                        RtValue::List(list) => list.borrow_mut()[index as usize] = value,
                        other => return Err(format!("cannot index {:?}", other)),
                    }
                }

                OpCode::Call => {
                    if instruction.operands[1] != 0 {
                        return Err("spread calls are not supported".to_string());
                    }
                    let args = self.pop_n(operand as usize)?;
                    let RtValue::Function(closure) = self.pop()? else {
                        return Err("callee is not a function".to_string());
                    };
                    let function = closure.function.clone();
                    let mut locals = args;
                    locals.resize(function.param_count, RtValue::Nil);
                    locals.extend(closure.captured.iter().cloned());
                    locals.resize(function.local_count.max(locals.len()), RtValue::Nil);
                    self.frames.push(CallFrame {
                        function,
                        pc: 0,
                        locals,
                    });
                }
                OpCode::BindCapturedLocals => {
                    let captured = self.pop_n(operand as usize)?;
                    let RtValue::Function(closure) = self.pop()? else {
                        return Err("captures bound to a non-function".to_string());
                    };
                    self.stack.push(RtValue::Function(Rc::new(Closure {
                        function: closure.function.clone(),
                        captured,
                    })));
                }
                OpCode::Return => {
                    let value = if operand == 1 { self.pop()? } else { RtValue::Nil };
                    self.frames.pop();
                    if self.frames.is_empty() {
                        return Ok(Some(value));
                    }
                    self.stack.push(value);
                }

                OpCode::IterInit => {
                    let patterns = (operand & 3).count_ones() as usize;
                    self.pop_n(patterns)?;
                    let entries = match self.pop()? {
                        RtValue::List(list) => list
                            .borrow()
                            .iter()
                            .enumerate()
                            .map(|(i, v)| (RtValue::Int(i as i64), v.clone()))
                            .collect(),
                        other => return Err(format!("cannot iterate {:?}", other)),
                    };
                    self.stack.push(RtValue::Iterator(Rc::new(RefCell::new(IterState {
                        entries,
                        current: None,
                    }))));
                }
                OpCode::IterNext => {
                    let RtValue::Iterator(state) = self.pop()? else {
                        return Err("not an iterator".to_string());
                    };
                    let mut state = state.borrow_mut();
                    let next = state.current.map_or(0, |i| i + 1);
                    state.current = Some(next);
                    self.stack.push(RtValue::Bool(next < state.entries.len()));
                }
                OpCode::IterKey | OpCode::IterValue => {
                    let RtValue::Iterator(state) = self.pop()? else {
                        return Err("not an iterator".to_string());
                    };
                    let state = state.borrow();
                    let index = state.current.ok_or("iterator not started")?;
                    let (key, value) = state.entries[index].clone();
                    let item = if instruction.opcode == OpCode::IterKey { key } else { value };
                    self.stack.push(item);
                }

                OpCode::Suspend => return Ok(self.stack.last().cloned()),
                other => return Err(format!("unsupported opcode {}", other)),
            }
        }
    }

    fn frame(&self) -> &CallFrame {
        self.frames.last().expect("a frame is running")
    }

    fn frame_mut(&mut self) -> &mut CallFrame {
        self.frames.last_mut().expect("a frame is running")
    }

    fn pop(&mut self) -> Result<RtValue, String> {
        self.stack.pop().ok_or_else(|| "stack underflow".to_string())
    }

    fn peek(&self) -> Result<&RtValue, String> {
        self.stack.last().ok_or_else(|| "stack underflow".to_string())
    }

    fn pop_int(&mut self) -> Result<i64, String> {
        match self.pop()? {
            RtValue::Int(n) => Ok(n),
            other => Err(format!("expected an integer, got {:?}", other)),
        }
    }

    fn pop_n(&mut self, n: usize) -> Result<Vec<RtValue>, String> {
        if self.stack.len() < n {
            return Err("stack underflow".to_string());
        }
        Ok(self.stack.split_off(self.stack.len() - n))
    }

    fn name(&self, index: u16) -> Result<String, String> {
        self.unit.constants[index as usize]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| format!("constant {} is not a name", index))
    }

    fn constant(&self, index: u16) -> Result<RtValue, String> {
        let value = match &self.unit.constants[index as usize] {
            Value::Nil => RtValue::Nil,
            Value::Bool(b) => RtValue::Bool(*b),
            Value::Int(n) => RtValue::Int(*n),
            Value::Float(n) => RtValue::Float(*n),
            Value::Str(s) => RtValue::Str(s.to_string()),
            Value::IntRange(range) => {
                let end = if range.inclusive { range.end } else { range.end - 1 };
                RtValue::list((range.start..=end).map(RtValue::Int).collect())
            }
            Value::Function(function) => RtValue::Function(Rc::new(Closure {
                function: function.clone(),
                captured: Vec::new(),
            })),
            other => return Err(format!("unsupported constant {}", other)),
        };
        Ok(value)
    }
}

fn binary(opcode: OpCode, left: RtValue, right: RtValue) -> Result<RtValue, String> {
    use OpCode::*;

    let value = match (left, right) {
        (RtValue::Int(a), RtValue::Int(b)) => match opcode {
            Add | IntAdd => RtValue::Int(a + b),
            Sub | IntSub => RtValue::Int(a - b),
            Mul | IntMul => RtValue::Int(a * b),
            Div | IntDiv => RtValue::Int(a.checked_div(b).ok_or("division by zero")?),
            Less | IntLess => RtValue::Bool(a < b),
            LessEq | IntLessEq => RtValue::Bool(a <= b),
            Greater | IntGreater => RtValue::Bool(a > b),
            GreaterEq | IntGreaterEq => RtValue::Bool(a >= b),
            _ => return Err(format!("{} applied to integers", opcode)),
        },
        (RtValue::Float(a), RtValue::Float(b)) => match opcode {
            Add | FloatAdd => RtValue::Float(a + b),
            Sub | FloatSub => RtValue::Float(a - b),
            Mul | FloatMul => RtValue::Float(a * b),
            Div | FloatDiv => RtValue::Float(a / b),
            Less | FloatLess => RtValue::Bool(a < b),
            LessEq | FloatLessEq => RtValue::Bool(a <= b),
            Greater | FloatGreater => RtValue::Bool(a > b),
            GreaterEq | FloatGreaterEq => RtValue::Bool(a >= b),
            _ => return Err(format!("{} applied to floats", opcode)),
        },
        (left, right) => return Err(format!("{} applied to {:?} and {:?}", opcode, left, right)),
    };
    Ok(value)
}
