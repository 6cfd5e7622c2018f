//! Side data produced by the analysis passes that run before compilation.
//!
//! The compiler never computes these itself: the static-check pass supplies
//! capture lists, global-definition flags and hoisting points, and the
//! symbolic pass supplies inferred types. Both are keyed by [`NodeId`].

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::ast::NodeId;

/// Output of the static-check pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticCheckData {
    /// Capture list per function literal
    pub captures: FxHashMap<NodeId, Vec<String>>,
    /// Assignment statements whose target must be defined as a global
    pub global_assignments: FxHashSet<NodeId>,
    /// Hoisting point per scope (chunk, included chunk or embedded module body)
    pub hoisting: FxHashMap<NodeId, HoistPoint>,
}

/// Where no-capture top-level functions get compiled ahead of their declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoistPoint {
    /// Source offset of the earliest forward reference
    pub position: u32,
    /// Function declaration statements to hoist there
    pub functions: Vec<NodeId>,
}

impl StaticCheckData {
    /// Capture list recorded for a function literal.
    pub fn captures_of(&self, function: NodeId) -> Option<&[String]> {
        self.captures.get(&function).map(Vec::as_slice)
    }

    /// Whether an assignment statement defines a global.
    pub fn defines_global(&self, assignment: NodeId) -> bool {
        self.global_assignments.contains(&assignment)
    }

    /// Hoisting point of a scope.
    pub fn hoist_point(&self, scope: NodeId) -> Option<&HoistPoint> {
        self.hoisting.get(&scope)
    }
}

/// Output of the symbolic pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SymbolicData {
    /// Most specific inferred type per expression
    pub types: FxHashMap<NodeId, SymbolicType>,
    /// Member expressions bound to an extension method, with the method name
    pub extension_methods: FxHashMap<NodeId, String>,
}

impl SymbolicData {
    /// Inferred type of an expression.
    pub fn type_of(&self, node: NodeId) -> Option<&SymbolicType> {
        self.types.get(&node)
    }

    /// Extension method a member expression resolves to.
    pub fn extension_method(&self, node: NodeId) -> Option<&str> {
        self.extension_methods.get(&node).map(String::as_str)
    }
}

/// An inferred type.
///
/// Only the distinctions code generation cares about are kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SymbolicType {
    /// Nothing useful is known
    Any,
    /// nil
    Nil,
    /// Boolean
    Bool,
    /// 64-bit integer
    Int,
    /// 64-bit float
    Float,
    /// String
    String,
    /// List
    List,
    /// Object
    Object,
    /// Pattern
    Pattern,
    /// Inline struct value
    Struct(StructType),
    /// Pointer to a fixed-layout struct
    Pointer(StructType),
}

impl SymbolicType {
    /// Struct pointed to, if this is a struct pointer.
    pub fn pointee(&self) -> Option<&StructType> {
        match self {
            SymbolicType::Pointer(st) => Some(st),
            _ => None,
        }
    }
}

/// A struct with a fixed memory layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructType {
    /// Struct name
    pub name: String,
    /// Fields in declaration order
    pub fields: Vec<StructField>,
}

/// A struct field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructField {
    /// Field name
    pub name: String,
    /// Field type
    pub field_type: FieldType,
}

/// Types a struct field can have.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldType {
    /// 1-byte boolean
    Bool,
    /// 8-byte integer
    Int,
    /// 8-byte float
    Float,
    /// Inline nested struct
    Struct(StructType),
}

impl FieldType {
    /// Size in bytes.
    pub fn size(&self) -> usize {
        match self {
            FieldType::Bool => 1,
            FieldType::Int | FieldType::Float => 8,
            FieldType::Struct(st) => st.size(),
        }
    }

    /// Alignment in bytes.
    pub fn align(&self) -> usize {
        match self {
            FieldType::Bool => 1,
            FieldType::Int | FieldType::Float => 8,
            FieldType::Struct(st) => st.align(),
        }
    }
}

/// Position of a field inside its struct.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldLocation<'a> {
    /// Byte offset from the start of the struct
    pub offset: usize,
    /// Type of the field
    pub field_type: &'a FieldType,
}

fn align_up(offset: usize, align: usize) -> usize {
    offset.div_ceil(align) * align
}

impl StructType {
    /// Alignment of the struct: the largest field alignment.
    pub fn align(&self) -> usize {
        self.fields.iter().map(|f| f.field_type.align()).max().unwrap_or(1)
    }

    /// Size of the struct including trailing padding.
    pub fn size(&self) -> usize {
        let end = self.fields.iter().fold(0, |offset, field| {
            align_up(offset, field.field_type.align()) + field.field_type.size()
        });
        align_up(end, self.align())
    }

    /// Locates a field by name.
    pub fn field(&self, name: &str) -> Option<FieldLocation<'_>> {
        let mut offset = 0;
        for field in &self.fields {
            offset = align_up(offset, field.field_type.align());
            if field.name == name {
                return Some(FieldLocation {
                    offset,
                    field_type: &field.field_type,
                });
            }
            offset += field.field_type.size();
        }
        None
    }
}
