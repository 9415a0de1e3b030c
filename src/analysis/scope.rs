//! Declarations and lexical scopes.

use std::collections::HashMap;

use super::types::{uint256, DataLocation, Magic, SolType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    Contract,
    Function,
    Modifier,
    Event,
    Error,
    Variable,
    Struct,
    Enum,
    EnumValue,
    Magic,
}

impl DeclKind {
    /// Kinds that may share a name within one scope when their parameters differ.
    pub fn overloadable(self) -> bool {
        matches!(self, DeclKind::Function | DeclKind::Event)
    }
}

#[derive(Debug, Clone)]
pub struct Declaration {
    pub id: i64,
    pub name: String,
    pub kind: DeclKind,
    /// Id of the node whose scope introduced this declaration.
    pub scope: i64,
    pub private: bool,
    pub implemented: bool,
    pub ty: SolType,
    /// Struct members or enum values, in order.
    pub members: Vec<i64>,
}

impl Declaration {
    pub fn new(id: i64, name: &str, kind: DeclKind, scope: i64) -> Self {
        Self {
            id,
            name: name.to_string(),
            kind,
            scope,
            private: false,
            implemented: true,
            ty: SolType::Unknown,
            members: Vec::new(),
        }
    }

    /// Parameter signature for overload comparisons.
    pub fn signature(&self) -> Option<String> {
        let params = match &self.ty {
            SolType::Function { params, .. } | SolType::Event(params) => params,
            _ => return None,
        };
        Some(
            params
                .iter()
                .map(SolType::signature)
                .collect::<Vec<_>>()
                .join(","),
        )
    }
}

/// One lexical frame: names visible at this level.
#[derive(Debug, Clone, Default)]
pub struct Frame {
    pub owner: i64,
    names: HashMap<String, Vec<i64>>,
}

impl Frame {
    pub fn new(owner: i64) -> Self {
        Self {
            owner,
            names: HashMap::new(),
        }
    }

    pub fn insert(&mut self, name: &str, id: i64) {
        self.names.entry(name.to_string()).or_default().push(id);
    }

    pub fn get(&self, name: &str) -> Option<&[i64]> {
        self.names.get(name).map(Vec::as_slice)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains_key(name)
    }
}

#[derive(Debug, Default)]
pub struct ScopeStack {
    frames: Vec<Frame>,
}

impl ScopeStack {
    pub fn push(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    pub fn pop(&mut self) {
        self.frames.pop();
    }

    /// Owner of the innermost frame.
    pub fn owner(&self) -> i64 {
        self.frames.last().map_or(0, |frame| frame.owner)
    }

    /// Declares `name` in the innermost frame. Returns false if it is already declared there.
    pub fn declare(&mut self, name: &str, id: i64) -> bool {
        let Some(frame) = self.frames.last_mut() else {
            return false;
        };
        if frame.contains(name) {
            return false;
        }
        frame.insert(name, id);
        true
    }

    /// Innermost declarations of `name`.
    pub fn lookup(&self, name: &str) -> Option<&[i64]> {
        self.frames.iter().rev().find_map(|frame| frame.get(name))
    }
}

/// Builtin globals and their (negative) declaration ids.
pub fn magic_declarations() -> Vec<Declaration> {
    let function = |params: Vec<SolType>, returns: Vec<SolType>| SolType::Function {
        params,
        returns,
        mutability: "pure".to_string(),
    };
    let bytes_memory = SolType::Bytes(DataLocation::Memory);
    let string_memory = SolType::String(DataLocation::Memory);

    let globals = [
        ("abi", -1, SolType::Magic(Magic::Abi)),
        ("addmod", -2, function(vec![uint256(), uint256(), uint256()], vec![uint256()])),
        ("assert", -3, function(vec![SolType::Bool], vec![])),
        ("block", -4, SolType::Magic(Magic::Block)),
        ("blockhash", -5, function(vec![uint256()], vec![SolType::FixedBytes(32)])),
        ("gasleft", -7, function(vec![], vec![uint256()])),
        ("keccak256", -8, function(vec![bytes_memory.clone()], vec![SolType::FixedBytes(32)])),
        ("msg", -15, SolType::Magic(Magic::Message)),
        ("mulmod", -16, function(vec![uint256(), uint256(), uint256()], vec![uint256()])),
        ("require", -18, function(vec![SolType::Bool, string_memory.clone()], vec![])),
        ("revert", -19, function(vec![string_memory], vec![])),
        ("sha256", -22, function(vec![bytes_memory], vec![SolType::FixedBytes(32)])),
        ("tx", -26, SolType::Magic(Magic::Transaction)),
        ("this", -28, SolType::Unknown),
    ];

    globals
        .into_iter()
        .map(|(name, id, ty)| {
            let mut declaration = Declaration::new(id, name, DeclKind::Magic, 0);
            declaration.ty = ty;
            declaration
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inner_frames_shadow_outer_ones() {
        let mut scopes = ScopeStack::default();
        scopes.push(Frame::new(1));
        assert!(scopes.declare("x", 10));
        scopes.push(Frame::new(2));
        assert!(scopes.declare("x", 20));
        assert_eq!(scopes.lookup("x"), Some(&[20][..]));
        assert!(!scopes.declare("x", 21));
        scopes.pop();
        assert_eq!(scopes.lookup("x"), Some(&[10][..]));
        assert_eq!(scopes.owner(), 1);
    }

    #[test]
    fn magic_ids_are_negative_and_distinct() {
        let magic = magic_declarations();
        assert!(magic.iter().all(|d| d.id < 0));
        let msg = magic.iter().find(|d| d.name == "msg").unwrap();
        assert_eq!(msg.id, -15);
    }
}
