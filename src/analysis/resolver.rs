//! Name resolution and type annotation over a validated source unit.
//!
//! The resolver never touches the tree it reads. Everything it learns is recorded in an
//! [`Annotations`] side table keyed by node id, applied by the caller once the walk is done.
//!
//! Passes, in order:
//! 1. register every declaration reachable from the source unit and contract bodies
//! 2. resolve base contracts and linearize inheritance
//! 3. compute declaration types (needs every name from 1 and every base from 2)
//! 4. reject same-scope redeclarations
//! 5. walk bodies with a lexical scope stack, resolving and typing expressions

use std::collections::{BTreeMap, HashMap, HashSet};

use serde_json::{json, Map, Value};

use super::scope::{magic_declarations, DeclKind, Declaration, Frame, ScopeStack};
use super::types::{self, Category, DataLocation, SolType};
use super::{Diagnostic, DiagnosticKind};
use crate::tree::{child_nodes, node_id, node_name, node_type};

/// Fields to merge into nodes, keyed by node id.
pub type Annotations = HashMap<u64, Map<String, Value>>;

const THIS_ID: i64 = -28;

struct ContractInfo<'t> {
    id: i64,
    name: String,
    kind: String,
    node: &'t Value,
    members: Vec<&'t Value>,
    linearized: Vec<i64>,
}

struct FunctionContext {
    return_list: Option<i64>,
    returns: Vec<SolType>,
}

pub struct Resolver<'t> {
    unit: &'t Value,
    unit_id: i64,
    decls: HashMap<i64, Declaration>,
    contracts: Vec<ContractInfo<'t>>,
    contract_index: HashMap<i64, usize>,
    top_level: Vec<i64>,
    magic: Frame,
    globals: Frame,
    contract_frames: HashMap<i64, Frame>,
    scopes: ScopeStack,
    current_contract: Option<i64>,
    function: Option<FunctionContext>,
    annotations: Annotations,
    diagnostics: Vec<Diagnostic>,
    reported: HashSet<(i64, String)>,
}

fn id_of(node: &Value) -> i64 {
    node_id(node).and_then(|id| i64::try_from(id).ok()).unwrap_or(0)
}

fn str_field<'a>(node: &'a Value, key: &str) -> &'a str {
    node.get(key).and_then(Value::as_str).unwrap_or("")
}

fn items(value: &Value) -> &[Value] {
    value.as_array().map_or(&[], Vec::as_slice)
}

fn single_or_tuple(mut types: Vec<SolType>) -> SolType {
    if types.len() == 1 {
        types.pop().unwrap_or(SolType::Unknown)
    } else {
        SolType::Tuple(types)
    }
}

/// C3 merge of base linearizations; `None` when no consistent order exists.
fn c3_merge(mut sequences: Vec<Vec<i64>>) -> Option<Vec<i64>> {
    let mut result = Vec::new();
    loop {
        sequences.retain(|sequence| !sequence.is_empty());
        if sequences.is_empty() {
            return Some(result);
        }
        let candidate = sequences
            .iter()
            .map(|sequence| sequence[0])
            .find(|head| sequences.iter().all(|s| !s[1..].contains(head)))?;
        result.push(candidate);
        for sequence in &mut sequences {
            if sequence[0] == candidate {
                sequence.remove(0);
            }
        }
    }
}

impl<'t> Resolver<'t> {
    pub fn new(unit: &'t Value) -> Self {
        Self {
            unit,
            unit_id: id_of(unit),
            decls: HashMap::new(),
            contracts: Vec::new(),
            contract_index: HashMap::new(),
            top_level: Vec::new(),
            magic: Frame::new(0),
            globals: Frame::new(id_of(unit)),
            contract_frames: HashMap::new(),
            scopes: ScopeStack::default(),
            current_contract: None,
            function: None,
            annotations: Annotations::new(),
            diagnostics: Vec::new(),
            reported: HashSet::new(),
        }
    }

    pub fn run(mut self) -> (Annotations, Vec<Diagnostic>) {
        self.register_unit();
        self.linearize_contracts();
        self.resolve_declaration_types();
        self.check_redeclarations();
        self.walk_unit();
        (self.annotations, self.diagnostics)
    }

    // ------------------------------------------------------------------------
    // Bookkeeping
    // ------------------------------------------------------------------------

    fn annotate(&mut self, node: &Value, key: &str, value: Value) {
        if let Some(id) = node_id(node) {
            self.annotations
                .entry(id)
                .or_default()
                .insert(key.to_string(), value);
        }
    }

    fn annotate_type(&mut self, node: &Value, ty: &SolType) {
        self.annotate(node, "typeDescriptions", ty.descriptions());
    }

    fn error(&mut self, at: i64, kind: DiagnosticKind, message: String) {
        if self.reported.insert((at, message.clone())) {
            self.diagnostics.push(Diagnostic { kind, message });
        }
    }

    fn reset_scopes(&mut self, contract: Option<i64>) {
        self.scopes = ScopeStack::default();
        self.scopes.push(self.magic.clone());
        self.scopes.push(self.globals.clone());
        if let Some(frame) = contract.and_then(|id| self.contract_frames.get(&id)) {
            self.scopes.push(frame.clone());
        }
        self.current_contract = contract;
    }

    fn contract(&self, id: i64) -> Option<&ContractInfo<'t>> {
        self.contract_index.get(&id).map(|&index| &self.contracts[index])
    }

    fn declared_type(&self, id: i64) -> SolType {
        self.decls.get(&id).map_or(SolType::Unknown, |decl| decl.ty.clone())
    }

    // ------------------------------------------------------------------------
    // 1. Registration
    // ------------------------------------------------------------------------

    fn register_unit(&mut self) {
        for declaration in magic_declarations() {
            self.magic.insert(&declaration.name, declaration.id);
            self.decls.insert(declaration.id, declaration);
        }

        let unit = self.unit;
        for node in child_nodes(unit).into_iter().flatten() {
            let registered = match node_type(node) {
                Some("ContractDefinition") => Some(self.register_contract(node)),
                _ => self.register_member(node, self.unit_id),
            };
            if let Some(id) = registered {
                self.top_level.push(id);
                if let Some(name) = node_name(node).filter(|name| !name.is_empty()) {
                    self.globals.insert(name, id);
                }
            }
        }
    }

    fn register_contract(&mut self, node: &'t Value) -> i64 {
        let id = id_of(node);
        let name = node_name(node).unwrap_or_default().to_string();
        let mut declaration = Declaration::new(id, &name, DeclKind::Contract, self.unit_id);
        declaration.ty = SolType::TypeType(Box::new(SolType::Contract {
            name: name.clone(),
            id,
        }));
        self.decls.insert(id, declaration);

        let mut members = Vec::new();
        for member in child_nodes(node).into_iter().flatten() {
            self.register_member(member, id);
            members.push(member);
        }

        self.contract_index.insert(id, self.contracts.len());
        self.contracts.push(ContractInfo {
            id,
            name,
            kind: str_field(node, "contractKind").to_string(),
            node,
            members,
            linearized: vec![id],
        });
        id
    }

    fn register_member(&mut self, node: &Value, scope: i64) -> Option<i64> {
        let kind = match node_type(node)? {
            "FunctionDefinition" => DeclKind::Function,
            "ModifierDefinition" => DeclKind::Modifier,
            "EventDefinition" => DeclKind::Event,
            "ErrorDefinition" => DeclKind::Error,
            "VariableDeclaration" => DeclKind::Variable,
            "StructDefinition" => DeclKind::Struct,
            "EnumDefinition" => DeclKind::Enum,
            _ => return None,
        };
        let id = id_of(node);
        let name = node_name(node).unwrap_or_default();
        let mut declaration = Declaration::new(id, name, kind, scope);
        declaration.private = str_field(node, "visibility") == "private";

        match kind {
            DeclKind::Function => {
                declaration.implemented = node
                    .get("implemented")
                    .and_then(Value::as_bool)
                    .unwrap_or_else(|| !node["body"].is_null());
            }
            DeclKind::Struct => {
                for member in items(&node["members"]) {
                    let member_id = id_of(member);
                    let member_name = node_name(member).unwrap_or_default();
                    let field = Declaration::new(member_id, member_name, DeclKind::Variable, id);
                    self.decls.insert(member_id, field);
                    declaration.members.push(member_id);
                }
            }
            DeclKind::Enum => {
                for value in items(&node["members"]) {
                    let value_id = id_of(value);
                    let value_name = node_name(value).unwrap_or_default();
                    let mut member =
                        Declaration::new(value_id, value_name, DeclKind::EnumValue, id);
                    member.ty = SolType::Enum {
                        name: name.to_string(),
                        id,
                    };
                    self.decls.insert(value_id, member);
                    declaration.members.push(value_id);
                }
            }
            _ => {}
        }

        self.decls.insert(id, declaration);
        Some(id)
    }

    // ------------------------------------------------------------------------
    // 2. Inheritance
    // ------------------------------------------------------------------------

    fn linearize_contracts(&mut self) {
        for index in 0..self.contracts.len() {
            let contract_id = self.contracts[index].id;
            let node = self.contracts[index].node;
            let mut bases = Vec::new();

            for specifier in items(&node["baseContracts"]) {
                let base_name = &specifier["baseName"];
                let name = str_field(base_name, "name");
                let base = self
                    .globals
                    .get(name)
                    .and_then(|ids| ids.first().copied())
                    .filter(|id| self.contract_index.contains_key(id));
                let Some(base_id) = base else {
                    self.error(
                        id_of(base_name),
                        DiagnosticKind::DeclarationError,
                        format!("Identifier not found or not unique: \"{name}\"."),
                    );
                    continue;
                };
                self.annotate(base_name, "referencedDeclaration", json!(base_id));
                if self.contract_index[&base_id] >= index {
                    self.error(
                        id_of(base_name),
                        DiagnosticKind::DeclarationError,
                        format!(
                            "Definition of base \"{name}\" has to precede definition of derived contract."
                        ),
                    );
                    continue;
                }
                bases.push(base_id);
            }

            let mut sequences: Vec<Vec<i64>> = bases
                .iter()
                .rev()
                .filter_map(|base| self.contract(*base).map(|info| info.linearized.clone()))
                .collect();
            sequences.push(bases.iter().rev().copied().collect());

            match c3_merge(sequences) {
                Some(tail) => self.contracts[index].linearized.extend(tail),
                None => self.error(
                    contract_id,
                    DiagnosticKind::TypeError,
                    "Linearization of inheritance graph impossible".to_string(),
                ),
            }
        }

        let frames: Vec<(i64, Frame)> = self
            .contracts
            .iter()
            .map(|info| (info.id, self.contract_frame(info)))
            .collect();
        self.contract_frames.extend(frames);
    }

    /// Members visible by bare name inside a contract: its own plus non-private inherited ones.
    fn contract_frame(&self, info: &ContractInfo<'t>) -> Frame {
        let mut frame = Frame::new(info.id);
        for &ancestor in &info.linearized {
            let Some(ancestor_info) = self.contract(ancestor) else {
                continue;
            };
            for member in &ancestor_info.members {
                let Some(decl) = self.decls.get(&id_of(member)) else {
                    continue;
                };
                if decl.name.is_empty() || (ancestor != info.id && decl.private) {
                    continue;
                }
                frame.insert(&decl.name, decl.id);
            }
        }
        frame
    }

    /// First member named `name` along the linearization of `contract_id`.
    fn contract_member(&self, contract_id: i64, name: &str, include_private: bool) -> Option<i64> {
        let info = self.contract(contract_id)?;
        info.linearized.iter().find_map(|&ancestor| {
            let ancestor_info = self.contract(ancestor)?;
            ancestor_info.members.iter().find_map(|member| {
                let decl = self.decls.get(&id_of(member))?;
                let visible = include_private
                    || !decl.private
                    || ancestor == self.current_contract.unwrap_or(0);
                (decl.name == name && visible).then_some(decl.id)
            })
        })
    }

    /// Resolves a possibly dotted path (`Lib.Struct`) in the current scopes.
    fn resolve_path(&self, path: &str) -> Option<i64> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.scopes.lookup(first)?.first().copied()?;
        for segment in segments {
            current = self.contract_member(current, segment, true)?;
        }
        Some(current)
    }

    // ------------------------------------------------------------------------
    // 3. Declaration types
    // ------------------------------------------------------------------------

    fn resolve_declaration_types(&mut self) {
        for index in 0..self.contracts.len() {
            let contract_id = self.contracts[index].id;
            let members = self.contracts[index].members.clone();
            self.reset_scopes(Some(contract_id));
            for member in members {
                self.declaration_type(member);
            }
        }

        self.reset_scopes(None);
        let unit = self.unit;
        for node in child_nodes(unit).into_iter().flatten() {
            if node_type(node) != Some("ContractDefinition") {
                self.declaration_type(node);
            }
        }
    }

    fn declaration_type(&mut self, node: &'t Value) {
        let id = id_of(node);
        let ty = match node_type(node) {
            Some("VariableDeclaration") => self.variable_type(node),
            Some("FunctionDefinition") => SolType::Function {
                params: self.parameter_types(&node["parameters"]),
                returns: self.parameter_types(&node["returnParameters"]),
                mutability: node
                    .get("stateMutability")
                    .and_then(Value::as_str)
                    .unwrap_or("nonpayable")
                    .to_string(),
            },
            Some("ModifierDefinition") => {
                SolType::Modifier(self.parameter_types(&node["parameters"]))
            }
            Some("EventDefinition") => SolType::Event(self.parameter_types(&node["parameters"])),
            Some("ErrorDefinition") => SolType::Error(self.parameter_types(&node["parameters"])),
            Some("StructDefinition") => {
                for member in items(&node["members"]) {
                    let ty = self.variable_type_at(member, DataLocation::Storage);
                    if let Some(field) = self.decls.get_mut(&id_of(member)) {
                        field.ty = ty;
                    }
                }
                SolType::TypeType(Box::new(SolType::Struct {
                    name: node_name(node).unwrap_or_default().to_string(),
                    id,
                    location: DataLocation::Storage,
                }))
            }
            Some("EnumDefinition") => SolType::TypeType(Box::new(SolType::Enum {
                name: node_name(node).unwrap_or_default().to_string(),
                id,
            })),
            _ => return,
        };
        if let Some(decl) = self.decls.get_mut(&id) {
            decl.ty = ty;
        }
    }

    fn parameter_types(&mut self, list: &'t Value) -> Vec<SolType> {
        items(&list["parameters"])
            .iter()
            .map(|parameter| self.variable_type(parameter))
            .collect()
    }

    fn variable_type(&mut self, node: &'t Value) -> SolType {
        let state_variable = node
            .get("stateVariable")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let location =
            DataLocation::of_declaration(str_field(node, "storageLocation"), state_variable);
        self.variable_type_at(node, location)
    }

    fn variable_type_at(&mut self, node: &'t Value, location: DataLocation) -> SolType {
        let ty = self.type_name(&node["typeName"], location);
        self.annotate_type(node, &ty);
        ty
    }

    fn type_name(&mut self, node: &'t Value, location: DataLocation) -> SolType {
        let ty = match node_type(node) {
            Some("ElementaryTypeName") => types::elementary(
                str_field(node, "name"),
                str_field(node, "stateMutability") == "payable",
                location,
            ),
            Some("UserDefinedTypeName") => {
                let path_node = node.get("pathNode").filter(|path| path.is_object());
                let name = path_node
                    .and_then(|path| path.get("name"))
                    .and_then(Value::as_str)
                    .or_else(|| node.get("name").and_then(Value::as_str))
                    .unwrap_or("");
                match self.resolve_path(name) {
                    Some(target) => {
                        if let Some(path) = path_node {
                            self.annotate(path, "referencedDeclaration", json!(target));
                        }
                        self.annotate(node, "referencedDeclaration", json!(target));
                        self.user_defined_type(target, location)
                    }
                    None => {
                        self.error(
                            id_of(node),
                            DiagnosticKind::DeclarationError,
                            format!("Identifier not found or not unique: \"{name}\"."),
                        );
                        SolType::Unknown
                    }
                }
            }
            Some("Mapping") => SolType::Mapping(
                Box::new(self.type_name(&node["keyType"], DataLocation::Memory)),
                Box::new(self.type_name(&node["valueType"], DataLocation::Storage)),
            ),
            Some("ArrayTypeName") => {
                let base = self.type_name(&node["baseType"], location).located(location);
                let length = node
                    .get("length")
                    .filter(|length| node_type(length) == Some("Literal"))
                    .and_then(|length| length.get("value"))
                    .and_then(Value::as_str)
                    .and_then(|value| value.replace('_', "").parse().ok());
                SolType::Array {
                    base: Box::new(base),
                    length,
                    location,
                }
            }
            _ => SolType::Unknown,
        };
        self.annotate_type(node, &ty);
        ty
    }

    fn user_defined_type(&self, target: i64, location: DataLocation) -> SolType {
        let Some(decl) = self.decls.get(&target) else {
            return SolType::Unknown;
        };
        match decl.kind {
            DeclKind::Contract => SolType::Contract {
                name: decl.name.clone(),
                id: decl.id,
            },
            DeclKind::Struct => SolType::Struct {
                name: decl.name.clone(),
                id: decl.id,
                location,
            },
            DeclKind::Enum => SolType::Enum {
                name: decl.name.clone(),
                id: decl.id,
            },
            _ => SolType::Unknown,
        }
    }

    // ------------------------------------------------------------------------
    // 4. Redeclarations
    // ------------------------------------------------------------------------

    fn check_redeclarations(&mut self) {
        let mut groups = vec![self.top_level.clone()];
        for info in &self.contracts {
            groups.push(info.members.iter().map(|member| id_of(member)).collect());
        }

        let mut findings = Vec::new();
        for group in groups {
            let mut seen: Vec<&Declaration> = Vec::new();
            for id in group {
                let Some(decl) = self.decls.get(&id) else {
                    continue;
                };
                if decl.name.is_empty() {
                    continue;
                }
                for earlier in seen.iter().filter(|earlier| earlier.name == decl.name) {
                    let message = if decl.kind.overloadable() && earlier.kind == decl.kind {
                        if decl.signature() != earlier.signature() {
                            continue;
                        }
                        let what = if decl.kind == DeclKind::Event { "Event" } else { "Function" };
                        format!(
                            "{what} with same name and parameter types defined twice: \"{}\".",
                            decl.name
                        )
                    } else {
                        format!("Identifier already declared: \"{}\".", decl.name)
                    };
                    findings.push((id, message));
                    break;
                }
                seen.push(decl);
            }
        }

        for (id, message) in findings {
            self.error(id, DiagnosticKind::DeclarationError, message);
        }
    }

    // ------------------------------------------------------------------------
    // 5. Bodies
    // ------------------------------------------------------------------------

    fn walk_unit(&mut self) {
        let unit = self.unit;
        self.reset_scopes(None);
        for node in child_nodes(unit).into_iter().flatten() {
            match node_type(node) {
                Some("ContractDefinition") => self.walk_contract(node),
                _ => self.walk_member(node, self.unit_id),
            }
        }

        let exported = {
            let mut symbols: BTreeMap<&str, Vec<i64>> = BTreeMap::new();
            for id in &self.top_level {
                if let Some(decl) = self.decls.get(id).filter(|decl| !decl.name.is_empty()) {
                    symbols.entry(decl.name.as_str()).or_default().push(decl.id);
                }
            }
            json!(symbols)
        };
        self.annotate(unit, "exportedSymbols", exported);
    }

    fn walk_contract(&mut self, node: &'t Value) {
        let id = id_of(node);
        self.reset_scopes(Some(id));

        let linearized = self.contract(id).map(|info| info.linearized.clone()).unwrap_or_default();
        let fully_implemented = self.fully_implemented(id);
        self.annotate(node, "scope", json!(self.unit_id));
        self.annotate(node, "linearizedBaseContracts", json!(linearized));
        self.annotate(node, "fullyImplemented", json!(fully_implemented));

        for member in child_nodes(node).into_iter().flatten() {
            self.walk_member(member, id);
        }
        self.reset_scopes(None);
    }

    /// Every function along the linearization has a body, most-derived definition winning.
    fn fully_implemented(&self, contract_id: i64) -> bool {
        let Some(info) = self.contract(contract_id) else {
            return false;
        };
        if info.kind == "interface" {
            return false;
        }
        let mut seen = HashSet::new();
        for &ancestor in &info.linearized {
            let Some(ancestor_info) = self.contract(ancestor) else {
                continue;
            };
            for member in &ancestor_info.members {
                let Some(decl) = self.decls.get(&id_of(member)) else {
                    continue;
                };
                if decl.kind != DeclKind::Function {
                    continue;
                }
                let key = (decl.name.clone(), decl.signature());
                if seen.insert(key) && !decl.implemented {
                    return false;
                }
            }
        }
        true
    }

    fn canonical_name(&self, scope: i64, name: &str) -> String {
        match self.contract(scope) {
            Some(info) => format!("{}.{name}", info.name),
            None => name.to_string(),
        }
    }

    fn walk_member(&mut self, node: &'t Value, scope: i64) {
        match node_type(node) {
            Some("FunctionDefinition") | Some("ModifierDefinition") => {
                self.walk_callable(node, scope)
            }
            Some("VariableDeclaration") => {
                self.annotate(node, "scope", json!(scope));
                let value = &node["value"];
                if !value.is_null() {
                    self.walk_expression(value);
                }
            }
            Some("EventDefinition") | Some("ErrorDefinition") => {
                self.annotate(node, "scope", json!(scope));
                let id = id_of(node);
                for parameter in items(&node["parameters"]["parameters"]) {
                    self.annotate(parameter, "scope", json!(id));
                }
            }
            Some("StructDefinition") => {
                let canonical = self.canonical_name(scope, node_name(node).unwrap_or_default());
                self.annotate(node, "scope", json!(scope));
                self.annotate(node, "canonicalName", json!(canonical));
                let id = id_of(node);
                for member in items(&node["members"]) {
                    self.annotate(member, "scope", json!(id));
                }
            }
            Some("EnumDefinition") => {
                let canonical = self.canonical_name(scope, node_name(node).unwrap_or_default());
                self.annotate(node, "scope", json!(scope));
                self.annotate(node, "canonicalName", json!(canonical));
            }
            Some("UsingForDirective") => {
                let library = &node["libraryName"];
                let name = str_field(library, "name");
                match self.resolve_path(name) {
                    Some(target) => self.annotate(library, "referencedDeclaration", json!(target)),
                    None => self.error(
                        id_of(library),
                        DiagnosticKind::DeclarationError,
                        format!("Identifier not found or not unique: \"{name}\"."),
                    ),
                }
                if !node["typeName"].is_null() {
                    self.type_name(&node["typeName"], DataLocation::Storage);
                }
            }
            _ => {}
        }
    }

    fn walk_callable(&mut self, node: &'t Value, scope: i64) {
        let id = id_of(node);
        self.annotate(node, "scope", json!(scope));
        self.scopes.push(Frame::new(id));

        self.declare_parameters(&node["parameters"], id);
        self.declare_parameters(&node["returnParameters"], id);
        for invocation in items(&node["modifiers"]) {
            self.walk_modifier_invocation(invocation);
        }

        let returns = match self.declared_type(id) {
            SolType::Function { returns, .. } => returns,
            _ => Vec::new(),
        };
        let return_list = node
            .get("returnParameters")
            .and_then(node_id)
            .and_then(|list| i64::try_from(list).ok());
        let previous = self.function.replace(FunctionContext { return_list, returns });

        let body = &node["body"];
        if !body.is_null() {
            self.walk_statement(body);
        }

        self.function = previous;
        self.scopes.pop();
    }

    fn declare_parameters(&mut self, list: &'t Value, scope: i64) {
        for parameter in items(&list["parameters"]) {
            self.declare_variable(parameter, scope);
        }
    }

    fn declare_variable(&mut self, node: &'t Value, scope: i64) -> i64 {
        let id = id_of(node);
        let ty = self.variable_type(node);
        let name = node_name(node).unwrap_or_default();
        let mut declaration = Declaration::new(id, name, DeclKind::Variable, scope);
        declaration.ty = ty;
        self.decls.insert(id, declaration);
        self.annotate(node, "scope", json!(scope));

        if !name.is_empty() && !self.scopes.declare(name, id) {
            self.error(
                id,
                DiagnosticKind::DeclarationError,
                format!("Identifier already declared: \"{name}\"."),
            );
        }
        id
    }

    fn walk_modifier_invocation(&mut self, invocation: &'t Value) {
        let modifier_name = &invocation["modifierName"];
        let name = str_field(modifier_name, "name");
        match self.resolve_path(name) {
            Some(target) => {
                self.annotate(modifier_name, "referencedDeclaration", json!(target));
                if self.decls.get(&target).map(|decl| decl.kind) == Some(DeclKind::Contract) {
                    self.annotate(invocation, "kind", json!("baseConstructorSpecifier"));
                }
            }
            None => self.error(
                id_of(invocation),
                DiagnosticKind::DeclarationError,
                format!("Identifier not found or not unique: \"{name}\"."),
            ),
        }
        for argument in items(&invocation["arguments"]) {
            self.walk_expression(argument);
        }
    }

    fn walk_statement(&mut self, node: &'t Value) {
        match node_type(node) {
            Some("Block") | Some("UncheckedBlock") => {
                self.scopes.push(Frame::new(id_of(node)));
                for statement in items(&node["statements"]) {
                    self.walk_statement(statement);
                }
                self.scopes.pop();
            }
            Some("VariableDeclarationStatement") => {
                let initial_value = &node["initialValue"];
                if !initial_value.is_null() {
                    self.walk_expression(initial_value);
                }
                let scope = self.scopes.owner();
                let assigned: Vec<i64> = items(&node["declarations"])
                    .iter()
                    .filter(|declaration| !declaration.is_null())
                    .map(|declaration| self.declare_variable(declaration, scope))
                    .collect();
                self.annotate(node, "assignments", json!(assigned));
            }
            Some("ExpressionStatement") => {
                self.walk_expression(&node["expression"]);
            }
            Some("Return") => self.walk_return(node),
            Some("IfStatement") => {
                self.walk_expression(&node["condition"]);
                self.walk_statement(&node["trueBody"]);
                if !node["falseBody"].is_null() {
                    self.walk_statement(&node["falseBody"]);
                }
            }
            Some("WhileStatement") | Some("DoWhileStatement") => {
                self.walk_expression(&node["condition"]);
                self.walk_statement(&node["body"]);
            }
            Some("ForStatement") => {
                self.scopes.push(Frame::new(id_of(node)));
                for key in ["initializationExpression", "loopExpression"] {
                    if !node[key].is_null() {
                        self.walk_statement(&node[key]);
                    }
                }
                if !node["condition"].is_null() {
                    self.walk_expression(&node["condition"]);
                }
                self.walk_statement(&node["body"]);
                self.scopes.pop();
            }
            Some("EmitStatement") => {
                self.walk_expression(&node["eventCall"]);
            }
            Some("RevertStatement") => {
                self.walk_expression(&node["errorCall"]);
            }
            _ => {}
        }
    }

    fn walk_return(&mut self, node: &'t Value) {
        let expression = &node["expression"];
        let ty = (!expression.is_null()).then(|| self.walk_expression(expression));

        let Some(context) = self.function.as_ref() else {
            return;
        };
        let expected = context.returns.clone();
        let return_list = context.return_list;
        if let Some(list) = return_list {
            self.annotate(node, "functionReturnParameters", json!(list));
        }

        let Some(ty) = ty.filter(|ty| !ty.is_unknown()) else {
            return;
        };
        let given = match &ty {
            SolType::Tuple(items) => items.len(),
            _ => 1,
        };
        if given != expected.len() {
            self.error(
                id_of(node),
                DiagnosticKind::TypeError,
                "Different number of arguments in return statement than in returns declaration."
                    .to_string(),
            );
            return;
        }
        if let [expected] = expected.as_slice() {
            let (actual_category, expected_category) = (ty.category(), expected.category());
            if actual_category != Category::Other
                && expected_category != Category::Other
                && actual_category != expected_category
            {
                self.error(
                    id_of(node),
                    DiagnosticKind::TypeError,
                    format!(
                        "Return argument type {} is not implicitly convertible to expected type (type of first return variable) {}.",
                        ty.render(true),
                        expected.render(true)
                    ),
                );
            }
        }
    }

    // ------------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------------

    fn walk_expression(&mut self, node: &'t Value) -> SolType {
        self.expression(node, None)
    }

    /// `arity` is the argument count when `node` is the callee of a call.
    fn expression(&mut self, node: &'t Value, arity: Option<usize>) -> SolType {
        let ty = match node_type(node) {
            Some("Identifier") => self.identifier(node, arity),
            Some("Literal") => literal_type(node),
            Some("MemberAccess") => self.member_access(node),
            Some("IndexAccess") => {
                let base = self.walk_expression(&node["baseExpression"]);
                if !node["indexExpression"].is_null() {
                    self.walk_expression(&node["indexExpression"]);
                }
                match base {
                    SolType::Mapping(_, value) => *value,
                    SolType::Array { base, .. } => *base,
                    SolType::Bytes(_) => SolType::FixedBytes(1),
                    SolType::TypeType(inner) => SolType::TypeType(Box::new(SolType::Array {
                        base: inner,
                        length: None,
                        location: DataLocation::Memory,
                    })),
                    _ => SolType::Unknown,
                }
            }
            Some("FunctionCall") => self.function_call(node),
            Some("FunctionCallOptions") => self.walk_expression(&node["expression"]),
            Some("NewExpression") => {
                let created = self.type_name(&node["typeName"], DataLocation::Memory);
                match created {
                    SolType::Contract { .. } => SolType::Function {
                        params: Vec::new(),
                        returns: vec![created],
                        mutability: "nonpayable".to_string(),
                    },
                    SolType::Array { .. } | SolType::Bytes(_) | SolType::String(_) => {
                        SolType::Function {
                            params: vec![types::uint256()],
                            returns: vec![created],
                            mutability: "pure".to_string(),
                        }
                    }
                    _ => SolType::Unknown,
                }
            }
            Some("ElementaryTypeNameExpression") => {
                let type_name = &node["typeName"];
                let inner = match type_name.as_str() {
                    Some(name) => types::elementary(name, false, DataLocation::Memory),
                    None => self.type_name(type_name, DataLocation::Memory),
                };
                SolType::TypeType(Box::new(inner))
            }
            Some("TupleExpression") => {
                let components: Vec<SolType> = items(&node["components"])
                    .iter()
                    .map(|component| {
                        if component.is_null() {
                            SolType::Unknown
                        } else {
                            self.walk_expression(component)
                        }
                    })
                    .collect();
                single_or_tuple(components)
            }
            Some("UnaryOperation") => {
                let operand = self.walk_expression(&node["subExpression"]);
                match str_field(node, "operator") {
                    "!" => SolType::Bool,
                    "delete" => SolType::Tuple(Vec::new()),
                    "-" => match operand {
                        SolType::RationalConst(value) => {
                            value.checked_neg().map_or(SolType::Unknown, SolType::RationalConst)
                        }
                        other => other,
                    },
                    _ => operand,
                }
            }
            Some("BinaryOperation") => {
                let left = self.walk_expression(&node["leftExpression"]);
                let right = self.walk_expression(&node["rightExpression"]);
                types::binary_result(str_field(node, "operator"), &left, &right)
            }
            Some("Assignment") => {
                let target = self.walk_expression(&node["leftHandSide"]);
                self.walk_expression(&node["rightHandSide"]);
                self.annotate(&node["leftHandSide"], "lValueRequested", json!(true));
                target
            }
            Some("Conditional") => {
                self.walk_expression(&node["condition"]);
                let when_true = self.walk_expression(&node["trueExpression"]);
                let when_false = self.walk_expression(&node["falseExpression"]);
                match when_true {
                    SolType::RationalConst(_) => when_false,
                    other => other,
                }
            }
            _ => SolType::Unknown,
        };
        self.annotate_type(node, &ty);
        ty
    }

    fn identifier(&mut self, node: &'t Value, arity: Option<usize>) -> SolType {
        let name = str_field(node, "name");
        let Some(candidates) = self.scopes.lookup(name).map(<[i64]>::to_vec) else {
            return match name {
                "payable" => SolType::TypeType(Box::new(SolType::Address { payable: true })),
                _ => {
                    self.error(
                        id_of(node),
                        DiagnosticKind::DeclarationError,
                        format!("Undeclared identifier \"{name}\"."),
                    );
                    SolType::Unknown
                }
            };
        };

        let mut signatures = HashSet::new();
        let candidates: Vec<i64> = candidates
            .into_iter()
            .filter(|id| {
                let signature = self.decls.get(id).and_then(Declaration::signature);
                signatures.insert(signature)
            })
            .collect();
        let Some(&first) = candidates.first() else {
            return SolType::Unknown;
        };
        let chosen = match arity {
            Some(count) if candidates.len() > 1 => candidates
                .iter()
                .copied()
                .find(|id| self.arity_of(*id) == Some(count))
                .unwrap_or(first),
            _ => first,
        };

        self.annotate(node, "referencedDeclaration", json!(chosen));
        let overloads = if candidates.len() > 1 { candidates } else { Vec::new() };
        self.annotate(node, "overloadedDeclarations", json!(overloads));

        if chosen == THIS_ID {
            return match self.current_contract.and_then(|id| self.contract(id)) {
                Some(info) => SolType::Contract {
                    name: info.name.clone(),
                    id: info.id,
                },
                None => SolType::Unknown,
            };
        }
        self.declared_type(chosen)
    }

    fn arity_of(&self, id: i64) -> Option<usize> {
        match &self.decls.get(&id)?.ty {
            SolType::Function { params, .. } | SolType::Event(params) | SolType::Error(params) => {
                Some(params.len())
            }
            _ => None,
        }
    }

    fn member_access(&mut self, node: &'t Value) -> SolType {
        let member = str_field(node, "memberName");
        let base = self.walk_expression(&node["expression"]);

        let (target, ty) = match &base {
            SolType::Magic(magic) => (None, types::magic_member(*magic, member)),
            SolType::Contract { id, .. } => match self.contract_member(*id, member, false) {
                Some(target) => (Some(target), self.external_view(target)),
                None => (None, types::builtin_member(&base, member)),
            },
            SolType::TypeType(inner) => match inner.as_ref() {
                SolType::Contract { id, .. } => match self.contract_member(*id, member, true) {
                    Some(target) => (Some(target), self.declared_type(target)),
                    None => (None, SolType::Unknown),
                },
                SolType::Enum { id, .. } => match self.enclosed_member(*id, member) {
                    Some(target) => (Some(target), self.declared_type(target)),
                    None => (None, SolType::Unknown),
                },
                _ => (None, SolType::Unknown),
            },
            SolType::Struct { id, location, .. } => match self.enclosed_member(*id, member) {
                Some(target) => (Some(target), self.declared_type(target).located(*location)),
                None => (None, SolType::Unknown),
            },
            _ => (None, types::builtin_member(&base, member)),
        };

        if let Some(target) = target {
            self.annotate(node, "referencedDeclaration", json!(target));
        }
        ty
    }

    /// Struct fields and enum values.
    fn enclosed_member(&self, owner: i64, name: &str) -> Option<i64> {
        self.decls
            .get(&owner)?
            .members
            .iter()
            .copied()
            .find(|id| self.decls.get(id).is_some_and(|decl| decl.name == name))
    }

    /// Type of a contract member seen from outside: public variables become getters.
    fn external_view(&self, target: i64) -> SolType {
        match self.decls.get(&target) {
            Some(decl) if decl.kind == DeclKind::Variable => SolType::Function {
                params: Vec::new(),
                returns: vec![decl.ty.clone()],
                mutability: "view".to_string(),
            },
            Some(decl) => decl.ty.clone(),
            None => SolType::Unknown,
        }
    }

    fn function_call(&mut self, node: &'t Value) -> SolType {
        let arguments = items(&node["arguments"]);
        let callee = self.expression(&node["expression"], Some(arguments.len()));
        for argument in arguments {
            self.walk_expression(argument);
        }

        let (kind, ty) = match callee {
            SolType::TypeType(inner) => match *inner {
                SolType::Struct { name, id, .. } => (
                    "structConstructorCall",
                    SolType::Struct {
                        name,
                        id,
                        location: DataLocation::Memory,
                    },
                ),
                other => ("typeConversion", other),
            },
            SolType::Function { returns, .. } => ("functionCall", single_or_tuple(returns)),
            SolType::Event(_) | SolType::Error(_) => ("functionCall", SolType::Tuple(Vec::new())),
            _ => ("functionCall", SolType::Unknown),
        };
        self.annotate(node, "kind", json!(kind));
        ty
    }
}

fn literal_type(node: &Value) -> SolType {
    match str_field(node, "kind") {
        "number" => types::number_literal(
            str_field(node, "value"),
            node.get("subdenomination").and_then(Value::as_str),
        ),
        "bool" => SolType::Bool,
        "string" | "unicodeString" => SolType::StringLiteral(str_field(node, "value").to_string()),
        "hexString" => SolType::StringLiteral(str_field(node, "hexValue").to_string()),
        _ => SolType::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn c3_orders_diamonds_most_derived_first() {
        // D is B, C; B is A; C is A
        let (a, b, c) = (1, 2, 3);
        let merged = c3_merge(vec![vec![c, a], vec![b, a], vec![c, b]]).unwrap();
        assert_eq!(merged, vec![c, b, a]);
    }

    #[test]
    fn c3_rejects_inconsistent_orders() {
        assert!(c3_merge(vec![vec![1, 2], vec![2, 1]]).is_none());
    }
}
