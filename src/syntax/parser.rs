//! Reference Solidity parser.
//!
//! Converts source text into the compiler's parse-only JSON tree. Ids are handed out in
//! post-order starting at 0, so every child carries a smaller id than its parent and the
//! `SourceUnit` root carries the largest one. Positions are recorded as `src` strings
//! (`start:length:0`). Nothing is resolved here: references, types and scopes are left
//! for the analyzer.

use std::iter::Peekable;

use once_cell::sync::Lazy;
use pest::{
    error::{Error, InputLocation},
    iterators::{Pair, Pairs},
    Parser,
};
use pest_derive::Parser;
use regex::Regex;
use serde_json::{json, Map, Value};

use crate::diagnostics::{to_error_source, SourceArc};
use crate::syntax::Span;
use crate::tree::SyntaxTree;
use crate::{Result, StitchError};

#[derive(Parser)]
#[grammar = "syntax/grammar.pest"]
struct SolidityParser;

static LICENSE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"SPDX-License-Identifier:\s*([^\s*]+)").expect("license pattern is valid")
});

// ============================================================================
// PUBLIC API
// ============================================================================

/// Parse `source` into a `SourceUnit` tree.
///
/// `max_depth` bounds bracket nesting and the builder's recursion; deeper input is
/// reported as a parse failure instead of exhausting the stack.
pub fn parse(source: &str, source_name: &str, max_depth: usize) -> Result<SyntaxTree> {
    let error_source = to_error_source(source_name, source);
    check_nesting(source, max_depth, &error_source)?;

    let mut pairs = SolidityParser::parse(Rule::source_unit, source)
        .map_err(|e| convert_parse_error(e, source_name, &error_source))?;
    let unit = pairs
        .next()
        .ok_or_else(|| crate::err_msg!(ParseFailed, "{}: empty parse result", source_name))?;

    let mut builder = AstBuilder {
        next_id: 0,
        depth: 0,
        max_depth,
        source: error_source,
    };
    builder.source_unit(unit, source, source_name)
}

// ============================================================================
// TREE BUILDER
// ============================================================================

struct AstBuilder {
    next_id: u64,
    depth: usize,
    max_depth: usize,
    source: SourceArc,
}

/// The parts of a `VariableDeclaration` that differ between parameters, locals,
/// struct members and state variables.
struct Declaration<'i> {
    name: &'i str,
    type_name: Value,
    storage_location: &'i str,
    visibility: &'i str,
    mutability: &'i str,
    state_variable: bool,
    value: Value,
    overrides: Value,
    indexed: Option<bool>,
}

impl<'i> Declaration<'i> {
    fn local(name: &'i str, type_name: Value) -> Self {
        Self {
            name,
            type_name,
            storage_location: "default",
            visibility: "internal",
            mutability: "mutable",
            state_variable: false,
            value: Value::Null,
            overrides: Value::Null,
            indexed: None,
        }
    }
}

impl AstBuilder {
    /// Finishes a node: children were built first, so this id is larger than theirs.
    fn node(&mut self, node_type: &str, span: Span, fields: Vec<(&str, Value)>) -> Value {
        let mut node = Map::new();
        node.insert("id".to_string(), json!(self.next_id));
        node.insert("nodeType".to_string(), json!(node_type));
        node.insert("src".to_string(), json!(span.to_src(0)));
        for (key, value) in fields {
            node.insert(key.to_string(), value);
        }
        self.next_id += 1;
        Value::Object(node)
    }

    fn nested<T>(&mut self, span: Span, build: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(crate::err_ctx!(
                ParseFailed,
                format!("maximum nesting depth of {} exceeded", self.max_depth),
                &self.source,
                span
            ));
        }
        let built = build(self);
        self.depth -= 1;
        built
    }

    fn missing(&self, what: &str, span: Span) -> StitchError {
        crate::err_ctx!(ParseFailed, format!("missing {what}"), &self.source, span)
    }

    fn unexpected(&self, rule: Rule, span: Span) -> StitchError {
        crate::err_ctx!(
            ParseFailed,
            format!("unexpected {}", describe_rule(&rule)),
            &self.source,
            span
        )
    }

    // ------------------------------------------------------------------------
    // Source level
    // ------------------------------------------------------------------------

    fn source_unit(&mut self, pair: Pair<Rule>, source: &str, source_name: &str) -> Result<Value> {
        let mut nodes = Vec::new();
        for part in pair.into_inner() {
            let node = match part.as_rule() {
                Rule::EOI => continue,
                Rule::pragma_directive => self.pragma_directive(part),
                Rule::import_directive => self.import_directive(part),
                Rule::contract_definition => self.contract_definition(part)?,
                Rule::function_definition => self.function_definition(part, true)?,
                _ => self.contract_member(part)?,
            };
            nodes.push(node);
        }

        let license = LICENSE_PATTERN
            .captures(source)
            .and_then(|captures| captures.get(1))
            .map(|m| m.as_str().to_string());

        Ok(self.node(
            "SourceUnit",
            Span::new(0, source.len()),
            vec![
                ("absolutePath", json!(source_name)),
                ("license", json!(license)),
                ("nodes", Value::Array(nodes)),
            ],
        ))
    }

    fn pragma_directive(&mut self, pair: Pair<Rule>) -> Value {
        let span = span_of(&pair);
        let literals: Vec<&str> = significant(pair).map(|token| token.as_str()).collect();
        self.node("PragmaDirective", span, vec![("literals", json!(literals))])
    }

    fn import_directive(&mut self, pair: Pair<Rule>) -> Value {
        let span = span_of(&pair);
        let mut file = String::new();
        let mut alias = "";
        for child in significant(pair) {
            match child.as_rule() {
                Rule::string_literal => file = unescape_string(child.as_str()),
                Rule::identifier => alias = child.as_str(),
                _ => {}
            }
        }
        self.node(
            "ImportDirective",
            span,
            vec![
                ("absolutePath", json!(file)),
                ("file", json!(file)),
                ("symbolAliases", json!([])),
                ("unitAlias", json!(alias)),
            ],
        )
    }

    // ------------------------------------------------------------------------
    // Contracts and members
    // ------------------------------------------------------------------------

    fn contract_definition(&mut self, pair: Pair<Rule>) -> Result<Value> {
        let span = span_of(&pair);
        let mut is_abstract = false;
        let mut kind = "contract";
        let mut name = "";
        let mut bases = Vec::new();
        let mut members = Vec::new();

        for child in pair.into_inner() {
            match child.as_rule() {
                Rule::kw_abstract => is_abstract = true,
                Rule::contract_kind => kind = child.as_str(),
                Rule::identifier => name = child.as_str(),
                Rule::inheritance_specifiers => {
                    for specifier in significant(child) {
                        bases.push(self.inheritance_specifier(specifier)?);
                    }
                }
                _ => members.push(self.contract_member(child)?),
            }
        }

        Ok(self.node(
            "ContractDefinition",
            span,
            vec![
                ("name", json!(name)),
                ("abstract", json!(is_abstract)),
                ("baseContracts", Value::Array(bases)),
                ("contractDependencies", json!([])),
                ("contractKind", json!(kind)),
                ("nodes", Value::Array(members)),
            ],
        ))
    }

    fn inheritance_specifier(&mut self, pair: Pair<Rule>) -> Result<Value> {
        let span = span_of(&pair);
        let mut base_name = None;
        let mut arguments = Value::Null;
        for child in pair.into_inner() {
            match child.as_rule() {
                Rule::identifier_path => base_name = Some(self.identifier_path(child)),
                Rule::call_arguments => arguments = Value::Array(self.call_arguments(child)?),
                _ => {}
            }
        }
        let base_name = base_name.ok_or_else(|| self.missing("base contract name", span))?;
        Ok(self.node(
            "InheritanceSpecifier",
            span,
            vec![("baseName", base_name), ("arguments", arguments)],
        ))
    }

    fn contract_member(&mut self, pair: Pair<Rule>) -> Result<Value> {
        match pair.as_rule() {
            Rule::using_directive => self.using_directive(pair),
            Rule::function_definition
            | Rule::constructor_definition
            | Rule::special_function_definition => self.function_definition(pair, false),
            Rule::modifier_definition => self.modifier_definition(pair),
            Rule::event_definition => self.event_definition(pair),
            Rule::error_definition => self.error_definition(pair),
            Rule::struct_definition => self.struct_definition(pair),
            Rule::enum_definition => self.enum_definition(pair),
            Rule::state_variable_declaration => self.state_variable_declaration(pair),
            rule => Err(self.unexpected(rule, span_of(&pair))),
        }
    }

    fn using_directive(&mut self, pair: Pair<Rule>) -> Result<Value> {
        let span = span_of(&pair);
        let mut library = None;
        let mut type_name = Value::Null;
        for child in significant(pair) {
            match child.as_rule() {
                Rule::identifier_path => library = Some(self.identifier_path(child)),
                Rule::type_name => type_name = self.type_name(child)?,
                _ => {}
            }
        }
        let library = library.ok_or_else(|| self.missing("library name", span))?;
        Ok(self.node(
            "UsingForDirective",
            span,
            vec![
                ("global", json!(false)),
                ("libraryName", library),
                ("typeName", type_name),
            ],
        ))
    }

    /// Functions, constructors, `fallback` and `receive`.
    fn function_definition(&mut self, pair: Pair<Rule>, free: bool) -> Result<Value> {
        let span = span_of(&pair);
        let mut kind = if pair.as_rule() == Rule::constructor_definition {
            "constructor"
        } else {
            "function"
        };
        let mut name = "";
        let mut parameters = None;
        let mut parameters_end = span.start;
        let mut return_parameters = None;
        let mut visibility = None;
        let mut mutability = "nonpayable";
        let mut is_virtual = false;
        let mut overrides = Value::Null;
        let mut modifiers = Vec::new();
        let mut body = Value::Null;

        for child in pair.into_inner() {
            match child.as_rule() {
                Rule::special_kind => kind = child.as_str(),
                Rule::identifier => name = child.as_str(),
                Rule::parameter_list => {
                    parameters_end = span_of(&child).end;
                    parameters = Some(self.parameter_list(child)?);
                }
                Rule::visibility => visibility = Some(child.as_str()),
                Rule::state_mutability => mutability = child.as_str(),
                Rule::kw_virtual => is_virtual = true,
                Rule::override_specifier => overrides = self.override_specifier(child),
                Rule::modifier_invocation => modifiers.push(self.modifier_invocation(child)?),
                Rule::returns_clause => {
                    let clause_span = span_of(&child);
                    let list = significant(child)
                        .next()
                        .ok_or_else(|| self.missing("return parameter list", clause_span))?;
                    return_parameters = Some(self.parameter_list(list)?);
                }
                Rule::block => body = self.block(child)?,
                _ => {}
            }
        }

        let parameters = parameters.ok_or_else(|| self.missing("parameter list", span))?;
        let return_parameters = match return_parameters {
            Some(list) => list,
            None => self.empty_parameter_list(parameters_end),
        };
        let visibility = visibility.unwrap_or(match kind {
            _ if free => "internal",
            "fallback" | "receive" => "external",
            _ => "public",
        });

        Ok(self.node(
            "FunctionDefinition",
            span,
            vec![
                ("name", json!(name)),
                ("kind", json!(kind)),
                ("implemented", json!(!body.is_null())),
                ("modifiers", Value::Array(modifiers)),
                ("overrides", overrides),
                ("parameters", parameters),
                ("returnParameters", return_parameters),
                ("stateMutability", json!(mutability)),
                ("virtual", json!(is_virtual)),
                ("visibility", json!(visibility)),
                ("body", body),
            ],
        ))
    }

    fn modifier_invocation(&mut self, pair: Pair<Rule>) -> Result<Value> {
        let span = span_of(&pair);
        let mut modifier_name = None;
        let mut arguments = Value::Null;
        for child in pair.into_inner() {
            match child.as_rule() {
                Rule::identifier_path => modifier_name = Some(self.identifier_path(child)),
                Rule::call_arguments => arguments = Value::Array(self.call_arguments(child)?),
                _ => {}
            }
        }
        let modifier_name = modifier_name.ok_or_else(|| self.missing("modifier name", span))?;
        Ok(self.node(
            "ModifierInvocation",
            span,
            vec![
                ("modifierName", modifier_name),
                ("arguments", arguments),
                ("kind", json!("modifierInvocation")),
            ],
        ))
    }

    fn override_specifier(&mut self, pair: Pair<Rule>) -> Value {
        let span = span_of(&pair);
        let overrides: Vec<Value> = significant(pair)
            .map(|path| self.identifier_path(path))
            .collect();
        self.node(
            "OverrideSpecifier",
            span,
            vec![("overrides", Value::Array(overrides))],
        )
    }

    fn modifier_definition(&mut self, pair: Pair<Rule>) -> Result<Value> {
        let span = span_of(&pair);
        let mut name = "";
        let mut name_end = span.start;
        let mut parameters = None;
        let mut is_virtual = false;
        let mut overrides = Value::Null;
        let mut body = Value::Null;

        for child in pair.into_inner() {
            match child.as_rule() {
                Rule::identifier => {
                    name = child.as_str();
                    name_end = span_of(&child).end;
                }
                Rule::parameter_list => parameters = Some(self.parameter_list(child)?),
                Rule::kw_virtual => is_virtual = true,
                Rule::override_specifier => overrides = self.override_specifier(child),
                Rule::block => body = self.block(child)?,
                _ => {}
            }
        }

        let parameters = match parameters {
            Some(list) => list,
            None => self.empty_parameter_list(name_end),
        };
        Ok(self.node(
            "ModifierDefinition",
            span,
            vec![
                ("name", json!(name)),
                ("parameters", parameters),
                ("virtual", json!(is_virtual)),
                ("overrides", overrides),
                ("visibility", json!("internal")),
                ("body", body),
            ],
        ))
    }

    fn event_definition(&mut self, pair: Pair<Rule>) -> Result<Value> {
        let span = span_of(&pair);
        let mut name = "";
        let mut parameters = None;
        let mut anonymous = false;
        for child in pair.into_inner() {
            match child.as_rule() {
                Rule::identifier => name = child.as_str(),
                Rule::event_parameter_list => parameters = Some(self.parameter_list(child)?),
                Rule::kw_anonymous => anonymous = true,
                _ => {}
            }
        }
        let parameters = parameters.ok_or_else(|| self.missing("event parameters", span))?;
        Ok(self.node(
            "EventDefinition",
            span,
            vec![
                ("name", json!(name)),
                ("anonymous", json!(anonymous)),
                ("parameters", parameters),
            ],
        ))
    }

    fn error_definition(&mut self, pair: Pair<Rule>) -> Result<Value> {
        let span = span_of(&pair);
        let mut name = "";
        let mut parameters = None;
        for child in significant(pair) {
            match child.as_rule() {
                Rule::identifier => name = child.as_str(),
                Rule::parameter_list => parameters = Some(self.parameter_list(child)?),
                _ => {}
            }
        }
        let parameters = parameters.ok_or_else(|| self.missing("error parameters", span))?;
        Ok(self.node(
            "ErrorDefinition",
            span,
            vec![("name", json!(name)), ("parameters", parameters)],
        ))
    }

    fn struct_definition(&mut self, pair: Pair<Rule>) -> Result<Value> {
        let span = span_of(&pair);
        let mut name = "";
        let mut members = Vec::new();
        for child in significant(pair) {
            match child.as_rule() {
                Rule::identifier => name = child.as_str(),
                Rule::struct_member => {
                    let member_span = span_of(&child);
                    let (type_name, member_name) = self.typed_name(child, member_span)?;
                    let declaration = Declaration::local(member_name, type_name);
                    members.push(self.variable_declaration_node(member_span, declaration));
                }
                _ => {}
            }
        }
        Ok(self.node(
            "StructDefinition",
            span,
            vec![
                ("name", json!(name)),
                ("members", Value::Array(members)),
                ("visibility", json!("public")),
            ],
        ))
    }

    fn enum_definition(&mut self, pair: Pair<Rule>) -> Result<Value> {
        let span = span_of(&pair);
        let mut name = "";
        let mut members = Vec::new();
        for child in significant(pair) {
            match child.as_rule() {
                Rule::identifier => name = child.as_str(),
                Rule::enum_value => {
                    let value_span = span_of(&child);
                    let value_name = child.as_str().trim();
                    let fields = vec![("name", json!(value_name))];
                    members.push(self.node("EnumValue", value_span, fields));
                }
                _ => {}
            }
        }
        Ok(self.node(
            "EnumDefinition",
            span,
            vec![("name", json!(name)), ("members", Value::Array(members))],
        ))
    }

    fn state_variable_declaration(&mut self, pair: Pair<Rule>) -> Result<Value> {
        let span = span_of(&pair);
        let mut declaration = Declaration::local("", Value::Null);
        declaration.state_variable = true;

        for child in pair.into_inner() {
            match child.as_rule() {
                Rule::type_name => declaration.type_name = self.type_name(child)?,
                Rule::visibility => declaration.visibility = child.as_str(),
                Rule::kw_constant => declaration.mutability = "constant",
                Rule::kw_immutable => declaration.mutability = "immutable",
                Rule::override_specifier => declaration.overrides = self.override_specifier(child),
                Rule::identifier => declaration.name = child.as_str(),
                Rule::expression => declaration.value = self.expression(child)?,
                _ => {}
            }
        }
        if declaration.type_name.is_null() {
            return Err(self.missing("variable type", span));
        }
        Ok(self.variable_declaration_node(span, declaration))
    }

    // ------------------------------------------------------------------------
    // Parameters and declarations
    // ------------------------------------------------------------------------

    /// Builds a `ParameterList` from either a `parameter_list` or an `event_parameter_list`.
    fn parameter_list(&mut self, pair: Pair<Rule>) -> Result<Value> {
        let span = span_of(&pair);
        let mut parameters = Vec::new();
        for parameter in pair.into_inner() {
            parameters.push(self.parameter(parameter)?);
        }
        Ok(self.node(
            "ParameterList",
            span,
            vec![("parameters", Value::Array(parameters))],
        ))
    }

    fn empty_parameter_list(&mut self, at: usize) -> Value {
        self.node("ParameterList", Span::new(at, at), vec![("parameters", json!([]))])
    }

    fn parameter(&mut self, pair: Pair<Rule>) -> Result<Value> {
        let span = span_of(&pair);
        let is_event = pair.as_rule() == Rule::event_parameter;
        let mut declaration = Declaration::local("", Value::Null);
        if is_event {
            declaration.indexed = Some(false);
        }

        for child in pair.into_inner() {
            match child.as_rule() {
                Rule::type_name => declaration.type_name = self.type_name(child)?,
                Rule::data_location => declaration.storage_location = child.as_str(),
                Rule::kw_indexed => declaration.indexed = Some(true),
                Rule::identifier => declaration.name = child.as_str(),
                _ => {}
            }
        }
        if declaration.type_name.is_null() {
            return Err(self.missing("parameter type", span));
        }
        Ok(self.variable_declaration_node(span, declaration))
    }

    /// `type_name identifier` pairs: struct members and local declarations.
    fn typed_name<'i>(&mut self, pair: Pair<'i, Rule>, span: Span) -> Result<(Value, &'i str)> {
        let mut type_name = None;
        let mut name = "";
        for child in pair.into_inner() {
            match child.as_rule() {
                Rule::type_name => type_name = Some(self.type_name(child)?),
                Rule::identifier => name = child.as_str(),
                _ => {}
            }
        }
        let type_name = type_name.ok_or_else(|| self.missing("type", span))?;
        Ok((type_name, name))
    }

    fn variable_declaration_node(&mut self, span: Span, declaration: Declaration<'_>) -> Value {
        let mut fields = vec![
            ("name", json!(declaration.name)),
            ("typeName", declaration.type_name),
            ("constant", json!(declaration.mutability == "constant")),
            ("mutability", json!(declaration.mutability)),
            ("stateVariable", json!(declaration.state_variable)),
            ("storageLocation", json!(declaration.storage_location)),
            ("visibility", json!(declaration.visibility)),
            ("value", declaration.value),
        ];
        if declaration.state_variable {
            fields.push(("overrides", declaration.overrides));
        }
        if let Some(indexed) = declaration.indexed {
            fields.push(("indexed", json!(indexed)));
        }
        self.node("VariableDeclaration", span, fields)
    }

    // ------------------------------------------------------------------------
    // Types
    // ------------------------------------------------------------------------

    fn type_name(&mut self, pair: Pair<Rule>) -> Result<Value> {
        let span = span_of(&pair);
        self.nested(span, |this| {
            let mut inner = pair.into_inner();
            let base = inner.next().ok_or_else(|| this.missing("type", span))?;
            let mut type_name = match base.as_rule() {
                Rule::elementary_type => this.elementary_type_name(base),
                Rule::identifier_path => {
                    let base_span = span_of(&base);
                    let path = this.identifier_path(base);
                    this.node("UserDefinedTypeName", base_span, vec![("pathNode", path)])
                }
                Rule::mapping_type => this.mapping_type(base)?,
                rule => return Err(this.unexpected(rule, span_of(&base))),
            };

            for suffix in inner {
                let suffix_span = span_of(&suffix);
                let length = match suffix.into_inner().next() {
                    Some(expression) => this.expression(expression)?,
                    None => Value::Null,
                };
                type_name = this.node(
                    "ArrayTypeName",
                    Span::new(span.start, suffix_span.end),
                    vec![("baseType", type_name), ("length", length)],
                );
            }
            Ok(type_name)
        })
    }

    fn elementary_type_name(&mut self, pair: Pair<Rule>) -> Value {
        let span = span_of(&pair);
        let text = pair.as_str();
        if text.starts_with("address") {
            let mutability = if text.ends_with("payable") {
                "payable"
            } else {
                "nonpayable"
            };
            return self.node(
                "ElementaryTypeName",
                span,
                vec![("name", json!("address")), ("stateMutability", json!(mutability))],
            );
        }
        self.node("ElementaryTypeName", span, vec![("name", json!(text))])
    }

    fn mapping_type(&mut self, pair: Pair<Rule>) -> Result<Value> {
        let span = span_of(&pair);
        let mut types = Vec::new();
        let mut names = ["", ""];
        for child in significant(pair) {
            match child.as_rule() {
                Rule::type_name => types.push(self.type_name(child)?),
                Rule::identifier if !types.is_empty() && types.len() <= 2 => {
                    names[types.len() - 1] = child.as_str();
                }
                _ => {}
            }
        }
        let mut types = types.into_iter();
        let (Some(key_type), Some(value_type)) = (types.next(), types.next()) else {
            return Err(self.missing("mapping key or value type", span));
        };
        Ok(self.node(
            "Mapping",
            span,
            vec![
                ("keyType", key_type),
                ("keyName", json!(names[0])),
                ("valueType", value_type),
                ("valueName", json!(names[1])),
            ],
        ))
    }

    fn identifier_path(&mut self, pair: Pair<Rule>) -> Value {
        let span = span_of(&pair);
        let name = pair
            .into_inner()
            .map(|segment| segment.as_str())
            .collect::<Vec<_>>()
            .join(".");
        self.node("IdentifierPath", span, vec![("name", json!(name))])
    }

    // ------------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------------

    fn block(&mut self, pair: Pair<Rule>) -> Result<Value> {
        let span = span_of(&pair);
        let statements = self.statements(pair.into_inner())?;
        Ok(self.node("Block", span, vec![("statements", Value::Array(statements))]))
    }

    fn statements(&mut self, pairs: Pairs<Rule>) -> Result<Vec<Value>> {
        pairs.map(|statement| self.statement(statement)).collect()
    }

    fn statement(&mut self, pair: Pair<Rule>) -> Result<Value> {
        let span = span_of(&pair);
        self.nested(span, |this| match pair.as_rule() {
            Rule::block => this.block(pair),
            Rule::unchecked_block => {
                let block = significant(pair)
                    .next()
                    .ok_or_else(|| this.missing("block", span))?;
                let statements = this.statements(block.into_inner())?;
                Ok(this.node(
                    "UncheckedBlock",
                    span,
                    vec![("statements", Value::Array(statements))],
                ))
            }
            Rule::if_statement => {
                let mut inner = significant(pair);
                let condition = inner.next().ok_or_else(|| this.missing("condition", span))?;
                let condition = this.expression(condition)?;
                let true_body = inner.next().ok_or_else(|| this.missing("if body", span))?;
                let true_body = this.statement(true_body)?;
                let false_body = match inner.next() {
                    Some(statement) => this.statement(statement)?,
                    None => Value::Null,
                };
                Ok(this.node(
                    "IfStatement",
                    span,
                    vec![
                        ("condition", condition),
                        ("trueBody", true_body),
                        ("falseBody", false_body),
                    ],
                ))
            }
            Rule::while_statement => {
                let mut inner = significant(pair);
                let condition = inner.next().ok_or_else(|| this.missing("condition", span))?;
                let condition = this.expression(condition)?;
                let body = inner.next().ok_or_else(|| this.missing("loop body", span))?;
                let body = this.statement(body)?;
                Ok(this.node(
                    "WhileStatement",
                    span,
                    vec![("condition", condition), ("body", body)],
                ))
            }
            Rule::for_statement => this.for_statement(pair, span),
            Rule::return_statement => {
                let expression = match significant(pair).next() {
                    Some(expression) => this.expression(expression)?,
                    None => Value::Null,
                };
                Ok(this.node("Return", span, vec![("expression", expression)]))
            }
            Rule::emit_statement => {
                let call = significant(pair)
                    .next()
                    .ok_or_else(|| this.missing("event call", span))?;
                let call = this.expression(call)?;
                if call.get("nodeType").and_then(Value::as_str) != Some("FunctionCall") {
                    return Err(crate::err_ctx!(
                        ParseFailed,
                        "expected an event invocation after 'emit'",
                        &this.source,
                        span
                    ));
                }
                Ok(this.node("EmitStatement", span, vec![("eventCall", call)]))
            }
            Rule::revert_statement => this.revert_statement(pair, span),
            Rule::break_statement => Ok(this.node("Break", span, vec![])),
            Rule::continue_statement => Ok(this.node("Continue", span, vec![])),
            Rule::placeholder_statement => Ok(this.node("PlaceholderStatement", span, vec![])),
            Rule::variable_declaration_statement => this.variable_declaration_statement(pair),
            Rule::expression_statement => {
                let expression = pair
                    .into_inner()
                    .next()
                    .ok_or_else(|| this.missing("expression", span))?;
                let expression = this.expression(expression)?;
                Ok(this.node("ExpressionStatement", span, vec![("expression", expression)]))
            }
            rule => Err(this.unexpected(rule, span)),
        })
    }

    fn for_statement(&mut self, pair: Pair<Rule>, span: Span) -> Result<Value> {
        let mut init = Value::Null;
        let mut condition = Value::Null;
        let mut update = Value::Null;
        let mut body = Value::Null;

        for child in significant(pair) {
            match child.as_rule() {
                Rule::for_init => {
                    if let Some(statement) = child.into_inner().next() {
                        init = self.statement(statement)?;
                    }
                }
                Rule::for_condition => {
                    if let Some(expression) = child.into_inner().next() {
                        condition = self.expression(expression)?;
                    }
                }
                Rule::for_update => {
                    if let Some(expression) = child.into_inner().next() {
                        let update_span = span_of(&expression);
                        let expression = self.expression(expression)?;
                        update = self.node(
                            "ExpressionStatement",
                            update_span,
                            vec![("expression", expression)],
                        );
                    }
                }
                _ => body = self.statement(child)?,
            }
        }
        if body.is_null() {
            return Err(self.missing("loop body", span));
        }

        Ok(self.node(
            "ForStatement",
            span,
            vec![
                ("initializationExpression", init),
                ("condition", condition),
                ("loopExpression", update),
                ("body", body),
            ],
        ))
    }

    /// `revert Error(args);` becomes a `RevertStatement` around an ordinary call.
    fn revert_statement(&mut self, pair: Pair<Rule>, span: Span) -> Result<Value> {
        let mut callee: Option<(Value, Span)> = None;
        let mut arguments = None;
        let mut arguments_end = span.end;

        for child in significant(pair) {
            match child.as_rule() {
                Rule::identifier_path => {
                    let path_start = span_of(&child).start;
                    for segment in child.into_inner() {
                        let segment_span = span_of(&segment);
                        let name = segment.as_str();
                        callee = Some(match callee.take() {
                            None => (self.identifier(name, segment_span), segment_span),
                            Some((expression, _)) => {
                                let member_span = Span::new(path_start, segment_span.end);
                                let access = self.node(
                                    "MemberAccess",
                                    member_span,
                                    vec![("expression", expression), ("memberName", json!(name))],
                                );
                                (access, member_span)
                            }
                        });
                    }
                }
                Rule::call_arguments => {
                    arguments_end = span_of(&child).end;
                    arguments = Some(self.call_arguments(child)?);
                }
                _ => {}
            }
        }

        let (callee, callee_span) = callee.ok_or_else(|| self.missing("error name", span))?;
        let arguments = arguments.ok_or_else(|| self.missing("error arguments", span))?;
        let call_span = Span::new(callee_span.start, arguments_end);
        let call = self.function_call(callee, arguments, call_span);
        Ok(self.node("RevertStatement", span, vec![("errorCall", call)]))
    }

    fn variable_declaration_statement(&mut self, pair: Pair<Rule>) -> Result<Value> {
        let span = span_of(&pair);
        let mut declarations = Vec::new();
        let mut initial_value = Value::Null;

        for child in pair.into_inner() {
            match child.as_rule() {
                Rule::variable_declaration => {
                    let declaration_span = span_of(&child);
                    let mut declaration = Declaration::local("", Value::Null);
                    for part in child.into_inner() {
                        match part.as_rule() {
                            Rule::type_name => declaration.type_name = self.type_name(part)?,
                            Rule::data_location => declaration.storage_location = part.as_str(),
                            Rule::identifier => declaration.name = part.as_str(),
                            _ => {}
                        }
                    }
                    declarations
                        .push(self.variable_declaration_node(declaration_span, declaration));
                }
                Rule::expression => initial_value = self.expression(child)?,
                _ => {}
            }
        }

        Ok(self.node(
            "VariableDeclarationStatement",
            span,
            vec![
                ("declarations", Value::Array(declarations)),
                ("initialValue", initial_value),
            ],
        ))
    }

    // ------------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------------

    fn expression(&mut self, pair: Pair<Rule>) -> Result<Value> {
        let span = span_of(&pair);
        self.nested(span, |this| {
            let mut items = pair.into_inner().peekable();
            let first = items.next().ok_or_else(|| this.missing("operand", span))?;
            let lhs = this.operand(first)?;
            let (expression, _) = this.climb(lhs, &mut items, 1)?;
            Ok(expression)
        })
    }

    /// Precedence climbing over the flat `operand (op operand)*` sequence.
    fn climb(
        &mut self,
        mut lhs: (Value, Span),
        items: &mut Peekable<Pairs<Rule>>,
        min_precedence: u8,
    ) -> Result<(Value, Span)> {
        while let Some(op) = items.next_if(|item| binding(item.as_rule()).0 >= min_precedence) {
            let (precedence, _) = binding(op.as_rule());
            let operand = items
                .next()
                .ok_or_else(|| self.missing("right operand", span_of(&op)))?;
            let mut rhs = self.operand(operand)?;

            while let Some(next) = items.peek() {
                let (next_precedence, right_assoc) = binding(next.as_rule());
                if next_precedence > precedence || (right_assoc && next_precedence == precedence) {
                    rhs = self.climb(rhs, items, next_precedence)?;
                } else {
                    break;
                }
            }
            lhs = self.combine(op, lhs, rhs)?;
        }
        Ok(lhs)
    }

    fn combine(
        &mut self,
        op: Pair<Rule>,
        lhs: (Value, Span),
        rhs: (Value, Span),
    ) -> Result<(Value, Span)> {
        let span = lhs.1.join(rhs.1);
        let operator = op.as_str();
        let node = match op.as_rule() {
            Rule::assign_op => self.node(
                "Assignment",
                span,
                vec![
                    ("operator", json!(operator)),
                    ("leftHandSide", lhs.0),
                    ("rightHandSide", rhs.0),
                ],
            ),
            Rule::ternary_op => {
                let op_span = span_of(&op);
                let middle = op
                    .into_inner()
                    .next()
                    .ok_or_else(|| self.missing("conditional branch", op_span))?;
                let true_expression = self.expression(middle)?;
                self.node(
                    "Conditional",
                    span,
                    vec![
                        ("condition", lhs.0),
                        ("trueExpression", true_expression),
                        ("falseExpression", rhs.0),
                    ],
                )
            }
            _ => self.node(
                "BinaryOperation",
                span,
                vec![
                    ("operator", json!(operator)),
                    ("leftExpression", lhs.0),
                    ("rightExpression", rhs.0),
                ],
            ),
        };
        Ok((node, span))
    }

    /// Postfix operators bind tighter than prefix ones: `-a.b()` negates the call.
    fn operand(&mut self, pair: Pair<Rule>) -> Result<(Value, Span)> {
        let span = span_of(&pair);
        let mut prefixes = Vec::new();
        let mut current: Option<(Value, Span)> = None;

        for item in pair.into_inner() {
            match item.as_rule() {
                Rule::prefix_increment
                | Rule::prefix_decrement
                | Rule::not_op
                | Rule::bitnot_op
                | Rule::negate_op
                | Rule::kw_delete
                    if current.is_none() =>
                {
                    prefixes.push(item)
                }
                Rule::call_arguments
                | Rule::member_access
                | Rule::index_access
                | Rule::postfix_increment
                | Rule::postfix_decrement => {
                    let target = current
                        .take()
                        .ok_or_else(|| self.missing("expression", span))?;
                    current = Some(self.postfix(target, item)?);
                }
                _ => current = Some(self.primary(item)?),
            }
        }

        let mut current = current.ok_or_else(|| self.missing("expression", span))?;
        for prefix in prefixes.into_iter().rev() {
            let prefix_span = span_of(&prefix).join(current.1);
            let operator = prefix.as_str();
            let unary = self.node(
                "UnaryOperation",
                prefix_span,
                vec![
                    ("operator", json!(operator)),
                    ("prefix", json!(true)),
                    ("subExpression", current.0),
                ],
            );
            current = (unary, prefix_span);
        }
        Ok(current)
    }

    fn postfix(&mut self, target: (Value, Span), item: Pair<Rule>) -> Result<(Value, Span)> {
        let span = target.1.join(span_of(&item));
        let node = match item.as_rule() {
            Rule::call_arguments => {
                let arguments = self.call_arguments(item)?;
                self.function_call(target.0, arguments, span)
            }
            Rule::member_access => {
                let member = item.into_inner().next().map_or("", |name| name.as_str());
                self.node(
                    "MemberAccess",
                    span,
                    vec![("expression", target.0), ("memberName", json!(member))],
                )
            }
            Rule::index_access => {
                let index = match item.into_inner().next() {
                    Some(expression) => self.expression(expression)?,
                    None => Value::Null,
                };
                self.node(
                    "IndexAccess",
                    span,
                    vec![("baseExpression", target.0), ("indexExpression", index)],
                )
            }
            _ => {
                let operator = item.as_str();
                self.node(
                    "UnaryOperation",
                    span,
                    vec![
                        ("operator", json!(operator)),
                        ("prefix", json!(false)),
                        ("subExpression", target.0),
                    ],
                )
            }
        };
        Ok((node, span))
    }

    fn call_arguments(&mut self, pair: Pair<Rule>) -> Result<Vec<Value>> {
        pair.into_inner()
            .map(|argument| self.expression(argument))
            .collect()
    }

    fn function_call(&mut self, callee: Value, arguments: Vec<Value>, span: Span) -> Value {
        self.node(
            "FunctionCall",
            span,
            vec![
                ("expression", callee),
                ("arguments", Value::Array(arguments)),
                ("names", json!([])),
                ("kind", json!("functionCall")),
                ("tryCall", json!(false)),
            ],
        )
    }

    fn primary(&mut self, pair: Pair<Rule>) -> Result<(Value, Span)> {
        let span = span_of(&pair);
        let node = match pair.as_rule() {
            Rule::identifier => self.identifier(pair.as_str(), span),
            Rule::tuple_expression => {
                let components = pair
                    .into_inner()
                    .map(|component| self.expression(component))
                    .collect::<Result<Vec<_>>>()?;
                self.node(
                    "TupleExpression",
                    span,
                    vec![
                        ("components", Value::Array(components)),
                        ("isInlineArray", json!(false)),
                    ],
                )
            }
            Rule::new_expression => {
                let type_name = significant(pair)
                    .next()
                    .ok_or_else(|| self.missing("type after 'new'", span))?;
                let type_name = self.type_name(type_name)?;
                self.node("NewExpression", span, vec![("typeName", type_name)])
            }
            Rule::elementary_type_expression => {
                let elementary = pair
                    .into_inner()
                    .next()
                    .ok_or_else(|| self.missing("type", span))?;
                let type_name = self.elementary_type_name(elementary);
                self.node(
                    "ElementaryTypeNameExpression",
                    span,
                    vec![("typeName", type_name)],
                )
            }
            Rule::boolean_literal => {
                let text = pair.as_str();
                self.literal(span, "bool", json!(text), hex_encode(text.as_bytes()), None)
            }
            Rule::number_literal => {
                let mut value = "";
                let mut unit = None;
                for part in pair.into_inner() {
                    match part.as_rule() {
                        Rule::number_value => value = part.as_str(),
                        Rule::number_unit => unit = Some(part.as_str()),
                        _ => {}
                    }
                }
                self.literal(span, "number", json!(value), hex_encode(value.as_bytes()), unit)
            }
            Rule::string_literal => {
                let value = unescape_string(pair.as_str());
                let hex = hex_encode(value.as_bytes());
                self.literal(span, "string", json!(value), hex, None)
            }
            Rule::hex_string_literal => {
                let digits: String = pair
                    .as_str()
                    .trim_start_matches("hex")
                    .chars()
                    .filter(char::is_ascii_hexdigit)
                    .collect();
                self.literal(span, "hexString", Value::Null, digits, None)
            }
            rule => return Err(self.unexpected(rule, span)),
        };
        Ok((node, span))
    }

    fn identifier(&mut self, name: &str, span: Span) -> Value {
        self.node(
            "Identifier",
            span,
            vec![("name", json!(name)), ("overloadedDeclarations", json!([]))],
        )
    }

    fn literal(
        &mut self,
        span: Span,
        kind: &str,
        value: Value,
        hex_value: String,
        subdenomination: Option<&str>,
    ) -> Value {
        self.node(
            "Literal",
            span,
            vec![
                ("hexValue", json!(hex_value)),
                ("kind", json!(kind)),
                ("subdenomination", json!(subdenomination)),
                ("value", value),
            ],
        )
    }
}

// ============================================================================
// UTILITIES
// ============================================================================

/// Binding power and right-associativity of an infix operator. Non-operators bind at 0.
fn binding(rule: Rule) -> (u8, bool) {
    match rule {
        Rule::assign_op => (1, true),
        Rule::ternary_op => (2, true),
        Rule::or_op => (3, false),
        Rule::and_op => (4, false),
        Rule::equality_op => (5, false),
        Rule::comparison_op => (6, false),
        Rule::bitor_op => (7, false),
        Rule::bitxor_op => (8, false),
        Rule::bitand_op => (9, false),
        Rule::shift_op => (10, false),
        Rule::additive_op => (11, false),
        Rule::multiplicative_op => (12, false),
        Rule::exp_op => (13, true),
        _ => (0, false),
    }
}

fn is_keyword(rule: Rule) -> bool {
    matches!(
        rule,
        Rule::kw_abstract
            | Rule::kw_anonymous
            | Rule::kw_as
            | Rule::kw_break
            | Rule::kw_constant
            | Rule::kw_constructor
            | Rule::kw_continue
            | Rule::kw_delete
            | Rule::kw_else
            | Rule::kw_emit
            | Rule::kw_enum
            | Rule::kw_error
            | Rule::kw_event
            | Rule::kw_for
            | Rule::kw_function
            | Rule::kw_if
            | Rule::kw_immutable
            | Rule::kw_import
            | Rule::kw_indexed
            | Rule::kw_is
            | Rule::kw_mapping
            | Rule::kw_modifier
            | Rule::kw_new
            | Rule::kw_override
            | Rule::kw_pragma
            | Rule::kw_return
            | Rule::kw_returns
            | Rule::kw_revert
            | Rule::kw_struct
            | Rule::kw_unchecked
            | Rule::kw_using
            | Rule::kw_virtual
            | Rule::kw_while
    )
}

/// Inner pairs with keyword tokens removed.
fn significant(pair: Pair<Rule>) -> impl Iterator<Item = Pair<Rule>> {
    pair.into_inner().filter(|inner| !is_keyword(inner.as_rule()))
}

fn span_of(pair: &Pair<Rule>) -> Span {
    let span = pair.as_span();
    Span::new(span.start(), span.end())
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|byte| format!("{byte:02x}")).collect()
}

fn unescape_string(text: &str) -> String {
    let inner = text
        .get(1..text.len().saturating_sub(1))
        .unwrap_or_default();
    let mut result = String::with_capacity(inner.len());
    let mut chars = inner.chars();

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            result.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('t') => result.push('\t'),
            Some('r') => result.push('\r'),
            Some('0') => result.push('\0'),
            Some('x') => {
                let digits: String = chars.by_ref().take(2).collect();
                match u8::from_str_radix(&digits, 16) {
                    Ok(byte) => result.push(char::from(byte)),
                    Err(_) => {
                        result.push_str("\\x");
                        result.push_str(&digits);
                    }
                }
            }
            Some('u') => {
                let digits: String = chars.by_ref().take(4).collect();
                match u32::from_str_radix(&digits, 16).ok().and_then(char::from_u32) {
                    Some(decoded) => result.push(decoded),
                    None => {
                        result.push_str("\\u");
                        result.push_str(&digits);
                    }
                }
            }
            Some(other) => result.push(other),
            None => result.push('\\'),
        }
    }

    result
}

/// Rejects input whose bracket nesting exceeds `max_depth` before pest recurses into it.
fn check_nesting(source: &str, max_depth: usize, error_source: &SourceArc) -> Result<()> {
    let bytes = source.as_bytes();
    let mut depth = 0usize;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            quote @ (b'"' | b'\'') => {
                i += 1;
                while i < bytes.len() && bytes[i] != quote && bytes[i] != b'\n' {
                    if bytes[i] == b'\\' {
                        i += 1;
                    }
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i += 2;
                while i < bytes.len() && !(bytes[i] == b'*' && bytes.get(i + 1) == Some(&b'/')) {
                    i += 1;
                }
                i += 1;
            }
            b'(' | b'[' | b'{' => {
                depth += 1;
                if depth > max_depth {
                    return Err(crate::err_ctx!(
                        ParseFailed,
                        format!("maximum nesting depth of {max_depth} exceeded"),
                        error_source,
                        Span::new(i, i + 1),
                        "split deeply nested expressions into helper functions"
                    ));
                }
            }
            b')' | b']' | b'}' => depth = depth.saturating_sub(1),
            _ => {}
        }
        i += 1;
    }
    Ok(())
}

// ============================================================================
// ERROR HANDLING
// ============================================================================

fn describe_rule(rule: &Rule) -> String {
    match rule {
        Rule::EOI => "end of input".to_string(),
        Rule::identifier | Rule::member_name => "identifier".to_string(),
        Rule::type_name | Rule::elementary_type => "type name".to_string(),
        Rule::contract_definition => "contract definition".to_string(),
        Rule::source_unit => "source unit".to_string(),
        other => format!("{other:?}").replace('_', " "),
    }
}

fn convert_parse_error(error: Error<Rule>, source_name: &str, source: &SourceArc) -> StitchError {
    let span = match &error.location {
        InputLocation::Pos(pos) => Span::new(*pos, *pos),
        InputLocation::Span((start, end)) => Span::new(*start, *end),
    };
    let error = error.renamed_rules(describe_rule).with_path(source_name);
    crate::err_ctx!(
        ParseFailed,
        error.to_string(),
        source,
        span,
        "the input is not valid Solidity"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{collect_ids, find_max_id};
    use crate::ErrorType;

    fn parse_ok(source: &str) -> Value {
        parse(source, "Test.sol", 256).unwrap()
    }

    fn first_member(unit: &Value) -> &Value {
        &unit["nodes"][0]["nodes"][0]
    }

    #[test]
    fn empty_input_is_an_empty_source_unit() {
        let unit = parse_ok("");
        assert_eq!(unit["nodeType"], "SourceUnit");
        assert_eq!(unit["id"], 0);
        assert_eq!(unit["nodes"], json!([]));
    }

    #[test]
    fn ids_are_post_order_and_contiguous() {
        let unit = parse_ok(
            "pragma solidity ^0.8.0;\ncontract A { uint256 x; function f() public { x = 1; } }",
        );
        let mut ids = collect_ids(&unit);
        let root_id = unit["id"].as_u64().unwrap();
        assert_eq!(root_id, find_max_id(&unit));
        ids.sort_unstable();
        let expected: Vec<u64> = (0..=root_id).collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn function_defaults() {
        let unit = parse_ok("contract A { function f(uint256 a) returns (bool) { return true; } }");
        let function = first_member(&unit);
        assert_eq!(function["nodeType"], "FunctionDefinition");
        assert_eq!(function["visibility"], "public");
        assert_eq!(function["stateMutability"], "nonpayable");
        assert_eq!(function["implemented"], true);
        assert_eq!(function["parameters"]["parameters"][0]["name"], "a");
        assert_eq!(
            function["returnParameters"]["parameters"][0]["typeName"]["name"],
            "bool"
        );
    }

    #[test]
    fn returns_after_mutability_is_a_returns_clause() {
        let unit = parse_ok(
            "contract A { function getSecret() public view returns (uint256) { return 7; } }",
        );
        let function = first_member(&unit);
        assert_eq!(function["modifiers"], json!([]));
        let returns = function["returnParameters"]["parameters"].as_array().unwrap();
        assert_eq!(returns.len(), 1);
        assert_eq!(returns[0]["typeName"]["name"], "uint256");

        let err = parse("contract A { uint256 returns; }", "Test.sol", 256).unwrap_err();
        assert_eq!(err.error_type(), ErrorType::ParseFailed);
    }

    #[test]
    fn free_functions_default_to_internal() {
        let unit = parse_ok("function helper() pure returns (uint256) { return 1; }");
        assert_eq!(unit["nodes"][0]["visibility"], "internal");
        assert_eq!(unit["nodes"][0]["stateMutability"], "pure");
    }

    #[test]
    fn state_variables_and_mappings() {
        let unit = parse_ok(
            "contract A { mapping(address => uint256) public balances; uint256 constant LIMIT = 10; }",
        );
        let balances = first_member(&unit);
        assert_eq!(balances["stateVariable"], true);
        assert_eq!(balances["visibility"], "public");
        assert_eq!(balances["typeName"]["nodeType"], "Mapping");
        assert_eq!(balances["typeName"]["keyType"]["name"], "address");

        let limit = &unit["nodes"][0]["nodes"][1];
        assert_eq!(limit["constant"], true);
        assert_eq!(limit["visibility"], "internal");
        assert_eq!(limit["value"]["kind"], "number");
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        let unit = parse_ok("contract A { function f() public { x = a + b * c; } }");
        let assignment = &first_member(&unit)["body"]["statements"][0]["expression"];
        assert_eq!(assignment["nodeType"], "Assignment");
        let sum = &assignment["rightHandSide"];
        assert_eq!(sum["operator"], "+");
        assert_eq!(sum["rightExpression"]["operator"], "*");
    }

    #[test]
    fn subtraction_is_left_associative_and_assignment_right() {
        let unit = parse_ok("contract A { function f() public { a = b = c - d - e; } }");
        let outer = &first_member(&unit)["body"]["statements"][0]["expression"];
        let inner = &outer["rightHandSide"];
        assert_eq!(inner["nodeType"], "Assignment");
        let difference = &inner["rightHandSide"];
        assert_eq!(difference["leftExpression"]["operator"], "-");
        assert_eq!(difference["rightExpression"]["name"], "e");
    }

    #[test]
    fn conditionals_and_postfix_chains() {
        let unit = parse_ok(
            "contract A { function f() public { y = ok ? -items[i].value : owner.balance; } }",
        );
        let assignment = &first_member(&unit)["body"]["statements"][0]["expression"];
        let conditional = &assignment["rightHandSide"];
        assert_eq!(conditional["nodeType"], "Conditional");
        let negated = &conditional["trueExpression"];
        assert_eq!(negated["operator"], "-");
        assert_eq!(negated["subExpression"]["nodeType"], "MemberAccess");
        assert_eq!(negated["subExpression"]["expression"]["nodeType"], "IndexAccess");
    }

    #[test]
    fn keyword_prefixed_identifiers_are_identifiers() {
        let unit = parse_ok(
            "contract A { uint256 returnValue; function f() public { returnValue = newValue; } }",
        );
        assert_eq!(first_member(&unit)["name"], "returnValue");
    }

    #[test]
    fn statements_cover_control_flow() {
        let unit = parse_ok(
            r#"contract A {
                error Bad(uint256 code);
                event Done(address indexed who);
                modifier only() { require(msg.sender == owner, "no"); _; }
                function f(uint256 n) public only {
                    for (uint256 i = 0; i < n; i++) { if (i == 3) { continue; } else { break; } }
                    while (n > 0) { n--; }
                    unchecked { n += 1; }
                    emit Done(msg.sender);
                    revert Bad(n);
                }
            }"#,
        );
        let members = &unit["nodes"][0]["nodes"];
        assert_eq!(members[0]["nodeType"], "ErrorDefinition");
        assert_eq!(members[1]["parameters"]["parameters"][0]["indexed"], true);
        assert_eq!(members[2]["body"]["statements"][1]["nodeType"], "PlaceholderStatement");

        let statements = &members[3]["body"]["statements"];
        let kinds: Vec<&str> = statements
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s["nodeType"].as_str().unwrap())
            .collect();
        assert_eq!(
            kinds,
            ["ForStatement", "WhileStatement", "UncheckedBlock", "EmitStatement", "RevertStatement"]
        );
        assert_eq!(members[3]["modifiers"][0]["modifierName"]["name"], "only");
    }

    #[test]
    fn license_and_pragma_are_recorded() {
        let unit = parse_ok("// SPDX-License-Identifier: MIT\npragma solidity ^0.8.0;\n");
        assert_eq!(unit["license"], "MIT");
        assert_eq!(unit["nodes"][0]["literals"], json!(["solidity", "^0.8.0"]));
    }

    #[test]
    fn syntax_errors_are_parse_failures() {
        let err = parse("contract A { function f( {} }", "Broken.sol", 256).unwrap_err();
        assert_eq!(err.error_type(), ErrorType::ParseFailed);
        assert!(err.message().contains("Broken.sol"));
    }

    #[test]
    fn excessive_nesting_is_rejected() {
        let depth = 40;
        let source = format!(
            "contract A {{ function f() public {{ x = {}1{}; }} }}",
            "(".repeat(depth),
            ")".repeat(depth)
        );
        let err = parse(&source, "Deep.sol", 16).unwrap_err();
        assert_eq!(err.error_type(), ErrorType::ParseFailed);
        assert!(err.message().contains("nesting depth"));
        assert!(parse(&source, "Deep.sol", 256).is_ok());
    }
}
