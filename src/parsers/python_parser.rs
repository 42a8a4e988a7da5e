//! Filepath: src/parsers/python_parser.rs
//! ------------------------------------------------------------------
//! Python graph builder built on Tree-sitter 0.25.x.
//! Goals:
//!   - Extract module-level functions and classes, methods
//!     (qualified `Class.method`) and runs of top-level statements.
//!   - Keep decorators inside the symbol's byte range.
//!   - Attribute each identifier to the innermost symbol that owns it
//!     so containment never fabricates edges.
//!
//! Notes:
//!   - Functions nested inside functions are part of their parent's
//!     text and references; only class bodies produce nested symbols.
//!   - `self.x` / `cls.x` inside a class resolve to members of that
//!     class; other attribute names are never treated as references.
//!   - Parameter names and keyword-argument names are bindings, not
//!     references, and are skipped.
//! ------------------------------------------------------------------

use std::collections::BTreeSet;
use std::path::Path;

use tree_sitter::{Language as TsLanguage, Node};

use crate::core::error::Result;
use crate::core::graph::{Reference, Symbol, SymbolGraph, SymbolKind};
use crate::core::symbols::{GraphBuilder, Language, parse_checked};
use crate::infra::utils::{TsNodeUtils, Utf8Utils};

/// Builds a symbol graph from Python source.
pub struct PythonGraphBuilder {
    /// Python language handle for Tree-sitter.
    language: TsLanguage,
}

impl PythonGraphBuilder {
    pub fn new() -> Result<Self> {
        Ok(Self {
            language: tree_sitter_python::LANGUAGE.into(),
        })
    }
}

impl GraphBuilder for PythonGraphBuilder {
    fn language(&self) -> Language {
        Language::Python
    }

    fn build(&self, source: &str, path: &Path) -> Result<SymbolGraph> {
        let tree = parse_checked(&self.language, source, path)?;
        let root = tree.root_node();

        let mut out = Vec::with_capacity(16);
        // Open run of consecutive top-level statements
        let mut run: Vec<Node> = Vec::new();

        for child in TsNodeUtils::named_children(root) {
            if child.kind() == "comment" {
                continue;
            }
            match definition_of(child) {
                Some(def) => {
                    flush_statements(&mut run, source, &mut out);
                    collect_definition(child, def, None, source, &mut out);
                }
                None => run.push(child),
            }
        }
        flush_statements(&mut run, source, &mut out);

        Ok(SymbolGraph::from_symbols(out))
    }
}

/// Unwrap a decorated definition; None for non-definitions
fn definition_of(node: Node) -> Option<Node> {
    match node.kind() {
        "function_definition" | "class_definition" => Some(node),
        "decorated_definition" => node.child_by_field_name("definition"),
        _ => None,
    }
}

/// Emit a symbol for `def` (spanning `outer`, which includes
/// decorators) and recurse into class bodies for members.
fn collect_definition(
    outer: Node,
    def: Node,
    owner: Option<&str>,
    source: &str,
    out: &mut Vec<Symbol>,
) {
    let Some(name) = TsNodeUtils::field_text(def, "name", source) else {
        return;
    };
    let name = name.to_string();

    let id = match owner {
        Some(o) => format!("{o}.{name}"),
        None => name.clone(),
    };

    let mut refs = BTreeSet::new();

    // Decorators belong to the symbol they wrap
    if outer.id() != def.id() {
        for child in TsNodeUtils::named_children(outer) {
            if child.kind() == "decorator" {
                collect_refs(child, owner, source, &mut refs);
            }
        }
    }

    let kind = match def.kind() {
        "class_definition" => {
            if let Some(supers) = def.child_by_field_name("superclasses") {
                collect_refs(supers, owner, source, &mut refs);
            }
            // Body statements belong to the class, nested
            // definitions become their own symbols
            if let Some(body) = def.child_by_field_name("body") {
                for stmt in TsNodeUtils::named_children(body) {
                    match definition_of(stmt) {
                        Some(inner) => collect_definition(stmt, inner, Some(&id), source, out),
                        None => collect_refs(stmt, Some(&id), source, &mut refs),
                    }
                }
            }
            SymbolKind::Class
        }
        _ => {
            for field in ["parameters", "return_type", "body"] {
                if let Some(part) = def.child_by_field_name(field) {
                    collect_refs(part, owner, source, &mut refs);
                }
            }
            if owner.is_some() {
                SymbolKind::Method
            } else {
                SymbolKind::Function
            }
        }
    };

    out.push(make_symbol(
        id,
        name,
        kind,
        owner.map(str::to_string),
        outer,
        outer,
        source,
        refs,
    ));
}

/// Close the current statement run as one module-level symbol
fn flush_statements(run: &mut Vec<Node>, source: &str, out: &mut Vec<Symbol>) {
    let (Some(first), Some(last)) = (run.first().copied(), run.last().copied()) else {
        return;
    };

    let mut refs = BTreeSet::new();
    for stmt in run.iter() {
        collect_refs(*stmt, None, source, &mut refs);
    }

    let line = first.start_position().row + 1;
    let id = format!("<module:L{line}>");
    out.push(make_symbol(
        id.clone(),
        id,
        SymbolKind::Statement,
        None,
        first,
        last,
        source,
        refs,
    ));
    run.clear();
}

#[allow(clippy::too_many_arguments)]
fn make_symbol(
    id: String,
    name: String,
    kind: SymbolKind,
    owner: Option<String>,
    first: Node,
    last: Node,
    source: &str,
    refs: BTreeSet<Reference>,
) -> Symbol {
    let byte_start = first.start_byte();
    let byte_end = last.end_byte();
    let (start_line, _) = TsNodeUtils::line_range_1based(first);
    let (_, end_line) = TsNodeUtils::line_range_1based(last);

    Symbol {
        id,
        name,
        kind,
        owner,
        byte_start,
        byte_end,
        start_line,
        end_line,
        text: Utf8Utils::slice_str(source, byte_start, byte_end)
            .unwrap_or_default()
            .to_string(),
        references: refs.into_iter().collect(),
    }
}

/// Gather name references under `node`. `class` is the enclosing
/// class id used to resolve `self.x` / `cls.x`.
fn collect_refs(node: Node, class: Option<&str>, source: &str, refs: &mut BTreeSet<Reference>) {
    match node.kind() {
        "identifier" => {
            let text = Utf8Utils::node_text(source, node);
            if !matches!(text, "self" | "cls" | "") {
                refs.insert(Reference::Name(text.to_string()));
            }
        }
        "attribute" => {
            let Some(object) = node.child_by_field_name("object") else {
                return;
            };
            let object_text = Utf8Utils::node_text(source, object);
            match (class, object.kind(), object_text) {
                (Some(owner), "identifier", "self" | "cls") => {
                    if let Some(attr) = TsNodeUtils::field_text(node, "attribute", source) {
                        refs.insert(Reference::Member {
                            owner: owner.to_string(),
                            name: attr.to_string(),
                        });
                    }
                }
                _ => collect_refs(object, class, source, refs),
            }
        }
        "keyword_argument" => {
            if let Some(value) = node.child_by_field_name("value") {
                collect_refs(value, class, source, refs);
            }
        }
        "parameters" | "lambda_parameters" => {
            for param in TsNodeUtils::named_children(node) {
                collect_parameter(param, class, source, refs);
            }
        }
        _ => {
            for child in TsNodeUtils::named_children(node) {
                collect_refs(child, class, source, refs);
            }
        }
    }
}

/// Parameters contribute their annotations and defaults only
fn collect_parameter(
    param: Node,
    class: Option<&str>,
    source: &str,
    refs: &mut BTreeSet<Reference>,
) {
    match param.kind() {
        "typed_parameter" | "default_parameter" | "typed_default_parameter" => {
            for field in ["type", "value"] {
                if let Some(part) = param.child_by_field_name(field) {
                    collect_refs(part, class, source, refs);
                }
            }
        }
        _ => {}
    }
}
