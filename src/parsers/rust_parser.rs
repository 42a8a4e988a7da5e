//! Filepath: src/parsers/rust_parser.rs

use std::collections::BTreeSet;
use std::path::Path;

use tree_sitter::{Language as TsLanguage, Node};

use crate::core::error::Result;
use crate::core::graph::{Reference, Symbol, SymbolGraph, SymbolKind};
use crate::core::symbols::{GraphBuilder, Language, parse_checked};
use crate::infra::utils::{TsNodeUtils, Utf8Utils};

pub struct RustGraphBuilder {
    language: TsLanguage,
}

impl RustGraphBuilder {
    pub fn new() -> Result<Self> {
        Ok(Self {
            language: tree_sitter_rust::LANGUAGE.into(),
        })
    }
}

impl GraphBuilder for RustGraphBuilder {
    fn language(&self) -> Language {
        Language::Rust
    }

    fn build(&self, source: &str, path: &Path) -> Result<SymbolGraph> {
        let tree = parse_checked(&self.language, source, path)?;
        let mut out = Vec::new();
        walk_items(tree.root_node(), &[], source, &mut out);
        Ok(SymbolGraph::from_symbols(out))
    }
}

/// Visit the items of a source file or module body.
fn walk_items(container: Node, module_path: &[String], source: &str, out: &mut Vec<Symbol>) {
    // Open run of top-level `use`/macro statements
    let mut run: Vec<Node> = Vec::new();

    for item in TsNodeUtils::named_children(container) {
        let kind = match item.kind() {
            "function_item" => Some(SymbolKind::Function),
            "struct_item" | "union_item" => Some(SymbolKind::Struct),
            "enum_item" => Some(SymbolKind::Enum),
            "trait_item" => Some(SymbolKind::Trait),
            "impl_item" => Some(SymbolKind::Impl),
            "type_item" => Some(SymbolKind::TypeAlias),
            "const_item" | "static_item" => Some(SymbolKind::Constant),
            "mod_item" => Some(SymbolKind::Module),
            // Attributes and docs are pulled into the item they precede
            "attribute_item" | "inner_attribute_item" | "line_comment" | "block_comment" => {
                continue;
            }
            _ => None,
        };

        match kind {
            Some(kind) => {
                flush_statements(&mut run, source, out);
                collect_item(item, kind, module_path, source, out);
            }
            None => run.push(item),
        }
    }
    flush_statements(&mut run, source, out);
}

fn collect_item(
    item: Node,
    kind: SymbolKind,
    module_path: &[String],
    source: &str,
    out: &mut Vec<Symbol>,
) {
    let mut refs = BTreeSet::new();

    let name = match kind {
        SymbolKind::Impl => impl_label(item, source),
        _ => match TsNodeUtils::field_text(item, "name", source) {
            Some(n) => n.to_string(),
            None => return,
        },
    };
    let id = qualify(module_path, &name);

    match kind {
        SymbolKind::Impl => {
            // The impl itself references its trait and self type;
            // methods carry their own bodies
            for field in ["trait", "type"] {
                if let Some(part) = item.child_by_field_name(field) {
                    collect_refs(part, None, source, &mut refs);
                }
            }
            let owner = item
                .child_by_field_name("type")
                .map(|t| base_type_name(t, source))
                .unwrap_or_default();
            collect_methods(item, &owner, source, out);
        }
        SymbolKind::Trait => {
            if let Some(bounds) = item.child_by_field_name("bounds") {
                collect_refs(bounds, None, source, &mut refs);
            }
            collect_methods(item, &name, source, out);
        }
        SymbolKind::Module => {
            if let Some(body) = item.child_by_field_name("body") {
                let mut path = module_path.to_vec();
                path.push(name.clone());
                walk_items(body, &path, source, out);
            }
        }
        _ => {
            for child in TsNodeUtils::named_children(item) {
                if item.child_by_field_name("name").map(|n| n.id()) == Some(child.id()) {
                    continue;
                }
                collect_refs(child, None, source, &mut refs);
            }
        }
    }

    out.push(make_symbol(id, name, kind, None, item, source, refs));
}

/// Methods declared inside an impl or trait body
fn collect_methods(container: Node, owner: &str, source: &str, out: &mut Vec<Symbol>) {
    let Some(body) = container.child_by_field_name("body") else {
        return;
    };
    for member in TsNodeUtils::named_children(body) {
        if !matches!(member.kind(), "function_item" | "function_signature_item") {
            continue;
        }
        let Some(name) = TsNodeUtils::field_text(member, "name", source) else {
            continue;
        };

        let mut refs = BTreeSet::new();
        for field in ["parameters", "return_type", "body"] {
            if let Some(part) = member.child_by_field_name(field) {
                collect_refs(part, Some(owner), source, &mut refs);
            }
        }

        out.push(make_symbol(
            format!("{owner}::{name}"),
            name.to_string(),
            SymbolKind::Method,
            Some(owner.to_string()),
            member,
            source,
            refs,
        ));
    }
}

fn flush_statements(run: &mut Vec<Node>, source: &str, out: &mut Vec<Symbol>) {
    let (Some(first), Some(last)) = (run.first().copied(), run.last().copied()) else {
        return;
    };

    let mut refs = BTreeSet::new();
    for stmt in run.iter() {
        collect_refs(*stmt, None, source, &mut refs);
    }

    let id = format!("<module:L{}>", first.start_position().row + 1);
    let byte_start = first.start_byte();
    let byte_end = last.end_byte();
    out.push(Symbol {
        id: id.clone(),
        name: id,
        kind: SymbolKind::Statement,
        owner: None,
        byte_start,
        byte_end,
        start_line: first.start_position().row + 1,
        end_line: last.end_position().row + 1,
        text: Utf8Utils::slice_str(source, byte_start, byte_end)
            .unwrap_or_default()
            .to_string(),
        references: refs.into_iter().collect(),
    });
    run.clear();
}

fn make_symbol(
    id: String,
    name: String,
    kind: SymbolKind,
    owner: Option<String>,
    item: Node,
    source: &str,
    refs: BTreeSet<Reference>,
) -> Symbol {
    // Leading attributes and doc comments travel with the item
    let first = leading_trivia_start(item, source);
    let byte_start = first.start_byte();
    let byte_end = item.end_byte();

    Symbol {
        id,
        name,
        kind,
        owner,
        byte_start,
        byte_end,
        start_line: first.start_position().row + 1,
        end_line: item.end_position().row + 1,
        text: Utf8Utils::slice_str(source, byte_start, byte_end)
            .unwrap_or_default()
            .to_string(),
        references: refs.into_iter().collect(),
    }
}

/// Earliest contiguous `#[...]` or `///` sibling above `item`
fn leading_trivia_start<'a>(item: Node<'a>, source: &str) -> Node<'a> {
    let mut first = item;
    while let Some(prev) = first.prev_named_sibling() {
        let attached = prev.end_position().row + 1 >= first.start_position().row;
        let is_trivia = match prev.kind() {
            "attribute_item" => true,
            "line_comment" => Utf8Utils::node_text(source, prev).starts_with("///"),
            _ => false,
        };
        if !(attached && is_trivia) {
            break;
        }
        first = prev;
    }
    first
}

fn qualify(module_path: &[String], name: &str) -> String {
    if module_path.is_empty() {
        name.to_string()
    } else {
        format!("{}::{}", module_path.join("::"), name)
    }
}

/// `impl Foo` or `impl Display for Foo`
fn impl_label(item: Node, source: &str) -> String {
    let ty = TsNodeUtils::field_text(item, "type", source).unwrap_or("?");
    match TsNodeUtils::field_text(item, "trait", source) {
        Some(tr) => format!("impl {tr} for {ty}"),
        None => format!("impl {ty}"),
    }
}

/// `Foo<T>` -> `Foo`, `a::b::Foo` -> `Foo`, `&Foo` -> `Foo`
fn base_type_name(ty: Node, source: &str) -> String {
    match ty.kind() {
        "generic_type" => ty
            .child_by_field_name("type")
            .map(|t| base_type_name(t, source))
            .unwrap_or_default(),
        "scoped_type_identifier" => TsNodeUtils::field_text(ty, "name", source)
            .unwrap_or_default()
            .to_string(),
        "reference_type" => ty
            .child_by_field_name("type")
            .map(|t| base_type_name(t, source))
            .unwrap_or_default(),
        _ => Utf8Utils::node_text(source, ty).to_string(),
    }
}

/// Gather name references under `node`; `owner` is the impl/trait
/// type used for `self.m()` and `Self::m`.
fn collect_refs(node: Node, owner: Option<&str>, source: &str, refs: &mut BTreeSet<Reference>) {
    match node.kind() {
        "identifier" | "type_identifier" => {
            let text = Utf8Utils::node_text(source, node);
            if !matches!(text, "self" | "Self" | "") {
                refs.insert(Reference::Name(text.to_string()));
            }
        }
        "field_expression" => {
            let Some(value) = node.child_by_field_name("value") else {
                return;
            };
            match (owner, value.kind()) {
                (Some(o), "self") => {
                    if let Some(field) = TsNodeUtils::field_text(node, "field", source) {
                        refs.insert(Reference::Member {
                            owner: o.to_string(),
                            name: field.to_string(),
                        });
                    }
                }
                _ => collect_refs(value, owner, source, refs),
            }
        }
        "scoped_identifier" => {
            let name = TsNodeUtils::field_text(node, "name", source).unwrap_or_default();
            let path = node.child_by_field_name("path");
            let path_text = path
                .map(|p| Utf8Utils::node_text(source, p))
                .unwrap_or_default();
            let last_segment = path_text.rsplit("::").next().unwrap_or_default();

            if last_segment == "Self" {
                if let Some(o) = owner {
                    refs.insert(Reference::Member {
                        owner: o.to_string(),
                        name: name.to_string(),
                    });
                }
            } else if last_segment.starts_with(char::is_uppercase) {
                // `Type::assoc` reaches a member of that type
                refs.insert(Reference::Member {
                    owner: last_segment.to_string(),
                    name: name.to_string(),
                });
                refs.insert(Reference::Name(last_segment.to_string()));
            } else if !name.is_empty() {
                // `module::func`
                refs.insert(Reference::Name(name.to_string()));
            }
        }
        "parameters" => {
            for param in TsNodeUtils::named_children(node) {
                if let Some(ty) = param.child_by_field_name("type") {
                    collect_refs(ty, owner, source, refs);
                }
            }
        }
        "let_declaration" => {
            for field in ["type", "value", "alternative"] {
                if let Some(part) = node.child_by_field_name(field) {
                    collect_refs(part, owner, source, refs);
                }
            }
        }
        _ => {
            for child in TsNodeUtils::named_children(node) {
                collect_refs(child, owner, source, refs);
            }
        }
    }
}
