//! Filepath: src/infra/utils.rs
//! Small helper structs shared by the language builders.
//! All functions are associated fns to keep call sites
//! ergonomic, testable, and discoverable.

// Tree-sitter types for node helpers
use tree_sitter::Node;

/// UTF-8 safe slicing helpers
pub struct Utf8Utils;

impl Utf8Utils
{
    /// Return a substring by byte range if it is on a char
    /// boundary within `full`, else None
    pub fn slice_str(
        full: &str,
        start: usize,
        end: usize,
    ) -> Option<&str>
    {
        // Early checks on range validity
        if start > end || end > full.len()
        {
            return None;
        }

        // Use get(..) to enforce char boundary safety
        full.get(start..end)
    }

    /// Text of a node, empty when the range is not a valid slice
    pub fn node_text<'a>(
        full: &'a str,
        node: Node,
    ) -> &'a str
    {
        Self::slice_str(full, node.start_byte(), node.end_byte()).unwrap_or_default()
    }
}

/// Tree-sitter node helpers
pub struct TsNodeUtils;

impl TsNodeUtils
{
    /// Collect named children into a Vec so callers can
    /// recurse without holding a cursor borrow
    pub fn named_children<'a>(node: Node<'a>) -> Vec<Node<'a>>
    {
        let mut cursor = node.walk();
        node.named_children(&mut cursor)
            .collect()
    }

    /// Text of the child stored under `field`, if any
    pub fn field_text<'a>(
        node: Node,
        field: &str,
        full: &'a str,
    ) -> Option<&'a str>
    {
        // Look up the field child and slice its text
        let child = node.child_by_field_name(field)?;
        Utf8Utils::slice_str(full, child.start_byte(), child.end_byte())
    }

    /// Convert a node's row span to 1-based line numbers
    pub fn line_range_1based(node: Node) -> (usize, usize)
    {
        (node.start_position().row + 1, node.end_position().row + 1)
    }

    /// First ERROR or MISSING node in pre-order, if the tree has one
    pub fn first_error(root: Node) -> Option<Node>
    {
        // Skip the walk entirely for clean trees
        if !root.has_error()
        {
            return None;
        }

        // Depth-first, left-to-right so the earliest problem wins
        let mut stack = vec![root];
        while let Some(node) = stack.pop()
        {
            if node.is_error() || node.is_missing()
            {
                return Some(node);
            }

            // Only descend into subtrees that contain an error;
            // anonymous children matter since MISSING tokens are unnamed
            let mut cursor = node.walk();
            let children: Vec<Node> = node
                .children(&mut cursor)
                .collect();
            for child in children
                .into_iter()
                .rev()
            {
                if child.has_error() || child.is_missing()
                {
                    stack.push(child);
                }
            }
        }

        // has_error() can be set by an anonymous MISSING token
        Some(root)
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn slice_str_rejects_bad_ranges()
    {
        let s = "héllo";
        assert_eq!(Utf8Utils::slice_str(s, 0, 1), Some("h"));
        // Byte 2 is inside the two-byte 'é'
        assert_eq!(Utf8Utils::slice_str(s, 0, 2), None);
        assert_eq!(Utf8Utils::slice_str(s, 3, 99), None);
    }

    #[test]
    fn first_error_finds_broken_python()
    {
        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(&tree_sitter_python::LANGUAGE.into())
            .expect("language");

        let good = parser
            .parse("def f():\n    return 1\n", None)
            .expect("tree");
        assert!(TsNodeUtils::first_error(good.root_node()).is_none());

        let bad = parser
            .parse("def f(:\n    return 1\n", None)
            .expect("tree");
        let node = TsNodeUtils::first_error(bad.root_node()).expect("error node");
        assert_eq!(node.start_position().row, 0);
    }
}
