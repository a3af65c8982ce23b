//! Owned document tree handed to the inference engine by an HTML parser.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Lowercase tag name.
    pub name: String,
    pub children: Vec<Node>,
}

impl Node {
    pub fn element(name: impl Into<String>, children: Vec<Node>) -> Self {
        Node::Element(Element {
            name: name.into(),
            children,
        })
    }

    pub fn text(text: impl Into<String>) -> Self {
        Node::Text(text.into())
    }

    pub fn is_element(&self) -> bool {
        matches!(self, Node::Element(_))
    }

    /// Text nodes, and elements whose children are all text (or absent).
    pub fn is_leaf(&self) -> bool {
        match self {
            Node::Text(_) => true,
            Node::Element(el) => !el.children.iter().any(Node::is_element),
        }
    }

    pub fn children(&self) -> &[Node] {
        match self {
            Node::Element(el) => &el.children,
            Node::Text(_) => &[],
        }
    }

    /// Descendant text in document order, concatenated without separators.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            match node {
                Node::Text(t) => out.push_str(t),
                Node::Element(el) => stack.extend(el.children.iter().rev()),
            }
        }
        out
    }
}

impl Drop for Element {
    // Descendants are unlinked onto a heap stack so deep trees do not recurse.
    fn drop(&mut self) {
        let mut stack = std::mem::take(&mut self.children);
        while let Some(node) = stack.pop() {
            if let Node::Element(mut el) = node {
                stack.append(&mut el.children);
            }
        }
    }
}
