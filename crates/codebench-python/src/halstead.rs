use std::collections::HashSet;

use tree_sitter::Node;

use codebench_core::types::HalsteadMetrics;

use crate::{children, node_text};

/// Distinct operand identity: names are shared within a function, any other
/// expression is distinct per occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Operand<'s> {
    Name(Option<&'s str>, &'s str),
    Node(usize),
}

#[derive(Debug, Default)]
struct Counter<'s> {
    operators: HashSet<&'static str>,
    operands: HashSet<Operand<'s>>,
    n1: usize,
    n2: usize,
}

/// Halstead software-science metrics of a parsed module.
pub fn analyze(root: Node<'_>, source: &str) -> HalsteadMetrics {
    let mut counter = Counter::default();
    counter.visit(root, source, None);
    HalsteadMetrics::from_counts(
        counter.operators.len(),
        counter.operands.len(),
        counter.n1,
        counter.n2,
    )
}

impl<'s> Counter<'s> {
    fn visit(&mut self, node: Node<'_>, source: &'s str, context: Option<&'s str>) {
        match node.kind() {
            "function_definition" => {
                let name = node
                    .child_by_field_name("name")
                    .map(|n| node_text(n, source));
                if let Some(body) = node.child_by_field_name("body") {
                    self.visit(body, source, name);
                }
                return;
            }
            "binary_operator" => {
                if let (Some(op), Some(left), Some(right)) = (
                    field_kind(node, "operator").and_then(binary_name),
                    node.child_by_field_name("left"),
                    node.child_by_field_name("right"),
                ) {
                    self.record(&[op], &[left, right], source, context);
                }
            }
            "augmented_assignment" => {
                let op = field_kind(node, "operator")
                    .and_then(|kind| kind.strip_suffix('='))
                    .and_then(binary_name);
                if let (Some(op), Some(left), Some(right)) = (
                    op,
                    node.child_by_field_name("left"),
                    node.child_by_field_name("right"),
                ) {
                    self.record(&[op], &[left, right], source, context);
                }
            }
            "unary_operator" => {
                if let (Some(op), Some(argument)) = (
                    field_kind(node, "operator").and_then(unary_name),
                    node.child_by_field_name("argument"),
                ) {
                    self.record(&[op], &[argument], source, context);
                }
            }
            "not_operator" => {
                if let Some(argument) = node.child_by_field_name("argument") {
                    self.record(&["Not"], &[argument], source, context);
                }
            }
            "comparison_operator" => {
                let parts = children(node);
                let operators: Vec<&'static str> = parts
                    .iter()
                    .filter(|c| !c.is_named())
                    .filter_map(|c| comparison_name(c.kind()))
                    .collect();
                let operands: Vec<Node<'_>> = parts
                    .into_iter()
                    .filter(|c| c.is_named() && c.kind() != "comment")
                    .collect();
                self.record(&operators, &operands, source, context);
            }
            "boolean_operator" => {
                if let Some(op) = field_kind(node, "operator") {
                    let mut values = Vec::new();
                    chain_values(node, op, &mut values);
                    let name = if op == "or" { "Or" } else { "And" };
                    self.record(&[name], &values, source, context);
                    // Inner links of the chain were folded into this one.
                    for value in values {
                        self.visit(value, source, context);
                    }
                    return;
                }
            }
            _ => {}
        }

        for child in children(node) {
            self.visit(child, source, context);
        }
    }

    fn record(
        &mut self,
        operators: &[&'static str],
        operands: &[Node<'_>],
        source: &'s str,
        context: Option<&'s str>,
    ) {
        self.n1 += operators.len();
        self.operators.extend(operators.iter().copied());
        self.n2 += operands.len();
        for operand in operands {
            let operand = unparenthesized(*operand);
            let key = if operand.kind() == "identifier" {
                Operand::Name(context, node_text(operand, source))
            } else {
                Operand::Node(operand.id())
            };
            self.operands.insert(key);
        }
    }
}

fn field_kind(node: Node<'_>, field: &str) -> Option<&'static str> {
    node.child_by_field_name(field).map(|n| n.kind())
}

/// Operands of `a and b and c` as one flat list.
fn chain_values<'t>(node: Node<'t>, op: &str, values: &mut Vec<Node<'t>>) {
    for field in ["left", "right"] {
        let Some(child) = node.child_by_field_name(field) else {
            continue;
        };
        if child.kind() == "boolean_operator" && field_kind(child, "operator") == Some(op) {
            chain_values(child, op, values);
        } else {
            values.push(child);
        }
    }
}

fn unparenthesized(mut node: Node<'_>) -> Node<'_> {
    while node.kind() == "parenthesized_expression" {
        let mut cursor = node.walk();
        let inner = node
            .named_children(&mut cursor)
            .find(|c| c.kind() != "comment");
        match inner {
            Some(inner) => node = inner,
            None => break,
        }
    }
    node
}

fn binary_name(op: &str) -> Option<&'static str> {
    Some(match op {
        "+" => "Add",
        "-" => "Sub",
        "*" => "Mult",
        "@" => "MatMult",
        "/" => "Div",
        "%" => "Mod",
        "//" => "FloorDiv",
        "**" => "Pow",
        "|" => "BitOr",
        "&" => "BitAnd",
        "^" => "BitXor",
        "<<" => "LShift",
        ">>" => "RShift",
        _ => return None,
    })
}

fn unary_name(op: &str) -> Option<&'static str> {
    Some(match op {
        "+" => "UAdd",
        "-" => "USub",
        "~" => "Invert",
        _ => return None,
    })
}

fn comparison_name(op: &str) -> Option<&'static str> {
    Some(match op {
        "<" => "Lt",
        "<=" => "LtE",
        "==" => "Eq",
        "!=" | "<>" => "NotEq",
        ">=" => "GtE",
        ">" => "Gt",
        "in" => "In",
        "not in" => "NotIn",
        "is" => "Is",
        "is not" => "IsNot",
        _ => return None,
    })
}
