use tree_sitter::Node;

use codebench_core::types::{ComplexityMetrics, UnitComplexity, UnitKind};

use crate::{children, node_text};

/// Where a definition sits, which decides what kind of unit it becomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope<'s> {
    Module,
    Function,
    Class(&'s str),
}

#[derive(Debug, Default)]
struct Block {
    /// Decision points found directly in this block.
    points: u32,
    functions: Vec<UnitComplexity>,
    classes: Vec<(UnitComplexity, Vec<UnitComplexity>)>,
}

/// Cyclomatic complexity of a parsed module.
pub fn analyze(root: Node<'_>, source: &str) -> ComplexityMetrics {
    let mut block = Block::default();
    visit(root, source, Scope::Module, &mut block);

    let complexity = 1 + block.points;
    let n_functions = block.functions.len();
    let n_classes = block.classes.len();
    let functions_complexity = sum(&block.functions).saturating_sub(n_functions as u32);
    let classes_complexity = block
        .classes
        .iter()
        .map(|(class, _)| class.complexity)
        .sum::<u32>()
        .saturating_sub(n_classes as u32);

    let mut units = block.functions;
    for (class, methods) in block.classes {
        units.push(class);
        units.extend(methods);
    }

    ComplexityMetrics {
        complexity,
        functions_complexity,
        classes_complexity,
        total_complexity: complexity + functions_complexity + classes_complexity,
        n_functions,
        n_classes,
        n_blocks: units.len(),
        units,
    }
}

fn sum(units: &[UnitComplexity]) -> u32 {
    units.iter().map(|u| u.complexity).sum()
}

fn visit<'s>(node: Node<'_>, source: &'s str, scope: Scope<'s>, block: &mut Block) {
    match node.kind() {
        "function_definition" => {
            // Closures are not reported and do not add to their parent.
            if scope == Scope::Function {
                return;
            }
            let mut body = Block::default();
            visit_body(node, source, Scope::Function, &mut body);
            let (kind, classname) = match scope {
                Scope::Class(name) => (UnitKind::Method, Some(name.to_string())),
                _ => (UnitKind::Function, None),
            };
            block.functions.push(UnitComplexity {
                name: definition_name(node, source),
                kind,
                classname,
                line: node.start_position().row + 1,
                complexity: 1 + body.points,
            });
            return;
        }
        "class_definition" => {
            if scope != Scope::Module {
                return;
            }
            let name = definition_name(node, source);
            let mut body = Block::default();
            visit_body(node, source, Scope::Class(&name), &mut body);
            let class = UnitComplexity {
                complexity: 1 + body.points + sum(&body.functions),
                name: name.clone(),
                kind: UnitKind::Class,
                classname: None,
                line: node.start_position().row + 1,
            };
            block.classes.push((class, body.functions));
            return;
        }
        _ => block.points += decision_points(node, source),
    }

    for child in children(node) {
        visit(child, source, scope, block);
    }
}

fn visit_body<'s>(node: Node<'_>, source: &'s str, scope: Scope<'s>, block: &mut Block) {
    if let Some(body) = node.child_by_field_name("body") {
        visit(body, source, scope, block);
    }
}

fn definition_name(node: Node<'_>, source: &str) -> String {
    node.child_by_field_name("name")
        .map(|n| node_text(n, source).to_string())
        .unwrap_or_default()
}

/// Decision points contributed by `node` itself, not counting its children.
fn decision_points(node: Node<'_>, source: &str) -> u32 {
    match node.kind() {
        "if_statement" | "elif_clause" | "conditional_expression" | "assert_statement"
        | "boolean_operator" | "for_in_clause" => 1,
        // A case guard is part of the match, not a comprehension filter.
        "if_clause" => u32::from(node.parent().map(|p| p.kind()) != Some("case_clause")),
        "for_statement" | "while_statement" => 1 + count_children(node, &["else_clause"]),
        "try_statement" => {
            count_children(node, &["except_clause", "except_group_clause", "else_clause"])
        }
        "match_statement" => match_points(node, source),
        _ => 0,
    }
}

fn count_children(node: Node<'_>, kinds: &[&str]) -> u32 {
    children(node)
        .into_iter()
        .filter(|c| kinds.contains(&c.kind()))
        .count() as u32
}

/// Every case is a branch, except that a trailing catch-all adds no path.
fn match_points(node: Node<'_>, source: &str) -> u32 {
    let container = node.child_by_field_name("body").unwrap_or(node);
    let cases: Vec<Node<'_>> = children(container)
        .into_iter()
        .filter(|c| c.kind() == "case_clause")
        .collect();
    let catch_all = cases.iter().any(|case| is_catch_all(*case, source));
    (cases.len() as u32).saturating_sub(u32::from(catch_all))
}

/// `case _:` or `case name:` without a guard.
fn is_catch_all(case: Node<'_>, source: &str) -> bool {
    let parts = children(case);
    if parts.iter().any(|p| p.kind() == "if_clause") {
        return false;
    }
    let patterns: Vec<&Node<'_>> = parts.iter().filter(|p| p.kind() == "case_pattern").collect();
    let [pattern] = patterns.as_slice() else {
        return false;
    };
    let text = node_text(**pattern, source).trim();
    let mut chars = text.chars();
    let starts_like_name = chars
        .next()
        .is_some_and(|c| c == '_' || c.is_alphabetic());
    starts_like_name
        && chars.all(|c| c == '_' || c.is_alphanumeric())
        && !matches!(text, "None" | "True" | "False")
}
