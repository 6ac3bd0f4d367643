//! Cycle detection over self-referential row collections.
//!
//! Works identically for department parent links and position reports-to
//! links: anything implementing [`ImportRow`] exposes a key and an optional
//! parent key, and that is all the traversal needs.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use crate::rows::ImportRow;

use super::finding::{FindingKind, ValidationFinding};

/// Arrow used when rendering a cycle path.
pub const PATH_SEPARATOR: &str = " → ";

/// Find every cycle in a parent-pointer graph.
///
/// Each edge is `(key, parent_key)`. The first occurrence of a key wins;
/// later duplicates are ignored here (duplicate detection reports them).
/// Parents that are not themselves keys end the walk.
///
/// Every node has at most one outgoing edge, so one iterative walk per
/// unvisited node with an on-stack index visits each node and edge once.
/// Each returned cycle lists its members in parent-pointer order, starting
/// from the first member the walk reached.
pub fn find_cycles<'a, I>(edges: I) -> Vec<Vec<&'a str>>
where
    I: IntoIterator<Item = (&'a str, Option<&'a str>)>,
{
    let mut order: Vec<&'a str> = Vec::new();
    let mut parent_of: HashMap<&'a str, Option<&'a str>> = HashMap::new();
    for (key, parent) in edges {
        if let Entry::Vacant(slot) = parent_of.entry(key) {
            slot.insert(parent);
            order.push(key);
        }
    }

    let mut done: HashSet<&'a str> = HashSet::with_capacity(order.len());
    let mut cycles = Vec::new();

    for &start in &order {
        if done.contains(start) {
            continue;
        }

        let mut stack: Vec<&'a str> = Vec::new();
        let mut on_stack: HashMap<&'a str, usize> = HashMap::new();
        let mut current = Some(start);

        while let Some(key) = current {
            if done.contains(key) {
                break;
            }
            if let Some(&pos) = on_stack.get(key) {
                cycles.push(stack[pos..].to_vec());
                break;
            }
            on_stack.insert(key, stack.len());
            stack.push(key);
            current = parent_of
                .get(key)
                .copied()
                .flatten()
                .filter(|parent| parent_of.contains_key(parent));
        }

        done.extend(stack);
    }

    cycles
}

/// Render a cycle as `A → B → C → A`.
pub fn render_cycle(cycle: &[&str]) -> String {
    let mut path = cycle.join(PATH_SEPARATOR);
    if let Some(first) = cycle.first() {
        path.push_str(PATH_SEPARATOR);
        path.push_str(first);
    }
    path
}

/// Report every row that takes part in a parent-link cycle.
///
/// Produces one blocking finding per implicated row. All findings for the
/// same cycle share `affected_keys` (the cycle members in order) and the
/// rendered path. A row whose parent is itself is a one-node cycle and
/// yields exactly one finding.
pub fn validate_circular_references<R: ImportRow>(rows: &[R]) -> Vec<ValidationFinding> {
    let mut first_row: HashMap<&str, &R> = HashMap::new();
    for row in rows {
        first_row.entry(row.code()).or_insert(row);
    }

    let edges = rows
        .iter()
        .filter(|r| !r.code().is_empty())
        .map(|r| (r.code(), r.parent_code()));

    let mut findings = Vec::new();
    for cycle in find_cycles(edges) {
        let path = render_cycle(&cycle);
        let members: Vec<String> = cycle.iter().map(|k| k.to_string()).collect();

        for key in &cycle {
            let Some(row) = first_row.get(key) else {
                continue;
            };
            let mut finding = ValidationFinding::error(
                FindingKind::CircularReference,
                R::ENTITY,
                row.source_row(),
                format!("Circular reference detected: {path}"),
            )
            .with_column(R::PARENT_COLUMN)
            .with_field(R::PARENT_COLUMN)
            .with_affected_keys(members.clone());
            if let Some(parent) = row.parent_code() {
                finding = finding.with_value(parent);
            }
            findings.push(finding);
        }
    }

    findings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rows::DepartmentRow;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn dept(code: &str, parent: Option<&str>, row: usize) -> DepartmentRow {
        DepartmentRow {
            code: code.to_string(),
            name: code.to_string(),
            parent_code: parent.map(str::to_string),
            metadata: None,
            source_row: row,
        }
    }

    fn chain(pairs: &[(&str, Option<&str>)]) -> Vec<DepartmentRow> {
        pairs
            .iter()
            .enumerate()
            .map(|(i, (code, parent))| dept(code, *parent, i + 1))
            .collect()
    }

    fn circular_keys(findings: &[ValidationFinding]) -> HashSet<String> {
        findings
            .iter()
            .filter(|f| f.kind == FindingKind::CircularReference)
            .flat_map(|f| f.affected_keys.iter().cloned())
            .collect()
    }

    // -- find_cycles ----------------------------------------------------------

    #[test]
    fn acyclic_graph_has_no_cycles() {
        let edges = vec![("A", None), ("B", Some("A")), ("C", Some("B")), ("D", Some("A"))];
        assert!(find_cycles(edges).is_empty());
    }

    #[test]
    fn finds_three_node_cycle_in_parent_order() {
        let edges = vec![("A", Some("B")), ("B", Some("C")), ("C", Some("A"))];
        let cycles = find_cycles(edges);
        assert_eq!(cycles, vec![vec!["A", "B", "C"]]);
        assert_eq!(render_cycle(&cycles[0]), "A → B → C → A");
    }

    #[test]
    fn tail_leading_into_cycle_is_not_reported() {
        let edges = vec![("X", Some("A")), ("A", Some("B")), ("B", Some("A"))];
        let cycles = find_cycles(edges);
        assert_eq!(cycles, vec![vec!["A", "B"]]);
    }

    #[test]
    fn dangling_parent_ends_walk() {
        let edges = vec![("A", Some("MISSING"))];
        assert!(find_cycles(edges).is_empty());
    }

    // -- validate_circular_references -----------------------------------------

    #[test]
    fn self_reference_yields_exactly_one_finding() {
        let rows = chain(&[("A", Some("A")), ("B", None)]);
        let findings = validate_circular_references(&rows);

        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].affected_keys, vec!["A".to_string()]);
        assert_eq!(findings[0].row, 1);
        assert!(findings[0].message.contains("A → A"));
    }

    #[test]
    fn every_cycle_member_gets_a_finding_with_shared_keys() {
        let rows = chain(&[("A", Some("C")), ("B", Some("A")), ("C", Some("B")), ("D", None)]);
        let findings = validate_circular_references(&rows);

        assert_eq!(findings.len(), 3);
        let first = &findings[0].affected_keys;
        assert!(findings.iter().all(|f| &f.affected_keys == first));
        assert!(!circular_keys(&findings).contains("D"));
    }

    #[test]
    fn disconnected_components_are_independent() {
        let rows = chain(&[
            ("A", Some("B")),
            ("B", Some("A")),
            ("X", Some("Y")),
            ("Y", Some("Z")),
            ("Z", Some("X")),
            ("ROOT", None),
            ("LEAF", Some("ROOT")),
        ]);
        let findings = validate_circular_references(&rows);
        let keys = circular_keys(&findings);

        assert_eq!(findings.len(), 5);
        for key in ["A", "B", "X", "Y", "Z"] {
            assert!(keys.contains(key), "{key} should be reported");
        }
        assert!(!keys.contains("ROOT"));
        assert!(!keys.contains("LEAF"));
    }

    #[test]
    fn acyclic_rows_produce_no_findings() {
        let rows = chain(&[("A", None), ("B", Some("A")), ("C", Some("B"))]);
        assert!(validate_circular_references(&rows).is_empty());
    }

    /// Random forests with injected cycles: exactly the cycle members are
    /// reported, no matter how many trees hang off them.
    #[test]
    fn random_graphs_report_exactly_cycle_members() {
        let mut rng = StdRng::seed_from_u64(0x5eed);

        for _ in 0..200 {
            let n = rng.random_range(2..40);
            let keys: Vec<String> = (0..n).map(|i| format!("N{i}")).collect();

            // Node i points at a lower index (forest) or nothing.
            let mut parents: Vec<Option<usize>> = (0..n)
                .map(|i| {
                    if i == 0 || rng.random_bool(0.2) {
                        None
                    } else {
                        Some(rng.random_range(0..i))
                    }
                })
                .collect();

            // Close a loop by pointing an ancestor back at a descendant.
            let mut expected: HashSet<String> = HashSet::new();
            if rng.random_bool(0.6) {
                let node = rng.random_range(0..n);
                let mut path = vec![node];
                let mut cur = node;
                while let Some(p) = parents[cur] {
                    path.push(p);
                    cur = p;
                }
                let top = *path.last().expect("path has the start node");
                parents[top] = Some(node);
                expected.extend(path.iter().map(|&i| keys[i].clone()));
            }

            let rows: Vec<DepartmentRow> = (0..n)
                .map(|i| dept(&keys[i], parents[i].map(|p| keys[p].as_str()), i + 1))
                .collect();

            let reported = circular_keys(&validate_circular_references(&rows));
            assert_eq!(reported, expected);
        }
    }
}
