//! Query plans: variable orders and atom specs.
//!
//! A plan is an input to the engine; variable-order selection and any query
//! surface live upstream. [`QueryPlan::new`] validates the shape (every atom
//! variable drawn from the variable order, every variable covered by at
//! least one atom) and precomputes the lookup tables the join's inner loops
//! need: level groups, per-variable column positions, and each atom's
//! projection onto the variable order used for driver sorting.

use crate::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One conjunct of the query: a relation and the variables its columns carry.
///
/// The same variable appearing in several atoms (or twice in one atom) is
/// the join condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtomSpec {
    /// Name of the underlying relation.
    pub relation: String,
    /// Variable names, one per column of the relation's trie.
    pub variables: Vec<String>,
}

impl AtomSpec {
    /// Build an atom spec.
    pub fn new<S: Into<String>>(
        relation: impl Into<String>,
        variables: impl IntoIterator<Item = S>,
    ) -> Self {
        AtomSpec {
            relation: relation.into(),
            variables: variables.into_iter().map(Into::into).collect(),
        }
    }

    /// Number of columns.
    pub fn arity(&self) -> usize {
        self.variables.len()
    }
}

/// A validated conjunctive query plan.
#[derive(Debug, Clone)]
pub struct QueryPlan {
    variable_order: Vec<String>,
    atoms: Vec<AtomSpec>,
    /// Per variable-order level: indices of atoms mentioning that variable.
    level_groups: Vec<Vec<usize>>,
    /// `columns[atom][level]`: column positions of the level's variable.
    columns: Vec<Vec<Vec<usize>>>,
    /// `column_var[atom][col]`: variable-order index of the column's variable.
    column_var: Vec<Vec<usize>>,
    /// Per atom: first column of each of its variables, ordered by the
    /// variable order. Drivers are sorted by this projection.
    vo_projection: Vec<Vec<usize>>,
}

impl QueryPlan {
    /// Validate a variable order and atom specs, and precompute the join's
    /// lookup tables. Fails with `InvalidPlan` on an empty variable order or
    /// atom list, duplicate variables, an atom variable missing from the
    /// variable order, or a variable no atom mentions.
    pub fn new(
        variable_order: impl IntoIterator<Item = impl Into<String>>,
        atoms: Vec<AtomSpec>,
    ) -> EngineResult<Self> {
        let variable_order: Vec<String> =
            variable_order.into_iter().map(Into::into).collect();

        if variable_order.is_empty() {
            return Self::invalid("variable order is empty");
        }
        if atoms.is_empty() {
            return Self::invalid("atom specs are empty");
        }
        let mut seen = HashSet::new();
        for var in &variable_order {
            if !seen.insert(var.as_str()) {
                return Self::invalid(format!("duplicate variable '{var}' in variable order"));
            }
        }

        let n = variable_order.len();
        let mut level_groups = vec![Vec::new(); n];
        let mut columns = vec![vec![Vec::new(); n]; atoms.len()];
        let mut column_var = Vec::with_capacity(atoms.len());
        let mut vo_projection = Vec::with_capacity(atoms.len());

        for (a, atom) in atoms.iter().enumerate() {
            if atom.variables.is_empty() {
                return Self::invalid(format!("atom {a} ('{}') has no variables", atom.relation));
            }
            let mut vars = Vec::with_capacity(atom.variables.len());
            for (c, var) in atom.variables.iter().enumerate() {
                let Some(i) = variable_order.iter().position(|v| v == var) else {
                    return Self::invalid(format!(
                        "atom {a} ('{}') uses variable '{var}' not in the variable order",
                        atom.relation
                    ));
                };
                if columns[a][i].is_empty() {
                    level_groups[i].push(a);
                }
                columns[a][i].push(c);
                vars.push(i);
            }
            column_var.push(vars);
            let projection = (0..n)
                .filter_map(|i| columns[a][i].first().copied())
                .collect();
            vo_projection.push(projection);
        }

        for (i, group) in level_groups.iter().enumerate() {
            if group.is_empty() {
                return Self::invalid(format!(
                    "variable '{}' does not appear in any atom",
                    variable_order[i]
                ));
            }
        }

        Ok(QueryPlan {
            variable_order,
            atoms,
            level_groups,
            columns,
            column_var,
            vo_projection,
        })
    }

    fn invalid<T>(reason: impl Into<String>) -> EngineResult<T> {
        Err(EngineError::InvalidPlan {
            reason: reason.into(),
        })
    }

    /// The variable order.
    pub fn variable_order(&self) -> &[String] {
        &self.variable_order
    }

    /// Number of variables (output arity).
    pub fn num_variables(&self) -> usize {
        self.variable_order.len()
    }

    /// The atom specs, in plan order.
    pub fn atoms(&self) -> &[AtomSpec] {
        &self.atoms
    }

    /// Position of a variable in the variable order.
    pub fn variable_index(&self, var: &str) -> Option<usize> {
        self.variable_order.iter().position(|v| v == var)
    }

    /// Indices of atoms mentioning the variable at `level`.
    pub fn level_group(&self, level: usize) -> &[usize] {
        &self.level_groups[level]
    }

    /// Column positions at which atom `atom` carries the variable at `level`.
    pub fn columns_of(&self, atom: usize, level: usize) -> &[usize] {
        &self.columns[atom][level]
    }

    /// Variable-order index of column `col` of atom `atom`.
    pub fn column_variable(&self, atom: usize, col: usize) -> usize {
        self.column_var[atom][col]
    }

    /// The atom's columns ordered by the variable order (first column per
    /// variable): the driver sort key.
    pub fn vo_projection(&self, atom: usize) -> &[usize] {
        &self.vo_projection[atom]
    }
}
