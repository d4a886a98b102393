//! Dimensional schema classification
//!
//! Every data variable of the tree is keyed by its ordered tuple of dimension
//! names. Variables sharing a tuple end up in the same CSV file.

use crate::dataset::{ArrayVariable, DatasetTree};
use crate::errors::{CasperError, Result};
use std::collections::HashMap;
use std::fmt;

/// Ordered tuple of dimension names
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Signature(Vec<String>);

impl Signature {
    pub fn new(dimensions: Vec<String>) -> Self {
        Self(dimensions)
    }

    pub fn dimensions(&self) -> &[String] {
        &self.0
    }

    /// Scalar variables have the empty signature
    pub fn is_scalar(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|d| d == name)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.0.join(", "))
    }
}

/// Data variables sharing one signature, in discovery order
#[derive(Debug, Clone)]
pub struct SchemaGroup<'t> {
    pub signature: Signature,
    pub variables: Vec<&'t ArrayVariable>,
}

impl SchemaGroup<'_> {
    pub fn variable_ids(&self) -> Vec<String> {
        self.variables.iter().map(|v| v.id()).collect()
    }
}

/// Groups the tree's data variables by signature.
///
/// Groups come out in the order their first variable is met while walking the
/// tree root first; coordinates of their own group are skipped.
pub fn classify(tree: &DatasetTree) -> Result<Vec<SchemaGroup<'_>>> {
    let mut groups: Vec<SchemaGroup<'_>> = Vec::new();
    let mut index: HashMap<Signature, usize> = HashMap::new();

    for group in tree.groups() {
        for var in &group.variables {
            if var.dimensions.len() != var.shape.len() {
                return Err(CasperError::Schema(format!(
                    "variable '{}' declares {} dimensions but has rank {}",
                    var.id(),
                    var.dimensions.len(),
                    var.shape.len()
                )));
            }
            if group.is_coordinate(var) {
                continue;
            }

            let signature = Signature::new(var.dimensions.clone());
            match index.get(&signature) {
                Some(&i) => groups[i].variables.push(var),
                None => {
                    index.insert(signature.clone(), groups.len());
                    groups.push(SchemaGroup {
                        signature,
                        variables: vec![var],
                    });
                }
            }
        }
    }

    Ok(groups)
}
