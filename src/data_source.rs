//! Data source abstraction
//!
//! Conversion code only ever sees a [`DataReader`]: a loaded [`DatasetTree`]
//! plus hyperslab reads of individual variables. [`crate::netcdf_io::NetCDFSource`]
//! reads files; [`MemoryDataset`] holds everything in memory and is used to
//! build datasets in code.

use crate::conventions::ValueDecoder;
use crate::dataset::{
    child_path, parent_path, ArrayVariable, AttrValue, Cell, DatasetTree, GroupNode, ValueKind,
};
use crate::errors::{CasperError, Result};
use ndarray::{ArrayD, IxDyn, SliceInfoElem};
use std::collections::HashMap;
use std::ops::Range;

/// Read access to a dataset
pub trait DataReader {
    /// Name of the source, used in logs and metadata
    fn source_name(&self) -> &str;

    /// The dataset's group tree
    fn tree(&self) -> &DatasetTree;

    /// Reads the decoded elements of `var` in the hyperslab `ranges`, in C order.
    ///
    /// `ranges` holds one range per dimension; a scalar variable takes an empty slice.
    fn read_slice(&self, var: &ArrayVariable, ranges: &[Range<usize>]) -> Result<Vec<Cell>>;

    /// Reads a whole variable
    fn read_all(&self, var: &ArrayVariable) -> Result<Vec<Cell>> {
        let ranges: Vec<Range<usize>> = var.shape.iter().map(|&len| 0..len).collect();
        self.read_slice(var, &ranges)
    }
}

/// Checks that `ranges` lies within the variable's shape
pub(crate) fn check_ranges(var: &ArrayVariable, ranges: &[Range<usize>]) -> Result<()> {
    if ranges.len() != var.shape.len() {
        return Err(CasperError::Schema(format!(
            "variable '{}' has {} dimensions, slice has {}",
            var.id(),
            var.shape.len(),
            ranges.len()
        )));
    }
    for ((range, &len), dim) in ranges.iter().zip(&var.shape).zip(&var.dimensions) {
        if range.start > range.end || range.end > len {
            return Err(CasperError::Schema(format!(
                "slice {}..{} out of bounds for dimension '{}' (length {}) of '{}'",
                range.start,
                range.end,
                dim,
                len,
                var.id()
            )));
        }
    }
    Ok(())
}

/// Dataset held entirely in memory
#[derive(Debug, Clone)]
pub struct MemoryDataset {
    name: String,
    tree: DatasetTree,
    data: HashMap<String, ArrayD<Cell>>,
}

impl MemoryDataset {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            tree: DatasetTree::default(),
            data: HashMap::new(),
        }
    }

    /// Adds an empty group; its parent must already exist
    pub fn add_group(&mut self, path: &str) -> Result<&mut Self> {
        let parent = parent_path(path)
            .ok_or_else(|| CasperError::Schema("the root group already exists".to_string()))?;
        if self.tree.group(parent).is_none() {
            return Err(CasperError::Schema(format!(
                "parent group '{}' of '{}' does not exist",
                parent, path
            )));
        }
        if self.tree.group(path).is_some() {
            return Err(CasperError::Schema(format!("group '{}' already exists", path)));
        }
        let name = path.rsplit('/').next().unwrap_or_default();
        self.tree.push_group(GroupNode::new(&child_path(parent, name)));
        Ok(self)
    }

    /// Declares a dimension in `group`
    pub fn add_dimension(&mut self, group: &str, name: &str, len: usize) -> Result<&mut Self> {
        self.group_mut(group)?.dimensions.push((name.to_string(), len));
        Ok(self)
    }

    /// Sets an attribute of `group`
    pub fn set_attribute(
        &mut self,
        group: &str,
        name: &str,
        value: impl Into<AttrValue>,
    ) -> Result<&mut Self> {
        let value = value.into();
        let attributes = &mut self.group_mut(group)?.attributes;
        match attributes.iter_mut().find(|(key, _)| key == name) {
            Some(slot) => slot.1 = value,
            None => attributes.push((name.to_string(), value)),
        }
        Ok(self)
    }

    /// Adds a variable; its shape comes from the named dimensions visible in `group`
    pub fn add_variable<V: Into<Cell>>(
        &mut self,
        group: &str,
        name: &str,
        dimensions: &[&str],
        values: Vec<V>,
    ) -> Result<&mut ArrayVariable> {
        let shape = dimensions
            .iter()
            .map(|dim| {
                self.tree.dimension_len(group, dim).ok_or_else(|| {
                    CasperError::Schema(format!(
                        "dimension '{}' is not visible from group '{}'",
                        dim, group
                    ))
                })
            })
            .collect::<Result<Vec<usize>>>()?;

        let cells: Vec<Cell> = values.into_iter().map(Into::into).collect();
        let kind = cells
            .iter()
            .find(|c| !matches!(c, Cell::Missing))
            .map(kind_of)
            .unwrap_or(ValueKind::Float64);
        let array = ArrayD::from_shape_vec(IxDyn(&shape), cells)?;

        let var = ArrayVariable::new(
            group,
            name,
            dimensions.iter().map(|d| d.to_string()).collect(),
            shape,
            kind,
        );
        let node = self.group_mut(group)?;
        if node.variable(name).is_some() {
            return Err(CasperError::Schema(format!(
                "variable '{}' already exists in '{}'",
                name, group
            )));
        }
        self.data.insert(var.id(), array);
        let node = self.group_mut(group)?;
        node.variables.push(var);
        let idx = node.variables.len() - 1;
        Ok(&mut node.variables[idx])
    }

    fn group_mut(&mut self, path: &str) -> Result<&mut GroupNode> {
        self.tree
            .group_mut(path)
            .ok_or_else(|| CasperError::Schema(format!("group '{}' does not exist", path)))
    }
}

fn kind_of(cell: &Cell) -> ValueKind {
    match cell {
        Cell::Int(_) => ValueKind::Int,
        Cell::UInt(_) => ValueKind::UInt,
        Cell::Float32(_) => ValueKind::Float32,
        Cell::Text(_) => ValueKind::Text,
        Cell::Float64(_) | Cell::Time(_) | Cell::Missing => ValueKind::Float64,
    }
}

impl DataReader for MemoryDataset {
    fn source_name(&self) -> &str {
        &self.name
    }

    fn tree(&self) -> &DatasetTree {
        &self.tree
    }

    fn read_slice(&self, var: &ArrayVariable, ranges: &[Range<usize>]) -> Result<Vec<Cell>> {
        check_ranges(var, ranges)?;
        let array = self
            .data
            .get(&var.id())
            .ok_or_else(|| CasperError::Schema(format!("no data stored for '{}'", var.id())))?;

        let info: Vec<SliceInfoElem> = ranges
            .iter()
            .map(|r| SliceInfoElem::Slice {
                start: r.start as isize,
                end: Some(r.end as isize),
                step: 1,
            })
            .collect();
        let decoder = ValueDecoder::for_variable(var);
        Ok(array
            .slice(info.as_slice())
            .iter()
            .cloned()
            .map(|raw| decoder.decode(raw))
            .collect())
    }
}
