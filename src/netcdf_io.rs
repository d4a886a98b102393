//! NetCDF/HDF5 input
//!
//! [`NetCDFSource`] opens a file with the `netcdf` crate, loads its group tree
//! breadth-first into a [`DatasetTree`], and serves hyperslab reads with CF
//! decoding applied.

use crate::conventions::ValueDecoder;
use crate::data_source::{check_ranges, DataReader};
use crate::dataset::{
    child_path, ArrayVariable, AttrValue, Attributes, Cell, DatasetTree, GroupNode, ValueKind,
    ROOT_PATH,
};
use crate::errors::{CasperError, Result};
use netcdf::types::{FloatType, IntType, NcVariableType};
use netcdf::{AttributeValue, Extent, Extents, File};
use std::collections::VecDeque;
use std::ops::Range;
use std::path::Path;

/// A NetCDF file opened for conversion
pub struct NetCDFSource {
    name: String,
    file: File,
    tree: DatasetTree,
}

impl NetCDFSource {
    /// Opens `path` and loads its group tree
    pub fn open(path: &Path) -> Result<Self> {
        let file = netcdf::open(path).map_err(|e| CasperError::UnreadableDataset {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let tree = load_tree(&file)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self { name, file, tree })
    }

    fn variable(&self, var: &ArrayVariable) -> Result<netcdf::Variable<'_>> {
        let lookup = var.id();
        self.file
            .variable(lookup.trim_start_matches('/'))
            .ok_or_else(|| CasperError::Schema(format!("variable '{}' not found in file", lookup)))
    }
}

impl DataReader for NetCDFSource {
    fn source_name(&self) -> &str {
        &self.name
    }

    fn tree(&self) -> &DatasetTree {
        &self.tree
    }

    fn read_slice(&self, var: &ArrayVariable, ranges: &[Range<usize>]) -> Result<Vec<Cell>> {
        check_ranges(var, ranges)?;
        if ranges.iter().any(|r| r.is_empty()) {
            return Ok(Vec::new());
        }
        let nc_var = self.variable(var)?;

        let raw: Vec<Cell> = match &var.kind {
            ValueKind::Float32 => nc_var
                .get_values::<f32, _>(extents(ranges))?
                .into_iter()
                .map(Cell::Float32)
                .collect(),
            ValueKind::Float64 => nc_var
                .get_values::<f64, _>(extents(ranges))?
                .into_iter()
                .map(Cell::Float64)
                .collect(),
            ValueKind::Int => nc_var
                .get_values::<i64, _>(extents(ranges))?
                .into_iter()
                .map(Cell::Int)
                .collect(),
            ValueKind::UInt => nc_var
                .get_values::<u64, _>(extents(ranges))?
                .into_iter()
                .map(Cell::UInt)
                .collect(),
            ValueKind::Char => read_strings(&nc_var, var, ranges)?,
            ValueKind::Text => {
                let mut cells = Vec::new();
                for index in hyperslab_indices(ranges) {
                    let point: Vec<Extent> = index.into_iter().map(Extent::from).collect();
                    cells.push(Cell::Text(nc_var.get_string(point)?));
                }
                cells
            }
            ValueKind::Unsupported(kind) => {
                return Err(CasperError::Schema(format!(
                    "variable '{}' has unsupported type {}",
                    var.id(),
                    kind
                )))
            }
        };

        let decoder = ValueDecoder::for_variable(var);
        if decoder.is_identity() {
            return Ok(raw
                .into_iter()
                .map(|c| if c.is_missing() { Cell::Missing } else { c })
                .collect());
        }
        Ok(raw.into_iter().map(|c| decoder.decode(c)).collect())
    }
}

/// Reads a `char` array as strings joined along its hidden string-length dimension
fn read_strings(
    nc_var: &netcdf::Variable<'_>,
    var: &ArrayVariable,
    ranges: &[Range<usize>],
) -> Result<Vec<Cell>> {
    let count: usize = ranges.iter().map(|r| r.len()).product();
    let stored = nc_var.dimensions();
    if stored.len() == var.dimensions.len() {
        // Scalar char: a single character
        return Ok(nc_var
            .get_raw_values(extents(ranges))?
            .into_iter()
            .map(|byte| Cell::Text(char::from(byte).to_string()))
            .collect());
    }

    let width = stored.last().map_or(0, netcdf::Dimension::len);
    if width == 0 {
        return Ok(vec![Cell::Text(String::new()); count]);
    }
    let mut full = ranges.to_vec();
    full.push(0..width);
    let bytes = nc_var.get_raw_values(extents(&full))?;
    Ok(bytes
        .chunks(width)
        .map(|word| {
            let end = word.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
            Cell::Text(String::from_utf8_lossy(&word[..end]).into_owned())
        })
        .collect())
}

fn extents(ranges: &[Range<usize>]) -> Extents {
    if ranges.is_empty() {
        return Extents::from(..);
    }
    let slab: Vec<Extent> = ranges.iter().cloned().map(Extent::from).collect();
    Extents::from(slab)
}

/// All C-order index tuples inside the hyperslab
fn hyperslab_indices(ranges: &[Range<usize>]) -> Vec<Vec<usize>> {
    let mut indices = vec![Vec::with_capacity(ranges.len())];
    for range in ranges {
        indices = indices
            .into_iter()
            .flat_map(|prefix| {
                range.clone().map(move |i| {
                    let mut next = prefix.clone();
                    next.push(i);
                    next
                })
            })
            .collect();
    }
    indices
}

/// Loads every group breadth-first, root first
fn load_tree(file: &File) -> Result<DatasetTree> {
    let mut groups = Vec::new();

    match file.root() {
        Some(root) => {
            let mut queue = VecDeque::from([(ROOT_PATH.to_string(), root)]);
            while let Some((path, group)) = queue.pop_front() {
                let mut node = GroupNode::new(&path);
                node.attributes = convert_attributes(group.attributes())?;
                node.dimensions = group
                    .dimensions()
                    .map(|d| (d.name(), d.len()))
                    .collect();
                for var in group.variables() {
                    node.variables.push(describe_variable(&var, &path)?);
                }
                for child in group.groups() {
                    // Re-resolve through the file so the queued group borrows the file, not its parent
                    let child_id = child_path(&path, &child.name());
                    let child = file
                        .group(child_id.trim_start_matches('/'))?
                        .ok_or_else(|| {
                            CasperError::Schema(format!("group '{}' not found in file", child_id))
                        })?;
                    queue.push_back((child_id, child));
                }
                groups.push(node);
            }
        }
        None => {
            // Classic-model files have no group hierarchy
            let mut node = GroupNode::new(ROOT_PATH);
            node.attributes = convert_attributes(file.attributes())?;
            node.dimensions = file.dimensions().map(|d| (d.name(), d.len())).collect();
            for var in file.variables() {
                node.variables.push(describe_variable(&var, ROOT_PATH)?);
            }
            groups.push(node);
        }
    }

    DatasetTree::from_groups(groups)
}

fn describe_variable(var: &netcdf::Variable<'_>, group_path: &str) -> Result<ArrayVariable> {
    let mut dimensions: Vec<String> = var.dimensions().iter().map(|d| d.name()).collect();
    let mut shape: Vec<usize> = var.dimensions().iter().map(netcdf::Dimension::len).collect();

    let kind = match var.vartype() {
        NcVariableType::Float(FloatType::F32) => ValueKind::Float32,
        NcVariableType::Float(FloatType::F64) => ValueKind::Float64,
        NcVariableType::Int(IntType::U8)
        | NcVariableType::Int(IntType::U16)
        | NcVariableType::Int(IntType::U32)
        | NcVariableType::Int(IntType::U64) => ValueKind::UInt,
        NcVariableType::Int(_) => ValueKind::Int,
        NcVariableType::String => ValueKind::Text,
        NcVariableType::Char => ValueKind::Char,
        other => ValueKind::Unsupported(format!("{:?}", other).to_lowercase()),
    };

    // The last dimension of a char array is the string length
    if kind == ValueKind::Char && !dimensions.is_empty() {
        dimensions.pop();
        shape.pop();
    }

    let mut described = ArrayVariable::new(group_path, &var.name(), dimensions, shape, kind);
    let id = described.id();
    described.attributes = convert_attributes(var.attributes()).map_err(|e| {
        CasperError::Schema(format!("attributes of '{}' could not be read: {}", id, e))
    })?;
    Ok(described)
}

fn convert_attributes<'a>(attrs: impl Iterator<Item = netcdf::Attribute<'a>>) -> Result<Attributes> {
    let mut converted = Vec::new();
    for attr in attrs {
        let value = attr.value().map_err(|e| {
            CasperError::Schema(format!("attribute '{}' could not be read: {}", attr.name(), e))
        })?;
        converted.push((attr.name().to_string(), convert_attribute_value(value)));
    }
    Ok(converted)
}

fn convert_attribute_value(value: AttributeValue) -> AttrValue {
    match value {
        AttributeValue::Str(s) => AttrValue::Text(s),
        AttributeValue::Strs(ss) => AttrValue::Texts(ss),
        AttributeValue::Float(v) => AttrValue::Float32(v),
        AttributeValue::Floats(vs) => AttrValue::Float32s(vs),
        AttributeValue::Double(v) => AttrValue::Float64(v),
        AttributeValue::Doubles(vs) => AttrValue::Float64s(vs),
        AttributeValue::Schar(v) => AttrValue::Int(i64::from(v)),
        AttributeValue::Schars(vs) => AttrValue::Ints(vs.into_iter().map(i64::from).collect()),
        AttributeValue::Short(v) => AttrValue::Int(i64::from(v)),
        AttributeValue::Shorts(vs) => AttrValue::Ints(vs.into_iter().map(i64::from).collect()),
        AttributeValue::Int(v) => AttrValue::Int(i64::from(v)),
        AttributeValue::Ints(vs) => AttrValue::Ints(vs.into_iter().map(i64::from).collect()),
        AttributeValue::Longlong(v) => AttrValue::Int(v),
        AttributeValue::Longlongs(vs) => AttrValue::Ints(vs),
        AttributeValue::Uchar(v) => AttrValue::UInt(u64::from(v)),
        AttributeValue::Uchars(vs) => AttrValue::UInts(vs.into_iter().map(u64::from).collect()),
        AttributeValue::Ushort(v) => AttrValue::UInt(u64::from(v)),
        AttributeValue::Ushorts(vs) => AttrValue::UInts(vs.into_iter().map(u64::from).collect()),
        AttributeValue::Uint(v) => AttrValue::UInt(u64::from(v)),
        AttributeValue::Uints(vs) => AttrValue::UInts(vs.into_iter().map(u64::from).collect()),
        AttributeValue::Ulonglong(v) => AttrValue::UInt(v),
        AttributeValue::Ulonglongs(vs) => AttrValue::UInts(vs),
        #[allow(unreachable_patterns)]
        other => AttrValue::Text(format!("{:?}", other)),
    }
}
