//! Group materialization
//!
//! A [`GroupView`] is the combined table of one schema group: the member
//! variables outer-joined on their dimension coordinates. Building the view only
//! reads 1-D dimension coordinates; data is pulled window by window through
//! [`GroupView::read_window`].

use super::format::format_cell;
use crate::data_source::DataReader;
use crate::dataset::{ArrayVariable, Cell};
use crate::errors::{CasperError, Result};
use crate::schema::{SchemaGroup, Signature};
use ndarray::{ArrayD, IxDyn};
use std::collections::HashMap;
use std::ops::Range;

/// Labels of one dimension after the outer join
#[derive(Debug, Clone)]
pub struct Axis {
    pub name: String,
    pub labels: Vec<Cell>,
    /// True when at least one member has a coordinate variable for this dimension
    pub has_coordinate: bool,
}

/// Position of every axis label in one variable's own index space
type AxisMapping = Vec<Option<usize>>;

#[derive(Debug)]
struct Member<'t> {
    var: &'t ArrayVariable,
    mappings: Vec<AxisMapping>,
}

/// One source of an auxiliary coordinate column
#[derive(Debug)]
struct CoordinateSource<'t> {
    member: usize,
    var: &'t ArrayVariable,
    /// Signature position of each of the coordinate's dimensions
    axes: Vec<usize>,
}

#[derive(Debug)]
struct CoordinateColumn<'t> {
    name: String,
    sources: Vec<CoordinateSource<'t>>,
}

/// Combined tabular view of one schema group
#[derive(Debug)]
pub struct GroupView<'t> {
    signature: Signature,
    axes: Vec<Axis>,
    coordinates: Vec<CoordinateColumn<'t>>,
    members: Vec<Member<'t>>,
}

/// Rows of one window, columns in header order
#[derive(Debug, Clone, PartialEq)]
pub struct TableChunk {
    pub rows: Vec<Vec<Cell>>,
    data_start: usize,
}

impl TableChunk {
    /// Drops rows whose data-variable cells are all missing; returns how many were dropped
    pub fn retain_present(&mut self) -> usize {
        let before = self.rows.len();
        let start = self.data_start;
        self.rows
            .retain(|row| row[start..].iter().any(|cell| !cell.is_missing()));
        before - self.rows.len()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Builds the combined view of `group`
pub fn materialize<'t, R: DataReader>(
    reader: &'t R,
    group: &SchemaGroup<'t>,
) -> Result<GroupView<'t>> {
    let tree = reader.tree();
    let dims = group.signature.dimensions();
    let mut coordinate_cache: HashMap<String, Vec<Cell>> = HashMap::new();

    let mut axes: Vec<Axis> = dims
        .iter()
        .map(|name| Axis {
            name: name.clone(),
            labels: Vec::new(),
            has_coordinate: false,
        })
        .collect();
    // Label key -> position, per axis. Keys carry an occurrence count so
    // repeated coordinate values pair up in order instead of collapsing.
    let mut label_index: Vec<HashMap<(String, usize), usize>> = vec![HashMap::new(); dims.len()];

    let mut members = Vec::with_capacity(group.variables.len());
    for &var in &group.variables {
        let mut mappings = Vec::with_capacity(dims.len());

        for (j, dim) in dims.iter().enumerate() {
            let len = var.shape[j];
            let labels: Vec<Cell> = match tree.dimension_coordinate(&var.group_path, dim) {
                Some(coord) => {
                    axes[j].has_coordinate = true;
                    let id = coord.id();
                    if !coordinate_cache.contains_key(&id) {
                        coordinate_cache.insert(id.clone(), reader.read_all(coord)?);
                    }
                    let values = &coordinate_cache[&id];
                    if values.len() != len {
                        return Err(CasperError::Schema(format!(
                            "coordinate '{}' has {} values but dimension '{}' of '{}' has length {}",
                            id,
                            values.len(),
                            dim,
                            var.id(),
                            len
                        )));
                    }
                    values.clone()
                }
                None => (0..len as i64).map(Cell::Int).collect(),
            };

            let mut occurrences: HashMap<String, usize> = HashMap::new();
            let mut mapping: AxisMapping = vec![None; axes[j].labels.len()];
            for (source_idx, label) in labels.into_iter().enumerate() {
                let text = format_cell(&label);
                let seen = occurrences.entry(text.clone()).or_insert(0);
                let key = (text, *seen);
                *seen += 1;

                let position = match label_index[j].get(&key) {
                    Some(&p) => p,
                    None => {
                        let p = axes[j].labels.len();
                        label_index[j].insert(key, p);
                        axes[j].labels.push(label);
                        mapping.push(None);
                        p
                    }
                };
                mapping[position] = Some(source_idx);
            }
            mappings.push(mapping);
        }

        members.push(Member { var, mappings });
    }

    // Earlier members were mapped before later ones grew the axes
    for member in &mut members {
        for (j, mapping) in member.mappings.iter_mut().enumerate() {
            mapping.resize(axes[j].labels.len(), None);
        }
    }

    let mut coordinates: Vec<CoordinateColumn<'t>> = Vec::new();
    for (member_idx, member) in members.iter().enumerate() {
        for coord in tree.auxiliary_coordinates(member.var) {
            let coord_axes: Vec<usize> = coord
                .dimensions
                .iter()
                .filter_map(|d| dims.iter().position(|s| s == d))
                .collect();
            let source = CoordinateSource {
                member: member_idx,
                var: coord,
                axes: coord_axes,
            };
            match coordinates.iter_mut().find(|c| c.name == coord.name) {
                Some(column) => column.sources.push(source),
                None => coordinates.push(CoordinateColumn {
                    name: coord.name.clone(),
                    sources: vec![source],
                }),
            }
        }
    }

    Ok(GroupView {
        signature: group.signature.clone(),
        axes,
        coordinates,
        members,
    })
}

/// Block of one variable read for a window, with the index offset of each dimension
struct Block {
    data: ArrayD<Cell>,
    offsets: Vec<usize>,
}

impl<'t> GroupView<'t> {
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn axes(&self) -> &[Axis] {
        &self.axes
    }

    /// Column labels: dimensions, auxiliary coordinates, then data variables
    pub fn header(&self) -> Vec<String> {
        let mut header: Vec<String> = self.axes.iter().map(|a| a.name.clone()).collect();
        header.extend(self.coordinates.iter().map(|c| c.name.clone()));
        header.extend(self.members.iter().map(|m| m.var.id()));
        header
    }

    /// Every coordinate of the view: dimension coordinates, then auxiliary ones
    pub fn coordinate_names(&self) -> Vec<String> {
        self.axes
            .iter()
            .filter(|a| a.has_coordinate)
            .map(|a| a.name.clone())
            .chain(self.coordinates.iter().map(|c| c.name.clone()))
            .collect()
    }

    /// Auxiliary coordinate names in column order
    pub fn auxiliary_coordinate_names(&self) -> Vec<String> {
        self.coordinates.iter().map(|c| c.name.clone()).collect()
    }

    pub fn variable_ids(&self) -> Vec<String> {
        self.members.iter().map(|m| m.var.id()).collect()
    }

    /// Name of the axis windows are taken along
    pub fn primary_dimension(&self) -> Option<&str> {
        self.axes.first().map(|a| a.name.as_str())
    }

    /// Number of positions along the primary axis; a scalar view has one
    pub fn primary_len(&self) -> usize {
        self.axes.first().map_or(1, |a| a.labels.len())
    }

    /// Reads rows for primary-axis positions `start..end`
    pub fn read_window<R: DataReader>(
        &self,
        reader: &R,
        start: usize,
        end: usize,
    ) -> Result<TableChunk> {
        let end = end.min(self.primary_len());
        let data_start = self.axes.len() + self.coordinates.len();
        if start >= end {
            return Ok(TableChunk {
                rows: Vec::new(),
                data_start,
            });
        }

        let mut member_blocks = Vec::with_capacity(self.members.len());
        for member in &self.members {
            let mappings: Vec<&AxisMapping> = member.mappings.iter().collect();
            let primary = if mappings.is_empty() { None } else { Some(0) };
            member_blocks.push(read_block(reader, member.var, &mappings, primary, start, end)?);
        }

        let mut coordinate_blocks = Vec::with_capacity(self.coordinates.len());
        for column in &self.coordinates {
            let mut blocks = Vec::with_capacity(column.sources.len());
            for source in &column.sources {
                let owner = &self.members[source.member];
                let mappings: Vec<&AxisMapping> =
                    source.axes.iter().map(|&j| &owner.mappings[j]).collect();
                let primary = source.axes.iter().position(|&j| j == 0);
                let block = read_block(reader, source.var, &mappings, primary, start, end)?;
                blocks.push(block);
            }
            coordinate_blocks.push(blocks);
        }

        let mut lengths: Vec<usize> = self.axes.iter().map(|a| a.labels.len()).collect();
        let mut offsets = vec![0; lengths.len()];
        if let Some(first) = lengths.first_mut() {
            *first = end - start;
            offsets[0] = start;
        }

        let mut rows = Vec::new();
        for positions in odometer(&lengths, &offsets) {
            let mut row = Vec::with_capacity(data_start + self.members.len());
            for (axis, &p) in self.axes.iter().zip(&positions) {
                row.push(axis.labels[p].clone());
            }
            for (column, blocks) in self.coordinates.iter().zip(&coordinate_blocks) {
                let value = column
                    .sources
                    .iter()
                    .zip(blocks)
                    .find_map(|(source, block)| {
                        let owner = &self.members[source.member];
                        let coord_positions: Vec<(usize, &AxisMapping)> = source
                            .axes
                            .iter()
                            .map(|&j| (positions[j], &owner.mappings[j]))
                            .collect();
                        lookup(block.as_ref(), &coord_positions)
                    })
                    .unwrap_or(Cell::Missing);
                row.push(value);
            }
            for (member, block) in self.members.iter().zip(&member_blocks) {
                let member_positions: Vec<(usize, &AxisMapping)> = positions
                    .iter()
                    .zip(&member.mappings)
                    .map(|(&p, m)| (p, m))
                    .collect();
                row.push(lookup(block.as_ref(), &member_positions).unwrap_or(Cell::Missing));
            }
            rows.push(row);
        }

        Ok(TableChunk { rows, data_start })
    }
}

/// Reads the part of `var` covering the window.
///
/// `mappings` holds one axis mapping per dimension of `var`; `primary` is the
/// dimension laid along the primary axis, whose range is limited to the window.
fn read_block<R: DataReader>(
    reader: &R,
    var: &ArrayVariable,
    mappings: &[&AxisMapping],
    primary: Option<usize>,
    start: usize,
    end: usize,
) -> Result<Option<Block>> {
    let mut ranges: Vec<Range<usize>> = Vec::with_capacity(mappings.len());
    for (k, mapping) in mappings.iter().enumerate() {
        let window = if primary == Some(k) {
            &mapping[start..end]
        } else {
            &mapping[..]
        };
        let mut present = window.iter().flatten();
        let Some(&first) = present.next() else {
            return Ok(None);
        };
        let (lo, hi) = present.fold((first, first), |(lo, hi), &i| (lo.min(i), hi.max(i)));
        ranges.push(lo..hi + 1);
    }

    let counts: Vec<usize> = ranges.iter().map(|r| r.len()).collect();
    let offsets: Vec<usize> = ranges.iter().map(|r| r.start).collect();
    let values = reader.read_slice(var, &ranges)?;
    let data = ArrayD::from_shape_vec(IxDyn(&counts), values)?;
    Ok(Some(Block { data, offsets }))
}

/// Value at the given axis positions, or `None` when the block does not cover them
fn lookup(block: Option<&Block>, positions: &[(usize, &AxisMapping)]) -> Option<Cell> {
    let block = block?;
    let mut index = Vec::with_capacity(positions.len());
    for ((p, mapping), &offset) in positions.iter().zip(&block.offsets) {
        let source = (*mapping)[*p]?;
        index.push(source.checked_sub(offset)?);
    }
    block.data.get(IxDyn(&index)).cloned()
}

/// C-order walk over a box of axis positions
fn odometer(lengths: &[usize], offsets: &[usize]) -> Vec<Vec<usize>> {
    if lengths.iter().any(|&l| l == 0) {
        return Vec::new();
    }
    let total: usize = lengths.iter().product();
    let mut out = Vec::with_capacity(total);
    let mut current: Vec<usize> = offsets.to_vec();
    for _ in 0..total {
        out.push(current.clone());
        for k in (0..lengths.len()).rev() {
            current[k] += 1;
            if current[k] < offsets[k] + lengths[k] {
                break;
            }
            current[k] = offsets[k];
        }
    }
    out
}
