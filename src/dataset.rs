//! Dataset tree model
//!
//! A dataset is a tree of groups. Each group has a path, attributes and array
//! variables. Only metadata lives here; array contents are read lazily through
//! [`crate::data_source::DataReader`].

use chrono::NaiveDateTime;

/// Path of the root group
pub const ROOT_PATH: &str = "/";

/// One decoded array element
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    /// Absent, masked, fill-valued or NaN
    Missing,
    Int(i64),
    UInt(u64),
    Float32(f32),
    Float64(f64),
    Text(String),
    Time(NaiveDateTime),
}

impl Cell {
    /// True when the element carries no value
    pub fn is_missing(&self) -> bool {
        match self {
            Cell::Missing => true,
            Cell::Float32(v) => v.is_nan(),
            Cell::Float64(v) => v.is_nan(),
            _ => false,
        }
    }

    /// Numeric view of the element, if it has one
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Int(v) => Some(*v as f64),
            Cell::UInt(v) => Some(*v as f64),
            Cell::Float32(v) => Some(f64::from(*v)),
            Cell::Float64(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Float64(value)
    }
}

impl From<f32> for Cell {
    fn from(value: f32) -> Self {
        Cell::Float32(value)
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Cell::Int(value)
    }
}

impl From<i32> for Cell {
    fn from(value: i32) -> Self {
        Cell::Int(i64::from(value))
    }
}

impl From<u64> for Cell {
    fn from(value: u64) -> Self {
        Cell::UInt(value)
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::Text(value)
    }
}

/// Attribute value attached to a group or variable
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Text(String),
    Texts(Vec<String>),
    Int(i64),
    Ints(Vec<i64>),
    UInt(u64),
    UInts(Vec<u64>),
    Float32(f32),
    Float32s(Vec<f32>),
    Float64(f64),
    Float64s(Vec<f64>),
}

impl AttrValue {
    /// Text content, if the attribute is a single string
    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttrValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// All numeric entries of the attribute
    pub fn numbers(&self) -> Vec<f64> {
        match self {
            AttrValue::Int(v) => vec![*v as f64],
            AttrValue::Ints(v) => v.iter().map(|&x| x as f64).collect(),
            AttrValue::UInt(v) => vec![*v as f64],
            AttrValue::UInts(v) => v.iter().map(|&x| x as f64).collect(),
            AttrValue::Float32(v) => vec![f64::from(*v)],
            AttrValue::Float32s(v) => v.iter().map(|&x| f64::from(x)).collect(),
            AttrValue::Float64(v) => vec![*v],
            AttrValue::Float64s(v) => v.clone(),
            AttrValue::Text(_) | AttrValue::Texts(_) => Vec::new(),
        }
    }

    /// First numeric entry of the attribute
    pub fn as_f64(&self) -> Option<f64> {
        self.numbers().first().copied()
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::Text(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        AttrValue::Text(value)
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        AttrValue::Float64(value)
    }
}

impl From<f32> for AttrValue {
    fn from(value: f32) -> Self {
        AttrValue::Float32(value)
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        AttrValue::Int(value)
    }
}

impl From<i32> for AttrValue {
    fn from(value: i32) -> Self {
        AttrValue::Int(i64::from(value))
    }
}

/// Ordered attribute list; insertion order is storage order
pub type Attributes = Vec<(String, AttrValue)>;

/// Storage kind of a variable's elements
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueKind {
    Int,
    UInt,
    Float32,
    Float64,
    Text,
    Char,
    Unsupported(String),
}

/// Metadata of one array variable
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayVariable {
    pub name: String,
    pub group_path: String,
    pub dimensions: Vec<String>,
    pub shape: Vec<usize>,
    pub kind: ValueKind,
    pub attributes: Attributes,
}

impl ArrayVariable {
    pub fn new(
        group_path: &str,
        name: &str,
        dimensions: Vec<String>,
        shape: Vec<usize>,
        kind: ValueKind,
    ) -> Self {
        Self {
            name: name.to_string(),
            group_path: group_path.to_string(),
            dimensions,
            shape,
            kind,
            attributes: Vec::new(),
        }
    }

    /// Fully-qualified identifier: group path + name, root contributes no prefix
    pub fn id(&self) -> String {
        variable_id(&self.group_path, &self.name)
    }

    pub fn attribute(&self, name: &str) -> Option<&AttrValue> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    /// Sets or replaces an attribute
    pub fn set_attribute(&mut self, name: &str, value: impl Into<AttrValue>) -> &mut Self {
        let value = value.into();
        match self.attributes.iter_mut().find(|(key, _)| key == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name.to_string(), value)),
        }
        self
    }

    /// Names listed in the CF `coordinates` attribute
    pub fn auxiliary_coordinate_names(&self) -> Vec<&str> {
        self.attribute("coordinates")
            .and_then(AttrValue::as_text)
            .map(|s| s.split_whitespace().collect())
            .unwrap_or_default()
    }

    /// 1-D variable indexing the dimension it is named after
    pub fn is_dimension_coordinate(&self) -> bool {
        self.dimensions.len() == 1 && self.dimensions[0] == self.name
    }

    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Builds `<path>/<name>`, treating the root as an empty prefix
pub fn variable_id(group_path: &str, name: &str) -> String {
    if group_path == ROOT_PATH {
        format!("/{}", name)
    } else {
        format!("{}/{}", group_path, name)
    }
}

/// Path of a child group
pub fn child_path(parent: &str, name: &str) -> String {
    if parent == ROOT_PATH {
        format!("/{}", name)
    } else {
        format!("{}/{}", parent, name)
    }
}

/// Path of the parent group, `None` for the root
pub fn parent_path(path: &str) -> Option<&str> {
    if path == ROOT_PATH {
        return None;
    }
    match path.rfind('/') {
        Some(0) => Some(ROOT_PATH),
        Some(idx) => Some(&path[..idx]),
        None => Some(ROOT_PATH),
    }
}

/// One group of the tree
#[derive(Debug, Clone, PartialEq)]
pub struct GroupNode {
    pub path: String,
    pub attributes: Attributes,
    pub variables: Vec<ArrayVariable>,
    /// Dimensions declared in this group, with their lengths
    pub dimensions: Vec<(String, usize)>,
}

impl GroupNode {
    pub fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            attributes: Vec::new(),
            variables: Vec::new(),
            dimensions: Vec::new(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.path == ROOT_PATH
    }

    pub fn variable(&self, name: &str) -> Option<&ArrayVariable> {
        self.variables.iter().find(|v| v.name == name)
    }

    /// True when `var` acts as a coordinate within this group
    pub fn is_coordinate(&self, var: &ArrayVariable) -> bool {
        if var.dimensions.iter().any(|d| d == &var.name) {
            return true;
        }
        self.variables
            .iter()
            .any(|other| other.auxiliary_coordinate_names().contains(&var.name.as_str()))
    }
}

/// Groups of a dataset in breadth-first order, root first
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetTree {
    groups: Vec<GroupNode>,
}

impl Default for DatasetTree {
    fn default() -> Self {
        Self {
            groups: vec![GroupNode::new(ROOT_PATH)],
        }
    }
}

impl DatasetTree {
    /// Builds a tree from groups listed root first
    pub fn from_groups(groups: Vec<GroupNode>) -> crate::errors::Result<Self> {
        match groups.first() {
            Some(root) if root.is_root() => {}
            _ => {
                return Err(crate::errors::CasperError::Schema(
                    "dataset tree must start with the root group".to_string(),
                ))
            }
        }
        for (i, group) in groups.iter().enumerate() {
            if groups[..i].iter().any(|g| g.path == group.path) {
                return Err(crate::errors::CasperError::Schema(format!(
                    "duplicate group path '{}'",
                    group.path
                )));
            }
        }
        Ok(Self { groups })
    }

    pub fn root(&self) -> &GroupNode {
        &self.groups[0]
    }

    pub fn groups(&self) -> impl Iterator<Item = &GroupNode> {
        self.groups.iter()
    }

    pub fn group(&self, path: &str) -> Option<&GroupNode> {
        self.groups.iter().find(|g| g.path == path)
    }

    pub(crate) fn group_mut(&mut self, path: &str) -> Option<&mut GroupNode> {
        self.groups.iter_mut().find(|g| g.path == path)
    }

    pub(crate) fn push_group(&mut self, group: GroupNode) {
        self.groups.push(group);
    }

    /// Walks from `path` up to the root, nearest group first
    pub fn lineage<'a>(&'a self, path: &str) -> impl Iterator<Item = &'a GroupNode> + 'a {
        let paths: Vec<String> = std::iter::successors(Some(path), |p| parent_path(*p))
            .map(str::to_string)
            .collect();
        paths.into_iter().filter_map(move |p| self.group(&p))
    }

    /// Length of a dimension visible from `path`
    pub fn dimension_len(&self, path: &str, dim: &str) -> Option<usize> {
        self.lineage(path).find_map(|g| {
            g.dimensions
                .iter()
                .find(|(name, _)| name == dim)
                .map(|(_, len)| *len)
        })
    }

    /// Dimension coordinate of `dim` visible from `path`
    pub fn dimension_coordinate(&self, path: &str, dim: &str) -> Option<&ArrayVariable> {
        self.lineage(path).find_map(|g| {
            g.variable(dim)
                .filter(|v| v.is_dimension_coordinate())
        })
    }

    /// Non-dimension coordinates that can be laid out along `var`'s dimensions.
    ///
    /// Every coordinate of the variable's group and of its ancestors applies,
    /// whether or not `var` names it. The own group comes first, each group in
    /// storage order; a nearer coordinate shadows an ancestor's of the same name.
    pub fn auxiliary_coordinates(&self, var: &ArrayVariable) -> Vec<&ArrayVariable> {
        let mut found: Vec<&ArrayVariable> = Vec::new();
        for group in self.lineage(&var.group_path) {
            for candidate in &group.variables {
                if candidate.is_dimension_coordinate() || !group.is_coordinate(candidate) {
                    continue;
                }
                if !candidate.dimensions.iter().all(|d| var.dimensions.contains(d)) {
                    continue;
                }
                if found.iter().any(|c| c.name == candidate.name) {
                    continue;
                }
                found.push(candidate);
            }
        }
        found
    }

    /// Every variable of every group, in traversal order
    pub fn variables(&self) -> impl Iterator<Item = &ArrayVariable> {
        self.groups.iter().flat_map(|g| g.variables.iter())
    }
}
