//! Metadata summaries packaged next to the CSV files
//!
//! A [`MetadataRecord`] accumulates one [`GroupSummary`] per exported file plus
//! the attribute listings of the dataset and its groups. Both readme documents
//! are rendered from that single record so they always agree.

use crate::dataset::{Attributes, DatasetTree};
use crate::errors::Result;
use crate::export::format::format_attribute;
use crate::export::GroupView;
use serde::Serialize;
use serde_json::{Map, Value};

/// Name of the narrative document inside the archive
pub const README_MARKDOWN: &str = "Readme.md";

/// Name of the structured document inside the archive
pub const README_JSON: &str = "Readme.json";

const NOTICE: &str = "The Readme.md file includes the same information";

/// Description of one exported CSV file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupSummary {
    pub filename: String,
    pub dimensions: Vec<String>,
    /// Every coordinate of the group, dimension coordinates included
    pub coordinates: Vec<String>,
    pub variables: Vec<String>,
}

impl GroupSummary {
    pub fn from_view(filename: &str, view: &GroupView<'_>) -> Self {
        Self {
            filename: filename.to_string(),
            dimensions: view.signature().dimensions().to_vec(),
            coordinates: view.coordinate_names(),
            variables: view.variable_ids(),
        }
    }

    /// Coordinates that are not also dimension keys
    pub fn non_dimension_coordinates(&self) -> Vec<&str> {
        self.coordinates
            .iter()
            .filter(|c| !self.dimensions.contains(c))
            .map(String::as_str)
            .collect()
    }
}

/// Attribute listing sorted by key, values rendered as text
pub type AttributeListing = Vec<(String, String)>;

/// Everything the readme documents describe
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataRecord {
    source_name: String,
    groups: Vec<GroupSummary>,
    dataset_attributes: AttributeListing,
    group_attributes: Vec<(String, AttributeListing)>,
}

impl MetadataRecord {
    pub fn new(source_name: &str) -> Self {
        Self {
            source_name: source_name.to_string(),
            ..Self::default()
        }
    }

    pub fn record_group(&mut self, summary: GroupSummary) {
        self.groups.push(summary);
    }

    /// Captures the dataset attributes and those of every non-root group that has any
    pub fn record_attributes(&mut self, tree: &DatasetTree) {
        self.dataset_attributes = sorted_listing(&tree.root().attributes);
        self.group_attributes = tree
            .groups()
            .filter(|g| !g.is_root() && !g.attributes.is_empty())
            .map(|g| (g.path.clone(), sorted_listing(&g.attributes)))
            .collect();
    }

    pub fn groups(&self) -> &[GroupSummary] {
        &self.groups
    }

    pub fn dataset_attributes(&self) -> &AttributeListing {
        &self.dataset_attributes
    }

    pub fn group_attributes(&self) -> &[(String, AttributeListing)] {
        &self.group_attributes
    }

    /// Renders `Readme.md`
    pub fn render_markdown(&self) -> String {
        let header = format!(
            "# {} CSV files created for {} based on dimensional schemas\n\n",
            self.groups.len(),
            self.source_name
        );

        let mut data = String::new();
        for group in &self.groups {
            data.push_str(&format!("## {}\n", group.filename));
            data.push_str("\tdimensions:");
            if !group.dimensions.is_empty() {
                data.push_str(&format!("  {}", group.dimensions.join(", ")));
            }
            data.push_str("\n\tnon-dimension coordinates:");
            let coords = group.non_dimension_coordinates();
            if !coords.is_empty() {
                data.push_str(&format!("  {}", coords.join(", ")));
            }
            data.push_str(&format!("\n\t{} variables:\n", group.variables.len()));
            if !group.variables.is_empty() {
                data.push_str(&format!("\t\t{}\n\n", group.variables.join("\n\t\t")));
            }
        }

        let mut dataset_attrs = format!("# {} Global Attributes:\n\t", self.source_name);
        dataset_attrs.push_str(&markdown_lines(&self.dataset_attributes));

        let mut group_attrs = String::new();
        for (path, listing) in &self.group_attributes {
            group_attrs.push_str(&format!("\n# Group {} Attributes:\n\t", path));
            group_attrs.push_str(&markdown_lines(listing));
        }

        format!("{}\n{}\n{}\n{}", header, data, dataset_attrs, group_attrs)
    }

    /// Structured form of the record, in document order
    pub fn json_value(&self) -> Value {
        let mut root = Map::new();
        root.insert("Notice".to_string(), Value::String(NOTICE.to_string()));

        for group in &self.groups {
            let mut entry = Map::new();
            entry.insert(
                "dimensions".to_string(),
                Value::String(group.dimensions.join(",")),
            );
            entry.insert(
                "non-dimensional coordinates".to_string(),
                Value::String(group.non_dimension_coordinates().join(",")),
            );
            entry.insert(
                "variables".to_string(),
                Value::Array(group.variables.iter().cloned().map(Value::String).collect()),
            );
            root.insert(group.filename.clone(), Value::Object(entry));
        }

        root.insert(
            format!("{} Global Attributes:", self.source_name),
            json_listing(&self.dataset_attributes),
        );
        for (path, listing) in &self.group_attributes {
            root.insert(format!("Group {} Attributes:", path), json_listing(listing));
        }

        Value::Object(root)
    }

    /// Renders `Readme.json` with four-space indentation
    pub fn render_json(&self) -> Result<String> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.json_value().serialize(&mut serializer)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

fn sorted_listing(attributes: &Attributes) -> AttributeListing {
    let mut listing: AttributeListing = attributes
        .iter()
        .map(|(key, value)| (key.clone(), format_attribute(value)))
        .collect();
    listing.sort_by(|a, b| a.0.cmp(&b.0));
    listing
}

fn markdown_lines(listing: &AttributeListing) -> String {
    listing
        .iter()
        .map(|(key, value)| format!("\t{}: {}", key, remove_blank_lines(value)))
        .collect::<Vec<_>>()
        .join("\n\t")
}

fn json_listing(listing: &AttributeListing) -> Value {
    Value::Object(
        listing
            .iter()
            .map(|(key, value)| (key.clone(), Value::String(value.clone())))
            .collect(),
    )
}

/// Drops blank lines and joins the rest with a tab-indented line break
pub fn remove_blank_lines(text: &str) -> String {
    text.split(['\n', '\r'])
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n\t\t")
}
