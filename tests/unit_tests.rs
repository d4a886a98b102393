//! Unit tests for casper modules
//!
//! Datasets are built in memory with `MemoryDataset`, so these tests exercise
//! classification, the outer join, streaming and the readme documents without
//! touching NetCDF files.

use casper::{
    archive::ArchiveWriter,
    conventions::TimeUnits,
    data_source::{DataReader, MemoryDataset},
    dataset::{ArrayVariable, AttrValue, Cell, DatasetTree, GroupNode, ValueKind},
    errors::CasperError,
    export::{format::format_f32, format::format_f64, format_attribute, format_cell, materialize, CsvStreamer},
    file_ops::{archive_name, dataset_is_empty, valid_input_file, valid_workable_file},
    metadata::{remove_blank_lines, GroupSummary, MetadataRecord},
    parallel::ParallelConfig,
    schema::{classify, Signature},
    Converter,
};
use chrono::NaiveDate;
use log::{Level, Log, Metadata, Record};
use std::io::{Cursor, Read};
use std::sync::Mutex;
use tempfile::tempdir;

/// Logger keeping every record for inspection
#[derive(Default)]
struct CaptureLogger {
    records: Mutex<Vec<(Level, String)>>,
    locations: Mutex<Vec<(String, u32)>>,
}

impl CaptureLogger {
    fn messages(&self, level: Level) -> Vec<String> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m.clone())
            .collect()
    }

    fn locations(&self) -> Vec<(String, u32)> {
        self.locations.lock().unwrap().clone()
    }
}

impl Log for CaptureLogger {
    fn enabled(&self, _: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        self.records
            .lock()
            .unwrap()
            .push((record.level(), record.args().to_string()));
        self.locations.lock().unwrap().push((
            record.file().unwrap_or_default().to_string(),
            record.line().unwrap_or_default(),
        ));
    }

    fn flush(&self) {}
}

/// time(3) and wavelength(2) with coordinates, an auxiliary `lat`, and a group with attributes
fn sample_dataset() -> MemoryDataset {
    let mut ds = MemoryDataset::new("sample.nc");
    ds.add_dimension("/", "time", 3)
        .unwrap()
        .add_dimension("/", "wavelength", 2)
        .unwrap()
        .set_attribute("/", "title", "Sample")
        .unwrap()
        .set_attribute("/", "history", "line one\n\nline two")
        .unwrap();

    ds.add_variable("/", "time", &["time"], vec![0.0, 1.0, 2.0])
        .unwrap();
    ds.add_variable("/", "wavelength", &["wavelength"], vec![400.0, 500.0])
        .unwrap();
    ds.add_variable("/", "temp", &["time"], vec![1.5, 2.5, 3.5])
        .unwrap()
        .set_attribute("coordinates", "lat");
    ds.add_variable("/", "lat", &["time"], vec![10.0, 20.0, 30.0])
        .unwrap();
    ds.add_variable(
        "/",
        "radiance",
        &["time", "wavelength"],
        vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
    )
    .unwrap();
    ds.add_variable("/", "pressure", &["time"], vec![100i64, 200, 300])
        .unwrap();

    ds.add_group("/meta")
        .unwrap()
        .set_attribute("/meta", "source", "lab")
        .unwrap();
    ds
}

fn stream_group(ds: &MemoryDataset, index: usize, streamer: CsvStreamer) -> String {
    let groups = classify(ds.tree()).unwrap();
    let view = materialize(ds, &groups[index]).unwrap();
    let mut out = Vec::new();
    streamer.stream(&view, ds, &mut out).unwrap();
    String::from_utf8(out).unwrap()
}

#[test]
fn test_classify_groups_in_discovery_order() {
    let ds = sample_dataset();
    let groups = classify(ds.tree()).unwrap();

    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0].signature, Signature::new(vec!["time".to_string()]));
    assert_eq!(groups[0].variable_ids(), vec!["/temp", "/pressure"]);
    assert_eq!(groups[1].signature.to_string(), "(time, wavelength)");
    assert_eq!(groups[1].variable_ids(), vec!["/radiance"]);
}

#[test]
fn test_classify_skips_coordinate_only_groups() {
    let mut ds = MemoryDataset::new("coords.nc");
    ds.add_group("/geo").unwrap();
    ds.add_dimension("/geo", "lat", 2).unwrap();
    ds.add_variable("/geo", "lat", &["lat"], vec![-10.0, 10.0])
        .unwrap();
    ds.add_dimension("/", "x", 1).unwrap();
    ds.add_variable("/", "v", &["x"], vec![7i64]).unwrap();

    let groups = classify(ds.tree()).unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].variable_ids(), vec!["/v"]);
}

#[test]
fn test_classify_rejects_rank_mismatch() {
    let mut root = GroupNode::new("/");
    root.variables.push(ArrayVariable::new(
        "/",
        "bad",
        vec!["x".to_string()],
        vec![],
        ValueKind::Float64,
    ));
    let tree = DatasetTree::from_groups(vec![root]).unwrap();

    let err = classify(&tree).unwrap_err();
    assert!(matches!(err, CasperError::Schema(_)));
}

#[test]
fn test_tree_requires_root_first() {
    let result = DatasetTree::from_groups(vec![GroupNode::new("/child")]);
    assert!(result.is_err());

    let result = DatasetTree::from_groups(vec![GroupNode::new("/"), GroupNode::new("/a"), GroupNode::new("/a")]);
    assert!(result.is_err());
}

#[test]
fn test_column_order_with_auxiliary_coordinate() {
    let ds = sample_dataset();
    let groups = classify(ds.tree()).unwrap();
    let view = materialize(&ds, &groups[0]).unwrap();

    assert_eq!(view.header(), vec!["time", "lat", "/temp", "/pressure"]);
    assert_eq!(view.coordinate_names(), vec!["time", "lat"]);
    assert_eq!(view.primary_dimension(), Some("time"));
    assert_eq!(view.primary_len(), 3);

    let csv = stream_group(&ds, 0, CsvStreamer::default());
    assert_eq!(
        csv,
        "time,lat,/temp,/pressure\n\
         0.0,10.0,1.5,100\n\
         1.0,20.0,2.5,200\n\
         2.0,30.0,3.5,300\n"
    );
}

#[test]
fn test_two_dimensional_group_rows_in_c_order() {
    let ds = sample_dataset();
    let csv = stream_group(&ds, 1, CsvStreamer::default());
    assert_eq!(
        csv,
        "time,wavelength,lat,/radiance\n\
         0.0,400.0,10.0,1.0\n\
         0.0,500.0,10.0,2.0\n\
         1.0,400.0,20.0,3.0\n\
         1.0,500.0,20.0,4.0\n\
         2.0,400.0,30.0,5.0\n\
         2.0,500.0,30.0,6.0\n"
    );
}

#[test]
fn test_group_coordinates_attach_without_coordinates_attribute() {
    let mut ds = MemoryDataset::new("siblings.nc");
    ds.add_dimension("/", "t", 2)
        .unwrap()
        .add_dimension("/", "y", 2)
        .unwrap();
    ds.add_variable("/", "t", &["t"], vec![0i64, 1]).unwrap();
    ds.add_variable("/", "lat", &["y"], vec![10.0, 20.0]).unwrap();
    ds.add_variable("/", "a", &["y"], vec![1i64, 2])
        .unwrap()
        .set_attribute("coordinates", "lat");
    ds.add_variable("/", "b", &["t", "y"], vec![1i64, 2, 3, 4])
        .unwrap();
    ds.add_group("/sub").unwrap();
    ds.add_variable("/sub", "c", &["y"], vec![5i64, 6]).unwrap();

    let groups = classify(ds.tree()).unwrap();
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0].variable_ids(), vec!["/a", "/sub/c"]);

    // lat is inherited by the child group's variable too
    let view = materialize(&ds, &groups[0]).unwrap();
    assert_eq!(view.header(), vec!["y", "lat", "/a", "/sub/c"]);

    let view = materialize(&ds, &groups[1]).unwrap();
    assert_eq!(view.header(), vec!["t", "y", "lat", "/b"]);
    let summary = GroupSummary::from_view("siblings-1.csv", &view);
    assert_eq!(summary.non_dimension_coordinates(), vec!["lat"]);

    assert_eq!(
        stream_group(&ds, 1, CsvStreamer::default()),
        "t,y,lat,/b\n0,0,10.0,1\n0,1,20.0,2\n1,0,10.0,3\n1,1,20.0,4\n"
    );
}

#[test]
fn test_shared_coordinates_keep_first_seen_order() {
    let mut ds = MemoryDataset::new("shared.nc");
    for group in ["/p", "/q"] {
        ds.add_group(group).unwrap();
        ds.add_dimension(group, "x", 2).unwrap();
        ds.add_variable(group, "x", &["x"], vec![0i64, 1]).unwrap();
    }
    ds.add_variable("/p", "lat", &["x"], vec![1.0, 2.0]).unwrap();
    ds.add_variable("/p", "lon", &["x"], vec![3.0, 4.0]).unwrap();
    ds.add_variable("/p", "a", &["x"], vec![10i64, 20])
        .unwrap()
        .set_attribute("coordinates", "lat lon");
    ds.add_variable("/q", "lon", &["x"], vec![3.0, 4.0]).unwrap();
    ds.add_variable("/q", "alt", &["x"], vec![5.0, 6.0]).unwrap();
    ds.add_variable("/q", "b", &["x"], vec![30i64, 40])
        .unwrap()
        .set_attribute("coordinates", "lon alt");

    let groups = classify(ds.tree()).unwrap();
    assert_eq!(groups.len(), 1);

    let view = materialize(&ds, &groups[0]).unwrap();
    assert_eq!(view.header(), vec!["x", "lat", "lon", "alt", "/p/a", "/q/b"]);
    assert_eq!(view.auxiliary_coordinate_names(), vec!["lat", "lon", "alt"]);
    assert_eq!(
        stream_group(&ds, 0, CsvStreamer::default()),
        "x,lat,lon,alt,/p/a,/q/b\n0,1.0,3.0,5.0,10,30\n1,2.0,4.0,6.0,20,40\n"
    );
}

#[test]
fn test_outer_join_of_misaligned_coordinates() {
    let mut ds = MemoryDataset::new("join.nc");
    for group in ["/a", "/b"] {
        ds.add_group(group).unwrap();
        ds.add_dimension(group, "x", 3).unwrap();
    }
    ds.add_variable("/a", "x", &["x"], vec![1i64, 2, 3]).unwrap();
    ds.add_variable("/a", "v", &["x"], vec![10i64, 20, 30]).unwrap();
    ds.add_variable("/b", "x", &["x"], vec![2i64, 3, 4]).unwrap();
    ds.add_variable("/b", "w", &["x"], vec![200i64, 300, 400]).unwrap();

    let groups = classify(ds.tree()).unwrap();
    assert_eq!(groups.len(), 1);

    let view = materialize(&ds, &groups[0]).unwrap();
    let labels: Vec<Cell> = view.axes()[0].labels.clone();
    assert_eq!(
        labels,
        vec![Cell::Int(1), Cell::Int(2), Cell::Int(3), Cell::Int(4)]
    );

    let csv = stream_group(&ds, 0, CsvStreamer::default());
    assert_eq!(csv, "x,/a/v,/b/w\n1,10,\n2,20,200\n3,30,300\n4,,400\n");
}

#[test]
fn test_rows_without_data_are_dropped() {
    let mut ds = MemoryDataset::new("gaps.nc");
    ds.add_dimension("/", "time", 4).unwrap();
    ds.add_variable("/", "time", &["time"], vec![0i64, 1, 2, 3])
        .unwrap();
    ds.add_variable(
        "/",
        "a",
        &["time"],
        vec![
            Cell::Float64(1.0),
            Cell::Float64(f64::NAN),
            Cell::Float64(-999.0),
            Cell::Missing,
        ],
    )
    .unwrap()
    .set_attribute("_FillValue", -999.0);
    ds.add_variable(
        "/",
        "b",
        &["time"],
        vec![Cell::Missing, Cell::Missing, Cell::Missing, Cell::Float64(5.0)],
    )
    .unwrap();

    let groups = classify(ds.tree()).unwrap();
    let view = materialize(&ds, &groups[0]).unwrap();
    let mut out = Vec::new();
    let stats = CsvStreamer::new(3).stream(&view, &ds, &mut out).unwrap();

    assert_eq!(String::from_utf8(out).unwrap(), "time,/a,/b\n0,1.0,\n3,,5.0\n");
    assert_eq!(stats.windows, 2);
    assert_eq!(stats.rows_written, 2);
    assert_eq!(stats.rows_dropped, 2);
}

#[test]
fn test_chunked_output_matches_single_pass() {
    let ds = sample_dataset();
    for index in 0..2 {
        let whole = stream_group(&ds, index, CsvStreamer::default());
        let chunked = stream_group(&ds, index, CsvStreamer::new(1));
        assert_eq!(whole, chunked);
        assert_eq!(whole.matches("time").count(), 1, "header written once");
    }
}

#[test]
fn test_streamer_windows_partition_axis() {
    let streamer = CsvStreamer::new(4);
    let windows: Vec<(usize, usize)> = streamer.windows(10).collect();
    assert_eq!(windows, vec![(0, 4), (4, 8), (8, 10)]);
    assert_eq!(CsvStreamer::new(0).chunk_size(), 1);
    assert_eq!(CsvStreamer::default().chunk_size(), 1000);
}

#[test]
fn test_zero_length_axis_writes_header_only() {
    let mut ds = MemoryDataset::new("empty.nc");
    ds.add_dimension("/", "obs", 0).unwrap();
    ds.add_variable("/", "v", &["obs"], Vec::<f64>::new())
        .unwrap();

    assert_eq!(stream_group(&ds, 0, CsvStreamer::default()), "obs,/v\n");
}

#[test]
fn test_scalar_signature_gives_single_row() {
    let mut ds = MemoryDataset::new("scalar.nc");
    ds.add_variable("/", "answer", &[], vec![42i64]).unwrap();

    let groups = classify(ds.tree()).unwrap();
    assert!(groups[0].signature.is_scalar());
    assert_eq!(stream_group(&ds, 0, CsvStreamer::default()), "/answer\n42\n");
}

#[test]
fn test_time_coordinates_are_decoded() {
    let mut ds = MemoryDataset::new("times.nc");
    ds.add_dimension("/", "time", 2).unwrap();
    ds.add_variable("/", "time", &["time"], vec![0.0, 1.5])
        .unwrap()
        .set_attribute("units", "days since 2000-01-01 00:00:00");
    ds.add_variable("/", "v", &["time"], vec![1i64, 2]).unwrap();

    let time = ds.tree().root().variable("time").unwrap().clone();
    let cells = ds.read_all(&time).unwrap();
    let expected = NaiveDate::from_ymd_opt(2000, 1, 2)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap();
    assert_eq!(cells[1], Cell::Time(expected));

    assert_eq!(
        stream_group(&ds, 0, CsvStreamer::default()),
        "time,/v\n2000-01-01 00:00:00,1\n2000-01-02 12:00:00,2\n"
    );
}

#[test]
fn test_packed_values_are_unpacked() {
    let mut ds = MemoryDataset::new("packed.nc");
    ds.add_dimension("/", "x", 2).unwrap();
    ds.add_variable("/", "v", &["x"], vec![10i64, -1])
        .unwrap()
        .set_attribute("scale_factor", 0.5)
        .set_attribute("add_offset", 1.0)
        .set_attribute("missing_value", -1i64);

    let var = ds.tree().root().variable("v").unwrap().clone();
    assert_eq!(
        ds.read_all(&var).unwrap(),
        vec![Cell::Float64(6.0), Cell::Missing]
    );
}

#[test]
fn test_time_units_parsing() {
    assert!(TimeUnits::parse("hours since 1970-01-01T00:00:00Z").is_some());
    assert!(TimeUnits::parse("seconds since 2020-06-01 12:30").is_some());
    assert!(TimeUnits::parse("K").is_none());
    assert!(TimeUnits::parse("fortnights since 2000-01-01").is_none());
}

fn sample_record() -> MetadataRecord {
    let ds = sample_dataset();
    let mut record = MetadataRecord::new("sample.nc");
    record.record_group(GroupSummary {
        filename: "sample-0.csv".to_string(),
        dimensions: vec!["time".to_string()],
        coordinates: vec!["time".to_string(), "lat".to_string()],
        variables: vec!["/temp".to_string(), "/pressure".to_string()],
    });
    record.record_group(GroupSummary {
        filename: "sample-1.csv".to_string(),
        dimensions: vec!["time".to_string(), "wavelength".to_string()],
        coordinates: vec!["time".to_string(), "wavelength".to_string()],
        variables: vec!["/radiance".to_string()],
    });
    record.record_attributes(ds.tree());
    record
}

#[test]
fn test_markdown_layout() {
    let expected = concat!(
        "# 2 CSV files created for sample.nc based on dimensional schemas\n\n",
        "\n",
        "## sample-0.csv\n",
        "\tdimensions:  time\n",
        "\tnon-dimension coordinates:  lat\n",
        "\t2 variables:\n",
        "\t\t/temp\n",
        "\t\t/pressure\n\n",
        "## sample-1.csv\n",
        "\tdimensions:  time, wavelength\n",
        "\tnon-dimension coordinates:\n",
        "\t1 variables:\n",
        "\t\t/radiance\n\n",
        "\n",
        "# sample.nc Global Attributes:\n",
        "\t\thistory: line one\n",
        "\t\tline two\n",
        "\t\ttitle: Sample\n",
        "\n",
        "# Group /meta Attributes:\n",
        "\t\tsource: lab",
    );
    assert_eq!(sample_record().render_markdown(), expected);
}

#[test]
fn test_json_document_order_and_content() {
    let json = sample_record().render_json().unwrap();
    assert!(json.starts_with("{\n    \"Notice\": "));

    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    let object = value.as_object().unwrap();
    let keys: Vec<&str> = object.keys().map(String::as_str).collect();
    assert_eq!(
        keys,
        vec![
            "Notice",
            "sample-0.csv",
            "sample-1.csv",
            "sample.nc Global Attributes:",
            "Group /meta Attributes:",
        ]
    );

    assert_eq!(object["sample-0.csv"]["dimensions"], "time");
    assert_eq!(object["sample-0.csv"]["non-dimensional coordinates"], "lat");
    assert_eq!(
        object["sample-0.csv"]["variables"],
        serde_json::json!(["/temp", "/pressure"])
    );
    assert_eq!(object["sample-1.csv"]["dimensions"], "time,wavelength");
    assert_eq!(object["sample-1.csv"]["non-dimensional coordinates"], "");
    assert_eq!(
        object["sample.nc Global Attributes:"]["history"],
        "line one\n\nline two"
    );
}

#[test]
fn test_both_documents_list_the_same_attributes() {
    let record = sample_record();
    let markdown = record.render_markdown();
    let value = record.json_value();

    let listed: Vec<&str> = record
        .dataset_attributes()
        .iter()
        .map(|(key, _)| key.as_str())
        .collect();
    assert_eq!(listed, vec!["history", "title"]);

    let json_keys: Vec<&str> = value["sample.nc Global Attributes:"]
        .as_object()
        .unwrap()
        .keys()
        .map(String::as_str)
        .collect();
    assert_eq!(json_keys, listed);

    let positions: Vec<usize> = listed
        .iter()
        .map(|key| markdown.find(&format!("\t\t{}: ", key)).unwrap())
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]));

    for (path, listing) in record.group_attributes() {
        assert!(markdown.contains(&format!("# Group {} Attributes:", path)));
        let json_keys: Vec<&String> = value[format!("Group {} Attributes:", path)]
            .as_object()
            .unwrap()
            .keys()
            .collect();
        let keys: Vec<&String> = listing.iter().map(|(key, _)| key).collect();
        assert_eq!(json_keys, keys);
    }
}

#[test]
fn test_remove_blank_lines() {
    assert_eq!(remove_blank_lines("a\n\n  \nb\r\nc"), "a\n\t\tb\n\t\tc");
    assert_eq!(remove_blank_lines("single"), "single");
    assert_eq!(remove_blank_lines(""), "");
}

#[test]
fn test_value_formatting() {
    assert_eq!(format_f64(1.0), "1.0");
    assert_eq!(format_f64(-2.5), "-2.5");
    assert_eq!(format_f64(0.0001), "0.0001");
    assert_eq!(format_f64(0.00001), "1e-05");
    assert_eq!(format_f64(1e16), "1e+16");
    assert_eq!(format_f64(123456789.0), "123456789.0");
    assert_eq!(format_f64(0.1 + 0.2), "0.30000000000000004");
    assert_eq!(format_f32(0.1), "0.1");
    assert_eq!(format_f64(f64::INFINITY), "inf");

    assert_eq!(format_cell(&Cell::Missing), "");
    assert_eq!(format_cell(&Cell::Float64(f64::NAN)), "");
    assert_eq!(format_cell(&Cell::UInt(7)), "7");
    assert_eq!(format_cell(&Cell::Text("abc".to_string())), "abc");

    // Midnight keeps its time of day
    let midnight = NaiveDate::from_ymd_opt(2021, 3, 4)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    assert_eq!(format_cell(&Cell::Time(midnight)), "2021-03-04 00:00:00");

    assert_eq!(
        format_attribute(&AttrValue::Texts(vec!["a".to_string(), "b".to_string()])),
        "['a', 'b']"
    );
    assert_eq!(format_attribute(&AttrValue::Float64s(vec![1.0, 2.5])), "[1.0 2.5]");
    assert_eq!(format_attribute(&AttrValue::Int(3)), "3");
}

#[test]
fn test_error_types() {
    let err = CasperError::InvalidInput {
        path: "x.txt".to_string(),
        reason: "input file must be a netcdf file".to_string(),
    };
    assert_eq!(
        err.to_string(),
        "Invalid input 'x.txt': input file must be a netcdf file"
    );

    let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
    let archive = CasperError::archive("writing rows", io);
    assert!(archive.is_archive_error());
    assert!(archive.to_string().contains("disk full"));

    let export = CasperError::export("a-0.csv", CasperError::Schema("bad".to_string()));
    assert!(!export.is_archive_error());
    assert!(export.to_string().contains("a-0.csv"));
    assert!(std::error::Error::source(&export).is_some());
}

#[test]
fn test_parallel_config() {
    let default_config = ParallelConfig::default();
    assert!(default_config.num_threads.is_none());
    assert_eq!(ParallelConfig::with_threads(4).num_threads, Some(4));
    assert!(ParallelConfig::all_cores().num_threads.unwrap() > 0);
    assert!(default_config.current_threads() > 0);
    assert!(ParallelConfig::with_threads(0).setup_global_pool().is_err());
}

#[test]
fn test_valid_input_file() {
    let dir = tempdir().unwrap();
    let good = dir.path().join("granule.NC4");
    std::fs::write(&good, b"").unwrap();
    let bad = dir.path().join("notes.txt");
    std::fs::write(&bad, b"").unwrap();

    assert_eq!(valid_input_file(&good).unwrap(), good.canonicalize().unwrap());
    assert!(matches!(
        valid_input_file(&bad),
        Err(CasperError::InvalidInput { .. })
    ));
    assert!(valid_input_file(dir.path()).is_err());
    assert!(valid_input_file(&dir.path().join("missing.nc")).is_err());
    assert!(valid_input_file(std::path::Path::new("")).is_err());
}

#[test]
fn test_archive_name() {
    assert_eq!(archive_name(std::path::Path::new("dir/granule.v2.nc4")), "granule.zip");
    assert_eq!(archive_name(std::path::Path::new("plain")), "plain.zip");
}

#[test]
fn test_dataset_is_empty() {
    let mut ds = MemoryDataset::new("blank.nc");
    ds.add_dimension("/", "x", 2).unwrap();
    ds.add_variable("/", "v", &["x"], vec![f64::NAN, f64::NAN])
        .unwrap();
    assert!(dataset_is_empty(&ds).unwrap());

    ds.add_variable("/", "w", &["x"], vec![Cell::Missing, Cell::Int(1)])
        .unwrap();
    assert!(!dataset_is_empty(&ds).unwrap());
}

#[test]
fn test_archive_rejects_duplicate_entries() {
    let mut archive = ArchiveWriter::new(Cursor::new(Vec::new()));
    archive.write_entry("a.csv", b"x\n").unwrap();
    let err = archive.write_entry("a.csv", b"y\n").unwrap_err();
    assert!(err.is_archive_error());
    assert_eq!(archive.entry_count(), 1);
}

#[test]
fn test_converter_writes_archive() {
    let ds = sample_dataset();
    let dir = tempdir().unwrap();
    let output = dir.path().join("sample.zip");
    let logger = CaptureLogger::default();

    let count = Converter::new(&logger)
        .with_chunk_size(2)
        .convert_source(&ds, &output)
        .unwrap();
    assert_eq!(count, 2);

    let mut zip = zip::ZipArchive::new(std::fs::File::open(&output).unwrap()).unwrap();
    let names: Vec<String> = zip.file_names().map(str::to_string).collect();
    for name in ["sample-0.csv", "sample-1.csv", "Readme.md", "Readme.json"] {
        assert!(names.iter().any(|n| n == name), "missing {}", name);
    }

    let mut csv = String::new();
    zip.by_name("sample-0.csv")
        .unwrap()
        .read_to_string(&mut csv)
        .unwrap();
    assert_eq!(csv, stream_group(&ds, 0, CsvStreamer::default()));

    let mut markdown = String::new();
    zip.by_name("Readme.md")
        .unwrap()
        .read_to_string(&mut markdown)
        .unwrap();
    assert!(markdown.starts_with("# 2 CSV files created for sample.nc"));

    let info = logger.messages(Level::Info);
    assert_eq!(info[0], "Creating 2 CSV files for sample.nc");
    assert!(info.iter().any(|m| m == "sample-1.csv added to zip file"));
    assert!(logger.messages(Level::Error).is_empty());
}

#[test]
fn test_converter_logs_failure_once() {
    let ds = sample_dataset();
    let dir = tempdir().unwrap();
    let output = dir.path().join("missing-dir").join("out.zip");
    let logger = CaptureLogger::default();

    let err = Converter::new(&logger).convert_source(&ds, &output).unwrap_err();
    assert!(err.is_archive_error());

    let errors = logger.messages(Level::Error);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("sample.nc"));
}

#[test]
fn test_log_records_carry_call_site() {
    let ds = sample_dataset();
    let dir = tempdir().unwrap();
    let logger = CaptureLogger::default();
    Converter::new(&logger)
        .convert_source(&ds, &dir.path().join("sample.zip"))
        .unwrap();

    let locations = logger.locations();
    assert!(locations.iter().all(|(file, _)| file.ends_with("convert.rs")));
    let mut lines: Vec<u32> = locations.iter().map(|(_, line)| *line).collect();
    lines.sort_unstable();
    lines.dedup();
    assert!(lines.len() > 2, "records share one location: {:?}", lines);

    let logger = CaptureLogger::default();
    assert!(!valid_workable_file(&dir.path().join("missing.nc"), &logger));
    let locations = logger.locations();
    assert_eq!(locations.len(), 1);
    assert!(locations[0].0.ends_with("file_ops.rs"));
    assert!(locations[0].1 > 0);
}
