//! Config and trace files round-tripped through real paths on disk, rather
//! than the in-memory `&str` the inline unit tests exercise.

use std::io::Write;

use nvsim_core::config::RootConfig;
use nvsim_core::trace;
use pretty_assertions::assert_eq;
use tempfile::NamedTempFile;

fn write_temp(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("tempfile creation must succeed");
    file.write_all(contents.as_bytes()).expect("tempfile write must succeed");
    file.flush().expect("tempfile flush must succeed");
    file
}

#[test]
fn config_load_from_path_matches_parse_from_text() {
    let text = "\
[imc]
wpq_entries: 4
rpq_entries: 8
adr_epoch: 100
";
    let file = write_temp(text);

    let from_path = RootConfig::load(file.path()).expect("loading a real config path must succeed");
    let from_text = RootConfig::parse(text).expect("parsing the same text must succeed");

    let path_section = from_path.section("imc").unwrap();
    let text_section = from_text.section("imc").unwrap();
    assert_eq!(path_section.get_u64("wpq_entries").unwrap(), text_section.get_u64("wpq_entries").unwrap());
    assert_eq!(path_section.get_u64("rpq_entries").unwrap(), text_section.get_u64("rpq_entries").unwrap());
    assert_eq!(path_section.get_u64("adr_epoch").unwrap(), text_section.get_u64("adr_epoch").unwrap());
}

#[test]
fn config_load_missing_path_is_an_io_error() {
    let result = RootConfig::load("/nonexistent/path/to/nvsim.cfg");
    assert!(result.is_err());
}

#[test]
fn trace_load_from_path_matches_parse_from_text() {
    let text = "0x0 W\n0x40 R\n0x80 C:3\n";
    let file = write_temp(text);

    let from_path = trace::load(file.path()).expect("loading a real trace path must succeed");
    let from_text = trace::parse(text).expect("parsing the same text must succeed");

    assert_eq!(from_path, from_text);
}

#[test]
fn trace_load_rejects_unaligned_addresses_the_same_as_parse() {
    let text = "0x4 W\n"; // not 64-byte aligned
    let file = write_temp(text);

    let from_path = trace::load(file.path());
    let from_text = trace::parse(text);

    assert_eq!(from_path.is_err(), from_text.is_err());
    assert!(from_path.is_err());
}
