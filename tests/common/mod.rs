// Shared test helpers for integration tests
#![allow(dead_code)]

use std::cell::RefCell;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tempfile::{tempdir, TempDir};
use testitem_runner::infra::uri::path_to_uri;
use testitem_runner::models::TestItemRequest;

/// Package `Foo`: exports `double`, keeps `Test` as a test-only extra.
pub const FOO_MANIFEST: &str = r#"name = "Foo"

[deps]

[extras]
Test = "@stdlib"

[targets]
test = ["Test"]
"#;

pub const FOO_SOURCE: &str = r#"export double, greet

double(x) = 2 * x

function greet(name)
    return "Hello, " * name
end
"#;

/// Creates a temp dir whose path is canonical, so URIs built from it round-trip.
pub fn canonical_tempdir() -> (TempDir, PathBuf) {
    let temp_dir = tempdir().expect("Failed to create temporary directory");
    let root = dunce::canonicalize(temp_dir.path()).expect("Failed to canonicalize temporary directory");
    (temp_dir, root)
}

/// Writes `<dir>/Project.toml` and, when `source` is given, `<dir>/src/<name>.ti`.
pub fn write_package(dir: &Path, name: &str, manifest: &str, source: Option<&str>) -> PathBuf {
    fs::create_dir_all(dir.join("src")).expect("Failed to create src directory");
    fs::write(dir.join("Project.toml"), manifest).expect("Failed to write Project.toml");
    if let Some(source) = source {
        fs::write(dir.join("src").join(format!("{name}.ti")), source)
            .expect("Failed to write package source");
    }
    dir.to_path_buf()
}

/// A project directory that is itself package `Foo`, with `Test` as a test extra.
pub fn setup_foo_project() -> (TempDir, PathBuf) {
    let (temp_dir, root) = canonical_tempdir();
    let project = write_package(&root.join("Foo"), "Foo", FOO_MANIFEST, Some(FOO_SOURCE));
    (temp_dir, project)
}

/// The `file://` URI of `<project>/test/runtests.ti`. The file itself is created.
pub fn test_file_uri(project: &Path) -> String {
    let test_dir = project.join("test");
    fs::create_dir_all(&test_dir).expect("Failed to create test directory");
    let file = test_dir.join("runtests.ti");
    fs::write(&file, "# test items live here\n").expect("Failed to write test file");
    path_to_uri(&file.to_string_lossy()).expect("Test file path must be absolute")
}

/// A request with the scenario defaults: line 5, column 4, default usings on.
pub fn request(uri: &str, project: &Path, package: &str, code: &str) -> TestItemRequest {
    TestItemRequest {
        uri: uri.to_string(),
        name: "t1".to_string(),
        package_name: package.to_string(),
        use_default_usings: true,
        line: 5,
        column: 4,
        code: code.to_string(),
        project_path: project.to_string_lossy().into_owned(),
        package_path: String::new(),
    }
}

/// A `Write` that keeps everything written to it, shareable with the interpreter.
#[derive(Clone, Default)]
pub struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Compares two file URIs by the path they map to. Drive-letter case differs
/// between a URI built from a path and one built from a mapped-back path.
pub fn assert_same_file(actual: &str, expected: &str) {
    let actual_path = testitem_runner::infra::uri_to_path(actual).expect("actual URI must map to a path");
    let expected_path = testitem_runner::infra::uri_to_path(expected).expect("expected URI must map to a path");
    assert_eq!(
        actual_path.to_string_lossy().to_lowercase(),
        expected_path.to_string_lossy().to_lowercase(),
        "{actual} and {expected} name different files"
    );
}
