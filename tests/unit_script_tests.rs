mod common;

use common::SharedBuffer;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::rc::Rc;
use testitem_runner::script::error::TOP_LEVEL_FRAME;
use testitem_runner::script::{
    BuiltinModule, BuiltinsOnly, ErrorIntrospection, ErrorKind, FinishError, Interpreter,
    PackageLoader, PackageSource, Value,
};

/// Resolves packages from a fixed name -> entry file table, plus the built-in `Test`.
struct MapLoader(HashMap<String, PathBuf>);

impl PackageLoader for MapLoader {
    fn locate(&self, name: &str) -> Option<PackageSource> {
        if let Some(module) = BuiltinModule::from_name(name) {
            return Some(PackageSource::Builtin(module));
        }
        self.0.get(name).cloned().map(PackageSource::File)
    }
}

fn interpreter() -> Interpreter {
    Interpreter::new(Rc::new(BuiltinsOnly), Box::new(io::sink()))
}

fn eval(code: &str) -> Result<Value, testitem_runner::script::ScriptError> {
    let mut interp = interpreter();
    let ns = interp.fresh_namespace();
    interp.eval_string(&ns, code)
}

#[test]
fn arithmetic_follows_numeric_promotion() {
    assert_eq!(eval("1 + 2 * 3").unwrap(), Value::Int(7));
    assert_eq!(eval("7 / 2").unwrap(), Value::Float(3.5));
    assert_eq!(eval("7 % 3").unwrap(), Value::Int(1));
    assert_eq!(eval("1 + 0.5").unwrap(), Value::Float(1.5));
    assert_eq!(eval("\"ab\" * \"cd\"").unwrap(), Value::str("abcd"));
    assert_eq!(eval("-(2 - 5)").unwrap(), Value::Int(3));
}

#[test]
fn control_flow_and_collections() {
    let code = r#"
total = 0
for i in 1:10
    if i % 2 == 0
        total = total + i
    elseif i == 5
        total = total + 100
    else
        total = total + 0
    end
end
xs = [10, 20, 30]
n = 0
while n < length(xs)
    n = n + 1
end
total + xs[2] + n
"#;
    assert_eq!(eval(code).unwrap(), Value::Int(30 + 100 + 20 + 3));
}

#[test]
fn builtins_cover_common_helpers() {
    assert_eq!(eval("sum([1, 2, 3])").unwrap(), Value::Int(6));
    assert_eq!(eval("sum(1:4)").unwrap(), Value::Int(10));
    assert_eq!(eval("max(3, 9, 2)").unwrap(), Value::Int(9));
    assert_eq!(eval("min(3, 1.5)").unwrap(), Value::Float(1.5));
    assert_eq!(eval("abs(-4)").unwrap(), Value::Int(4));
    assert_eq!(eval("string(\"x = \", 1)").unwrap(), Value::str("x = 1"));
    assert_eq!(eval("typeof(2.0)").unwrap(), Value::str("Float64"));
    assert_eq!(eval("isempty([])").unwrap(), Value::Bool(true));
    assert_eq!(eval("isapprox(0.1 + 0.2, 0.3)").unwrap(), Value::Bool(true));
    assert_eq!(eval("collect(1:3) == [1, 2, 3]").unwrap(), Value::Bool(true));
}

#[test]
fn println_goes_to_the_output_sink() {
    let buffer = SharedBuffer::default();
    let mut interp = Interpreter::new(Rc::new(BuiltinsOnly), Box::new(buffer.clone()));
    let ns = interp.fresh_namespace();
    interp
        .eval_string(&ns, "println(\"hello \", 42)\nprint(1.0)")
        .unwrap();
    assert_eq!(buffer.contents(), "hello 42\n1.0");
}

#[test]
fn runtime_errors_carry_their_kind() {
    assert_eq!(
        eval("undefined_thing + 1").unwrap_err().kind,
        ErrorKind::UndefVar("undefined_thing".to_string())
    );
    assert_eq!(eval("1 % 0").unwrap_err().kind, ErrorKind::DivideByZero);
    assert!(matches!(
        eval("[1, 2][5]").unwrap_err().kind,
        ErrorKind::Bounds { len: 2, index: 5, .. }
    ));
    assert!(matches!(eval("1 + \"a\"").unwrap_err().kind, ErrorKind::Method(_)));
    assert!(matches!(eval("if 1\nend").unwrap_err().kind, ErrorKind::Type(_)));
    assert_eq!(
        eval("error(\"boom \", 3)").unwrap_err().kind,
        ErrorKind::User("boom 3".to_string())
    );
}

#[test]
fn huge_ranges_are_handled_arithmetically() {
    assert_eq!(eval("length(1:9223372036854775807)").unwrap(), Value::Int(i64::MAX));
    assert_eq!(eval("length(5:1)").unwrap(), Value::Int(0));
    assert!(matches!(
        eval("length(-9223372036854775807:9223372036854775807)").unwrap_err().kind,
        ErrorKind::Overflow(_)
    ));
    assert_eq!(eval("isempty(1:9223372036854775807)").unwrap(), Value::Bool(false));
    assert_eq!(eval("sum(1:100)").unwrap(), Value::Int(5050));
    assert_eq!(eval("sum(-3:3)").unwrap(), Value::Int(0));
    assert_eq!(eval("sum(1:0)").unwrap(), Value::Int(0));

    let code = "x = 1:9223372036854775807\nx[1] == 1 && x[9223372036854775807] == 9223372036854775807";
    assert_eq!(eval(code).unwrap(), Value::Bool(true));
    assert!(matches!(
        eval("(10:12)[4]").unwrap_err().kind,
        ErrorKind::Bounds { container: "UnitRange", len: 3, index: 4 }
    ));
    assert!(matches!(
        eval("collect(1:9223372036854775807)").unwrap_err().kind,
        ErrorKind::OutOfMemory(_)
    ));
    assert_eq!(eval("length(collect(1:4))").unwrap(), Value::Int(4));
}

#[test]
fn ranges_iterate_and_compare_lazily() {
    let code = r#"
function first_at_least(r, n)
    for i in r
        if i >= n
            return i
        end
    end
    return 0
end
first_at_least(1:9223372036854775807, 3)
"#;
    assert_eq!(eval(code).unwrap(), Value::Int(3));
    assert_eq!(eval("1:3 == [1, 2, 3]").unwrap(), Value::Bool(true));
    assert_eq!(eval("[1, 2, 3] == 1:3").unwrap(), Value::Bool(true));
    assert_eq!(eval("1:3 == [1, 2]").unwrap(), Value::Bool(false));
    assert_eq!(eval("1:9223372036854775807 == [1, 2]").unwrap(), Value::Bool(false));
}

#[test]
fn strings_index_by_character() {
    assert_eq!(eval("\"héllo\"[2]").unwrap(), Value::str("é"));
    assert_eq!(eval("length(\"héllo\")").unwrap(), Value::Int(5));
    assert!(matches!(
        eval("\"héllo\"[6]").unwrap_err().kind,
        ErrorKind::Bounds { container: "String", len: 5, index: 6 }
    ));
}

#[test]
fn deep_nesting_is_a_syntax_error() {
    let depth = 200_000;
    let code = format!("{}1{} == 1", "(".repeat(depth), ")".repeat(depth));
    assert!(matches!(eval(&code).unwrap_err().kind, ErrorKind::Syntax(_)));
    let code = format!("{}1", "-".repeat(depth));
    assert!(matches!(eval(&code).unwrap_err().kind, ErrorKind::Syntax(_)));
}

#[test]
fn moderate_nesting_evaluates() {
    let depth = 500;
    let code = format!("{}1{} == 1", "(".repeat(depth), ")".repeat(depth));
    assert_eq!(eval(&code).unwrap(), Value::Bool(true));
    let sum = vec!["1"; 2_000].join(" + ");
    assert_eq!(eval(&sum).unwrap(), Value::Int(2_000));
}

#[test]
fn syntax_errors_are_load_time_errors_with_their_own_line() {
    let mut interp = interpreter();
    let ns = interp.fresh_namespace();
    let mut scoped = interp.scoped_source_path(Some(PathBuf::from("/src/t.ti")));
    let err = scoped
        .eval_string(&ns, "x = 1\n\nfunction f()\n  x\n")
        .unwrap_err();
    assert!(matches!(err.kind, ErrorKind::Syntax(_)));
    let site = err.load_site().expect("syntax errors record their site");
    assert_eq!(site.line, 3);
    assert_eq!(PathBuf::from(&site.file), PathBuf::from("/src/t.ti"));
    assert_eq!(err.origin(), site);
}

#[test]
fn render_includes_message_and_stacktrace() {
    let mut interp = interpreter();
    let ns = interp.fresh_namespace();
    let mut scoped = interp.scoped_source_path(Some(PathBuf::from("/src/t.ti")));
    let err = scoped
        .eval_string(&ns, "function inner()\n  error(\"deep\")\nend\nouter() = inner()\nouter()")
        .unwrap_err();
    let rendered = err.render();
    assert!(rendered.starts_with("deep\nStacktrace:"), "{rendered}");
    assert!(rendered.contains(" [1] inner\n"), "{rendered}");
    assert!(rendered.contains(" [2] outer\n"), "{rendered}");
    assert!(rendered.contains(&format!(" [3] {TOP_LEVEL_FRAME}\n")), "{rendered}");

    let first = err.first_frame().unwrap();
    assert_eq!(first.line, 2);
}

#[test]
fn test_macros_require_using_test() {
    let err = eval("@test 1 == 1").unwrap_err();
    assert_eq!(err.kind, ErrorKind::UndefVar("@test".to_string()));
}

#[test]
fn unknown_macros_fail_to_parse() {
    let err = eval("@nosuchmacro 1").unwrap_err();
    assert_eq!(err.kind, ErrorKind::UndefVar("@nosuchmacro".to_string()));
    assert!(err.load_site().is_some());
}

#[test]
fn test_outside_a_collection_throws_immediately() {
    let err = eval("using Test\n@test 1 == 2").unwrap_err();
    match err.kind {
        ErrorKind::TestFailed(description) => {
            assert!(description.contains("Expression: 1 == 2"), "{description}");
            assert!(description.contains("Evaluated: 1 == 2"), "{description}");
        }
        other => panic!("expected a test failure, got {other:?}"),
    }
    assert!(eval("using Test\n@test 2 == 2").is_ok());
}

#[test]
fn collection_records_failures_errors_and_nested_sets() {
    let mut interp = interpreter();
    let ns = interp.fresh_namespace();
    interp.push_collection("item");
    let code = r#"using Test
@test 1 + 1 == 2
@test 1 == 2
@test "not a bool"
@test undefined_name
@testset "inner" begin
    @test 3 < 2
    @test true
    error("escaped")
end
@test_throws error("x")
@test_throws 1 + 1
"#;
    {
        let mut scoped = interp.scoped_source_path(Some(PathBuf::from("/src/t.ti")));
        scoped.eval_string(&ns, code).unwrap();
    }
    match interp.finish_collection("item") {
        Err(FinishError::Failures(failures)) => {
            assert_eq!(failures.passed, 3);
            assert_eq!(failures.failed, 3);
            assert_eq!(failures.errored, 3);
            let lines: Vec<u32> = failures.failures.iter().map(|f| f.line).collect();
            assert_eq!(lines, vec![3, 4, 5, 7, 6, 12]);
            assert!(failures.failures[1].description.contains("non-Boolean"));
            assert!(failures.failures[2].description.contains("UndefVarError"));
            assert!(failures.failures[4].description.contains("Got exception outside of a @test"));
            assert!(failures.failures[5].description.contains("No exception thrown"));
            assert!(failures.to_string().starts_with("item: Some tests did not pass"));
        }
        other => panic!("expected collected failures, got {other:?}"),
    }
}

#[test]
fn passing_collection_finishes_cleanly() {
    let mut interp = interpreter();
    let ns = interp.fresh_namespace();
    interp.push_collection("ok");
    interp
        .eval_string(&ns, "using Test\n@testset \"s\" begin\n  @test 1 == 1\nend\n@test true")
        .unwrap();
    let summary = interp.finish_collection("ok").unwrap();
    assert_eq!(summary.passed, 2);
    assert_eq!(interp.collection_depth(), 0);
}

#[test]
fn namespaces_do_not_share_bindings() {
    let mut interp = interpreter();
    let first = interp.fresh_namespace();
    let second = interp.fresh_namespace();
    assert_ne!(first.name(), second.name());
    interp.eval_string(&first, "shared = 1").unwrap();
    let err = interp.eval_string(&second, "shared").unwrap_err();
    assert_eq!(err.kind, ErrorKind::UndefVar("shared".to_string()));
}

#[test]
fn packages_load_once_and_bind_exports() {
    let dir = tempfile::tempdir().unwrap();
    let entry = dir.path().join("Greeter.ti");
    fs::write(
        &entry,
        "export hello\nloads = 1\nhello(n) = \"hi \" * n\nhidden() = 7\n",
    )
    .unwrap();
    let loader = MapLoader(HashMap::from([("Greeter".to_string(), entry)]));
    let mut interp = Interpreter::new(Rc::new(loader), Box::new(io::sink()));
    let ns = interp.fresh_namespace();

    let value = interp
        .eval_string(&ns, "using Greeter\nhello(\"bob\")")
        .unwrap();
    assert_eq!(value, Value::str("hi bob"));
    assert_eq!(interp.eval_string(&ns, "Greeter.hidden()").unwrap(), Value::Int(7));
    assert!(interp.eval_string(&ns, "hidden()").is_err());

    let other = interp.fresh_namespace();
    assert!(interp.eval_string(&other, "import Greeter\nGreeter.hello(\"x\")").is_ok());
    assert!(interp.eval_string(&other, "hello(\"x\")").is_err());
}

#[test]
fn missing_package_is_not_found() {
    let err = eval("using Nope").unwrap_err();
    assert_eq!(err.kind, ErrorKind::PackageNotFound("Nope".to_string()));
    assert!(err.render().contains("Package Nope not found"));
}

#[test]
fn broken_package_reports_a_load_error_at_the_package_file() {
    let dir = tempfile::tempdir().unwrap();
    let entry = dir.path().join("Broken.ti");
    fs::write(&entry, "x = 1\nerror(\"package init failed\")\n").unwrap();
    let loader = MapLoader(HashMap::from([("Broken".to_string(), entry.clone())]));
    let mut interp = Interpreter::new(Rc::new(loader), Box::new(io::sink()));
    let ns = interp.fresh_namespace();

    let err = interp.eval_string(&ns, "using Broken").unwrap_err();
    match &err.kind {
        ErrorKind::Load { inner, line, .. } => {
            assert_eq!(**inner, ErrorKind::User("package init failed".to_string()));
            assert_eq!(*line, 2);
        }
        other => panic!("expected a load error, got {other:?}"),
    }
    let site = err.load_site().unwrap();
    assert_eq!(PathBuf::from(site.file), entry);
    assert_eq!(site.line, 2);
    assert_eq!(interp.source_path(), None);
}

#[test]
fn scoped_source_path_nests_and_restores() {
    let mut interp = interpreter();
    {
        let mut outer = interp.scoped_source_path(Some(PathBuf::from("/a.ti")));
        {
            let inner = outer.scoped_source_path(Some(PathBuf::from("/b.ti")));
            assert_eq!(inner.source_path(), Some(PathBuf::from("/b.ti").as_path()));
        }
        assert_eq!(outer.source_path(), Some(PathBuf::from("/a.ti").as_path()));
    }
    assert_eq!(interp.source_path(), None);
}
