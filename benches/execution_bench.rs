use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;
use std::io;
use std::rc::Rc;
use testitem_runner::execution::run_test_item;
use testitem_runner::models::TestItemRequest;
use testitem_runner::script::BuiltinsOnly;

fn request(code: &str) -> TestItemRequest {
    TestItemRequest {
        uri: "file:///bench/test/runtests.ti".to_string(),
        name: "bench_item".to_string(),
        package_name: String::new(),
        use_default_usings: true,
        line: 40,
        column: 4,
        code: code.to_string(),
        project_path: String::new(),
        package_path: String::new(),
    }
}

fn bench_run_test_item(c: &mut Criterion) {
    let passing = request(
        "function fib(n)\n    if n < 2\n        return n\n    end\n    return fib(n - 1) + fib(n - 2)\nend\n@test fib(15) == 610",
    );
    c.bench_function("run_test_item_passing", |b| {
        b.iter(|| {
            let _ = run_test_item(black_box(&passing), Rc::new(BuiltinsOnly), Box::new(io::sink()));
        });
    });

    let failing = request(
        "@testset \"loop\" begin\n    for i in 1:50\n        @test i % 7 != 0\n    end\nend",
    );
    c.bench_function("run_test_item_failing", |b| {
        b.iter(|| {
            let _ = run_test_item(black_box(&failing), Rc::new(BuiltinsOnly), Box::new(io::sink()));
        });
    });
}

criterion_group!(benches, bench_run_test_item);
criterion_main!(benches);
