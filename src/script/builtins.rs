//! # Builtin Functions / 内置函数
//!
//! Functions every namespace can call without importing anything. Builtins do not
//! push backtrace frames, so an error raised by `error(...)` is attributed to the
//! line that called it.
//!
//! 所有命名空间无需导入即可调用的函数。内置函数不会压入回溯帧，
//! 因此 `error(...)` 抛出的错误会归因到调用它的那一行。

use std::collections::HashMap;
use std::rc::Rc;

use once_cell::sync::Lazy;

use crate::script::error::ErrorKind;
use crate::script::interp::Interpreter;
use crate::script::value::{range_len, Builtin, BuiltinFn, Value};

/// Largest number of elements `collect` materializes.
const MAX_COLLECT_LEN: u128 = 1 << 26;

/// Relative tolerance used by `isapprox`, `sqrt(eps(Float64))`.
const APPROX_RTOL: f64 = 1.490_116_119_384_765_6e-8;

static BUILTINS: Lazy<HashMap<&'static str, Builtin>> = Lazy::new(|| {
    let table: [(&'static str, BuiltinFn); 14] = [
        ("error", error),
        ("throw", throw),
        ("println", println),
        ("print", print),
        ("string", string),
        ("length", length),
        ("isempty", isempty),
        ("abs", abs),
        ("min", min),
        ("max", max),
        ("sum", sum),
        ("collect", collect),
        ("typeof", type_of),
        ("isapprox", isapprox),
    ];
    table
        .into_iter()
        .map(|(name, func)| (name, Builtin { name, func }))
        .collect()
});

pub fn lookup(name: &str) -> Option<Builtin> {
    BUILTINS.get(name).copied()
}

fn signature(name: &str, args: &[Value]) -> String {
    let types: Vec<String> = args.iter().map(|a| format!("::{}", a.type_name())).collect();
    format!("no method matching {name}({})", types.join(", "))
}

fn no_method(name: &str, args: &[Value]) -> ErrorKind {
    ErrorKind::Method(signature(name, args))
}

fn expect_arity(name: &str, args: &[Value], n: usize) -> Result<(), ErrorKind> {
    if args.len() == n {
        Ok(())
    } else {
        Err(no_method(name, args))
    }
}

fn joined(args: &[Value]) -> String {
    args.iter().map(Value::to_string).collect()
}

fn error(_: &mut Interpreter, args: Vec<Value>) -> Result<Value, ErrorKind> {
    Err(ErrorKind::User(joined(&args)))
}

fn throw(_: &mut Interpreter, args: Vec<Value>) -> Result<Value, ErrorKind> {
    expect_arity("throw", &args, 1)?;
    Err(ErrorKind::User(args[0].repr()))
}

fn write(interp: &mut Interpreter, text: String) -> Result<Value, ErrorKind> {
    interp
        .write_output(&text)
        .map_err(|e| ErrorKind::User(format!("IOError: {e}")))?;
    Ok(Value::Nothing)
}

fn println(interp: &mut Interpreter, args: Vec<Value>) -> Result<Value, ErrorKind> {
    let mut text = joined(&args);
    text.push('\n');
    write(interp, text)
}

fn print(interp: &mut Interpreter, args: Vec<Value>) -> Result<Value, ErrorKind> {
    write(interp, joined(&args))
}

fn string(_: &mut Interpreter, args: Vec<Value>) -> Result<Value, ErrorKind> {
    Ok(Value::str(joined(&args)))
}

fn length(_: &mut Interpreter, args: Vec<Value>) -> Result<Value, ErrorKind> {
    expect_arity("length", &args, 1)?;
    let Some(len) = args[0].element_count() else {
        return Err(no_method("length", &args));
    };
    i64::try_from(len)
        .map(Value::Int)
        .map_err(|_| ErrorKind::Overflow(format!("length of {} does not fit in Int64", args[0])))
}

fn isempty(_: &mut Interpreter, args: Vec<Value>) -> Result<Value, ErrorKind> {
    expect_arity("isempty", &args, 1)?;
    match args[0].element_count() {
        Some(len) => Ok(Value::Bool(len == 0)),
        None => Err(no_method("isempty", &args)),
    }
}

fn abs(_: &mut Interpreter, args: Vec<Value>) -> Result<Value, ErrorKind> {
    expect_arity("abs", &args, 1)?;
    match &args[0] {
        Value::Int(i) => Ok(Value::Int(i.wrapping_abs())),
        Value::Float(f) => Ok(Value::Float(f.abs())),
        _ => Err(no_method("abs", &args)),
    }
}

fn extremum(name: &str, args: Vec<Value>, pick_left: fn(f64, f64) -> bool) -> Result<Value, ErrorKind> {
    if args.is_empty() {
        return Err(no_method(name, &args));
    }
    let mut best = args[0].clone();
    for candidate in &args[1..] {
        let (Some(b), Some(c)) = (best.as_f64(), candidate.as_f64()) else {
            return Err(no_method(name, &args));
        };
        if !pick_left(b, c) {
            best = candidate.clone();
        }
    }
    if best.as_f64().is_none() {
        return Err(no_method(name, &args));
    }
    Ok(best)
}

fn min(_: &mut Interpreter, args: Vec<Value>) -> Result<Value, ErrorKind> {
    extremum("min", args, |a, b| a <= b)
}

fn max(_: &mut Interpreter, args: Vec<Value>) -> Result<Value, ErrorKind> {
    extremum("max", args, |a, b| a >= b)
}

fn sum(_: &mut Interpreter, args: Vec<Value>) -> Result<Value, ErrorKind> {
    expect_arity("sum", &args, 1)?;
    if let Value::Range(lo, hi) = args[0] {
        return Ok(Value::Int(range_sum(lo, hi)));
    }
    let Some(items) = args[0].elements() else {
        return Err(no_method("sum", &args));
    };
    let mut int_total: i64 = 0;
    let mut float_total: Option<f64> = None;
    for item in items {
        match &item {
            Value::Int(i) => match float_total {
                Some(f) => float_total = Some(f + *i as f64),
                None => int_total = int_total.wrapping_add(*i),
            },
            Value::Float(x) => float_total = Some(float_total.unwrap_or(int_total as f64) + x),
            _ => return Err(no_method("+", std::slice::from_ref(&item))),
        }
    }
    Ok(float_total.map(Value::Float).unwrap_or(Value::Int(int_total)))
}

/// Sum of `lo:hi` in closed form, wrapping like `Int64` addition.
fn range_sum(lo: i64, hi: i64) -> i64 {
    let n = range_len(lo, hi) as i128;
    let ends = i128::from(lo) + i128::from(hi);
    // One of `n` and `lo + hi` is even, so the halving is exact and stays in range.
    let total = if n % 2 == 0 { (n / 2) * ends } else { n * (ends / 2) };
    total as i64
}

fn collect(_: &mut Interpreter, args: Vec<Value>) -> Result<Value, ErrorKind> {
    expect_arity("collect", &args, 1)?;
    let (Some(len), Some(items)) = (args[0].element_count(), args[0].elements()) else {
        return Err(no_method("collect", &args));
    };
    let too_large = || ErrorKind::OutOfMemory(format!("cannot collect {len} elements of {}", args[0]));
    if len > MAX_COLLECT_LEN {
        return Err(too_large());
    }
    let mut values = Vec::new();
    values.try_reserve_exact(len as usize).map_err(|_| too_large())?;
    values.extend(items);
    Ok(Value::Array(Rc::new(values)))
}

fn type_of(_: &mut Interpreter, args: Vec<Value>) -> Result<Value, ErrorKind> {
    expect_arity("typeof", &args, 1)?;
    Ok(Value::str(args[0].type_name()))
}

fn isapprox(_: &mut Interpreter, args: Vec<Value>) -> Result<Value, ErrorKind> {
    expect_arity("isapprox", &args, 2)?;
    let (Some(a), Some(b)) = (args[0].as_f64(), args[1].as_f64()) else {
        return Err(no_method("isapprox", &args));
    };
    let close = a == b || (a - b).abs() <= APPROX_RTOL * a.abs().max(b.abs());
    Ok(Value::Bool(close))
}
