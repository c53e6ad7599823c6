//! # Interpreter / 解释器
//!
//! Tree-walking evaluator for test-item code. An `Interpreter` owns everything that
//! is shared during one evaluation: the call stack used for backtraces, the stack of
//! active test collections, the packages loaded so far and the ambient current
//! source path. Nothing here is global, so separate interpreters never interfere.
//!
//! 测试项代码的树遍历求值器。`Interpreter` 拥有一次求值期间共享的所有状态：
//! 用于回溯的调用栈、活动测试集合栈、已加载的包以及当前源文件路径。
//! 这里没有任何全局状态，因此不同的解释器之间互不干扰。

use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, trace};

use crate::script::ast::{BinaryOp, Expr, ExprKind, Stmt, StmtKind, UnaryOp};
use crate::script::builtins;
use crate::script::error::{ErrorIntrospection, ErrorKind, Frame, ScriptError, TOP_LEVEL_FRAME};
use crate::script::loader::{BuiltinModule, PackageLoader, PackageSource};
use crate::script::namespace::Namespace;
use crate::script::parser::parse;
use crate::script::stack::ensure_sufficient_stack;
use crate::script::testing::{
    AssertionKind, FailedAssertion, FinishError, TestCollection, TestRecord, TestSummary,
};
use crate::script::value::{Function, MacroKind, Value};

/// Deepest user-function nesting before `StackOverflowError` is raised.
pub const MAX_CALL_DEPTH: usize = 200;

static NEXT_NAMESPACE: AtomicU64 = AtomicU64::new(1);

/// Variable scope for one activation: the module globals plus, inside a function, its locals.
struct Env {
    module: Rc<Namespace>,
    locals: Option<HashMap<String, Value>>,
}

impl Env {
    fn top_level(module: Rc<Namespace>) -> Self {
        Self {
            module,
            locals: None,
        }
    }

    fn assign(&mut self, name: &str, value: Value) {
        match &mut self.locals {
            Some(locals) => {
                locals.insert(name.to_string(), value);
            }
            None => self.module.set(name, value),
        }
    }
}

enum Flow {
    Next(Value),
    Return(Value),
}

impl Flow {
    fn into_value(self) -> Value {
        match self {
            Flow::Next(v) | Flow::Return(v) => v,
        }
    }
}

pub struct Interpreter {
    loader: Rc<dyn PackageLoader>,
    output: Box<dyn Write>,
    source_path: Option<PathBuf>,
    frames: Vec<Frame>,
    collections: Vec<TestCollection>,
    packages: HashMap<String, Rc<Namespace>>,
    loading: Vec<String>,
}

/// Keeps the interpreter's current source path set for as long as it is alive and
/// restores the previous value when dropped, on every exit path.
///
/// 在存活期间保持解释器的当前源路径，并在被丢弃时（任何退出路径）恢复先前的值。
pub struct SourcePathScope<'a> {
    interp: &'a mut Interpreter,
    previous: Option<PathBuf>,
}

impl Deref for SourcePathScope<'_> {
    type Target = Interpreter;

    fn deref(&self) -> &Interpreter {
        self.interp
    }
}

impl DerefMut for SourcePathScope<'_> {
    fn deref_mut(&mut self) -> &mut Interpreter {
        self.interp
    }
}

impl Drop for SourcePathScope<'_> {
    fn drop(&mut self) {
        self.interp.source_path = self.previous.take();
    }
}

impl Interpreter {
    /// Creates an interpreter whose `print`/`println` output goes to `output`.
    pub fn new(loader: Rc<dyn PackageLoader>, output: Box<dyn Write>) -> Self {
        Self {
            loader,
            output,
            source_path: None,
            frames: Vec::new(),
            collections: Vec::new(),
            packages: HashMap::new(),
            loading: Vec::new(),
        }
    }

    /// A brand-new, anonymously named namespace. Names are unique within the process.
    pub fn fresh_namespace(&self) -> Rc<Namespace> {
        let id = NEXT_NAMESPACE.fetch_add(1, Ordering::Relaxed);
        Rc::new(Namespace::new(format!("##testitem#{id}")))
    }

    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }

    /// Sets the current source path until the returned guard is dropped.
    pub fn scoped_source_path(&mut self, path: Option<PathBuf>) -> SourcePathScope<'_> {
        let previous = std::mem::replace(&mut self.source_path, path);
        SourcePathScope {
            interp: self,
            previous,
        }
    }

    pub(crate) fn write_output(&mut self, text: &str) -> io::Result<()> {
        self.output.write_all(text.as_bytes())?;
        self.output.flush()
    }

    // ---- test collections -------------------------------------------------

    /// Makes a new, empty collection the target of subsequent assertions.
    pub fn push_collection(&mut self, name: impl Into<String>) {
        self.collections.push(TestCollection::new(name));
    }

    /// Pops the collection named `name` and finalizes it.
    pub fn finish_collection(&mut self, name: &str) -> Result<TestSummary, FinishError> {
        match self.collections.pop() {
            Some(collection) if collection.name == name => collection.finish(),
            Some(collection) => {
                let found = format!("`{}`", collection.name);
                self.collections.push(collection);
                Err(FinishError::Unbalanced {
                    expected: name.to_string(),
                    found,
                })
            }
            None => Err(FinishError::Unbalanced {
                expected: name.to_string(),
                found: "none".to_string(),
            }),
        }
    }

    /// Pops the active collection without finalizing it.
    pub fn discard_collection(&mut self) -> Option<TestCollection> {
        self.collections.pop()
    }

    pub fn collection_depth(&self) -> usize {
        self.collections.len()
    }

    // ---- packages ---------------------------------------------------------

    /// `using name` (`bind_exports = true`) or `import name` into `target`.
    pub fn import(
        &mut self,
        target: &Rc<Namespace>,
        name: &str,
        bind_exports: bool,
    ) -> Result<(), ScriptError> {
        let module = self.load_package(name)?;
        target.set(name, Value::Module(module.clone()));
        if bind_exports {
            for export in module.exports() {
                if let Some(value) = module.get(&export) {
                    target.set(export, value);
                }
            }
        }
        Ok(())
    }

    fn load_package(&mut self, name: &str) -> Result<Rc<Namespace>, ScriptError> {
        if let Some(module) = self.packages.get(name) {
            return Ok(module.clone());
        }
        if self.loading.iter().any(|n| n == name) {
            return Err(self.raise(ErrorKind::User(format!(
                "circular `using {name}` while package {name} is still loading"
            ))));
        }
        let source = self
            .loader
            .locate(name)
            .ok_or_else(|| self.raise(ErrorKind::PackageNotFound(name.to_string())))?;
        let module = match source {
            PackageSource::Builtin(BuiltinModule::Test) => test_module(),
            PackageSource::File(path) => self.load_source_package(name, &path)?,
        };
        debug!(package = name, "loaded package");
        self.packages.insert(name.to_string(), module.clone());
        Ok(module)
    }

    fn load_source_package(&mut self, name: &str, path: &Path) -> Result<Rc<Namespace>, ScriptError> {
        let code = fs::read_to_string(path).map_err(|e| {
            self.raise(ErrorKind::Io {
                path: path.display().to_string(),
                reason: e.to_string(),
            })
        })?;
        let module = Rc::new(Namespace::new(name));
        let depth = self.frames.len();
        self.loading.push(name.to_string());
        let result = {
            let mut scoped = self.scoped_source_path(Some(path.to_path_buf()));
            scoped.eval_string(&module, &code)
        };
        self.loading.pop();
        match result {
            Ok(_) => Ok(module),
            Err(err) => {
                // The package's own top-level frame sits `depth` frames above the bottom.
                let line = err
                    .backtrace
                    .len()
                    .checked_sub(depth + 1)
                    .and_then(|i| err.backtrace.get(i))
                    .map(|frame| frame.line)
                    .unwrap_or(1);
                Err(err.into_load_error(Some(path.to_path_buf()), line))
            }
        }
    }

    // ---- evaluation -------------------------------------------------------

    /// Parses and evaluates `code` at the top level of `module`, attributing every
    /// position to the current source path.
    pub fn eval_string(&mut self, module: &Rc<Namespace>, code: &str) -> Result<Value, ScriptError> {
        let file = self.source_path.clone();
        let program =
            parse(code).map_err(|e| ScriptError::load_time(e.kind, file.clone(), e.line))?;
        trace!(module = module.name(), statements = program.len(), "evaluating");
        self.frames.push(Frame::new(TOP_LEVEL_FRAME, file, 1));
        let mut env = Env::top_level(module.clone());
        let result = self.exec_block(&mut env, &program);
        self.frames.pop();
        result.map(Flow::into_value)
    }

    fn raise(&self, kind: ErrorKind) -> ScriptError {
        ScriptError::new(kind, self.frames.iter().rev().cloned().collect())
    }

    fn set_line(&mut self, line: u32) {
        if let Some(frame) = self.frames.last_mut() {
            frame.line = line;
        }
    }

    fn current_file(&self) -> Option<PathBuf> {
        self.frames
            .last()
            .and_then(|f| f.file.clone())
            .or_else(|| self.source_path.clone())
    }

    fn exec_block(&mut self, env: &mut Env, body: &[Stmt]) -> Result<Flow, ScriptError> {
        let mut last = Value::Nothing;
        for stmt in body {
            self.set_line(stmt.line);
            match self.exec(env, stmt)? {
                Flow::Next(value) => last = value,
                ret @ Flow::Return(_) => return Ok(ret),
            }
        }
        Ok(Flow::Next(last))
    }

    fn exec(&mut self, env: &mut Env, stmt: &Stmt) -> Result<Flow, ScriptError> {
        ensure_sufficient_stack(|| self.exec_stmt(env, stmt))
    }

    fn exec_stmt(&mut self, env: &mut Env, stmt: &Stmt) -> Result<Flow, ScriptError> {
        let value = match &stmt.kind {
            StmtKind::Expr(expr) => self.eval(env, expr)?,
            StmtKind::Assign { target, value } => {
                let value = self.eval(env, value)?;
                env.assign(target, value.clone());
                value
            }
            StmtKind::Function(def) => {
                let function = Value::Function(Rc::new(Function {
                    def: def.clone(),
                    module: env.module.clone(),
                    file: self.current_file(),
                }));
                env.assign(&def.name, function.clone());
                function
            }
            StmtKind::Return(expr) => {
                let value = match expr {
                    Some(expr) => self.eval(env, expr)?,
                    None => Value::Nothing,
                };
                return Ok(Flow::Return(value));
            }
            StmtKind::If { branches, otherwise } => {
                for (cond, body) in branches {
                    let taken = self.condition(env, cond, "if condition")?;
                    if taken {
                        return self.exec_block(env, body);
                    }
                }
                match otherwise {
                    Some(body) => return self.exec_block(env, body),
                    None => Value::Nothing,
                }
            }
            StmtKind::While { cond, body } => {
                while self.condition(env, cond, "while condition")? {
                    if let ret @ Flow::Return(_) = self.exec_block(env, body)? {
                        return Ok(ret);
                    }
                }
                Value::Nothing
            }
            StmtKind::For { var, iter, body } => {
                let iterable = self.eval(env, iter)?;
                let items = iterable.elements().ok_or_else(|| {
                    self.raise(ErrorKind::Method(format!(
                        "no method matching iterate(::{})",
                        iterable.type_name()
                    )))
                })?;
                for item in items {
                    env.assign(var, item);
                    if let ret @ Flow::Return(_) = self.exec_block(env, body)? {
                        return Ok(ret);
                    }
                }
                Value::Nothing
            }
            StmtKind::Block(body) => return self.exec_block(env, body),
            StmtKind::Using {
                modules,
                bind_exports,
            } => {
                for name in modules {
                    self.import(&env.module, name, *bind_exports)?;
                }
                Value::Nothing
            }
            StmtKind::Export(names) => {
                env.module.export(names);
                Value::Nothing
            }
            StmtKind::Test { expr, source } => {
                self.require_macro(env, MacroKind::Test)?;
                self.run_test(env, expr, source, stmt.line)?;
                Value::Nothing
            }
            StmtKind::TestThrows { expr, source } => {
                self.require_macro(env, MacroKind::TestThrows)?;
                self.run_test_throws(env, expr, source, stmt.line)?;
                Value::Nothing
            }
            StmtKind::TestSet { name, body } => {
                self.require_macro(env, MacroKind::TestSet)?;
                return self.run_testset(env, name, body, stmt.line);
            }
        };
        Ok(Flow::Next(value))
    }

    fn condition(&mut self, env: &mut Env, cond: &Expr, context: &str) -> Result<bool, ScriptError> {
        let value = self.eval(env, cond)?;
        value.as_bool(context).map_err(|k| self.raise(k))
    }

    fn lookup(&self, env: &Env, name: &str) -> Result<Value, ScriptError> {
        if let Some(value) = env.locals.as_ref().and_then(|locals| locals.get(name)) {
            return Ok(value.clone());
        }
        if let Some(value) = env.module.get(name) {
            return Ok(value);
        }
        if let Some(builtin) = builtins::lookup(name) {
            return Ok(Value::Builtin(builtin));
        }
        Err(self.raise(ErrorKind::UndefVar(name.to_string())))
    }

    fn eval(&mut self, env: &mut Env, expr: &Expr) -> Result<Value, ScriptError> {
        ensure_sufficient_stack(|| self.eval_expr(env, expr))
    }

    fn eval_expr(&mut self, env: &mut Env, expr: &Expr) -> Result<Value, ScriptError> {
        match &expr.kind {
            ExprKind::Int(i) => Ok(Value::Int(*i)),
            ExprKind::Float(f) => Ok(Value::Float(*f)),
            ExprKind::Str(s) => Ok(Value::str(s)),
            ExprKind::Bool(b) => Ok(Value::Bool(*b)),
            ExprKind::Nothing => Ok(Value::Nothing),
            ExprKind::Ident(name) => self.lookup(env, name),
            ExprKind::Array(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval(env, item)?);
                }
                Ok(Value::Array(Rc::new(values)))
            }
            ExprKind::Range(lo, hi) => {
                let lo = self.eval(env, lo)?;
                let hi = self.eval(env, hi)?;
                match (&lo, &hi) {
                    (Value::Int(a), Value::Int(b)) => Ok(Value::Range(*a, *b)),
                    _ => Err(self.raise(ErrorKind::Method(format!(
                        "no method matching (:)(::{}, ::{})",
                        lo.type_name(),
                        hi.type_name()
                    )))),
                }
            }
            ExprKind::Binary { op: BinaryOp::And, lhs, rhs } => {
                if !self.condition(env, lhs, "&&")? {
                    return Ok(Value::Bool(false));
                }
                let rhs = self.condition(env, rhs, "&&")?;
                Ok(Value::Bool(rhs))
            }
            ExprKind::Binary { op: BinaryOp::Or, lhs, rhs } => {
                if self.condition(env, lhs, "||")? {
                    return Ok(Value::Bool(true));
                }
                let rhs = self.condition(env, rhs, "||")?;
                Ok(Value::Bool(rhs))
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let lhs = self.eval(env, lhs)?;
                let rhs = self.eval(env, rhs)?;
                binary(*op, &lhs, &rhs).map_err(|k| self.raise(k))
            }
            ExprKind::Unary { op, operand } => {
                let value = self.eval(env, operand)?;
                unary(*op, &value).map_err(|k| self.raise(k))
            }
            ExprKind::Call { callee, args } => {
                let callee = self.eval(env, callee)?;
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval(env, arg)?);
                }
                self.set_line(expr.line);
                self.call(callee, values)
            }
            ExprKind::Field { target, name } => {
                let target = self.eval(env, target)?;
                match &target {
                    Value::Module(module) => module.get(name).ok_or_else(|| {
                        self.raise(ErrorKind::UndefMember {
                            module: module.name().to_string(),
                            name: name.clone(),
                        })
                    }),
                    other => Err(self.raise(ErrorKind::Type(format!(
                        "type {} has no field {name}",
                        other.type_name()
                    )))),
                }
            }
            ExprKind::Index { target, index } => {
                let target = self.eval(env, target)?;
                let index = self.eval(env, index)?;
                index_value(&target, &index).map_err(|k| self.raise(k))
            }
        }
    }

    fn call(&mut self, callee: Value, args: Vec<Value>) -> Result<Value, ScriptError> {
        match callee {
            Value::Builtin(builtin) => (builtin.func)(self, args).map_err(|k| self.raise(k)),
            Value::Function(function) => self.call_function(&function, args),
            other => Err(self.raise(ErrorKind::Method(format!(
                "objects of type {} are not callable",
                other.type_name()
            )))),
        }
    }

    fn call_function(&mut self, function: &Function, args: Vec<Value>) -> Result<Value, ScriptError> {
        let def = &function.def;
        if args.len() != def.params.len() {
            let types: Vec<String> = args.iter().map(|a| format!("::{}", a.type_name())).collect();
            return Err(self.raise(ErrorKind::Method(format!(
                "no method matching {}({})",
                def.name,
                types.join(", ")
            ))));
        }
        let depth = self.frames.iter().filter(|f| f.function != TOP_LEVEL_FRAME).count();
        if depth >= MAX_CALL_DEPTH {
            return Err(self.raise(ErrorKind::StackOverflow(MAX_CALL_DEPTH)));
        }
        let locals = def.params.iter().cloned().zip(args).collect();
        let mut env = Env {
            module: function.module.clone(),
            locals: Some(locals),
        };
        self.frames
            .push(Frame::new(def.name.clone(), function.file.clone(), def.line));
        let result = self.exec_block(&mut env, &def.body);
        self.frames.pop();
        result.map(Flow::into_value)
    }

    // ---- testing macros ---------------------------------------------------

    fn require_macro(&self, env: &Env, kind: MacroKind) -> Result<(), ScriptError> {
        match env.module.get(kind.name()) {
            Some(Value::Macro(bound)) if bound == kind => Ok(()),
            _ => Err(self.raise(ErrorKind::UndefVar(kind.name().to_string()))),
        }
    }

    fn location(&self, line: u32) -> String {
        let file = self
            .current_file()
            .map(|f| f.display().to_string())
            .unwrap_or_else(|| "none".to_string());
        format!("{file}:{line}")
    }

    /// Evaluates a `@test` expression. Comparisons are evaluated side by side so the
    /// failure can show both operands.
    fn eval_test_expr(
        &mut self,
        env: &mut Env,
        expr: &Expr,
    ) -> Result<(Value, Option<String>), ScriptError> {
        if let ExprKind::Binary { op, lhs, rhs } = &expr.kind {
            if op.is_comparison() {
                let lhs = self.eval(env, lhs)?;
                let rhs = self.eval(env, rhs)?;
                let evaluated = format!("{} {} {}", lhs.repr(), op.symbol(), rhs.repr());
                let result = binary(*op, &lhs, &rhs).map_err(|k| self.raise(k))?;
                return Ok((result, Some(evaluated)));
            }
        }
        Ok((self.eval(env, expr)?, None))
    }

    fn run_test(&mut self, env: &mut Env, expr: &Expr, source: &str, line: u32) -> Result<(), ScriptError> {
        let at = self.location(line);
        let outcome = self.eval_test_expr(env, expr);
        let file = self.current_file();
        let record = match outcome {
            Ok((Value::Bool(true), _)) => TestRecord::Pass,
            Ok((Value::Bool(false), evaluated)) => {
                let mut description = format!("Test Failed at {at}\n  Expression: {source}");
                if let Some(evaluated) = evaluated {
                    description.push_str(&format!("\n   Evaluated: {evaluated}"));
                }
                TestRecord::Failed(FailedAssertion {
                    kind: AssertionKind::Fail,
                    description,
                    file,
                    line,
                })
            }
            Ok((other, _)) => TestRecord::Failed(FailedAssertion {
                kind: AssertionKind::Error,
                description: format!(
                    "Error During Test at {at}\n  Expression evaluated to non-Boolean\n  Expression: {source}\n       Value: {}",
                    other.repr()
                ),
                file,
                line,
            }),
            Err(err) => TestRecord::Failed(FailedAssertion {
                kind: AssertionKind::Error,
                description: format!(
                    "Error During Test at {at}\n  Test threw exception\n  Expression: {source}\n  {}",
                    err.render()
                ),
                file,
                line,
            }),
        };
        self.record(record)
    }

    fn run_test_throws(
        &mut self,
        env: &mut Env,
        expr: &Expr,
        source: &str,
        line: u32,
    ) -> Result<(), ScriptError> {
        let at = self.location(line);
        let record = match self.eval(env, expr) {
            Err(_) => TestRecord::Pass,
            Ok(value) => TestRecord::Failed(FailedAssertion {
                kind: AssertionKind::Fail,
                description: format!(
                    "Test Failed at {at}\n  Expression: {source}\n    Expected: an exception\n  No exception thrown, got {}",
                    value.repr()
                ),
                file: self.current_file(),
                line,
            }),
        };
        self.record(record)
    }

    /// Records into the active collection; without one, a failure is raised immediately.
    fn record(&mut self, record: TestRecord) -> Result<(), ScriptError> {
        if let Some(active) = self.collections.last_mut() {
            active.record(record);
            return Ok(());
        }
        match record {
            TestRecord::Failed(failure) => Err(self.raise(ErrorKind::TestFailed(failure.description))),
            _ => Ok(()),
        }
    }

    fn run_testset(
        &mut self,
        env: &mut Env,
        name: &Expr,
        body: &[Stmt],
        line: u32,
    ) -> Result<Flow, ScriptError> {
        let name = self.eval(env, name)?.to_string();
        let depth = self.collections.len();
        self.push_collection(name.clone());
        let outcome = self.exec_block(env, body);
        self.set_line(line);
        let flow = match outcome {
            Ok(flow) => flow,
            Err(err) => {
                let at = self.location(line);
                let failure = FailedAssertion {
                    kind: AssertionKind::Error,
                    description: format!(
                        "Error During Test at {at}\n  Got exception outside of a @test\n  {}",
                        err.render()
                    ),
                    file: self.current_file(),
                    line,
                };
                if let Some(active) = self.collections.last_mut() {
                    active.record(TestRecord::Failed(failure));
                }
                Flow::Next(Value::Nothing)
            }
        };
        // Anything pushed inside the body and not popped belongs to this set.
        while self.collections.len() > depth + 1 {
            if let Some(stray) = self.collections.pop() {
                if let Some(parent) = self.collections.last_mut() {
                    parent.record(TestRecord::Nested(stray));
                }
            }
        }
        let Some(child) = self.collections.pop() else {
            return Ok(flow);
        };
        if let Some(parent) = self.collections.last_mut() {
            parent.record(TestRecord::Nested(child));
            return Ok(flow);
        }
        match child.finish() {
            Ok(_) => Ok(flow),
            Err(err) => Err(self.raise(ErrorKind::TestFailed(err.to_string()))),
        }
    }
}

fn test_module() -> Rc<Namespace> {
    let module = Namespace::new(BuiltinModule::Test.name());
    let macros = [MacroKind::Test, MacroKind::TestThrows, MacroKind::TestSet];
    for kind in macros {
        module.set(kind.name(), Value::Macro(kind));
    }
    let names: Vec<String> = macros.iter().map(|k| k.name().to_string()).collect();
    module.export(&names);
    Rc::new(module)
}

fn no_method(op: &str, lhs: &Value, rhs: &Value) -> ErrorKind {
    ErrorKind::Method(format!(
        "no method matching {op}(::{}, ::{})",
        lhs.type_name(),
        rhs.type_name()
    ))
}

fn binary(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value, ErrorKind> {
    use Value::{Float, Int, Str};
    match op {
        BinaryOp::Eq => return Ok(Value::Bool(lhs.equals(rhs))),
        BinaryOp::NotEq => return Ok(Value::Bool(!lhs.equals(rhs))),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = match (lhs, rhs) {
                (Int(a), Int(b)) => a.partial_cmp(b),
                (Str(a), Str(b)) => a.partial_cmp(b),
                _ => match (lhs.as_f64(), rhs.as_f64()) {
                    (Some(a), Some(b)) => a.partial_cmp(&b),
                    _ => return Err(no_method("isless", lhs, rhs)),
                },
            };
            let result = match ordering {
                None => false,
                Some(ord) => match op {
                    BinaryOp::Lt => ord.is_lt(),
                    BinaryOp::Le => ord.is_le(),
                    BinaryOp::Gt => ord.is_gt(),
                    _ => ord.is_ge(),
                },
            };
            return Ok(Value::Bool(result));
        }
        _ => {}
    }
    match (op, lhs, rhs) {
        (BinaryOp::Mul, Str(a), Str(b)) => Ok(Value::str(format!("{a}{b}"))),
        (BinaryOp::Add, Int(a), Int(b)) => Ok(Int(a.wrapping_add(*b))),
        (BinaryOp::Sub, Int(a), Int(b)) => Ok(Int(a.wrapping_sub(*b))),
        (BinaryOp::Mul, Int(a), Int(b)) => Ok(Int(a.wrapping_mul(*b))),
        (BinaryOp::Rem, Int(_), Int(0)) => Err(ErrorKind::DivideByZero),
        (BinaryOp::Rem, Int(a), Int(b)) => Ok(Int(a.wrapping_rem(*b))),
        _ => {
            let (Some(a), Some(b)) = (lhs.as_f64(), rhs.as_f64()) else {
                return Err(no_method(op.symbol(), lhs, rhs));
            };
            let value = match op {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                BinaryOp::Div => a / b,
                BinaryOp::Rem => a % b,
                _ => return Err(no_method(op.symbol(), lhs, rhs)),
            };
            Ok(Float(value))
        }
    }
}

fn unary(op: UnaryOp, value: &Value) -> Result<Value, ErrorKind> {
    match (op, value) {
        (UnaryOp::Neg, Value::Int(i)) => Ok(Value::Int(i.wrapping_neg())),
        (UnaryOp::Neg, Value::Float(f)) => Ok(Value::Float(-f)),
        (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
        (UnaryOp::Neg, other) => Err(ErrorKind::Method(format!(
            "no method matching -(::{})",
            other.type_name()
        ))),
        (UnaryOp::Not, other) => Err(ErrorKind::Method(format!(
            "no method matching !(::{})",
            other.type_name()
        ))),
    }
}

fn index_value(target: &Value, index: &Value) -> Result<Value, ErrorKind> {
    let Value::Int(i) = index else {
        return Err(ErrorKind::Method(format!(
            "no method matching getindex(::{}, ::{})",
            target.type_name(),
            index.type_name()
        )));
    };
    let container = match target {
        Value::Array(_) => "Vector",
        Value::Range(..) => "UnitRange",
        Value::Str(_) => "String",
        _ => {
            return Err(ErrorKind::Method(format!(
                "no method matching getindex(::{}, ::Int64)",
                target.type_name()
            )));
        }
    };
    target.element_at(*i).ok_or_else(|| ErrorKind::Bounds {
        container,
        len: target.element_count().unwrap_or(0),
        index: *i,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::loader::BuiltinsOnly;

    fn interpreter() -> Interpreter {
        Interpreter::new(Rc::new(BuiltinsOnly), Box::new(io::sink()))
    }

    #[test]
    fn functions_see_module_globals_and_return_last_value() {
        let mut interp = interpreter();
        let ns = interp.fresh_namespace();
        let value = interp
            .eval_string(&ns, "base = 10\nfunction add(x)\n  base + x\nend\nadd(5)")
            .unwrap();
        assert_eq!(value, Value::Int(15));
    }

    #[test]
    fn source_path_is_restored_when_scope_ends() {
        let mut interp = interpreter();
        let ns = interp.fresh_namespace();
        {
            let mut scoped = interp.scoped_source_path(Some(PathBuf::from("/tmp/a.ti")));
            assert_eq!(scoped.source_path(), Some(Path::new("/tmp/a.ti")));
            assert!(scoped.eval_string(&ns, "error(\"boom\")").is_err());
        }
        assert_eq!(interp.source_path(), None);
    }

    #[test]
    fn error_inside_function_has_function_frame_first() {
        let mut interp = interpreter();
        let ns = interp.fresh_namespace();
        let mut scoped = interp.scoped_source_path(Some(PathBuf::from("/src/t.ti")));
        let err = scoped
            .eval_string(&ns, "function f()\n  error(\"bad\")\nend\n\nf()")
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::User("bad".to_string()));
        assert_eq!(err.backtrace.len(), 2);
        assert_eq!(err.backtrace[0].function, "f");
        assert_eq!(err.backtrace[0].line, 2);
        assert_eq!(err.backtrace[1].function, TOP_LEVEL_FRAME);
        assert_eq!(err.backtrace[1].line, 5);
    }

    #[test]
    fn unbalanced_finish_is_not_a_test_failure() {
        let mut interp = interpreter();
        interp.push_collection("outer");
        interp.push_collection("inner");
        assert!(matches!(
            interp.finish_collection("outer"),
            Err(FinishError::Unbalanced { .. })
        ));
        assert_eq!(interp.collection_depth(), 2);
    }

    #[test]
    fn runaway_recursion_is_a_stack_overflow() {
        let mut interp = interpreter();
        let ns = interp.fresh_namespace();
        let err = interp
            .eval_string(&ns, "f(n) = f(n + 1)\nf(1)")
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::StackOverflow(MAX_CALL_DEPTH));
    }
}
