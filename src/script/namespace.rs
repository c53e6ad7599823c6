//! # Namespaces / 命名空间
//!
//! Module tables holding global bindings and export lists.
//!
//! 保存全局绑定与导出列表的模块表。

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;

use crate::script::value::Value;

/// A module: a named table of global bindings plus its export list.
///
/// Each test item runs in its own freshly created namespace, so nothing one item
/// defines is visible to another.
///
/// 模块：带有导出列表的具名全局绑定表。
/// 每个测试项都在新建的命名空间中运行，因此一个测试项定义的内容对其他测试项不可见。
pub struct Namespace {
    name: String,
    bindings: RefCell<HashMap<String, Value>>,
    exports: RefCell<Vec<String>>,
}

impl Namespace {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bindings: RefCell::new(HashMap::new()),
            exports: RefCell::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.bindings.borrow().get(name).cloned()
    }

    pub fn set(&self, name: impl Into<String>, value: Value) {
        self.bindings.borrow_mut().insert(name.into(), value);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.borrow().contains_key(name)
    }

    pub fn export(&self, names: &[String]) {
        let mut exports = self.exports.borrow_mut();
        for name in names {
            if !exports.contains(name) {
                exports.push(name.clone());
            }
        }
    }

    pub fn exports(&self) -> Vec<String> {
        self.exports.borrow().clone()
    }

    pub fn binding_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.bindings.borrow().keys().cloned().collect();
        names.sort();
        names
    }
}

impl fmt::Debug for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Namespace")
            .field("name", &self.name)
            .field("bindings", &self.binding_names())
            .finish_non_exhaustive()
    }
}
