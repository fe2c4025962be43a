use lazy_static::lazy_static;
use regex::Regex;
use std::collections::{HashMap, HashSet};

/// Namespace of an allocated identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NameKind {
    /// User variables
    Variable,
    /// User procedures
    Procedure,
    /// Names the engine invents (loop counters, helper functions)
    Developer,
}

/// Python keywords and the builtins a generated program relies on.
pub const PYTHON_RESERVED: &[&str] = &[
    // Keywords
    "False", "None", "True", "and", "as", "assert", "async", "await", "break",
    "class", "continue", "def", "del", "elif", "else", "except", "finally",
    "for", "from", "global", "if", "import", "in", "is", "lambda", "nonlocal",
    "not", "or", "pass", "raise", "return", "try", "while", "with", "yield",
    // Soft keywords
    "match", "case", "type",
    // Builtins
    "abs", "all", "any", "ascii", "bin", "bool", "bytearray", "bytes",
    "callable", "chr", "classmethod", "compile", "complex", "delattr", "dict",
    "dir", "divmod", "enumerate", "eval", "exec", "filter", "float", "format",
    "frozenset", "getattr", "globals", "hasattr", "hash", "help", "hex", "id",
    "input", "int", "isinstance", "issubclass", "iter", "len", "list",
    "locals", "map", "max", "memoryview", "min", "next", "object", "oct",
    "open", "ord", "pow", "print", "property", "range", "repr", "reversed",
    "round", "set", "setattr", "slice", "sorted", "staticmethod", "str", "sum",
    "super", "tuple", "vars", "zip", "__import__",
    "Exception", "ArithmeticError", "ZeroDivisionError", "ValueError",
    "TypeError", "NameError", "IndexError", "KeyError", "StopIteration",
    // Modules imported by generated code
    "math", "random", "Number", "SSR",
];

lazy_static! {
    static ref ILLEGAL_CHAR: Regex = Regex::new(r"[^A-Za-z0-9_]").unwrap();
}

/// Maps user-facing names to collision-free Python identifiers.
///
/// Lives for one generation pass. Requests are memoized per
/// `(kind, raw name)`, so the same raw name always yields the same identifier.
/// `Variable` and `Procedure` names are tracked separately; `Developer` names
/// avoid both, and user names allocated afterwards avoid developer names.
/// [`NameAllocator::distinct`] is the one call that is not memoized.
#[derive(Debug, Clone)]
pub struct NameAllocator {
    reserved: HashSet<String>,
    table: HashMap<(NameKind, String), String>,
    taken: HashMap<NameKind, HashSet<String>>,
}

impl NameAllocator {
    pub fn new<I, S>(reserved: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            reserved: reserved.into_iter().map(Into::into).collect(),
            table: HashMap::new(),
            taken: HashMap::new(),
        }
    }

    /// A Python allocator with [`PYTHON_RESERVED`].
    pub fn python() -> Self {
        Self::new(PYTHON_RESERVED.iter().copied())
    }

    /// Safe identifier for `raw` in the `kind` namespace.
    pub fn allocate(&mut self, kind: NameKind, raw: &str) -> String {
        let key = (kind, raw.to_string());
        if let Some(existing) = self.table.get(&key) {
            return existing.clone();
        }
        let safe = self.unique(kind, &normalize(raw));
        self.taken.entry(kind).or_default().insert(safe.clone());
        self.table.insert(key, safe.clone());
        safe
    }

    /// A fresh identifier derived from `base`, unique across every namespace.
    /// Each call yields a new name.
    pub fn distinct(&mut self, base: &str) -> String {
        let safe = self.unique(NameKind::Developer, &normalize(base));
        self.taken.entry(NameKind::Developer).or_default().insert(safe.clone());
        safe
    }

    /// Identifier previously allocated for `raw`, if any.
    pub fn lookup(&self, kind: NameKind, raw: &str) -> Option<&str> {
        self.table.get(&(kind, raw.to_string())).map(String::as_str)
    }

    fn is_taken(&self, kind: NameKind, name: &str) -> bool {
        let in_kind = |k: NameKind| self.taken.get(&k).is_some_and(|set| set.contains(name));
        match kind {
            NameKind::Developer => {
                in_kind(NameKind::Variable) || in_kind(NameKind::Procedure) || in_kind(NameKind::Developer)
            }
            _ => in_kind(kind) || in_kind(NameKind::Developer),
        }
    }

    fn unique(&self, kind: NameKind, base: &str) -> String {
        let mut candidate = base.to_string();
        let mut suffix = 2;
        while self.reserved.contains(&candidate) || self.is_taken(kind, &candidate) {
            candidate = format!("{}{}", base, suffix);
            suffix += 1;
        }
        candidate
    }
}

impl Default for NameAllocator {
    fn default() -> Self {
        Self::python()
    }
}

/// Force `raw` into `[A-Za-z_][A-Za-z0-9_]*`.
fn normalize(raw: &str) -> String {
    let replaced = ILLEGAL_CHAR.replace_all(raw, "_");
    if replaced.is_empty() {
        return "unnamed".to_string();
    }
    if replaced.starts_with(|c: char| c.is_ascii_digit()) {
        return format!("my_{}", replaced);
    }
    replaced.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memoized() {
        let mut names = NameAllocator::python();
        let first = names.allocate(NameKind::Variable, "count");
        let second = names.allocate(NameKind::Variable, "count");
        assert_eq!(first, "count");
        assert_eq!(first, second);
    }

    #[test]
    fn test_normalization() {
        let mut names = NameAllocator::python();
        assert_eq!(names.allocate(NameKind::Variable, "my var"), "my_var");
        assert_eq!(names.allocate(NameKind::Variable, "2fast"), "my_2fast");
        assert_eq!(names.allocate(NameKind::Variable, ""), "unnamed");
        assert_eq!(names.allocate(NameKind::Variable, "héllo"), "h_llo");
    }

    #[test]
    fn test_colliding_normalizations_get_suffixes() {
        let mut names = NameAllocator::python();
        let a = names.allocate(NameKind::Variable, "a b");
        let b = names.allocate(NameKind::Variable, "a-b");
        let c = names.allocate(NameKind::Variable, "a_b");
        assert_eq!(a, "a_b");
        assert_eq!(b, "a_b2");
        assert_eq!(c, "a_b3");
        // Still memoized after suffixing
        assert_eq!(names.allocate(NameKind::Variable, "a-b"), "a_b2");
    }

    #[test]
    fn test_reserved_words_avoided() {
        let mut names = NameAllocator::python();
        for keyword in PYTHON_RESERVED {
            let safe = names.allocate(NameKind::Variable, keyword);
            assert!(!PYTHON_RESERVED.contains(&safe.as_str()), "{} -> {}", keyword, safe);
        }
        assert_eq!(names.allocate(NameKind::Variable, "if"), "if2");
        assert_eq!(names.allocate(NameKind::Variable, "print"), "print2");
    }

    #[test]
    fn test_suffixed_name_does_not_steal_user_name() {
        let mut names = NameAllocator::python();
        assert_eq!(names.allocate(NameKind::Variable, "if"), "if2");
        assert_eq!(names.allocate(NameKind::Variable, "if2"), "if22");
    }

    #[test]
    fn test_namespaces_independent() {
        let mut names = NameAllocator::python();
        assert_eq!(names.allocate(NameKind::Variable, "go"), "go");
        assert_eq!(names.allocate(NameKind::Procedure, "go"), "go");
        assert_eq!(names.lookup(NameKind::Procedure, "go"), Some("go"));
        assert_eq!(names.lookup(NameKind::Procedure, "stop"), None);
    }

    #[test]
    fn test_distinct_avoids_everything() {
        let mut names = NameAllocator::python();
        names.allocate(NameKind::Variable, "i");
        assert_eq!(names.distinct("i"), "i2");
        assert_eq!(names.distinct("i"), "i3");
        // A user name requested later steers around developer names
        assert_eq!(names.allocate(NameKind::Variable, "i3"), "i32");
        assert_eq!(names.allocate(NameKind::Procedure, "i2"), "i22");
    }

    #[test]
    fn test_developer_allocation_memoized() {
        let mut names = NameAllocator::python();
        names.allocate(NameKind::Variable, "tmp");
        let first = names.allocate(NameKind::Developer, "tmp");
        assert_eq!(first, "tmp2");
        assert_eq!(names.allocate(NameKind::Developer, "tmp"), first);
        // Only `distinct` hands out a fresh name per call
        assert_eq!(names.distinct("tmp"), "tmp3");
        assert_eq!(names.lookup(NameKind::Developer, "tmp"), Some("tmp2"));
    }

    #[test]
    fn test_distinct_names_pairwise_unique() {
        let mut names = NameAllocator::python();
        let raws = ["x", "x ", "x!", "x?", "X", "x_", "for", "for ", "1x"];
        let safe: HashSet<String> = raws.iter().map(|r| names.allocate(NameKind::Variable, r)).collect();
        let raw_set: HashSet<&str> = raws.iter().copied().collect();
        assert_eq!(safe.len(), raw_set.len());
    }

    #[test]
    fn test_custom_reserved_set() {
        let mut names = NameAllocator::new(["robot"]);
        assert_eq!(names.allocate(NameKind::Variable, "robot"), "robot2");
        assert_eq!(names.allocate(NameKind::Variable, "print"), "print");
    }
}
