use indexmap::IndexMap;
use lasso::Spur;

use crate::source::CodeSpan;

/// Identifies a scope by the span of the block that opens it. The global
/// scope uses the zero span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeKey(pub CodeSpan);

impl ScopeKey {
    pub const GLOBAL: Self = ScopeKey(CodeSpan::ZEROSPAN);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeKind {
    Global,
    Function,
    InlineFunction,
    Block,
    Conditional,
    Loop,
    Struct,
}

impl ScopeKind {
    /// Whether values bound in this scope can stay compile-time constants.
    pub fn is_static(self) -> bool {
        !matches!(
            self,
            ScopeKind::Function | ScopeKind::Conditional | ScopeKind::Loop
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Access {
    pub site: CodeSpan,
    pub scope: ScopeKey,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredVariable {
    pub name: Spur,
    pub declaration: Access,
    pub writes: Vec<Access>,
    pub reads: Vec<Access>,
    pub constant: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeRecord {
    pub key: ScopeKey,
    pub kind: ScopeKind,
    pub variables: Vec<DeclaredVariable>,
    /// Every scope opened while this one was open, at any depth.
    pub inner: Vec<ScopeKey>,
}

impl ScopeRecord {
    pub fn variable(&self, name: Spur) -> Option<&DeclaredVariable> {
        self.variables.iter().find(|v| v.name == name)
    }

    pub fn encloses(&self, key: ScopeKey) -> bool {
        self.inner.contains(&key)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScopeMap {
    pub records: IndexMap<ScopeKey, ScopeRecord, ahash::RandomState>,
}

impl ScopeMap {
    pub fn get(&self, key: ScopeKey) -> Option<&ScopeRecord> {
        self.records.get(&key)
    }

    pub fn global(&self) -> Option<&ScopeRecord> {
        self.get(ScopeKey::GLOBAL)
    }

    /// A variable needs a runtime cell when one of its writes happens behind a
    /// non-static scope between the declaring scope and the write site.
    pub fn requires_runtime_storage(&self, declaring: ScopeKey, name: Spur) -> bool {
        let Some(record) = self.get(declaring) else {
            return false;
        };
        let Some(var) = record.variable(name) else {
            return false;
        };

        var.writes
            .iter()
            .filter(|w| w.scope != declaring)
            .any(|w| {
                record
                    .inner
                    .iter()
                    .filter_map(|k| self.get(*k))
                    .filter(|s| s.key == w.scope || s.encloses(w.scope))
                    .any(|s| !s.kind.is_static())
            })
    }
}
