use crate::source::CodeArea;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeErrorKind {
    UndeclaredRead(String),
    UndeclaredWrite(String),
}

/// A non-fatal lookup failure. Analysis keeps going after one is found.
#[derive(Debug, Clone)]
pub struct ScopeError {
    pub kind: ScopeErrorKind,
    pub area: CodeArea,
}

impl ScopeError {
    pub fn msg(&self) -> String {
        match &self.kind {
            ScopeErrorKind::UndeclaredRead(name) => {
                format!("Variable `{}` is read before it is declared", name)
            }
            ScopeErrorKind::UndeclaredWrite(name) => {
                format!("Variable `{}` is modified before it is declared", name)
            }
        }
    }
}
