use std::{fmt::Debug, fs, io, ops::Range, path::PathBuf, rc::Rc};

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct CodeSpan {
    pub start: usize,
    pub end: usize,
}

impl CodeSpan {
    pub const ZEROSPAN: Self = CodeSpan { start: 0, end: 0 };

    pub fn extended(self, other: Self) -> Self {
        Self {
            start: self.start,
            end: other.end,
        }
    }

    pub fn into_area(self, src: Rc<ScriptSource>) -> CodeArea {
        CodeArea { span: self, src }
    }
}

impl Debug for CodeSpan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

impl From<Range<usize>> for CodeSpan {
    fn from(value: Range<usize>) -> Self {
        Self {
            start: value.start,
            end: value.end,
        }
    }
}
impl From<CodeSpan> for Range<usize> {
    fn from(value: CodeSpan) -> Self {
        value.start..value.end
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SourceOrigin {
    File(PathBuf),
    Memory(String),
}

/// A script together with where it came from. The text is read once, spans
/// index into it by byte offset.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScriptSource {
    pub origin: SourceOrigin,
    code: String,
}

impl ScriptSource {
    pub fn load(path: PathBuf) -> io::Result<Self> {
        let code = fs::read_to_string(&path)?;
        Ok(Self {
            origin: SourceOrigin::File(path),
            code,
        })
    }

    pub fn memory(name: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            origin: SourceOrigin::Memory(name.into()),
            code: code.into(),
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn name(&self) -> String {
        match &self.origin {
            SourceOrigin::File(path) => path.display().to_string(),
            SourceOrigin::Memory(name) => name.clone(),
        }
    }

    /// 1-based line and column of a byte offset.
    pub fn line_col(&self, offset: usize) -> (usize, usize) {
        let offset = offset.min(self.code.len());
        let before = &self.code[..offset];
        let line = before.matches('\n').count() + 1;
        let line_start = before.rfind('\n').map(|i| i + 1).unwrap_or(0);
        (line, before[line_start..].chars().count() + 1)
    }
}

#[derive(Clone, PartialEq, Eq, Hash)]
pub struct CodeArea {
    pub span: CodeSpan,
    pub src: Rc<ScriptSource>,
}

impl CodeArea {
    pub fn line_col(&self) -> (usize, usize) {
        self.src.line_col(self.span.start)
    }
}

impl Debug for CodeArea {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<{} @ {:?}>", self.src.name(), self.span)
    }
}
