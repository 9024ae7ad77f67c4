use crate::{error::ErrorDisplay, ir::optimize::OptimizeError, source::CodeArea};

use super::{
    resource::{ResourceError, ResourceType},
    signature::ArgumentError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Type,
    Argument,
    Internal,
}

#[derive(Debug, Clone)]
pub enum CompilerError {
    NonexistentVariable {
        name: String,
        area: CodeArea,
    },
    TypeMismatch {
        expected: ResourceType,
        found: ResourceType,
        area: CodeArea,
    },
    Resource {
        error: ResourceError,
        area: CodeArea,
    },
    NotStatic {
        what: &'static str,
        area: CodeArea,
    },
    ConstWrite {
        name: String,
        area: CodeArea,
    },
    StaticWriteInRuntimeScope {
        name: String,
        area: CodeArea,
    },
    UnknownMember {
        typ: ResourceType,
        member: String,
        area: CodeArea,
    },
    IndexOutOfBounds {
        index: i32,
        len: usize,
        area: CodeArea,
    },
    UnknownType {
        name: String,
        area: CodeArea,
    },
    UnknownBlock {
        name: String,
        area: CodeArea,
    },
    UnknownFeature {
        name: String,
        area: CodeArea,
    },
    DestructureMismatch {
        expected: usize,
        found: usize,
        area: CodeArea,
    },
    NotCallable {
        typ: ResourceType,
        area: CodeArea,
    },
    NotIterable {
        typ: ResourceType,
        area: CodeArea,
    },
    ReturnOutsideFunction {
        area: CodeArea,
    },
    AlreadyDeclared {
        name: String,
        area: CodeArea,
    },
    InvalidArgument {
        msg: String,
        area: CodeArea,
    },
    UnsupportedRuntimeType {
        typ: ResourceType,
        area: CodeArea,
    },
    InlineRecursion {
        name: String,
        area: CodeArea,
    },
    Argument {
        error: ArgumentError,
        signature: String,
        found: String,
        area: CodeArea,
    },
    Internal {
        msg: String,
        area: CodeArea,
    },
    Optimizer {
        error: OptimizeError,
        area: CodeArea,
    },
}

impl CompilerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CompilerError::Argument { .. } | CompilerError::InvalidArgument { .. } => {
                ErrorKind::Argument
            }
            CompilerError::Internal { .. } | CompilerError::Optimizer { .. } => {
                ErrorKind::Internal
            }
            _ => ErrorKind::Type,
        }
    }

    pub fn area(&self) -> &CodeArea {
        match self {
            CompilerError::NonexistentVariable { area, .. }
            | CompilerError::TypeMismatch { area, .. }
            | CompilerError::Resource { area, .. }
            | CompilerError::NotStatic { area, .. }
            | CompilerError::ConstWrite { area, .. }
            | CompilerError::StaticWriteInRuntimeScope { area, .. }
            | CompilerError::UnknownMember { area, .. }
            | CompilerError::IndexOutOfBounds { area, .. }
            | CompilerError::UnknownType { area, .. }
            | CompilerError::UnknownBlock { area, .. }
            | CompilerError::UnknownFeature { area, .. }
            | CompilerError::DestructureMismatch { area, .. }
            | CompilerError::NotCallable { area, .. }
            | CompilerError::NotIterable { area, .. }
            | CompilerError::ReturnOutsideFunction { area }
            | CompilerError::AlreadyDeclared { area, .. }
            | CompilerError::InvalidArgument { area, .. }
            | CompilerError::UnsupportedRuntimeType { area, .. }
            | CompilerError::InlineRecursion { area, .. }
            | CompilerError::Argument { area, .. }
            | CompilerError::Internal { area, .. }
            | CompilerError::Optimizer { area, .. } => area,
        }
    }

    pub fn msg(&self) -> String {
        match self {
            CompilerError::NonexistentVariable { name, .. } => {
                format!("Variable `{}` does not exist", name)
            }
            CompilerError::TypeMismatch {
                expected, found, ..
            } => format!("Expected {}, found {}", expected, found),
            CompilerError::Resource { error, .. } => {
                let mut msg = error.to_string();
                if let Some(first) = msg.get_mut(0..1) {
                    first.make_ascii_uppercase();
                }
                msg
            }
            CompilerError::NotStatic { what, .. } => {
                format!("{} must be known at compile time", what)
            }
            CompilerError::ConstWrite { name, .. } => {
                format!("Cannot assign to constant `{}`", name)
            }
            CompilerError::StaticWriteInRuntimeScope { name, .. } => format!(
                "Variable `{}` is known at compile time and cannot be modified under runtime control",
                name
            ),
            CompilerError::UnknownMember { typ, member, .. } => {
                format!("{} has no member `{}`", typ, member)
            }
            CompilerError::IndexOutOfBounds { index, len, .. } => {
                format!("Index {} is out of bounds for an array of length {}", index, len)
            }
            CompilerError::UnknownType { name, .. } => format!("Unknown type `{}`", name),
            CompilerError::UnknownBlock { name, .. } => format!("Unknown block `{}`", name),
            CompilerError::UnknownFeature { name, .. } => format!("Unknown feature `{}`", name),
            CompilerError::DestructureMismatch {
                expected, found, ..
            } => format!("Expected {} values to destructure, found {}", expected, found),
            CompilerError::NotCallable { typ, .. } => format!("{} is not callable", typ),
            CompilerError::NotIterable { typ, .. } => {
                format!("Cannot iterate over {}, only compile time arrays", typ)
            }
            CompilerError::ReturnOutsideFunction { .. } => {
                "Return outside of a function".into()
            }
            CompilerError::AlreadyDeclared { name, .. } => {
                format!("`{}` is already declared in this scope", name)
            }
            CompilerError::InvalidArgument { msg, .. } => msg.clone(),
            CompilerError::UnsupportedRuntimeType { typ, .. } => format!(
                "{} cannot be passed to or returned from a non-inline function",
                typ
            ),
            CompilerError::InlineRecursion { name, .. } => {
                format!("Inline function `{}` expands into itself too deeply", name)
            }
            CompilerError::Argument {
                error,
                signature,
                found,
                ..
            } => format!("{} in call to `{}` with ({})", error, signature, found),
            CompilerError::Internal { msg, .. } => format!("Internal compiler error: {}", msg),
            CompilerError::Optimizer { error, .. } => {
                format!("Internal compiler error: {}", error)
            }
        }
    }
}

impl From<CompilerError> for ErrorDisplay {
    fn from(value: CompilerError) -> Self {
        let typ = match value.kind() {
            ErrorKind::Type => "Type Error",
            ErrorKind::Argument => "Argument Error",
            ErrorKind::Internal => "Internal Error",
        };
        ErrorDisplay {
            typ,
            msg: value.msg(),
            area: value.area().clone(),
        }
    }
}
