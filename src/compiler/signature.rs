use std::fmt::Display;

use itertools::Itertools;

use super::resource::{Resource, ResourceType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    One,
    ZeroOrMore,
    OneOrMore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Staticness {
    Any,
    StaticOnly,
    DynamicOnly,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub typ: ResourceType,
    pub arity: Arity,
    pub accepts: Staticness,
    pub default: Option<Resource>,
}

impl Parameter {
    pub fn new(name: impl Into<String>, typ: ResourceType) -> Self {
        Self {
            name: name.into(),
            typ,
            arity: Arity::One,
            accepts: Staticness::Any,
            default: None,
        }
    }
    pub fn variadic(mut self, arity: Arity) -> Self {
        self.arity = arity;
        self
    }
    pub fn static_only(mut self) -> Self {
        self.accepts = Staticness::StaticOnly;
        self
    }
    pub fn dynamic_only(mut self) -> Self {
        self.accepts = Staticness::DynamicOnly;
        self
    }
    pub fn with_default(mut self, default: Resource) -> Self {
        self.default = Some(default);
        self
    }

    fn is_variadic(&self) -> bool {
        self.arity != Arity::One
    }

    fn check_type(&self, arg: &Resource) -> Result<(), ArgumentError> {
        if self.typ.accepts(&arg.typ()) {
            Ok(())
        } else {
            Err(ArgumentError::WrongType {
                param: self.name.clone(),
                expected: self.typ.clone(),
                found: arg.typ(),
            })
        }
    }

    fn check_staticness(&self, arg: &Resource) -> Result<(), ArgumentError> {
        match self.accepts {
            Staticness::StaticOnly if !arg.is_fully_static() => Err(ArgumentError::MustBeStatic {
                param: self.name.clone(),
            }),
            Staticness::DynamicOnly if arg.is_static() => Err(ArgumentError::MustNotBeStatic {
                param: self.name.clone(),
            }),
            _ => Ok(()),
        }
    }

    fn check(&self, arg: &Resource) -> Result<(), ArgumentError> {
        self.check_type(arg)?;
        self.check_staticness(arg)
    }
}

impl Display for Parameter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = match self.arity {
            Arity::One => "",
            Arity::ZeroOrMore => "*",
            Arity::OneOrMore => "+",
        };
        let suffix = match self.accepts {
            Staticness::StaticOnly => "!",
            _ => "",
        };
        write!(f, "{}{}: {}{}", prefix, self.name, self.typ, suffix)?;
        if let Some(default) = &self.default {
            write!(
                f,
                " = {}",
                default.literal_text().unwrap_or_else(|| "?".into())
            )?;
        }
        Ok(())
    }
}

/// The declared shape of a callable.
#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    pub name: String,
    pub params: Vec<Parameter>,
    pub ret: ResourceType,
    /// Methods take the receiver implicitly, it is not listed in `params`.
    pub method: bool,
}

impl Display for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let receiver = if self.method { Some("self".to_string()) } else { None };
        write!(
            f,
            "fun {}({}) -> {}",
            self.name,
            receiver
                .into_iter()
                .chain(self.params.iter().map(|p| p.to_string()))
                .join(", "),
            self.ret
        )
    }
}

/// One matched parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    One(Resource),
    Many(Vec<Resource>),
}

impl Argument {
    pub fn flatten(self) -> Vec<Resource> {
        match self {
            Argument::One(r) => vec![r],
            Argument::Many(v) => v,
        }
    }

    pub fn single(&self) -> Option<&Resource> {
        match self {
            Argument::One(r) => Some(r),
            Argument::Many(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ArgumentError {
    #[error("parameter `{param}` expects {expected}, found {found}")]
    WrongType {
        param: String,
        expected: ResourceType,
        found: ResourceType,
    },
    #[error("parameter `{param}` needs a value known at compile time")]
    MustBeStatic { param: String },
    #[error("parameter `{param}` needs a runtime value")]
    MustNotBeStatic { param: String },
    #[error("expected at most {expected} arguments, found {found}")]
    TooManyArguments { expected: usize, found: usize },
    #[error("missing argument for parameter `{param}`")]
    MissingParameter { param: String },
    #[error("parameter `{param}` needs at least one argument")]
    MissingVariadic { param: String },
    #[error(
        "all arguments for `{param}` must be {expected}, found ({})",
        .found.iter().join(", ")
    )]
    VariadicMismatch {
        param: String,
        expected: ResourceType,
        found: Vec<ResourceType>,
    },
}

/// Distributes `args` over the parameters of `sig`, left to right. A
/// variadic parameter takes every following argument of its type, and when
/// it is the last parameter every remaining argument must fit it.
pub fn match_args(sig: &Signature, args: Vec<Resource>) -> Result<Vec<Argument>, ArgumentError> {
    let total = args.len();
    let mut args = args.into_iter().peekable();
    let mut out = Vec::with_capacity(sig.params.len());

    for (i, param) in sig.params.iter().enumerate() {
        if param.is_variadic() {
            let mut taken = vec![];
            while let Some(arg) = args.next_if(|a| param.check_type(a).is_ok()) {
                taken.push(arg);
            }
            if i + 1 == sig.params.len() && args.peek().is_some() {
                return Err(ArgumentError::VariadicMismatch {
                    param: param.name.clone(),
                    expected: param.typ.clone(),
                    found: taken
                        .iter()
                        .map(|a| a.typ())
                        .chain(args.by_ref().map(|a| a.typ()))
                        .collect(),
                });
            }
            for arg in &taken {
                param.check_staticness(arg)?;
            }
            if taken.is_empty() && param.arity == Arity::OneOrMore {
                match (args.peek(), &param.default) {
                    (Some(arg), _) => {
                        return Err(ArgumentError::WrongType {
                            param: param.name.clone(),
                            expected: param.typ.clone(),
                            found: arg.typ(),
                        })
                    }
                    (None, Some(default)) => taken.push(default.clone()),
                    (None, None) => {
                        return Err(ArgumentError::MissingVariadic {
                            param: param.name.clone(),
                        })
                    }
                }
            }
            out.push(Argument::Many(taken));
            continue;
        }

        match args.next() {
            Some(arg) => {
                param.check(&arg)?;
                out.push(Argument::One(arg));
            }
            None => match &param.default {
                Some(default) => out.push(Argument::One(default.clone())),
                None => {
                    return Err(ArgumentError::MissingParameter {
                        param: param.name.clone(),
                    })
                }
            },
        }
    }

    if args.next().is_some() {
        return Err(ArgumentError::TooManyArguments {
            expected: sig.params.len(),
            found: total,
        });
    }
    Ok(out)
}
