pub mod address;
pub mod analyzer;
pub mod backend;
pub mod compiler;
pub mod config;
pub mod data;
pub mod error;
pub mod ir;
pub mod lexer;
pub mod parser;
pub mod source;
pub mod util;

use std::{rc::Rc, time::Instant};

use indexmap::IndexMap;
use lasso::Rodeo;
use tracing::{debug, error};

use crate::{
    analyzer::{error::ScopeError, scope::ScopeMap, Analyzer},
    backend::Backend,
    compiler::{
        error::{CompilerError, ErrorKind},
        Compiler,
    },
    config::Config,
    data::EngineData,
    error::CompileError,
    ir::{
        optimize::{optimize_global, optimize_local},
        IrProgram,
    },
    parser::{ast::Program, parse_source},
    source::{CodeSpan, ScriptSource},
};

/// What each pipeline step hands to the progress callback.
#[derive(Debug, Clone, Copy)]
pub enum Progress<'p> {
    Parsing(&'p ScriptSource),
    Analyzing(&'p Program),
    Compiling(&'p ScopeMap),
    Optimizing(&'p IrProgram),
    Lowering(&'p IrProgram),
    Done(&'p IndexMap<String, String>),
}

impl Progress<'_> {
    pub fn phase(&self) -> &'static str {
        match self {
            Progress::Parsing(_) => "Parsing",
            Progress::Analyzing(_) => "Analyzing",
            Progress::Compiling(_) => "Compiling",
            Progress::Optimizing(_) => "Optimizing",
            Progress::Lowering(_) => "Lowering",
            Progress::Done(_) => "Done",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompiledOutput {
    /// Command text per function, `main` and the lifecycle hooks included.
    pub functions: IndexMap<String, String>,
    pub warnings: Vec<ScopeError>,
}

/// Runs every phase on `src`. `progress` is called with the phase name, the
/// fraction of the pipeline already done and the phase input.
pub fn compile(
    src: &Rc<ScriptSource>,
    config: &Config,
    data: &EngineData,
    mut progress: impl FnMut(&'static str, f32, Progress<'_>),
) -> Result<CompiledOutput, CompileError> {
    let mut report = |p: Progress<'_>, fraction: f32| progress(p.phase(), fraction, p);
    let mut interner = Rodeo::default();

    report(Progress::Parsing(src), 0.0);
    let start = Instant::now();
    let program = parse_source(src, &mut interner)?;
    debug!(elapsed = ?start.elapsed(), statements = program.stmts.len(), "parsed");

    report(Progress::Analyzing(&program), 0.2);
    let start = Instant::now();
    let analysis = Analyzer::new(src, &interner).analyze(&program);
    debug!(elapsed = ?start.elapsed(), "analyzed");

    report(Progress::Compiling(&analysis.scopes), 0.4);
    let start = Instant::now();
    let mut ir = Compiler::new(src, &mut interner, config, data, &analysis.scopes)
        .compile_program(&program)
        .map_err(log_internal)?;
    debug!(elapsed = ?start.elapsed(), functions = ir.functions.len(), "compiled");

    report(Progress::Optimizing(&ir), 0.6);
    let start = Instant::now();
    optimize_local(&mut ir);
    if config.optimize {
        optimize_global(&mut ir, config).map_err(|error| {
            log_internal(CompilerError::Optimizer {
                error,
                area: program.span.into_area(src.clone()),
            })
        })?;
    }
    debug!(elapsed = ?start.elapsed(), functions = ir.functions.len(), "optimized");

    report(Progress::Lowering(&ir), 0.8);
    let functions = Backend::new(config).lower(&ir);

    report(Progress::Done(&functions), 1.0);
    Ok(CompiledOutput {
        functions,
        warnings: analysis.errors,
    })
}

fn log_internal(err: CompilerError) -> CompilerError {
    if err.kind() == ErrorKind::Internal {
        let CodeSpan { start, end } = err.area().span;
        error!(start, end, "{}", err.msg());
    }
    err
}
