//! Interface to the external per-file compile step.
//!
//! The transform logic itself (parsers, optimizers, linters) lives outside
//! this crate. The release driver only needs a [`Compiler`] it can hand a
//! file to; the compiler may emit [`Event::CompileAdd`] on the bus to push
//! newly discovered files into the current queue, and
//! [`Event::ProcessEnd`] once per-file post-processing is done.
//!
//! A compile failure is not recovered here: the driver aborts the run and
//! propagates the error to the caller.

use thiserror::Error;

use crate::events::EventBus;
use crate::file::ProjectFile;

/// Failure of the external compile step for one file.
#[derive(Debug, Error)]
#[error("compile failed for {subpath}: {message}")]
pub struct CompileError {
    /// Subpath of the file being compiled.
    pub subpath: String,
    /// Compiler-provided description.
    pub message: String,
}

impl CompileError {
    pub fn new(subpath: impl Into<String>, message: impl Into<String>) -> Self {
        Self { subpath: subpath.into(), message: message.into() }
    }
}

/// Per-file hook invoked by compilers at fixed points.
pub type CompileHook = Box<dyn Fn(&mut ProjectFile)>;

/// Compile-step callbacks recognized by the driver and forwarded to the
/// compiler via [`Compiler::setup`].
///
/// `before_compile`/`after_compile` run only when a file is actually
/// compiled; the cache-revert pair runs around applying a cached result
/// instead, for compilers that persist one.
#[derive(Default)]
pub struct CompileSettings {
    pub before_compile: Option<CompileHook>,
    pub after_compile: Option<CompileHook>,
    pub before_cache_revert: Option<CompileHook>,
    pub after_cache_revert: Option<CompileHook>,
}

/// External per-file compile operation.
pub trait Compiler {
    /// Called once per release run, before the queue is drained.
    fn setup(&mut self, _settings: &CompileSettings) {}

    /// Compile one file in place.
    ///
    /// Side effects are reported through `bus`: `CompileAdd` to re-enqueue
    /// additional files, `ProcessEnd` after post-processing. Lifecycle
    /// start/end events are emitted by the driver around this call.
    fn compile(
        &mut self,
        file: &mut ProjectFile,
        bus: &EventBus,
        settings: &CompileSettings,
    ) -> Result<(), CompileError>;
}

/// Default compiler: leaves content untouched and runs the compile hooks.
///
/// Used by the CLI when no real transform toolchain is wired in, and as a
/// baseline in tests.
#[derive(Debug, Default)]
pub struct PassthroughCompiler;

impl Compiler for PassthroughCompiler {
    fn compile(
        &mut self,
        file: &mut ProjectFile,
        _bus: &EventBus,
        settings: &CompileSettings,
    ) -> Result<(), CompileError> {
        if let Some(hook) = &settings.before_compile {
            hook(file);
        }
        if let Some(hook) = &settings.after_compile {
            hook(file);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passthrough_keeps_content() {
        let mut compiler = PassthroughCompiler;
        let bus = EventBus::new();
        let mut file = ProjectFile::new("/a.js", "var a;");

        compiler.compile(&mut file, &bus, &CompileSettings::default()).unwrap();
        assert_eq!(file.content, "var a;");
    }

    #[test]
    fn test_passthrough_runs_hooks() {
        let mut compiler = PassthroughCompiler;
        let bus = EventBus::new();
        let mut file = ProjectFile::new("/a.js", "");

        let settings = CompileSettings {
            before_compile: Some(Box::new(|f| f.content = "b".into())),
            after_compile: Some(Box::new(|f| {
                let text = format!("{}a", f.content.as_str().unwrap_or_default());
                f.content = text.into();
            })),
            ..Default::default()
        };
        compiler.compile(&mut file, &bus, &settings).unwrap();
        assert_eq!(file.content, "ba");
    }

    #[test]
    fn test_compile_error_message() {
        let err = CompileError::new("/a.js", "syntax error");
        assert_eq!(err.to_string(), "compile failed for /a.js: syntax error");
    }
}
