//! Call stack capture and trimming.
//!
//! Frames are kept innermost first. Trimming hides the frames of this crate
//! and of the logging library, so the reported trace starts at the
//! application's log call site.

use crate::config::StackConfig;
use serde::Serialize;

/// Root module of this crate, as it appears in demangled symbol names.
pub const BRIDGE_MODULE: &str = env!("CARGO_CRATE_NAME");

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StackFrame {
    /// Module path the function lives in, e.g. `my_app::handlers`.
    pub module: String,
    pub function: String,
    pub file: Option<String>,
    pub line: Option<u32>,
}

impl StackFrame {
    /// Frame for a demangled function path; the module is everything before
    /// the last path segment.
    pub fn new(function: impl Into<String>) -> Self {
        let function = function.into();
        Self {
            module: module_of(&function),
            function,
            file: None,
            line: None,
        }
    }

    pub fn with_location(mut self, file: impl Into<String>, line: u32) -> Self {
        self.file = Some(file.into());
        self.line = Some(line);
        self
    }

    /// Whether the frame's module is `module` or nested below it.
    pub fn belongs_to(&self, module: &str) -> bool {
        match self.module.strip_prefix(module) {
            Some(rest) => !module.is_empty() && (rest.is_empty() || rest.starts_with("::")),
            None => false,
        }
    }

    fn from_symbol(symbol: &backtrace::BacktraceSymbol) -> Self {
        let function = symbol
            .name()
            .map(|name| format!("{:#}", name))
            .unwrap_or_else(|| "<unknown>".to_string());
        let mut frame = StackFrame::new(function);
        frame.file = symbol.filename().map(|path| path.display().to_string());
        frame.line = symbol.lineno();
        frame
    }
}

/// Module path of a demangled symbol such as
/// `<my_app::Writer as std::io::Write>::write` (-> `my_app`) or
/// `my_app::handlers::create::{{closure}}` (-> `my_app::handlers::create`).
fn module_of(function: &str) -> String {
    let mut path = function.trim_start_matches(['<', '&']);
    for prefix in ["mut ", "dyn "] {
        path = path.strip_prefix(prefix).unwrap_or(path);
    }
    let end = path.find([' ', '<', '>', '(']).unwrap_or(path.len());
    let path = &path[..end];

    match path.rsplit_once("::") {
        Some((module, _)) => module.to_string(),
        None => String::new(),
    }
}

/// Capture the current call stack, innermost frame first. Inlined
/// functions appear as separate frames.
pub fn capture() -> Vec<StackFrame> {
    let trace = backtrace::Backtrace::new();
    trace
        .frames()
        .iter()
        .flat_map(|frame| frame.symbols().iter().map(StackFrame::from_symbol))
        .collect()
}

/// Capture the current call stack and trim it with [`prune`].
pub fn capture_trimmed(config: &StackConfig) -> Vec<StackFrame> {
    prune(capture(), config)
}

/// Trim internal frames from an innermost-first stack.
///
/// 1. Leading frames of `internal_modules` are dropped. The outermost frame
///    always survives this step.
/// 2. Scanning outward, the first frame of `logger_modules` starts a run
///    that extends over logger frames (and `passthrough_modules` frames
///    between them). If any frame follows the run, the stack starts there.
///    The outermost frame never starts a run.
pub fn prune(mut frames: Vec<StackFrame>, config: &StackConfig) -> Vec<StackFrame> {
    let n = frames.len();
    if n == 0 {
        return frames;
    }

    let in_any = |frame: &StackFrame, modules: &[String]| modules.iter().any(|m| frame.belongs_to(m));
    let is_logger = |frame: &StackFrame| in_any(frame, &config.logger_modules);

    let mut start = 0;
    while start + 1 < n && in_any(&frames[start], &config.internal_modules) {
        start += 1;
    }

    if let Some(run_start) = (start..n - 1).find(|&i| is_logger(&frames[i])) {
        let mut run_end = run_start + 1;
        let mut i = run_start + 1;
        while i < n {
            if is_logger(&frames[i]) {
                i += 1;
                run_end = i;
            } else if in_any(&frames[i], &config.passthrough_modules) {
                i += 1;
            } else {
                break;
            }
        }
        if run_end < n {
            start = run_end;
        }
    }

    frames.drain(..start);
    frames
}
