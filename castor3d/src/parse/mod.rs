//! Block structured text files.
//!
//! Files are lines of `directive parameters`, where a directive can open a
//! `{ ... }` block holding the directives of a child section:
//!
//! ```text
//! scene "Demo" {
//!     // line comment
//!     scene_node "Pivot" {
//!         position 0 1 0
//!     }
//! }
//! ```
//!
//! [`FileParser`] handles comments, braces, the section stack and
//! diagnostics, and dispatches every `(section, directive)` pair to a
//! registered [`DirectiveFn`]. Unknown directives are reported and skipped,
//! along with any block they open.

use std::{fmt, hash::Hash, path::Path, str::FromStr};

use crate::{
    util::typedefs::{FastHashMap, SsoString},
    ParseError,
};

mod scene;

pub use scene::*;

/// Sections a [`FileParser`] moves through.
pub trait Section: Copy + Eq + Hash + fmt::Debug {
    /// Section at the top of every file.
    const ROOT: Self;

    fn name(self) -> &'static str;
}

/// Handles one directive. Returns the section a following block opens, if
/// the directive takes a block.
pub type DirectiveFn<S, C> = fn(&mut C, &mut Directive<'_>) -> Result<Option<S>, ParseError>;

/// Runs when the block of a section closes.
pub type CloseFn<C> = fn(&mut C, &mut Directive<'_>) -> Result<(), ParseError>;

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Error,
}

/// A problem found while parsing. None of them stop the parse.
#[derive(Debug)]
pub struct Diagnostic {
    pub severity: Severity,
    pub line: usize,
    /// Section stack and directive, such as `Root::scene::scene_node::position`.
    pub context: String,
    pub error: ParseError,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: [{}] {}", self.line, self.context, self.error)
    }
}

/// Everything a parse reported.
#[derive(Debug, Default)]
pub struct ParseReport {
    pub source: String,
    pub lines: usize,
    pub diagnostics: Vec<Diagnostic>,
}

impl ParseReport {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.severity == Severity::Error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.severity == Severity::Warning)
    }
}

/// The directive being handled, with helpers to read its parameters.
pub struct Directive<'a> {
    pub name: &'a str,
    pub params: &'a str,
    pub line: usize,
    warnings: &'a mut Vec<ParseError>,
}

impl<'a> Directive<'a> {
    /// Reports a problem which doesn't invalidate the directive.
    pub fn warn(&mut self, error: ParseError) {
        self.warnings.push(error);
    }

    pub fn invalid(&self, message: impl Into<String>) -> ParseError {
        ParseError::InvalidParameters {
            directive: self.name.into(),
            message: message.into(),
        }
    }

    /// The parameters as one name, without surrounding quotes.
    pub fn name_param(&self) -> Result<&'a str, ParseError> {
        let name = unquote(self.params);
        if name.is_empty() {
            return Err(self.invalid("expected a name"));
        }
        Ok(name)
    }

    /// Same as [`Self::name_param`], but an absent name is fine.
    pub fn optional_name_param(&self) -> Option<&'a str> {
        Some(unquote(self.params)).filter(|name| !name.is_empty())
    }

    /// Parameters split on whitespace and commas.
    pub fn tokens(&self) -> impl Iterator<Item = &'a str> {
        self.params
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|token| !token.is_empty())
    }

    pub fn parse<T: FromStr>(&self) -> Result<T, ParseError> {
        let text = unquote(self.params);
        text.parse()
            .map_err(|_| self.invalid(format!("can't read {:?} as {}", text, std::any::type_name::<T>())))
    }

    /// Between `min` and `N` numbers. Missing trailing values are `fill`.
    pub fn numbers<T: FromStr + Copy, const N: usize>(&self, min: usize, fill: T) -> Result<[T; N], ParseError> {
        let mut values = [fill; N];
        let mut count = 0;
        for token in self.tokens() {
            if count == N {
                return Err(self.invalid(format!("expected at most {} values", N)));
            }
            values[count] = token
                .parse()
                .map_err(|_| self.invalid(format!("{:?} isn't a number", token)))?;
            count += 1;
        }
        if count < min {
            return Err(self.invalid(format!("expected at least {} values, got {}", min, count)));
        }
        Ok(values)
    }

    pub fn boolean(&self) -> Result<bool, ParseError> {
        match unquote(self.params) {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            other => Err(self.invalid(format!("{:?} isn't a boolean", other))),
        }
    }
}

fn unquote(text: &str) -> &str {
    let text = text.trim();
    text.strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(text)
}

/// Removes `//` and `/* */` comments, keeping every newline so line numbers
/// don't move.
pub fn strip_comments(text: &str) -> String {
    let mut output = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    let mut in_block = false;
    let mut in_string = false;

    while let Some(c) = chars.next() {
        if in_block {
            if c == '*' && chars.peek() == Some(&'/') {
                chars.next();
                in_block = false;
            } else if c == '\n' {
                output.push('\n');
            }
            continue;
        }
        match c {
            '"' => {
                in_string = !in_string;
                output.push(c);
            }
            '\n' => {
                in_string = false;
                output.push(c);
            }
            '/' if !in_string && chars.peek() == Some(&'/') => {
                while chars.peek().map_or(false, |&next| next != '\n') {
                    chars.next();
                }
            }
            '/' if !in_string && chars.peek() == Some(&'*') => {
                chars.next();
                in_block = true;
                output.push(' ');
            }
            _ => output.push(c),
        }
    }
    output
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Frame<S> {
    Section(S),
    /// Block of an unknown or failed directive.
    Ignored,
}

/// Dispatches directives section by section. See the module docs.
pub struct FileParser<S, C> {
    directives: FastHashMap<(S, SsoString), DirectiveFn<S, C>>,
    closers: FastHashMap<S, CloseFn<C>>,
}

impl<S: Section, C> Default for FileParser<S, C> {
    fn default() -> Self {
        Self::new()
    }
}

struct ParseState<S> {
    stack: Vec<Frame<S>>,
    /// Frame the next `{` opens.
    pending: Option<Frame<S>>,
    diagnostics: Vec<Diagnostic>,
    line: usize,
}

impl<S: Section> ParseState<S> {
    fn current(&self) -> Option<Frame<S>> {
        self.stack.last().copied()
    }

    fn context(&self, directive: &str) -> String {
        let mut context = String::from(S::ROOT.name());
        for frame in &self.stack {
            context.push_str("::");
            context.push_str(match frame {
                Frame::Section(section) => section.name(),
                Frame::Ignored => "<ignored>",
            });
        }
        if !directive.is_empty() {
            context.push_str("::");
            context.push_str(directive);
        }
        context
    }

    fn report(&mut self, severity: Severity, directive: &str, error: ParseError) {
        let diagnostic = Diagnostic {
            severity,
            line: self.line,
            context: self.context(directive),
            error,
        };
        match severity {
            Severity::Warning => log::warn!("{}", diagnostic),
            Severity::Error => log::error!("{}", diagnostic),
        }
        self.diagnostics.push(diagnostic);
    }
}

impl<S: Section, C> FileParser<S, C> {
    pub fn new() -> Self {
        Self {
            directives: FastHashMap::default(),
            closers: FastHashMap::default(),
        }
    }

    pub fn add_directive(&mut self, section: S, name: &str, handler: DirectiveFn<S, C>) -> &mut Self {
        self.directives.insert((section, SsoString::from(name)), handler);
        self
    }

    pub fn on_close(&mut self, section: S, handler: CloseFn<C>) -> &mut Self {
        self.closers.insert(section, handler);
        self
    }

    pub fn parse_file(&self, context: &mut C, path: impl AsRef<Path>) -> Result<ParseReport, ParseError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ParseError::Io {
            path: path.to_owned(),
            source,
        })?;
        Ok(self.parse_str(context, &path.display().to_string(), &text))
    }

    pub fn parse_str(&self, context: &mut C, source: &str, text: &str) -> ParseReport {
        profiling::scope!("FileParser::parse_str");
        log::debug!("Parsing {}", source);

        let stripped = strip_comments(text);
        let mut state = ParseState {
            stack: Vec::new(),
            pending: None,
            diagnostics: Vec::new(),
            line: 0,
        };

        for (index, raw) in stripped.lines().enumerate() {
            state.line = index + 1;
            let mut line = raw.trim();
            if line.is_empty() {
                continue;
            }

            if line == "{" {
                match state.pending.take() {
                    Some(frame) => state.stack.push(frame),
                    None => {
                        // a stray block is skipped whole
                        let error = ParseError::UnknownDirective { directive: "{".into() };
                        state.report(Severity::Warning, "{", error);
                        state.stack.push(Frame::Ignored);
                    }
                }
                continue;
            }

            // A section directive not followed by a block opens and closes
            // an empty one.
            if let Some(frame) = state.pending.take() {
                state.stack.push(frame);
                self.close(context, &mut state);
            }

            while let Some(rest) = line.strip_prefix('}') {
                self.close(context, &mut state);
                line = rest.trim_start();
            }
            if line.is_empty() {
                continue;
            }

            let (line, opens_block) = match line.strip_suffix('{') {
                Some(rest) => (rest.trim_end(), true),
                None => (line, false),
            };
            let (name, params) = match line.split_once(char::is_whitespace) {
                Some((name, params)) => (name, params.trim()),
                None => (line, ""),
            };

            let opened = self.dispatch(context, &mut state, name, params);
            if opens_block {
                state.stack.push(opened);
            } else {
                state.pending = Some(opened);
            }
        }

        if let Some(frame) = state.pending.take() {
            state.stack.push(frame);
            self.close(context, &mut state);
        }
        if !state.stack.is_empty() {
            let open = state.stack.len();
            state.report(Severity::Error, "", ParseError::UnexpectedEof { open });
        }

        ParseReport {
            source: source.to_owned(),
            lines: state.line,
            diagnostics: state.diagnostics,
        }
    }

    /// Runs a directive in the current section and returns the frame a
    /// block following it would open.
    fn dispatch(&self, context: &mut C, state: &mut ParseState<S>, name: &str, params: &str) -> Frame<S> {
        let section = match state.current() {
            None => S::ROOT,
            Some(Frame::Section(section)) => section,
            Some(Frame::Ignored) => return Frame::Ignored,
        };

        let Some(handler) = self.directives.get(&(section, SsoString::from(name))) else {
            state.report(
                Severity::Warning,
                name,
                ParseError::UnknownDirective { directive: name.into() },
            );
            return Frame::Ignored;
        };

        let mut warnings = Vec::new();
        let mut directive = Directive {
            name,
            params,
            line: state.line,
            warnings: &mut warnings,
        };
        let result = handler(context, &mut directive);
        for warning in warnings {
            state.report(Severity::Warning, name, warning);
        }
        match result {
            Ok(Some(section)) => Frame::Section(section),
            // a block after a directive which takes none is skipped
            Ok(None) => Frame::Ignored,
            Err(error) => {
                state.report(Severity::Error, name, error);
                Frame::Ignored
            }
        }
    }

    fn close(&self, context: &mut C, state: &mut ParseState<S>) {
        let Some(frame) = state.stack.last().copied() else {
            state.report(Severity::Error, "}", ParseError::UnbalancedBrace);
            return;
        };
        if let Frame::Section(section) = frame {
            if let Some(handler) = self.closers.get(&section) {
                let mut warnings = Vec::new();
                let mut directive = Directive {
                    name: "}",
                    params: "",
                    line: state.line,
                    warnings: &mut warnings,
                };
                let result = handler(context, &mut directive);
                for warning in warnings {
                    state.report(Severity::Warning, "}", warning);
                }
                if let Err(error) = result {
                    state.report(Severity::Error, "}", error);
                }
            }
        }
        state.stack.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::{strip_comments, Directive, FileParser, Section, Severity};
    use crate::ParseError;

    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    enum Test {
        Root,
        Block,
    }

    impl Section for Test {
        const ROOT: Self = Test::Root;

        fn name(self) -> &'static str {
            match self {
                Test::Root => "root",
                Test::Block => "block",
            }
        }
    }

    #[derive(Default)]
    struct Log(Vec<String>);

    fn block(log: &mut Log, d: &mut Directive<'_>) -> Result<Option<Test>, ParseError> {
        log.0.push(format!("open {}", d.params));
        Ok(Some(Test::Block))
    }

    fn value(log: &mut Log, d: &mut Directive<'_>) -> Result<Option<Test>, ParseError> {
        let [v] = d.numbers::<i32, 1>(1, 0)?;
        log.0.push(format!("value {}", v));
        Ok(None)
    }

    fn close(log: &mut Log, _: &mut Directive<'_>) -> Result<(), ParseError> {
        log.0.push("close".into());
        Ok(())
    }

    fn parser() -> FileParser<Test, Log> {
        let mut parser = FileParser::new();
        parser
            .add_directive(Test::Root, "block", block)
            .add_directive(Test::Block, "block", block)
            .add_directive(Test::Block, "value", value)
            .on_close(Test::Block, close);
        parser
    }

    #[test]
    fn comments_keep_line_numbers() {
        let stripped = strip_comments("a // b\n/* c\nd */ e\n\"//kept\"");
        assert_eq!(stripped.lines().count(), 4);
        assert_eq!(stripped.lines().nth(2).unwrap().trim(), "e");
        assert_eq!(stripped.lines().nth(3).unwrap(), "\"//kept\"");
    }

    #[test]
    fn nested_blocks_and_braces() {
        let mut log = Log::default();
        let text = "block a {\n  value 1\n  block b\n  {\n    value 2\n  }\n}\n";
        let report = parser().parse_str(&mut log, "test", text);
        assert!(report.diagnostics.is_empty(), "{:?}", report.diagnostics);
        assert_eq!(log.0, ["open a", "value 1", "open b", "value 2", "close", "close"]);
    }

    #[test]
    fn unknown_block_is_skipped_whole() {
        let mut log = Log::default();
        let text = "block a {\n  mystery {\n    value 1\n    inner {\n      value 2\n    }\n    value 3\n  }\n  value 4\n}\n";
        let report = parser().parse_str(&mut log, "test", text);
        assert_eq!(log.0, ["open a", "value 4", "close"]);
        assert_eq!(report.warnings().count(), 1);
        let warning = report.warnings().next().unwrap();
        assert_eq!(warning.line, 2);
        assert_eq!(warning.context, "root::block::mystery");
    }

    #[test]
    fn bad_parameters_and_eof() {
        let mut log = Log::default();
        let report = parser().parse_str(&mut log, "test", "block a {\n  value x\n");
        assert!(report.has_errors());
        let kinds: Vec<_> = report.errors().map(|d| &d.error).collect();
        assert!(matches!(kinds[0], ParseError::InvalidParameters { .. }));
        assert!(matches!(kinds[1], ParseError::UnexpectedEof { open: 1 }));
        assert!(report.diagnostics.iter().all(|d| d.severity == Severity::Error));
    }

    #[test]
    fn section_without_block_closes_at_once() {
        let mut log = Log::default();
        let report = parser().parse_str(&mut log, "test", "block a\nblock b {\n}\n");
        assert!(report.diagnostics.is_empty());
        assert_eq!(log.0, ["open a", "close", "open b", "close"]);
    }
}
