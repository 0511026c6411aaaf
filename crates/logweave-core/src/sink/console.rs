//! Colorized console output.

use std::collections::BTreeMap;
use std::io::{self, IsTerminal, Write};
use std::sync::Arc;

use parking_lot::Mutex;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::severity::Severity;

/// Default line template. `{time}`, `{level}` and `{name}` are substituted;
/// the trace tag and message follow the template.
pub const DEFAULT_TEMPLATE: &str = "{time}\t{level}\t{name}";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Literal(String),
    Time,
    Level,
    Name,
}

fn parse_template(template: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        let Some(len) = rest[start..].find('}') else {
            break;
        };
        let token = match &rest[start + 1..start + len] {
            "time" => Some(Token::Time),
            "level" => Some(Token::Level),
            "name" => Some(Token::Name),
            _ => None,
        };
        match token {
            Some(token) => {
                if start > 0 {
                    tokens.push(Token::Literal(rest[..start].to_string()));
                }
                tokens.push(token);
            }
            None => tokens.push(Token::Literal(rest[..start + len + 1].to_string())),
        }
        rest = &rest[start + len + 1..];
    }
    if !rest.is_empty() {
        tokens.push(Token::Literal(rest.to_string()));
    }
    tokens
}

/// Severity → color table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleTable {
    colors: BTreeMap<Severity, Color>,
}

impl Default for StyleTable {
    fn default() -> Self {
        let colors = [
            (Severity::Silly, Color::White),
            (Severity::Trace, Color::Magenta),
            (Severity::Debug, Color::Blue),
            (Severity::Info, Color::Green),
            (Severity::Warn, Color::Yellow),
            (Severity::Error, Color::Red),
            (Severity::Fatal, Color::Red),
        ]
        .into_iter()
        .collect();
        Self { colors }
    }
}

impl StyleTable {
    /// Apply overrides from a name → color-name map, e.g. `{"info": "cyan"}`
    /// or `{"debug": "244"}`. Unknown severities or colors are skipped.
    pub fn with_overrides<'a, I>(mut self, overrides: I) -> Self
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        for (severity, color) in overrides {
            let Ok(severity) = severity.parse::<Severity>() else {
                tracing::warn!(severity = %severity, "Ignoring style for unknown severity");
                continue;
            };
            match color.parse::<Color>() {
                Ok(color) => {
                    self.colors.insert(severity, color);
                }
                Err(e) => tracing::warn!(color = %color, error = %e, "Ignoring unknown color"),
            }
        }
        self
    }

    pub fn color(&self, severity: Severity) -> Color {
        self.colors.get(&severity).cloned().unwrap_or(Color::White)
    }
}

/// One console line, already rendered to text.
#[derive(Debug, Clone)]
pub struct ConsoleLine<'a> {
    pub timestamp: &'a str,
    pub severity: Severity,
    pub name: Option<&'a str>,
    /// Trace id with its 256-color palette index
    pub trace: Option<(&'a str, u8)>,
    pub message: &'a str,
}

/// Console writer. Lines are written under a lock so concurrent calls never
/// interleave.
pub struct ConsoleSink {
    out: Arc<Mutex<Box<dyn WriteColor + Send>>>,
    template: Vec<Token>,
    styles: StyleTable,
}

impl ConsoleSink {
    /// Write to stdout, coloring when it is a terminal.
    pub fn stdout() -> Self {
        let choice = if io::stdout().is_terminal() {
            ColorChoice::Auto
        } else {
            ColorChoice::Never
        };
        Self::with_writer(Box::new(StandardStream::stdout(choice)))
    }

    /// Write to any color-capable writer.
    pub fn with_writer(out: Box<dyn WriteColor + Send>) -> Self {
        Self {
            out: Arc::new(Mutex::new(out)),
            template: parse_template(DEFAULT_TEMPLATE),
            styles: StyleTable::default(),
        }
    }

    pub fn with_template(mut self, template: &str) -> Self {
        self.template = parse_template(template);
        self
    }

    pub fn with_styles(mut self, styles: StyleTable) -> Self {
        self.styles = styles;
        self
    }

    /// Write one line. Console failures are ignored.
    pub fn write_line(&self, line: &ConsoleLine<'_>) {
        let mut out = self.out.lock();
        let _ = self.render(&mut **out, line);
        let _ = out.flush();
    }

    fn render(&self, out: &mut dyn WriteColor, line: &ConsoleLine<'_>) -> io::Result<()> {
        for token in &self.template {
            match token {
                Token::Literal(text) => write!(out, "{}", text)?,
                Token::Time => {
                    out.set_color(ColorSpec::new().set_dimmed(true))?;
                    write!(out, "{}", line.timestamp)?;
                    out.reset()?;
                }
                Token::Level => {
                    let color = self.styles.color(line.severity);
                    out.set_color(
                        ColorSpec::new()
                            .set_fg(Some(color))
                            .set_bold(line.severity >= Severity::Error),
                    )?;
                    write!(out, "{}", line.severity.label())?;
                    out.reset()?;
                }
                Token::Name => {
                    if let Some(name) = line.name {
                        write!(out, "[{}] ", name)?;
                    }
                }
            }
        }
        if let Some((trace_id, color)) = line.trace {
            out.set_color(ColorSpec::new().set_fg(Some(Color::Ansi256(color))))?;
            write!(out, "[{}] ", trace_id)?;
            out.reset()?;
        }
        writeln!(out, "{}", line.message)
    }

    pub fn flush(&self) {
        let _ = self.out.lock().flush();
    }
}

/// In-memory writer that can be cloned and read back; for capturing console
/// output in tests and tools.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
