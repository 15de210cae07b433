//! # Directive tree
//!
//! The legacy dialect is a tree of `<name arg>` ... `</name>` blocks
//! holding `key value` lines. Elements render themselves with two spaces
//! of indentation per level, so emitted text never depends on string
//! templates lining up.

use std::fmt::{self, Write};

const INDENT: &str = "  ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Element {
    Comment(String),
    Line(String),
    Directive {
        name: String,
        arg: Option<String>,
        body: Vec<Element>,
    },
    Blank,
}

impl Element {
    pub fn comment(text: impl Into<String>) -> Self {
        Element::Comment(text.into())
    }

    pub fn line(text: impl Into<String>) -> Self {
        Element::Line(text.into())
    }

    /// A `key value` line
    pub fn kv(key: &str, value: impl fmt::Display) -> Self {
        Element::Line(format!("{} {}", key, value))
    }

    pub fn block(name: &str, arg: Option<&str>, body: Vec<Element>) -> Self {
        Element::Directive {
            name: name.to_string(),
            arg: arg.map(str::to_string),
            body,
        }
    }

    pub fn source(body: Vec<Element>) -> Self {
        Self::block("source", None, body)
    }

    pub fn label(label: &str, body: Vec<Element>) -> Self {
        Self::block("label", Some(label), body)
    }

    pub fn filter(tags: &str, body: Vec<Element>) -> Self {
        Self::block("filter", Some(tags), body)
    }

    pub fn matcher(tags: &str, body: Vec<Element>) -> Self {
        Self::block("match", Some(tags), body)
    }

    /// `<match tags>` forwarding to another label
    pub fn relabel(tags: &str, label: &str) -> Self {
        Self::matcher(
            tags,
            vec![Element::kv("@type", "relabel"), Element::kv("@label", label)],
        )
    }

    /// `<match tags>` discarding everything
    pub fn discard(tags: &str) -> Self {
        Self::matcher(tags, vec![Element::kv("@type", "null")])
    }

    /// A `record_modifier` filter over every event
    pub fn record_modifier(records: Vec<(String, String)>, remove_keys: &[&str]) -> Self {
        let mut body = vec![Element::kv("@type", "record_modifier")];
        if !records.is_empty() {
            body.push(Self::block(
                "record",
                None,
                records
                    .into_iter()
                    .map(|(k, v)| Element::Line(format!("{} {}", k, v)))
                    .collect(),
            ));
        }
        if !remove_keys.is_empty() {
            body.push(Element::kv("remove_keys", remove_keys.join(", ")));
        }
        Self::filter("**", body)
    }

    fn write_to(&self, out: &mut String, depth: usize) -> fmt::Result {
        let pad = INDENT.repeat(depth);
        match self {
            Element::Comment(text) => writeln!(out, "{}# {}", pad, text),
            Element::Line(text) => writeln!(out, "{}{}", pad, text),
            Element::Blank => writeln!(out),
            Element::Directive { name, arg, body } => {
                match arg {
                    Some(arg) => writeln!(out, "{}<{} {}>", pad, name, arg)?,
                    None => writeln!(out, "{}<{}>", pad, name)?,
                }
                for child in body {
                    child.write_to(out, depth + 1)?;
                }
                writeln!(out, "{}</{}>", pad, name)
            }
        }
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        self.write_to(&mut out, 0)?;
        f.write_str(&out)
    }
}

/// Render top-level elements, separated by blank lines
pub fn render(elements: &[Element]) -> String {
    let mut out = String::new();
    for (i, element) in elements.iter().enumerate() {
        if i > 0 && !matches!(element, Element::Blank) {
            out.push('\n');
        }
        // Writing into a String cannot fail
        let _ = element.write_to(&mut out, 0);
    }
    out
}

/// Single-quoted path value
pub fn quoted_path(path: &str) -> String {
    format!("'{}'", path)
}

/// Embedded Ruby reading a mounted secret file at collector start-up
pub fn read_file_expr(path: &str) -> String {
    format!(
        "\"#{{File.exists?('{p}') ? open('{p}','r') do |f|f.read end : ''}}\"",
        p = path
    )
}

/// Embedded Ruby reading a mounted secret file, nil when absent
pub fn read_file_or_nil(path: &str) -> String {
    format!("\"#{{File.read('{}') rescue nil}}\"", path)
}

/// Embedded Ruby reading an environment variable with a fallback
pub fn env_or(var: &str, default: &str) -> String {
    format!("\"#{{ENV['{}'] || '{}'}}\"", var, default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_render_nested_directives() {
        let label = Element::label(
            "@ES",
            vec![Element::matcher(
                "**",
                vec![
                    Element::kv("@type", "elasticsearch"),
                    Element::block("buffer", None, vec![Element::kv("@type", "file")]),
                ],
            )],
        );
        let expected = "\
<label @ES>
  <match **>
    @type elasticsearch
    <buffer>
      @type file
    </buffer>
  </match>
</label>
";
        assert_eq!(label.to_string(), expected);
    }

    #[test]
    fn test_render_separates_top_level_elements() {
        let text = render(&[Element::comment("header"), Element::discard("**")]);
        assert_eq!(text, "# header\n\n<match **>\n  @type null\n</match>\n");
    }

    #[test]
    fn test_record_modifier() {
        let filter = Element::record_modifier(
            vec![("log_type".into(), "application".into())],
            &["a", "b"],
        );
        assert_eq!(
            filter.to_string(),
            "<filter **>\n  @type record_modifier\n  <record>\n    log_type application\n  </record>\n  remove_keys a, b\n</filter>\n"
        );
    }

    #[test]
    fn test_secret_expressions() {
        assert_eq!(
            read_file_or_nil("/s/u"),
            "\"#{File.read('/s/u') rescue nil}\""
        );
        assert_eq!(
            env_or("BUFFER_QUEUE_LIMIT", "32"),
            "\"#{ENV['BUFFER_QUEUE_LIMIT'] || '32'}\""
        );
        assert!(read_file_expr("/s/p").starts_with("\"#{File.exists?('/s/p')"));
    }
}
