//! jsonify - Re-indent, minify and check JSON files
//!
//! A small tool built on scripto: each command is a plain function with a
//! docstring, and the command line is derived from it.
//!
//! # Examples
//!
//! ```bash
//! jsonify prettify data.json --indent 2
//! jsonify minify data.json --write
//! jsonify check a.json b.json
//! jsonify            # interactive shell
//! ```

use std::fs;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::Value;

use scripto::{Arguments, Function, InteractiveMode, Param, ParamType, Registration, Scripto, Settings};

fn main() -> Result<()> {
    let settings = Settings::new("Re-indent, minify and check JSON files")
        .name("jsonify")
        .auto_log(true)
        .interactive(InteractiveMode::Default)
        .title_color("cyan");

    let mut app = Scripto::new(settings);
    register(&mut app)?;
    app.run()?;
    Ok(())
}

fn register(app: &mut Scripto) -> scripto::Result<()> {
    app.register(
        Function::new(
            "prettify",
            "Pretty-print a JSON file. Object keys come out sorted.
            :param path: File to read.
            :param indent: Spaces per indentation level.
            :param write: Rewrite the file instead of printing.",
        )
        .param(Param::new("path", ParamType::Str))
        .param(Param::new("indent", ParamType::Int).default(4))
        .param(Param::new("write", ParamType::Bool)),
        Registration::new().alias("pretty").choices("indent", [2, 4, 8]),
        prettify,
    )?;

    app.register(
        Function::new(
            "minify",
            "Strip all insignificant whitespace from a JSON file.
            :param path: File to read.
            :param write: Rewrite the file instead of printing.",
        )
        .param(Param::new("path", ParamType::Str))
        .param(Param::new("write", ParamType::Bool)),
        Registration::new().alias("min"),
        minify,
    )?;

    app.register(
        Function::new(
            "check",
            "Check that files contain valid JSON.
            :param paths: Files to check.",
        )
        .param(Param::new("paths", ParamType::StrList)),
        Registration::new(),
        check,
    )?;

    Ok(())
}

fn prettify(args: &Arguments) -> Result<Option<String>> {
    let path = args.str("path")?;
    let value = read_json(path)?;
    let text = pretty_text(&value, args.int("indent")?)?;
    output(path, text, args.bool("write")?)
}

fn minify(args: &Arguments) -> Result<Option<String>> {
    let path = args.str("path")?;
    let value = read_json(path)?;
    let text = serde_json::to_string(&value)?;
    output(path, text, args.bool("write")?)
}

fn check(args: &Arguments) -> Result<Option<String>> {
    let mut lines = Vec::new();
    let mut failed = 0;
    for path in args.list("paths")? {
        match read_json(path) {
            Ok(_) => lines.push(format!("ok      {}", path)),
            Err(e) => {
                failed += 1;
                lines.push(format!("invalid {}: {:#}", path, e));
            }
        }
    }
    tracing::info!("Checked {} files, {} invalid", lines.len(), failed);
    Ok(Some(lines.join("\n")))
}

fn read_json(path: &str) -> Result<Value> {
    let text = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse {}", path))
}

fn pretty_text(value: &Value, indent: i64) -> Result<String> {
    let indent = " ".repeat(usize::try_from(indent).unwrap_or(0));
    let formatter = PrettyFormatter::with_indent(indent.as_bytes());
    let mut buf = Vec::new();
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut serializer)?;
    Ok(String::from_utf8(buf)?)
}

/// Print the text, or write it back to the file
fn output(path: &str, text: String, write: bool) -> Result<Option<String>> {
    if !write {
        return Ok(Some(text));
    }
    fs::write(path, format!("{}\n", text)).with_context(|| format!("Failed to write {}", path))?;
    tracing::debug!("Rewrote {}", path);
    Ok(None)
}
