//! Result formatters: table, JSON, YAML and bare names.

use std::io::Write;

use anyhow::{Context, Result};
use clap::ValueEnum;
use kubeql_core::value::Value;
use kubeql_query::QueryResult;
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

const PADDING: usize = 2;
const MIN_WIDTH: usize = 10;
const MAX_WIDTH: usize = 50;
const ELLIPSIS: &str = "...";

pub const EMPTY_TABLE: &str = "No resources found";

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, ValueEnum)]
pub enum Format {
    #[default]
    Table,
    Json,
    Yaml,
    Name,
}

pub fn print<W: Write>(out: &mut W, res: &QueryResult, format: Format, headers: bool) -> Result<()> {
    match format {
        Format::Table => table(out, res, headers),
        Format::Json => {
            serde_json::to_writer_pretty(&mut *out, &Rows(res)).context("encoding JSON")?;
            writeln!(out)?;
            Ok(())
        }
        Format::Yaml => {
            if res.is_empty() {
                writeln!(out, "[]")?;
                return Ok(());
            }
            serde_yaml::to_writer(&mut *out, &Rows(res)).context("encoding YAML")
        }
        Format::Name => names(out, res),
    }
}

fn cell(v: Option<&Value>) -> String {
    v.map(ToString::to_string).unwrap_or_default()
}

fn table<W: Write>(out: &mut W, res: &QueryResult, headers: bool) -> Result<()> {
    if res.is_empty() {
        writeln!(out, "{}", EMPTY_TABLE)?;
        return Ok(());
    }
    let cells: Vec<Vec<String>> = res.rows.iter().map(|row| row.iter().map(|v| cell(v.as_ref())).collect()).collect();
    let mut widths = vec![MIN_WIDTH; res.columns.len()];
    let titles: Vec<String> = res.columns.iter().map(|c| c.title.clone()).collect();
    for row in std::iter::once(&titles).chain(&cells) {
        for (i, c) in row.iter().enumerate() {
            widths[i] = widths[i].max(c.chars().count().min(MAX_WIDTH));
        }
    }
    if headers {
        write_row(out, &titles, &widths)?;
    }
    for row in &cells {
        write_row(out, row, &widths)?;
    }
    Ok(())
}

fn write_row<W: Write>(out: &mut W, row: &[String], widths: &[usize]) -> Result<()> {
    let mut line = String::new();
    for (c, w) in row.iter().zip(widths) {
        let shown = truncate(c);
        line.push_str(&shown);
        let pad = (w + PADDING).saturating_sub(shown.chars().count());
        line.extend(std::iter::repeat(' ').take(pad));
    }
    writeln!(out, "{}", line.trim_end())?;
    Ok(())
}

fn truncate(s: &str) -> std::borrow::Cow<'_, str> {
    if s.chars().count() <= MAX_WIDTH {
        return s.into();
    }
    let head: String = s.chars().take(MAX_WIDTH - ELLIPSIS.len()).collect();
    format!("{head}{ELLIPSIS}").into()
}

fn names<W: Write>(out: &mut W, res: &QueryResult) -> Result<()> {
    for row in &res.rows {
        let name = cell(row.first().and_then(Option::as_ref));
        if !name.is_empty() {
            writeln!(out, "{}", name)?;
        }
    }
    Ok(())
}

/// Rows as a sequence of maps keyed by column title, in column order.
struct Rows<'a>(&'a QueryResult);

struct Row<'a> {
    res: &'a QueryResult,
    values: &'a [Option<Value>],
}

impl Serialize for Rows<'_> {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        let mut seq = s.serialize_seq(Some(self.0.rows.len()))?;
        for values in &self.0.rows {
            seq.serialize_element(&Row { res: self.0, values })?;
        }
        seq.end()
    }
}

impl Serialize for Row<'_> {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        let mut map = s.serialize_map(Some(self.res.columns.len()))?;
        for (col, v) in self.res.columns.iter().zip(self.values) {
            let json = v.as_ref().map(Value::to_json).unwrap_or(serde_json::Value::Null);
            map.serialize_entry(&col.title, &json)?;
        }
        map.end()
    }
}
