//! Ad hoc queries over the correlated catalog.
//!
//! Every query only sees resolved records. Each result carries the matching
//! records plus a content-type histogram over exactly those records.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::models::ManifestRecord;
use crate::normalize::Catalog;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    /// Exact match on the domain.
    Domain(String),
    /// Substring match on the content type.
    ContentType(String),
    /// Substring match on the path hint.
    PathHint(String),
}

impl Query {
    pub fn matches(&self, record: &ManifestRecord) -> bool {
        if !record.is_resolved() {
            return false;
        }
        match self {
            Query::Domain(domain) => record.domain == *domain,
            Query::ContentType(needle) => record.content_type.contains(needle.as_str()),
            Query::PathHint(needle) => record.path_hint.contains(needle.as_str()),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Query::Domain(d) => format!("domain = {}", d),
            Query::ContentType(t) => format!("content type contains {}", t),
            Query::PathHint(p) => format!("path hint contains {}", p),
        }
    }
}

#[derive(Debug)]
pub struct QueryResult<'a> {
    pub query: Query,
    pub records: Vec<&'a ManifestRecord>,
    pub histogram: BTreeMap<String, usize>,
}

pub fn run_query<'a>(catalog: &'a Catalog, query: &Query) -> QueryResult<'a> {
    let records: Vec<&ManifestRecord> = catalog.iter().filter(|r| query.matches(r)).collect();

    let mut histogram = BTreeMap::new();
    for record in &records {
        *histogram.entry(record.content_type.clone()).or_insert(0) += 1;
    }

    QueryResult {
        query: query.clone(),
        records,
        histogram,
    }
}

/// Print matching records and the histogram to stdout.
pub fn print_report(result: &QueryResult<'_>) {
    println!("query: {}", result.query.describe());
    println!("  matches: {}", result.records.len());

    if !result.records.is_empty() {
        println!();
        println!(
            "  {:<42} {:<28} {:<30} {}",
            "IDENTIFIER", "DOMAIN", "CONTENT TYPE", "PATH HINT"
        );
        println!("  {}", "-".repeat(120));
        for record in &result.records {
            println!(
                "  {:<42} {:<28} {:<30} {}",
                record.identifier, record.domain, record.content_type, record.path_hint
            );
            println!("      -> {}", record.resolved_path_display());
        }
    }

    if !result.histogram.is_empty() {
        println!();
        println!("  content types:");
        for (content_type, count) in &result.histogram {
            println!("    {:<40} {:>6}", content_type, count);
        }
    }
    println!();
}

#[derive(Serialize)]
struct ReportRecord<'a> {
    identifier: &'a str,
    domain: &'a str,
    path_hint: &'a str,
    resolved_path: String,
    content_type: &'a str,
}

#[derive(Serialize)]
struct Report<'a> {
    query: String,
    matches: usize,
    records: Vec<ReportRecord<'a>>,
    histogram: &'a BTreeMap<String, usize>,
}

/// JSON form of a query result.
pub fn report_json(result: &QueryResult<'_>) -> serde_json::Value {
    let report = Report {
        query: result.query.describe(),
        matches: result.records.len(),
        records: result
            .records
            .iter()
            .map(|r| ReportRecord {
                identifier: &r.identifier,
                domain: &r.domain,
                path_hint: &r.path_hint,
                resolved_path: r.resolved_path_display(),
                content_type: &r.content_type,
            })
            .collect(),
        histogram: &result.histogram,
    };
    serde_json::to_value(report).unwrap_or(serde_json::Value::Null)
}
