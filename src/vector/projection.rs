//! Text projections of structured content
//!
//! Embedding a raw JSON dump buries the meaningful fields in syntax noise, so
//! each document type is reduced to a short `Label: value | ...` line first.
//! Content with none of the recognized fields falls back to the raw dump.

use serde_json::{Map, Value};

use super::types::DocumentType;

const SEPARATOR: &str = " | ";

/// Builds the text that gets embedded for `content`
pub fn text_for_embedding(content: &Value, document_type: DocumentType) -> String {
    let Value::Object(fields) = content else {
        return raw_dump(content);
    };

    let parts = match document_type {
        DocumentType::FinancialData => financial_parts(fields),
        DocumentType::News => news_parts(fields),
        DocumentType::Report => report_parts(fields),
    };

    if parts.is_empty() {
        return match document_type {
            DocumentType::Report => format!("Report Content: {}", raw_dump(content)),
            _ => raw_dump(content),
        };
    }
    parts.join(SEPARATOR)
}

fn financial_parts(fields: &Map<String, Value>) -> Vec<String> {
    labeled(
        fields,
        &[
            ("symbol", "Symbol"),
            ("price", "Price"),
            ("volume", "Volume"),
            ("market_cap", "Market Cap"),
            ("pe_ratio", "P/E Ratio"),
        ],
    )
}

fn news_parts(fields: &Map<String, Value>) -> Vec<String> {
    labeled(
        fields,
        &[("title", "Title"), ("summary", "Summary"), ("sentiment", "Sentiment")],
    )
}

fn report_parts(fields: &Map<String, Value>) -> Vec<String> {
    let mut parts = labeled(fields, &[("executive_summary", "Executive Summary")]);

    if let Some(Value::Array(points)) = fields.get("key_investment_points") {
        let joined: Vec<String> = points.iter().map(display).collect();
        parts.push(format!("Key Points: {}", joined.join("; ")));
    }

    parts.extend(labeled(
        fields,
        &[
            ("investment_recommendation", "Recommendation"),
            ("risk_assessment", "Risk Assessment"),
            ("time_horizon", "Time Horizon"),
            ("confidence_level", "Confidence Level"),
        ],
    ));

    if let Some(Value::Object(financial)) = fields.get("financial_summary") {
        parts.extend(labeled(
            financial,
            &[
                ("alpha_vantage", "Alpha Vantage"),
                ("finnhub", "Finnhub"),
                ("yahoo_finance", "Yahoo Finance"),
            ],
        ));
    }

    if let Some(Value::Object(web)) = fields.get("web_data") {
        parts.extend(labeled(
            web,
            &[("news_summary", "News Summary"), ("market_sentiment", "Market Sentiment")],
        ));
    }

    parts
}

fn labeled(fields: &Map<String, Value>, labels: &[(&str, &str)]) -> Vec<String> {
    labels
        .iter()
        .filter_map(|(key, label)| {
            fields
                .get(*key)
                .map(|value| format!("{}: {}", label, display(value)))
        })
        .collect()
}

/// Strings are shown bare, everything else as compact JSON
fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn raw_dump(content: &Value) -> String {
    content.to_string()
}
