use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::domain::{
    detection::DetectionRecord,
    errors::{DomainError, DomainResult},
};

const CSV_HEADER: &str = "timestamp,class,confidence,x,y,width,height";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv; charset=utf-8",
            ExportFormat::Json => "application/json",
        }
    }
}

/// A serialized ledger ready to be sent as an attachment.
#[derive(Debug, Clone)]
pub struct ExportFile {
    pub format: ExportFormat,
    pub filename: String,
    pub body: Vec<u8>,
}

pub fn export(records: &[DetectionRecord], format: ExportFormat) -> DomainResult<ExportFile> {
    if records.is_empty() {
        return Err(DomainError::NotFound("No detection results available".into()));
    }
    let body = match format {
        ExportFormat::Csv => to_csv(records).into_bytes(),
        ExportFormat::Json => serde_json::to_vec_pretty(records)
            .map_err(|e| DomainError::OperationFailed(format!("json export: {e}")))?,
    };
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    Ok(ExportFile {
        format,
        filename: format!("detection_results_{}.{}", stamp, format.extension()),
        body,
    })
}

pub fn to_csv(records: &[DetectionRecord]) -> String {
    let mut out = String::with_capacity(64 * (records.len() + 1));
    out.push_str(CSV_HEADER);
    out.push_str("\r\n");
    for r in records {
        let _ = write!(
            out,
            "{},{},{},{},{},{},{}\r\n",
            csv_field(&r.timestamp),
            csv_field(&r.class),
            r.confidence,
            r.x,
            r.y,
            r.width,
            r.height
        );
    }
    out
}

/// Quotes a field when it contains a delimiter, quote or line break.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
