//! Human-readable run report

use crate::ingestion::{IngestionStatus, Summary};

fn rule() -> String {
    "=".repeat(60)
}

/// Group digits of a row count: 1234567 -> "1,234,567".
pub fn format_count(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

pub fn render_summary(summary: &Summary) -> String {
    let mut out = String::new();

    out.push_str(&format!("\n{}\n📊 IMPORT SUMMARY\n{}\n", rule(), rule()));
    out.push_str(&format!("✅ Successfully imported: {} table(s)\n", summary.succeeded));
    out.push_str(&format!("❌ Failed: {} table(s)\n", summary.failed));
    out.push_str(&format!("📁 Total files processed: {}\n", summary.total_files));

    if summary.failed > 0 {
        out.push_str("\n❌ Failures:\n");
        for result in summary.failures() {
            out.push_str(&format!(
                "   • {} [{}]: {}\n",
                result.source.display(),
                status_label(&result.status),
                result.error.as_deref().unwrap_or("unknown error")
            ));
        }
    }

    let mismatches: Vec<_> = summary
        .anomalies()
        .filter_map(|r| r.verification.as_ref().map(|m| (r, m)))
        .collect();
    if !mismatches.is_empty() {
        out.push_str("\n⚠️  Row count mismatches:\n");
        for (result, mismatch) in mismatches {
            out.push_str(&format!(
                "   • {}: sent {}, found {}\n",
                result.table_name,
                format_count(mismatch.expected),
                format_count(mismatch.actual)
            ));
        }
    }

    out.push_str(&format!("\n📋 Tables in database '{}':\n", summary.database));
    if let Some(err) = &summary.listing_error {
        out.push_str(&format!("   ❌ Error listing tables: {}\n", err));
    }
    for table in &summary.tables {
        match &table.rows {
            Ok(rows) => out.push_str(&format!("   • {}: {} rows\n", table.table, format_count(*rows))),
            Err(e) => out.push_str(&format!("   • {}: count failed ({})\n", table.table, e)),
        }
    }

    out
}

fn status_label(status: &IngestionStatus) -> &'static str {
    match status {
        IngestionStatus::Success => "loaded",
        IngestionStatus::ReadFailed => "read failed",
        IngestionStatus::EncodingFailed => "no encoding resolved",
        IngestionStatus::SchemaInferenceFailed => "schema inference failed",
        IngestionStatus::ProvisioningFailed => "provisioning failed",
        IngestionStatus::LoadFailed => "load failed",
    }
}
