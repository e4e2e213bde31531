//! Report writers: CSV tables and JSON mirrors of evaluation results

use super::{EvalResults, GridResults};
use crate::error::Result;
use std::collections::BTreeSet;
use std::path::Path;

/// Metric column names across every record, sorted
fn metric_columns<'a, I>(records: I) -> Vec<String>
where
    I: Iterator<Item = &'a super::MetricsRecord>,
{
    let mut metrics = BTreeSet::new();
    for record in records {
        metrics.extend(record.keys().cloned());
    }
    metrics.into_iter().collect()
}

fn format_value(record: &super::MetricsRecord, metric: &str) -> String {
    format!("{:.4}", record.get(metric).copied().unwrap_or(f64::NAN))
}

/// Render dataset → retriever results as a CSV table.
///
/// Columns: `dataset, retriever, <metrics sorted by name>`; values to four
/// decimals, `NaN` for failed metrics.
pub fn eval_report_csv(results: &EvalResults) -> Result<String> {
    let metrics = metric_columns(results.values().flat_map(|r| r.values()));

    let mut writer = csv::Writer::from_writer(Vec::new());
    let mut header = vec!["dataset".to_string(), "retriever".to_string()];
    header.extend(metrics.iter().cloned());
    writer.write_record(&header)?;

    for (dataset, retrievers) in results {
        for (retriever, record) in retrievers {
            let mut row = vec![dataset.clone(), retriever.clone()];
            row.extend(metrics.iter().map(|m| format_value(record, m)));
            writer.write_record(&row)?;
        }
    }

    let bytes = writer.into_inner().map_err(|e| {
        crate::error::RequeryError::Evaluation(format!("report buffering failed: {e}"))
    })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Render grid results (keyed `llm/method/dataset/retriever`) as CSV
pub fn grid_report_csv(results: &GridResults) -> Result<String> {
    let metrics = metric_columns(results.values());

    let mut writer = csv::Writer::from_writer(Vec::new());
    let mut header = vec![
        "llm".to_string(),
        "method".to_string(),
        "dataset".to_string(),
        "retriever".to_string(),
    ];
    header.extend(metrics.iter().cloned());
    writer.write_record(&header)?;

    for (key, record) in results {
        // Split from the right: the llm id may itself contain slashes
        // (raw provider ids like `qwen/qwen-2.5-72b-instruct`), while the
        // three trailing components never do.
        let mut row: Vec<String> = key.rsplitn(4, '/').map(String::from).collect();
        row.resize(4, String::new());
        row.reverse();
        row.extend(metrics.iter().map(|m| format_value(record, m)));
        writer.write_record(&row)?;
    }

    let bytes = writer.into_inner().map_err(|e| {
        crate::error::RequeryError::Evaluation(format!("report buffering failed: {e}"))
    })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Write the CSV table plus a structurally identical JSON mapping
pub fn write_eval_report(
    results: &EvalResults,
    csv_path: Option<&Path>,
    json_path: Option<&Path>,
) -> Result<String> {
    let table = eval_report_csv(results)?;
    if let Some(path) = csv_path {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, &table)?;
    }
    if let Some(path) = json_path {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(results)?)?;
    }
    Ok(table)
}

/// Write `all_results.csv` and `all_results.json` under the output root
pub fn write_grid_report(results: &GridResults, out_root: &Path) -> Result<()> {
    std::fs::create_dir_all(out_root)?;
    std::fs::write(out_root.join("all_results.csv"), grid_report_csv(results)?)?;
    std::fs::write(
        out_root.join("all_results.json"),
        serde_json::to_string_pretty(results)?,
    )?;
    Ok(())
}
