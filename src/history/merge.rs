//! Merging the downloaded per-period CSV exports into one file

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Error, Result};

/// CSV files in `dir` whose name starts with `prefix`, sorted by name
fn matching_csv_files(dir: &Path, prefix: &str, exclude: &str) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }

        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with(prefix) && name.ends_with(".csv") && name != exclude {
            files.push(entry.path());
        }
    }

    files.sort();
    Ok(files)
}

/// Concatenate every `prefix*.csv` in `dir` into `dir/merged_name`
///
/// The header is written once; every input must carry the same header.
pub fn merge_csv_files(dir: &Path, prefix: &str, merged_name: &str) -> Result<PathBuf> {
    let inputs = matching_csv_files(dir, prefix, merged_name)?;
    if inputs.is_empty() {
        return Err(Error::storage(format!(
            "No files starting with '{}' to merge in {}",
            prefix,
            dir.display()
        )));
    }

    let merged_path = dir.join(merged_name);
    let mut writer = csv::Writer::from_path(&merged_path)?;
    let mut header: Option<csv::StringRecord> = None;
    let mut total = 0usize;

    for input in &inputs {
        let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(input)?;
        let file_header = reader.headers()?.clone();

        match &header {
            None => {
                writer.write_record(&file_header)?;
                header = Some(file_header);
            },
            Some(expected) if *expected != file_header => {
                return Err(Error::validation(format!(
                    "Header of {} does not match the first file",
                    input.display()
                )));
            },
            Some(_) => {},
        }

        let mut rows = 0usize;
        for record in reader.records() {
            writer.write_record(&record?)?;
            rows += 1;
        }
        debug!(file = %input.display(), rows, "Merged CSV file");
        total += rows;
    }

    writer.flush()?;

    info!(
        files = inputs.len(),
        rows = total,
        merged = %merged_path.display(),
        "CSV files merged successfully"
    );

    Ok(merged_path)
}

/// Remove the per-period CSVs, keeping `keep`
pub fn delete_csv_files(dir: &Path, prefix: &str, keep: &str) -> Result<usize> {
    let files = matching_csv_files(dir, prefix, keep)?;

    for file in &files {
        fs::remove_file(file)?;
    }

    info!(deleted = files.len(), "Obsolete CSV files deleted successfully");
    Ok(files.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PREFIX: &str = "lmnh_hist_data";
    const MERGED: &str = "lmnh_merged_hist_data.csv";

    fn write(dir: &Path, name: &str, contents: &str) {
        fs::write(dir.join(name), contents).unwrap();
    }

    #[test]
    fn test_merge_writes_header_once() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "lmnh_hist_data_0.csv", "at,site,val,type\na,1,2,\n");
        write(dir.path(), "lmnh_hist_data_1.csv", "at,site,val,type\nb,0,-1,1.0\nc,3,4,\n");
        write(dir.path(), "other.csv", "at,site,val,type\nz,9,9,\n");

        let merged = merge_csv_files(dir.path(), PREFIX, MERGED).unwrap();
        let contents = fs::read_to_string(merged).unwrap();
        assert_eq!(contents, "at,site,val,type\na,1,2,\nb,0,-1,1.0\nc,3,4,\n");
    }

    #[test]
    fn test_merge_rejects_header_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "lmnh_hist_data_0.csv", "at,site,val,type\n");
        write(dir.path(), "lmnh_hist_data_1.csv", "at,val,site,type\n");

        assert!(merge_csv_files(dir.path(), PREFIX, MERGED).is_err());
    }

    #[test]
    fn test_merge_without_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let err = merge_csv_files(dir.path(), PREFIX, MERGED).unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
    }

    #[test]
    fn test_delete_keeps_merged_and_unrelated_files() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "lmnh_hist_data_0.csv", "");
        write(dir.path(), "lmnh_hist_data_1.csv", "");
        write(dir.path(), "lmnh_hist_data_2.json", "");
        write(dir.path(), MERGED, "");

        assert_eq!(delete_csv_files(dir.path(), PREFIX, MERGED).unwrap(), 2);
        assert!(dir.path().join(MERGED).exists());
        assert!(dir.path().join("lmnh_hist_data_2.json").exists());
        assert!(!dir.path().join("lmnh_hist_data_0.csv").exists());
    }
}
