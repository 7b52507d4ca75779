use crate::data::RawCampaignRecord;
use crate::error::Error;
use chrono::{DateTime, Utc};
use log::warn;
use serde_json::Value;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Fixed file name a landed snapshot is written under.
pub const RAW_FILE_NAME: &str = "campaign_data.json";

/// Partition values of one raw batch, taken from its source path rather
/// than from record content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchPartition {
    pub date: String,
    pub time: String,
}

impl BatchPartition {
    /// Extracts partition values from a batch path of the form
    /// `<root>/.../<date>/<time>/<file>`: the two segments immediately
    /// preceding the file name, regardless of file name or extension.
    ///
    /// A path without that segment structure is a configuration error.
    pub fn from_path(path: &str) -> Result<Self, Error> {
        let parts: Vec<&str> = path.split('/').collect();

        match parts.as_slice() {
            [.., date, time, _file] if !date.is_empty() && !time.is_empty() => {
                Ok(BatchPartition {
                    date: date.to_string(),
                    time: time.to_string(),
                })
            }
            _ => Err(Error::InvalidBatchPath {
                path: path.to_string(),
            }),
        }
    }
}

#[async_trait::async_trait]
pub trait RawBatchLoader: Send + Sync + 'static {
    /// Loads all raw records of the batch at `path`.
    ///
    /// # Returns
    /// A Result containing either the raw records or an Error. An empty
    /// batch is a valid result, not an error. Lines that are not valid JSON
    /// objects are skipped; the batch file being unreadable is an error.
    async fn load(&self, path: &str) -> Result<Vec<RawCampaignRecord>, Error>;
}

pub struct NdJsonBatchLoader;

#[async_trait::async_trait]
impl RawBatchLoader for NdJsonBatchLoader {
    async fn load(&self, path: &str) -> Result<Vec<RawCampaignRecord>, Error> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);

        let mut records = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<RawCampaignRecord>(&line) {
                Ok(record) => records.push(record),
                Err(err) => warn!("skipping malformed raw record: {}", err),
            }
        }

        Ok(records)
    }
}

/// Writes fetched records as newline-delimited JSON under
/// `<raw_dir>/<date>/<time>/campaign_data.json`, creating the partition
/// directories as needed.
///
/// # Returns
/// A Result containing either the landed file path or an Error.
pub fn land_raw_batch(
    records: &[Value],
    raw_dir: &str,
    landed_at: &DateTime<Utc>,
) -> Result<PathBuf, Error> {
    let dir = Path::new(raw_dir)
        .join(landed_at.format("%Y-%m-%d").to_string())
        .join(landed_at.format("%H-%M").to_string());
    fs::create_dir_all(&dir)?;

    let lines: Vec<String> = records.iter().map(|record| record.to_string()).collect();
    let file = dir.join(RAW_FILE_NAME);
    fs::write(&file, lines.join("\n"))?;

    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_partition_from_path() {
        let partition =
            BatchPartition::from_path("root/raw/2025-06-12/12-06/campaign_data.json").unwrap();
        assert_eq!(partition.date, "2025-06-12");
        assert_eq!(partition.time, "12-06");
    }

    #[test]
    fn test_partition_from_bucket_style_path() {
        let partition =
            BatchPartition::from_path("s3://bucket/raw/2025-06-12/23-59/part.json").unwrap();
        assert_eq!(partition.date, "2025-06-12");
        assert_eq!(partition.time, "23-59");
    }

    #[test]
    fn test_partition_from_path_too_short() {
        let result = BatchPartition::from_path("campaign_data.json");
        assert!(matches!(
            result.unwrap_err(),
            Error::InvalidBatchPath { path } if path == "campaign_data.json"
        ));
    }

    #[test]
    fn test_partition_from_path_empty_segments() {
        let result = BatchPartition::from_path("raw///campaign_data.json");
        assert!(matches!(result.unwrap_err(), Error::InvalidBatchPath { .. }));
    }

    #[tokio::test]
    async fn test_load_skips_malformed_lines() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(RAW_FILE_NAME);
        fs::write(
            &path,
            concat!(
                "{\"ad_id\":\"A1\",\"impressions\":100,\"clicks\":10,\"conversions\":2}\n",
                "not json at all\n",
                "\n",
                "{\"ad_id\":\"A2\",\"impressions\":200,\"clicks\":20,\"conversions\":4}",
            ),
        )
        .unwrap();

        let loader = NdJsonBatchLoader;
        let records = loader.load(path.to_str().unwrap()).await.unwrap();
        assert_eq!(records.len(), 2);
    }

    #[tokio::test]
    async fn test_load_empty_batch() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(RAW_FILE_NAME);
        fs::write(&path, "").unwrap();

        let loader = NdJsonBatchLoader;
        let records = loader.load(path.to_str().unwrap()).await.unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let loader = NdJsonBatchLoader;
        let result = loader.load("/nonexistent/2025-06-12/12-06/campaign_data.json").await;
        assert!(matches!(result.unwrap_err(), Error::Io(_)));
    }

    #[test]
    fn test_land_raw_batch() {
        let temp_dir = TempDir::new().unwrap();
        let raw_dir = temp_dir.path().to_str().unwrap();
        let landed_at = Utc.with_ymd_and_hms(2025, 6, 12, 12, 6, 0).unwrap();

        let records = vec![
            json!({"ad_id": "A1", "impressions": 100}),
            json!({"ad_id": "A2", "impressions": 200}),
        ];

        let path = land_raw_batch(&records, raw_dir, &landed_at).unwrap();
        assert_eq!(
            path,
            temp_dir.path().join("2025-06-12").join("12-06").join(RAW_FILE_NAME)
        );

        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);

        // Landed paths must round-trip through partition parsing.
        let partition = BatchPartition::from_path(path.to_str().unwrap()).unwrap();
        assert_eq!(partition.date, "2025-06-12");
        assert_eq!(partition.time, "12-06");
    }
}
