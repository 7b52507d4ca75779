use crate::api_client::CampaignApi;
use crate::batch_loader::{self, BatchPartition, RawBatchLoader};
use crate::config::Config;
use crate::data;
use crate::error::Error;
use crate::impute;
use chrono::Utc;
use datafusion::prelude::SessionContext;
use log::info;

/// Ingest step: pulls one snapshot from the campaign API and lands it as a
/// raw NDJSON batch under the configured raw directory, partitioned by the
/// UTC fetch time.
pub async fn fetch_and_land(api: &dyn CampaignApi, config: &Config) -> Result<(), Error> {
    let records = api.fetch_campaign_records().await?;

    let landed_at = Utc::now();
    let path = batch_loader::land_raw_batch(&records, &config.raw_dir, &landed_at)?;
    info!("landed {} raw records at {}", records.len(), path.display());

    Ok(())
}

/// Transformation engine: loads the raw batch at `file_path`, normalizes and
/// imputes it, derives the rate metrics and appends the result to the
/// partitioned store. An empty batch completes successfully without output.
pub async fn transform_batch(
    loader: &dyn RawBatchLoader,
    config: &Config,
    file_path: &str,
) -> Result<(), Error> {
    let partition = BatchPartition::from_path(file_path)?;

    let raw_records = loader.load(file_path).await?;
    if raw_records.is_empty() {
        info!("no data found at: {}", file_path);
        return Ok(());
    }

    let processing_date = Utc::now().date_naive();
    let records = data::normalize_records(raw_records, processing_date);
    if records.is_empty() {
        info!("no valid records after cleaning at: {}", file_path);
        return Ok(());
    }

    let ctx = SessionContext::new();
    let df = data::records_to_df(&records, &ctx, data::campaign_schema())?;
    let df = impute::impute_spend(df).await?;
    let df = data::derive_metrics(df)?;
    let df = data::tag_partition(df, &partition)?;

    data::write_partitioned(df, &config.output_dir).await?;

    info!(
        "written to: {} with partition_date={}, partition_time={}",
        config.output_dir, partition.date, partition.time
    );

    Ok(())
}
