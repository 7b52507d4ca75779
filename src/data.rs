use crate::batch_loader::BatchPartition;
use crate::error::Error;
use chrono::{NaiveDate, NaiveDateTime};
use datafusion::arrow::array::{
    Date64Builder, Float64Builder, RecordBatch, StringBuilder, StringDictionaryBuilder,
    UInt64Builder,
};
use datafusion::arrow::datatypes::{DataType, Field, Int32Type, Schema};
use datafusion::dataframe::DataFrameWriteOptions;
use datafusion::functions::expr_fn::round;
use datafusion::logical_expr::cast;
use datafusion::prelude::{col, lit, DataFrame, SessionContext};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

const UNKNOWN_CAMPAIGN: &str = "unknown_campaign";
const UNKNOWN_AD: &str = "unknown_ad";
const UNKNOWN: &str = "Unknown";
const DEFAULT_ZIPCODE: &str = "000000";

/// One raw record as landed by the ingest step. Identifier and spend fields
/// arrive with whatever JSON type the upstream API produced; the normalizer
/// owns all coercion.
#[derive(Debug, Deserialize)]
pub struct RawCampaignRecord {
    pub ad_id: Option<Value>,
    pub campaign_id: Option<Value>,
    pub brand: Option<String>,
    pub country: Option<String>,
    pub state: Option<String>,
    pub city: Option<String>,
    pub zipcode: Option<String>,
    pub impressions: Option<i64>,
    pub clicks: Option<i64>,
    pub conversions: Option<i64>,
    pub spend: Option<Value>,
    pub date: Option<String>,
}

/// One structurally valid record. `spend` stays optional until the imputer
/// has run; every other field is already final.
#[derive(Debug, Clone, PartialEq)]
pub struct CampaignRecord {
    pub ad_id: String,
    pub campaign_id: String,
    pub brand: String,
    pub country: String,
    pub state: String,
    pub city: String,
    pub zipcode: String,
    pub impressions: u64,
    pub clicks: u64,
    pub conversions: u64,
    pub spend: Option<f64>,
    pub date: NaiveDate,
}

/// Produces the structurally valid record set for one batch.
///
/// Records with missing counts, non-positive impressions or clicks, or an
/// inconsistent funnel (clicks > impressions, conversions outside
/// [0, clicks]) are silently excluded; missing categorical fields are filled
/// with fixed defaults; missing or unparseable dates fall back to
/// `processing_date`.
pub fn normalize_records(
    raw_records: Vec<RawCampaignRecord>,
    processing_date: NaiveDate,
) -> Vec<CampaignRecord> {
    raw_records
        .into_iter()
        .filter_map(|raw| normalize_record(raw, processing_date))
        .collect()
}

fn normalize_record(raw: RawCampaignRecord, processing_date: NaiveDate) -> Option<CampaignRecord> {
    // Counts are unrecoverable when absent
    let impressions = raw.impressions?;
    let clicks = raw.clicks?;
    let conversions = raw.conversions?;

    if impressions <= 0 || clicks <= 0 || conversions < 0 {
        return None;
    }
    if clicks > impressions || conversions > clicks {
        return None;
    }

    let spend = raw.spend.as_ref().and_then(scalar_to_f64);
    let date = raw
        .date
        .as_deref()
        .and_then(parse_date)
        .unwrap_or(processing_date);

    Some(CampaignRecord {
        ad_id: raw
            .ad_id
            .as_ref()
            .and_then(scalar_to_string)
            .unwrap_or_else(|| UNKNOWN_AD.to_string()),
        campaign_id: raw
            .campaign_id
            .as_ref()
            .and_then(scalar_to_string)
            .unwrap_or_else(|| UNKNOWN_CAMPAIGN.to_string()),
        brand: raw.brand.unwrap_or_else(|| UNKNOWN.to_string()),
        country: raw.country.unwrap_or_else(|| UNKNOWN.to_string()),
        state: raw.state.unwrap_or_else(|| UNKNOWN.to_string()),
        city: raw.city.unwrap_or_else(|| UNKNOWN.to_string()),
        zipcode: raw.zipcode.unwrap_or_else(|| DEFAULT_ZIPCODE.to_string()),
        impressions: impressions as u64,
        clicks: clicks as u64,
        conversions: conversions as u64,
        spend,
        date,
    })
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn scalar_to_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn parse_date(date: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}

/// Creates the schema for cleaned campaign data.
///
/// # Returns
/// An [`Arc<Schema>`] with dictionary-encoded identifiers, plain string
/// categoricals, unsigned counts, nullable spend and a Date64 date.
pub fn campaign_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new(
            "ad_id",
            DataType::Dictionary(Box::new(DataType::Int32), Box::new(DataType::Utf8)),
            false,
        ),
        Field::new(
            "campaign_id",
            DataType::Dictionary(Box::new(DataType::Int32), Box::new(DataType::Utf8)),
            false,
        ),
        Field::new("brand", DataType::Utf8, false),
        Field::new("country", DataType::Utf8, false),
        Field::new("state", DataType::Utf8, false),
        Field::new("city", DataType::Utf8, false),
        Field::new("zipcode", DataType::Utf8, false),
        Field::new("impressions", DataType::UInt64, false),
        Field::new("clicks", DataType::UInt64, false),
        Field::new("conversions", DataType::UInt64, false),
        Field::new("spend", DataType::Float64, true),
        Field::new("date", DataType::Date64, false),
    ]))
}

/// Converts cleaned records to a DataFrame.
///
/// # Arguments
/// * `records` - A slice of [`CampaignRecord`] containing the cleaned batch
/// * `ctx` - A reference to the [`SessionContext`] for DataFrame operations
/// * `schema` - An [`Arc<Schema>`] as produced by [`campaign_schema`]
///
/// # Returns
/// A Result containing either a [`DataFrame`] or an [`Error`]
pub fn records_to_df(
    records: &[CampaignRecord],
    ctx: &SessionContext,
    schema: Arc<Schema>,
) -> Result<DataFrame, Error> {
    let batch = {
        let num_records = records.len();

        let mut ad_id_builder = StringDictionaryBuilder::<Int32Type>::new();
        let mut campaign_id_builder = StringDictionaryBuilder::<Int32Type>::new();
        let mut brand_builder = StringBuilder::new();
        let mut country_builder = StringBuilder::new();
        let mut state_builder = StringBuilder::new();
        let mut city_builder = StringBuilder::new();
        let mut zipcode_builder = StringBuilder::new();
        let mut impressions_builder = UInt64Builder::with_capacity(num_records);
        let mut clicks_builder = UInt64Builder::with_capacity(num_records);
        let mut conversions_builder = UInt64Builder::with_capacity(num_records);
        let mut spend_builder = Float64Builder::with_capacity(num_records);
        let mut date_builder = Date64Builder::with_capacity(num_records);

        for record in records {
            ad_id_builder.append_value(&record.ad_id);
            campaign_id_builder.append_value(&record.campaign_id);
            brand_builder.append_value(&record.brand);
            country_builder.append_value(&record.country);
            state_builder.append_value(&record.state);
            city_builder.append_value(&record.city);
            zipcode_builder.append_value(&record.zipcode);
            impressions_builder.append_value(record.impressions);
            clicks_builder.append_value(record.clicks);
            conversions_builder.append_value(record.conversions);
            spend_builder.append_option(record.spend);
            date_builder.append_value(date_as_unix_ms(record.date));
        }

        RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(ad_id_builder.finish()),
                Arc::new(campaign_id_builder.finish()),
                Arc::new(brand_builder.finish()),
                Arc::new(country_builder.finish()),
                Arc::new(state_builder.finish()),
                Arc::new(city_builder.finish()),
                Arc::new(zipcode_builder.finish()),
                Arc::new(impressions_builder.finish()),
                Arc::new(clicks_builder.finish()),
                Arc::new(conversions_builder.finish()),
                Arc::new(spend_builder.finish()),
                Arc::new(date_builder.finish()),
            ],
        )
    }?;

    let df = ctx.read_batch(batch)?;

    Ok(df)
}

/// Adds the derived rate metrics. Denominators are guaranteed positive and
/// spend non-null by the normalizer and imputer.
///
/// # Returns
/// A Result containing either the [`DataFrame`] extended with `CTR`, `CPC`,
/// `CPM` and `conversion_rate` columns or an [`Error`]
pub fn derive_metrics(df: DataFrame) -> Result<DataFrame, Error> {
    let impressions = cast(col("impressions"), DataType::Float64);
    let clicks = cast(col("clicks"), DataType::Float64);
    let conversions = cast(col("conversions"), DataType::Float64);

    let df = df
        .with_column("CTR", round(vec![clicks.clone() / impressions.clone(), lit(4_i64)]))?
        .with_column("CPC", round(vec![col("spend") / clicks.clone(), lit(2_i64)]))?
        .with_column(
            "CPM",
            round(vec![col("spend") / impressions * lit(1000.0), lit(2_i64)]),
        )?
        .with_column("conversion_rate", round(vec![conversions / clicks, lit(4_i64)]))?;

    Ok(df)
}

/// Tags every record of the batch with its source-path partition values.
pub fn tag_partition(df: DataFrame, partition: &BatchPartition) -> Result<DataFrame, Error> {
    let df = df
        .with_column("partition_date", lit(partition.date.as_str()))?
        .with_column("partition_time", lit(partition.time.as_str()))?;

    Ok(df)
}

/// Appends the final batch to the partitioned parquet store under
/// `output_dir`, hive-partitioned by `partition_date` then `partition_time`.
/// Existing partition contents are never replaced; reprocessing a batch
/// appends a second copy.
pub async fn write_partitioned(df: DataFrame, output_dir: &str) -> Result<(), Error> {
    let options = DataFrameWriteOptions::default()
        .with_partition_by(vec!["partition_date".to_string(), "partition_time".to_string()]);

    df.write_parquet(output_dir, options, None).await?;

    Ok(())
}

fn date_as_unix_ms(date: NaiveDate) -> i64 {
    let unix_duration = date - NaiveDateTime::UNIX_EPOCH.date();

    unix_duration.num_milliseconds()
}
