use crate::error::Error;
use datafusion::common::JoinType;
use datafusion::functions::expr_fn::coalesce;
use datafusion::functions_aggregate::median::median;
use datafusion::prelude::{col, DataFrame};

/// Fills null `spend` values from grouped medians of the current batch,
/// preferring the most specific grouping that has any known spend.
///
/// The four lookup levels are independent aggregates over the rows with
/// non-null spend: `(ad_id, country)`, `(ad_id)`, `(brand, country)` and
/// `(brand)`, applied in that order per record. Records that match none of
/// the levels are dropped.
///
/// # Returns
/// A Result containing either the [`DataFrame`] with non-null spend on every
/// remaining row or an [`Error`]
pub async fn impute_spend(df: DataFrame) -> Result<DataFrame, Error> {
    let known = df.clone().filter(col("spend").is_not_null())?;

    let df = join_group_median(df, known.clone(), &["ad_id", "country"], "med1")?;
    let df = join_group_median(df, known.clone(), &["ad_id"], "med2")?;
    let df = join_group_median(df, known.clone(), &["brand", "country"], "med3")?;
    let df = join_group_median(df, known, &["brand"], "med4")?;

    let df = df.with_column(
        "spend",
        coalesce(vec![
            col("spend"),
            col("med1"),
            col("med2"),
            col("med3"),
            col("med4"),
        ]),
    )?;

    // No estimate at any level: the record is unrecoverable
    let df = df.filter(col("spend").is_not_null())?;
    let df = df.drop_columns(&["med1", "med2", "med3", "med4"])?;

    Ok(df)
}

/// Computes the median spend of `known` grouped by `keys` and left-joins it
/// onto `df` as a column named `alias`. Group keys on the median side are
/// temporarily aliased so the join leaves the working set's columns intact.
fn join_group_median(
    df: DataFrame,
    known: DataFrame,
    keys: &[&str],
    alias: &str,
) -> Result<DataFrame, Error> {
    let tmp_keys: Vec<String> = keys.iter().map(|key| format!("{}_{}", alias, key)).collect();

    let group_exprs = keys
        .iter()
        .zip(&tmp_keys)
        .map(|(key, tmp_key)| col(*key).alias(tmp_key))
        .collect::<Vec<_>>();
    let medians = known.aggregate(group_exprs, vec![median(col("spend")).alias(alias)])?;

    let tmp_refs: Vec<&str> = tmp_keys.iter().map(String::as_str).collect();
    let df = df.join(medians, JoinType::Left, keys, &tmp_refs, None)?;
    let df = df.drop_columns(&tmp_refs)?;

    Ok(df)
}
