use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Deserialize;

use crate::billing::BillingLineItem;
use crate::errors::IngestError;

/// CUR export layout, told apart by header style.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurVersion {
    /// `lineItem/UnblendedCost` style headers.
    V1,
    /// `line_item_unblended_cost` style headers.
    V2,
}

impl CurVersion {
    pub fn detect<'a>(headers: impl IntoIterator<Item = &'a str>) -> Self {
        if headers.into_iter().any(|h| h.contains('/')) {
            CurVersion::V1
        } else {
            CurVersion::V2
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CurVersion::V1 => "CUR v1",
            CurVersion::V2 => "CUR v2",
        }
    }

    /// Header names for the columns a file cannot be loaded without.
    fn required_columns(&self) -> [(&'static str, &'static str); 3] {
        match self {
            CurVersion::V1 => [
                ("usage_start_date", "lineItem/UsageStartDate"),
                ("line_item_type", "lineItem/LineItemType"),
                ("unblended_cost", "lineItem/UnblendedCost"),
            ],
            CurVersion::V2 => [
                ("usage_start_date", "line_item_usage_start_date"),
                ("line_item_type", "line_item_line_item_type"),
                ("unblended_cost", "line_item_unblended_cost"),
            ],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CurRecord {
    #[serde(rename = "identity/LineItemId", alias = "identity_line_item_id", default)]
    pub line_item_id: Option<String>,

    #[serde(rename = "lineItem/UsageStartDate", alias = "line_item_usage_start_date")]
    pub usage_start_date: String,

    #[serde(rename = "lineItem/UsageAccountId", alias = "line_item_usage_account_id", default)]
    pub usage_account_id: Option<String>,

    #[serde(rename = "product/ProductCode", alias = "product_product_code", alias = "lineItem/ProductCode", default)]
    pub product_code: Option<String>,

    #[serde(rename = "product/region", alias = "product_region", default)]
    pub region: Option<String>,

    #[serde(rename = "lineItem/UsageType", alias = "line_item_usage_type", default)]
    pub usage_type: Option<String>,

    #[serde(rename = "lineItem/LineItemType", alias = "line_item_line_item_type")]
    pub line_item_type: String,

    #[serde(rename = "lineItem/UnblendedCost", alias = "line_item_unblended_cost")]
    pub unblended_cost: String,

    #[serde(rename = "lineItem/BlendedCost", alias = "line_item_blended_cost", default)]
    pub blended_cost: Option<String>,

    #[serde(rename = "lineItem/UsageAmount", alias = "line_item_usage_amount", default)]
    pub usage_amount: Option<String>,

    #[serde(rename = "lineItem/CurrencyCode", alias = "line_item_currency_code", default)]
    pub currency_code: Option<String>,
}

impl CurRecord {
    fn into_line_item(self, row: usize) -> Result<BillingLineItem, IngestError> {
        let usage_start = parse_timestamp(&self.usage_start_date).ok_or_else(|| IngestError::InvalidValue {
            row,
            field: "usage_start_date",
            value: self.usage_start_date.clone(),
        })?;
        let unblended_cost = parse_amount(row, "unblended_cost", Some(&self.unblended_cost))?;
        let blended_cost = match self.blended_cost.as_deref() {
            Some(v) if !v.trim().is_empty() => parse_amount(row, "blended_cost", Some(v))?,
            _ => unblended_cost,
        };

        Ok(BillingLineItem {
            line_item_id: non_empty(self.line_item_id),
            usage_start,
            usage_account_id: non_empty(self.usage_account_id),
            product_code: non_empty(self.product_code),
            region: non_empty(self.region),
            usage_type: non_empty(self.usage_type),
            line_item_type: self.line_item_type,
            unblended_cost,
            blended_cost,
            usage_amount: parse_amount(row, "usage_amount", self.usage_amount.as_deref())?,
            currency_code: non_empty(self.currency_code),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_amount(row: usize, field: &'static str, value: Option<&str>) -> Result<f64, IngestError> {
    match value.map(str::trim) {
        None | Some("") => Ok(0.0),
        Some(v) => v.parse::<f64>().map_err(|_| IngestError::InvalidValue {
            row,
            field,
            value: v.to_string(),
        }),
    }
}

/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DDTHH:MM:SS` or a bare date.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_utc());
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Parses a CUR CSV export into line items.
pub fn parse_cur_csv<R: std::io::Read>(input: R) -> Result<(CurVersion, Vec<BillingLineItem>), IngestError> {
    let mut reader = csv::Reader::from_reader(input);
    let headers = reader.headers()?.clone();
    let version = CurVersion::detect(headers.iter());

    for (column, header) in version.required_columns() {
        if !headers.iter().any(|h| h == header) {
            return Err(IngestError::MissingColumn {
                column,
                version: version.as_str(),
            });
        }
    }

    let mut line_items = Vec::new();
    for (index, result) in reader.deserialize::<CurRecord>().enumerate() {
        let record = result?;
        // Header is row 1.
        line_items.push(record.into_line_item(index + 2)?);
    }
    Ok((version, line_items))
}
