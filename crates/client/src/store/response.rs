//! Store GraphQL response types and normalization.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate};
use copertine_core::{Page, ResultItem};
use serde::Deserialize;

use super::StoreError;

/// Raw GraphQL response envelope.
#[derive(Debug, Deserialize)]
pub struct GraphQlResponse {
    #[serde(default)]
    pub data: Option<GraphQlData>,
    #[serde(default)]
    pub errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
pub struct GraphQlError {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct GraphQlData {
    #[serde(rename = "Get", default)]
    pub get: Option<HashMap<String, Option<Vec<RawEdition>>>>,
    #[serde(rename = "Aggregate", default)]
    pub aggregate: Option<HashMap<String, Option<Vec<AggregateGroup>>>>,
}

/// One stored object as the store returns it.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEdition {
    pub edition_id: Option<String>,
    pub edition_date_iso_str: Option<String>,
    #[serde(default)]
    pub caption_str: Option<String>,
    #[serde(default)]
    pub kicker_str: Option<String>,
    pub edition_image_fn_str: Option<String>,
    #[serde(default)]
    pub testata_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AggregateGroup {
    pub meta: AggregateMeta,
}

#[derive(Debug, Deserialize)]
pub struct AggregateMeta {
    pub count: u64,
}

impl GraphQlResponse {
    /// The `data` payload, or the GraphQL errors joined into one message.
    pub fn into_data(self) -> Result<GraphQlData, StoreError> {
        if !self.errors.is_empty() {
            let messages: Vec<_> = self.errors.into_iter().map(|e| e.message).collect();
            return Err(StoreError::GraphQl(messages.join("; ")));
        }
        self.data.ok_or_else(|| StoreError::Malformed("response has no data".to_string()))
    }
}

impl GraphQlData {
    /// Items returned by `Get` for `collection`, normalized.
    pub fn items(&mut self, collection: &str) -> Result<Vec<ResultItem>, StoreError> {
        let raw = self
            .get
            .as_mut()
            .and_then(|get| get.remove(collection))
            .ok_or_else(|| StoreError::Malformed(format!("missing Get.{collection}")))?
            .unwrap_or_default();

        raw.into_iter().map(ResultItem::try_from).collect()
    }

    /// Total object count reported by `Aggregate` for `collection`.
    pub fn total(&self, collection: &str) -> Result<u64, StoreError> {
        self.aggregate
            .as_ref()
            .and_then(|agg| agg.get(collection))
            .and_then(|groups| groups.as_ref())
            .and_then(|groups| groups.first())
            .map(|group| group.meta.count)
            .ok_or_else(|| StoreError::Malformed(format!("missing Aggregate.{collection}.meta.count")))
    }

    /// A listing page for `collection`.
    pub fn into_page(mut self, collection: &str, offset: u64, limit: u32) -> Result<Page, StoreError> {
        let items = self.items(collection)?;
        let total = self.total(collection)?;
        Ok(Page::new(items, total, offset, limit))
    }
}

impl TryFrom<RawEdition> for ResultItem {
    type Error = StoreError;

    fn try_from(raw: RawEdition) -> Result<Self, Self::Error> {
        let edition_id = raw
            .edition_id
            .ok_or_else(|| StoreError::Malformed("item without editionId".to_string()))?;
        let date = raw
            .edition_date_iso_str
            .as_deref()
            .and_then(parse_edition_date)
            .ok_or_else(|| StoreError::Malformed(format!("item {edition_id}: bad editionDateIsoStr")))?;
        let filename = raw
            .edition_image_fn_str
            .ok_or_else(|| StoreError::Malformed(format!("item {edition_id}: missing editionImageFnStr")))?;

        Ok(ResultItem {
            edition_id,
            date,
            caption: raw.caption_str.unwrap_or_default(),
            kicker: raw.kicker_str.unwrap_or_default(),
            filename,
            publication: raw.testata_name,
        })
    }
}

/// Dates are stored either as full RFC 3339 timestamps or as plain days.
fn parse_edition_date(s: &str) -> Option<NaiveDate> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.date_naive())
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
        .ok()
}
