//! Listing envelope normalization
//!
//! The device listing has shipped with several response shapes. Everything is
//! folded into one [`Pagination`] by trying, in order:
//!
//! 1. top-level `totalCount` (with optional `pageNumber`, `pageSize`, `totalPages`)
//! 2. a nested `pagination` object (`currentPage`, `pageSize`, `totalCount`, `totalPages`)
//! 3. a bare `totalRecords`, with the page count derived from the requested page size
//! 4. no metadata at all, in which case the returned items are counted
//!
//! Missing or zero page numbers and sizes fall back to what was requested.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Canonical pagination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page_number: u64,
    pub page_size: u64,
    pub total_records: u64,
    pub total_pages: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page_number: 1,
            page_size: 20,
            total_records: 0,
            total_pages: 0,
        }
    }
}

/// Pages needed for `total` records
pub fn page_count(total: u64, page_size: u64) -> u64 {
    if page_size == 0 {
        0
    } else {
        total.div_ceil(page_size)
    }
}

fn positive(body: &Value, field: &str) -> Option<u64> {
    body.get(field).and_then(Value::as_u64).filter(|n| *n > 0)
}

fn count(body: &Value, field: &str) -> Option<u64> {
    body.get(field).and_then(Value::as_u64)
}

fn from_fields(
    meta: &Value,
    page_field: &str,
    total: u64,
    requested_page: u64,
    requested_size: u64,
) -> Pagination {
    let page_size = positive(meta, "pageSize").unwrap_or(requested_size);
    Pagination {
        page_number: positive(meta, page_field).unwrap_or(requested_page),
        page_size,
        total_records: total,
        total_pages: positive(meta, "totalPages").unwrap_or_else(|| page_count(total, page_size)),
    }
}

/// Normalize listing metadata
pub fn normalize(
    body: &Value,
    requested_page: u64,
    requested_size: u64,
    item_count: usize,
) -> Pagination {
    if let Some(total) = count(body, "totalCount") {
        return from_fields(body, "pageNumber", total, requested_page, requested_size);
    }

    if let Some(nested) = body.get("pagination").filter(|p| p.is_object()) {
        let total = count(nested, "totalCount")
            .or_else(|| count(nested, "totalRecords"))
            .unwrap_or(item_count as u64);
        return from_fields(nested, "currentPage", total, requested_page, requested_size);
    }

    let total = count(body, "totalRecords").unwrap_or(item_count as u64);
    Pagination {
        page_number: requested_page,
        page_size: requested_size,
        total_records: total,
        total_pages: page_count(total, requested_size),
    }
}

/// Pull the record array out of a listing body
pub fn items(body: &Value) -> &[Value] {
    let candidate = ["devices", "data"]
        .iter()
        .find_map(|field| body.get(*field).filter(|v| !v.is_null()))
        .unwrap_or(body);

    candidate.as_array().map(Vec::as_slice).unwrap_or(&[])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn total_records_derives_page_count() {
        let body = json!({ "totalRecords": 45 });
        assert_eq!(
            normalize(&body, 1, 20, 0),
            Pagination {
                page_number: 1,
                page_size: 20,
                total_records: 45,
                total_pages: 3,
            }
        );
    }

    #[test]
    fn exact_fields_win_over_nested_object() {
        let body = json!({
            "totalCount": 100,
            "pageNumber": 2,
            "pageSize": 25,
            "totalPages": 4,
            "pagination": { "currentPage": 9, "pageSize": 9, "totalCount": 9, "totalPages": 9 }
        });
        assert_eq!(
            normalize(&body, 1, 20, 25),
            Pagination {
                page_number: 2,
                page_size: 25,
                total_records: 100,
                total_pages: 4,
            }
        );
    }

    #[test]
    fn exact_fields_fill_gaps_from_request() {
        let body = json!({ "totalCount": 41 });
        assert_eq!(
            normalize(&body, 3, 20, 1),
            Pagination {
                page_number: 3,
                page_size: 20,
                total_records: 41,
                total_pages: 3,
            }
        );
    }

    #[test]
    fn nested_pagination_is_mapped() {
        let body = json!({
            "data": [],
            "pagination": { "currentPage": 2, "pageSize": 10, "totalCount": 35, "totalPages": 4 }
        });
        assert_eq!(
            normalize(&body, 1, 20, 0),
            Pagination {
                page_number: 2,
                page_size: 10,
                total_records: 35,
                total_pages: 4,
            }
        );
    }

    #[test]
    fn nested_pagination_outranks_total_records() {
        let body = json!({
            "totalRecords": 999,
            "pagination": { "currentPage": 1, "pageSize": 5, "totalCount": 6 }
        });
        let pagination = normalize(&body, 1, 20, 0);
        assert_eq!(pagination.total_records, 6);
        assert_eq!(pagination.total_pages, 2);
    }

    #[test]
    fn flat_array_counts_items() {
        let body = json!([{ "id": 1 }, { "id": 2 }, { "id": 3 }]);
        let pagination = normalize(&body, 1, 2, items(&body).len());
        assert_eq!(pagination.total_records, 3);
        assert_eq!(pagination.total_pages, 2);
    }

    #[test]
    fn items_prefer_devices_then_data_then_body() {
        let devices = json!({ "devices": [1, 2], "data": [3] });
        assert_eq!(items(&devices).len(), 2);

        let data = json!({ "data": [3] });
        assert_eq!(items(&data).len(), 1);

        let flat = json!([1, 2, 3]);
        assert_eq!(items(&flat).len(), 3);

        let neither = json!({ "devices": "oops" });
        assert!(items(&neither).is_empty());
    }

    #[test]
    fn zero_page_size_yields_no_pages() {
        assert_eq!(page_count(10, 0), 0);
        assert_eq!(page_count(0, 20), 0);
        assert_eq!(page_count(40, 20), 2);
    }
}
