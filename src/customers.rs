//! Customer Module
//!
//! CRUD over the device listing. Calls carry whatever access token is stored;
//! the backend decides whether it is still good.

use std::sync::Mutex;

use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, error, info};

use crate::api::{ApiClient, ApiError};
use crate::pagination::{self, Pagination};
use crate::tokens::TokenStore;

const DEVICES_PATH: &str = "/api/v1/Devices";
const DEFAULT_SORT: &str = "DeviceName";
const UNKNOWN_NAME: &str = "Unknown Device";

/// A device record with a display name
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Customer {
    pub name: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Customer {
    pub fn id(&self) -> Option<&Value> {
        self.fields.get("id")
    }
}

impl From<Value> for Customer {
    fn from(value: Value) -> Self {
        let mut fields = match value {
            Value::Object(map) => map,
            _ => Map::new(),
        };

        let pick = |fields: &Map<String, Value>, key: &str| {
            fields
                .get(key)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        let name = pick(&fields, "deviceName")
            .or_else(|| pick(&fields, "name"))
            .unwrap_or_else(|| UNKNOWN_NAME.to_string());
        fields.remove("name");

        Self { name, fields }
    }
}

/// Listing parameters; unset values fall back to the previous listing
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    pub page_number: Option<u64>,
    pub page_size: Option<u64>,
    pub sort_by: Option<String>,
    pub sort_descending: Option<bool>,
    pub search_term: Option<String>,
}

/// Query as sent on the wire
#[derive(Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
struct ResolvedQuery {
    page_number: u64,
    page_size: u64,
    sort_by: String,
    sort_descending: bool,
    search_term: String,
}

/// One page of customers
#[derive(Debug, Clone, Serialize)]
pub struct CustomerPage {
    pub customers: Vec<Customer>,
    pub pagination: Pagination,
}

/// Resource client for the device listing
pub struct CustomerClient {
    api: ApiClient,
    tokens: TokenStore,
    pagination: Mutex<Pagination>,
}

impl CustomerClient {
    pub fn new(api: ApiClient, tokens: TokenStore) -> Self {
        Self {
            api,
            tokens,
            pagination: Mutex::new(Pagination::default()),
        }
    }

    /// Pagination of the most recent listing
    pub fn pagination(&self) -> Pagination {
        self.pagination.lock().map(|p| *p).unwrap_or_default()
    }

    pub async fn list(&self, query: ListQuery) -> Result<CustomerPage, ResourceRequestError> {
        let resolved = self.resolve(query);
        self.fetch(resolved).await
    }

    pub async fn get(&self, id: &str) -> Result<Customer, ResourceRequestError> {
        let request = self.request(Method::GET, &format!("{}/{}", DEVICES_PATH, id));
        let value: Value = self.api.execute(request).await.map_err(|e| {
            error!("Get customer {} failed: {}", id, e);
            ResourceRequestError(e)
        })?;
        Ok(Customer::from(value))
    }

    /// Create a customer and re-list
    pub async fn create(&self, body: &Value) -> Result<CustomerPage, ResourceRequestError> {
        let request = self.request(Method::POST, DEVICES_PATH).json(body);
        self.api.execute_empty(request).await.map_err(|e| {
            error!("Create customer failed: {}", e);
            ResourceRequestError(e)
        })?;
        info!("Customer created");
        self.reload().await
    }

    /// Update a customer and re-list
    pub async fn update(&self, id: &str, body: &Value) -> Result<CustomerPage, ResourceRequestError> {
        let request = self
            .request(Method::PUT, &format!("{}/{}", DEVICES_PATH, id))
            .json(body);
        self.api.execute_empty(request).await.map_err(|e| {
            error!("Update customer {} failed: {}", id, e);
            ResourceRequestError(e)
        })?;
        info!("Customer {} updated", id);
        self.reload().await
    }

    /// Delete a customer and re-list
    pub async fn delete(&self, id: &str) -> Result<CustomerPage, ResourceRequestError> {
        let request = self.request(Method::DELETE, &format!("{}/{}", DEVICES_PATH, id));
        self.api.execute_empty(request).await.map_err(|e| {
            error!("Delete customer {} failed: {}", id, e);
            ResourceRequestError(e)
        })?;
        info!("Customer {} deleted", id);
        self.reload().await
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let token = self.tokens.access_token();
        self.api.request(method, path, token.as_deref())
    }

    fn resolve(&self, query: ListQuery) -> ResolvedQuery {
        let current = self.pagination();
        ResolvedQuery {
            page_number: query
                .page_number
                .filter(|n| *n > 0)
                .unwrap_or(current.page_number),
            page_size: query
                .page_size
                .filter(|n| *n > 0)
                .unwrap_or(current.page_size),
            sort_by: query
                .sort_by
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_SORT.to_string()),
            sort_descending: query.sort_descending.unwrap_or(false),
            search_term: query.search_term.unwrap_or_default(),
        }
    }

    /// Re-list after a mutation: keeps the current page and size, resets
    /// sort and search to their defaults
    async fn reload(&self) -> Result<CustomerPage, ResourceRequestError> {
        self.list(ListQuery::default()).await
    }

    async fn fetch(&self, query: ResolvedQuery) -> Result<CustomerPage, ResourceRequestError> {
        debug!(
            "Listing customers page {} (size {})",
            query.page_number, query.page_size
        );

        let request = self.request(Method::GET, DEVICES_PATH).query(&query);
        let body: Value = self.api.execute(request).await.map_err(|e| {
            error!("Fetch customers failed: {}", e);
            ResourceRequestError(e)
        })?;

        let customers: Vec<Customer> = pagination::items(&body)
            .iter()
            .cloned()
            .map(Customer::from)
            .collect();
        let pagination =
            pagination::normalize(&body, query.page_number, query.page_size, customers.len());

        if let Ok(mut current) = self.pagination.lock() {
            *current = pagination;
        }

        Ok(CustomerPage {
            customers,
            pagination,
        })
    }
}

/// A resource call failed upstream
#[derive(Debug, thiserror::Error)]
#[error("Request failed: {0}")]
pub struct ResourceRequestError(#[from] pub ApiError);

impl ResourceRequestError {
    pub fn status(&self) -> Option<u16> {
        self.0.status()
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }
}
