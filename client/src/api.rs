//! Command client for the todo service's REST API.
//!
//! Commands never touch local state. Their effect becomes visible when the
//! server broadcasts the matching event on the stream.

use crate::error::{Result, TodoSyncError, ValidationError};
use crate::types::{ItemId, ListId, NewList, TodoItem};
use reqwest::{Client, RequestBuilder, Url};
use std::future::Future;

/// Remote operations on todo lists.
///
/// Every call issues exactly one request and resolves to success or a
/// reported error. There is no timeout.
pub trait TodoApi: Send + Sync {
    /// `POST /list` with `{ name, owner }`.
    ///
    /// # Errors
    ///
    /// Returns [`TodoSyncError::Validation`] for an empty name or owner,
    /// [`TodoSyncError::Request`] when the request fails in transit, and
    /// [`TodoSyncError::Api`] for a non-success status.
    fn create_list(&self, list: &NewList) -> impl Future<Output = Result<()>> + Send;

    /// `DELETE /list/{id}`.
    ///
    /// # Errors
    ///
    /// See [`TodoApi::create_list`].
    fn delete_list(&self, list: &ListId) -> impl Future<Output = Result<()>> + Send;

    /// `PUT /list/{id}/add`: the server appends a blank item.
    ///
    /// # Errors
    ///
    /// See [`TodoApi::create_list`].
    fn add_item(&self, list: &ListId) -> impl Future<Output = Result<()>> + Send;

    /// `PUT /list/{id}/item/{itemId}` with the full item.
    ///
    /// # Errors
    ///
    /// See [`TodoApi::create_list`].
    fn update_item(&self, item: &TodoItem) -> impl Future<Output = Result<()>> + Send;

    /// `DELETE /list/{id}/item/{itemId}`.
    ///
    /// # Errors
    ///
    /// See [`TodoApi::create_list`].
    fn delete_item(&self, list: &ListId, item: &ItemId) -> impl Future<Output = Result<()>> + Send;
}

/// HTTP implementation of [`TodoApi`].
#[derive(Debug, Clone)]
pub struct CommandClient {
    http: Client,
    base: Url,
}

impl CommandClient {
    /// Create a client for the service at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`TodoSyncError::InvalidUrl`] if `base_url` does not parse or
    /// cannot carry a path.
    pub fn new(base_url: &str) -> Result<Self> {
        let base = Url::parse(base_url).map_err(|e| TodoSyncError::InvalidUrl(e.to_string()))?;
        Self::with_client(Client::new(), base)
    }

    /// Create a client sharing an existing HTTP connection pool.
    ///
    /// # Errors
    ///
    /// Returns [`TodoSyncError::InvalidUrl`] if `base` cannot carry a path.
    pub fn with_client(http: Client, base: Url) -> Result<Self> {
        if base.cannot_be_a_base() {
            return Err(TodoSyncError::InvalidUrl(base.to_string()));
        }
        Ok(Self { http, base })
    }

    /// Service base URL.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base
    }

    /// Underlying HTTP client.
    #[must_use]
    pub const fn http(&self) -> &Client {
        &self.http
    }

    fn url(&self, segments: &[&str]) -> Result<Url> {
        endpoint(&self.base, segments)
    }
}

/// Append path segments to `base`, percent-encoding each one.
pub(crate) fn endpoint(base: &Url, segments: &[&str]) -> Result<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| TodoSyncError::InvalidUrl(base.to_string()))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

async fn execute(request: RequestBuilder) -> Result<()> {
    let response = request.send().await?;

    let status = response.status();
    if status.is_success() {
        return Ok(());
    }

    let message = response.text().await.unwrap_or_default();
    Err(TodoSyncError::Api {
        status: status.as_u16(),
        message,
    })
}

fn require_id(blank: bool, what: &'static str) -> Result<()> {
    if blank {
        return Err(ValidationError::BlankId(what).into());
    }
    Ok(())
}

impl TodoApi for CommandClient {
    fn create_list(&self, list: &NewList) -> impl Future<Output = Result<()>> + Send {
        async move {
            if list.name.trim().is_empty() {
                return Err(ValidationError::EmptyListName.into());
            }
            if list.owner.trim().is_empty() {
                return Err(ValidationError::EmptyOwner.into());
            }

            let url = self.url(&["list"])?;
            tracing::debug!(%url, name = %list.name, "Creating list");
            execute(self.http.post(url).json(list)).await
        }
    }

    fn delete_list(&self, list: &ListId) -> impl Future<Output = Result<()>> + Send {
        async move {
            require_id(list.is_blank(), "list")?;

            let url = self.url(&["list", list.as_str()])?;
            tracing::debug!(%url, "Deleting list");
            execute(self.http.delete(url)).await
        }
    }

    fn add_item(&self, list: &ListId) -> impl Future<Output = Result<()>> + Send {
        async move {
            require_id(list.is_blank(), "list")?;

            let url = self.url(&["list", list.as_str(), "add"])?;
            tracing::debug!(%url, "Adding item");
            execute(self.http.put(url)).await
        }
    }

    fn update_item(&self, item: &TodoItem) -> impl Future<Output = Result<()>> + Send {
        async move {
            require_id(item.list.is_blank(), "list")?;
            require_id(item.id.is_blank(), "item")?;

            let url = self.url(&["list", item.list.as_str(), "item", item.id.as_str()])?;
            tracing::debug!(%url, "Updating item");
            execute(self.http.put(url).json(item)).await
        }
    }

    fn delete_item(&self, list: &ListId, item: &ItemId) -> impl Future<Output = Result<()>> + Send {
        async move {
            require_id(list.is_blank(), "list")?;
            require_id(item.is_blank(), "item")?;

            let url = self.url(&["list", list.as_str(), "item", item.as_str()])?;
            tracing::debug!(%url, "Deleting item");
            execute(self.http.delete(url)).await
        }
    }
}
