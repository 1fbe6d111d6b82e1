//! Inventory, store and sales endpoints.

use std::marker::PhantomData;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;

use stockdesk_core::Entity;

use crate::api::fetch_list;
use crate::error::ClientResult;
use crate::transport::{ApiRequest, Transport};
use crate::types::{Category, PriceUpdate, PriceUpdateResult, Product, Sale, Stock, Store};

/// CRUD over one `/{collection}/` endpoint.
#[derive(Debug)]
pub struct Resource<T> {
    transport: Arc<Transport>,
    collection: &'static str,
    _record: PhantomData<fn() -> T>,
}

impl<T> Clone for Resource<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            collection: self.collection,
            _record: PhantomData,
        }
    }
}

impl<T> Resource<T>
where
    T: Entity + DeserializeOwned,
{
    pub fn new(transport: Arc<Transport>, collection: &'static str) -> Self {
        Self {
            transport,
            collection,
            _record: PhantomData,
        }
    }

    fn collection_path(&self) -> String {
        format!("/{}/", self.collection)
    }

    fn detail_path(&self, id: T::Id) -> String {
        format!("/{}/{}/", self.collection, id)
    }

    pub async fn list(&self) -> ClientResult<Vec<T>> {
        fetch_list(&self.transport, &self.collection_path()).await
    }

    pub async fn get(&self, id: T::Id) -> ClientResult<T> {
        self.transport
            .send_json(&ApiRequest::get(self.detail_path(id)))
            .await
    }

    pub async fn create<B: Serialize + ?Sized>(&self, body: &B) -> ClientResult<T> {
        let request = ApiRequest::post(self.collection_path()).json(body)?;
        self.transport.send_json(&request).await
    }

    /// Partial update; returns the server's record.
    pub async fn update<B: Serialize + ?Sized>(&self, id: T::Id, body: &B) -> ClientResult<T> {
        let request = ApiRequest::patch(self.detail_path(id)).json(body)?;
        self.transport.send_json(&request).await
    }

    pub async fn delete(&self, id: T::Id) -> ClientResult<()> {
        self.transport
            .send_empty(&ApiRequest::delete(self.detail_path(id)))
            .await
    }
}

#[derive(Debug, Clone)]
pub struct CatalogApi {
    transport: Arc<Transport>,
}

impl CatalogApi {
    pub fn new(transport: Arc<Transport>) -> Self {
        Self { transport }
    }

    pub fn categories(&self) -> Resource<Category> {
        Resource::new(Arc::clone(&self.transport), "categories")
    }

    pub fn products(&self) -> Resource<Product> {
        Resource::new(Arc::clone(&self.transport), "products")
    }

    pub fn stock(&self) -> Resource<Stock> {
        Resource::new(Arc::clone(&self.transport), "stock")
    }

    pub fn stores(&self) -> Resource<Store> {
        Resource::new(Arc::clone(&self.transport), "stores")
    }

    pub fn sales(&self) -> Resource<Sale> {
        Resource::new(Arc::clone(&self.transport), "sales")
    }

    /// Stock records at or below their reorder level.
    pub async fn low_stock(&self) -> ClientResult<Vec<Stock>> {
        let mut stock = self.stock().list().await?;
        stock.retain(Stock::needs_reorder);
        Ok(stock)
    }

    /// Super-admin only; the API enforces it.
    pub async fn bulk_price_update(&self, update: &PriceUpdate) -> ClientResult<PriceUpdateResult> {
        let request = ApiRequest::post("/products/bulk_price_update/").json(update)?;
        self.transport.send_json(&request).await
    }
}
