use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, to_bson, Bson, DateTime as BsonDateTime},
    error::{ErrorKind, WriteFailure},
    options::{FindOptions, IndexOptions},
    Client as MongoClient, Collection, Database, IndexModel,
};
use std::sync::Arc;

use crate::error::AppError;
use crate::models::{
    Cart, Courier, Food, Offer, Order, Transaction, TransactionStatus, Vendor,
};
use crate::services::stores::{
    CartStore, CatalogStore, ConfirmOutcome, CourierStore, OfferStore, OrderStore, StatusUpdate,
    Stores, TransactionStore,
};

/// Mongo-backed implementation of every store trait. All guarded writes
/// push the guard into the query filter so a single `update_one` or
/// `find_one_and_update` is the whole compare-and-set.
#[derive(Clone)]
pub struct MongoStore {
    client: MongoClient,
    db: Database,
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        &*err.kind,
        ErrorKind::Write(WriteFailure::WriteError(write_err)) if write_err.code == 11000
    )
}

impl MongoStore {
    pub async fn connect(uri: &str, database: &str) -> Result<Self, AppError> {
        tracing::info!(database = %database, "Connecting to MongoDB");
        let client = MongoClient::with_uri_str(uri).await.map_err(|e| {
            tracing::error!("Failed to connect to MongoDB: {}", e);
            AppError::Database(anyhow::Error::new(e))
        })?;
        let db = client.database(database);
        tracing::info!(database = %database, "Connected to MongoDB");
        Ok(Self { client, db })
    }

    /// Bundle one shared instance behind every store trait.
    pub fn stores(self: &Arc<Self>) -> Stores {
        Stores {
            catalog: self.clone(),
            offers: self.clone(),
            carts: self.clone(),
            transactions: self.clone(),
            orders: self.clone(),
            couriers: self.clone(),
        }
    }

    pub async fn initialize_indexes(&self) -> Result<(), AppError> {
        tracing::info!("Creating MongoDB indexes");

        self.foods()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "food_id": 1 })
                    .options(
                        IndexOptions::builder()
                            .name("food_id_idx".to_string())
                            .unique(true)
                            .build(),
                    )
                    .build(),
                None,
            )
            .await?;

        self.vendors()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "vendor_id": 1 })
                    .options(
                        IndexOptions::builder()
                            .name("vendor_id_idx".to_string())
                            .unique(true)
                            .build(),
                    )
                    .build(),
                None,
            )
            .await?;

        self.offers()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "offer_id": 1 })
                    .options(
                        IndexOptions::builder()
                            .name("offer_id_idx".to_string())
                            .unique(true)
                            .build(),
                    )
                    .build(),
                None,
            )
            .await?;

        // The fresh-cart insert relies on this unique index to lose
        // cleanly when two writers race on the same customer.
        self.carts()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "customer_id": 1 })
                    .options(
                        IndexOptions::builder()
                            .name("customer_id_idx".to_string())
                            .unique(true)
                            .build(),
                    )
                    .build(),
                None,
            )
            .await?;

        self.transactions()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "transaction_id": 1 })
                    .options(
                        IndexOptions::builder()
                            .name("transaction_id_idx".to_string())
                            .unique(true)
                            .build(),
                    )
                    .build(),
                None,
            )
            .await?;

        self.orders()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "order_id": 1 })
                    .options(
                        IndexOptions::builder()
                            .name("order_id_idx".to_string())
                            .unique(true)
                            .build(),
                    )
                    .build(),
                None,
            )
            .await?;

        self.orders()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "customer_id": 1, "created_utc": -1 })
                    .options(
                        IndexOptions::builder()
                            .name("customer_orders_idx".to_string())
                            .build(),
                    )
                    .build(),
                None,
            )
            .await?;

        self.orders()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "vendor_id": 1, "created_utc": -1 })
                    .options(
                        IndexOptions::builder()
                            .name("vendor_orders_idx".to_string())
                            .build(),
                    )
                    .build(),
                None,
            )
            .await?;

        self.orders()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "created_utc": 1 })
                    .options(
                        IndexOptions::builder()
                            .name("created_utc_idx".to_string())
                            .build(),
                    )
                    .build(),
                None,
            )
            .await?;

        self.orders()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "status": 1, "courier_id": 1, "created_utc": 1 })
                    .options(
                        IndexOptions::builder()
                            .name("unassigned_sweep_idx".to_string())
                            .build(),
                    )
                    .build(),
                None,
            )
            .await?;

        self.couriers()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "courier_id": 1 })
                    .options(
                        IndexOptions::builder()
                            .name("courier_id_idx".to_string())
                            .unique(true)
                            .build(),
                    )
                    .build(),
                None,
            )
            .await?;

        self.couriers()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "pincode": 1, "verified": 1, "is_available": 1 })
                    .options(
                        IndexOptions::builder()
                            .name("assignable_couriers_idx".to_string())
                            .build(),
                    )
                    .build(),
                None,
            )
            .await?;

        tracing::info!("MongoDB indexes ready");
        Ok(())
    }

    pub async fn health_check(&self) -> Result<(), AppError> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| {
                tracing::error!("MongoDB health check failed: {}", e);
                AppError::Database(anyhow::Error::new(e))
            })?;
        Ok(())
    }

    fn foods(&self) -> Collection<Food> {
        self.db.collection("foods")
    }

    fn vendors(&self) -> Collection<Vendor> {
        self.db.collection("vendors")
    }

    fn offers(&self) -> Collection<Offer> {
        self.db.collection("offers")
    }

    fn carts(&self) -> Collection<Cart> {
        self.db.collection("carts")
    }

    fn transactions(&self) -> Collection<Transaction> {
        self.db.collection("transactions")
    }

    fn orders(&self) -> Collection<Order> {
        self.db.collection("orders")
    }

    fn couriers(&self) -> Collection<Courier> {
        self.db.collection("couriers")
    }
}

#[async_trait]
impl CatalogStore for MongoStore {
    async fn resolve_foods(&self, food_ids: &[String]) -> Result<Vec<Food>, AppError> {
        let cursor = self
            .foods()
            .find(doc! { "food_id": { "$in": food_ids.to_vec() } }, None)
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn find_vendor(&self, vendor_id: &str) -> Result<Option<Vendor>, AppError> {
        Ok(self
            .vendors()
            .find_one(doc! { "vendor_id": vendor_id }, None)
            .await?)
    }
}

#[async_trait]
impl OfferStore for MongoStore {
    async fn find_offer(&self, offer_id: &str) -> Result<Option<Offer>, AppError> {
        Ok(self
            .offers()
            .find_one(doc! { "offer_id": offer_id }, None)
            .await?)
    }
}

#[async_trait]
impl CartStore for MongoStore {
    async fn find_cart(&self, customer_id: &str) -> Result<Option<Cart>, AppError> {
        Ok(self
            .carts()
            .find_one(doc! { "customer_id": customer_id }, None)
            .await?)
    }

    async fn put_cart(
        &self,
        cart: &Cart,
        expected_version: Option<i64>,
    ) -> Result<bool, AppError> {
        match expected_version {
            None => {
                let mut stored = cart.clone();
                stored.version = 0;
                match self.carts().insert_one(&stored, None).await {
                    Ok(_) => Ok(true),
                    Err(err) if is_duplicate_key(&err) => Ok(false),
                    Err(err) => Err(err.into()),
                }
            }
            Some(expected) => {
                let lines = to_bson(&cart.lines)
                    .map_err(|e| AppError::Database(anyhow::Error::new(e)))?;
                let result = self
                    .carts()
                    .update_one(
                        doc! { "customer_id": &cart.customer_id, "version": expected },
                        doc! {
                            "$set": { "lines": lines, "updated_utc": BsonDateTime::now() },
                            "$inc": { "version": 1_i64 },
                        },
                        None,
                    )
                    .await?;
                Ok(result.matched_count == 1)
            }
        }
    }
}

#[async_trait]
impl TransactionStore for MongoStore {
    async fn insert_transaction(&self, txn: &Transaction) -> Result<(), AppError> {
        self.transactions().insert_one(txn, None).await?;
        Ok(())
    }

    async fn find_transaction(
        &self,
        transaction_id: &str,
    ) -> Result<Option<Transaction>, AppError> {
        Ok(self
            .transactions()
            .find_one(doc! { "transaction_id": transaction_id }, None)
            .await?)
    }

    async fn confirm_transaction(
        &self,
        transaction_id: &str,
        order_id: &str,
        vendor_id: &str,
    ) -> Result<ConfirmOutcome, AppError> {
        let updated = self
            .transactions()
            .find_one_and_update(
                doc! {
                    "transaction_id": transaction_id,
                    "status": TransactionStatus::Open.to_string(),
                },
                doc! {
                    "$set": {
                        "status": TransactionStatus::Confirmed.to_string(),
                        "order_id": order_id,
                        "vendor_id": vendor_id,
                        "updated_utc": BsonDateTime::now(),
                    }
                },
                None,
            )
            .await?;

        if updated.is_some() {
            return Ok(ConfirmOutcome::Confirmed);
        }

        // Lost the race or the id is bogus. Look again to tell which.
        match self.find_transaction(transaction_id).await? {
            None => Ok(ConfirmOutcome::Missing),
            Some(txn)
                if txn.status == TransactionStatus::Confirmed
                    && txn.order_id.as_deref() == Some(order_id) =>
            {
                Ok(ConfirmOutcome::AlreadyConfirmed)
            }
            Some(_) => Ok(ConfirmOutcome::Conflict),
        }
    }
}

#[async_trait]
impl OrderStore for MongoStore {
    async fn insert_order(&self, order: &Order) -> Result<(), AppError> {
        self.orders().insert_one(order, None).await?;
        Ok(())
    }

    async fn find_order(&self, order_id: &str) -> Result<Option<Order>, AppError> {
        Ok(self
            .orders()
            .find_one(doc! { "order_id": order_id }, None)
            .await?)
    }

    async fn list_orders_by_customer(&self, customer_id: &str) -> Result<Vec<Order>, AppError> {
        let find_options = FindOptions::builder()
            .sort(doc! { "created_utc": -1 })
            .build();
        let cursor = self
            .orders()
            .find(doc! { "customer_id": customer_id }, find_options)
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn list_orders_by_vendor(&self, vendor_id: &str) -> Result<Vec<Order>, AppError> {
        let find_options = FindOptions::builder()
            .sort(doc! { "created_utc": -1 })
            .build();
        let cursor = self
            .orders()
            .find(doc! { "vendor_id": vendor_id }, find_options)
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn update_order_status(
        &self,
        order_id: &str,
        update: &StatusUpdate,
    ) -> Result<bool, AppError> {
        let mut set_doc = doc! {
            "status": update.to.to_string(),
            "updated_utc": BsonDateTime::now(),
        };
        if let Some(remarks) = &update.remarks {
            set_doc.insert("remarks", remarks.as_str());
        }
        if let Some(minutes) = update.ready_minutes {
            set_doc.insert("ready_minutes", minutes as i64);
        }

        let result = self
            .orders()
            .update_one(
                doc! { "order_id": order_id, "status": update.from.to_string() },
                doc! { "$set": set_doc },
                None,
            )
            .await?;
        Ok(result.matched_count == 1)
    }

    async fn bind_courier(&self, order_id: &str, courier_id: &str) -> Result<bool, AppError> {
        let result = self
            .orders()
            .update_one(
                doc! {
                    "order_id": order_id,
                    "courier_id": Bson::Null,
                    "status": { "$in": ["WAITING", "PREPARING", "READY"] },
                },
                doc! {
                    "$set": {
                        "courier_id": courier_id,
                        "updated_utc": BsonDateTime::now(),
                    }
                },
                None,
            )
            .await?;
        Ok(result.matched_count == 1)
    }

    async fn delete_order(&self, order_id: &str) -> Result<(), AppError> {
        self.orders()
            .delete_one(doc! { "order_id": order_id }, None)
            .await?;
        Ok(())
    }

    async fn list_orders_created_between(
        &self,
        created_after: DateTime<Utc>,
        created_before: DateTime<Utc>,
    ) -> Result<Vec<Order>, AppError> {
        let find_options = FindOptions::builder()
            .sort(doc! { "created_utc": 1 })
            .build();
        let cursor = self
            .orders()
            .find(
                doc! {
                    "created_utc": {
                        "$gte": BsonDateTime::from_chrono(created_after),
                        "$lte": BsonDateTime::from_chrono(created_before),
                    },
                },
                find_options,
            )
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn list_unassigned_orders(
        &self,
        created_after: DateTime<Utc>,
        created_before: DateTime<Utc>,
    ) -> Result<Vec<Order>, AppError> {
        let cursor = self
            .orders()
            .find(
                doc! {
                    "status": { "$in": ["WAITING", "PREPARING", "READY"] },
                    "courier_id": Bson::Null,
                    "created_utc": {
                        "$gte": BsonDateTime::from_chrono(created_after),
                        "$lte": BsonDateTime::from_chrono(created_before),
                    },
                },
                None,
            )
            .await?;
        Ok(cursor.try_collect().await?)
    }
}

#[async_trait]
impl CourierStore for MongoStore {
    async fn find_courier(&self, courier_id: &str) -> Result<Option<Courier>, AppError> {
        Ok(self
            .couriers()
            .find_one(doc! { "courier_id": courier_id }, None)
            .await?)
    }

    async fn list_assignable_couriers(&self, pincode: &str) -> Result<Vec<Courier>, AppError> {
        let cursor = self
            .couriers()
            .find(
                doc! {
                    "pincode": pincode,
                    "verified": true,
                    "is_available": true,
                    "active_order_id": Bson::Null,
                },
                None,
            )
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn claim_courier(&self, courier_id: &str, order_id: &str) -> Result<bool, AppError> {
        let result = self
            .couriers()
            .update_one(
                doc! {
                    "courier_id": courier_id,
                    "verified": true,
                    "is_available": true,
                    "active_order_id": Bson::Null,
                },
                doc! {
                    "$set": {
                        "is_available": false,
                        "active_order_id": order_id,
                        "updated_utc": BsonDateTime::now(),
                    }
                },
                None,
            )
            .await?;
        Ok(result.matched_count == 1)
    }

    async fn release_courier(&self, courier_id: &str, order_id: &str) -> Result<bool, AppError> {
        let result = self
            .couriers()
            .update_one(
                doc! { "courier_id": courier_id, "active_order_id": order_id },
                doc! {
                    "$set": { "is_available": true, "updated_utc": BsonDateTime::now() },
                    "$unset": { "active_order_id": "" },
                },
                None,
            )
            .await?;
        Ok(result.matched_count == 1)
    }

    async fn set_courier_status(
        &self,
        courier_id: &str,
        available: bool,
        lat: f64,
        lng: f64,
    ) -> Result<bool, AppError> {
        let result = self
            .couriers()
            .update_one(
                doc! { "courier_id": courier_id },
                doc! {
                    "$set": {
                        "is_available": available,
                        "lat": lat,
                        "lng": lng,
                        "updated_utc": BsonDateTime::now(),
                    }
                },
                None,
            )
            .await?;
        Ok(result.matched_count == 1)
    }
}
