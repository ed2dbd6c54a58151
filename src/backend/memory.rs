use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use axum::body::Bytes;
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use crate::backend::{
    BackendError, IdentityProvider, OrderChange, OrderQuery, OrderStore, PhotoStore,
};
use crate::models::driver::{Driver, Session};
use crate::models::order::{Order, OrderUpdate};

/// Order rows keyed by id. Writes are last-write-wins per row.
pub struct MemoryOrderStore {
    orders: DashMap<Uuid, Order>,
    changes_tx: broadcast::Sender<OrderChange>,
    writes_rejected: AtomicBool,
}

impl MemoryOrderStore {
    pub fn new(event_buffer_size: usize) -> Self {
        let (changes_tx, _unused_rx) = broadcast::channel(event_buffer_size);

        Self {
            orders: DashMap::new(),
            changes_tx,
            writes_rejected: AtomicBool::new(false),
        }
    }

    /// Makes every subsequent write fail as if the backend were
    /// unreachable. Reads keep working.
    pub fn set_rejecting_writes(&self, rejecting: bool) {
        self.writes_rejected.store(rejecting, Ordering::SeqCst);
    }

    fn ensure_writable(&self) -> Result<(), BackendError> {
        if self.writes_rejected.load(Ordering::SeqCst) {
            return Err(BackendError::Unavailable("order store rejected the write".to_string()));
        }
        Ok(())
    }

    fn publish(&self, order: &Order) {
        // No subscribers is not an error.
        let _ = self.changes_tx.send(OrderChange::for_order(order));
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn insert(&self, order: Order) -> Result<(), BackendError> {
        self.ensure_writable()?;

        match self.orders.entry(order.id) {
            Entry::Occupied(_) => Err(BackendError::AlreadyExists(format!("order {}", order.id))),
            Entry::Vacant(slot) => {
                self.publish(&order);
                slot.insert(order);
                Ok(())
            }
        }
    }

    async fn get(&self, id: Uuid) -> Result<Option<Order>, BackendError> {
        Ok(self.orders.get(&id).map(|entry| entry.value().clone()))
    }

    async fn fetch(&self, query: &OrderQuery) -> Result<Vec<Order>, BackendError> {
        let mut orders: Vec<Order> = self
            .orders
            .iter()
            .filter(|entry| query.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();

        orders.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(orders)
    }

    async fn update(&self, id: Uuid, update: &OrderUpdate) -> Result<Order, BackendError> {
        self.ensure_writable()?;

        let updated = {
            let mut order = self.orders.get_mut(&id).ok_or(BackendError::NotFound)?;
            update.apply_to(&mut *order);
            order.clone()
        };

        debug!(order_id = %id, status = %updated.status, "order row updated");
        self.publish(&updated);
        Ok(updated)
    }

    async fn count(&self) -> Result<usize, BackendError> {
        Ok(self.orders.len())
    }

    fn subscribe(&self) -> broadcast::Receiver<OrderChange> {
        self.changes_tx.subscribe()
    }
}

#[derive(Debug, Clone)]
pub struct StoredPhoto {
    pub payload: Bytes,
    pub content_type: String,
}

pub struct MemoryPhotoStore {
    bucket: String,
    public_base_url: String,
    provisioned: AtomicBool,
    objects: DashMap<String, StoredPhoto>,
}

impl MemoryPhotoStore {
    pub fn new(bucket: impl Into<String>, public_base_url: impl Into<String>, provisioned: bool) -> Self {
        Self {
            bucket: bucket.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
            provisioned: AtomicBool::new(provisioned),
            objects: DashMap::new(),
        }
    }

    pub fn set_provisioned(&self, provisioned: bool) {
        self.provisioned.store(provisioned, Ordering::SeqCst);
    }

    pub fn object(&self, key: &str) -> Option<StoredPhoto> {
        self.objects.get(key).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[async_trait]
impl PhotoStore for MemoryPhotoStore {
    async fn upload(
        &self,
        driver_id: Uuid,
        file_name: &str,
        payload: Bytes,
        content_type: &str,
    ) -> Result<String, BackendError> {
        if !self.provisioned.load(Ordering::SeqCst) {
            return Err(BackendError::BucketMissing(self.bucket.clone()));
        }

        let key = format!("{driver_id}/{file_name}");
        self.objects.insert(
            key.clone(),
            StoredPhoto {
                payload,
                content_type: content_type.to_string(),
            },
        );

        Ok(format!("{}/{}/{}", self.public_base_url, self.bucket, key))
    }

    async fn remove(&self, driver_id: Uuid, file_name: &str) -> Result<(), BackendError> {
        self.objects.remove(&format!("{driver_id}/{file_name}"));
        Ok(())
    }
}

struct Account {
    password: String,
    driver: Driver,
}

/// Driver accounts and bearer sessions.
///
/// Credentials are held as given; this provider is meant for local runs
/// and tests, not for real accounts.
pub struct MemoryIdentity {
    accounts: DashMap<String, Account>,
    sessions: DashMap<String, Uuid>,
    drivers: DashMap<Uuid, Driver>,
}

impl MemoryIdentity {
    pub fn new() -> Self {
        Self {
            accounts: DashMap::new(),
            sessions: DashMap::new(),
            drivers: DashMap::new(),
        }
    }
}

impl Default for MemoryIdentity {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[async_trait]
impl IdentityProvider for MemoryIdentity {
    async fn register_driver(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<Driver, BackendError> {
        let key = normalize_email(email);

        let driver = Driver {
            id: Uuid::new_v4(),
            name: name.trim().to_string(),
            email: key.clone(),
            created_at: Utc::now(),
        };

        match self.accounts.entry(key) {
            Entry::Occupied(_) => {
                return Err(BackendError::AlreadyExists(format!("driver {}", driver.email)));
            }
            Entry::Vacant(slot) => {
                slot.insert(Account {
                    password: password.to_string(),
                    driver: driver.clone(),
                });
            }
        }

        self.drivers.insert(driver.id, driver.clone());
        Ok(driver)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, BackendError> {
        let driver = {
            let account = self
                .accounts
                .get(&normalize_email(email))
                .ok_or(BackendError::InvalidCredentials)?;

            if account.password != password {
                return Err(BackendError::InvalidCredentials);
            }
            account.driver.clone()
        };

        let token = Uuid::new_v4().simple().to_string();
        self.sessions.insert(token.clone(), driver.id);

        Ok(Session {
            token,
            driver,
            issued_at: Utc::now(),
        })
    }

    async fn resolve(&self, token: &str) -> Result<Option<Driver>, BackendError> {
        let Some(driver_id) = self.sessions.get(token).map(|entry| *entry.value()) else {
            return Ok(None);
        };

        Ok(self.drivers.get(&driver_id).map(|entry| entry.value().clone()))
    }

    async fn sign_out(&self, token: &str) -> Result<(), BackendError> {
        self.sessions.remove(token);
        Ok(())
    }

    async fn driver_count(&self) -> Result<usize, BackendError> {
        Ok(self.drivers.len())
    }

    async fn session_count(&self) -> Result<usize, BackendError> {
        Ok(self.sessions.len())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate, TimeZone, Utc};
    use uuid::Uuid;

    use super::*;
    use crate::models::order::{OrderStatus, OrderType};

    fn order(pickup: Option<Uuid>, dropoff: Option<Uuid>, created_at: chrono::DateTime<Utc>) -> Order {
        Order {
            id: Uuid::new_v4(),
            order_number: format!("ORD-{}", created_at.timestamp()),
            customer_name: "Sanne".to_string(),
            shipping_address: "Lange Voorhout 10".to_string(),
            phone: None,
            order_type: OrderType::Delivery,
            status: OrderStatus::ReadyForDelivery,
            qr_code: "QR".to_string(),
            location: None,
            estimated_pickup_at: None,
            estimated_dropoff_at: None,
            assigned_pickup_driver_id: pickup,
            assigned_dropoff_driver_id: dropoff,
            pickup_photo_url: None,
            delivery_photo_url: None,
            recipient_name: None,
            picked_up_at: None,
            created_at,
            updated_at: created_at,
        }
    }

    #[tokio::test]
    async fn fetch_matches_either_assignment_and_sorts_by_creation() {
        let store = MemoryOrderStore::new(16);
        let driver = Uuid::new_v4();
        let other = Uuid::new_v4();
        let now = Utc::now();

        let later = order(None, Some(driver), now);
        let earlier = order(Some(driver), None, now - Duration::hours(1));
        let foreign = order(Some(other), Some(other), now);

        store.insert(later.clone()).await.unwrap();
        store.insert(earlier.clone()).await.unwrap();
        store.insert(foreign).await.unwrap();

        let found = store.fetch(&OrderQuery::for_driver(driver)).await.unwrap();
        let ids: Vec<Uuid> = found.iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![earlier.id, later.id]);
    }

    #[tokio::test]
    async fn day_filter_excludes_neighbouring_days() {
        let store = MemoryOrderStore::new(16);
        let driver = Uuid::new_v4();
        let day = NaiveDate::from_ymd_opt(2026, 3, 4).unwrap();

        let midnight = Utc.with_ymd_and_hms(2026, 3, 4, 0, 0, 0).unwrap();
        let last_moment = Utc.with_ymd_and_hms(2026, 3, 4, 23, 59, 59).unwrap();
        let next_day = Utc.with_ymd_and_hms(2026, 3, 5, 0, 0, 0).unwrap();
        let previous_day = Utc.with_ymd_and_hms(2026, 3, 3, 23, 59, 59).unwrap();

        for at in [midnight, last_moment, next_day, previous_day] {
            store.insert(order(Some(driver), None, at)).await.unwrap();
        }

        let found = store
            .fetch(&OrderQuery::for_driver(driver).on_day(day))
            .await
            .unwrap();
        let times: Vec<_> = found.iter().map(|o| o.created_at).collect();
        assert_eq!(times, vec![midnight, last_moment]);
    }

    #[tokio::test]
    async fn status_filter_is_applied() {
        let store = MemoryOrderStore::new(16);
        let driver = Uuid::new_v4();
        let mut scanned = order(Some(driver), None, Utc::now());
        scanned.status = OrderStatus::Scanned;
        store.insert(scanned.clone()).await.unwrap();
        store
            .insert(order(Some(driver), None, Utc::now()))
            .await
            .unwrap();

        let found = store
            .fetch(&OrderQuery::for_driver(driver).with_statuses(&[OrderStatus::Scanned]))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, scanned.id);
    }

    #[tokio::test]
    async fn update_publishes_change_for_assigned_drivers() {
        let store = MemoryOrderStore::new(16);
        let driver = Uuid::new_v4();
        let row = order(Some(driver), None, Utc::now());
        store.insert(row.clone()).await.unwrap();

        let mut rx = store.subscribe();
        let updated = store
            .update(row.id, &OrderUpdate::status(OrderStatus::Scanned, Utc::now()))
            .await
            .unwrap();
        assert_eq!(updated.status, OrderStatus::Scanned);

        let change = rx.recv().await.unwrap();
        assert_eq!(change.order_id, row.id);
        assert!(change.concerns(driver));
        assert!(!change.concerns(Uuid::new_v4()));
    }

    #[tokio::test]
    async fn rejected_write_keeps_row() {
        let store = MemoryOrderStore::new(16);
        let row = order(Some(Uuid::new_v4()), None, Utc::now());
        store.insert(row.clone()).await.unwrap();

        store.set_rejecting_writes(true);
        let result = store
            .update(row.id, &OrderUpdate::status(OrderStatus::Scanned, Utc::now()))
            .await;
        assert!(matches!(result, Err(BackendError::Unavailable(_))));

        store.set_rejecting_writes(false);
        let stored = store.get(row.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::ReadyForDelivery);
    }

    #[tokio::test]
    async fn update_of_missing_row_is_not_found() {
        let store = MemoryOrderStore::new(16);
        let result = store
            .update(Uuid::new_v4(), &OrderUpdate::status(OrderStatus::Scanned, Utc::now()))
            .await;
        assert!(matches!(result, Err(BackendError::NotFound)));
    }

    #[tokio::test]
    async fn photo_upload_returns_public_url() {
        let photos = MemoryPhotoStore::new("order-photos", "https://cdn.test/", true);
        let driver = Uuid::nil();

        let url = photos
            .upload(driver, "pickup_ORD-1_1.jpg", Bytes::from_static(b"jpeg"), "image/jpeg")
            .await
            .unwrap();

        let key = format!("{driver}/pickup_ORD-1_1.jpg");
        assert_eq!(url, format!("https://cdn.test/order-photos/{key}"));
        assert_eq!(photos.object(&key).unwrap().content_type, "image/jpeg");
    }

    #[tokio::test]
    async fn unprovisioned_bucket_is_reported() {
        let photos = MemoryPhotoStore::new("order-photos", "https://cdn.test", false);
        let result = photos
            .upload(Uuid::nil(), "a.jpg", Bytes::from_static(b"x"), "image/jpeg")
            .await;
        assert!(matches!(result, Err(BackendError::BucketMissing(bucket)) if bucket == "order-photos"));
        assert!(photos.is_empty());
    }

    #[tokio::test]
    async fn sign_in_resolves_and_sign_out_clears_session() {
        let identity = MemoryIdentity::new();
        let driver = identity
            .register_driver("Demo Chauffeur", " Demo@Example.com ", "secret")
            .await
            .unwrap();
        assert_eq!(driver.email, "demo@example.com");

        let session = identity.sign_in("demo@example.com", "secret").await.unwrap();
        assert_eq!(session.driver.id, driver.id);
        assert_eq!(identity.resolve(&session.token).await.unwrap(), Some(driver));

        identity.sign_out(&session.token).await.unwrap();
        assert_eq!(identity.resolve(&session.token).await.unwrap(), None);
        assert_eq!(identity.session_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn wrong_password_and_duplicate_email_are_rejected() {
        let identity = MemoryIdentity::new();
        identity
            .register_driver("Kees", "kees@example.com", "pw")
            .await
            .unwrap();

        assert!(matches!(
            identity.sign_in("kees@example.com", "nope").await,
            Err(BackendError::InvalidCredentials)
        ));
        assert!(matches!(
            identity.register_driver("Kees 2", "KEES@example.com", "pw").await,
            Err(BackendError::AlreadyExists(_))
        ));
    }
}
