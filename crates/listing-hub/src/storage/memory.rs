//! In-memory store implementing every repository trait.
//!
//! Used when no `DATABASE_URL` is configured and throughout the test suites. It
//! mirrors the Postgres outbox trigger: when a flat becomes `approved`, one unsent
//! notification is queued for each subscriber of its house.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::repository::{FlatRepository, HouseRepository, NotifyRepository, RepositoryError};
use crate::domain::{
    Flat, FlatChange, FlatKey, FlatStatus, House, Notify, NotifyStatus, StatusFilter,
    Subscription, UserId,
};

#[derive(Debug, Default)]
struct MemoryState {
    houses: BTreeMap<i64, House>,
    flats: BTreeMap<FlatKey, Flat>,
    subscriptions: Vec<Subscription>,
    outbox: BTreeMap<i64, Notify>,
    next_notify_id: i64,
}

impl MemoryState {
    fn enqueue(&mut self, flat_id: i64, house_id: i64, recipient_mail: String) -> i64 {
        self.next_notify_id += 1;
        let id = self.next_notify_id;
        self.outbox.insert(
            id,
            Notify {
                id,
                flat_id,
                house_id,
                recipient_mail,
                status: NotifyStatus::Unsent,
            },
        );
        id
    }

    fn notify_subscribers(&mut self, key: FlatKey) {
        let recipients: Vec<String> = self
            .subscriptions
            .iter()
            .filter(|subscription| subscription.house_id == key.house_id)
            .map(|subscription| subscription.email.clone())
            .collect();
        for recipient in recipients {
            self.enqueue(key.flat_id, key.house_id, recipient);
        }
    }
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<MemoryState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, RepositoryError> {
        self.state
            .lock()
            .map_err(|_| RepositoryError::Unavailable("in-memory store poisoned".to_string()))
    }

    /// Queue an outbox row directly, returning its id.
    pub fn enqueue_notification(
        &self,
        flat_id: i64,
        house_id: i64,
        recipient_mail: impl Into<String>,
    ) -> Result<i64, RepositoryError> {
        let mut state = self.lock()?;
        Ok(state.enqueue(flat_id, house_id, recipient_mail.into()))
    }

    pub fn notification(&self, notify_id: i64) -> Result<Option<Notify>, RepositoryError> {
        Ok(self.lock()?.outbox.get(&notify_id).cloned())
    }

    pub fn notifications(&self) -> Result<Vec<Notify>, RepositoryError> {
        Ok(self.lock()?.outbox.values().cloned().collect())
    }

    pub fn house(&self, house_id: i64) -> Result<Option<House>, RepositoryError> {
        Ok(self.lock()?.houses.get(&house_id).cloned())
    }

    pub fn flat_count(&self) -> Result<usize, RepositoryError> {
        Ok(self.lock()?.flats.len())
    }
}

#[async_trait]
impl FlatRepository for InMemoryStore {
    async fn create(&self, flat: &Flat, touched_at: DateTime<Utc>) -> Result<Flat, RepositoryError> {
        let mut state = self.lock()?;
        let key = flat.key();
        if state.flats.contains_key(&key) {
            return Err(RepositoryError::Conflict(format!(
                "flat {} in house {}",
                key.flat_id, key.house_id
            )));
        }
        let house = state
            .houses
            .get_mut(&flat.house_id)
            .ok_or_else(|| RepositoryError::NotFound(format!("house {}", flat.house_id)))?;
        house.updated_at = touched_at;
        state.flats.insert(key, flat.clone());
        Ok(flat.clone())
    }

    async fn update_fields(
        &self,
        key: FlatKey,
        moderator: UserId,
        changes: &[FlatChange],
    ) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        let flat = state.flats.get_mut(&key).ok_or_else(|| {
            RepositoryError::NotFound(format!("flat {} in house {}", key.flat_id, key.house_id))
        })?;
        if changes.is_empty() {
            return Ok(());
        }

        let was_approved = flat.status == FlatStatus::Approved;
        for change in changes {
            change.apply(flat);
        }
        flat.moderator_id = Some(moderator);
        let now_approved = flat.status == FlatStatus::Approved;

        if now_approved && !was_approved {
            state.notify_subscribers(key);
        }
        Ok(())
    }

    async fn get(&self, key: FlatKey) -> Result<Flat, RepositoryError> {
        self.lock()?.flats.get(&key).cloned().ok_or_else(|| {
            RepositoryError::NotFound(format!("flat {} in house {}", key.flat_id, key.house_id))
        })
    }

    async fn list_by_house(
        &self,
        house_id: i64,
        filter: StatusFilter,
    ) -> Result<Vec<Flat>, RepositoryError> {
        Ok(self
            .lock()?
            .flats
            .values()
            .filter(|flat| flat.house_id == house_id && filter.matches(flat.status))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl HouseRepository for InMemoryStore {
    async fn create(&self, house: &House) -> Result<House, RepositoryError> {
        let mut state = self.lock()?;
        if state.houses.contains_key(&house.id) {
            return Err(RepositoryError::Conflict(format!("house {}", house.id)));
        }
        state.houses.insert(house.id, house.clone());
        Ok(house.clone())
    }

    async fn subscribe(&self, subscription: &Subscription) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        if !state.houses.contains_key(&subscription.house_id) {
            return Err(RepositoryError::NotFound(format!(
                "house {}",
                subscription.house_id
            )));
        }
        match state.subscriptions.iter_mut().find(|existing| {
            existing.house_id == subscription.house_id && existing.user_id == subscription.user_id
        }) {
            Some(existing) => existing.email = subscription.email.clone(),
            None => state.subscriptions.push(subscription.clone()),
        }
        Ok(())
    }
}

#[async_trait]
impl NotifyRepository for InMemoryStore {
    async fn unsent(&self) -> Result<Vec<Notify>, RepositoryError> {
        Ok(self
            .lock()?
            .outbox
            .values()
            .filter(|notify| notify.status == NotifyStatus::Unsent)
            .cloned()
            .collect())
    }

    async fn mark_sent(&self, notify_id: i64) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        let notify = state
            .outbox
            .get_mut(&notify_id)
            .ok_or_else(|| RepositoryError::NotFound(format!("notification {notify_id}")))?;
        notify.status = NotifyStatus::Sent;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn house(id: i64) -> House {
        let now = Utc::now();
        House {
            id,
            address: "Lenina 1".to_string(),
            construct_year: 1999,
            developer: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn flat(id: i64, house_id: i64) -> Flat {
        Flat {
            id,
            house_id,
            owner_id: UserId::new_random(),
            price: 1_000,
            rooms: 2,
            status: FlatStatus::Created,
            moderator_id: None,
        }
    }

    #[tokio::test]
    async fn create_requires_existing_house_and_touches_it() {
        let store = InMemoryStore::new();
        assert!(matches!(
            FlatRepository::create(&store, &flat(1, 1), Utc::now()).await,
            Err(RepositoryError::NotFound(_))
        ));

        let created = house(1);
        HouseRepository::create(&store, &created)
            .await
            .expect("house stored");
        let touched_at = created.updated_at + chrono::Duration::seconds(30);
        FlatRepository::create(&store, &flat(1, 1), touched_at)
            .await
            .expect("flat stored");

        let stored = store.house(1).expect("lock").expect("house present");
        assert_eq!(stored.updated_at, touched_at);
        assert!(matches!(
            FlatRepository::create(&store, &flat(1, 1), touched_at).await,
            Err(RepositoryError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn approval_queues_one_notification_per_subscriber() {
        let store = InMemoryStore::new();
        HouseRepository::create(&store, &house(3))
            .await
            .expect("house stored");
        for email in ["a@example.com", "b@example.com"] {
            store
                .subscribe(&Subscription {
                    house_id: 3,
                    user_id: UserId::new_random(),
                    email: email.to_string(),
                })
                .await
                .expect("subscribed");
        }
        FlatRepository::create(&store, &flat(9, 3), Utc::now())
            .await
            .expect("flat stored");

        let moderator = UserId::new_random();
        let key = FlatKey::new(9, 3);
        store
            .update_fields(key, moderator, &[FlatChange::Status(FlatStatus::OnModeration)])
            .await
            .expect("moderation");
        assert!(store.unsent().await.expect("outbox").is_empty());

        store
            .update_fields(key, moderator, &[FlatChange::Status(FlatStatus::Approved)])
            .await
            .expect("approval");
        store
            .update_fields(key, moderator, &[FlatChange::Price(2_000)])
            .await
            .expect("price edit");

        let queued = store.unsent().await.expect("outbox");
        assert_eq!(queued.len(), 2, "re-saving an approved flat does not re-notify");
        assert!(queued.iter().all(|notify| notify.flat_id == 9));
        let stored = store.get(key).await.expect("flat");
        assert_eq!(stored.moderator_id, Some(moderator));
    }
}
