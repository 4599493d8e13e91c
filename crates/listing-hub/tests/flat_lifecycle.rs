//! End-to-end listing scenarios through the public service facade, backed by
//! the in-memory store.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use listing_hub::domain::{
    Caller, CreateFlatRequest, CreateHouseRequest, FlatStatus, NotifyStatus, UpdateFlatRequest,
    UserId,
};
use listing_hub::listings::{FlatService, HouseService, ListingError, ValidationError};
use listing_hub::notifications::{DeliveryError, NotificationDispatcher, NotificationSender};
use listing_hub::storage::InMemoryStore;

const TIMEOUT: Duration = Duration::from_secs(2);

struct Fixture {
    store: Arc<InMemoryStore>,
    flats: FlatService,
    houses: HouseService,
    client: Caller,
    moderator: Caller,
}

async fn fixture() -> Fixture {
    let store = Arc::new(InMemoryStore::new());
    let fixture = Fixture {
        flats: FlatService::new(store.clone(), TIMEOUT),
        houses: HouseService::new(store.clone(), store.clone(), TIMEOUT, 3),
        store,
        client: Caller::client(UserId::new_random()),
        moderator: Caller::moderator(UserId::new_random()),
    };
    fixture
        .houses
        .create_house(
            &fixture.moderator,
            CreateHouseRequest {
                id: 1,
                address: "Lenina 1".to_string(),
                year: 2001,
                developer: None,
            },
        )
        .await
        .expect("house created");
    fixture
}

#[derive(Default)]
struct Mailbox {
    delivered: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl NotificationSender for Mailbox {
    async fn send_email(&self, recipient: &str, message: &str) -> Result<(), DeliveryError> {
        self.delivered
            .lock()
            .expect("mailbox poisoned")
            .push((recipient.to_string(), message.to_string()));
        Ok(())
    }
}

#[tokio::test]
async fn created_flat_moves_to_moderation() {
    let fx = fixture().await;

    let created = fx
        .flats
        .create(
            &fx.client,
            CreateFlatRequest {
                flat_id: 1,
                house_id: 1,
                price: 1000,
                rooms: 2,
            },
        )
        .await
        .expect("flat created");
    assert_eq!(created.status, FlatStatus::Created);
    assert_eq!((created.price, created.rooms), (1000, 2));

    let updated = fx
        .flats
        .update(
            &fx.moderator,
            UpdateFlatRequest {
                id: 1,
                house_id: 1,
                status: Some("on_moderation".to_string()),
                ..UpdateFlatRequest::default()
            },
        )
        .await
        .expect("flat updated");
    assert_eq!(updated.status, FlatStatus::OnModeration);
    assert_eq!((updated.price, updated.rooms), (1000, 2));

    let listed = fx
        .houses
        .flats_by_house(1, "on_moderation")
        .await
        .expect("listing");
    assert_eq!(listed.flats, vec![updated]);
}

#[tokio::test]
async fn approval_notifies_subscribers_once() {
    let fx = fixture().await;
    fx.houses
        .subscribe(&fx.client, 1, "tenant@example.com".to_string())
        .await
        .expect("subscribed");
    fx.flats
        .create(
            &fx.client,
            CreateFlatRequest {
                flat_id: 12,
                house_id: 1,
                price: 4_500,
                rooms: 3,
            },
        )
        .await
        .expect("flat created");

    for status in ["on_moderation", "approved"] {
        fx.flats
            .update(
                &fx.moderator,
                UpdateFlatRequest {
                    id: 12,
                    house_id: 1,
                    status: Some(status.to_string()),
                    ..UpdateFlatRequest::default()
                },
            )
            .await
            .expect("status updated");
    }

    let mailbox = Arc::new(Mailbox::default());
    let dispatcher = NotificationDispatcher::new(fx.store.clone(), mailbox.clone());

    let report = dispatcher.poll_once(TIMEOUT).await;
    assert_eq!((report.fetched, report.delivered), (1, 1));
    let again = dispatcher.poll_once(TIMEOUT).await;
    assert_eq!(again.fetched, 0);

    assert_eq!(
        mailbox.delivered.lock().expect("mailbox poisoned").clone(),
        vec![(
            "tenant@example.com".to_string(),
            "New flat with number 12 in house 1!".to_string()
        )]
    );
    assert!(fx
        .store
        .notifications()
        .expect("outbox")
        .iter()
        .all(|row| row.status == NotifyStatus::Sent));
}

#[tokio::test]
async fn rejected_requests_leave_no_trace() {
    let fx = fixture().await;

    let err = fx
        .flats
        .create(
            &fx.client,
            CreateFlatRequest {
                flat_id: 1,
                house_id: 1,
                price: -1,
                rooms: 2,
            },
        )
        .await
        .expect_err("negative price rejected");
    assert!(matches!(
        err,
        ListingError::InvalidArgument(ValidationError::Price(-1))
    ));
    assert_eq!(fx.store.flat_count().expect("count"), 0);

    let listed = fx.houses.flats_by_house(1, "any").await.expect("listing");
    assert!(listed.flats.is_empty());
}

#[tokio::test]
async fn large_listing_is_ordered_by_flat_id() {
    let fx = fixture().await;
    for flat_id in (1..=20).rev() {
        fx.flats
            .create(
                &fx.client,
                CreateFlatRequest {
                    flat_id,
                    house_id: 1,
                    price: flat_id * 10,
                    rooms: 1,
                },
            )
            .await
            .expect("flat created");
    }

    let listed = fx.houses.flats_by_house(1, "created").await.expect("listing");
    let ids: Vec<i64> = listed.flats.iter().map(|flat| flat.id).collect();
    assert_eq!(ids, (1..=20).collect::<Vec<_>>());
}
