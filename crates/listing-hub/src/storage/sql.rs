//! Repository implementations that translate listing operations into SQL statements.
//!
//! Every statement goes through the injected [`Database`], which in production is a
//! [`RetryAdapter`](super::RetryAdapter) around [`PgDatabase`](super::PgDatabase).
//! Table layout is documented in `schema.sql` at the crate root.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::executor::{Database, Row, Statement};
use super::repository::{FlatRepository, HouseRepository, NotifyRepository, RepositoryError};
use crate::domain::{
    Flat, FlatChange, FlatKey, FlatStatus, House, Notify, NotifyStatus, StatusFilter,
    Subscription, UserId,
};

const INSERT_FLAT: &str = "insert into flats (flat_id, house_id, owner_id, price, rooms, status) \
     values ($1, $2, $3, $4, $5, $6)";
const TOUCH_HOUSE: &str = "update houses set updated_at = $1 where house_id = $2";
const SELECT_FLAT: &str = "select flat_id, house_id, owner_id, price, rooms, status, moderator_id \
     from flats where flat_id = $1 and house_id = $2";
const SELECT_FLATS_BY_HOUSE: &str = "select flat_id, house_id, owner_id, price, rooms, status, moderator_id \
     from flats where house_id = $1 order by flat_id";
const SELECT_FLATS_BY_HOUSE_AND_STATUS: &str = "select flat_id, house_id, owner_id, price, rooms, status, moderator_id \
     from flats where house_id = $1 and status = $2 order by flat_id";
const UPDATE_PRICE: &str =
    "update flats set price = $1, moderator_id = $2 where flat_id = $3 and house_id = $4";
const UPDATE_ROOMS: &str =
    "update flats set rooms = $1, moderator_id = $2 where flat_id = $3 and house_id = $4";
const UPDATE_STATUS: &str =
    "update flats set status = $1, moderator_id = $2 where flat_id = $3 and house_id = $4";

const INSERT_HOUSE: &str = "insert into houses (house_id, address, construct_year, developer, created_at, updated_at) \
     values ($1, $2, $3, $4, $5, $6) \
     returning house_id, address, construct_year, developer, created_at, updated_at";
const UPSERT_SUBSCRIPTION: &str = "insert into subscriptions (house_id, user_id, email) values ($1, $2, $3) \
     on conflict (house_id, user_id) do update set email = excluded.email";

const SELECT_UNSENT: &str = "select notify_id, flat_id, house_id, recipient_mail, status \
     from new_flats_outbox where status = $1 order by notify_id";
const MARK_SENT: &str = "update new_flats_outbox set status = $1 where notify_id = $2";

fn flat_from_row(row: &Row) -> Result<Flat, RepositoryError> {
    let status: FlatStatus = row
        .text("status")?
        .parse()
        .map_err(|err| RepositoryError::Decode(format!("{err}")))?;

    Ok(Flat {
        id: row.int("flat_id")?,
        house_id: row.int("house_id")?,
        owner_id: UserId(row.uuid("owner_id")?),
        price: row.int("price")?,
        rooms: narrow(row.int("rooms")?, "rooms")?,
        status,
        moderator_id: row.opt_uuid("moderator_id")?.map(UserId),
    })
}

fn house_from_row(row: &Row) -> Result<House, RepositoryError> {
    Ok(House {
        id: row.int("house_id")?,
        address: row.text("address")?,
        construct_year: narrow(row.int("construct_year")?, "construct_year")?,
        developer: row.opt_text("developer")?,
        created_at: row.timestamp("created_at")?,
        updated_at: row.timestamp("updated_at")?,
    })
}

fn notify_from_row(row: &Row) -> Result<Notify, RepositoryError> {
    let status = match row.text("status")?.as_str() {
        "unsent" => NotifyStatus::Unsent,
        "sent" => NotifyStatus::Sent,
        other => {
            return Err(RepositoryError::Decode(format!(
                "unknown notify status '{other}'"
            )))
        }
    };

    Ok(Notify {
        id: row.int("notify_id")?,
        flat_id: row.int("flat_id")?,
        house_id: row.int("house_id")?,
        recipient_mail: row.text("recipient_mail")?,
        status,
    })
}

fn narrow(value: i64, column: &str) -> Result<i32, RepositoryError> {
    i32::try_from(value)
        .map_err(|_| RepositoryError::Decode(format!("column '{column}' out of range: {value}")))
}

fn change_statement(key: FlatKey, moderator: UserId, change: &FlatChange) -> Statement {
    let statement = match *change {
        FlatChange::Price(price) => Statement::new(UPDATE_PRICE).bind(price),
        FlatChange::Rooms(rooms) => Statement::new(UPDATE_ROOMS).bind(rooms),
        FlatChange::Status(status) => Statement::new(UPDATE_STATUS).bind(status.label()),
    };
    statement
        .bind(moderator.0)
        .bind(key.flat_id)
        .bind(key.house_id)
}

#[derive(Debug)]
pub struct SqlFlatRepository<D> {
    db: Arc<D>,
}

impl<D> SqlFlatRepository<D> {
    pub fn new(db: Arc<D>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl<D: Database + 'static> FlatRepository for SqlFlatRepository<D> {
    async fn create(&self, flat: &Flat, touched_at: DateTime<Utc>) -> Result<Flat, RepositoryError> {
        let statements = [
            Statement::new(INSERT_FLAT)
                .bind(flat.id)
                .bind(flat.house_id)
                .bind(flat.owner_id.0)
                .bind(flat.price)
                .bind(flat.rooms)
                .bind(flat.status.label()),
            Statement::new(TOUCH_HOUSE)
                .bind(touched_at)
                .bind(flat.house_id),
        ];
        self.db.execute_atomic(&statements).await?;
        self.get(flat.key()).await
    }

    async fn update_fields(
        &self,
        key: FlatKey,
        moderator: UserId,
        changes: &[FlatChange],
    ) -> Result<(), RepositoryError> {
        // Surfaces a missing flat as NotFound instead of a silent zero-row update.
        self.get(key).await?;
        if changes.is_empty() {
            return Ok(());
        }

        let statements: Vec<Statement> = changes
            .iter()
            .map(|change| change_statement(key, moderator, change))
            .collect();
        self.db.execute_atomic(&statements).await?;
        Ok(())
    }

    async fn get(&self, key: FlatKey) -> Result<Flat, RepositoryError> {
        let statement = Statement::new(SELECT_FLAT)
            .bind(key.flat_id)
            .bind(key.house_id);
        match self.db.fetch_one(&statement).await {
            Ok(row) => flat_from_row(&row),
            Err(RepositoryError::NotFound(_)) => Err(RepositoryError::NotFound(format!(
                "flat {} in house {}",
                key.flat_id, key.house_id
            ))),
            Err(err) => Err(err),
        }
    }

    async fn list_by_house(
        &self,
        house_id: i64,
        filter: StatusFilter,
    ) -> Result<Vec<Flat>, RepositoryError> {
        let statement = match filter {
            StatusFilter::Any => Statement::new(SELECT_FLATS_BY_HOUSE).bind(house_id),
            StatusFilter::Only(status) => Statement::new(SELECT_FLATS_BY_HOUSE_AND_STATUS)
                .bind(house_id)
                .bind(status.label()),
        };
        let rows = self.db.fetch_all(&statement).await?;
        rows.iter().map(flat_from_row).collect()
    }
}

#[derive(Debug)]
pub struct SqlHouseRepository<D> {
    db: Arc<D>,
}

impl<D> SqlHouseRepository<D> {
    pub fn new(db: Arc<D>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl<D: Database + 'static> HouseRepository for SqlHouseRepository<D> {
    async fn create(&self, house: &House) -> Result<House, RepositoryError> {
        let statement = Statement::new(INSERT_HOUSE)
            .bind(house.id)
            .bind(house.address.as_str())
            .bind(house.construct_year)
            .bind(house.developer.clone())
            .bind(house.created_at)
            .bind(house.updated_at);
        let row = self.db.fetch_one(&statement).await?;
        house_from_row(&row)
    }

    async fn subscribe(&self, subscription: &Subscription) -> Result<(), RepositoryError> {
        let statement = Statement::new(UPSERT_SUBSCRIPTION)
            .bind(subscription.house_id)
            .bind(subscription.user_id.0)
            .bind(subscription.email.as_str());
        self.db.execute(&statement).await?;
        Ok(())
    }
}

#[derive(Debug)]
pub struct SqlNotifyRepository<D> {
    db: Arc<D>,
}

impl<D> SqlNotifyRepository<D> {
    pub fn new(db: Arc<D>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl<D: Database + 'static> NotifyRepository for SqlNotifyRepository<D> {
    async fn unsent(&self) -> Result<Vec<Notify>, RepositoryError> {
        let statement = Statement::new(SELECT_UNSENT).bind(NotifyStatus::Unsent.label());
        let rows = self.db.fetch_all(&statement).await?;
        rows.iter().map(notify_from_row).collect()
    }

    async fn mark_sent(&self, notify_id: i64) -> Result<(), RepositoryError> {
        let statement = Statement::new(MARK_SENT)
            .bind(NotifyStatus::Sent.label())
            .bind(notify_id);
        match self.db.execute(&statement).await? {
            0 => Err(RepositoryError::NotFound(format!("notification {notify_id}"))),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqlValue;
    use std::sync::Mutex;
    use uuid::Uuid;

    /// Records statements and answers reads from canned rows.
    #[derive(Default)]
    struct RecordingDatabase {
        executed: Mutex<Vec<Statement>>,
        rows: Mutex<Vec<Row>>,
    }

    impl RecordingDatabase {
        fn with_rows(rows: Vec<Row>) -> Self {
            Self {
                executed: Mutex::new(Vec::new()),
                rows: Mutex::new(rows),
            }
        }

        fn executed(&self) -> Vec<Statement> {
            self.executed.lock().expect("statement log poisoned").clone()
        }
    }

    #[async_trait]
    impl Database for RecordingDatabase {
        async fn execute(&self, statement: &Statement) -> Result<u64, RepositoryError> {
            self.executed
                .lock()
                .expect("statement log poisoned")
                .push(statement.clone());
            Ok(1)
        }

        async fn fetch_one(&self, statement: &Statement) -> Result<Row, RepositoryError> {
            self.executed
                .lock()
                .expect("statement log poisoned")
                .push(statement.clone());
            self.rows
                .lock()
                .expect("row fixture poisoned")
                .first()
                .cloned()
                .ok_or_else(|| RepositoryError::NotFound("no rows".to_string()))
        }

        async fn fetch_all(&self, statement: &Statement) -> Result<Vec<Row>, RepositoryError> {
            self.executed
                .lock()
                .expect("statement log poisoned")
                .push(statement.clone());
            Ok(self.rows.lock().expect("row fixture poisoned").clone())
        }

        async fn execute_atomic(
            &self,
            statements: &[Statement],
        ) -> Result<Vec<u64>, RepositoryError> {
            self.executed
                .lock()
                .expect("statement log poisoned")
                .extend(statements.iter().cloned());
            Ok(vec![1; statements.len()])
        }
    }

    fn flat_row(owner: Uuid) -> Row {
        Row::new()
            .with("flat_id", 7_i64)
            .with("house_id", 2_i64)
            .with("owner_id", owner)
            .with("price", 5_000_i64)
            .with("rooms", 3_i64)
            .with("status", "on_moderation")
            .with("moderator_id", Option::<Uuid>::None)
    }

    #[tokio::test]
    async fn update_issues_one_statement_per_present_field() {
        let owner = Uuid::new_v4();
        let moderator = UserId(Uuid::new_v4());
        let db = Arc::new(RecordingDatabase::with_rows(vec![flat_row(owner)]));
        let repo = SqlFlatRepository::new(db.clone());

        repo.update_fields(
            FlatKey::new(7, 2),
            moderator,
            &[
                FlatChange::Price(6_000),
                FlatChange::Status(FlatStatus::Approved),
            ],
        )
        .await
        .expect("update applies");

        let executed = db.executed();
        assert_eq!(executed.len(), 3, "lookup plus two field writes");
        assert_eq!(executed[1].sql, UPDATE_PRICE);
        assert_eq!(executed[2].sql, UPDATE_STATUS);
        assert_eq!(executed[2].args[0], SqlValue::Text("approved".to_string()));
        assert_eq!(executed[2].args[1], SqlValue::Uuid(moderator.0));
    }

    #[tokio::test]
    async fn list_by_status_binds_the_status_label() {
        let db = Arc::new(RecordingDatabase::with_rows(vec![flat_row(Uuid::new_v4())]));
        let repo = SqlFlatRepository::new(db.clone());

        let flats = repo
            .list_by_house(2, StatusFilter::Only(FlatStatus::OnModeration))
            .await
            .expect("list succeeds");

        assert_eq!(flats.len(), 1);
        assert_eq!(flats[0].status, FlatStatus::OnModeration);
        assert_eq!(flats[0].rooms, 3);
        let executed = db.executed();
        assert_eq!(executed[0].sql, SELECT_FLATS_BY_HOUSE_AND_STATUS);
        assert_eq!(
            executed[0].args,
            vec![SqlValue::Int(2), SqlValue::Text("on_moderation".to_string())]
        );
    }

    #[tokio::test]
    async fn create_touches_house_in_the_same_unit() {
        let owner = Uuid::new_v4();
        let db = Arc::new(RecordingDatabase::with_rows(vec![flat_row(owner)]));
        let repo = SqlFlatRepository::new(db.clone());
        let flat = Flat {
            id: 7,
            house_id: 2,
            owner_id: UserId(owner),
            price: 5_000,
            rooms: 3,
            status: FlatStatus::Created,
            moderator_id: None,
        };

        repo.create(&flat, Utc::now()).await.expect("create succeeds");

        let executed = db.executed();
        assert_eq!(executed[0].sql, INSERT_FLAT);
        assert_eq!(executed[1].sql, TOUCH_HOUSE);
        assert_eq!(executed[1].args[1], SqlValue::Int(2));
    }

    #[tokio::test]
    async fn mark_sent_reports_missing_rows() {
        struct ZeroRows;

        #[async_trait]
        impl Database for ZeroRows {
            async fn execute(&self, _statement: &Statement) -> Result<u64, RepositoryError> {
                Ok(0)
            }
            async fn fetch_one(&self, _statement: &Statement) -> Result<Row, RepositoryError> {
                Err(RepositoryError::NotFound("no rows".to_string()))
            }
            async fn fetch_all(&self, _statement: &Statement) -> Result<Vec<Row>, RepositoryError> {
                Ok(Vec::new())
            }
            async fn execute_atomic(
                &self,
                _statements: &[Statement],
            ) -> Result<Vec<u64>, RepositoryError> {
                Ok(Vec::new())
            }
        }

        let repo = SqlNotifyRepository::new(Arc::new(ZeroRows));
        assert!(matches!(
            repo.mark_sent(42).await,
            Err(RepositoryError::NotFound(_))
        ));
    }
}
