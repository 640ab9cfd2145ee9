//! ReadReceiptRepository - Repository per le ricevute di lettura

use chrono::{DateTime, Utc};
use sqlx::{Error, MySqlPool};

// READ RECEIPT REPO
pub struct ReadReceiptRepository {
    connection_pool: MySqlPool,
}

impl ReadReceiptRepository {
    pub fn new(connection_pool: MySqlPool) -> Self {
        Self { connection_pool }
    }

    /// Insert one receipt per message id, all in a single transaction.
    ///
    /// INSERT IGNORE + unique key (message_id, user_id): se due mark_read
    /// concorrenti arrivano per lo stesso lettore, il secondo non crea
    /// duplicati e non fallisce.
    pub async fn create_many_ignore(
        &self,
        message_ids: &[i32],
        user_id: &i32,
        read_at: &DateTime<Utc>,
    ) -> Result<(), Error> {
        if message_ids.is_empty() {
            return Ok(());
        }

        let mut tx = self.connection_pool.begin().await?;

        for message_id in message_ids {
            sqlx::query(
                r#"
                INSERT IGNORE INTO read_receipts (message_id, user_id, read_at)
                VALUES (?, ?, ?)
                "#,
            )
            .bind(message_id)
            .bind(user_id)
            .bind(read_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(())
    }
}
