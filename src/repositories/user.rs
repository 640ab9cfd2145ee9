//! UserRepository - Repository per la gestione degli utenti

use super::{Create, Read};
use crate::dtos::CreateUserDTO;
use crate::entities::User;
use sqlx::{Error, MySqlPool};

// USER REPO
pub struct UserRepository {
    connection_pool: MySqlPool,
}

impl UserRepository {
    pub fn new(connection_pool: MySqlPool) -> Self {
        Self { connection_pool }
    }

    /// Find a user by exact username
    pub async fn find_by_username(&self, username: &str) -> Result<Option<User>, Error> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT user_id, username, password, full_name, profile_image_url
            FROM users
            WHERE username = ?
            "#,
        )
        .bind(username)
        .fetch_optional(&self.connection_pool)
        .await?;

        Ok(user)
    }

    /// Ricerca parziale su username o nome completo, escludendo il chiamante.
    /// Al massimo 20 risultati.
    pub async fn search_by_username_partial(
        &self,
        search: &str,
        exclude_user_id: &i32,
    ) -> Result<Vec<User>, Error> {
        let pattern = format!("%{}%", search);
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT user_id, username, password, full_name, profile_image_url
            FROM users
            WHERE user_id <> ?
              AND (username LIKE ? OR full_name LIKE ?)
            LIMIT 20
            "#,
        )
        .bind(exclude_user_id)
        .bind(&pattern)
        .bind(&pattern)
        .fetch_all(&self.connection_pool)
        .await?;

        Ok(users)
    }

    /// Check whether a user id exists
    pub async fn exists(&self, user_id: &i32) -> Result<bool, Error> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM users WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_one(&self.connection_pool)
        .await?;

        Ok(count > 0)
    }
}

impl Create<User, CreateUserDTO> for UserRepository {
    /// La password nel DTO deve essere GIA' hashata dal service chiamante
    async fn create(&self, data: &CreateUserDTO) -> Result<User, Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (username, password, full_name)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(&data.username)
        .bind(&data.password)
        .bind(&data.full_name)
        .execute(&self.connection_pool)
        .await?;

        let new_id = result.last_insert_id() as i32;

        Ok(User {
            user_id: new_id,
            username: data.username.clone(),
            password: data.password.clone(),
            full_name: data.full_name.clone(),
            profile_image_url: None,
        })
    }
}

impl Read<User, i32> for UserRepository {
    async fn read(&self, id: &i32) -> Result<Option<User>, Error> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT user_id, username, password, full_name, profile_image_url
            FROM users
            WHERE user_id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.connection_pool)
        .await?;

        Ok(user)
    }
}
