//! Integration tests per la superficie REST delle chat
//!
//! Coprono il badge dei non letti, l'abbandono delle conversazioni e la
//! ricerca utenti, con database reale via `#[sqlx::test]` e token JWT veri.

mod common;

#[cfg(test)]
mod chat_api_tests {
    use crate::common::{create_test_jwt, create_test_server, create_test_state};
    use axum::http::StatusCode;
    use konnect_hub::repositories::Read;
    use konnect_hub::ws::dispatcher;
    use serde_json::Value;
    use sqlx::MySqlPool;

    // ============================================================
    // Badge dei non letti
    // ============================================================

    /// Bob ha due messaggi di alice non letti: il badge parte da 2 e torna a
    /// zero dopo il mark-read della conversazione
    #[sqlx::test(fixtures(path = "../fixtures", scripts("users", "conversations")))]
    async fn unread_count_reflects_read_receipts(pool: MySqlPool) -> sqlx::Result<()> {
        let state = create_test_state(pool);
        let server = create_test_server(state.clone());
        let token = create_test_jwt(2, "bob");

        let response = server
            .get("/conversations/unread-count")
            .authorization_bearer(&token)
            .await;
        response.assert_status(StatusCode::OK);
        assert_eq!(response.json::<i64>(), 2);

        let bob = state.user.read(&2).await?.expect("fixture user");
        dispatcher::mark_read(&state, &bob, 1)
            .await
            .expect("participant can mark read");

        let response = server
            .get("/conversations/unread-count")
            .authorization_bearer(&token)
            .await;
        response.assert_status(StatusCode::OK);
        assert_eq!(response.json::<i64>(), 0);
        Ok(())
    }

    /// I propri messaggi non contano mai come non letti
    #[sqlx::test(fixtures(path = "../fixtures", scripts("users", "conversations")))]
    async fn unread_count_ignores_own_messages(pool: MySqlPool) -> sqlx::Result<()> {
        let state = create_test_state(pool);
        let server = create_test_server(state);
        let token = create_test_jwt(1, "alice");

        let response = server
            .get("/conversations/unread-count")
            .authorization_bearer(&token)
            .await;

        response.assert_status(StatusCode::OK);
        assert_eq!(response.json::<i64>(), 0);
        Ok(())
    }

    // ============================================================
    // Abbandono della conversazione
    // ============================================================

    /// Il primo partecipante che se ne va lascia la conversazione in piedi;
    /// quando esce anche l'ultimo, conversazione e messaggi vengono eliminati
    #[sqlx::test(fixtures(path = "../fixtures", scripts("users", "conversations")))]
    async fn conversation_is_deleted_when_last_participant_leaves(
        pool: MySqlPool,
    ) -> sqlx::Result<()> {
        let state = create_test_state(pool.clone());
        let server = create_test_server(state);

        let response = server
            .delete("/conversations/1")
            .authorization_bearer(&create_test_jwt(1, "alice"))
            .await;
        response.assert_status(StatusCode::NO_CONTENT);

        let participants: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM conversation_participants WHERE conversation_id = 1",
        )
        .fetch_one(&pool)
        .await?;
        assert_eq!(participants, 1, "bob is still in the conversation");

        let response = server
            .delete("/conversations/1")
            .authorization_bearer(&create_test_jwt(2, "bob"))
            .await;
        response.assert_status(StatusCode::NO_CONTENT);

        let conversations: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM conversations WHERE conversation_id = 1")
                .fetch_one(&pool)
                .await?;
        assert_eq!(conversations, 0);

        let messages: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE conversation_id = 1")
                .fetch_one(&pool)
                .await?;
        assert_eq!(messages, 0);
        Ok(())
    }

    /// Chi non partecipa (o non partecipa più) viene fermato dal middleware
    /// di membership
    #[sqlx::test(fixtures(path = "../fixtures", scripts("users", "conversations")))]
    async fn leave_by_non_participant_is_forbidden(pool: MySqlPool) -> sqlx::Result<()> {
        let state = create_test_state(pool);
        let server = create_test_server(state);

        let response = server
            .delete("/conversations/1")
            .authorization_bearer(&create_test_jwt(3, "carol"))
            .await;
        response.assert_status(StatusCode::FORBIDDEN);

        let response = server
            .delete("/conversations/1")
            .authorization_bearer(&create_test_jwt(1, "alice"))
            .await;
        response.assert_status(StatusCode::NO_CONTENT);

        // alice è già uscita: un secondo tentativo viene rifiutato
        let response = server
            .delete("/conversations/1")
            .authorization_bearer(&create_test_jwt(1, "alice"))
            .await;
        response.assert_status(StatusCode::FORBIDDEN);
        Ok(())
    }

    // ============================================================
    // Ricerca utenti
    // ============================================================

    /// La ricerca matcha username e full_name, e non ritorna mai il chiamante
    #[sqlx::test(fixtures(path = "../fixtures", scripts("users")))]
    async fn search_matches_username_and_excludes_caller(pool: MySqlPool) -> sqlx::Result<()> {
        let state = create_test_state(pool);
        let server = create_test_server(state);
        let token = create_test_jwt(1, "alice");

        let response = server
            .get("/users/search")
            .add_query_param("search", "bo")
            .authorization_bearer(&token)
            .await;
        response.assert_status(StatusCode::OK);

        let users = response.json::<Vec<Value>>();
        let usernames: Vec<&str> = users
            .iter()
            .filter_map(|user| user["username"].as_str())
            .collect();
        assert_eq!(usernames, vec!["bob"]);

        // "Bianchi" matcha solo sul full_name
        let response = server
            .get("/users/search")
            .add_query_param("search", "bianchi")
            .authorization_bearer(&token)
            .await;
        response.assert_status(StatusCode::OK);
        assert_eq!(response.json::<Vec<Value>>().len(), 1);

        // il chiamante non compare mai tra i risultati
        let response = server
            .get("/users/search")
            .add_query_param("search", "alice")
            .authorization_bearer(&token)
            .await;
        response.assert_status(StatusCode::OK);
        assert!(response.json::<Vec<Value>>().is_empty());
        Ok(())
    }

    /// Query vuota o di soli spazi: lista vuota, nessuna query al database
    #[sqlx::test(fixtures(path = "../fixtures", scripts("users")))]
    async fn search_with_blank_query_returns_empty_list(pool: MySqlPool) -> sqlx::Result<()> {
        let state = create_test_state(pool);
        let server = create_test_server(state);
        let token = create_test_jwt(1, "alice");

        let response = server
            .get("/users/search")
            .add_query_param("search", "   ")
            .authorization_bearer(&token)
            .await;

        response.assert_status(StatusCode::OK);
        assert!(response.json::<Vec<Value>>().is_empty());
        Ok(())
    }
}
