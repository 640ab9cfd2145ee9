//! Integration tests per il fan-out real-time
//!
//! Scenari coperti:
//! - Messaggio consegnato a tutte le connessioni del gruppo + notifica personale
//! - Notifica verso un destinatario offline (no-op, nessun errore)
//! - Multi-dispositivo: un solo broadcast offline alla chiusura dell'ultima connessione
//! - Esclusione dell'eco per il lettore su MessagesRead
//!
//! Questi test girano interamente in memoria contro PresenceRegistry e
//! GroupRegistry: il database non viene mai toccato.

#[cfg(test)]
mod fanout_tests {
    use konnect_hub::dtos::{MessageDTO, OnlineStatusDTO, ServerEvent};
    use konnect_hub::entities::MessageType;
    use konnect_hub::ws::{GroupRegistry, PresenceRegistry};
    use std::sync::Arc;
    use tokio::sync::mpsc;

    fn message_event(conversation_id: i32, sender_id: i32, content: &str) -> MessageDTO {
        MessageDTO {
            message_id: Some(1),
            conversation_id: Some(conversation_id),
            sender_id: Some(sender_id),
            sender_username: Some(format!("user{}", sender_id)),
            sender_full_name: Some(format!("User {}", sender_id)),
            sender_avatar: None,
            content: Some(content.to_string()),
            message_type: Some(MessageType::Text),
            file_url: None,
            sent_at: Some(chrono::Utc::now()),
            is_edited: Some(false),
            is_deleted: Some(false),
        }
    }

    // ============================================================
    // Scenario A: invio con entrambi gli utenti connessi
    // ============================================================

    /// user 1 e user 2 connessi, entrambi nel gruppo della conversazione:
    /// entrambi ricevono un ReceiveMessage con il contenuto originale, e il
    /// canale personale di user 2 riceve una NewMessageNotification
    #[tokio::test]
    async fn send_reaches_group_and_receiver_personal_channel() {
        let presence = PresenceRegistry::new();
        let groups = GroupRegistry::new();
        let conversation_id = 10;

        let (tx1, mut rx1) = mpsc::channel(16);
        let (tx2, mut rx2) = mpsc::channel(16);
        let c1 = presence.next_handle();
        let c2 = presence.next_handle();
        presence.register(1, c1, tx1);
        presence.register(2, c2, tx2);
        groups.join(&conversation_id, c1);
        groups.join(&conversation_id, c2);

        // fan-out del dispatcher dopo la persistenza: gruppo + canale personale
        let dto = message_event(conversation_id, 1, "hi");
        let receive = Arc::new(ServerEvent::ReceiveMessage(dto.clone()));
        assert_eq!(groups.broadcast(&presence, &conversation_id, receive), 2);

        let notification = Arc::new(ServerEvent::NewMessageNotification(dto));
        assert_eq!(presence.send_to_user(&2, notification), 1);

        // connessione di user 1: solo il ReceiveMessage
        match rx1.try_recv().unwrap().as_ref() {
            ServerEvent::ReceiveMessage(msg) => {
                assert_eq!(msg.content.as_deref(), Some("hi"));
                assert_eq!(msg.sender_id, Some(1));
            }
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(rx1.try_recv().is_err());

        // connessione di user 2: ReceiveMessage seguito dalla notifica
        match rx2.try_recv().unwrap().as_ref() {
            ServerEvent::ReceiveMessage(msg) => assert_eq!(msg.content.as_deref(), Some("hi")),
            other => panic!("unexpected event: {:?}", other),
        }
        match rx2.try_recv().unwrap().as_ref() {
            ServerEvent::NewMessageNotification(msg) => {
                assert_eq!(msg.sender_id, Some(1));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    // ============================================================
    // Scenario B: destinatario offline
    // ============================================================

    /// user 3 invia a user 4 che è offline: la notifica personale non
    /// raggiunge nessun handle, senza errori, e il broadcast di gruppo
    /// consegna solo al mittente
    #[tokio::test]
    async fn notification_to_offline_receiver_is_a_noop() {
        let presence = PresenceRegistry::new();
        let groups = GroupRegistry::new();
        let conversation_id = 20;

        let (tx3, mut rx3) = mpsc::channel(16);
        let c3 = presence.next_handle();
        presence.register(3, c3, tx3);
        groups.join(&conversation_id, c3);

        let dto = message_event(conversation_id, 3, "anyone there?");
        let receive = Arc::new(ServerEvent::ReceiveMessage(dto.clone()));
        assert_eq!(groups.broadcast(&presence, &conversation_id, receive), 1);

        let notification = Arc::new(ServerEvent::NewMessageNotification(dto));
        assert_eq!(presence.send_to_user(&4, notification), 0);

        assert!(rx3.try_recv().is_ok());
        assert!(!presence.is_online(&4));
    }

    // ============================================================
    // Scenario C: due dispositivi, un solo UserOffline
    // ============================================================

    /// user 5 con due connessioni simultanee: chiuderne una lo lascia online,
    /// chiudere la seconda produce esattamente un broadcast UserOffline
    #[tokio::test]
    async fn second_device_disconnect_triggers_single_offline_broadcast() {
        let presence = PresenceRegistry::new();
        let groups = GroupRegistry::new();

        let (tx_a, _rx_a) = mpsc::channel(16);
        let (tx_b, _rx_b) = mpsc::channel(16);
        let device_a = presence.next_handle();
        let device_b = presence.next_handle();
        presence.register(5, device_a, tx_a);
        presence.register(5, device_b, tx_b);

        // osservatore che riceve i broadcast di presenza
        let (tx_obs, mut rx_obs) = mpsc::channel(16);
        let observer = presence.next_handle();
        presence.register(6, observer, tx_obs);

        let mut offline_broadcasts = 0;

        // teardown del primo dispositivo
        groups.leave(device_a);
        if let Some(user_id) = presence.unregister(device_a) {
            offline_broadcasts += 1;
            presence.broadcast_all(Arc::new(ServerEvent::UserOffline(OnlineStatusDTO {
                user_id,
                is_online: false,
            })));
        }
        assert!(presence.is_online(&5), "one device still connected");

        // teardown del secondo dispositivo
        groups.leave(device_b);
        if let Some(user_id) = presence.unregister(device_b) {
            offline_broadcasts += 1;
            presence.broadcast_all(Arc::new(ServerEvent::UserOffline(OnlineStatusDTO {
                user_id,
                is_online: false,
            })));
        }

        assert!(!presence.is_online(&5));
        assert_eq!(offline_broadcasts, 1, "exactly one UserOffline broadcast");

        match rx_obs.try_recv().unwrap().as_ref() {
            ServerEvent::UserOffline(status) => {
                assert_eq!(status.user_id, 5);
                assert!(!status.is_online);
            }
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(rx_obs.try_recv().is_err(), "no duplicate offline event");
    }

    // ============================================================
    // MessagesRead: il lettore non riceve l'eco
    // ============================================================

    #[tokio::test]
    async fn messages_read_excludes_reader_connections() {
        let presence = PresenceRegistry::new();
        let groups = GroupRegistry::new();
        let conversation_id = 30;

        let (tx_reader, mut rx_reader) = mpsc::channel(16);
        let (tx_sender, mut rx_sender) = mpsc::channel(16);
        let reader_conn = presence.next_handle();
        let sender_conn = presence.next_handle();
        presence.register(7, reader_conn, tx_reader);
        presence.register(8, sender_conn, tx_sender);
        groups.join(&conversation_id, reader_conn);
        groups.join(&conversation_id, sender_conn);

        let event = Arc::new(ServerEvent::MessagesRead {
            conversation_id,
            user_id: 7,
            message_ids: vec![100, 101],
        });
        assert_eq!(
            groups.broadcast_except_user(&presence, &conversation_id, &7, event),
            1
        );

        assert!(rx_reader.try_recv().is_err(), "reader must not get the echo");
        match rx_sender.try_recv().unwrap().as_ref() {
            ServerEvent::MessagesRead { message_ids, .. } => {
                assert_eq!(message_ids, &vec![100, 101]);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    // ============================================================
    // Disconnessione: la membership dei gruppi segue la presenza
    // ============================================================

    #[tokio::test]
    async fn disconnect_removes_connection_from_every_group() {
        let presence = PresenceRegistry::new();
        let groups = GroupRegistry::new();

        let (tx, _rx) = mpsc::channel(16);
        let conn = presence.next_handle();
        presence.register(9, conn, tx);
        groups.join(&1, conn);
        groups.join(&2, conn);
        groups.join(&3, conn);

        groups.leave(conn);
        presence.unregister(conn);

        for conversation_id in [1, 2, 3] {
            assert!(groups.members(&conversation_id).is_empty());
        }
    }
}

#[cfg(test)]
mod resolver_tests {
    use konnect_hub::ws::resolver::PairLocks;
    use std::sync::Arc;
    use std::time::Duration;

    /// Il lock per la coppia è lo stesso indipendentemente dall'ordine degli
    /// utenti: due "primi messaggi" simultanei A->B e B->A si serializzano
    /// sulla stessa sezione critica
    #[tokio::test]
    async fn pair_lock_is_order_independent() {
        let locks = Arc::new(PairLocks::new());

        let guard = locks.lock(1, 2).await;

        let locks_clone = locks.clone();
        let reversed = tokio::spawn(async move {
            let _guard = locks_clone.lock(2, 1).await;
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(
            !reversed.is_finished(),
            "B->A must wait on the same lock as A->B"
        );

        drop(guard);
        reversed.await.unwrap();
    }

    #[tokio::test]
    async fn pair_lock_does_not_block_other_pairs() {
        let locks = Arc::new(PairLocks::new());

        let _guard = locks.lock(4, 5).await;

        let locks_clone = locks.clone();
        let other_pair = tokio::spawn(async move {
            let _guard = locks_clone.lock(4, 6).await;
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(other_pair.is_finished(), "(4,6) must not wait on (4,5)");
    }
}
