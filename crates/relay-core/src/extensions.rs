//! Convenience operations layered over [`Connection`].
//!
//! - [`ConnectionExt::notify_and_disconnect`]: tell the peer why, then hang up
//! - [`ConnectionExt::subscribe_once`]: one-shot, type- and predicate-filtered
//!   observer on inbound messages
//! - [`broadcast_send`]: send one message to a sequence of connections
//!
//! Transport errors pass through untouched. Nothing here retries.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::connection::{Connection, MessageEvent};
use crate::errors::TransportError;
use crate::events::Subscription;
use crate::messages::{ConnectionResult, DisconnectMessage, Message};

/// Extension methods available on every [`Connection`].
pub trait ConnectionExt: Connection {
    /// Send a [`DisconnectMessage`] carrying `reason`, then request a
    /// disconnect with the same reason.
    ///
    /// The disconnect is only requested if the send succeeds. A failed send
    /// is returned as-is and the connection is left as the transport left it.
    fn notify_and_disconnect(&self, reason: ConnectionResult) -> Result<(), TransportError> {
        send_disconnect(self, DisconnectMessage::new(reason))
    }

    /// Like [`notify_and_disconnect`](Self::notify_and_disconnect), with a
    /// free-text explanation attached to the notice.
    fn notify_and_disconnect_with(
        &self,
        reason: ConnectionResult,
        custom_reason: impl Into<String>,
    ) -> Result<(), TransportError> {
        send_disconnect(
            self,
            DisconnectMessage::new(reason).with_custom_reason(custom_reason),
        )
    }

    /// Invoke `callback` for the first inbound message of type `M` that
    /// satisfies `predicate`, then never again.
    ///
    /// The observer removes itself from the stream before running the
    /// callback. Messages of other types, and messages the predicate
    /// rejects, leave it installed. If nothing ever matches it stays
    /// registered; use [`Subscription::cancel`] to remove it. Ignoring the
    /// returned handle is fine.
    fn subscribe_once<M, P, F>(&self, predicate: P, callback: F) -> Subscription<MessageEvent>
    where
        M: Message,
        P: Fn(&M) -> bool + Send + Sync + 'static,
        F: FnOnce(&M, &MessageEvent) + Send + 'static,
    {
        let registry = self.message_received();
        let weak = Arc::downgrade(registry);
        // Taken exactly once, even if two threads match concurrently.
        let slot = Mutex::new(Some(callback));

        let id = registry.subscribe_with(move |id| {
            move |event: &MessageEvent| {
                let Some(message) = event.message.downcast_ref::<M>() else {
                    return;
                };
                if !predicate(message) {
                    return;
                }
                if let Some(registry) = weak.upgrade() {
                    let _ = registry.unsubscribe(id);
                }
                let Some(callback) = slot.lock().take() else {
                    return;
                };
                debug!(
                    conn_id = %event.connection.id(),
                    subscription = %id,
                    message_type = message.message_type(),
                    "one-shot subscription matched"
                );
                callback(message, event);
            }
        });
        debug!(conn_id = %self.id(), subscription = %id, "one-shot subscription registered");
        Subscription::new(id, registry)
    }
}

impl<C: Connection + ?Sized> ConnectionExt for C {}

fn send_disconnect<C: Connection + ?Sized>(
    connection: &C,
    notice: DisconnectMessage,
) -> Result<(), TransportError> {
    let reason = notice.reason;
    debug!(
        conn_id = %connection.id(),
        %reason,
        custom_reason = notice.custom_reason.as_deref(),
        "notifying peer and disconnecting"
    );
    connection.send(Arc::new(notice))?;
    connection.disconnect_async(reason);
    Ok(())
}

/// Send `message` to each connection, in iteration order.
///
/// Stops at the first failing send and returns its error; later connections
/// are not attempted.
pub fn broadcast_send<'a, C, I>(
    connections: I,
    message: &Arc<dyn Message>,
) -> Result<(), TransportError>
where
    C: Connection + ?Sized + 'a,
    I: IntoIterator<Item = &'a Arc<C>>,
{
    let mut recipients = 0usize;
    for connection in connections {
        connection.send(Arc::clone(message))?;
        recipients += 1;
    }
    debug!(
        message_type = message.message_type(),
        recipients, "broadcast message"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::any::Any;
    use std::num::NonZeroUsize;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use assert_matches::assert_matches;
    use mockall::Sequence;
    use proptest::prelude::*;

    use crate::connection::MockConnection;
    use crate::ids::ConnectionId;
    use crate::memory::MemoryConnection;

    #[derive(Debug)]
    struct Chat {
        seq: u32,
        text: String,
    }

    impl Message for Chat {
        fn message_type(&self) -> u16 {
            10
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[derive(Debug)]
    struct Ping;

    impl Message for Ping {
        fn message_type(&self) -> u16 {
            11
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn capacity(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    fn chat(seq: u32, text: &str) -> Arc<dyn Message> {
        Arc::new(Chat {
            seq,
            text: text.into(),
        })
    }

    fn is_disconnect(
        message: &Arc<dyn Message>,
        reason: ConnectionResult,
        custom: Option<&str>,
    ) -> bool {
        message
            .downcast_ref::<DisconnectMessage>()
            .is_some_and(|d| d.reason == reason && d.custom_reason.as_deref() == custom)
    }

    // ── subscribe_once ──────────────────────────────────────────────

    #[test]
    fn fires_on_first_match_only() {
        let (conn, _rx) = MemoryConnection::channel(capacity(8));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_in = Arc::clone(&seen);
        let _ = conn.subscribe_once(
            |c: &Chat| c.text == "hit",
            move |c: &Chat, _event| seen_in.lock().push(c.seq),
        );

        let _ = conn.receive(chat(1, "miss"));
        let _ = conn.receive(chat(2, "hit"));
        let _ = conn.receive(chat(3, "hit"));

        assert_eq!(*seen.lock(), vec![2]);
    }

    #[test]
    fn ignores_other_message_types() {
        let (conn, _rx) = MemoryConnection::channel(capacity(8));
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_in = Arc::clone(&hits);
        let sub = conn.subscribe_once(
            |_: &Chat| true,
            move |_, _| {
                let _ = hits_in.fetch_add(1, Ordering::SeqCst);
            },
        );

        let _ = conn.receive(Arc::new(Ping));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert!(sub.is_active());

        let _ = conn.receive(chat(1, "any"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(!sub.is_active());
    }

    #[test]
    fn removed_before_callback_runs() {
        let (conn, _rx) = MemoryConnection::channel(capacity(8));
        let registry = Arc::clone(conn.message_received());
        let registered_during_callback = Arc::new(Mutex::new(None));
        let flag = Arc::clone(&registered_during_callback);
        let _ = conn.subscribe_once(
            |_: &Ping| true,
            move |_, _| *flag.lock() = Some(registry.len()),
        );

        let _ = conn.receive(Arc::new(Ping));
        assert_eq!(*registered_during_callback.lock(), Some(0));
    }

    #[test]
    fn redelivery_from_callback_does_not_refire() {
        let (conn, _rx) = MemoryConnection::channel(capacity(8));
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_in = Arc::clone(&hits);
        let _ = conn.subscribe_once(
            |_: &Ping| true,
            move |_, event| {
                let _ = hits_in.fetch_add(1, Ordering::SeqCst);
                let _ = event.connection.message_received().dispatch(event);
            },
        );

        let _ = conn.receive(Arc::new(Ping));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn callback_receives_event_connection() {
        let (conn, _rx) = MemoryConnection::channel(capacity(8));
        let expected = conn.id().clone();
        let seen = Arc::new(Mutex::new(None));
        let seen_in = Arc::clone(&seen);
        let _ = conn.subscribe_once(
            |_: &Ping| true,
            move |_, event| *seen_in.lock() = Some(event.connection.id().clone()),
        );
        let _ = conn.receive(Arc::new(Ping));
        assert_eq!(seen.lock().as_ref(), Some(&expected));
    }

    #[test]
    fn non_matching_subscription_stays_until_cancelled() {
        let (conn, _rx) = MemoryConnection::channel(capacity(8));
        let sub = conn.subscribe_once(|_: &Chat| false, |_, _| panic!("must not fire"));
        for seq in 0..5 {
            let _ = conn.receive(chat(seq, "x"));
        }
        assert!(sub.is_active());
        assert_eq!(conn.message_received().len(), 1);

        assert!(sub.cancel());
        assert!(conn.message_received().is_empty());
    }

    #[test]
    fn concurrent_matches_fire_once() {
        let (conn, _rx) = MemoryConnection::channel(capacity(8));
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_in = Arc::clone(&hits);
        let _ = conn.subscribe_once(
            |_: &Ping| true,
            move |_, _| {
                let _ = hits_in.fetch_add(1, Ordering::SeqCst);
            },
        );

        let threads: Vec<_> = (0..8)
            .map(|_| {
                let conn = Arc::clone(&conn);
                std::thread::spawn(move || {
                    let _ = conn.receive(Arc::new(Ping));
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    proptest! {
        #[test]
        fn fires_at_most_once_on_first_match(
            seqs in proptest::collection::vec(0u32..20, 0..40),
            threshold in 0u32..20,
        ) {
            let (conn, _rx) = MemoryConnection::channel(capacity(8));
            let seen = Arc::new(Mutex::new(Vec::new()));
            let seen_in = Arc::clone(&seen);
            let _ = conn.subscribe_once(
                move |c: &Chat| c.seq >= threshold,
                move |c: &Chat, _| seen_in.lock().push(c.seq),
            );
            for seq in &seqs {
                let _ = conn.receive(chat(*seq, "p"));
            }

            let expected: Vec<u32> = seqs
                .iter()
                .copied()
                .find(|s| *s >= threshold)
                .into_iter()
                .collect();
            prop_assert_eq!(seen.lock().clone(), expected);
        }
    }

    // ── notify_and_disconnect ───────────────────────────────────────

    #[test]
    fn notify_sends_then_disconnects() {
        let mut mock = MockConnection::new();
        let mut seq = Sequence::new();
        let _ = mock.expect_id().return_const(ConnectionId::from("c1"));
        let _ = mock
            .expect_send()
            .withf(|m| is_disconnect(m, ConnectionResult::TimedOut, None))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        let _ = mock
            .expect_disconnect_async()
            .withf(|r| *r == ConnectionResult::TimedOut)
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());

        mock.notify_and_disconnect(ConnectionResult::TimedOut).unwrap();
    }

    #[test]
    fn notify_with_custom_reason() {
        let mut mock = MockConnection::new();
        let _ = mock.expect_id().return_const(ConnectionId::from("c1"));
        let _ = mock
            .expect_send()
            .withf(|m| is_disconnect(m, ConnectionResult::Custom, Some("custom")))
            .times(1)
            .returning(|_| Ok(()));
        let _ = mock
            .expect_disconnect_async()
            .withf(|r| *r == ConnectionResult::Custom)
            .times(1)
            .return_const(());

        mock.notify_and_disconnect_with(ConnectionResult::Custom, "custom")
            .unwrap();
    }

    #[test]
    fn failed_notify_skips_disconnect() {
        let mut mock = MockConnection::new();
        let _ = mock.expect_id().return_const(ConnectionId::from("c1"));
        let _ = mock
            .expect_send()
            .times(1)
            .returning(|_| Err(TransportError::Io("reset".into())));
        let _ = mock.expect_disconnect_async().times(0);

        let result = mock.notify_and_disconnect(ConnectionResult::FailedUnknown);
        assert_matches!(result, Err(TransportError::Io(msg)) if msg == "reset");
    }

    // ── broadcast_send ──────────────────────────────────────────────

    fn ordered_mock(
        name: &'static str,
        seq: &mut Sequence,
        log: &Arc<Mutex<Vec<&'static str>>>,
        result: Result<(), TransportError>,
    ) -> Arc<MockConnection> {
        let mut mock = MockConnection::new();
        let _ = mock.expect_id().return_const(ConnectionId::from(name));
        let log = Arc::clone(log);
        let _ = mock
            .expect_send()
            .times(1)
            .in_sequence(seq)
            .returning(move |_| {
                log.lock().push(name);
                result.clone()
            });
        Arc::new(mock)
    }

    #[test]
    fn broadcast_sends_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut seq = Sequence::new();
        let conns = vec![
            ordered_mock("c1", &mut seq, &log, Ok(())),
            ordered_mock("c2", &mut seq, &log, Ok(())),
            ordered_mock("c3", &mut seq, &log, Ok(())),
        ];

        broadcast_send(&conns, &chat(1, "hello")).unwrap();
        assert_eq!(*log.lock(), vec!["c1", "c2", "c3"]);
    }

    #[test]
    fn broadcast_stops_at_first_failure() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut seq = Sequence::new();
        let mut c3 = MockConnection::new();
        let _ = c3.expect_send().times(0);
        let conns = vec![
            ordered_mock("c1", &mut seq, &log, Ok(())),
            ordered_mock("c2", &mut seq, &log, Err(TransportError::Closed)),
            Arc::new(c3),
        ];

        let result = broadcast_send(&conns, &chat(1, "hello"));
        assert_matches!(result, Err(TransportError::Closed));
        assert_eq!(*log.lock(), vec!["c1", "c2"]);
    }

    #[test]
    fn broadcast_to_empty_sequence() {
        let conns: Vec<Arc<MockConnection>> = Vec::new();
        assert!(broadcast_send(&conns, &chat(1, "nobody")).is_ok());
    }

    #[tokio::test]
    async fn broadcast_over_trait_objects() {
        let (a, mut rx_a) = MemoryConnection::channel(capacity(4));
        let (b, mut rx_b) = MemoryConnection::channel(capacity(4));
        let conns: Vec<Arc<dyn Connection>> = vec![a, b];

        broadcast_send(&conns, &chat(9, "all")).unwrap();

        let got_a = rx_a.recv().await.unwrap();
        let got_b = rx_b.recv().await.unwrap();
        assert_eq!(got_a.downcast_ref::<Chat>().unwrap().seq, 9);
        assert_eq!(got_b.downcast_ref::<Chat>().unwrap().text, "all");
    }
}
