use crate::config::SidePolicy;
use crate::error::RelayError;
use crate::models::game::{GameState, PaddleUpdate, Side};
use crate::models::message::Message;
use crate::services::registry::{BroadcastReport, ConnectionRegistry, Registration};

/// An accepted paddle move and what its broadcast did.
#[derive(Debug)]
pub struct FrameOutcome {
    pub update: PaddleUpdate,
    pub state: GameState,
    pub report: BroadcastReport,
}

pub fn authorize(policy: SidePolicy, assigned: Side, requested: Side) -> Result<(), RelayError> {
    match policy {
        SidePolicy::Client => Ok(()),
        SidePolicy::Assigned if assigned == requested => Ok(()),
        SidePolicy::Assigned => Err(RelayError::SideNotPermitted {
            assigned,
            requested,
        }),
    }
}

/// Processes one inbound text frame from `session`: decode, authorize,
/// apply, then relay the original text unmodified to every connection,
/// the sender included.
pub async fn handle_client_frame(
    registry: &ConnectionRegistry,
    policy: SidePolicy,
    session: &Registration,
    text: &str,
) -> Result<FrameOutcome, RelayError> {
    let update = match Message::decode(text)? {
        Message::PaddleUpdate(update) => update,
        other => return Err(RelayError::UnexpectedType(other.kind())),
    };

    authorize(policy, session.side, update.side)?;
    let state = registry.apply_update(&update).await?;
    let report = registry.broadcast_text(text).await;

    Ok(FrameOutcome {
        update,
        state,
        report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::game::DEFAULT_CANVAS_HEIGHT;
    use std::net::SocketAddr;
    use tokio::sync::mpsc;

    const LEFT_250: &str = r#"{"type":"paddle_update","payload":{"side":"left","y":250}}"#;
    const LEFT_NEG: &str = r#"{"type":"paddle_update","payload":{"side":"left","y":-5}}"#;

    struct Peer {
        reg: Registration,
        rx: mpsc::Receiver<String>,
    }

    async fn connect(registry: &ConnectionRegistry, port: u16) -> Peer {
        let (tx, rx) = mpsc::channel(8);
        let reg = registry
            .register(SocketAddr::from(([127, 0, 0, 1], port)), tx)
            .await;
        Peer { reg, rx }
    }

    fn registry() -> ConnectionRegistry {
        ConnectionRegistry::new(GameState::default(), DEFAULT_CANVAS_HEIGHT)
    }

    #[tokio::test]
    async fn valid_update_reaches_everyone_verbatim() {
        let registry = registry();
        let mut a = connect(&registry, 1).await;
        let mut b = connect(&registry, 2).await;
        let mut c = connect(&registry, 3).await;

        let outcome = handle_client_frame(&registry, SidePolicy::Client, &a.reg, LEFT_250)
            .await
            .unwrap();

        assert_eq!(outcome.state.left_paddle, 250.0);
        assert_eq!(outcome.report.delivered, 3);
        assert_eq!(registry.snapshot().await.left_paddle, 250.0);
        for peer in [&mut a, &mut b, &mut c] {
            assert_eq!(peer.rx.try_recv().unwrap(), LEFT_250);
            assert!(peer.rx.try_recv().is_err());
        }
    }

    #[tokio::test]
    async fn out_of_bounds_update_is_dropped() {
        let registry = registry();
        let mut a = connect(&registry, 1).await;
        let b = connect(&registry, 2).await;
        let before = registry.snapshot().await;

        let err = handle_client_frame(&registry, SidePolicy::Client, &b.reg, LEFT_NEG)
            .await
            .unwrap_err();

        assert!(matches!(err, RelayError::OutOfBounds { .. }));
        assert_eq!(registry.snapshot().await, before);
        assert!(a.rx.try_recv().is_err());
        assert!(registry.contains(b.reg.id).await);
    }

    #[tokio::test]
    async fn dead_peer_is_reaped_during_relay() {
        let registry = registry();
        let mut a = connect(&registry, 1).await;
        let mut b = connect(&registry, 2).await;
        let c = connect(&registry, 3).await;
        drop(c.rx);

        let outcome = handle_client_frame(&registry, SidePolicy::Client, &a.reg, LEFT_250)
            .await
            .unwrap();

        assert_eq!(outcome.report.delivered, 2);
        assert_eq!(outcome.report.reaped, vec![c.reg.id]);
        assert_eq!(registry.connection_count().await, 2);
        assert_eq!(a.rx.try_recv().unwrap(), LEFT_250);
        assert_eq!(b.rx.try_recv().unwrap(), LEFT_250);
    }

    #[tokio::test]
    async fn assigned_policy_rejects_foreign_side() {
        let registry = registry();
        let mut a = connect(&registry, 1).await;
        let b = connect(&registry, 2).await;
        assert_eq!(b.reg.side, Side::Right);

        let err = handle_client_frame(&registry, SidePolicy::Assigned, &b.reg, LEFT_250)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RelayError::SideNotPermitted {
                assigned: Side::Right,
                requested: Side::Left
            }
        ));
        assert_eq!(registry.snapshot().await, GameState::default());
        assert!(a.rx.try_recv().is_err());

        handle_client_frame(&registry, SidePolicy::Assigned, &a.reg, LEFT_250)
            .await
            .unwrap();
        assert_eq!(a.rx.try_recv().unwrap(), LEFT_250);
    }

    #[tokio::test]
    async fn client_may_not_send_server_messages() {
        let registry = registry();
        let a = connect(&registry, 1).await;

        for text in [
            r#"{"type":"initial_state","payload":{"leftPaddle":0,"rightPaddle":0}}"#,
            r#"{"type":"team_assign","payload":{"team":"right"}}"#,
        ] {
            let err = handle_client_frame(&registry, SidePolicy::Client, &a.reg, text)
                .await
                .unwrap_err();
            assert!(matches!(err, RelayError::UnexpectedType(_)));
        }
        assert_eq!(registry.snapshot().await, GameState::default());
    }

    #[tokio::test]
    async fn extra_envelope_fields_are_never_relayed() {
        let registry = registry();
        let a = connect(&registry, 1).await;
        let mut b = connect(&registry, 2).await;
        let padded = r#"{"type":"paddle_update","payload":{"side":"left","y":250},"type2":"initial_state","score":{"hax":true}}"#;

        let err = handle_client_frame(&registry, SidePolicy::Client, &a.reg, padded)
            .await
            .unwrap_err();

        assert!(matches!(err, RelayError::Decode(_)));
        assert!(b.rx.try_recv().is_err());
        assert_eq!(registry.snapshot().await, GameState::default());
    }

    #[tokio::test]
    async fn malformed_frame_is_a_decode_error() {
        let registry = registry();
        let a = connect(&registry, 1).await;
        let err = handle_client_frame(&registry, SidePolicy::Client, &a.reg, "{oops")
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::Decode(_)));
    }
}
