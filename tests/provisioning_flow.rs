mod common;

use common::*;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::atomic::Ordering;
    use tokio_util::sync::CancellationToken;
    use tunnel_portal::{
        error::{AppError, Precondition},
        models::tunnel::{TunnelStatus, TunnelType},
        navigation::{Navigation, Route},
        repositories::tunnel::GENERIC_CREATION_FAILURE,
        services::provisioning::{ANCHOR_UNAVAILABLE, FlowState, ProvisioningFlow},
    };

    async fn ready_flow(tunnels: &FakeTunnels) -> ProvisioningFlow {
        let mut flow = ProvisioningFlow::new(CancellationToken::new());
        flow.resolve_anchor(tunnels).await;
        assert_eq!(flow.state(), &FlowState::Ready);
        flow
    }

    #[tokio::test]
    async fn anchor_resolution_moves_to_ready() {
        let tunnels = FakeTunnels::default();
        let flow = ready_flow(&tunnels).await;

        assert_eq!(flow.anchor(), Some(ANCHOR));
        assert!(flow.can_submit());
        assert!(flow.message().is_none());
    }

    #[tokio::test]
    async fn failed_anchor_lookup_keeps_resolving() {
        let tunnels = FakeTunnels::default();
        tunnels.set_anchor(None);
        let mut flow = ProvisioningFlow::new(CancellationToken::new());

        flow.resolve_anchor(&tunnels).await;

        assert_eq!(flow.state(), &FlowState::ResolvingAnchor);
        assert_eq!(flow.message(), Some(ANCHOR_UNAVAILABLE));
        assert!(!flow.can_submit());
    }

    #[tokio::test]
    async fn blank_anchor_is_not_an_anchor() {
        let tunnels = FakeTunnels::default();
        tunnels.set_anchor(Some("   "));
        let mut flow = ProvisioningFlow::new(CancellationToken::new());

        flow.resolve_anchor(&tunnels).await;

        assert_eq!(flow.state(), &FlowState::ResolvingAnchor);
        assert!(flow.anchor().is_none());
    }

    #[tokio::test]
    async fn resolution_runs_once() {
        let tunnels = FakeTunnels::default();
        let mut flow = ready_flow(&tunnels).await;

        flow.resolve_anchor(&tunnels).await;

        assert_eq!(tunnels.status_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unresolved_anchor_is_checked_before_anything_else() {
        let tunnels = FakeTunnels::default();
        let mut flow = ProvisioningFlow::new(CancellationToken::new());

        let result = flow.submit(None, &tunnels).await;

        assert!(matches!(
            result,
            Err(AppError::Precondition(Precondition::AnchorUnresolved))
        ));
        assert_eq!(tunnels.creations(), 0);
        assert_eq!(flow.state(), &FlowState::ResolvingAnchor);
    }

    #[tokio::test]
    async fn missing_session_blocks_submission() {
        let tunnels = FakeTunnels::default();
        let mut flow = ready_flow(&tunnels).await;
        flow.set_client_ipv4("203.0.113.9");

        let result = flow.submit(None, &tunnels).await;
        assert!(matches!(
            result,
            Err(AppError::Precondition(Precondition::SessionAbsent))
        ));

        let mut expired = session_for("user-1");
        expired.expires_at = Utc::now() - chrono::Duration::minutes(1);
        let result = flow.submit(Some(&expired), &tunnels).await;
        assert!(matches!(
            result,
            Err(AppError::Precondition(Precondition::SessionAbsent))
        ));

        assert_eq!(tunnels.creations(), 0);
        assert_eq!(flow.state(), &FlowState::Ready);
    }

    #[tokio::test]
    async fn empty_address_blocks_submission() {
        let tunnels = FakeTunnels::default();
        let mut flow = ready_flow(&tunnels).await;

        let result = flow.submit(Some(&session_for("user-1")), &tunnels).await;

        assert!(matches!(
            result,
            Err(AppError::Precondition(Precondition::ClientAddressMissing))
        ));
        assert_eq!(tunnels.creations(), 0);
    }

    #[tokio::test]
    async fn success_records_the_tunnel_and_navigates_home() {
        let tunnels = FakeTunnels::default();
        let mut flow = ready_flow(&tunnels).await;
        flow.set_tunnel_type(TunnelType::Gre);
        flow.set_client_ipv4(" 203.0.113.9 ");

        let navigation = flow
            .submit(Some(&session_for("user-1")), &tunnels)
            .await
            .unwrap();

        assert_eq!(navigation, Navigation::Navigate(Route::Home));
        match flow.state() {
            FlowState::Succeeded(tunnel) => {
                assert_eq!(tunnel.tunnel_type, TunnelType::Gre);
                assert_eq!(tunnel.client_ipv4, "203.0.113.9");
                assert_eq!(tunnel.server_ipv4, ANCHOR);
                assert_eq!(tunnel.user_id.as_deref(), Some("user-1"));
            }
            other => panic!("unexpected state: {other:?}"),
        }
        assert_eq!(tunnels.creations(), 1);
    }

    #[tokio::test]
    async fn succeeded_flow_does_not_submit_again() {
        let tunnels = FakeTunnels::default();
        let mut flow = ready_flow(&tunnels).await;
        flow.set_client_ipv4("203.0.113.9");
        let session = session_for("user-1");

        flow.submit(Some(&session), &tunnels).await.unwrap();
        let again = flow.submit(Some(&session), &tunnels).await;

        assert!(matches!(
            again,
            Err(AppError::Precondition(Precondition::NotReady))
        ));
        assert_eq!(tunnels.creations(), 1);
        assert!(!flow.can_submit());
    }

    #[tokio::test]
    async fn rejection_fails_with_the_backend_message_and_can_be_retried() {
        let tunnels = FakeTunnels::default();
        tunnels.reject_creation("Tunnel limit reached");
        let mut flow = ready_flow(&tunnels).await;
        flow.set_client_ipv4("203.0.113.9");
        let session = session_for("user-1");

        // Step 1: the backend declines
        let result = flow.submit(Some(&session), &tunnels).await;
        match result {
            Err(AppError::CreationRejected(message)) => assert_eq!(message, "Tunnel limit reached"),
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(flow.state(), &FlowState::Failed);
        assert_eq!(flow.message(), Some("Tunnel limit reached"));
        assert!(flow.can_submit());

        // Step 2: editing reopens the form
        flow.set_client_ipv4("203.0.113.10");
        assert_eq!(flow.state(), &FlowState::Ready);
        assert!(flow.message().is_none());
    }

    #[tokio::test]
    async fn unexplained_failures_use_the_generic_message() {
        struct Unreachable;

        #[async_trait::async_trait]
        impl tunnel_portal::repositories::tunnel::TunnelRepository for Unreachable {
            async fn list_tunnels(&self, _: &str) -> tunnel_portal::error::Result<Vec<tunnel_portal::models::tunnel::Tunnel>> {
                Ok(Vec::new())
            }
            async fn get_tunnel(&self, _: &str, _: &str) -> tunnel_portal::error::Result<tunnel_portal::models::tunnel::Tunnel> {
                Err(AppError::NotFound)
            }
            async fn system_status(&self) -> tunnel_portal::error::Result<tunnel_portal::models::tunnel::SystemStatus> {
                Ok(tunnel_portal::models::tunnel::SystemStatus {
                    server_ipv4: ANCHOR.to_string(),
                    ..Default::default()
                })
            }
            async fn create_tunnel(
                &self,
                _: &str,
                _: &tunnel_portal::models::tunnel::CreateTunnelRequest,
            ) -> tunnel_portal::error::Result<tunnel_portal::models::tunnel::Tunnel> {
                Err(AppError::Internal("connection reset".to_string()))
            }
        }

        let mut flow = ProvisioningFlow::new(CancellationToken::new());
        flow.resolve_anchor(&Unreachable).await;
        flow.set_client_ipv4("203.0.113.9");

        let result = flow.submit(Some(&session_for("user-1")), &Unreachable).await;

        match result {
            Err(AppError::CreationRejected(message)) => assert_eq!(message, GENERIC_CREATION_FAILURE),
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(flow.message(), Some(GENERIC_CREATION_FAILURE));
    }

    #[tokio::test]
    async fn full_quota_refuses_creation() {
        let tunnels = FakeTunnels::with_tunnels(vec![
            tunnel("tun1", "user-1", TunnelType::Sit, TunnelStatus::Active),
            tunnel("tun2", "user-1", TunnelType::Gre, TunnelStatus::Pending),
        ]);
        let mut flow = ready_flow(&tunnels).await;
        flow.set_client_ipv4("203.0.113.9");

        let result = flow.submit(Some(&session_for("user-1")), &tunnels).await;

        assert!(matches!(
            result,
            Err(AppError::Precondition(Precondition::QuotaReached))
        ));
        assert_eq!(tunnels.creations(), 0);
        assert_eq!(flow.state(), &FlowState::Ready);
        assert!(flow.message().is_some());
    }

    #[tokio::test]
    async fn unreachable_listing_fails_the_flow_with_the_generic_message() {
        let tunnels = FakeTunnels::default();
        tunnels.listing_fails.store(true, Ordering::SeqCst);
        let mut flow = ready_flow(&tunnels).await;
        flow.set_client_ipv4("203.0.113.9");

        let result = flow.submit(Some(&session_for("user-1")), &tunnels).await;

        match result {
            Err(AppError::CreationRejected(message)) => assert_eq!(message, GENERIC_CREATION_FAILURE),
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(flow.state(), &FlowState::Failed);
        assert_eq!(flow.message(), Some(GENERIC_CREATION_FAILURE));
        assert!(flow.can_submit());
        assert_eq!(tunnels.creations(), 0);
    }

    #[tokio::test]
    async fn adopted_anchor_is_kept_over_a_changed_one() {
        let tunnels = FakeTunnels::default();
        tunnels.set_anchor(Some("198.18.0.1"));
        let mut flow = ProvisioningFlow::new(CancellationToken::new());

        flow.adopt_anchor(" 192.0.2.1 ").unwrap();
        flow.resolve_anchor(&tunnels).await;
        flow.set_client_ipv4("203.0.113.9");
        flow.submit(Some(&session_for("user-1")), &tunnels).await.unwrap();

        assert_eq!(tunnels.status_calls.load(Ordering::SeqCst), 0);
        match flow.state() {
            FlowState::Succeeded(tunnel) => assert_eq!(tunnel.server_ipv4, ANCHOR),
            other => panic!("unexpected state: {other:?}"),
        }
    }

    #[tokio::test]
    async fn adopting_a_non_address_is_refused() {
        let mut flow = ProvisioningFlow::new(CancellationToken::new());

        assert!(matches!(flow.adopt_anchor("anchor.example"), Err(AppError::Validation(_))));
        assert_eq!(flow.state(), &FlowState::ResolvingAnchor);
        assert!(flow.anchor().is_none());
    }

    #[tokio::test]
    async fn cancelled_flow_ignores_the_anchor() {
        let tunnels = FakeTunnels::default();
        let cancel = CancellationToken::new();
        let mut flow = ProvisioningFlow::new(cancel.clone());

        cancel.cancel();
        flow.resolve_anchor(&tunnels).await;

        assert_eq!(flow.state(), &FlowState::ResolvingAnchor);
        assert!(flow.anchor().is_none());
    }
}
