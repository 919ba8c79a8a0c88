//! Attachment of connections to an inbound router.

use storage::StorageError;

use super::ExchangeManager;
use crate::error::{ExchangeError, RoutingError};
use crate::record::{ConnectionRecord, RoutingState};
use crate::traits::Responder;

impl ExchangeManager {
    /// Assigns an inbound routing connection and asks the router to start
    /// forwarding for our key. Returns the new routing state.
    pub async fn establish_inbound(
        &self,
        connection: &mut ConnectionRecord,
        router_connection_id: &str,
        responder: &dyn Responder,
    ) -> Result<RoutingState, ExchangeError> {
        // A received invitation may not have minted our DID yet.
        let my_info = match &connection.my_did {
            Some(did) => self.wallet().get_local_did(did).await?,
            None => {
                let info = self.wallet().create_local_did().await?;
                connection.my_did = Some(info.did.clone());
                info
            }
        };

        let router =
            match ConnectionRecord::retrieve_by_id(self.store(), router_connection_id).await {
                Ok(router) => router,
                Err(ExchangeError::Storage(StorageError::NotFound)) => {
                    return Err(
                        RoutingError::RouterNotFound(router_connection_id.to_owned()).into()
                    )
                }
                Err(err) => return Err(err),
            };
        if !router.is_ready() {
            return Err(RoutingError::RouterNotReady(router_connection_id.to_owned()).into());
        }
        connection.inbound_connection_id = Some(router_connection_id.to_owned());

        let route_manager = self.state().route_manager.as_ref().ok_or_else(|| {
            RoutingError::RouterMisconfigured("no routing manager configured".to_owned())
        })?;
        route_manager
            .send_create_route(router_connection_id, &my_info.verkey, responder)
            .await?;

        connection.routing_state = RoutingState::Request;
        connection.save(self.store()).await?;
        Ok(connection.routing_state)
    }

    /// Advances the routing state of the connection whose key the router has
    /// confirmed a route for.
    pub async fn update_inbound(
        &self,
        router_connection_id: &str,
        recipient_verkey: &str,
        routing_state: RoutingState,
    ) -> Result<(), ExchangeError> {
        let connections =
            ConnectionRecord::query_by_inbound_connection(self.store(), router_connection_id)
                .await?;
        for mut connection in connections {
            let Some(my_did) = connection.my_did.as_deref() else {
                continue;
            };
            let my_info = self.wallet().get_local_did(my_did).await?;
            if my_info.verkey == recipient_verkey {
                connection.routing_state = routing_state;
                connection.save(self.store()).await?;
            }
        }
        Ok(())
    }
}
