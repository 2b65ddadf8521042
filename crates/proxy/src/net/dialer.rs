//! Opens backend connections over the TCP transport.

use std::sync::Arc;

use async_trait::async_trait;
use ultimate_session::{ClientData, ConnError, Connection, Dialer, IdentityData};

use super::connection::TcpConnection;

pub struct TcpDialer;

#[async_trait]
impl Dialer for TcpDialer {
    async fn dial(
        &self,
        address: &str,
        identity: IdentityData,
        client: ClientData,
    ) -> Result<Arc<dyn Connection>, ConnError> {
        tracing::debug!("Dialing {} for {}", address, identity.display_name);
        let conn = TcpConnection::connect(address, identity, client).await?;
        Ok(conn)
    }
}
