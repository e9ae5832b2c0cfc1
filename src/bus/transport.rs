use crate::bus::BusError;
use crate::model::Identity;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// One live server-pushed channel. Dropping `outbound` asks the transport to
/// close; `inbound` ends when the server side goes away.
#[derive(Debug)]
pub struct Connection {
    pub inbound: mpsc::Receiver<String>,
    pub outbound: mpsc::Sender<String>,
}

/// Opens identity-scoped connections to the event server.
#[async_trait]
pub trait EventTransport: Send + Sync {
    async fn connect(&self, identity: &Identity) -> Result<Connection, BusError>;
}
