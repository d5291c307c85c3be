pub mod groups;
pub mod handler;
pub mod presence_index;
pub mod session;

use tokio::sync::mpsc;

use crate::models::ServerEvent;

/// Outbound queue feeding a connection's socket writer task.
pub type ClientTx = mpsc::UnboundedSender<ServerEvent>;
