use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::info;

use super::controller::MusicController;
use crate::audio::node::NodeEvent;

/// Reparte los eventos del nodo al controlador.
///
/// Cada evento corre en su propia tarea para que un guild lento no retrase a los demás.
pub struct NodeEventDispatcher {
    controller: Arc<MusicController>,
    events: UnboundedReceiver<NodeEvent>,
}

impl NodeEventDispatcher {
    pub fn new(controller: Arc<MusicController>, events: UnboundedReceiver<NodeEvent>) -> Self {
        Self { controller, events }
    }

    pub async fn run(mut self) {
        while let Some(event) = self.events.recv().await {
            let controller = self.controller.clone();
            tokio::spawn(async move {
                controller.handle_event(event).await;
            });
        }

        info!("📭 Canal de eventos del nodo cerrado");
    }
}
