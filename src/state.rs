use crate::{
    config::SyncConfig, error::RosterResult, maud_conveniences::render_nav,
    routes::sse::SseEvent, sync::StudentSynchronizer,
};
use maud::{DOCTYPE, Markup, html};
use std::ops::Deref;
use tokio::sync::broadcast::{Receiver, Sender, channel};

/// htmx leaves 4xx/5xx responses unswapped by default. Ours carry the alert to show.
const HTMX_CONFIG: &str = r#"{"responseHandling":[{"code":"204","swap":false},{"code":"[23]..","swap":true},{"code":"[45]..","swap":true,"error":true}]}"#;

#[derive(Clone, Debug)]
pub struct RosterState {
    synchronizer: StudentSynchronizer,
    sse_events_sender: Sender<SseEvent>,
}

impl RosterState {
    pub fn new(sync_config: &SyncConfig) -> RosterResult<Self> {
        let synchronizer = StudentSynchronizer::new(sync_config)?;
        let (tx, _rx) = channel(16);

        Ok(Self {
            synchronizer,
            sse_events_sender: tx,
        })
    }

    #[allow(clippy::unused_self, clippy::needless_pass_by_value)]
    pub fn render(&self, markup: Markup) -> Markup {
        html! {
            (DOCTYPE)
            html {
                head {
                    meta charset="UTF-8" {}
                    meta name="viewport" content="width=device-width, initial-scale=1.0" {}
                    meta name="htmx-config" content=(HTMX_CONFIG) {}
                    script src="https://unpkg.com/htmx.org@2.0.4" integrity="sha384-HGfztofotfshcF7+8n44JQL2oJmowVChPTg48S+jvZoztPfvwD79OC/LTtG6dMp+" crossorigin="anonymous" {}
                    script src="https://unpkg.com/htmx-ext-sse@2.2.3" integrity="sha384-Y4gc0CK6Kg+hmulDc6rZPJu0tqvk7EWlih0Oh+2OkAi1ZDlCbBDCQEE2uVk472Ky" crossorigin="anonymous" {}
                    script src="https://cdn.jsdelivr.net/npm/@tailwindcss/browser@4" {}
                    title { "Roster" }
                }
                body hx-ext="sse" class="bg-gray-900 min-h-screen flex flex-col items-center text-white" {
                    (render_nav())
                    (markup)
                }
            }
        }
    }

    pub fn subscribe_to_sse_feed(&self) -> Receiver<SseEvent> {
        self.sse_events_sender.subscribe()
    }

    pub fn send_sse_event(&self, event: SseEvent) {
        let _ = self.sse_events_sender.send(event);
    }
}

impl Deref for RosterState {
    type Target = StudentSynchronizer;

    fn deref(&self) -> &Self::Target {
        &self.synchronizer
    }
}
