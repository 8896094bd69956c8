//! Settings sync (C9): push a bot's self-described settings to the
//! registry at boot. No counterpart in the captured `original_source/`
//! snapshot (see DESIGN.md); implemented directly from the protocol
//! description, styled on the teacher's `reqwest` POST usage.

use reqwest::Client;

use super::dispatcher::PoeBot;
use crate::protocol::PROTOCOL_VERSION;

/// POST `bot.get_settings()` to `{registry_base_url}/update_settings/{bot_name}/{access_key}/{version}`.
/// Skipped (with a warning, not a fatal error) when either is absent,
/// matching the boot-time soft-fail behavior described in spec 4.9.
pub async fn sync_settings(
    client: &Client,
    registry_base_url: &str,
    bot_name: Option<&str>,
    access_key: Option<&str>,
    bot: &dyn PoeBot,
) {
    let (Some(bot_name), Some(access_key)) = (bot_name, access_key) else {
        log::warn!("skipping settings sync: bot name or access key not configured");
        return;
    };

    let settings = bot.get_settings().await;
    let url = format!("{registry_base_url}/update_settings/{bot_name}/{access_key}/{PROTOCOL_VERSION}");

    match client.post(&url).json(&settings).send().await {
        Ok(response) if response.status().is_success() => {
            log::info!("synced settings for bot '{bot_name}'");
        }
        Ok(response) => {
            log::error!(
                "settings sync for bot '{bot_name}' returned HTTP {}",
                response.status()
            );
        }
        Err(err) => {
            log::error!("settings sync for bot '{bot_name}' failed: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{
        QueryRequest, ReportErrorRequest, ReportFeedbackRequest, ReportReactionRequest,
        SettingsResponse,
    };
    use crate::server::dispatcher::{RequestContext, ResponseElement};
    use async_trait::async_trait;
    use futures::Stream;
    use httpmock::MockServer;

    struct StubBot;

    #[async_trait]
    impl PoeBot for StubBot {
        fn get_response(
            &self,
            _request: QueryRequest,
            _ctx: RequestContext,
        ) -> Box<dyn Stream<Item = ResponseElement> + Send + Unpin> {
            Box::new(futures::stream::empty())
        }

        async fn get_settings(&self) -> SettingsResponse {
            let mut settings = SettingsResponse::new();
            settings.introduction_message = Some("hi".to_string());
            settings
        }

        async fn on_feedback(&self, _request: ReportFeedbackRequest) {}
        async fn on_reaction(&self, _request: ReportReactionRequest) {}
        async fn on_error(&self, _request: ReportErrorRequest) {}
    }

    #[tokio::test]
    async fn posts_settings_to_expected_path() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(httpmock::Method::POST)
                .path(format!("/update_settings/mybot/{}/{}", "a".repeat(32), PROTOCOL_VERSION));
            then.status(200);
        });

        let client = Client::new();
        sync_settings(&client, &server.base_url(), Some("mybot"), Some(&"a".repeat(32)), &StubBot).await;
        mock.assert();
    }

    #[tokio::test]
    async fn skips_without_failing_when_unconfigured() {
        let client = Client::new();
        sync_settings(&client, "https://unused.invalid", None, None, &StubBot).await;
    }
}
