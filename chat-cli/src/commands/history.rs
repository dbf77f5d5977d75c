//! Print a conversation snapshot.

use anyhow::{bail, Result};
use std::io::Write;

use huddle_client::{ChatApi, ClientConfig, HistoryLoader, RestApi};
use huddle_types::{GroupId, UserId};

use crate::render;

/// Run the history command.
pub async fn run(
    config: &ClientConfig,
    group: Option<GroupId>,
    peer: Option<UserId>,
) -> Result<()> {
    let api = RestApi::new(&config.server.http_base_url, &config.identity.token);
    let loader = HistoryLoader::new(api, config.user_id());
    let mut out = std::io::stdout();
    print_history(&loader, &config.user_id(), group, peer, &mut out).await
}

async fn print_history<A: ChatApi>(
    loader: &HistoryLoader<A>,
    me: &UserId,
    group: Option<GroupId>,
    peer: Option<UserId>,
    out: &mut impl Write,
) -> Result<()> {
    let messages = match (group, peer) {
        (Some(group), _) => loader.fetch_group_history(&group).await?,
        (None, Some(peer)) => loader.fetch_private_history(me, &peer).await?,
        (None, None) => bail!("Specify --group or --peer"),
    };

    if messages.is_empty() {
        writeln!(out, "(no messages)")?;
    }
    for message in &messages {
        writeln!(out, "{}", render::message_line(message))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use huddle_client::MockApi;
    use serde_json::json;

    fn loader(api: &MockApi) -> HistoryLoader<MockApi> {
        HistoryLoader::new(api.clone(), UserId::from("alice"))
    }

    #[tokio::test]
    async fn prints_group_snapshot() {
        let api = MockApi::new();
        api.set_group_history(
            "g1",
            json!([
                {"senderId": "bob", "message": "hi", "time": "10:00"},
                {"senderId": "alice", "message": "hey", "time": "10:01"},
            ]),
        );

        let mut out = Vec::new();
        print_history(&loader(&api), &"alice".into(), Some("g1".into()), None, &mut out)
            .await
            .unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "[10:00] bob: hi\n[10:01]*alice: hey\n");
    }

    #[tokio::test]
    async fn empty_private_history() {
        let api = MockApi::new();
        let mut out = Vec::new();
        print_history(&loader(&api), &"alice".into(), None, Some("bob".into()), &mut out)
            .await
            .unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "(no messages)\n");
    }

    #[tokio::test]
    async fn backend_failure_is_reported() {
        let api = MockApi::new();
        api.fail_next_request("down");
        let mut out = Vec::new();
        let result =
            print_history(&loader(&api), &"alice".into(), Some("g1".into()), None, &mut out).await;
        assert!(result.is_err());
    }
}
