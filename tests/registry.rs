//! Registry behavior through the public API, without network access

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

use cursekit::formatters::StripHtml;
use cursekit::handlers::curseforge::{self, Auth, CurseForgeHandler, CurseForgeSettings};
use cursekit::handlers::{
    BatchOrder, CallArgs, EventKey, Handler, HandlerContext, HandlerError, HandlerGroup,
    HandlerRegistry, NullHandler, Outcome, SharedHandler, cursetools,
};
use cursekit::proto::{Protocol, UrlProtocol};
use cursekit::records::{Addon, AddonFile, Description};
use cursekit::{ClientError, CurseClient};

/// Serves canned records from memory
struct Offline;

#[async_trait]
impl Handler for Offline {
    fn family(&self) -> &str {
        "offline"
    }

    async fn handle(&self, ctx: &HandlerContext, args: CallArgs) -> Result<Outcome, HandlerError> {
        let id: u32 = args.get(0)?;

        let outcome = match ctx.key() {
            EventKey::ADDON => {
                let mut addon: Addon = serde_json::from_value(serde_json::json!({
                    "id": id, "gameId": 432, "name": "Offline", "slug": "offline"
                }))?;
                addon.summary = "served from memory".to_string();
                Outcome::record(addon)
            }
            EventKey::ADDON_LIST_FILE => {
                let file: AddonFile = serde_json::from_value(serde_json::json!({
                    "id": 9, "modId": id, "displayName": "offline.jar", "fileName": "offline.jar"
                }))?;
                Outcome::records([file])
            }
            EventKey::ADDON_DESC => Outcome::record(Description::new("<i>offline</i>")),
            other => {
                return Err(HandlerError::NotImplemented(format!("offline event {other}")));
            }
        };

        Ok(outcome)
    }
}

fn offline_group() -> BTreeMap<EventKey, SharedHandler> {
    [EventKey::ADDON, EventKey::ADDON_LIST_FILE, EventKey::ADDON_DESC]
        .into_iter()
        .map(|key| (key, Arc::new(Offline) as SharedHandler))
        .collect()
}

#[tokio::test]
async fn test_user_group_preempts_curseforge_family() {
    let registry = HandlerRegistry::new();
    let count = registry
        .register_batch(
            [
                HandlerGroup::from(offline_group()),
                HandlerGroup::from(curseforge::handler_map(CurseForgeSettings::default())),
            ],
            BatchOrder::FirstWins,
        )
        .unwrap();

    assert_eq!(count, EventKey::BUILTIN.len());

    let offline = registry.get_handler(EventKey::ADDON).unwrap();
    assert_eq!(offline.family(), "offline");
    let game = registry.get_handler(EventKey::GAME).unwrap();
    assert_eq!(game.family(), curseforge::FAMILY);
}

#[tokio::test]
async fn test_last_wins_lets_defaults_override() {
    let registry = HandlerRegistry::new();
    registry
        .register_batch(
            [
                HandlerGroup::from(offline_group()),
                HandlerGroup::from(curseforge::handler_map(CurseForgeSettings::default())),
            ],
            BatchOrder::LastWins,
        )
        .unwrap();

    let addon = registry.get_handler(EventKey::ADDON).unwrap();
    assert_eq!(addon.family(), curseforge::FAMILY);
}

#[tokio::test]
async fn test_records_call_back_through_registry() {
    let client = CurseClient::bare();
    client
        .registry()
        .register_batch([offline_group()], BatchOrder::FirstWins)
        .unwrap();
    client
        .registry()
        .set_default_formatter(Some(Arc::new(StripHtml::new())));

    let addon = client.addon(77).await.unwrap().unwrap();
    assert_eq!(addon.summary, "served from memory");

    let files = addon.files().await.unwrap();
    assert_eq!(files[0].mod_id, 77);

    let description = addon.description().await.unwrap().unwrap();
    assert_eq!(description.to_string(), "offline");

    // No handler for games: the no-op default answers
    assert!(addon.game().await.unwrap().is_none());
}

#[tokio::test]
async fn test_unregister_restores_noop_for_client() {
    let client = CurseClient::bare();
    client
        .registry()
        .register(Arc::new(Offline), Some(EventKey::ADDON))
        .unwrap();
    assert!(client.addon(1).await.unwrap().is_some());

    assert!(client.registry().unregister(EventKey::ADDON));
    assert!(client.addon(1).await.unwrap().is_none());
}

#[tokio::test]
async fn test_null_handler_disables_one_curseforge_key() {
    let registry = HandlerRegistry::new();
    let mut handlers = curseforge::handler_map(CurseForgeSettings::default());
    handlers[EventKey::ADDON.as_u32() as usize] =
        Arc::new(NullHandler::for_key(EventKey::ADDON)) as SharedHandler;

    registry
        .register_batch([handlers], BatchOrder::FirstWins)
        .unwrap();

    assert!(!registry.has_handler(EventKey::ADDON));
    assert!(registry.has_handler(EventKey::GAME));
}

#[tokio::test]
async fn test_handler_for_custom_key() {
    let registry = HandlerRegistry::new();
    let handler = CurseForgeHandler::new(
        curseforge::Endpoint::Game,
        Arc::new(CurseForgeSettings::default()),
    );

    registry
        .register(Arc::new(handler), Some(EventKey(100)))
        .unwrap();

    assert!(registry.contains_key(EventKey(100)));
    assert_eq!(registry.keys().len(), EventKey::BUILTIN.len() + 1);
}

#[tokio::test]
async fn test_detached_after_registry_dropped() {
    let client = CurseClient::bare();
    client
        .registry()
        .register(Arc::new(Offline), Some(EventKey::ADDON))
        .unwrap();

    let addon = client.addon(5).await.unwrap().unwrap();
    drop(client);

    assert!(matches!(addon.description().await, Err(ClientError::Detached)));
}

#[tokio::test]
async fn test_each_family_gets_its_own_protocol() {
    let registry = HandlerRegistry::new();
    registry
        .register_batch([cursetools::handler_map("modpack-builder")], BatchOrder::FirstWins)
        .unwrap();

    let settings = Arc::new(CurseForgeSettings {
        auth: Auth::ApiKey(Some("secret".to_string())),
        ..CurseForgeSettings::default()
    });
    registry
        .register(
            Arc::new(CurseForgeHandler::new(curseforge::Endpoint::Addon, settings)),
            None,
        )
        .unwrap();

    let official = registry.protocol(curseforge::FAMILY).unwrap();
    let mirror = registry.protocol(cursetools::FAMILY).unwrap();
    assert!(!Arc::ptr_eq(&official, &mirror));

    let official = official.as_any().downcast_ref::<UrlProtocol>().unwrap();
    let mirror = mirror.as_any().downcast_ref::<UrlProtocol>().unwrap();
    assert_eq!(official.header("x-api-key").as_deref(), Some("secret"));
    assert_eq!(mirror.header("x-api-key"), None);
    assert_eq!(mirror.header("user-agent").as_deref(), Some("modpack-builder"));
    assert_eq!(official.host(), "https://api.curseforge.com/");
    assert_eq!(mirror.host(), cursetools::HOST);

    assert_eq!(
        registry.get_handler(EventKey::ADDON).unwrap().family(),
        curseforge::FAMILY
    );
    assert_eq!(
        registry.get_handler(EventKey::GAME).unwrap().family(),
        cursetools::FAMILY
    );
}
