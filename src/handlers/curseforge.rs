//! Handlers speaking the CurseForge web API
//!
//! One [`CurseForgeHandler`] exists per built-in event key. The handlers of
//! one map share their family name and therefore a single [`UrlProtocol`],
//! which carries the authentication header set in `on_start`. The official
//! API lives in the `"curseforge"` family; mirrors such as
//! [`cursetools`](super::cursetools) reuse these handlers with their own
//! [`CurseForgeSettings`].
//!
//! Arguments per key (positional unless noted):
//!
//! | key                | arguments                                   | result              |
//! |--------------------|---------------------------------------------|---------------------|
//! | `LIST_GAMES`       | none                                        | `Vec<Game>`         |
//! | `GAME`             | game id                                     | `Game`              |
//! | `LIST_CATEGORY`    | game id                                     | `Vec<Category>`     |
//! | `CATEGORY`         | category id (always unsupported)            |                     |
//! | `SUB_CATEGORY`     | game id, category id                        | `Vec<Category>`     |
//! | `ADDON`            | addon id                                    | `Addon`             |
//! | `ADDON_SEARCH`     | game id, class id, named `search`           | `Vec<Addon>`        |
//! | `ADDON_DESC`       | addon id                                    | `Description`       |
//! | `ADDON_LIST_FILE`  | addon id, named `search`                    | `Vec<AddonFile>`    |
//! | `ADDON_FILE`       | addon id, file id                           | `AddonFile`         |
//! | `FILE_DESCRIPTION` | addon id, file id                           | `Description`       |

use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use super::traits::{Handler, HandlerContext, HandlerError, Pipeline, SharedHandler, run};
use super::types::{CallArgs, EventKey, Outcome};
use super::cursetools;
use crate::config::{Backend, Config, HttpConfig};
use crate::proto::{ProtocolError, SharedProtocol, UrlProtocol};
use crate::records::{Addon, AddonFile, Category, Description, Game, SearchParam};

pub const FAMILY: &str = "curseforge";

/// Named argument carrying a [`SearchParam`]
pub const SEARCH_ARG: &str = "search";

/// How a backend expects clients to identify themselves
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Auth {
    /// `x-api-key` header; requests go out without it when unset
    ApiKey(Option<String>),
    /// `user-agent` header carrying the application name
    AppName(String),
}

/// Everything a handler family needs to build its protocol
#[derive(Debug, Clone)]
pub struct CurseForgeSettings {
    pub family: String,
    pub base_url: String,
    pub extra: String,
    pub auth: Auth,
    pub http: HttpConfig,
}

impl CurseForgeSettings {
    /// Settings for the backend selected in `config`
    ///
    /// `api.base_url` and `api.extra` only apply to the official API; the
    /// curse.tools mirror always uses its own host.
    pub fn from_config(config: &Config) -> Self {
        match config.api.backend {
            Backend::CurseForge => Self {
                family: FAMILY.to_string(),
                base_url: config.api.base_url.clone(),
                extra: config.api.extra.clone(),
                auth: Auth::ApiKey(config.api.api_key.clone()),
                http: config.http.clone(),
            },
            Backend::CurseTools => {
                cursetools::settings(config.api.app_name.as_str(), config.http.clone())
            }
        }
    }
}

impl Default for CurseForgeSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// A CurseForge endpoint, one per built-in event key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    ListGames,
    Game,
    ListCategory,
    Category,
    SubCategory,
    Addon,
    AddonSearch,
    AddonDescription,
    AddonFiles,
    AddonFile,
    FileDescription,
}

/// Path and query string of one API request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub path: String,
    pub query: Vec<(String, String)>,
}

impl Request {
    fn path(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            query: Vec::new(),
        }
    }
}

impl Endpoint {
    /// Every endpoint, in event key order
    pub const ALL: [Endpoint; 11] = [
        Endpoint::ListGames,
        Endpoint::Game,
        Endpoint::ListCategory,
        Endpoint::Category,
        Endpoint::SubCategory,
        Endpoint::Addon,
        Endpoint::AddonSearch,
        Endpoint::AddonDescription,
        Endpoint::AddonFiles,
        Endpoint::AddonFile,
        Endpoint::FileDescription,
    ];

    pub fn key(&self) -> EventKey {
        match self {
            Endpoint::ListGames => EventKey::LIST_GAMES,
            Endpoint::Game => EventKey::GAME,
            Endpoint::ListCategory => EventKey::LIST_CATEGORY,
            Endpoint::Category => EventKey::CATEGORY,
            Endpoint::SubCategory => EventKey::SUB_CATEGORY,
            Endpoint::Addon => EventKey::ADDON,
            Endpoint::AddonSearch => EventKey::ADDON_SEARCH,
            Endpoint::AddonDescription => EventKey::ADDON_DESC,
            Endpoint::AddonFiles => EventKey::ADDON_LIST_FILE,
            Endpoint::AddonFile => EventKey::ADDON_FILE,
            Endpoint::FileDescription => EventKey::FILE_DESCRIPTION,
        }
    }

    /// Build the request for a call with `args`
    pub fn request(&self, args: &CallArgs) -> Result<Request, HandlerError> {
        let request = match self {
            Endpoint::ListGames => Request::path("games"),
            Endpoint::Game => Request::path(format!("games/{}", args.get::<u32>(0)?)),
            Endpoint::ListCategory => Request {
                path: "categories".to_string(),
                query: vec![("gameId".to_string(), args.get::<u32>(0)?.to_string())],
            },
            Endpoint::Category => {
                return Err(HandlerError::Unsupported(
                    "CurseForge can only list categories, not look one up".to_string(),
                ));
            }
            Endpoint::SubCategory => Request {
                path: "categories".to_string(),
                query: vec![
                    ("gameId".to_string(), args.get::<u32>(0)?.to_string()),
                    ("classId".to_string(), args.get::<u32>(1)?.to_string()),
                ],
            },
            Endpoint::Addon => Request::path(format!("mods/{}", args.get::<u32>(0)?)),
            Endpoint::AddonSearch => {
                let mut search = search_arg(args)?;
                search.game_id = Some(args.get(0)?);
                if search.class_id.is_none() {
                    search.class_id = Some(args.get(1)?);
                }
                Request {
                    path: "mods/search".to_string(),
                    query: search.to_query(),
                }
            }
            Endpoint::AddonDescription => {
                Request::path(format!("mods/{}/description", args.get::<u32>(0)?))
            }
            Endpoint::AddonFiles => Request {
                path: format!("mods/{}/files", args.get::<u32>(0)?),
                query: search_arg(args)?.to_query(),
            },
            Endpoint::AddonFile => Request::path(format!(
                "mods/{}/files/{}",
                args.get::<u32>(0)?,
                args.get::<u32>(1)?
            )),
            Endpoint::FileDescription => Request::path(format!(
                "mods/{}/files/{}/changelog",
                args.get::<u32>(0)?,
                args.get::<u32>(1)?
            )),
        };

        Ok(request)
    }

    /// Turn the `data` member of a response into the outcome
    pub fn shape(&self, data: Value) -> Result<Outcome, HandlerError> {
        let outcome = match self {
            Endpoint::ListGames => Outcome::records(parse::<Vec<Game>>(data)?),
            Endpoint::Game => Outcome::record(parse::<Game>(data)?),
            Endpoint::ListCategory | Endpoint::SubCategory | Endpoint::Category => {
                Outcome::records(parse::<Vec<Category>>(data)?)
            }
            Endpoint::Addon => Outcome::record(parse::<Addon>(data)?),
            Endpoint::AddonSearch => Outcome::records(parse::<Vec<Addon>>(data)?),
            Endpoint::AddonDescription | Endpoint::FileDescription => {
                Outcome::record(Description::new(parse::<String>(data)?))
            }
            Endpoint::AddonFiles => Outcome::records(parse::<Vec<AddonFile>>(data)?),
            Endpoint::AddonFile => Outcome::record(parse::<AddonFile>(data)?),
        };

        Ok(outcome)
    }
}

fn search_arg(args: &CallArgs) -> Result<SearchParam, HandlerError> {
    Ok(args.get_named::<SearchParam>(SEARCH_ARG)?.unwrap_or_default())
}

fn parse<T: DeserializeOwned>(data: Value) -> Result<T, HandlerError> {
    Ok(serde_json::from_value(data)?)
}

#[derive(Deserialize)]
struct Envelope {
    data: Value,
}

/// Handler for one CurseForge endpoint
#[derive(Debug, Clone)]
pub struct CurseForgeHandler {
    endpoint: Endpoint,
    settings: Arc<CurseForgeSettings>,
}

impl CurseForgeHandler {
    pub fn new(endpoint: Endpoint, settings: Arc<CurseForgeSettings>) -> Self {
        Self { endpoint, settings }
    }

    pub fn endpoint(&self) -> Endpoint {
        self.endpoint
    }
}

#[async_trait]
impl Pipeline for CurseForgeHandler {
    type Raw = Bytes;
    type Decoded = Value;

    async fn acquire(&self, ctx: &HandlerContext, args: &CallArgs) -> Result<Bytes, HandlerError> {
        let request = self.endpoint.request(args)?;
        let protocol = ctx.require_protocol::<UrlProtocol>()?;
        let url = protocol.url_build(&request.path);

        Ok(protocol.get_data(&url, &request.query).await?)
    }

    fn decode(&self, raw: Bytes) -> Result<Value, HandlerError> {
        let envelope: Envelope = serde_json::from_slice(&raw)?;
        Ok(envelope.data)
    }

    fn shape(&self, decoded: Value) -> Result<Outcome, HandlerError> {
        self.endpoint.shape(decoded)
    }

    /// Attach the family protocol and the metadata of the request made
    /// over it
    fn finalize(&self, ctx: &HandlerContext, mut outcome: Outcome) -> Result<Outcome, HandlerError> {
        let meta = ctx.protocol::<UrlProtocol>().and_then(UrlProtocol::last_meta);

        outcome.for_each_record_mut(|record| {
            if let Some(protocol) = ctx.shared_protocol() {
                record.attach_protocol(protocol);
            }
            if let Some(meta) = &meta {
                record.attach_meta(meta);
            }
        });
        Ok(outcome)
    }
}

#[async_trait]
impl Handler for CurseForgeHandler {
    fn key(&self) -> Option<EventKey> {
        Some(self.endpoint.key())
    }

    fn family(&self) -> &str {
        &self.settings.family
    }

    fn protocol_kind(&self) -> Option<&'static str> {
        Some(UrlProtocol::KIND)
    }

    fn make_protocol(&self) -> Result<Option<SharedProtocol>, ProtocolError> {
        let protocol = UrlProtocol::new(
            self.settings.base_url.as_str(),
            self.settings.extra.as_str(),
            &self.settings.http,
        )?;
        Ok(Some(Arc::new(protocol)))
    }

    fn on_start(&self, ctx: &HandlerContext) {
        let Some(protocol) = ctx.protocol::<UrlProtocol>() else {
            return;
        };

        protocol.set_header("Accept", "application/json");
        match &self.settings.auth {
            Auth::ApiKey(Some(key)) => protocol.set_header("x-api-key", key.as_str()),
            Auth::ApiKey(None) => debug!(key = %ctx.key(), "No CurseForge API key configured"),
            Auth::AppName(name) => protocol.set_header("user-agent", name.as_str()),
        }
    }

    async fn handle(&self, ctx: &HandlerContext, args: CallArgs) -> Result<Outcome, HandlerError> {
        run(self, ctx, &args).await
    }
}

/// One handler per built-in key, in key order
pub fn handler_map(settings: CurseForgeSettings) -> Vec<SharedHandler> {
    let settings = Arc::new(settings);

    Endpoint::ALL
        .iter()
        .map(|endpoint| {
            Arc::new(CurseForgeHandler::new(*endpoint, settings.clone())) as SharedHandler
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::{HandlerRegistry, WeakRegistry};
    use crate::proto::Protocol;
    use crate::records::SortField;
    use serde_json::json;

    fn handler(endpoint: Endpoint) -> CurseForgeHandler {
        CurseForgeHandler::new(endpoint, Arc::new(CurseForgeSettings::default()))
    }

    fn query_value<'a>(request: &'a Request, name: &str) -> Option<&'a str> {
        request
            .query
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    #[test]
    fn test_endpoints_follow_key_order() {
        for (index, endpoint) in Endpoint::ALL.iter().enumerate() {
            assert_eq!(endpoint.key(), EventKey(index as u32));
        }
    }

    #[test]
    fn test_simple_paths() {
        let args = CallArgs::new().arg(238222).arg(5101366);

        assert_eq!(Endpoint::ListGames.request(&args).unwrap().path, "games");
        assert_eq!(Endpoint::Game.request(&args).unwrap().path, "games/238222");
        assert_eq!(Endpoint::Addon.request(&args).unwrap().path, "mods/238222");
        assert_eq!(
            Endpoint::AddonDescription.request(&args).unwrap().path,
            "mods/238222/description"
        );
        assert_eq!(
            Endpoint::AddonFile.request(&args).unwrap().path,
            "mods/238222/files/5101366"
        );
        assert_eq!(
            Endpoint::FileDescription.request(&args).unwrap().path,
            "mods/238222/files/5101366/changelog"
        );
    }

    #[test]
    fn test_sub_category_query() {
        let request = Endpoint::SubCategory
            .request(&CallArgs::new().arg(432).arg(6))
            .unwrap();

        assert_eq!(request.path, "categories");
        assert_eq!(query_value(&request, "gameId"), Some("432"));
        assert_eq!(query_value(&request, "classId"), Some("6"));
    }

    #[test]
    fn test_search_fills_game_and_class() {
        let search = SearchParam::builder()
            .search_filter("jei")
            .sort_field(SortField::Popularity)
            .build();
        let args = CallArgs::new()
            .arg(432)
            .arg(6)
            .named_serialized(SEARCH_ARG, &search)
            .unwrap();

        let request = Endpoint::AddonSearch.request(&args).unwrap();

        assert_eq!(request.path, "mods/search");
        assert_eq!(query_value(&request, "gameId"), Some("432"));
        assert_eq!(query_value(&request, "classId"), Some("6"));
        assert_eq!(query_value(&request, "searchFilter"), Some("jei"));
        assert_eq!(query_value(&request, "sortField"), Some("2"));
    }

    #[test]
    fn test_missing_argument_is_rejected() {
        assert!(matches!(
            Endpoint::AddonFile.request(&CallArgs::new().arg(1)),
            Err(HandlerError::InvalidArguments(_))
        ));
    }

    #[tokio::test]
    async fn test_category_lookup_is_unsupported() {
        let ctx = HandlerContext::new(EventKey::CATEGORY, FAMILY, None, WeakRegistry::default());
        let result = handler(Endpoint::Category)
            .handle(&ctx, CallArgs::new().arg(6))
            .await;

        assert!(matches!(result, Err(HandlerError::Unsupported(_))));
    }

    #[test]
    fn test_decode_and_shape_addon_list() {
        let handler = handler(Endpoint::AddonSearch);
        let body = json!({
            "data": [
                {"id": 1, "gameId": 432, "name": "One", "slug": "one"},
                {"id": 2, "gameId": 432, "name": "Two", "slug": "two"}
            ],
            "pagination": {"index": 0, "pageSize": 20, "resultCount": 2, "totalCount": 2}
        });

        let decoded = handler
            .decode(Bytes::from(serde_json::to_vec(&body).unwrap()))
            .unwrap();
        let addons = handler.shape(decoded).unwrap().into_records::<Addon>().unwrap();

        assert_eq!(addons.len(), 2);
        assert_eq!(addons[1].slug, "two");
    }

    #[test]
    fn test_shape_description_from_string() {
        let outcome = Endpoint::FileDescription
            .shape(json!("<p>Fixed crash</p>"))
            .unwrap();

        let description = outcome.into_record::<Description>().unwrap().unwrap();
        assert_eq!(description.text, "<p>Fixed crash</p>");
    }

    #[test]
    fn test_decode_rejects_missing_envelope() {
        let handler = handler(Endpoint::Game);
        let result = handler.decode(Bytes::from_static(br#"{"id": 1}"#));

        assert!(matches!(result, Err(HandlerError::Decode(_))));
    }

    #[test]
    fn test_family_shares_one_protocol_with_headers() {
        let registry = HandlerRegistry::new();
        let settings = CurseForgeSettings {
            auth: Auth::ApiKey(Some("test-key".to_string())),
            ..CurseForgeSettings::default()
        };

        registry
            .register_batch([handler_map(settings)], Default::default())
            .unwrap();

        let shared = registry.protocol(FAMILY).unwrap();
        let protocol = shared.as_any().downcast_ref::<UrlProtocol>().unwrap();
        assert_eq!(protocol.header("x-api-key").as_deref(), Some("test-key"));
        assert_eq!(protocol.header("Accept").as_deref(), Some("application/json"));
        assert_eq!(
            protocol.url_build("games"),
            "https://api.curseforge.com/v1/games"
        );
        assert!(EventKey::BUILTIN.iter().all(|key| registry.has_handler(*key)));
    }
}
