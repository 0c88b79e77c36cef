//! Typed facade over a [`HandlerRegistry`]
//!
//! `CurseClient` turns each built-in event key into a method with typed
//! arguments and results. A key bound to the no-op handler yields `None` or
//! an empty list instead of an error.

use std::any::type_name;
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;

use crate::config::Config;
use crate::handlers::curseforge::{self, CurseForgeSettings, SEARCH_ARG};
use crate::handlers::{
    BatchOrder, CallArgs, EventKey, HandlerError, HandlerRegistry, Record, RegistryError,
};
use crate::proto::ProtocolError;
use crate::records::{Addon, AddonFile, Category, Description, Game, SearchParam};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("event {key} returned {found}, expected {expected}")]
    UnexpectedOutcome {
        key: EventKey,
        expected: &'static str,
        found: &'static str,
    },

    #[error("record is no longer attached to a registry")]
    Detached,

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("invalid call arguments: {0}")]
    Arguments(#[from] HandlerError),

    #[error("{what} has no download URL")]
    NoDownloadUrl { what: String },

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ClientError {
    /// Protocol failure behind this error, wherever it was raised
    pub fn protocol_error(&self) -> Option<&ProtocolError> {
        match self {
            ClientError::Protocol(e)
            | ClientError::Arguments(HandlerError::Protocol(e))
            | ClientError::Registry(RegistryError::Protocol(e))
            | ClientError::Registry(RegistryError::Handler {
                source: HandlerError::Protocol(e),
                ..
            }) => Some(e),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CurseClient {
    registry: HandlerRegistry,
}

impl CurseClient {
    /// Client with the CurseForge handlers loaded and the configured
    /// description formatter set as default
    pub fn new(config: &Config) -> Result<Self, ClientError> {
        let client = Self::bare();
        client
            .registry
            .set_default_formatter(Some(config.formatting.description.formatter()));
        client.load_default(config)?;
        Ok(client)
    }

    /// Client over an empty registry; every call yields nothing until
    /// handlers are registered
    pub fn bare() -> Self {
        Self::from_registry(HandlerRegistry::new())
    }

    pub fn from_registry(registry: HandlerRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Load the handler family of the configured backend for every
    /// built-in key
    pub fn load_default(&self, config: &Config) -> Result<usize, ClientError> {
        let handlers = curseforge::handler_map(CurseForgeSettings::from_config(config));
        let count = self
            .registry
            .register_batch([handlers], BatchOrder::FirstWins)?;

        debug!(count, "Default handlers loaded");
        Ok(count)
    }

    async fn one<T: Record>(&self, key: EventKey, args: CallArgs) -> Result<Option<T>, ClientError> {
        let outcome = self.registry.dispatch(key, args).await?;
        let found = outcome.kind();

        outcome
            .into_record::<T>()
            .map_err(|_| ClientError::UnexpectedOutcome {
                key,
                expected: type_name::<T>(),
                found,
            })
    }

    async fn many<T: Record>(&self, key: EventKey, args: CallArgs) -> Result<Vec<T>, ClientError> {
        let outcome = self.registry.dispatch(key, args).await?;
        let found = outcome.kind();

        outcome
            .into_records::<T>()
            .map_err(|_| ClientError::UnexpectedOutcome {
                key,
                expected: type_name::<Vec<T>>(),
                found,
            })
    }

    pub async fn games(&self) -> Result<Vec<Game>, ClientError> {
        self.many(EventKey::LIST_GAMES, CallArgs::new()).await
    }

    pub async fn game(&self, game_id: u32) -> Result<Option<Game>, ClientError> {
        self.one(EventKey::GAME, CallArgs::new().arg(game_id)).await
    }

    /// Every category of a game
    pub async fn categories(&self, game_id: u32) -> Result<Vec<Category>, ClientError> {
        self.many(EventKey::LIST_CATEGORY, CallArgs::new().arg(game_id))
            .await
    }

    pub async fn category(&self, category_id: u32) -> Result<Option<Category>, ClientError> {
        self.one(EventKey::CATEGORY, CallArgs::new().arg(category_id))
            .await
    }

    pub async fn sub_categories(
        &self,
        game_id: u32,
        category_id: u32,
    ) -> Result<Vec<Category>, ClientError> {
        self.many(
            EventKey::SUB_CATEGORY,
            CallArgs::new().arg(game_id).arg(category_id),
        )
        .await
    }

    pub async fn addon(&self, addon_id: u32) -> Result<Option<Addon>, ClientError> {
        self.one(EventKey::ADDON, CallArgs::new().arg(addon_id)).await
    }

    /// Search addons of a game under a root category
    pub async fn search(
        &self,
        game_id: u32,
        category_id: u32,
        param: SearchParam,
    ) -> Result<Vec<Addon>, ClientError> {
        let args = CallArgs::new()
            .arg(game_id)
            .arg(category_id)
            .named_serialized(SEARCH_ARG, &param)?;
        self.many(EventKey::ADDON_SEARCH, args).await
    }

    /// Pager over every result of a search, starting at `param`'s index
    pub fn search_pager(&self, game_id: u32, category_id: u32, param: SearchParam) -> SearchPager {
        SearchPager {
            client: self.clone(),
            game_id,
            category_id,
            param,
            done: false,
        }
    }

    pub async fn search_minecraft(
        &self,
        class: MinecraftClass,
        param: SearchParam,
    ) -> Result<Vec<Addon>, ClientError> {
        self.search(MINECRAFT_GAME_ID, class.id(), param).await
    }

    pub async fn addon_description(
        &self,
        addon_id: u32,
    ) -> Result<Option<Description>, ClientError> {
        self.one(EventKey::ADDON_DESC, CallArgs::new().arg(addon_id))
            .await
    }

    pub async fn addon_files(&self, addon_id: u32) -> Result<Vec<AddonFile>, ClientError> {
        self.addon_files_with(addon_id, SearchParam::default()).await
    }

    /// Files of an addon, filtered and paged by `param`
    pub async fn addon_files_with(
        &self,
        addon_id: u32,
        param: SearchParam,
    ) -> Result<Vec<AddonFile>, ClientError> {
        let args = CallArgs::new()
            .arg(addon_id)
            .named_serialized(SEARCH_ARG, &param)?;
        self.many(EventKey::ADDON_LIST_FILE, args).await
    }

    pub async fn addon_file(
        &self,
        addon_id: u32,
        file_id: u32,
    ) -> Result<Option<AddonFile>, ClientError> {
        self.one(EventKey::ADDON_FILE, CallArgs::new().arg(addon_id).arg(file_id))
            .await
    }

    /// Changelog of an addon file
    pub async fn file_description(
        &self,
        addon_id: u32,
        file_id: u32,
    ) -> Result<Option<Description>, ClientError> {
        self.one(
            EventKey::FILE_DESCRIPTION,
            CallArgs::new().arg(addon_id).arg(file_id),
        )
        .await
    }
}

/// Walks the pages of a search until one comes back empty
#[derive(Debug)]
pub struct SearchPager {
    client: CurseClient,
    game_id: u32,
    category_id: u32,
    param: SearchParam,
    done: bool,
}

impl SearchPager {
    /// Parameters the next page will be requested with
    pub fn param(&self) -> &SearchParam {
        &self.param
    }

    /// Next page of results, `None` once a page is empty or the index
    /// can no longer advance
    pub async fn next_page(&mut self) -> Result<Option<Vec<Addon>>, ClientError> {
        if self.done {
            return Ok(None);
        }

        let page = self
            .client
            .search(self.game_id, self.category_id, self.param.clone())
            .await?;

        if page.is_empty() {
            self.done = true;
            return Ok(None);
        }

        let index = self.param.index;
        self.param.bump_page(1);
        if self.param.index == index {
            // Zero page size or the last representable index
            self.done = true;
        }
        Ok(Some(page))
    }
}

pub const MINECRAFT_GAME_ID: u32 = 432;

/// Root categories of Minecraft addons
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MinecraftClass {
    Mods,
    Modpacks,
    ResourcePacks,
    Worlds,
}

impl MinecraftClass {
    pub fn id(&self) -> u32 {
        match self {
            MinecraftClass::Mods => 6,
            MinecraftClass::Modpacks => 4471,
            MinecraftClass::ResourcePacks => 12,
            MinecraftClass::Worlds => 17,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::{Handler, HandlerContext, Outcome};
    use async_trait::async_trait;
    use std::sync::Arc;

    /// Serves `total` addons in pages, honoring the search index
    struct PagedSearch {
        total: u32,
    }

    #[async_trait]
    impl Handler for PagedSearch {
        fn key(&self) -> Option<EventKey> {
            Some(EventKey::ADDON_SEARCH)
        }

        fn family(&self) -> &str {
            "paged"
        }

        async fn handle(&self, _ctx: &HandlerContext, args: CallArgs) -> Result<Outcome, HandlerError> {
            let param: SearchParam = args.get_named(SEARCH_ARG)?.unwrap_or_default();
            let game_id: u32 = args.get(0)?;
            let end = (param.index + param.page_size).min(self.total);

            Ok(Outcome::records((param.index..end).map(|id| {
                let mut addon = Addon::default();
                addon.id = id;
                addon.game_id = game_id;
                addon
            })))
        }
    }

    #[tokio::test]
    async fn test_bare_client_returns_nothing() {
        let client = CurseClient::bare();

        assert!(client.games().await.unwrap().is_empty());
        assert!(client.addon(1).await.unwrap().is_none());
        assert!(client.file_description(1, 2).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_wrong_record_type_is_reported() {
        let client = CurseClient::bare();
        client
            .registry()
            .register(Arc::new(PagedSearch { total: 3 }), Some(EventKey::GAME))
            .unwrap();

        let result = client.game(432).await;

        assert!(matches!(
            result,
            Err(ClientError::UnexpectedOutcome {
                key: EventKey::GAME,
                found: "records",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_pager_walks_until_empty_page() {
        let client = CurseClient::bare();
        client
            .registry()
            .register(Arc::new(PagedSearch { total: 5 }), None)
            .unwrap();

        let param = SearchParam::builder().page_size(2).build();
        let mut pager = client.search_pager(MINECRAFT_GAME_ID, MinecraftClass::Mods.id(), param);

        let mut ids = Vec::new();
        while let Some(page) = pager.next_page().await.unwrap() {
            ids.extend(page.iter().map(|addon| addon.id));
        }

        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
        assert_eq!(pager.param().index, 6);
        assert!(pager.next_page().await.unwrap().is_none());
    }

    /// Answers every search with the same single addon
    struct Endless;

    #[async_trait]
    impl Handler for Endless {
        fn family(&self) -> &str {
            "endless"
        }

        async fn handle(&self, _ctx: &HandlerContext, _args: CallArgs) -> Result<Outcome, HandlerError> {
            Ok(Outcome::records([Addon::default()]))
        }
    }

    #[tokio::test]
    async fn test_pager_stops_when_index_cannot_advance() {
        let client = CurseClient::bare();
        client
            .registry()
            .register(Arc::new(Endless), Some(EventKey::ADDON_SEARCH))
            .unwrap();

        let param = SearchParam::builder().page_size(0).build();
        let mut pager = client.search_pager(MINECRAFT_GAME_ID, MinecraftClass::Mods.id(), param);

        let mut pages = 0;
        while pager.next_page().await.unwrap().is_some() {
            pages += 1;
            assert!(pages < 10, "pager kept requesting index 0");
        }

        assert_eq!(pages, 1);
        assert_eq!(pager.param().index, 0);
    }

    #[tokio::test]
    async fn test_new_client_loads_curseforge_family() {
        let client = CurseClient::new(&Config::default()).unwrap();

        assert!(EventKey::BUILTIN.iter().all(|key| client.registry().has_handler(*key)));
        assert!(client.registry().protocol(curseforge::FAMILY).is_some());
        assert!(client.registry().default_formatter().is_some());
    }

    #[tokio::test]
    async fn test_category_lookup_fails_with_unsupported() {
        let client = CurseClient::new(&Config::default()).unwrap();

        let result = client.category(6).await;

        assert!(matches!(
            result,
            Err(ClientError::Registry(RegistryError::Handler {
                source: HandlerError::Unsupported(_),
                ..
            }))
        ));
    }
}
