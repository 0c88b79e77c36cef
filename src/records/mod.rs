//! Records returned by the CurseForge handlers
//!
//! Records are passive data holders. When a dispatch returns one, the
//! registry attaches a weak back-reference to itself so that the record can
//! make follow-up calls (an addon's files, a file's changelog, ...). These
//! calls fail with [`ClientError::Detached`] once the registry is gone.
//!
//! Files and attachments also keep the protocol of the family that produced
//! them and download over it.

mod download;
mod search;

pub use search::{DEFAULT_PAGE_SIZE, SearchParam, SortField, SortOrder};

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::client::{ClientError, CurseClient};
use crate::formatters::SharedFormatter;
use crate::handlers::{Record, WeakRegistry};
use crate::proto::{ResponseMeta, SharedProtocol};

fn client(registry: &WeakRegistry) -> Result<CurseClient, ClientError> {
    registry
        .upgrade()
        .map(CurseClient::from_registry)
        .ok_or(ClientError::Detached)
}

macro_rules! impl_record {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl Record for $ty {
                fn attach_registry(&mut self, registry: WeakRegistry) {
                    self.registry = registry;
                }

                fn attach_meta(&mut self, meta: &ResponseMeta) {
                    self.meta = Some(meta.clone());
                }
            }
        )+
    };
}

impl_record!(Game, Category);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Game {
    pub id: u32,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub date_modified: Option<String>,
    #[serde(default)]
    pub assets: GameAssets,
    #[serde(skip_deserializing)]
    pub meta: Option<ResponseMeta>,
    #[serde(skip)]
    registry: WeakRegistry,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameAssets {
    pub icon_url: Option<String>,
    pub tile_url: Option<String>,
    pub cover_url: Option<String>,
}

impl Game {
    /// Every category of this game
    pub async fn categories(&self) -> Result<Vec<Category>, ClientError> {
        client(&self.registry)?.categories(self.id).await
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: u32,
    pub game_id: u32,
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub icon_url: Option<String>,
    /// Root category this one belongs to
    #[serde(default)]
    pub class_id: Option<u32>,
    #[serde(default)]
    pub parent_category_id: Option<u32>,
    #[serde(default)]
    pub is_class: Option<bool>,
    #[serde(skip_deserializing)]
    pub meta: Option<ResponseMeta>,
    #[serde(skip)]
    registry: WeakRegistry,
}

impl Category {
    pub async fn sub_categories(&self) -> Result<Vec<Category>, ClientError> {
        client(&self.registry)?
            .sub_categories(self.game_id, self.id)
            .await
    }

    /// Parent category, looked up by id
    ///
    /// Neither CurseForge nor curse.tools can look up a single category, so
    /// with the shipped handler families this fails with
    /// [`HandlerError::Unsupported`](crate::handlers::HandlerError::Unsupported)
    /// whenever a parent exists.
    pub async fn parent(&self) -> Result<Option<Category>, ClientError> {
        match self.parent_category_id {
            Some(parent) if parent != self.id => client(&self.registry)?.category(parent).await,
            _ => Ok(None),
        }
    }

    /// Search addons in this category
    pub async fn search(&self, param: SearchParam) -> Result<Vec<Addon>, ClientError> {
        client(&self.registry)?
            .search(self.game_id, self.id, param)
            .await
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
}

/// Image shown on an addon page: its logo or a screenshot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub id: i64,
    #[serde(default)]
    pub mod_id: Option<u32>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    pub url: String,
    #[serde(skip)]
    protocol: Option<SharedProtocol>,
}

impl Attachment {
    /// Fetch the full-size image
    pub async fn download(&self) -> Result<Bytes, ClientError> {
        download::fetch(self.protocol.as_ref(), &self.url).await
    }

    /// Save the full-size image to `path`; a directory receives the remote
    /// file name
    pub async fn download_to(&self, path: impl AsRef<Path>) -> Result<u64, ClientError> {
        let data = self.download().await?;
        let path = download::target(path.as_ref(), download::file_name(&self.url)).await;
        download::write(&path, &data, false).await
    }

    pub async fn download_thumbnail(&self) -> Result<Bytes, ClientError> {
        download::fetch(self.protocol.as_ref(), self.thumbnail_url()?).await
    }

    pub async fn download_thumbnail_to(&self, path: impl AsRef<Path>) -> Result<u64, ClientError> {
        let url = self.thumbnail_url()?;
        let data = download::fetch(self.protocol.as_ref(), url).await?;
        let path = download::target(path.as_ref(), download::file_name(url)).await;
        download::write(&path, &data, false).await
    }

    fn thumbnail_url(&self) -> Result<&str, ClientError> {
        self.thumbnail_url
            .as_deref()
            .ok_or_else(|| ClientError::NoDownloadUrl {
                what: format!("thumbnail of attachment {}", self.id),
            })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Addon {
    pub id: u32,
    pub game_id: u32,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub download_count: f64,
    #[serde(default)]
    pub class_id: Option<u32>,
    #[serde(default)]
    pub primary_category_id: Option<u32>,
    #[serde(default)]
    pub authors: Vec<Author>,
    #[serde(default)]
    pub main_file_id: Option<u32>,
    #[serde(default)]
    pub date_created: Option<String>,
    #[serde(default)]
    pub date_modified: Option<String>,
    #[serde(default)]
    pub date_released: Option<String>,
    #[serde(default)]
    pub allow_mod_distribution: Option<bool>,
    #[serde(default)]
    pub logo: Option<Attachment>,
    #[serde(default)]
    pub screenshots: Vec<Attachment>,
    #[serde(skip_deserializing)]
    pub meta: Option<ResponseMeta>,
    #[serde(skip)]
    registry: WeakRegistry,
}

impl Record for Addon {
    fn attach_registry(&mut self, registry: WeakRegistry) {
        self.registry = registry;
    }

    fn attach_meta(&mut self, meta: &ResponseMeta) {
        self.meta = Some(meta.clone());
    }

    fn attach_protocol(&mut self, protocol: &SharedProtocol) {
        for attachment in self.logo.iter_mut().chain(self.screenshots.iter_mut()) {
            attachment.protocol = Some(protocol.clone());
        }
    }
}

impl Addon {
    /// Logo first, then screenshots
    pub fn attachments(&self) -> impl Iterator<Item = &Attachment> {
        self.logo.iter().chain(&self.screenshots)
    }

    pub async fn description(&self) -> Result<Option<Description>, ClientError> {
        client(&self.registry)?.addon_description(self.id).await
    }

    pub async fn files(&self) -> Result<Vec<AddonFile>, ClientError> {
        client(&self.registry)?.addon_files(self.id).await
    }

    pub async fn file(&self, file_id: u32) -> Result<Option<AddonFile>, ClientError> {
        client(&self.registry)?.addon_file(self.id, file_id).await
    }

    pub async fn game(&self) -> Result<Option<Game>, ClientError> {
        client(&self.registry)?.game(self.game_id).await
    }

    /// Primary category, looked up by id
    ///
    /// Neither CurseForge nor curse.tools can look up a single category, so
    /// with the shipped handler families this fails with
    /// [`HandlerError::Unsupported`](crate::handlers::HandlerError::Unsupported).
    /// List the game's categories and match on
    /// [`primary_category_id`](Self::primary_category_id) instead.
    pub async fn category(&self) -> Result<Option<Category>, ClientError> {
        match self.primary_category_id {
            Some(category) => client(&self.registry)?.category(category).await,
            None => Ok(None),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dependency {
    pub mod_id: u32,
    pub relation_type: u32,
}

impl Dependency {
    /// CurseForge relation type for a required dependency
    pub const REQUIRED: u32 = 3;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileHash {
    pub value: String,
    pub algo: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddonFile {
    pub id: u32,
    /// Addon this file belongs to
    pub mod_id: u32,
    #[serde(default)]
    pub game_id: Option<u32>,
    pub display_name: String,
    pub file_name: String,
    #[serde(default)]
    pub file_date: Option<String>,
    #[serde(default)]
    pub file_length: u64,
    #[serde(default)]
    pub download_url: Option<String>,
    #[serde(default)]
    pub download_count: u64,
    #[serde(default)]
    pub release_type: Option<u32>,
    #[serde(default)]
    pub is_available: Option<bool>,
    #[serde(default)]
    pub game_versions: Vec<String>,
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
    #[serde(default)]
    pub hashes: Vec<FileHash>,
    #[serde(skip_deserializing)]
    pub meta: Option<ResponseMeta>,
    #[serde(skip)]
    registry: WeakRegistry,
    #[serde(skip)]
    protocol: Option<SharedProtocol>,
}

impl Record for AddonFile {
    fn attach_registry(&mut self, registry: WeakRegistry) {
        self.registry = registry;
    }

    fn attach_meta(&mut self, meta: &ResponseMeta) {
        self.meta = Some(meta.clone());
    }

    fn attach_protocol(&mut self, protocol: &SharedProtocol) {
        self.protocol = Some(protocol.clone());
    }
}

impl AddonFile {
    pub async fn changelog(&self) -> Result<Option<Description>, ClientError> {
        client(&self.registry)?
            .file_description(self.mod_id, self.id)
            .await
    }

    pub async fn addon(&self) -> Result<Option<Addon>, ClientError> {
        client(&self.registry)?.addon(self.mod_id).await
    }

    /// Fetch the file contents
    ///
    /// Fails with [`ClientError::NoDownloadUrl`] when the author disabled
    /// third-party distribution and the API withheld the URL.
    pub async fn download(&self) -> Result<Bytes, ClientError> {
        download::fetch(self.protocol.as_ref(), self.download_url()?).await
    }

    /// Save the file to `path`; a directory receives [`file_name`](Self::file_name)
    pub async fn download_to(&self, path: impl AsRef<Path>) -> Result<u64, ClientError> {
        let data = self.download().await?;
        let path = download::target(path.as_ref(), &self.file_name).await;
        download::write(&path, &data, false).await
    }

    fn download_url(&self) -> Result<&str, ClientError> {
        self.download_url
            .as_deref()
            .ok_or_else(|| ClientError::NoDownloadUrl {
                what: format!("file {} of addon {}", self.id, self.mod_id),
            })
    }

    /// Fetch every addon this file depends on, one request each
    pub async fn dependencies(&self) -> Result<Vec<Addon>, ClientError> {
        let client = client(&self.registry)?;
        let mut addons = Vec::with_capacity(self.dependencies.len());

        for dependency in &self.dependencies {
            if let Some(addon) = client.addon(dependency.mod_id).await? {
                addons.push(addon);
            }
        }

        Ok(addons)
    }
}

/// HTML description of an addon, or changelog of a file
#[derive(Debug, Clone, Default, Serialize)]
pub struct Description {
    pub text: String,
    #[serde(skip)]
    formatter: Option<SharedFormatter>,
    pub meta: Option<ResponseMeta>,
}

impl Description {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn formatter(&self) -> Option<&SharedFormatter> {
        self.formatter.as_ref()
    }

    /// Text run through the attached formatter, raw text without one
    pub fn format(&self) -> String {
        match &self.formatter {
            Some(formatter) => formatter.format(&self.text),
            None => self.text.clone(),
        }
    }

    /// Write the raw text to `path`, replacing it or appending to it;
    /// the attached formatter is not applied
    pub async fn write(&self, path: impl AsRef<Path>, append: bool) -> Result<u64, ClientError> {
        download::write(path.as_ref(), self.text.as_bytes(), append).await
    }
}

impl fmt::Display for Description {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format())
    }
}

impl Record for Description {
    fn attach_formatter(&mut self, formatter: SharedFormatter) {
        self.formatter = Some(formatter);
    }

    fn attach_meta(&mut self, meta: &ResponseMeta) {
        self.meta = Some(meta.clone());
    }
}
