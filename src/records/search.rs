use serde::{Deserialize, Serialize};

/// How search results are sorted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum SortField {
    Featured = 1,
    Popularity = 2,
    LastUpdated = 3,
    Name = 4,
    Author = 5,
    TotalDownloads = 6,
    Category = 7,
    GameVersion = 8,
}

impl From<SortField> for u8 {
    fn from(field: SortField) -> Self {
        field as u8
    }
}

impl TryFrom<u8> for SortField {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            1 => SortField::Featured,
            2 => SortField::Popularity,
            3 => SortField::LastUpdated,
            4 => SortField::Name,
            5 => SortField::Author,
            6 => SortField::TotalDownloads,
            7 => SortField::Category,
            8 => SortField::GameVersion,
            other => return Err(format!("unknown sort field {other}")),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

/// Parameters for addon searches and file listings
///
/// Handlers are free to ignore any of them. Only fields that are set end
/// up in the query string; `index` and `page_size` are always sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, bon::Builder)]
#[serde(rename_all = "camelCase")]
pub struct SearchParam {
    pub game_id: Option<u32>,
    /// Root category (CurseForge "class"), e.g. mods or modpacks
    pub class_id: Option<u32>,
    pub category_id: Option<u32>,
    #[builder(into)]
    pub game_version: Option<String>,
    /// Free text, like a search bar
    #[builder(into)]
    pub search_filter: Option<String>,
    pub sort_field: Option<SortField>,
    pub sort_order: Option<SortOrder>,
    pub mod_loader_type: Option<u32>,
    pub game_version_type_id: Option<u32>,
    #[builder(into)]
    pub slug: Option<String>,
    /// Index of the first result
    #[builder(default)]
    #[serde(default)]
    pub index: u32,
    #[builder(default = DEFAULT_PAGE_SIZE)]
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

pub const DEFAULT_PAGE_SIZE: u32 = 20;

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

impl Default for SearchParam {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl SearchParam {
    /// Jump to page `page`: `index = page * page_size`
    pub fn set_page(&mut self, page: u32) {
        self.index = page.saturating_mul(self.page_size);
    }

    /// Move `pages` pages forward (or back when negative), never below 0
    pub fn bump_page(&mut self, pages: i64) {
        let index = pages
            .saturating_mul(i64::from(self.page_size))
            .saturating_add(i64::from(self.index));
        self.index = u32::try_from(index.max(0)).unwrap_or(u32::MAX);
    }

    /// Query string pairs using CurseForge parameter names
    pub fn to_query(&self) -> Vec<(String, String)> {
        let mut query = Vec::new();
        let mut push = |name: &str, value: Option<String>| {
            if let Some(value) = value {
                query.push((name.to_string(), value));
            }
        };

        push("gameId", self.game_id.map(|v| v.to_string()));
        push("classId", self.class_id.map(|v| v.to_string()));
        push("categoryId", self.category_id.map(|v| v.to_string()));
        push("gameVersion", self.game_version.clone());
        push("searchFilter", self.search_filter.clone());
        push("sortField", self.sort_field.map(|f| u8::from(f).to_string()));
        push("sortOrder", self.sort_order.map(|o| o.as_str().to_string()));
        push("modLoaderType", self.mod_loader_type.map(|v| v.to_string()));
        push(
            "gameVersionTypeId",
            self.game_version_type_id.map(|v| v.to_string()),
        );
        push("slug", self.slug.clone());
        push("index", Some(self.index.to_string()));
        push("pageSize", Some(self.page_size.to_string()));

        query
    }
}
