//! Handlers for the third-party curse.tools mirror of the CurseForge API
//!
//! The mirror serves the same endpoints and payloads under
//! `https://api.curse.tools/v1/cf/`, so the family reuses
//! [`CurseForgeHandler`](super::curseforge::CurseForgeHandler) with its own
//! settings. It needs no API key; clients name themselves in the
//! `user-agent` header instead.

use super::curseforge::{self, Auth, CurseForgeSettings};
use super::traits::SharedHandler;
use crate::config::HttpConfig;

pub const FAMILY: &str = "cursetools";

pub const HOST: &str = "https://api.curse.tools/";

/// Path between the host and every endpoint
pub const EXTRA: &str = "v1/cf/";

pub const DEFAULT_APP_NAME: &str = "cursekit";

/// Settings for the mirror, identifying as `app_name`
pub fn settings(app_name: impl Into<String>, http: HttpConfig) -> CurseForgeSettings {
    CurseForgeSettings {
        family: FAMILY.to_string(),
        base_url: HOST.to_string(),
        extra: EXTRA.to_string(),
        auth: Auth::AppName(app_name.into()),
        http,
    }
}

/// One handler per built-in key, in key order
pub fn handler_map(app_name: impl Into<String>) -> Vec<SharedHandler> {
    curseforge::handler_map(settings(app_name, HttpConfig::default()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Backend, Config};
    use crate::handlers::{EventKey, HandlerRegistry};
    use crate::proto::{Protocol, UrlProtocol};

    #[test]
    fn test_map_covers_builtin_keys_in_own_family() {
        let handlers = handler_map(DEFAULT_APP_NAME);

        assert_eq!(handlers.len(), EventKey::BUILTIN.len());
        assert!(handlers.iter().all(|handler| handler.family() == FAMILY));
    }

    #[test]
    fn test_protocol_names_the_app() {
        let registry = HandlerRegistry::new();
        registry
            .register_batch([handler_map("modpack-builder")], Default::default())
            .unwrap();

        let shared = registry.protocol(FAMILY).unwrap();
        let protocol = shared.as_any().downcast_ref::<UrlProtocol>().unwrap();

        assert_eq!(protocol.header("user-agent").as_deref(), Some("modpack-builder"));
        assert_eq!(protocol.header("x-api-key"), None);
        assert_eq!(
            protocol.url_build("mods/238222"),
            "https://api.curse.tools/v1/cf/mods/238222"
        );
    }

    #[test]
    fn test_selected_by_config() {
        let mut config = Config::default();
        config.api.backend = Backend::CurseTools;
        config.api.app_name = "launcher".to_string();
        config.api.api_key = Some("unused".to_string());

        let settings = CurseForgeSettings::from_config(&config);

        assert_eq!(settings.family, FAMILY);
        assert_eq!(settings.base_url, HOST);
        assert_eq!(settings.auth, Auth::AppName("launcher".to_string()));
    }
}
