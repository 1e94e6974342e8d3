//! Settings service: read the server-side settings record and send per-field
//! patches to it.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::channel::{Method, RequestChannel};
use crate::errors::CoreError;
use crate::session::SessionLease;
use crate::types::{ApiData, Settings, SettingsBody, SettingsPatch};

pub const SETTINGS_PATH: &str = "api/settings";

pub struct SettingsService {
    channel: Arc<RequestChannel>,
}

impl SettingsService {
    pub fn new(channel: Arc<RequestChannel>) -> Self {
        Self { channel }
    }

    pub async fn get(&self, lease: &SessionLease) -> Result<Settings, CoreError> {
        let resp: ApiData<SettingsBody<Settings>> = self
            .channel
            .call_with::<(), _>(lease, SETTINGS_PATH, Method::Get, None)
            .await?;
        Ok(resp.data.settings)
    }

    /// Send `patch` as `{ "settings": patch }`.
    ///
    /// With `confirm`, returns the merged record: taken from the response when
    /// the server echoes it, otherwise from one follow-up `get`. Without
    /// `confirm`, returns `None` and ignores the response body.
    pub async fn update(
        &self,
        lease: &SessionLease,
        patch: &SettingsPatch,
        confirm: bool,
    ) -> Result<Option<Settings>, CoreError> {
        if patch.is_empty() {
            return Err(CoreError::Validation("settings patch is empty".to_string()));
        }
        debug!(keys = ?patch.keys(), confirm, "settings update");

        let body = SettingsBody { settings: patch };
        let resp: Value = self
            .channel
            .call_with(lease, SETTINGS_PATH, Method::Post, Some(&body))
            .await?;

        if !confirm {
            return Ok(None);
        }
        match settings_from_response(resp)? {
            Some(settings) => Ok(Some(settings)),
            None => {
                debug!("update response carried no settings; re-fetching");
                self.get(lease).await.map(Some)
            }
        }
    }
}

/// Pull a settings record out of an update response. Accepts
/// `{data:{settings}}` and `{settings}`; anything else is `None`.
fn settings_from_response(resp: Value) -> Result<Option<Settings>, CoreError> {
    let record = resp
        .get("data")
        .and_then(|d| d.get("settings"))
        .or_else(|| resp.get("settings"))
        .filter(|v| v.is_object())
        .cloned();

    record
        .map(|v| {
            serde_json::from_value(v).map_err(|e| CoreError::Protocol(format!("deserialize: {e}")))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::{MockMediaServer, TEST_TOKEN, TEST_URL};
    use crate::session::{Session, SessionStore};
    use serde_json::json;

    fn setup(server: MockMediaServer) -> (Arc<MockMediaServer>, SettingsService, SessionLease) {
        let store = Arc::new(SessionStore::with_session(Session::new(TEST_URL, TEST_TOKEN).unwrap()));
        let server = Arc::new(server);
        let channel = Arc::new(RequestChannel::new(store.clone(), server.clone()));
        let lease = store.capture().unwrap();
        (server, SettingsService::new(channel), lease)
    }

    #[tokio::test]
    async fn test_get_settings() {
        let (_, svc, lease) = setup(MockMediaServer::new(TEST_TOKEN));
        let s = svc.get(&lease).await.unwrap();
        assert_eq!(s, MockMediaServer::default_settings());
    }

    #[tokio::test]
    async fn test_update_then_get_changes_only_patched_field() {
        let (_, svc, lease) = setup(MockMediaServer::new(TEST_TOKEN));
        let before = svc.get(&lease).await.unwrap();

        let merged = svc
            .update(&lease, &SettingsPatch::allow_list(vec!["audio".into()]), true)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(merged.allow_list, vec!["audio"]);

        let after = svc.get(&lease).await.unwrap();
        assert_eq!(after.allow_list, vec!["audio"]);
        assert_eq!(Settings { allow_list: before.allow_list.clone(), ..after }, before);
    }

    #[tokio::test]
    async fn test_update_sends_only_changed_field() {
        let (server, svc, lease) = setup(MockMediaServer::new(TEST_TOKEN));
        svc.update(&lease, &SettingsPatch::allow_list(vec!["video".into()]), false)
            .await
            .unwrap();

        let bodies = server.received_bodies();
        assert_eq!(bodies, vec![json!({ "settings": { "allowList": ["video"] } })]);
    }

    #[tokio::test]
    async fn test_update_without_confirm_returns_none() {
        let (server, svc, lease) = setup(MockMediaServer::new(TEST_TOKEN));
        let out = svc
            .update(&lease, &SettingsPatch::allow_list(vec!["image".into()]), false)
            .await
            .unwrap();
        assert!(out.is_none());
        assert_eq!(server.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_confirm_falls_back_to_get() {
        let (server, svc, lease) = setup(MockMediaServer::new(TEST_TOKEN).without_update_echo());
        let merged = svc
            .update(&lease, &SettingsPatch::allow_list(vec!["image".into()]), true)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(merged.allow_list, vec!["image"]);
        assert_eq!(server.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_empty_patch_rejected() {
        let (server, svc, lease) = setup(MockMediaServer::new(TEST_TOKEN));
        let err = svc.update(&lease, &SettingsPatch::default(), true).await.unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
        assert!(server.requests().is_empty());
    }

    #[test]
    fn test_settings_from_response_shapes() {
        let s = settings_from_response(json!({ "data": { "settings": { "allowList": ["audio"] } } }))
            .unwrap()
            .unwrap();
        assert_eq!(s.allow_list, vec!["audio"]);

        let s = settings_from_response(json!({ "settings": { "videoExt": ["mkv"] } }))
            .unwrap()
            .unwrap();
        assert_eq!(s.video_ext, vec!["mkv"]);

        assert!(settings_from_response(json!({ "ok": true })).unwrap().is_none());
        assert!(settings_from_response(Value::Null).unwrap().is_none());
        assert!(settings_from_response(json!({ "settings": { "allowList": 3 } }))
            .unwrap_err()
            .is_protocol_error());
    }
}
