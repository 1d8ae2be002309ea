//! Profile lookup across the system catalog and user storage.

use std::sync::Arc;

use chrono::Utc;
use ef_codec::{catalog, EncodingProfile};
use ef_core::{Error, ProfileId, Result};
use ef_db::{ProfileRepository, Store};

/// Resolves profiles from two providers.
///
/// System profiles come from [`ef_codec::catalog`] and can never be saved
/// over or deleted. User profiles live in the store. Lookups by
/// id or name try the system catalog first.
#[derive(Clone)]
pub struct ProfileRegistry {
    user: Arc<dyn Store>,
}

impl ProfileRegistry {
    pub fn new(user: Arc<dyn Store>) -> Self {
        Self { user }
    }

    pub async fn get(&self, id: ProfileId) -> Result<Option<EncodingProfile>> {
        if let Some(profile) = catalog::system_profile(id) {
            return Ok(Some(profile));
        }
        self.user.get_profile(id).await
    }

    /// Like [`get`](Self::get), but a missing profile is an error.
    pub async fn require(&self, id: ProfileId) -> Result<EncodingProfile> {
        self.get(id)
            .await?
            .ok_or_else(|| Error::not_found("profile", id))
    }

    pub async fn by_name(&self, name: &str) -> Result<Option<EncodingProfile>> {
        if let Some(profile) = catalog::system_profile_by_name(name) {
            return Ok(Some(profile));
        }
        self.user.find_profile_by_name(name).await
    }

    /// Accepts either a profile id or a (case-insensitive) name.
    pub async fn resolve(&self, id_or_name: &str) -> Result<EncodingProfile> {
        let found = match id_or_name.parse::<ProfileId>() {
            Ok(id) => self.get(id).await?,
            Err(_) => self.by_name(id_or_name).await?,
        };
        found.ok_or_else(|| Error::not_found("profile", id_or_name))
    }

    pub async fn exists(&self, id: ProfileId) -> Result<bool> {
        Ok(catalog::is_system_id(id) || self.user.profile_exists(id).await?)
    }

    /// System profiles first, in catalog order, then user profiles by name.
    pub async fn list(&self) -> Result<Vec<EncodingProfile>> {
        let mut profiles = catalog::system_profiles();
        profiles.extend(self.user.list_profiles().await?);
        Ok(profiles)
    }

    /// A user default wins over the system default.
    pub async fn default_profile(&self) -> Result<EncodingProfile> {
        if let Some(profile) = self.user.default_profile().await? {
            return Ok(profile);
        }
        catalog::system_profiles()
            .into_iter()
            .find(|p| p.is_default)
            .ok_or_else(|| Error::not_found("profile", "default"))
    }

    /// Validate and store a user profile, returning what was stored.
    pub async fn save(&self, mut profile: EncodingProfile) -> Result<EncodingProfile> {
        if profile.is_system || catalog::is_system_id(profile.id) {
            return Err(Error::Forbidden(format!(
                "system profile '{}' is read-only",
                profile.name
            )));
        }
        if catalog::system_profile_by_name(&profile.name).is_some() {
            return Err(Error::Conflict(format!(
                "'{}' is the name of a system profile",
                profile.name
            )));
        }
        profile.validate().into_result()?;

        if let Some(existing) = self.user.get_profile(profile.id).await? {
            profile.created_at = existing.created_at;
            profile.version = existing.version + 1;
        }
        profile.updated_at = Utc::now();
        self.user.save_profile(&profile).await?;
        tracing::info!(profile_id = %profile.id, name = %profile.name, "Saved profile");
        Ok(profile)
    }

    pub async fn delete(&self, id: ProfileId) -> Result<()> {
        if catalog::is_system_id(id) {
            return Err(Error::Forbidden(format!("system profile {id} is read-only")));
        }
        if !self.user.delete_profile(id).await? {
            return Err(Error::not_found("profile", id));
        }
        tracing::info!(profile_id = %id, "Deleted profile");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use ef_codec::{catalog::WEB_MP4, Container};
    use ef_db::MemoryStore;

    fn registry() -> ProfileRegistry {
        ProfileRegistry::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn system_profiles_resolve_by_id_and_name() {
        let reg = registry();
        assert_eq!(reg.require(WEB_MP4).await.unwrap().name, "web-mp4");
        assert_eq!(reg.resolve("Web-MP4").await.unwrap().id, WEB_MP4);
        assert_eq!(reg.resolve(&WEB_MP4.to_string()).await.unwrap().id, WEB_MP4);
        assert!(reg.exists(WEB_MP4).await.unwrap());
    }

    #[tokio::test]
    async fn unknown_profile_is_not_found() {
        let reg = registry();
        assert!(reg.require(ProfileId::new()).await.unwrap_err().is_not_found());
        assert!(reg.resolve("nope").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn system_profiles_are_read_only() {
        let reg = registry();
        let system = reg.require(WEB_MP4).await.unwrap();
        assert_matches!(reg.save(system).await, Err(Error::Forbidden(_)));
        assert_matches!(reg.delete(WEB_MP4).await, Err(Error::Forbidden(_)));

        let shadow = EncodingProfile::new("web-mp4", Container::Matroska);
        assert_matches!(reg.save(shadow).await, Err(Error::Conflict(_)));
    }

    #[tokio::test]
    async fn user_profiles_round_trip() {
        let reg = registry();
        let saved = reg
            .save(EncodingProfile::new("mine", Container::Matroska))
            .await
            .unwrap();
        assert_eq!(reg.resolve("MINE").await.unwrap().id, saved.id);

        let again = reg.save(saved.clone()).await.unwrap();
        assert_eq!(again.version, saved.version + 1);
        assert_eq!(again.created_at, saved.created_at);

        let all = reg.list().await.unwrap();
        assert_eq!(all.len(), catalog::system_profiles().len() + 1);
        assert_eq!(all.last().unwrap().name, "mine");

        reg.delete(saved.id).await.unwrap();
        assert!(reg.delete(saved.id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn invalid_profiles_are_rejected() {
        let reg = registry();
        let mut profile = EncodingProfile::new("broken", Container::Matroska);
        profile.thumbnails = Some(ef_codec::ThumbnailConfig {
            interval_secs: 0.0,
            ..Default::default()
        });
        assert_matches!(reg.save(profile).await, Err(Error::Validation(_)));
    }

    #[tokio::test]
    async fn user_default_overrides_system_default() {
        let reg = registry();
        assert_eq!(reg.default_profile().await.unwrap().id, catalog::HLS_ADAPTIVE);

        let mut mine = EncodingProfile::new("house", Container::Matroska);
        mine.is_default = true;
        let mine = reg.save(mine).await.unwrap();
        assert_eq!(reg.default_profile().await.unwrap().id, mine.id);
    }
}
