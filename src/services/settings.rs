use crate::{
    models::setting::THEME_SETTING,
    repositories::SettingRepository,
    services::{Notice, PageError},
    state::{AppState, StateAction, Theme},
    storage::RecordStore,
};

/// Loads and changes the signed-in user's settings, keeping `AppState` in step.
pub struct SettingsService<S> {
    store: S,
}

impl<S: RecordStore> SettingsService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Loads the user's settings into `state` and applies the stored theme.
    pub fn load(&self, state: &mut AppState, user_id: &str) -> Result<(), PageError> {
        state.apply(StateAction::SetSettingsLoading(true));

        match SettingRepository::new(&self.store).get_all(Some(user_id)) {
            Ok(settings) => {
                state.apply(StateAction::SetSettings(settings));
                if let Some(theme) = state.stored_theme() {
                    state.apply(StateAction::SetTheme(theme));
                }
                Ok(())
            }
            Err(e) => {
                tracing::error!(user_id, error = %e, "failed to load settings");
                state.apply(StateAction::SetSettingsLoading(false));
                Err(PageError {
                    message: format!("Failed to load settings: {}", e),
                })
            }
        }
    }

    /// Stores `theme` for the user; the state only changes once the store accepted it.
    pub fn set_theme(&self, state: &mut AppState, user_id: &str, theme: Theme) -> Notice {
        let repository = SettingRepository::new(&self.store);
        match repository.upsert_user_setting(user_id, THEME_SETTING, theme.as_str()) {
            Ok(setting) => {
                state.apply(StateAction::UpdateSetting(setting));
                state.apply(StateAction::SetTheme(theme));
                Notice::success(format!("Switched to {} theme", theme))
            }
            Err(e) => {
                tracing::warn!(user_id, error = %e, "failed to store theme");
                Notice::error(format!("Failed to update theme: {}", e))
            }
        }
    }
}
