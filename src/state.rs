use std::{fmt, str::FromStr};

use thiserror::Error;

use crate::models::setting::{Setting, THEME_SETTING};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    pub fn toggled(&self) -> Theme {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unrecognized theme '{0}', expected light or dark")]
pub struct UnknownTheme(pub String);

impl FromStr for Theme {
    type Err = UnknownTheme;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            _ => Err(UnknownTheme(s.to_string())),
        }
    }
}

pub enum StateAction {
    SetUser(User),
    ClearUser,
    SetSettings(Vec<Setting>),
    /// Replaces the setting with the same name, or appends it
    UpdateSetting(Setting),
    SetTheme(Theme),
    SetSettingsLoading(bool),
}

/// Session-wide state: who is signed in and their preferences.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppState {
    pub user: Option<User>,
    pub settings: Vec<Setting>,
    pub theme: Theme,
    pub settings_loading: bool,
}

impl AppState {
    /// Signed-out state with default preferences.
    pub fn init() -> Self {
        Self::default()
    }

    /// Drops everything tied to the signed-in user.
    pub fn reset(&mut self) {
        *self = Self::init();
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    pub fn setting(&self, name: &str) -> Option<&Setting> {
        self.settings.iter().find(|setting| setting.name == name)
    }

    pub fn apply(&mut self, action: StateAction) {
        match action {
            StateAction::SetUser(user) => {
                tracing::debug!(user_id = %user.id, "user signed in");
                self.user = Some(user);
            }
            StateAction::ClearUser => self.reset(),
            StateAction::SetSettings(settings) => {
                self.settings = settings;
                self.settings_loading = false;
            }
            StateAction::UpdateSetting(setting) => {
                match self.settings.iter_mut().find(|s| s.name == setting.name) {
                    Some(existing) => *existing = setting,
                    None => self.settings.push(setting),
                }
            }
            StateAction::SetTheme(theme) => self.theme = theme,
            StateAction::SetSettingsLoading(loading) => self.settings_loading = loading,
        }
    }

    /// Theme stored in the user's settings, if any.
    pub fn stored_theme(&self) -> Option<Theme> {
        let setting = self.setting(THEME_SETTING)?;
        match setting.value.parse() {
            Ok(theme) => Some(theme),
            Err(e) => {
                tracing::warn!(error = %e, "ignoring stored theme");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn theme_setting(value: &str) -> Setting {
        Setting {
            id: 1,
            user_id: "u1".to_string(),
            name: THEME_SETTING.to_string(),
            value: value.to_string(),
            mode: "Light".to_string(),
        }
    }

    #[test]
    fn test_reset_returns_to_initial_state() {
        let mut state = AppState::init();
        state.apply(StateAction::SetUser(User {
            id: "u1".to_string(),
            name: Some("Ana".to_string()),
            email: None,
        }));
        state.apply(StateAction::SetTheme(Theme::Dark));
        assert!(state.is_authenticated());

        state.apply(StateAction::ClearUser);

        assert_eq!(state, AppState::init());
    }

    #[test]
    fn test_update_setting_replaces_by_name() {
        let mut state = AppState::init();
        state.apply(StateAction::SetSettingsLoading(true));
        state.apply(StateAction::SetSettings(vec![theme_setting("light")]));
        assert!(!state.settings_loading);

        state.apply(StateAction::UpdateSetting(theme_setting("dark")));

        assert_eq!(state.settings.len(), 1);
        assert_eq!(state.stored_theme(), Some(Theme::Dark));
    }

    #[test]
    fn test_unknown_stored_theme_is_ignored() {
        let mut state = AppState::init();
        state.apply(StateAction::SetSettings(vec![theme_setting("sepia")]));

        assert_eq!(state.stored_theme(), None);
        assert_eq!(Theme::Light.toggled(), Theme::Dark);
    }
}
