// Notification model - transient, dismissible messages shown by the client (snackbar)

use serde::Serialize;

use super::theme::Theme;

/// Label of the default dismiss action
pub const DISMISS_ACTION: &str = "DISMISS";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub message: String,
    pub is_error: bool,
    pub action: &'static str,
    /// Colors to render with, when the server knows the client's theme
    #[serde(skip_serializing_if = "Option::is_none")]
    pub colors: Option<NotificationColors>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationColors {
    pub background: &'static str,
    pub text: &'static str,
    pub action_text: &'static str,
}

impl Notification {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            is_error: false,
            action: DISMISS_ACTION,
            colors: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            is_error: true,
            action: DISMISS_ACTION,
            colors: None,
        }
    }

    /// Attach colors from the given theme
    /// Errors use the error container, everything else the inverse surface
    pub fn styled(mut self, theme: &Theme) -> Self {
        self.colors = Some(if self.is_error {
            NotificationColors {
                background: theme.error_container,
                text: theme.on_error_container,
                action_text: theme.error,
            }
        } else {
            NotificationColors {
                background: theme.inverse_surface,
                text: theme.inverse_on_surface,
                action_text: theme.inverse_primary,
            }
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ColorScheme;

    #[test]
    fn test_styled_notification_uses_theme_roles() {
        let theme = ColorScheme::Light.theme();

        let info = Notification::info("Service added!").styled(&theme);
        let colors = info.colors.unwrap();
        assert_eq!(colors.background, theme.inverse_surface);
        assert_eq!(colors.action_text, theme.inverse_primary);

        let error = Notification::error("Please fill all fields!").styled(&theme);
        let colors = error.colors.unwrap();
        assert_eq!(colors.background, theme.error_container);
        assert_eq!(colors.text, theme.on_error_container);
    }

    #[test]
    fn test_unstyled_notification_omits_colors() {
        let json = serde_json::to_value(Notification::error("nope")).unwrap();
        assert_eq!(json["isError"], true);
        assert_eq!(json["action"], "DISMISS");
        assert!(json.get("colors").is_none());
    }
}
