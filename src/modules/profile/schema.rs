use serde::{Deserialize, Serialize};

use crate::modules::auth::model::User;
use crate::modules::auth::schema::UserView;

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateNotificationsRequest {
    pub notify_email: bool,
    pub notify_sms: bool,
    pub notify_marketing: bool,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct DeleteAccountRequest {
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct NotificationPreferences {
    pub notify_email: bool,
    pub notify_sms: bool,
    pub notify_marketing: bool,
}

#[derive(Debug, Serialize)]
pub struct ProfileView {
    #[serde(flatten)]
    pub user: UserView,
    /// False for OAuth-only accounts; tells the client whether password
    /// fields apply.
    pub has_password: bool,
    pub notifications: NotificationPreferences,
}

impl From<&User> for ProfileView {
    fn from(user: &User) -> Self {
        Self {
            user: UserView::from(user),
            has_password: user.has_password(),
            notifications: NotificationPreferences {
                notify_email: user.notify_email,
                notify_sms: user.notify_sms,
                notify_marketing: user.notify_marketing,
            },
        }
    }
}
