use crate::models::UserProfile;

/// Identity context for one signed-in user, constructed at login and dropped
/// at logout. Components receive it explicitly instead of reading a global.
#[derive(Debug, Clone)]
pub struct Session {
    profile: UserProfile,
}

impl Session {
    pub fn new(profile: UserProfile) -> Self {
        Self { profile }
    }

    pub fn user_id(&self) -> &str {
        &self.profile.id
    }

    pub fn profile(&self) -> &UserProfile {
        &self.profile
    }
}
