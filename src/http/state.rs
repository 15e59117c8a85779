use std::sync::Arc;
use std::time::Duration;

use crate::accounts::AccountService;
use crate::auth::TokenIssuer;
use crate::content::{ContentService, ContentStore};
use crate::db::Database;
use crate::labels::{LabelRegistry, LabelRepository};
use crate::mail::OtpMailer;
use crate::preview::PreviewSource;
use crate::share::ShareLinks;
use crate::signup_cache::SignupCache;

/// Shared handler state. Cheap to clone: everything inside is reference-counted.
#[derive(Debug, Clone)]
pub struct AppState {
    pub accounts: AccountService,
    pub content: ContentService,
    pub shares: ShareLinks,
    pub tokens: Arc<TokenIssuer>,
}

/// External collaborators the state is assembled from.
pub struct StateDeps {
    pub db: Database,
    pub previews: Arc<dyn PreviewSource>,
    pub signup_cache: Arc<dyn SignupCache>,
    pub mailer: Arc<dyn OtpMailer>,
    pub tokens: Arc<TokenIssuer>,
    pub otp_ttl: Duration,
}

impl AppState {
    #[must_use]
    pub fn new(deps: StateDeps) -> Self {
        let labels: Arc<dyn LabelRepository> = Arc::new(LabelRegistry::new(deps.db.clone()));
        Self {
            accounts: AccountService::new(
                deps.db.clone(),
                deps.signup_cache,
                deps.mailer,
                Arc::clone(&deps.tokens),
                deps.otp_ttl,
            ),
            content: ContentService::new(
                ContentStore::new(deps.db.clone()),
                labels,
                deps.previews,
            ),
            shares: ShareLinks::new(deps.db),
            tokens: deps.tokens,
        }
    }
}
