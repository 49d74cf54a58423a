//! User registration.

use ota_state::{StateStore, User};
use tracing::info;

use crate::error::ReleaseResult;
use crate::token::{IDENTICAL_LEN, TokenGenerator};

/// Create a user with a fresh `identical` key suffix.
pub fn register_user(
    store: &StateStore,
    tokens: &dyn TokenGenerator,
    email: &str,
) -> ReleaseResult<User> {
    let identical = tokens.token(IDENTICAL_LEN)?;
    let user = store.create_user(email, &identical)?;
    info!(user_id = user.id, "user registered");
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::SequenceTokenGenerator;

    #[test]
    fn registered_user_gets_suffix() {
        let store = StateStore::open_in_memory().unwrap();
        let tokens = SequenceTokenGenerator::new(["abcdefghi"]);
        let user = register_user(&store, &tokens, "dev@example.com").unwrap();
        assert_eq!(user.identical, "abcdefghi");
        assert_eq!(store.get_user(user.id).unwrap(), Some(user));
    }
}
