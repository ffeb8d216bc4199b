//! InMemoryUserDirectory - identity provider 管理 API の開発用実装

use crate::domain::ids::UserId;
use crate::ports::{IdentityError, NewDirectoryUser, UserAttributes, UserDirectory};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use ulid::Ulid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryUser {
    pub sub: UserId,
    pub email: String,
    pub password: Option<String>,
    pub attributes: UserAttributes,
}

#[derive(Default)]
struct State {
    /// email -> user
    users: BTreeMap<String, DirectoryUser>,
    calls: usize,
    fail_next: Option<IdentityError>,
}

#[derive(Clone, Default)]
pub struct InMemoryUserDirectory {
    state: Arc<Mutex<State>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// サインアップ済みのユーザーを登録する（テナント未所属）
    pub async fn seed_user(&self, sub: UserId, email: &str) {
        let user = DirectoryUser {
            sub,
            email: email.to_string(),
            password: None,
            attributes: UserAttributes::new(),
        };
        self.state
            .lock()
            .await
            .users
            .insert(email.to_string(), user);
    }

    pub async fn user(&self, email: &str) -> Option<DirectoryUser> {
        self.state.lock().await.users.get(email).cloned()
    }

    pub async fn user_count(&self) -> usize {
        self.state.lock().await.users.len()
    }

    /// 呼び出し回数（失敗した呼び出しも含む）
    pub async fn calls(&self) -> usize {
        self.state.lock().await.calls
    }

    pub async fn fail_next_call(&self, err: IdentityError) {
        self.state.lock().await.fail_next = Some(err);
    }
}

impl State {
    fn begin(&mut self) -> Result<(), IdentityError> {
        self.calls += 1;
        match self.fail_next.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn create_user(&self, user: NewDirectoryUser) -> Result<UserId, IdentityError> {
        let mut state = self.state.lock().await;
        state.begin()?;
        if state.users.contains_key(&user.email) {
            return Err(IdentityError::UserExists(user.email));
        }

        let sub = UserId::new(Ulid::new().to_string().to_lowercase())
            .map_err(|err| IdentityError::BadResponse(err.to_string()))?;
        state.users.insert(
            user.email.clone(),
            DirectoryUser {
                sub: sub.clone(),
                email: user.email,
                password: None,
                attributes: user.attributes,
            },
        );
        Ok(sub)
    }

    async fn set_password(&self, email: &str, password: &str) -> Result<(), IdentityError> {
        let mut state = self.state.lock().await;
        state.begin()?;
        let user = state
            .users
            .get_mut(email)
            .ok_or_else(|| IdentityError::UnknownUser(email.to_string()))?;
        user.password = Some(password.to_string());
        Ok(())
    }

    async fn update_attributes(
        &self,
        email: &str,
        attributes: UserAttributes,
    ) -> Result<(), IdentityError> {
        let mut state = self.state.lock().await;
        state.begin()?;
        let user = state
            .users
            .get_mut(email)
            .ok_or_else(|| IdentityError::UnknownUser(email.to_string()))?;
        user.attributes.extend(attributes);
        Ok(())
    }
}
