use crate::auth::{hash_password, verify_password, AuthUser, TokenService};
use crate::error::{AppError, Result};
use crate::models::{
    is_strong_password, LoginRequest, RegisterRequest, User, UserResponse, UserUpdate,
};
use crate::search::Pagination;
use crate::state::UserStore;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

const WEAK_PASSWORD: &str = "Password must be at least 8 characters long and include uppercase, lowercase, a number, and a special character.";
const BAD_CREDENTIALS: &str = "Invalid username or password";

/// Successful login
#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub message: String,
    pub token: String,
}

/// One page of users
#[derive(Debug, Clone, Serialize)]
pub struct UserPage {
    pub users: Vec<UserResponse>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
}

/// Account registration, login and profile management
pub struct UserService {
    store: Arc<dyn UserStore>,
    tokens: Arc<TokenService>,
    bcrypt_cost: u32,
}

impl UserService {
    pub fn new(store: Arc<dyn UserStore>, tokens: Arc<TokenService>, bcrypt_cost: u32) -> Self {
        Self {
            store,
            tokens,
            bcrypt_cost,
        }
    }

    pub async fn register(&self, request: RegisterRequest) -> Result<UserResponse> {
        let request = RegisterRequest {
            username: request.username.trim().to_string(),
            email: request.email.trim().to_string(),
            password: request.password,
        };
        request.validate()?;

        if !is_strong_password(&request.password) {
            return Err(AppError::Validation(WEAK_PASSWORD.to_string()));
        }

        if self.store.find_user_by_email(&request.email).await?.is_some() {
            return Err(AppError::Conflict("User already exists".to_string()));
        }
        if self
            .store
            .find_user_by_username(&request.username)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict("Username already taken".to_string()));
        }

        let password_hash = hash_password(request.password, self.bcrypt_cost).await?;
        let user = User::new(request.username, request.email, password_hash);
        self.store.insert_user(&user).await?;

        tracing::info!(user_id = %user.id, username = %user.username, "User registered");

        Ok(user.into())
    }

    pub async fn login(&self, request: LoginRequest) -> Result<LoginResponse> {
        let username = request.username.trim();

        let Some(user) = self.store.find_user_by_username(username).await? else {
            tracing::warn!(username = %username, "Login for unknown user");
            return Err(AppError::Authentication(BAD_CREDENTIALS.to_string()));
        };

        if !verify_password(request.password, user.password_hash.clone()).await? {
            tracing::warn!(user_id = %user.id, "Login with wrong password");
            return Err(AppError::Authentication(BAD_CREDENTIALS.to_string()));
        }

        if !user.is_active {
            tracing::warn!(user_id = %user.id, "Login for deactivated user");
            return Err(AppError::Authentication(BAD_CREDENTIALS.to_string()));
        }

        let now = Utc::now();
        self.store
            .modify_user(&user.id, &mut |user| {
                user.last_login = Some(now);
                Ok(())
            })
            .await?;

        let token = self.tokens.issue(user.id)?;
        tracing::info!(user_id = %user.id, "User logged in");

        Ok(LoginResponse {
            message: "Logged in successfully".to_string(),
            token,
        })
    }

    /// Active users, oldest first
    pub async fn list_users(&self, pagination: Pagination) -> Result<UserPage> {
        let users = self
            .store
            .list_users(true, pagination.skip, pagination.limit)
            .await?;
        let total = self.store.count_users(true).await?;

        Ok(UserPage {
            users: users.into_iter().map(UserResponse::from).collect(),
            total,
            page: pagination.page,
            limit: pagination.limit,
        })
    }

    pub async fn get_user(&self, id: &Uuid) -> Result<UserResponse> {
        self.load(id).await.map(UserResponse::from)
    }

    pub async fn update_user(
        &self,
        id: &Uuid,
        update: UserUpdate,
        actor: AuthUser,
    ) -> Result<UserResponse> {
        self.authorize(id, actor).await?;

        let update = UserUpdate {
            username: update.username.map(|u| u.trim().to_string()),
            email: update.email.map(|e| e.trim().to_string()),
            full_name: update.full_name.map(|n| n.trim().to_string()),
            avatar_url: update.avatar_url.map(|a| a.trim().to_string()),
        };
        update.validate()?;

        let user = self
            .store
            .modify_user(id, &mut |user| {
                if let Some(username) = &update.username {
                    user.username = username.clone();
                }
                if let Some(email) = &update.email {
                    user.email = email.clone();
                }
                if let Some(full_name) = &update.full_name {
                    user.profile.full_name = full_name.clone();
                }
                if let Some(avatar_url) = &update.avatar_url {
                    user.profile.avatar_url = avatar_url.clone();
                }
                user.updated_at = Utc::now();
                Ok(())
            })
            .await?;
        tracing::info!(user_id = %id, updated_by = %actor.id, "User updated");

        Ok(user.into())
    }

    /// Soft delete
    pub async fn deactivate_user(&self, id: &Uuid, actor: AuthUser) -> Result<UserResponse> {
        self.authorize(id, actor).await?;

        let user = self
            .store
            .modify_user(id, &mut |user| {
                if !user.is_active {
                    return Err(AppError::Validation("User is already deactivated".to_string()));
                }
                user.deactivate();
                Ok(())
            })
            .await?;
        tracing::info!(user_id = %id, deactivated_by = %actor.id, "User deactivated");

        Ok(user.into())
    }

    async fn load(&self, id: &Uuid) -> Result<User> {
        self.store
            .get_user(id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found.".to_string()))
    }

    /// Self-service or admin only; `NotFound` if the target does not exist
    async fn authorize(&self, target: &Uuid, actor: AuthUser) -> Result<()> {
        self.load(target).await?;
        if *target == actor.id {
            return Ok(());
        }

        match self.store.get_user(&actor.id).await? {
            Some(caller) if caller.is_active && caller.is_admin() => Ok(()),
            _ => Err(AppError::Authorization(
                "You are not allowed to modify this user".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use crate::state::InMemoryStore;
    use chrono::Duration;

    fn service() -> (UserService, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        let tokens = Arc::new(TokenService::new("test-secret", Duration::hours(1)));
        (UserService::new(store.clone(), tokens, 4), store)
    }

    fn register_request(username: &str, email: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.to_string(),
            email: email.to_string(),
            password: "Sup3r$ecret".to_string(),
        }
    }

    fn login_request(username: &str, password: &str) -> LoginRequest {
        LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn test_register_trims_and_hides_hash() {
        let (service, store) = service();
        let user = service
            .register(register_request("  alice ", " alice@example.com "))
            .await
            .unwrap();

        assert_eq!(user.username, "alice");
        assert_eq!(user.email, "alice@example.com");
        let stored = store.get_user(&user.id).await.unwrap().unwrap();
        assert!(stored.password_hash.starts_with("$2"));
    }

    #[tokio::test]
    async fn test_register_rejects_weak_password_and_duplicates() {
        let (service, _) = service();

        let mut weak = register_request("bob", "bob@example.com");
        weak.password = "password".to_string();
        assert!(matches!(
            service.register(weak).await.unwrap_err(),
            AppError::Validation(_)
        ));

        service.register(register_request("bob", "bob@example.com")).await.unwrap();

        let err = service
            .register(register_request("bobby", "bob@example.com"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "User already exists");

        let err = service
            .register(register_request("bob", "other@example.com"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Username already taken");
    }

    #[tokio::test]
    async fn test_login_issues_token_and_records_last_login() {
        let (service, store) = service();
        let user = service
            .register(register_request("carol", "carol@example.com"))
            .await
            .unwrap();

        let response = service
            .login(login_request("carol", "Sup3r$ecret"))
            .await
            .unwrap();
        assert!(!response.token.is_empty());
        assert_eq!(service.tokens.verify(&response.token).unwrap().sub, user.id);

        let stored = store.get_user(&user.id).await.unwrap().unwrap();
        assert!(stored.last_login.is_some());

        assert!(matches!(
            service.login(login_request("carol", "Wr0ng$pass")).await.unwrap_err(),
            AppError::Authentication(_)
        ));
        assert!(matches!(
            service.login(login_request("nobody", "Sup3r$ecret")).await.unwrap_err(),
            AppError::Authentication(_)
        ));
    }

    #[tokio::test]
    async fn test_deactivated_user_hidden_and_locked_out() {
        let (service, _) = service();
        let user = service
            .register(register_request("dave", "dave@example.com"))
            .await
            .unwrap();
        service
            .register(register_request("erin", "erin@example.com"))
            .await
            .unwrap();

        let removed = service
            .deactivate_user(&user.id, AuthUser { id: user.id })
            .await
            .unwrap();
        assert!(!removed.is_active);
        assert!(removed.deleted_at.is_some());

        let page = service.list_users(Pagination::default()).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.users[0].username, "erin");

        assert!(service.login(login_request("dave", "Sup3r$ecret")).await.is_err());
        assert!(matches!(
            service
                .deactivate_user(&user.id, AuthUser { id: user.id })
                .await
                .unwrap_err(),
            AppError::Validation(_)
        ));
    }

    #[tokio::test]
    async fn test_only_self_or_admin_may_update() {
        let (service, store) = service();
        let frank = service
            .register(register_request("frank", "frank@example.com"))
            .await
            .unwrap();
        let grace = service
            .register(register_request("grace", "grace@example.com"))
            .await
            .unwrap();

        let update = UserUpdate {
            full_name: Some("Frank Example".to_string()),
            ..Default::default()
        };

        let err = service
            .update_user(&frank.id, update.clone(), AuthUser { id: grace.id })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Authorization(_)));

        store
            .modify_user(&grace.id, &mut |user| {
                user.role = Role::Admin;
                Ok(())
            })
            .await
            .unwrap();

        let updated = service
            .update_user(&frank.id, update, AuthUser { id: grace.id })
            .await
            .unwrap();
        assert_eq!(updated.profile.full_name, "Frank Example");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_login_does_not_undo_concurrent_profile_update() {
        let (service, _) = service();
        let service = Arc::new(service);
        let judy = service
            .register(register_request("judy", "judy@example.com"))
            .await
            .unwrap();
        let me = AuthUser { id: judy.id };

        let login = {
            let service = service.clone();
            tokio::spawn(async move { service.login(login_request("judy", "Sup3r$ecret")).await })
        };
        let update = {
            let service = service.clone();
            tokio::spawn(async move {
                service
                    .update_user(
                        &me.id,
                        UserUpdate {
                            full_name: Some("Judy Example".to_string()),
                            ..Default::default()
                        },
                        me,
                    )
                    .await
            })
        };
        login.await.unwrap().unwrap();
        update.await.unwrap().unwrap();

        let stored = service.store.get_user(&judy.id).await.unwrap().unwrap();
        assert_eq!(stored.profile.full_name, "Judy Example");
        assert!(stored.last_login.is_some());
    }

    #[tokio::test]
    async fn test_update_rejects_taken_username_and_bad_avatar() {
        let (service, _) = service();
        let heidi = service
            .register(register_request("heidi", "heidi@example.com"))
            .await
            .unwrap();
        service
            .register(register_request("ivan", "ivan@example.com"))
            .await
            .unwrap();
        let me = AuthUser { id: heidi.id };

        let err = service
            .update_user(
                &heidi.id,
                UserUpdate {
                    username: Some("ivan".to_string()),
                    ..Default::default()
                },
                me,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let err = service
            .update_user(
                &heidi.id,
                UserUpdate {
                    avatar_url: Some("ftp://example.com/me.bmp".to_string()),
                    ..Default::default()
                },
                me,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
