use crate::{
    AppState,
    auth::{AuthUser, Role},
    error::{ApiError, RepoError},
    extract::{ApiJson, ApiPath},
    models::{
        Admin, AdminPatch, Course, CoursePatch, CreateUserRequest, CredentialsRequest,
        MeResponse, MessageResponse, NewAdmin, NewCourse, NewUser, TokenResponse,
        UpdateAccountRequest, User, UserPatch,
    },
    password::{hash_password, validate_password, verify_password},
};
use axum::{
    Json,
    extract::State,
    http::HeaderMap,
};
use uuid::Uuid;

// --- Input Normalization ---

fn normalize_username(raw: &str) -> Result<String, ApiError> {
    let username = raw.trim();
    if username.is_empty() {
        return Err(ApiError::BadRequest("Username must not be empty".into()));
    }
    Ok(username.to_string())
}

/// Turns an account update request into `(username, password_hash)` for the store.
/// The password is validated and hashed here; plain text never leaves this function.
async fn account_patch(
    req: UpdateAccountRequest,
) -> Result<(Option<String>, Option<String>), ApiError> {
    let username = req.username.as_deref().map(normalize_username).transpose()?;
    let password_hash = match req.password {
        Some(password) => {
            validate_password(&password)?;
            Some(hash_password(&password).await?)
        }
        None => None,
    };
    Ok((username, password_hash))
}

// --- Public: Accounts ---

/// admin_signup
///
/// [Bootstrap Route] Creates an admin account and returns a token for it.
///
/// Open to anonymous callers only while no admin exists (the first admin). After
/// that the caller must present a valid admin token: no or bad token is `401`,
/// a user token is `403`.
#[utoipa::path(
    post,
    path = "/admin/signup",
    request_body = CredentialsRequest,
    responses(
        (status = 200, description = "Admin created", body = TokenResponse),
        (status = 401, description = "Admins already exist and no valid token was given", body = crate::error::ErrorBody),
        (status = 403, description = "Caller is not an admin", body = crate::error::ErrorBody),
        (status = 409, description = "Username taken", body = crate::error::ErrorBody)
    )
)]
pub async fn admin_signup(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(payload): ApiJson<CredentialsRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    if state.repo.list_admins().await?.is_empty() {
        tracing::info!("no admins yet: accepting bootstrap admin signup");
    } else {
        let caller = state
            .tokens
            .authorize(&headers, state.repo.as_ref())
            .await?;
        caller.require_admin()?;
    }

    let username = normalize_username(&payload.username)?;
    validate_password(&payload.password)?;

    let admin = state
        .repo
        .create_admin(NewAdmin {
            username,
            password_hash: hash_password(&payload.password).await?,
        })
        .await?;

    tracing::info!(admin_id = %admin.id, "admin registered");
    let token = state.tokens.issue(admin.id, Role::Admin)?;
    Ok(Json(TokenResponse { token }))
}

/// admin_signin
///
/// [Public Route] Exchanges admin credentials for a token. Unknown username and wrong
/// password are indistinguishable to the caller.
#[utoipa::path(
    post,
    path = "/admin/signin",
    request_body = CredentialsRequest,
    responses(
        (status = 200, description = "Signed in", body = TokenResponse),
        (status = 401, description = "Bad credentials", body = crate::error::ErrorBody)
    )
)]
pub async fn admin_signin(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CredentialsRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let admin = match state.repo.get_admin_by_username(payload.username.trim()).await {
        Ok(admin) => Some(admin),
        Err(RepoError::NotFound(_)) => None,
        Err(e) => return Err(e.into()),
    };

    // Unknown usernames still pay for one verification.
    let stored = admin.as_ref().map(|a| a.password_hash.as_str());
    if !verify_password(&payload.password, stored).await {
        return Err(ApiError::InvalidLogin);
    }
    let Some(admin) = admin else {
        return Err(ApiError::InvalidLogin);
    };

    let token = state.tokens.issue(admin.id, Role::Admin)?;
    Ok(Json(TokenResponse { token }))
}

/// user_signup
///
/// [Public Route] Self-registration for users. Returns a token for the new account.
#[utoipa::path(
    post,
    path = "/users/signup",
    request_body = CredentialsRequest,
    responses(
        (status = 200, description = "User created", body = TokenResponse),
        (status = 409, description = "Username taken", body = crate::error::ErrorBody)
    )
)]
pub async fn user_signup(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CredentialsRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let username = normalize_username(&payload.username)?;
    validate_password(&payload.password)?;

    let user = state
        .repo
        .create_user(NewUser {
            username,
            password_hash: Some(hash_password(&payload.password).await?),
        })
        .await?;

    tracing::info!(user_id = %user.id, "user registered");
    let token = state.tokens.issue(user.id, Role::User)?;
    Ok(Json(TokenResponse { token }))
}

/// user_signin
///
/// [Public Route] Exchanges user credentials for a token. Accounts created without a
/// password cannot sign in.
#[utoipa::path(
    post,
    path = "/users/signin",
    request_body = CredentialsRequest,
    responses(
        (status = 200, description = "Signed in", body = TokenResponse),
        (status = 401, description = "Bad credentials", body = crate::error::ErrorBody)
    )
)]
pub async fn user_signin(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CredentialsRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let user = match state.repo.get_user_by_username(payload.username.trim()).await {
        Ok(user) => Some(user),
        Err(RepoError::NotFound(_)) => None,
        Err(e) => return Err(e.into()),
    };

    let stored = user.as_ref().and_then(|u| u.password_hash.as_deref());
    if !verify_password(&payload.password, stored).await {
        return Err(ApiError::InvalidLogin);
    }
    let Some(user) = user else {
        return Err(ApiError::InvalidLogin);
    };

    let token = state.tokens.issue(user.id, Role::User)?;
    Ok(Json(TokenResponse { token }))
}

// --- Public: Catalog ---

/// list_courses
///
/// [Public Route] The full course catalog.
#[utoipa::path(
    get,
    path = "/courses",
    responses((status = 200, description = "All courses", body = [Course]))
)]
pub async fn list_courses(State(state): State<AppState>) -> Result<Json<Vec<Course>>, ApiError> {
    Ok(Json(state.repo.list_courses().await?))
}

/// get_course
///
/// [Public Route] A single course or 404.
#[utoipa::path(
    get,
    path = "/courses/{id}",
    params(("id" = Uuid, Path, description = "Course ID")),
    responses(
        (status = 200, description = "Found", body = Course),
        (status = 404, description = "Not Found", body = crate::error::ErrorBody)
    )
)]
pub async fn get_course(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<Course>, ApiError> {
    Ok(Json(state.repo.get_course(id).await?))
}

// --- Authenticated ---

/// get_me
///
/// [Authenticated Route] The identity the gate resolved for this request.
#[utoipa::path(
    get,
    path = "/me",
    responses((status = 200, description = "Caller identity", body = MeResponse))
)]
pub async fn get_me(auth: AuthUser) -> Json<MeResponse> {
    Json(MeResponse {
        id: auth.id,
        username: auth.username,
        role: auth.role.as_str().to_string(),
    })
}

/// get_user
///
/// [Authenticated Route] A single user record. Users may read only themselves;
/// admins may read anyone.
#[utoipa::path(
    get,
    path = "/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Found", body = User),
        (status = 403, description = "Not yours", body = crate::error::ErrorBody),
        (status = 404, description = "Not Found", body = crate::error::ErrorBody)
    )
)]
pub async fn get_user(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<User>, ApiError> {
    auth.require_self_or_admin(id)?;
    Ok(Json(state.repo.get_user(id).await?))
}

/// update_user
///
/// [Authenticated Route] Partial update of username and/or password, by the owner or an admin.
#[utoipa::path(
    put,
    path = "/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = UpdateAccountRequest,
    responses(
        (status = 200, description = "Updated", body = User),
        (status = 404, description = "Not Found", body = crate::error::ErrorBody),
        (status = 409, description = "Username taken", body = crate::error::ErrorBody)
    )
)]
pub async fn update_user(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<UpdateAccountRequest>,
) -> Result<Json<User>, ApiError> {
    auth.require_self_or_admin(id)?;
    let (username, password_hash) = account_patch(payload).await?;
    let user = state
        .repo
        .update_user(id, UserPatch { username, password_hash })
        .await?;
    Ok(Json(user))
}

/// delete_user
///
/// [Authenticated Route] Removes a user, by the owner or an admin. Purchased course
/// references go with the user; the courses themselves are untouched.
#[utoipa::path(
    delete,
    path = "/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 404, description = "Not Found", body = crate::error::ErrorBody)
    )
)]
pub async fn delete_user(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<MessageResponse>, ApiError> {
    auth.require_self_or_admin(id)?;
    state.repo.delete_user(id).await?;
    tracing::info!(user_id = %id, by = %auth.id, "user deleted");
    Ok(Json(MessageResponse::new("User deleted")))
}

/// list_purchased_courses
///
/// [Authenticated Route] The user's purchased courses in purchase order. References to
/// courses deleted since purchase are left out.
#[utoipa::path(
    get,
    path = "/users/{id}/courses",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Purchased courses", body = [Course]),
        (status = 404, description = "User Not Found", body = crate::error::ErrorBody)
    )
)]
pub async fn list_purchased_courses(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<Vec<Course>>, ApiError> {
    auth.require_self_or_admin(id)?;
    Ok(Json(state.repo.list_purchased_courses(id).await?))
}

/// add_purchased_course
///
/// [Authenticated Route] Records a purchase. Both sides must exist; a repeat purchase
/// is rejected with 409.
#[utoipa::path(
    post,
    path = "/users/{id}/courses/{course_id}",
    params(
        ("id" = Uuid, Path, description = "User ID"),
        ("course_id" = Uuid, Path, description = "Course ID")
    ),
    responses(
        (status = 200, description = "Purchased", body = MessageResponse),
        (status = 404, description = "User or Course Not Found", body = crate::error::ErrorBody),
        (status = 409, description = "Already purchased", body = crate::error::ErrorBody)
    )
)]
pub async fn add_purchased_course(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath((id, course_id)): ApiPath<(Uuid, Uuid)>,
) -> Result<Json<MessageResponse>, ApiError> {
    auth.require_self_or_admin(id)?;
    state.repo.add_purchased_course(id, course_id).await?;
    tracing::info!(user_id = %id, %course_id, "course purchased");
    Ok(Json(MessageResponse::new("Course purchased successfully")))
}

// --- Admin: Users ---

/// list_users
///
/// [Admin Route] Every user record.
#[utoipa::path(
    get,
    path = "/users",
    responses(
        (status = 200, description = "All users", body = [User]),
        (status = 403, description = "Admins only", body = crate::error::ErrorBody)
    )
)]
pub async fn list_users(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<User>>, ApiError> {
    auth.require_admin()?;
    Ok(Json(state.repo.list_users().await?))
}

/// create_user
///
/// [Admin Route] Creates a user from `{ name }` (or `{ username }`), with an optional
/// password. Responds with the created record.
#[utoipa::path(
    post,
    path = "/users",
    request_body = CreateUserRequest,
    responses(
        (status = 200, description = "Created", body = User),
        (status = 409, description = "Username taken", body = crate::error::ErrorBody)
    )
)]
pub async fn create_user(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CreateUserRequest>,
) -> Result<Json<User>, ApiError> {
    auth.require_admin()?;
    let username = normalize_username(&payload.username)?;
    let password_hash = match payload.password {
        Some(password) => {
            validate_password(&password)?;
            Some(hash_password(&password).await?)
        }
        None => None,
    };

    let user = state
        .repo
        .create_user(NewUser {
            username,
            password_hash,
        })
        .await?;
    Ok(Json(user))
}

// --- Admin: Courses ---

/// create_course
///
/// [Admin Route] Adds a course to the catalog.
#[utoipa::path(
    post,
    path = "/courses",
    request_body = NewCourse,
    responses((status = 200, description = "Created", body = Course))
)]
pub async fn create_course(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<NewCourse>,
) -> Result<Json<Course>, ApiError> {
    auth.require_admin()?;
    if payload.title.trim().is_empty() {
        return Err(ApiError::BadRequest("Course title must not be empty".into()));
    }
    let course = state.repo.create_course(payload).await?;
    tracing::info!(course_id = %course.id, "course created");
    Ok(Json(course))
}

/// update_course
///
/// [Admin Route] Partial update of a course.
#[utoipa::path(
    put,
    path = "/courses/{id}",
    params(("id" = Uuid, Path, description = "Course ID")),
    request_body = CoursePatch,
    responses(
        (status = 200, description = "Updated", body = Course),
        (status = 404, description = "Not Found", body = crate::error::ErrorBody)
    )
)]
pub async fn update_course(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<CoursePatch>,
) -> Result<Json<Course>, ApiError> {
    auth.require_admin()?;
    Ok(Json(state.repo.update_course(id, payload).await?))
}

/// delete_course
///
/// [Admin Route] Removes a course. Users who bought it keep a dangling reference that
/// purchased-course listings skip.
#[utoipa::path(
    delete,
    path = "/courses/{id}",
    params(("id" = Uuid, Path, description = "Course ID")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 404, description = "Not Found", body = crate::error::ErrorBody)
    )
)]
pub async fn delete_course(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<MessageResponse>, ApiError> {
    auth.require_admin()?;
    state.repo.delete_course(id).await?;
    tracing::info!(course_id = %id, "course deleted");
    Ok(Json(MessageResponse::new("Course deleted")))
}

// --- Admin: Admins ---

/// list_admins
///
/// [Admin Route] Every admin account.
#[utoipa::path(
    get,
    path = "/admins",
    responses((status = 200, description = "All admins", body = [Admin]))
)]
pub async fn list_admins(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Admin>>, ApiError> {
    auth.require_admin()?;
    Ok(Json(state.repo.list_admins().await?))
}

/// get_admin
#[utoipa::path(
    get,
    path = "/admins/{id}",
    params(("id" = Uuid, Path, description = "Admin ID")),
    responses(
        (status = 200, description = "Found", body = Admin),
        (status = 404, description = "Not Found", body = crate::error::ErrorBody)
    )
)]
pub async fn get_admin(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<Admin>, ApiError> {
    auth.require_admin()?;
    Ok(Json(state.repo.get_admin(id).await?))
}

/// update_admin
#[utoipa::path(
    put,
    path = "/admins/{id}",
    params(("id" = Uuid, Path, description = "Admin ID")),
    request_body = UpdateAccountRequest,
    responses(
        (status = 200, description = "Updated", body = Admin),
        (status = 404, description = "Not Found", body = crate::error::ErrorBody)
    )
)]
pub async fn update_admin(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<UpdateAccountRequest>,
) -> Result<Json<Admin>, ApiError> {
    auth.require_admin()?;
    let (username, password_hash) = account_patch(payload).await?;
    let admin = state
        .repo
        .update_admin(id, AdminPatch { username, password_hash })
        .await?;
    Ok(Json(admin))
}

/// delete_admin
///
/// [Admin Route] Removes an admin account. Tokens already issued to it stop working,
/// since the gate checks that the subject still exists.
#[utoipa::path(
    delete,
    path = "/admins/{id}",
    params(("id" = Uuid, Path, description = "Admin ID")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 404, description = "Not Found", body = crate::error::ErrorBody)
    )
)]
pub async fn delete_admin(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<MessageResponse>, ApiError> {
    auth.require_admin()?;
    state.repo.delete_admin(id).await?;
    tracing::info!(admin_id = %id, by = %auth.id, "admin deleted");
    Ok(Json(MessageResponse::new("Admin deleted")))
}
