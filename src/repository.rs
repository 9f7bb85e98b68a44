use crate::error::RepoError;
use crate::models::{
    Admin, AdminPatch, Course, CoursePatch, NewAdmin, NewCourse, NewUser, User, UserPatch,
};
use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Repository Trait
///
/// The persistence contract for admins, users, courses and the user -> course
/// relationship. Handlers and the auth gate only ever see `Arc<dyn Repository>`.
///
/// Consistency model: each call touches one record and the last write wins.
/// There are no cross-record transactions and no cascades.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Admins ---
    async fn create_admin(&self, admin: NewAdmin) -> Result<Admin, RepoError>;
    async fn get_admin(&self, id: Uuid) -> Result<Admin, RepoError>;
    async fn get_admin_by_username(&self, username: &str) -> Result<Admin, RepoError>;
    async fn list_admins(&self) -> Result<Vec<Admin>, RepoError>;
    async fn update_admin(&self, id: Uuid, patch: AdminPatch) -> Result<Admin, RepoError>;
    async fn delete_admin(&self, id: Uuid) -> Result<(), RepoError>;

    // --- Users ---
    async fn create_user(&self, user: NewUser) -> Result<User, RepoError>;
    async fn get_user(&self, id: Uuid) -> Result<User, RepoError>;
    async fn get_user_by_username(&self, username: &str) -> Result<User, RepoError>;
    async fn list_users(&self) -> Result<Vec<User>, RepoError>;
    async fn update_user(&self, id: Uuid, patch: UserPatch) -> Result<User, RepoError>;
    async fn delete_user(&self, id: Uuid) -> Result<(), RepoError>;

    // --- Courses ---
    async fn create_course(&self, course: NewCourse) -> Result<Course, RepoError>;
    async fn get_course(&self, id: Uuid) -> Result<Course, RepoError>;
    async fn list_courses(&self) -> Result<Vec<Course>, RepoError>;
    async fn update_course(&self, id: Uuid, patch: CoursePatch) -> Result<Course, RepoError>;
    // Does not touch users that reference the course.
    async fn delete_course(&self, id: Uuid) -> Result<(), RepoError>;

    // --- Relationship ---
    /// Appends `course_id` to the user's purchased list.
    ///
    /// Fails with `NotFound("user")` or `NotFound("course")` for whichever side is
    /// missing (user checked first) and with `AlreadyExists` for a repeat purchase.
    /// The user record is unchanged on every failure.
    async fn add_purchased_course(&self, user_id: Uuid, course_id: Uuid) -> Result<(), RepoError>;

    /// Resolves the user's purchased list in purchase order. References to deleted
    /// courses are skipped.
    async fn list_purchased_courses(&self, user_id: Uuid) -> Result<Vec<Course>, RepoError>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// Orders `found` by the position of each id in `refs`, dropping references with no
/// matching course.
fn resolve_in_order(user_id: Uuid, refs: &[Uuid], found: Vec<Course>) -> Vec<Course> {
    let mut by_id: HashMap<Uuid, Course> = found.into_iter().map(|c| (c.id, c)).collect();
    let resolved: Vec<Course> = refs.iter().filter_map(|id| by_id.remove(id)).collect();
    if resolved.len() < refs.len() {
        tracing::warn!(
            %user_id,
            dangling = refs.len() - resolved.len(),
            "skipping purchased course references to deleted courses"
        );
    }
    resolved
}

/// Maps a unique violation to `AlreadyExists(entity)`; anything else is a storage failure.
fn write_error(entity: &str) -> impl FnOnce(sqlx::Error) -> RepoError + '_ {
    move |e| match RepoError::from(e) {
        RepoError::AlreadyExists(_) => RepoError::AlreadyExists(entity.to_string()),
        other => {
            tracing::error!("{entity} write error: {other}");
            other
        }
    }
}

fn read_error(entity: &str) -> impl FnOnce(sqlx::Error) -> RepoError + '_ {
    move |e| {
        tracing::error!("{entity} read error: {e:?}");
        RepoError::from(e)
    }
}

/// PostgresRepository
///
/// The production implementation, backed by Postgres. A user's purchased courses
/// live in a `UUID[]` column on the user row, mirroring the document shape.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn create_admin(&self, admin: NewAdmin) -> Result<Admin, RepoError> {
        sqlx::query_as::<_, Admin>(
            "INSERT INTO admins (id, username, password_hash) VALUES ($1, $2, $3)
             RETURNING id, username, password_hash",
        )
        .bind(Uuid::new_v4())
        .bind(admin.username)
        .bind(admin.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(write_error("admin"))
    }

    async fn get_admin(&self, id: Uuid) -> Result<Admin, RepoError> {
        sqlx::query_as::<_, Admin>("SELECT id, username, password_hash FROM admins WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(read_error("admin"))?
            .ok_or_else(|| RepoError::NotFound("admin".into()))
    }

    async fn get_admin_by_username(&self, username: &str) -> Result<Admin, RepoError> {
        sqlx::query_as::<_, Admin>(
            "SELECT id, username, password_hash FROM admins WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(read_error("admin"))?
        .ok_or_else(|| RepoError::NotFound("admin".into()))
    }

    async fn list_admins(&self) -> Result<Vec<Admin>, RepoError> {
        sqlx::query_as::<_, Admin>("SELECT id, username, password_hash FROM admins ORDER BY username")
            .fetch_all(&self.pool)
            .await
            .map_err(read_error("admin"))
    }

    /// Uses `COALESCE` so only the `Some` fields of the patch are written.
    async fn update_admin(&self, id: Uuid, patch: AdminPatch) -> Result<Admin, RepoError> {
        sqlx::query_as::<_, Admin>(
            "UPDATE admins
             SET username = COALESCE($2, username),
                 password_hash = COALESCE($3, password_hash)
             WHERE id = $1
             RETURNING id, username, password_hash",
        )
        .bind(id)
        .bind(patch.username)
        .bind(patch.password_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(write_error("admin"))?
        .ok_or_else(|| RepoError::NotFound("admin".into()))
    }

    async fn delete_admin(&self, id: Uuid) -> Result<(), RepoError> {
        let res = sqlx::query("DELETE FROM admins WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(write_error("admin"))?;
        if res.rows_affected() == 0 {
            return Err(RepoError::NotFound("admin".into()));
        }
        Ok(())
    }

    async fn create_user(&self, user: NewUser) -> Result<User, RepoError> {
        sqlx::query_as::<_, User>(
            "INSERT INTO users (id, username, password_hash, purchased_courses)
             VALUES ($1, $2, $3, '{}')
             RETURNING id, username, password_hash, purchased_courses",
        )
        .bind(Uuid::new_v4())
        .bind(user.username)
        .bind(user.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(write_error("user"))
    }

    async fn get_user(&self, id: Uuid) -> Result<User, RepoError> {
        sqlx::query_as::<_, User>(
            "SELECT id, username, password_hash, purchased_courses FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(read_error("user"))?
        .ok_or_else(|| RepoError::NotFound("user".into()))
    }

    async fn get_user_by_username(&self, username: &str) -> Result<User, RepoError> {
        sqlx::query_as::<_, User>(
            "SELECT id, username, password_hash, purchased_courses FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(read_error("user"))?
        .ok_or_else(|| RepoError::NotFound("user".into()))
    }

    async fn list_users(&self) -> Result<Vec<User>, RepoError> {
        sqlx::query_as::<_, User>(
            "SELECT id, username, password_hash, purchased_courses FROM users ORDER BY username",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(read_error("user"))
    }

    async fn update_user(&self, id: Uuid, patch: UserPatch) -> Result<User, RepoError> {
        sqlx::query_as::<_, User>(
            "UPDATE users
             SET username = COALESCE($2, username),
                 password_hash = COALESCE($3, password_hash)
             WHERE id = $1
             RETURNING id, username, password_hash, purchased_courses",
        )
        .bind(id)
        .bind(patch.username)
        .bind(patch.password_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(write_error("user"))?
        .ok_or_else(|| RepoError::NotFound("user".into()))
    }

    async fn delete_user(&self, id: Uuid) -> Result<(), RepoError> {
        let res = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(write_error("user"))?;
        if res.rows_affected() == 0 {
            return Err(RepoError::NotFound("user".into()));
        }
        Ok(())
    }

    async fn create_course(&self, course: NewCourse) -> Result<Course, RepoError> {
        sqlx::query_as::<_, Course>(
            "INSERT INTO courses (id, title, image) VALUES ($1, $2, $3) RETURNING id, title, image",
        )
        .bind(Uuid::new_v4())
        .bind(course.title)
        .bind(course.image)
        .fetch_one(&self.pool)
        .await
        .map_err(write_error("course"))
    }

    async fn get_course(&self, id: Uuid) -> Result<Course, RepoError> {
        sqlx::query_as::<_, Course>("SELECT id, title, image FROM courses WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(read_error("course"))?
            .ok_or_else(|| RepoError::NotFound("course".into()))
    }

    async fn list_courses(&self) -> Result<Vec<Course>, RepoError> {
        sqlx::query_as::<_, Course>("SELECT id, title, image FROM courses ORDER BY title")
            .fetch_all(&self.pool)
            .await
            .map_err(read_error("course"))
    }

    async fn update_course(&self, id: Uuid, patch: CoursePatch) -> Result<Course, RepoError> {
        sqlx::query_as::<_, Course>(
            "UPDATE courses
             SET title = COALESCE($2, title),
                 image = COALESCE($3, image)
             WHERE id = $1
             RETURNING id, title, image",
        )
        .bind(id)
        .bind(patch.title)
        .bind(patch.image)
        .fetch_optional(&self.pool)
        .await
        .map_err(write_error("course"))?
        .ok_or_else(|| RepoError::NotFound("course".into()))
    }

    async fn delete_course(&self, id: Uuid) -> Result<(), RepoError> {
        let res = sqlx::query("DELETE FROM courses WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(write_error("course"))?;
        if res.rows_affected() == 0 {
            return Err(RepoError::NotFound("course".into()));
        }
        Ok(())
    }

    /// The existence check on the course and the append happen in one conditional
    /// `UPDATE`, so a reference is only ever added to a course that exists at that moment.
    /// When no row is touched, the follow-up reads only decide which error to report.
    async fn add_purchased_course(&self, user_id: Uuid, course_id: Uuid) -> Result<(), RepoError> {
        let res = sqlx::query(
            "UPDATE users
             SET purchased_courses = array_append(purchased_courses, $2)
             WHERE id = $1
               AND EXISTS (SELECT 1 FROM courses WHERE id = $2)
               AND NOT ($2 = ANY(purchased_courses))",
        )
        .bind(user_id)
        .bind(course_id)
        .execute(&self.pool)
        .await
        .map_err(write_error("user"))?;

        if res.rows_affected() > 0 {
            return Ok(());
        }

        let user = self.get_user(user_id).await?;
        self.get_course(course_id).await?;
        if user.purchased_courses.contains(&course_id) {
            return Err(RepoError::AlreadyExists("purchased course".into()));
        }
        // The course existed for the check above but not for the update, or vice versa.
        Err(RepoError::StorageUnavailable(
            "purchase raced with a concurrent write".into(),
        ))
    }

    async fn list_purchased_courses(&self, user_id: Uuid) -> Result<Vec<Course>, RepoError> {
        let user = self.get_user(user_id).await?;
        if user.purchased_courses.is_empty() {
            return Ok(Vec::new());
        }
        let found = sqlx::query_as::<_, Course>(
            "SELECT id, title, image FROM courses WHERE id = ANY($1)",
        )
        .bind(user.purchased_courses.clone())
        .fetch_all(&self.pool)
        .await
        .map_err(read_error("course"))?;
        Ok(resolve_in_order(user_id, &user.purchased_courses, found))
    }
}

// --- In-Memory Implementation ---

#[derive(Default)]
struct Collections {
    admins: Vec<Admin>,
    users: Vec<User>,
    courses: Vec<Course>,
}

/// InMemoryRepository
///
/// A process-local store used in local mode when no `DATABASE_URL` is configured,
/// and by the test suite. Records keep insertion order.
#[derive(Default)]
pub struct InMemoryRepository {
    data: RwLock<Collections>,
    /// When true, every operation fails with `StorageUnavailable`.
    should_fail: bool,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            data: RwLock::default(),
            should_fail: true,
        }
    }

    fn available(&self) -> Result<(), RepoError> {
        if self.should_fail {
            return Err(RepoError::StorageUnavailable(
                "in-memory store: simulated outage".into(),
            ));
        }
        Ok(())
    }
}

fn not_found(entity: &str) -> RepoError {
    RepoError::NotFound(entity.to_string())
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn create_admin(&self, admin: NewAdmin) -> Result<Admin, RepoError> {
        self.available()?;
        let mut data = self.data.write().await;
        if data.admins.iter().any(|a| a.username == admin.username) {
            return Err(RepoError::AlreadyExists("admin".into()));
        }
        let created = Admin {
            id: Uuid::new_v4(),
            username: admin.username,
            password_hash: admin.password_hash,
        };
        data.admins.push(created.clone());
        Ok(created)
    }

    async fn get_admin(&self, id: Uuid) -> Result<Admin, RepoError> {
        self.available()?;
        let data = self.data.read().await;
        data.admins
            .iter()
            .find(|a| a.id == id)
            .cloned()
            .ok_or_else(|| not_found("admin"))
    }

    async fn get_admin_by_username(&self, username: &str) -> Result<Admin, RepoError> {
        self.available()?;
        let data = self.data.read().await;
        data.admins
            .iter()
            .find(|a| a.username == username)
            .cloned()
            .ok_or_else(|| not_found("admin"))
    }

    async fn list_admins(&self) -> Result<Vec<Admin>, RepoError> {
        self.available()?;
        Ok(self.data.read().await.admins.clone())
    }

    async fn update_admin(&self, id: Uuid, patch: AdminPatch) -> Result<Admin, RepoError> {
        self.available()?;
        let mut data = self.data.write().await;
        if let Some(name) = &patch.username {
            if data.admins.iter().any(|a| a.id != id && &a.username == name) {
                return Err(RepoError::AlreadyExists("admin".into()));
            }
        }
        let admin = data
            .admins
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| not_found("admin"))?;
        if let Some(username) = patch.username {
            admin.username = username;
        }
        if let Some(hash) = patch.password_hash {
            admin.password_hash = hash;
        }
        Ok(admin.clone())
    }

    async fn delete_admin(&self, id: Uuid) -> Result<(), RepoError> {
        self.available()?;
        let mut data = self.data.write().await;
        let before = data.admins.len();
        data.admins.retain(|a| a.id != id);
        if data.admins.len() == before {
            return Err(not_found("admin"));
        }
        Ok(())
    }

    async fn create_user(&self, user: NewUser) -> Result<User, RepoError> {
        self.available()?;
        let mut data = self.data.write().await;
        if data.users.iter().any(|u| u.username == user.username) {
            return Err(RepoError::AlreadyExists("user".into()));
        }
        let created = User {
            id: Uuid::new_v4(),
            username: user.username,
            password_hash: user.password_hash,
            purchased_courses: Vec::new(),
        };
        data.users.push(created.clone());
        Ok(created)
    }

    async fn get_user(&self, id: Uuid) -> Result<User, RepoError> {
        self.available()?;
        let data = self.data.read().await;
        data.users
            .iter()
            .find(|u| u.id == id)
            .cloned()
            .ok_or_else(|| not_found("user"))
    }

    async fn get_user_by_username(&self, username: &str) -> Result<User, RepoError> {
        self.available()?;
        let data = self.data.read().await;
        data.users
            .iter()
            .find(|u| u.username == username)
            .cloned()
            .ok_or_else(|| not_found("user"))
    }

    async fn list_users(&self) -> Result<Vec<User>, RepoError> {
        self.available()?;
        Ok(self.data.read().await.users.clone())
    }

    async fn update_user(&self, id: Uuid, patch: UserPatch) -> Result<User, RepoError> {
        self.available()?;
        let mut data = self.data.write().await;
        if let Some(name) = &patch.username {
            if data.users.iter().any(|u| u.id != id && &u.username == name) {
                return Err(RepoError::AlreadyExists("user".into()));
            }
        }
        let user = data
            .users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or_else(|| not_found("user"))?;
        if let Some(username) = patch.username {
            user.username = username;
        }
        if let Some(hash) = patch.password_hash {
            user.password_hash = Some(hash);
        }
        Ok(user.clone())
    }

    async fn delete_user(&self, id: Uuid) -> Result<(), RepoError> {
        self.available()?;
        let mut data = self.data.write().await;
        let before = data.users.len();
        data.users.retain(|u| u.id != id);
        if data.users.len() == before {
            return Err(not_found("user"));
        }
        Ok(())
    }

    async fn create_course(&self, course: NewCourse) -> Result<Course, RepoError> {
        self.available()?;
        let created = Course {
            id: Uuid::new_v4(),
            title: course.title,
            image: course.image,
        };
        self.data.write().await.courses.push(created.clone());
        Ok(created)
    }

    async fn get_course(&self, id: Uuid) -> Result<Course, RepoError> {
        self.available()?;
        let data = self.data.read().await;
        data.courses
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or_else(|| not_found("course"))
    }

    async fn list_courses(&self) -> Result<Vec<Course>, RepoError> {
        self.available()?;
        Ok(self.data.read().await.courses.clone())
    }

    async fn update_course(&self, id: Uuid, patch: CoursePatch) -> Result<Course, RepoError> {
        self.available()?;
        let mut data = self.data.write().await;
        let course = data
            .courses
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| not_found("course"))?;
        if let Some(title) = patch.title {
            course.title = title;
        }
        if let Some(image) = patch.image {
            course.image = image;
        }
        Ok(course.clone())
    }

    async fn delete_course(&self, id: Uuid) -> Result<(), RepoError> {
        self.available()?;
        let mut data = self.data.write().await;
        let before = data.courses.len();
        data.courses.retain(|c| c.id != id);
        if data.courses.len() == before {
            return Err(not_found("course"));
        }
        Ok(())
    }

    async fn add_purchased_course(&self, user_id: Uuid, course_id: Uuid) -> Result<(), RepoError> {
        self.available()?;
        // One write guard across check and append.
        let mut data = self.data.write().await;
        let Collections { users, courses, .. } = &mut *data;
        let user = users
            .iter_mut()
            .find(|u| u.id == user_id)
            .ok_or_else(|| not_found("user"))?;
        if !courses.iter().any(|c| c.id == course_id) {
            return Err(not_found("course"));
        }
        if user.purchased_courses.contains(&course_id) {
            return Err(RepoError::AlreadyExists("purchased course".into()));
        }
        user.purchased_courses.push(course_id);
        Ok(())
    }

    async fn list_purchased_courses(&self, user_id: Uuid) -> Result<Vec<Course>, RepoError> {
        self.available()?;
        let data = self.data.read().await;
        let user = data
            .users
            .iter()
            .find(|u| u.id == user_id)
            .ok_or_else(|| not_found("user"))?;
        let found = data
            .courses
            .iter()
            .filter(|c| user.purchased_courses.contains(&c.id))
            .cloned()
            .collect();
        Ok(resolve_in_order(user_id, &user.purchased_courses, found))
    }
}
