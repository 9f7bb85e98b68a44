use course_portal::{
    RepoError,
    models::{CoursePatch, NewAdmin, NewCourse, NewUser, User, UserPatch},
    repository::{InMemoryRepository, PostgresRepository, Repository},
};
use sqlx::PgPool;
use tokio::test;
use uuid::Uuid;

// --- Test Context and Setup ---

/// Holds the database pool for the Postgres runs of the contract.
struct DbTestContext {
    pool: PgPool,
}

impl DbTestContext {
    async fn setup() -> Self {
        dotenv::dotenv().ok();

        let db_url = std::env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set to run integration tests");

        let pool = PgPool::connect(&db_url)
            .await
            .expect("Failed to connect to database for integration tests.");

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("Failed to run database migrations.");

        DbTestContext { pool }
    }

    fn repository(&self) -> PostgresRepository {
        PostgresRepository::new(self.pool.clone())
    }
}

// --- Test Data Helpers ---

/// Usernames are unique per store; the suffix keeps reruns against one database apart.
fn unique(name: &str) -> String {
    format!("{name}-{}", Uuid::new_v4().simple())
}

async fn create_test_user(repo: &dyn Repository, name: &str) -> User {
    repo.create_user(NewUser {
        username: unique(name),
        password_hash: None,
    })
    .await
    .expect("create user")
}

fn course(title: &str) -> NewCourse {
    NewCourse {
        title: title.to_string(),
        image: format!("https://img.example/{title}.png"),
    }
}

// --- The Contract ---
// Each check runs against any `Repository`, so both implementations share one definition.

async fn check_course_round_trip(repo: &dyn Repository) {
    let created = repo.create_course(course("Algebra")).await.unwrap();
    let fetched = repo.get_course(created.id).await.unwrap();
    assert_eq!(fetched, created);
    assert_eq!(fetched.title, "Algebra");
}

async fn check_user_round_trip(repo: &dyn Repository) {
    let username = unique("alice");
    let created = repo
        .create_user(NewUser {
            username: username.clone(),
            password_hash: Some("$argon2id$placeholder".into()),
        })
        .await
        .unwrap();

    // The input plus the assigned id, and nothing purchased yet.
    assert_eq!(created.username, username);
    assert_eq!(created.password_hash.as_deref(), Some("$argon2id$placeholder"));
    assert!(created.purchased_courses.is_empty());

    let fetched = repo.get_user(created.id).await.unwrap();
    assert_eq!(fetched, created);
}

async fn check_delete_twice(repo: &dyn Repository) {
    let created = repo.create_course(course("Geometry")).await.unwrap();
    let before = repo.list_courses().await.unwrap().len();

    repo.delete_course(created.id).await.unwrap();
    assert_eq!(repo.list_courses().await.unwrap().len(), before - 1);
    assert_eq!(
        repo.get_course(created.id).await.unwrap_err(),
        RepoError::NotFound("course".into())
    );
    assert_eq!(
        repo.delete_course(created.id).await.unwrap_err(),
        RepoError::NotFound("course".into())
    );
    assert_eq!(repo.list_courses().await.unwrap().len(), before - 1);
}

async fn check_purchase_then_list(repo: &dyn Repository) {
    let user = create_test_user(repo, "student").await;
    let algebra = repo.create_course(course("Algebra")).await.unwrap();

    repo.add_purchased_course(user.id, algebra.id).await.unwrap();

    let purchased = repo.list_purchased_courses(user.id).await.unwrap();
    assert_eq!(purchased, vec![algebra.clone()]);
    assert_eq!(
        repo.get_user(user.id).await.unwrap().purchased_courses,
        vec![algebra.id]
    );
}

async fn check_purchase_order_preserved(repo: &dyn Repository) {
    let user = create_test_user(repo, "collector").await;
    let first = repo.create_course(course("Zoology")).await.unwrap();
    let second = repo.create_course(course("Astronomy")).await.unwrap();

    repo.add_purchased_course(user.id, first.id).await.unwrap();
    repo.add_purchased_course(user.id, second.id).await.unwrap();

    let titles: Vec<String> = repo
        .list_purchased_courses(user.id)
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.title)
        .collect();
    assert_eq!(titles, vec!["Zoology", "Astronomy"]);
}

async fn check_purchase_missing_course(repo: &dyn Repository) {
    let user = create_test_user(repo, "student").await;

    let err = repo
        .add_purchased_course(user.id, Uuid::new_v4())
        .await
        .unwrap_err();
    assert_eq!(err, RepoError::NotFound("course".into()));
    assert!(repo.get_user(user.id).await.unwrap().purchased_courses.is_empty());
}

async fn check_purchase_missing_user(repo: &dyn Repository) {
    let algebra = repo.create_course(course("Algebra")).await.unwrap();

    let err = repo
        .add_purchased_course(Uuid::new_v4(), algebra.id)
        .await
        .unwrap_err();
    assert_eq!(err, RepoError::NotFound("user".into()));
}

async fn check_duplicate_purchase(repo: &dyn Repository) {
    let user = create_test_user(repo, "student").await;
    let algebra = repo.create_course(course("Algebra")).await.unwrap();

    repo.add_purchased_course(user.id, algebra.id).await.unwrap();
    let err = repo
        .add_purchased_course(user.id, algebra.id)
        .await
        .unwrap_err();
    assert!(matches!(err, RepoError::AlreadyExists(_)));
    assert_eq!(repo.get_user(user.id).await.unwrap().purchased_courses.len(), 1);
}

async fn check_dangling_reference_skipped(repo: &dyn Repository) {
    let user = create_test_user(repo, "student").await;
    let kept = repo.create_course(course("Kept")).await.unwrap();
    let doomed = repo.create_course(course("Doomed")).await.unwrap();
    repo.add_purchased_course(user.id, doomed.id).await.unwrap();
    repo.add_purchased_course(user.id, kept.id).await.unwrap();

    repo.delete_course(doomed.id).await.unwrap();

    // The reference stays on the user; listings leave it out.
    assert_eq!(repo.get_user(user.id).await.unwrap().purchased_courses.len(), 2);
    assert_eq!(
        repo.list_purchased_courses(user.id).await.unwrap(),
        vec![kept]
    );
}

async fn check_username_uniqueness(repo: &dyn Repository) {
    let first = create_test_user(repo, "dup").await;

    let err = repo
        .create_user(NewUser {
            username: first.username.clone(),
            password_hash: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, RepoError::AlreadyExists(_)));

    // Renaming onto a taken name collides too.
    let second = create_test_user(repo, "other").await;
    let err = repo
        .update_user(
            second.id,
            UserPatch {
                username: Some(first.username.clone()),
                password_hash: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, RepoError::AlreadyExists(_)));
}

async fn check_partial_update(repo: &dyn Repository) {
    let created = repo.create_course(course("Draft")).await.unwrap();

    let updated = repo
        .update_course(
            created.id,
            CoursePatch {
                title: Some("Final".into()),
                image: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.title, "Final");
    assert_eq!(updated.image, created.image);

    let err = repo
        .update_course(Uuid::new_v4(), CoursePatch::default())
        .await
        .unwrap_err();
    assert_eq!(err, RepoError::NotFound("course".into()));
}

async fn check_admin_lookup_by_username(repo: &dyn Repository) {
    let username = unique("root");
    let admin = repo
        .create_admin(NewAdmin {
            username: username.clone(),
            password_hash: "$argon2id$placeholder".into(),
        })
        .await
        .unwrap();

    let found = repo.get_admin_by_username(&username).await.unwrap();
    assert_eq!(found.id, admin.id);
    assert_eq!(found.password_hash, "$argon2id$placeholder");

    repo.delete_admin(admin.id).await.unwrap();
    assert_eq!(
        repo.get_admin(admin.id).await.unwrap_err(),
        RepoError::NotFound("admin".into())
    );
}

async fn check_missing_user_listing(repo: &dyn Repository) {
    let err = repo
        .list_purchased_courses(Uuid::new_v4())
        .await
        .unwrap_err();
    assert_eq!(err, RepoError::NotFound("user".into()));
}

async fn run_contract(repo: &dyn Repository) {
    check_course_round_trip(repo).await;
    check_user_round_trip(repo).await;
    check_delete_twice(repo).await;
    check_purchase_then_list(repo).await;
    check_purchase_order_preserved(repo).await;
    check_purchase_missing_course(repo).await;
    check_purchase_missing_user(repo).await;
    check_duplicate_purchase(repo).await;
    check_dangling_reference_skipped(repo).await;
    check_username_uniqueness(repo).await;
    check_partial_update(repo).await;
    check_admin_lookup_by_username(repo).await;
    check_missing_user_listing(repo).await;
}

// --- In-Memory Runs ---

#[test]
async fn test_in_memory_contract() {
    run_contract(&InMemoryRepository::new()).await;
}

#[test]
async fn test_in_memory_delete_user_keeps_courses() {
    let repo = InMemoryRepository::new();
    let user = create_test_user(&repo, "leaver").await;
    let algebra = repo.create_course(course("Algebra")).await.unwrap();
    repo.add_purchased_course(user.id, algebra.id).await.unwrap();

    repo.delete_user(user.id).await.unwrap();

    assert_eq!(repo.get_course(algebra.id).await.unwrap(), algebra);
    assert!(repo.list_users().await.unwrap().is_empty());
}

#[test]
async fn test_in_memory_outage_is_storage_unavailable() {
    let repo = InMemoryRepository::new_failing();

    let err = repo.list_courses().await.unwrap_err();
    assert!(matches!(err, RepoError::StorageUnavailable(_)));

    let err = repo.get_user(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, RepoError::StorageUnavailable(_)));
}

// --- Postgres Runs ---

#[test]
#[ignore = "requires DATABASE_URL pointing at a disposable Postgres database"]
async fn test_postgres_contract() {
    let ctx = DbTestContext::setup().await;
    run_contract(&ctx.repository()).await;
}

#[test]
#[ignore = "requires DATABASE_URL pointing at a disposable Postgres database"]
async fn test_postgres_purchase_is_visible_on_fresh_read() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let user = create_test_user(&repo, "pg-student").await;
    let algebra = repo.create_course(course("Algebra")).await.unwrap();

    repo.add_purchased_course(user.id, algebra.id).await.unwrap();

    // A second handle on the same pool sees the write.
    let other = ctx.repository();
    assert_eq!(
        other.get_user(user.id).await.unwrap().purchased_courses,
        vec![algebra.id]
    );
}
