use course_portal::models::{Admin, CoursePatch, CreateUserRequest, UpdateAccountRequest, User};
use uuid::Uuid;

#[test]
fn test_user_password_hash_never_serialized() {
    let user = User {
        id: Uuid::new_v4(),
        username: "alice".into(),
        password_hash: Some("$argon2id$v=19$secret".into()),
        purchased_courses: vec![Uuid::new_v4()],
    };

    let json_output = serde_json::to_string(&user).unwrap();

    assert!(json_output.contains(r#""username":"alice""#));
    assert!(json_output.contains("purchased_courses"));
    assert!(!json_output.contains("password_hash"));
    assert!(!json_output.contains("argon2"));
}

#[test]
fn test_admin_password_hash_never_serialized() {
    let admin = Admin {
        id: Uuid::new_v4(),
        username: "root".into(),
        password_hash: "$argon2id$v=19$secret".into(),
    };

    let json_output = serde_json::to_string(&admin).unwrap();
    assert!(!json_output.contains("password_hash"));
}

#[test]
fn test_user_ignores_client_supplied_hash() {
    // A hash smuggled in through JSON is dropped on the way in.
    let json = format!(
        r#"{{ "id": "{}", "username": "eve", "password_hash": "forged", "purchased_courses": [] }}"#,
        Uuid::new_v4()
    );
    let user: User = serde_json::from_str(&json).unwrap();
    assert!(user.password_hash.is_none());
}

#[test]
fn test_create_user_request_name_alias() {
    let by_name: CreateUserRequest = serde_json::from_str(r#"{ "name": "bob" }"#).unwrap();
    let by_username: CreateUserRequest =
        serde_json::from_str(r#"{ "username": "bob", "password": "long-enough" }"#).unwrap();

    assert_eq!(by_name.username, "bob");
    assert!(by_name.password.is_none());
    assert_eq!(by_username.username, "bob");
    assert_eq!(by_username.password.as_deref(), Some("long-enough"));
}

#[test]
fn test_course_patch_optionality() {
    let patch = CoursePatch {
        title: Some("New Title Only".into()),
        image: None,
    };

    let json_output = serde_json::to_string(&patch).unwrap();

    assert!(json_output.contains(r#""title":"New Title Only""#));
    assert!(!json_output.contains("image")); // None fields are omitted
}

#[test]
fn test_update_account_request_all_fields_optional() {
    let empty: UpdateAccountRequest = serde_json::from_str("{}").unwrap();
    assert!(empty.username.is_none());
    assert!(empty.password.is_none());
}
