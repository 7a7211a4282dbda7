use domains::DomainError;
use integration_tests::TestApp;

#[tokio::test]
async fn commenting_across_departments_is_forbidden() {
    let app = TestApp::new();
    let admin = app.admin().await;
    let cs = app.department(&admin, "CS").await;
    let ee = app.department(&admin, "EE").await;
    let alice = app.member("alice@campus.edu", "STUDENT", Some(cs.id)).await;
    let bob = app.member("bob@campus.edu", "STUDENT", Some(ee.id)).await;

    let post = app
        .services
        .posts
        .create(&alice, "hello", None, cs.id)
        .await
        .unwrap();
    assert_eq!(post.department_id, cs.id);

    let err = app
        .services
        .comments
        .create(&bob, post.id, "hi from EE", Some(cs.id))
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::Forbidden(_)));
}

#[tokio::test]
async fn posting_outside_your_department_is_forbidden() {
    let app = TestApp::new();
    let admin = app.admin().await;
    let cs = app.department(&admin, "CS").await;
    let ee = app.department(&admin, "EE").await;
    let alice = app.member("alice@campus.edu", "STUDENT", Some(cs.id)).await;

    let err = app
        .services
        .posts
        .create(&alice, "wrong board", None, ee.id)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::Forbidden(_)));

    let err = app
        .services
        .posts
        .create(&admin, "admins have no board", None, cs.id)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::Forbidden(_)));
}

#[tokio::test]
async fn comments_take_the_posts_department() {
    let app = TestApp::new();
    let admin = app.admin().await;
    let cs = app.department(&admin, "CS").await;
    let ee = app.department(&admin, "EE").await;
    let alice = app.member("alice@campus.edu", "STUDENT", Some(cs.id)).await;
    let carol = app.member("carol@campus.edu", "STUDENT", Some(cs.id)).await;

    let post = app.services.posts.create(&alice, "hello", None, cs.id).await.unwrap();
    let comment = app
        .services
        .comments
        .create(&carol, post.id, "welcome", Some(ee.id))
        .await
        .unwrap();
    assert_eq!(comment.department_id, post.department_id);

    let listed = app.services.comments.list_by_post(post.id).await.unwrap();
    assert_eq!(listed.len(), 1);
}

#[tokio::test]
async fn students_only_touch_their_own_posts() {
    let app = TestApp::new();
    let admin = app.admin().await;
    let cs = app.department(&admin, "CS").await;
    let alice = app.member("alice@campus.edu", "STUDENT", Some(cs.id)).await;
    let carol = app.member("carol@campus.edu", "STUDENT", Some(cs.id)).await;
    let post = app.services.posts.create(&alice, "mine", None, cs.id).await.unwrap();

    let err = app
        .services
        .posts
        .update(&carol, post.id, "hijacked", None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::Forbidden(_)));
    let err = app.services.posts.delete(&carol, post.id).await.unwrap_err();
    assert!(matches!(err, DomainError::Forbidden(_)));

    let updated = app
        .services
        .posts
        .update(&alice, post.id, "still mine", Some("Title".into()), None)
        .await
        .unwrap();
    assert_eq!(updated.content, "still mine");
    assert_eq!(updated.title.as_deref(), Some("Title"));
    app.services.posts.delete(&alice, post.id).await.unwrap();
}

#[tokio::test]
async fn teachers_and_admins_moderate_any_post_or_comment() {
    let app = TestApp::new();
    let admin = app.admin().await;
    let cs = app.department(&admin, "CS").await;
    let ee = app.department(&admin, "EE").await;
    let alice = app.member("alice@campus.edu", "STUDENT", Some(cs.id)).await;
    let teacher = app.member("tom@campus.edu", "TEACHER", Some(ee.id)).await;

    let post = app.services.posts.create(&alice, "hello", None, cs.id).await.unwrap();
    let comment = app
        .services
        .comments
        .create(&alice, post.id, "bump", None)
        .await
        .unwrap();

    app.services
        .comments
        .update(&teacher, comment.id, "[edited by staff]")
        .await
        .unwrap();
    app.services.comments.delete(&admin, comment.id).await.unwrap();
    app.services
        .posts
        .update(&admin, post.id, "moderated", None, None)
        .await
        .unwrap();
    app.services.posts.delete(&teacher, post.id).await.unwrap();

    let err = app.services.posts.get(post.id).await.unwrap_err();
    assert_eq!(err, DomainError::not_found("post"));
}

#[tokio::test]
async fn moving_a_post_requires_an_existing_department() {
    let app = TestApp::new();
    let admin = app.admin().await;
    let cs = app.department(&admin, "CS").await;
    let alice = app.member("alice@campus.edu", "STUDENT", Some(cs.id)).await;
    let post = app.services.posts.create(&alice, "hello", None, cs.id).await.unwrap();

    let err = app
        .services
        .posts
        .update(&alice, post.id, "moved", None, Some(999))
        .await
        .unwrap_err();
    assert_eq!(err, DomainError::not_found("department"));
}

#[tokio::test]
async fn department_names_are_unique_ignoring_case() {
    let app = TestApp::new();
    let admin = app.admin().await;
    app.department(&admin, "Math").await;

    let err = app
        .services
        .departments
        .create(&admin, "math", None)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::Conflict(_)));

    let physics = app.department(&admin, "Physics").await;
    let err = app
        .services
        .departments
        .rename(&admin, physics.id, "MATH", None)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::Conflict(_)));
}

#[tokio::test]
async fn departments_in_use_cannot_be_deleted() {
    let app = TestApp::new();
    let admin = app.admin().await;
    let cs = app.department(&admin, "CS").await;
    let empty = app.department(&admin, "Empty").await;
    app.member("alice@campus.edu", "STUDENT", Some(cs.id)).await;

    let err = app.services.departments.delete(&admin, cs.id).await.unwrap_err();
    assert!(matches!(err, DomainError::Conflict(_)));

    app.services.departments.delete(&admin, empty.id).await.unwrap();
    let names: Vec<String> = app
        .services
        .departments
        .list()
        .await
        .unwrap()
        .into_iter()
        .map(|d| d.name)
        .collect();
    assert_eq!(names, vec!["CS"]);
}

#[tokio::test]
async fn only_admins_manage_departments() {
    let app = TestApp::new();
    let admin = app.admin().await;
    let cs = app.department(&admin, "CS").await;
    let teacher = app.member("tom@campus.edu", "TEACHER", Some(cs.id)).await;

    let err = app
        .services
        .departments
        .create(&teacher, "Rogue", None)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::Forbidden(_)));
}

#[tokio::test]
async fn all_posts_span_departments_newest_first() {
    let app = TestApp::new();
    let admin = app.admin().await;
    let cs = app.department(&admin, "CS").await;
    let ee = app.department(&admin, "EE").await;
    let alice = app.member("alice@campus.edu", "STUDENT", Some(cs.id)).await;
    let bob = app.member("bob@campus.edu", "STUDENT", Some(ee.id)).await;

    let first = app.services.posts.create(&alice, "first", None, cs.id).await.unwrap();
    let second = app.services.posts.create(&bob, "second", None, ee.id).await.unwrap();

    let all = app.services.posts.list_all().await.unwrap();
    let ids: Vec<_> = all.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![second.id, first.id]);

    let mine = app.services.posts.list_by_user(alice.user_id).await.unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].id, first.id);
}
