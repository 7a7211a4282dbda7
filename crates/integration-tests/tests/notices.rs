use bytes::Bytes;
use domains::{DomainError, Upload};
use integration_tests::TestApp;

fn upload(name: &str, body: &'static [u8]) -> Upload {
    Upload {
        original_name: name.to_string(),
        content_type: mime::TEXT_PLAIN,
        bytes: Bytes::from_static(body),
    }
}

#[tokio::test]
async fn notices_are_scoped_to_the_readers_department() {
    let app = TestApp::new();
    let admin = app.admin().await;
    let cs = app.department(&admin, "CS").await;
    let ee = app.department(&admin, "EE").await;
    let teacher = app.member("tom@campus.edu", "TEACHER", Some(cs.id)).await;
    let alice = app.member("alice@campus.edu", "STUDENT", Some(cs.id)).await;
    let bob = app.member("bob@campus.edu", "STUDENT", Some(ee.id)).await;

    let notice = app
        .services
        .notices
        .create(&teacher, "Exam", "Room 101", None)
        .await
        .unwrap();
    assert_eq!(notice.department_id, cs.id);

    assert_eq!(app.services.notices.list_for_user(&alice).await.unwrap().len(), 1);
    assert!(app.services.notices.list_for_user(&bob).await.unwrap().is_empty());
    assert!(app.services.notices.list_for_user(&admin).await.unwrap().is_empty());

    let authored = app
        .services
        .notices
        .list_by_author(teacher.user_id)
        .await
        .unwrap();
    assert_eq!(authored.len(), 1);
}

#[tokio::test]
async fn only_staff_publish_and_only_owners_or_admins_edit() {
    let app = TestApp::new();
    let admin = app.admin().await;
    let cs = app.department(&admin, "CS").await;
    let tom = app.member("tom@campus.edu", "TEACHER", Some(cs.id)).await;
    let tina = app.member("tina@campus.edu", "TEACHER", Some(cs.id)).await;
    let alice = app.member("alice@campus.edu", "STUDENT", Some(cs.id)).await;

    let err = app
        .services
        .notices
        .create(&alice, "Party", "Friday", None)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::Forbidden(_)));

    let notice = app
        .services
        .notices
        .create(&tom, "Exam", "Room 101", None)
        .await
        .unwrap();

    let err = app
        .services
        .notices
        .update(&tina, notice.id, "Cancelled", "Sorry")
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::Forbidden(_)));

    let updated = app
        .services
        .notices
        .update(&admin, notice.id, "Exam", "Room 202")
        .await
        .unwrap();
    assert_eq!(updated.content, "Room 202");

    app.services.notices.delete(&tom, notice.id).await.unwrap();
    assert!(app.services.notices.list_for_user(&alice).await.unwrap().is_empty());
}

#[tokio::test]
async fn attachments_follow_the_notice_lifecycle() {
    let app = TestApp::new();
    let admin = app.admin().await;
    let cs = app.department(&admin, "CS").await;
    let ee = app.department(&admin, "EE").await;
    let tom = app.member("tom@campus.edu", "TEACHER", Some(cs.id)).await;
    let alice = app.member("alice@campus.edu", "STUDENT", Some(cs.id)).await;
    let bob = app.member("bob@campus.edu", "STUDENT", Some(ee.id)).await;

    let notice = app
        .services
        .notices
        .create(&tom, "Syllabus", "Attached", Some(upload("syllabus.txt", b"week 1")))
        .await
        .unwrap();
    let filename = notice.attachment.clone().expect("attachment stored");
    assert_ne!(filename, "syllabus.txt");

    let file = app.services.notices.attachment(&alice, notice.id).await.unwrap();
    assert_eq!(file.bytes.as_ref(), b"week 1");

    let err = app.services.notices.attachment(&bob, notice.id).await.unwrap_err();
    assert!(matches!(err, DomainError::Forbidden(_)));
    app.services.notices.attachment(&admin, notice.id).await.unwrap();

    app.services.notices.delete(&tom, notice.id).await.unwrap();
    let on_disk = app
        .uploads
        .path()
        .join(&filename[0..2])
        .join(&filename[2..4])
        .join(&filename);
    assert!(!on_disk.exists());
}

#[tokio::test]
async fn notices_without_a_file_have_no_attachment_to_read() {
    let app = TestApp::new();
    let admin = app.admin().await;
    let cs = app.department(&admin, "CS").await;
    let tom = app.member("tom@campus.edu", "TEACHER", Some(cs.id)).await;

    let notice = app
        .services
        .notices
        .create(&tom, "Exam", "Room 101", None)
        .await
        .unwrap();
    let err = app.services.notices.attachment(&tom, notice.id).await.unwrap_err();
    assert_eq!(err, DomainError::not_found("attachment"));
}

#[tokio::test]
async fn blank_title_or_content_is_rejected_before_storage() {
    let app = TestApp::new();
    let admin = app.admin().await;
    let cs = app.department(&admin, "CS").await;
    let tom = app.member("tom@campus.edu", "TEACHER", Some(cs.id)).await;

    let err = app
        .services
        .notices
        .create(&tom, "  ", "", Some(upload("a.txt", b"x")))
        .await
        .unwrap_err();
    match err {
        DomainError::Validation(errors) => assert_eq!(errors.len(), 2),
        other => panic!("expected validation error, got {other:?}"),
    }
    let shards = std::fs::read_dir(app.uploads.path()).unwrap().count();
    assert_eq!(shards, 0);
}
