use std::sync::Arc;

use alunos::access::{StudentFilter, Students};
use alunos::auth::{AuthGate, Credentials, MemoryAuth};
use alunos::form::RecordForm;
use alunos::list::ListState;
use alunos::models::StudentInput;
use alunos::notify::{drain, Level, Notifier};
use alunos::store::memory::MemoryStore;

#[tokio::test]
async fn create_edit_delete_round() {
    let auth = MemoryAuth::default();
    auth.sign_up(&Credentials::new("prof@escola.com", "segredo"))
        .await
        .unwrap();
    let session = auth
        .sign_in(&Credentials::new("prof@escola.com", "segredo"))
        .await
        .unwrap();

    let (notifier, mut rx) = Notifier::channel();
    let students = Students::new(Arc::new(MemoryStore::new()), notifier);
    let mut list = ListState::for_students(&students);
    let ticket = list.reload();
    list.run(ticket, &students, &session).await;
    assert_eq!(list.total(), 0);

    let mut form = RecordForm::new();
    form.open(None);
    *form.draft_mut().unwrap() = StudentInput::new("Ana Silva", "ana@x.com", "M1");
    form.submit(&students, &session, &mut list).await.unwrap().unwrap();

    assert_eq!(list.total(), 1);
    let created = list.records()[0].clone();
    assert_eq!(created.name, "Ana Silva");
    assert_eq!(created.created_at, created.updated_at);

    form.open(Some(&created));
    form.draft_mut().unwrap().name = "Ana S.".into();
    form.submit(&students, &session, &mut list).await.unwrap().unwrap();

    let updated = list.records()[0].clone();
    assert_eq!(updated.id, created.id);
    assert_eq!(updated.name, "Ana S.");
    assert_eq!(updated.created_at, created.created_at);
    assert!(updated.updated_at > created.updated_at);

    students.delete(&session, created.id).await.unwrap();
    let ticket = list.reload();
    list.run(ticket, &students, &session).await;
    assert_eq!(list.total(), 0);
    assert!(list.records().is_empty());

    let notices = drain(&mut rx);
    let messages: Vec<&str> = notices.iter().map(|n| n.message.as_str()).collect();
    assert_eq!(
        messages,
        vec![
            "Aluno cadastrado com sucesso!",
            "Aluno atualizado com sucesso!",
            "Aluno removido com sucesso!"
        ]
    );
    assert!(notices.iter().all(|n| n.level == Level::Success));
}

#[tokio::test]
async fn paging_through_twenty_five_records() {
    let auth = MemoryAuth::default();
    auth.sign_up(&Credentials::new("prof@escola.com", "segredo"))
        .await
        .unwrap();
    let session = auth
        .sign_in(&Credentials::new("prof@escola.com", "segredo"))
        .await
        .unwrap();
    let students = Students::new(Arc::new(MemoryStore::new()), Notifier::log_only());
    for i in 0..25 {
        let input = StudentInput::new(
            format!("Aluno {:02}", i),
            format!("aluno{}@x.com", i),
            format!("M{}", i),
        );
        students.create(&session, &input).await.unwrap();
    }

    let mut list = ListState::for_students(&students);
    let ticket = list.reload();
    list.run(ticket, &students, &session).await;
    assert_eq!(list.total(), 25);
    assert_eq!(list.page_count(), 3);
    assert_eq!(list.records().len(), 10);
    assert_eq!(list.records()[0].name, "Aluno 24");

    assert!(list.set_page(0).is_none());
    assert!(list.set_page(4).is_none());

    let ticket = list.set_page(3).unwrap();
    list.run(ticket, &students, &session).await;
    assert_eq!(list.records().len(), 5);
    assert_eq!(list.records()[4].name, "Aluno 00");
    assert!(list.next_page().is_none());

    let page = students
        .list(
            &session,
            &StudentFilter {
                search: "aluno1".into(),
                course: String::new(),
                page: 1,
            },
        )
        .await
        .unwrap();
    // aluno1, aluno10..aluno19
    assert_eq!(page.total, 11);
}
