use continuum_core::db::open_db_in_memory;
use continuum_core::model::application::{
    ApplicationStatus, Contact, FollowUpReminder, NewApplication,
};
use continuum_core::model::resume::{FeedbackEntry, KeywordOptimization, NewResume};
use continuum_core::repo::career_repo::{CareerRepository, SqliteCareerRepository};
use continuum_core::RepoError;
use uuid::Uuid;

fn resume_for(user_id: Uuid) -> NewResume {
    NewResume {
        user_id,
        file_name: "resume.pdf".to_string(),
        file_url: "https://cdn.continuum.dev/resumes/v1.pdf".to_string(),
        file_size: 245_000,
        mime_type: "application/pdf".to_string(),
        version: "Software Engineer v1".to_string(),
        target_role: Some("Backend Engineer".to_string()),
    }
}

fn application_for(user_id: Uuid, resume_used: Option<Uuid>) -> NewApplication {
    NewApplication {
        user_id,
        company: "Vertex Labs".to_string(),
        position: "Backend Engineer Intern".to_string(),
        location: None,
        job_url: None,
        applied_at: 1_000,
        deadline_date: None,
        resume_used,
        notes: None,
    }
}

fn feedback(score: i64, generated_at: i64) -> FeedbackEntry {
    FeedbackEntry {
        overall_score: score,
        strengths: vec!["clear project descriptions".to_string()],
        improvements: vec!["quantify impact".to_string()],
        sections: vec![],
        keyword_optimization: KeywordOptimization {
            present_keywords: vec!["rust".to_string()],
            missing_keywords: vec!["kubernetes".to_string()],
        },
        model: "llama-3.1-70b".to_string(),
        generated_at,
    }
}

#[test]
fn extracted_text_is_excluded_from_default_reads() {
    let conn = open_db_in_memory().unwrap();
    let career = SqliteCareerRepository::try_new(&conn).unwrap();
    let user = Uuid::new_v4();

    let id = career.create_resume(&resume_for(user), 1_000).unwrap();
    career
        .set_extracted_text(id, "EDUCATION\nB.Sc. Computer Science")
        .unwrap();

    // The default read model has no extracted_text field at all; the
    // explicit accessor is the only way to it.
    let resume = career.get_resume(id).unwrap().expect("resume exists");
    assert_eq!(resume.file_name, "resume.pdf");
    assert_eq!(
        career.get_extracted_text(id).unwrap().as_deref(),
        Some("EDUCATION\nB.Sc. Computer Science")
    );
}

#[test]
fn feedback_appends_and_latest_picks_newest_generation() {
    let conn = open_db_in_memory().unwrap();
    let career = SqliteCareerRepository::try_new(&conn).unwrap();
    let user = Uuid::new_v4();

    let id = career.create_resume(&resume_for(user), 1_000).unwrap();
    let fresh = career.get_resume(id).unwrap().expect("resume exists");
    assert!(!fresh.has_feedback());

    career.append_feedback(id, &feedback(72, 2_000)).unwrap();
    career.append_feedback(id, &feedback(86, 3_000)).unwrap();

    let reviewed = career.get_resume(id).unwrap().expect("resume exists");
    assert_eq!(reviewed.feedback.len(), 2);
    assert_eq!(
        reviewed.latest_feedback().map(|entry| entry.overall_score),
        Some(86)
    );
}

#[test]
fn application_references_an_existing_resume() {
    let conn = open_db_in_memory().unwrap();
    let career = SqliteCareerRepository::try_new(&conn).unwrap();
    let user = Uuid::new_v4();

    let result = career.create_application(&application_for(user, Some(Uuid::new_v4())), 1_000);
    assert!(matches!(
        result,
        Err(RepoError::ReferenceNotFound {
            collection: "resumes",
            ..
        })
    ));

    let resume_id = career.create_resume(&resume_for(user), 1_000).unwrap();
    let id = career
        .create_application(&application_for(user, Some(resume_id)), 1_000)
        .unwrap();
    let application = career.get_application(id).unwrap().expect("exists");
    assert_eq!(application.resume_used, Some(resume_id));
    assert_eq!(application.status, ApplicationStatus::Applied);
}

#[test]
fn pipeline_moves_forward_and_terminal_states_freeze() {
    let conn = open_db_in_memory().unwrap();
    let career = SqliteCareerRepository::try_new(&conn).unwrap();
    let user = Uuid::new_v4();

    let id = career
        .create_application(&application_for(user, None), 1_000)
        .unwrap();

    career
        .set_application_status(id, ApplicationStatus::Interview, 2_000)
        .unwrap();
    career
        .set_application_status(id, ApplicationStatus::Offer, 3_000)
        .unwrap();

    let application = career.get_application(id).unwrap().expect("exists");
    assert_eq!(application.status, ApplicationStatus::Offer);
    assert_eq!(application.updated_at, 3_000);

    assert!(matches!(
        career.set_application_status(id, ApplicationStatus::Rejected, 4_000),
        Err(RepoError::Transition(_))
    ));
    assert!(matches!(
        career.set_application_status(id, ApplicationStatus::Applied, 4_000),
        Err(RepoError::Transition(_))
    ));
}

#[test]
fn embedded_lists_append_in_order() {
    let conn = open_db_in_memory().unwrap();
    let career = SqliteCareerRepository::try_new(&conn).unwrap();
    let user = Uuid::new_v4();

    let id = career
        .create_application(&application_for(user, None), 1_000)
        .unwrap();

    career.add_interview_date(id, 5_000, 1_100).unwrap();
    career.add_interview_date(id, 9_000, 1_200).unwrap();
    career
        .add_contact(
            id,
            &Contact {
                name: "Priya Sharma".to_string(),
                role: Some("Recruiter".to_string()),
                email: Some("priya@vertexlabs.dev".to_string()),
                linked_in: None,
                last_contact_date: Some(1_150),
                notes: None,
            },
            1_150,
        )
        .unwrap();
    career
        .add_reminder(
            id,
            &FollowUpReminder {
                date: 9_500,
                description: "Send thank-you note".to_string(),
                completed: false,
            },
            1_250,
        )
        .unwrap();

    let application = career.get_application(id).unwrap().expect("exists");
    assert_eq!(application.interview_dates, vec![5_000, 9_000]);
    assert_eq!(application.contacts.len(), 1);
    assert_eq!(application.contacts[0].name, "Priya Sharma");
    assert_eq!(application.follow_up_reminders.len(), 1);
    assert!(!application.follow_up_reminders[0].completed);
    assert_eq!(application.updated_at, 1_250);
}

#[test]
fn zero_byte_resume_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let career = SqliteCareerRepository::try_new(&conn).unwrap();

    let mut resume = resume_for(Uuid::new_v4());
    resume.file_size = 0;

    assert!(matches!(
        career.create_resume(&resume, 1_000),
        Err(RepoError::Validation(_))
    ));
}

#[test]
fn completing_a_reminder_flips_only_that_entry() {
    let conn = open_db_in_memory().unwrap();
    let career = SqliteCareerRepository::try_new(&conn).unwrap();
    let user = Uuid::new_v4();

    let id = career
        .create_application(&application_for(user, None), 1_000)
        .unwrap();
    career
        .add_reminder(
            id,
            &FollowUpReminder {
                date: 5_000,
                description: "Follow up on application".to_string(),
                completed: false,
            },
            1_100,
        )
        .unwrap();
    career
        .add_reminder(
            id,
            &FollowUpReminder {
                date: 9_000,
                description: "Send thank-you note".to_string(),
                completed: false,
            },
            1_200,
        )
        .unwrap();

    career.complete_reminder(id, 0, 1_300).unwrap();

    let application = career.get_application(id).unwrap().expect("exists");
    assert!(application.follow_up_reminders[0].completed);
    assert!(!application.follow_up_reminders[1].completed);
    assert_eq!(application.updated_at, 1_300);

    assert!(matches!(
        career.complete_reminder(id, 5, 1_400),
        Err(RepoError::Validation(_))
    ));
}
