//! Career repository: resumes and job applications.
//!
//! # Invariants
//! - Embedded lists (feedback, contacts, reminders, interview dates) live in
//!   JSON columns and are rewritten whole inside a transaction, so appends
//!   never interleave.
//! - `extracted_text` never appears in the default resume read model.
//! - Application status changes go through the pipeline state machine.

use crate::model::application::{
    Application, ApplicationId, ApplicationStatus, Contact, FollowUpReminder, NewApplication,
};
use crate::model::resume::{FeedbackEntry, NewResume, Resume, ResumeId};
use crate::model::user::UserId;
use crate::model::ValidationError;
use crate::repo::{ensure_schema, parse_uuid, RepoError, RepoResult, TableRequirement};
use rusqlite::{params, Connection, Row};
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

const RESUME_SELECT_SQL: &str = "SELECT
    uuid,
    user_id,
    file_name,
    file_url,
    file_size,
    mime_type,
    version,
    target_role,
    uploaded_at,
    feedback
FROM resumes";

const APPLICATION_SELECT_SQL: &str = "SELECT
    uuid,
    user_id,
    company,
    position,
    location,
    job_url,
    status,
    applied_at,
    deadline_date,
    resume_used,
    interview_dates,
    contacts,
    follow_up_reminders,
    notes,
    created_at,
    updated_at
FROM applications";

/// Repository interface for resumes and applications.
pub trait CareerRepository {
    /// Stores one resume; `extracted_text` starts empty.
    fn create_resume(&self, resume: &NewResume, now_ms: i64) -> RepoResult<ResumeId>;
    /// Gets one resume without its extracted text.
    fn get_resume(&self, id: ResumeId) -> RepoResult<Option<Resume>>;
    /// A user's resumes, newest upload first.
    fn list_resumes(&self, user_id: UserId) -> RepoResult<Vec<Resume>>;
    /// Stores parsed text for a resume.
    fn set_extracted_text(&self, id: ResumeId, text: &str) -> RepoResult<()>;
    /// Explicit accessor for the privileged extracted text.
    fn get_extracted_text(&self, id: ResumeId) -> RepoResult<Option<String>>;
    /// Appends one AI feedback entry to a resume.
    fn append_feedback(&self, id: ResumeId, entry: &FeedbackEntry) -> RepoResult<()>;

    /// Creates one application in the `applied` stage.
    fn create_application(
        &self,
        application: &NewApplication,
        now_ms: i64,
    ) -> RepoResult<ApplicationId>;
    /// Gets one application.
    fn get_application(&self, id: ApplicationId) -> RepoResult<Option<Application>>;
    /// A user's applications, most recently applied first.
    fn list_applications(&self, user_id: UserId) -> RepoResult<Vec<Application>>;
    /// Advances an application through the pipeline.
    fn set_application_status(
        &self,
        id: ApplicationId,
        status: ApplicationStatus,
        now_ms: i64,
    ) -> RepoResult<()>;
    /// Appends one interview date.
    fn add_interview_date(&self, id: ApplicationId, date: i64, now_ms: i64) -> RepoResult<()>;
    /// Appends one recruiting contact.
    fn add_contact(&self, id: ApplicationId, contact: &Contact, now_ms: i64) -> RepoResult<()>;
    /// Appends one follow-up reminder.
    fn add_reminder(
        &self,
        id: ApplicationId,
        reminder: &FollowUpReminder,
        now_ms: i64,
    ) -> RepoResult<()>;
    /// Marks the reminder at `index` as completed.
    fn complete_reminder(&self, id: ApplicationId, index: usize, now_ms: i64) -> RepoResult<()>;
}

/// SQLite-backed career repository.
pub struct SqliteCareerRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCareerRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema(
            conn,
            &[
                TableRequirement {
                    table: "resumes",
                    columns: &[
                        "uuid",
                        "user_id",
                        "file_name",
                        "file_url",
                        "file_size",
                        "mime_type",
                        "version",
                        "target_role",
                        "uploaded_at",
                        "extracted_text",
                        "feedback",
                    ],
                },
                TableRequirement {
                    table: "applications",
                    columns: &[
                        "uuid",
                        "user_id",
                        "company",
                        "position",
                        "location",
                        "job_url",
                        "status",
                        "applied_at",
                        "deadline_date",
                        "resume_used",
                        "interview_dates",
                        "contacts",
                        "follow_up_reminders",
                        "notes",
                        "created_at",
                        "updated_at",
                    ],
                },
            ],
        )?;
        Ok(Self { conn })
    }

    /// Reads, extends and rewrites one JSON list column atomically.
    fn append_to_json_list<T>(
        &self,
        table: &'static str,
        column: &str,
        id: Uuid,
        item: &T,
        now_ms: Option<i64>,
    ) -> RepoResult<()>
    where
        T: Serialize + DeserializeOwned + Clone,
    {
        let tx = self.conn.unchecked_transaction()?;

        let current: Option<String> = {
            let mut stmt = tx.prepare(&format!(
                "SELECT {column} FROM {table} WHERE uuid = ?1;"
            ))?;
            let mut rows = stmt.query([id.to_string()])?;
            match rows.next()? {
                Some(row) => Some(row.get(0)?),
                None => None,
            }
        };
        let current = current.ok_or(RepoError::NotFound {
            collection: table,
            id,
        })?;

        let mut items: Vec<T> = decode_json_list(&current, table, column)?;
        items.push(item.clone());
        let updated = encode_json_list(&items, table, column)?;

        match now_ms {
            Some(now_ms) => tx.execute(
                &format!("UPDATE {table} SET {column} = ?2, updated_at = ?3 WHERE uuid = ?1;"),
                params![id.to_string(), updated, now_ms],
            )?,
            None => tx.execute(
                &format!("UPDATE {table} SET {column} = ?2 WHERE uuid = ?1;"),
                params![id.to_string(), updated],
            )?,
        };

        tx.commit()?;
        Ok(())
    }
}

impl CareerRepository for SqliteCareerRepository<'_> {
    fn create_resume(&self, resume: &NewResume, now_ms: i64) -> RepoResult<ResumeId> {
        resume.validate()?;

        let uuid = Uuid::new_v4();
        self.conn.execute(
            "INSERT INTO resumes (
                uuid,
                user_id,
                file_name,
                file_url,
                file_size,
                mime_type,
                version,
                target_role,
                uploaded_at,
                extracted_text,
                feedback
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, NULL, '[]');",
            params![
                uuid.to_string(),
                resume.user_id.to_string(),
                resume.file_name.as_str(),
                resume.file_url.as_str(),
                resume.file_size,
                resume.mime_type.as_str(),
                resume.version.as_str(),
                resume.target_role.as_deref(),
                now_ms,
            ],
        )?;

        Ok(uuid)
    }

    fn get_resume(&self, id: ResumeId) -> RepoResult<Option<Resume>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{RESUME_SELECT_SQL} WHERE uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_resume_row(row)?));
        }
        Ok(None)
    }

    fn list_resumes(&self, user_id: UserId) -> RepoResult<Vec<Resume>> {
        let mut stmt = self.conn.prepare(&format!(
            "{RESUME_SELECT_SQL} WHERE user_id = ?1 ORDER BY uploaded_at DESC, uuid ASC;"
        ))?;
        let mut rows = stmt.query([user_id.to_string()])?;

        let mut resumes = Vec::new();
        while let Some(row) = rows.next()? {
            resumes.push(parse_resume_row(row)?);
        }
        Ok(resumes)
    }

    fn set_extracted_text(&self, id: ResumeId, text: &str) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE resumes SET extracted_text = ?2 WHERE uuid = ?1;",
            params![id.to_string(), text],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                collection: "resumes",
                id,
            });
        }
        Ok(())
    }

    fn get_extracted_text(&self, id: ResumeId) -> RepoResult<Option<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT extracted_text FROM resumes WHERE uuid = ?1;")?;
        let mut rows = stmt.query([id.to_string()])?;
        match rows.next()? {
            Some(row) => Ok(row.get(0)?),
            None => Err(RepoError::NotFound {
                collection: "resumes",
                id,
            }),
        }
    }

    fn append_feedback(&self, id: ResumeId, entry: &FeedbackEntry) -> RepoResult<()> {
        self.append_to_json_list("resumes", "feedback", id, entry, None)
    }

    fn create_application(
        &self,
        application: &NewApplication,
        now_ms: i64,
    ) -> RepoResult<ApplicationId> {
        application.validate()?;

        if let Some(resume_id) = application.resume_used {
            let mut stmt = self
                .conn
                .prepare("SELECT 1 FROM resumes WHERE uuid = ?1;")?;
            if !stmt.exists([resume_id.to_string()])? {
                return Err(RepoError::ReferenceNotFound {
                    collection: "resumes",
                    id: resume_id,
                });
            }
        }

        let uuid = Uuid::new_v4();
        self.conn.execute(
            "INSERT INTO applications (
                uuid,
                user_id,
                company,
                position,
                location,
                job_url,
                status,
                applied_at,
                deadline_date,
                resume_used,
                interview_dates,
                contacts,
                follow_up_reminders,
                notes,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'applied', ?7, ?8, ?9, '[]', '[]', '[]', ?10, ?11, ?11);",
            params![
                uuid.to_string(),
                application.user_id.to_string(),
                application.company.as_str(),
                application.position.as_str(),
                application.location.as_deref(),
                application.job_url.as_deref(),
                application.applied_at,
                application.deadline_date,
                application.resume_used.map(|id| id.to_string()),
                application.notes.as_deref(),
                now_ms,
            ],
        )?;

        Ok(uuid)
    }

    fn get_application(&self, id: ApplicationId) -> RepoResult<Option<Application>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{APPLICATION_SELECT_SQL} WHERE uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_application_row(row)?));
        }
        Ok(None)
    }

    fn list_applications(&self, user_id: UserId) -> RepoResult<Vec<Application>> {
        let mut stmt = self.conn.prepare(&format!(
            "{APPLICATION_SELECT_SQL} WHERE user_id = ?1 ORDER BY applied_at DESC, uuid ASC;"
        ))?;
        let mut rows = stmt.query([user_id.to_string()])?;

        let mut applications = Vec::new();
        while let Some(row) = rows.next()? {
            applications.push(parse_application_row(row)?);
        }
        Ok(applications)
    }

    fn set_application_status(
        &self,
        id: ApplicationId,
        status: ApplicationStatus,
        now_ms: i64,
    ) -> RepoResult<()> {
        let current = self.get_application(id)?.ok_or(RepoError::NotFound {
            collection: "applications",
            id,
        })?;
        current.status.check_transition(status)?;

        self.conn.execute(
            "UPDATE applications SET status = ?2, updated_at = ?3 WHERE uuid = ?1;",
            params![id.to_string(), status.as_str(), now_ms],
        )?;
        Ok(())
    }

    fn add_interview_date(&self, id: ApplicationId, date: i64, now_ms: i64) -> RepoResult<()> {
        self.append_to_json_list("applications", "interview_dates", id, &date, Some(now_ms))
    }

    fn add_contact(&self, id: ApplicationId, contact: &Contact, now_ms: i64) -> RepoResult<()> {
        self.append_to_json_list("applications", "contacts", id, contact, Some(now_ms))
    }

    fn add_reminder(
        &self,
        id: ApplicationId,
        reminder: &FollowUpReminder,
        now_ms: i64,
    ) -> RepoResult<()> {
        self.append_to_json_list(
            "applications",
            "follow_up_reminders",
            id,
            reminder,
            Some(now_ms),
        )
    }

    fn complete_reminder(&self, id: ApplicationId, index: usize, now_ms: i64) -> RepoResult<()> {
        let tx = self.conn.unchecked_transaction()?;

        let current: Option<String> = {
            let mut stmt =
                tx.prepare("SELECT follow_up_reminders FROM applications WHERE uuid = ?1;")?;
            let mut rows = stmt.query([id.to_string()])?;
            match rows.next()? {
                Some(row) => Some(row.get(0)?),
                None => None,
            }
        };
        let current = current.ok_or(RepoError::NotFound {
            collection: "applications",
            id,
        })?;

        let mut reminders: Vec<FollowUpReminder> =
            decode_json_list(&current, "applications", "follow_up_reminders")?;
        let reminder = reminders.get_mut(index).ok_or_else(|| {
            RepoError::Validation(ValidationError::invalid(
                "reminder_index",
                format!("no follow-up reminder at index {index}"),
            ))
        })?;
        reminder.completed = true;

        let updated = encode_json_list(&reminders, "applications", "follow_up_reminders")?;
        tx.execute(
            "UPDATE applications SET follow_up_reminders = ?2, updated_at = ?3 WHERE uuid = ?1;",
            params![id.to_string(), updated, now_ms],
        )?;
        tx.commit()?;
        Ok(())
    }
}

fn decode_json_list<T: DeserializeOwned>(
    text: &str,
    table: &str,
    column: &str,
) -> RepoResult<Vec<T>> {
    serde_json::from_str(text)
        .map_err(|err| RepoError::InvalidData(format!("invalid JSON in {table}.{column}: {err}")))
}

fn encode_json_list<T: Serialize>(items: &[T], table: &str, column: &str) -> RepoResult<String> {
    serde_json::to_string(items)
        .map_err(|err| RepoError::InvalidData(format!("unserializable {table}.{column}: {err}")))
}

fn parse_resume_row(row: &Row<'_>) -> RepoResult<Resume> {
    let uuid_text: String = row.get("uuid")?;
    let user_text: String = row.get("user_id")?;
    let feedback_text: String = row.get("feedback")?;

    Ok(Resume {
        uuid: parse_uuid(&uuid_text, "resumes.uuid")?,
        user_id: parse_uuid(&user_text, "resumes.user_id")?,
        file_name: row.get("file_name")?,
        file_url: row.get("file_url")?,
        file_size: row.get("file_size")?,
        mime_type: row.get("mime_type")?,
        version: row.get("version")?,
        target_role: row.get("target_role")?,
        uploaded_at: row.get("uploaded_at")?,
        feedback: decode_json_list(&feedback_text, "resumes", "feedback")?,
    })
}

fn parse_application_row(row: &Row<'_>) -> RepoResult<Application> {
    let uuid_text: String = row.get("uuid")?;
    let user_text: String = row.get("user_id")?;
    let resume_text: Option<String> = row.get("resume_used")?;

    let status_text: String = row.get("status")?;
    let status = ApplicationStatus::parse(&status_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid status `{status_text}` in applications.status"
        ))
    })?;

    let interview_text: String = row.get("interview_dates")?;
    let contacts_text: String = row.get("contacts")?;
    let reminders_text: String = row.get("follow_up_reminders")?;

    let resume_used = match resume_text {
        Some(text) => Some(parse_uuid(&text, "applications.resume_used")?),
        None => None,
    };

    Ok(Application {
        uuid: parse_uuid(&uuid_text, "applications.uuid")?,
        user_id: parse_uuid(&user_text, "applications.user_id")?,
        company: row.get("company")?,
        position: row.get("position")?,
        location: row.get("location")?,
        job_url: row.get("job_url")?,
        status,
        applied_at: row.get("applied_at")?,
        deadline_date: row.get("deadline_date")?,
        resume_used,
        interview_dates: decode_json_list(&interview_text, "applications", "interview_dates")?,
        contacts: decode_json_list(&contacts_text, "applications", "contacts")?,
        follow_up_reminders: decode_json_list(
            &reminders_text,
            "applications",
            "follow_up_reminders",
        )?,
        notes: row.get("notes")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
