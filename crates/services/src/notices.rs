//! # Notice Store
//!
//! Notices are published by staff into the author's department and may
//! carry one file attachment. Readers only ever see notices for the
//! department they belong to right now.

use std::sync::Arc;

use domains::{
    AttachmentStorage, DepartmentRepository, DomainError, Identity, NewNotice, Notice, NoticeId,
    NoticeRepository, Result, StoredFile, Upload, UserId,
};
use tracing::{info, instrument, warn};

use crate::access::{ensure, Action};
use crate::validation::{required_text, FieldErrors, CONTENT_MAX, NOTICE_TITLE_MAX};

/// Default ceiling on attachment size (10 MiB).
pub const DEFAULT_MAX_ATTACHMENT_BYTES: usize = 10 * 1024 * 1024;

pub struct NoticeService {
    notices: Arc<dyn NoticeRepository>,
    departments: Arc<dyn DepartmentRepository>,
    storage: Arc<dyn AttachmentStorage>,
    max_attachment_bytes: usize,
}

impl NoticeService {
    pub fn new(
        notices: Arc<dyn NoticeRepository>,
        departments: Arc<dyn DepartmentRepository>,
        storage: Arc<dyn AttachmentStorage>,
    ) -> Self {
        Self {
            notices,
            departments,
            storage,
            max_attachment_bytes: DEFAULT_MAX_ATTACHMENT_BYTES,
        }
    }

    pub fn with_max_attachment_bytes(mut self, limit: usize) -> Self {
        self.max_attachment_bytes = limit;
        self
    }

    /// Publishes a notice into the author's department.
    ///
    /// Authorization and validation finish before the attachment is
    /// stored. If the notice row cannot be written afterwards, the stored
    /// file is removed again.
    #[instrument(skip(self, actor, title, content, upload), fields(actor = actor.user_id))]
    pub async fn create(
        &self,
        actor: &Identity,
        title: &str,
        content: &str,
        upload: Option<Upload>,
    ) -> Result<Notice> {
        ensure(actor, Action::CreateNotice)?;
        let (title, content) = validate(title, content)?;
        if let Some(upload) = &upload {
            if upload.bytes.len() > self.max_attachment_bytes {
                return Err(DomainError::validation(format!(
                    "attachment must be at most {} bytes",
                    self.max_attachment_bytes
                )));
            }
        }

        let department_id = actor.department_id.ok_or_else(|| {
            DomainError::forbidden("accounts without a department cannot publish notices")
        })?;
        if self.departments.find_by_id(department_id).await?.is_none() {
            return Err(DomainError::not_found("department"));
        }

        let attachment = match upload {
            Some(upload) => Some(self.storage.save(upload).await?),
            None => None,
        };

        let inserted = self
            .notices
            .insert(NewNotice {
                title,
                content,
                user_id: actor.user_id,
                department_id,
                attachment: attachment.clone(),
            })
            .await;

        match inserted {
            Ok(notice) => {
                info!(notice_id = notice.id, department_id, "notice created");
                Ok(notice)
            }
            Err(err) => {
                if let Some(filename) = attachment {
                    self.discard_attachment(&filename).await;
                }
                Err(err)
            }
        }
    }

    /// Notices for the reader's current department. Accounts without a
    /// department see none.
    pub async fn list_for_user(&self, actor: &Identity) -> Result<Vec<Notice>> {
        match actor.department_id {
            Some(department_id) => self.notices.list_by_department(department_id).await,
            None => Ok(Vec::new()),
        }
    }

    /// Everything `user_id` has published, in any department.
    pub async fn list_by_author(&self, user_id: UserId) -> Result<Vec<Notice>> {
        self.notices.list_by_author(user_id).await
    }

    #[instrument(skip(self, actor, title, content), fields(actor = actor.user_id))]
    pub async fn update(
        &self,
        actor: &Identity,
        id: NoticeId,
        title: &str,
        content: &str,
    ) -> Result<Notice> {
        let (title, content) = validate(title, content)?;
        let notice = self.get(id).await?;
        ensure(actor, Action::UpdateNotice { owner_id: notice.user_id })?;
        let notice = self.notices.update(id, title, content).await?;
        info!(notice_id = id, "notice updated");
        Ok(notice)
    }

    #[instrument(skip(self, actor), fields(actor = actor.user_id))]
    pub async fn delete(&self, actor: &Identity, id: NoticeId) -> Result<()> {
        let notice = self.get(id).await?;
        ensure(actor, Action::DeleteNotice { owner_id: notice.user_id })?;
        self.notices.delete(id).await?;
        if let Some(filename) = &notice.attachment {
            self.discard_attachment(filename).await;
        }
        info!(notice_id = id, "notice deleted");
        Ok(())
    }

    pub async fn attachment(&self, actor: &Identity, id: NoticeId) -> Result<StoredFile> {
        let notice = self.get(id).await?;
        ensure(
            actor,
            Action::ReadNoticeAttachment {
                owner_id: notice.user_id,
                department_id: notice.department_id,
            },
        )?;
        let filename = notice
            .attachment
            .ok_or_else(|| DomainError::not_found("attachment"))?;
        self.storage.load(&filename).await
    }

    async fn get(&self, id: NoticeId) -> Result<Notice> {
        self.notices
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::not_found("notice"))
    }

    async fn discard_attachment(&self, filename: &str) {
        if let Err(err) = self.storage.delete(filename).await {
            warn!(filename, error = %err, "failed to remove attachment");
        }
    }
}

fn validate(title: &str, content: &str) -> Result<(String, String)> {
    let mut errors = FieldErrors::new();
    let title = required_text(&mut errors, "title", title, NOTICE_TITLE_MAX);
    let content = required_text(&mut errors, "content", content, CONTENT_MAX);
    errors.finish()?;
    Ok((title, content))
}
