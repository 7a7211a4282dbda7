//! # Department Registry
//!
//! Department names are trimmed, 2 to 50 characters, and unique ignoring
//! case. A department cannot be removed while users belong to it.

use std::sync::Arc;

use domains::{
    Department, DepartmentId, DepartmentRepository, DomainError, Identity, NewDepartment, Result,
    UserRepository,
};
use tracing::{info, instrument};

use crate::access::{ensure, Action};
use crate::validation::{
    normalize_optional, FieldErrors, DEPARTMENT_DESCRIPTION_MAX, DEPARTMENT_NAME_MAX,
    DEPARTMENT_NAME_MIN,
};

pub struct DepartmentService {
    departments: Arc<dyn DepartmentRepository>,
    users: Arc<dyn UserRepository>,
}

impl DepartmentService {
    pub fn new(departments: Arc<dyn DepartmentRepository>, users: Arc<dyn UserRepository>) -> Self {
        Self { departments, users }
    }

    #[instrument(skip(self, actor, description), fields(actor = actor.user_id))]
    pub async fn create(
        &self,
        actor: &Identity,
        name: &str,
        description: Option<String>,
    ) -> Result<Department> {
        ensure(actor, Action::CreateDepartment)?;
        let input = validate(name, description)?;

        if self.departments.find_by_name(&input.name).await?.is_some() {
            return Err(duplicate_name(&input.name));
        }
        let department = self.departments.insert(input).await?;
        info!(department_id = department.id, "department created");
        Ok(department)
    }

    /// Renames a department. `description` replaces the stored one when
    /// given and keeps it otherwise.
    #[instrument(skip(self, actor, description), fields(actor = actor.user_id))]
    pub async fn rename(
        &self,
        actor: &Identity,
        id: DepartmentId,
        name: &str,
        description: Option<String>,
    ) -> Result<Department> {
        ensure(actor, Action::UpdateDepartment)?;
        let mut input = validate(name, description)?;

        let current = self
            .departments
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::not_found("department"))?;
        if let Some(holder) = self.departments.find_by_name(&input.name).await? {
            if holder.id != id {
                return Err(duplicate_name(&input.name));
            }
        }
        if input.description.is_none() {
            input.description = current.description;
        }

        let department = self.departments.update(id, input).await?;
        info!(department_id = id, "department updated");
        Ok(department)
    }

    #[instrument(skip(self, actor), fields(actor = actor.user_id))]
    pub async fn delete(&self, actor: &Identity, id: DepartmentId) -> Result<()> {
        ensure(actor, Action::DeleteDepartment)?;
        if self.departments.find_by_id(id).await?.is_none() {
            return Err(DomainError::not_found("department"));
        }
        let members = self.users.count_in_department(id).await?;
        if members > 0 {
            return Err(DomainError::conflict(format!(
                "department still has {members} member(s)"
            )));
        }
        // The repository re-checks membership atomically.
        self.departments.delete(id).await?;
        info!(department_id = id, "department deleted");
        Ok(())
    }

    pub async fn get(&self, id: DepartmentId) -> Result<Department> {
        self.departments
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::not_found("department"))
    }

    /// Ordered by name ascending.
    pub async fn list(&self) -> Result<Vec<Department>> {
        self.departments.list().await
    }
}

fn validate(name: &str, description: Option<String>) -> Result<NewDepartment> {
    let name = name.trim().to_string();
    let description = normalize_optional(description);

    let mut errors = FieldErrors::new();
    let len = name.chars().count();
    errors.check(
        (DEPARTMENT_NAME_MIN..=DEPARTMENT_NAME_MAX).contains(&len),
        format!(
            "name must be between {DEPARTMENT_NAME_MIN} and {DEPARTMENT_NAME_MAX} characters"
        ),
    );
    if let Some(text) = &description {
        errors.check(
            text.chars().count() <= DEPARTMENT_DESCRIPTION_MAX,
            format!("description must be at most {DEPARTMENT_DESCRIPTION_MAX} characters"),
        );
    }
    errors.finish()?;
    Ok(NewDepartment { name, description })
}

fn duplicate_name(name: &str) -> DomainError {
    DomainError::conflict(format!("a department named `{name}` already exists"))
}
