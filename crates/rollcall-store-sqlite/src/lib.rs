//! SQLite implementation of the rollcall [`Store`] trait.
//!
//! UUIDs are bound as their string form and timestamps as unix seconds, so
//! the schema stays portable across sqlite builds without type extensions.

use chrono::{DateTime, Utc};
use rollcall_config::ServiceConfig;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use uuid::Uuid;
use rollcall_storage::{
    AddMembershipParams, Company, CompanyId, CreateCompanyParams, CreateInvitationParams,
    CreateUserParams, Invitation, InvitationId, Membership, RoleKey, Store, StoreError, User,
    UserId,
};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// `~/.rollcall/store.db` (creates dir with 0700 perms on unix)
    pub async fn open_default() -> Result<Self, StoreError> {
        let dir = dirs::home_dir()
            .ok_or_else(|| StoreError::Backend("no home dir".into()))?
            .join(".rollcall");
        std::fs::create_dir_all(&dir).map_err(|e| StoreError::Backend(e.to_string()))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&dir, std::fs::Permissions::from_mode(0o700))
                .map_err(|e| StoreError::Backend(e.to_string()))?;
        }
        let path = dir.join("store.db");
        let url = format!("sqlite://{}", path.to_string_lossy());
        Self::open(&url).await
    }

    pub async fn open_in_memory() -> Result<Self, StoreError> {
        Self::open("sqlite::memory:").await
    }

    /// Open the database named by the service configuration, falling back
    /// to the default on-disk location when no URL is configured.
    pub async fn open_from_config(config: &ServiceConfig) -> Result<Self, StoreError> {
        match &config.database_url {
            Some(url) => Self::open(url).await,
            None => Self::open_default().await,
        }
    }

    pub async fn open(url: &str) -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(url)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        MIGRATOR
            .run(&pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(Self { pool })
    }
}

/// Map driver errors to `StoreError`. SQLite reports write contention as
/// "database is locked"; that becomes `Conflict` so callers can retry,
/// everything else is `Backend`.
fn backend(e: impl std::fmt::Display) -> StoreError {
    let s = e.to_string();
    if s.contains("database is locked") || s.contains("database table is locked") {
        StoreError::Conflict
    } else {
        StoreError::Backend(s)
    }
}

/// Map UNIQUE-constraint violations to `AlreadyExists`, everything else to
/// `Backend`.
fn unique_or_backend(e: sqlx::Error) -> StoreError {
    let s = e.to_string();
    if s.contains("UNIQUE") {
        StoreError::AlreadyExists
    } else {
        StoreError::Backend(s)
    }
}

fn parse_uuid(s: &str) -> Result<Uuid, StoreError> {
    Uuid::try_parse(s).map_err(backend)
}

fn dt(secs: i64) -> Result<DateTime<Utc>, StoreError> {
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| StoreError::Backend(format!("bad timestamp {secs}")))
}

type UserRow = (String, String, String, i64, i64);

fn user_from_row((id, name, email, created, updated): UserRow) -> Result<User, StoreError> {
    Ok(User {
        id: UserId(parse_uuid(&id)?),
        name,
        email,
        created_at: dt(created)?,
        updated_at: dt(updated)?,
    })
}

type CompanyRow = (String, String, String, i64, i64);

fn company_from_row((id, name, owner, created, updated): CompanyRow) -> Result<Company, StoreError> {
    Ok(Company {
        id: CompanyId(parse_uuid(&id)?),
        name,
        owner_user_id: UserId(parse_uuid(&owner)?),
        created_at: dt(created)?,
        updated_at: dt(updated)?,
    })
}

type MembershipRow = (String, String, String, Option<String>, i64);

fn membership_from_row(
    (company, user, role, invited_by, joined): MembershipRow,
) -> Result<Membership, StoreError> {
    Ok(Membership {
        company_id: CompanyId(parse_uuid(&company)?),
        user_id: UserId(parse_uuid(&user)?),
        role: RoleKey(role),
        invited_by: invited_by.as_deref().map(parse_uuid).transpose()?.map(UserId),
        joined_at: dt(joined)?,
    })
}

type InvitationRow = (String, String, String, String, String, String, i64, i64);

fn invitation_from_row(
    (id, company, email, role, token_hash, invited_by, created, expires): InvitationRow,
) -> Result<Invitation, StoreError> {
    Ok(Invitation {
        id: InvitationId(parse_uuid(&id)?),
        company_id: CompanyId(parse_uuid(&company)?),
        email,
        role: RoleKey(role),
        token_hash,
        invited_by: UserId(parse_uuid(&invited_by)?),
        created_at: dt(created)?,
        expires_at: dt(expires)?,
    })
}

#[async_trait::async_trait]
impl Store for SqliteStore {
    // ───────────────────────────── Users ──────────────────────────────────

    async fn create_user(&self, params: &CreateUserParams) -> Result<UserId, StoreError> {
        let id = Uuid::now_v7();
        let now = Utc::now().timestamp();
        sqlx::query("INSERT INTO users(id,name,email,created_at,updated_at) VALUES(?,?,?,?,?)")
            .bind(id.to_string())
            .bind(&params.name)
            .bind(&params.email)
            .bind(now)
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(unique_or_backend)?;
        Ok(UserId(id))
    }

    async fn get_user_by_id(&self, user_id: &UserId) -> Result<User, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id,name,email,created_at,updated_at FROM users WHERE id=?",
        )
        .bind(user_id.0.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        row.map(user_from_row).ok_or(StoreError::NotFound)?
    }

    async fn get_user_by_email(&self, email: &str) -> Result<User, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id,name,email,created_at,updated_at FROM users WHERE email=?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        row.map(user_from_row).ok_or(StoreError::NotFound)?
    }

    // ─────────────────────────── Companies ────────────────────────────────

    async fn create_company(&self, params: &CreateCompanyParams) -> Result<CompanyId, StoreError> {
        let id = Uuid::now_v7();
        let now = Utc::now().timestamp();

        // Company plus owner membership commit together: a company is never
        // observable without at least one member.
        let mut tx = self.pool.begin().await.map_err(backend)?;

        sqlx::query(
            "INSERT INTO companies(id,name,owner_user_id,created_at,updated_at) VALUES(?,?,?,?,?)",
        )
        .bind(id.to_string())
        .bind(&params.name)
        .bind(params.owner_user_id.0.to_string())
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(unique_or_backend)?;

        sqlx::query(
            "INSERT INTO memberships(company_id,user_id,role,invited_by,joined_at)
             VALUES(?,?,?,NULL,?)",
        )
        .bind(id.to_string())
        .bind(params.owner_user_id.0.to_string())
        .bind(params.owner_role.as_str())
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(unique_or_backend)?;

        tx.commit().await.map_err(backend)?;
        Ok(CompanyId(id))
    }

    async fn get_company(&self, company_id: &CompanyId) -> Result<Company, StoreError> {
        let row = sqlx::query_as::<_, CompanyRow>(
            "SELECT id,name,owner_user_id,created_at,updated_at FROM companies WHERE id=?",
        )
        .bind(company_id.0.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        row.map(company_from_row).ok_or(StoreError::NotFound)?
    }

    async fn list_user_companies(&self, user_id: &UserId) -> Result<Vec<Company>, StoreError> {
        let rows = sqlx::query_as::<_, CompanyRow>(
            "SELECT c.id,c.name,c.owner_user_id,c.created_at,c.updated_at
               FROM companies c
               JOIN memberships m ON m.company_id=c.id
              WHERE m.user_id=?
              ORDER BY c.created_at",
        )
        .bind(user_id.0.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.into_iter().map(company_from_row).collect()
    }

    async fn rename_company(&self, company_id: &CompanyId, name: &str) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE companies SET name=?, updated_at=? WHERE id=?")
            .bind(name)
            .bind(Utc::now().timestamp())
            .bind(company_id.0.to_string())
            .execute(&self.pool)
            .await
            .map_err(backend)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn delete_company(&self, company_id: &CompanyId) -> Result<(), StoreError> {
        let id = company_id.0.to_string();
        let mut tx = self.pool.begin().await.map_err(backend)?;

        sqlx::query("DELETE FROM invitations WHERE company_id=?")
            .bind(&id)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
        sqlx::query("DELETE FROM memberships WHERE company_id=?")
            .bind(&id)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
        let result = sqlx::query("DELETE FROM companies WHERE id=?")
            .bind(&id)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        tx.commit().await.map_err(backend)?;
        Ok(())
    }

    // ────────────────────────── Memberships ───────────────────────────────

    async fn get_membership(
        &self,
        company_id: &CompanyId,
        user_id: &UserId,
    ) -> Result<Membership, StoreError> {
        let row = sqlx::query_as::<_, MembershipRow>(
            "SELECT company_id,user_id,role,invited_by,joined_at
               FROM memberships WHERE company_id=? AND user_id=?",
        )
        .bind(company_id.0.to_string())
        .bind(user_id.0.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        row.map(membership_from_row).ok_or(StoreError::NotFound)?
    }

    async fn list_memberships(
        &self,
        company_id: &CompanyId,
    ) -> Result<Vec<Membership>, StoreError> {
        let rows = sqlx::query_as::<_, MembershipRow>(
            "SELECT company_id,user_id,role,invited_by,joined_at
               FROM memberships WHERE company_id=?
              ORDER BY joined_at",
        )
        .bind(company_id.0.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.into_iter().map(membership_from_row).collect()
    }

    async fn add_membership(&self, params: &AddMembershipParams) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO memberships(company_id,user_id,role,invited_by,joined_at)
             VALUES(?,?,?,?,?)",
        )
        .bind(params.company_id.0.to_string())
        .bind(params.user_id.0.to_string())
        .bind(params.role.as_str())
        .bind(params.invited_by.as_ref().map(|u| u.0.to_string()))
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .map_err(unique_or_backend)?;
        Ok(())
    }

    async fn update_membership_role(
        &self,
        company_id: &CompanyId,
        user_id: &UserId,
        role: &RoleKey,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE memberships SET role=? WHERE company_id=? AND user_id=?",
        )
        .bind(role.as_str())
        .bind(company_id.0.to_string())
        .bind(user_id.0.to_string())
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn remove_membership(
        &self,
        company_id: &CompanyId,
        user_id: &UserId,
    ) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM memberships WHERE company_id=? AND user_id=?")
            .bind(company_id.0.to_string())
            .bind(user_id.0.to_string())
            .execute(&self.pool)
            .await
            .map_err(backend)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn count_memberships(&self, company_id: &CompanyId) -> Result<i64, StoreError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM memberships WHERE company_id=?")
                .bind(company_id.0.to_string())
                .fetch_one(&self.pool)
                .await
                .map_err(backend)?;
        Ok(count)
    }

    // ────────────────────────── Invitations ───────────────────────────────

    async fn create_invitation(
        &self,
        params: &CreateInvitationParams,
    ) -> Result<Invitation, StoreError> {
        let id = Uuid::now_v7();
        let now = Utc::now();

        let mut tx = self.pool.begin().await.map_err(backend)?;

        // An expired invitation no longer counts as pending and must not
        // block a fresh one for the same (company, email) pair.
        sqlx::query("DELETE FROM invitations WHERE company_id=? AND email=? AND expires_at<?")
            .bind(params.company_id.0.to_string())
            .bind(&params.email)
            .bind(now.timestamp())
            .execute(&mut *tx)
            .await
            .map_err(backend)?;

        sqlx::query(
            "INSERT INTO invitations(id,company_id,email,role,token_hash,invited_by,created_at,expires_at)
             VALUES(?,?,?,?,?,?,?,?)",
        )
        .bind(id.to_string())
        .bind(params.company_id.0.to_string())
        .bind(&params.email)
        .bind(params.role.as_str())
        .bind(&params.token_hash)
        .bind(params.invited_by.0.to_string())
        .bind(now.timestamp())
        .bind(params.expires_at.timestamp())
        .execute(&mut *tx)
        .await
        .map_err(unique_or_backend)?;

        tx.commit().await.map_err(backend)?;

        Ok(Invitation {
            id: InvitationId(id),
            company_id: params.company_id.clone(),
            email: params.email.clone(),
            role: params.role.clone(),
            token_hash: params.token_hash.clone(),
            invited_by: params.invited_by.clone(),
            created_at: dt(now.timestamp())?,
            expires_at: dt(params.expires_at.timestamp())?,
        })
    }

    async fn get_invitation(
        &self,
        invitation_id: &InvitationId,
    ) -> Result<Invitation, StoreError> {
        let row = sqlx::query_as::<_, InvitationRow>(
            "SELECT id,company_id,email,role,token_hash,invited_by,created_at,expires_at
               FROM invitations WHERE id=?",
        )
        .bind(invitation_id.0.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        row.map(invitation_from_row).ok_or(StoreError::NotFound)?
    }

    async fn get_invitation_by_token(&self, token_hash: &str) -> Result<Invitation, StoreError> {
        let row = sqlx::query_as::<_, InvitationRow>(
            "SELECT id,company_id,email,role,token_hash,invited_by,created_at,expires_at
               FROM invitations WHERE token_hash=?",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        row.map(invitation_from_row).ok_or(StoreError::NotFound)?
    }

    async fn list_invitations(
        &self,
        company_id: &CompanyId,
    ) -> Result<Vec<Invitation>, StoreError> {
        let rows = sqlx::query_as::<_, InvitationRow>(
            "SELECT id,company_id,email,role,token_hash,invited_by,created_at,expires_at
               FROM invitations WHERE company_id=?
              ORDER BY created_at",
        )
        .bind(company_id.0.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.into_iter().map(invitation_from_row).collect()
    }

    async fn delete_invitation(&self, invitation_id: &InvitationId) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM invitations WHERE id=?")
            .bind(invitation_id.0.to_string())
            .execute(&self.pool)
            .await
            .map_err(backend)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn accept_invitation(
        &self,
        invitation_id: &InvitationId,
        user_id: &UserId,
    ) -> Result<Membership, StoreError> {
        let now = Utc::now().timestamp();
        let mut tx = self.pool.begin().await.map_err(backend)?;

        let row = sqlx::query_as::<_, InvitationRow>(
            "SELECT id,company_id,email,role,token_hash,invited_by,created_at,expires_at
               FROM invitations WHERE id=?",
        )
        .bind(invitation_id.0.to_string())
        .fetch_optional(&mut *tx)
        .await
        .map_err(backend)?;

        let invitation = row.map(invitation_from_row).ok_or(StoreError::NotFound)??;

        sqlx::query(
            "INSERT INTO memberships(company_id,user_id,role,invited_by,joined_at)
             VALUES(?,?,?,?,?)",
        )
        .bind(invitation.company_id.0.to_string())
        .bind(user_id.0.to_string())
        .bind(invitation.role.as_str())
        .bind(invitation.invited_by.0.to_string())
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(unique_or_backend)?;

        sqlx::query("DELETE FROM invitations WHERE id=?")
            .bind(invitation_id.0.to_string())
            .execute(&mut *tx)
            .await
            .map_err(backend)?;

        tx.commit().await.map_err(backend)?;

        Ok(Membership {
            company_id: invitation.company_id,
            user_id: user_id.clone(),
            role: invitation.role,
            invited_by: Some(invitation.invited_by),
            joined_at: dt(now)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn lock_contention_maps_to_conflict() {
        let locked = backend(sqlx::Error::Protocol("database is locked".into()));
        assert!(matches!(locked, StoreError::Conflict));

        let other = backend("disk I/O error");
        assert!(matches!(other, StoreError::Backend(_)));
    }

    #[tokio::test]
    async fn open_from_config_honors_database_url() {
        let config = ServiceConfig {
            database_url: Some("sqlite::memory:".to_string()),
            ..ServiceConfig::default()
        };

        let store = SqliteStore::open_from_config(&config).await.unwrap();
        let user = seed_user(&store, "Ada", "ada@example.com").await;
        assert_eq!(store.get_user_by_id(&user).await.unwrap().name, "Ada");
    }

    async fn seed_user(s: &SqliteStore, name: &str, email: &str) -> UserId {
        s.create_user(&CreateUserParams {
            name: name.to_string(),
            email: email.to_string(),
        })
        .await
        .unwrap()
    }

    async fn seed_company(s: &SqliteStore, owner: &UserId) -> CompanyId {
        s.create_company(&CreateCompanyParams {
            name: "acme".to_string(),
            owner_user_id: owner.clone(),
            owner_role: RoleKey::from("owner"),
        })
        .await
        .unwrap()
    }

    fn invitation_params(company: &CompanyId, invited_by: &UserId, email: &str) -> CreateInvitationParams {
        CreateInvitationParams {
            company_id: company.clone(),
            email: email.to_string(),
            role: RoleKey::from("editor"),
            token_hash: format!("hash-{}", email),
            invited_by: invited_by.clone(),
            expires_at: Utc::now() + Duration::hours(72),
        }
    }

    #[tokio::test]
    async fn user_roundtrip() {
        let s = SqliteStore::open_in_memory().await.unwrap();
        let id = seed_user(&s, "Ada", "ada@example.com").await;

        let by_id = s.get_user_by_id(&id).await.unwrap();
        assert_eq!(by_id.email, "ada@example.com");

        let by_email = s.get_user_by_email("ada@example.com").await.unwrap();
        assert_eq!(by_email.id, id);
    }

    #[tokio::test]
    async fn duplicate_email_maps_to_alreadyexists() {
        let s = SqliteStore::open_in_memory().await.unwrap();
        seed_user(&s, "Ada", "ada@example.com").await;

        let err = s
            .create_user(&CreateUserParams {
                name: "Other".to_string(),
                email: "ada@example.com".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists));
    }

    #[tokio::test]
    async fn create_company_creates_owner_membership() {
        let s = SqliteStore::open_in_memory().await.unwrap();
        let owner = seed_user(&s, "Ada", "ada@example.com").await;
        let company = seed_company(&s, &owner).await;

        assert_eq!(s.count_memberships(&company).await.unwrap(), 1);

        let membership = s.get_membership(&company, &owner).await.unwrap();
        assert_eq!(membership.role, RoleKey::from("owner"));
        assert!(membership.invited_by.is_none());
    }

    #[tokio::test]
    async fn add_and_update_membership() {
        let s = SqliteStore::open_in_memory().await.unwrap();
        let owner = seed_user(&s, "Ada", "ada@example.com").await;
        let member = seed_user(&s, "Bob", "bob@example.com").await;
        let company = seed_company(&s, &owner).await;

        s.add_membership(&AddMembershipParams {
            company_id: company.clone(),
            user_id: member.clone(),
            role: RoleKey::from("editor"),
            invited_by: Some(owner.clone()),
        })
        .await
        .unwrap();

        s.update_membership_role(&company, &member, &RoleKey::from("admin"))
            .await
            .unwrap();

        let got = s.get_membership(&company, &member).await.unwrap();
        assert_eq!(got.role, RoleKey::from("admin"));
        assert_eq!(got.invited_by, Some(owner));
    }

    #[tokio::test]
    async fn update_missing_membership_is_notfound() {
        let s = SqliteStore::open_in_memory().await.unwrap();
        let owner = seed_user(&s, "Ada", "ada@example.com").await;
        let company = seed_company(&s, &owner).await;

        let stranger = UserId(Uuid::new_v4());
        let err = s
            .update_membership_role(&company, &stranger, &RoleKey::from("editor"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }

    #[tokio::test]
    async fn duplicate_membership_maps_to_alreadyexists() {
        let s = SqliteStore::open_in_memory().await.unwrap();
        let owner = seed_user(&s, "Ada", "ada@example.com").await;
        let member = seed_user(&s, "Bob", "bob@example.com").await;
        let company = seed_company(&s, &owner).await;

        let params = AddMembershipParams {
            company_id: company.clone(),
            user_id: member.clone(),
            role: RoleKey::from("editor"),
            invited_by: None,
        };
        s.add_membership(&params).await.unwrap();
        let err = s.add_membership(&params).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists));
    }

    #[tokio::test]
    async fn remove_membership_then_notfound() {
        let s = SqliteStore::open_in_memory().await.unwrap();
        let owner = seed_user(&s, "Ada", "ada@example.com").await;
        let member = seed_user(&s, "Bob", "bob@example.com").await;
        let company = seed_company(&s, &owner).await;

        s.add_membership(&AddMembershipParams {
            company_id: company.clone(),
            user_id: member.clone(),
            role: RoleKey::from("editor"),
            invited_by: None,
        })
        .await
        .unwrap();

        s.remove_membership(&company, &member).await.unwrap();
        let err = s.remove_membership(&company, &member).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }

    #[tokio::test]
    async fn list_user_companies_follows_memberships() {
        let s = SqliteStore::open_in_memory().await.unwrap();
        let owner = seed_user(&s, "Ada", "ada@example.com").await;
        let member = seed_user(&s, "Bob", "bob@example.com").await;
        let company = seed_company(&s, &owner).await;

        assert!(s.list_user_companies(&member).await.unwrap().is_empty());

        s.add_membership(&AddMembershipParams {
            company_id: company.clone(),
            user_id: member.clone(),
            role: RoleKey::from("editor"),
            invited_by: None,
        })
        .await
        .unwrap();

        let companies = s.list_user_companies(&member).await.unwrap();
        assert_eq!(companies.len(), 1);
        assert_eq!(companies[0].id, company);
    }

    #[tokio::test]
    async fn duplicate_pending_invitation_maps_to_alreadyexists() {
        let s = SqliteStore::open_in_memory().await.unwrap();
        let owner = seed_user(&s, "Ada", "ada@example.com").await;
        let company = seed_company(&s, &owner).await;

        s.create_invitation(&invitation_params(&company, &owner, "bob@example.com"))
            .await
            .unwrap();

        let mut second = invitation_params(&company, &owner, "bob@example.com");
        second.token_hash = "another-hash".to_string();
        let err = s.create_invitation(&second).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists));
    }

    #[tokio::test]
    async fn cancelled_invitation_frees_the_slot() {
        let s = SqliteStore::open_in_memory().await.unwrap();
        let owner = seed_user(&s, "Ada", "ada@example.com").await;
        let company = seed_company(&s, &owner).await;

        let first = s
            .create_invitation(&invitation_params(&company, &owner, "bob@example.com"))
            .await
            .unwrap();
        s.delete_invitation(&first.id).await.unwrap();

        let mut second = invitation_params(&company, &owner, "bob@example.com");
        second.token_hash = "another-hash".to_string();
        s.create_invitation(&second).await.unwrap();
    }

    #[tokio::test]
    async fn expired_invitation_does_not_block_a_new_one() {
        let s = SqliteStore::open_in_memory().await.unwrap();
        let owner = seed_user(&s, "Ada", "ada@example.com").await;
        let company = seed_company(&s, &owner).await;

        let mut stale = invitation_params(&company, &owner, "bob@example.com");
        stale.expires_at = Utc::now() - Duration::hours(1);
        s.create_invitation(&stale).await.unwrap();

        let mut fresh = invitation_params(&company, &owner, "bob@example.com");
        fresh.token_hash = "fresh-hash".to_string();
        s.create_invitation(&fresh).await.unwrap();
    }

    #[tokio::test]
    async fn invitation_token_lookup() {
        let s = SqliteStore::open_in_memory().await.unwrap();
        let owner = seed_user(&s, "Ada", "ada@example.com").await;
        let company = seed_company(&s, &owner).await;

        let created = s
            .create_invitation(&invitation_params(&company, &owner, "bob@example.com"))
            .await
            .unwrap();

        let got = s
            .get_invitation_by_token("hash-bob@example.com")
            .await
            .unwrap();
        assert_eq!(got.id, created.id);

        let err = s.get_invitation_by_token("missing").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }

    #[tokio::test]
    async fn accept_invitation_is_atomic_and_single_use() {
        let s = SqliteStore::open_in_memory().await.unwrap();
        let owner = seed_user(&s, "Ada", "ada@example.com").await;
        let invitee = seed_user(&s, "Bob", "bob@example.com").await;
        let company = seed_company(&s, &owner).await;

        let invitation = s
            .create_invitation(&invitation_params(&company, &owner, "bob@example.com"))
            .await
            .unwrap();

        let membership = s.accept_invitation(&invitation.id, &invitee).await.unwrap();
        assert_eq!(membership.role, RoleKey::from("editor"));
        assert_eq!(membership.invited_by, Some(owner));

        // Invitation is consumed
        let err = s.get_invitation(&invitation.id).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound));

        // Second acceptance attempt fails
        let err = s.accept_invitation(&invitation.id, &invitee).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }

    #[tokio::test]
    async fn accept_invitation_for_existing_member_leaves_invitation_pending() {
        let s = SqliteStore::open_in_memory().await.unwrap();
        let owner = seed_user(&s, "Ada", "ada@example.com").await;
        let invitee = seed_user(&s, "Bob", "bob@example.com").await;
        let company = seed_company(&s, &owner).await;

        s.add_membership(&AddMembershipParams {
            company_id: company.clone(),
            user_id: invitee.clone(),
            role: RoleKey::from("editor"),
            invited_by: None,
        })
        .await
        .unwrap();

        let invitation = s
            .create_invitation(&invitation_params(&company, &owner, "bob@example.com"))
            .await
            .unwrap();

        let err = s.accept_invitation(&invitation.id, &invitee).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists));

        // Transaction rolled back: invitation still present
        s.get_invitation(&invitation.id).await.unwrap();
    }

    #[tokio::test]
    async fn delete_company_cascades() {
        let s = SqliteStore::open_in_memory().await.unwrap();
        let owner = seed_user(&s, "Ada", "ada@example.com").await;
        let company = seed_company(&s, &owner).await;

        s.create_invitation(&invitation_params(&company, &owner, "bob@example.com"))
            .await
            .unwrap();

        s.delete_company(&company).await.unwrap();

        assert!(matches!(
            s.get_company(&company).await.unwrap_err(),
            StoreError::NotFound
        ));
        assert_eq!(s.count_memberships(&company).await.unwrap(), 0);
        assert!(s.list_invitations(&company).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rename_company_updates_name() {
        let s = SqliteStore::open_in_memory().await.unwrap();
        let owner = seed_user(&s, "Ada", "ada@example.com").await;
        let company = seed_company(&s, &owner).await;

        s.rename_company(&company, "acme-renamed").await.unwrap();
        assert_eq!(s.get_company(&company).await.unwrap().name, "acme-renamed");

        let err = s
            .rename_company(&CompanyId(Uuid::new_v4()), "ghost")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }
}
