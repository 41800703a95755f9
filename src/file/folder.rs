//! Folder entity and repository.

use serde::Serialize;
use sqlx::FromRow;

use crate::db::DbPool;
use crate::{datetime, Result, StratusError};

/// A folder row.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Folder {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub parent_id: Option<i64>,
    /// Materialized path, parent path + "/" + name.
    pub path: String,
    #[serde(skip)]
    pub deleted: bool,
    pub created_at: String,
    #[serde(skip)]
    pub deleted_at: Option<String>,
}

/// Repository for folders.
#[derive(Debug, Clone)]
pub struct FolderRepository {
    pool: DbPool,
}

impl FolderRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Fetch a live folder owned by the given user.
    pub async fn get_owned(&self, user_id: i64, folder_id: i64) -> Result<Option<Folder>> {
        let folder = sqlx::query_as::<_, Folder>(
            "SELECT * FROM folders WHERE id = $1 AND user_id = $2 AND deleted = 0",
        )
        .bind(folder_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(folder)
    }

    /// Create a folder under an optional parent.
    ///
    /// Sibling-name uniqueness is enforced by a partial unique index, so a
    /// concurrent duplicate insert surfaces as a constraint violation and
    /// is mapped to `Conflict` here rather than pre-checked.
    pub async fn create(
        &self,
        user_id: i64,
        name: &str,
        parent: Option<&Folder>,
    ) -> Result<Folder> {
        let path = match parent {
            Some(p) => format!("{}/{}", p.path, name),
            None => format!("/{name}"),
        };

        let result = sqlx::query_as::<_, Folder>(
            "INSERT INTO folders (user_id, name, parent_id, path, created_at)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING *",
        )
        .bind(user_id)
        .bind(name)
        .bind(parent.map(|p| p.id))
        .bind(&path)
        .bind(datetime::now_string())
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(folder) => Ok(folder),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => Err(
                StratusError::Conflict(format!("a folder named '{name}' already exists here")),
            ),
            Err(e) => Err(e.into()),
        }
    }

    /// Live subfolders of a parent (or of the root when `parent_id` is None).
    pub async fn list_children(
        &self,
        user_id: i64,
        parent_id: Option<i64>,
    ) -> Result<Vec<Folder>> {
        let folders = match parent_id {
            Some(parent_id) => {
                sqlx::query_as::<_, Folder>(
                    "SELECT * FROM folders
                     WHERE user_id = $1 AND parent_id = $2 AND deleted = 0
                     ORDER BY name",
                )
                .bind(user_id)
                .bind(parent_id)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Folder>(
                    "SELECT * FROM folders
                     WHERE user_id = $1 AND parent_id IS NULL AND deleted = 0
                     ORDER BY name",
                )
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(folders)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::user::{NewUser, UserRepository};
    use crate::db::Database;

    async fn setup() -> (Database, FolderRepository, i64) {
        let db = Database::open_in_memory().await.unwrap();
        let users = UserRepository::new(db.pool().clone());
        let user = users
            .create(&NewUser {
                name: "Alice".to_string(),
                email: "alice@example.com".to_string(),
                password: "$argon2id$fake".to_string(),
            })
            .await
            .unwrap();
        (db.clone(), FolderRepository::new(db.pool().clone()), user.id)
    }

    #[tokio::test]
    async fn test_create_root_folder() {
        let (_db, folders, user_id) = setup().await;
        let folder = folders.create(user_id, "Documents", None).await.unwrap();
        assert_eq!(folder.path, "/Documents");
        assert_eq!(folder.parent_id, None);
    }

    #[tokio::test]
    async fn test_nested_path_is_materialized() {
        let (_db, folders, user_id) = setup().await;
        let parent = folders.create(user_id, "Documents", None).await.unwrap();
        let child = folders
            .create(user_id, "Taxes", Some(&parent))
            .await
            .unwrap();
        assert_eq!(child.path, "/Documents/Taxes");
        assert_eq!(child.parent_id, Some(parent.id));
    }

    #[tokio::test]
    async fn test_sibling_duplicate_conflicts() {
        let (_db, folders, user_id) = setup().await;
        folders.create(user_id, "Documents", None).await.unwrap();
        let err = folders.create(user_id, "Documents", None).await.unwrap_err();
        assert!(matches!(err, StratusError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_same_name_under_different_parents_ok() {
        let (_db, folders, user_id) = setup().await;
        let a = folders.create(user_id, "A", None).await.unwrap();
        let b = folders.create(user_id, "B", None).await.unwrap();
        folders.create(user_id, "Shared", Some(&a)).await.unwrap();
        folders.create(user_id, "Shared", Some(&b)).await.unwrap();
    }

    #[tokio::test]
    async fn test_get_owned_ignores_foreign_folders() {
        let (db, folders, user_id) = setup().await;
        let users = UserRepository::new(db.pool().clone());
        let other = users
            .create(&NewUser {
                name: "Bob".to_string(),
                email: "bob@example.com".to_string(),
                password: "$argon2id$fake".to_string(),
            })
            .await
            .unwrap();
        let folder = folders.create(other.id, "Private", None).await.unwrap();
        assert!(folders.get_owned(user_id, folder.id).await.unwrap().is_none());
        assert!(folders.get_owned(other.id, folder.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_list_children_root_and_nested() {
        let (_db, folders, user_id) = setup().await;
        let parent = folders.create(user_id, "Docs", None).await.unwrap();
        folders.create(user_id, "Music", None).await.unwrap();
        folders.create(user_id, "Inner", Some(&parent)).await.unwrap();

        let root = folders.list_children(user_id, None).await.unwrap();
        assert_eq!(root.len(), 2);
        let nested = folders.list_children(user_id, Some(parent.id)).await.unwrap();
        assert_eq!(nested.len(), 1);
        assert_eq!(nested[0].name, "Inner");
    }
}
