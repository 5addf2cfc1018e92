use crate::{
    authentication::SessionManager,
    entities::{SessionRequest, Todo, TodoCreated, TodoId, TodoRequest, CONTENT, ID, USER_ID},
    error::{Error, Result},
    store::{Assignment, Key, Store},
};
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Extension, Path, Query,
    },
    Json,
};
use std::sync::Arc;

/// Todos keyed by (id, owner). Every operation first checks the owner's session.
#[derive(Clone)]
pub struct TodoRepository {
    store: Arc<dyn Store>,
    todo_table: String,
    sessions: SessionManager,
}

impl TodoRepository {
    pub fn new(store: Arc<dyn Store>, todo_table: &str, sessions: SessionManager) -> Self {
        Self {
            store,
            todo_table: todo_table.to_string(),
            sessions,
        }
    }

    pub async fn create(&self, user_id: &str, token: &str, content: &str) -> Result<TodoId> {
        if !self.sessions.is_authorized(user_id, token).await {
            return Err(Error::Forbidden);
        }

        let todo_id = TodoId::generate();
        self.store
            .upsert(
                &self.todo_table,
                &todo_key(todo_id.as_str(), user_id),
                &[Assignment::set(CONTENT, content)],
            )
            .await?;
        tracing::debug!(user_id, %todo_id, "created todo");
        Ok(todo_id)
    }

    pub async fn fetch(&self, todo_id: &str, user_id: &str, token: &str) -> Result<String> {
        if !self.sessions.is_authorized(user_id, token).await {
            return Err(Error::Forbidden);
        }

        let item = self
            .store
            .get(
                &self.todo_table,
                &todo_key(todo_id, user_id),
                Some(&[CONTENT][..]),
                false,
            )
            .await?;

        item.and_then(|mut item| item.remove(CONTENT))
            .ok_or(Error::NotFound)
    }
}

fn todo_key(todo_id: &str, user_id: &str) -> Key {
    Key::new(ID, todo_id).and(USER_ID, user_id)
}

pub async fn create_todo(
    Extension(todos): Extension<TodoRepository>,
    body: std::result::Result<Json<TodoRequest>, JsonRejection>,
) -> Result<Json<TodoCreated>> {
    let Json(request) = body.map_err(|e| Error::MalformedRequest(e.body_text()))?;
    let todoid = todos
        .create(
            &request.session.userid,
            &request.session.sessionid,
            &request.content,
        )
        .await?;
    Ok(Json(TodoCreated { todoid }))
}

pub async fn get_todo(
    Extension(todos): Extension<TodoRepository>,
    Path(todo_id): Path<String>,
    query: std::result::Result<Query<SessionRequest>, QueryRejection>,
) -> Result<Json<Todo>> {
    let Query(session) = query.map_err(|e| Error::MalformedRequest(e.body_text()))?;
    let content = todos
        .fetch(&todo_id, &session.userid, &session.sessionid)
        .await?;
    Ok(Json(Todo {
        todoid: TodoId::from(todo_id),
        content,
    }))
}
